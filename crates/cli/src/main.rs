//! PetHub CLI - shopper client for the PetHub storefront API.
//!
//! # Usage
//!
//! ```bash
//! # Search the catalog
//! pethub products search kibble --animal dog --price ฿฿
//!
//! # Work with the cart (syncs the local cache on first use)
//! pethub cart add 64f0c2 2kg -q 2
//! pethub cart set 64f0c2 2kg 1
//! pethub cart show
//!
//! # Place an order
//! pethub checkout --discount 50
//!
//! # Order history and reviews
//! pethub orders list
//! pethub orders review 64f0d1 5 --comment "Fast delivery"
//!
//! # Address book
//! pethub addresses add --name Somchai --phone 0812345678 --detail "99/1 Sukhumvit Rd" \
//!     --zip-code 10110 --province Bangkok --district Watthana --default
//! ```
//!
//! # Environment Variables
//!
//! See `pethub_storefront::config` for the full list. `PETHUB_AUTH_TOKEN`
//! must be set for anything other than product search.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pethub_storefront::Storefront;
use pethub_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pethub")]
#[command(author, version, about = "PetHub storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the product catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Check out the current cart
    Checkout {
        /// Discount amount; anything that is not a positive number counts as 0
        #[arg(short, long, default_value = "")]
        discount: String,
    },
    /// View past orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoriteAction,
    },
    /// Manage saved shipping addresses
    Addresses {
        #[command(subcommand)]
        action: AddressAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Search products
    Search {
        /// Free-text query
        #[arg(default_value = "")]
        query: String,

        /// Category filter
        #[arg(short, long)]
        category: Option<String>,

        /// Animal type filter
        #[arg(short, long)]
        animal: Option<String>,

        /// Price tier (฿, ฿฿, ฿฿฿, ฿฿฿฿)
        #[arg(short, long)]
        price: Option<String>,
    },
    /// Show one product with its sizes and stock
    Show {
        /// Product ID
        id: String,
    },
    /// List categories
    Categories,
    /// List animal types
    AnimalTypes,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add units of a product size
    Add {
        /// Product ID
        product: String,
        /// Size label
        size: String,
        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line to an exact quantity (0 removes it)
    Set {
        /// Product ID
        product: String,
        /// Size label
        size: String,
        /// New quantity
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product: String,
        /// Size label
        size: String,
    },
    /// Replay the local cart cache into the server cart
    Sync,
}

#[derive(Subcommand)]
enum OrderAction {
    /// List orders
    List,
    /// Show one order
    Show {
        /// Order ID
        id: String,
    },
    /// Review an order
    Review {
        /// Order ID
        id: String,
        /// Rating from 1 to 5
        rating: u8,
        /// Review text
        #[arg(short, long, default_value = "")]
        comment: String,
    },
    /// List your reviews
    Reviews,
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// List favorite product IDs
    List,
    /// Add a product
    Add {
        /// Product ID
        product: String,
    },
    /// Remove a product
    Remove {
        /// Product ID
        product: String,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses; the default is starred
    List,
    /// Save a new address
    Add {
        /// Label such as Home or Office
        #[arg(short, long)]
        label: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        lastname: Option<String>,
        #[arg(long)]
        phone: String,
        /// House number and street
        #[arg(long)]
        detail: String,
        #[arg(long)]
        zip_code: String,
        #[arg(long)]
        province: String,
        #[arg(long)]
        district: String,
        /// Make this the default shipping address
        #[arg(long = "default")]
        is_default: bool,
    },
    /// Delete an address
    Remove {
        /// Address ID
        id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pethub_storefront=info,pethub_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storefront = Storefront::new(config)?;

    match cli.command {
        Commands::Products { action } => match action {
            ProductAction::Search {
                query,
                category,
                animal,
                price,
            } => {
                commands::products::search(&storefront, &query, category, animal, price.as_deref())
                    .await?;
            }
            ProductAction::Show { id } => commands::products::show(&storefront, &id).await?,
            ProductAction::Categories => commands::products::categories(&storefront).await?,
            ProductAction::AnimalTypes => commands::products::animal_types(&storefront).await?,
        },
        Commands::Cart { action } => {
            commands::cart::start_session(&storefront).await?;
            match action {
                CartAction::Show => commands::cart::show(&storefront).await?,
                CartAction::Add {
                    product,
                    size,
                    quantity,
                } => commands::cart::add(&storefront, &product, &size, quantity).await?,
                CartAction::Set {
                    product,
                    size,
                    quantity,
                } => commands::cart::set(&storefront, &product, &size, quantity).await?,
                CartAction::Remove { product, size } => {
                    commands::cart::remove(&storefront, &product, &size).await?;
                }
                CartAction::Sync => commands::cart::sync(&storefront).await?,
            }
        }
        Commands::Checkout { discount } => {
            commands::cart::start_session(&storefront).await?;
            commands::cart::checkout(&storefront, &discount).await?;
        }
        Commands::Orders { action } => match action {
            OrderAction::List => commands::orders::list(&storefront).await?,
            OrderAction::Show { id } => commands::orders::show(&storefront, &id).await?,
            OrderAction::Review {
                id,
                rating,
                comment,
            } => commands::orders::review(&storefront, &id, rating, &comment).await?,
            OrderAction::Reviews => commands::orders::reviews(&storefront).await?,
        },
        Commands::Favorites { action } => match action {
            FavoriteAction::List => commands::favorites::list(&storefront).await?,
            FavoriteAction::Add { product } => {
                commands::favorites::add(&storefront, &product).await?;
            }
            FavoriteAction::Remove { product } => {
                commands::favorites::remove(&storefront, &product).await?;
            }
        },
        Commands::Addresses { action } => match action {
            AddressAction::List => commands::addresses::list(&storefront).await?,
            AddressAction::Add {
                label,
                name,
                lastname,
                phone,
                detail,
                zip_code,
                province,
                district,
                is_default,
            } => {
                let draft = pethub_core::AddressDraft {
                    label,
                    name,
                    lastname,
                    phone,
                    detail,
                    zip_code,
                    province,
                    district,
                    is_default,
                };
                commands::addresses::add(&storefront, &draft).await?;
            }
            AddressAction::Remove { id } => commands::addresses::remove(&storefront, &id).await?,
        },
    }
    Ok(())
}
