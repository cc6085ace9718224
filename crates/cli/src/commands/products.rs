//! Catalog browsing commands.

use std::io::Write;

use pethub_core::{PriceTier, ProductId, SearchFilters};
use pethub_storefront::Storefront;
use pethub_storefront::catalog::ProductCatalog;

use super::{CliError, CommandResult};

/// Search products and print one line per product.
pub async fn search(
    storefront: &Storefront,
    query: &str,
    category: Option<String>,
    animal_type: Option<String>,
    price: Option<&str>,
) -> CommandResult {
    let price = price
        .map(|token| {
            PriceTier::from_token(token).ok_or_else(|| CliError::InvalidPriceTier(token.to_owned()))
        })
        .transpose()?;
    let filters = SearchFilters {
        category,
        animal_type,
        price,
    };

    let products = storefront.catalog().search(query, &filters).await?;
    let mut out = std::io::stdout().lock();
    if products.is_empty() {
        writeln!(out, "No products found")?;
    }
    for product in products {
        let from = product
            .min_price()
            .map_or_else(|| "-".to_owned(), |p| p.to_string());
        writeln!(out, "{}  {}  from {}", product.id, product.name, from)?;
    }
    Ok(())
}

/// Print one product with its sizes.
pub async fn show(storefront: &Storefront, id: &str) -> CommandResult {
    let product = storefront
        .catalog()
        .get_product(&ProductId::new(id))
        .await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{} ({})", product.name, product.id)?;
    if !product.description.is_empty() {
        writeln!(out, "{}", product.description)?;
    }
    for option in &product.options {
        writeln!(out, "  {:<10} {:>12}  stock {}", option.size, option.price.to_string(), option.stock)?;
    }
    Ok(())
}

pub async fn categories(storefront: &Storefront) -> CommandResult {
    let names = storefront.catalog().categories().await?;
    let mut out = std::io::stdout().lock();
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

pub async fn animal_types(storefront: &Storefront) -> CommandResult {
    let names = storefront.catalog().animal_types().await?;
    let mut out = std::io::stdout().lock();
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
