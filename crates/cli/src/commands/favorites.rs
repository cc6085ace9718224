//! Favorites commands.

use std::io::Write;

use pethub_core::ProductId;
use pethub_storefront::Storefront;

use super::CommandResult;

pub async fn list(storefront: &Storefront) -> CommandResult {
    let favorites = storefront.favorites().list().await;
    let mut out = std::io::stdout().lock();
    if favorites.is_empty() {
        writeln!(out, "No favorites")?;
    }
    for id in favorites {
        writeln!(out, "{id}")?;
    }
    Ok(())
}

pub async fn add(storefront: &Storefront, product: &str) -> CommandResult {
    storefront.favorites().add(&ProductId::new(product)).await?;
    tracing::info!("Added {product} to favorites");
    Ok(())
}

pub async fn remove(storefront: &Storefront, product: &str) -> CommandResult {
    storefront.favorites().remove(&ProductId::new(product)).await?;
    tracing::info!("Removed {product} from favorites");
    Ok(())
}
