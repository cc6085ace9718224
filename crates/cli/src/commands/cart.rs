//! Cart and checkout commands.

use std::io::Write;

use pethub_core::ProductId;
use pethub_storefront::Storefront;
use pethub_storefront::cart::{CartSource, SyncReport};

use super::CommandResult;

/// Run the once-per-session sync before touching the cart.
///
/// A failed sync is logged and the command carries on against the server
/// cart; the cache is kept for the next attempt.
pub async fn start_session(storefront: &Storefront) -> CommandResult {
    match storefront.start_session().await {
        Ok(Some(report)) => print_report(&report)?,
        Ok(None) => {}
        Err(e) => tracing::warn!("Cart sync skipped: {e}"),
    }
    Ok(())
}

fn print_report(report: &SyncReport) -> CommandResult {
    let mut out = std::io::stdout().lock();
    for failed in report.failed() {
        writeln!(
            out,
            "Could not restore {} x{} ({} of {} missing units added): {}",
            failed.entry.key(),
            failed.entry.quantity,
            failed.applied,
            failed.missing,
            failed.reason
        )?;
    }
    Ok(())
}

pub async fn show(storefront: &Storefront) -> CommandResult {
    let view = storefront.cart().read_cart().await?;
    let mut out = std::io::stdout().lock();

    if view.source == CartSource::Local {
        writeln!(out, "(offline: showing last known cart)")?;
    }
    if view.entries.is_empty() {
        writeln!(out, "Cart is empty")?;
        return Ok(());
    }
    for entry in &view.entries {
        writeln!(
            out,
            "{:<30} {:<8} {:>4} x {:>10}",
            entry.name,
            entry.size,
            entry.quantity,
            entry.price.to_string()
        )?;
    }
    writeln!(out, "Items: {}  Subtotal: {}", view.total_quantity(), view.subtotal())?;
    Ok(())
}

pub async fn add(storefront: &Storefront, product: &str, size: &str, quantity: u32) -> CommandResult {
    storefront
        .cart()
        .add_item(&ProductId::new(product), size, quantity)
        .await?;
    tracing::info!("Added {quantity} x {product} ({size})");
    Ok(())
}

pub async fn set(storefront: &Storefront, product: &str, size: &str, quantity: u32) -> CommandResult {
    storefront
        .cart()
        .change_quantity(&ProductId::new(product), size, quantity)
        .await?;
    tracing::info!("Set {product} ({size}) to {quantity}");
    Ok(())
}

pub async fn remove(storefront: &Storefront, product: &str, size: &str) -> CommandResult {
    storefront
        .cart()
        .remove_item(&ProductId::new(product), size)
        .await?;
    tracing::info!("Removed {product} ({size})");
    Ok(())
}

/// Explicit sync, independent of the once-per-session guard.
pub async fn sync(storefront: &Storefront) -> CommandResult {
    let report = storefront.cart().sync().await?;
    if report.is_clean() {
        writeln!(std::io::stdout().lock(), "Cart is in sync")?;
    } else {
        print_report(&report)?;
    }
    Ok(())
}

pub async fn checkout(storefront: &Storefront, discount: &str) -> CommandResult {
    let checkout = storefront.cart().checkout(discount).await?;
    let totals = checkout.order.totals;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Order {} placed ({})", checkout.record.order_code, checkout.record.status)?;
    writeln!(out, "  Subtotal  {}", totals.subtotal)?;
    writeln!(out, "  Shipping  {}", totals.shipping)?;
    writeln!(out, "  Discount  {}", totals.discount)?;
    writeln!(out, "  Total     {}", totals.total)?;
    if !checkout.cart_cleared {
        writeln!(out, "Note: the cart could not be emptied; remove the ordered items before buying again")?;
    }
    Ok(())
}
