//! Order history commands.

use std::io::Write;

use pethub_core::{OrderId, OrderRecord, Rating, Review};
use pethub_storefront::Storefront;

use super::{CliError, CommandResult};

fn print_order(out: &mut impl Write, order: &OrderRecord) -> std::io::Result<()> {
    let placed = order
        .created_at
        .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
    writeln!(
        out,
        "{:<12} {:<10} {:>12}  {} item(s)  {}  tracking {}{}",
        order.order_code,
        order.status.as_str(),
        order.total.to_string(),
        order.item_count,
        placed,
        order.tracking_number.as_deref().unwrap_or("-"),
        if order.is_reviewed { "  reviewed" } else { "" }
    )
}

fn print_review(out: &mut impl Write, review: &Review) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<12} {}  {}",
        review.order_id.as_str(),
        review.rating,
        review.comment
    )
}

pub async fn list(storefront: &Storefront) -> CommandResult {
    let orders = storefront.orders().list_orders().await?;
    let mut out = std::io::stdout().lock();
    if orders.is_empty() {
        writeln!(out, "No orders yet")?;
    }
    for order in &orders {
        print_order(&mut out, order)?;
    }
    Ok(())
}

pub async fn show(storefront: &Storefront, id: &str) -> CommandResult {
    let order = storefront.orders().get_order(&OrderId::new(id)).await?;
    print_order(&mut std::io::stdout().lock(), &order)?;
    Ok(())
}

pub async fn review(storefront: &Storefront, id: &str, stars: u8, comment: &str) -> CommandResult {
    let rating = Rating::new(stars).ok_or(CliError::InvalidRating(stars))?;
    let review = storefront
        .orders()
        .submit_review(&OrderId::new(id), rating, comment)
        .await?;
    print_review(&mut std::io::stdout().lock(), &review)?;
    Ok(())
}

pub async fn reviews(storefront: &Storefront) -> CommandResult {
    let reviews = storefront.orders().reviews().await;
    let mut out = std::io::stdout().lock();
    if reviews.is_empty() {
        writeln!(out, "No reviews yet")?;
    }
    for review in &reviews {
        print_review(&mut out, review)?;
    }
    Ok(())
}
