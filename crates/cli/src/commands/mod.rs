//! CLI command implementations.
//!
//! Results are written to stdout; logs go to stderr.

pub mod addresses;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod products;

use thiserror::Error;

/// Errors from parsing command arguments.
#[derive(Debug, Error)]
pub enum CliError {
    /// Price tier token not recognised.
    #[error("Invalid price tier: {0}. Valid tiers: ฿, ฿฿, ฿฿฿, ฿฿฿฿")]
    InvalidPriceTier(String),

    /// Review rating outside 1 to 5.
    #[error("Invalid rating: {0}. Ratings go from 1 to 5")]
    InvalidRating(u8),
}

/// Result type for commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
