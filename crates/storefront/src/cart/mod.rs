//! Cart consistency subsystem.
//!
//! The remote cart is authoritative whenever it is reachable. The local
//! cache mirrors it after every successful mutation and stands in for it
//! only when a read fails. On session start the [`Reconciler`] replays
//! whatever the cache holds that the remote is missing, then clears it.
//!
//! ```text
//! caller ─▶ StockValidator ─▶ RemoteCart (mutate) ─▶ LocalCartStore (mirror)
//! session start: LocalCartStore ─▶ Reconciler ─▶ RemoteCart ─▶ clear local
//! checkout:      RemoteCart ─▶ OrderAssembler ─▶ submit ─▶ clear both
//! ```

pub mod backend;
pub mod checkout;
pub mod local;
pub mod reconcile;
pub mod service;
pub mod source;
pub mod validator;

pub use backend::{CartBackend, HttpCartBackend, RemoteLine};
pub use checkout::{Checkout, OrderAssembler, OrderFulfillment};
pub use local::{CacheError, FileCartStore, LocalCartStore, MemoryCartStore};
pub use reconcile::{FailedItem, Reconciler, SyncReport};
pub use service::{CartService, CartSource, CartView};
pub use source::RemoteCart;
pub use validator::{StockValidator, check_stock};
