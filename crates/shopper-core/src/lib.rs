//! Core types and models for the Cartwheel shopping client.
//!
//! This crate holds the shared vocabulary of the workspace and the pure,
//! I/O-free models behind the client's behavior:
//!
//! - [`UserProfile`] - the root aggregate persisted wholesale on every change
//! - [`LearnedPreferences`] - facts the backend infers over the conversation
//! - [`Watchlist`] - per-product price history and target evaluation
//! - [`ChatMessage`] - ordered conversation messages with persistent ids
//! - [`UiProduct`] - display-shaped products mapped from backend records
//!
//! Everything here is a plain data transformation; persistence and HTTP live
//! in the `database` and `agent-client` crates.

mod learned;
mod message;
mod product;
mod profile;
mod watchlist;

pub use learned::LearnedPreferences;
pub use message::{history_window, ChatMessage, HistoryEntry, Role};
pub use product::{BackendProduct, UiProduct};
pub use profile::{
    PersonalInfo, PriceSensitivity, PurchaseEntry, SavedCard, SearchEntry, ShippingAddress,
    ShippingPreference, UserProfile, SEARCH_HISTORY_CAP,
};
pub use watchlist::{PricePoint, PriceView, WatchOutcome, Watchlist, WatchlistItem};
