//! HTTP client for the Cartwheel shopping-agent backend.
//!
//! This crate is the single seam between the client and the outside world.
//! It provides:
//!
//! - [`AgentClient`] - typed request/response wrappers for every backend
//!   endpoint (search, purchases, tracking, spending, coupons)
//! - [`CheckoutSession`] - a cancelable consumer for the auto-checkout
//!   status event stream
//! - a fire-and-forget heartbeat loop for backend liveness tracking
//!
//! # Example
//!
//! ```no_run
//! use agent_client::{AgentClient, AgentConfig};
//! use shopper_core::UserProfile;
//!
//! # async fn example() -> Result<(), agent_client::ClientError> {
//! let client = AgentClient::new(AgentConfig::from_env())?;
//!
//! let response = client
//!     .search("warm jacket for hiking", &UserProfile::default(), Vec::new())
//!     .await?;
//! println!("{} ({} products)", response.agent_message, response.products.len());
//! # Ok(())
//! # }
//! ```

pub mod api_types;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;

pub use api_types::{
    CheckoutRequest, Coupon, FollowUpQuestion, HeartbeatResponse, ProfileSnapshot, PurchaseAlert,
    PurchaseRequest, PurchaseResponse, SearchRequest, SearchResponse, Shipment, SpendingOverview,
    TrackingStatus,
};
pub use checkout::{CheckoutSession, CheckoutStatus, EventLineParser, STREAM_END_STEP};
pub use client::AgentClient;
pub use config::AgentConfig;
pub use error::ClientError;
