//! Conversation engine and profile persistence for the Cartwheel client.
//!
//! Ties the crates together: user turns go through the
//! [`ConversationEngine`], which calls the backend through the
//! [`SearchBackend`] seam, maintains the chat transcript, folds learned
//! preferences into the profile, and persists everything through the
//! [`ProfileStore`].

pub mod engine;
pub mod error;
pub mod store;

pub use engine::{ConversationEngine, SearchBackend, SendOutcome, HISTORY_WINDOW};
pub use error::{EngineError, Result};
pub use store::ProfileStore;
