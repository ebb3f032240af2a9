//! Error types for the conversation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("backend error: {0}")]
    Client(#[from] agent_client::ClientError),

    #[error("database error: {0}")]
    Database(#[from] cartwheel_database::DatabaseError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
