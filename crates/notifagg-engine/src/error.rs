//! Error types for the aggregation engine

use notifagg_core::KeyError;
use notifagg_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while ingesting events or flushing buckets
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bucket store operation failed
    #[error("bucket store error: {0}")]
    Store(#[from] StoreError),

    /// A bucket key could not be decoded
    #[error("invalid bucket key: {0}")]
    Key(#[from] KeyError),

    /// Event is missing a required identifier
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// An external collaborator (persistence, profiles) failed
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: &'static str,
        source: anyhow::Error,
    },
}

impl EngineError {
    pub fn collaborator(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Collaborator { stage, source }
    }
}
