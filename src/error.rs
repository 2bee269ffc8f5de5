//! Error taxonomy for the gallery pipeline.

use crate::types::CardId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GalleryError {
    /// Ledger or marketplace read failed (network error or contract revert)
    #[error("card set fetch failed: {0}")]
    Fetch(String),

    /// Token URI unreachable or the body was not JSON
    #[error("metadata fetch failed for card {card}: {reason}")]
    MetadataFetch { card: CardId, reason: String },

    /// Metadata document is missing its attribute list or is malformed
    #[error("malformed metadata for card {card}: {reason}")]
    MetadataShape { card: CardId, reason: String },

    #[error("invalid gallery configuration: {0}")]
    Config(String),

    /// The gallery service has shut down
    #[error("gallery service is no longer running")]
    Closed,
}

impl GalleryError {
    pub fn fetch(reason: impl std::fmt::Display) -> Self {
        GalleryError::Fetch(reason.to_string())
    }

    pub fn metadata_fetch(card: CardId, reason: impl std::fmt::Display) -> Self {
        GalleryError::MetadataFetch {
            card,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
