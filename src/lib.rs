//! bcard-gallery - card-set resolution and incremental loading for an NFT
//! business card gallery
//!
//! This crate decides which cards a gallery shows (every minted card, the
//! connected account's cards, marketplace listings, or the account's own
//! listings), narrows them with an attribute search over per-card metadata,
//! and serves the result page by page as the viewer scrolls.

pub mod types;
pub mod error;
pub mod chain;
pub mod gallery;

// Re-export main types for convenience
pub use error::{GalleryError, Result};
pub use gallery::{
    FilterQuery, Gallery, GalleryBuilder, GalleryConfig, GalleryEvent, GalleryHandle, GalleryService,
    GallerySnapshot, ViewMode,
};
pub use types::{Address, AttributeEntry, CardId, CardMetadata, MarketItem, U256};
