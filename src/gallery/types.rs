//! Core types and configuration for the gallery pipeline.

use crate::error::{GalleryError, Result};
use crate::types::{Address, CardId, CardMetadata, MarketItem};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Which card source the gallery shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    /// Every minted card
    All,
    /// Cards held by the connected account
    Owned,
    /// Every active marketplace listing
    Marketplace,
    /// Marketplace listings created by the connected account
    OwnedListings,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::Owned => "owned",
            ViewMode::Marketplace => "marketplace",
            ViewMode::OwnedListings => "owned_listings",
        }
    }

    /// Modes that only make sense with a connected account.
    pub fn requires_account(&self) -> bool {
        matches!(self, ViewMode::Owned | ViewMode::OwnedListings)
    }

    /// Modes whose candidates come from the marketplace.
    pub fn uses_marketplace(&self) -> bool {
        matches!(self, ViewMode::Marketplace | ViewMode::OwnedListings)
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free card ids eligible for display, newest first.
///
/// Sets produced from the marketplace also remember each card's listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    cards: Vec<CardId>,
    listings: HashMap<CardId, MarketItem>,
}

impl CandidateSet {
    /// Build a set from ids in display order; later duplicates are dropped.
    pub fn from_cards(cards: impl IntoIterator<Item = CardId>) -> Self {
        let mut seen = HashSet::new();
        let cards = cards.into_iter().filter(|card| seen.insert(*card)).collect();
        Self {
            cards,
            listings: HashMap::new(),
        }
    }

    /// Build a set from listings in display order.
    pub fn from_listings(items: impl IntoIterator<Item = MarketItem>) -> Self {
        let mut cards = Vec::new();
        let mut listings = HashMap::new();
        for item in items {
            if !listings.contains_key(&item.token_id) {
                cards.push(item.token_id);
                listings.insert(item.token_id, item);
            }
        }
        Self { cards, listings }
    }

    pub fn cards(&self) -> &[CardId] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn listing(&self, card: CardId) -> Option<&MarketItem> {
        self.listings.get(&card)
    }

    /// Order-preserving subsequence of the cards `keep` accepts.
    pub fn retain(mut self, mut keep: impl FnMut(CardId) -> bool) -> Self {
        self.cards.retain(|card| keep(*card));
        let remaining: HashSet<CardId> = self.cards.iter().copied().collect();
        self.listings.retain(|card, _| remaining.contains(card));
        self
    }
}

/// A card ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCard {
    pub id: CardId,
    pub metadata: Arc<CardMetadata>,
    pub listing: Option<MarketItem>,
}

/// The materialized prefix of the current candidate set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedPage {
    cards: Vec<LoadedCard>,
}

impl LoadedPage {
    pub fn cards(&self) -> &[LoadedCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub(crate) fn extend(&mut self, cards: Vec<LoadedCard>) {
        self.cards.extend(cards);
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GallerySnapshot {
    pub mode: ViewMode,
    pub owned_on: bool,
    pub marketplace_on: bool,
    /// Length of the current candidate set; the scroll bound
    pub candidate_count: usize,
    pub loaded: Vec<LoadedCard>,
    pub is_loading: bool,
    /// Message of the last failed cycle, cleared by the next success
    pub error: Option<String>,
}

impl GallerySnapshot {
    /// Every candidate has been materialized.
    pub fn exhausted(&self) -> bool {
        self.loaded.len() >= self.candidate_count
    }
}

impl Default for GallerySnapshot {
    fn default() -> Self {
        Self {
            mode: ViewMode::All,
            owned_on: false,
            marketplace_on: false,
            candidate_count: 0,
            loaded: Vec::new(),
            is_loading: false,
            error: None,
        }
    }
}

/// Gallery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// JSON-RPC endpoint of the chain node
    pub rpc_url: String,
    /// Business card (ERC-721 Enumerable) contract
    pub ledger_address: Option<String>,
    /// Marketplace contract
    pub marketplace_address: Option<String>,
    /// Cards loaded right after a new candidate set is resolved
    pub first_page_size: usize,
    /// Cards loaded per scroll-threshold event
    pub scroll_page_size: usize,
    /// Distance from the content bottom that counts as "near the bottom", in pixels
    pub scroll_threshold_px: f64,
    /// Maximum cached metadata documents
    pub metadata_cache_entries: u64,
    /// Metadata fetches in flight while filtering
    pub metadata_concurrency: usize,
    /// Per-request HTTP timeout
    pub http_timeout_seconds: u64,
    /// Retries for transport-level RPC failures
    pub rpc_retry_attempts: usize,
    /// RPC requests per second
    pub rate_limit_requests_per_second: u32,
    /// Gateway used for `ipfs://` token URIs
    pub ipfs_gateway: Option<String>,
    /// Capacity of the service's event channel
    pub event_buffer: usize,
}

impl GalleryConfig {
    /// Check the settings every gallery needs.
    pub fn validate(&self) -> Result<()> {
        if self.first_page_size == 0 || self.scroll_page_size == 0 {
            return Err(GalleryError::Config("page sizes must be positive".to_string()));
        }
        if self.metadata_concurrency == 0 {
            return Err(GalleryError::Config("metadata concurrency must be positive".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(GalleryError::Config("event buffer must be positive".to_string()));
        }
        if !(self.scroll_threshold_px >= 0.0) {
            return Err(GalleryError::Config("scroll threshold must be non-negative".to_string()));
        }
        Ok(())
    }

    /// Check the settings needed to read from a chain node and return the
    /// parsed ledger and marketplace contract addresses.
    pub fn validate_chain(&self) -> Result<(Address, Address)> {
        self.validate()?;
        if self.rpc_url.is_empty() {
            return Err(GalleryError::Config("an RPC URL is required".to_string()));
        }
        let ledger = contract_address("ledger", self.ledger_address.as_deref())?;
        let marketplace = contract_address("marketplace", self.marketplace_address.as_deref())?;
        Ok((ledger, marketplace))
    }
}

fn contract_address(role: &str, raw: Option<&str>) -> Result<Address> {
    let raw = raw.ok_or_else(|| GalleryError::Config(format!("a {} contract address is required", role)))?;
    raw.trim()
        .parse()
        .map_err(|e| GalleryError::Config(format!("invalid {} contract address {}: {}", role, raw, e)))
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            ledger_address: None,
            marketplace_address: None,
            first_page_size: 12,
            scroll_page_size: 4,
            scroll_threshold_px: 90.0,
            metadata_cache_entries: 10_000,
            metadata_concurrency: 4,
            http_timeout_seconds: 10,
            rpc_retry_attempts: 2,
            rate_limit_requests_per_second: 20,
            ipfs_gateway: Some("https://ipfs.io/ipfs/".to_string()),
            event_buffer: 64,
        }
    }
}
