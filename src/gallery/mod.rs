//! Gallery module - resolves which business cards a gallery shows and
//! serves them page by page.
//!
//! The pipeline is mode resolution, candidate fetching, attribute filtering
//! and incremental loading, driven by [`GalleryEvent`]s either directly
//! through [`Gallery::dispatch`] or through a [`GalleryService`].

pub mod types;
pub mod mode;
pub mod fetcher;
pub mod filter;
pub mod loader;
pub mod state;
pub mod controller;

pub use controller::{channel, Commit, Cycle, Gallery, GalleryHandle, GalleryService};
pub use fetcher::CardSetFetcher;
pub use filter::{AttributeFilterEngine, CommonTrait, FilterQuery};
pub use loader::{IncrementalLoader, ScrollPosition, ScrollSubscription};
pub use mode::ViewModeResolver;
pub use state::{Action, GalleryEvent, GalleryState, ModeSwitch};
pub use types::{CandidateSet, GalleryConfig, GallerySnapshot, LoadedCard, LoadedPage, ViewMode};

use crate::chain::memory::InMemoryCollection;
use crate::chain::{
    CardSources, Erc721Ledger, EvmRpcClient, HttpMetadataStore, MarketplaceContract,
};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Gallery builder for convenient construction with sensible defaults.
pub struct GalleryBuilder {
    config: GalleryConfig,
}

impl GalleryBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: GalleryConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: GalleryConfig) -> Self {
        Self { config }
    }

    /// Set the chain node endpoint.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = url.into();
        self
    }

    /// Set the card ledger and marketplace contracts.
    pub fn with_contracts(mut self, ledger: impl Into<String>, marketplace: impl Into<String>) -> Self {
        self.config.ledger_address = Some(ledger.into());
        self.config.marketplace_address = Some(marketplace.into());
        self
    }

    pub fn with_page_sizes(mut self, first_page: usize, scroll_page: usize) -> Self {
        self.config.first_page_size = first_page;
        self.config.scroll_page_size = scroll_page;
        self
    }

    pub fn with_scroll_threshold(mut self, pixels: f64) -> Self {
        self.config.scroll_threshold_px = pixels;
        self
    }

    /// Set max cached metadata documents.
    pub fn with_metadata_cache(mut self, max_entries: u64) -> Self {
        self.config.metadata_cache_entries = max_entries;
        self
    }

    pub fn with_metadata_concurrency(mut self, concurrency: usize) -> Self {
        self.config.metadata_concurrency = concurrency;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.config.http_timeout_seconds = seconds;
        self
    }

    pub fn with_rpc_retries(mut self, attempts: usize) -> Self {
        self.config.rpc_retry_attempts = attempts;
        self
    }

    /// Set rate limiting.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.config.rate_limit_requests_per_second = requests_per_second;
        self
    }

    /// Set the gateway for `ipfs://` token URIs, or `None` to fetch them as-is.
    pub fn with_ipfs_gateway(mut self, gateway: Option<String>) -> Self {
        self.config.ipfs_gateway = gateway;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    /// Build the gallery configuration.
    pub fn build_config(self) -> GalleryConfig {
        self.config
    }

    /// Build a gallery over already constructed collaborators.
    pub fn build(self, sources: CardSources) -> Result<Gallery> {
        self.config.validate()?;
        Ok(Gallery::new(sources, &self.config))
    }

    /// Build a gallery over an in-memory collection.
    pub fn build_in_memory(self, collection: &InMemoryCollection) -> Result<Gallery> {
        let sources = collection.sources(self.config.metadata_cache_entries);
        self.build(sources)
    }

    /// Build a gallery reading from the configured chain node.
    pub fn connect(self) -> Result<Gallery> {
        let config = &self.config;
        let (ledger_address, marketplace_address) = config.validate_chain()?;

        let timeout = Duration::from_secs(config.http_timeout_seconds);
        let rpc = Arc::new(EvmRpcClient::new(
            config.rpc_url.clone(),
            timeout,
            config.rate_limit_requests_per_second,
            config.rpc_retry_attempts,
        )?);
        info!("Connecting gallery to {}", rpc.url());

        let ledger = Arc::new(Erc721Ledger::new(rpc.clone(), ledger_address));
        let marketplace = Arc::new(MarketplaceContract::new(rpc, marketplace_address));
        let store = Arc::new(HttpMetadataStore::new(timeout)?);

        let sources = CardSources::new(
            ledger,
            marketplace,
            store,
            config.metadata_cache_entries,
            config.ipfs_gateway.clone(),
        );
        self.build(sources)
    }

    /// Build a service and its handle over already constructed collaborators.
    pub fn build_service(self, sources: CardSources) -> Result<(GalleryService, GalleryHandle)> {
        let capacity = self.config.event_buffer;
        let gallery = self.build(sources)?;
        Ok(channel(gallery, capacity))
    }
}

impl Default for GalleryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
