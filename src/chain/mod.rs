//! Chain collaborators - read-only access to the card ledger, the marketplace and
//! the off-chain metadata store.
//!
//! The gallery only ever talks to these through the traits below. Concrete
//! implementations cover an EVM JSON-RPC node, an HTTP metadata host and an
//! in-memory collection used by tests and the demo mode of the CLI.

pub mod rate_limit;
pub mod rpc;
pub mod ledger;
pub mod marketplace;
pub mod metadata;
pub mod memory;

use crate::error::Result;
use crate::types::{Address, CardId, CardMetadata, MarketItem};
use async_trait::async_trait;
use std::sync::Arc;

pub use ledger::Erc721Ledger;
pub use marketplace::MarketplaceContract;
pub use metadata::{HttpMetadataStore, MetadataCache};
pub use memory::{InMemoryLedger, InMemoryMarketplace, InMemoryMetadataStore};
pub use rpc::EvmRpcClient;

/// Token enumeration contract (ERC-721 Enumerable).
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn total_supply(&self) -> Result<u64>;

    async fn balance_of(&self, account: &Address) -> Result<u64>;

    async fn token_of_owner_by_index(&self, account: &Address, index: u64) -> Result<CardId>;

    async fn token_uri(&self, card: CardId) -> Result<String>;
}

/// Marketplace listing contract.
#[async_trait]
pub trait MarketplaceListings: Send + Sync {
    /// Currently available listings, in the order the contract stores them.
    async fn fetch_available_market_items(&self) -> Result<Vec<MarketItem>>;
}

/// Off-chain metadata host reachable through the token URI.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn fetch_metadata(&self, card: CardId, uri: &str) -> Result<CardMetadata>;
}

/// The collaborators one gallery instance reads from.
#[derive(Clone)]
pub struct CardSources {
    pub ledger: Arc<dyn TokenLedger>,
    pub marketplace: Arc<dyn MarketplaceListings>,
    pub metadata: MetadataCache,
}

impl CardSources {
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        marketplace: Arc<dyn MarketplaceListings>,
        store: Arc<dyn MetadataStore>,
        cache_entries: u64,
        ipfs_gateway: Option<String>,
    ) -> Self {
        let metadata = MetadataCache::new(ledger.clone(), store, cache_entries, ipfs_gateway);
        Self {
            ledger,
            marketplace,
            metadata,
        }
    }
}
