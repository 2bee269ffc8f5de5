//! Card metadata retrieval: HTTP store plus a CardId-keyed cache.
//!
//! Metadata is immutable once a card is minted, so cached entries never expire;
//! the cache is only bounded in size.

use crate::chain::{MetadataStore, TokenLedger};
use crate::error::{GalleryError, Result};
use crate::types::{CardId, CardMetadata};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches metadata documents over HTTP(S).
pub struct HttpMetadataStore {
    http_client: Client,
}

impl HttpMetadataStore {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GalleryError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    #[instrument(skip(self, card, uri), fields(card = %card, uri = %uri))]
    async fn fetch_metadata(&self, card: CardId, uri: &str) -> Result<CardMetadata> {
        let response = self
            .http_client
            .get(uri)
            .send()
            .await
            .map_err(|e| GalleryError::metadata_fetch(card, e))?;

        if !response.status().is_success() {
            return Err(GalleryError::metadata_fetch(
                card,
                format!("HTTP {}", response.status()),
            ));
        }

        let document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GalleryError::metadata_fetch(card, format!("body is not JSON: {}", e)))?;

        CardMetadata::from_json(card, &document)
    }
}

/// Rewrite `ipfs://` URIs through an HTTP gateway.
pub fn resolve_uri(uri: &str, ipfs_gateway: Option<&str>) -> String {
    match (uri.strip_prefix("ipfs://"), ipfs_gateway) {
        (Some(path), Some(gateway)) => {
            let path = path.trim_start_matches("ipfs/");
            format!("{}/{}", gateway.trim_end_matches('/'), path)
        }
        _ => uri.to_string(),
    }
}

/// Resolves `CardId -> CardMetadata` through the ledger's token URI and the
/// metadata store, remembering every successful lookup.
#[derive(Clone)]
pub struct MetadataCache {
    ledger: Arc<dyn TokenLedger>,
    store: Arc<dyn MetadataStore>,
    cache: Cache<CardId, Arc<CardMetadata>>,
    ipfs_gateway: Option<String>,
}

impl MetadataCache {
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        store: Arc<dyn MetadataStore>,
        max_entries: u64,
        ipfs_gateway: Option<String>,
    ) -> Self {
        Self {
            ledger,
            store,
            cache: Cache::builder().max_capacity(max_entries).build(),
            ipfs_gateway,
        }
    }

    /// Metadata for `card`, fetched on first use.
    #[instrument(skip(self, card), fields(card = %card))]
    pub async fn get(&self, card: CardId) -> Result<Arc<CardMetadata>> {
        if let Some(hit) = self.cache.get(&card).await {
            return Ok(hit);
        }

        let uri = self
            .ledger
            .token_uri(card)
            .await
            .map_err(|e| GalleryError::metadata_fetch(card, format!("tokenURI failed: {}", e)))?;
        let uri = resolve_uri(&uri, self.ipfs_gateway.as_deref());

        let metadata = Arc::new(self.store.fetch_metadata(card, &uri).await?);
        self.cache.insert(card, metadata.clone()).await;
        debug!("Cached metadata for card {}", card);

        Ok(metadata)
    }

    /// Number of cached entries, after flushing pending cache maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{InMemoryLedger, InMemoryMetadataStore};
    use crate::types::AttributeEntry;

    #[test]
    fn test_resolve_ipfs_uri() {
        assert_eq!(
            resolve_uri("ipfs://QmHash/7.json", Some("https://ipfs.io/ipfs/")),
            "https://ipfs.io/ipfs/QmHash/7.json"
        );
        assert_eq!(
            resolve_uri("ipfs://ipfs/QmHash/7.json", Some("https://gw.example/ipfs")),
            "https://gw.example/ipfs/QmHash/7.json"
        );
        assert_eq!(resolve_uri("ipfs://QmHash/7.json", None), "ipfs://QmHash/7.json");
        assert_eq!(
            resolve_uri("https://cards.example/7.json", Some("https://ipfs.io/ipfs/")),
            "https://cards.example/7.json"
        );
    }

    #[tokio::test]
    async fn test_cache_avoids_refetch() {
        let ledger = Arc::new(InMemoryLedger::with_supply(3));
        let store = Arc::new(InMemoryMetadataStore::new());
        store.insert(
            CardId(2),
            CardMetadata {
                attributes: vec![AttributeEntry::new("Paper", "Linen")],
                ..CardMetadata::default()
            },
        );

        let cache = MetadataCache::new(ledger.clone(), store.clone(), 100, None);

        let first = cache.get(CardId(2)).await.unwrap();
        let second = cache.get(CardId(2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(cache.entry_count().await, 1);

        cache.clear();
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_token_uri_failure_is_metadata_fetch_error() {
        let ledger = Arc::new(InMemoryLedger::with_supply(3));
        ledger.set_failing(true);
        let store = Arc::new(InMemoryMetadataStore::new());
        let cache = MetadataCache::new(ledger, store, 100, None);

        let err = cache.get(CardId(1)).await.unwrap_err();
        assert!(matches!(err, GalleryError::MetadataFetch { card: CardId(1), .. }));
    }
}
