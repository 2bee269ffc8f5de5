//! Page-wise materialization of a resolved candidate set.

use crate::chain::MetadataCache;
use crate::error::Result;
use crate::gallery::state::GalleryEvent;
use crate::gallery::types::{CandidateSet, LoadedCard};
use futures::future::try_join_all;
use std::ops::Range;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Exposes a candidate set in fixed-size pages.
#[derive(Clone)]
pub struct IncrementalLoader {
    metadata: MetadataCache,
    first_page_size: usize,
    scroll_page_size: usize,
}

impl IncrementalLoader {
    pub fn new(metadata: MetadataCache, first_page_size: usize, scroll_page_size: usize) -> Self {
        Self {
            metadata,
            first_page_size,
            scroll_page_size,
        }
    }

    /// Page size used right after a new candidate set is committed.
    pub fn first_page_size(&self) -> usize {
        self.first_page_size
    }

    /// Page size used for each scroll-threshold event.
    pub fn scroll_page_size(&self) -> usize {
        self.scroll_page_size
    }

    /// Indices of the next page: at most `page_size` cards starting at
    /// `loaded`, never past `total`.
    pub fn window(total: usize, loaded: usize, page_size: usize) -> Range<usize> {
        let start = loaded.min(total);
        let end = start + page_size.min(total - start);
        start..end
    }

    /// Materialize the next page of `candidates` after the first `loaded_len`
    /// cards. Returns an empty page once the set is exhausted.
    #[instrument(skip(self, candidates), fields(total = candidates.len()))]
    pub async fn load_more(
        &self,
        candidates: &CandidateSet,
        loaded_len: usize,
        page_size: usize,
    ) -> Result<Vec<LoadedCard>> {
        let window = Self::window(candidates.len(), loaded_len, page_size);
        if window.is_empty() {
            debug!("Nothing left to load");
            return Ok(Vec::new());
        }

        let page = &candidates.cards()[window];
        let loaded = try_join_all(page.iter().map(|card| async move {
            let metadata = self.metadata.get(*card).await?;
            Ok::<_, crate::error::GalleryError>(LoadedCard {
                id: *card,
                metadata,
                listing: candidates.listing(*card).cloned(),
            })
        }))
        .await?;

        debug!("Loaded {} cards", loaded.len());
        Ok(loaded)
    }
}

/// Scroll geometry reported by the presentation layer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub viewport_height: f64,
    pub scroll_y: f64,
    pub content_height: f64,
}

impl ScrollPosition {
    pub fn new(viewport_height: f64, scroll_y: f64, content_height: f64) -> Self {
        Self {
            viewport_height,
            scroll_y,
            content_height,
        }
    }

    /// The viewport bottom is within `threshold` of the content bottom.
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.viewport_height + self.scroll_y >= self.content_height - threshold
    }
}

/// A scroll listener bound to one gallery's event channel.
///
/// Dropping the subscription (or calling [`ScrollSubscription::dispose`])
/// detaches it; nothing else keeps a reference to it.
#[derive(Debug)]
pub struct ScrollSubscription {
    events: mpsc::Sender<GalleryEvent>,
    threshold: f64,
}

impl ScrollSubscription {
    pub(crate) fn new(events: mpsc::Sender<GalleryEvent>, threshold: f64) -> Self {
        Self { events, threshold }
    }

    /// Report a scroll position. Returns whether a threshold event was
    /// delivered; events that find the channel full are dropped.
    pub fn report(&self, position: ScrollPosition) -> bool {
        if !position.near_bottom(self.threshold) {
            return false;
        }
        self.events.try_send(GalleryEvent::ScrollThreshold).is_ok()
    }

    /// The gallery behind this subscription is still running.
    pub fn is_active(&self) -> bool {
        !self.events.is_closed()
    }

    pub fn dispose(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::InMemoryCollection;
    use crate::error::GalleryError;
    use crate::types::{Address, CardId};

    fn loader(collection: &InMemoryCollection) -> IncrementalLoader {
        IncrementalLoader::new(collection.sources(100).metadata, 12, 4)
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(IncrementalLoader::window(5, 0, 12), 0..5);
        assert_eq!(IncrementalLoader::window(20, 12, 4), 12..16);
        assert_eq!(IncrementalLoader::window(14, 12, 4), 12..14);
        assert!(IncrementalLoader::window(5, 5, 4).is_empty());
        assert!(IncrementalLoader::window(5, 9, 4).is_empty());
    }

    #[tokio::test]
    async fn test_first_page_then_exhausted() {
        let owner = Address::with_last_byte(0xa1);
        let collection = InMemoryCollection::demo(5, &owner);
        let loader = loader(&collection);
        let candidates = CandidateSet::from_cards((1..=5).rev().map(CardId));

        let first = loader.load_more(&candidates, 0, 12).await.unwrap();
        let ids: Vec<_> = first.iter().map(|card| card.id).collect();
        assert_eq!(ids, vec![CardId(5), CardId(4), CardId(3), CardId(2), CardId(1)]);

        let fetches = collection.store.fetch_count();
        let second = loader.load_more(&candidates, first.len(), 12).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(collection.store.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn test_scroll_pages_continue_from_cursor() {
        let owner = Address::with_last_byte(0xa1);
        let collection = InMemoryCollection::demo(10, &owner);
        let loader = loader(&collection);
        let candidates = CandidateSet::from_cards((1..=10).rev().map(CardId));

        let page = loader.load_more(&candidates, 4, 4).await.unwrap();
        let ids: Vec<_> = page.iter().map(|card| card.id).collect();

        assert_eq!(ids, vec![CardId(6), CardId(5), CardId(4), CardId(3)]);
    }

    #[tokio::test]
    async fn test_listing_attached() {
        let owner = Address::with_last_byte(0xa1);
        let collection = InMemoryCollection::demo(8, &owner);
        let loader = loader(&collection);
        let listings = vec![crate::types::MarketItem {
            token_id: CardId(8),
            seller: owner,
            price: crate::types::U256::from(42u64),
        }];
        let candidates = CandidateSet::from_listings(listings);

        let page = loader.load_more(&candidates, 0, 12).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].listing.as_ref().map(|item| item.price), Some(crate::types::U256::from(42u64)));
    }

    #[tokio::test]
    async fn test_missing_metadata_fails_page() {
        let collection = InMemoryCollection::new();
        collection.ledger.set_supply(2);
        let loader = loader(&collection);
        let candidates = CandidateSet::from_cards([CardId(2), CardId(1)]);

        let err = loader.load_more(&candidates, 0, 12).await.unwrap_err();
        assert!(matches!(err, GalleryError::MetadataFetch { .. }));
    }

    #[test]
    fn test_near_bottom() {
        assert!(ScrollPosition::new(800.0, 1110.0, 2000.0).near_bottom(90.0));
        assert!(!ScrollPosition::new(800.0, 1100.0, 2000.0).near_bottom(90.0));
        assert!(ScrollPosition::new(800.0, 0.0, 500.0).near_bottom(90.0));
    }

    #[tokio::test]
    async fn test_subscription_reports_and_detaches() {
        let (tx, mut rx) = mpsc::channel(1);
        let subscription = ScrollSubscription::new(tx, 90.0);

        assert!(!subscription.report(ScrollPosition::new(800.0, 0.0, 2000.0)));
        assert!(subscription.report(ScrollPosition::new(800.0, 1200.0, 2000.0)));
        // Channel full: the second trigger is dropped, not queued.
        assert!(!subscription.report(ScrollPosition::new(800.0, 1200.0, 2000.0)));
        assert_eq!(rx.recv().await, Some(GalleryEvent::ScrollThreshold));

        subscription.dispose();
        assert_eq!(rx.recv().await, None);
    }
}
