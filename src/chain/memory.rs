//! In-memory collaborators for tests and the CLI demo mode.
//!
//! Each one can be switched into a failing state and given artificial latency,
//! which is how the error and cancellation paths of the pipeline get exercised.

use crate::chain::{CardSources, MarketplaceListings, MetadataStore, TokenLedger};
use crate::error::{GalleryError, Result};
use crate::types::{Address, AttributeEntry, CardId, CardMetadata, MarketItem, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared failure switch and latency knob.
#[derive(Default)]
struct Behaviour {
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Behaviour {
    async fn enter(&self, what: &str) -> Result<()> {
        let latency = *lock(&self.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GalleryError::fetch(format!("{}: simulated outage", what)));
        }
        Ok(())
    }
}

/// Token ledger with a fixed supply and explicit ownership lists.
#[derive(Default)]
pub struct InMemoryLedger {
    supply: AtomicU64,
    owners: Mutex<HashMap<Address, Vec<CardId>>>,
    reported_balances: Mutex<HashMap<Address, u64>>,
    uris: Mutex<HashMap<CardId, String>>,
    behaviour: Behaviour,
}

impl InMemoryLedger {
    pub fn with_supply(supply: u64) -> Self {
        let ledger = Self::default();
        ledger.set_supply(supply);
        ledger
    }

    pub fn set_supply(&self, supply: u64) {
        self.supply.store(supply, Ordering::SeqCst);
    }

    /// Replace the tokens `account` owns, in enumeration order.
    pub fn set_owned(&self, account: &Address, cards: Vec<CardId>) {
        lock(&self.owners).insert(*account, cards);
    }

    /// Make `balanceOf` report `balance` for `account` regardless of what it
    /// can enumerate, like a contract whose counters disagree.
    pub fn set_reported_balance(&self, account: &Address, balance: u64) {
        lock(&self.reported_balances).insert(*account, balance);
    }

    pub fn set_uri(&self, card: CardId, uri: impl Into<String>) {
        lock(&self.uris).insert(card, uri.into());
    }

    pub fn set_failing(&self, failing: bool) {
        self.behaviour.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.behaviour.latency) = latency;
    }
}

#[async_trait]
impl TokenLedger for InMemoryLedger {
    async fn total_supply(&self) -> Result<u64> {
        self.behaviour.enter("totalSupply").await?;
        Ok(self.supply.load(Ordering::SeqCst))
    }

    async fn balance_of(&self, account: &Address) -> Result<u64> {
        self.behaviour.enter("balanceOf").await?;
        if let Some(balance) = lock(&self.reported_balances).get(account) {
            return Ok(*balance);
        }
        Ok(lock(&self.owners).get(account).map_or(0, |cards| cards.len() as u64))
    }

    async fn token_of_owner_by_index(&self, account: &Address, index: u64) -> Result<CardId> {
        self.behaviour.enter("tokenOfOwnerByIndex").await?;
        lock(&self.owners)
            .get(account)
            .and_then(|cards| cards.get(index as usize).copied())
            .ok_or_else(|| GalleryError::fetch(format!("owner index {} out of bounds", index)))
    }

    async fn token_uri(&self, card: CardId) -> Result<String> {
        self.behaviour.enter("tokenURI").await?;
        if card.get() == 0 || card.get() > self.supply.load(Ordering::SeqCst) {
            return Err(GalleryError::fetch(format!("card {} does not exist", card)));
        }
        Ok(lock(&self.uris)
            .get(&card)
            .cloned()
            .unwrap_or_else(|| format!("memory://cards/{}.json", card.get())))
    }
}

/// Marketplace holding listings in insertion order.
#[derive(Default)]
pub struct InMemoryMarketplace {
    items: Mutex<Vec<MarketItem>>,
    behaviour: Behaviour,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, card: CardId, seller: &Address, price: U256) {
        lock(&self.items).push(MarketItem {
            token_id: card,
            seller: *seller,
            price,
        });
    }

    pub fn set_failing(&self, failing: bool) {
        self.behaviour.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.behaviour.latency) = latency;
    }
}

#[async_trait]
impl MarketplaceListings for InMemoryMarketplace {
    async fn fetch_available_market_items(&self) -> Result<Vec<MarketItem>> {
        self.behaviour.enter("fetchAvailableMarketItems").await?;
        Ok(lock(&self.items).clone())
    }
}

/// Metadata documents keyed by card, stored as raw JSON.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    documents: Mutex<HashMap<CardId, serde_json::Value>>,
    fetches: AtomicUsize,
    behaviour: Behaviour,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, card: CardId, metadata: CardMetadata) {
        let document = serde_json::to_value(&metadata).unwrap_or(serde_json::Value::Null);
        self.insert_raw(card, document);
    }

    pub fn insert_raw(&self, card: CardId, document: serde_json::Value) {
        lock(&self.documents).insert(card, document);
    }

    /// Number of fetches served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.behaviour.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn fetch_metadata(&self, card: CardId, uri: &str) -> Result<CardMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.behaviour
            .enter(uri)
            .await
            .map_err(|e| GalleryError::metadata_fetch(card, e))?;

        let document = lock(&self.documents)
            .get(&card)
            .cloned()
            .ok_or_else(|| GalleryError::metadata_fetch(card, format!("{} not found", uri)))?;

        CardMetadata::from_json(card, &document)
    }
}

/// A complete in-memory card collection.
#[derive(Clone)]
pub struct InMemoryCollection {
    pub ledger: Arc<InMemoryLedger>,
    pub marketplace: Arc<InMemoryMarketplace>,
    pub store: Arc<InMemoryMetadataStore>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::default()),
            marketplace: Arc::new(InMemoryMarketplace::new()),
            store: Arc::new(InMemoryMetadataStore::new()),
        }
    }

    /// A generated collection of `supply` cards. `owner` holds every fourth
    /// card and lists every other one of those; a second seller lists every
    /// fifth card.
    pub fn demo(supply: u64, owner: &Address) -> Self {
        const SETTINGS: [&str; 4] = ["Beach", "City", "Forest", "Desert"];
        const PAPERS: [&str; 3] = ["Linen", "Matte", "Glossy"];
        const COLORINGS: [&str; 3] = ["Mono", "Pastel", "Neon"];
        const FONTS: [&str; 3] = ["Serif", "Sans", "Script"];
        const LOCATIONS: [&str; 3] = ["Top", "Center", "Bottom"];

        let collection = Self::new();
        collection.ledger.set_supply(supply);
        let other_seller = Address::with_last_byte(0xc0);
        let wei = |finney: u64| U256::from(finney) * U256::from(1_000_000_000_000_000u64);

        let mut owned = Vec::new();
        for id in 1..=supply {
            let i = id as usize;
            let mut attributes = vec![
                AttributeEntry::new("Setting", SETTINGS[i % SETTINGS.len()]),
                AttributeEntry::new("Paper", PAPERS[i % PAPERS.len()]),
                AttributeEntry::new("Coloring", COLORINGS[i % COLORINGS.len()]),
                AttributeEntry::new("Font", FONTS[i % FONTS.len()]),
                AttributeEntry::new("Location", LOCATIONS[i % LOCATIONS.len()]),
            ];
            if id % 3 == 0 {
                attributes.push(AttributeEntry::new("Shadow", "Long"));
            }
            if id % 5 == 0 {
                attributes.push(AttributeEntry::new("Special lettering", "Gold foil"));
            }
            if id % 7 == 0 {
                attributes.push(AttributeEntry::new("Holographic", "yes"));
            }

            collection.store.insert(
                CardId(id),
                CardMetadata {
                    name: Some(format!("Business Card {}", id)),
                    description: None,
                    image: Some(format!("memory://cards/{}.png", id)),
                    attributes,
                },
            );

            if id % 4 == 0 {
                owned.push(CardId(id));
                if id % 8 == 0 {
                    collection.marketplace.list(CardId(id), owner, wei(10 * id));
                }
            } else if id % 5 == 0 {
                collection.marketplace.list(CardId(id), &other_seller, wei(5 * id));
            }
        }
        collection.ledger.set_owned(owner, owned);

        collection
    }

    pub fn sources(&self, cache_entries: u64) -> CardSources {
        CardSources::new(
            self.ledger.clone(),
            self.marketplace.clone(),
            self.store.clone(),
            cache_entries,
            None,
        )
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}
