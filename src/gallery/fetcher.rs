//! Candidate set resolution against the ledger and marketplace.

use crate::chain::{MarketplaceListings, TokenLedger};
use crate::error::{GalleryError, Result};
use crate::gallery::types::{CandidateSet, ViewMode};
use crate::types::{Address, CardId};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Produces the full, newest-first candidate list for a view mode.
#[derive(Clone)]
pub struct CardSetFetcher {
    ledger: Arc<dyn TokenLedger>,
    marketplace: Arc<dyn MarketplaceListings>,
}

impl CardSetFetcher {
    pub fn new(ledger: Arc<dyn TokenLedger>, marketplace: Arc<dyn MarketplaceListings>) -> Self {
        Self { ledger, marketplace }
    }

    #[instrument(skip(self, account))]
    pub async fn fetch(&self, mode: ViewMode, account: Option<&Address>) -> Result<CandidateSet> {
        let candidates = match mode {
            ViewMode::All => self.fetch_all().await?,
            ViewMode::Owned => self.fetch_owned(required_account(mode, account)?).await?,
            ViewMode::Marketplace => self.fetch_listings(None).await?,
            ViewMode::OwnedListings => {
                self.fetch_listings(Some(required_account(mode, account)?)).await?
            }
        };

        info!("Resolved {} candidates for {} view", candidates.len(), mode);
        Ok(candidates)
    }

    async fn fetch_all(&self) -> Result<CandidateSet> {
        let supply = self.ledger.total_supply().await?;
        Ok(CandidateSet::from_cards((1..=supply).rev().map(CardId)))
    }

    async fn fetch_owned(&self, account: &Address) -> Result<CandidateSet> {
        let balance = self.ledger.balance_of(account).await?;
        debug!("Account {} holds {} cards", account, balance);

        // The balance is chain-reported; enumeration grows the list only as far
        // as the ledger actually answers.
        let mut owned = Vec::new();
        for index in 0..balance {
            owned.push(self.ledger.token_of_owner_by_index(account, index).await?);
        }

        // Enumeration order is acquisition order; show the latest first.
        Ok(CandidateSet::from_cards(owned.into_iter().rev()))
    }

    async fn fetch_listings(&self, seller: Option<&Address>) -> Result<CandidateSet> {
        let items = self.marketplace.fetch_available_market_items().await?;
        let total = items.len();

        let selected: Vec<_> = items
            .into_iter()
            .filter(|item| seller.map_or(true, |account| item.seller == *account))
            .collect();

        if seller.is_some() {
            debug!("{} of {} listings belong to the account", selected.len(), total);
        }

        Ok(CandidateSet::from_listings(selected.into_iter().rev()))
    }
}

fn required_account(mode: ViewMode, account: Option<&Address>) -> Result<&Address> {
    account.ok_or_else(|| GalleryError::fetch(format!("{} view requires a connected account", mode)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{InMemoryLedger, InMemoryMarketplace};

    use crate::types::U256;

    const ALICE: &str = "0x00000000000000000000000000000000000000a1";

    fn alice() -> Address {
        ALICE.parse().unwrap()
    }

    fn fixture() -> (Arc<InMemoryLedger>, Arc<InMemoryMarketplace>, CardSetFetcher) {
        let ledger = Arc::new(InMemoryLedger::with_supply(5));
        let marketplace = Arc::new(InMemoryMarketplace::new());
        let fetcher = CardSetFetcher::new(ledger.clone(), marketplace.clone());
        (ledger, marketplace, fetcher)
    }

    #[tokio::test]
    async fn test_all_is_newest_first() {
        let (_, _, fetcher) = fixture();

        let set = fetcher.fetch(ViewMode::All, None).await.unwrap();

        assert_eq!(set.cards(), &[CardId(5), CardId(4), CardId(3), CardId(2), CardId(1)]);
    }

    #[tokio::test]
    async fn test_all_with_empty_supply() {
        let (ledger, _, fetcher) = fixture();
        ledger.set_supply(0);

        assert!(fetcher.fetch(ViewMode::All, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owned_reverses_enumeration() {
        let (ledger, _, fetcher) = fixture();
        let alice = alice();
        ledger.set_owned(&alice, vec![CardId(2), CardId(5), CardId(3)]);

        let set = fetcher.fetch(ViewMode::Owned, Some(&alice)).await.unwrap();

        assert_eq!(set.cards(), &[CardId(3), CardId(5), CardId(2)]);
    }

    #[tokio::test]
    async fn test_owned_without_account_fails() {
        let (_, _, fetcher) = fixture();

        let err = fetcher.fetch(ViewMode::Owned, None).await.unwrap_err();
        assert!(matches!(err, GalleryError::Fetch(_)));

        let err = fetcher.fetch(ViewMode::OwnedListings, None).await.unwrap_err();
        assert!(matches!(err, GalleryError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_owned_listings_subset_of_marketplace() {
        let (_, marketplace, fetcher) = fixture();
        let alice = alice();
        let bob = Address::with_last_byte(0xb0);
        marketplace.list(CardId(1), &alice, U256::from(10u64));
        marketplace.list(CardId(4), &bob, U256::from(20u64));
        marketplace.list(CardId(2), &alice, U256::from(30u64));

        let all = fetcher.fetch(ViewMode::Marketplace, None).await.unwrap();
        // Checksummed casing must still match.
        let upper: Address = ALICE.to_uppercase().replace("0X", "0x").parse().unwrap();
        let mine = fetcher.fetch(ViewMode::OwnedListings, Some(&upper)).await.unwrap();

        assert_eq!(all.cards(), &[CardId(2), CardId(4), CardId(1)]);
        assert_eq!(mine.cards(), &[CardId(2), CardId(1)]);
        for card in mine.cards() {
            assert!(all.cards().contains(card));
            assert_eq!(mine.listing(*card).unwrap().seller, alice);
        }
    }

    #[tokio::test]
    async fn test_owned_with_inflated_balance_fails_cleanly() {
        let (ledger, _, fetcher) = fixture();
        let alice = alice();
        ledger.set_owned(&alice, vec![CardId(2)]);
        ledger.set_reported_balance(&alice, u64::MAX);

        let err = fetcher.fetch(ViewMode::Owned, Some(&alice)).await.unwrap_err();

        assert!(matches!(err, GalleryError::Fetch(msg) if msg.contains("out of bounds")));
    }

    #[tokio::test]
    async fn test_ledger_failure_is_fetch_error() {
        let (ledger, _, fetcher) = fixture();
        ledger.set_failing(true);

        let err = fetcher.fetch(ViewMode::All, None).await.unwrap_err();
        assert!(matches!(err, GalleryError::Fetch(_)));
    }
}
