//! Marketplace listing reads over JSON-RPC.

use crate::chain::rpc::EvmRpcClient;
use crate::chain::MarketplaceListings;
use crate::error::Result;
use crate::types::{Address, CardId, MarketItem};
use alloy_sol_types::sol;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

sol! {
    struct Listing {
        uint256 itemId;
        address nftContract;
        uint256 tokenId;
        address seller;
        address owner;
        uint256 price;
        bool sold;
    }

    function fetchAvailableMarketItems() external view returns (Listing[]);
}

impl TryFrom<Listing> for MarketItem {
    type Error = crate::error::GalleryError;

    fn try_from(listing: Listing) -> Result<Self> {
        Ok(MarketItem {
            token_id: CardId::try_from(listing.tokenId)?,
            seller: listing.seller,
            price: listing.price,
        })
    }
}

/// The marketplace contract holding card listings.
pub struct MarketplaceContract {
    rpc: Arc<EvmRpcClient>,
    contract: Address,
}

impl MarketplaceContract {
    pub fn new(rpc: Arc<EvmRpcClient>, contract: Address) -> Self {
        Self { rpc, contract }
    }
}

fn into_items(listings: Vec<Listing>) -> Result<Vec<MarketItem>> {
    listings.into_iter().map(MarketItem::try_from).collect()
}

#[async_trait]
impl MarketplaceListings for MarketplaceContract {
    #[instrument(skip(self), fields(contract = %self.contract))]
    async fn fetch_available_market_items(&self) -> Result<Vec<MarketItem>> {
        let listings = self
            .rpc
            .call(self.contract, fetchAvailableMarketItemsCall {})
            .await?;
        let items = into_items(listings)?;
        debug!("Marketplace returned {} listings", items.len());
        Ok(items)
    }
}
