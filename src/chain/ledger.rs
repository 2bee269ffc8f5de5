//! ERC-721 Enumerable ledger reads over JSON-RPC.

use crate::chain::rpc::EvmRpcClient;
use crate::chain::TokenLedger;
use crate::error::{GalleryError, Result};
use crate::types::{Address, CardId, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

sol! {
    function totalSupply() external view returns (uint256);
    function balanceOf(address owner) external view returns (uint256);
    function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
    function tokenURI(uint256 tokenId) external view returns (string);
}

/// The business card token contract.
pub struct Erc721Ledger {
    rpc: Arc<EvmRpcClient>,
    contract: Address,
}

impl Erc721Ledger {
    pub fn new(rpc: Arc<EvmRpcClient>, contract: Address) -> Self {
        Self { rpc, contract }
    }
}

fn count(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| GalleryError::fetch(format!("{} {} does not fit in 64 bits", what, value)))
}

#[async_trait]
impl TokenLedger for Erc721Ledger {
    #[instrument(skip(self))]
    async fn total_supply(&self) -> Result<u64> {
        let supply = self.rpc.call(self.contract, totalSupplyCall {}).await?;
        count(supply, "total supply")
    }

    #[instrument(skip(self))]
    async fn balance_of(&self, account: &Address) -> Result<u64> {
        let balance = self
            .rpc
            .call(self.contract, balanceOfCall { owner: *account })
            .await?;
        count(balance, "balance")
    }

    #[instrument(skip(self))]
    async fn token_of_owner_by_index(&self, account: &Address, index: u64) -> Result<CardId> {
        let call = tokenOfOwnerByIndexCall {
            owner: *account,
            index: U256::from(index),
        };
        CardId::try_from(self.rpc.call(self.contract, call).await?)
    }

    #[instrument(skip(self))]
    async fn token_uri(&self, card: CardId) -> Result<String> {
        self.rpc
            .call(self.contract, tokenURICall { tokenId: card.into() })
            .await
    }
}
