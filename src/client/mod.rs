use crate::{
    client::contracts::{Erc721Contract, MarketplaceContract, TxHash},
    models::listing_models::Listing,
    store::ArcListingStore,
    utils::util::{is_valid_address, standardize_address},
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod contracts;
pub mod rpc_contracts;

pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, Error)]
pub enum ClientError {
    /// User-entered address failed validation; the action is aborted before
    /// anything is submitted.
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("account {account} does not own token {token_id}")]
    NotTokenOwner { account: String, token_id: String },

    #[error("listing does not exist or has been canceled by seller")]
    ListingNotFound,

    #[error("rpc transport error: {0}")]
    Rpc(#[from] reqwest::Error),

    #[error("rpc error response: {0}")]
    RpcResponse(String),

    #[error("malformed contract response: {0}")]
    Abi(String),

    #[error("malformed token metadata: {0}")]
    Metadata(String),

    #[error("transaction {0} reverted")]
    TransactionReverted(String),

    #[error("no receipt observed for transaction {0}")]
    ReceiptTimeout(String),
}

/// Token details resolved from the ERC-721 metadata document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub token_uri: String,
    pub name: Option<String>,
    pub image_uri: Option<String>,
}

/// The query-and-act client: reads the projection, reads live contract
/// state, and submits marketplace transactions. One instance per connected
/// account; everything it touches is carried explicitly, no process-wide
/// provider state.
///
/// Live chain state is never reconciled against the projection. After a
/// submitted transaction confirms, callers re-query and pick up the change
/// once the indexer has observed the emitted event.
pub struct MarketplaceClient {
    store: ArcListingStore,
    account: String,
    marketplace_address: String,
    erc721: Arc<dyn Erc721Contract>,
    marketplace: Arc<dyn MarketplaceContract>,
    http: reqwest::Client,
}

impl MarketplaceClient {
    pub fn new(
        store: ArcListingStore,
        account: &str,
        marketplace_address: &str,
        erc721: Arc<dyn Erc721Contract>,
        marketplace: Arc<dyn MarketplaceContract>,
    ) -> Result<Self, ClientError> {
        if !is_valid_address(account) {
            return Err(ClientError::InvalidAddress(account.to_string()));
        }
        if !is_valid_address(marketplace_address) {
            return Err(ClientError::InvalidAddress(marketplace_address.to_string()));
        }
        Ok(Self {
            store,
            account: standardize_address(account),
            marketplace_address: standardize_address(marketplace_address),
            erc721,
            marketplace,
            http: reqwest::Client::new(),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The feed: every listing not yet purchased.
    pub fn active_listings(&self) -> Vec<Listing> {
        self.store
            .read()
            .expect("listing store lock poisoned")
            .active_listings()
    }

    /// Detail lookup by (contract, token). The projection can hold several
    /// sellers for the same token; like the listing page, this takes the
    /// first match.
    pub fn find_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<Option<Listing>, ClientError> {
        if !is_valid_address(nft_address) {
            return Err(ClientError::InvalidAddress(nft_address.to_string()));
        }
        Ok(self
            .store
            .read()
            .expect("listing store lock poisoned")
            .listings_for_token(nft_address, token_id)
            .into_iter()
            .next())
    }

    /// Whether the connected account is the listing's seller.
    pub fn is_seller(&self, listing: &Listing) -> bool {
        standardize_address(&listing.seller) == self.account
    }

    /// Resolves `tokenURI` and fetches the metadata document, rewriting
    /// ipfs:// URIs through an HTTP gateway. Failures here are usually
    /// treated by callers as "not loaded yet".
    pub async fn token_metadata(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<TokenMetadata, ClientError> {
        if !is_valid_address(nft_address) {
            return Err(ClientError::InvalidAddress(nft_address.to_string()));
        }
        let token_uri = rewrite_ipfs_uri(&self.erc721.token_uri(nft_address, token_id).await?);
        let body = self.http.get(&token_uri).send().await?.bytes().await?;
        let document = parse_metadata_document(&body)?;
        Ok(metadata_from_document(token_uri, &document))
    }

    /// Lists a token: validates the address, checks ownership, grants the
    /// marketplace approval when missing, then submits `createListing`.
    /// `price` is in the native token's smallest unit.
    pub async fn create_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        if !is_valid_address(nft_address) {
            return Err(ClientError::InvalidAddress(nft_address.to_string()));
        }

        let owner = self.erc721.owner_of(nft_address, token_id).await?;
        if standardize_address(&owner) != self.account {
            return Err(ClientError::NotTokenOwner {
                account: self.account.clone(),
                token_id: token_id.to_string(),
            });
        }

        let approved = self
            .erc721
            .is_approved_for_all(nft_address, &self.account, &self.marketplace_address)
            .await?;
        if !approved {
            info!(nft_address, "Requesting marketplace approval for NFTs");
            self.erc721
                .set_approval_for_all(nft_address, &self.marketplace_address, true)
                .await?;
        }

        self.marketplace
            .create_listing(nft_address, token_id, price)
            .await
    }

    pub async fn update_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        new_price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        if !is_valid_address(nft_address) {
            return Err(ClientError::InvalidAddress(nft_address.to_string()));
        }
        self.marketplace
            .update_listing(nft_address, token_id, new_price)
            .await
    }

    pub async fn cancel_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        if !is_valid_address(nft_address) {
            return Err(ClientError::InvalidAddress(nft_address.to_string()));
        }
        self.marketplace.cancel_listing(nft_address, token_id).await
    }

    /// Buys the token, sending the listed price as transaction value. The
    /// price comes from the projection, so this fails when no listing is
    /// currently projected for the token.
    pub async fn purchase_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        let listing = self
            .find_listing(nft_address, token_id)?
            .ok_or(ClientError::ListingNotFound)?;
        self.marketplace
            .purchase_listing(nft_address, token_id, &listing.price)
            .await
    }
}

fn rewrite_ipfs_uri(uri: &str) -> String {
    uri.replace("ipfs://", IPFS_GATEWAY)
}

fn parse_metadata_document(body: &[u8]) -> Result<serde_json::Value, ClientError> {
    serde_json::from_slice(body).map_err(|e| ClientError::Metadata(e.to_string()))
}

fn metadata_from_document(token_uri: String, document: &serde_json::Value) -> TokenMetadata {
    let name = document
        .get("name")
        .and_then(|v| v.as_str())
        .map(String::from);
    let image_uri = document
        .get("imageUrl")
        .and_then(|v| v.as_str())
        .map(rewrite_ipfs_uri);
    TokenMetadata {
        token_uri,
        name,
        image_uri,
    }
}
