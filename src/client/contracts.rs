use crate::client::ClientError;
use bigdecimal::BigDecimal;

pub type TxHash = String;

/// Read/write access to an ERC-721 contract, addressed per call since the
/// marketplace spans arbitrary NFT contracts.
#[async_trait::async_trait]
pub trait Erc721Contract: Send + Sync {
    async fn token_uri(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<String, ClientError>;

    async fn owner_of(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<String, ClientError>;

    async fn is_approved_for_all(
        &self,
        nft_address: &str,
        owner: &str,
        operator: &str,
    ) -> Result<bool, ClientError>;

    async fn set_approval_for_all(
        &self,
        nft_address: &str,
        operator: &str,
        approved: bool,
    ) -> Result<TxHash, ClientError>;
}

/// The marketplace contract's state-changing surface. Every call submits a
/// transaction; the resulting event flows back through the indexer.
#[async_trait::async_trait]
pub trait MarketplaceContract: Send + Sync {
    async fn create_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        price: &BigDecimal,
    ) -> Result<TxHash, ClientError>;

    async fn update_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        new_price: &BigDecimal,
    ) -> Result<TxHash, ClientError>;

    async fn cancel_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<TxHash, ClientError>;

    /// `value` is the native-token amount sent with the transaction.
    async fn purchase_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        value: &BigDecimal,
    ) -> Result<TxHash, ClientError>;
}
