use assert_json_diff::assert_json_eq;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use nft_marketplace_indexer::{
    client::{
        contracts::{Erc721Contract, MarketplaceContract, TxHash},
        ClientError, MarketplaceClient,
    },
    config::{
        marketplace_config::NFTMarketplaceConfig, EventStreamConfig, IndexerProcessorConfig,
    },
    models::listing_models::{Listing, ListingCreated},
    processor::Processor,
    store::new_listing_store,
    stream::{BlockEvents, ContractLog, StaticEventStream},
    utils::util::{address_to_word, event_topic, u256_to_word},
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const MARKETPLACE: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const NFT: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
const SELLER: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";
const OTHER_SELLER: &str = "0x15d34aaf54267db7d7c367839aaf71a00a2c6a65";
const BUYER: &str = "0x9965507d1a55bcc2695c58ba16fb37d819b0a4dc";

// Configuration helper functions
fn indexer_config() -> IndexerProcessorConfig {
    serde_yaml::from_str(&format!(
        r#"
        event_stream_config:
          rpc_url: "http://localhost:8545"
          starting_block: 0
          ending_block: null
        channel_size: 4
        nft_marketplace_config:
          name: test_marketplace
          contract_address: "{MARKETPLACE}"
        "#
    ))
    .expect("Failed to parse test config")
}

// Log encoding helper functions
fn encoded_log(signature: &str, words: Vec<[u8; 32]>, block_number: u64, log_index: u64) -> ContractLog {
    ContractLog {
        address: MARKETPLACE.to_string(),
        topics: vec![event_topic(signature)],
        data: words.concat(),
        block_number,
        log_index,
    }
}

fn created_log(nft: &str, token: u64, seller: &str, price: u64, block: u64, index: u64) -> ContractLog {
    encoded_log(
        "ListingCreated(address,uint256,address,uint256)",
        vec![
            address_to_word(nft).unwrap(),
            u256_to_word(&BigDecimal::from(token)).unwrap(),
            address_to_word(seller).unwrap(),
            u256_to_word(&BigDecimal::from(price)).unwrap(),
        ],
        block,
        index,
    )
}

fn canceled_log(nft: &str, token: u64, seller: &str, block: u64, index: u64) -> ContractLog {
    encoded_log(
        "ListingCanceled(address,uint256,address)",
        vec![
            address_to_word(nft).unwrap(),
            u256_to_word(&BigDecimal::from(token)).unwrap(),
            address_to_word(seller).unwrap(),
        ],
        block,
        index,
    )
}

fn purchased_log(
    nft: &str,
    token: u64,
    seller: &str,
    buyer: &str,
    block: u64,
    index: u64,
) -> ContractLog {
    encoded_log(
        "ListingPurchased(address,uint256,address,address)",
        vec![
            address_to_word(nft).unwrap(),
            u256_to_word(&BigDecimal::from(token)).unwrap(),
            address_to_word(seller).unwrap(),
            address_to_word(buyer).unwrap(),
        ],
        block,
        index,
    )
}

fn updated_log(nft: &str, token: u64, seller: &str, new_price: u64, block: u64, index: u64) -> ContractLog {
    encoded_log(
        "ListingUpdated(address,uint256,address,uint256)",
        vec![
            address_to_word(nft).unwrap(),
            u256_to_word(&BigDecimal::from(token)).unwrap(),
            address_to_word(seller).unwrap(),
            u256_to_word(&BigDecimal::from(new_price)).unwrap(),
        ],
        block,
        index,
    )
}

fn block(block_number: u64, logs: Vec<ContractLog>) -> BlockEvents {
    BlockEvents {
        block_number,
        block_timestamp: NaiveDateTime::default(),
        logs,
    }
}

async fn run_blocks(blocks: Vec<BlockEvents>) -> Processor {
    let processor = Processor::new(indexer_config());
    processor
        .run_with_stream(Box::new(StaticEventStream::from_blocks(blocks)))
        .await
        .expect("Processor run failed");
    processor
}

#[tokio::test]
async fn processor_projects_full_listing_lifecycle() {
    let processor = run_blocks(vec![
        block(
            1,
            vec![
                created_log(NFT, 1, SELLER, 100, 1, 0),
                created_log(NFT, 2, SELLER, 250, 1, 1),
            ],
        ),
        block(2, vec![]),
        block(
            3,
            vec![
                updated_log(NFT, 1, SELLER, 50, 3, 0),
                purchased_log(NFT, 2, SELLER, BUYER, 3, 1),
            ],
        ),
        block(4, vec![canceled_log(NFT, 2, SELLER, 4, 0)]),
    ])
    .await;

    let store = processor.store();
    let store = store.read().unwrap();

    assert_eq!(store.last_processed_block(), Some(4));
    assert_eq!(store.activities().len(), 5);

    // token 2 was canceled outright; token 1 remains with its updated price
    let expected = json!([
        {
            "id": format!("{NFT}-1-{SELLER}"),
            "nft_address": NFT,
            "token_id": "1",
            "seller": SELLER,
            "price": "50",
            "buyer": null,
        }
    ]);
    assert_json_eq!(serde_json::to_value(store.all_listings()).unwrap(), expected);
}

#[tokio::test]
async fn purchase_hides_listing_from_feed_and_cancel_removes_it() {
    let processor = run_blocks(vec![
        block(1, vec![created_log(NFT, 1, SELLER, 100, 1, 0)]),
        block(2, vec![purchased_log(NFT, 1, SELLER, BUYER, 2, 0)]),
    ])
    .await;

    let store = processor.store();
    {
        let store = store.read().unwrap();
        assert!(store.active_listings().is_empty());
        let remaining = store.all_listings();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].buyer.as_deref(), Some(BUYER));
        assert_eq!(remaining[0].price, BigDecimal::from(100));
    }

    // Replaying the tail with a cancel fully removes the sold listing.
    let processor = run_blocks(vec![
        block(1, vec![created_log(NFT, 1, SELLER, 100, 1, 0)]),
        block(2, vec![purchased_log(NFT, 1, SELLER, BUYER, 2, 0)]),
        block(3, vec![canceled_log(NFT, 1, SELLER, 3, 0)]),
    ])
    .await;
    assert!(processor.store().read().unwrap().is_empty());
}

#[tokio::test]
async fn orphan_mutations_leave_the_store_empty() {
    let processor = run_blocks(vec![block(
        1,
        vec![
            updated_log(NFT, 9, SELLER, 50, 1, 0),
            purchased_log(NFT, 9, SELLER, BUYER, 1, 1),
            canceled_log(NFT, 9, SELLER, 1, 2),
        ],
    )])
    .await;

    let store = processor.store();
    let store = store.read().unwrap();
    assert!(store.is_empty());
    // the events still land in the activity log
    assert_eq!(store.activities().len(), 3);
}

#[tokio::test]
async fn quiet_blocks_still_advance_the_watermark() {
    let processor = run_blocks(vec![
        block(1, vec![created_log(NFT, 1, SELLER, 100, 1, 0)]),
        block(9, vec![]),
    ])
    .await;

    let store = processor.store();
    let store = store.read().unwrap();
    assert_eq!(store.last_processed_block(), Some(9));
    // the empty block changes nothing in the projection itself
    assert_eq!(store.active_listings().len(), 1);
    assert_eq!(store.activities().len(), 1);
}

#[tokio::test]
async fn same_token_different_sellers_are_distinct_listings() {
    let processor = run_blocks(vec![block(
        1,
        vec![
            created_log(NFT, 1, SELLER, 100, 1, 0),
            created_log(NFT, 1, OTHER_SELLER, 120, 1, 1),
        ],
    )])
    .await;

    let store = processor.store();
    let store = store.read().unwrap();
    assert_eq!(store.active_listings().len(), 2);
    assert_eq!(
        store.listings_for_token(NFT, &BigDecimal::from(1)).len(),
        2
    );
}

// Client test doubles

#[derive(Default)]
struct MockErc721 {
    owner: String,
    approved: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Erc721Contract for MockErc721 {
    async fn token_uri(&self, _nft: &str, token_id: &BigDecimal) -> Result<String, ClientError> {
        Ok(format!("ipfs://Qmtest/{token_id}.json"))
    }

    async fn owner_of(&self, _nft: &str, _token_id: &BigDecimal) -> Result<String, ClientError> {
        Ok(self.owner.clone())
    }

    async fn is_approved_for_all(
        &self,
        _nft: &str,
        _owner: &str,
        _operator: &str,
    ) -> Result<bool, ClientError> {
        Ok(*self.approved.lock().unwrap())
    }

    async fn set_approval_for_all(
        &self,
        _nft: &str,
        operator: &str,
        approved: bool,
    ) -> Result<TxHash, ClientError> {
        *self.approved.lock().unwrap() = approved;
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_approval_for_all({operator},{approved})"));
        Ok("0xapproval".to_string())
    }
}

#[derive(Default)]
struct MockMarketplace {
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl MarketplaceContract for MockMarketplace {
    async fn create_listing(
        &self,
        nft: &str,
        token_id: &BigDecimal,
        price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create_listing({nft},{token_id},{price})"));
        Ok("0xcreate".to_string())
    }

    async fn update_listing(
        &self,
        nft: &str,
        token_id: &BigDecimal,
        new_price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update_listing({nft},{token_id},{new_price})"));
        Ok("0xupdate".to_string())
    }

    async fn cancel_listing(
        &self,
        nft: &str,
        token_id: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("cancel_listing({nft},{token_id})"));
        Ok("0xcancel".to_string())
    }

    async fn purchase_listing(
        &self,
        nft: &str,
        token_id: &BigDecimal,
        value: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("purchase_listing({nft},{token_id},{value})"));
        Ok("0xpurchase".to_string())
    }
}

fn client_with_mocks(
    account: &str,
    erc721: Arc<MockErc721>,
    marketplace: Arc<MockMarketplace>,
) -> MarketplaceClient {
    MarketplaceClient::new(
        new_listing_store(),
        account,
        MARKETPLACE,
        erc721,
        marketplace,
    )
    .unwrap()
}

#[tokio::test]
async fn create_listing_requests_approval_when_missing() {
    let erc721 = Arc::new(MockErc721 {
        owner: SELLER.to_string(),
        ..Default::default()
    });
    let marketplace = Arc::new(MockMarketplace::default());
    let client = client_with_mocks(SELLER, erc721.clone(), marketplace.clone());

    let tx = client
        .create_listing(NFT, &BigDecimal::from(1), &BigDecimal::from(100))
        .await
        .unwrap();
    assert_eq!(tx, "0xcreate");

    let erc_calls = erc721.calls.lock().unwrap().clone();
    assert_eq!(
        erc_calls,
        vec![format!("set_approval_for_all({MARKETPLACE},true)")]
    );
    let market_calls = marketplace.calls.lock().unwrap().clone();
    assert_eq!(market_calls, vec![format!("create_listing({NFT},1,100)")]);
}

#[tokio::test]
async fn create_listing_skips_approval_when_already_granted() {
    let erc721 = Arc::new(MockErc721 {
        owner: SELLER.to_string(),
        approved: Mutex::new(true),
        ..Default::default()
    });
    let marketplace = Arc::new(MockMarketplace::default());
    let client = client_with_mocks(SELLER, erc721.clone(), marketplace);

    client
        .create_listing(NFT, &BigDecimal::from(1), &BigDecimal::from(100))
        .await
        .unwrap();
    assert!(erc721.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_listing_rejects_malformed_address_before_submitting() {
    let erc721 = Arc::new(MockErc721::default());
    let marketplace = Arc::new(MockMarketplace::default());
    let client = client_with_mocks(SELLER, erc721, marketplace.clone());

    let result = client
        .create_listing("0x123", &BigDecimal::from(1), &BigDecimal::from(100))
        .await;
    assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    assert!(marketplace.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_listing_rejects_non_owner() {
    let erc721 = Arc::new(MockErc721 {
        owner: OTHER_SELLER.to_string(),
        ..Default::default()
    });
    let marketplace = Arc::new(MockMarketplace::default());
    let client = client_with_mocks(SELLER, erc721, marketplace.clone());

    let result = client
        .create_listing(NFT, &BigDecimal::from(1), &BigDecimal::from(100))
        .await;
    assert!(matches!(result, Err(ClientError::NotTokenOwner { .. })));
    assert!(marketplace.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn purchase_sends_the_projected_price_as_value() {
    let store = new_listing_store();
    store.write().unwrap().insert(Listing::from_created(&ListingCreated {
        nft_address: NFT.to_string(),
        token_id: BigDecimal::from(1),
        seller: SELLER.to_string(),
        price: BigDecimal::from(100),
    }));

    let marketplace = Arc::new(MockMarketplace::default());
    let client = MarketplaceClient::new(
        store,
        BUYER,
        MARKETPLACE,
        Arc::new(MockErc721::default()),
        marketplace.clone(),
    )
    .unwrap();

    client
        .purchase_listing(NFT, &BigDecimal::from(1))
        .await
        .unwrap();
    let calls = marketplace.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![format!("purchase_listing({NFT},1,100)")]);

    let missing = client.purchase_listing(NFT, &BigDecimal::from(2)).await;
    assert!(matches!(missing, Err(ClientError::ListingNotFound)));
}

#[tokio::test]
async fn client_reads_see_the_projection() {
    let processor = run_blocks(vec![block(
        1,
        vec![created_log(NFT, 1, SELLER, 100, 1, 0)],
    )])
    .await;

    let client = MarketplaceClient::new(
        processor.store(),
        SELLER,
        MARKETPLACE,
        Arc::new(MockErc721::default()),
        Arc::new(MockMarketplace::default()),
    )
    .unwrap();

    let active = client.active_listings();
    assert_eq!(active.len(), 1);
    assert!(client.is_seller(&active[0]));

    let found = client
        .find_listing(NFT, &BigDecimal::from(1))
        .unwrap()
        .expect("listing should be projected");
    assert_eq!(found.price, BigDecimal::from(100));
    assert!(client
        .find_listing(NFT, &BigDecimal::from(2))
        .unwrap()
        .is_none());
}

#[test]
fn stream_config_defaults_apply() {
    let config = indexer_config();
    assert_eq!(config.channel_size, 4);
    assert_eq!(
        config.event_stream_config.poll_interval_ms,
        EventStreamConfig::default_poll_interval_ms()
    );
    assert_eq!(
        config.nft_marketplace_config.created_event,
        NFTMarketplaceConfig::default_created_event()
    );
}
