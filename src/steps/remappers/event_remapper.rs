use crate::{
    config::marketplace_config::{
        MarketplaceEventMappings, MarketplaceEventType, NFTMarketplaceConfig,
    },
    models::listing_models::{
        ListingCanceled, ListingCreated, ListingPurchased, ListingUpdated, MarketplaceEvent,
        NftMarketplaceActivity,
    },
    stream::{BlockEvents, ContractLog},
    utils::{
        errors::ProcessorError,
        util::{address_from_word, split_words, standardize_address, u256_from_word},
    },
};
use std::sync::Arc;
use tracing::warn;

/// Turns the raw logs of a block into typed marketplace events plus their
/// activity records. Logs from other contracts or with unrecognized topics
/// are skipped; recognized topics with malformed payloads are errors.
pub struct EventRemapper {
    event_mappings: Arc<MarketplaceEventMappings>,
    marketplace: String,
    contract_address: String,
}

impl EventRemapper {
    pub fn new(config: &NFTMarketplaceConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            event_mappings: Arc::new(config.event_mappings()?),
            marketplace: config.name.clone(),
            contract_address: standardize_address(&config.contract_address),
        })
    }

    pub fn remap_events(
        &self,
        block: &BlockEvents,
    ) -> Result<(Vec<NftMarketplaceActivity>, Vec<MarketplaceEvent>), ProcessorError> {
        let mut activities: Vec<NftMarketplaceActivity> = Vec::new();
        let mut events: Vec<MarketplaceEvent> = Vec::new();

        for log in &block.logs {
            if standardize_address(&log.address) != self.contract_address {
                continue;
            }
            let Some(topic0) = log.topic0() else {
                continue;
            };
            let Some(event_type) = self.event_mappings.get(topic0) else {
                warn!(
                    block_number = block.block_number,
                    log_index = log.log_index,
                    topic0 = %hex::encode(topic0),
                    "Skipping unrecognized event from marketplace contract"
                );
                continue;
            };

            let event = self.decode_event(*event_type, log)?;
            activities.push(NftMarketplaceActivity::from_event(
                &event,
                block.block_number as i64,
                log.log_index as i64,
                block.block_timestamp,
                &self.marketplace,
                &self.contract_address,
            ));
            events.push(event);
        }

        Ok((activities, events))
    }

    /// All four events carry their parameters non-indexed, so everything
    /// lives in the data section as 32-byte words.
    fn decode_event(
        &self,
        event_type: MarketplaceEventType,
        log: &ContractLog,
    ) -> Result<MarketplaceEvent, ProcessorError> {
        let words = split_words(&log.data)?;
        if words.len() != event_type.expected_word_count() {
            return Err(ProcessorError::Decode(format!(
                "{event_type} log at block {} index {} has {} words, expected {}",
                log.block_number,
                log.log_index,
                words.len(),
                event_type.expected_word_count()
            )));
        }

        Ok(match event_type {
            MarketplaceEventType::ListingCreated => MarketplaceEvent::Created(ListingCreated {
                nft_address: address_from_word(&words[0]),
                token_id: u256_from_word(&words[1]),
                seller: address_from_word(&words[2]),
                price: u256_from_word(&words[3]),
            }),
            MarketplaceEventType::ListingCanceled => MarketplaceEvent::Canceled(ListingCanceled {
                nft_address: address_from_word(&words[0]),
                token_id: u256_from_word(&words[1]),
                seller: address_from_word(&words[2]),
            }),
            MarketplaceEventType::ListingPurchased => {
                MarketplaceEvent::Purchased(ListingPurchased {
                    nft_address: address_from_word(&words[0]),
                    token_id: u256_from_word(&words[1]),
                    seller: address_from_word(&words[2]),
                    buyer: address_from_word(&words[3]),
                })
            },
            MarketplaceEventType::ListingUpdated => MarketplaceEvent::Updated(ListingUpdated {
                nft_address: address_from_word(&words[0]),
                token_id: u256_from_word(&words[1]),
                seller: address_from_word(&words[2]),
                new_price: u256_from_word(&words[3]),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::util::{address_to_word, event_topic, u256_to_word};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDateTime;

    const MARKETPLACE: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
    const NFT: &str = "0xa000000000000000000000000000000000000001";
    const SELLER: &str = "0xb000000000000000000000000000000000000002";

    fn remapper() -> EventRemapper {
        EventRemapper::new(&NFTMarketplaceConfig {
            name: "test_marketplace".to_string(),
            contract_address: MARKETPLACE.to_string(),
            created_event: NFTMarketplaceConfig::default_created_event(),
            canceled_event: NFTMarketplaceConfig::default_canceled_event(),
            purchased_event: NFTMarketplaceConfig::default_purchased_event(),
            updated_event: NFTMarketplaceConfig::default_updated_event(),
        })
        .unwrap()
    }

    fn log(signature: &str, words: Vec<[u8; 32]>, log_index: u64) -> ContractLog {
        ContractLog {
            address: MARKETPLACE.to_string(),
            topics: vec![event_topic(signature)],
            data: words.concat(),
            block_number: 5,
            log_index,
        }
    }

    fn block(logs: Vec<ContractLog>) -> BlockEvents {
        BlockEvents {
            block_number: 5,
            block_timestamp: NaiveDateTime::default(),
            logs,
        }
    }

    #[test]
    fn decodes_created_event() {
        let words = vec![
            address_to_word(NFT).unwrap(),
            u256_to_word(&BigDecimal::from(1)).unwrap(),
            address_to_word(SELLER).unwrap(),
            u256_to_word(&BigDecimal::from(100)).unwrap(),
        ];
        let (activities, events) = remapper()
            .remap_events(&block(vec![log(
                "ListingCreated(address,uint256,address,uint256)",
                words,
                0,
            )]))
            .unwrap();
        assert_eq!(events.len(), 1);
        let MarketplaceEvent::Created(created) = &events[0] else {
            panic!("expected created event");
        };
        assert_eq!(created.nft_address, NFT);
        assert_eq!(created.seller, SELLER);
        assert_eq!(created.price, BigDecimal::from(100));
        assert_eq!(activities.len(), 1);
        assert_eq!(
            activities[0].event_type,
            MarketplaceEventType::ListingCreated
        );
        assert_eq!(activities[0].block_number, 5);
    }

    #[test]
    fn foreign_contract_logs_are_skipped() {
        let words = vec![
            address_to_word(NFT).unwrap(),
            u256_to_word(&BigDecimal::from(1)).unwrap(),
            address_to_word(SELLER).unwrap(),
        ];
        let mut foreign = log("ListingCanceled(address,uint256,address)", words, 0);
        foreign.address = NFT.to_string();
        let (activities, events) = remapper().remap_events(&block(vec![foreign])).unwrap();
        assert!(activities.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_topic_is_skipped() {
        let unknown = log("Transfer(address,address,uint256)", vec![[0u8; 32]; 3], 0);
        let (activities, events) = remapper().remap_events(&block(vec![unknown])).unwrap();
        assert!(activities.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn wrong_word_count_is_an_error() {
        let truncated = log(
            "ListingUpdated(address,uint256,address,uint256)",
            vec![[0u8; 32]; 2],
            0,
        );
        assert!(remapper().remap_events(&block(vec![truncated])).is_err());
    }
}
