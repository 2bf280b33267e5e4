// SPDX-License-Identifier: Apache-2.0

use crate::utils::{errors::ProcessorError, util::event_topic};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// topic0 hash -> standardized event type
pub type MarketplaceEventMappings = AHashMap<[u8; 32], MarketplaceEventType>;

pub const DEFAULT_CREATED_EVENT: &str = "ListingCreated(address,uint256,address,uint256)";
pub const DEFAULT_CANCELED_EVENT: &str = "ListingCanceled(address,uint256,address)";
pub const DEFAULT_PURCHASED_EVENT: &str = "ListingPurchased(address,uint256,address,address)";
pub const DEFAULT_UPDATED_EVENT: &str = "ListingUpdated(address,uint256,address,uint256)";

/// Represents the marketplace being indexed and its configuration.
///
/// The event signatures default to the canonical marketplace ABI but can be
/// overridden for deployments that emit differently named events.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NFTMarketplaceConfig {
    pub name: String,
    pub contract_address: String,
    #[serde(default = "NFTMarketplaceConfig::default_created_event")]
    pub created_event: String,
    #[serde(default = "NFTMarketplaceConfig::default_canceled_event")]
    pub canceled_event: String,
    #[serde(default = "NFTMarketplaceConfig::default_purchased_event")]
    pub purchased_event: String,
    #[serde(default = "NFTMarketplaceConfig::default_updated_event")]
    pub updated_event: String,
}

impl NFTMarketplaceConfig {
    pub fn default_created_event() -> String {
        DEFAULT_CREATED_EVENT.to_string()
    }

    pub fn default_canceled_event() -> String {
        DEFAULT_CANCELED_EVENT.to_string()
    }

    pub fn default_purchased_event() -> String {
        DEFAULT_PURCHASED_EVENT.to_string()
    }

    pub fn default_updated_event() -> String {
        DEFAULT_UPDATED_EVENT.to_string()
    }

    /// Builds the topic0 lookup table used by the event remapper.
    pub fn event_mappings(&self) -> Result<MarketplaceEventMappings, ProcessorError> {
        let mut mappings = AHashMap::new();
        let pairs = [
            (&self.created_event, MarketplaceEventType::ListingCreated),
            (&self.canceled_event, MarketplaceEventType::ListingCanceled),
            (
                &self.purchased_event,
                MarketplaceEventType::ListingPurchased,
            ),
            (&self.updated_event, MarketplaceEventType::ListingUpdated),
        ];
        for (signature, event_type) in pairs {
            if mappings
                .insert(event_topic(signature), event_type)
                .is_some()
            {
                return Err(ProcessorError::Config(format!(
                    "duplicate event signature in marketplace config: {signature}"
                )));
            }
        }
        Ok(mappings)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketplaceEventType {
    ListingCreated,
    ListingCanceled,
    ListingPurchased,
    ListingUpdated,
}

impl MarketplaceEventType {
    /// Number of 32-byte words expected in the log data for this event.
    pub fn expected_word_count(&self) -> usize {
        match self {
            MarketplaceEventType::ListingCreated => 4,
            MarketplaceEventType::ListingCanceled => 3,
            MarketplaceEventType::ListingPurchased => 4,
            MarketplaceEventType::ListingUpdated => 4,
        }
    }
}
