// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub mod marketplace_config;

use marketplace_config::NFTMarketplaceConfig;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerProcessorConfig {
    pub event_stream_config: EventStreamConfig,
    // Size of channel between steps
    #[serde(default = "IndexerProcessorConfig::default_channel_size")]
    pub channel_size: usize,
    pub nft_marketplace_config: NFTMarketplaceConfig,
}

impl IndexerProcessorConfig {
    pub const fn default_channel_size() -> usize {
        10
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventStreamConfig {
    pub rpc_url: Url,
    pub starting_block: u64,
    /// When set, the stream ends after this block instead of tailing the
    /// chain head forever.
    pub ending_block: Option<u64>,
    #[serde(default = "EventStreamConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    // Upper bound on blocks per eth_getLogs request
    #[serde(default = "EventStreamConfig::default_max_block_range")]
    pub max_block_range: u64,
}

impl EventStreamConfig {
    pub const fn default_poll_interval_ms() -> u64 {
        1000
    }

    pub const fn default_max_block_range() -> u64 {
        2000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: IndexerProcessorConfig = serde_yaml::from_str(
            r#"
            event_stream_config:
              rpc_url: "http://localhost:8545"
              starting_block: 0
              ending_block: null
            nft_marketplace_config:
              name: celo_marketplace
              contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.channel_size,
            IndexerProcessorConfig::default_channel_size()
        );
        assert_eq!(config.event_stream_config.poll_interval_ms, 1000);
        assert_eq!(config.event_stream_config.max_block_range, 2000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<IndexerProcessorConfig, _> = serde_yaml::from_str(
            r#"
            event_stream_config:
              rpc_url: "http://localhost:8545"
              starting_block: 0
              ending_block: null
            nft_marketplace_config:
              name: celo_marketplace
              contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
            surprise: true
            "#,
        );
        assert!(result.is_err());
    }
}
