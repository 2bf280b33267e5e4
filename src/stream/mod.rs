use crate::utils::errors::ProcessorError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod rpc_stream;

/// A raw log as emitted by a contract: topic hashes plus ABI-encoded data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLog {
    pub address: String,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub log_index: u64,
}

impl ContractLog {
    pub fn topic0(&self) -> Option<&[u8; 32]> {
        self.topics.first()
    }
}

/// The finalized logs of one block, in emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvents {
    pub block_number: u64,
    pub block_timestamp: NaiveDateTime,
    pub logs: Vec<ContractLog>,
}

/// An ordered source of finalized blocks. Implementations must yield blocks
/// strictly in ascending order and never re-deliver; the projection relies on
/// that ordering and has no tolerance for violations.
#[async_trait::async_trait]
pub trait EventStream: Send {
    /// The next batch of blocks, or None once the stream has reached its
    /// configured end. Batches may be empty when the chain advanced without
    /// emitting matching logs.
    async fn next_batch(&mut self) -> Result<Option<Vec<BlockEvents>>, ProcessorError>;
}

/// A fixed, in-memory stream. This is the test double for the RPC stream:
/// deterministic replay of a known event log without a live node.
#[derive(Debug, Default)]
pub struct StaticEventStream {
    batches: std::collections::VecDeque<Vec<BlockEvents>>,
}

impl StaticEventStream {
    pub fn new(batches: Vec<Vec<BlockEvents>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// One block per batch, in the given order.
    pub fn from_blocks(blocks: Vec<BlockEvents>) -> Self {
        Self::new(blocks.into_iter().map(|b| vec![b]).collect())
    }
}

#[async_trait::async_trait]
impl EventStream for StaticEventStream {
    async fn next_batch(&mut self) -> Result<Option<Vec<BlockEvents>>, ProcessorError> {
        Ok(self.batches.pop_front())
    }
}
