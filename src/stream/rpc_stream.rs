use crate::{
    config::EventStreamConfig,
    stream::{BlockEvents, ContractLog, EventStream},
    utils::{
        errors::ProcessorError,
        util::{decode_hex, parse_hex_quantity, standardize_address},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

/// Polls an EVM JSON-RPC endpoint for finalized marketplace logs with
/// `eth_blockNumber` + `eth_getLogs`, yielding blocks strictly in order.
pub struct RpcEventStream {
    client: reqwest::Client,
    config: EventStreamConfig,
    contract_address: String,
    next_block: u64,
    request_id: u64,
}

impl RpcEventStream {
    pub fn new(config: EventStreamConfig, contract_address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            next_block: config.starting_block,
            config,
            contract_address: standardize_address(contract_address),
            request_id: 0,
        }
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, ProcessorError> {
        self.request_id += 1;
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_id,
            "method": method,
            "params": params,
        });
        let response: Value = self
            .client
            .post(self.config.rpc_url.clone())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if let Some(error) = response.get("error") {
            return Err(ProcessorError::RpcResponse(format!(
                "{method} failed: {error}"
            )));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| ProcessorError::RpcResponse(format!("{method} returned no result")))
    }

    async fn latest_block_number(&mut self) -> Result<u64, ProcessorError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| ProcessorError::RpcResponse("non-string block number".to_string()))?;
        parse_hex_quantity(quantity)
    }

    async fn get_logs(&mut self, from: u64, to: u64) -> Result<Vec<RpcLog>, ProcessorError> {
        let params = json!([{
            "address": self.contract_address,
            "fromBlock": format!("0x{from:x}"),
            "toBlock": format!("0x{to:x}"),
        }]);
        let result = self.call("eth_getLogs", params).await?;
        serde_json::from_value(result)
            .map_err(|e| ProcessorError::RpcResponse(format!("bad eth_getLogs payload: {e}")))
    }

    async fn block_timestamp(
        &mut self,
        block_number: u64,
    ) -> Result<chrono::NaiveDateTime, ProcessorError> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("0x{block_number:x}"), false]),
            )
            .await?;
        let timestamp = result
            .get("timestamp")
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                ProcessorError::RpcResponse(format!("block {block_number} has no timestamp"))
            })?;
        let secs = parse_hex_quantity(timestamp)?;
        chrono::DateTime::from_timestamp(secs as i64, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| {
                ProcessorError::Decode(format!("block timestamp {secs} out of range"))
            })
    }
}

#[async_trait::async_trait]
impl EventStream for RpcEventStream {
    async fn next_batch(&mut self) -> Result<Option<Vec<BlockEvents>>, ProcessorError> {
        loop {
            if let Some(ending_block) = self.config.ending_block {
                if self.next_block > ending_block {
                    return Ok(None);
                }
            }

            let latest = self.latest_block_number().await?;
            let upper = self
                .config
                .ending_block
                .map_or(latest, |ending| ending.min(latest));
            if self.next_block > upper {
                tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                continue;
            }

            let to = upper.min(self.next_block + self.config.max_block_range - 1);
            let logs = self.get_logs(self.next_block, to).await?;
            debug!(
                from = self.next_block,
                to,
                log_count = logs.len(),
                "Fetched marketplace logs"
            );

            // eth_getLogs gives us a flat list; regroup into per-block order.
            let mut by_block: BTreeMap<u64, Vec<ContractLog>> = BTreeMap::new();
            for log in logs {
                let log = log.into_contract_log()?;
                by_block.entry(log.block_number).or_default().push(log);
            }

            let mut batch = Vec::with_capacity(by_block.len());
            for (block_number, mut block_logs) in by_block {
                block_logs.sort_by_key(|l| l.log_index);
                let block_timestamp = self.block_timestamp(block_number).await?;
                batch.push(BlockEvents {
                    block_number,
                    block_timestamp,
                    logs: block_logs,
                });
            }

            // Quiet ranges still move the watermark: emit the scanned range
            // end as an empty block so downstream records the progress.
            if batch.last().map(|b| b.block_number) != Some(to) {
                let block_timestamp = self.block_timestamp(to).await?;
                batch.push(BlockEvents {
                    block_number: to,
                    block_timestamp,
                    logs: Vec::new(),
                });
            }

            self.next_block = to + 1;
            return Ok(Some(batch));
        }
    }
}

/// The log shape returned by eth_getLogs, all fields hex text.
#[derive(Debug, Deserialize)]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "logIndex")]
    log_index: String,
}

impl RpcLog {
    fn into_contract_log(self) -> Result<ContractLog, ProcessorError> {
        let mut topics = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            let bytes = decode_hex(topic)?;
            let topic: [u8; 32] = bytes.try_into().map_err(|_| {
                ProcessorError::Decode(format!("topic is not 32 bytes: {topic}"))
            })?;
            topics.push(topic);
        }
        Ok(ContractLog {
            address: standardize_address(&self.address),
            topics,
            data: decode_hex(&self.data)?,
            block_number: parse_hex_quantity(&self.block_number)?,
            log_index: parse_hex_quantity(&self.log_index)?,
        })
    }
}
