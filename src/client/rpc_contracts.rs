use crate::{
    client::{
        contracts::{Erc721Contract, MarketplaceContract, TxHash},
        ClientError,
    },
    utils::util::{
        address_from_word, address_to_word, function_selector, is_valid_address,
        standardize_address, to_hex_quantity, u256_to_word, WORD_SIZE,
    },
};
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;
use url::Url;

const DEFAULT_RECEIPT_ATTEMPTS: u32 = 120;
const DEFAULT_RECEIPT_POLL_MS: u64 = 1000;

/// JSON-RPC-backed implementation of both contract gateways: reads via
/// `eth_call`, writes via `eth_sendTransaction` against an unlocked node
/// account, with selector + 32-byte-word call encoding.
pub struct RpcContractGateway {
    client: reqwest::Client,
    rpc_url: Url,
    caller: String,
    marketplace_address: String,
    receipt_attempts: u32,
    receipt_poll_ms: u64,
    request_id: AtomicU64,
}

impl RpcContractGateway {
    pub fn new(rpc_url: Url, caller: &str, marketplace_address: &str) -> Result<Self, ClientError> {
        if !is_valid_address(caller) {
            return Err(ClientError::InvalidAddress(caller.to_string()));
        }
        if !is_valid_address(marketplace_address) {
            return Err(ClientError::InvalidAddress(marketplace_address.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            rpc_url,
            caller: standardize_address(caller),
            marketplace_address: standardize_address(marketplace_address),
            receipt_attempts: DEFAULT_RECEIPT_ATTEMPTS,
            receipt_poll_ms: DEFAULT_RECEIPT_POLL_MS,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn with_receipt_polling(mut self, attempts: u32, poll_ms: u64) -> Self {
        self.receipt_attempts = attempts;
        self.receipt_poll_ms = poll_ms;
        self
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response: Value = self
            .client
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if let Some(error) = response.get("error") {
            return Err(ClientError::RpcResponse(format!("{method} failed: {error}")));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| ClientError::RpcResponse(format!("{method} returned no result")))
    }

    async fn eth_call(&self, to: &str, calldata: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        let result = self
            .rpc(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(calldata)) }, "latest"]),
            )
            .await?;
        let payload = result
            .as_str()
            .ok_or_else(|| ClientError::Abi("non-string eth_call result".to_string()))?;
        hex::decode(payload.strip_prefix("0x").unwrap_or(payload))
            .map_err(|e| ClientError::Abi(e.to_string()))
    }

    async fn send_transaction(
        &self,
        to: &str,
        calldata: Vec<u8>,
        value: Option<&BigDecimal>,
    ) -> Result<TxHash, ClientError> {
        let mut tx = json!({
            "from": self.caller,
            "to": to,
            "data": format!("0x{}", hex::encode(calldata)),
        });
        if let Some(value) = value {
            tx["value"] = json!(to_hex_quantity(value));
        }
        let result = self.rpc("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| ClientError::RpcResponse("non-string transaction hash".to_string()))?
            .to_string();
        debug!(tx_hash, "Submitted transaction, waiting for receipt");
        self.wait_for_receipt(&tx_hash).await?;
        Ok(tx_hash)
    }

    /// Polls for the receipt up to the configured attempt cap. A transaction
    /// that never confirms surfaces as ReceiptTimeout instead of hanging the
    /// caller forever.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), ClientError> {
        for _ in 0..self.receipt_attempts {
            let receipt = self
                .rpc("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                let status = receipt.get("status").and_then(|s| s.as_str());
                if status == Some("0x0") {
                    return Err(ClientError::TransactionReverted(tx_hash.to_string()));
                }
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(self.receipt_poll_ms)).await;
        }
        Err(ClientError::ReceiptTimeout(tx_hash.to_string()))
    }
}

fn calldata(signature: &str, words: &[[u8; WORD_SIZE]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + words.len() * WORD_SIZE);
    data.extend_from_slice(&function_selector(signature));
    for word in words {
        data.extend_from_slice(word);
    }
    data
}

fn encode_address(address: &str) -> Result<[u8; WORD_SIZE], ClientError> {
    if !is_valid_address(address) {
        return Err(ClientError::InvalidAddress(address.to_string()));
    }
    address_to_word(address).map_err(|e| ClientError::Abi(e.to_string()))
}

fn encode_u256(value: &BigDecimal) -> Result<[u8; WORD_SIZE], ClientError> {
    u256_to_word(value)
        .ok_or_else(|| ClientError::Abi(format!("value {value} does not fit in 256 bits")))
}

fn encode_bool(value: bool) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 1] = value as u8;
    word
}

fn decode_bool_return(data: &[u8]) -> Result<bool, ClientError> {
    let word: &[u8; WORD_SIZE] = data
        .get(..WORD_SIZE)
        .and_then(|w| w.try_into().ok())
        .ok_or_else(|| ClientError::Abi("bool return shorter than one word".to_string()))?;
    Ok(word.iter().any(|b| *b != 0))
}

fn decode_address_return(data: &[u8]) -> Result<String, ClientError> {
    let word: &[u8; WORD_SIZE] = data
        .get(..WORD_SIZE)
        .and_then(|w| w.try_into().ok())
        .ok_or_else(|| ClientError::Abi("address return shorter than one word".to_string()))?;
    Ok(address_from_word(word))
}

/// Decodes a dynamic `string` return: offset word, length word, then bytes.
fn decode_string_return(data: &[u8]) -> Result<String, ClientError> {
    let word_as_usize = |slice: &[u8]| -> Result<usize, ClientError> {
        let word: &[u8; WORD_SIZE] = slice
            .try_into()
            .map_err(|_| ClientError::Abi("truncated string return".to_string()))?;
        // offsets and lengths fit comfortably in the low 8 bytes
        if word[..24].iter().any(|b| *b != 0) {
            return Err(ClientError::Abi("string offset out of range".to_string()));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&word[24..]);
        Ok(u64::from_be_bytes(raw) as usize)
    };

    let offset = word_as_usize(
        data.get(..WORD_SIZE)
            .ok_or_else(|| ClientError::Abi("empty string return".to_string()))?,
    )?;
    // offset and length come off the wire, so every bound is checked
    let length_end = offset
        .checked_add(WORD_SIZE)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| ClientError::Abi("string return missing length word".to_string()))?;
    let length = word_as_usize(&data[offset..length_end])?;
    let bytes = length_end
        .checked_add(length)
        .and_then(|end| data.get(length_end..end))
        .ok_or_else(|| ClientError::Abi("string return shorter than its length".to_string()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| ClientError::Abi(e.to_string()))
}

#[async_trait::async_trait]
impl Erc721Contract for RpcContractGateway {
    async fn token_uri(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<String, ClientError> {
        let data = calldata("tokenURI(uint256)", &[encode_u256(token_id)?]);
        decode_string_return(&self.eth_call(&standardize_address(nft_address), data).await?)
    }

    async fn owner_of(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<String, ClientError> {
        let data = calldata("ownerOf(uint256)", &[encode_u256(token_id)?]);
        decode_address_return(&self.eth_call(&standardize_address(nft_address), data).await?)
    }

    async fn is_approved_for_all(
        &self,
        nft_address: &str,
        owner: &str,
        operator: &str,
    ) -> Result<bool, ClientError> {
        let data = calldata(
            "isApprovedForAll(address,address)",
            &[encode_address(owner)?, encode_address(operator)?],
        );
        decode_bool_return(&self.eth_call(&standardize_address(nft_address), data).await?)
    }

    async fn set_approval_for_all(
        &self,
        nft_address: &str,
        operator: &str,
        approved: bool,
    ) -> Result<TxHash, ClientError> {
        let data = calldata(
            "setApprovalForAll(address,bool)",
            &[encode_address(operator)?, encode_bool(approved)],
        );
        self.send_transaction(&standardize_address(nft_address), data, None)
            .await
    }
}

#[async_trait::async_trait]
impl MarketplaceContract for RpcContractGateway {
    async fn create_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        let data = calldata(
            "createListing(address,uint256,uint256)",
            &[
                encode_address(nft_address)?,
                encode_u256(token_id)?,
                encode_u256(price)?,
            ],
        );
        self.send_transaction(&self.marketplace_address, data, None)
            .await
    }

    async fn update_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        new_price: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        let data = calldata(
            "updateListing(address,uint256,uint256)",
            &[
                encode_address(nft_address)?,
                encode_u256(token_id)?,
                encode_u256(new_price)?,
            ],
        );
        self.send_transaction(&self.marketplace_address, data, None)
            .await
    }

    async fn cancel_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        let data = calldata(
            "cancelListing(address,uint256)",
            &[encode_address(nft_address)?, encode_u256(token_id)?],
        );
        self.send_transaction(&self.marketplace_address, data, None)
            .await
    }

    async fn purchase_listing(
        &self,
        nft_address: &str,
        token_id: &BigDecimal,
        value: &BigDecimal,
    ) -> Result<TxHash, ClientError> {
        let data = calldata(
            "purchaseListing(address,uint256)",
            &[encode_address(nft_address)?, encode_u256(token_id)?],
        );
        self.send_transaction(&self.marketplace_address, data, Some(value))
            .await
    }
}
