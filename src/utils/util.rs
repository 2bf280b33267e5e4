// SPDX-License-Identifier: Apache-2.0

use crate::utils::errors::ProcessorError;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use tiny_keccak::{Hasher, Keccak};

pub const EVM_ADDRESS_HEX_LENGTH: usize = 40;
pub const WORD_SIZE: usize = 32;

/// Standardizes all addresses to be length 42 (0x-40 length hex), lowercase.
pub fn standardize_address(handle: &str) -> String {
    let handle = handle.strip_prefix("0x").unwrap_or(handle);
    format!("0x{:0>40}", handle.to_lowercase())
}

/// Standardizes an address from its raw 20-byte form.
pub fn standardize_address_from_bytes(bytes: &[u8]) -> String {
    format!("0x{:0>40}", hex::encode(bytes))
}

/// Whether the string is a plausible EVM address: 0x followed by exactly
/// 40 hex digits. User-entered addresses are validated with this before any
/// transaction is submitted.
pub fn is_valid_address(handle: &str) -> bool {
    match handle.strip_prefix("0x") {
        Some(hex_part) => {
            hex_part.len() == EVM_ADDRESS_HEX_LENGTH
                && hex_part.chars().all(|c| c.is_ascii_hexdigit())
        },
        None => false,
    }
}

pub fn keccak256(buffer: &[u8]) -> [u8; 32] {
    let mut output = [0; 32];
    let mut keccak = Keccak::v256();
    keccak.update(buffer);
    keccak.finalize(&mut output);
    output
}

/// Topic hash of a canonical event signature, e.g.
/// `ListingCreated(address,uint256,address,uint256)`.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// 4-byte function selector of a canonical function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Decodes a 0x-prefixed (or bare) hex string into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, ProcessorError> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    Ok(hex::decode(value)?)
}

/// Parses a JSON-RPC quantity ("0x1b4") into a u64.
pub fn parse_hex_quantity(value: &str) -> Result<u64, ProcessorError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProcessorError::Decode(format!("bad hex quantity {value:?}: {e}")))
}

/// Reads an address out of a 32-byte ABI word (last 20 bytes).
pub fn address_from_word(word: &[u8; WORD_SIZE]) -> String {
    standardize_address_from_bytes(&word[12..])
}

/// Reads an unsigned 256-bit quantity out of a 32-byte ABI word.
pub fn u256_from_word(word: &[u8; WORD_SIZE]) -> BigDecimal {
    BigDecimal::from(BigInt::from_bytes_be(Sign::Plus, word))
}

/// Encodes an address into a left-padded 32-byte ABI word.
pub fn address_to_word(address: &str) -> Result<[u8; WORD_SIZE], ProcessorError> {
    let bytes = decode_hex(&standardize_address(address))?;
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Encodes a non-negative integer into a 32-byte ABI word. Returns None for
/// negative values or values wider than 256 bits.
pub fn u256_to_word(value: &BigDecimal) -> Option<[u8; WORD_SIZE]> {
    let (int, _) = value.with_scale(0).into_bigint_and_exponent();
    let (sign, bytes) = int.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > WORD_SIZE {
        return None;
    }
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Some(word)
}

/// Formats an integer as a 0x hex quantity for JSON-RPC params.
pub fn to_hex_quantity(value: &BigDecimal) -> String {
    let (int, _) = value.with_scale(0).into_bigint_and_exponent();
    format!("0x{}", int.to_str_radix(16))
}

/// Splits ABI-encoded data into 32-byte words, rejecting ragged payloads.
pub fn split_words(data: &[u8]) -> Result<Vec<[u8; WORD_SIZE]>, ProcessorError> {
    if data.len() % WORD_SIZE != 0 {
        return Err(ProcessorError::Decode(format!(
            "log data length {} is not a multiple of {}",
            data.len(),
            WORD_SIZE
        )));
    }
    Ok(data
        .chunks_exact(WORD_SIZE)
        .map(|chunk| {
            let mut word = [0u8; WORD_SIZE];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn standardize_address_pads_and_lowercases() {
        assert_eq!(
            standardize_address("0xABC"),
            "0x0000000000000000000000000000000000000abc"
        );
        assert_eq!(
            standardize_address("5FbDB2315678afecb367f032d93F642f64180aa3"),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address(
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        ));
        assert!(!is_valid_address("0x123"));
        assert!(!is_valid_address(
            "5FbDB2315678afecb367f032d93F642f64180aa3"
        ));
        assert!(!is_valid_address(
            "0xzzbdb2315678afecb367f032d93f642f64180aa3"
        ));
    }

    #[test]
    fn known_transfer_topic() {
        // keccak256("Transfer(address,address,uint256)")
        assert_eq!(
            hex::encode(event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn u256_word_round_trip() {
        let value = BigDecimal::from_str("340282366920938463463374607431768211455").unwrap();
        let word = u256_to_word(&value).unwrap();
        assert_eq!(u256_from_word(&word), value);
    }

    #[test]
    fn u256_to_word_rejects_oversized() {
        // 2^256
        let value = BigDecimal::from_str(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936",
        )
        .unwrap();
        assert!(u256_to_word(&value).is_none());
    }

    #[test]
    fn address_word_round_trip() {
        let address = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
        let word = address_to_word(address).unwrap();
        assert_eq!(address_from_word(&word), address);
    }

    #[test]
    fn hex_quantity_parsing() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x1b4").unwrap(), 436);
        assert!(parse_hex_quantity("0xnope").is_err());
    }

    #[test]
    fn ragged_data_is_rejected() {
        assert!(split_words(&[0u8; 31]).is_err());
        assert_eq!(split_words(&[0u8; 64]).unwrap().len(), 2);
    }
}
