// src/contracts/issuer_record.rs
//! Issuer record codec.
//!
//! An authority issuer occupies three storage fields on chain, always written
//! and read together in this order:
//! 1. `bytes32` name (NUL padded)
//! 2. `int` creation timestamp
//! 3. dynamic `bytes` accumulator value
//!
//! The three fields are ABI-encoded into one value so no reader can ever
//! observe a partial write. The DID itself is the storage key and is not part
//! of the record.

use crate::models::AuthorityIssuer;
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::U256;
use thiserror::Error;

/// Width of the fixed name slot.
pub const NAME_SLOT_BYTES: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("issuer name is empty")]
    EmptyName,

    #[error("issuer name is {0} bytes, the slot holds {}", NAME_SLOT_BYTES)]
    NameTooLong(usize),

    #[error("issuer name contains a NUL byte")]
    NameContainsNul,

    #[error("stored name is not UTF-8")]
    InvalidUtf8,

    #[error("creation timestamp does not fit in 64 bits")]
    CreatedOutOfRange,

    #[error("ABI layout mismatch: {0}")]
    Layout(String),
}

fn field_layout() -> [ParamType; 3] {
    [
        ParamType::FixedBytes(NAME_SLOT_BYTES),
        ParamType::Int(256),
        ParamType::Bytes,
    ]
}

/// Packs `name` into the fixed slot. Over-long names are rejected, never
/// truncated.
pub fn name_to_slot(name: &str) -> Result<[u8; NAME_SLOT_BYTES], CodecError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::EmptyName);
    }
    if bytes.len() > NAME_SLOT_BYTES {
        return Err(CodecError::NameTooLong(bytes.len()));
    }
    if bytes.contains(&0) {
        return Err(CodecError::NameContainsNul);
    }
    let mut slot = [0u8; NAME_SLOT_BYTES];
    slot[..bytes.len()].copy_from_slice(bytes);
    Ok(slot)
}

fn slot_to_name(slot: &[u8]) -> Result<String, CodecError> {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    if slot[end..].iter().any(|&b| b != 0) {
        return Err(CodecError::NameContainsNul);
    }
    if end == 0 {
        return Err(CodecError::EmptyName);
    }
    String::from_utf8(slot[..end].to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

/// Encodes the three stored fields of `issuer`.
pub fn encode(issuer: &AuthorityIssuer) -> Result<Vec<u8>, CodecError> {
    let slot = name_to_slot(&issuer.name)?;
    Ok(abi::encode(&[
        Token::FixedBytes(slot.to_vec()),
        Token::Int(U256::from(issuer.created)),
        Token::Bytes(issuer.acc_value.clone()),
    ]))
}

/// Decodes a stored record back into the issuer keyed by `we_id`.
pub fn decode(we_id: &str, data: &[u8]) -> Result<AuthorityIssuer, CodecError> {
    let tokens = abi::decode(&field_layout(), data).map_err(|e| CodecError::Layout(e.to_string()))?;
    match tokens.as_slice() {
        [Token::FixedBytes(slot), Token::Int(created), Token::Bytes(acc_value)] => {
            if *created > U256::from(u64::MAX) {
                return Err(CodecError::CreatedOutOfRange);
            }
            Ok(AuthorityIssuer {
                we_id: we_id.to_string(),
                name: slot_to_name(slot)?,
                created: created.as_u64(),
                acc_value: acc_value.clone(),
            })
        }
        other => Err(CodecError::Layout(format!("unexpected tokens {:?}", other))),
    }
}
