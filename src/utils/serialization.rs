// src/utils/serialization.rs
//! Serialization helpers for values stored on the ledger.
//!
//! Small bookkeeping values (index entries, events, grants) are stored as
//! JSON bytes. Issuer records use the ABI layout in
//! [`crate::contracts::issuer_record`] instead.

use serde::{de::DeserializeOwned, Serialize};

/// Serializes a value to JSON bytes.
///
/// # Returns
/// - `Ok(Vec<u8>)` with the JSON representation on success
/// - `Err(serde_json::Error)` if serialization fails
pub fn to_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(data)
}

/// Deserializes a value from JSON bytes.
pub fn from_bytes<T: DeserializeOwned>(data: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Encodes a `u64` counter as 8 big-endian bytes.
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decodes a counter written by [`encode_u64`]; `None` if the width is wrong.
pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(array))
}

/// Zero-padded decimal rendering so that lexicographic key order equals
/// numeric order.
pub fn ordinal_key(value: u64) -> String {
    format!("{:020}", value)
}
