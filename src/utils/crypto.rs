// src/utils/crypto.rs
//! Hashing helpers.
//!
//! Keccak-256 is used everywhere a digest is needed: transaction hashes and
//! the hash-to-prime mapping of the accumulator. It matches what the ledger's
//! contracts compute natively.

use ethers_core::types::H256;
use ethers_core::utils::keccak256;

/// Computes the Keccak-256 hash of `data`.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Computes the Keccak-256 hash of several byte strings, each prefixed with
/// its big-endian `u32` length so that distinct splits never collide.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let capacity = parts.iter().map(|p| p.len() + 4).sum();
    let mut buf = Vec::with_capacity(capacity);
    for part in parts {
        buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buf.extend_from_slice(part);
    }
    keccak256(&buf)
}

/// Renders a hash as `0x`-prefixed lowercase hex.
pub fn format_hash(hash: &H256) -> String {
    format!("0x{:x}", hash)
}
