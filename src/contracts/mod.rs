// src/contracts/mod.rs
//! Storage layout of the on-chain contracts.
//!
//! Each submodule owns the keys of one contract address, knows how to read
//! them back and how to build the transactions that change them. Services
//! decide *whether* a change is allowed; contracts decide *how* it is laid
//! out on the ledger.

pub mod authority_issuer;
pub mod issuer_record;
pub mod role_controller;
pub mod specific_issuer;

use crate::blockchain::ledger_client::{corrupt, LedgerClient};
use crate::error::{RegistryError, Result};
use crate::utils::serialization::{from_bytes, to_bytes};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A decoded ledger value together with the version needed to guard a
/// later write to the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Height of the last write, `None` if the key was never written.
    pub version: Option<u64>,
    /// Decoded value, `None` if never written or deleted.
    pub value: Option<T>,
}

impl<T> Versioned<T> {
    pub fn absent() -> Self {
        Self {
            version: None,
            value: None,
        }
    }
}

/// Reads a JSON-encoded value and keeps its version.
pub(crate) async fn read_json<T: DeserializeOwned>(
    client: &LedgerClient,
    address: &str,
    key: &str,
    at_height: Option<u64>,
) -> Result<Versioned<T>> {
    let Some(state) = client.read(address, key, at_height).await? else {
        return Ok(Versioned::absent());
    };
    let value = match state.value {
        Some(bytes) => Some(from_bytes(&bytes).map_err(|e| corrupt(key, e))?),
        None => None,
    };
    Ok(Versioned {
        version: Some(state.version),
        value,
    })
}

/// Encodes a bookkeeping value for storage.
pub(crate) fn encode_json<T: Serialize>(what: &str, value: &T) -> Result<Vec<u8>> {
    to_bytes(value).map_err(|e| RegistryError::LedgerRejected(format!("cannot encode {}: {}", what, e)))
}
