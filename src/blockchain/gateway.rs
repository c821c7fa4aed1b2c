// src/blockchain/gateway.rs
//! Ledger gateway contract.
//!
//! The registry never talks to a ledger node directly. It builds
//! [`Transaction`]s and issues reads through the [`LedgerGateway`] trait,
//! which any ordered, append-only ledger can implement. The ledger owns
//! consensus, signing checks and sequencing; this crate only relies on:
//! - all writes of one transaction commit atomically or not at all
//! - transactions are totally ordered by a single sequencer
//! - a precondition mismatch rejects the whole transaction

use crate::utils::crypto::{format_hash, hash_data};
use async_trait::async_trait;
use ethers_core::types::H256;
use ethers_core::utils::hex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a ledger gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A precondition did not hold when the transaction was sequenced.
    #[error("stale state for {key}: expected version {expected:?}, observed {observed:?}")]
    StaleVersion {
        key: String,
        expected: Option<u64>,
        observed: Option<u64>,
    },

    /// The transaction could not be decoded.
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// The ledger refused the transaction (duplicate, fee, policy, ...).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The ledger could not serve the request at all.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Version requirement on one ledger key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub address: String,
    pub key: String,
    /// `None` requires the key to never have been written.
    pub expected_version: Option<u64>,
}

/// One key write. `value == None` records a deletion; history is kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StateWrite {
    pub address: String,
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// A state transition submitted to the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// DID of the submitting party.
    pub sender: String,
    /// Contract method the transaction stands for, e.g. `registerAuthorityIssuer`.
    pub method: String,
    /// Random nonce so identical requests still hash differently.
    pub nonce: u64,
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<StateWrite>,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            method: method.into(),
            nonce: rand::random(),
            preconditions: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Requires `address/key` to be at `expected_version` when sequenced.
    pub fn expect(mut self, address: &str, key: &str, expected_version: Option<u64>) -> Self {
        self.preconditions.push(Precondition {
            address: address.to_string(),
            key: key.to_string(),
            expected_version,
        });
        self
    }

    pub fn put(mut self, address: &str, key: &str, value: Vec<u8>) -> Self {
        self.writes.push(StateWrite {
            address: address.to_string(),
            key: key.to_string(),
            value: Some(value),
        });
        self
    }

    pub fn delete(mut self, address: &str, key: &str) -> Self {
        self.writes.push(StateWrite {
            address: address.to_string(),
            key: key.to_string(),
            value: None,
        });
        self
    }

    /// Canonical byte encoding; the raw payload accepted by
    /// [`LedgerGateway::submit_raw`].
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    pub fn decode(raw: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(raw).map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    /// Hex rendering of [`Transaction::encode`], `0x`-prefixed.
    pub fn to_hex(&self) -> Result<String, LedgerError> {
        Ok(format!("0x{}", hex::encode(self.encode()?)))
    }

    /// Keccak-256 of the canonical encoding.
    pub fn hash(&self) -> Result<H256, LedgerError> {
        Ok(H256::from(hash_data(&self.encode()?)))
    }
}

/// Outcome of a committed transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: H256,
    /// Height of the block holding the transaction.
    pub height: u64,
    pub method: String,
}

impl TransactionReceipt {
    pub fn tx_hash_hex(&self) -> String {
        format_hash(&self.tx_hash)
    }
}

/// Current state of one ledger key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StateValue {
    /// Height of the block that last wrote the key.
    pub version: u64,
    /// `None` if that write was a deletion.
    pub value: Option<Vec<u8>>,
}

/// Prefix scan over live keys of one contract address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub prefix: String,
    /// Number of matching live keys to skip.
    pub offset: usize,
    pub limit: usize,
    /// Snapshot height to read at; `None` reads the head.
    pub at_height: Option<u64>,
}

/// Send/call primitive against an ordered, append-only ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submits a transaction built by this crate.
    async fn submit(&self, tx: Transaction) -> Result<TransactionReceipt, LedgerError>;

    /// Submits a pre-built, externally signed transaction payload verbatim.
    async fn submit_raw(&self, raw: &[u8]) -> Result<TransactionReceipt, LedgerError>;

    /// Reads one key, optionally at a past height. `None` if never written.
    async fn read(
        &self,
        address: &str,
        key: &str,
        at_height: Option<u64>,
    ) -> Result<Option<StateValue>, LedgerError>;

    /// Lists live `(key, value)` pairs under a prefix in key order.
    async fn scan(
        &self,
        address: &str,
        request: ScanRequest,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError>;

    /// Height of the latest committed block.
    async fn height(&self) -> Result<u64, LedgerError>;
}
