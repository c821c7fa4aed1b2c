// src/contracts/authority_issuer.rs
//! Authority issuer controller layout.
//!
//! Keys under [`AUTHORITY_ISSUER_CONTROLLER`]:
//! - `record/<weId>`: the ABI-encoded three-field record
//! - `entry/<weId>`: registration bookkeeping (sequence, active flag, role)
//! - `active/<sequence>`: weId, present only while the issuer is active
//! - `sequence`: next registration sequence number
//!
//! Registration writes all of them in one transaction. Removal flips the
//! entry to inactive and deletes the active index key; the record stays.

use super::issuer_record;
use super::{encode_json, read_json, Versioned};
use crate::blockchain::gateway::{ScanRequest, Transaction};
use crate::blockchain::ledger_client::{corrupt, LedgerClient};
use crate::error::{RegistryError, Result};
use crate::models::AuthorityIssuer;
use crate::services::authorization::Role;
use crate::utils::serialization::{decode_u64, encode_u64, ordinal_key};
use serde::{Deserialize, Serialize};

/// Contract address of the authority issuer registry.
pub const AUTHORITY_ISSUER_CONTROLLER: &str = "AuthorityIssuerController";

const SEQUENCE_KEY: &str = "sequence";
const ACTIVE_PREFIX: &str = "active/";

pub fn record_key(we_id: &str) -> String {
    format!("record/{}", we_id)
}

pub fn entry_key(we_id: &str) -> String {
    format!("entry/{}", we_id)
}

pub fn active_key(sequence: u64) -> String {
    format!("{}{}", ACTIVE_PREFIX, ordinal_key(sequence))
}

/// Registration bookkeeping for one DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerEntry {
    /// Position in the registration order.
    pub sequence: u64,
    /// `false` once tombstoned.
    pub active: bool,
    /// Highest role the registering caller held.
    pub registrar_role: Role,
    pub registered_by: String,
}

/// Typed access to the authority issuer controller.
#[derive(Clone)]
pub struct AuthorityIssuerContract {
    client: LedgerClient,
}

impl AuthorityIssuerContract {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    pub async fn entry(&self, we_id: &str, at_height: Option<u64>) -> Result<Versioned<IssuerEntry>> {
        read_json(&self.client, AUTHORITY_ISSUER_CONTROLLER, &entry_key(we_id), at_height).await
    }

    /// Next sequence number plus the version guarding it.
    pub async fn sequence(&self, at_height: Option<u64>) -> Result<Versioned<u64>> {
        let Some(state) = self
            .client
            .read(AUTHORITY_ISSUER_CONTROLLER, SEQUENCE_KEY, at_height)
            .await?
        else {
            return Ok(Versioned {
                version: None,
                value: Some(0),
            });
        };
        let next = match state.value {
            Some(bytes) => decode_u64(&bytes).ok_or_else(|| corrupt(SEQUENCE_KEY, "bad width"))?,
            None => 0,
        };
        Ok(Versioned {
            version: Some(state.version),
            value: Some(next),
        })
    }

    /// Reads and decodes the three-field record of `we_id`.
    pub async fn record(&self, we_id: &str, at_height: Option<u64>) -> Result<Option<AuthorityIssuer>> {
        let key = record_key(we_id);
        match self
            .client
            .read_value(AUTHORITY_ISSUER_CONTROLLER, &key, at_height)
            .await?
        {
            Some(bytes) => issuer_record::decode(we_id, &bytes)
                .map(Some)
                .map_err(|e| corrupt(&key, e)),
            None => Ok(None),
        }
    }

    /// Active DIDs in registration order.
    pub async fn active_page(&self, offset: usize, limit: usize, at_height: Option<u64>) -> Result<Vec<String>> {
        let entries = self
            .client
            .scan(
                AUTHORITY_ISSUER_CONTROLLER,
                ScanRequest {
                    prefix: ACTIVE_PREFIX.to_string(),
                    offset,
                    limit,
                    at_height,
                },
            )
            .await?;
        entries
            .into_iter()
            .map(|(key, value)| String::from_utf8(value).map_err(|e| corrupt(&key, e)))
            .collect()
    }

    /// Builds the single transaction registering `issuer`.
    ///
    /// `entry` and `sequence` are the versions observed while validating; the
    /// ledger rejects the transaction if either moved in the meantime.
    pub fn register_tx(
        &self,
        sender: &str,
        issuer: &AuthorityIssuer,
        registrar_role: Role,
        entry: &Versioned<IssuerEntry>,
        sequence: &Versioned<u64>,
    ) -> Result<Transaction> {
        let record = issuer_record::encode(issuer)
            .map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
        let next = sequence.value.unwrap_or(0);
        let new_entry = IssuerEntry {
            sequence: next,
            active: true,
            registrar_role,
            registered_by: sender.to_string(),
        };
        let entry_bytes = encode_json("issuer entry", &new_entry)?;

        Ok(Transaction::new(sender, "registerAuthorityIssuer")
            .expect(AUTHORITY_ISSUER_CONTROLLER, &entry_key(&issuer.we_id), entry.version)
            .expect(AUTHORITY_ISSUER_CONTROLLER, SEQUENCE_KEY, sequence.version)
            .put(AUTHORITY_ISSUER_CONTROLLER, &record_key(&issuer.we_id), record)
            .put(AUTHORITY_ISSUER_CONTROLLER, &entry_key(&issuer.we_id), entry_bytes)
            .put(AUTHORITY_ISSUER_CONTROLLER, &active_key(next), issuer.we_id.as_bytes().to_vec())
            .put(AUTHORITY_ISSUER_CONTROLLER, SEQUENCE_KEY, encode_u64(next + 1)))
    }

    /// Builds the tombstone transaction for an active issuer.
    pub fn tombstone_tx(
        &self,
        sender: &str,
        we_id: &str,
        entry: &Versioned<IssuerEntry>,
        current: &IssuerEntry,
    ) -> Result<Transaction> {
        let tombstone = IssuerEntry {
            active: false,
            ..current.clone()
        };
        let entry_bytes = encode_json("issuer entry", &tombstone)?;
        Ok(Transaction::new(sender, "removeAuthorityIssuer")
            .expect(AUTHORITY_ISSUER_CONTROLLER, &entry_key(we_id), entry.version)
            .put(AUTHORITY_ISSUER_CONTROLLER, &entry_key(we_id), entry_bytes)
            .delete(AUTHORITY_ISSUER_CONTROLLER, &active_key(current.sequence)))
    }
}
