// src/contracts/specific_issuer.rs
//! Issuer-type storage.
//!
//! The accumulator contract, [`SPECIFIC_ISSUER_CONTROLLER`], holds per type:
//! - `type/<t>/meta`: [`TypeMeta`], written once at creation
//! - `type/<t>/head`: current digest version
//! - `type/<t>/digest/<v>`: immutable digest snapshot of version `v`
//!
//! The member set itself is never written there. Enumeration and witness
//! replay use a separate index, [`SPECIFIC_ISSUER_INDEX`]:
//! - `type/<t>/log/<v>`: the membership event that produced version `v`
//! - `type/<t>/member/<weId>`: [`MemberEntry`] while the DID is a member
//! - `type/<t>/order/<v>`: weId added at version `v`, while still a member
//! - `type/<t>/witness/<weId>`: [`WitnessCheckpoint`] of a member, refreshed
//!   for every member each [`WITNESS_CHECKPOINT_INTERVAL`] versions
//!
//! Every membership change is one transaction that bumps `head` under a
//! version precondition, so two changes built from the same digest can never
//! both commit.

use super::{encode_json, read_json, Versioned};
use crate::accumulator::{Digest, Witness};
use crate::blockchain::gateway::{ScanRequest, Transaction};
use crate::blockchain::ledger_client::{corrupt, LedgerClient};
use crate::error::{RegistryError, Result};
use crate::models::{MembershipEvent, MembershipOp};
use crate::utils::serialization::{decode_u64, encode_u64, from_bytes, ordinal_key};
use serde::{Deserialize, Serialize};

/// Contract address holding the versioned accumulator digests.
pub const SPECIFIC_ISSUER_CONTROLLER: &str = "SpecificIssuerController";
/// Contract address holding the enumerable membership index.
pub const SPECIFIC_ISSUER_INDEX: &str = "SpecificIssuerIndex";

/// Digest versions between two rounds of witness checkpoints.
pub const WITNESS_CHECKPOINT_INTERVAL: u64 = 16;

fn meta_key(type_name: &str) -> String {
    format!("type/{}/meta", type_name)
}

fn head_key(type_name: &str) -> String {
    format!("type/{}/head", type_name)
}

fn digest_key(type_name: &str, version: u64) -> String {
    format!("type/{}/digest/{}", type_name, ordinal_key(version))
}

fn log_prefix(type_name: &str) -> String {
    format!("type/{}/log/", type_name)
}

fn member_key(type_name: &str, we_id: &str) -> String {
    format!("type/{}/member/{}", type_name, we_id)
}

fn order_prefix(type_name: &str) -> String {
    format!("type/{}/order/", type_name)
}

fn witness_key(type_name: &str, we_id: &str) -> String {
    format!("type/{}/witness/{}", type_name, we_id)
}

/// Creation metadata of an issuer type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    pub created_by: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Index entry of a current member.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    /// Digest version produced by the member's addition.
    pub added_at: u64,
}

/// A member's witness against the digest of `version`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WitnessCheckpoint {
    pub version: u64,
    #[serde(with = "crate::models::authority_issuer::hex_bytes")]
    pub witness: Vec<u8>,
}

/// Typed access to the issuer-type contracts.
#[derive(Clone)]
pub struct SpecificIssuerContract {
    client: LedgerClient,
}

impl SpecificIssuerContract {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    pub async fn meta(&self, type_name: &str, at_height: Option<u64>) -> Result<Versioned<TypeMeta>> {
        read_json(&self.client, SPECIFIC_ISSUER_CONTROLLER, &meta_key(type_name), at_height).await
    }

    /// Current digest version of `type_name`; `value` is `None` for an
    /// unknown type.
    pub async fn head(&self, type_name: &str, at_height: Option<u64>) -> Result<Versioned<u64>> {
        let key = head_key(type_name);
        let Some(state) = self.client.read(SPECIFIC_ISSUER_CONTROLLER, &key, at_height).await? else {
            return Ok(Versioned::absent());
        };
        let value = match state.value {
            Some(bytes) => Some(decode_u64(&bytes).ok_or_else(|| corrupt(&key, "bad width"))?),
            None => None,
        };
        Ok(Versioned {
            version: Some(state.version),
            value,
        })
    }

    /// Digest snapshot of `version`.
    pub async fn digest(&self, type_name: &str, version: u64, at_height: Option<u64>) -> Result<Option<Digest>> {
        let key = digest_key(type_name, version);
        match self
            .client
            .read_value(SPECIFIC_ISSUER_CONTROLLER, &key, at_height)
            .await?
        {
            Some(bytes) => Digest::from_bytes(&bytes).map(Some).map_err(|e| corrupt(&key, e)),
            None => Ok(None),
        }
    }

    pub async fn member(&self, type_name: &str, we_id: &str, at_height: Option<u64>) -> Result<Versioned<MemberEntry>> {
        read_json(&self.client, SPECIFIC_ISSUER_INDEX, &member_key(type_name, we_id), at_height).await
    }

    /// Latest witness checkpoint stored for `we_id`. It may predate a later
    /// re-addition; callers compare its version with the member entry.
    pub async fn witness_checkpoint(
        &self,
        type_name: &str,
        we_id: &str,
        at_height: Option<u64>,
    ) -> Result<Option<WitnessCheckpoint>> {
        Ok(read_json(&self.client, SPECIFIC_ISSUER_INDEX, &witness_key(type_name, we_id), at_height)
            .await?
            .value)
    }

    /// Membership events with versions in `(after, up_to]`, oldest first.
    pub async fn events(
        &self,
        type_name: &str,
        after: u64,
        up_to: u64,
        at_height: Option<u64>,
    ) -> Result<Vec<MembershipEvent>> {
        if up_to <= after {
            return Ok(Vec::new());
        }
        // Log keys start at version 1 and are never deleted, so the n-th
        // live key holds version n + 1.
        let entries = self
            .client
            .scan(
                SPECIFIC_ISSUER_INDEX,
                ScanRequest {
                    prefix: log_prefix(type_name),
                    offset: after as usize,
                    limit: (up_to - after) as usize,
                    at_height,
                },
            )
            .await?;
        let events = entries
            .into_iter()
            .map(|(key, bytes)| from_bytes::<MembershipEvent>(&bytes).map_err(|e| corrupt(&key, e)))
            .collect::<Result<Vec<_>>>()?;

        for (expected, event) in (after + 1..).zip(&events) {
            if event.version != expected {
                return Err(corrupt(
                    &log_prefix(type_name),
                    format!("expected event {} but found {}", expected, event.version),
                ));
            }
        }
        Ok(events)
    }

    /// Current members in order of addition.
    pub async fn order_page(
        &self,
        type_name: &str,
        offset: usize,
        limit: usize,
        at_height: Option<u64>,
    ) -> Result<Vec<String>> {
        let entries = self
            .client
            .scan(
                SPECIFIC_ISSUER_INDEX,
                ScanRequest {
                    prefix: order_prefix(type_name),
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

    /// Creates `type_name` with digest version 0 set to `empty`.
    pub fn create_type_tx(&self, sender: &str, type_name: &str, empty: &Digest, meta: &TypeMeta) -> Result<Transaction> {
        let meta_bytes = encode_json("type meta", meta)?;
        Ok(Transaction::new(sender, "registerIssuerType")
            .expect(SPECIFIC_ISSUER_CONTROLLER, &meta_key(type_name), None)
            .put(SPECIFIC_ISSUER_CONTROLLER, &meta_key(type_name), meta_bytes)
            .put(SPECIFIC_ISSUER_CONTROLLER, &head_key(type_name), encode_u64(0))
            .put(SPECIFIC_ISSUER_CONTROLLER, &digest_key(type_name, 0), empty.to_bytes()))
    }

    /// Commits `new_digest` as the version after `head`, recording `we_id` as
    /// added.
    pub fn add_member_tx(
        &self,
        sender: &str,
        type_name: &str,
        we_id: &str,
        head: &Versioned<u64>,
        member: &Versioned<MemberEntry>,
        new_digest: &Digest,
    ) -> Result<Transaction> {
        let version = head.value.unwrap_or(0) + 1;
        let event = MembershipEvent {
            version,
            op: MembershipOp::Added,
            we_id: we_id.to_string(),
        };
        let tx = self
            .advance(Transaction::new(sender, "addIssuerIntoIssuerType"), type_name, head, new_digest, &event)?
            .expect(SPECIFIC_ISSUER_INDEX, &member_key(type_name, we_id), member.version)
            .put(
                SPECIFIC_ISSUER_INDEX,
                &member_key(type_name, we_id),
                encode_json("member entry", &MemberEntry { added_at: version })?,
            )
            .put(
                SPECIFIC_ISSUER_INDEX,
                &format!("{}{}", order_prefix(type_name), ordinal_key(version)),
                we_id.as_bytes().to_vec(),
            );
        Ok(tx)
    }

    /// Commits `new_digest` as the version after `head`, recording `we_id` as
    /// removed. `member` must hold the live entry of `we_id`.
    pub fn remove_member_tx(
        &self,
        sender: &str,
        type_name: &str,
        we_id: &str,
        head: &Versioned<u64>,
        member: &Versioned<MemberEntry>,
        new_digest: &Digest,
    ) -> Result<Transaction> {
        let entry = member
            .value
            .ok_or_else(|| RegistryError::not_found(format!("{} is not a member of {}", we_id, type_name)))?;
        let version = head.value.unwrap_or(0) + 1;
        let event = MembershipEvent {
            version,
            op: MembershipOp::Removed,
            we_id: we_id.to_string(),
        };
        let tx = self
            .advance(Transaction::new(sender, "removeIssuerFromIssuerType"), type_name, head, new_digest, &event)?
            .expect(SPECIFIC_ISSUER_INDEX, &member_key(type_name, we_id), member.version)
            .delete(SPECIFIC_ISSUER_INDEX, &member_key(type_name, we_id))
            .delete(
                SPECIFIC_ISSUER_INDEX,
                &format!("{}{}", order_prefix(type_name), ordinal_key(entry.added_at)),
            )
            .delete(SPECIFIC_ISSUER_INDEX, &witness_key(type_name, we_id));
        Ok(tx)
    }

    /// Adds a refreshed witness of every member in `checkpoints` to `tx`.
    /// Only valid inside the transaction that produces `version`.
    pub fn with_witness_checkpoints(
        &self,
        mut tx: Transaction,
        type_name: &str,
        version: u64,
        checkpoints: &[(String, Witness)],
    ) -> Result<Transaction> {
        for (we_id, witness) in checkpoints {
            let checkpoint = WitnessCheckpoint {
                version,
                witness: witness.to_bytes(),
            };
            tx = tx.put(
                SPECIFIC_ISSUER_INDEX,
                &witness_key(type_name, we_id),
                encode_json("witness checkpoint", &checkpoint)?,
            );
        }
        Ok(tx)
    }

    fn advance(
        &self,
        tx: Transaction,
        type_name: &str,
        head: &Versioned<u64>,
        new_digest: &Digest,
        event: &MembershipEvent,
    ) -> Result<Transaction> {
        let version = event.version;
        Ok(tx
            .expect(SPECIFIC_ISSUER_CONTROLLER, &head_key(type_name), head.version)
            .expect(SPECIFIC_ISSUER_CONTROLLER, &digest_key(type_name, version), None)
            .put(SPECIFIC_ISSUER_CONTROLLER, &head_key(type_name), encode_u64(version))
            .put(SPECIFIC_ISSUER_CONTROLLER, &digest_key(type_name, version), new_digest.to_bytes())
            .put(
                SPECIFIC_ISSUER_INDEX,
                &format!("{}{}", log_prefix(type_name), ordinal_key(version)),
                encode_json("membership event", event)?,
            ))
    }
}
