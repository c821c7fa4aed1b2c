// src/models/issuer_type.rs
//! Issuer type data model.
//!
//! Issuer types ("KYC", "certification", ...) classify authority issuers.
//! Membership is committed into an accumulator digest; the types below are
//! the projections handed back to callers.

use serde::{Deserialize, Serialize};

/// One `(weId, typeName)` pair of a paginated type listing.
///
/// Not persisted on its own; derived from the type's membership index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerDescription {
    pub we_id: String,
    pub type_name: String,
}

/// Kind of membership change recorded in a type's event log.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipOp {
    Added,
    Removed,
}

/// Entry of the append-only membership log of an issuer type.
///
/// Each event produced exactly one digest version, `version`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipEvent {
    pub version: u64,
    pub op: MembershipOp,
    pub we_id: String,
}

/// A digest snapshot of a type's accumulator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DigestSnapshot {
    pub type_name: String,
    pub version: u64,
    #[serde(with = "crate::models::authority_issuer::hex_bytes")]
    pub digest: Vec<u8>,
}

/// Membership witness for one DID against one digest version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipProof {
    pub type_name: String,
    pub we_id: String,
    pub version: u64,
    #[serde(with = "crate::models::authority_issuer::hex_bytes")]
    pub witness: Vec<u8>,
}
