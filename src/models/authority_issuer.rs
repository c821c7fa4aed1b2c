// src/models/authority_issuer.rs
//! Authority issuer data model.
//!
//! An authority issuer is a WeIdentity DID that the governing party has
//! authorized to issue verifiable credentials.

use serde::{Deserialize, Serialize};

/// An authority issuer as stored on chain.
///
/// # Fields
/// - `we_id`: the issuer's WeIdentity DID, primary key of the registry
/// - `name`: human-readable label, at most 32 bytes (one `bytes32` slot)
/// - `created`: registration timestamp in seconds since the Unix epoch
/// - `acc_value`: accumulator state bytes attached to the issuer
///
/// The last three fields are persisted together as one record; see
/// [`crate::contracts::issuer_record`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityIssuer {
    /// WeIdentity DID of the issuer
    /// Example: "did:weid:101:0x39e5e6f663ef77409144014ceb063713b65600e7"
    pub we_id: String,

    /// Display name, immutable once registered
    pub name: String,

    /// Creation timestamp (seconds). Zero at registration means "now".
    #[serde(default)]
    pub created: u64,

    /// Accumulator value bytes. Empty at registration means "empty digest".
    #[serde(default, with = "hex_bytes")]
    pub acc_value: Vec<u8>,
}

impl AuthorityIssuer {
    pub fn new(we_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            we_id: we_id.into(),
            name: name.into(),
            created: 0,
            acc_value: Vec::new(),
        }
    }

    pub fn with_created(mut self, created: u64) -> Self {
        self.created = created;
        self
    }

    pub fn with_acc_value(mut self, acc_value: Vec<u8>) -> Self {
        self.acc_value = acc_value;
        self
    }
}

/// Credential presented by a caller.
///
/// The registry treats it as opaque: the only thing it inspects is the DID,
/// which is looked up against the privilege grants held on chain. Signing of
/// the resulting transaction happens outside this crate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeIdAuthentication {
    pub we_id: String,
}

impl WeIdAuthentication {
    pub fn new(we_id: impl Into<String>) -> Self {
        Self { we_id: we_id.into() }
    }
}

/// Arguments for registering an authority issuer.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAuthorityIssuerArgs {
    pub authority_issuer: AuthorityIssuer,
    pub caller: WeIdAuthentication,
}

/// Arguments for removing an authority issuer.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAuthorityIssuerArgs {
    pub we_id: String,
    pub caller: WeIdAuthentication,
}

/// Hex (de)serialization for byte fields in JSON payloads.
pub(crate) mod hex_bytes {
    use ethers_core::utils::hex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let stripped = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_uses_camel_case_and_hex() {
        let issuer = AuthorityIssuer::new("did:weid:001", "Acme")
            .with_created(1_700_000_000)
            .with_acc_value(vec![0xde, 0xad]);
        let json = serde_json::to_value(&issuer).unwrap();
        assert_eq!(json["weId"], "did:weid:001");
        assert_eq!(json["accValue"], "0xdead");
        assert_eq!(json["created"], 1_700_000_000u64);

        let back: AuthorityIssuer = serde_json::from_value(json).unwrap();
        assert_eq!(back, issuer);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let issuer: AuthorityIssuer =
            serde_json::from_str(r#"{"weId":"did:weid:002","name":"Beta"}"#).unwrap();
        assert_eq!(issuer.created, 0);
        assert!(issuer.acc_value.is_empty());
    }
}
