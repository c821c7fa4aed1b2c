// src/utils/validation.rs
//! Input validation for DIDs and issuer type names.

use crate::error::{RegistryError, Result};

/// Prefix every WeIdentity DID starts with.
pub const WEID_PREFIX: &str = "did:weid:";

/// Upper bound on the length of a DID string.
pub const MAX_WEID_LENGTH: usize = 128;

/// Upper bound on the length of an issuer type name.
pub const MAX_TYPE_NAME_LENGTH: usize = 32;

/// Checks that `we_id` is a syntactically valid WeIdentity DID.
///
/// Accepted form: `did:weid:` followed by a non-empty method-specific id of
/// ASCII alphanumerics and `:`, `.`, `_`, `-`.
pub fn validate_we_id(we_id: &str) -> Result<()> {
    if we_id.len() > MAX_WEID_LENGTH {
        return Err(RegistryError::invalid(format!(
            "weId exceeds {} bytes",
            MAX_WEID_LENGTH
        )));
    }
    let specific = we_id
        .strip_prefix(WEID_PREFIX)
        .ok_or_else(|| RegistryError::invalid(format!("weId must start with {}", WEID_PREFIX)))?;
    if specific.is_empty() {
        return Err(RegistryError::invalid("weId has an empty method-specific id"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-');
    if !specific.chars().all(allowed) {
        return Err(RegistryError::invalid(format!(
            "weId contains illegal characters: {}",
            we_id
        )));
    }
    Ok(())
}

/// Non-throwing variant used by lookups that must answer `false` on bad input.
pub fn is_valid_we_id(we_id: &str) -> bool {
    validate_we_id(we_id).is_ok()
}

/// Checks that `type_name` is a valid issuer type name.
pub fn validate_type_name(type_name: &str) -> Result<()> {
    if type_name.is_empty() || type_name.len() > MAX_TYPE_NAME_LENGTH {
        return Err(RegistryError::invalid(format!(
            "issuer type name must be 1..={} bytes",
            MAX_TYPE_NAME_LENGTH
        )));
    }
    if !type_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RegistryError::invalid(format!(
            "issuer type name contains illegal characters: {}",
            type_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_weid_forms() {
        assert!(validate_we_id("did:weid:001").is_ok());
        assert!(validate_we_id("did:weid:101:0x39e5e6f663ef77409144014ceb063713b65600e7").is_ok());
    }

    #[test]
    fn test_rejects_malformed_weids() {
        for bad in ["", "did:weid:", "did:example:1", "weid:001", "did:weid:a b", "did:weid:x/y"] {
            let err = validate_we_id(bad).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidArgument(_)), "{}", bad);
        }
        let long = format!("did:weid:{}", "a".repeat(MAX_WEID_LENGTH));
        assert!(!is_valid_we_id(&long));
    }

    #[test]
    fn test_type_names() {
        assert!(validate_type_name("KYC").is_ok());
        assert!(validate_type_name("college_cert-2").is_ok());
        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("has space").is_err());
        assert!(validate_type_name(&"x".repeat(33)).is_err());
    }
}
