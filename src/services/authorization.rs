// src/services/authorization.rs
//! Privilege model shared by the registry services.
//!
//! Grants live on the ledger (see `contracts::role_controller`); services only
//! ask a [`PrivilegeChecker`] whether a caller may act.

use crate::error::Result;
use crate::models::WeIdAuthentication;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry-wide roles, ordered by strength.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Registrar,
    Administrator,
}

impl Role {
    /// The scope a holder of this role is granted under.
    pub fn scope(self) -> PrivilegeScope {
        match self {
            Role::Registrar => PrivilegeScope::Registrar,
            Role::Administrator => PrivilegeScope::Administrator,
        }
    }
}

/// What a caller is asking to do.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "scope", content = "typeName", rename_all = "camelCase")]
pub enum PrivilegeScope {
    Administrator,
    Registrar,
    /// Modify-rights on one issuer type.
    TypeAdmin(String),
}

impl PrivilegeScope {
    /// Stable key fragment under which grants of this scope are stored.
    pub fn storage_key(&self) -> String {
        match self {
            PrivilegeScope::Administrator => "administrator".to_string(),
            PrivilegeScope::Registrar => "registrar".to_string(),
            PrivilegeScope::TypeAdmin(type_name) => format!("type-admin/{}", type_name),
        }
    }
}

impl fmt::Display for PrivilegeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivilegeScope::Administrator => write!(f, "Administrator"),
            PrivilegeScope::Registrar => write!(f, "Registrar"),
            PrivilegeScope::TypeAdmin(type_name) => write!(f, "TypeAdmin({})", type_name),
        }
    }
}

/// Answers `hasPrivilege(callerAuth, scope)`.
#[async_trait]
pub trait PrivilegeChecker: Send + Sync {
    /// Whether `auth` currently holds `scope`, directly or through a
    /// stronger grant.
    async fn has_privilege(&self, auth: &WeIdAuthentication, scope: &PrivilegeScope) -> Result<bool>;

    /// The strongest registry-wide role `auth` holds, if any.
    async fn highest_role(&self, auth: &WeIdAuthentication) -> Result<Option<Role>>;
}
