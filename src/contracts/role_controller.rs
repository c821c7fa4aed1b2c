// src/contracts/role_controller.rs
//! Ledger-tracked privilege grants.
//!
//! Keys under [`ROLE_CONTROLLER`]:
//! - `bootstrap`: weId of the first administrator, written exactly once
//! - `grant/<scope>/<weId>`: a [`Grant`], deleted on revocation

use super::{encode_json, read_json, Versioned};
use crate::blockchain::gateway::Transaction;
use crate::blockchain::ledger_client::LedgerClient;
use crate::error::{RegistryError, Result};
use crate::models::WeIdAuthentication;
use crate::services::authorization::{PrivilegeChecker, PrivilegeScope, Role};
use crate::utils::validation::validate_we_id;
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

/// Contract address of the role registry.
pub const ROLE_CONTROLLER: &str = "RoleController";

const BOOTSTRAP_KEY: &str = "bootstrap";

pub fn grant_key(scope: &PrivilegeScope, we_id: &str) -> String {
    format!("grant/{}/{}", scope.storage_key(), we_id)
}

/// One stored grant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub granted_by: String,
    /// Unix seconds.
    pub granted_at: i64,
}

/// Reads and changes privilege grants.
#[derive(Clone)]
pub struct RoleController {
    client: LedgerClient,
}

impl RoleController {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    /// Installs the first administrator.
    ///
    /// # Errors
    /// `AlreadyExists` once any administrator has been bootstrapped, including
    /// when a concurrent bootstrap wins the race.
    pub async fn bootstrap_administrator(&self, we_id: &str) -> Result<String> {
        validate_we_id(we_id)?;
        let current = self.client.read(ROLE_CONTROLLER, BOOTSTRAP_KEY, None).await?;
        if current.is_some() {
            return Err(RegistryError::AlreadyExists("administrator already bootstrapped".into()));
        }

        let tx = Transaction::new(we_id, "bootstrapAdministrator")
            .expect(ROLE_CONTROLLER, BOOTSTRAP_KEY, None)
            .put(ROLE_CONTROLLER, BOOTSTRAP_KEY, we_id.as_bytes().to_vec());
        let tx = with_grant(tx, &PrivilegeScope::Administrator, we_id, we_id)?;

        match self.client.send_transaction(tx).await {
            Ok(receipt) => {
                info!("bootstrapped administrator {}", we_id);
                Ok(receipt.tx_hash_hex())
            }
            Err(RegistryError::Conflict { .. }) => {
                Err(RegistryError::AlreadyExists("administrator already bootstrapped".into()))
            }
            Err(e) => Err(e),
        }
    }

    /// Grants `scope` to `target`. Returns `false` if it was already held.
    ///
    /// # Errors
    /// `Unauthorized` unless `caller` is an administrator, or is granting
    /// `TypeAdmin(t)` while holding `TypeAdmin(t)` itself.
    pub async fn grant(&self, caller: &WeIdAuthentication, target: &str, scope: &PrivilegeScope) -> Result<bool> {
        validate_we_id(target)?;
        self.ensure_may_manage(caller, scope).await?;

        let key = grant_key(scope, target);
        let existing: Versioned<Grant> = read_json(&self.client, ROLE_CONTROLLER, &key, None).await?;
        if existing.value.is_some() {
            return Ok(false);
        }

        let tx = Transaction::new(&caller.we_id, "grantRole").expect(ROLE_CONTROLLER, &key, existing.version);
        let tx = with_grant(tx, scope, target, &caller.we_id)?;
        self.client.send_transaction(tx).await?;
        info!("{} granted {} to {}", caller.we_id, scope, target);
        Ok(true)
    }

    /// Revokes `scope` from `target`. Returns `false` if it was not held.
    pub async fn revoke(&self, caller: &WeIdAuthentication, target: &str, scope: &PrivilegeScope) -> Result<bool> {
        validate_we_id(target)?;
        self.ensure_may_manage(caller, scope).await?;

        let key = grant_key(scope, target);
        let existing: Versioned<Grant> = read_json(&self.client, ROLE_CONTROLLER, &key, None).await?;
        if existing.value.is_none() {
            return Ok(false);
        }

        let tx = Transaction::new(&caller.we_id, "revokeRole")
            .expect(ROLE_CONTROLLER, &key, existing.version)
            .delete(ROLE_CONTROLLER, &key);
        self.client.send_transaction(tx).await?;
        info!("{} revoked {} from {}", caller.we_id, scope, target);
        Ok(true)
    }

    /// Whether `we_id` holds exactly `scope`, ignoring stronger grants.
    pub async fn holds(&self, we_id: &str, scope: &PrivilegeScope) -> Result<bool> {
        Ok(self
            .client
            .read_value(ROLE_CONTROLLER, &grant_key(scope, we_id), None)
            .await?
            .is_some())
    }

    async fn ensure_may_manage(&self, caller: &WeIdAuthentication, scope: &PrivilegeScope) -> Result<()> {
        if self.holds(&caller.we_id, &PrivilegeScope::Administrator).await? {
            return Ok(());
        }
        if let PrivilegeScope::TypeAdmin(_) = scope {
            if self.holds(&caller.we_id, scope).await? {
                return Ok(());
            }
        }
        Err(RegistryError::unauthorized(format!(
            "{} may not manage {}",
            caller.we_id, scope
        )))
    }
}

/// Adds the write recording `scope` for `target` to `tx`.
pub fn with_grant(tx: Transaction, scope: &PrivilegeScope, target: &str, granted_by: &str) -> Result<Transaction> {
    let grant = Grant {
        granted_by: granted_by.to_string(),
        granted_at: Utc::now().timestamp(),
    };
    let bytes = encode_json("grant", &grant)?;
    Ok(tx.put(ROLE_CONTROLLER, &grant_key(scope, target), bytes))
}

#[async_trait]
impl PrivilegeChecker for RoleController {
    async fn has_privilege(&self, auth: &WeIdAuthentication, scope: &PrivilegeScope) -> Result<bool> {
        if self.holds(&auth.we_id, &PrivilegeScope::Administrator).await? {
            return Ok(true);
        }
        match scope {
            PrivilegeScope::Administrator => Ok(false),
            other => self.holds(&auth.we_id, other).await,
        }
    }

    async fn highest_role(&self, auth: &WeIdAuthentication) -> Result<Option<Role>> {
        for role in [Role::Administrator, Role::Registrar] {
            if self.holds(&auth.we_id, &role.scope()).await? {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }
}
