// src/services/authority_issuer_service.rs
//! Authority issuer registry.
//!
//! Registers, removes, looks up and lists the DIDs allowed to issue
//! credentials. Every check that can fail locally runs before anything is
//! submitted, so a rejected request never consumes a ledger transaction.

use super::authorization::{PrivilegeChecker, PrivilegeScope, Role};
use super::{page_limit, DEFAULT_MAX_PAGE_SIZE};
use crate::accumulator::RsaAccumulator;
use crate::blockchain::gateway::Transaction;
use crate::blockchain::ledger_client::LedgerClient;
use crate::contracts::authority_issuer::AuthorityIssuerContract;
use crate::contracts::issuer_record;
use crate::error::{RegistryError, Result};
use crate::models::{AuthorityIssuer, RegisterAuthorityIssuerArgs, RemoveAuthorityIssuerArgs};
use crate::utils::validation::{is_valid_we_id, validate_we_id};
use chrono::Utc;
use ethers_core::utils::hex;
use log::{debug, info};
use std::sync::Arc;

/// Service for managing authority issuers on the ledger.
pub struct AuthorityIssuerService {
    contract: AuthorityIssuerContract,
    checker: Arc<dyn PrivilegeChecker>,
    engine: Arc<RsaAccumulator>,
    max_page_size: usize,
}

impl AuthorityIssuerService {
    /// Creates a new `AuthorityIssuerService`.
    ///
    /// # Arguments
    /// * `client` - Ledger client the registry reads and writes through
    /// * `checker` - Source of caller privileges
    /// * `engine` - Accumulator whose empty digest seeds new records
    pub fn new(client: LedgerClient, checker: Arc<dyn PrivilegeChecker>, engine: Arc<RsaAccumulator>) -> Self {
        Self {
            contract: AuthorityIssuerContract::new(client),
            checker,
            engine,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Caps the page size of [`Self::get_all_authority_issuer_list`].
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Builds the transaction that registers `args.authority_issuer`, without
    /// submitting it.
    ///
    /// The result can be signed offline, rendered with
    /// [`Transaction::to_hex`] and later passed to
    /// [`Self::register_authority_issuer_raw`].
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed DID or a name that does not fit
    /// - `Unauthorized` if the caller holds no registrar privilege
    /// - `AlreadyExists` if the DID is already an active authority issuer
    pub async fn build_register_transaction(&self, args: &RegisterAuthorityIssuerArgs) -> Result<Transaction> {
        let caller = &args.caller;
        let mut issuer = args.authority_issuer.clone();
        validate_we_id(&issuer.we_id)?;
        validate_we_id(&caller.we_id)?;
        issuer_record::name_to_slot(&issuer.name).map_err(|e| RegistryError::invalid(e.to_string()))?;

        if !self.checker.has_privilege(caller, &PrivilegeScope::Registrar).await? {
            return Err(RegistryError::unauthorized(format!(
                "{} lacks registrar privilege",
                caller.we_id
            )));
        }
        let role = self.checker.highest_role(caller).await?.unwrap_or(Role::Registrar);

        let entry = self.contract.entry(&issuer.we_id, None).await?;
        if entry.value.as_ref().map_or(false, |e| e.active) {
            return Err(RegistryError::AlreadyExists(format!(
                "{} is already an authority issuer",
                issuer.we_id
            )));
        }
        let sequence = self.contract.sequence(None).await?;

        if issuer.created == 0 {
            issuer.created = Utc::now().timestamp().max(0) as u64;
        }
        if issuer.acc_value.is_empty() {
            issuer.acc_value = self.engine.empty_digest().to_bytes();
        }
        self.contract
            .register_tx(&caller.we_id, &issuer, role, &entry, &sequence)
    }

    /// Registers a new authority issuer.
    ///
    /// The three record fields, the active index entry and the sequence
    /// counter are committed in one transaction.
    ///
    /// # Returns
    /// `true` once the registration is committed.
    pub async fn register_authority_issuer(&self, args: RegisterAuthorityIssuerArgs) -> Result<bool> {
        let tx = self.build_register_transaction(&args).await?;
        let receipt = self.contract.client().send_transaction(tx).await?;
        info!(
            "registered authority issuer {} by {} in {}",
            args.authority_issuer.we_id,
            args.caller.we_id,
            receipt.tx_hash_hex()
        );
        Ok(true)
    }

    /// Forwards a pre-built, externally signed registration verbatim.
    ///
    /// No local validation is performed; the ledger still applies the payload
    /// atomically or not at all.
    ///
    /// # Returns
    /// The `0x`-prefixed hash of the committed transaction.
    pub async fn register_authority_issuer_raw(&self, transaction_hex: &str) -> Result<String> {
        let trimmed = transaction_hex.trim();
        let payload = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let raw = hex::decode(payload)
            .map_err(|e| RegistryError::invalid(format!("transaction payload is not hex: {}", e)))?;
        if raw.is_empty() {
            return Err(RegistryError::invalid("transaction payload is empty"));
        }
        let receipt = self.contract.client().send_raw_transaction(&raw).await?;
        let tx_hash = receipt.tx_hash_hex();
        info!("forwarded signed registration {}", tx_hash);
        Ok(tx_hash)
    }

    /// Tombstones an authority issuer. The record stays on the ledger.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller's role is below the role that
    ///   registered the issuer
    /// - `NotFound` if the DID is not an active authority issuer
    pub async fn remove_authority_issuer(&self, args: RemoveAuthorityIssuerArgs) -> Result<bool> {
        validate_we_id(&args.we_id)?;
        validate_we_id(&args.caller.we_id)?;

        let Some(caller_role) = self.checker.highest_role(&args.caller).await? else {
            return Err(RegistryError::unauthorized(format!(
                "{} holds no registry role",
                args.caller.we_id
            )));
        };

        let entry = self.contract.entry(&args.we_id, None).await?;
        let current = match &entry.value {
            Some(current) if current.active => current.clone(),
            _ => {
                return Err(RegistryError::not_found(format!(
                    "{} is not an authority issuer",
                    args.we_id
                )))
            }
        };
        if caller_role < current.registrar_role {
            return Err(RegistryError::unauthorized(format!(
                "{} was registered by a {:?}, {} is only a {:?}",
                args.we_id, current.registrar_role, args.caller.we_id, caller_role
            )));
        }

        let tx = self
            .contract
            .tombstone_tx(&args.caller.we_id, &args.we_id, &entry, &current)?;
        let receipt = self.contract.client().send_transaction(tx).await?;
        info!(
            "removed authority issuer {} by {} in {}",
            args.we_id,
            args.caller.we_id,
            receipt.tx_hash_hex()
        );
        Ok(true)
    }

    /// Whether `we_id` is an active authority issuer.
    ///
    /// Malformed, unknown and tombstoned DIDs are all simply `false`.
    pub async fn is_authority_issuer(&self, we_id: &str) -> Result<bool> {
        if !is_valid_we_id(we_id) {
            debug!("is_authority_issuer called with malformed DID {:?}", we_id);
            return Ok(false);
        }
        let entry = self.contract.entry(we_id, None).await?;
        Ok(entry.value.map_or(false, |e| e.active))
    }

    /// Version of `we_id`'s registry entry at `height`, for guarding a
    /// write that relies on the issuer staying active.
    ///
    /// # Errors
    /// `NotFound` unless `we_id` is an active authority issuer at `height`.
    pub async fn active_entry_version(&self, we_id: &str, height: u64) -> Result<Option<u64>> {
        let entry = self.contract.entry(we_id, Some(height)).await?;
        if !entry.value.map_or(false, |e| e.active) {
            return Err(RegistryError::not_found(format!(
                "{} is not an active authority issuer",
                we_id
            )));
        }
        Ok(entry.version)
    }

    /// Reads the full record of an active authority issuer from one ledger
    /// snapshot.
    pub async fn query_authority_issuer_info(&self, we_id: &str) -> Result<AuthorityIssuer> {
        validate_we_id(we_id)?;
        let height = self.contract.client().height().await?;
        let entry = self.contract.entry(we_id, Some(height)).await?;
        if !entry.value.map_or(false, |e| e.active) {
            return Err(RegistryError::not_found(format!(
                "{} is not an authority issuer",
                we_id
            )));
        }
        self.contract
            .record(we_id, Some(height))
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("no record stored for {}", we_id)))
    }

    /// Lists active authority issuers in registration order.
    ///
    /// # Arguments
    /// * `index` - Zero-based offset into the registration order
    /// * `num` - Page size, capped at the configured maximum
    ///
    /// # Returns
    /// At most `num` records, all read at the same ledger height. Empty once
    /// `index` runs past the end.
    pub async fn get_all_authority_issuer_list(&self, index: usize, num: usize) -> Result<Vec<AuthorityIssuer>> {
        let limit = page_limit(num, self.max_page_size)?;
        let height = self.contract.client().height().await?;
        let we_ids = self.contract.active_page(index, limit, Some(height)).await?;

        let mut issuers = Vec::with_capacity(we_ids.len());
        for we_id in we_ids {
            let record = self.contract.record(&we_id, Some(height)).await?.ok_or_else(|| {
                RegistryError::LedgerRejected(format!("active index lists {} without a record", we_id))
            })?;
            issuers.push(record);
        }
        Ok(issuers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory_ledger::InMemoryLedger;
    use crate::contracts::role_controller::RoleController;
    use crate::models::WeIdAuthentication;

    const ADMIN: &str = "did:weid:admin";
    const REGISTRAR: &str = "did:weid:registrar";

    async fn service() -> AuthorityIssuerService {
        let client = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        let roles = RoleController::new(client.clone());
        roles.bootstrap_administrator(ADMIN).await.unwrap();
        roles
            .grant(&WeIdAuthentication::new(ADMIN), REGISTRAR, &PrivilegeScope::Registrar)
            .await
            .unwrap();
        AuthorityIssuerService::new(client, Arc::new(roles), Arc::new(RsaAccumulator::default()))
    }

    fn register(we_id: &str, name: &str, caller: &str) -> RegisterAuthorityIssuerArgs {
        RegisterAuthorityIssuerArgs {
            authority_issuer: AuthorityIssuer::new(we_id, name).with_created(1_700_000_000),
            caller: WeIdAuthentication::new(caller),
        }
    }

    fn remove(we_id: &str, caller: &str) -> RemoveAuthorityIssuerArgs {
        RemoveAuthorityIssuerArgs {
            we_id: we_id.to_string(),
            caller: WeIdAuthentication::new(caller),
        }
    }

    #[tokio::test]
    async fn test_register_fills_defaults() {
        let service = service().await;
        let args = RegisterAuthorityIssuerArgs {
            authority_issuer: AuthorityIssuer::new("did:weid:002", "Defaults"),
            caller: WeIdAuthentication::new(REGISTRAR),
        };
        assert!(service.register_authority_issuer(args).await.unwrap());

        let stored = service.query_authority_issuer_info("did:weid:002").await.unwrap();
        assert!(stored.created > 0);
        assert_eq!(stored.acc_value, RsaAccumulator::default().empty_digest().to_bytes());
    }

    #[tokio::test]
    async fn test_validation_order() {
        let service = service().await;

        // Malformed input wins over missing privilege.
        let err = service
            .register_authority_issuer(register("weid:001", "Acme", "did:weid:nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        let err = service
            .register_authority_issuer(register("did:weid:001", "Acme", "did:weid:nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        service
            .register_authority_issuer(register("did:weid:001", "Acme", REGISTRAR))
            .await
            .unwrap();
        let err = service
            .register_authority_issuer(register("did:weid:001", "Acme", REGISTRAR))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_name_longer_than_slot_is_rejected() {
        let service = service().await;
        let err = service
            .register_authority_issuer(register("did:weid:001", &"n".repeat(33), REGISTRAR))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_removal_requires_registrar_role_or_above() {
        let service = service().await;
        service
            .register_authority_issuer(register("did:weid:001", "Acme", ADMIN))
            .await
            .unwrap();

        let err = service
            .remove_authority_issuer(remove("did:weid:001", REGISTRAR))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        assert!(service.remove_authority_issuer(remove("did:weid:001", ADMIN)).await.unwrap());
        let err = service
            .remove_authority_issuer(remove("did:weid:001", ADMIN))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reregistration_after_removal() {
        let service = service().await;
        service
            .register_authority_issuer(register("did:weid:001", "Acme", REGISTRAR))
            .await
            .unwrap();
        service
            .remove_authority_issuer(remove("did:weid:001", REGISTRAR))
            .await
            .unwrap();
        service
            .register_authority_issuer(register("did:weid:001", "Acme Two", REGISTRAR))
            .await
            .unwrap();

        let info = service.query_authority_issuer_info("did:weid:001").await.unwrap();
        assert_eq!(info.name, "Acme Two");
        let all = service.get_all_authority_issuer_list(0, 10).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_is_authority_issuer_never_fails_on_bad_input() {
        let service = service().await;
        assert!(!service.is_authority_issuer("").await.unwrap());
        assert!(!service.is_authority_issuer("not a did").await.unwrap());
        assert!(!service.is_authority_issuer("did:weid:unknown").await.unwrap());
    }

    #[tokio::test]
    async fn test_page_size_is_bounded() {
        let service = service().await.with_max_page_size(2);
        for i in 0..3 {
            service
                .register_authority_issuer(register(&format!("did:weid:{}", i), "Acme", REGISTRAR))
                .await
                .unwrap();
        }
        assert_eq!(service.get_all_authority_issuer_list(0, 100).await.unwrap().len(), 2);
        assert!(service.get_all_authority_issuer_list(5, 2).await.unwrap().is_empty());
        assert!(matches!(
            service.get_all_authority_issuer_list(0, 0).await,
            Err(RegistryError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_raw_payload_must_be_hex() {
        let service = service().await;
        assert!(matches!(
            service.register_authority_issuer_raw("0xnot-hex").await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.register_authority_issuer_raw("0x").await,
            Err(RegistryError::InvalidArgument(_))
        ));
    }
}
