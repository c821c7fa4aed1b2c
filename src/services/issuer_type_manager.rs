// src/services/issuer_type_manager.rs
//! Issuer-type membership.
//!
//! Each issuer type is an RSA accumulator whose digest moves forward one
//! version per membership change. Membership checks recompute the member's
//! witness from its latest checkpoint (or its addition) and verify it against
//! the current digest. Every [`WITNESS_CHECKPOINT_INTERVAL`] versions the
//! committing change also refreshes every member's checkpoint, so a check
//! never replays more than one interval of events. The member list itself is
//! only read for pagination and by those checkpoint rounds.
//!
//! Changes are built against an observed digest version and committed under
//! a version precondition. When two changes race, the ledger keeps the first
//! and the second fails with `Conflict`; nothing is retried here.

use super::authorization::{PrivilegeChecker, PrivilegeScope};
use super::{page_limit, AuthorityIssuerService, DEFAULT_MAX_PAGE_SIZE};
use crate::accumulator::{witness_from_history, Digest, HistoryEntry, RsaAccumulator, Witness};
use crate::blockchain::gateway::Transaction;
use crate::blockchain::ledger_client::{corrupt, LedgerClient};
use crate::contracts::authority_issuer::{entry_key, AUTHORITY_ISSUER_CONTROLLER};
use crate::contracts::role_controller::with_grant;
use crate::contracts::specific_issuer::{
    MemberEntry, SpecificIssuerContract, TypeMeta, WITNESS_CHECKPOINT_INTERVAL,
};
use crate::error::{RegistryError, Result};
use crate::models::{DigestSnapshot, IssuerDescription, MembershipOp, MembershipProof, WeIdAuthentication};
use crate::utils::validation::{is_valid_we_id, validate_type_name, validate_we_id};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

/// A membership change built against one digest version, not yet submitted.
#[derive(Debug, Clone)]
pub struct MembershipUpdate {
    pub type_name: String,
    pub we_id: String,
    pub op: MembershipOp,
    /// Digest version the change was built on.
    pub base_version: u64,
    pub transaction: Transaction,
}

/// Current digest, version and a member's witness, all from one snapshot.
struct MemberState {
    version: u64,
    digest: Digest,
    witness: Witness,
    /// Events replayed on top of the starting witness.
    replayed: usize,
}

/// Manages named issuer types and their accumulator-backed membership.
pub struct IssuerTypeManager {
    contract: SpecificIssuerContract,
    checker: Arc<dyn PrivilegeChecker>,
    issuers: Arc<AuthorityIssuerService>,
    engine: Arc<RsaAccumulator>,
    operator: WeIdAuthentication,
    max_page_size: usize,
}

impl IssuerTypeManager {
    /// Creates a new `IssuerTypeManager`.
    ///
    /// # Arguments
    /// * `client` - Ledger client shared with the other services
    /// * `checker` - Source of `TypeAdmin` privileges
    /// * `issuers` - Registry consulted before a DID joins a type
    /// * `engine` - Accumulator engine
    /// * `operator` - Identity that creates types and becomes their first admin
    pub fn new(
        client: LedgerClient,
        checker: Arc<dyn PrivilegeChecker>,
        issuers: Arc<AuthorityIssuerService>,
        engine: Arc<RsaAccumulator>,
        operator: WeIdAuthentication,
    ) -> Self {
        Self {
            contract: SpecificIssuerContract::new(client),
            checker,
            issuers,
            engine,
            operator,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    fn client(&self) -> &LedgerClient {
        self.contract.client()
    }

    /// Creates `type_name` with an empty digest at version 0. The operator
    /// identity becomes the type's first `TypeAdmin`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed type name
    /// - `AlreadyExists` if the name is taken
    pub async fn register_issuer_type(&self, type_name: &str) -> Result<bool> {
        validate_type_name(type_name)?;
        if self.contract.meta(type_name, None).await?.value.is_some() {
            return Err(already_exists(type_name));
        }

        let meta = TypeMeta {
            created_by: self.operator.we_id.clone(),
            created_at: Utc::now().timestamp(),
        };
        let tx = self
            .contract
            .create_type_tx(&self.operator.we_id, type_name, &self.engine.empty_digest(), &meta)?;
        let tx = with_grant(
            tx,
            &PrivilegeScope::TypeAdmin(type_name.to_string()),
            &self.operator.we_id,
            &self.operator.we_id,
        )?;

        match self.client().send_transaction(tx).await {
            Ok(receipt) => {
                info!("registered issuer type {} in {}", type_name, receipt.tx_hash_hex());
                Ok(true)
            }
            Err(RegistryError::Conflict { .. }) => Err(already_exists(type_name)),
            Err(e) => Err(e),
        }
    }

    /// Adds `we_id` to `type_name`.
    ///
    /// Adding a current member succeeds without touching the ledger.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller_auth` is not an admin of the type
    /// - `NotFound` for an unknown type or a DID that is not an active
    ///   authority issuer
    /// - `Conflict` if another change to the type committed first
    pub async fn add_issuer_into_issuer_type(
        &self,
        caller_auth: &WeIdAuthentication,
        type_name: &str,
        we_id: &str,
    ) -> Result<bool> {
        match self.prepare_add(caller_auth, type_name, we_id).await? {
            Some(update) => self.commit(update).await,
            None => Ok(true),
        }
    }

    /// Removes `we_id` from `type_name`. Removing a non-member is a no-op.
    pub async fn remove_issuer_from_issuer_type(
        &self,
        caller_auth_wrapper: &WeIdAuthentication,
        type_name: &str,
        we_id: &str,
    ) -> Result<bool> {
        match self.prepare_remove(caller_auth_wrapper, type_name, we_id).await? {
            Some(update) => self.commit(update).await,
            None => Ok(true),
        }
    }

    /// Validates an addition and builds it against the current digest.
    ///
    /// Returns `None` if `we_id` is already a member.
    pub async fn prepare_add(
        &self,
        caller_auth: &WeIdAuthentication,
        type_name: &str,
        we_id: &str,
    ) -> Result<Option<MembershipUpdate>> {
        self.validate_change(caller_auth, type_name, we_id).await?;
        let height = self.client().height().await?;
        let head = self.contract.head(type_name, Some(height)).await?;
        let Some(version) = head.value else {
            return Err(unknown_type(type_name));
        };
        let issuer_version = self.issuers.active_entry_version(we_id, height).await?;

        let member = self.contract.member(type_name, we_id, Some(height)).await?;
        if member.value.is_some() {
            debug!("{} already in issuer type {}", we_id, type_name);
            return Ok(None);
        }

        let digest = self.digest_at(type_name, version, height).await?;
        let new_digest = self.engine.add(&digest, we_id);
        let transaction = self
            .contract
            .add_member_tx(&caller_auth.we_id, type_name, we_id, &head, &member, &new_digest)?
            // A removal of the issuer before this commits turns it into a Conflict.
            .expect(AUTHORITY_ISSUER_CONTROLLER, &entry_key(we_id), issuer_version);
        let checkpoints = self
            .checkpoints(type_name, height, version, MembershipOp::Added, we_id, &new_digest)
            .await?;
        let transaction = self
            .contract
            .with_witness_checkpoints(transaction, type_name, version + 1, &checkpoints)?;
        Ok(Some(MembershipUpdate {
            type_name: type_name.to_string(),
            we_id: we_id.to_string(),
            op: MembershipOp::Added,
            base_version: version,
            transaction,
        }))
    }

    /// Validates a removal and builds it against the current digest.
    ///
    /// Returns `None` if `we_id` is not a member.
    pub async fn prepare_remove(
        &self,
        caller_auth_wrapper: &WeIdAuthentication,
        type_name: &str,
        we_id: &str,
    ) -> Result<Option<MembershipUpdate>> {
        self.validate_change(caller_auth_wrapper, type_name, we_id).await?;
        let height = self.client().height().await?;
        let head = self.contract.head(type_name, Some(height)).await?;
        if head.value.is_none() {
            return Err(unknown_type(type_name));
        }
        let member = self.contract.member(type_name, we_id, Some(height)).await?;
        let Some(state) = self.member_state(type_name, we_id, height).await? else {
            debug!("{} not in issuer type {}", we_id, type_name);
            return Ok(None);
        };

        // The digest without the member is exactly its witness.
        let new_digest = self
            .engine
            .remove(&state.digest, we_id, &state.witness)
            .map_err(|e| corrupt("membership history", e))?;
        let transaction = self.contract.remove_member_tx(
            &caller_auth_wrapper.we_id,
            type_name,
            we_id,
            &head,
            &member,
            &new_digest,
        )?;
        let checkpoints = self
            .checkpoints(type_name, height, state.version, MembershipOp::Removed, we_id, &new_digest)
            .await?;
        let transaction = self
            .contract
            .with_witness_checkpoints(transaction, type_name, state.version + 1, &checkpoints)?;
        Ok(Some(MembershipUpdate {
            type_name: type_name.to_string(),
            we_id: we_id.to_string(),
            op: MembershipOp::Removed,
            base_version: state.version,
            transaction,
        }))
    }

    /// Submits a prepared change.
    ///
    /// # Errors
    /// `Conflict` carrying the digest version the change was built on and
    /// the version now on the ledger if another change committed first.
    pub async fn commit(&self, update: MembershipUpdate) -> Result<bool> {
        let MembershipUpdate {
            type_name,
            we_id,
            op,
            base_version,
            transaction,
        } = update;
        match self.client().send_transaction(transaction).await {
            Ok(receipt) => {
                info!(
                    "{} {:?} issuer type {} at version {} in {}",
                    we_id,
                    op,
                    type_name,
                    base_version + 1,
                    receipt.tx_hash_hex()
                );
                Ok(true)
            }
            Err(RegistryError::Conflict {
                resource,
                expected,
                observed,
            }) => {
                let head = self.contract.head(&type_name, None).await?.value;
                if head == Some(base_version) {
                    // The digest did not move; another guarded key did.
                    return Err(RegistryError::Conflict {
                        resource,
                        expected,
                        observed,
                    });
                }
                let observed = head;
                Err(RegistryError::Conflict {
                    resource: format!("issuer type {} digest", type_name),
                    expected: Some(base_version),
                    observed,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `we_id` currently belongs to `type_name`.
    ///
    /// Recomputes the member's witness from its latest checkpoint and the
    /// events after it, then verifies it against the current digest.
    ///
    /// # Errors
    /// `NotFound` for an unknown type. Unknown and removed DIDs are `false`.
    pub async fn is_specific_type_issuer(&self, type_name: &str, we_id: &str) -> Result<bool> {
        validate_type_name(type_name)?;
        let height = self.client().height().await?;
        if self.contract.head(type_name, Some(height)).await?.value.is_none() {
            return Err(unknown_type(type_name));
        }
        if !is_valid_we_id(we_id) {
            return Ok(false);
        }
        Ok(match self.member_state(type_name, we_id, height).await? {
            Some(state) => {
                debug!("{} checked against {} after replaying {} events", we_id, type_name, state.replayed);
                self.engine.verify(&state.digest, we_id, &state.witness)
            }
            None => false,
        })
    }

    /// Lists the members of `type_name` in order of addition.
    pub async fn get_all_specific_type_issuer_list(
        &self,
        type_name: &str,
        index: usize,
        num: usize,
    ) -> Result<Vec<IssuerDescription>> {
        validate_type_name(type_name)?;
        let limit = page_limit(num, self.max_page_size)?;
        let height = self.client().height().await?;
        if self.contract.head(type_name, Some(height)).await?.value.is_none() {
            return Err(unknown_type(type_name));
        }
        let we_ids = self
            .contract
            .order_page(type_name, index, limit, Some(height))
            .await?;
        Ok(we_ids
            .into_iter()
            .map(|we_id| IssuerDescription {
                we_id,
                type_name: type_name.to_string(),
            })
            .collect())
    }

    /// Latest digest of `type_name`, for local verification by third
    /// parties.
    pub async fn current_digest(&self, type_name: &str) -> Result<DigestSnapshot> {
        validate_type_name(type_name)?;
        let height = self.client().height().await?;
        let Some(version) = self.contract.head(type_name, Some(height)).await?.value else {
            return Err(unknown_type(type_name));
        };
        let digest = self.digest_at(type_name, version, height).await?;
        Ok(DigestSnapshot {
            type_name: type_name.to_string(),
            version,
            digest: digest.to_bytes(),
        })
    }

    /// Witness of `we_id` against the latest digest of `type_name`.
    ///
    /// # Errors
    /// `NotFound` for an unknown type or a DID that is not a member.
    pub async fn membership_witness(&self, type_name: &str, we_id: &str) -> Result<MembershipProof> {
        validate_type_name(type_name)?;
        validate_we_id(we_id)?;
        let height = self.client().height().await?;
        if self.contract.head(type_name, Some(height)).await?.value.is_none() {
            return Err(unknown_type(type_name));
        }
        let state = self
            .member_state(type_name, we_id, height)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("{} is not a member of {}", we_id, type_name)))?;
        Ok(MembershipProof {
            type_name: type_name.to_string(),
            we_id: we_id.to_string(),
            version: state.version,
            witness: state.witness.to_bytes(),
        })
    }

    async fn validate_change(&self, caller: &WeIdAuthentication, type_name: &str, we_id: &str) -> Result<()> {
        validate_type_name(type_name)?;
        validate_we_id(we_id)?;
        validate_we_id(&caller.we_id)?;
        let scope = PrivilegeScope::TypeAdmin(type_name.to_string());
        if !self.checker.has_privilege(caller, &scope).await? {
            return Err(RegistryError::unauthorized(format!(
                "{} lacks {}",
                caller.we_id, scope
            )));
        }
        Ok(())
    }

    async fn digest_at(&self, type_name: &str, version: u64, height: u64) -> Result<Digest> {
        self.contract
            .digest(type_name, version, Some(height))
            .await?
            .ok_or_else(|| corrupt("issuer type head", format!("{} has no digest {}", type_name, version)))
    }

    /// Replays the events since `we_id`'s latest checkpoint, or since it
    /// joined. `None` if it is not a member at `height`.
    async fn member_state(&self, type_name: &str, we_id: &str, height: u64) -> Result<Option<MemberState>> {
        let Some(version) = self.contract.head(type_name, Some(height)).await?.value else {
            return Ok(None);
        };
        let Some(entry) = self.contract.member(type_name, we_id, Some(height)).await?.value else {
            return Ok(None);
        };
        if entry.added_at == 0 || entry.added_at > version {
            return Err(corrupt(
                "member entry",
                format!("{} added at {} but head is {}", we_id, entry.added_at, version),
            ));
        }

        let (start, witness) = self.replay_start(type_name, we_id, &entry, height).await?;
        let history = self.history(type_name, start, version, height).await?;
        let witness = witness_from_history(&self.engine, we_id, &witness, &history)
            .map_err(|e| corrupt("membership history", e))?;
        let digest = self.digest_at(type_name, version, height).await?;
        Ok(Some(MemberState {
            version,
            digest,
            witness,
            replayed: history.len(),
        }))
    }

    /// Version and witness replay starts from: the member's checkpoint if it
    /// belongs to the current membership, else the digest before its addition.
    async fn replay_start(
        &self,
        type_name: &str,
        we_id: &str,
        entry: &MemberEntry,
        height: u64,
    ) -> Result<(u64, Witness)> {
        if let Some(checkpoint) = self.contract.witness_checkpoint(type_name, we_id, Some(height)).await? {
            if checkpoint.version >= entry.added_at {
                let witness = Witness::from_bytes(&checkpoint.witness).map_err(|e| corrupt("witness checkpoint", e))?;
                return Ok((checkpoint.version, witness));
            }
        }
        let before = entry
            .added_at
            .checked_sub(1)
            .ok_or_else(|| corrupt("member entry", format!("{} added at version 0", we_id)))?;
        let base = self.digest_at(type_name, before, height).await?;
        Ok((entry.added_at, base.as_witness()))
    }

    /// Events in `(after, up_to]` with the digests their removals produced.
    async fn history(&self, type_name: &str, after: u64, up_to: u64, height: u64) -> Result<Vec<HistoryEntry>> {
        let events = self.contract.events(type_name, after, up_to, Some(height)).await?;
        let mut history = Vec::with_capacity(events.len());
        for event in events {
            let digest_after = match event.op {
                MembershipOp::Removed => Some(self.digest_at(type_name, event.version, height).await?),
                MembershipOp::Added => None,
            };
            history.push(HistoryEntry { event, digest_after });
        }
        Ok(history)
    }

    /// Witnesses of every member against `new_digest`, the digest the change
    /// of `changed` produces on top of `version`. Empty unless that digest
    /// version is due for a checkpoint round.
    async fn checkpoints(
        &self,
        type_name: &str,
        height: u64,
        version: u64,
        op: MembershipOp,
        changed: &str,
        new_digest: &Digest,
    ) -> Result<Vec<(String, Witness)>> {
        if (version + 1) % WITNESS_CHECKPOINT_INTERVAL != 0 {
            return Ok(Vec::new());
        }
        let members = self
            .contract
            .order_page(type_name, 0, usize::MAX, Some(height))
            .await?;
        let mut starts = Vec::with_capacity(members.len());
        for we_id in members {
            if we_id == changed {
                continue;
            }
            let entry = self
                .contract
                .member(type_name, &we_id, Some(height))
                .await?
                .value
                .ok_or_else(|| corrupt("member order", format!("{} listed without an entry", we_id)))?;
            let (start, witness) = self.replay_start(type_name, &we_id, &entry, height).await?;
            starts.push((we_id, start, witness));
        }

        let earliest = starts.iter().map(|(_, start, _)| *start).min().unwrap_or(version);
        let history = self.history(type_name, earliest, version, height).await?;
        let mut checkpoints = Vec::with_capacity(starts.len() + 1);
        for (we_id, start, witness) in starts {
            let skip = history.partition_point(|h| h.event.version <= start);
            let current = witness_from_history(&self.engine, &we_id, &witness, &history[skip..])
                .map_err(|e| corrupt("membership history", e))?;
            let refreshed = match op {
                MembershipOp::Added => self.engine.update_on_add(&current, changed),
                MembershipOp::Removed => self
                    .engine
                    .update_on_remove(&current, &we_id, changed, new_digest)
                    .map_err(|e| corrupt("membership history", e))?,
            };
            checkpoints.push((we_id, refreshed));
        }
        if op == MembershipOp::Added {
            let previous = self.digest_at(type_name, version, height).await?;
            checkpoints.push((changed.to_string(), previous.as_witness()));
        }
        debug!(
            "refreshing {} witness checkpoints of {} at version {}",
            checkpoints.len(),
            type_name,
            version + 1
        );
        Ok(checkpoints)
    }
}

fn unknown_type(type_name: &str) -> RegistryError {
    RegistryError::not_found(format!("issuer type {} does not exist", type_name))
}

fn already_exists(type_name: &str) -> RegistryError {
    RegistryError::AlreadyExists(format!("issuer type {} already exists", type_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory_ledger::InMemoryLedger;
    use crate::contracts::role_controller::RoleController;
    use crate::models::{AuthorityIssuer, RegisterAuthorityIssuerArgs, RemoveAuthorityIssuerArgs};

    const ADMIN: &str = "did:weid:admin";
    const OPERATOR: &str = "did:weid:operator";

    async fn manager() -> IssuerTypeManager {
        let client = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        let roles = Arc::new(RoleController::new(client.clone()));
        roles.bootstrap_administrator(ADMIN).await.unwrap();
        let engine = Arc::new(RsaAccumulator::default());
        let issuers = Arc::new(AuthorityIssuerService::new(client.clone(), roles.clone(), engine.clone()));
        for we_id in ["did:weid:a", "did:weid:b", "did:weid:c"] {
            issuers
                .register_authority_issuer(RegisterAuthorityIssuerArgs {
                    authority_issuer: AuthorityIssuer::new(we_id, "Issuer"),
                    caller: WeIdAuthentication::new(ADMIN),
                })
                .await
                .unwrap();
        }
        IssuerTypeManager::new(client, roles, issuers, engine, WeIdAuthentication::new(OPERATOR))
    }

    #[tokio::test]
    async fn test_operator_administers_new_types() {
        let m = manager().await;
        m.register_issuer_type("KYC").await.unwrap();
        let operator = WeIdAuthentication::new(OPERATOR);
        assert!(m.add_issuer_into_issuer_type(&operator, "KYC", "did:weid:a").await.unwrap());
        assert!(matches!(
            m.register_issuer_type("KYC").await,
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_witness_survives_later_changes() {
        let m = manager().await;
        let admin = WeIdAuthentication::new(ADMIN);
        m.register_issuer_type("KYC").await.unwrap();
        for we_id in ["did:weid:a", "did:weid:b", "did:weid:c"] {
            m.add_issuer_into_issuer_type(&admin, "KYC", we_id).await.unwrap();
        }
        m.remove_issuer_from_issuer_type(&admin, "KYC", "did:weid:a").await.unwrap();

        assert!(!m.is_specific_type_issuer("KYC", "did:weid:a").await.unwrap());
        assert!(m.is_specific_type_issuer("KYC", "did:weid:b").await.unwrap());
        assert!(m.is_specific_type_issuer("KYC", "did:weid:c").await.unwrap());

        let snapshot = m.current_digest("KYC").await.unwrap();
        assert_eq!(snapshot.version, 4);
        let proof = m.membership_witness("KYC", "did:weid:b").await.unwrap();
        let engine = RsaAccumulator::default();
        assert!(engine.verify(
            &Digest::from_bytes(&snapshot.digest).unwrap(),
            "did:weid:b",
            &Witness::from_bytes(&proof.witness).unwrap()
        ));
        assert_eq!(
            Digest::from_bytes(&snapshot.digest).unwrap(),
            engine.accumulate(["did:weid:b", "did:weid:c"])
        );
    }

    #[tokio::test]
    async fn test_non_admin_cannot_change_membership() {
        let m = manager().await;
        m.register_issuer_type("KYC").await.unwrap();
        let stranger = WeIdAuthentication::new("did:weid:stranger");
        assert!(matches!(
            m.add_issuer_into_issuer_type(&stranger, "KYC", "did:weid:a").await,
            Err(RegistryError::Unauthorized(_))
        ));
        assert!(matches!(
            m.remove_issuer_from_issuer_type(&stranger, "KYC", "did:weid:a").await,
            Err(RegistryError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_and_inactive_issuer() {
        let m = manager().await;
        let admin = WeIdAuthentication::new(ADMIN);
        assert!(matches!(
            m.is_specific_type_issuer("NOPE", "did:weid:a").await,
            Err(RegistryError::NotFound(_))
        ));
        m.register_issuer_type("KYC").await.unwrap();
        assert!(matches!(
            m.add_issuer_into_issuer_type(&admin, "KYC", "did:weid:unregistered").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(!m.is_specific_type_issuer("KYC", "did:weid:unregistered").await.unwrap());
    }

    #[tokio::test]
    async fn test_prepared_updates_from_same_digest_conflict() {
        let m = manager().await;
        let admin = WeIdAuthentication::new(ADMIN);
        m.register_issuer_type("KYC").await.unwrap();

        let first = m.prepare_add(&admin, "KYC", "did:weid:a").await.unwrap().unwrap();
        let second = m.prepare_add(&admin, "KYC", "did:weid:b").await.unwrap().unwrap();
        assert!(m.commit(first).await.unwrap());
        assert_eq!(
            m.commit(second).await.unwrap_err(),
            RegistryError::Conflict {
                resource: "issuer type KYC digest".to_string(),
                expected: Some(0),
                observed: Some(1),
            }
        );
    }

    #[tokio::test]
    async fn test_issuer_removed_before_commit_cannot_join() {
        let m = manager().await;
        let admin = WeIdAuthentication::new(ADMIN);
        m.register_issuer_type("KYC").await.unwrap();

        let update = m.prepare_add(&admin, "KYC", "did:weid:a").await.unwrap().unwrap();
        m.issuers
            .remove_authority_issuer(RemoveAuthorityIssuerArgs {
                we_id: "did:weid:a".to_string(),
                caller: admin.clone(),
            })
            .await
            .unwrap();

        assert!(matches!(m.commit(update).await, Err(RegistryError::Conflict { .. })));
        assert!(!m.issuers.is_authority_issuer("did:weid:a").await.unwrap());
        assert!(!m.is_specific_type_issuer("KYC", "did:weid:a").await.unwrap());
        assert_eq!(m.current_digest("KYC").await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_membership_check_replays_at_most_one_checkpoint_interval() {
        let m = manager().await;
        let admin = WeIdAuthentication::new(ADMIN);
        m.register_issuer_type("KYC").await.unwrap();
        m.add_issuer_into_issuer_type(&admin, "KYC", "did:weid:a").await.unwrap();
        m.add_issuer_into_issuer_type(&admin, "KYC", "did:weid:c").await.unwrap();
        for _ in 0..20 {
            m.add_issuer_into_issuer_type(&admin, "KYC", "did:weid:b").await.unwrap();
            m.remove_issuer_from_issuer_type(&admin, "KYC", "did:weid:b").await.unwrap();
        }

        let height = m.client().height().await.unwrap();
        let state = m.member_state("KYC", "did:weid:a", height).await.unwrap().unwrap();
        assert_eq!(state.version, 42);
        assert!(state.replayed < WITNESS_CHECKPOINT_INTERVAL as usize, "replayed {}", state.replayed);
        assert!(m.is_specific_type_issuer("KYC", "did:weid:a").await.unwrap());
        assert!(m.is_specific_type_issuer("KYC", "did:weid:c").await.unwrap());
        assert!(!m.is_specific_type_issuer("KYC", "did:weid:b").await.unwrap());

        let snapshot = m.current_digest("KYC").await.unwrap();
        assert_eq!(
            Digest::from_bytes(&snapshot.digest).unwrap(),
            RsaAccumulator::default().accumulate(["did:weid:a", "did:weid:c"])
        );
    }
}
