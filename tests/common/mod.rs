// tests/common/mod.rs
//! Node wiring shared by the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use weid_trust_registry::accumulator::RsaAccumulator;
use weid_trust_registry::blockchain::{LedgerClient, LedgerGateway};
use weid_trust_registry::contracts::role_controller::RoleController;
use weid_trust_registry::models::{
    AuthorityIssuer, RegisterAuthorityIssuerArgs, RemoveAuthorityIssuerArgs, WeIdAuthentication,
};
use weid_trust_registry::services::{AuthorityIssuerService, IssuerTypeManager, PrivilegeScope};

pub const ADMIN: &str = "did:weid:admin";
pub const REGISTRAR: &str = "did:weid:registrar";
pub const OPERATOR: &str = "did:weid:operator";

pub struct Node {
    pub client: LedgerClient,
    pub roles: Arc<RoleController>,
    pub issuers: Arc<AuthorityIssuerService>,
    pub issuer_types: Arc<IssuerTypeManager>,
}

/// Wires a node over `gateway` with an administrator and one registrar.
pub async fn node(gateway: Arc<dyn LedgerGateway>) -> Node {
    let client = LedgerClient::new(gateway);
    let roles = Arc::new(RoleController::new(client.clone()));
    roles.bootstrap_administrator(ADMIN).await.unwrap();
    roles
        .grant(&auth(ADMIN), REGISTRAR, &PrivilegeScope::Registrar)
        .await
        .unwrap();

    let engine = Arc::new(RsaAccumulator::default());
    let issuers = Arc::new(AuthorityIssuerService::new(client.clone(), roles.clone(), engine.clone()));
    let issuer_types = Arc::new(IssuerTypeManager::new(
        client.clone(),
        roles.clone(),
        issuers.clone(),
        engine,
        auth(OPERATOR),
    ));
    Node {
        client,
        roles,
        issuers,
        issuer_types,
    }
}

pub fn auth(we_id: &str) -> WeIdAuthentication {
    WeIdAuthentication::new(we_id)
}

pub fn register_args(we_id: &str, name: &str, created: u64) -> RegisterAuthorityIssuerArgs {
    RegisterAuthorityIssuerArgs {
        authority_issuer: AuthorityIssuer::new(we_id, name).with_created(created),
        caller: auth(REGISTRAR),
    }
}

pub fn remove_args(we_id: &str) -> RemoveAuthorityIssuerArgs {
    RemoveAuthorityIssuerArgs {
        we_id: we_id.to_string(),
        caller: auth(REGISTRAR),
    }
}
