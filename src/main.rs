// src/main.rs

//! # WeID Trust Registry - Node Entry Point
//!
//! Boots a single-process registry node over the in-memory ledger and serves
//! the HTTP API.
//!
//! ## Configuration
//! See [`weid_trust_registry::settings`]. The most common overrides:
//! - `REGISTRY_LISTEN_ADDR`: bind address (default `127.0.0.1:3000`)
//! - `REGISTRY_ADMIN_WE_ID`: DID bootstrapped as administrator
//! - `REGISTRY_OPERATOR_WE_ID`: DID that creates issuer types
//! - `RUST_LOG`: log verbosity

use anyhow::Context;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use weid_trust_registry::accumulator::RsaAccumulator;
use weid_trust_registry::blockchain::{InMemoryLedger, LedgerClient};
use weid_trust_registry::contracts::role_controller::RoleController;
use weid_trust_registry::models::WeIdAuthentication;
use weid_trust_registry::services::{ApiServer, AuthorityIssuerService, IssuerTypeManager};
use weid_trust_registry::Settings;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load layered configuration
/// 2. Open the ledger and bootstrap the administrator
/// 3. Initialize service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = Settings::load().context("failed to load configuration")?;
    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen_addr))?;

    let client = LedgerClient::new(Arc::new(InMemoryLedger::new())).with_timeout(settings.ledger_timeout());

    let roles = Arc::new(RoleController::new(client.clone()));
    roles
        .bootstrap_administrator(&settings.admin_we_id)
        .await
        .context("failed to bootstrap administrator")?;

    let engine = Arc::new(RsaAccumulator::default());
    let issuers = Arc::new(
        AuthorityIssuerService::new(client.clone(), roles.clone(), engine.clone())
            .with_max_page_size(settings.max_page_size),
    );
    let issuer_types = Arc::new(
        IssuerTypeManager::new(
            client,
            roles,
            issuers.clone(),
            engine,
            WeIdAuthentication::new(settings.operator_we_id.clone()),
        )
        .with_max_page_size(settings.max_page_size),
    );

    info!(
        "administrator {}, issuer type operator {}",
        settings.admin_we_id, settings.operator_we_id
    );
    ApiServer::new(issuers, issuer_types)
        .run(addr)
        .await
        .context("API server stopped")?;
    Ok(())
}
