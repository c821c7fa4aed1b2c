// tests/registry_scenarios.rs
//! End-to-end behaviour of the registry services over the in-memory ledger.

mod common;

use async_trait::async_trait;
use common::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_test::assert_ok;
use weid_trust_registry::blockchain::{
    InMemoryLedger, LedgerClient, LedgerError, LedgerGateway, ScanRequest, StateValue, Transaction,
    TransactionReceipt,
};
use weid_trust_registry::models::{AuthorityIssuer, IssuerDescription, RegisterAuthorityIssuerArgs};
use weid_trust_registry::services::AuthorityIssuerService;
use weid_trust_registry::utils::crypto::format_hash;
use weid_trust_registry::RegistryError;

#[tokio::test]
async fn test_register_query_and_remove_acme() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let acme = AuthorityIssuer::new("did:weid:001", "Acme")
        .with_created(1_700_000_000)
        .with_acc_value(vec![0x01, 0x00, 0xff]);

    let registered = assert_ok!(
        node.issuers
            .register_authority_issuer(RegisterAuthorityIssuerArgs {
                authority_issuer: acme.clone(),
                caller: auth(REGISTRAR),
            })
            .await
    );
    assert!(registered);
    assert!(node.issuers.is_authority_issuer("did:weid:001").await.unwrap());
    assert_eq!(
        node.issuers.query_authority_issuer_info("did:weid:001").await.unwrap(),
        acme
    );

    assert!(assert_ok!(node.issuers.remove_authority_issuer(remove_args("did:weid:001")).await));
    assert!(!node.issuers.is_authority_issuer("did:weid:001").await.unwrap());
    assert!(matches!(
        node.issuers.query_authority_issuer_info("did:weid:001").await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_kyc_membership_lifecycle() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    node.issuers
        .register_authority_issuer(register_args("did:weid:001", "Acme", 1_700_000_000))
        .await
        .unwrap();
    let operator = auth(OPERATOR);

    assert!(assert_ok!(node.issuer_types.register_issuer_type("KYC").await));
    assert!(!node.issuer_types.is_specific_type_issuer("KYC", "did:weid:001").await.unwrap());

    assert!(node
        .issuer_types
        .add_issuer_into_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap());
    assert!(node.issuer_types.is_specific_type_issuer("KYC", "did:weid:001").await.unwrap());

    assert!(node
        .issuer_types
        .remove_issuer_from_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap());
    assert!(!node.issuer_types.is_specific_type_issuer("KYC", "did:weid:001").await.unwrap());
}

#[tokio::test]
async fn test_membership_changes_are_idempotent() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    node.issuers
        .register_authority_issuer(register_args("did:weid:001", "Acme", 1))
        .await
        .unwrap();
    node.issuer_types.register_issuer_type("KYC").await.unwrap();
    let operator = auth(OPERATOR);

    assert!(node
        .issuer_types
        .add_issuer_into_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap());
    let before = node.issuer_types.current_digest("KYC").await.unwrap();
    assert!(node
        .issuer_types
        .add_issuer_into_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap());
    assert_eq!(node.issuer_types.current_digest("KYC").await.unwrap(), before);
    assert_eq!(
        node.issuer_types
            .get_all_specific_type_issuer_list("KYC", 0, 10)
            .await
            .unwrap(),
        vec![IssuerDescription {
            we_id: "did:weid:001".to_string(),
            type_name: "KYC".to_string(),
        }]
    );

    // Removing a DID that never joined changes nothing either.
    assert!(node
        .issuer_types
        .remove_issuer_from_issuer_type(&operator, "KYC", "did:weid:999")
        .await
        .unwrap());
    assert_eq!(node.issuer_types.current_digest("KYC").await.unwrap(), before);
}

#[tokio::test]
async fn test_removed_issuer_can_still_leave_a_type() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let operator = auth(OPERATOR);
    node.issuers
        .register_authority_issuer(register_args("did:weid:001", "Acme", 1))
        .await
        .unwrap();
    node.issuer_types.register_issuer_type("KYC").await.unwrap();
    node.issuer_types
        .add_issuer_into_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap();
    node.issuers
        .remove_authority_issuer(remove_args("did:weid:001"))
        .await
        .unwrap();

    node.issuer_types
        .remove_issuer_from_issuer_type(&operator, "KYC", "did:weid:001")
        .await
        .unwrap();
    assert!(!node.issuer_types.is_specific_type_issuer("KYC", "did:weid:001").await.unwrap());
}

#[tokio::test]
async fn test_pages_concatenate_to_registration_order() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let we_ids: Vec<String> = (0..7).map(|i| format!("did:weid:{:03}", 100 - i)).collect();
    for we_id in &we_ids {
        // Same timestamp for all: order must come from the registration sequence.
        node.issuers
            .register_authority_issuer(register_args(we_id, "Issuer", 1_700_000_000))
            .await
            .unwrap();
    }
    node.issuers
        .remove_authority_issuer(remove_args(&we_ids[3]))
        .await
        .unwrap();
    let expected: Vec<String> = we_ids
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 3)
        .map(|(_, w)| w.clone())
        .collect();

    let mut collected = Vec::new();
    let mut index = 0;
    loop {
        let page = node.issuers.get_all_authority_issuer_list(index, 2).await.unwrap();
        assert!(page.len() <= 2);
        if page.is_empty() {
            break;
        }
        index += page.len();
        collected.extend(page.into_iter().map(|issuer| issuer.we_id));
    }
    assert_eq!(collected, expected);
    assert!(node
        .issuers
        .get_all_authority_issuer_list(100, 5)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_type_member_pages_have_no_gaps() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let operator = auth(OPERATOR);
    node.issuer_types.register_issuer_type("CERT").await.unwrap();
    for i in 0..5 {
        let we_id = format!("did:weid:{}", i);
        node.issuers
            .register_authority_issuer(register_args(&we_id, "Issuer", 1))
            .await
            .unwrap();
        node.issuer_types
            .add_issuer_into_issuer_type(&operator, "CERT", &we_id)
            .await
            .unwrap();
    }
    node.issuer_types
        .remove_issuer_from_issuer_type(&operator, "CERT", "did:weid:0")
        .await
        .unwrap();

    let first = node
        .issuer_types
        .get_all_specific_type_issuer_list("CERT", 0, 3)
        .await
        .unwrap();
    let second = node
        .issuer_types
        .get_all_specific_type_issuer_list("CERT", 3, 3)
        .await
        .unwrap();
    let all: Vec<String> = first.into_iter().chain(second).map(|d| d.we_id).collect();
    assert_eq!(all, vec!["did:weid:1", "did:weid:2", "did:weid:3", "did:weid:4"]);
}

/// Holds every submission while armed until two of them are waiting, so
/// both were built against the same ledger state.
struct GatedLedger {
    inner: InMemoryLedger,
    gate: Barrier,
    armed: AtomicBool,
}

#[async_trait]
impl LedgerGateway for GatedLedger {
    async fn submit(&self, tx: Transaction) -> Result<TransactionReceipt, LedgerError> {
        if self.armed.load(Ordering::SeqCst) {
            self.gate.wait().await;
        }
        self.inner.submit(tx).await
    }

    async fn submit_raw(&self, raw: &[u8]) -> Result<TransactionReceipt, LedgerError> {
        self.inner.submit_raw(raw).await
    }

    async fn read(
        &self,
        address: &str,
        key: &str,
        at_height: Option<u64>,
    ) -> Result<Option<StateValue>, LedgerError> {
        self.inner.read(address, key, at_height).await
    }

    async fn scan(
        &self,
        address: &str,
        request: ScanRequest,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        self.inner.scan(address, request).await
    }

    async fn height(&self) -> Result<u64, LedgerError> {
        self.inner.height().await
    }
}

#[tokio::test]
async fn test_concurrent_adds_from_same_digest_conflict() {
    let ledger = Arc::new(GatedLedger {
        inner: InMemoryLedger::new(),
        gate: Barrier::new(2),
        armed: AtomicBool::new(false),
    });
    let node = node(ledger.clone()).await;
    for we_id in ["did:weid:a", "did:weid:b"] {
        node.issuers
            .register_authority_issuer(register_args(we_id, "Issuer", 1))
            .await
            .unwrap();
    }
    node.issuer_types.register_issuer_type("KYC").await.unwrap();
    ledger.armed.store(true, Ordering::SeqCst);

    let spawn_add = |we_id: &'static str| {
        let issuer_types = node.issuer_types.clone();
        tokio::spawn(async move {
            issuer_types
                .add_issuer_into_issuer_type(&auth(OPERATOR), "KYC", we_id)
                .await
        })
    };
    let (a, b) = tokio::join!(spawn_add("did:weid:a"), spawn_add("did:weid:b"));
    let results = [a.unwrap(), b.unwrap()];
    ledger.armed.store(false, Ordering::SeqCst);

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let conflict = results.into_iter().find_map(|r| r.err()).unwrap();
    assert!(conflict.is_retryable());
    assert_eq!(
        conflict,
        RegistryError::Conflict {
            resource: "issuer type KYC digest".to_string(),
            expected: Some(0),
            observed: Some(1),
        }
    );
    assert_eq!(node.issuer_types.current_digest("KYC").await.unwrap().version, 1);
}

#[tokio::test]
async fn test_slow_ledger_surfaces_timeout() {
    let ledger = Arc::new(InMemoryLedger::new().with_latency(Duration::from_millis(200)));
    let node = node(ledger.clone()).await;
    let impatient = AuthorityIssuerService::new(
        LedgerClient::new(ledger).with_timeout(Duration::from_millis(20)),
        node.roles.clone(),
        Arc::new(Default::default()),
    );

    let err = impatient.is_authority_issuer("did:weid:001").await.unwrap_err();
    assert_eq!(err, RegistryError::Timeout(Duration::from_millis(20)));
}

#[tokio::test]
async fn test_offline_signed_registration() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let args = register_args("did:weid:offline", "Offline", 1_700_000_000);

    let tx = node.issuers.build_register_transaction(&args).await.unwrap();
    let payload = tx.to_hex().unwrap();
    // Nothing is submitted until the payload comes back.
    assert!(!node.issuers.is_authority_issuer("did:weid:offline").await.unwrap());

    let tx_hash = node.issuers.register_authority_issuer_raw(&payload).await.unwrap();
    assert_eq!(tx_hash, format_hash(&tx.hash().unwrap()));
    assert!(node.issuers.is_authority_issuer("did:weid:offline").await.unwrap());

    // Replaying the same payload is refused by the ledger.
    assert!(matches!(
        node.issuers.register_authority_issuer_raw(&payload).await,
        Err(RegistryError::LedgerRejected(_))
    ));
}

#[tokio::test]
async fn test_stale_offline_payload_conflicts() {
    let node = node(Arc::new(InMemoryLedger::new())).await;
    let stale = node
        .issuers
        .build_register_transaction(&register_args("did:weid:001", "Acme", 1))
        .await
        .unwrap()
        .to_hex()
        .unwrap();
    node.issuers
        .register_authority_issuer(register_args("did:weid:002", "Beta", 1))
        .await
        .unwrap();

    let err = node.issuers.register_authority_issuer_raw(&stale).await.unwrap_err();
    assert!(matches!(err, RegistryError::Conflict { .. }));
    assert!(!node.issuers.is_authority_issuer("did:weid:001").await.unwrap());
}
