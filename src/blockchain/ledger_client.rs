// src/blockchain/ledger_client.rs
//! Timeout-bounded client over a [`LedgerGateway`].
//!
//! Every service talks to the ledger through this client. It bounds each call
//! with a timeout and translates gateway failures into [`RegistryError`]s.

use super::gateway::{LedgerError, LedgerGateway, ScanRequest, StateValue, Transaction, TransactionReceipt};
use crate::error::{RegistryError, Result};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single gateway call.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to a ledger gateway.
///
/// Cloning is cheap; clones share the gateway.
#[derive(Clone)]
pub struct LedgerClient {
    gateway: Arc<dyn LedgerGateway>,
    timeout: Duration,
}

impl LedgerClient {
    /// Creates a client with [`DEFAULT_LEDGER_TIMEOUT`].
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            gateway,
            timeout: DEFAULT_LEDGER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(map_ledger_error),
            Err(_) => {
                warn!("ledger call exceeded {:?}", self.timeout);
                Err(RegistryError::Timeout(self.timeout))
            }
        }
    }

    /// Sends a transaction and waits for its receipt.
    ///
    /// # Errors
    /// - `Conflict` if a precondition no longer holds
    /// - `Timeout` if the gateway does not answer in time
    /// - `LedgerRejected` for any other ledger-side failure
    pub async fn send_transaction(&self, tx: Transaction) -> Result<TransactionReceipt> {
        let method = tx.method.clone();
        let receipt = self.bounded(self.gateway.submit(tx)).await?;
        debug!("{} committed as {} at height {}", method, receipt.tx_hash_hex(), receipt.height);
        Ok(receipt)
    }

    /// Forwards a pre-built transaction payload verbatim.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TransactionReceipt> {
        self.bounded(self.gateway.submit_raw(raw)).await
    }

    /// Reads the current or historical state of one key.
    pub async fn read(&self, address: &str, key: &str, at_height: Option<u64>) -> Result<Option<StateValue>> {
        self.bounded(self.gateway.read(address, key, at_height)).await
    }

    /// Reads a key and returns its value only if it is live.
    pub async fn read_value(&self, address: &str, key: &str, at_height: Option<u64>) -> Result<Option<Vec<u8>>> {
        Ok(self.read(address, key, at_height).await?.and_then(|v| v.value))
    }

    pub async fn scan(&self, address: &str, request: ScanRequest) -> Result<Vec<(String, Vec<u8>)>> {
        self.bounded(self.gateway.scan(address, request)).await
    }

    /// Height of the latest committed block; used to pin snapshot reads.
    pub async fn height(&self) -> Result<u64> {
        self.bounded(self.gateway.height()).await
    }
}

fn map_ledger_error(e: LedgerError) -> RegistryError {
    match e {
        LedgerError::StaleVersion { key, expected, observed } => RegistryError::Conflict {
            resource: key,
            expected,
            observed,
        },
        other => RegistryError::LedgerRejected(other.to_string()),
    }
}

/// Maps a value that failed to decode on read.
pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> RegistryError {
    RegistryError::LedgerRejected(format!("malformed {} on ledger: {}", what, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory_ledger::InMemoryLedger;

    #[tokio::test]
    async fn test_stale_version_maps_to_conflict() {
        let client = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        client
            .send_transaction(Transaction::new("s", "init").put("C", "head", vec![0]))
            .await
            .unwrap();

        let err = client
            .send_transaction(Transaction::new("s", "bump").expect("C", "head", None).put("C", "head", vec![1]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Conflict {
                resource: "C/head".to_string(),
                expected: None,
                observed: Some(1),
            }
        );
    }

    #[tokio::test]
    async fn test_slow_gateway_maps_to_timeout() {
        let ledger = InMemoryLedger::new().with_latency(Duration::from_millis(200));
        let client = LedgerClient::new(Arc::new(ledger)).with_timeout(Duration::from_millis(20));
        let err = client.height().await.unwrap_err();
        assert_eq!(err, RegistryError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_malformed_raw_payload_is_ledger_rejected() {
        let client = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        let err = client.send_raw_transaction(b"{}").await.unwrap_err();
        assert!(matches!(err, RegistryError::LedgerRejected(_)));
    }
}
