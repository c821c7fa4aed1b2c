// src/blockchain/memory_ledger.rs
//! In-process append-only ledger.
//!
//! Implements [`LedgerGateway`] with the guarantees the registry depends on:
//! one global sequencer, atomic multi-key writes, version preconditions and
//! snapshot reads at any past height. Nothing is ever erased: a deletion is a
//! new version with no value. Used by the node binary for single-process
//! deployments and by the test suites.

use super::gateway::{
    LedgerError, LedgerGateway, ScanRequest, StateValue, Transaction, TransactionReceipt,
};
use async_trait::async_trait;
use ethers_core::types::H256;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

/// A sequenced transaction.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u64,
    pub tx_hash: H256,
    pub sender: String,
    pub method: String,
    pub timestamp: i64,
}

#[derive(Default)]
struct LedgerState {
    blocks: Vec<Block>,
    seen: HashSet<H256>,
    /// `(address, key)` -> every version ever written, oldest first.
    state: BTreeMap<(String, String), Vec<StateValue>>,
}

impl LedgerState {
    fn head(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn current_version(&self, address: &str, key: &str) -> Option<u64> {
        self.state
            .get(&(address.to_string(), key.to_string()))
            .and_then(|versions| versions.last())
            .map(|v| v.version)
    }

    fn value_at(versions: &[StateValue], height: u64) -> Option<&StateValue> {
        versions.iter().rev().find(|v| v.version <= height)
    }

    fn apply(&mut self, tx: &Transaction, tx_hash: H256) -> Result<TransactionReceipt, LedgerError> {
        if self.seen.contains(&tx_hash) {
            return Err(LedgerError::Rejected(format!(
                "transaction 0x{:x} already known",
                tx_hash
            )));
        }
        for pre in &tx.preconditions {
            let observed = self.current_version(&pre.address, &pre.key);
            if observed != pre.expected_version {
                return Err(LedgerError::StaleVersion {
                    key: format!("{}/{}", pre.address, pre.key),
                    expected: pre.expected_version,
                    observed,
                });
            }
        }

        let height = self.head() + 1;
        for write in &tx.writes {
            self.state
                .entry((write.address.clone(), write.key.clone()))
                .or_default()
                .push(StateValue {
                    version: height,
                    value: write.value.clone(),
                });
        }
        self.blocks.push(Block {
            height,
            tx_hash,
            sender: tx.sender.clone(),
            method: tx.method.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        });
        self.seen.insert(tx_hash);

        Ok(TransactionReceipt {
            tx_hash,
            height,
            method: tx.method.clone(),
        })
    }
}

/// Thread-safe in-memory ledger.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    /// Artificial delay applied to every call, for exercising timeouts.
    latency: Option<Duration>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every gateway call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns the block at `height`, if sequenced.
    pub fn block(&self, height: u64) -> Option<Block> {
        let state = self.state.read().ok()?;
        height
            .checked_sub(1)
            .and_then(|idx| state.blocks.get(idx as usize))
            .cloned()
    }

    /// Every version ever written to `address/key`, oldest first.
    pub fn history(&self, address: &str, key: &str) -> Vec<StateValue> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.state.get(&(address.to_string(), key.to_string())).cloned())
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn poisoned<T>(_: T) -> LedgerError {
        LedgerError::Unavailable("ledger state lock poisoned".to_string())
    }

    fn commit(&self, tx: &Transaction) -> Result<TransactionReceipt, LedgerError> {
        let tx_hash = tx.hash()?;
        let mut state = self.state.write().map_err(Self::poisoned)?;
        match state.apply(tx, tx_hash) {
            Ok(receipt) => {
                debug!(
                    "sequenced {} from {} at height {}",
                    receipt.method, tx.sender, receipt.height
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!("rejected {} from {}: {}", tx.method, tx.sender, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn submit(&self, tx: Transaction) -> Result<TransactionReceipt, LedgerError> {
        self.simulate_latency().await;
        self.commit(&tx)
    }

    async fn submit_raw(&self, raw: &[u8]) -> Result<TransactionReceipt, LedgerError> {
        self.simulate_latency().await;
        let tx = Transaction::decode(raw)?;
        self.commit(&tx)
    }

    async fn read(
        &self,
        address: &str,
        key: &str,
        at_height: Option<u64>,
    ) -> Result<Option<StateValue>, LedgerError> {
        self.simulate_latency().await;
        let state = self.state.read().map_err(Self::poisoned)?;
        let height = at_height.unwrap_or_else(|| state.head());
        Ok(state
            .state
            .get(&(address.to_string(), key.to_string()))
            .and_then(|versions| LedgerState::value_at(versions, height))
            .cloned())
    }

    async fn scan(
        &self,
        address: &str,
        request: ScanRequest,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        self.simulate_latency().await;
        let state = self.state.read().map_err(Self::poisoned)?;
        let height = request.at_height.unwrap_or_else(|| state.head());
        let start = (address.to_string(), request.prefix.clone());

        let entries = state
            .state
            .range(start..)
            .take_while(|((addr, key), _)| addr == address && key.starts_with(&request.prefix))
            .filter_map(|((_, key), versions)| {
                LedgerState::value_at(versions, height)
                    .and_then(|v| v.value.clone())
                    .map(|value| (key.clone(), value))
            })
            .skip(request.offset)
            .take(request.limit)
            .collect();
        Ok(entries)
    }

    async fn height(&self) -> Result<u64, LedgerError> {
        self.simulate_latency().await;
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state.head())
    }
}
