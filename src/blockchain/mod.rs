// src/blockchain/mod.rs
//! Ledger access: the gateway contract, a bounded client and an in-process
//! reference ledger.

pub mod gateway;
pub mod ledger_client;
pub mod memory_ledger;

pub use gateway::{
    LedgerError, LedgerGateway, Precondition, ScanRequest, StateValue, StateWrite, Transaction,
    TransactionReceipt,
};
pub use ledger_client::{LedgerClient, DEFAULT_LEDGER_TIMEOUT};
pub use memory_ledger::InMemoryLedger;
