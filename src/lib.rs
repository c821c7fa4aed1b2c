// src/lib.rs
//! # WeID Trust Registry
//!
//! Registry of the DIDs allowed to issue verifiable credentials, plus
//! accumulator-backed issuer types ("KYC", "certification", ...) whose
//! membership can be proven without publishing the member list.
//!
//! ## Layers
//! 1. **Blockchain**: [`blockchain::LedgerGateway`] and a timeout-bounded client
//! 2. **Contracts**: key layout and transaction builders per contract address
//! 3. **Accumulator**: RSA accumulator and witness replay
//! 4. **Services**: registry, issuer-type manager, privileges, HTTP surface

pub mod accumulator;
pub mod blockchain;
pub mod contracts;
pub mod error;
pub mod models;
pub mod services;
pub mod settings;
pub mod utils;

pub use error::{ErrorKind, RegistryError, Result};
pub use settings::Settings;
