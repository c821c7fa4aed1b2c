// src/accumulator/mod.rs
//! Cryptographic accumulator used for issuer-type membership.

pub mod history;
pub mod rsa;

pub use history::{witness_from_history, HistoryEntry};
pub use rsa::{AccumulatorError, Digest, RsaAccumulator, Witness, ELEMENT_BYTES, GENERATOR};
