// src/utils/mod.rs
//! Helper functions shared across modules.

pub mod crypto;
pub mod serialization;
pub mod validation;
