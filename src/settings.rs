// src/settings.rs
//! Node configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional `registry.toml` (or `.json`/`.yaml`) in the working directory
//! 3. `REGISTRY_*` environment variables, e.g. `REGISTRY_LISTEN_ADDR`
//!
//! A `.env` file is loaded into the environment before the sources are read.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, Source};
use dotenv::dotenv;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Address the HTTP surface binds to.
    pub listen_addr: String,
    /// DID installed as the first administrator on an empty ledger.
    pub admin_we_id: String,
    /// DID that creates issuer types and becomes their first admin.
    pub operator_we_id: String,
    /// Bound on every ledger call, in milliseconds.
    pub ledger_timeout_ms: u64,
    /// Cap on the page size of listing operations.
    pub max_page_size: usize,
}

impl Settings {
    /// Reads the layered configuration.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_sources(
            File::with_name("registry").required(false),
            Environment::with_prefix("REGISTRY").try_parsing(true),
        )
    }

    fn from_sources<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        Self::defaults()?
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("listen_addr", "127.0.0.1:3000")?
            .set_default("admin_we_id", "did:weid:admin")?
            .set_default("operator_we_id", "did:weid:operator")?
            .set_default("ledger_timeout_ms", 5000i64)?
            .set_default("max_page_size", 50i64)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}
