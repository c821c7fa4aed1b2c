// src/services/mod.rs
//! Registry services and their HTTP surface.

pub mod api_server;
pub mod authority_issuer_service;
pub mod authorization;
pub mod issuer_type_manager;

pub use api_server::ApiServer;
pub use authority_issuer_service::AuthorityIssuerService;
pub use authorization::{PrivilegeChecker, PrivilegeScope, Role};
pub use issuer_type_manager::{IssuerTypeManager, MembershipUpdate};

use crate::error::{RegistryError, Result};

/// Default cap on the page size of listing operations.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 50;

/// Resolves a requested page size against `max`.
pub(crate) fn page_limit(num: usize, max: usize) -> Result<usize> {
    if num == 0 {
        return Err(RegistryError::invalid("page size must be at least 1"));
    }
    Ok(num.min(max))
}
