// src/models/response.rs
//! Tagged result returned by the public API surface.
//!
//! Internally every operation returns `Result<T, RegistryError>`. At the wire
//! boundary that result is flattened into:
//! - `{"ok": true, "value": ...}` on success
//! - `{"ok": false, "errorKind": "...", "message": "..."}` on failure

use crate::error::{ErrorKind, RegistryError};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData<T> {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ResponseData<T> {
    pub fn success(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(error: &RegistryError) -> Self {
        Self {
            ok: false,
            value: None,
            error_kind: Some(error.kind()),
            message: Some(error.to_string()),
        }
    }
}

impl<T> From<Result<T, RegistryError>> for ResponseData<T> {
    fn from(result: Result<T, RegistryError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::failure(&e),
        }
    }
}
