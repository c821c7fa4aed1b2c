// src/services/api_server.rs
//! HTTP surface of the trust registry.
//!
//! Every endpoint wraps one registry operation and answers with a
//! [`ResponseData`] body. Failures carry the error kind in the body and a
//! matching HTTP status:
//!
//! | kind              | status |
//! |-------------------|--------|
//! | `INVALID_ARGUMENT`| 400    |
//! | `UNAUTHORIZED`    | 403    |
//! | `ALREADY_EXISTS`  | 409    |
//! | `NOT_FOUND`       | 404    |
//! | `CONFLICT`        | 409    |
//! | `TIMEOUT`         | 504    |
//! | `LEDGER_REJECTED` | 502    |

use crate::error::{ErrorKind, RegistryError};
use crate::models::{
    RegisterAuthorityIssuerArgs, RemoveAuthorityIssuerArgs, ResponseData, WeIdAuthentication,
};
use crate::services::{AuthorityIssuerService, IssuerTypeManager};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Request payload for the offline-signing registration path
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionRequest {
    pub transaction_hex: String,
}

/// Request payload for creating an issuer type
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIssuerTypeRequest {
    pub type_name: String,
}

/// Request payload for adding a DID to an issuer type
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddIssuerIntoTypeRequest {
    pub caller_auth: WeIdAuthentication,
    pub type_name: String,
    pub we_id: String,
}

/// Request payload for removing a DID from an issuer type
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveIssuerFromTypeRequest {
    pub caller_auth_wrapper: WeIdAuthentication,
    pub type_name: String,
    pub we_id: String,
}

/// `?index=&num=` of the listing endpoints
#[derive(Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub index: usize,
    #[serde(default = "default_page_size")]
    pub num: usize,
}

fn default_page_size() -> usize {
    super::DEFAULT_MAX_PAGE_SIZE
}

/// HTTP status reported for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyExists | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::LedgerRejected => StatusCode::BAD_GATEWAY,
    }
}

fn respond<T: Serialize>(operation: &str, result: Result<T, RegistryError>) -> (StatusCode, Json<ResponseData<T>>) {
    match result {
        Ok(value) => (StatusCode::OK, Json(ResponseData::success(value))),
        Err(e) => {
            warn!("{} failed: {}", operation, e);
            (status_for(e.kind()), Json(ResponseData::failure(&e)))
        }
    }
}

/// API server state containing the registry services
#[derive(Clone)]
pub struct ApiServer {
    /// Authority issuer registry
    issuers: Arc<AuthorityIssuerService>,

    /// Issuer-type membership
    issuer_types: Arc<IssuerTypeManager>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `issuers` - Authority issuer registry
    /// * `issuer_types` - Issuer-type manager sharing the same ledger
    pub fn new(issuers: Arc<AuthorityIssuerService>, issuer_types: Arc<IssuerTypeManager>) -> Self {
        ApiServer { issuers, issuer_types }
    }

    /// Builds the router with every registry endpoint.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/register-authority-issuer", post(Self::register_authority_issuer_handler))
            .route("/register-authority-issuer-raw", post(Self::register_authority_issuer_raw_handler))
            .route("/remove-authority-issuer", post(Self::remove_authority_issuer_handler))
            .route("/is-authority-issuer/:we_id", get(Self::is_authority_issuer_handler))
            .route("/authority-issuer/:we_id", get(Self::query_authority_issuer_handler))
            .route("/authority-issuers", get(Self::list_authority_issuers_handler))
            .route("/register-issuer-type", post(Self::register_issuer_type_handler))
            .route("/add-issuer-into-issuer-type", post(Self::add_issuer_into_type_handler))
            .route("/remove-issuer-from-issuer-type", post(Self::remove_issuer_from_type_handler))
            .route("/is-specific-type-issuer/:type_name/:we_id", get(Self::is_specific_type_issuer_handler))
            .route("/specific-type-issuers/:type_name", get(Self::list_specific_type_issuers_handler))
            .route("/issuer-type-digest/:type_name", get(Self::current_digest_handler))
            .route("/membership-witness/:type_name/:we_id", get(Self::membership_witness_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("trust registry listening on {}", addr);
        axum::serve(listener, self.router()).await
    }

    /// Registers an authority issuer
    ///
    /// # Endpoint
    /// POST /register-authority-issuer
    ///
    /// # Request Body
    /// `{"authorityIssuer": {...}, "caller": {"weId": ...}}`
    async fn register_authority_issuer_handler(
        State(state): State<Arc<ApiServer>>,
        Json(args): Json<RegisterAuthorityIssuerArgs>,
    ) -> impl IntoResponse {
        respond(
            "registerAuthorityIssuer",
            state.issuers.register_authority_issuer(args).await,
        )
    }

    /// Forwards a pre-signed registration transaction
    ///
    /// # Endpoint
    /// POST /register-authority-issuer-raw
    ///
    /// # Responses
    /// - 200 OK: transaction hash
    /// - 400 Bad Request: payload is not hex
    /// - 502 Bad Gateway: the ledger refused the payload
    async fn register_authority_issuer_raw_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RawTransactionRequest>,
    ) -> impl IntoResponse {
        respond(
            "registerAuthorityIssuer(raw)",
            state
                .issuers
                .register_authority_issuer_raw(&payload.transaction_hex)
                .await,
        )
    }

    async fn remove_authority_issuer_handler(
        State(state): State<Arc<ApiServer>>,
        Json(args): Json<RemoveAuthorityIssuerArgs>,
    ) -> impl IntoResponse {
        respond(
            "removeAuthorityIssuer",
            state.issuers.remove_authority_issuer(args).await,
        )
    }

    /// # Endpoint
    /// GET /is-authority-issuer/:we_id
    async fn is_authority_issuer_handler(
        Path(we_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond("isAuthorityIssuer", state.issuers.is_authority_issuer(&we_id).await)
    }

    /// # Endpoint
    /// GET /authority-issuer/:we_id
    async fn query_authority_issuer_handler(
        Path(we_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond(
            "queryAuthorityIssuerInfo",
            state.issuers.query_authority_issuer_info(&we_id).await,
        )
    }

    /// # Endpoint
    /// GET /authority-issuers?index=0&num=10
    async fn list_authority_issuers_handler(
        Query(page): Query<PageQuery>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond(
            "getAllAuthorityIssuerList",
            state
                .issuers
                .get_all_authority_issuer_list(page.index, page.num)
                .await,
        )
    }

    async fn register_issuer_type_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RegisterIssuerTypeRequest>,
    ) -> impl IntoResponse {
        respond(
            "registerIssuerType",
            state.issuer_types.register_issuer_type(&payload.type_name).await,
        )
    }

    async fn add_issuer_into_type_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<AddIssuerIntoTypeRequest>,
    ) -> impl IntoResponse {
        respond(
            "addIssuerIntoIssuerType",
            state
                .issuer_types
                .add_issuer_into_issuer_type(&payload.caller_auth, &payload.type_name, &payload.we_id)
                .await,
        )
    }

    async fn remove_issuer_from_type_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RemoveIssuerFromTypeRequest>,
    ) -> impl IntoResponse {
        respond(
            "removeIssuerFromIssuerType",
            state
                .issuer_types
                .remove_issuer_from_issuer_type(&payload.caller_auth_wrapper, &payload.type_name, &payload.we_id)
                .await,
        )
    }

    /// # Endpoint
    /// GET /is-specific-type-issuer/:type_name/:we_id
    async fn is_specific_type_issuer_handler(
        Path((type_name, we_id)): Path<(String, String)>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond(
            "isSpecificTypeIssuer",
            state
                .issuer_types
                .is_specific_type_issuer(&type_name, &we_id)
                .await,
        )
    }

    async fn list_specific_type_issuers_handler(
        Path(type_name): Path<String>,
        Query(page): Query<PageQuery>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond(
            "getAllSpecificTypeIssuerList",
            state
                .issuer_types
                .get_all_specific_type_issuer_list(&type_name, page.index, page.num)
                .await,
        )
    }

    async fn current_digest_handler(
        Path(type_name): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond("currentDigest", state.issuer_types.current_digest(&type_name).await)
    }

    async fn membership_witness_handler(
        Path((type_name, we_id)): Path<(String, String)>,
        State(state): State<Arc<ApiServer>>,
    ) -> impl IntoResponse {
        respond(
            "membershipWitness",
            state.issuer_types.membership_witness(&type_name, &we_id).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::LedgerRejected), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_page_query_defaults() {
        let page: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(page.index, 0);
        assert_eq!(page.num, super::super::DEFAULT_MAX_PAGE_SIZE);
    }
}
