use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::{Authenticated, CredentialError, CredentialStore};
use crate::marketplace::domain::CredentialId;

const SHOW_ONCE_WARNING: &str = "Store this key securely. It will not be shown again.";

/// Self-service key management for the authenticated principal.
pub fn credential_router(store: Arc<CredentialStore>) -> Router {
    Router::new()
        .route("/api/v1/auth/api-keys", get(list_handler).post(issue_handler))
        .route("/api/v1/auth/api-keys/:credential_id", delete(revoke_handler))
        .with_state(store)
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueKeyBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn failure(error: CredentialError) -> Response {
    error!(%error, "credential operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

pub(crate) async fn issue_handler(
    State(store): State<Arc<CredentialStore>>,
    Extension(auth): Extension<Authenticated>,
    body: Option<axum::Json<IssueKeyBody>>,
) -> Response {
    let body = body.map(|axum::Json(body)| body).unwrap_or_default();
    let label = body.name.unwrap_or_default();

    match store.issue(auth.principal, &label, body.expires_at) {
        Ok(issued) => {
            let payload = json!({
                "api_key": issued.secret,
                "id": issued.credential.id,
                "key_prefix": issued.credential.prefix,
                "name": issued.credential.label,
                "created_at": issued.credential.created_at,
                "expires_at": issued.credential.expires_at,
                "warning": SHOW_ONCE_WARNING,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn list_handler(
    State(store): State<Arc<CredentialStore>>,
    Extension(auth): Extension<Authenticated>,
) -> Response {
    match store.list(&auth.principal.id) {
        Ok(views) => (StatusCode::OK, axum::Json(views)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn revoke_handler(
    State(store): State<Arc<CredentialStore>>,
    Extension(auth): Extension<Authenticated>,
    Path(credential_id): Path<String>,
) -> Response {
    match store.revoke(&CredentialId(credential_id), &auth.principal.id) {
        Ok(true) => (StatusCode::OK, axum::Json(json!({ "revoked": true }))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "error": "API key not found", "code": "NOT_FOUND" })),
        )
            .into_response(),
        Err(error) => failure(error),
    }
}
