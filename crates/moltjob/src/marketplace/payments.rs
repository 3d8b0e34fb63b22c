//! Payment-provider webhook: signature verification and the one-time unlock.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use super::domain::CandidateId;
use super::repository::{CandidateRepository, RepositoryError};

pub const SIGNATURE_HEADER: &str = "x-cc-webhook-signature";

const UNLOCKING_EVENTS: [&str; 2] = ["charge:confirmed", "charge:resolved"];

/// HMAC-SHA256 of the raw body, compared in constant time against a hex
/// signature. Malformed hex is a mismatch.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: Option<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type", default)]
    kind: String,
    data: Option<ChargeData>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    id: Option<String>,
    #[serde(default)]
    metadata: Option<ChargeMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChargeMetadata {
    job_seeker_id: Option<String>,
}

/// What a verified webhook did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub event_type: String,
    pub charge_id: String,
    pub candidate_id: Option<CandidateId>,
    pub unlocked: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment webhook secret is not configured")]
    NotConfigured,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing charge data")]
    MissingChargeData,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct PaymentWebhook {
    candidates: Arc<dyn CandidateRepository>,
    secret: Option<String>,
}

impl PaymentWebhook {
    pub fn new(candidates: Arc<dyn CandidateRepository>, secret: Option<String>) -> Self {
        Self { candidates, secret }
    }

    pub fn apply(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<PaymentReceipt, PaymentError> {
        let secret = self.secret.as_deref().ok_or(PaymentError::NotConfigured)?;
        let signature = signature.ok_or(PaymentError::InvalidSignature)?;
        if !verify_signature(secret, body, signature) {
            warn!("payment webhook signature mismatch");
            return Err(PaymentError::InvalidSignature);
        }

        let parsed: WebhookBody = serde_json::from_slice(body)?;
        let event = parsed.event.ok_or(PaymentError::MissingChargeData)?;
        let charge = event.data.ok_or(PaymentError::MissingChargeData)?;
        let charge_id = charge
            .id
            .filter(|id| !id.is_empty())
            .ok_or(PaymentError::MissingChargeData)?;
        let candidate_id = charge
            .metadata
            .and_then(|metadata| metadata.job_seeker_id)
            .map(CandidateId);

        let mut unlocked = false;
        if UNLOCKING_EVENTS.contains(&event.kind.as_str()) {
            if let Some(candidate) = &candidate_id {
                match self.candidates.mark_paid(candidate) {
                    Ok(()) => unlocked = true,
                    Err(RepositoryError::NotFound) => {
                        warn!(%charge_id, candidate_id = %candidate, "payment for unknown candidate")
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        }

        info!(
            event_type = %event.kind,
            %charge_id,
            unlocked,
            "payment webhook processed"
        );
        Ok(PaymentReceipt {
            event_type: event.kind,
            charge_id,
            candidate_id,
            unlocked,
        })
    }
}

pub fn payment_router(webhook: Arc<PaymentWebhook>) -> Router {
    Router::new()
        .route("/api/v1/payments/webhook", post(webhook_handler))
        .with_state(webhook)
}

pub(crate) async fn webhook_handler(
    State(webhook): State<Arc<PaymentWebhook>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match webhook.apply(&body, signature) {
        Ok(receipt) => (
            StatusCode::OK,
            axum::Json(json!({ "received": true, "unlocked": receipt.unlocked })),
        )
            .into_response(),
        Err(error) => {
            let status = match &error {
                PaymentError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
                PaymentError::Malformed(_) | PaymentError::MissingChargeData => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, axum::Json(json!({ "error": error.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{CandidateProfile, LocationPreference};
    use crate::marketplace::repository::MarketplaceStores;

    const SECRET: &str = "whsec_test";

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn webhook() -> (PaymentWebhook, MarketplaceStores) {
        let (stores, _) = MarketplaceStores::in_memory();
        stores
            .candidates
            .upsert(CandidateProfile {
                id: CandidateId::from("seeker-1"),
                skills: Vec::new(),
                min_salary: None,
                max_salary: None,
                experience_years: 0,
                remote_preference: LocationPreference::Any,
                preferred_locations: Vec::new(),
                has_paid: false,
                agent_active: false,
            })
            .expect("seed candidate");
        let webhook = PaymentWebhook::new(stores.candidates.clone(), Some(SECRET.to_string()));
        (webhook, stores)
    }

    fn charge_body(kind: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": {
                "type": kind,
                "data": { "id": "charge-1", "metadata": { "job_seeker_id": "seeker-1" } }
            }
        }))
        .expect("serialize")
    }

    #[test]
    fn signatures_verify_in_constant_time() {
        let body = b"{\"ok\":true}";
        let signature = sign(body);
        assert!(verify_signature(SECRET, body, &signature));
        assert!(verify_signature(SECRET, body, &signature.to_uppercase()));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature(SECRET, b"{}", &signature));
        assert!(!verify_signature(SECRET, body, "not-hex"));
        assert!(!verify_signature(SECRET, body, &signature[1..]));
        assert!(!verify_signature(SECRET, body, ""));
    }

    #[test]
    fn confirmed_charge_unlocks_candidate() {
        let (webhook, stores) = webhook();
        let body = charge_body("charge:confirmed");
        let receipt = webhook.apply(&body, Some(&sign(&body))).expect("applies");

        assert!(receipt.unlocked);
        let profile = stores
            .candidates
            .fetch(&CandidateId::from("seeker-1"))
            .expect("fetch")
            .expect("present");
        assert!(profile.has_paid);
    }

    #[test]
    fn pending_charge_is_acknowledged_without_unlock() {
        let (webhook, stores) = webhook();
        let body = charge_body("charge:pending");
        let receipt = webhook.apply(&body, Some(&sign(&body))).expect("applies");

        assert!(!receipt.unlocked);
        let profile = stores
            .candidates
            .fetch(&CandidateId::from("seeker-1"))
            .expect("fetch")
            .expect("present");
        assert!(!profile.has_paid);
    }

    #[test]
    fn rejects_bad_signatures_and_missing_data() {
        let (webhook, _) = webhook();
        let body = charge_body("charge:confirmed");
        assert!(matches!(
            webhook.apply(&body, Some("00ff")),
            Err(PaymentError::InvalidSignature)
        ));
        assert!(matches!(
            webhook.apply(&body, None),
            Err(PaymentError::InvalidSignature)
        ));

        let empty = br#"{"event":{"type":"charge:confirmed"}}"#;
        assert!(matches!(
            webhook.apply(empty, Some(&sign(empty))),
            Err(PaymentError::MissingChargeData)
        ));
    }

    #[test]
    fn unconfigured_secret_refuses_everything() {
        let (stores, _) = MarketplaceStores::in_memory();
        let webhook = PaymentWebhook::new(stores.candidates, None);
        assert!(matches!(
            webhook.apply(b"{}", Some("00")),
            Err(PaymentError::NotConfigured)
        ));
    }
}
