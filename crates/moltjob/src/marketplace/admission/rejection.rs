use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::super::matching::{ScoreBreakdown, SkillAnalysis};

/// Stable machine-readable rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    ValidationError,
    NotFound,
    JobNotActive,
    DuplicateApplication,
    PaymentRequired,
    MatchScoreTooLow,
    DailyLimitReached,
}

impl RejectionCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RejectionCode::ValidationError => "VALIDATION_ERROR",
            RejectionCode::NotFound => "NOT_FOUND",
            RejectionCode::JobNotActive => "JOB_NOT_ACTIVE",
            RejectionCode::DuplicateApplication => "DUPLICATE_APPLICATION",
            RejectionCode::PaymentRequired => "PAYMENT_REQUIRED",
            RejectionCode::MatchScoreTooLow => "MATCH_SCORE_TOO_LOW",
            RejectionCode::DailyLimitReached => "DAILY_LIMIT_REACHED",
        }
    }

    pub const fn http_status(self) -> StatusCode {
        match self {
            RejectionCode::ValidationError
            | RejectionCode::JobNotActive
            | RejectionCode::MatchScoreTooLow => StatusCode::BAD_REQUEST,
            RejectionCode::NotFound => StatusCode::NOT_FOUND,
            RejectionCode::DuplicateApplication => StatusCode::CONFLICT,
            RejectionCode::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            RejectionCode::DailyLimitReached => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Everything a calling agent needs to understand a score rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDiagnostics {
    pub score: f64,
    pub threshold: f64,
    pub breakdown: ScoreBreakdown,
    pub skill_analysis: SkillAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDetails {
    pub cap: usize,
    pub used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RejectionDetails {
    Score(ScoreDiagnostics),
    Quota(QuotaDetails),
}

/// A business-rule refusal. Not an error: callers branch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: RejectionCode,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RejectionDetails>,
}

impl Rejection {
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: RejectionDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RejectionCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RejectionCode::NotFound, message)
    }
}

/// Result of an operation that may be refused by a business rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            Outcome::Accepted(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Accepted(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Accepted(value) => Outcome::Accepted(f(value)),
            Outcome::Rejected(rejection) => Outcome::Rejected(rejection),
        }
    }
}

impl<T> From<Rejection> for Outcome<T> {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let value = serde_json::to_value(RejectionCode::MatchScoreTooLow).expect("serialize");
        assert_eq!(value, json!("MATCH_SCORE_TOO_LOW"));
        assert_eq!(RejectionCode::DailyLimitReached.as_str(), "DAILY_LIMIT_REACHED");
    }

    #[test]
    fn rejection_payload_shape() {
        let rejection = Rejection::new(RejectionCode::DailyLimitReached, "Daily limit reached")
            .with_details(RejectionDetails::Quota(QuotaDetails { cap: 3, used: 3 }));
        let value = serde_json::to_value(&rejection).expect("serialize");
        assert_eq!(
            value,
            json!({
                "code": "DAILY_LIMIT_REACHED",
                "error": "Daily limit reached",
                "details": { "cap": 3, "used": 3 }
            })
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RejectionCode::PaymentRequired.http_status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(RejectionCode::DuplicateApplication.http_status(), StatusCode::CONFLICT);
        assert_eq!(RejectionCode::JobNotActive.http_status(), StatusCode::BAD_REQUEST);
    }
}
