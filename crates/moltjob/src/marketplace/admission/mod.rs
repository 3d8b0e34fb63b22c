//! Application admission: the ordered gate pipeline, structured rejections,
//! and the service that commits admitted applications.

mod config;
pub(crate) mod gates;
mod rejection;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use config::AdmissionPolicy;
pub use gates::{
    AdmissionContext, AdmissionPipeline, AdmissionRequest, DailyQuotaGate, DuplicateGate, Gate,
    GateKind, GateStop, JobActiveGate, PaymentGate, ProfileGate, ScoreThresholdGate,
};
pub use rejection::{
    Outcome, QuotaDetails, Rejection, RejectionCode, RejectionDetails, ScoreDiagnostics,
};
pub use router::admission_router;
pub use service::{
    AdmissionOutcome, AdmissionService, AdmissionServiceError, ApplicationFilter,
    ApplicationOrder, AutoApplyReport,
    CoverMessageError, CoverMessageSource, JobMatch, SkippedJob, TemplateCoverMessages,
};
