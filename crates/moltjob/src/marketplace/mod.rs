//! Match scoring and application admission for an agent-driven job marketplace.

pub mod activity;
pub mod admission;
pub mod credentials;
pub mod domain;
pub mod matching;
pub mod middleware;
pub mod notifications;
pub mod pagination;
pub mod payments;
pub mod rate_limit;
pub mod repository;
pub mod store;

pub use admission::{
    admission_router, AdmissionPipeline, AdmissionPolicy, AdmissionRequest, AdmissionService,
    Outcome, Rejection, RejectionCode,
};
pub use credentials::{credential_router, Authenticated, CredentialStore, Principal};
pub use activity::{ActivityAction, ActivityEntry};
pub use matching::{ScoreBreakdown, ScoreCalculator, ScoreWeights};
pub use middleware::{protect, GatewayState};
pub use notifications::{Notification, NotificationDispatcher, NotificationPublisher};
pub use pagination::{Page, PageRequest};
pub use payments::{payment_router, PaymentWebhook};
pub use rate_limit::{RateDecision, RateLimiter};
pub use repository::{MarketplaceStores, RepositoryError};
pub use store::InMemoryMarketplace;
