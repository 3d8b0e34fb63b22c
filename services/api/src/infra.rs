use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use moltjob::clock::Clock;
use moltjob::config::AppConfig;
use moltjob::error::AppError;
use moltjob::marketplace::credentials::{
    apply_touch, CredentialRepository, InMemoryCredentials, LastUsedTouch,
};
use moltjob::marketplace::domain::{
    CandidateId, CandidateProfile, EmployerId, JobId, JobPosting, JobStatus, LocationPreference,
    WorkArrangement,
};
use moltjob::marketplace::notifications::{
    HttpTransport, Notification, NotificationDispatcher, OrchestratorEndpoints,
};
use moltjob::marketplace::rate_limit::{spawn_sweeper, InMemoryRateStore};
use moltjob::marketplace::{
    admission_router, credential_router, payment_router, protect, AdmissionService,
    CredentialStore, GatewayState, MarketplaceStores, PaymentWebhook, RateLimiter,
};
use moltjob::tasks::BackgroundQueue;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::debug;

pub(crate) const DEMO_CANDIDATE: &str = "demo-seeker";
pub(crate) const DEMO_EMPLOYER: &str = "demo-employer";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the HTTP server needs, wired from configuration.
pub(crate) struct Marketplace {
    pub(crate) router: Router,
    pub(crate) stores: MarketplaceStores,
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) endpoints: Option<Arc<OrchestratorEndpoints>>,
    pub(crate) workers: Vec<JoinHandle<()>>,
}

/// Build stores, background queues, and the protected API router. Must be
/// called inside a tokio runtime.
pub(crate) fn build_marketplace(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<Marketplace, AppError> {
    let (stores, _) = MarketplaceStores::in_memory();
    let mut workers = Vec::new();

    let (endpoints, dispatcher) = match &config.notifications.orchestrator_url {
        Some(url) => {
            let endpoints = Arc::new(OrchestratorEndpoints::new(url.clone()));
            let transport = HttpTransport::new(config.notifications.request_timeout)?;
            let dispatcher = NotificationDispatcher::new(
                endpoints.clone(),
                Arc::new(transport),
                config.notifications.retry.clone(),
            );
            (Some(endpoints), Some(Arc::new(dispatcher)))
        }
        None => (None, None),
    };
    let (notifications, worker) = BackgroundQueue::spawn(
        "notifications",
        config.notifications.queue_capacity,
        8,
        move |event: Notification| {
            let dispatcher = dispatcher.clone();
            async move {
                match dispatcher {
                    Some(dispatcher) => {
                        dispatcher.dispatch(event).await;
                    }
                    None => debug!(
                        target_id = %event.target_id,
                        event_type = %event.event_type,
                        "no orchestrator configured; notification dropped"
                    ),
                }
            }
        },
    );
    workers.push(worker);

    let credential_repository = Arc::new(InMemoryCredentials::default());
    let touch_repository: Arc<dyn CredentialRepository> = credential_repository.clone();
    let (last_used, worker) =
        BackgroundQueue::spawn("credential-last-used", 1024, 4, move |touch: LastUsedTouch| {
            apply_touch(touch_repository.clone(), touch)
        });
    workers.push(worker);
    let credentials = Arc::new(CredentialStore::new(
        credential_repository,
        Arc::new(last_used),
        clock.clone(),
        config.credentials.prefix_len,
    ));

    let limiter = Arc::new(RateLimiter::new(
        Arc::new(InMemoryRateStore::new(config.rate_limit.max_entries)),
        clock.clone(),
    ));
    workers.push(spawn_sweeper(
        limiter.clone(),
        config.rate_limit.sweep_interval,
    ));

    let admission = Arc::new(AdmissionService::new(
        stores.clone(),
        Arc::new(notifications),
        config.admission.clone(),
        clock,
    ));
    let payments = Arc::new(PaymentWebhook::new(
        stores.candidates.clone(),
        config.payments.webhook_secret.clone(),
    ));

    let gateway = GatewayState {
        credentials: credentials.clone(),
        limiter,
        max_requests: config.rate_limit.max_requests,
        window: config.rate_limit.window,
    };
    let router = protect(
        admission_router(admission).merge(credential_router(credentials.clone())),
        gateway,
    )
    .merge(payment_router(payments));

    Ok(Marketplace {
        router,
        stores,
        credentials,
        endpoints,
        workers,
    })
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn demo_candidate() -> CandidateProfile {
    CandidateProfile {
        id: CandidateId::from(DEMO_CANDIDATE),
        skills: vec![
            "Rust".to_string(),
            "Tokio".to_string(),
            "PostgreSQL".to_string(),
            "Kubernetes".to_string(),
        ],
        min_salary: Some(140_000),
        max_salary: Some(180_000),
        experience_years: 7,
        remote_preference: LocationPreference::Remote,
        preferred_locations: vec!["Lisbon".to_string()],
        has_paid: true,
        agent_active: true,
    }
}

pub(crate) fn demo_jobs() -> Vec<JobPosting> {
    let employer = EmployerId::from(DEMO_EMPLOYER);
    let mut weights = BTreeMap::new();
    weights.insert("Rust".to_string(), 3.0);
    weights.insert("Go".to_string(), 1.0);

    vec![
        JobPosting {
            id: JobId::from("demo-platform"),
            employer_id: employer.clone(),
            title: "Senior platform engineer".to_string(),
            required_skills: vec!["Rust".to_string(), "Kubernetes".to_string()],
            nice_to_have_skills: vec!["PostgreSQL".to_string()],
            skill_weights: None,
            min_match_score: Some(70.0),
            salary_min: Some(150_000),
            salary_max: Some(190_000),
            experience_min: 5,
            experience_max: Some(10),
            remote_type: WorkArrangement::Remote,
            location: None,
            status: JobStatus::Active,
        },
        JobPosting {
            id: JobId::from("demo-infra"),
            employer_id: employer.clone(),
            title: "Infrastructure engineer".to_string(),
            required_skills: vec!["Rust".to_string(), "Go".to_string()],
            nice_to_have_skills: vec!["Terraform".to_string()],
            skill_weights: Some(weights),
            min_match_score: Some(85.0),
            salary_min: Some(110_000),
            salary_max: Some(125_000),
            experience_min: 4,
            experience_max: None,
            remote_type: WorkArrangement::Hybrid,
            location: Some("Lisbon, PT".to_string()),
            status: JobStatus::Active,
        },
        JobPosting {
            id: JobId::from("demo-data"),
            employer_id: employer.clone(),
            title: "Data platform engineer".to_string(),
            required_skills: vec!["PostgreSQL".to_string()],
            nice_to_have_skills: Vec::new(),
            skill_weights: None,
            min_match_score: None,
            salary_min: None,
            salary_max: None,
            experience_min: 3,
            experience_max: None,
            remote_type: WorkArrangement::Remote,
            location: None,
            status: JobStatus::Active,
        },
        JobPosting {
            id: JobId::from("demo-archived"),
            employer_id: employer,
            title: "Backend engineer (filled)".to_string(),
            required_skills: vec!["Rust".to_string()],
            nice_to_have_skills: Vec::new(),
            skill_weights: None,
            min_match_score: None,
            salary_min: None,
            salary_max: None,
            experience_min: 0,
            experience_max: None,
            remote_type: WorkArrangement::Remote,
            location: None,
            status: JobStatus::Filled,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use moltjob::marketplace::ScoreCalculator;

    #[test]
    fn demo_jobs_cover_pass_and_fail_thresholds() {
        let calculator = ScoreCalculator::default();
        let candidate = demo_candidate();
        let jobs = demo_jobs();

        let platform = calculator.score_detailed(&candidate, &jobs[0]);
        let infra = calculator.score_detailed(&candidate, &jobs[1]);
        assert!(platform.passed);
        assert!(!infra.passed);
        assert_eq!(calculator.rank(&candidate, &jobs).len(), 3);
    }
}
