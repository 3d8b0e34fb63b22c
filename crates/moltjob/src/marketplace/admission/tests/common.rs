use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::marketplace::admission::{
    admission_router, AdmissionPolicy, AdmissionService, CoverMessageError, CoverMessageSource,
};
use crate::marketplace::activity::ActivityEntry;
use crate::marketplace::credentials::{Authenticated, Principal};
use crate::marketplace::domain::{
    Application, ApplicationId, CandidateId, CandidateProfile, Conversation, ConversationId,
    CredentialId, EmployerId, JobId, JobPosting, JobStatus, LocationPreference, Message,
    WorkArrangement,
};
use crate::marketplace::notifications::{Notification, NotificationPublisher, NotifyError};
use crate::marketplace::pagination::{Page, PageRequest};
use crate::marketplace::repository::{
    ActivityRepository, ApplicationRepository, ConversationRepository, MarketplaceStores,
    RepositoryError,
};
use crate::tasks::QueueError;

pub(super) const CANDIDATE: &str = "seeker-1";
pub(super) const EMPLOYER: &str = "employer-1";

pub(super) fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap()
}

pub(super) fn candidate() -> CandidateProfile {
    CandidateProfile {
        id: CandidateId::from(CANDIDATE),
        skills: vec!["Rust".to_string(), "Tokio".to_string(), "SQL".to_string()],
        min_salary: Some(120_000),
        max_salary: Some(160_000),
        experience_years: 5,
        remote_preference: LocationPreference::Remote,
        preferred_locations: vec!["Berlin".to_string()],
        has_paid: true,
        agent_active: true,
    }
}

/// Scores a perfect 100 against [`candidate`].
pub(super) fn job(id: &str) -> JobPosting {
    JobPosting {
        id: JobId::from(id),
        employer_id: EmployerId::from(EMPLOYER),
        title: format!("Backend engineer {id}"),
        required_skills: vec!["Rust".to_string(), "Tokio".to_string()],
        nice_to_have_skills: vec!["SQL".to_string()],
        skill_weights: None,
        min_match_score: None,
        salary_min: Some(120_000),
        salary_max: Some(150_000),
        experience_min: 3,
        experience_max: Some(8),
        remote_type: WorkArrangement::Remote,
        location: None,
        status: JobStatus::Active,
    }
}

/// Aggregates to exactly 82.5 against [`flexible_candidate`] and demands 85.
pub(super) fn demanding_job(id: &str) -> JobPosting {
    let weights: BTreeMap<String, f64> = [("Rust", 3.0), ("Go", 1.0), ("SQL", 1.0), ("Kafka", 15.0)]
        .into_iter()
        .map(|(skill, weight)| (skill.to_string(), weight))
        .collect();
    JobPosting {
        required_skills: vec!["Rust".to_string(), "Go".to_string()],
        nice_to_have_skills: vec!["SQL".to_string(), "Kafka".to_string()],
        skill_weights: Some(weights),
        min_match_score: Some(85.0),
        ..job(id)
    }
}

/// [`candidate`] with an open location preference, used with [`demanding_job`].
pub(super) fn flexible_candidate() -> CandidateProfile {
    CandidateProfile {
        remote_preference: LocationPreference::Any,
        ..candidate()
    }
}

pub(super) fn policy() -> AdmissionPolicy {
    AdmissionPolicy::default()
}

pub(super) struct Harness {
    pub(super) service: AdmissionService<RecordingNotifications>,
    pub(super) stores: MarketplaceStores,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn harness() -> Harness {
    let (stores, _) = MarketplaceStores::in_memory();
    let notifications = Arc::new(RecordingNotifications::default());
    let clock = Arc::new(FixedClock::new(morning()));
    let service = AdmissionService::new(
        stores.clone(),
        notifications.clone(),
        policy(),
        clock.clone(),
    );
    Harness {
        service,
        stores,
        notifications,
        clock,
    }
}

impl Harness {
    pub(super) fn seed(&self, candidate: CandidateProfile, jobs: Vec<JobPosting>) {
        self.stores.candidates.upsert(candidate).expect("seed candidate");
        for job in jobs {
            self.stores.jobs.upsert(job).expect("seed job");
        }
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifications {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn of_type(&self, event_type: &str) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }
}

impl NotificationPublisher for RecordingNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Publisher whose queue is always full.
pub(super) struct SaturatedNotifications;

impl NotificationPublisher for SaturatedNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(QueueError::Full.into())
    }
}

pub(super) struct FailingCoverMessages;

#[async_trait]
impl CoverMessageSource for FailingCoverMessages {
    async fn compose(
        &self,
        _candidate: &CandidateProfile,
        _job: &JobPosting,
    ) -> Result<String, CoverMessageError> {
        Err(CoverMessageError::Unavailable("model offline".to_string()))
    }
}

pub(super) struct UnavailableApplications;

impl ApplicationRepository for UnavailableApplications {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _application: Application) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &ApplicationId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_pair(
        &self,
        _candidate: &CandidateId,
        _job: &JobId,
    ) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_created_between(
        &self,
        _candidate: &CandidateId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_candidate(&self, _candidate: &CandidateId) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_employer(&self, _employer: &EmployerId) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Which conversation write [`BrokenConversations`] refuses.
#[derive(Clone, Copy)]
pub(super) enum ConversationStep {
    Create,
    FirstMessage,
}

/// Delegates to a working store except for one failing write.
pub(super) struct BrokenConversations {
    pub(super) inner: Arc<dyn ConversationRepository>,
    pub(super) fails_at: ConversationStep,
}

impl ConversationRepository for BrokenConversations {
    fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        match self.fails_at {
            ConversationStep::Create => {
                Err(RepositoryError::Unavailable("database offline".to_string()))
            }
            ConversationStep::FirstMessage => self.inner.create(conversation),
        }
    }

    fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        self.inner.remove(id)
    }

    fn fetch(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        match self.fails_at {
            ConversationStep::Create => self.inner.append(message),
            ConversationStep::FirstMessage => {
                Err(RepositoryError::Unavailable("database offline".to_string()))
            }
        }
    }

    fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        self.inner.messages(id)
    }
}

pub(super) struct UnavailableActivity;

impl ActivityRepository for UnavailableActivity {
    fn record(&self, _entry: ActivityEntry) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }

    fn for_actor(
        &self,
        _actor_id: &str,
        _page: PageRequest,
    ) -> Result<Page<ActivityEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }
}

pub(super) fn as_candidate(id: &str) -> Authenticated {
    Authenticated {
        principal: Principal::candidate(id),
        credential_id: CredentialId::from("cred-candidate"),
    }
}

pub(super) fn as_employer(id: &str) -> Authenticated {
    Authenticated {
        principal: Principal::employer(id),
        credential_id: CredentialId::from("cred-employer"),
    }
}

pub(super) fn router_for(
    service: AdmissionService<RecordingNotifications>,
    auth: Authenticated,
) -> axum::Router {
    admission_router(Arc::new(service)).layer(axum::Extension(auth))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
