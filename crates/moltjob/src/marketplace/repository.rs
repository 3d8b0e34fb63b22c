use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::activity::ActivityEntry;
use super::domain::{
    Application, ApplicationId, CandidateId, CandidateProfile, Conversation, ConversationId,
    EmployerId, JobId, JobPosting, Message,
};
use super::pagination::{Page, PageRequest};
use super::store::InMemoryMarketplace;

/// Storage abstraction for candidate profiles.
pub trait CandidateRepository: Send + Sync {
    fn fetch(&self, id: &CandidateId) -> Result<Option<CandidateProfile>, RepositoryError>;
    fn upsert(&self, profile: CandidateProfile) -> Result<(), RepositoryError>;
    /// Set the payment flag. Fails with `NotFound` for an unknown candidate.
    fn mark_paid(&self, id: &CandidateId) -> Result<(), RepositoryError>;
}

pub trait JobRepository: Send + Sync {
    fn fetch(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError>;
    fn upsert(&self, job: JobPosting) -> Result<(), RepositoryError>;
    fn active(&self) -> Result<Vec<JobPosting>, RepositoryError>;
}

/// Applications are unique per (candidate, job); a second insert for the
/// same pair must fail with `Conflict`.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    /// Undo an insert whose follow-up writes failed. Removing an unknown id
    /// is not an error.
    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn find_by_pair(
        &self,
        candidate: &CandidateId,
        job: &JobId,
    ) -> Result<Option<Application>, RepositoryError>;
    /// Applications created in `[start, end)`.
    fn count_created_between(
        &self,
        candidate: &CandidateId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
    /// Newest first.
    fn for_candidate(&self, candidate: &CandidateId) -> Result<Vec<Application>, RepositoryError>;
    /// Applications to any of the employer's postings, newest first.
    fn for_employer(&self, employer: &EmployerId) -> Result<Vec<Application>, RepositoryError>;
}

pub trait ConversationRepository: Send + Sync {
    fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError>;
    /// Drop a conversation together with its messages.
    fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError>;
    fn append(&self, message: Message) -> Result<Message, RepositoryError>;
    /// Messages of one conversation, oldest first.
    fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError>;
}

/// Append-only audit log.
pub trait ActivityRepository: Send + Sync {
    fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError>;
    /// One page of the actor's entries, newest first.
    fn for_actor(
        &self,
        actor_id: &str,
        page: PageRequest,
    ) -> Result<Page<ActivityEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// The repositories the admission service works against.
#[derive(Clone)]
pub struct MarketplaceStores {
    pub candidates: Arc<dyn CandidateRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub activity: Arc<dyn ActivityRepository>,
}

impl MarketplaceStores {
    /// All repositories backed by one shared in-memory store.
    pub fn in_memory() -> (Self, Arc<InMemoryMarketplace>) {
        let store = Arc::new(InMemoryMarketplace::default());
        let stores = Self {
            candidates: store.clone(),
            jobs: store.clone(),
            applications: store.clone(),
            conversations: store.clone(),
            activity: store.clone(),
        };
        (stores, store)
    }
}
