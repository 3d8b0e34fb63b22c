use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::warn;

use super::Credential;
use crate::marketplace::domain::CredentialId;
use crate::marketplace::repository::RepositoryError;
use crate::tasks::BackgroundQueue;

/// Storage for issued credentials. Hashes never leave this boundary except to
/// the store that verifies them.
pub trait CredentialRepository: Send + Sync {
    fn insert(&self, credential: Credential) -> Result<(), RepositoryError>;
    fn update(&self, credential: Credential) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CredentialId) -> Result<Option<Credential>, RepositoryError>;
    /// Every record with this lookup prefix, revoked or not.
    fn by_prefix(&self, prefix: &str) -> Result<Vec<Credential>, RepositoryError>;
    fn for_owner(&self, owner_id: &str) -> Result<Vec<Credential>, RepositoryError>;
    fn touch(&self, id: &CredentialId, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[derive(Default)]
pub struct InMemoryCredentials {
    records: Mutex<Vec<Credential>>,
}

impl InMemoryCredentials {
    fn records(&self) -> Result<MutexGuard<'_, Vec<Credential>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("credential store poisoned".to_string()))
    }
}

impl CredentialRepository for InMemoryCredentials {
    fn insert(&self, credential: Credential) -> Result<(), RepositoryError> {
        let mut records = self.records()?;
        if records.iter().any(|existing| existing.id == credential.id) {
            return Err(RepositoryError::Conflict);
        }
        records.push(credential);
        Ok(())
    }

    fn update(&self, credential: Credential) -> Result<(), RepositoryError> {
        let mut records = self.records()?;
        let existing = records
            .iter_mut()
            .find(|existing| existing.id == credential.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = credential;
        Ok(())
    }

    fn fetch(&self, id: &CredentialId) -> Result<Option<Credential>, RepositoryError> {
        Ok(self.records()?.iter().find(|record| &record.id == id).cloned())
    }

    fn by_prefix(&self, prefix: &str) -> Result<Vec<Credential>, RepositoryError> {
        Ok(self
            .records()?
            .iter()
            .filter(|record| record.prefix == prefix)
            .cloned()
            .collect())
    }

    fn for_owner(&self, owner_id: &str) -> Result<Vec<Credential>, RepositoryError> {
        Ok(self
            .records()?
            .iter()
            .filter(|record| record.owner.id == owner_id)
            .cloned()
            .collect())
    }

    fn touch(&self, id: &CredentialId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut records = self.records()?;
        let record = records
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.last_used_at = Some(at);
        Ok(())
    }
}

/// Receives last-used updates after a successful validation. Must never fail
/// or block the caller.
pub trait LastUsedSink: Send + Sync {
    fn record(&self, id: CredentialId, at: DateTime<Utc>);
}

/// A pending last-used write.
#[derive(Debug, Clone)]
pub struct LastUsedTouch {
    pub id: CredentialId,
    pub at: DateTime<Utc>,
}

impl LastUsedSink for BackgroundQueue<LastUsedTouch> {
    fn record(&self, id: CredentialId, at: DateTime<Utc>) {
        // overflow is already logged by the queue
        let _ = self.submit(LastUsedTouch { id, at });
    }
}

/// Writes through immediately, logging and discarding failures.
pub struct DirectLastUsed {
    repository: Arc<dyn CredentialRepository>,
}

impl DirectLastUsed {
    pub fn new(repository: Arc<dyn CredentialRepository>) -> Self {
        Self { repository }
    }
}

impl LastUsedSink for DirectLastUsed {
    fn record(&self, id: CredentialId, at: DateTime<Utc>) {
        if let Err(error) = self.repository.touch(&id, at) {
            warn!(credential_id = %id, %error, "failed to record credential use");
        }
    }
}

/// Apply a queued touch. Used as the background worker body.
pub async fn apply_touch(repository: Arc<dyn CredentialRepository>, touch: LastUsedTouch) {
    DirectLastUsed::new(repository).record(touch.id, touch.at);
}
