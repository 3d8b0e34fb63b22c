use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::activity::ActivityEntry;
use super::domain::{
    Application, ApplicationId, CandidateId, CandidateProfile, Conversation, ConversationId,
    EmployerId, JobId, JobPosting, Message,
};
use super::pagination::{Page, PageRequest};
use super::repository::{
    ActivityRepository, ApplicationRepository, CandidateRepository, ConversationRepository,
    JobRepository, RepositoryError,
};

#[derive(Default)]
struct Tables {
    candidates: HashMap<CandidateId, CandidateProfile>,
    jobs: Vec<JobPosting>,
    applications: Vec<Application>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<Message>,
    activity: Vec<ActivityEntry>,
}

/// Process-local store used by the API binary and tests.
#[derive(Default)]
pub struct InMemoryMarketplace {
    tables: Mutex<Tables>,
}

impl InMemoryMarketplace {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("marketplace store poisoned".to_string()))
    }
}

impl CandidateRepository for InMemoryMarketplace {
    fn fetch(&self, id: &CandidateId) -> Result<Option<CandidateProfile>, RepositoryError> {
        Ok(self.tables()?.candidates.get(id).cloned())
    }

    fn upsert(&self, profile: CandidateProfile) -> Result<(), RepositoryError> {
        self.tables()?.candidates.insert(profile.id.clone(), profile);
        Ok(())
    }

    fn mark_paid(&self, id: &CandidateId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let profile = tables
            .candidates
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        profile.has_paid = true;
        Ok(())
    }
}

impl JobRepository for InMemoryMarketplace {
    fn fetch(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(self.tables()?.jobs.iter().find(|job| &job.id == id).cloned())
    }

    fn upsert(&self, job: JobPosting) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => tables.jobs.push(job),
        }
        Ok(())
    }

    fn active(&self) -> Result<Vec<JobPosting>, RepositoryError> {
        Ok(self
            .tables()?
            .jobs
            .iter()
            .filter(|job| job.is_active())
            .cloned()
            .collect())
    }
}

impl ApplicationRepository for InMemoryMarketplace {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables.applications.iter().any(|existing| {
            existing.id == application.id
                || (existing.candidate_id == application.candidate_id
                    && existing.job_id == application.job_id)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.applications.push(application.clone());
        Ok(application)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let existing = tables
            .applications
            .iter_mut()
            .find(|existing| existing.id == application.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = application;
        Ok(())
    }

    fn remove(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.tables()?
            .applications
            .retain(|application| &application.id != id);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .tables()?
            .applications
            .iter()
            .find(|application| &application.id == id)
            .cloned())
    }

    fn find_by_pair(
        &self,
        candidate: &CandidateId,
        job: &JobId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .tables()?
            .applications
            .iter()
            .find(|application| &application.candidate_id == candidate && &application.job_id == job)
            .cloned())
    }

    fn count_created_between(
        &self,
        candidate: &CandidateId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Ok(self
            .tables()?
            .applications
            .iter()
            .filter(|application| {
                &application.candidate_id == candidate
                    && application.created_at >= start
                    && application.created_at < end
            })
            .count())
    }

    fn for_candidate(&self, candidate: &CandidateId) -> Result<Vec<Application>, RepositoryError> {
        let mut applications: Vec<Application> = self
            .tables()?
            .applications
            .iter()
            .filter(|application| &application.candidate_id == candidate)
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    fn for_employer(&self, employer: &EmployerId) -> Result<Vec<Application>, RepositoryError> {
        let mut applications: Vec<Application> = self
            .tables()?
            .applications
            .iter()
            .filter(|application| &application.employer_id == employer)
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }
}

impl ConversationRepository for InMemoryMarketplace {
    fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.conversations.contains_key(&conversation.id) {
            return Err(RepositoryError::Conflict);
        }
        tables
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.conversations.remove(id);
        tables.messages.retain(|message| &message.conversation_id != id);
        Ok(())
    }

    fn fetch(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.tables()?.conversations.get(id).cloned())
    }

    fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.conversations.contains_key(&message.conversation_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.messages.push(message.clone());
        Ok(message)
    }

    fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self
            .tables()?
            .messages
            .iter()
            .filter(|message| &message.conversation_id == id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

impl ActivityRepository for InMemoryMarketplace {
    fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError> {
        self.tables()?.activity.push(entry);
        Ok(())
    }

    fn for_actor(
        &self,
        actor_id: &str,
        page: PageRequest,
    ) -> Result<Page<ActivityEntry>, RepositoryError> {
        let tables = self.tables()?;
        // Entries are appended in order, so reversing keeps ties newest first.
        let mut entries: Vec<ActivityEntry> = tables
            .activity
            .iter()
            .rev()
            .filter(|entry| entry.actor_id == actor_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(entries))
    }
}
