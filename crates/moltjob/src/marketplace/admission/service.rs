use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::config::AdmissionPolicy;
use super::gates::{duplicate_rejection, AdmissionContext, AdmissionPipeline, AdmissionRequest, GateStop};
use super::rejection::{Outcome, QuotaDetails, Rejection, RejectionCode, RejectionDetails};
use crate::clock::Clock;
use crate::marketplace::activity::{ActivityAction, ActivityEntry, ResourceType};
use crate::marketplace::domain::{
    Application, ApplicationId, ApplicationStatus, CandidateId, CandidateProfile, Conversation,
    ConversationId, CredentialId, EmployerId, JobId, JobPosting, Message, MessageId,
    MessageSender, Participant,
};
use crate::marketplace::matching::{ScoreBreakdown, ScoreCalculator};
use crate::marketplace::notifications::{
    Notification, NotificationPublisher, APPLICATION_RECEIVED, APPLICATION_STATUS_CHANGED,
    MESSAGE_RECEIVED,
};
use crate::marketplace::pagination::{Page, PageRequest};
use crate::marketplace::repository::{MarketplaceStores, RepositoryError};

pub type AdmissionOutcome = Outcome<Application>;

const FALLBACK_COVER_MESSAGE: &str = "Application submitted by AI agent.";

/// Produces cover messages for agent-driven applications. Opaque to the engine.
#[async_trait]
pub trait CoverMessageSource: Send + Sync {
    async fn compose(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> Result<String, CoverMessageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CoverMessageError {
    #[error("cover message source unavailable: {0}")]
    Unavailable(String),
}

/// Deterministic cover letters built from the profile and posting.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCoverMessages;

#[async_trait]
impl CoverMessageSource for TemplateCoverMessages {
    async fn compose(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> Result<String, CoverMessageError> {
        let owned: HashSet<String> = candidate
            .skills
            .iter()
            .map(|skill| skill.to_lowercase())
            .collect();
        let relevant: Vec<&str> = job
            .required_skills
            .iter()
            .chain(&job.nice_to_have_skills)
            .filter(|skill| owned.contains(&skill.to_lowercase()))
            .map(String::as_str)
            .collect();

        let skills = if relevant.is_empty() {
            "a broad, transferable skill set".to_string()
        } else {
            relevant.join(", ")
        };
        Ok(format!(
            "Hello, I am applying for the {} role on behalf of my candidate. \
             They bring {} years of experience and hands-on work with {}.",
            job.title, candidate.experience_years, skills
        ))
    }
}

/// A posting scored for a candidate, detached from the posting list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMatch {
    pub job: JobPosting,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedJob {
    pub job_id: JobId,
    pub rejection: Rejection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoApplyReport {
    pub applications: Vec<Application>,
    pub skipped: Vec<SkippedJob>,
}

/// How application listings are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationOrder {
    #[default]
    Newest,
    BestMatch,
}

/// Narrowing applied to application listings before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub job_id: Option<JobId>,
    pub order: ApplicationOrder,
}

impl ApplicationFilter {
    fn apply(&self, applications: Vec<Application>) -> Vec<Application> {
        let mut kept: Vec<Application> = applications
            .into_iter()
            .filter(|application| self.status.map_or(true, |status| application.status == status))
            .filter(|application| {
                self.job_id
                    .as_ref()
                    .map_or(true, |job_id| &application.job_id == job_id)
            })
            .collect();
        if self.order == ApplicationOrder::BestMatch {
            kept.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        }
        kept
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("admission pipeline finished without loading the {0}")]
    PipelineIncomplete(&'static str),
}

/// One serialization point per candidate. Entries are dropped once idle.
#[derive(Default)]
struct CandidateLocks {
    slots: Mutex<HashMap<CandidateId, Arc<Mutex<()>>>>,
}

impl CandidateLocks {
    fn slot(&self, candidate: &CandidateId) -> Arc<Mutex<()>> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(candidate.clone()).or_default())
    }

    fn prune(&self, candidate: &CandidateId) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slots
            .get(candidate)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(candidate);
        }
    }
}

/// Service composing the gate pipeline, score calculator, repositories, and
/// notification hook.
pub struct AdmissionService<N> {
    stores: MarketplaceStores,
    notifications: Arc<N>,
    pipeline: AdmissionPipeline,
    calculator: ScoreCalculator,
    policy: AdmissionPolicy,
    clock: Arc<dyn Clock>,
    cover_messages: Arc<dyn CoverMessageSource>,
    locks: CandidateLocks,
}

impl<N> AdmissionService<N>
where
    N: NotificationPublisher + 'static,
{
    pub fn new(
        stores: MarketplaceStores,
        notifications: Arc<N>,
        policy: AdmissionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stores,
            notifications,
            pipeline: AdmissionPipeline::standard(),
            calculator: ScoreCalculator::default(),
            policy,
            clock,
            cover_messages: Arc::new(TemplateCoverMessages),
            locks: CandidateLocks::default(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: AdmissionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_calculator(mut self, calculator: ScoreCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_cover_messages(mut self, cover_messages: Arc<dyn CoverMessageSource>) -> Self {
        self.cover_messages = cover_messages;
        self
    }

    pub fn pipeline(&self) -> &AdmissionPipeline {
        &self.pipeline
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Run the gates and, if all pass, create the application, its
    /// conversation, and the opening agent message.
    pub fn admit(
        &self,
        request: AdmissionRequest,
    ) -> Result<AdmissionOutcome, AdmissionServiceError> {
        let slot = self.locks.slot(&request.candidate_id);
        let outcome = {
            let _serialized = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.admit_serialized(&request)
        };
        drop(slot);
        self.locks.prune(&request.candidate_id);
        outcome
    }

    fn admit_serialized(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionOutcome, AdmissionServiceError> {
        let now = self.clock.now();
        let mut ctx =
            AdmissionContext::new(request, now, &self.stores, &self.calculator, &self.policy);

        match self.pipeline.run(&mut ctx) {
            Ok(()) => {}
            Err(GateStop::Reject(rejection)) => {
                info!(
                    code = rejection.code.as_str(),
                    candidate_id = %request.candidate_id,
                    job_id = %request.job_id,
                    "application rejected"
                );
                return Ok(Outcome::Rejected(rejection));
            }
            Err(GateStop::Failed(error)) => return Err(error.into()),
        }

        let (candidate, job, score) = ctx.into_parts();
        let candidate = candidate.ok_or(AdmissionServiceError::PipelineIncomplete("candidate"))?;
        let job = job.ok_or(AdmissionServiceError::PipelineIncomplete("job"))?;
        let score = score.unwrap_or_else(|| self.calculator.score_detailed(&candidate, &job));

        self.commit(request, &job, score.breakdown.total, now)
    }

    fn commit(
        &self,
        request: &AdmissionRequest,
        job: &JobPosting,
        match_score: f64,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, AdmissionServiceError> {
        let application = Application {
            id: ApplicationId::generate(),
            candidate_id: request.candidate_id.clone(),
            job_id: job.id.clone(),
            employer_id: job.employer_id.clone(),
            conversation_id: ConversationId::generate(),
            match_score,
            status: ApplicationStatus::Pending,
            cover_message: request.cover_message.clone(),
            created_at: now,
            updated_at: now,
        };

        let application = match self.stores.applications.insert(application) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Ok(Outcome::Rejected(duplicate_rejection()));
            }
            Err(other) => return Err(other.into()),
        };

        if let Err(failure) = self.open_conversation(&application, now) {
            self.roll_back(&application);
            return Err(failure.into());
        }

        info!(
            application_id = %application.id,
            candidate_id = %application.candidate_id,
            job_id = %application.job_id,
            match_score,
            "application admitted"
        );
        self.notify(Notification::new(
            application.employer_id.0.clone(),
            APPLICATION_RECEIVED,
            json!({
                "application_id": application.id,
                "job_id": application.job_id,
                "job_title": job.title,
                "candidate_id": application.candidate_id,
                "match_score": application.match_score,
            }),
        ));
        self.record_activity(
            ActivityEntry::new(
                application.candidate_id.as_str(),
                request.credential_id.clone(),
                ActivityAction::Apply,
                ResourceType::Application,
                application.id.as_str(),
                now,
            )
            .with_metadata(json!({
                "job_id": application.job_id,
                "job_title": job.title,
                "match_score": application.match_score,
            })),
        );

        Ok(Outcome::Accepted(application))
    }

    fn open_conversation(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let conversation = self.stores.conversations.create(Conversation {
            id: application.conversation_id.clone(),
            application_id: application.id.clone(),
            candidate_id: application.candidate_id.clone(),
            employer_id: application.employer_id.clone(),
            created_at: now,
        })?;
        self.stores.conversations.append(Message {
            id: MessageId::generate(),
            conversation_id: conversation.id,
            sender: MessageSender::Agent,
            content: application.cover_message.clone(),
            created_at: now,
        })?;
        Ok(())
    }

    /// Remove a half-committed admission so it neither holds quota nor
    /// blocks a retry as a duplicate.
    fn roll_back(&self, application: &Application) {
        if let Err(failure) = self
            .stores
            .conversations
            .remove(&application.conversation_id)
        {
            error!(
                conversation_id = %application.conversation_id,
                error = %failure,
                "conversation rollback failed"
            );
        }
        match self.stores.applications.remove(&application.id) {
            Ok(()) => warn!(
                application_id = %application.id,
                candidate_id = %application.candidate_id,
                job_id = %application.job_id,
                "admission rolled back after conversation write failed"
            ),
            Err(failure) => error!(
                application_id = %application.id,
                error = %failure,
                "application rollback failed; pair stays blocked"
            ),
        }
    }

    /// Visible to the applying candidate and the posting's employer.
    pub fn get_application(
        &self,
        viewer: &Participant,
        id: &ApplicationId,
    ) -> Result<Outcome<Application>, AdmissionServiceError> {
        let visible = self
            .stores
            .applications
            .fetch(id)?
            .filter(|application| match viewer {
                Participant::Candidate(candidate) => &application.candidate_id == candidate,
                Participant::Employer(employer) => &application.employer_id == employer,
            });
        Ok(match visible {
            Some(application) => Outcome::Accepted(application),
            None => Outcome::Rejected(Rejection::not_found("Application not found")),
        })
    }

    /// The candidate's own applications, newest first unless the filter
    /// asks for best match.
    pub fn list_applications(
        &self,
        candidate_id: &CandidateId,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Outcome<Page<Application>>, AdmissionServiceError> {
        if self.stores.candidates.fetch(candidate_id)?.is_none() {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Create your profile first",
            )));
        }
        let applications = self.stores.applications.for_candidate(candidate_id)?;
        Ok(Outcome::Accepted(page.slice(filter.apply(applications))))
    }

    /// Applications received on the employer's postings.
    pub fn employer_applications(
        &self,
        employer_id: &EmployerId,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Outcome<Page<Application>>, AdmissionServiceError> {
        let applications = self.stores.applications.for_employer(employer_id)?;
        Ok(Outcome::Accepted(page.slice(filter.apply(applications))))
    }

    pub fn activity(
        &self,
        actor: &Participant,
        page: PageRequest,
    ) -> Result<Outcome<Page<ActivityEntry>>, AdmissionServiceError> {
        Ok(Outcome::Accepted(
            self.stores.activity.for_actor(actor.id(), page)?,
        ))
    }

    /// Employer-driven status change. Same-state updates are no-ops.
    pub fn update_status(
        &self,
        employer: &EmployerId,
        id: &ApplicationId,
        requested: &str,
        via: Option<&CredentialId>,
    ) -> Result<Outcome<Application>, AdmissionServiceError> {
        let Some(next) = ApplicationStatus::parse(requested) else {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Invalid status. Must be one of: pending, reviewing, shortlisted, \
                 interview_scheduled, rejected, accepted",
            )));
        };

        let Some(mut application) = self
            .stores
            .applications
            .fetch(id)?
            .filter(|application| &application.employer_id == employer)
        else {
            return Ok(Outcome::Rejected(Rejection::not_found("Application not found")));
        };

        let previous = application.status;
        if previous == next {
            return Ok(Outcome::Accepted(application));
        }
        if !previous.can_transition_to(next) {
            return Ok(Outcome::Rejected(Rejection::validation(format!(
                "Cannot move application from {} to {}",
                previous.label(),
                next.label()
            ))));
        }

        application.status = next;
        application.updated_at = self.clock.now();
        self.stores.applications.update(application.clone())?;

        info!(
            application_id = %application.id,
            from = previous.label(),
            to = next.label(),
            "application status updated"
        );
        self.notify(Notification::new(
            application.candidate_id.0.clone(),
            APPLICATION_STATUS_CHANGED,
            json!({
                "application_id": application.id,
                "job_id": application.job_id,
                "previous_status": previous.label(),
                "status": next.label(),
            }),
        ));
        self.record_activity(
            ActivityEntry::new(
                employer.as_str(),
                via.cloned(),
                ActivityAction::UpdateApplicationStatus,
                ResourceType::Application,
                application.id.as_str(),
                application.updated_at,
            )
            .with_metadata(json!({
                "from": previous.label(),
                "to": next.label(),
            })),
        );
        Ok(Outcome::Accepted(application))
    }

    pub fn post_message(
        &self,
        author: &Participant,
        conversation_id: &ConversationId,
        content: &str,
        via: Option<&CredentialId>,
    ) -> Result<Outcome<Message>, AdmissionServiceError> {
        let conversation = match self.accessible_conversation(author, conversation_id)? {
            Ok(conversation) => conversation,
            Err(rejection) => return Ok(Outcome::Rejected(rejection)),
        };
        if content.trim().is_empty() {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Message content is required",
            )));
        }

        let message = self.stores.conversations.append(Message {
            id: MessageId::generate(),
            conversation_id: conversation.id.clone(),
            sender: author.sender(),
            content: content.to_string(),
            created_at: self.clock.now(),
        })?;

        self.notify(Notification::new(
            conversation.counterpart(author),
            MESSAGE_RECEIVED,
            json!({
                "conversation_id": conversation.id,
                "application_id": conversation.application_id,
                "message_id": message.id,
                "sender": message.sender,
            }),
        ));
        self.record_activity(
            ActivityEntry::new(
                author.id(),
                via.cloned(),
                ActivityAction::SendMessage,
                ResourceType::Conversation,
                conversation.id.as_str(),
                message.created_at,
            )
            .with_metadata(json!({
                "application_id": conversation.application_id,
                "message_id": message.id,
            })),
        );
        Ok(Outcome::Accepted(message))
    }

    pub fn messages(
        &self,
        reader: &Participant,
        conversation_id: &ConversationId,
    ) -> Result<Outcome<Vec<Message>>, AdmissionServiceError> {
        match self.accessible_conversation(reader, conversation_id)? {
            Ok(conversation) => Ok(Outcome::Accepted(
                self.stores.conversations.messages(&conversation.id)?,
            )),
            Err(rejection) => Ok(Outcome::Rejected(rejection)),
        }
    }

    fn accessible_conversation(
        &self,
        participant: &Participant,
        id: &ConversationId,
    ) -> Result<Result<Conversation, Rejection>, AdmissionServiceError> {
        Ok(self
            .stores
            .conversations
            .fetch(id)?
            .filter(|conversation| conversation.admits(participant))
            .ok_or_else(|| Rejection::not_found("Conversation not found")))
    }

    /// Active postings ranked best first for the candidate.
    pub fn matches(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Outcome<Vec<JobMatch>>, AdmissionServiceError> {
        let Some(candidate) = self.stores.candidates.fetch(candidate_id)? else {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Create your profile first",
            )));
        };
        let jobs = self.stores.jobs.active()?;
        let ranked = self
            .calculator
            .rank(&candidate, &jobs)
            .into_iter()
            .map(|ranked| JobMatch {
                job: ranked.job.clone(),
                score: ranked.breakdown.total,
                breakdown: ranked.breakdown,
            })
            .collect();
        Ok(Outcome::Accepted(ranked))
    }

    /// Apply to the best-ranked postings the candidate has not applied to yet,
    /// up to what remains of today's quota. Every application still goes
    /// through the full gate pipeline.
    pub async fn auto_apply(
        &self,
        candidate_id: &CandidateId,
        via: Option<&CredentialId>,
    ) -> Result<Outcome<AutoApplyReport>, AdmissionServiceError> {
        let Some(candidate) = self.stores.candidates.fetch(candidate_id)? else {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Complete your profile first",
            )));
        };
        if !candidate.agent_active {
            return Ok(Outcome::Rejected(Rejection::validation(
                "Agent is not active. Activate your agent first.",
            )));
        }
        if !candidate.has_paid {
            return Ok(Outcome::Rejected(Rejection::new(
                RejectionCode::PaymentRequired,
                "Payment required to use agent",
            )));
        }

        let cap = self.policy.daily_application_cap;
        let (start, end) = self.policy.day_bounds(self.clock.now());
        let used = self
            .stores
            .applications
            .count_created_between(candidate_id, start, end)?;
        if used >= cap {
            return Ok(Outcome::Rejected(
                Rejection::new(
                    RejectionCode::DailyLimitReached,
                    format!("Daily limit reached ({cap} applications per day)"),
                )
                .with_details(RejectionDetails::Quota(QuotaDetails { cap, used })),
            ));
        }

        let applied: HashSet<JobId> = self
            .stores
            .applications
            .for_candidate(candidate_id)?
            .into_iter()
            .map(|application| application.job_id)
            .collect();
        let open: Vec<JobPosting> = self
            .stores
            .jobs
            .active()?
            .into_iter()
            .filter(|job| !applied.contains(&job.id))
            .collect();
        let targets: Vec<JobPosting> = self
            .calculator
            .rank(&candidate, &open)
            .into_iter()
            .take(cap - used)
            .map(|ranked| ranked.job.clone())
            .collect();

        let mut report = AutoApplyReport::default();
        for job in targets {
            let cover_message = match self.cover_messages.compose(&candidate, &job).await {
                Ok(message) if !message.trim().is_empty() => message,
                Ok(_) => FALLBACK_COVER_MESSAGE.to_string(),
                Err(error) => {
                    warn!(job_id = %job.id, %error, "cover message unavailable; using fallback");
                    FALLBACK_COVER_MESSAGE.to_string()
                }
            };

            let request = AdmissionRequest {
                candidate_id: candidate_id.clone(),
                job_id: job.id.clone(),
                cover_message,
                credential_id: via.cloned(),
            };
            match self.admit(request)? {
                Outcome::Accepted(application) => report.applications.push(application),
                Outcome::Rejected(rejection) => report.skipped.push(SkippedJob {
                    job_id: job.id,
                    rejection,
                }),
            }
        }

        info!(
            candidate_id = %candidate_id,
            applied = report.applications.len(),
            skipped = report.skipped.len(),
            "agent auto-apply finished"
        );
        Ok(Outcome::Accepted(report))
    }

    fn notify(&self, notification: Notification) {
        let target_id = notification.target_id.clone();
        let event_type = notification.event_type.clone();
        if let Err(error) = self.notifications.publish(notification) {
            warn!(%target_id, %event_type, %error, "notification dropped");
        }
    }

    /// Audit writes never fail the action they describe.
    fn record_activity(&self, entry: ActivityEntry) {
        let action = entry.action.as_str();
        let resource_id = entry.resource_id.clone();
        if let Err(error) = self.stores.activity.record(entry) {
            warn!(action, %resource_id, %error, "activity entry dropped");
        }
    }
}
