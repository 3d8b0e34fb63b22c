use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Job seeker whose agent submits applications.
    CandidateId
);
identifier!(EmployerId);
identifier!(JobId);
identifier!(
    /// Identifier wrapper for created applications.
    ApplicationId
);
identifier!(ConversationId);
identifier!(MessageId);
identifier!(
    /// Issued API credential.
    CredentialId
);
identifier!(ActivityId);

/// Where a candidate is willing to work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPreference {
    Remote,
    Onsite,
    Hybrid,
    Any,
}

/// Working arrangement advertised by a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkArrangement {
    Remote,
    Onsite,
    Hybrid,
}

impl LocationPreference {
    pub fn matches(self, arrangement: WorkArrangement) -> bool {
        matches!(
            (self, arrangement),
            (LocationPreference::Remote, WorkArrangement::Remote)
                | (LocationPreference::Onsite, WorkArrangement::Onsite)
                | (LocationPreference::Hybrid, WorkArrangement::Hybrid)
        )
    }
}

/// Candidate profile as authored by the job seeker or their agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: CandidateId,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub min_salary: Option<u32>,
    #[serde(default)]
    pub max_salary: Option<u32>,
    #[serde(default)]
    pub experience_years: u32,
    pub remote_preference: LocationPreference,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    /// One-time fee flag; unlocks every later admission attempt.
    #[serde(default)]
    pub has_paid: bool,
    #[serde(default)]
    pub agent_active: bool,
}

/// Lifecycle of a posting. Only `Active` postings are scored or admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Paused,
    Closed,
    Filled,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Closed => "closed",
            JobStatus::Filled => "filled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub employer_id: EmployerId,
    pub title: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub nice_to_have_skills: Vec<String>,
    /// Per-skill weights; skills absent from the map weigh 1.
    #[serde(default)]
    pub skill_weights: Option<BTreeMap<String, f64>>,
    /// Minimum aggregate score (0-100) an application must reach.
    #[serde(default)]
    pub min_match_score: Option<f64>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub experience_min: u32,
    #[serde(default)]
    pub experience_max: Option<u32>,
    pub remote_type: WorkArrangement,
    #[serde(default)]
    pub location: Option<String>,
    pub status: JobStatus,
}

impl JobPosting {
    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Active
    }
}

/// Status tracked for an application after admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Shortlisted,
    InterviewScheduled,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "reviewing" => Some(Self::Reviewing),
            "shortlisted" => Some(Self::Shortlisted),
            "interview_scheduled" => Some(Self::InterviewScheduled),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    const fn rank(self) -> u8 {
        match self {
            ApplicationStatus::Pending => 0,
            ApplicationStatus::Reviewing => 1,
            ApplicationStatus::Shortlisted => 2,
            ApplicationStatus::InterviewScheduled => 3,
            ApplicationStatus::Accepted => 4,
            ApplicationStatus::Rejected => 5,
        }
    }

    /// Forward moves along the hiring funnel, or rejection from any open state.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match next {
            ApplicationStatus::Rejected => true,
            ApplicationStatus::Pending => false,
            _ => next.rank() > self.rank(),
        }
    }
}

/// An admitted application. The score is frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub employer_id: EmployerId,
    pub conversation_id: ConversationId,
    pub match_score: f64,
    pub status: ApplicationStatus,
    pub cover_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub employer_id: EmployerId,
    pub created_at: DateTime<Utc>,
}

/// An authenticated side of an application: the candidate's agent or the employer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Participant {
    Candidate(CandidateId),
    Employer(EmployerId),
}

impl Participant {
    pub fn id(&self) -> &str {
        match self {
            Participant::Candidate(id) => id.as_str(),
            Participant::Employer(id) => id.as_str(),
        }
    }

    pub fn sender(&self) -> MessageSender {
        match self {
            Participant::Candidate(_) => MessageSender::Agent,
            Participant::Employer(_) => MessageSender::Employer,
        }
    }
}

impl Conversation {
    pub fn admits(&self, participant: &Participant) -> bool {
        match participant {
            Participant::Candidate(id) => &self.candidate_id == id,
            Participant::Employer(id) => &self.employer_id == id,
        }
    }

    /// The other side of the conversation from `participant`.
    pub fn counterpart(&self, participant: &Participant) -> String {
        match participant {
            Participant::Candidate(_) => self.employer_id.0.clone(),
            Participant::Employer(_) => self.candidate_id.0.clone(),
        }
    }
}

/// Who wrote a message inside an application conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Agent,
    Employer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: MessageSender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_or_rejects() {
        use ApplicationStatus::*;
        assert!(Pending.can_transition_to(Reviewing));
        assert!(Pending.can_transition_to(InterviewScheduled));
        assert!(Shortlisted.can_transition_to(Rejected));
        assert!(!Shortlisted.can_transition_to(Reviewing));
        assert!(!Reviewing.can_transition_to(Pending));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Reviewing));
    }

    #[test]
    fn status_labels_parse_back() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Reviewing,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::InterviewScheduled,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::parse(status.label()), Some(status));
        }
        assert_eq!(ApplicationStatus::parse("hired"), None);
    }

    #[test]
    fn preference_matches_same_arrangement_only() {
        assert!(LocationPreference::Hybrid.matches(WorkArrangement::Hybrid));
        assert!(!LocationPreference::Remote.matches(WorkArrangement::Onsite));
        assert!(!LocationPreference::Any.matches(WorkArrangement::Remote));
    }
}
