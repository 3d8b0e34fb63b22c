//! The ordered admission gates.
//!
//! Each gate either passes, refuses with a [`Rejection`], or fails on storage.
//! The score gate runs before the quota gate so that refused attempts never
//! count against the daily allowance.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::config::AdmissionPolicy;
use super::rejection::{
    QuotaDetails, Rejection, RejectionCode, RejectionDetails, ScoreDiagnostics,
};
use crate::marketplace::domain::{CandidateId, CandidateProfile, CredentialId, JobId, JobPosting};
use crate::marketplace::matching::{DetailedBreakdown, ScoreCalculator};
use crate::marketplace::repository::{MarketplaceStores, RepositoryError};

/// A submitted application before any gate has looked at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub cover_message: String,
    /// Credential the request arrived with, for the activity log.
    pub credential_id: Option<CredentialId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    Profile,
    JobActive,
    Duplicate,
    Payment,
    ScoreThreshold,
    DailyQuota,
}

/// Why the pipeline stopped early.
#[derive(Debug)]
pub enum GateStop {
    Reject(Rejection),
    Failed(RepositoryError),
}

impl From<Rejection> for GateStop {
    fn from(value: Rejection) -> Self {
        Self::Reject(value)
    }
}

impl From<RepositoryError> for GateStop {
    fn from(value: RepositoryError) -> Self {
        Self::Failed(value)
    }
}

/// State threaded through the gates. Earlier gates load what later gates read.
pub struct AdmissionContext<'a> {
    pub request: &'a AdmissionRequest,
    pub now: DateTime<Utc>,
    stores: &'a MarketplaceStores,
    calculator: &'a ScoreCalculator,
    policy: &'a AdmissionPolicy,
    candidate: Option<CandidateProfile>,
    job: Option<JobPosting>,
    score: Option<DetailedBreakdown>,
}

impl<'a> AdmissionContext<'a> {
    pub fn new(
        request: &'a AdmissionRequest,
        now: DateTime<Utc>,
        stores: &'a MarketplaceStores,
        calculator: &'a ScoreCalculator,
        policy: &'a AdmissionPolicy,
    ) -> Self {
        Self {
            request,
            now,
            stores,
            calculator,
            policy,
            candidate: None,
            job: None,
            score: None,
        }
    }

    pub fn candidate(&self) -> Result<&CandidateProfile, Rejection> {
        self.candidate
            .as_ref()
            .ok_or_else(|| Rejection::validation("Create your profile first"))
    }

    pub fn job(&self) -> Result<&JobPosting, Rejection> {
        self.job
            .as_ref()
            .ok_or_else(|| Rejection::not_found("Job not found"))
    }

    pub fn score(&self) -> Option<&DetailedBreakdown> {
        self.score.as_ref()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<CandidateProfile>,
        Option<JobPosting>,
        Option<DetailedBreakdown>,
    ) {
        (self.candidate, self.job, self.score)
    }
}

pub trait Gate: Send + Sync {
    fn kind(&self) -> GateKind;
    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop>;
}

/// The candidate must have a profile and the cover message must not be blank.
pub struct ProfileGate;

impl Gate for ProfileGate {
    fn kind(&self) -> GateKind {
        GateKind::Profile
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        let profile = ctx
            .stores
            .candidates
            .fetch(&ctx.request.candidate_id)?
            .ok_or_else(|| Rejection::validation("Create your profile first"))?;
        if ctx.request.cover_message.trim().is_empty() {
            return Err(Rejection::validation("job_posting_id and cover_message are required").into());
        }
        ctx.candidate = Some(profile);
        Ok(())
    }
}

pub struct JobActiveGate;

impl Gate for JobActiveGate {
    fn kind(&self) -> GateKind {
        GateKind::JobActive
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        let job = ctx
            .stores
            .jobs
            .fetch(&ctx.request.job_id)?
            .ok_or_else(|| Rejection::not_found("Job not found"))?;
        if !job.is_active() {
            return Err(Rejection::new(
                RejectionCode::JobNotActive,
                "This job is no longer accepting applications",
            )
            .into());
        }
        ctx.job = Some(job);
        Ok(())
    }
}

pub struct DuplicateGate;

impl Gate for DuplicateGate {
    fn kind(&self) -> GateKind {
        GateKind::Duplicate
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        let existing = ctx
            .stores
            .applications
            .find_by_pair(&ctx.request.candidate_id, &ctx.request.job_id)?;
        match existing {
            Some(_) => Err(duplicate_rejection().into()),
            None => Ok(()),
        }
    }
}

pub(crate) fn duplicate_rejection() -> Rejection {
    Rejection::new(
        RejectionCode::DuplicateApplication,
        "Already applied to this job",
    )
}

/// One flat fee unlocks every later attempt; it is never consumed here.
pub struct PaymentGate;

impl Gate for PaymentGate {
    fn kind(&self) -> GateKind {
        GateKind::Payment
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        if ctx.candidate()?.has_paid {
            Ok(())
        } else {
            Err(Rejection::new(
                RejectionCode::PaymentRequired,
                "Payment required. Pay once to unlock job applications.",
            )
            .into())
        }
    }
}

pub struct ScoreThresholdGate;

impl Gate for ScoreThresholdGate {
    fn kind(&self) -> GateKind {
        GateKind::ScoreThreshold
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        let detailed = ctx.calculator.score_detailed(ctx.candidate()?, ctx.job()?);
        debug!(
            candidate_id = %ctx.request.candidate_id,
            job_id = %ctx.request.job_id,
            score = detailed.breakdown.total,
            threshold = ?detailed.threshold,
            "scored application"
        );

        if let (false, Some(threshold)) = (detailed.passed, detailed.threshold) {
            let score = detailed.breakdown.total;
            let rejection = Rejection::new(
                RejectionCode::MatchScoreTooLow,
                format!("Match score {score} is below the required threshold of {threshold}"),
            )
            .with_details(RejectionDetails::Score(ScoreDiagnostics {
                score,
                threshold,
                breakdown: detailed.breakdown,
                skill_analysis: detailed.skills,
            }));
            return Err(rejection.into());
        }

        ctx.score = Some(detailed);
        Ok(())
    }
}

/// Counts admissions already created in the reference calendar day.
pub struct DailyQuotaGate;

impl Gate for DailyQuotaGate {
    fn kind(&self) -> GateKind {
        GateKind::DailyQuota
    }

    fn check(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        let cap = ctx.policy.daily_application_cap;
        let (start, end) = ctx.policy.day_bounds(ctx.now);
        let used = ctx
            .stores
            .applications
            .count_created_between(&ctx.request.candidate_id, start, end)?;

        if used >= cap {
            return Err(Rejection::new(
                RejectionCode::DailyLimitReached,
                format!("Daily limit reached ({cap} applications per day)"),
            )
            .with_details(RejectionDetails::Quota(QuotaDetails { cap, used }))
            .into());
        }
        Ok(())
    }
}

/// Gates run in list order and the first refusal wins.
pub struct AdmissionPipeline {
    gates: Vec<Box<dyn Gate>>,
}

impl AdmissionPipeline {
    pub fn new(gates: Vec<Box<dyn Gate>>) -> Self {
        Self { gates }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ProfileGate),
            Box::new(JobActiveGate),
            Box::new(DuplicateGate),
            Box::new(PaymentGate),
            Box::new(ScoreThresholdGate),
            Box::new(DailyQuotaGate),
        ])
    }

    pub fn gate_order(&self) -> Vec<GateKind> {
        self.gates.iter().map(|gate| gate.kind()).collect()
    }

    pub fn run(&self, ctx: &mut AdmissionContext<'_>) -> Result<(), GateStop> {
        for gate in &self.gates {
            if let Err(stop) = gate.check(ctx) {
                debug!(gate = ?gate.kind(), "admission stopped at gate");
                return Err(stop);
            }
        }
        Ok(())
    }
}

impl Default for AdmissionPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
