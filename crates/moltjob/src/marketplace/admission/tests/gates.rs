use chrono::Duration;

use super::common::*;
use crate::marketplace::admission::{
    AdmissionContext, AdmissionPipeline, AdmissionRequest, GateKind, GateStop, Outcome,
    RejectionCode, RejectionDetails,
};
use crate::marketplace::domain::{
    Application, ApplicationId, ApplicationStatus, CandidateId, ConversationId, EmployerId, JobId,
    JobStatus,
};
use crate::marketplace::matching::ScoreCalculator;
use crate::marketplace::repository::MarketplaceStores;

fn request(job_id: &str) -> AdmissionRequest {
    AdmissionRequest {
        candidate_id: CandidateId::from(CANDIDATE),
        job_id: JobId::from(job_id),
        cover_message: "I would love to help ship this.".to_string(),
        credential_id: None,
    }
}

fn run(stores: &MarketplaceStores, request: &AdmissionRequest) -> Result<(), GateStop> {
    let calculator = ScoreCalculator::default();
    let policy = policy();
    let mut ctx = AdmissionContext::new(request, morning(), stores, &calculator, &policy);
    AdmissionPipeline::standard().run(&mut ctx)
}

fn rejected_code(result: Result<(), GateStop>) -> RejectionCode {
    match result {
        Err(GateStop::Reject(rejection)) => rejection.code,
        other => panic!("expected rejection, got {other:?}"),
    }
}

fn existing_application(job_id: &str, created_minutes_ago: i64) -> Application {
    let at = morning() - Duration::minutes(created_minutes_ago);
    Application {
        id: ApplicationId::generate(),
        candidate_id: CandidateId::from(CANDIDATE),
        job_id: JobId::from(job_id),
        employer_id: EmployerId::from(EMPLOYER),
        conversation_id: ConversationId::generate(),
        match_score: 100.0,
        status: ApplicationStatus::Pending,
        cover_message: "earlier".to_string(),
        created_at: at,
        updated_at: at,
    }
}

#[test]
fn standard_pipeline_runs_gates_in_documented_order() {
    assert_eq!(
        AdmissionPipeline::standard().gate_order(),
        vec![
            GateKind::Profile,
            GateKind::JobActive,
            GateKind::Duplicate,
            GateKind::Payment,
            GateKind::ScoreThreshold,
            GateKind::DailyQuota,
        ]
    );
}

#[test]
fn all_gates_pass_for_a_qualified_candidate() {
    let h = harness();
    h.seed(candidate(), vec![job("job-1")]);
    assert!(run(&h.stores, &request("job-1")).is_ok());
}

#[test]
fn missing_profile_is_a_validation_error() {
    let h = harness();
    h.seed(candidate(), vec![job("job-1")]);
    let mut stranger = request("job-1");
    stranger.candidate_id = CandidateId::from("nobody");

    assert_eq!(
        rejected_code(run(&h.stores, &stranger)),
        RejectionCode::ValidationError
    );
}

#[test]
fn blank_cover_message_is_a_validation_error() {
    let h = harness();
    h.seed(candidate(), vec![job("job-1")]);
    let mut blank = request("job-1");
    blank.cover_message = "   ".to_string();

    assert_eq!(rejected_code(run(&h.stores, &blank)), RejectionCode::ValidationError);
}

#[test]
fn unknown_and_inactive_postings_are_refused() {
    let h = harness();
    let mut paused = job("job-paused");
    paused.status = JobStatus::Paused;
    h.seed(candidate(), vec![paused]);

    assert_eq!(rejected_code(run(&h.stores, &request("job-missing"))), RejectionCode::NotFound);
    assert_eq!(
        rejected_code(run(&h.stores, &request("job-paused"))),
        RejectionCode::JobNotActive
    );
}

#[test]
fn duplicate_is_reported_before_payment() {
    let h = harness();
    let mut unpaid = candidate();
    unpaid.has_paid = false;
    h.seed(unpaid, vec![job("job-1")]);
    h.stores
        .applications
        .insert(existing_application("job-1", 60))
        .expect("seed application");

    assert_eq!(
        rejected_code(run(&h.stores, &request("job-1"))),
        RejectionCode::DuplicateApplication
    );
}

#[test]
fn unpaid_candidates_are_asked_to_pay() {
    let h = harness();
    let mut unpaid = candidate();
    unpaid.has_paid = false;
    h.seed(unpaid, vec![job("job-1")]);

    assert_eq!(
        rejected_code(run(&h.stores, &request("job-1"))),
        RejectionCode::PaymentRequired
    );
}

#[test]
fn score_below_threshold_carries_full_diagnostics() {
    let h = harness();
    h.seed(flexible_candidate(), vec![demanding_job("job-strict")]);

    let Err(GateStop::Reject(rejection)) = run(&h.stores, &request("job-strict")) else {
        panic!("expected a score rejection");
    };
    assert_eq!(rejection.code, RejectionCode::MatchScoreTooLow);
    let Some(RejectionDetails::Score(details)) = rejection.details else {
        panic!("expected score diagnostics");
    };
    assert_eq!(details.score, 82.5);
    assert_eq!(details.threshold, 85.0);
    assert_eq!(details.breakdown.location, 80.0);
    let missing: Vec<&str> = details
        .skill_analysis
        .required_skills
        .missing
        .iter()
        .map(|skill| skill.skill.as_str())
        .collect();
    assert_eq!(missing, vec!["Go"]);
}

#[test]
fn score_gate_runs_before_quota_gate() {
    let h = harness();
    h.seed(flexible_candidate(), vec![demanding_job("job-strict")]);
    for (index, job_id) in ["a", "b", "c"].into_iter().enumerate() {
        h.stores
            .applications
            .insert(existing_application(job_id, 10 * (index as i64 + 1)))
            .expect("seed application");
    }

    assert_eq!(
        rejected_code(run(&h.stores, &request("job-strict"))),
        RejectionCode::MatchScoreTooLow
    );
}

#[test]
fn fourth_admission_of_the_day_hits_the_cap() {
    let h = harness();
    h.seed(candidate(), vec![job("job-4")]);
    for job_id in ["a", "b", "c"] {
        h.stores
            .applications
            .insert(existing_application(job_id, 30))
            .expect("seed application");
    }

    let Err(GateStop::Reject(rejection)) = run(&h.stores, &request("job-4")) else {
        panic!("expected the quota to refuse");
    };
    assert_eq!(rejection.code, RejectionCode::DailyLimitReached);
    assert!(matches!(
        rejection.details,
        Some(RejectionDetails::Quota(ref quota)) if quota.cap == 3 && quota.used == 3
    ));
}

#[test]
fn yesterdays_applications_do_not_count() {
    let h = harness();
    h.seed(candidate(), vec![job("job-4")]);
    for job_id in ["a", "b", "c"] {
        // 9:00 minus 10h lands on the previous UTC day.
        h.stores
            .applications
            .insert(existing_application(job_id, 600))
            .expect("seed application");
    }

    assert!(run(&h.stores, &request("job-4")).is_ok());
}

#[test]
fn custom_pipelines_can_drop_gates() {
    let h = harness();
    let mut unpaid = candidate();
    unpaid.has_paid = false;
    h.seed(unpaid, vec![job("job-1")]);
    let service = h.service.with_pipeline(AdmissionPipeline::new(vec![
        Box::new(crate::marketplace::admission::ProfileGate),
        Box::new(crate::marketplace::admission::JobActiveGate),
    ]));

    let outcome = service.admit(request("job-1")).expect("admit runs");
    assert!(matches!(outcome, Outcome::Accepted(_)));
}
