use crate::infra::{demo_candidate, demo_jobs, read_json_file, DEMO_CANDIDATE, DEMO_EMPLOYER};
use chrono::Utc;
use clap::Args;
use moltjob::clock::FixedClock;
use moltjob::error::AppError;
use moltjob::marketplace::admission::{AdmissionOutcome, AdmissionPolicy};
use moltjob::marketplace::domain::{
    Application, CandidateId, CandidateProfile, EmployerId, JobId, JobPosting, Participant,
};
use moltjob::marketplace::notifications::NotifyError;
use moltjob::marketplace::{
    AdmissionRequest, AdmissionService, MarketplaceStores, Notification, NotificationPublisher,
    Outcome, ScoreCalculator,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Candidate profile as JSON
    #[arg(long)]
    pub(crate) candidate: PathBuf,
    /// Job posting as JSON
    #[arg(long)]
    pub(crate) job: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Daily application cap used by the demo (defaults to the standard policy)
    #[arg(long)]
    pub(crate) cap: Option<usize>,
    /// Hide the notification events emitted along the way
    #[arg(long)]
    pub(crate) quiet: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let candidate: CandidateProfile = read_json_file(&args.candidate)?;
    let job: JobPosting = read_json_file(&args.job)?;

    let detailed = ScoreCalculator::default().score_detailed(&candidate, &job);
    println!("{}", serde_json::to_string_pretty(&detailed)?);
    Ok(())
}

/// Prints every event instead of delivering it.
struct ConsoleNotifications {
    quiet: bool,
}

impl NotificationPublisher for ConsoleNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotifyError> {
        if !self.quiet {
            println!(
                "    -> notify {} [{}]",
                notification.target_id, notification.event_type
            );
        }
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { cap, quiet } = args;

    let clock = Arc::new(FixedClock::new(Utc::now()));
    let mut policy = AdmissionPolicy::default();
    if let Some(cap) = cap {
        policy.daily_application_cap = cap;
    }

    let candidate = demo_candidate();
    let mut jobs = demo_jobs();
    jobs.extend(regional_variants(&jobs[0]));

    println!("Match scoring and admission demo");
    println!(
        "\nCandidate {}: {} | {} years | salary {:?}-{:?}",
        candidate.id,
        candidate.skills.join(", "),
        candidate.experience_years,
        candidate.min_salary,
        candidate.max_salary
    );

    render_ranking(&candidate, &jobs);

    let (stores, _) = MarketplaceStores::in_memory();
    stores.candidates.upsert(candidate)?;
    for job in jobs {
        stores.jobs.upsert(job)?;
    }
    let service = AdmissionService::new(
        stores,
        Arc::new(ConsoleNotifications { quiet }),
        policy.clone(),
        clock.clone(),
    );
    let candidate_id = CandidateId::from(DEMO_CANDIDATE);

    println!(
        "\nAdmission (cap {} per day)",
        policy.daily_application_cap
    );
    let mut first: Option<Application> = None;
    for job_id in ["demo-infra", "demo-archived", "demo-platform", "demo-platform"] {
        let outcome = service.admit(request(&candidate_id, job_id))?;
        render_outcome(job_id, &outcome);
        if first.is_none() {
            first = outcome.accepted();
        }
    }

    println!("\nAgent auto-apply");
    match service.auto_apply(&candidate_id, None).await? {
        Outcome::Accepted(report) => {
            for application in &report.applications {
                println!(
                    "  applied to {:<20} score {:>6.2}",
                    application.job_id, application.match_score
                );
            }
            for skipped in &report.skipped {
                println!(
                    "  skipped    {:<20} {}",
                    skipped.job_id,
                    skipped.rejection.code.as_str()
                );
            }
        }
        Outcome::Rejected(rejection) => {
            println!("  refused: {} ({})", rejection.message, rejection.code.as_str());
        }
    }

    let outcome = service.admit(request(&candidate_id, "demo-data"))?;
    render_outcome("demo-data", &outcome);
    if !outcome.is_accepted() {
        clock.advance(chrono::Duration::days(1));
        println!("  ... one day later");
        let outcome = service.admit(request(&candidate_id, "demo-data"))?;
        render_outcome("demo-data", &outcome);
    }

    let Some(application) = first else {
        println!("\nNo application was admitted; skipping employer review.");
        return Ok(());
    };

    println!("\nEmployer review of {}", application.id);
    let employer = EmployerId::from(DEMO_EMPLOYER);
    for requested in ["reviewing", "interview_scheduled", "pending", "accepted", "rejected"] {
        match service.update_status(&employer, &application.id, requested, None)? {
            Outcome::Accepted(updated) => {
                println!("  {:<20} -> now {}", requested, updated.status.label());
            }
            Outcome::Rejected(rejection) => {
                println!("  {:<20} -> refused: {}", requested, rejection.message);
            }
        }
    }

    let employer = Participant::Employer(employer);
    service.post_message(
        &employer,
        &application.conversation_id,
        "Thanks, we would like to meet on Thursday.",
        None,
    )?;
    if let Outcome::Accepted(thread) = service.messages(&employer, &application.conversation_id)? {
        println!("\nConversation {}", application.conversation_id);
        for message in thread {
            println!("  [{:?}] {}", message.sender, message.content);
        }
    }

    Ok(())
}

fn request(candidate: &CandidateId, job_id: &str) -> AdmissionRequest {
    AdmissionRequest {
        candidate_id: candidate.clone(),
        job_id: JobId::from(job_id),
        cover_message: "Submitted by the demo agent.".to_string(),
        credential_id: None,
    }
}

/// Same role posted for other regions, so the demo can run into the daily cap.
fn regional_variants(template: &JobPosting) -> Vec<JobPosting> {
    ["eu", "apac"]
        .into_iter()
        .map(|region| {
            let mut job = template.clone();
            job.id = JobId::from(format!("{}-{region}", template.id).as_str());
            job.title = format!("{} ({})", template.title, region.to_uppercase());
            job
        })
        .collect()
}

fn render_ranking(candidate: &CandidateProfile, jobs: &[JobPosting]) {
    println!("\nRanked matches (active postings only)");
    println!(
        "  {:<20} {:>7} {:>7} {:>7} {:>7} {:>7}  threshold",
        "job", "total", "skills", "salary", "exper.", "locat."
    );
    for ranked in ScoreCalculator::default().rank(candidate, jobs) {
        let score = ranked.breakdown;
        let threshold = ranked
            .job
            .min_match_score
            .map(|minimum| format!("{minimum:.0}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2}  {}",
            ranked.job.id,
            score.total,
            score.skills,
            score.salary,
            score.experience,
            score.location,
            threshold
        );
    }
}

fn render_outcome(job_id: &str, outcome: &AdmissionOutcome) {
    match outcome {
        Outcome::Accepted(application) => println!(
            "  {:<20} admitted  score {:.2} status {}",
            job_id,
            application.match_score,
            application.status.label()
        ),
        Outcome::Rejected(rejection) => println!(
            "  {:<20} {:<22} {}",
            job_id,
            rejection.code.as_str(),
            rejection.message
        ),
    }
}
