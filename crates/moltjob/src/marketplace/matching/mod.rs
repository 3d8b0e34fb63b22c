//! Deterministic candidate-to-posting scoring.
//!
//! Four sub-scores (skills, salary, experience, location) each land in
//! `[0, 100]` and are blended by [`ScoreWeights`] into an aggregate rounded to
//! two decimals. Scoring is total: missing optional data falls back to a
//! neutral value instead of failing.

mod config;
mod rules;
mod skills;

pub use config::ScoreWeights;
pub use skills::{SkillAnalysis, SkillPartition, WeightedSkill};

use serde::{Deserialize, Serialize};

use super::domain::{CandidateProfile, JobPosting};

/// Per-factor sub-scores plus the weighted aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skills: f64,
    pub salary: f64,
    pub experience: f64,
    pub location: f64,
    pub total: f64,
}

/// Breakdown with the skill partitions and threshold verdict used for
/// rejection diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedBreakdown {
    pub breakdown: ScoreBreakdown,
    pub skills: SkillAnalysis,
    pub threshold: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch<'a> {
    pub job: &'a JobPosting,
    pub breakdown: ScoreBreakdown,
}

/// Stateless scorer applying the configured weights.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn score(&self, candidate: &CandidateProfile, job: &JobPosting) -> ScoreBreakdown {
        let analysis = skills::analyze(candidate, job);
        self.combine(candidate, job, &analysis)
    }

    pub fn score_detailed(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
    ) -> DetailedBreakdown {
        let analysis = skills::analyze(candidate, job);
        let breakdown = self.combine(candidate, job, &analysis);
        let threshold = job.min_match_score;
        let passed = threshold.map_or(true, |minimum| breakdown.total >= minimum);

        DetailedBreakdown {
            breakdown,
            skills: analysis,
            threshold,
            passed,
        }
    }

    /// Score every active posting and order them best first. Ties keep input order.
    pub fn rank<'a>(
        &self,
        candidate: &CandidateProfile,
        jobs: &'a [JobPosting],
    ) -> Vec<RankedMatch<'a>> {
        let mut ranked: Vec<RankedMatch<'a>> = jobs
            .iter()
            .filter(|job| job.is_active())
            .map(|job| RankedMatch {
                job,
                breakdown: self.score(candidate, job),
            })
            .collect();
        ranked.sort_by(|a, b| b.breakdown.total.total_cmp(&a.breakdown.total));
        ranked
    }

    fn combine(
        &self,
        candidate: &CandidateProfile,
        job: &JobPosting,
        analysis: &SkillAnalysis,
    ) -> ScoreBreakdown {
        let skills = skills::score(analysis);
        let salary = rules::salary(candidate, job);
        let experience = rules::experience(candidate, job);
        let location = rules::location(candidate, job);

        let weighted = skills * self.weights.skills
            + salary * self.weights.salary
            + experience * self.weights.experience
            + location * self.weights.location;

        ScoreBreakdown {
            skills,
            salary,
            experience,
            location,
            total: round_score(weighted.clamp(0.0, 100.0)),
        }
    }
}

fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
