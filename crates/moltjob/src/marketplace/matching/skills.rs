use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::super::domain::{CandidateProfile, JobPosting};

const NO_REQUIRED_SKILLS_SCORE: f64 = 70.0;
const REQUIRED_SHARE: f64 = 80.0;
const NICE_TO_HAVE_SHARE: f64 = 20.0;

/// A posting skill together with the weight it carried during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSkill {
    pub skill: String,
    pub weight: f64,
}

/// Skills of one set split by whether the candidate lists them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillPartition {
    pub matched: Vec<WeightedSkill>,
    pub missing: Vec<WeightedSkill>,
}

impl SkillPartition {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.missing.is_empty()
    }

    /// Matched weight over total weight, or `None` for an empty set.
    pub fn ratio(&self) -> Option<f64> {
        let matched: f64 = self.matched.iter().map(|s| s.weight).sum();
        let missing: f64 = self.missing.iter().map(|s| s.weight).sum();
        let total = matched + missing;
        (total > 0.0).then(|| matched / total)
    }
}

/// Required and nice-to-have partitions reported alongside a detailed score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillAnalysis {
    pub required_skills: SkillPartition,
    pub nice_to_have_skills: SkillPartition,
}

pub(crate) fn analyze(candidate: &CandidateProfile, job: &JobPosting) -> SkillAnalysis {
    let owned: HashSet<String> = candidate
        .skills
        .iter()
        .map(|skill| skill.to_lowercase())
        .collect();
    let weights = job.skill_weights.as_ref();

    SkillAnalysis {
        required_skills: partition(&job.required_skills, &owned, weights),
        nice_to_have_skills: partition(&job.nice_to_have_skills, &owned, weights),
    }
}

pub(crate) fn score(analysis: &SkillAnalysis) -> f64 {
    let Some(required) = analysis.required_skills.ratio() else {
        return NO_REQUIRED_SKILLS_SCORE;
    };
    let nice = analysis.nice_to_have_skills.ratio().unwrap_or(1.0);
    required * REQUIRED_SHARE + nice * NICE_TO_HAVE_SHARE
}

fn partition(
    skills: &[String],
    owned: &HashSet<String>,
    weights: Option<&BTreeMap<String, f64>>,
) -> SkillPartition {
    let mut partition = SkillPartition::default();
    let mut seen = HashSet::new();
    for skill in skills {
        if !seen.insert(skill.to_lowercase()) {
            continue;
        }
        let entry = WeightedSkill {
            skill: skill.clone(),
            weight: weight_of(skill, weights),
        };
        if owned.contains(&skill.to_lowercase()) {
            partition.matched.push(entry);
        } else {
            partition.missing.push(entry);
        }
    }
    partition
}

/// Exact key first, then a case-insensitive match. Anything unusable weighs 1.
fn weight_of(skill: &str, weights: Option<&BTreeMap<String, f64>>) -> f64 {
    let Some(weights) = weights else {
        return 1.0;
    };
    let found = weights.get(skill).copied().or_else(|| {
        weights
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(skill))
            .map(|(_, weight)| *weight)
    });
    match found {
        Some(weight) if weight.is_finite() && weight > 0.0 => weight,
        _ => 1.0,
    }
}
