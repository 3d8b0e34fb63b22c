use super::super::domain::{CandidateProfile, JobPosting, LocationPreference, WorkArrangement};

const NEUTRAL_SALARY: f64 = 50.0;
const OVERQUALIFIED_MARGIN_YEARS: u32 = 5;

/// Zero bounds count as unset, as they do on the intake forms.
fn bound(value: Option<u32>) -> Option<u32> {
    value.filter(|amount| *amount > 0)
}

pub(crate) fn salary(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let (Some(ask), Some(offer)) = (bound(candidate.min_salary), bound(job.salary_max)) else {
        return NEUTRAL_SALARY;
    };

    if offer >= ask {
        return 100.0;
    }

    if let (Some(offer_floor), Some(ask_ceiling)) =
        (bound(job.salary_min), bound(candidate.max_salary))
    {
        if offer_floor <= ask_ceiling {
            return 70.0;
        }
    }

    let shortfall = f64::from(ask - offer) / f64::from(ask);
    if shortfall <= 0.1 {
        50.0
    } else if shortfall <= 0.2 {
        30.0
    } else {
        10.0
    }
}

pub(crate) fn experience(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    let years = candidate.experience_years;
    if years >= job.experience_min {
        return match bound(job.experience_max) {
            Some(max) if years > max.saturating_add(OVERQUALIFIED_MARGIN_YEARS) => 60.0,
            _ => 100.0,
        };
    }

    match job.experience_min - years {
        1 => 70.0,
        2 => 40.0,
        _ => 10.0,
    }
}

pub(crate) fn location(candidate: &CandidateProfile, job: &JobPosting) -> f64 {
    if candidate.remote_preference == LocationPreference::Any {
        return 80.0;
    }
    if candidate.remote_preference.matches(job.remote_type) {
        return 100.0;
    }

    // A blank preferred location matches any non-empty job location.
    if let Some(place) = job.location.as_deref().filter(|place| !place.is_empty()) {
        let place = place.to_lowercase();
        let preferred = candidate
            .preferred_locations
            .iter()
            .any(|wanted| place.contains(&wanted.to_lowercase()));
        if preferred {
            return 90.0;
        }
    }

    if job.remote_type == WorkArrangement::Hybrid {
        60.0
    } else {
        30.0
    }
}
