use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Business limits applied by the admission pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Successful admissions allowed per candidate per calendar day.
    pub daily_application_cap: usize,
    /// Reference timezone for the calendar day, in minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            daily_application_cap: 3,
            utc_offset_minutes: 0,
        }
    }
}

impl AdmissionPolicy {
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// `[start, end)` of the reference calendar day containing `now`.
    pub fn day_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = self.reference_offset();
        let local_midnight = now
            .with_timezone(&offset)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let start = (local_midnight - Duration::seconds(i64::from(offset.local_minus_utc())))
            .and_utc();
        (start, start + Duration::days(1))
    }
}
