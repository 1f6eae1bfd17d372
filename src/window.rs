use chrono::{Datelike, Days, NaiveDate, TimeZone, Utc};

/// Inclusive date span covered by one harvesting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    /// The Monday..Sunday span of the week before the week containing
    /// `today`, with weeks anchored on Sunday.
    ///
    /// Run on a Sunday this yields the span ending that same day, matching
    /// the weekly report cadence.
    pub fn previous_week(today: NaiveDate) -> Self {
        let week_start = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
        Self {
            start: week_start - Days::new(6),
            end: week_start,
        }
    }

    /// Previous-week window evaluated against the current date in `tz`.
    pub fn previous_week_in<Tz: TimeZone>(tz: &Tz) -> Self {
        Self::previous_week(Utc::now().with_timezone(tz).date_naive())
    }
}
