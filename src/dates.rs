// Period arithmetic shared by the date-sensitive rules.
use crate::model::{Fact, Period};
use chrono::{Days, NaiveDateTime, NaiveTime};

/// End of the fact's period: a duration's end, an instant's moment, or the
/// maximum representable datetime for forever periods so they never satisfy
/// "on or before" comparisons against real dates.
pub fn period_end(fact: &Fact) -> NaiveDateTime {
    match fact.period {
        Period::Duration { end, .. } => end,
        Period::Instant(at) => at,
        Period::Forever => NaiveDateTime::MAX,
    }
}

/// Period length in whole days: zero for instants, `i64::MAX` for forever
/// periods so they are never mistaken for a fiscal period.
pub fn period_duration_days(fact: &Fact) -> i64 {
    match fact.period {
        Period::Duration { start, end } => (end - start).num_days(),
        Period::Instant(_) => 0,
        Period::Forever => i64::MAX,
    }
}

/// Render a period boundary. Values carrying a time-of-day render as a full
/// timestamp. Otherwise, an `is_end` value marks midnight of the day after
/// the period per XBRL 2.1, so one day is subtracted before rendering the
/// date alone.
pub fn format_date(value: NaiveDateTime, is_end: bool) -> String {
    if value.time() != NaiveTime::MIN {
        return value.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    let value = if is_end {
        value.checked_sub_days(Days::new(1)).unwrap_or(value)
    } else {
        value
    };
    value.format("%Y-%m-%d").to_string()
}
