use chrono::{DateTime, Duration, Months, Utc};

/// Adds one calendar month, clamping to the last day of the target month
/// when it is shorter (31 Jan -> 28/29 Feb, never 3 Mar).
pub fn next_period_end(base: DateTime<Utc>) -> DateTime<Utc> {
    base + Months::new(1)
}

pub fn extend_by_days(t: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    t + Duration::days(days)
}

/// Base date for extending a subscription: the current period end while it
/// is still in the future, otherwise now. Keeps renewals from stacking for
/// users who are current and resets fairly for users who lapsed.
pub fn renewal_base(current_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match current_end {
        Some(end) if end > now => end,
        _ => now,
    }
}

/// Whole days remaining until `period_end`, rounded up, floored at zero.
pub fn remaining_days(period_end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (period_end - now).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 86_399) / 86_400
    }
}
