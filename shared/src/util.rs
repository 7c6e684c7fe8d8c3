/// Current UTC timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// First millisecond of the current UTC calendar month.
///
/// Used as the implicit billing-period start for holders with no
/// subscription (free tier), where there is no Stripe-style anchor date.
pub fn month_start_millis(now_ms: i64) -> i64 {
    use chrono::{DateTime, Datelike, TimeZone, Utc};
    let now: DateTime<Utc> = Utc
        .timestamp_millis_opt(now_ms)
        .single()
        .unwrap_or_else(Utc::now);
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp_millis())
        .unwrap_or(now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn month_start_truncates_to_first_day() {
        let mid_march = Utc
            .with_ymd_and_hms(2025, 3, 17, 14, 30, 5)
            .unwrap()
            .timestamp_millis();
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(month_start_millis(mid_march), start);
    }

    #[test]
    fn month_start_is_idempotent() {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(month_start_millis(start), start);
    }
}
