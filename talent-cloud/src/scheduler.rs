//! Billing cycle scheduler
//!
//! Periodic job that rolls elapsed subscriptions into a new billing period
//! and resolves scheduled cancellations. Runs independently of request
//! traffic; safe to run from multiple instances at once because every
//! mutation is a conditional update keyed on the old `current_period_end` —
//! the losing instance matches zero rows and skips the ledger reset.

use chrono::{DateTime, Months, TimeZone, Utc};
use shared::billing::{BillingInterval, HolderType};
use shared::util::now_millis;
use shared::Holder;
use sqlx::PgPool;

use crate::db;

/// Outcome of one scheduler pass, for logging and the admin trigger endpoint.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct CycleReport {
    pub examined: u64,
    pub advanced: u64,
    pub canceled: u64,
    pub skipped: u64,
}

/// Spawn the periodic billing cycle task.
pub fn spawn(pool: PgPool, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match run_once(&pool, now_millis()).await {
                Ok(report) => {
                    if report.examined > 0 {
                        tracing::info!(
                            examined = report.examined,
                            advanced = report.advanced,
                            canceled = report.canceled,
                            skipped = report.skipped,
                            "Billing cycle pass complete"
                        );
                    }
                }
                Err(e) => tracing::error!(error = %e, "Billing cycle pass failed"),
            }
        }
    })
}

/// What one pass does with a single elapsed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleAction {
    /// Scheduled cancellation date reached: terminal transition, no new period
    Cancel,
    /// Roll into the next period ending at `new_period_end`
    Advance { new_period_end: i64 },
    /// Unresolvable row (unknown interval string); left untouched
    Skip,
}

fn cycle_action(
    interval: Option<BillingInterval>,
    period_end: i64,
    scheduled_cancellation_date: Option<i64>,
    now: i64,
) -> CycleAction {
    if scheduled_cancellation_date.is_some_and(|date| date <= now) {
        return CycleAction::Cancel;
    }
    match interval {
        Some(interval) => CycleAction::Advance {
            new_period_end: advance_period(period_end, interval),
        },
        None => CycleAction::Skip,
    }
}

/// One scheduler pass over every elapsed active subscription. Also the
/// backing implementation of the admin "run cycle now" endpoint.
///
/// Every mutation is keyed on the subscription's old `current_period_end`;
/// a row another instance already handled loses that condition and is
/// counted as skipped, so a second concurrent pass is a no-op.
pub async fn run_once(pool: &PgPool, now: i64) -> Result<CycleReport, sqlx::Error> {
    let due = db::subscriptions::list_due(pool, now).await?;
    let mut report = CycleReport {
        examined: due.len() as u64,
        ..Default::default()
    };

    for sub in due {
        let Some(holder_type) = HolderType::from_db(&sub.holder_type) else {
            tracing::error!(subscription_id = %sub.id, holder_type = %sub.holder_type,
                "Skipping subscription with unknown holder type");
            report.skipped += 1;
            continue;
        };
        let holder = Holder {
            holder_type,
            id: sub.holder_id.clone(),
        };

        let action = cycle_action(
            BillingInterval::from_db(&sub.interval),
            sub.current_period_end,
            sub.scheduled_cancellation_date,
            now,
        );

        match action {
            CycleAction::Cancel => {
                let won =
                    db::subscriptions::cancel_elapsed(pool, &sub.id, sub.current_period_end, now)
                        .await?;
                if won {
                    report.canceled += 1;
                    tracing::info!(subscription_id = %sub.id, holder = %holder,
                        "Subscription canceled at period end");
                    let detail = serde_json::json!({ "subscription_id": sub.id });
                    let _ =
                        db::audit::log(pool, &holder, "subscription_canceled", Some(&detail), now)
                            .await;
                } else {
                    report.skipped += 1;
                }
            }
            CycleAction::Skip => {
                tracing::error!(subscription_id = %sub.id, interval = %sub.interval,
                    "Skipping subscription with unknown interval");
                report.skipped += 1;
            }
            CycleAction::Advance { new_period_end } => {
                let won = db::subscriptions::advance_period(
                    pool,
                    &sub.id,
                    sub.current_period_end,
                    new_period_end,
                )
                .await?;
                if !won {
                    // Another instance already rolled this subscription over.
                    report.skipped += 1;
                    continue;
                }

                // New period starts where the old one ended; credits do not
                // roll over.
                db::usage::reset_for_holder(pool, &holder, sub.current_period_end, now).await?;
                report.advanced += 1;
                tracing::info!(
                    subscription_id = %sub.id,
                    holder = %holder,
                    period_start = sub.current_period_end,
                    period_end = new_period_end,
                    "Billing period advanced, usage reset"
                );
            }
        }
    }

    Ok(report)
}

/// Add one billing interval to a period boundary, calendar-aware.
///
/// Month arithmetic clamps to the last day of shorter months
/// (Jan 31 + 1 month = Feb 28/29), matching gateway renewal behavior.
pub fn advance_period(period_end_ms: i64, interval: BillingInterval) -> i64 {
    let end: DateTime<Utc> = Utc
        .timestamp_millis_opt(period_end_ms)
        .single()
        .unwrap_or_else(Utc::now);
    end.checked_add_months(Months::new(interval.months()))
        .map(|d| d.timestamp_millis())
        .unwrap_or(period_end_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ms(y: i32, mo: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn monthly_interval_advances_one_calendar_month() {
        assert_eq!(
            advance_period(ms(2025, 3, 15), BillingInterval::Monthly),
            ms(2025, 4, 15)
        );
    }

    #[test]
    fn month_end_clamps_on_short_months() {
        assert_eq!(
            advance_period(ms(2025, 1, 31), BillingInterval::Monthly),
            ms(2025, 2, 28)
        );
        // Leap year
        assert_eq!(
            advance_period(ms(2024, 1, 31), BillingInterval::Monthly),
            ms(2024, 2, 29)
        );
    }

    #[test]
    fn yearly_interval_advances_twelve_months() {
        assert_eq!(
            advance_period(ms(2025, 6, 1), BillingInterval::Yearly),
            ms(2026, 6, 1)
        );
    }

    #[test]
    fn advancing_across_year_boundary() {
        assert_eq!(
            advance_period(ms(2025, 12, 20), BillingInterval::Monthly),
            ms(2026, 1, 20)
        );
    }

    #[test]
    fn reached_cancellation_date_wins_over_advance() {
        let end = ms(2025, 5, 1);
        let action = cycle_action(Some(BillingInterval::Monthly), end, Some(end), ms(2025, 5, 2));
        assert_eq!(action, CycleAction::Cancel);
    }

    #[test]
    fn future_cancellation_date_still_advances() {
        let end = ms(2025, 5, 1);
        let action = cycle_action(
            Some(BillingInterval::Monthly),
            end,
            Some(ms(2025, 6, 1)),
            ms(2025, 5, 2),
        );
        assert_eq!(
            action,
            CycleAction::Advance {
                new_period_end: ms(2025, 6, 1)
            }
        );
    }

    #[test]
    fn unknown_interval_is_skipped() {
        let end = ms(2025, 5, 1);
        assert_eq!(
            cycle_action(BillingInterval::from_db("weekly"), end, None, ms(2025, 5, 2)),
            CycleAction::Skip
        );
    }
}
