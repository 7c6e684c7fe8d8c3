//! Quota enforcement engine
//!
//! The `check_allowed` / `consume` protocol every gated route handler runs:
//! check first (advisory, side-effect-free), perform the action, then record
//! consumption. The split deliberately leaves a race window between check and
//! consume instead of holding a ledger lock across a slow external call (an
//! AI screening, a file upload); the cap is a soft cost-control limit and an
//! occasional overshoot is recorded, not prevented.

pub mod decision;

use shared::billing::{CheckDecision, FeatureKind, FREE_PLAN_ID};
use shared::error::{AppError, ErrorCode};
use shared::util::{month_start_millis, now_millis};
use shared::Holder;
use sqlx::PgPool;

use crate::db;
use crate::error::ServiceError;
use decision::EntitlementTerms;

/// Holder's plan and billing period, after subscription resolution.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub plan_id: String,
    pub period_start: i64,
}

/// Per-feature usage snapshot surfaced to dashboards and admins.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeatureUsage {
    pub feature_key: String,
    pub kind: FeatureKind,
    pub enabled: bool,
    pub cap: i64,
    pub consumed: i64,
    pub extra_allowance: i64,
    /// Units left this period; `None` for boolean features (uncapped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overage_unit_cents: Option<i64>,
}

/// The metering engine. Owns nothing but the pool handed in at construction;
/// holds no in-process locks and keeps no cache, so a fleet of instances
/// behaves identically to one.
#[derive(Clone)]
pub struct MeteringEngine {
    pool: PgPool,
}

impl MeteringEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the plan and billing period the holder meters against.
    ///
    /// No active subscription (including canceled holders) falls back to the
    /// free plan, metered against calendar-month periods.
    pub async fn resolve_plan(&self, holder: &Holder, now: i64) -> Result<ResolvedPlan, ServiceError> {
        let sub = db::subscriptions::resolve_active(&self.pool, holder, now).await?;
        Ok(match sub {
            Some(sub) => ResolvedPlan {
                plan_id: sub.plan_id,
                period_start: sub.current_period_start,
            },
            None => ResolvedPlan {
                plan_id: FREE_PLAN_ID.to_string(),
                period_start: month_start_millis(now),
            },
        })
    }

    /// Side-effect-free quota preview. Never mutates the ledger; safe to call
    /// any number of times.
    pub async fn check_allowed(
        &self,
        holder: &Holder,
        feature_key: &str,
        amount: i64,
    ) -> Result<CheckDecision, ServiceError> {
        let now = now_millis();
        let plan = self.resolve_plan(holder, now).await?;

        let entitlement =
            db::entitlements::get_with_kind(&self.pool, &plan.plan_id, feature_key).await?;
        let terms = entitlement.as_ref().and_then(terms_of);

        // Boolean features never touch the ledger
        if let Some(t) = terms
            && t.enabled
            && t.kind == FeatureKind::Boolean
        {
            return Ok(decision::decide(terms, 0, 0, amount));
        }

        let usage =
            db::usage::fetch(&self.pool, holder, feature_key, plan.period_start).await?;
        Ok(decision::decide(
            terms,
            usage.consumed,
            usage.extra_allowance,
            amount,
        ))
    }

    /// Record consumption for an action that already succeeded.
    ///
    /// This is the enforcement point: a single conditional increment the
    /// database serializes. When the guard fails — a concurrent consumer
    /// raced past an earlier check — the increment is applied anyway (the
    /// action cannot be undone) and the overshoot is logged so billed-over-cap
    /// periods can be reconciled. Not safe to retry: a retried consume
    /// double-counts.
    pub async fn consume(
        &self,
        holder: &Holder,
        feature_key: &str,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let now = now_millis();
        let plan = self.resolve_plan(holder, now).await?;

        let entitlement =
            db::entitlements::get_with_kind(&self.pool, &plan.plan_id, feature_key).await?;

        db::usage::ensure_current(&self.pool, holder, feature_key, plan.period_start, now).await?;

        let cap = match entitlement.as_ref().and_then(terms_of) {
            Some(t) if t.kind == FeatureKind::Metered && t.enabled => t.monthly_cap,
            Some(_) => {
                // Boolean (or disabled) features are counted but not capped
                db::usage::force_consume(
                    &self.pool,
                    holder,
                    feature_key,
                    plan.period_start,
                    amount,
                    now,
                )
                .await?;
                return Ok(());
            }
            None => {
                // The caller gated an action on a feature its plan does not
                // carry. The action happened; record it and flag the call site.
                let consumed = db::usage::force_consume(
                    &self.pool,
                    holder,
                    feature_key,
                    plan.period_start,
                    amount,
                    now,
                )
                .await?;
                tracing::warn!(
                    holder = %holder,
                    feature = feature_key,
                    plan_id = %plan.plan_id,
                    amount,
                    consumed,
                    "Consumed feature with no entitlement row; check call site gating"
                );
                return Ok(());
            }
        };

        let within_cap = db::usage::try_consume(
            &self.pool,
            holder,
            feature_key,
            plan.period_start,
            amount,
            cap,
            now,
        )
        .await?;

        if !within_cap {
            let consumed = db::usage::force_consume(
                &self.pool,
                holder,
                feature_key,
                plan.period_start,
                amount,
                now,
            )
            .await?;
            tracing::warn!(
                holder = %holder,
                feature = feature_key,
                plan_id = %plan.plan_id,
                amount,
                cap,
                consumed,
                "Consumption recorded over cap (check/consume race)"
            );
        }

        Ok(())
    }

    /// Usage snapshot for every feature entitled under the holder's plan.
    pub async fn get_entitlements(
        &self,
        holder: &Holder,
    ) -> Result<Vec<FeatureUsage>, ServiceError> {
        let now = now_millis();
        let plan = self.resolve_plan(holder, now).await?;
        let rows = db::entitlements::list_for_plan(&self.pool, &plan.plan_id).await?;

        let mut snapshot = Vec::with_capacity(rows.len());
        for row in rows {
            let kind = FeatureKind::from_db(&row.kind)
                .ok_or_else(|| AppError::internal(format!("unknown feature kind: {}", row.kind)))?;
            // Boolean usage is counted too (consume increments it), so the
            // ledger is read for every kind; only the cap math differs.
            let usage =
                db::usage::fetch(&self.pool, holder, &row.feature_key, plan.period_start).await?;
            snapshot.push(usage_row(row, kind, usage));
        }
        Ok(snapshot)
    }

    /// Admin credit grant for the holder's current period. Does not roll over.
    pub async fn grant_extra_allowance(
        &self,
        holder: &Holder,
        feature_key: &str,
        amount: i64,
    ) -> Result<i64, ServiceError> {
        if amount <= 0 {
            return Err(AppError::validation("allowance amount must be positive").into());
        }
        let feature = db::features::get(&self.pool, feature_key)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::FeatureNotFound))?;
        if FeatureKind::from_db(&feature.kind) != Some(FeatureKind::Metered) {
            return Err(
                AppError::validation("extra allowance only applies to metered features").into(),
            );
        }

        let now = now_millis();
        let plan = self.resolve_plan(holder, now).await?;
        let extra = db::usage::grant_extra_allowance(
            &self.pool,
            holder,
            feature_key,
            plan.period_start,
            amount,
            now,
        )
        .await?;

        let detail = serde_json::json!({ "feature": feature_key, "amount": amount, "extra_allowance": extra });
        let _ = db::audit::log(&self.pool, holder, "allowance_granted", Some(&detail), now).await;

        tracing::info!(
            holder = %holder,
            feature = feature_key,
            amount,
            extra_allowance = extra,
            "Extra allowance granted"
        );
        Ok(extra)
    }
}

fn terms_of(row: &db::entitlements::EntitledFeature) -> Option<EntitlementTerms> {
    FeatureKind::from_db(&row.kind).map(|kind| EntitlementTerms {
        kind,
        enabled: row.enabled,
        monthly_cap: row.monthly_cap,
    })
}

/// Snapshot row for one entitlement: recorded usage plus the headroom left.
/// `remaining` is `None` for boolean features, which have no cap to subtract
/// from even though their usage is counted.
fn usage_row(
    row: db::entitlements::EntitledFeature,
    kind: FeatureKind,
    usage: db::usage::UsageCounter,
) -> FeatureUsage {
    let remaining = match kind {
        FeatureKind::Boolean => None,
        FeatureKind::Metered => {
            Some((row.monthly_cap + usage.extra_allowance - usage.consumed).max(0))
        }
    };
    FeatureUsage {
        feature_key: row.feature_key,
        kind,
        enabled: row.enabled,
        cap: row.monthly_cap,
        consumed: usage.consumed,
        extra_allowance: usage.extra_allowance,
        remaining,
        overage_unit_cents: row.overage_unit_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entitlements::EntitledFeature;
    use crate::db::usage::UsageCounter;

    fn row(kind: &str, cap: i64) -> EntitledFeature {
        EntitledFeature {
            feature_key: "ats_access".into(),
            kind: kind.into(),
            enabled: true,
            monthly_cap: cap,
            overage_unit_cents: None,
        }
    }

    #[test]
    fn boolean_snapshot_reports_recorded_usage() {
        // Boolean consumption is counted by consume; the snapshot must not
        // hide it. Only the headroom is undefined.
        let usage = UsageCounter {
            consumed: 7,
            extra_allowance: 0,
        };
        let snap = usage_row(row("boolean", 0), FeatureKind::Boolean, usage);
        assert_eq!(snap.consumed, 7);
        assert_eq!(snap.remaining, None);
    }

    #[test]
    fn metered_snapshot_counts_remaining_with_allowance() {
        let usage = UsageCounter {
            consumed: 8,
            extra_allowance: 5,
        };
        let snap = usage_row(row("metered", 10), FeatureKind::Metered, usage);
        assert_eq!(snap.remaining, Some(7));
    }

    #[test]
    fn overshot_metered_snapshot_clamps_remaining_to_zero() {
        let usage = UsageCounter {
            consumed: 13,
            extra_allowance: 0,
        };
        let snap = usage_row(row("metered", 10), FeatureKind::Metered, usage);
        assert_eq!(snap.remaining, Some(0));
    }
}
