//! Pure quota decision core
//!
//! Everything the check needs is passed in as plain values so the rules can
//! be tested without a database. The engine in `mod.rs` is responsible for
//! loading the entitlement row and the period counter.

use shared::billing::{CheckDecision, DenyReason, FeatureKind};

/// The slice of an entitlement row the decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementTerms {
    pub kind: FeatureKind,
    pub enabled: bool,
    pub monthly_cap: i64,
}

/// Decide whether `amount` more units of a feature are allowed.
///
/// Resolution order matches the plan contract:
/// - no entitlement row: the feature is not purchasable on this plan
/// - row present but disabled: denied regardless of kind
/// - boolean features: allowed unconditionally (no counter involved)
/// - metered features: allowed iff `consumed + amount <= cap + extra`
pub fn decide(
    entitlement: Option<EntitlementTerms>,
    consumed: i64,
    extra_allowance: i64,
    amount: i64,
) -> CheckDecision {
    let Some(terms) = entitlement else {
        return CheckDecision::deny(DenyReason::FeatureNotInPlan);
    };

    if !terms.enabled {
        return CheckDecision::deny(DenyReason::FeatureDisabled);
    }

    match terms.kind {
        FeatureKind::Boolean => CheckDecision::allow(),
        FeatureKind::Metered => {
            if consumed + amount <= terms.monthly_cap + extra_allowance {
                CheckDecision::allow()
            } else {
                CheckDecision::deny(DenyReason::QuotaExceeded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metered(enabled: bool, cap: i64) -> Option<EntitlementTerms> {
        Some(EntitlementTerms {
            kind: FeatureKind::Metered,
            enabled,
            monthly_cap: cap,
        })
    }

    fn boolean(enabled: bool) -> Option<EntitlementTerms> {
        Some(EntitlementTerms {
            kind: FeatureKind::Boolean,
            enabled,
            monthly_cap: 0,
        })
    }

    #[test]
    fn missing_entitlement_row_denies_not_in_plan() {
        let decision = decide(None, 0, 0, 1);
        assert_eq!(decision, CheckDecision::deny(DenyReason::FeatureNotInPlan));
    }

    #[test]
    fn disabled_row_denies_before_any_counting() {
        // Disabled wins even with plenty of headroom
        let decision = decide(metered(false, 100), 0, 50, 1);
        assert_eq!(decision, CheckDecision::deny(DenyReason::FeatureDisabled));

        let decision = decide(boolean(false), 0, 0, 1);
        assert_eq!(decision, CheckDecision::deny(DenyReason::FeatureDisabled));
    }

    #[test]
    fn enabled_boolean_allows_unconditionally() {
        // Counter values are irrelevant for boolean features
        let decision = decide(boolean(true), 9999, 0, 1);
        assert_eq!(decision, CheckDecision::allow());
    }

    #[test]
    fn metered_allows_up_to_cap_inclusive() {
        assert!(decide(metered(true, 10), 0, 0, 10).ok);
        assert!(!decide(metered(true, 10), 0, 0, 11).ok);
        assert!(decide(metered(true, 10), 9, 0, 1).ok);
        assert!(!decide(metered(true, 10), 10, 0, 1).ok);
    }

    #[test]
    fn extra_allowance_extends_the_cap() {
        // cap=10, consumed=5: 6 more would overflow...
        let decision = decide(metered(true, 10), 5, 0, 6);
        assert_eq!(decision, CheckDecision::deny(DenyReason::QuotaExceeded));
        // ...until a 5-unit credit is granted (11 <= 15)
        assert!(decide(metered(true, 10), 5, 5, 6).ok);
    }

    #[test]
    fn overshot_counter_still_denies_further_use() {
        // A raced consume may have pushed consumed past cap; checks after
        // that must deny.
        let decision = decide(metered(true, 10), 12, 0, 1);
        assert_eq!(decision, CheckDecision::deny(DenyReason::QuotaExceeded));
    }

    #[test]
    fn zero_cap_metered_feature_denies_first_unit() {
        let decision = decide(metered(true, 0), 0, 0, 1);
        assert_eq!(decision, CheckDecision::deny(DenyReason::QuotaExceeded));
    }
}
