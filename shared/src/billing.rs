//! Billing domain types shared between the metering service and call sites
//!
//! The holder/feature vocabulary here is the contract every gated route
//! handler speaks: resolve a [`Holder`], ask the metering service whether a
//! feature is allowed, perform the action, then record consumption.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known plan id every holder without a subscription falls back to.
///
/// The fallback is deliberately explicit: absence of a subscription row means
/// "free tier", never "everything allowed".
pub const FREE_PLAN_ID: &str = "recruiter-free";

/// Who is billed for a gated action: an individual recruiter or an
/// organization. A recruiter working inside an organization is billed at the
/// org level; the resolution happens at the session/membership layer before
/// the metering service is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderType {
    User,
    Org,
}

impl HolderType {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "org" => Some(Self::Org),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Org => "org",
        }
    }
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Billing identity: `(type, id)` pair keying every subscription and ledger
/// row. Never mutated; resolved fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Holder {
    #[serde(rename = "type")]
    pub holder_type: HolderType,
    pub id: String,
}

impl Holder {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            holder_type: HolderType::User,
            id: id.into(),
        }
    }

    pub fn org(id: impl Into<String>) -> Self {
        Self {
            holder_type: HolderType::Org,
            id: id.into(),
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.holder_type, self.id)
    }
}

/// Whether a catalog feature is a simple on/off capability or a counted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// No numeric cap; an enabled entitlement row grants unlimited use
    Boolean,
    /// Counted against `monthly_cap + extra_allowance` per billing period
    Metered,
}

impl FeatureKind {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(Self::Boolean),
            "metered" => Some(Self::Metered),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Metered => "metered",
        }
    }
}

/// Subscription lifecycle status
///
/// Transitions: `active → past_due → active | canceled`, or
/// `active → canceled` directly. `canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Is the holder currently billable on this subscription?
    pub fn is_billable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Billing interval a plan renews on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Number of calendar months in one interval
    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
        }
    }
}

/// Expected denial reasons from a quota check.
///
/// These are structured values, not errors: callers translate them into
/// upgrade prompts, they never reach a 5xx path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// No entitlement row exists for `(plan, feature)` — the feature is not
    /// purchasable on this plan at all
    FeatureNotInPlan,
    /// An entitlement row exists but the feature is switched off
    FeatureDisabled,
    /// Metered feature over `monthly_cap + extra_allowance` for this period
    QuotaExceeded,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FeatureNotInPlan => "FEATURE_NOT_IN_PLAN",
            Self::FeatureDisabled => "FEATURE_DISABLED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
        };
        f.write_str(s)
    }
}

/// Outcome of a side-effect-free quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDecision {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

impl CheckDecision {
    pub fn allow() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_serializes_as_tagged_pair() {
        let holder = Holder::org("org-42");
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "org", "id": "org-42" }));

        let back: Holder = serde_json::from_value(json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
        ] {
            assert_eq!(SubscriptionStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(SubscriptionStatus::from_db("trialing"), None);
    }

    #[test]
    fn deny_reason_uses_screaming_snake_wire_form() {
        let decision = CheckDecision::deny(DenyReason::QuotaExceeded);
        let json = serde_json::to_value(decision).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ok": false, "reason": "QUOTA_EXCEEDED" })
        );
    }

    #[test]
    fn allow_omits_reason_field() {
        let json = serde_json::to_value(CheckDecision::allow()).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true }));
    }
}
