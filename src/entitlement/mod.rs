//! Entitlement and quota admission.
//!
//! The gate decides, before any generation starts, whether an identity may
//! perform a search-backed action today. Decisions are deterministic given
//! consistent counter state and are read-only with one deliberate
//! exception: an admitted guest search charges the guest tracker
//! immediately, because a guest has no durable record to charge after the
//! turn completes. Authenticated usage is charged only after successful
//! completion, which leaves a narrow documented window where two
//! concurrent requests can both be admitted on the last remaining slot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::store::ChatRepository;
use crate::usage::guest::GuestUsageTracker;
use crate::usage::{UsageRecord, UsageStore, day_key};

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    /// Default tier.
    #[default]
    Free,
    /// Paid tier.
    Pro,
}

/// A quota-metered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Shallow web search.
    Search,
    /// Deep web search.
    DeepSearch,
}

/// Daily limits for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Plain searches per day.
    pub searches_per_day: u32,
    /// Deep searches per day.
    pub deep_searches_per_day: u32,
}

impl PlanLimits {
    /// The limit for the given action kind.
    pub fn limit(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Search => self.searches_per_day,
            ActionKind::DeepSearch => self.deep_searches_per_day,
        }
    }
}

/// Guests get one plain search per fingerprint per rolling day and no
/// deep search, unconditionally.
const GUEST_LIMITS: PlanLimits = PlanLimits {
    searches_per_day: 1,
    deep_searches_per_day: 0,
};

/// Per-plan daily limits, loaded from configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanTable {
    /// Limits for the free tier.
    pub free: PlanLimits,
    /// Limits for the pro tier.
    pub pro: PlanLimits,
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            free: PlanLimits {
                searches_per_day: 10,
                deep_searches_per_day: 2,
            },
            pro: PlanLimits {
                searches_per_day: 100,
                deep_searches_per_day: 20,
            },
        }
    }
}

impl PlanTable {
    /// The pure plan-to-limits mapping.
    pub fn limits_for(&self, plan: PlanType) -> PlanLimits {
        match plan {
            PlanType::Free => self.free,
            PlanType::Pro => self.pro,
        }
    }
}

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Guests may never deep-search.
    GuestDeepSearchNotAllowed,
    /// The daily limit for this action is exhausted.
    LimitExceeded,
}

/// Outcome of an admission check, including remediation hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether the action is allowed.
    pub allowed: bool,
    /// Denial reason when not allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    /// Signing in would lift the restriction.
    pub requires_login: bool,
    /// Upgrading the plan would lift the restriction.
    pub requires_upgrade: bool,
    /// The user is already on the top tier; contact support.
    pub requires_contact: bool,
    /// The limits that applied to this decision.
    pub limits: PlanLimits,
    /// Usage counts before this request.
    pub usage: UsageRecord,
}

impl AccessDecision {
    fn allow(limits: PlanLimits, usage: UsageRecord) -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_login: false,
            requires_upgrade: false,
            requires_contact: false,
            limits,
            usage,
        }
    }

    fn deny(reason: DenyReason, limits: PlanLimits, usage: UsageRecord) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            requires_login: false,
            requires_upgrade: false,
            requires_contact: false,
            limits,
            usage,
        }
    }

    fn with_login(mut self) -> Self {
        self.requires_login = true;
        self
    }

    fn with_upgrade(mut self) -> Self {
        self.requires_upgrade = true;
        self
    }

    fn with_contact(mut self) -> Self {
        self.requires_contact = true;
        self
    }
}

/// Admission gate over plan limits and usage counters.
pub struct EntitlementGate {
    repository: Arc<dyn ChatRepository>,
    usage: Arc<UsageStore>,
    guests: Arc<GuestUsageTracker>,
    plans: PlanTable,
}

impl std::fmt::Debug for EntitlementGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementGate")
            .field("plans", &self.plans)
            .finish()
    }
}

impl EntitlementGate {
    /// Create a gate over the given stores.
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        usage: Arc<UsageStore>,
        guests: Arc<GuestUsageTracker>,
        plans: PlanTable,
    ) -> Self {
        Self {
            repository,
            usage,
            guests,
            plans,
        }
    }

    /// Decide whether `identity` may perform `kind` right now.
    ///
    /// Limits are strict less-than against counts used *before* this
    /// request; a user at the limit is denied. Also runs the guest sweep,
    /// amortizing eviction over inbound requests.
    pub async fn can_perform(
        &self,
        identity: &Identity,
        kind: ActionKind,
    ) -> anyhow::Result<AccessDecision> {
        self.guests.sweep();

        match identity {
            Identity::Guest(guest) => Ok(self.check_guest(guest.fingerprint, kind)),
            Identity::Authenticated(user) => self.check_user(&user.id, kind).await,
        }
    }

    fn check_guest(&self, fingerprint: u64, kind: ActionKind) -> AccessDecision {
        let entry = self.guests.get(fingerprint);
        let usage = UsageRecord {
            searches_used: entry.searches,
            deep_searches_used: entry.deep_searches,
        };

        match kind {
            ActionKind::DeepSearch => {
                AccessDecision::deny(DenyReason::GuestDeepSearchNotAllowed, GUEST_LIMITS, usage)
                    .with_login()
            }
            ActionKind::Search => {
                if entry.searches >= GUEST_LIMITS.searches_per_day {
                    return AccessDecision::deny(DenyReason::LimitExceeded, GUEST_LIMITS, usage)
                        .with_login();
                }

                // Charged at admission, not completion: there is no
                // durable guest record to update afterwards.
                self.guests.record_search(fingerprint);
                AccessDecision::allow(GUEST_LIMITS, usage)
            }
        }
    }

    async fn check_user(&self, user_id: &str, kind: ActionKind) -> anyhow::Result<AccessDecision> {
        let plan = self
            .repository
            .get_subscription(user_id)
            .await?
            .map_or(PlanType::Free, |s| s.plan);
        let limits = self.plans.limits_for(plan);
        let usage = self.usage.get(user_id, day_key()).await?;

        if usage.used(kind) < limits.limit(kind) {
            return Ok(AccessDecision::allow(limits, usage));
        }

        let decision = AccessDecision::deny(DenyReason::LimitExceeded, limits, usage);
        Ok(match plan {
            PlanType::Free => decision.with_upgrade(),
            PlanType::Pro => decision.with_contact(),
        })
    }
}
