//! Quota & Usage Subsystem (C10): plan lookup, atomic increment-if-under-limit,
//! and the monthly usage reset sweep.

use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Plan, Subscription, UsageEventType};
use crate::persistence::UsageEventsRepo;

/// The fixed plan table. Grounded in the original subscription service's
/// literal `self.PLANS` construction; `9999` stands in for "effectively
/// unlimited" exactly as the source does it.
pub fn plan(plan_id: &str) -> Plan {
    match plan_id {
        "basic_monthly" | "basic_annual" => Plan {
            id: plan_id.to_string(),
            name: "Basic".to_string(),
            monthly_manual_applications: 9999,
            monthly_auto_applications: 600,
            monthly_cv_generations: 9999,
            monthly_cover_letters: 9999,
            concurrent_applications: 20,
            advanced_analytics: false,
            priority_support: false,
            export_formats: vec!["pdf".to_string()],
            ai_model_version: "standard".to_string(),
        },
        "premium_monthly" | "premium_annual" => Plan {
            id: plan_id.to_string(),
            name: "Premium".to_string(),
            monthly_manual_applications: 9999,
            monthly_auto_applications: 9999,
            monthly_cv_generations: 9999,
            monthly_cover_letters: 9999,
            concurrent_applications: 9999,
            advanced_analytics: true,
            priority_support: true,
            export_formats: vec!["pdf".to_string(), "docx".to_string()],
            ai_model_version: "advanced".to_string(),
        },
        _ => Plan {
            id: "free".to_string(),
            name: "Free".to_string(),
            monthly_manual_applications: 5,
            monthly_auto_applications: 0,
            monthly_cv_generations: 0,
            monthly_cover_letters: 0,
            concurrent_applications: 1,
            advanced_analytics: false,
            priority_support: false,
            export_formats: vec!["pdf".to_string()],
            ai_model_version: "standard".to_string(),
        },
    }
}

fn limit_for(plan: &Plan, event: UsageEventType) -> i64 {
    match event {
        UsageEventType::ManualApplication => plan.monthly_manual_applications,
        UsageEventType::AutoApplication => plan.monthly_auto_applications,
        UsageEventType::CvGeneration => plan.monthly_cv_generations,
        UsageEventType::CoverLetter => plan.monthly_cover_letters,
    }
}

/// The result of a non-mutating `Check` call.
#[derive(Debug, Clone, Copy)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub current: i64,
    pub limit: i64,
}

pub struct QuotaService {
    usage_events: UsageEventsRepo,
}

impl QuotaService {
    pub fn new(usage_events: UsageEventsRepo) -> Self {
        Self { usage_events }
    }

    /// `Check(user, event, qty) -> (allowed, current, limit)`, pure: reads
    /// the subscription but does not mutate it.
    pub async fn check(
        &self,
        user_id: Uuid,
        event: UsageEventType,
        qty: i64,
    ) -> Result<QuotaCheck, ApiError> {
        let subscription = self.usage_events.get_subscription(user_id).await?;
        let plan = plan(&subscription.plan_id);
        let limit = limit_for(&plan, event);
        let current = subscription.current_usage.get(event);
        Ok(QuotaCheck {
            allowed: current + qty <= limit,
            current,
            limit,
        })
    }

    /// `Track(user, event, qty)`: conditional atomic increment, appends a
    /// `UsageEvent` in the same transaction as the counter bump. Returns
    /// `QuotaDenied{current, limit}` with no side effect when the increment
    /// would exceed the plan's limit.
    pub async fn track(
        &self,
        user_id: Uuid,
        event: UsageEventType,
        qty: i64,
        idempotency_key: Option<&str>,
    ) -> Result<Subscription, ApiError> {
        let subscription = self.usage_events.get_subscription(user_id).await?;
        let plan = plan(&subscription.plan_id);
        let limit = limit_for(&plan, event);

        match self
            .usage_events
            .track_if_allowed(user_id, event, qty, limit, idempotency_key)
            .await?
        {
            Some(subscription) => Ok(subscription),
            None => {
                let current = subscription.current_usage.get(event);
                Err(ApiError::QuotaDenied(format!(
                    "{} at {current}/{limit}",
                    event.as_str()
                )))
            }
        }
    }

    /// `ResetMonthly()`: zeroes counters for every subscription whose
    /// `usage_reset_date` has passed and advances it by exactly 30 days,
    /// independent of billing interval.
    pub async fn reset_monthly(&self) -> Result<usize, ApiError> {
        let due = self
            .usage_events
            .subscriptions_due_for_reset(chrono::Utc::now())
            .await?;
        for subscription in &due {
            self.usage_events.reset_usage(subscription.id).await?;
        }
        Ok(due.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_matches_s6_scenario() {
        let free = plan("free");
        assert_eq!(free.monthly_manual_applications, 5);
    }

    #[test]
    fn unknown_plan_id_falls_back_to_free() {
        let fallback = plan("does-not-exist");
        assert_eq!(fallback.id, "free");
    }
}
