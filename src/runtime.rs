//! Background Job Runtime (C12): a typed queue dispatcher plus the four
//! cron-style periodic jobs: claim, heartbeat, complete or back off or
//! dead-letter.

use std::sync::Arc;

use uuid::Uuid;

use crate::browser::BrowserAutomationClient;
use crate::config::{JobRuntimeConfig, MailConfig};
use crate::lifecycle::LifecycleController;
use crate::llm::LlmGateway;
use crate::mail::gateway::HttpMailGateway;
use crate::mail::MailGateway;
use crate::models::{NotificationChannel, WorkItem, WorkItemKind};
use crate::monitor::ResponseMonitor;
use crate::notify::NotificationDispatcher;
use crate::persistence::{JobsRepo, UsersRepo, WorkItemsRepo};
use crate::quota::QuotaService;

pub struct JobRuntime {
    work_items: WorkItemsRepo,
    jobs: JobsRepo,
    users: UsersRepo,
    lifecycle: Arc<LifecycleController>,
    monitor: Arc<ResponseMonitor>,
    notifications: Arc<NotificationDispatcher>,
    quota: Arc<QuotaService>,
    browser: Arc<dyn BrowserAutomationClient>,
    llm: Arc<dyn LlmGateway>,
    mail_config: MailConfig,
    http_client: reqwest::Client,
    config: JobRuntimeConfig,
}

impl JobRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        work_items: WorkItemsRepo,
        jobs: JobsRepo,
        users: UsersRepo,
        lifecycle: Arc<LifecycleController>,
        monitor: Arc<ResponseMonitor>,
        notifications: Arc<NotificationDispatcher>,
        quota: Arc<QuotaService>,
        browser: Arc<dyn BrowserAutomationClient>,
        llm: Arc<dyn LlmGateway>,
        mail_config: MailConfig,
        http_client: reqwest::Client,
        config: JobRuntimeConfig,
    ) -> Self {
        Self {
            work_items,
            jobs,
            users,
            lifecycle,
            monitor,
            notifications,
            quota,
            browser,
            llm,
            mail_config,
            http_client,
            config,
        }
    }

    /// The main dispatcher loop: claim, run, complete/fail. Polls at
    /// `poll_interval` when work was found, backing off to
    /// `idle_poll_interval` on an empty queue.
    pub async fn run_dispatcher(&self) {
        loop {
            match self.work_items.claim_next().await {
                Ok(Some(item)) => {
                    self.dispatch(&item).await;
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Ok(None) => {
                    tokio::time::sleep(self.config.idle_poll_interval).await;
                }
                Err(e) => {
                    log::error!("work item claim failed: {e}");
                    tokio::time::sleep(self.config.idle_poll_interval).await;
                }
            }
        }
    }

    async fn dispatch(&self, item: &WorkItem) {
        let result = match item.kind {
            WorkItemKind::Probe => self.handle_probe(item).await,
            WorkItemKind::VerificationSweep => self.handle_verification(item).await,
            WorkItemKind::UsageReset => self.handle_usage_reset().await,
            WorkItemKind::JobExpiry => self.handle_job_expiry().await,
            WorkItemKind::Notify => self.handle_notify(item).await,
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.work_items.complete(item.id).await {
                    log::error!("failed to mark work item {} complete: {e}", item.id);
                }
            }
            Err(e) => {
                log::warn!("work item {} ({:?}) failed: {e}", item.id, item.kind);
                match self.work_items.fail(item.id, &e.to_string()).await {
                    Ok(crate::persistence::work_items::FailOutcome::DeadLettered(dead)) => {
                        self.surface_dead_letter(&dead, &e).await;
                    }
                    Ok(crate::persistence::work_items::FailOutcome::Requeued) => {}
                    Err(e) => {
                        log::error!("failed to record failure for work item {}: {e}", item.id);
                    }
                }
            }
        }
    }

    /// A job that has exhausted its retries is never dropped silently: it
    /// lands in `dead_letter` with full context already attached by
    /// `WorkItemsRepo::fail`, and here we additionally log it at operator
    /// severity (the operator channel this process exposes) and, when the
    /// item names an application, notify that application's owner in-app
    /// that their automated work stalled.
    async fn surface_dead_letter(&self, dead: &WorkItem, error: &crate::error::ApiError) {
        log::error!(
            "DEAD LETTER work_item id={} kind={:?} application_id={:?} attempts={}/{} payload={} error={error}",
            dead.id, dead.kind, dead.application_id, dead.attempts, dead.max_attempts, dead.payload,
        );

        let Some(application_id) = dead.application_id else {
            return;
        };
        let Ok(application) = self.lifecycle.get(application_id).await else {
            return;
        };
        let Ok(owner) = self.users.get(application.user_id).await else {
            return;
        };
        if let Err(e) = self
            .notifications
            .notify(
                &owner,
                "system_error",
                "An automated task for one of your applications stalled",
                &format!(
                    "Background work ({:?}) for {} at {} failed permanently after {} attempts and needs attention.",
                    dead.kind, application.job_title, application.company_name, dead.attempts
                ),
                serde_json::json!({ "work_item_id": dead.id, "application_id": application_id }),
                vec![NotificationChannel::InApp],
                None,
            )
            .await
        {
            log::error!("failed to notify owner of dead-lettered work item {}: {e}", dead.id);
        }
    }

    async fn handle_probe(&self, item: &WorkItem) -> Result<(), crate::error::ApiError> {
        let Some(application_id) = item.application_id else {
            return Ok(());
        };
        let application = self.lifecycle.get(application_id).await?;
        let owner = self.users.get(application.user_id).await?;
        let mail = self.mail_gateway_for(&owner);

        self.monitor
            .probe(
                application_id,
                Some(self.browser.as_ref()),
                mail.as_deref(),
                Some(self.llm.as_ref()),
                true,
            )
            .await?;
        Ok(())
    }

    /// For each application in `pending_verification`, searches the user's
    /// mailbox for a message from the stored verification domain. Finding
    /// one is treated as the verification link having been followed
    /// headlessly; there is no separate "click" endpoint on the browser
    /// worker to confirm that step, so this is an approximation of the
    /// original two-step flow.
    async fn handle_verification(&self, item: &WorkItem) -> Result<(), crate::error::ApiError> {
        let Some(application_id) = item.application_id else {
            return Ok(());
        };
        let application = self.lifecycle.get(application_id).await?;
        let Some(domain) = application.verification_portal_domain.clone() else {
            return Ok(());
        };
        let owner = self.users.get(application.user_id).await?;
        let Some(mail) = self.mail_gateway_for(&owner) else {
            return Ok(());
        };

        let messages = mail.list(&format!("from:({domain})")).await?;
        if !messages.is_empty() {
            self.lifecycle
                .transition(application_id, crate::models::ApplicationStatus::Applied, "verification email received")
                .await?;
        }
        Ok(())
    }

    async fn handle_usage_reset(&self) -> Result<(), crate::error::ApiError> {
        let reset = self.quota.reset_monthly().await?;
        log::info!("usage_reset_tick reset {reset} subscriptions");
        Ok(())
    }

    async fn handle_job_expiry(&self) -> Result<(), crate::error::ApiError> {
        let expired = self.jobs.expire_stale(chrono::Duration::days(90)).await?;
        log::info!("job_expiry_tick expired {expired} postings");
        Ok(())
    }

    async fn handle_notify(&self, item: &WorkItem) -> Result<(), crate::error::ApiError> {
        let payload: NotifyPayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| crate::error::ApiError::Invariant(format!("malformed notify payload: {e}")))?;
        let user = self.users.get(payload.user_id).await?;
        let mail = self.mail_gateway_for(&user);
        self.notifications
            .notify(
                &user,
                &payload.notification_type,
                &payload.title,
                &payload.message,
                payload.data,
                payload.channels,
                mail.as_deref(),
            )
            .await?;
        Ok(())
    }

    fn mail_gateway_for(&self, user: &crate::models::User) -> Option<Box<dyn MailGateway>> {
        let auth = user.mailbox_auth.as_ref()?.0.clone();
        Some(Box::new(HttpMailGateway::new(
            self.http_client.clone(),
            self.mail_config.clone(),
            auth,
        )))
    }

    /// `monitor_tick`: enqueues one `Probe` item per application due for a
    /// check, idempotency-keyed so a re-run within the same window doesn't
    /// duplicate work already queued or running.
    pub async fn monitor_tick(&self) -> Result<usize, crate::error::ApiError> {
        let due = self
            .lifecycle
            .applications()
            .list_due_for_probe(self.config.probe_interval_as_duration(), 200)
            .await?;
        for application in &due {
            self.work_items
                .enqueue(
                    WorkItemKind::Probe,
                    serde_json::json!({ "application_id": application.id }),
                    Some(application.id),
                    0,
                    Some(&format!("probe:{}", application.id)),
                )
                .await?;
        }
        Ok(due.len())
    }

    /// `verification_sweep`: enqueues one `VerificationSweep` item per
    /// application currently awaiting email verification.
    pub async fn verification_sweep_tick(&self) -> Result<usize, crate::error::ApiError> {
        let pending = self
            .lifecycle
            .applications()
            .list_by_status(crate::models::ApplicationStatus::PendingVerification, 200)
            .await?;
        for application in &pending {
            self.work_items
                .enqueue(
                    WorkItemKind::VerificationSweep,
                    serde_json::json!({ "application_id": application.id }),
                    Some(application.id),
                    1,
                    Some(&format!("verify:{}", application.id)),
                )
                .await?;
        }
        Ok(pending.len())
    }

    pub async fn usage_reset_tick(&self) -> Result<(), crate::error::ApiError> {
        self.work_items
            .enqueue(WorkItemKind::UsageReset, serde_json::json!({}), None, 0, None)
            .await?;
        Ok(())
    }

    pub async fn job_expiry_tick(&self) -> Result<(), crate::error::ApiError> {
        self.work_items
            .enqueue(WorkItemKind::JobExpiry, serde_json::json!({}), None, 0, None)
            .await?;
        Ok(())
    }

    /// Spawns the dispatcher loop and the four periodic cron loops as
    /// background tasks from the liftoff fairing.
    pub fn spawn(self: Arc<Self>) {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run_dispatcher().await });

        let monitor_runtime = self.clone();
        let monitor_period = monitor_runtime
            .config
            .probe_interval_as_duration()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(600))
            .min(std::time::Duration::from_secs(600));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor_period);
            loop {
                interval.tick().await;
                if let Err(e) = monitor_runtime.monitor_tick().await {
                    log::error!("monitor_tick failed: {e}");
                }
            }
        });

        let verification_runtime = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                if let Err(e) = verification_runtime.verification_sweep_tick().await {
                    log::error!("verification_sweep failed: {e}");
                }
            }
        });

        let usage_runtime = self.clone();
        let usage_reset_interval = usage_runtime.config.usage_reset_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(usage_reset_interval);
            loop {
                interval.tick().await;
                if let Err(e) = usage_runtime.usage_reset_tick().await {
                    log::error!("usage_reset_tick failed: {e}");
                }
            }
        });

        let expiry_runtime = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
            loop {
                interval.tick().await;
                if let Err(e) = expiry_runtime.job_expiry_tick().await {
                    log::error!("job_expiry_tick failed: {e}");
                }
            }
        });
    }
}

impl JobRuntimeConfig {
    fn probe_interval_as_duration(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.probe_interval).unwrap_or(chrono::Duration::minutes(15))
    }
}

#[derive(Debug, serde::Deserialize)]
struct NotifyPayload {
    user_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    #[serde(default)]
    data: serde_json::Value,
    channels: Vec<NotificationChannel>,
}
