//! Named automation actions, runnable by the scheduler or a cron trigger.

use crate::auth::Principal;
use crate::pipeline::{BatchRequest, Pipeline};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use trendpost_core::{
    AutomationLogEntry, CoreError, ErrorExt, LogStatus, LogType, PipelineSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationAction {
    ScheduledContent,
    HealthCheck,
    AiContentGeneration,
    DatabaseCleanup,
    NotificationQueue,
    SchedulerHealth,
    WeeklyReport,
}

impl AutomationAction {
    pub const ALL: [AutomationAction; 7] = [
        AutomationAction::ScheduledContent,
        AutomationAction::HealthCheck,
        AutomationAction::AiContentGeneration,
        AutomationAction::DatabaseCleanup,
        AutomationAction::NotificationQueue,
        AutomationAction::SchedulerHealth,
        AutomationAction::WeeklyReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationAction::ScheduledContent => "scheduled_content",
            AutomationAction::HealthCheck => "health_check",
            AutomationAction::AiContentGeneration => "ai_content_generation",
            AutomationAction::DatabaseCleanup => "database_cleanup",
            AutomationAction::NotificationQueue => "notification_queue",
            AutomationAction::SchedulerHealth => "scheduler_health",
            AutomationAction::WeeklyReport => "weekly_report",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == value)
    }
}

impl fmt::Display for AutomationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Executes every action except `scheduler_health`, which needs the scheduler
/// itself and is handled by [`crate::BackgroundService::run_action`].
pub struct Automation {
    pipeline: Arc<Pipeline>,
}

impl Automation {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn settings(&self) -> &PipelineSettings {
        self.pipeline.settings()
    }

    async fn record(&self, log_type: LogType, status: LogStatus, message: String, metadata: Value) {
        let deps = self.pipeline.deps();
        let entry = AutomationLogEntry::new(log_type, status, message, metadata, deps.clock.now());
        if let Err(e) = deps.logs.append_log(&entry).await {
            e.log_warn();
        }
    }

    async fn notify(&self, template_id: &str, data: Value) {
        if let Err(e) = self.pipeline.deps().notifier.notify(template_id, &data, None).await {
            e.log_warn();
        }
    }

    pub async fn execute(
        &self,
        action: AutomationAction,
        principal: &Principal,
    ) -> Result<ActionOutcome, CoreError> {
        info!("Running automation action {}", action);
        match action {
            AutomationAction::ScheduledContent => self.scheduled_content(principal).await,
            AutomationAction::HealthCheck => self.health_check().await,
            AutomationAction::AiContentGeneration => self.ai_content_generation(principal).await,
            AutomationAction::DatabaseCleanup => self.database_cleanup().await,
            AutomationAction::NotificationQueue => self.notification_queue().await,
            AutomationAction::WeeklyReport => self.weekly_report().await,
            AutomationAction::SchedulerHealth => Err(CoreError::InvalidInput {
                message: "scheduler_health must run through the background service".to_string(),
            }),
        }
    }

    async fn scheduled_content(&self, principal: &Principal) -> Result<ActionOutcome, CoreError> {
        let outcome = self.pipeline.run_scheduled_post(principal).await?;
        Ok(ActionOutcome::ok(
            "Scheduled content run finished",
            serde_json::to_value(&outcome)?,
        ))
    }

    /// Database reachability, generator credentials and notification channels.
    pub async fn health_check(&self) -> Result<ActionOutcome, CoreError> {
        let deps = self.pipeline.deps();

        let database = match deps.content.ping().await {
            Ok(()) => None,
            Err(e) => {
                e.log_error();
                Some(e.to_string())
            }
        };
        let generator_ready = deps.generator.is_configured();
        let channels = deps
            .notifier
            .configured_channels()
            .iter()
            .filter(|c| deps.notifier.validate_channel(c))
            .count();

        let mut problems = Vec::new();
        if database.is_some() {
            problems.push("database");
        }
        if !generator_ready {
            problems.push("generator");
        }
        if channels == 0 {
            problems.push("notifications");
        }

        let status = if database.is_some() {
            HealthStatus::Unhealthy
        } else if problems.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        let data = json!({
            "status": status,
            "services": {
                "database": { "healthy": database.is_none(), "error": database },
                "generator": {
                    "healthy": generator_ready,
                    "provider": deps.generator.provider_name(),
                },
                "notifications": { "healthy": channels > 0, "channels": channels },
            },
        });

        self.record(
            LogType::HealthCheck,
            if status == HealthStatus::Healthy {
                LogStatus::Success
            } else {
                LogStatus::Warning
            },
            format!("System is {}", status.as_str()),
            data.clone(),
        )
        .await;

        if status != HealthStatus::Healthy {
            warn!("Health check reports {} ({})", status.as_str(), problems.join(", "));
            self.notify(
                "health-check",
                json!({
                    "title": format!("System {}", status.as_str()),
                    "severity": if status == HealthStatus::Unhealthy { "critical" } else { "warning" },
                    "metadata": {
                        "overall_status": status.as_str(),
                        "unhealthy_services": problems.join(", "),
                        "recommendations": "Check credentials and connectivity of the listed services",
                    },
                }),
            )
            .await;
        }

        Ok(ActionOutcome {
            success: status != HealthStatus::Unhealthy,
            message: format!("System is {}", status.as_str()),
            data,
        })
    }

    async fn ai_content_generation(&self, principal: &Principal) -> Result<ActionOutcome, CoreError> {
        let started = self.pipeline.deps().clock.now();
        let request = BatchRequest {
            count: Some(self.settings().batch_size),
            auto_publish: Some(false),
            ..BatchRequest::default()
        };
        let report = self.pipeline.run_batch(principal, &request).await?;
        let elapsed = self.pipeline.deps().clock.now() - started;

        if report.saved > 0 {
            self.notify(
                "automation-success",
                json!({
                    "title": "AI content generation",
                    "message": report.message,
                    "severity": "success",
                    "metadata": {
                        "duration": elapsed.num_milliseconds(),
                        "result": format!("{} draft(s) saved, {} failed", report.saved, report.failed),
                    },
                }),
            )
            .await;
        }

        Ok(ActionOutcome {
            success: report.success,
            message: report.message.clone(),
            data: serde_json::to_value(&report)?,
        })
    }

    /// Prunes old log entries and reports stale drafts. Content is never deleted.
    async fn database_cleanup(&self) -> Result<ActionOutcome, CoreError> {
        let deps = self.pipeline.deps();
        let now = deps.clock.now();

        let pruned = deps
            .logs
            .prune_logs(now - Duration::days(self.settings().log_retention_days))
            .await?;
        let stale_drafts = deps
            .content
            .count_stale_drafts(now - Duration::days(self.settings().stale_draft_days))
            .await?;

        let data = json!({ "pruned_logs": pruned, "stale_drafts": stale_drafts });
        self.record(
            LogType::Cleanup,
            LogStatus::Success,
            format!("Pruned {} log entries", pruned),
            data.clone(),
        )
        .await;

        Ok(ActionOutcome::ok(
            format!("Pruned {} log entries, {} stale draft(s) found", pruned, stale_drafts),
            data,
        ))
    }

    async fn notification_queue(&self) -> Result<ActionOutcome, CoreError> {
        let report = self.pipeline.deps().notifier.process_queue().await;
        Ok(ActionOutcome::ok(
            format!("Delivered {} of {} queued notification(s)", report.delivered, report.processed),
            serde_json::to_value(report)?,
        ))
    }

    async fn weekly_report(&self) -> Result<ActionOutcome, CoreError> {
        let deps = self.pipeline.deps();
        let analytics = deps
            .content
            .content_analytics(deps.clock.now() - Duration::days(7))
            .await?;

        let summary = format!(
            "{} posts this week ({} published, {} drafts), {} views, {:.1}% generation success",
            analytics.total,
            analytics.published,
            analytics.drafts,
            analytics.total_views,
            analytics.generation_success_rate
        );
        self.notify(
            "automation-success",
            json!({
                "title": "Weekly content report",
                "message": summary,
                "severity": "info",
                "metadata": { "result": summary },
            }),
        )
        .await;

        Ok(ActionOutcome::ok(summary, serde_json::to_value(&analytics)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        for action in AutomationAction::ALL {
            assert_eq!(AutomationAction::parse(action.as_str()), Some(action));
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                Value::String(action.as_str().to_string())
            );
        }
        assert_eq!(AutomationAction::parse("reboot"), None);
    }
}
