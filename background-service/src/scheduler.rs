//! In-process task scheduler driving the automation actions.

use crate::actions::{ActionOutcome, Automation, AutomationAction};
use crate::auth::Principal;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use notifier::NotifierStatus;
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trendpost_core::{
    AutomationLogEntry, Clock, CoreError, ErrorExt, ErrorReporter, LogStatus, LogType,
    SchedulerSettings,
};

/// A five-field cron expression (`min hour day month weekday`) evaluated in
/// the scheduler's local offset. Weekdays are written by name (`Mon`).
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    cron: cron::Schedule,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, CoreError> {
        let expression = expression.trim();
        // The cron crate wants a leading seconds field
        let cron = cron::Schedule::from_str(&format!("0 {}", expression)).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid cron expression '{}': {}", expression, e),
            }
        })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    /// First firing time strictly after `after`, or `None` if the expression
    /// never fires again.
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        self.cron
            .after(&after.with_timezone(&offset))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: String,
    pub name: String,
    pub action: AutomationAction,
    pub schedule: Schedule,
    pub enabled: bool,
    pub timeout: Duration,
}

impl ScheduledTask {
    pub fn new(
        id: &str,
        name: &str,
        action: AutomationAction,
        schedule: &str,
        timeout_secs: u64,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            action,
            schedule: Schedule::parse(schedule)?,
            enabled: true,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn defaults(settings: &SchedulerSettings) -> Result<Vec<ScheduledTask>, CoreError> {
        Ok(vec![
            ScheduledTask::new(
                "scheduled-content-publish",
                "Scheduled content publishing",
                AutomationAction::ScheduledContent,
                "0 * * * *",
                settings.task_timeout_secs,
            )?,
            ScheduledTask::new(
                "ai-content-generation",
                "AI content generation",
                AutomationAction::AiContentGeneration,
                "0 9 * * *",
                600,
            )?
            .disabled(),
            ScheduledTask::new(
                "system-health-check",
                "System health check",
                AutomationAction::HealthCheck,
                "*/30 * * * *",
                120,
            )?,
            ScheduledTask::new(
                "database-cleanup",
                "Database cleanup",
                AutomationAction::DatabaseCleanup,
                "0 2 * * *",
                300,
            )?,
            ScheduledTask::new(
                "weekly-content-report",
                "Weekly content report",
                AutomationAction::WeeklyReport,
                "0 8 * * Mon",
                180,
            )?
            .disabled(),
        ])
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub id: String,
    pub name: String,
    pub action: AutomationAction,
    pub schedule: String,
    pub enabled: bool,
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub tasks: Vec<TaskStatus>,
    pub notifications: NotifierStatus,
}

struct TaskState {
    task: ScheduledTask,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    failure_count: u64,
    last_error: Option<String>,
    running: bool,
}

impl TaskState {
    fn status(&self) -> TaskStatus {
        TaskStatus {
            id: self.task.id.clone(),
            name: self.task.name.clone(),
            action: self.task.action,
            schedule: self.task.schedule.expression().to_string(),
            enabled: self.task.enabled,
            running: self.running,
            last_run: self.last_run,
            next_run: self.next_run.filter(|_| self.task.enabled),
            run_count: self.run_count,
            failure_count: self.failure_count,
            last_error: self.last_error.clone(),
        }
    }
}

pub struct BackgroundService {
    automation: Automation,
    settings: SchedulerSettings,
    offset: FixedOffset,
    tasks: Mutex<Vec<TaskState>>,
    running: AtomicBool,
    shutdown: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
    reporter: ErrorReporter,
}

impl BackgroundService {
    pub fn new(automation: Automation, settings: SchedulerSettings) -> Result<Self, CoreError> {
        let tasks = ScheduledTask::defaults(&settings)?;
        Ok(Self::with_tasks(automation, settings, tasks))
    }

    pub fn with_tasks(
        automation: Automation,
        settings: SchedulerSettings,
        tasks: Vec<ScheduledTask>,
    ) -> Self {
        let offset = FixedOffset::east_opt(settings.utc_offset_hours * 3600).unwrap_or(Utc.fix());
        let now = automation.pipeline().deps().clock.now();
        let tasks = tasks
            .into_iter()
            .map(|task| TaskState {
                next_run: task.schedule.next_after(now, offset),
                task,
                last_run: None,
                run_count: 0,
                failure_count: 0,
                last_error: None,
                running: false,
            })
            .collect();

        Self {
            automation,
            settings,
            offset,
            tasks: Mutex::new(tasks),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            handle: Mutex::new(None),
            reporter: ErrorReporter::new(),
        }
    }

    pub fn automation(&self) -> &Automation {
        &self.automation
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        &self.automation.pipeline().deps().clock
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<TaskState>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the tick loop. Returns `false` if it was already running or the
    /// scheduler is disabled.
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.settings.enabled {
            info!("Scheduler disabled by configuration");
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already running");
            return false;
        }

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(service.settings.tick_secs.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        service.run_due_tasks().await;
                    }
                    _ = service.shutdown.notified() => break,
                }
            }
            debug!("Scheduler loop exited");
        });

        *self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        info!("Scheduler started with {} task(s)", self.lock_tasks().len());
        true
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_one();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Scheduler loop ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }

    /// Runs every enabled task whose next run time has passed. Returns the ids
    /// of the tasks that ran.
    pub async fn run_due_tasks(self: &Arc<Self>) -> Vec<String> {
        let now = self.clock().now();
        let due: Vec<ScheduledTask> = {
            let mut tasks = self.lock_tasks();
            tasks
                .iter_mut()
                .filter(|s| {
                    s.task.enabled && !s.running && s.next_run.is_some_and(|at| at <= now)
                })
                .map(|s| {
                    s.running = true;
                    s.next_run = s.task.schedule.next_after(now, self.offset);
                    s.task.clone()
                })
                .collect()
        };

        let mut ran = Vec::with_capacity(due.len());
        for task in due {
            debug!("Running scheduled task {}", task.id);
            let result = self
                .run_with_timeout(task.action, &Principal::Scheduler, task.timeout)
                .await;
            let finished = self.clock().now();

            let failure = match &result {
                Ok(outcome) if outcome.success => None,
                Ok(outcome) => Some(outcome.message.clone()),
                Err(e) => Some(e.to_string()),
            };

            {
                let mut tasks = self.lock_tasks();
                if let Some(state) = tasks.iter_mut().find(|s| s.task.id == task.id) {
                    state.running = false;
                    state.last_run = Some(finished);
                    state.run_count += 1;
                    if failure.is_some() {
                        state.failure_count += 1;
                    }
                    state.last_error = failure.clone();
                }
            }

            let (status, message) = match &failure {
                None => (LogStatus::Success, format!("Task {} completed", task.id)),
                Some(reason) => (
                    LogStatus::Failure,
                    format!("Task {} failed: {}", task.id, reason),
                ),
            };
            self.record(
                LogType::Scheduler,
                status,
                message,
                json!({ "task": task.id, "action": task.action }),
            )
            .await;
            ran.push(task.id);
        }
        ran
    }

    async fn record(&self, log_type: LogType, status: LogStatus, message: String, metadata: Value) {
        let entry = AutomationLogEntry::new(log_type, status, message, metadata, self.clock().now());
        if let Err(e) = self.automation.pipeline().deps().logs.append_log(&entry).await {
            e.log_warn();
        }
    }

    /// Runs one action with the default task timeout. Failures send an
    /// `automation-failure` notification before being returned.
    pub async fn run_action(
        self: &Arc<Self>,
        action: AutomationAction,
        principal: &Principal,
    ) -> Result<ActionOutcome, CoreError> {
        let timeout = Duration::from_secs(self.settings.task_timeout_secs);
        self.run_with_timeout(action, principal, timeout).await
    }

    async fn run_with_timeout(
        self: &Arc<Self>,
        action: AutomationAction,
        principal: &Principal,
        timeout: Duration,
    ) -> Result<ActionOutcome, CoreError> {
        let result = match tokio::time::timeout(timeout, self.dispatch(action, principal)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                seconds: timeout.as_secs(),
            }),
        };

        if let Err(e) = &result {
            self.reporter.report_error(e);
            self.record(
                LogType::Error,
                LogStatus::Failure,
                format!("Action {} failed", action),
                json!({ "action": action, "error": e.to_string() }),
            )
            .await;
            let data = json!({
                "title": action.as_str(),
                "message": format!("{} ({:?})", action, principal),
                "severity": "error",
                "metadata": { "error": e.user_friendly_message() },
            });
            if let Err(notify_error) = self
                .automation
                .pipeline()
                .deps()
                .notifier
                .notify("automation-failure", &data, None)
                .await
            {
                notify_error.log_warn();
            }
        }
        result
    }

    async fn dispatch(
        self: &Arc<Self>,
        action: AutomationAction,
        principal: &Principal,
    ) -> Result<ActionOutcome, CoreError> {
        match action {
            AutomationAction::SchedulerHealth => Ok(self.scheduler_health().await),
            other => self.automation.execute(other, principal).await,
        }
    }

    /// Restarts a stopped scheduler and raises a system alert about it.
    async fn scheduler_health(self: &Arc<Self>) -> ActionOutcome {
        let was_running = self.is_running();
        let restarted = !was_running && self.start();

        if restarted {
            error!("Scheduler was stopped, restarted it");
            let data = json!({
                "title": "Scheduler restarted",
                "message": "The task scheduler was not running and has been restarted",
                "severity": "warning",
                "metadata": { "service": "scheduler" },
            });
            if let Err(e) = self
                .automation
                .pipeline()
                .deps()
                .notifier
                .notify("system-alert", &data, None)
                .await
            {
                e.log_warn();
            }
        }

        let running = self.is_running();
        ActionOutcome {
            success: running || !self.settings.enabled,
            message: if restarted {
                "Scheduler restarted".to_string()
            } else if running {
                "Scheduler is running".to_string()
            } else {
                "Scheduler is disabled".to_string()
            },
            data: json!({
                "was_running": was_running,
                "restarted": restarted,
                "running": running,
            }),
        }
    }

    pub fn task_status(&self, id: &str) -> Option<TaskStatus> {
        self.lock_tasks()
            .iter()
            .find(|s| s.task.id == id)
            .map(TaskState::status)
    }

    /// Returns `false` for an unknown task id.
    pub fn set_task_enabled(&self, id: &str, enabled: bool) -> bool {
        let now = self.clock().now();
        let mut tasks = self.lock_tasks();
        match tasks.iter_mut().find(|s| s.task.id == id) {
            Some(state) => {
                if enabled && !state.task.enabled {
                    state.next_run = state.task.schedule.next_after(now, self.offset);
                }
                state.task.enabled = enabled;
                info!("Task {} {}", id, if enabled { "enabled" } else { "disabled" });
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            tasks: self.lock_tasks().iter().map(TaskState::status).collect(),
            notifications: self.automation.pipeline().deps().notifier.status(),
        }
    }
}
