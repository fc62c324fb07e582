pub mod actions;
pub mod auth;
pub mod pipeline;
pub mod scheduler;

pub use actions::{ActionOutcome, Automation, AutomationAction, HealthStatus};
pub use auth::{Authenticator, Credentials, Principal};
pub use pipeline::{
    BatchReport, BatchRequest, ItemError, Pipeline, PipelineDeps, RunStage, SavedPost,
    ScheduledPostOutcome, MAX_BATCH_COUNT,
};
pub use scheduler::{BackgroundService, Schedule, ScheduledTask, SchedulerStatus, TaskStatus};
