use async_trait::async_trait;
use background_service::{
    Automation, AutomationAction, BackgroundService, BatchRequest, Pipeline, PipelineDeps,
    Principal, ScheduledPostOutcome,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use database::Database;
use llm_interface::TextGenerator;
use notifier::{ChannelSender, NotificationMessage, Notifier};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trendpost_core::{
    AutomationLogStore, CategoryStateStore, ChannelConfig, Clock, ChannelKind, ChannelSettings,
    ContentCatalog, ContentOrigin, ContentRepository, CoreError, GenerationError,
    GenerationSettings, LogStatus, LogType, ManualClock, NotificationError, NotificationSettings,
    PersistError, PipelineSettings, RetrySettings, SchedulerSettings,
};

struct ScriptedGenerator {
    configured: bool,
    replies: Mutex<VecDeque<Result<String, CoreError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(replies: Vec<Result<String, CoreError>>) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(model_document("Default Title")))
    }
}

struct CountingSender {
    calls: AtomicUsize,
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl ChannelSender for CountingSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn is_configured(&self, _settings: &ChannelSettings) -> bool {
        true
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        _settings: &ChannelSettings,
    ) -> Result<Value, NotificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.titles.lock().unwrap().push(message.title.clone());
        Ok(json!({ "ok": true }))
    }
}

fn model_document(title: &str) -> String {
    json!({
        "title": title,
        "summary": "요약입니다",
        "sections": [
            { "heading": "소개", "content": "<p>본문</p>", "needs_image": true, "image_keyword": "intro" },
            { "heading": "설치", "content": "<p>설치 방법</p>" }
        ],
        "tags": ["MCP", "GitHub"],
        "seo": { "meta_description": "설명", "keywords": ["MCP"] }
    })
    .to_string()
}

fn upstream_error(status: u16) -> CoreError {
    GenerationError::UpstreamStatus {
        provider: "scripted".to_string(),
        status,
        body: "bad request".to_string(),
    }
    .into()
}

struct Harness {
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    catalog: Arc<ContentCatalog>,
    sender: Arc<CountingSender>,
    pipeline: Arc<Pipeline>,
}

async fn harness(generator: Arc<ScriptedGenerator>, settings: PipelineSettings) -> Harness {
    let db = Database::connect_in_memory().await.unwrap();
    db.run_migrations().await.unwrap();
    let db = Arc::new(db);
    let catalog = Arc::new(ContentCatalog::builtin());
    db.ensure_categories(catalog.categories()).await.unwrap();

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()));
    let sender = Arc::new(CountingSender {
        calls: AtomicUsize::new(0),
        titles: Mutex::new(Vec::new()),
    });
    let notifications = NotificationSettings {
        channels: vec![ChannelConfig {
            kind: ChannelKind::Webhook,
            config: ChannelSettings::default(),
            enabled: true,
        }],
        ..Default::default()
    };
    let senders: Vec<Arc<dyn ChannelSender>> = vec![sender.clone()];
    let notifier = Arc::new(Notifier::with_senders(notifications, clock.clone(), senders));

    let deps = PipelineDeps {
        catalog: catalog.clone(),
        generator,
        content: db.clone(),
        state: db.clone(),
        logs: db.clone(),
        notifier,
        clock: clock.clone(),
    };
    let generation = GenerationSettings {
        item_delay_ms: 0,
        ..Default::default()
    };
    let retry = RetrySettings {
        max_attempts: 1,
        base_delay_ms: 0,
        max_delay_ms: 0,
    };
    let pipeline = Arc::new(Pipeline::new(deps, settings, &generation, retry).with_seed(7));

    Harness {
        db,
        clock,
        catalog,
        sender,
        pipeline,
    }
}

async fn mark_all_posted(h: &Harness, except: Option<&str>) {
    for category in h.catalog.categories() {
        if Some(category.name.as_str()) != except {
            h.db.mark_posted(&category.name, h.clock.now()).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_scheduled_post_publishes_first_due_category() {
    let generator = ScriptedGenerator::new(vec![Ok(model_document("GitHub MCP 가이드"))]);
    let h = harness(generator, PipelineSettings::default()).await;

    let outcome = h.pipeline.run_scheduled_post(&Principal::CronSecret).await.unwrap();
    let first = &h.catalog.categories()[0].name;
    let (category, slug, origin) = match outcome {
        ScheduledPostOutcome::Posted {
            category,
            slug,
            origin,
            ..
        } => (category, slug, origin),
        other => panic!("expected a post, got {other:?}"),
    };
    assert_eq!(&category, first);
    assert_eq!(origin, ContentOrigin::Model);
    assert_eq!(slug, "github-mcp");

    let row = h.db.get_content_by_slug(&slug).await.unwrap().unwrap();
    assert!(row.is_published);
    assert_eq!(row.category, *first);
    assert_eq!(h.db.last_posted_at(first).await.unwrap(), Some(h.clock.now()));

    let logs = h.db.recent_logs(10).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.log_type == LogType::Publish && l.status == LogStatus::Success));
    assert_eq!(h.sender.calls.load(Ordering::SeqCst), 1);
    assert!(h.sender.titles.lock().unwrap()[0].starts_with("📝 콘텐츠 게시"));
}

#[tokio::test]
async fn test_scheduled_post_with_nothing_due() {
    let generator = ScriptedGenerator::new(Vec::new());
    let h = harness(generator.clone(), PipelineSettings::default()).await;
    mark_all_posted(&h, None).await;

    let outcome = h.pipeline.run_scheduled_post(&Principal::Scheduler).await.unwrap();
    assert!(matches!(outcome, ScheduledPostOutcome::NothingDue));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generation_failure_publishes_fallback() {
    let generator = ScriptedGenerator::new(vec![Err(upstream_error(400))]);
    let h = harness(generator, PipelineSettings::default()).await;

    let outcome = h.pipeline.run_scheduled_post(&Principal::CronSecret).await.unwrap();
    match outcome {
        ScheduledPostOutcome::Posted { title, origin, .. } => {
            assert_eq!(origin, ContentOrigin::Fallback);
            assert!(title.starts_with("📚 "));
        }
        other => panic!("expected a post, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_output_publishes_fallback() {
    let generator = ScriptedGenerator::new(vec![Ok("죄송합니다, 생성할 수 없습니다.".to_string())]);
    let h = harness(generator, PipelineSettings::default()).await;

    let outcome = h.pipeline.run_scheduled_post(&Principal::CronSecret).await.unwrap();
    assert!(matches!(
        outcome,
        ScheduledPostOutcome::Posted {
            origin: ContentOrigin::Fallback,
            ..
        }
    ));
}

/// Reads through to the database but refuses to record posts.
struct UnmarkableState {
    inner: Arc<Database>,
}

#[async_trait]
impl CategoryStateStore for UnmarkableState {
    async fn last_posted_at(&self, category: &str) -> Result<Option<DateTime<Utc>>, PersistError> {
        self.inner.last_posted_at(category).await
    }

    async fn mark_posted(&self, _category: &str, _at: DateTime<Utc>) -> Result<(), PersistError> {
        Err(PersistError::QueryFailed {
            query: "UPDATE category_state".to_string(),
        })
    }

    async fn try_claim(
        &self,
        category: &str,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistError> {
        self.inner.try_claim(category, expected, at).await
    }
}

#[tokio::test]
async fn test_scheduled_post_survives_state_write_failure() {
    let generator = ScriptedGenerator::new(vec![Ok(model_document("GitHub MCP 가이드"))]);
    let h = harness(generator, PipelineSettings::default()).await;

    let mut deps = h.pipeline.deps().clone();
    deps.state = Arc::new(UnmarkableState { inner: h.db.clone() });
    let generation = GenerationSettings {
        item_delay_ms: 0,
        ..Default::default()
    };
    let retry = RetrySettings {
        max_attempts: 1,
        base_delay_ms: 0,
        max_delay_ms: 0,
    };
    let pipeline = Pipeline::new(deps, PipelineSettings::default(), &generation, retry);

    let outcome = pipeline.run_scheduled_post(&Principal::Scheduler).await.unwrap();
    let slug = match outcome {
        ScheduledPostOutcome::Posted { slug, .. } => slug,
        other => panic!("expected a post, got {other:?}"),
    };
    assert!(h.db.get_content_by_slug(&slug).await.unwrap().is_some());

    let logs = h.db.recent_logs(10).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.log_type == LogType::Publish && l.status == LogStatus::Success));
    assert!(!logs.iter().any(|l| l.log_type == LogType::Error));
    assert_eq!(h.sender.titles.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_rejects_out_of_range_count() {
    let generator = ScriptedGenerator::new(Vec::new());
    let h = harness(generator.clone(), PipelineSettings::default()).await;

    for count in [0, 11, usize::MAX] {
        let request = BatchRequest {
            count: Some(count),
            ..Default::default()
        };
        let result = h.pipeline.run_batch(&Principal::CronSecret, &request).await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_continues_after_item_failure() {
    let generator = ScriptedGenerator::new(vec![
        Ok(model_document("Filesystem MCP")),
        Err(upstream_error(400)),
        Ok(model_document("Slack MCP")),
    ]);
    let h = harness(generator, PipelineSettings::default()).await;

    let request = BatchRequest {
        count: Some(3),
        auto_publish: Some(false),
        category: Some("MCP 추천".to_string()),
        ..Default::default()
    };
    let report = h.pipeline.run_batch(&Principal::CronSecret, &request).await.unwrap();

    assert!(report.success);
    assert_eq!(report.generated, 2);
    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.status, "draft");
    assert_eq!(report.errors.len(), 1);
    let slugs: Vec<_> = report.posts.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["filesystem-mcp", "slack-mcp"]);
    assert!(report.posts.iter().all(|p| p.status == "draft"));

    let logs = h.db.recent_logs(20).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.log_type == LogType::Generation && l.status == LogStatus::Failure));
}

#[tokio::test]
async fn test_batch_aborts_without_credentials() {
    let h = harness(ScriptedGenerator::unconfigured(), PipelineSettings::default()).await;
    let err = h
        .pipeline
        .run_batch(&Principal::CronSecret, &BatchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Generation(GenerationError::MissingApiKey { .. })
    ));
}

#[tokio::test]
async fn test_batch_with_eligibility_posts_one_per_due_category() {
    let generator = ScriptedGenerator::new(Vec::new());
    let h = harness(generator.clone(), PipelineSettings::default()).await;
    let open = h.catalog.categories()[2].name.clone();
    mark_all_posted(&h, Some(&open)).await;

    let request = BatchRequest {
        count: Some(5),
        check_eligibility: true,
        ..Default::default()
    };
    let report = h.pipeline.run_batch(&Principal::CronSecret, &request).await.unwrap();
    assert_eq!(report.saved, 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert!(h.db.last_posted_at(&open).await.unwrap().is_some());

    let again = h.pipeline.run_batch(&Principal::CronSecret, &request).await.unwrap();
    assert!(again.success);
    assert_eq!(again.saved, 0);
    assert_eq!(again.message, "No categories eligible for posting today");
}

#[tokio::test]
async fn test_preview_does_not_persist() {
    let generator = ScriptedGenerator::new(vec![Ok(model_document("Preview One"))]);
    let h = harness(generator, PipelineSettings::default()).await;

    let contents = h
        .pipeline
        .generate_preview(&Principal::CronSecret, 2)
        .await
        .unwrap();
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0].title, "Preview One");
    assert!(h.db.get_content_by_slug("preview-one").await.unwrap().is_none());
}

fn service(h: &Harness) -> Arc<BackgroundService> {
    let settings = SchedulerSettings {
        tick_secs: 3600,
        ..Default::default()
    };
    Arc::new(BackgroundService::new(Automation::new(h.pipeline.clone()), settings).unwrap())
}

#[tokio::test]
async fn test_scheduler_runs_due_tasks() {
    let h = harness(ScriptedGenerator::new(Vec::new()), PipelineSettings::default()).await;
    let service = service(&h);

    assert!(service.run_due_tasks().await.is_empty());

    h.clock.advance(Duration::hours(1));
    let ran = service.run_due_tasks().await;
    assert!(ran.contains(&"scheduled-content-publish".to_string()));
    assert!(ran.contains(&"system-health-check".to_string()));
    assert!(!ran.contains(&"ai-content-generation".to_string()));

    let status = service.task_status("scheduled-content-publish").unwrap();
    assert_eq!(status.run_count, 1);
    assert_eq!(status.failure_count, 0);
    assert!(status.next_run.unwrap() > h.clock.now());

    assert!(service.set_task_enabled("system-health-check", false));
    assert!(!service.set_task_enabled("no-such-task", true));
    h.clock.advance(Duration::hours(1));
    let ran = service.run_due_tasks().await;
    assert!(!ran.contains(&"system-health-check".to_string()));
}

#[tokio::test]
async fn test_health_check_reports_degraded_without_generator() {
    let h = harness(ScriptedGenerator::unconfigured(), PipelineSettings::default()).await;
    let service = service(&h);

    let outcome = service
        .run_action(AutomationAction::HealthCheck, &Principal::CronSecret)
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.data["status"], "degraded");
    assert!(h.sender.titles.lock().unwrap()[0].starts_with("💊 헬스체크"));
}

#[tokio::test]
async fn test_cleanup_prunes_logs_and_keeps_content() {
    let generator = ScriptedGenerator::new(Vec::new());
    let h = harness(generator, PipelineSettings::default()).await;
    let service = service(&h);

    h.pipeline.run_scheduled_post(&Principal::CronSecret).await.unwrap();
    h.clock.advance(Duration::days(31));

    let outcome = service
        .run_action(AutomationAction::DatabaseCleanup, &Principal::CronSecret)
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.data["pruned_logs"].as_u64().unwrap() >= 1);
    assert!(h.db.get_content_by_slug("default-title").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_action_sends_failure_notification() {
    let h = harness(ScriptedGenerator::new(Vec::new()), PipelineSettings::default()).await;
    let service = service(&h);
    h.db.pool().close().await;

    let result = service
        .run_action(AutomationAction::DatabaseCleanup, &Principal::CronSecret)
        .await;
    tokio_test::assert_err!(result);
    let titles = h.sender.titles.lock().unwrap();
    assert_eq!(titles.len(), 1);
    assert!(titles[0].starts_with("❌ 자동화 실패"));
}

#[tokio::test]
async fn test_scheduler_health_restarts_stopped_scheduler() {
    let h = harness(ScriptedGenerator::new(Vec::new()), PipelineSettings::default()).await;
    let service = service(&h);
    assert!(!service.is_running());

    let outcome = service
        .run_action(AutomationAction::SchedulerHealth, &Principal::CronSecret)
        .await
        .unwrap();
    assert_eq!(outcome.data["restarted"], true);
    assert!(service.is_running());
    assert!(h
        .sender
        .titles
        .lock()
        .unwrap()
        .iter()
        .any(|t| t.starts_with("🚨 시스템 알림")));

    service.stop().await;
    assert!(!service.is_running());
}
