//! The content pipeline: pick a category, generate, parse, persist, notify.

use crate::auth::Principal;
use content_engine::{
    build_prompt, fallback_content, parse_or_fallback, sample_keywords, slugify, DocumentOptions,
    DueCategory, EligibilitySelector,
};
use llm_interface::TextGenerator;
use notifier::Notifier;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trendpost_core::{
    AutomationLogEntry, AutomationLogStore, CategoryStateStore, Clock, ContentCatalog,
    ContentOrigin, ContentRepository, ContentRow, CoreError, ErrorExt, ErrorRecovery,
    GeneratedContent, GenerationError, GenerationSettings, LogStatus, LogType, NewContentRow,
    PipelineSettings, RecoveryResult, RecoveryStrategy, RetrySettings,
};

/// Stages of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    AuthCheck,
    SelectCategory,
    Generate,
    Parse,
    Persist,
    Notify,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::AuthCheck => "AUTH_CHECK",
            RunStage::SelectCategory => "SELECT_CATEGORY",
            RunStage::Generate => "GENERATE",
            RunStage::Parse => "PARSE",
            RunStage::Persist => "PERSIST",
            RunStage::Notify => "NOTIFY",
            RunStage::Done => "DONE",
            RunStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

struct Run {
    id: String,
    stage: RunStage,
}

impl Run {
    fn start(principal: &Principal) -> Self {
        let run = Self {
            id: uuid::Uuid::new_v4().to_string(),
            stage: RunStage::AuthCheck,
        };
        debug!("[run {}] {} passed as {:?}", run.id, run.stage, principal);
        run
    }

    fn advance(&mut self, next: RunStage) {
        debug!("[run {}] {} -> {}", self.id, self.stage, next);
        self.stage = next;
    }
}

/// Injected collaborators.
#[derive(Clone)]
pub struct PipelineDeps {
    pub catalog: Arc<ContentCatalog>,
    pub generator: Arc<dyn TextGenerator>,
    pub content: Arc<dyn ContentRepository>,
    pub state: Arc<dyn CategoryStateStore>,
    pub logs: Arc<dyn AutomationLogStore>,
    pub notifier: Arc<Notifier>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduledPostOutcome {
    NothingDue,
    /// Another run claimed the category first.
    Claimed { category: String },
    Posted {
        category: String,
        slug: String,
        title: String,
        origin: ContentOrigin,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchRequest {
    pub count: Option<usize>,
    pub auto_publish: Option<bool>,
    pub check_eligibility: bool,
    pub category: Option<String>,
    pub specific_topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    pub generated: usize,
    pub saved: usize,
    pub failed: usize,
    pub posts: Vec<SavedPost>,
    pub errors: Vec<ItemError>,
    pub status: String,
}

/// Upper bound on items generated by one batch or preview request.
pub const MAX_BATCH_COUNT: usize = 10;

fn publish_status(published: bool) -> &'static str {
    if published {
        "published"
    } else {
        "draft"
    }
}

pub struct Pipeline {
    deps: PipelineDeps,
    settings: PipelineSettings,
    retry: RetrySettings,
    item_delay: Duration,
    selector: EligibilitySelector,
    options: DocumentOptions,
    rng: Mutex<fastrand::Rng>,
}

impl Pipeline {
    pub fn new(
        deps: PipelineDeps,
        settings: PipelineSettings,
        generation: &GenerationSettings,
        retry: RetrySettings,
    ) -> Self {
        let options = DocumentOptions {
            thumbnail_width: settings.thumbnail_width,
            thumbnail_height: settings.thumbnail_height,
            ..DocumentOptions::default()
        };
        Self {
            selector: EligibilitySelector::new(settings.scan_order),
            deps,
            settings,
            retry,
            item_delay: Duration::from_millis(generation.item_delay_ms),
            options,
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Fixes the keyword sampling sequence.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
            ..self
        }
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn sample(&self, pool: &[String], specific_topic: Option<&str>) -> Vec<String> {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sample_keywords(pool, self.settings.keywords_per_post, specific_topic, &mut rng)
    }

    fn pick_trend_category(&self) -> String {
        let categories = self.deps.catalog.trend_categories();
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if categories.is_empty() {
            return "AI 트렌드".to_string();
        }
        categories[rng.usize(..categories.len())].clone()
    }

    /// Keyword pool for a category; categories outside the catalog draw from
    /// the general trend topics.
    fn pool_for(&self, category: &str) -> &[String] {
        let pool = self.deps.catalog.keyword_pool(category);
        if pool.is_empty() {
            self.deps.catalog.trend_keywords()
        } else {
            pool
        }
    }

    /// Calls the model with configured retries. Only the raw text is returned.
    async fn generate_recovering(&self, prompt: &str) -> RecoveryResult<String> {
        let generator = Arc::clone(&self.deps.generator);
        let prompt = prompt.to_string();
        ErrorRecovery::apply_strategy(ErrorRecovery::retry_from_settings(&self.retry), || {
            let generator = Arc::clone(&generator);
            let prompt = prompt.clone();
            async move { generator.generate(&prompt).await }
        })
        .await
    }

    async fn generate_raw(&self, prompt: &str) -> Result<String, CoreError> {
        self.generate_recovering(prompt).await.into_result()
    }

    fn ensure_generator(&self) -> Result<(), CoreError> {
        if self.deps.generator.is_configured() {
            Ok(())
        } else {
            Err(GenerationError::MissingApiKey {
                provider: self.deps.generator.provider_name().to_string(),
            }
            .into())
        }
    }

    async fn record(
        &self,
        log_type: LogType,
        status: LogStatus,
        message: String,
        metadata: serde_json::Value,
    ) {
        let entry =
            AutomationLogEntry::new(log_type, status, message, metadata, self.deps.clock.now());
        if let Err(e) = self.deps.logs.append_log(&entry).await {
            e.log_warn();
        }
    }

    async fn persist(
        &self,
        content: &GeneratedContent,
        publish: bool,
    ) -> Result<ContentRow, CoreError> {
        let row = NewContentRow::from_generated(
            content,
            slugify(&content.title),
            publish,
            &self.settings.source_name,
        );
        let now = self.deps.clock.now();
        let error = match self.deps.content.insert_content(row.clone(), now).await {
            Ok(saved) => return Ok(saved),
            Err(e) => CoreError::from(e),
        };

        // A locked database is retried; everything else fails the item
        match ErrorRecovery::determine_strategy(&error) {
            strategy @ RecoveryStrategy::RetryWithBackoff { .. } => {
                error.log_warn();
                let content_store = Arc::clone(&self.deps.content);
                ErrorRecovery::apply_strategy(strategy, || {
                    let content_store = Arc::clone(&content_store);
                    let row = row.clone();
                    async move {
                        content_store
                            .insert_content(row, now)
                            .await
                            .map_err(CoreError::from)
                    }
                })
                .await
                .into_result()
            }
            _ => Err(error),
        }
    }

    /// One post for the first due category. Generation failures degrade to the
    /// placeholder document; persistence failures fail the run.
    pub async fn run_scheduled_post(
        &self,
        principal: &Principal,
    ) -> Result<ScheduledPostOutcome, CoreError> {
        let mut run = Run::start(principal);
        match self.scheduled_post_stages(&mut run).await {
            Ok(outcome) => {
                run.advance(RunStage::Done);
                Ok(outcome)
            }
            Err(e) => {
                let failed_at = run.stage;
                error!("[run {}] failed during {}: {}", run.id, failed_at, e);
                run.advance(RunStage::Failed);
                self.record(
                    LogType::Error,
                    LogStatus::Failure,
                    format!("Scheduled post failed during {}", failed_at),
                    json!({ "run_id": run.id, "error": e.to_string() }),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn scheduled_post_stages(&self, run: &mut Run) -> Result<ScheduledPostOutcome, CoreError> {
        run.advance(RunStage::SelectCategory);
        let now = self.deps.clock.now();
        let Some(DueCategory {
            category,
            last_posted_at,
        }) = self
            .selector
            .select_due(self.deps.catalog.categories(), self.deps.state.as_ref(), now)
            .await
        else {
            info!("No category is due for a post");
            return Ok(ScheduledPostOutcome::NothingDue);
        };

        if self.settings.claim_before_generate
            && !self
                .deps
                .state
                .try_claim(&category.name, last_posted_at, now)
                .await?
        {
            info!("Category {} was claimed by a concurrent run", category.name);
            return Ok(ScheduledPostOutcome::Claimed {
                category: category.name,
            });
        }

        run.advance(RunStage::Generate);
        let keywords = self.sample(self.pool_for(&category.name), None);
        let prompt = build_prompt(&category.name, &keywords)?;
        let today = now.date_naive();

        let generated = self.generate_recovering(&prompt).await;

        run.advance(RunStage::Parse);
        let content = generated
            .map(|raw| {
                parse_or_fallback(
                    &raw,
                    &category.name,
                    &keywords,
                    &self.deps.catalog,
                    &self.options,
                    today,
                )
            })
            .or_fallback(|e| {
                e.log_warn();
                fallback_content(
                    &category.name,
                    &keywords,
                    &self.deps.catalog,
                    &self.options,
                    today,
                )
            });
        if content.is_degraded() {
            warn!("Generation for {} failed, using fallback document", category.name);
        }
        let content = content.into_result()?;

        run.advance(RunStage::Persist);
        let saved = self.persist(&content, self.settings.auto_publish).await?;
        if let Err(e) = self.deps.state.mark_posted(&category.name, now).await {
            e.log_warn();
            warn!("[run {}] {} saved but not marked as posted", run.id, saved.slug);
        }
        self.record(
            LogType::Publish,
            LogStatus::Success,
            format!("Published {}", saved.slug),
            json!({
                "run_id": run.id,
                "category": category.name,
                "slug": saved.slug,
                "origin": content.origin,
            }),
        )
        .await;

        run.advance(RunStage::Notify);
        let data = json!({
            "title": saved.title,
            "message": saved.summary,
            "severity": "success",
            "metadata": {
                "url": format!("/ai-trends/{}", saved.slug),
                "category": category.name,
            },
        });
        if let Err(e) = self.deps.notifier.notify("content-published", &data, None).await {
            e.log_warn();
        }

        Ok(ScheduledPostOutcome::Posted {
            category: category.name,
            slug: saved.slug,
            title: saved.title,
            origin: content.origin,
        })
    }

    /// Generates and saves several posts. Item failures are recorded and the
    /// batch continues; missing credentials abort before any item.
    pub async fn run_batch(
        &self,
        principal: &Principal,
        request: &BatchRequest,
    ) -> Result<BatchReport, CoreError> {
        let count = request.count.unwrap_or(self.settings.batch_size);
        if count == 0 || count > MAX_BATCH_COUNT {
            return Err(CoreError::InvalidInput {
                message: format!("count must be between 1 and {}", MAX_BATCH_COUNT),
            });
        }

        let run = Run::start(principal);
        self.ensure_generator()?;

        let publish = request.auto_publish.unwrap_or(self.settings.auto_publish);
        let status = publish_status(publish).to_string();

        let categories: Vec<String> = if request.check_eligibility {
            let due = self
                .selector
                .due_categories(
                    self.deps.catalog.categories(),
                    self.deps.state.as_ref(),
                    self.deps.clock.now(),
                )
                .await;
            if due.is_empty() {
                info!("[run {}] no categories eligible", run.id);
                return Ok(BatchReport {
                    success: true,
                    message: "No categories eligible for posting today".to_string(),
                    generated: 0,
                    saved: 0,
                    failed: 0,
                    posts: Vec::new(),
                    errors: Vec::new(),
                    status,
                });
            }
            due.into_iter()
                .take(count)
                .map(|d| d.category.name)
                .collect()
        } else {
            (0..count)
                .map(|_| match &request.category {
                    Some(category) => category.clone(),
                    None => self.pick_trend_category(),
                })
                .collect()
        };

        info!(
            "[run {}] batch of {} item(s), publish={}",
            run.id,
            categories.len(),
            publish
        );

        let mut generated = 0;
        let mut posts = Vec::new();
        let mut errors = Vec::new();

        for (index, category) in categories.iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            let keywords = self.sample(self.pool_for(category), request.specific_topic.as_deref());
            let label = keywords.first().cloned().unwrap_or_else(|| category.clone());

            let content = match self.generate_item(category, &keywords).await {
                Ok(content) => content,
                Err(e) => {
                    e.log_warn();
                    errors.push(ItemError {
                        title: label,
                        error: e.user_friendly_message(),
                    });
                    self.record(
                        LogType::Generation,
                        LogStatus::Failure,
                        format!("Generation failed for {}", category),
                        json!({ "run_id": run.id, "error": e.to_string() }),
                    )
                    .await;
                    continue;
                }
            };
            generated += 1;

            match self.persist(&content, publish).await {
                Ok(row) => {
                    if self.deps.catalog.category(category).is_some() {
                        if let Err(e) = self.deps.state.mark_posted(category, self.deps.clock.now()).await {
                            e.log_warn();
                        }
                    }
                    self.record(
                        LogType::Publish,
                        LogStatus::Success,
                        format!("Saved {}", row.slug),
                        json!({ "run_id": run.id, "slug": row.slug, "origin": content.origin }),
                    )
                    .await;
                    posts.push(SavedPost {
                        id: row.id,
                        title: row.title,
                        slug: row.slug,
                        status: publish_status(row.is_published).to_string(),
                    });
                }
                Err(e) => {
                    e.log_error();
                    errors.push(ItemError {
                        title: content.title.clone(),
                        error: e.to_string(),
                    });
                    self.record(
                        LogType::Publish,
                        LogStatus::Failure,
                        format!("Saving '{}' failed", content.title),
                        json!({ "run_id": run.id, "error": e.to_string() }),
                    )
                    .await;
                }
            }
        }

        let saved = posts.len();
        Ok(BatchReport {
            success: saved > 0,
            message: format!("Successfully posted {} of {} articles", saved, categories.len()),
            generated,
            saved,
            failed: errors.len(),
            posts,
            errors,
            status,
        })
    }

    /// Prompt, model call and parse for one batch item. A model failure is an
    /// item failure; unusable output becomes the placeholder document.
    async fn generate_item(
        &self,
        category: &str,
        keywords: &[String],
    ) -> Result<GeneratedContent, CoreError> {
        let prompt = build_prompt(category, keywords)?;
        let raw = self.generate_raw(&prompt).await?;
        let today = self.deps.clock.now().date_naive();
        Ok(parse_or_fallback(
            &raw,
            category,
            keywords,
            &self.deps.catalog,
            &self.options,
            today,
        ))
    }

    /// Generates documents without saving them. Failed items are left out.
    pub async fn generate_preview(
        &self,
        principal: &Principal,
        count: usize,
    ) -> Result<Vec<GeneratedContent>, CoreError> {
        let run = Run::start(principal);
        self.ensure_generator()?;

        let count = count.min(MAX_BATCH_COUNT);
        let mut contents = Vec::with_capacity(count);
        for index in 0..count {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            let category = self.pick_trend_category();
            let keywords = self.sample(self.deps.catalog.trend_keywords(), None);
            match self.generate_item(&category, &keywords).await {
                Ok(content) => contents.push(content),
                Err(e) => {
                    e.log_warn();
                    warn!("[run {}] preview item {} failed", run.id, index + 1);
                }
            }
        }
        info!(
            "[run {}] generated {} of {} preview(s)",
            run.id,
            contents.len(),
            count
        );
        Ok(contents)
    }
}
