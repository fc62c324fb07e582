//! Builds the service graph from configuration.

use background_service::{Authenticator, Automation, BackgroundService, Pipeline, PipelineDeps};
use database::Database;
use llm_interface::{build_generator, TextGenerator};
use notifier::Notifier;
use std::sync::Arc;
use tracing::info;
use trendpost_core::{AppConfig, Clock, ContentCatalog, CoreError, SystemClock};

pub struct App {
    pub database: Arc<Database>,
    pub service: Arc<BackgroundService>,
    pub authenticator: Arc<Authenticator>,
}

impl App {
    /// Connects to the configured database and wires every component.
    pub async fn build(config: &AppConfig) -> Result<Self, CoreError> {
        let database =
            Database::connect(&config.database.url, config.database.max_connections).await?;
        let generator = build_generator(&config.generation)?;
        Self::assemble(config, database, generator, Arc::new(SystemClock)).await
    }

    /// Wires an already-open database. Migrations and category seeding run here.
    pub async fn assemble(
        config: &AppConfig,
        database: Database,
        generator: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        database.run_migrations().await?;
        let catalog = Arc::new(ContentCatalog::with_overrides(&config.categories)?);
        database.ensure_categories(catalog.categories()).await?;
        let database = Arc::new(database);

        let notifier = Notifier::new(config.notifications.clone(), clock.clone())?
            .with_log_store(database.clone())
            .with_utc_offset(config.scheduler.utc_offset_hours);

        let deps = PipelineDeps {
            catalog: catalog.clone(),
            generator,
            content: database.clone(),
            state: database.clone(),
            logs: database.clone(),
            notifier: Arc::new(notifier),
            clock: clock.clone(),
        };
        let pipeline = Pipeline::new(
            deps,
            config.pipeline.clone(),
            &config.generation,
            config.retry.clone(),
        );
        let service = BackgroundService::new(
            Automation::new(Arc::new(pipeline)),
            config.scheduler.clone(),
        )?;
        let authenticator = Authenticator::new(
            config.auth.cron_secret.clone(),
            database.clone(),
            clock,
        );

        info!(
            "Application assembled with {} categories",
            catalog.categories().len()
        );
        Ok(Self {
            database,
            service: Arc::new(service),
            authenticator: Arc::new(authenticator),
        })
    }
}
