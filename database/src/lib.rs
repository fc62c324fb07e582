//! SQLite persistence for generated posts, category posting state, the
//! automation log and admin sessions.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use content_engine::disambiguate;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};
use trendpost_core::{
    AutomationLogEntry, AutomationLogStore, Category, CategoryStateStore, ContentAnalytics,
    ContentRepository, ContentRow, LogStatus, LogType, NewContentRow, PersistError,
    SessionRecord, SessionStore,
};


const CONTENT_COLUMNS: &str = "id, title, slug, content, summary, category, tags, thumbnail_url, \
     is_published, published_at, view_count, is_featured, source_name, seo_title, \
     seo_description, seo_keywords, created_at";

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(|e| PersistError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the connection is never recycled
    /// so the data lives as long as the pool.
    pub async fn connect_in_memory() -> Result<Self, PersistError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| PersistError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), PersistError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Registers catalog categories; existing posting state is kept.
    pub async fn ensure_categories(&self, categories: &[Category]) -> Result<(), PersistError> {
        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO category_state (name, slug, posting_interval_days)
                VALUES (?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    slug = excluded.slug,
                    posting_interval_days = excluded.posting_interval_days
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(i64::from(category.posting_interval_days))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, PersistError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM content_rows WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn list_published(&self, limit: i64) -> Result<Vec<ContentRow>, PersistError> {
        let sql = format!(
            "SELECT {} FROM content_rows WHERE is_published = 1 \
             ORDER BY published_at DESC, created_at DESC LIMIT ?",
            CONTENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(content_from_row).collect()
    }

    /// Returns `false` when no row has the slug.
    pub async fn increment_view_count(&self, slug: &str) -> Result<bool, PersistError> {
        let result = sqlx::query("UPDATE content_rows SET view_count = view_count + 1 WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn create_session(
        &self,
        session: &SessionRecord,
        now: DateTime<Utc>,
    ) -> Result<(), PersistError> {
        sqlx::query(
            r#"
            INSERT INTO admin_sessions (token, user_id, role, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(token) DO UPDATE SET
                user_id = excluded.user_id,
                role = excluded.role,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(&session.role)
        .bind(session.expires_at.map(to_millis))
        .bind(to_millis(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for Database {
    async fn insert_content(
        &self,
        mut row: NewContentRow,
        now: DateTime<Utc>,
    ) -> Result<ContentRow, PersistError> {
        if self.slug_exists(&row.slug).await? {
            let original = row.slug.clone();
            row.slug = disambiguate(&original, now);
            debug!("Slug {} taken, using {}", original, row.slug);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let published_at = row.is_published.then(|| to_millis(now));
        let tags = serde_json::to_string(&row.tags).map_err(corrupt)?;
        let seo_keywords = serde_json::to_string(&row.seo_keywords).map_err(corrupt)?;

        let result = sqlx::query(
            r#"
            INSERT INTO content_rows (
                id, title, slug, content, summary, category, tags, thumbnail_url,
                is_published, published_at, view_count, is_featured, source_name,
                seo_title, seo_description, seo_keywords, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&row.title)
        .bind(&row.slug)
        .bind(&row.content)
        .bind(&row.summary)
        .bind(&row.category)
        .bind(&tags)
        .bind(&row.thumbnail_url)
        .bind(row.is_published)
        .bind(published_at)
        .bind(&row.source_name)
        .bind(&row.seo_title)
        .bind(&row.seo_description)
        .bind(&seo_keywords)
        .bind(to_millis(now))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                warn!("Slug {} still conflicts after disambiguation", row.slug);
                return Err(PersistError::SlugConflict { slug: row.slug });
            }
            Err(e) => return Err(e.into()),
        }

        info!("Saved content {} ({})", row.slug, row.category);
        self.get_content_by_slug(&row.slug)
            .await?
            .ok_or_else(|| PersistError::QueryFailed {
                query: format!("reload of inserted row {}", row.slug),
            })
    }

    async fn get_content_by_slug(&self, slug: &str) -> Result<Option<ContentRow>, PersistError> {
        let sql = format!("SELECT {} FROM content_rows WHERE slug = ?", CONTENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn count_stale_drafts(&self, older_than: DateTime<Utc>) -> Result<i64, PersistError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_rows WHERE is_published = 0 AND created_at < ?",
        )
        .bind(to_millis(older_than))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn content_analytics(
        &self,
        since: DateTime<Utc>,
    ) -> Result<ContentAnalytics, PersistError> {
        let since = to_millis(since);

        let (total, published, total_views): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_published = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(view_count), 0)
            FROM content_rows
            WHERE created_at >= ?
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let by_category: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*) AS posts
            FROM content_rows
            WHERE created_at >= ?
            GROUP BY category
            ORDER BY posts DESC, category ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let (attempts, successes): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0)
            FROM automation_logs
            WHERE log_type IN ('generation', 'publish') AND timestamp >= ?
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let generation_success_rate = if attempts > 0 {
            successes as f64 / attempts as f64 * 100.0
        } else {
            0.0
        };

        Ok(ContentAnalytics {
            total,
            published,
            drafts: total - published,
            total_views,
            by_category,
            generation_success_rate,
        })
    }

    async fn ping(&self) -> Result<(), PersistError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryStateStore for Database {
    async fn last_posted_at(&self, category: &str) -> Result<Option<DateTime<Utc>>, PersistError> {
        let last: Option<Option<i64>> =
            sqlx::query_scalar("SELECT last_posted_at FROM category_state WHERE name = ?")
                .bind(category)
                .fetch_optional(&self.pool)
                .await?;
        last.flatten().map(from_millis).transpose()
    }

    async fn mark_posted(&self, category: &str, at: DateTime<Utc>) -> Result<(), PersistError> {
        sqlx::query(
            r#"
            INSERT INTO category_state (name, last_posted_at) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET last_posted_at = excluded.last_posted_at
            "#,
        )
        .bind(category)
        .bind(to_millis(at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_claim(
        &self,
        category: &str,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistError> {
        sqlx::query("INSERT OR IGNORE INTO category_state (name) VALUES (?)")
            .bind(category)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query(
            "UPDATE category_state SET last_posted_at = ? WHERE name = ? AND last_posted_at IS ?",
        )
        .bind(to_millis(at))
        .bind(category)
        .bind(expected.map(to_millis))
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        if !claimed {
            debug!("Category {} was claimed by another run", category);
        }
        Ok(claimed)
    }
}

#[async_trait]
impl AutomationLogStore for Database {
    async fn append_log(&self, entry: &AutomationLogEntry) -> Result<(), PersistError> {
        let metadata = serde_json::to_string(&entry.metadata).map_err(corrupt)?;
        sqlx::query(
            r#"
            INSERT INTO automation_logs (log_type, status, message, metadata, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.log_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .bind(&metadata)
        .bind(to_millis(entry.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_logs(&self, limit: i64) -> Result<Vec<AutomationLogEntry>, PersistError> {
        let rows = sqlx::query(
            r#"
            SELECT log_type, status, message, metadata, timestamp
            FROM automation_logs
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }

    async fn prune_logs(&self, older_than: DateTime<Utc>) -> Result<u64, PersistError> {
        let deleted = sqlx::query("DELETE FROM automation_logs WHERE timestamp < ?")
            .bind(to_millis(older_than))
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!("Pruned {} automation log entries", deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn lookup_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, PersistError> {
        let row = sqlx::query(
            r#"
            SELECT token, user_id, role, expires_at
            FROM admin_sessions
            WHERE token = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(token)
        .bind(to_millis(now))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: Option<i64> = row.try_get("expires_at")?;
        Ok(Some(SessionRecord {
            token: row.try_get("token")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            expires_at: expires_at.map(from_millis).transpose()?,
        }))
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, PersistError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| PersistError::CorruptRow {
            details: format!("timestamp out of range: {}", millis),
        })
}

fn corrupt(e: serde_json::Error) -> PersistError {
    PersistError::CorruptRow {
        details: e.to_string(),
    }
}

fn string_list(row: &SqliteRow, column: &str) -> Result<Vec<String>, PersistError> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(corrupt)
}

fn content_from_row(row: &SqliteRow) -> Result<ContentRow, PersistError> {
    let published_at: Option<i64> = row.try_get("published_at")?;
    let created_at: i64 = row.try_get("created_at")?;
    Ok(ContentRow {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        content: row.try_get("content")?,
        summary: row.try_get("summary")?,
        category: row.try_get("category")?,
        tags: string_list(row, "tags")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        is_published: row.try_get("is_published")?,
        published_at: published_at.map(from_millis).transpose()?,
        view_count: row.try_get("view_count")?,
        is_featured: row.try_get("is_featured")?,
        source_name: row.try_get("source_name")?,
        seo_title: row.try_get("seo_title")?,
        seo_description: row.try_get("seo_description")?,
        seo_keywords: string_list(row, "seo_keywords")?,
        created_at: from_millis(created_at)?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<AutomationLogEntry, PersistError> {
    let log_type: String = row.try_get("log_type")?;
    let status: String = row.try_get("status")?;
    let metadata: String = row.try_get("metadata")?;
    let timestamp: i64 = row.try_get("timestamp")?;

    Ok(AutomationLogEntry {
        log_type: LogType::parse(&log_type).ok_or_else(|| PersistError::CorruptRow {
            details: format!("unknown log type: {}", log_type),
        })?,
        status: LogStatus::parse(&status).ok_or_else(|| PersistError::CorruptRow {
            details: format!("unknown log status: {}", status),
        })?,
        message: row.try_get("message")?,
        metadata: serde_json::from_str::<Value>(&metadata).map_err(corrupt)?,
        timestamp: from_millis(timestamp)?,
    })
}
