//! Storage seams injected into the pipeline.

use crate::types::{
    AutomationLogEntry, ContentAnalytics, ContentRow, NewContentRow, SessionRecord,
};
use crate::PersistError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Inserts a new row, disambiguating the slug once if it is taken.
    async fn insert_content(
        &self,
        row: NewContentRow,
        now: DateTime<Utc>,
    ) -> Result<ContentRow, PersistError>;

    async fn get_content_by_slug(&self, slug: &str) -> Result<Option<ContentRow>, PersistError>;

    async fn count_stale_drafts(&self, older_than: DateTime<Utc>) -> Result<i64, PersistError>;

    async fn content_analytics(
        &self,
        since: DateTime<Utc>,
    ) -> Result<ContentAnalytics, PersistError>;

    async fn ping(&self) -> Result<(), PersistError>;
}

#[async_trait]
pub trait CategoryStateStore: Send + Sync {
    async fn last_posted_at(&self, category: &str) -> Result<Option<DateTime<Utc>>, PersistError>;

    async fn mark_posted(&self, category: &str, at: DateTime<Utc>) -> Result<(), PersistError>;

    /// Moves `last_posted_at` from `expected` to `at` only if nobody else has.
    async fn try_claim(
        &self,
        category: &str,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistError>;
}

#[async_trait]
pub trait AutomationLogStore: Send + Sync {
    async fn append_log(&self, entry: &AutomationLogEntry) -> Result<(), PersistError>;

    async fn recent_logs(&self, limit: i64) -> Result<Vec<AutomationLogEntry>, PersistError>;

    /// Returns the number of entries removed.
    async fn prune_logs(&self, older_than: DateTime<Utc>) -> Result<u64, PersistError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Unknown and expired tokens both yield `None`.
    async fn lookup_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, PersistError>;
}
