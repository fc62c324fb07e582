//! Picks which category, if any, is due for a new post.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, warn};
use trendpost_core::{Category, CategoryStateStore, ErrorExt, ScanOrder};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A category whose interval has elapsed, with the timestamp it was judged against.
#[derive(Debug, Clone, PartialEq)]
pub struct DueCategory {
    pub category: Category,
    pub last_posted_at: Option<DateTime<Utc>>,
}

impl DueCategory {
    /// Elapsed time over interval; `None` when never posted.
    fn overdue_ratio(&self, now: DateTime<Utc>) -> Option<f64> {
        let last = self.last_posted_at?;
        let elapsed_days = (now - last).num_seconds() as f64 / SECONDS_PER_DAY;
        let interval = self.category.posting_interval_days.max(1) as f64;
        Some(elapsed_days / interval)
    }
}

/// Whole days elapsed since `last` meet or exceed `interval_days`.
pub fn is_due(last: Option<DateTime<Utc>>, interval_days: u32, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => (now - last).num_days() >= i64::from(interval_days),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilitySelector {
    order: ScanOrder,
}

impl EligibilitySelector {
    pub fn new(order: ScanOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ScanOrder {
        self.order
    }

    /// Returns the category to post next, or `None` if nothing is due.
    pub async fn select_due(
        &self,
        categories: &[Category],
        store: &dyn CategoryStateStore,
        now: DateTime<Utc>,
    ) -> Option<DueCategory> {
        match self.order {
            ScanOrder::Priority => {
                for category in categories {
                    if let Some(due) = check_category(category, store, now).await {
                        return Some(due);
                    }
                }
                None
            }
            ScanOrder::MostOverdue => self
                .due_categories(categories, store, now)
                .await
                .into_iter()
                .next(),
        }
    }

    /// All due categories in scan order.
    pub async fn due_categories(
        &self,
        categories: &[Category],
        store: &dyn CategoryStateStore,
        now: DateTime<Utc>,
    ) -> Vec<DueCategory> {
        let mut due = Vec::new();
        for category in categories {
            if let Some(entry) = check_category(category, store, now).await {
                due.push(entry);
            }
        }

        if self.order == ScanOrder::MostOverdue {
            // Stable sort keeps catalog order among ties
            due.sort_by(|a, b| match (a.overdue_ratio(now), b.overdue_ratio(now)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            });
        }
        due
    }
}

async fn check_category(
    category: &Category,
    store: &dyn CategoryStateStore,
    now: DateTime<Utc>,
) -> Option<DueCategory> {
    let last = match store.last_posted_at(&category.name).await {
        Ok(last) => last,
        Err(e) => {
            e.log_warn();
            warn!("Skipping category {} after state lookup failure", category.name);
            return None;
        }
    };

    if is_due(last, category.posting_interval_days, now) {
        debug!("Category {} is due (last posted: {:?})", category.name, last);
        Some(DueCategory {
            category: category.clone(),
            last_posted_at: last,
        })
    } else {
        None
    }
}
