use crate::types::TrackedItem;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The reporting period.
///
/// Both bounds are exclusive. Without an upper bound the window runs up to the moment
/// of collection. `from <= to` is the caller's responsibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to: Some(to) }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self { from, to: None }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.from && self.to.map_or(true, |to| at < to)
    }

    pub fn includes(&self, item: &TrackedItem) -> bool {
        self.contains(item.created_at)
    }

    /// Keeps the items created strictly inside the window, preserving order.
    pub fn retain(&self, items: Vec<TrackedItem>) -> Vec<TrackedItem> {
        items.into_iter().filter(|item| self.includes(item)).collect()
    }
}
