//! Response latencies, their order statistics, and the final metric set.

use crate::error::Result;
use crate::github::HostingApi;
use crate::types::TrackedItem;
use crate::window::TimeWindow;
use chrono::Duration;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Serialize, Serializer};
use std::str::FromStr;

const GOOD_FIRST_ISSUE_LABELS: [&str; 2] = ["good-first-issue", "good first issue"];

/// How the middle of an even-length latency sequence is picked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MedianRule {
    /// Mean of the two central elements.
    #[default]
    Conventional,
    /// With `m = n / 2`: the element at `m` when `m` is odd, otherwise the mean of the
    /// elements at `m - 1` and `m`. Kept for parity with earlier reports.
    Legacy,
}

impl FromStr for MedianRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conventional" => Ok(Self::Conventional),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown median rule '{other}'")),
        }
    }
}

/// The final output of a report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    pub community_health: CommunityHealth,
    pub team_efficiency: TeamEfficiency,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityHealth {
    /// RFCs opened by external contributors inside the window.
    pub external_rfcs: usize,
    /// Pull requests opened by external contributors inside the window.
    pub external_prs: usize,
    /// Issues opened by external contributors inside the window. `None` when issues were not collected.
    pub external_issues: Option<usize>,
}

/// Durations serialize as whole seconds; `None` means no item produced a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamEfficiency {
    /// Non-pending reviews by internal contributors on external RFCs and pull requests.
    pub internal_reviews: usize,
    #[serde(serialize_with = "serialize_seconds")]
    pub median_response_rfc_pr: Option<Duration>,
    #[serde(serialize_with = "serialize_seconds")]
    pub median_response_issues: Option<Duration>,
    #[serde(serialize_with = "serialize_seconds")]
    pub average_response: Option<Duration>,
    /// Share of windowed issues carrying a good-first-issue label, in percent.
    pub good_first_issue_percentage: Option<f64>,
}

fn serialize_seconds<S: Serializer>(value: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&d.num_seconds()),
        None => serializer.serialize_none(),
    }
}

/// Time from the creation of `item` to its first comment, or `None` if nobody commented.
///
/// The difference is taken as-is and can be negative if the platform reports a
/// comment older than the item.
pub async fn first_response_latency<A: HostingApi>(api: &A, item: &TrackedItem) -> Result<Option<Duration>> {
    let comment = api.first_comment(item).await?;
    Ok(comment.map(|c| c.created_at - item.created_at))
}

/// Latencies of every commented item, in item order. Uncommented items are skipped.
pub async fn response_latencies<A: HostingApi>(
    api: &A,
    items: &[TrackedItem],
    concurrency: usize,
) -> Result<Vec<Duration>> {
    let latencies: Vec<Option<Duration>> = stream::iter(items)
        .map(|item| first_response_latency(api, item))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(latencies.into_iter().flatten().collect())
}

/// Median of all latencies across `sets`. `None` when there are none.
pub fn median(rule: MedianRule, sets: &[&[Duration]]) -> Option<Duration> {
    let mut elements: Vec<Duration> = sets.iter().flat_map(|set| set.iter().copied()).collect();
    elements.sort();

    let n = elements.len();
    let mid = n / 2;
    match n {
        0 => None,
        1 => Some(elements[0]),
        _ => match rule {
            MedianRule::Conventional if n % 2 == 1 => Some(elements[mid]),
            MedianRule::Legacy if mid % 2 == 1 => Some(elements[mid]),
            _ => Some((elements[mid - 1] + elements[mid]) / 2),
        },
    }
}

/// Sum of `latencies` divided by `presented`, the number of items that were asked
/// for a latency. Items without comments therefore pull the average towards zero.
/// `None` when nothing was presented.
pub fn average(latencies: &[Duration], presented: usize) -> Option<Duration> {
    let divisor = i32::try_from(presented).ok().filter(|&d| d > 0)?;
    let total = latencies
        .iter()
        .fold(Duration::zero(), |acc, latency| acc + *latency);
    Some(total / divisor)
}

pub fn has_good_first_issue_label(item: &TrackedItem) -> bool {
    item.labels
        .iter()
        .any(|label| GOOD_FIRST_ISSUE_LABELS.iter().any(|marker| label.contains(marker)))
}

/// Percentage of `issues` labelled as good first issues. `None` for an empty set.
pub fn good_first_issue_percentage(issues: &[TrackedItem]) -> Option<f64> {
    if issues.is_empty() {
        return None;
    }

    let labelled = issues.iter().filter(|i| has_good_first_issue_label(i)).count();
    Some(labelled as f64 / issues.len() as f64 * 100.0)
}
