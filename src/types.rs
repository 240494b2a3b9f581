use crate::config::RepoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which listing an item came from. Determines the comment endpoint used for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    PullRequest,
    Issue,
}

/// A pull request, RFC, or issue as collected from the hosting platform.
///
/// Items are never edited after collection; later stages only drop them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub kind: ItemKind,
    pub repo: RepoId,
    pub number: u64,
    /// Login of the account that opened the item.
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Label names. Only populated for issues.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl fmt::Display for TrackedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Author of a review or comment. Deleted accounts come back as `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub login: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub user: Option<Account>,
    /// APPROVED, CHANGES_REQUESTED, COMMENTED, DISMISSED or PENDING.
    pub state: String,
}

impl Review {
    pub fn is_pending(&self) -> bool {
        self.state.eq_ignore_ascii_case("PENDING")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user: Option<Account>,
    pub created_at: DateTime<Utc>,
}
