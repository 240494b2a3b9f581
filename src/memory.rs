//! An in-memory `HostingApi`.
//!
//! Serves canned pull requests, issues, organizations, reviews and comments, paging
//! listings exactly like the platform does, and records how often each endpoint was
//! hit. Used to exercise the pipeline without network access.

use crate::config::RepoId;
use crate::error::{ReportError, Result};
use crate::github::HostingApi;
use crate::types::{Account, Comment, ItemKind, Organization, Review, TrackedItem};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

type ItemKey = (ItemKind, RepoId, u64);

#[derive(Default)]
pub struct InMemoryHub {
    pulls: HashMap<RepoId, Vec<TrackedItem>>,
    issues: HashMap<RepoId, Vec<TrackedItem>>,
    orgs: HashMap<String, Vec<Organization>>,
    failing_logins: HashSet<String>,
    reviews: HashMap<(RepoId, u64), Vec<Review>>,
    comments: HashMap<ItemKey, Vec<Comment>>,
    calls: Mutex<CallLog>,
}

#[derive(Default)]
struct CallLog {
    pages: usize,
    org_lookups: HashMap<String, usize>,
    review_lookups: usize,
    comment_lookups: usize,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: TrackedItem) -> Self {
        let listing = match item.kind {
            ItemKind::PullRequest => &mut self.pulls,
            ItemKind::Issue => &mut self.issues,
        };
        listing.entry(item.repo.clone()).or_default().push(item);
        self
    }

    pub fn with_orgs(mut self, login: &str, orgs: &[&str]) -> Self {
        self.orgs.insert(
            login.to_string(),
            orgs.iter()
                .map(|org| Organization {
                    login: org.to_string(),
                })
                .collect(),
        );
        self
    }

    /// Makes organization lookups for `login` fail with a transport error.
    pub fn failing_orgs_for(mut self, login: &str) -> Self {
        self.failing_logins.insert(login.to_string());
        self
    }

    pub fn with_review(mut self, item: &TrackedItem, reviewer: &str, state: &str) -> Self {
        self.reviews
            .entry((item.repo.clone(), item.number))
            .or_default()
            .push(Review {
                user: Some(Account {
                    login: reviewer.to_string(),
                }),
                state: state.to_string(),
            });
        self
    }

    pub fn with_comment(mut self, item: &TrackedItem, commenter: &str, at: DateTime<Utc>) -> Self {
        let comments = self
            .comments
            .entry((item.kind, item.repo.clone(), item.number))
            .or_default();
        comments.push(Comment {
            user: Some(Account {
                login: commenter.to_string(),
            }),
            created_at: at,
        });
        comments.sort_by_key(|c| c.created_at);
        self
    }

    /// Listing pages served so far, empty pages included.
    pub fn page_requests(&self) -> usize {
        self.log().pages
    }

    pub fn org_lookups(&self) -> usize {
        self.log().org_lookups.values().sum()
    }

    pub fn org_lookups_for(&self, login: &str) -> usize {
        self.log().org_lookups.get(login).copied().unwrap_or(0)
    }

    pub fn review_lookups(&self) -> usize {
        self.log().review_lookups
    }

    pub fn comment_lookups(&self) -> usize {
        self.log().comment_lookups
    }

    fn log(&self) -> std::sync::MutexGuard<'_, CallLog> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn page_of(&self, items: Option<&Vec<TrackedItem>>, page: u32, per_page: u8) -> Vec<TrackedItem> {
        self.log().pages += 1;
        let per_page = usize::from(per_page.max(1));
        let start = (page.max(1) as usize - 1) * per_page;
        items
            .map(|all| all.iter().skip(start).take(per_page).cloned().collect())
            .unwrap_or_default()
    }
}

impl HostingApi for InMemoryHub {
    async fn list_pulls(&self, repo: &RepoId, page: u32, per_page: u8) -> Result<Vec<TrackedItem>> {
        Ok(self.page_of(self.pulls.get(repo), page, per_page))
    }

    /// Ignores `since`: canned issues carry no update time.
    async fn list_issues(
        &self,
        repo: &RepoId,
        _since: DateTime<Utc>,
        page: u32,
        per_page: u8,
    ) -> Result<Vec<TrackedItem>> {
        Ok(self.page_of(self.issues.get(repo), page, per_page))
    }

    async fn list_user_orgs(&self, login: &str) -> Result<Vec<Organization>> {
        *self.log().org_lookups.entry(login.to_string()).or_default() += 1;
        // Give concurrent callers a chance to pile up behind this lookup.
        tokio::task::yield_now().await;

        if self.failing_logins.contains(login) {
            return Err(ReportError::transport(
                format!("list organizations of {login}"),
                "Bad credentials",
            ));
        }
        Ok(self.orgs.get(login).cloned().unwrap_or_default())
    }

    async fn list_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<Review>> {
        self.log().review_lookups += 1;
        Ok(self
            .reviews
            .get(&(repo.clone(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn first_comment(&self, item: &TrackedItem) -> Result<Option<Comment>> {
        self.log().comment_lookups += 1;
        Ok(self
            .comments
            .get(&(item.kind, item.repo.clone(), item.number))
            .and_then(|comments| comments.first().cloned()))
    }
}
