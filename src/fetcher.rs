//! Paginated collection of pull requests and issues.
//!
//! Every listing endpoint is walked page by page with a fixed page size until a page
//! comes back empty. Items are kept in the order the API returns them.

use crate::config::RepoId;
use crate::error::Result;
use crate::github::HostingApi;
use crate::types::TrackedItem;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

pub const PAGE_SIZE: u8 = 100;

/// Requests pages 1, 2, ... until one is empty or `max_pages` have been fetched.
///
/// The first failing page aborts the walk and its error is returned unchanged.
pub async fn fetch_all_pages<T, F, Fut>(label: &str, max_pages: u32, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();

    for page in 1..=max_pages {
        let batch = fetch_page(page).await?;
        if batch.is_empty() {
            tracing::debug!(%label, pages = page - 1, items = items.len(), "Collected all pages");
            return Ok(items);
        }
        items.extend(batch);
    }

    tracing::warn!(
        "Hit max_github_api_pages ({}) for {} before reaching an empty page. Data may be incomplete.",
        max_pages,
        label
    );

    Ok(items)
}

/// Collects complete listings through a `HostingApi`.
pub struct Collector<'a, A> {
    api: &'a A,
    max_pages: u32,
    concurrency: usize,
}

impl<'a, A: HostingApi> Collector<'a, A> {
    pub fn new(api: &'a A, max_pages: u32, concurrency: usize) -> Self {
        Self {
            api,
            max_pages,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn pulls(&self, repo: &RepoId) -> Result<Vec<TrackedItem>> {
        let label = format!("pull requests of {repo}");
        fetch_all_pages(&label, self.max_pages, move |page| {
            self.api.list_pulls(repo, page, PAGE_SIZE)
        })
        .await
    }

    /// Issues updated after `since`. The platform filters on update time, so callers
    /// still need to filter on creation time.
    pub async fn issues(&self, repo: &RepoId, since: DateTime<Utc>) -> Result<Vec<TrackedItem>> {
        let label = format!("issues of {repo}");
        fetch_all_pages(&label, self.max_pages, move |page| {
            self.api.list_issues(repo, since, page, PAGE_SIZE)
        })
        .await
    }

    /// Pull requests of every repository, concatenated in repository order.
    pub async fn pulls_across(&self, repos: &[RepoId]) -> Result<Vec<TrackedItem>> {
        let per_repo: Vec<Vec<TrackedItem>> = stream::iter(repos)
            .map(|repo| self.pulls(repo))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_repo.into_iter().flatten().collect())
    }

    /// Issues of every repository, concatenated in repository order.
    pub async fn issues_across(
        &self,
        repos: &[RepoId],
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedItem>> {
        let per_repo: Vec<Vec<TrackedItem>> = stream::iter(repos)
            .map(|repo| self.issues(repo, since))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_repo.into_iter().flatten().collect())
    }
}
