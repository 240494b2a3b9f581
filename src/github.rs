//! Access to the hosting platform.
//!
//! `HostingApi` is the seam every stage talks through; `GitHubClient` implements it on
//! top of `octocrab`. Tests substitute an in-memory implementation.

use crate::config::RepoId;
use crate::error::{ReportError, Result};
use crate::types::{Comment, ItemKind, Organization, Review, TrackedItem};
use chrono::{DateTime, Utc};
use octocrab::models::issues::Issue;
use octocrab::models::pulls::PullRequest;
use octocrab::Octocrab;

/// The endpoints a report run needs.
#[allow(async_fn_in_trait)]
pub trait HostingApi {
    /// One page of pull requests (any state) for `repo`.
    async fn list_pulls(&self, repo: &RepoId, page: u32, per_page: u8) -> Result<Vec<TrackedItem>>;

    /// One page of issues (any state) for `repo` updated after `since`.
    async fn list_issues(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        page: u32,
        per_page: u8,
    ) -> Result<Vec<TrackedItem>>;

    /// Public organization memberships of `login`.
    async fn list_user_orgs(&self, login: &str) -> Result<Vec<Organization>>;

    async fn list_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<Review>>;

    /// The oldest comment on `item`, if it has any.
    async fn first_comment(&self, item: &TrackedItem) -> Result<Option<Comment>>;
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| ReportError::transport("build GitHub client", e))?;

        Ok(Self { octocrab })
    }

    async fn get_json<R, P>(&self, operation: String, route: String, params: &P) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
        P: serde::Serialize + ?Sized,
    {
        tracing::debug!(%route, "GET");
        self.octocrab
            .get(route, Some(params))
            .await
            .map_err(|e| ReportError::transport(operation, e))
    }
}

impl HostingApi for GitHubClient {
    async fn list_pulls(&self, repo: &RepoId, page: u32, per_page: u8) -> Result<Vec<TrackedItem>> {
        let operation = format!("list pull requests {repo} page {page}");
        let result = self
            .octocrab
            .pulls(repo.owner.clone(), repo.repo.clone())
            .list()
            .state(octocrab::params::State::All)
            .per_page(per_page)
            .page(page)
            .send()
            .await
            .map_err(|e| ReportError::transport(&operation, e))?;

        result
            .items
            .into_iter()
            .map(|pr| pull_to_item(repo, pr, &operation))
            .collect()
    }

    async fn list_issues(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        page: u32,
        per_page: u8,
    ) -> Result<Vec<TrackedItem>> {
        let result = self
            .octocrab
            .issues(repo.owner.clone(), repo.repo.clone())
            .list()
            .state(octocrab::params::State::All)
            .since(since)
            .per_page(per_page)
            .page(page)
            .send()
            .await
            .map_err(|e| ReportError::transport(format!("list issues {repo} page {page}"), e))?;

        Ok(result
            .items
            .into_iter()
            .map(|issue| issue_to_item(repo, issue))
            .collect())
    }

    async fn list_user_orgs(&self, login: &str) -> Result<Vec<Organization>> {
        self.get_json(
            format!("list organizations of {login}"),
            format!("/users/{login}/orgs"),
            &[("per_page", "100")],
        )
        .await
    }

    async fn list_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<Review>> {
        self.get_json(
            format!("list reviews {repo}#{number}"),
            format!("/repos/{}/{}/pulls/{number}/reviews", repo.owner, repo.repo),
            &[("per_page", "100")],
        )
        .await
    }

    async fn first_comment(&self, item: &TrackedItem) -> Result<Option<Comment>> {
        let RepoId { owner, repo } = &item.repo;
        let number = item.number;
        let comments: Vec<Comment> = match item.kind {
            ItemKind::PullRequest => {
                self.get_json(
                    format!("list comments {item}"),
                    format!("/repos/{owner}/{repo}/pulls/{number}/comments"),
                    &[
                        ("sort", "created"),
                        ("direction", "asc"),
                        ("per_page", "1"),
                        ("page", "1"),
                    ],
                )
                .await?
            }
            // Issue comments are always returned oldest first.
            ItemKind::Issue => {
                self.get_json(
                    format!("list comments {item}"),
                    format!("/repos/{owner}/{repo}/issues/{number}/comments"),
                    &[("per_page", "1"), ("page", "1")],
                )
                .await?
            }
        };

        Ok(comments.into_iter().next())
    }
}

fn pull_to_item(repo: &RepoId, pr: PullRequest, operation: &str) -> Result<TrackedItem> {
    let created_at = pr.created_at.ok_or_else(|| {
        ReportError::transport(operation, format!("pull request #{} has no created_at", pr.number))
    })?;

    Ok(TrackedItem {
        kind: ItemKind::PullRequest,
        repo: repo.clone(),
        number: pr.number,
        author: pr.user.map(|user| user.login).unwrap_or_else(ghost),
        created_at,
        labels: Vec::new(),
    })
}

fn issue_to_item(repo: &RepoId, issue: Issue) -> TrackedItem {
    TrackedItem {
        kind: ItemKind::Issue,
        repo: repo.clone(),
        number: issue.number,
        author: issue.user.login,
        created_at: issue.created_at,
        labels: issue.labels.into_iter().map(|label| label.name).collect(),
    }
}

/// GitHub's placeholder login for deleted accounts.
fn ghost() -> String {
    "ghost".to_string()
}
