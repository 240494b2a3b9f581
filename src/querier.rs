//! Aggregation of a complete report run.
//!
//! `ReportQuerier` walks one `ReportPlan` through the pipeline:
//! 1. Collecting RFCs, pull requests and (optionally) issues.
//! 2. Dropping items authored by internal contributors.
//! 3. Restricting every collection to the reporting window.
//! 4. Counting, measuring response latencies and reducing them to the final `MetricSet`.
//!
//! A fresh `MembershipCache` is created per run and shared by every collection in it.

use crate::cache::{Classifier, MembershipCache};
use crate::config::{AppConfig, RepoId};
use crate::error::Result;
use crate::fetcher::Collector;
use crate::github::HostingApi;
use crate::metrics::{self, CommunityHealth, MedianRule, MetricSet, TeamEfficiency};
use crate::types::TrackedItem;
use crate::window::TimeWindow;
use futures::stream::{self, StreamExt, TryStreamExt};

/// Which repositories feed which category of a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPlan {
    /// Repositories whose pull requests are RFCs.
    pub rfc_repos: Vec<RepoId>,
    pub pr_repos: Vec<RepoId>,
    /// Repositories whose issues are collected. Empty skips every issue metric.
    pub issue_repos: Vec<RepoId>,
}

impl ReportPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rfc_repos: vec![config.rfc_repo_id()],
            pr_repos: config.repo_ids(),
            issue_repos: config.repo_ids(),
        }
    }
}

/// Tuning shared by every stage of a run.
#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub internal_orgs: Vec<String>,
    pub max_pages: u32,
    pub concurrency: usize,
    pub median_rule: MedianRule,
}

impl QueryOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            internal_orgs: config.internal_orgs.clone(),
            max_pages: config.max_github_api_pages,
            concurrency: config.request_concurrency,
            median_rule: config.median_rule,
        }
    }
}

pub struct ReportQuerier<A> {
    api: A,
    options: QueryOptions,
}

impl<A: HostingApi> ReportQuerier<A> {
    pub fn new(api: A, mut options: QueryOptions) -> Self {
        options.concurrency = options.concurrency.max(1);
        Self { api, options }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Runs the whole pipeline once. The first failure anywhere aborts the run.
    pub async fn run(&self, plan: &ReportPlan, window: TimeWindow) -> Result<MetricSet> {
        let collector = Collector::new(&self.api, self.options.max_pages, self.options.concurrency);
        let classifier = Classifier::new(
            &self.api,
            &self.options.internal_orgs,
            MembershipCache::new(),
            self.options.concurrency,
        );

        tracing::info!(repos = plan.rfc_repos.len(), "Collecting RFCs");
        let rfcs = collector.pulls_across(&plan.rfc_repos).await?;
        tracing::info!(repos = plan.pr_repos.len(), "Collecting pull requests");
        let prs = collector.pulls_across(&plan.pr_repos).await?;

        let rfcs = window.retain(classifier.filter_external(rfcs).await?);
        let prs = window.retain(classifier.filter_external(prs).await?);
        tracing::info!(rfcs = rfcs.len(), prs = prs.len(), "External contributions in window");

        let rfc_latencies = self.latencies(&rfcs).await?;
        let pr_latencies = self.latencies(&prs).await?;

        let internal_reviews = self.count_internal_reviews(&classifier, &rfcs).await?
            + self.count_internal_reviews(&classifier, &prs).await?;

        let issues = self.issue_metrics(&collector, &classifier, plan, window).await?;

        let presented = rfcs.len() + prs.len() + issues.as_ref().map_or(0, |i| i.external);
        let mut all_latencies = [rfc_latencies.as_slice(), pr_latencies.as_slice()].concat();
        if let Some(issues) = &issues {
            all_latencies.extend_from_slice(&issues.latencies);
        }

        let rule = self.options.median_rule;
        let report = MetricSet {
            community_health: CommunityHealth {
                external_rfcs: rfcs.len(),
                external_prs: prs.len(),
                external_issues: issues.as_ref().map(|i| i.external),
            },
            team_efficiency: TeamEfficiency {
                internal_reviews,
                median_response_rfc_pr: metrics::median(rule, &[&rfc_latencies[..], &pr_latencies[..]]),
                median_response_issues: issues
                    .as_ref()
                    .and_then(|i| metrics::median(rule, &[&i.latencies[..]])),
                average_response: metrics::average(&all_latencies, presented),
                good_first_issue_percentage: issues.and_then(|i| i.good_first_percentage),
            },
            window,
        };

        tracing::info!("Report run complete");
        Ok(report)
    }

    async fn latencies(&self, items: &[TrackedItem]) -> Result<Vec<chrono::Duration>> {
        metrics::response_latencies(&self.api, items, self.options.concurrency).await
    }

    /// Non-pending reviews left by internal contributors on `items`.
    async fn count_internal_reviews(
        &self,
        classifier: &Classifier<'_, A>,
        items: &[TrackedItem],
    ) -> Result<usize> {
        let reviews: Vec<_> = stream::iter(items)
            .map(|item| self.api.list_reviews(&item.repo, item.number))
            .buffered(self.options.concurrency)
            .try_collect()
            .await?;

        let mut count = 0;
        for review in reviews.iter().flatten().filter(|r| !r.is_pending()) {
            let Some(user) = &review.user else {
                continue;
            };
            if classifier.is_internal(&user.login).await? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn issue_metrics(
        &self,
        collector: &Collector<'_, A>,
        classifier: &Classifier<'_, A>,
        plan: &ReportPlan,
        window: TimeWindow,
    ) -> Result<Option<IssueMetrics>> {
        if plan.issue_repos.is_empty() {
            return Ok(None);
        }

        tracing::info!(repos = plan.issue_repos.len(), "Collecting issues");
        let issues = window.retain(collector.issues_across(&plan.issue_repos, window.from).await?);
        let good_first_percentage = metrics::good_first_issue_percentage(&issues);

        let external = classifier.filter_external(issues).await?;
        let latencies = self.latencies(&external).await?;
        tracing::info!(issues = external.len(), "External issues in window");

        Ok(Some(IssueMetrics {
            external: external.len(),
            latencies,
            good_first_percentage,
        }))
    }
}

struct IssueMetrics {
    external: usize,
    latencies: Vec<chrono::Duration>,
    good_first_percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHub;
    use crate::types::ItemKind;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, day, 12, 0, 0).unwrap()
    }

    fn item(kind: ItemKind, repo: &RepoId, number: u64, author: &str, day: u32) -> TrackedItem {
        TrackedItem {
            kind,
            repo: repo.clone(),
            number,
            author: author.to_string(),
            created_at: at(day),
            labels: Vec::new(),
        }
    }

    fn options() -> QueryOptions {
        QueryOptions {
            internal_orgs: vec!["vmware".into(), "pivotal".into()],
            max_pages: 10,
            concurrency: 1,
            median_rule: MedianRule::Conventional,
        }
    }

    fn june() -> TimeWindow {
        TimeWindow::between(at(1), at(30))
    }

    #[tokio::test]
    async fn test_plan_without_issues_skips_issue_metrics() {
        let repo = RepoId::new("buildpacks", "pack");
        let hub = InMemoryHub::new()
            .with_item(item(ItemKind::PullRequest, &repo, 1, "outsider", 10))
            .with_orgs("outsider", &[]);
        let plan = ReportPlan {
            rfc_repos: vec![],
            pr_repos: vec![repo],
            issue_repos: vec![],
        };

        let querier = ReportQuerier::new(hub, options());
        let metrics = querier.run(&plan, june()).await.unwrap();

        assert_eq!(metrics.community_health.external_prs, 1);
        assert_eq!(metrics.community_health.external_issues, None);
        assert_eq!(metrics.team_efficiency.median_response_issues, None);
        assert_eq!(metrics.team_efficiency.good_first_issue_percentage, None);
        // One PR presented, no comments: average is zero, median is undefined.
        assert_eq!(metrics.team_efficiency.average_response, Some(Duration::zero()));
        assert_eq!(metrics.team_efficiency.median_response_rfc_pr, None);
    }

    #[tokio::test]
    async fn test_reviews_count_only_internal_non_pending() {
        let repo = RepoId::new("buildpacks", "lifecycle");
        let pr = item(ItemKind::PullRequest, &repo, 7, "outsider", 5);
        let hub = InMemoryHub::new()
            .with_item(pr.clone())
            .with_orgs("outsider", &["cncf"])
            .with_orgs("maintainer", &["vmware"])
            .with_orgs("friend", &[])
            .with_review(&pr, "maintainer", "APPROVED")
            .with_review(&pr, "maintainer", "COMMENTED")
            .with_review(&pr, "maintainer", "PENDING")
            .with_review(&pr, "friend", "APPROVED");
        let plan = ReportPlan {
            rfc_repos: vec![],
            pr_repos: vec![repo],
            issue_repos: vec![],
        };

        let querier = ReportQuerier::new(hub, options());
        let metrics = querier.run(&plan, june()).await.unwrap();

        assert_eq!(metrics.team_efficiency.internal_reviews, 2);
        // outsider, maintainer and friend: one lookup each.
        assert_eq!(querier.api().org_lookups(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_run() {
        let repo = RepoId::new("buildpacks", "pack");
        let hub = InMemoryHub::new()
            .with_item(item(ItemKind::PullRequest, &repo, 1, "mallory", 10))
            .failing_orgs_for("mallory");
        let plan = ReportPlan {
            rfc_repos: vec![],
            pr_repos: vec![repo],
            issue_repos: vec![],
        };

        let querier = ReportQuerier::new(hub, options());
        let err = querier.run(&plan, june()).await.unwrap_err();

        assert!(err.to_string().contains("mallory"));
        assert_eq!(querier.api().review_lookups(), 0);
    }
}
