//! Contributor classification.
//!
//! Deciding whether a login belongs to the sponsoring organization costs one request
//! per login. `MembershipCache` remembers every verdict for the lifetime of the cache
//! (one report run), so the number of lookups follows the number of distinct
//! contributors rather than the number of items they authored or reviewed.

use crate::error::{ReportError, Result};
use crate::github::HostingApi;
use crate::types::{Organization, TrackedItem};
use futures::stream::{self, StreamExt, TryStreamExt};
use moka::future::Cache;
use std::sync::Arc;

/// Login -> "is internal" verdicts. Entries never expire and are never evicted.
#[derive(Clone)]
pub struct MembershipCache {
    cache: Cache<String, bool>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    pub async fn get(&self, login: &str) -> Option<bool> {
        self.cache.get(login).await
    }

    /// Returns the cached verdict for `login`, running `lookup` only if there is none.
    ///
    /// Concurrent callers asking for the same uncached login share a single `lookup`.
    /// A failed lookup is not cached.
    pub async fn get_or_lookup<F>(&self, login: &str, lookup: F) -> Result<bool>
    where
        F: std::future::Future<Output = Result<bool>>,
    {
        self.cache
            .try_get_with(login.to_string(), lookup)
            .await
            .map_err(|e: Arc<ReportError>| (*e).clone())
    }
}

impl Default for MembershipCache {
    fn default() -> Self {
        Self::new()
    }
}

/// True if any of `orgs` is one of the `internal` aliases.
pub fn belongs_to_any(orgs: &[Organization], internal: &[String]) -> bool {
    orgs.iter()
        .any(|org| internal.iter().any(|alias| *alias == org.login))
}

/// Sorts contributors into internal and external using the organization roster.
pub struct Classifier<'a, A> {
    api: &'a A,
    internal_orgs: &'a [String],
    cache: MembershipCache,
    concurrency: usize,
}

impl<'a, A: HostingApi> Classifier<'a, A> {
    pub fn new(
        api: &'a A,
        internal_orgs: &'a [String],
        cache: MembershipCache,
        concurrency: usize,
    ) -> Self {
        Self {
            api,
            internal_orgs,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn is_internal(&self, login: &str) -> Result<bool> {
        self.cache
            .get_or_lookup(login, async {
                let orgs = self.api.list_user_orgs(login).await?;
                let internal = belongs_to_any(&orgs, self.internal_orgs);
                tracing::debug!(%login, internal, "Classified contributor");
                Ok(internal)
            })
            .await
    }

    pub async fn is_external(&self, login: &str) -> Result<bool> {
        Ok(!self.is_internal(login).await?)
    }

    /// Keeps the items whose author is external, preserving order.
    pub async fn filter_external(&self, items: Vec<TrackedItem>) -> Result<Vec<TrackedItem>> {
        let verdicts: Vec<bool> = stream::iter(&items)
            .map(|item| self.is_external(&item.author))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(items
            .into_iter()
            .zip(verdicts)
            .filter_map(|(item, external)| external.then_some(item))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoId;
    use crate::memory::InMemoryHub;
    use crate::types::ItemKind;
    use chrono::{TimeZone, Utc};
    use futures::future::join_all;

    fn aliases() -> Vec<String> {
        ["pivotal", "pivotal-legacy", "vmware", "vmware-tanzu"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn pr(number: u64, author: &str) -> TrackedItem {
        TrackedItem {
            kind: ItemKind::PullRequest,
            repo: RepoId::new("buildpacks", "pack"),
            number,
            author: author.to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_belongs_to_any_ignores_alias_order() {
        let orgs = vec![
            Organization { login: "cncf".into() },
            Organization { login: "vmware-tanzu".into() },
        ];
        let mut internal = aliases();
        assert!(belongs_to_any(&orgs, &internal));
        internal.reverse();
        assert!(belongs_to_any(&orgs, &internal));

        let outsider = vec![Organization { login: "vmware-labs".into() }];
        assert!(!belongs_to_any(&outsider, &internal));
        assert!(!belongs_to_any(&[], &internal));
    }

    #[tokio::test]
    async fn test_classifier_looks_up_each_login_once() {
        let hub = InMemoryHub::new()
            .with_orgs("alice", &["vmware"])
            .with_orgs("bob", &["cncf"]);
        let internal = aliases();
        let classifier = Classifier::new(&hub, &internal, MembershipCache::new(), 1);

        let items = vec![pr(1, "alice"), pr(2, "bob"), pr(3, "alice"), pr(4, "bob"), pr(5, "carol")];
        let external = classifier.filter_external(items).await.unwrap();

        let numbers: Vec<u64> = external.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![2, 4, 5]);
        assert_eq!(hub.org_lookups(), 3);

        // Repeated lookups of either verdict are served from the cache.
        assert!(classifier.is_internal("alice").await.unwrap());
        assert!(classifier.is_external("bob").await.unwrap());
        assert_eq!(hub.org_lookups(), 3);
        assert_eq!(hub.org_lookups_for("alice"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_lookups_collapse_into_one_request() {
        let hub = InMemoryHub::new().with_orgs("alice", &["pivotal"]);
        let internal = aliases();
        let classifier = Classifier::new(&hub, &internal, MembershipCache::new(), 8);

        let verdicts = join_all((0..8).map(|_| classifier.is_internal("alice"))).await;

        assert!(verdicts.into_iter().all(|v| v.unwrap()));
        assert_eq!(hub.org_lookups_for("alice"), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_propagates_and_is_not_cached() {
        let hub = InMemoryHub::new().failing_orgs_for("mallory");
        let internal = aliases();
        let cache = MembershipCache::new();
        let classifier = Classifier::new(&hub, &internal, cache.clone(), 1);

        let err = classifier.is_external("mallory").await.unwrap_err();
        assert!(matches!(err, ReportError::Transport { .. }));
        assert_eq!(cache.get("mallory").await, None);
    }

    #[tokio::test]
    async fn test_fresh_cache_per_run() {
        let hub = InMemoryHub::new().with_orgs("alice", &["vmware"]);
        let internal = aliases();

        for _ in 0..2 {
            let classifier = Classifier::new(&hub, &internal, MembershipCache::new(), 1);
            assert!(classifier.is_internal("alice").await.unwrap());
        }

        assert_eq!(hub.org_lookups_for("alice"), 2);
    }
}
