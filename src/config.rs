//! Application configuration and environment variable parsing.
//!
//! Settings are read from the environment (a `.env` file is honoured by the binary).
//! They name the repositories to query, the organization aliases treated as
//! internal, the reporting window, and a few knobs for pagination, concurrency
//! and output.

use crate::error::{ReportError, Result};
use crate::metrics::MedianRule;
use crate::window::TimeWindow;
use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "buildpacks").
    pub owner: String,
    /// The name of the repository (e.g., "pack").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// How the rendered report is written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// GitHub Personal Access Token. Required; the run aborts before any request without it.
    pub github_token: Option<String>,

    /// Owner of every queried repository.
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Repository whose pull requests are counted as RFCs.
    #[serde(default = "default_rfc_repo")]
    pub rfc_repo: String,

    /// Repositories queried for pull requests and issues.
    /// Expected format: comma-separated repository names, e.g. "pack,lifecycle".
    #[serde(default = "default_repos", deserialize_with = "deserialize_list")]
    pub repos: Vec<String>,

    /// Organization logins that denote the sponsoring organization.
    #[serde(default = "default_internal_orgs", deserialize_with = "deserialize_list")]
    pub internal_orgs: Vec<String>,

    /// Lower bound of the reporting window (YYYY-MM-DD, exclusive).
    #[serde(default = "default_report_from")]
    pub report_from: String,

    /// Upper bound of the reporting window (YYYY-MM-DD, exclusive).
    #[serde(default = "default_report_to")]
    pub report_to: String,

    /// When set, replaces the bounded window with "everything after now minus N months".
    pub report_last_months: Option<u32>,

    /// Hard limit on the number of pages requested from a single listing endpoint.
    #[serde(default = "default_max_pages")]
    pub max_github_api_pages: u32,

    /// Maximum number of in-flight requests. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency_limit")]
    pub request_concurrency: usize,

    #[serde(default, deserialize_with = "deserialize_parsed")]
    pub median_rule: MedianRule,

    #[serde(default, deserialize_with = "deserialize_parsed")]
    pub report_format: ReportFormat,
}

fn default_repo_owner() -> String {
    "buildpacks".to_string()
}

fn default_rfc_repo() -> String {
    "rfcs".to_string()
}

fn default_repos() -> Vec<String> {
    parse_list("pack,lifecycle,spec,imgutil,docs")
}

fn default_internal_orgs() -> Vec<String> {
    parse_list("pivotal,pivotal-legacy,vmware,vmware-tanzu")
}

fn default_report_from() -> String {
    "2021-05-01".to_string()
}

fn default_report_to() -> String {
    "2021-07-31".to_string()
}

fn default_max_pages() -> u32 {
    100
}

fn default_concurrency_limit() -> usize {
    1
}

impl AppConfig {
    /// Loads the configuration and checks that a token is present.
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::from_env().map_err(|e| ReportError::config(e.to_string()))?;
        config.token()?;
        Ok(config)
    }

    pub fn token(&self) -> Result<&str> {
        self.github_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ReportError::config("missing required env var 'GITHUB_TOKEN'"))
    }

    pub fn rfc_repo_id(&self) -> RepoId {
        RepoId::new(&self.repo_owner, &self.rfc_repo)
    }

    pub fn repo_ids(&self) -> Vec<RepoId> {
        self.repos
            .iter()
            .map(|repo| RepoId::new(&self.repo_owner, repo))
            .collect()
    }

    /// Resolves the reporting window relative to `now`.
    pub fn window(&self, now: DateTime<Utc>) -> Result<TimeWindow> {
        if let Some(months) = self.report_last_months {
            let from = now.checked_sub_months(Months::new(months)).ok_or_else(|| {
                ReportError::config(format!("REPORT_LAST_MONTHS={months} is out of range"))
            })?;
            return Ok(TimeWindow::since(from));
        }

        let from = parse_date("REPORT_FROM", &self.report_from)?;
        let to = parse_date("REPORT_TO", &self.report_to)?;
        Ok(TimeWindow::between(from, to))
    }
}

fn parse_date(name: &str, value: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| ReportError::config(format!("invalid {name} '{value}': {e}")))
}

fn deserialize_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_list(&s))
}

fn deserialize_parsed<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "GITHUB_TOKEN",
        "REPO_OWNER",
        "RFC_REPO",
        "REPOS",
        "INTERNAL_ORGS",
        "REPORT_FROM",
        "REPORT_TO",
        "REPORT_LAST_MONTHS",
        "MAX_GITHUB_API_PAGES",
        "REQUEST_CONCURRENCY",
        "MEDIAN_RULE",
        "REPORT_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("REPO_OWNER", "acme");
        env::set_var("REPOS", "one, two ,,three");
        env::set_var("INTERNAL_ORGS", "acme,acme-labs");
        env::set_var("MAX_GITHUB_API_PAGES", "5");
        env::set_var("REQUEST_CONCURRENCY", "4");
        env::set_var("MEDIAN_RULE", "legacy");
        env::set_var("REPORT_FORMAT", "JSON");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.token().unwrap(), "secret");
        assert_eq!(config.repos, vec!["one", "two", "three"]);
        assert_eq!(config.internal_orgs, vec!["acme", "acme-labs"]);
        assert_eq!(config.rfc_repo_id(), RepoId::new("acme", "rfcs"));
        assert_eq!(config.repo_ids()[1].to_string(), "acme/two");
        assert_eq!(config.max_github_api_pages, 5);
        assert_eq!(config.request_concurrency, 4);
        assert_eq!(config.median_rule, MedianRule::Legacy);
        assert_eq!(config.report_format, ReportFormat::Json);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.repo_owner, "buildpacks");
        assert_eq!(config.repos.len(), 5);
        assert_eq!(config.internal_orgs.len(), 4);
        assert_eq!(config.max_github_api_pages, 100);
        assert_eq!(config.request_concurrency, 1);
        assert_eq!(config.median_rule, MedianRule::Conventional);
        assert_eq!(config.report_format, ReportFormat::Text);

        let window = config.window(Utc::now()).unwrap();
        assert_eq!(window.from, Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(window.to, Some(Utc.with_ymd_and_hms(2021, 7, 31, 0, 0, 0).unwrap()));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_missing_token() {
        clear_env();
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    #[serial]
    fn test_config_rejects_unknown_median_rule() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("MEDIAN_RULE", "mode");
        assert!(AppConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_last_months_window_is_one_sided() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("REPORT_LAST_MONTHS", "3");

        let config = AppConfig::from_env().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let window = config.window(now).unwrap();

        assert_eq!(window.from, Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        assert_eq!(window.to, None);

        clear_env();
    }

    #[test]
    fn test_invalid_window_date() {
        let config = AppConfig {
            github_token: Some("t".into()),
            repo_owner: default_repo_owner(),
            rfc_repo: default_rfc_repo(),
            repos: default_repos(),
            internal_orgs: default_internal_orgs(),
            report_from: "May 1st".into(),
            report_to: default_report_to(),
            report_last_months: None,
            max_github_api_pages: 1,
            request_concurrency: 1,
            median_rule: MedianRule::Conventional,
            report_format: ReportFormat::Text,
        };
        let err = config.window(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("REPORT_FROM"));
    }
}
