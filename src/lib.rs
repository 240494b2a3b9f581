pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod memory;
pub mod metrics;
pub mod querier;
pub mod render;
pub mod types;
pub mod window;

use chrono::Utc;
use config::AppConfig;
use error::Result;
use github::GitHubClient;
use metrics::MetricSet;
use querier::{QueryOptions, ReportPlan, ReportQuerier};

/// Runs one full report against GitHub using `config`.
///
/// The token and the reporting window are validated before the first request is made.
pub async fn generate_report(config: &AppConfig) -> Result<MetricSet> {
    let token = config.token()?;
    let window = config.window(Utc::now())?;
    let plan = ReportPlan::from_config(config);

    tracing::info!(
        owner = %config.repo_owner,
        from = %window.from,
        to = ?window.to,
        "Starting report run"
    );

    let client = GitHubClient::new(token)?;
    let querier = ReportQuerier::new(client, QueryOptions::from_config(config));
    querier.run(&plan, window).await
}
