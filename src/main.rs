use anyhow::Context;
use community_report::config::{AppConfig, ReportFormat};
use community_report::{generate_report, render};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing (logging) on stderr; stdout carries the report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "community_report=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        tracing::error!("Report run failed: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let metrics = generate_report(&config).await?;

    let output = match config.report_format {
        ReportFormat::Text => render::render_text(&metrics),
        ReportFormat::Json => render::render_json(&metrics).context("failed to encode report")?,
    };
    println!("{output}");

    Ok(())
}
