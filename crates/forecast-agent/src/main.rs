use anyhow::Result;
use forecast_core::{IntelligenceProvider, StructuredExtractor};
use intel_client::{GeminiClient, IntelConfig};
use report_mailer::{MailerConfig, ReportMailer, ReportTemplate};

mod brief;
mod config;
mod pipeline;

use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting Forecast Sentinel");

    // 2. Load configuration (fails fast on a malformed horizon)
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Company: {}", config.company);
    tracing::info!("  As of: {}", config.as_of);
    tracing::info!(
        "  Horizon: {} periods, last revenue ${}B, last net income ${}B",
        config.assumptions.horizon(),
        config.assumptions.last_revenue,
        config.assumptions.last_profit
    );

    // 3. Intelligence provider (optional)
    let intel_config = IntelConfig::from_env();
    let gemini = if intel_config.is_configured() {
        match GeminiClient::new(&intel_config) {
            Ok(client) => {
                tracing::info!(
                    "Intelligence provider: gemini ({}, timeout {:?})",
                    client.model(),
                    intel_config.timeout
                );
                Some(client)
            }
            Err(e) => {
                tracing::warn!("Failed to initialize intelligence provider: {}", e);
                None
            }
        }
    } else {
        None
    };
    let provider = gemini.as_ref().map(|c| c as &dyn IntelligenceProvider);
    let extractor = gemini.as_ref().map(|c| c as &dyn StructuredExtractor);

    // 4. Analysis -> impact extraction -> cascade
    let report = pipeline::generate_report(&config, provider, extractor).await?;

    // 5. Deliver
    let mailer = ReportMailer::new(&MailerConfig::from_env());
    if mailer.has_channels() {
        let delivered = mailer.deliver(&report).await;
        if delivered == 0 {
            tracing::error!("Report was not delivered on any channel");
        }
    } else {
        let html = ReportTemplate::render(&report);
        tracing::info!(
            "Delivery skipped; rendered report '{}' ({} bytes)",
            report.subject,
            html.len()
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    tracing::info!("Forecast Sentinel finished");
    Ok(())
}
