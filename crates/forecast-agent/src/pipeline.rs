use anyhow::{Context, Result};
use forecast_core::{
    build_forecast, extract_impacts, ForecastReport, ImpactFactor, IntelligenceProvider,
    StructuredExtractor,
};

use crate::brief::intelligence_prompt;
use crate::config::AgentConfig;

/// Run analysis, extraction and the cascade for one report.
///
/// Only a malformed baseline fails the run; every intelligence problem
/// degrades to baseline-only vectors.
pub async fn generate_report(
    config: &AgentConfig,
    provider: Option<&dyn IntelligenceProvider>,
    extractor: Option<&dyn StructuredExtractor>,
) -> Result<ForecastReport> {
    let factors = ImpactFactor::reference_set();
    let periods = &config.assumptions.periods;

    let intelligence = match provider {
        Some(provider) => {
            let prompt = intelligence_prompt(&config.company, config.as_of, &factors, periods);
            match provider.analyze(&prompt).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("Analysis via {} failed: {}", provider.name(), e);
                    Some(format!("Intelligence unavailable: {}", e))
                }
            }
        }
        None => {
            tracing::info!("No intelligence provider configured (set GEMINI_API_KEY)");
            None
        }
    };

    let extraction = extract_impacts(intelligence.as_deref(), periods, &factors, extractor).await;
    tracing::info!(
        "Impact vectors: {} ({})",
        extraction.provenance.label(),
        extraction.rationale
    );

    let projections = build_forecast(&config.assumptions, &extraction.table)
        .context("Forecast cascade rejected its inputs")?;

    for p in &projections {
        tracing::info!(
            "  {}: revenue ${:.1}B ({:+.1}%), net income ${:.1}B ({:+.1}%)",
            p.period,
            p.revenue,
            p.revenue_growth * 100.0,
            p.profit,
            p.profit_growth * 100.0
        );
    }

    Ok(ForecastReport::new(
        config.company.clone(),
        config.as_of,
        intelligence,
        config.assumptions.clone(),
        extraction,
        projections,
    ))
}
