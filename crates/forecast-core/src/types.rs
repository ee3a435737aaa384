use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::ForecastError;

/// Label of one future reporting interval, e.g. `FY27 Q1E`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(String);

impl Period {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Period {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Period {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Baseline growth model for the forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineAssumptions {
    /// Revenue of the last reported period (billions).
    pub last_revenue: f64,
    /// Profit metric of the last reported period (billions).
    pub last_profit: f64,
    /// Fractional revenue growth per period, before impacts.
    pub base_growth: Vec<f64>,
    /// Offset added to every period's revenue growth to get profit growth.
    pub profit_leverage: f64,
    pub periods: Vec<Period>,
}

impl BaselineAssumptions {
    /// Number of projected periods.
    pub fn horizon(&self) -> usize {
        self.periods.len()
    }

    /// Rejects, as configuration errors:
    /// - an empty horizon (no periods),
    /// - `base_growth` whose length differs from `periods`,
    /// - a non-finite or non-positive `last_revenue`,
    /// - a non-finite `last_profit`, `profit_leverage` or growth rate.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.periods.is_empty() {
            return Err(ForecastError::Config(
                "forecast horizon is empty (no periods)".into(),
            ));
        }
        if self.base_growth.len() != self.periods.len() {
            return Err(ForecastError::Config(format!(
                "base_growth has {} entries but there are {} periods",
                self.base_growth.len(),
                self.periods.len()
            )));
        }
        if !self.last_revenue.is_finite() || self.last_revenue <= 0.0 {
            return Err(ForecastError::Config(format!(
                "last_revenue must be positive, got {}",
                self.last_revenue
            )));
        }
        if !self.last_profit.is_finite() || !self.profit_leverage.is_finite() {
            return Err(ForecastError::Config(
                "last_profit and profit_leverage must be finite".into(),
            ));
        }
        if let Some(g) = self.base_growth.iter().find(|g| !g.is_finite()) {
            return Err(ForecastError::Config(format!(
                "base_growth contains a non-finite rate: {}",
                g
            )));
        }
        Ok(())
    }
}

/// A named dimension of external influence on revenue growth.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImpactFactor {
    /// Machine key used in the extraction JSON.
    pub key: String,
    /// Human-readable description used in prompts and reports.
    pub label: String,
}

impl ImpactFactor {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    pub fn supply_capacity() -> Self {
        Self::new(
            "supply_capacity",
            "Foundry and advanced-packaging capacity (e.g. TSMC CoWoS)",
        )
    }

    pub fn component_supply() -> Self {
        Self::new(
            "component_supply",
            "High-bandwidth memory (HBM) component supply",
        )
    }

    pub fn customer_capex() -> Self {
        Self::new(
            "customer_capex",
            "Hyperscale customer capital expenditure (e.g. Microsoft, Meta)",
        )
    }

    /// The three factors the weekly report tracks.
    pub fn reference_set() -> Vec<Self> {
        vec![
            Self::supply_capacity(),
            Self::component_supply(),
            Self::customer_capex(),
        ]
    }
}

/// One factor's adjustments, one entry per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRow {
    pub factor: ImpactFactor,
    pub adjustments: Vec<f64>,
}

/// Per-factor, per-period signed growth adjustments.
///
/// Absence of signal is `0.0`, never a missing cell. Whether the table was
/// derived from text or is the fallback is tracked by [`Provenance`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImpactTable {
    rows: Vec<ImpactRow>,
}

impl ImpactTable {
    /// All-zero table for `factors` over `horizon` periods.
    pub fn zeros(factors: &[ImpactFactor], horizon: usize) -> Self {
        Self {
            rows: factors
                .iter()
                .map(|factor| ImpactRow {
                    factor: factor.clone(),
                    adjustments: vec![0.0; horizon],
                })
                .collect(),
        }
    }

    /// Caller-supplied rows. Shape is checked by [`ImpactTable::validate`].
    pub fn from_rows(rows: Vec<ImpactRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ImpactRow] {
        &self.rows
    }

    /// Adds `delta` into the (factor, period) cell. Factor keys match
    /// ASCII case-insensitively. Returns `false` when the factor is unknown
    /// or the period is out of range.
    pub fn add(&mut self, factor_key: &str, period_index: usize, delta: f64) -> bool {
        match self
            .rows
            .iter_mut()
            .find(|r| r.factor.key.eq_ignore_ascii_case(factor_key))
            .and_then(|r| r.adjustments.get_mut(period_index))
        {
            Some(cell) => {
                *cell += delta;
                true
            }
            None => false,
        }
    }

    pub fn value(&self, factor_key: &str, period_index: usize) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.factor.key.eq_ignore_ascii_case(factor_key))
            .and_then(|r| r.adjustments.get(period_index).copied())
    }

    /// Sum of all factors' adjustments for one period.
    pub fn combined(&self, period_index: usize) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.adjustments.get(period_index))
            .sum()
    }

    pub fn is_zero(&self) -> bool {
        self.rows
            .iter()
            .all(|r| r.adjustments.iter().all(|v| *v == 0.0))
    }

    /// Every row must carry exactly `horizon` finite values and factor keys
    /// must be unique, ignoring ASCII case.
    pub fn validate(&self, horizon: usize) -> Result<(), ForecastError> {
        let mut seen = HashSet::new();
        for row in &self.rows {
            if !seen.insert(row.factor.key.to_ascii_lowercase()) {
                return Err(ForecastError::Config(format!(
                    "impact factor '{}' appears more than once",
                    row.factor.key
                )));
            }
            if row.adjustments.len() != horizon {
                return Err(ForecastError::Config(format!(
                    "impact factor '{}' has {} adjustments but the horizon is {} periods",
                    row.factor.key,
                    row.adjustments.len(),
                    horizon
                )));
            }
            if row.adjustments.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::Config(format!(
                    "impact factor '{}' contains a non-finite adjustment",
                    row.factor.key
                )));
            }
        }
        Ok(())
    }
}

/// Where an impact table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Parsed from extractor output.
    Derived,
    /// Degraded all-zero outcome.
    Fallback,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Derived => "auto-derived",
            Provenance::Fallback => "baseline only",
        }
    }
}

/// Result of the text-to-impact extraction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactExtraction {
    pub table: ImpactTable,
    pub rationale: String,
    pub provenance: Provenance,
}

/// Projected figures for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodProjection {
    pub period: Period,
    /// Rounded to one decimal place.
    pub revenue: f64,
    /// Rounded to one decimal place.
    pub profit: f64,
    pub revenue_growth: f64,
    pub profit_growth: f64,
}

/// Everything the renderer needs for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub subject: String,
    pub company: String,
    pub generated_on: NaiveDate,
    /// Raw analysis text, if any was obtained.
    pub intelligence: Option<String>,
    pub assumptions: BaselineAssumptions,
    pub impacts: ImpactTable,
    pub rationale: String,
    pub provenance: Provenance,
    pub projections: Vec<PeriodProjection>,
}

impl ForecastReport {
    pub fn new(
        company: impl Into<String>,
        generated_on: NaiveDate,
        intelligence: Option<String>,
        assumptions: BaselineAssumptions,
        extraction: ImpactExtraction,
        projections: Vec<PeriodProjection>,
    ) -> Self {
        let company = company.into();
        Self {
            subject: format!("{} forward earnings report - {}", company, generated_on),
            company,
            generated_on,
            intelligence,
            assumptions,
            impacts: extraction.table,
            rationale: extraction.rationale,
            provenance: extraction.provenance,
            projections,
        }
    }
}
