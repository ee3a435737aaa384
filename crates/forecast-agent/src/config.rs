use anyhow::{Context, Result};
use chrono::NaiveDate;
use forecast_core::{BaselineAssumptions, Period};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Company the report covers.
    pub company: String,
    /// Date the analysis is written for.
    pub as_of: NaiveDate,
    pub assumptions: BaselineAssumptions,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            chrono::Local::now().date_naive(),
        )
    }

    /// Build from any key lookup; `today` is the default `REPORT_AS_OF`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        today: NaiveDate,
    ) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let periods: Vec<Period> = get("FORECAST_PERIODS")
            .unwrap_or_else(|| "FY27 Q1E,FY27 Q2E,FY27 Q3E,FY27 Q4E".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Period::from)
            .collect();

        let base_growth = parse_rates(
            &get("BASE_GROWTH").unwrap_or_else(|| "0.10,0.08,0.07,0.07".to_string()),
        )
        .context("BASE_GROWTH must be a comma-separated list of fractional rates")?;

        let assumptions = BaselineAssumptions {
            last_revenue: get("LAST_REVENUE")
                .unwrap_or_else(|| "42.0".to_string())
                .trim()
                .parse()
                .context("LAST_REVENUE is not a number")?,
            last_profit: get("LAST_PROFIT")
                .unwrap_or_else(|| "25.1".to_string())
                .trim()
                .parse()
                .context("LAST_PROFIT is not a number")?,
            base_growth,
            profit_leverage: get("PROFIT_LEVERAGE")
                .unwrap_or_else(|| "0.02".to_string())
                .trim()
                .parse()
                .context("PROFIT_LEVERAGE is not a number")?,
            periods,
        };

        let as_of = match get("REPORT_AS_OF") {
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .context("REPORT_AS_OF must be YYYY-MM-DD")?,
            None => today,
        };

        let config = Self {
            company: get("REPORT_COMPANY").unwrap_or_else(|| "NVIDIA".to_string()),
            as_of,
            assumptions,
        };
        config.validate()?;
        Ok(config)
    }

    /// Refuse to start on a malformed horizon instead of padding or truncating.
    pub fn validate(&self) -> Result<()> {
        self.assumptions
            .validate()
            .context("Invalid baseline assumptions")?;
        Ok(())
    }
}

fn parse_rates(list: &str) -> Result<Vec<f64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("'{}' is not a number", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AgentConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| map.get(key).cloned(), today())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.company, "NVIDIA");
        assert_eq!(config.as_of, today());
        assert_eq!(config.assumptions.horizon(), 4);
        assert_eq!(config.assumptions.base_growth, vec![0.10, 0.08, 0.07, 0.07]);
        assert_eq!(config.assumptions.last_revenue, 42.0);
        assert_eq!(config.assumptions.periods[0], Period::from("FY27 Q1E"));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("FORECAST_PERIODS", " FY28 Q1E , FY28 Q2E "),
            ("BASE_GROWTH", "0.05, -0.01"),
            ("LAST_REVENUE", "57.1"),
            ("REPORT_AS_OF", "2027-02-01"),
            ("REPORT_COMPANY", "AMD"),
        ])
        .unwrap();
        assert_eq!(config.assumptions.periods[1], Period::from("FY28 Q2E"));
        assert_eq!(config.assumptions.base_growth, vec![0.05, -0.01]);
        assert_eq!(config.assumptions.last_revenue, 57.1);
        assert_eq!(config.as_of, NaiveDate::from_ymd_opt(2027, 2, 1).unwrap());
        assert_eq!(config.company, "AMD");
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = from_pairs(&[("BASE_GROWTH", "0.10,0.08")]).unwrap_err();
        assert!(format!("{:#}", err).contains("base_growth has 2 entries"));
    }

    #[test]
    fn test_rejects_garbage_numbers() {
        assert!(from_pairs(&[("BASE_GROWTH", "0.1,abc,0.1,0.1")]).is_err());
        assert!(from_pairs(&[("LAST_PROFIT", "n/a")]).is_err());
        assert!(from_pairs(&[("REPORT_AS_OF", "15/01/2026")]).is_err());
    }
}
