//! Turns free-form analyst text into an [`ImpactTable`].
//!
//! The extractor is a text generator and its output is not trusted: the JSON
//! object is located by a bounded brace search, parsed strictly, and read
//! field by field with defaults. Every failure on this path degrades to the
//! all-zero table instead of surfacing an error.

use serde_json::Value;

use crate::{
    ImpactExtraction, ImpactFactor, ImpactTable, Period, Provenance, StructuredExtractor,
};

/// Rationale attached to the degraded all-zero outcome.
pub const FALLBACK_RATIONALE: &str = "No automated signal was available for this run. \
Impact vectors are zero and the forecast reflects baseline growth only.";

/// Rationale used when the extractor returned vectors but no notes.
pub const GENERIC_RATIONALE: &str = "Impact vectors were auto-derived from the analysis text. \
Review them manually before relying on the forecast.";

/// Prefixes marking analysis text that is really an upstream error message.
pub const FAILURE_MARKERS: &[&str] = &[
    "extraction failed",
    "intelligence unavailable",
    "情报获取失败",
];

/// Direction of a factor's influence on revenue growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
    None,
}

impl Direction {
    /// Unrecognized text is treated as no signal.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Direction::Positive,
            "negative" => Direction::Negative,
            _ => Direction::None,
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
            Direction::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    Low,
    Medium,
    High,
}

impl Magnitude {
    /// Unrecognized text falls back to `Low`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => Magnitude::Medium,
            "high" => Magnitude::High,
            _ => Magnitude::Low,
        }
    }

    /// Growth adjustment in fractional terms.
    pub fn value(&self) -> f64 {
        match self {
            Magnitude::Low => 0.01,
            Magnitude::Medium => 0.02,
            Magnitude::High => 0.03,
        }
    }
}

/// The degraded outcome: zero table plus [`FALLBACK_RATIONALE`].
pub fn fallback(factors: &[ImpactFactor], horizon: usize) -> ImpactExtraction {
    ImpactExtraction {
        table: ImpactTable::zeros(factors, horizon),
        rationale: FALLBACK_RATIONALE.to_string(),
        provenance: Provenance::Fallback,
    }
}

pub fn is_failure_marker(text: &str) -> bool {
    let head = text.trim_start().to_lowercase();
    FAILURE_MARKERS.iter().any(|m| head.starts_with(m))
}

/// Instructions sent alongside the analysis text.
pub fn system_instructions(periods: &[Period], factors: &[ImpactFactor]) -> String {
    let period_list = periods
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(", ");
    let factor_list = factors
        .iter()
        .map(|f| format!("- \"{}\": {}", f.key, f.label))
        .collect::<Vec<_>>()
        .join("\n");

    let example = serde_json::json!({
        "periods": periods.iter().take(1).map(|p| serde_json::json!({
            "period": p.label(),
            "impacts": factors.iter().map(|f| serde_json::json!({
                "factor": f.key,
                "direction": "none",
                "magnitude": "low",
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "notes": "one or two sentences summarising the evidence",
    });

    format!(
        "You convert equity research notes into forecast impact vectors.\n\
         Return exactly one JSON object and nothing else.\n\
         The object has a \"periods\" array with one entry per period, in this order: {period_list}.\n\
         Each entry has a \"period\" label and an \"impacts\" array with one object per factor:\n\
         {factor_list}\n\
         Each impact object has \"factor\" (one of the keys above), \
         \"direction\" (\"positive\", \"negative\" or \"none\") and \
         \"magnitude\" (\"low\", \"medium\" or \"high\").\n\
         Add a top-level \"notes\" string summarising why.\n\
         Example shape:\n{example}",
        example = serde_json::to_string_pretty(&example).unwrap_or_default(),
    )
}

/// Slice from the first `{` to the last `}` inclusive, if both exist in order.
pub fn locate_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

/// Parse an extractor response into an impact table.
///
/// Returns `None` when no JSON object can be located or it fails to parse.
/// Entries past the horizon are ignored and missing ones stay zero.
pub fn parse_impact_response(
    content: &str,
    periods: &[Period],
    factors: &[ImpactFactor],
) -> Option<ImpactExtraction> {
    let horizon = periods.len();
    let object = locate_json_object(content)?;
    let parsed: Value = match serde_json::from_str(object) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Extractor JSON did not parse: {}", e);
            return None;
        }
    };

    let mut table = ImpactTable::zeros(factors, horizon);
    let entries = parsed
        .get("periods")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if entries.len() > horizon {
        tracing::debug!(
            "Extractor returned {} period entries, using the first {}",
            entries.len(),
            horizon
        );
    }

    for (i, entry) in entries.iter().take(horizon).enumerate() {
        for (key, impact) in factor_mentions(entry) {
            let direction = impact
                .get("direction")
                .and_then(Value::as_str)
                .map(Direction::parse)
                .unwrap_or(Direction::None);
            if direction == Direction::None {
                continue;
            }
            let magnitude = impact
                .get("magnitude")
                .and_then(Value::as_str)
                .map(Magnitude::parse)
                .unwrap_or(Magnitude::Low);

            let key = key.trim();
            if !table.add(key, i, direction.sign() * magnitude.value()) {
                tracing::debug!("Ignoring unknown impact factor '{}' in period {}", key, i);
            }
        }
    }

    let rationale = parsed
        .get("notes")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(GENERIC_RATIONALE)
        .to_string();

    Some(ImpactExtraction {
        table,
        rationale,
        provenance: Provenance::Derived,
    })
}

/// Factor mentions of one period entry as `(factor key, impact object)`.
///
/// The requested shape is an `impacts` array of objects carrying a `factor`
/// key; an object keyed by factor (under `impacts` or `factors`) is accepted
/// too.
fn factor_mentions(entry: &Value) -> Vec<(&str, &Value)> {
    let mut mentions = Vec::new();
    for field in ["impacts", "factors"] {
        match entry.get(field) {
            Some(Value::Array(items)) => {
                for item in items {
                    if let Some(key) = item.get("factor").and_then(Value::as_str) {
                        mentions.push((key, item));
                    }
                }
            }
            Some(Value::Object(map)) => {
                for (key, item) in map {
                    if item.is_object() {
                        mentions.push((key.as_str(), item));
                    }
                }
            }
            _ => {}
        }
    }
    mentions
}

/// Derive impact vectors from analysis text.
///
/// Never fails: a missing extractor, missing or failure-marked text, an
/// extractor error, or an unparseable response all yield [`fallback`].
pub async fn extract_impacts(
    raw_text: Option<&str>,
    periods: &[Period],
    factors: &[ImpactFactor],
    extractor: Option<&dyn StructuredExtractor>,
) -> ImpactExtraction {
    let horizon = periods.len();

    let Some(extractor) = extractor else {
        tracing::info!("No structured extractor configured, using zero impact vectors");
        return fallback(factors, horizon);
    };

    let text = match raw_text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            tracing::info!("No analysis text available, using zero impact vectors");
            return fallback(factors, horizon);
        }
    };

    if is_failure_marker(text) {
        tracing::warn!("Analysis text is an upstream failure message, using zero impact vectors");
        return fallback(factors, horizon);
    }

    let instructions = system_instructions(periods, factors);
    let response = match extractor.extract(&instructions, text).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Impact extraction via {} failed: {}", extractor.name(), e);
            return fallback(factors, horizon);
        }
    };

    match parse_impact_response(&response, periods, factors) {
        Some(extraction) => {
            tracing::info!(
                "Derived impact vectors via {} ({} periods, {} factors)",
                extractor.name(),
                horizon,
                factors.len()
            );
            extraction
        }
        None => {
            tracing::warn!(
                "Extractor response from {} contained no usable JSON object ({} bytes)",
                extractor.name(),
                response.len()
            );
            fallback(factors, horizon)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ForecastError;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedExtractor {
        response: Result<String, ForecastError>,
        calls: AtomicUsize,
    }

    impl CannedExtractor {
        fn ok(body: &str) -> Self {
            Self {
                response: Ok(body.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(ForecastError::Provider("timeout".into())),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StructuredExtractor for CannedExtractor {
        async fn extract(&self, _system: &str, _input: &str) -> Result<String, ForecastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn periods(n: usize) -> Vec<Period> {
        (1..=n).map(|q| Period::new(format!("FY27 Q{q}E"))).collect()
    }

    fn factors() -> Vec<ImpactFactor> {
        ImpactFactor::reference_set()
    }

    #[test]
    fn test_magnitude_and_direction_mapping() {
        assert_eq!(Magnitude::parse("medium").value(), 0.02);
        assert_eq!(Magnitude::parse("HIGH").value(), 0.03);
        assert_eq!(Magnitude::parse("huge").value(), 0.01);
        assert_eq!(Direction::parse(" Negative ").sign(), -1.0);
        assert_eq!(Direction::parse("sideways"), Direction::None);
    }

    #[test]
    fn test_failure_marker_detection() {
        assert!(is_failure_marker("Extraction failed: 503"));
        assert!(is_failure_marker("  情报获取失败: timeout"));
        assert!(!is_failure_marker("TSMC expanded CoWoS capacity"));
    }

    #[test]
    fn test_locate_json_object() {
        assert_eq!(locate_json_object("sure! {\"a\": {}} hope it helps"), Some("{\"a\": {}}"));
        assert_eq!(locate_json_object("no json here"), None);
        assert_eq!(locate_json_object("} backwards {"), None);
    }

    #[test]
    fn test_negative_medium_contributes_minus_two_points() {
        let body = r#"{"periods": [{"period": "FY27 Q1E", "impacts": [
            {"factor": "component_supply", "direction": "negative", "magnitude": "medium"}
        ]}], "notes": "HBM allocation tight"}"#;
        let out = parse_impact_response(body, &periods(4), &factors()).unwrap();
        assert_eq!(out.table.value("component_supply", 0), Some(-0.02));
        assert_relative_eq!(out.table.combined(0), -0.02);
        assert_eq!(out.rationale, "HBM allocation tight");
        assert_eq!(out.provenance, Provenance::Derived);
    }

    #[test]
    fn test_unknown_magnitude_uses_low_with_sign() {
        let body = r#"{"periods": [{"impacts": [
            {"factor": "customer_capex", "direction": "positive", "magnitude": "enormous"},
            {"factor": "supply_capacity", "direction": "negative"}
        ]}]}"#;
        let out = parse_impact_response(body, &periods(2), &factors()).unwrap();
        assert_eq!(out.table.value("customer_capex", 0), Some(0.01));
        assert_eq!(out.table.value("supply_capacity", 0), Some(-0.01));
        assert_eq!(out.rationale, GENERIC_RATIONALE);
    }

    #[test]
    fn test_duplicate_mentions_are_additive() {
        let body = r#"{"periods": [{"impacts": [
            {"factor": "customer_capex", "direction": "positive", "magnitude": "high"},
            {"factor": "customer_capex", "direction": "positive", "magnitude": "low"},
            {"factor": "customer_capex", "direction": "unclear", "magnitude": "high"}
        ]}]}"#;
        let out = parse_impact_response(body, &periods(1), &factors()).unwrap();
        assert_relative_eq!(out.table.value("customer_capex", 0).unwrap(), 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_entries_are_bounded_by_horizon() {
        let entry = r#"{"impacts": [{"factor": "supply_capacity", "direction": "positive", "magnitude": "low"}]}"#;
        let body = format!("{{\"periods\": [{entry}, {entry}, {entry}]}}");

        let out = parse_impact_response(&body, &periods(2), &factors()).unwrap();
        assert_eq!(out.table.validate(2), Ok(()));
        assert_eq!(out.table.value("supply_capacity", 1), Some(0.01));

        let out = parse_impact_response(&body, &periods(4), &factors()).unwrap();
        assert_eq!(out.table.value("supply_capacity", 2), Some(0.01));
        assert_eq!(out.table.value("supply_capacity", 3), Some(0.0));
    }

    #[test]
    fn test_object_keyed_factors_and_surrounding_prose() {
        let body = "Here is the analysis:\n```json\n{\"periods\": [{\"factors\": {\
            \"Customer_Capex\": {\"direction\": \"positive\", \"magnitude\": \"medium\"},\
            \"weather\": {\"direction\": \"negative\", \"magnitude\": \"high\"}}}],\
            \"notes\": \"  \"}\n```\nLet me know!";
        let out = parse_impact_response(body, &periods(4), &factors()).unwrap();
        assert_eq!(out.table.value("customer_capex", 0), Some(0.02));
        assert_relative_eq!(out.table.combined(0), 0.02);
        assert_eq!(out.rationale, GENERIC_RATIONALE);
    }

    #[test]
    fn test_custom_mixed_case_factors_receive_signal() {
        let custom = vec![
            ImpactFactor::new("HBM", "High-bandwidth memory supply"),
            ImpactFactor::new("CoWoS", "Advanced packaging capacity"),
        ];
        let body = r#"{"periods": [{"impacts": [
            {"factor": "HBM", "direction": "negative", "magnitude": "medium"},
            {"factor": " cowos ", "direction": "positive", "magnitude": "high"}
        ]}]}"#;
        let out = parse_impact_response(body, &periods(2), &custom).unwrap();
        assert_eq!(out.table.value("HBM", 0), Some(-0.02));
        assert_eq!(out.table.value("CoWoS", 0), Some(0.03));
        assert_relative_eq!(out.table.combined(0), 0.01, epsilon = 1e-12);
        assert_eq!(out.table.combined(1), 0.0);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(parse_impact_response("no braces at all", &periods(4), &factors()).is_none());
        assert!(parse_impact_response("{\"periods\": [", &periods(4), &factors()).is_none());
        assert!(parse_impact_response("{not json}", &periods(4), &factors()).is_none());
    }

    #[tokio::test]
    async fn test_missing_text_falls_back() {
        for n in [0, 1, 4, 8] {
            let extractor = CannedExtractor::ok("{}");
            let out = extract_impacts(None, &periods(n), &factors(), Some(&extractor)).await;
            assert!(out.table.is_zero());
            assert_eq!(out.table.validate(n), Ok(()));
            assert!(!out.rationale.is_empty());
            assert_eq!(out.provenance, Provenance::Fallback);
            assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_no_extractor_falls_back() {
        let out = extract_impacts(Some("capex up"), &periods(4), &factors(), None).await;
        assert_eq!(out, fallback(&factors(), 4));
    }

    #[tokio::test]
    async fn test_failure_marker_skips_extractor() {
        let extractor = CannedExtractor::ok("{}");
        let out = extract_impacts(
            Some("情报获取失败: 429 quota exceeded"),
            &periods(4),
            &factors(),
            Some(&extractor),
        )
        .await;
        assert_eq!(out, fallback(&factors(), 4));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extractor_error_falls_back() {
        let extractor = CannedExtractor::failing();
        let out =
            extract_impacts(Some("capex up"), &periods(4), &factors(), Some(&extractor)).await;
        assert_eq!(out, fallback(&factors(), 4));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back() {
        let extractor = CannedExtractor::ok("I could not produce JSON today.");
        let out =
            extract_impacts(Some("capex up"), &periods(4), &factors(), Some(&extractor)).await;
        assert_eq!(out, fallback(&factors(), 4));
    }

    #[tokio::test]
    async fn test_derived_vectors() {
        let extractor = CannedExtractor::ok(
            r#"{"periods": [
                {"period": "FY27 Q1E", "impacts": [{"factor": "customer_capex", "direction": "positive", "magnitude": "high"}]},
                {"period": "FY27 Q2E", "impacts": [{"factor": "supply_capacity", "direction": "negative", "magnitude": "low"}]}
            ], "notes": "Capex guides up, CoWoS still constrained."}"#,
        );
        let out = extract_impacts(
            Some("Microsoft and Meta raised capex guidance."),
            &periods(4),
            &factors(),
            Some(&extractor),
        )
        .await;
        assert_eq!(out.provenance, Provenance::Derived);
        assert_eq!(out.table.value("customer_capex", 0), Some(0.03));
        assert_eq!(out.table.value("supply_capacity", 1), Some(-0.01));
        assert_eq!(out.table.combined(2), 0.0);
        assert_eq!(out.rationale, "Capex guides up, CoWoS still constrained.");
    }

    #[test]
    fn test_system_instructions_list_periods_and_factors() {
        let text = system_instructions(&periods(2), &factors());
        assert!(text.contains("\"FY27 Q1E\", \"FY27 Q2E\""));
        assert!(text.contains("\"component_supply\""));
        assert!(text.contains("\"magnitude\""));
    }
}
