use chrono::NaiveDate;
use forecast_core::{ImpactFactor, Period};

/// Analysis request sent to the intelligence provider.
pub fn intelligence_prompt(
    company: &str,
    as_of: NaiveDate,
    factors: &[ImpactFactor],
    periods: &[Period],
) -> String {
    let drivers = factors
        .iter()
        .map(|f| format!("- {}", f.label))
        .collect::<Vec<_>>()
        .join("\n");
    let horizon = periods
        .iter()
        .map(Period::label)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Today is {date}. Review the past week of news on {company}'s supply chain \
         and customer demand, covering these drivers:\n{drivers}\n\
         For each driver, state whether the evidence points to higher or lower revenue growth \
         over the forecast periods ({horizon}), how strong the effect is, and cite the developments \
         behind it. Finish with a short summary suitable for a weekly forward earnings report.",
        date = as_of.format("%B %-d, %Y"),
    )
}
