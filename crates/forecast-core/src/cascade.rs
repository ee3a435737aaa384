use crate::{BaselineAssumptions, ForecastError, ImpactTable, PeriodProjection};

/// Round to one decimal place, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Project revenue and profit across the forecast horizon.
///
/// Each period compounds on the previous period's *unrounded* values; rounding
/// is applied only to the figures stored in the emitted projections, so it
/// never compounds. Shape mismatches between `assumptions` and `impacts` are
/// rejected up front.
pub fn build_forecast(
    assumptions: &BaselineAssumptions,
    impacts: &ImpactTable,
) -> Result<Vec<PeriodProjection>, ForecastError> {
    assumptions.validate()?;
    impacts.validate(assumptions.horizon())?;

    let mut prev_revenue = assumptions.last_revenue;
    let mut prev_profit = assumptions.last_profit;
    let mut projections = Vec::with_capacity(assumptions.horizon());

    for (i, (period, base)) in assumptions
        .periods
        .iter()
        .zip(&assumptions.base_growth)
        .enumerate()
    {
        let revenue_growth = base + impacts.combined(i);
        let profit_growth = revenue_growth + assumptions.profit_leverage;

        let revenue = prev_revenue * (1.0 + revenue_growth);
        let profit = prev_profit * (1.0 + profit_growth);

        projections.push(PeriodProjection {
            period: period.clone(),
            revenue: round1(revenue),
            profit: round1(profit),
            revenue_growth,
            profit_growth,
        });

        prev_revenue = revenue;
        prev_profit = profit;
    }

    Ok(projections)
}
