use forecast_core::{ForecastReport, Provenance};

const LABEL_TD: &str = "padding:8px 12px;color:#94a3b8;";
const VALUE_TD: &str = "padding:8px 12px;font-weight:600;";
const HEAD_TD: &str = "padding:8px 12px;color:#64748b;font-size:12px;text-align:left;border-bottom:1px solid #e2e8f0;";

pub struct ReportTemplate;

impl ReportTemplate {
    pub fn render(report: &ForecastReport) -> String {
        let header = format!(
            r#"<div style="background:#1e293b;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">{company} Forward Earnings Report &mdash; {date}</div>"#,
            company = escape(&report.company),
            date = report.generated_on.format("%Y-%m-%d"),
        );

        let intelligence = match report.intelligence.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => format!(
                r#"<div style="padding:16px 20px;color:#334155;line-height:1.5;">{}</div>"#,
                escape(text).replace('\n', "<br>")
            ),
            _ => r#"<div style="padding:16px 20px;color:#94a3b8;">No analysis text was available for this run.</div>"#
                .to_string(),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="640" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {header}
        {section_projection}
        {projections}
        {section_impacts}
        {impacts}
        <p style="padding:0 20px;color:#334155;">{rationale}</p>
        {section_intel}
        {intelligence}
        {section_assumptions}
        {assumptions}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          Mechanical cascade of baseline growth plus impact adjustments. Not investment advice.
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Forecast Sentinel</p>
  </td></tr>
</table>
</body>
</html>"#,
            section_projection = section("Projection (USD bn)"),
            projections = projection_table(report),
            section_impacts = section(&format!(
                "Impact vectors {}",
                provenance_badge(report.provenance)
            )),
            impacts = impact_table(report),
            rationale = escape(&report.rationale),
            section_intel = section("Analysis"),
            section_assumptions = section("Baseline assumptions"),
            assumptions = assumptions_table(report),
        )
    }
}

fn section(title: &str) -> String {
    format!(
        r#"<h3 style="margin:0;padding:16px 20px 8px;color:#0f172a;font-size:15px;">{title}</h3>"#
    )
}

fn provenance_badge(provenance: Provenance) -> String {
    let color = match provenance {
        Provenance::Derived => "#3b82f6",
        Provenance::Fallback => "#94a3b8",
    };
    format!(
        r#"<span style="background:{color};color:#fff;border-radius:4px;padding:2px 6px;font-size:11px;font-weight:600;">{}</span>"#,
        provenance.label()
    )
}

fn growth_color(value: f64) -> &'static str {
    if value > 0.0 {
        "#22c55e"
    } else if value < 0.0 {
        "#ef4444"
    } else {
        "#334155"
    }
}

fn projection_table(report: &ForecastReport) -> String {
    let rows: String = report
        .projections
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let shade = if i % 2 == 1 { r#" style="background:#f8fafc;""# } else { "" };
            format!(
                r#"<tr{shade}><td style="{LABEL_TD}">{period}</td><td style="{VALUE_TD}">${revenue:.1}</td><td style="{VALUE_TD}color:{rc};">{rg:+.1}%</td><td style="{VALUE_TD}">${profit:.1}</td><td style="{VALUE_TD}color:{pc};">{pg:+.1}%</td></tr>"#,
                period = escape(p.period.label()),
                revenue = p.revenue,
                rc = growth_color(p.revenue_growth),
                rg = p.revenue_growth * 100.0,
                profit = p.profit,
                pc = growth_color(p.profit_growth),
                pg = p.profit_growth * 100.0,
            )
        })
        .collect();

    format!(
        r#"<table style="width:100%;border-collapse:collapse;">
  <tr><th style="{HEAD_TD}">Period</th><th style="{HEAD_TD}">Revenue</th><th style="{HEAD_TD}">Growth</th><th style="{HEAD_TD}">Net income</th><th style="{HEAD_TD}">Growth</th></tr>
  {rows}
</table>"#
    )
}

fn impact_table(report: &ForecastReport) -> String {
    let head: String = report
        .assumptions
        .periods
        .iter()
        .map(|p| format!(r#"<th style="{HEAD_TD}">{}</th>"#, escape(p.label())))
        .collect();

    let rows: String = report
        .impacts
        .rows()
        .iter()
        .map(|row| {
            let cells: String = row
                .adjustments
                .iter()
                .map(|v| {
                    format!(
                        r#"<td style="{VALUE_TD}color:{};">{:+.1}pp</td>"#,
                        growth_color(*v),
                        v * 100.0
                    )
                })
                .collect();
            format!(
                r#"<tr><td style="{LABEL_TD}">{}</td>{cells}</tr>"#,
                escape(&row.factor.label)
            )
        })
        .collect();

    format!(
        r#"<table style="width:100%;border-collapse:collapse;">
  <tr><th style="{HEAD_TD}">Factor</th>{head}</tr>
  {rows}
</table>"#
    )
}

fn assumptions_table(report: &ForecastReport) -> String {
    let a = &report.assumptions;
    let growth = a
        .base_growth
        .iter()
        .map(|g| format!("{:.1}%", g * 100.0))
        .collect::<Vec<_>>()
        .join(" / ");

    format!(
        r#"<table style="width:100%;border-collapse:collapse;">
  <tr><td style="{LABEL_TD}">Last revenue</td><td style="{VALUE_TD}">${:.1}</td></tr>
  <tr style="background:#f8fafc;"><td style="{LABEL_TD}">Last net income</td><td style="{VALUE_TD}">${:.1}</td></tr>
  <tr><td style="{LABEL_TD}">Base growth</td><td style="{VALUE_TD}">{growth}</td></tr>
  <tr style="background:#f8fafc;"><td style="{LABEL_TD}">Profit leverage</td><td style="{VALUE_TD}">{:+.1}pp</td></tr>
</table>"#,
        a.last_revenue,
        a.last_profit,
        a.profit_leverage * 100.0,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_report;

    #[test]
    fn test_render_contains_projection_figures() {
        let html = ReportTemplate::render(&sample_report());
        assert!(html.contains("NVIDIA Forward Earnings Report &mdash; 2026-01-15"));
        assert!(html.contains("FY27 Q1E"));
        assert!(html.contains("$46.2"));
        assert!(html.contains("$28.1"));
        assert!(html.contains("+10.0%"));
        assert!(html.contains("+12.0%"));
    }

    #[test]
    fn test_render_escapes_analysis_text() {
        let html = ReportTemplate::render(&sample_report());
        assert!(html.contains("TSMC &lt;CoWoS&gt; capacity up"));
        assert!(!html.contains("<CoWoS>"));
    }

    #[test]
    fn test_render_marks_provenance() {
        let mut report = sample_report();
        let html = ReportTemplate::render(&report);
        assert!(html.contains("baseline only"));

        report.provenance = Provenance::Derived;
        report.intelligence = None;
        let html = ReportTemplate::render(&report);
        assert!(html.contains("auto-derived"));
        assert!(html.contains("No analysis text was available"));
    }
}
