//! Formatted terminal output.
//!
//! Formatting lives in one place so the fitting code stays free of
//! presentation and output changes stay local.

use crate::domain::{ForecastPoint, ModelConfig, PreparedSeries, TrendSegment, UncertaintyMode};
use crate::fit::{BacktestResult, FittedModel};
use crate::report::{Outliers, Residual};

/// Data, fit diagnostics and fitted components.
pub fn format_fit_summary(prepared: &PreparedSeries, fitted: &FittedModel, config: &ModelConfig) -> String {
    let mut out = String::new();

    out.push_str("=== case-forecast ===\n");
    out.push_str(&format!(
        "Data: n={} | {} .. {}\n",
        prepared.observations.len(),
        fitted.first_observed(),
        fitted.last_observed()
    ));
    if prepared.duplicates_dropped > 0 || prepared.missing_days > 0 || !prepared.clamped.is_empty() {
        out.push_str(&format!(
            "Prep: duplicates dropped={} | missing days={} | negatives clamped={}\n",
            prepared.duplicates_dropped,
            prepared.missing_days,
            prepared.clamped.len()
        ));
    }
    out.push_str(&format!(
        "Fit: sigma={:.2} | solver iterations={} | active changepoints={}/{}\n",
        fitted.sigma(),
        fitted.iterations(),
        fitted.trend().active_changepoints().len(),
        fitted.trend().changepoints().len()
    ));
    let uncertainty = match config.uncertainty {
        UncertaintyMode::Normal => "normal".to_string(),
        UncertaintyMode::Simulated => format!("simulated ({} samples)", config.uncertainty_samples),
    };
    out.push_str(&format!(
        "Intervals: {:.0}% | {uncertainty}\n",
        config.interval_width * 100.0
    ));

    out.push_str("\nTrend segments:\n");
    out.push_str(&format_segments(&fitted.trend_segments()));

    out.push_str("\nSeasonality:\n");
    if fitted.seasonal_components().is_empty() {
        out.push_str("  (none)\n");
    }
    for c in fitted.seasonal_components() {
        out.push_str(&format!(
            "  {:<7} order={:<2} peak-to-peak={:.2}\n",
            c.period.name(),
            c.order,
            c.amplitude()
        ));
    }

    if !fitted.event_effects().is_empty() {
        out.push_str("\nEvents:\n");
        for e in fitted.event_effects() {
            out.push_str(&format!("  {:<20} {:>+12.2}\n", truncate(&e.name, 20), e.coefficient));
        }
    }
    out.push('\n');
    out
}

pub fn format_segments(segments: &[TrendSegment]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:<12} {:>12} {:>14}", "start", "end", "slope/day", "start value").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<14}", "", "", "", "").trim_end());
    out.push('\n');
    for s in segments {
        let end = s.end_date.map_or_else(|| "open".to_string(), |d| d.to_string());
        out.push_str(
            format!(
                "{:<12} {:<12} {:>12.3} {:>14.2}",
                s.start_date.to_string(),
                end,
                s.slope,
                s.intercept
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Forecast table, showing at most `max_rows` rows from the end.
pub fn format_forecast(forecast: &[ForecastPoint], max_rows: usize) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>14} {:>14} {:>14}", "date", "yhat", "lower", "upper").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<14} {:-<14} {:-<14}", "", "", "", "").trim_end());
    out.push('\n');

    let skip = forecast.len().saturating_sub(max_rows);
    if skip > 0 {
        out.push_str(&format!("... {skip} earlier rows\n"));
    }
    for p in &forecast[skip..] {
        out.push_str(
            format!(
                "{:<12} {:>14.2} {:>14.2} {:>14.2}",
                p.date.to_string(),
                p.point_estimate,
                p.lower_bound,
                p.upper_bound
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Largest in-sample misses on each side.
pub fn format_outliers(outliers: &Outliers) -> String {
    let mut out = String::new();
    out.push_str("Largest misses above fit:\n");
    out.push_str(&format_residual_table(&outliers.above));
    out.push('\n');
    out.push_str("Largest misses below fit:\n");
    out.push_str(&format_residual_table(&outliers.below));
    out
}

fn format_residual_table(rows: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>12} {:>12} {:>12}", "date", "actual", "fitted", "residual").trim_end());
    out.push('\n');
    for r in rows {
        out.push_str(
            format!(
                "{:<12} {:>12.2} {:>12.2} {:>+12.2}",
                r.date.to_string(),
                r.actual,
                r.fitted,
                r.residual
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

pub fn format_backtest(result: &BacktestResult) -> String {
    let mut out = String::new();
    out.push_str("=== backtest ===\n");
    out.push_str(&format!(
        "Split: {} | train n={} | test n={}\n",
        result.split_date,
        result.train_len,
        result.test_len()
    ));
    out.push_str(&format!(
        "MAE={:.3} RMSE={:.3} interval coverage={:.1}%\n",
        result.mae(),
        result.rmse(),
        result.coverage() * 100.0
    ));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
