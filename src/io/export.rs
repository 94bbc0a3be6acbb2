//! CSV exports for forecasts, component decompositions and backtests.
//!
//! The files are meant to be easy to consume in spreadsheets or plotting
//! scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{ComponentPoint, ForecastPoint};
use crate::error::{ForecastError, Result};
use crate::fit::BacktestResult;

/// Write `date,yhat,yhat_lower,yhat_upper`.
pub fn write_forecast_csv(path: &Path, forecast: &[ForecastPoint]) -> Result<()> {
    let mut out = create(path, "forecast")?;
    write_forecast(&mut out, forecast).map_err(|e| write_err(path, e))?;
    out.flush().map_err(|e| write_err(path, e))
}

/// Write trend, seasonal and event columns (one column per event name).
pub fn write_components_csv(path: &Path, components: &[ComponentPoint], event_names: &[String]) -> Result<()> {
    let mut out = create(path, "components")?;
    write_components(&mut out, components, event_names).map_err(|e| write_err(path, e))?;
    out.flush().map_err(|e| write_err(path, e))
}

/// Write `date,actual,predicted,lower,upper,error`.
pub fn write_backtest_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut out = create(path, "backtest")?;
    write_backtest(&mut out, result).map_err(|e| write_err(path, e))?;
    out.flush().map_err(|e| write_err(path, e))
}

fn create(path: &Path, what: &str) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .map_err(|e| ForecastError::io(format!("failed to create {what} CSV '{}'", path.display()), e))?;
    Ok(BufWriter::new(file))
}

fn write_err(path: &Path, e: std::io::Error) -> ForecastError {
    ForecastError::io(format!("failed to write '{}'", path.display()), e)
}

fn write_forecast<W: Write>(out: &mut W, forecast: &[ForecastPoint]) -> std::io::Result<()> {
    writeln!(out, "date,yhat,yhat_lower,yhat_upper")?;
    for p in forecast {
        writeln!(
            out,
            "{},{:.4},{:.4},{:.4}",
            p.date, p.point_estimate, p.lower_bound, p.upper_bound
        )?;
    }
    Ok(())
}

fn write_components<W: Write>(out: &mut W, components: &[ComponentPoint], event_names: &[String]) -> std::io::Result<()> {
    write!(out, "date,trend,weekly,yearly,events")?;
    for name in event_names {
        write!(out, ",event_{name}")?;
    }
    writeln!(out, ",yhat")?;

    for c in components {
        write!(out, "{},{:.4},{:.4},{:.4},{:.4}", c.date, c.trend, c.weekly, c.yearly, c.events)?;
        for name in event_names {
            let v = c
                .event_terms
                .iter()
                .find(|(n, _)| n == name)
                .map_or(0.0, |(_, v)| *v);
            write!(out, ",{v:.4}")?;
        }
        writeln!(out, ",{:.4}", c.total())?;
    }
    Ok(())
}

fn write_backtest<W: Write>(out: &mut W, result: &BacktestResult) -> std::io::Result<()> {
    writeln!(out, "date,actual,predicted,lower,upper,error")?;
    for (p, actual) in result.forecast.iter().zip(&result.actual) {
        writeln!(
            out,
            "{},{:.4},{:.4},{:.4},{:.4},{:.4}",
            p.date,
            actual,
            p.point_estimate,
            p.lower_bound,
            p.upper_bound,
            actual - p.point_estimate
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 5, day).unwrap()
    }

    #[test]
    fn forecast_rows_follow_header() {
        let forecast = vec![ForecastPoint {
            date: d(1),
            point_estimate: 10.0,
            lower_bound: 8.5,
            upper_bound: 11.5,
        }];
        let mut buf = Vec::new();
        write_forecast(&mut buf, &forecast).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "date,yhat,yhat_lower,yhat_upper\n2020-05-01,10.0000,8.5000,11.5000\n");
    }

    #[test]
    fn components_have_one_column_per_event() {
        let components = vec![ComponentPoint {
            date: d(2),
            trend: 100.0,
            weekly: -3.0,
            yearly: 1.0,
            events: 20.0,
            event_terms: vec![("lockdown".to_string(), 20.0)],
        }];
        let names = vec!["holi".to_string(), "lockdown".to_string()];
        let mut buf = Vec::new();
        write_components(&mut buf, &components, &names).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,trend,weekly,yearly,events,event_holi,event_lockdown,yhat");
        assert_eq!(lines[1], "2020-05-02,100.0000,-3.0000,1.0000,20.0000,0.0000,20.0000,118.0000");
    }

    #[test]
    fn forecast_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        write_forecast_csv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "date,yhat,yhat_lower,yhat_upper\n");

        let missing = dir.path().join("no/such/dir/out.csv");
        assert!(matches!(write_forecast_csv(&missing, &[]), Err(ForecastError::Io(_))));
    }
}
