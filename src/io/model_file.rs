//! Fitted-model JSON files.
//!
//! A model file stores the fitted model together with the configuration it
//! was fitted with, so `predict` can later reproduce the same intervals without
//! the original data.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::fit::FittedModel;

const TOOL: &str = "case-forecast";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub version: String,
    pub config: ModelConfig,
    pub model: FittedModel,
}

impl ModelFile {
    pub fn new(config: ModelConfig, model: FittedModel) -> Self {
        Self {
            tool: TOOL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            model,
        }
    }
}

pub fn write_model_json(path: &Path, file: &ModelFile) -> Result<()> {
    let out = File::create(path)
        .map_err(|e| ForecastError::io(format!("failed to create model JSON '{}'", path.display()), e))?;
    serde_json::to_writer_pretty(BufWriter::new(out), file)
        .map_err(|e| ForecastError::io("failed to write model JSON", e))
}

pub fn read_model_json(path: &Path) -> Result<ModelFile> {
    let input = File::open(path)
        .map_err(|e| ForecastError::io(format!("failed to open model JSON '{}'", path.display()), e))?;
    let file: ModelFile = serde_json::from_reader(BufReader::new(input))
        .map_err(|e| ForecastError::MalformedInput(format!("invalid model JSON: {e}")))?;
    if file.tool != TOOL {
        return Err(ForecastError::MalformedInput(format!(
            "'{}' was written by '{}', not {TOOL}",
            path.display(),
            file.tool
        )));
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate, SyntheticSpec};
    use crate::domain::Event;
    use crate::fit::ForecastModel;
    use crate::models::EventCalendar;
    use chrono::Duration;

    #[test]
    fn saved_model_predicts_identically() {
        let spec = SyntheticSpec {
            days: 120,
            spikes: vec![(60, 2500.0), (61, 2500.0)],
            ..SyntheticSpec::default()
        };
        let obs = generate(&spec).unwrap();
        let calendar = EventCalendar::from_events(spec.spike_events("backlog")).unwrap();
        let model = ForecastModel::new(ModelConfig::default()).unwrap();
        let fitted = model.fit(&obs, &calendar).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write_model_json(&path, &ModelFile::new(model.config().clone(), fitted.clone())).unwrap();
        let loaded = read_model_json(&path).unwrap();

        assert_eq!(loaded.config, ModelConfig::default());
        let dates = fitted.trend().future_dates(14);
        let reloaded = ForecastModel::new(loaded.config).unwrap();
        let a = model.predict(&fitted, &dates).unwrap();
        let b = reloaded.predict(&loaded.model, &dates).unwrap();
        for (x, y) in a.iter().zip(&b) {
            approx::assert_relative_eq!(x.point_estimate, y.point_estimate, max_relative = 1e-12);
            approx::assert_relative_eq!(x.upper_bound, y.upper_bound, max_relative = 1e-12);
        }
        assert_eq!(
            loaded.model.calendar().events()[0],
            Event::new("backlog", spec.start + Duration::days(60)).with_window(0, 1)
        );
    }

    #[test]
    fn foreign_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"tool": "rv", "grid": []}"#).unwrap();
        assert!(matches!(read_model_json(&path), Err(ForecastError::MalformedInput(_))));
    }
}
