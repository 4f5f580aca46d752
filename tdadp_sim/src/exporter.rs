//! JSON exporter for experiment results.

use crate::attack::AttackParams;
use crate::dataset::DatasetSource;
use crate::error::Result;
use crate::report::Report;
use crate::runner::ExperimentResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use tdadp_core::{EngineConfig, RunMetrics};
use uuid::Uuid;

/// Complete experiment export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentExport {
    /// Experiment id (uuid derived from the seed)
    pub experiment_id: Uuid,

    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub dataset: DatasetSource,

    pub engine: EngineConfig,

    pub attack: AttackParams,

    /// Per-run metrics
    pub runs: Vec<RunMetrics>,

    pub summary: Report,
}

impl ExperimentExport {
    /// Creates an export from a finished experiment.
    pub fn new(result: &ExperimentResult, dataset: &DatasetSource, engine: &EngineConfig) -> Self {
        Self {
            experiment_id: result.id.0,
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            dataset: dataset.clone(),
            engine: engine.clone(),
            attack: result.attack,
            runs: result.runs.clone(),
            summary: result.report.clone(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticParams;
    use crate::runner::ExperimentRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_export_round_trips_through_file() {
        let params = SyntheticParams {
            tasks: 30,
            workers: 10,
            workers_per_task: 3,
            golden_tasks: 4,
            ..SyntheticParams::default()
        };
        let runner = ExperimentRunner::new(11, 2)
            .with_params(params)
            .with_virtual_clock(true);
        let result = runner.run(ScenarioId::Sybil, AttackParams::default()).unwrap();

        let export = ExperimentExport::new(&result, runner.source(), runner.config());
        let path = std::env::temp_dir().join(format!("tdadp-export-{}.json", export.experiment_id));
        let path = path.to_string_lossy().to_string();
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: ExperimentExport = serde_json::from_str(&text).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.scenario, "sybil");
        assert_eq!(back.seed, 11);
        assert_eq!(back.runs.len(), 2);
        assert_eq!(back.summary.runs, 2);
        assert!((back.summary.accuracy.mean - result.report.accuracy.mean).abs() < 1e-9);
        assert!(matches!(back.dataset, DatasetSource::Synthetic(ref p) if p.tasks == 30));
    }
}
