use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, info_span};

use crate::analysis::{stability_transition, StabilityTransition};
use crate::config::{StudyConfig, SweepSpec};
use crate::model::QueueConfiguration;
use crate::output::{write_summary_json, write_sweep_csv};
use crate::sweep::{SweepRecord, SweepRunner};
use crate::QueueError;

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub spec: SweepSpec,
    pub records: Vec<SweepRecord>,
    pub transition: Option<StabilityTransition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyResult {
    pub base: QueueConfiguration,
    pub carry_over: bool,
    pub sweeps: Vec<SweepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

pub fn run_sweep(
    runner: &mut SweepRunner,
    spec: &SweepSpec,
) -> Result<Vec<SweepRecord>, QueueError> {
    let range = spec.range();
    match *spec {
        SweepSpec::ServiceRate { .. } => runner.sweep_service_rate(&range),
        SweepSpec::ServerCount { .. } => runner.sweep_server_count(&range),
        SweepSpec::ArrivalRatePerServer { mode, .. } => {
            runner.sweep_arrival_rate_per_server(&range, mode)
        }
    }
}

/// Run every configured sweep in order.
///
/// With `carry_over` the sweeps share one configuration, so each starts from
/// the state the previous sweep left behind; otherwise each sweep starts from
/// the base configuration.
pub fn run_study(config: &StudyConfig) -> Result<StudyResult, QueueError> {
    config.validate()?;

    let base = config.base_configuration();
    let span = info_span!("study", carry_over = config.carry_over);
    let _guard = span.enter();

    let mut shared = SweepRunner::new(base)?;
    let mut sweeps = Vec::with_capacity(config.sweeps.len());

    for spec in &config.sweeps {
        let records = if config.carry_over {
            run_sweep(&mut shared, spec)?
        } else {
            run_sweep(&mut SweepRunner::new(base)?, spec)?
        };

        let transition = stability_transition(&records);
        if let Some(transition) = transition {
            info!(
                parameter = spec.axis().name(),
                from = transition.last_unstable_value,
                to = transition.first_stable_value,
                "system becomes stable"
            );
        }

        sweeps.push(SweepOutcome {
            spec: *spec,
            records,
            transition,
        });
    }

    Ok(StudyResult {
        base,
        carry_over: config.carry_over,
        sweeps,
        output_dir: None,
    })
}

pub fn run_study_into_dir(
    config: &StudyConfig,
    output_dir: &Path,
) -> Result<StudyResult, QueueError> {
    let mut study = run_study(config)?;
    fs::create_dir_all(output_dir)?;

    for (idx, outcome) in study.sweeps.iter().enumerate() {
        let filename = format!("sweep_{idx:02}_{}.csv", outcome.spec.axis().name());
        write_sweep_csv(&output_dir.join(filename), &outcome.records)?;
    }

    study.output_dir = Some(output_dir.to_path_buf());
    write_summary_json(&output_dir.join("summary.json"), &study)?;

    info!(output_dir = %output_dir.display(), "study artifacts written");
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scenario;
    use crate::model::Stability;
    use approx::assert_relative_eq;

    #[test]
    fn combined_study_carries_service_rate() {
        let study = run_study(&Scenario::Combined.config()).unwrap();
        assert_eq!(study.sweeps.len(), 2);

        let service = &study.sweeps[0];
        assert_eq!(service.records.len(), 11);
        assert_eq!(service.records[0].stability, Stability::Unstable);
        assert_eq!(service.transition.unwrap().first_stable_value, 260);

        let servers = &study.sweeps[1];
        assert_eq!(servers.records.len(), 11);
        assert!(servers.transition.is_none());
        for record in &servers.records {
            assert_relative_eq!(record.service_rate, 350.0);
            assert_eq!(record.stability, Stability::Stable);
        }
    }

    #[test]
    fn independent_study_restarts_each_sweep() {
        let study = run_study(&Scenario::Independent.config()).unwrap();
        let servers = &study.sweeps[1];
        assert_relative_eq!(servers.records[0].service_rate, 250.0);
        assert_eq!(servers.records[0].stability, Stability::Unstable);
        assert_eq!(servers.transition.unwrap().first_stable_value, 11);
    }

    #[test]
    fn arrival_study_becomes_unstable_at_the_top() {
        let study = run_study(&Scenario::ArrivalRate.config()).unwrap();
        let records = &study.sweeps[0].records;
        assert_eq!(records.len(), 11);
        assert_relative_eq!(records[0].aggregate_arrival_rate, 1500.0);
        assert_eq!(records[10].stability, Stability::Unstable);
        assert!(records[..10].iter().all(|record| record.stability.is_stable()));
    }

    #[test]
    fn invalid_study_fails_before_running() {
        let config = StudyConfig {
            server_count: 0,
            ..StudyConfig::default()
        };
        assert!(run_study(&config).is_err());
    }

    #[test]
    fn artifacts_are_written_per_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let study = run_study_into_dir(&StudyConfig::default(), dir.path()).unwrap();

        assert_eq!(study.output_dir.as_deref(), Some(dir.path()));
        assert!(dir.path().join("sweep_00_service_rate.csv").is_file());
        assert!(dir.path().join("sweep_01_server_count.csv").is_file());

        let raw = fs::read_to_string(dir.path().join("summary.json")).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let first = &summary["sweeps"][0]["records"][0];
        assert_eq!(first["stability"], "unstable");
        assert!(first["expected_wait"].is_null());
        assert_eq!(summary["sweeps"][0]["spec"]["parameter"], "service_rate");
    }
}
