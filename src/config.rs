use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::model::QueueConfiguration;
use crate::sweep::{ArrivalMode, RangeEnd, SweepAxis, SweepRange};
use crate::QueueError;

pub const DEFAULT_RATE_STEP: u32 = 10;
pub const DEFAULT_COUNT_STEP: u32 = 1;

fn default_rate_step() -> u32 {
    DEFAULT_RATE_STEP
}

fn default_count_step() -> u32 {
    DEFAULT_COUNT_STEP
}

/// One sweep of a study, tagged by the parameter it varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "parameter", rename_all = "snake_case")]
pub enum SweepSpec {
    ServiceRate {
        start: u32,
        end: u32,
        #[serde(default = "default_rate_step")]
        step: u32,
        #[serde(default)]
        end_bound: RangeEnd,
    },
    ServerCount {
        start: u32,
        end: u32,
        #[serde(default = "default_count_step")]
        step: u32,
        #[serde(default)]
        end_bound: RangeEnd,
    },
    ArrivalRatePerServer {
        start: u32,
        end: u32,
        #[serde(default = "default_rate_step")]
        step: u32,
        #[serde(default)]
        end_bound: RangeEnd,
        #[serde(default)]
        mode: ArrivalMode,
    },
}

impl SweepSpec {
    pub fn axis(&self) -> SweepAxis {
        match self {
            SweepSpec::ServiceRate { .. } => SweepAxis::ServiceRate,
            SweepSpec::ServerCount { .. } => SweepAxis::ServerCount,
            SweepSpec::ArrivalRatePerServer { .. } => SweepAxis::ArrivalRatePerServer,
        }
    }

    pub fn range(&self) -> SweepRange {
        let (start, end, step, end_bound) = match *self {
            SweepSpec::ServiceRate {
                start,
                end,
                step,
                end_bound,
            }
            | SweepSpec::ServerCount {
                start,
                end,
                step,
                end_bound,
            }
            | SweepSpec::ArrivalRatePerServer {
                start,
                end,
                step,
                end_bound,
                ..
            } => (start, end, step, end_bound),
        };

        SweepRange {
            start,
            end,
            step,
            end_bound,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub server_count: u32,
    #[serde_as(as = "DefaultOnNull")]
    pub arrival_rate_per_server: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub service_rate: f64,
    /// Explicit aggregate arrival rate; `None` derives it from the per-server rate
    pub aggregate_arrival_rate: Option<f64>,
    #[serde_as(as = "DefaultOnNull")]
    pub carry_over: bool,
    #[serde(default)]
    pub sweeps: Vec<SweepSpec>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Scenario::Combined.config()
    }
}

impl StudyConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, QueueError> {
        let raw = fs::read_to_string(path)?;
        let config: StudyConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn base_configuration(&self) -> QueueConfiguration {
        let config = QueueConfiguration::derived(
            self.server_count,
            self.arrival_rate_per_server,
            self.service_rate,
        );

        match self.aggregate_arrival_rate {
            Some(rate) => config.with_aggregate_arrival_rate(rate),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        self.base_configuration().validate()?;

        if self.sweeps.is_empty() {
            return Err(QueueError::InvalidConfig(
                "at least one sweep must be configured".to_string(),
            ));
        }

        for spec in &self.sweeps {
            let range = spec.range();
            range.validate()?;

            if range.start == 0 && spec.axis() != SweepAxis::ArrivalRatePerServer {
                return Err(QueueError::InvalidRange(format!(
                    "{} sweep must start above zero",
                    spec.axis().name()
                )));
            }
        }

        Ok(())
    }
}

/// Built-in studies mirroring the reference capacity-planning reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Fixed load of 2500 on ten servers, service rate 250..=350
    ServiceRate,
    /// Ten servers at mu = 250, per-server arrivals 150..=250 with derived load
    ArrivalRate,
    /// Service-rate and server-count sweeps, each from the same fresh start
    Independent,
    /// Service-rate sweep, then server-count sweep at the last service rate
    Combined,
}

impl Scenario {
    pub fn config(self) -> StudyConfig {
        let service_rate_sweep = SweepSpec::ServiceRate {
            start: 250,
            end: 350,
            step: DEFAULT_RATE_STEP,
            end_bound: RangeEnd::Inclusive,
        };
        let server_count_sweep = SweepSpec::ServerCount {
            start: 10,
            end: 20,
            step: DEFAULT_COUNT_STEP,
            end_bound: RangeEnd::Inclusive,
        };

        let optimisation = StudyConfig {
            server_count: 10,
            arrival_rate_per_server: 250.0,
            service_rate: 250.0,
            aggregate_arrival_rate: Some(2500.0),
            carry_over: true,
            sweeps: vec![service_rate_sweep, server_count_sweep],
        };

        match self {
            Scenario::ServiceRate => StudyConfig {
                sweeps: vec![service_rate_sweep],
                ..optimisation
            },
            Scenario::ArrivalRate => StudyConfig {
                server_count: 10,
                arrival_rate_per_server: 200.0,
                service_rate: 250.0,
                aggregate_arrival_rate: None,
                carry_over: true,
                sweeps: vec![SweepSpec::ArrivalRatePerServer {
                    start: 150,
                    end: 250,
                    step: DEFAULT_RATE_STEP,
                    end_bound: RangeEnd::Inclusive,
                    mode: ArrivalMode::Derived,
                }],
            },
            Scenario::Independent => StudyConfig {
                carry_over: false,
                ..optimisation
            },
            Scenario::Combined => optimisation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_is_combined_study() {
        let config = StudyConfig::default();
        assert!(config.carry_over);
        assert_eq!(config.sweeps.len(), 2);
        assert_relative_eq!(config.base_configuration().aggregate_arrival_rate, 2500.0);
        config.validate().unwrap();
    }

    #[test]
    fn every_scenario_validates() {
        for scenario in Scenario::value_variants() {
            scenario.config().validate().unwrap();
        }
    }

    #[test]
    fn missing_aggregate_rate_is_derived() {
        let config = Scenario::ArrivalRate.config();
        assert_relative_eq!(config.base_configuration().aggregate_arrival_rate, 2000.0);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let raw = r#"{
            "server_count": 12,
            "carry_over": null,
            "sweeps": [
                { "parameter": "service_rate", "start": 200, "end": 300 },
                { "parameter": "server_count", "start": 10, "end": 21, "end_bound": "exclusive" },
                { "parameter": "arrival_rate_per_server", "start": 100, "end": 200, "step": 25, "mode": "held" }
            ]
        }"#;
        let config: StudyConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.server_count, 12);
        assert_relative_eq!(config.service_rate, 250.0);
        assert!(!config.carry_over);
        assert_eq!(
            config.sweeps[0],
            SweepSpec::ServiceRate {
                start: 200,
                end: 300,
                step: 10,
                end_bound: RangeEnd::Inclusive,
            }
        );
        assert_eq!(config.sweeps[1].range(), SweepRange::exclusive(10, 21, 1));
        assert_eq!(
            config.sweeps[2],
            SweepSpec::ArrivalRatePerServer {
                start: 100,
                end: 200,
                step: 25,
                end_bound: RangeEnd::Inclusive,
                mode: ArrivalMode::Held,
            }
        );
        config.validate().unwrap();
    }

    #[test]
    fn bundled_configs_match_scenarios() {
        let configs = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");

        let combined = StudyConfig::from_json_file(&configs.join("combined.json")).unwrap();
        assert_eq!(combined, Scenario::Combined.config());

        let arrival = StudyConfig::from_json_file(&configs.join("arrival_rate.json")).unwrap();
        assert_eq!(arrival, Scenario::ArrivalRate.config());
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StudyConfig::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(QueueError::Io(_))));
    }

    #[test]
    fn empty_study_is_rejected() {
        let config = StudyConfig {
            sweeps: Vec::new(),
            ..StudyConfig::default()
        };
        assert!(matches!(config.validate(), Err(QueueError::InvalidConfig(_))));
    }

    #[test]
    fn zero_server_sweep_is_rejected() {
        let config = StudyConfig {
            sweeps: vec![SweepSpec::ServerCount {
                start: 0,
                end: 4,
                step: 1,
                end_bound: RangeEnd::Inclusive,
            }],
            ..StudyConfig::default()
        };
        assert!(matches!(config.validate(), Err(QueueError::InvalidRange(_))));
    }

    #[test]
    fn negative_service_rate_is_rejected() {
        let config = StudyConfig {
            service_rate: -5.0,
            ..StudyConfig::default()
        };
        assert!(matches!(config.validate(), Err(QueueError::InvalidConfig(_))));
    }
}
