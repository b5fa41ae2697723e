//! MMC - steady-state M/M/c queue evaluation
//!
//! Evaluates the closed-form Erlang-C metrics of a multi-server queue and
//! drives deterministic parameter sweeps (service rate, server count,
//! per-server arrival rate) over them, producing ordered result records for
//! tabular reporting.

pub mod analysis;
pub mod config;
pub mod logging;
pub mod model;
pub mod output;
pub mod study;
pub mod sweep;

use thiserror::Error;

// Re-export main types
pub use analysis::{first_stable, stability_transition, StabilityTransition};
pub use config::{Scenario, StudyConfig, SweepSpec};
pub use model::{evaluate, EvaluationResult, QueueConfiguration, Stability};
pub use output::create_timestamped_output_dir;
pub use study::{run_study, run_study_into_dir, StudyResult, SweepOutcome};
pub use sweep::{ArrivalMode, RangeEnd, SweepAxis, SweepRange, SweepRecord, SweepRunner};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid sweep range: {0}")]
    InvalidRange(String),
}
