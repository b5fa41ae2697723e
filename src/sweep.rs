use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::model::{evaluate, EvaluationResult, QueueConfiguration, Stability};
use crate::QueueError;

/// Whether a sweep range includes its end value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeEnd {
    #[default]
    Inclusive,
    Exclusive,
}

/// How a per-server arrival rate sweep treats the aggregate arrival rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalMode {
    /// aggregate = per-server rate * server count at every step
    #[default]
    Derived,
    /// aggregate keeps whatever value the configuration already holds
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxis {
    ServiceRate,
    ServerCount,
    ArrivalRatePerServer,
}

impl SweepAxis {
    pub fn name(self) -> &'static str {
        match self {
            SweepAxis::ServiceRate => "service_rate",
            SweepAxis::ServerCount => "server_count",
            SweepAxis::ArrivalRatePerServer => "arrival_rate_per_server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
    pub end_bound: RangeEnd,
}

impl SweepRange {
    pub fn inclusive(start: u32, end: u32, step: u32) -> Self {
        Self {
            start,
            end,
            step,
            end_bound: RangeEnd::Inclusive,
        }
    }

    pub fn exclusive(start: u32, end: u32, step: u32) -> Self {
        Self {
            start,
            end,
            step,
            end_bound: RangeEnd::Exclusive,
        }
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.step == 0 {
            return Err(QueueError::InvalidRange(
                "step must be greater than zero".to_string(),
            ));
        }

        if self.start > self.end {
            return Err(QueueError::InvalidRange(format!(
                "start ({}) must not exceed end ({})",
                self.start, self.end
            )));
        }

        Ok(())
    }

    /// Values visited by the sweep, in iteration order.
    ///
    /// An inclusive range reaches `end` only when `(end - start) % step == 0`.
    pub fn values(&self) -> Vec<u32> {
        let step = self.step.max(1) as usize;
        match self.end_bound {
            RangeEnd::Inclusive => (self.start..=self.end).step_by(step).collect(),
            RangeEnd::Exclusive => (self.start..self.end).step_by(step).collect(),
        }
    }
}

/// One row of a sweep: the configuration at that step plus its metrics.
///
/// Metrics that are undefined for an unstable system are `None`; this includes
/// utilization, which is only reported for stable rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub axis: SweepAxis,
    pub value: u32,
    pub server_count: u32,
    pub service_rate: f64,
    pub arrival_rate_per_server: f64,
    pub aggregate_arrival_rate: f64,
    pub stability: Stability,
    pub idle_probability: f64,
    pub expected_wait: Option<f64>,
    pub wait_probability: Option<f64>,
    pub utilization: Option<f64>,
}

impl SweepRecord {
    fn new(
        axis: SweepAxis,
        value: u32,
        config: &QueueConfiguration,
        evaluation: &EvaluationResult,
    ) -> Self {
        let utilization = evaluation
            .stability
            .is_stable()
            .then_some(evaluation.utilization);

        Self {
            axis,
            value,
            server_count: config.server_count,
            service_rate: config.service_rate,
            arrival_rate_per_server: config.arrival_rate_per_server,
            aggregate_arrival_rate: config.aggregate_arrival_rate,
            stability: evaluation.stability,
            idle_probability: evaluation.idle_probability,
            expected_wait: evaluation.expected_wait,
            wait_probability: evaluation.wait_probability,
            utilization,
        }
    }
}

/// Owns one mutable queue configuration and sweeps its fields.
///
/// Consecutive sweeps on the same runner see the configuration left behind by
/// the previous one: a server-count sweep after a service-rate sweep runs with
/// the last service rate visited.
#[derive(Debug, Clone)]
pub struct SweepRunner {
    config: QueueConfiguration,
}

impl SweepRunner {
    pub fn new(config: QueueConfiguration) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &QueueConfiguration {
        &self.config
    }

    pub fn into_config(self) -> QueueConfiguration {
        self.config
    }

    pub fn sweep_service_rate(
        &mut self,
        range: &SweepRange,
    ) -> Result<Vec<SweepRecord>, QueueError> {
        ensure_positive_start(SweepAxis::ServiceRate, range)?;
        self.run(SweepAxis::ServiceRate, range, |config, value| {
            config.service_rate = f64::from(value);
        })
    }

    pub fn sweep_server_count(
        &mut self,
        range: &SweepRange,
    ) -> Result<Vec<SweepRecord>, QueueError> {
        ensure_positive_start(SweepAxis::ServerCount, range)?;
        self.run(SweepAxis::ServerCount, range, |config, value| {
            config.server_count = value;
        })
    }

    pub fn sweep_arrival_rate_per_server(
        &mut self,
        range: &SweepRange,
        mode: ArrivalMode,
    ) -> Result<Vec<SweepRecord>, QueueError> {
        self.run(SweepAxis::ArrivalRatePerServer, range, |config, value| {
            config.arrival_rate_per_server = f64::from(value);
            if mode == ArrivalMode::Derived {
                config.derive_aggregate_arrival_rate();
            }
        })
    }

    fn run<F>(
        &mut self,
        axis: SweepAxis,
        range: &SweepRange,
        mut apply: F,
    ) -> Result<Vec<SweepRecord>, QueueError>
    where
        F: FnMut(&mut QueueConfiguration, u32),
    {
        range.validate()?;

        let span = info_span!("sweep", axis = axis.name());
        let _guard = span.enter();

        let values = range.values();
        let mut records = Vec::with_capacity(values.len());

        for value in values {
            apply(&mut self.config, value);
            let evaluation = evaluate(&self.config)?;

            debug!(
                value,
                rho = evaluation.utilization,
                p0 = evaluation.idle_probability,
                stability = evaluation.stability.label(),
                "evaluated sweep point"
            );

            records.push(SweepRecord::new(axis, value, &self.config, &evaluation));
        }

        let stable = records
            .iter()
            .filter(|record| record.stability.is_stable())
            .count();
        info!(
            points = records.len(),
            stable,
            unstable = records.len() - stable,
            "sweep complete"
        );

        Ok(records)
    }
}

fn ensure_positive_start(axis: SweepAxis, range: &SweepRange) -> Result<(), QueueError> {
    if range.start == 0 {
        return Err(QueueError::InvalidRange(format!(
            "{} sweep must start above zero",
            axis.name()
        )));
    }

    Ok(())
}
