//! M/M/c queue evaluator
//!
//! Closed-form steady-state metrics for `c` identical exponential servers fed
//! by a Poisson stream: utilization, idle probability (P0), Erlang-C wait
//! probability and expected sojourn time.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::QueueError;

/// Parameter set for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueConfiguration {
    /// Number of parallel servers (c)
    pub server_count: u32,
    /// Arrival contribution per server, only used to derive the aggregate rate
    pub arrival_rate_per_server: f64,
    /// Service rate of a single server (mu)
    pub service_rate: f64,
    /// Total arrival rate seen by the system (lambda)
    pub aggregate_arrival_rate: f64,
}

impl QueueConfiguration {
    /// Build a configuration whose aggregate arrival rate is
    /// `arrival_rate_per_server * server_count`.
    pub fn derived(server_count: u32, arrival_rate_per_server: f64, service_rate: f64) -> Self {
        Self {
            server_count,
            arrival_rate_per_server,
            service_rate,
            aggregate_arrival_rate: arrival_rate_per_server * server_count as f64,
        }
    }

    /// Override the aggregate arrival rate independently of the per-server rate.
    pub fn with_aggregate_arrival_rate(mut self, aggregate_arrival_rate: f64) -> Self {
        self.aggregate_arrival_rate = aggregate_arrival_rate;
        self
    }

    /// Recompute the aggregate arrival rate from the per-server rate.
    pub fn derive_aggregate_arrival_rate(&mut self) {
        self.aggregate_arrival_rate = self.arrival_rate_per_server * self.server_count as f64;
    }

    /// Offered load in Erlangs (lambda / mu).
    pub fn offered_load(&self) -> f64 {
        self.aggregate_arrival_rate / self.service_rate
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.server_count == 0 {
            return Err(QueueError::InvalidConfig(
                "server_count must be greater than zero".to_string(),
            ));
        }

        if !self.service_rate.is_finite() || self.service_rate <= 0.0 {
            return Err(QueueError::InvalidConfig(format!(
                "service_rate must be finite and positive, got {}",
                self.service_rate
            )));
        }

        if !self.aggregate_arrival_rate.is_finite() || self.aggregate_arrival_rate < 0.0 {
            return Err(QueueError::InvalidConfig(format!(
                "aggregate_arrival_rate must be finite and non-negative, got {}",
                self.aggregate_arrival_rate
            )));
        }

        if !self.arrival_rate_per_server.is_finite() || self.arrival_rate_per_server < 0.0 {
            return Err(QueueError::InvalidConfig(format!(
                "arrival_rate_per_server must be finite and non-negative, got {}",
                self.arrival_rate_per_server
            )));
        }

        Ok(())
    }
}

/// Steady-state classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Stable,
    Unstable,
}

impl Stability {
    pub fn is_stable(self) -> bool {
        matches!(self, Stability::Stable)
    }

    /// Machine-friendly label used in CSV and JSON output
    pub fn label(self) -> &'static str {
        match self {
            Stability::Stable => "stable",
            Stability::Unstable => "unstable",
        }
    }

    /// Human-readable description in the locale of the reference reports
    pub fn description(self) -> &'static str {
        match self {
            Stability::Stable => "El sistema es estable",
            Stability::Unstable => "El sistema es inestable",
        }
    }
}

/// Metrics produced by one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub utilization: f64,
    pub stability: Stability,
    /// P0; zero by convention when unstable
    pub idle_probability: f64,
    pub wait_probability: Option<f64>,
    pub expected_wait: Option<f64>,
}

/// rho = lambda / (c * mu)
///
/// Callers must not pass `server_count == 0`.
pub fn utilization(config: &QueueConfiguration) -> f64 {
    debug_assert!(config.server_count > 0, "server_count must be positive");
    config.aggregate_arrival_rate / (config.server_count as f64 * config.service_rate)
}

/// Series terms a^n / n! for n in 0..=c, where a is the offered load.
///
/// Each term is the previous one times a / n, so the factorial is applied
/// exactly (integer by integer) without materialising a^n or n! on their own.
/// Returns `(sum of terms for n < c, term for n = c)`.
fn erlang_series(config: &QueueConfiguration) -> (f64, f64) {
    let load = config.offered_load();
    let mut term = 1.0_f64;
    let mut partial_sum = 0.0_f64;

    for n in 0..config.server_count {
        partial_sum += term;
        term *= load / f64::from(n + 1);
    }

    (partial_sum, term)
}

/// Idle probability P0 and the stability classification.
///
/// Returns `(0.0, Stability::Unstable)` when rho >= 1; the dependent metrics
/// must not be requested in that case.
pub fn idle_probability(config: &QueueConfiguration) -> (f64, Stability) {
    let rho = utilization(config);
    if rho >= 1.0 {
        return (0.0, Stability::Unstable);
    }

    let (partial_sum, erlang_term) = erlang_series(config);
    let normaliser = partial_sum + erlang_term / (1.0 - rho);

    if !normaliser.is_finite() {
        warn!(
            server_count = config.server_count,
            offered_load = config.offered_load(),
            "P0 normaliser overflowed, reporting NaN"
        );
        return (f64::NAN, Stability::Stable);
    }

    (1.0 / normaliser, Stability::Stable)
}

/// Erlang-C probability that an arrival has to queue.
///
/// `p0` must come from a stable [`idle_probability`] of the same configuration.
pub fn wait_probability(config: &QueueConfiguration, p0: f64) -> f64 {
    let (_, erlang_term) = erlang_series(config);
    let capacity = config.server_count as f64 * config.service_rate;

    erlang_term * (capacity / (capacity - config.aggregate_arrival_rate)) * p0
}

/// Expected sojourn time W (queueing delay plus one mean service time).
///
/// Evaluates `a^c * mu / ((c-1)! * (c*mu - lambda)^2) * P0 + 1/mu`, with
/// `a^c / (c-1)!` taken as `c * a^c / c!`.
/// `p0` must come from a stable [`idle_probability`] of the same configuration.
pub fn expected_wait(config: &QueueConfiguration, p0: f64) -> f64 {
    let (_, erlang_term) = erlang_series(config);
    let servers = config.server_count as f64;
    let spare_capacity = servers * config.service_rate - config.aggregate_arrival_rate;

    let numerator = servers * erlang_term * config.service_rate;
    let denominator = spare_capacity * spare_capacity;

    numerator / denominator * p0 + 1.0 / config.service_rate
}

/// Validate the configuration, then compute every metric it supports.
///
/// The stability check runs first; wait probability and expected wait are
/// only computed for stable systems and are `None` otherwise.
pub fn evaluate(config: &QueueConfiguration) -> Result<EvaluationResult, QueueError> {
    config.validate()?;

    let utilization = utilization(config);
    let (idle_probability, stability) = idle_probability(config);

    let (wait_probability, expected_wait) = match stability {
        Stability::Stable => (
            Some(wait_probability(config, idle_probability)),
            Some(expected_wait(config, idle_probability)),
        ),
        Stability::Unstable => (None, None),
    };

    Ok(EvaluationResult {
        utilization,
        stability,
        idle_probability,
        wait_probability,
        expected_wait,
    })
}
