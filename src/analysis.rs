use serde::{Deserialize, Serialize};

use crate::sweep::SweepRecord;

/// Point where a sweep moves from an unstable row to a stable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityTransition {
    /// Index of the first stable row after an unstable one
    pub index: usize,
    pub last_unstable_value: u32,
    pub first_stable_value: u32,
}

pub fn stability_transition(records: &[SweepRecord]) -> Option<StabilityTransition> {
    records
        .windows(2)
        .enumerate()
        .find(|(_, pair)| !pair[0].stability.is_stable() && pair[1].stability.is_stable())
        .map(|(idx, pair)| StabilityTransition {
            index: idx + 1,
            last_unstable_value: pair[0].value,
            first_stable_value: pair[1].value,
        })
}

pub fn first_stable(records: &[SweepRecord]) -> Option<&SweepRecord> {
    records.iter().find(|record| record.stability.is_stable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueConfiguration;
    use crate::sweep::{SweepRange, SweepRunner};

    fn service_rate_records(start: u32) -> Vec<SweepRecord> {
        let config =
            QueueConfiguration::derived(10, 250.0, 250.0).with_aggregate_arrival_rate(2500.0);
        SweepRunner::new(config)
            .unwrap()
            .sweep_service_rate(&SweepRange::inclusive(start, 350, 10))
            .unwrap()
    }

    #[test]
    fn transition_is_found_after_saturation() {
        let records = service_rate_records(250);
        let transition = stability_transition(&records).unwrap();
        assert_eq!(transition.index, 1);
        assert_eq!(transition.last_unstable_value, 250);
        assert_eq!(transition.first_stable_value, 260);
        assert_eq!(first_stable(&records).unwrap().value, 260);
    }

    #[test]
    fn all_stable_sweep_has_no_transition() {
        let records = service_rate_records(300);
        assert!(stability_transition(&records).is_none());
        assert_eq!(first_stable(&records).unwrap().value, 300);
    }

    #[test]
    fn empty_sweep_has_nothing() {
        assert!(stability_transition(&[]).is_none());
        assert!(first_stable(&[]).is_none());
    }
}
