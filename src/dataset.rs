//! Filtering and grouping of loaded measurement records.
//!
//! Records are rehydrated by [`crate::results::load`]; this module decides
//! which of them take part in an analysis and groups the survivors by
//! experiment and machine.

use crate::cli::Metric;
use crate::results::MeasurementRecord;
use indexmap::IndexMap;
use serde::Serialize;

/// Records of one (experiment, machine) pair, ordered by message size
pub type Series = Vec<MeasurementRecord>;

/// Inclusion criteria for analysis
///
/// Empty `experiments`/`machines` lists mean "no restriction".
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub max_size: u64,
    pub experiments: Vec<String>,
    pub machines: Vec<String>,
    pub max_failed: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_size: u64::MAX,
            experiments: Vec::new(),
            machines: Vec::new(),
            max_failed: 0,
        }
    }
}

impl FilterConfig {
    /// Whether a record satisfies every criterion
    pub fn accepts(&self, record: &MeasurementRecord) -> bool {
        record.time_per_request > 0.0
            && record.failed_count <= self.max_failed
            && record.total_transferred <= self.max_size
            && (self.machines.is_empty() || self.machines.contains(&record.machine_tag))
            && (self.experiments.is_empty() || self.experiments.contains(&record.experiment_tag))
    }
}

/// Keep the records accepted by `config`, preserving their order
pub fn filter(records: &[MeasurementRecord], config: &FilterConfig) -> Vec<MeasurementRecord> {
    records
        .iter()
        .filter(|record| config.accepts(record))
        .cloned()
        .collect()
}

/// Records grouped by experiment, then machine
///
/// Both levels keep the order in which a key was first seen; callers that
/// want a stable legend order pass explicit lists to [`Aggregate::select`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    groups: IndexMap<String, IndexMap<String, Series>>,
}

/// Group records by (experiment, machine) and sort each series by size
pub fn aggregate(records: &[MeasurementRecord]) -> Aggregate {
    let mut groups: IndexMap<String, IndexMap<String, Series>> = IndexMap::new();
    for record in records {
        groups
            .entry(record.experiment_tag.clone())
            .or_default()
            .entry(record.machine_tag.clone())
            .or_default()
            .push(record.clone());
    }

    for machines in groups.values_mut() {
        for series in machines.values_mut() {
            series.sort_by_key(|r| r.total_transferred);
        }
    }

    Aggregate { groups }
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Experiment tags in first-seen order
    pub fn experiments(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Machine tags of one experiment in first-seen order
    pub fn machines(&self, experiment: &str) -> impl Iterator<Item = &str> {
        self.groups
            .get(experiment)
            .into_iter()
            .flat_map(|machines| machines.keys().map(String::as_str))
    }

    pub fn series(&self, experiment: &str, machine: &str) -> Option<&Series> {
        self.groups.get(experiment)?.get(machine)
    }

    /// Every (experiment, machine, series) triple in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Series)> {
        self.groups.iter().flat_map(|(experiment, machines)| {
            machines
                .iter()
                .map(move |(machine, series)| (experiment.as_str(), machine.as_str(), series))
        })
    }

    /// Existing series for the cartesian product of the given lists, in
    /// list order (experiments outer, machines inner)
    ///
    /// An empty list stands for every key in first-seen order.
    pub fn select(&self, experiments: &[String], machines: &[String]) -> Vec<(&str, &str, &Series)> {
        let experiment_keys: Vec<&str> = if experiments.is_empty() {
            self.experiments().collect()
        } else {
            experiments.iter().map(String::as_str).collect()
        };

        let mut selected = Vec::new();
        for experiment in experiment_keys {
            let Some((experiment, group)) = self.groups.get_key_value(experiment) else {
                continue;
            };
            let machine_keys: Vec<&str> = if machines.is_empty() {
                group.keys().map(String::as_str).collect()
            } else {
                machines.iter().map(String::as_str).collect()
            };
            for machine in machine_keys {
                if let Some((machine, series)) = group.get_key_value(machine) {
                    selected.push((experiment.as_str(), machine.as_str(), series));
                }
            }
        }
        selected
    }

    /// Largest value of `metric` over all series, 0 when empty
    pub fn maximum(&self, metric: Metric) -> f64 {
        self.iter()
            .flat_map(|(_, _, series)| series.iter().map(move |r| metric.value(r)))
            .fold(0.0, f64::max)
    }

    /// Largest message size over all series, 0 when empty
    pub fn max_size(&self) -> u64 {
        self.iter()
            .filter_map(|(_, _, series)| series.last().map(|r| r.total_transferred))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(experiment: &str, machine: &str, size: u64, tpr: f64, failed: u64) -> MeasurementRecord {
        MeasurementRecord {
            machine_tag: machine.to_string(),
            experiment_tag: experiment.to_string(),
            document: format!("/mping/{}", size),
            failed_count: failed,
            concurrency: 1,
            total_transferred: size,
            time_per_request: tpr,
            transfer_rate: 1.0,
            requests_per_second: 1.0,
            retries: 0,
            response_code: 200,
        }
    }

    fn dataset() -> Vec<MeasurementRecord> {
        vec![
            record("weave", "m3.large", 300, 4.0, 0),
            record("bare", "m3.large", 200, 2.0, 0),
            record("weave", "m3.large", 100, 3.0, 0),
            record("bare", "m3.xlarge", 50, 1.0, 0),
            record("bare", "m3.large", 10, 0.0, 0),
            record("docker", "m3.large", 20, -1.0, 0),
            record("docker", "m3.xlarge", 5000, 5.0, 2),
        ]
    }

    #[test]
    fn test_filter_without_lists_keeps_valid_records_regardless_of_size() {
        let records = dataset();
        let unbounded = filter(&records, &FilterConfig::default());
        assert_eq!(unbounded.len(), 4);
        assert!(unbounded.iter().all(|r| r.time_per_request > 0.0 && r.failed_count == 0));

        let bounded = filter(
            &records,
            &FilterConfig {
                max_size: 1,
                ..Default::default()
            },
        );
        assert!(bounded.is_empty());
    }

    #[test]
    fn test_filter_excludes_oversized_record() {
        let records = vec![
            record("bare", "m", 1000, 1.0, 0),
            record("bare", "m", 1001, 1.0, 0),
        ];
        let kept = filter(
            &records,
            &FilterConfig {
                max_size: 1000,
                ..Default::default()
            },
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].total_transferred, 1000);
    }

    #[test]
    fn test_filter_honours_failure_threshold_and_lists() {
        let records = dataset();

        let tolerant = filter(
            &records,
            &FilterConfig {
                max_failed: 2,
                ..Default::default()
            },
        );
        assert_eq!(tolerant.len(), 5);

        let only_bare_large = filter(
            &records,
            &FilterConfig {
                experiments: vec!["bare".to_string()],
                machines: vec!["m3.large".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(only_bare_large.len(), 1);
        assert_eq!(only_bare_large[0].total_transferred, 200);
    }

    #[test]
    fn test_aggregate_groups_in_first_seen_order_and_sorts_series() {
        let agg = aggregate(&filter(&dataset(), &FilterConfig::default()));

        assert_eq!(agg.experiments().collect::<Vec<_>>(), vec!["weave", "bare"]);
        assert_eq!(
            agg.machines("bare").collect::<Vec<_>>(),
            vec!["m3.large", "m3.xlarge"]
        );
        let weave = agg.series("weave", "m3.large").unwrap();
        assert_eq!(
            weave.iter().map(|r| r.total_transferred).collect::<Vec<_>>(),
            vec![100, 300]
        );
        assert!(agg.series("docker", "m3.large").is_none());
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = filter(&dataset(), &FilterConfig::default());
        assert_eq!(aggregate(&records), aggregate(&records));
    }

    #[test]
    fn test_select_follows_caller_order() {
        let agg = aggregate(&filter(&dataset(), &FilterConfig::default()));

        let selected = agg.select(
            &["bare".to_string(), "missing".to_string(), "weave".to_string()],
            &["m3.xlarge".to_string(), "m3.large".to_string()],
        );
        let keys: Vec<(&str, &str)> = selected.iter().map(|(e, m, _)| (*e, *m)).collect();
        assert_eq!(
            keys,
            vec![
                ("bare", "m3.xlarge"),
                ("bare", "m3.large"),
                ("weave", "m3.large")
            ]
        );

        assert_eq!(agg.select(&[], &[]).len(), 3);
    }

    #[test]
    fn test_maximum_and_max_size() {
        let agg = aggregate(&filter(&dataset(), &FilterConfig::default()));
        assert_eq!(agg.maximum(Metric::Latency), 4.0);
        assert_eq!(agg.max_size(), 300);
        assert_eq!(Aggregate::default().max_size(), 0);
    }
}
