pub mod exposition;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use parking_lot::RwLock;

pub const DETECTED_CHANGES: &str = "drift_monitor_agent_drift_detected_changes";
pub const CHECK_SUCCESS: &str = "drift_monitor_agent_drift_check_success";
pub const CHECK_ERROR: &str = "drift_monitor_agent_drift_check_error";
pub const CHECK_DURATION: &str = "drift_monitor_agent_drift_check_duration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Fetch,
    Plan,
    Total,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Plan => "plan",
            Self::Total => "total",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named gauge keyed by its label values. Last write wins per label tuple.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    values: RwLock<BTreeMap<Vec<String>, f64>>,
}

impl Gauge {
    pub fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn label_names(&self) -> &'static [&'static str] {
        self.label_names
    }

    pub fn set(&self, labels: &[&str], value: f64) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key = labels.iter().map(|l| l.to_string()).collect();
        self.values.write().insert(key, value);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.values.read().get(&key).copied()
    }

    pub fn samples(&self) -> Vec<(Vec<String>, f64)> {
        self.values
            .read()
            .iter()
            .map(|(labels, value)| (labels.clone(), *value))
            .collect()
    }
}

/// The four drift-check gauges, labelled by deployment name.
#[derive(Debug)]
pub struct MetricsRegistry {
    pub detected_changes: Gauge,
    pub check_success: Gauge,
    pub check_error: Gauge,
    pub check_duration: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            detected_changes: Gauge::new(
                DETECTED_CHANGES,
                "Number of drift detected changes",
                &["name"],
            ),
            check_success: Gauge::new(CHECK_SUCCESS, "Number of successful drift checks", &["name"]),
            check_error: Gauge::new(CHECK_ERROR, "Number of error drift checks", &["name"]),
            check_duration: Gauge::new(
                CHECK_DURATION,
                "Duration of drift checks",
                &["name", "phase"],
            ),
        }
    }

    pub fn gauges(&self) -> [&Gauge; 4] {
        [
            &self.detected_changes,
            &self.check_success,
            &self.check_error,
            &self.check_duration,
        ]
    }

    pub fn record_success(&self, name: &str, effective_changes: usize) {
        self.detected_changes.set(&[name], effective_changes as f64);
        self.check_success.set(&[name], 1.0);
        self.check_error.set(&[name], 0.0);
    }

    pub fn record_failure(&self, name: &str) {
        self.check_success.set(&[name], 0.0);
        self.check_error.set(&[name], 1.0);
    }

    pub fn record_duration(&self, name: &str, phase: Phase, seconds: f64) {
        self.check_duration.set(&[name, phase.as_str()], seconds);
    }

    /// Missing values read as 0.
    pub fn success(&self, name: &str) -> f64 {
        self.check_success.get(&[name]).unwrap_or(0.0)
    }

    pub fn error(&self, name: &str) -> f64 {
        self.check_error.get(&[name]).unwrap_or(0.0)
    }

    pub fn detected_changes(&self, name: &str) -> f64 {
        self.detected_changes.get(&[name]).unwrap_or(0.0)
    }

    pub fn duration(&self, name: &str, phase: Phase) -> Option<f64> {
        self.check_duration.get(&[name, phase.as_str()])
    }

    pub fn render(&self) -> String {
        exposition::render(&self.gauges())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricsRegistry, Phase};

    #[test]
    fn success_and_error_are_complementary() {
        let metrics = MetricsRegistry::new();
        metrics.record_success("net", 3);
        assert_eq!(metrics.success("net") + metrics.error("net"), 1.0);
        assert_eq!(metrics.detected_changes("net"), 3.0);

        metrics.record_failure("net");
        assert_eq!(metrics.success("net"), 0.0);
        assert_eq!(metrics.error("net"), 1.0);
        // A failed run leaves the last observed change count in place.
        assert_eq!(metrics.detected_changes("net"), 3.0);
    }

    #[test]
    fn unknown_names_read_as_zero() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.success("ghost"), 0.0);
        assert_eq!(metrics.error("ghost"), 0.0);
        assert!(metrics.duration("ghost", Phase::Total).is_none());
    }

    #[test]
    fn durations_are_tracked_per_phase() {
        let metrics = MetricsRegistry::new();
        metrics.record_duration("net", Phase::Fetch, 1.5);
        metrics.record_duration("net", Phase::Total, 4.0);
        metrics.record_duration("net", Phase::Total, 2.0);
        assert_eq!(metrics.duration("net", Phase::Fetch), Some(1.5));
        assert_eq!(metrics.duration("net", Phase::Total), Some(2.0));
        assert!(metrics.duration("net", Phase::Plan).is_none());
    }
}
