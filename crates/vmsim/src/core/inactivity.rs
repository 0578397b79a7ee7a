//! Detection of idle VMs from recent telemetry.

use serde::{Deserialize, Serialize};

use crate::core::telemetry::{Metric, MetricSeries};
use crate::core::window::MetricsQuery;

const BYTES_IN_MB: f64 = 1024. * 1024.;

/// Thresholds below which a running VM is considered idle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InactivityPolicy {
    /// Length of the inspected telemetry window.
    pub window_minutes: u32,
    /// Mean CPU utilization in percent.
    pub cpu_threshold: f64,
    /// Total inbound plus outbound traffic in MiB.
    pub net_threshold_mb: f64,
}

impl Default for InactivityPolicy {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            cpu_threshold: 5.0,
            net_threshold_mb: 10.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InactivityVerdict {
    Active { mean_cpu: f64, network_mb: f64 },
    Idle { mean_cpu: f64, network_mb: f64 },
    InsufficientData,
}

impl InactivityVerdict {
    pub fn is_idle(&self) -> bool {
        matches!(self, InactivityVerdict::Idle { .. })
    }
}

impl InactivityPolicy {
    /// Returns metrics query covering the inspected window.
    pub fn query(&self) -> MetricsQuery {
        MetricsQuery::last_minutes(self.window_minutes)
    }

    /// Evaluates telemetry of the inspected window.
    pub fn evaluate(&self, series: &MetricSeries) -> InactivityVerdict {
        let cpu = match series.get(&Metric::PercentageCpu) {
            Some(points) if !points.is_empty() => points,
            _ => return InactivityVerdict::InsufficientData,
        };
        let mean_cpu = cpu.iter().map(|p| p.value).sum::<f64>() / cpu.len() as f64;
        let network_bytes: f64 = [Metric::NetworkInTotal, Metric::NetworkOutTotal]
            .iter()
            .filter_map(|metric| series.get(metric))
            .flat_map(|points| points.iter().map(|p| p.value))
            .sum();
        let network_mb = network_bytes / BYTES_IN_MB;
        if mean_cpu < self.cpu_threshold && network_mb < self.net_threshold_mb {
            InactivityVerdict::Idle { mean_cpu, network_mb }
        } else {
            InactivityVerdict::Active { mean_cpu, network_mb }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::core::telemetry::DataPoint;

    fn series(cpu: &[f64], net: &[f64]) -> MetricSeries {
        let t = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let points = |values: &[f64]| {
            values
                .iter()
                .map(|&value| DataPoint { timestamp: t, value })
                .collect::<Vec<_>>()
        };
        let mut series = MetricSeries::new();
        series.insert(Metric::PercentageCpu, points(cpu));
        series.insert(Metric::NetworkInTotal, points(net));
        series.insert(Metric::NetworkOutTotal, points(net));
        series
    }

    #[test]
    fn quiet_vm_is_idle() {
        let verdict = InactivityPolicy::default().evaluate(&series(&[1., 2., 3.], &[100_000., 200_000.]));
        match verdict {
            InactivityVerdict::Idle { mean_cpu, network_mb } => {
                assert_eq!(mean_cpu, 2.);
                assert!((network_mb - 600_000. / BYTES_IN_MB).abs() < 1e-9);
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn busy_cpu_or_network_is_active() {
        let policy = InactivityPolicy::default();
        assert!(!policy.evaluate(&series(&[50., 2.], &[0.])).is_idle());
        assert!(!policy.evaluate(&series(&[1.], &[4. * BYTES_IN_MB, 2. * BYTES_IN_MB])).is_idle());
    }

    #[test]
    fn empty_series_is_insufficient() {
        let policy = InactivityPolicy::default();
        assert_eq!(policy.evaluate(&series(&[], &[])), InactivityVerdict::InsufficientData);
        assert_eq!(policy.evaluate(&MetricSeries::new()), InactivityVerdict::InsufficientData);
    }
}
