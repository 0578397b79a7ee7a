//! Synthetic VM telemetry: idle noise plus decaying spikes after each start.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::core::config::{SimulatorConfig, SpikeConfig};
use crate::core::power_state::OperationKind;
use crate::core::random::{sample_normal, sample_uniform, seeded_rng, RandomStream};
use crate::core::record::HistoryEvent;
use crate::core::window::TimeWindow;

/// Reported VM metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    #[serde(rename = "Percentage CPU")]
    PercentageCpu,
    #[serde(rename = "Network In Total")]
    NetworkInTotal,
    #[serde(rename = "Network Out Total")]
    NetworkOutTotal,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::PercentageCpu, Metric::NetworkInTotal, Metric::NetworkOutTotal];

    /// Returns metric name as used by the monitoring API.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::PercentageCpu => "Percentage CPU",
            Metric::NetworkInTotal => "Network In Total",
            Metric::NetworkOutTotal => "Network Out Total",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Metric series keyed by metric, in the order of [`Metric::ALL`].
pub type MetricSeries = IndexMap<Metric, Vec<DataPoint>>;

/// Decay parameters of a single spike component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decay {
    pub amplitude: f64,
    pub tau_minutes: f64,
}

impl Decay {
    fn sample<R: rand::Rng>(rng: &mut R, config: &SpikeConfig) -> Self {
        Self {
            amplitude: sample_uniform(rng, config.amplitude),
            tau_minutes: sample_uniform(rng, config.tau_minutes),
        }
    }

    pub fn value(&self, minutes_since: f64) -> f64 {
        self.amplitude * (-minutes_since / self.tau_minutes).exp()
    }
}

/// Load spike caused by a single VM start.
///
/// Parameters are drawn once per start event, so every sample sees the same spike shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartupSpike {
    pub at: DateTime<Utc>,
    pub cpu: Decay,
    /// Shared by inbound and outbound traffic.
    pub network: Decay,
}

/// Generates telemetry of a single VM from its seed and history.
pub struct TelemetrySynthesizer<'a> {
    config: &'a SimulatorConfig,
    seed: u32,
}

impl<'a> TelemetrySynthesizer<'a> {
    pub fn new(config: &'a SimulatorConfig, seed: u32) -> Self {
        Self { config, seed }
    }

    /// Draws spike parameters for every start event in history order.
    ///
    /// Draws are made for malformed entries as well (which are then dropped), so appending to history or fixing
    /// a broken entry never changes the spikes of other starts.
    pub fn startup_spikes(&self, history: &[HistoryEvent]) -> Vec<StartupSpike> {
        let mut rng = seeded_rng(self.seed, RandomStream::Spikes);
        history
            .iter()
            .filter(|event| event.kind == OperationKind::Start)
            .filter_map(|event| {
                let cpu = Decay::sample(&mut rng, &self.config.cpu_spike);
                let network = Decay::sample(&mut rng, &self.config.network_spike);
                event.time().map(|at| StartupSpike { at, cpu, network })
            })
            .collect()
    }

    /// Returns minutes elapsed since the spike start if the spike still contributes at `time`.
    fn minutes_since(&self, spike: &StartupSpike, time: DateTime<Utc>) -> Option<f64> {
        if spike.at > time {
            return None;
        }
        let minutes = (time - spike.at).num_milliseconds() as f64 / 60_000.;
        (minutes < self.config.spike_horizon_minutes).then_some(minutes)
    }

    /// Generates CPU and network series sampled over the window.
    ///
    /// The window is expected to be clamped by the caller. An empty window produces empty series.
    pub fn synthesize(&self, history: &[HistoryEvent], window: TimeWindow) -> MetricSeries {
        let spikes = self.startup_spikes(history);
        let mut rng = seeded_rng(self.seed, RandomStream::Baseline);
        let times = window.sample_times();
        let mut cpu = Vec::with_capacity(times.len());
        let mut net_in = Vec::with_capacity(times.len());
        let mut net_out = Vec::with_capacity(times.len());

        for timestamp in times {
            let cpu_base = sample_normal(&mut rng, self.config.cpu_baseline).clamp(0., 100.);
            let net_in_base = sample_normal(&mut rng, self.config.network_baseline).max(0.);
            let net_out_base = sample_normal(&mut rng, self.config.network_baseline).max(0.);

            let mut cpu_peak = 0.;
            let mut net_peak = 0.;
            for spike in &spikes {
                if let Some(minutes) = self.minutes_since(spike, timestamp) {
                    cpu_peak += spike.cpu.value(minutes);
                    net_peak += spike.network.value(minutes);
                }
            }

            cpu.push(DataPoint {
                timestamp,
                value: (cpu_base + cpu_peak).clamp(0., 100.),
            });
            net_in.push(DataPoint {
                timestamp,
                value: (net_in_base + net_peak).max(0.),
            });
            net_out.push(DataPoint {
                timestamp,
                value: (net_out_base + net_peak).max(0.),
            });
        }

        let mut series = MetricSeries::new();
        series.insert(Metric::PercentageCpu, cpu);
        series.insert(Metric::NetworkInTotal, net_in);
        series.insert(Metric::NetworkOutTotal, net_out);
        series
    }
}
