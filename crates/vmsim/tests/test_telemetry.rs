use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use vmsim::core::clock::{Clock, ManualClock};
use vmsim::core::config::SimulatorConfig;
use vmsim::core::inactivity::{InactivityPolicy, InactivityVerdict};
use vmsim::core::power_state::OperationKind;
use vmsim::core::record::{HistoryEvent, VmRecord};
use vmsim::core::store::{MemoryStore, StateStore};
use vmsim::core::telemetry::Metric;
use vmsim::core::vm_key::VmKey;
use vmsim::core::window::{lookback_limit, MetricsQuery};
use vmsim::simulation::VmSimulation;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap()
}

fn vm() -> VmKey {
    VmKey::new("sub1", "rg1", "vm1")
}

fn setup_with_history(history: Vec<HistoryEvent>) -> (VmSimulation, Rc<ManualClock>) {
    let mut store = MemoryStore::new();
    store.save(&vm(), &VmRecord::new(&vm()).with_history(history));
    let clock = Rc::new(ManualClock::new(now()));
    let sim = VmSimulation::new(Box::new(store), clock.clone(), SimulatorConfig::default());
    (sim, clock)
}

fn busy_history() -> Vec<HistoryEvent> {
    (0..20)
        .flat_map(|day| {
            let at = now() - Duration::days(day * 3 + 1);
            [
                HistoryEvent::new(OperationKind::Start, at),
                HistoryEvent::new(OperationKind::Deallocate, at + Duration::hours(8)),
            ]
        })
        .collect()
}

#[test]
fn test_series_names_and_order() {
    let (sim, _clock) = setup_with_history(Vec::new());
    let series = sim.metrics().query_metrics(&vm(), &MetricsQuery::default());
    let names: Vec<_> = series.keys().map(|m| m.name()).collect();
    assert_eq!(names, vec!["Percentage CPU", "Network In Total", "Network Out Total"]);
    for points in series.values() {
        assert_eq!(points.len(), 16);
        assert_eq!(points.first().unwrap().timestamp, now() - Duration::minutes(15));
        assert_eq!(points.last().unwrap().timestamp, now());
    }
}

#[test]
fn test_sampling_interval_depends_on_span() {
    let (sim, _clock) = setup_with_history(Vec::new());
    let metrics = sim.metrics();
    let cases = [
        (Duration::hours(1), Duration::minutes(1)),
        (Duration::hours(12), Duration::minutes(5)),
        (Duration::days(2), Duration::minutes(15)),
    ];
    for (span, step) in cases {
        let series = metrics.query_metrics(&vm(), &MetricsQuery::between(now() - span, now()));
        let cpu = &series[&Metric::PercentageCpu];
        assert_eq!(cpu[1].timestamp - cpu[0].timestamp, step);
        assert_eq!(cpu.len() as i64, span.num_minutes() / step.num_minutes() + 1);
    }
}

#[test]
fn test_values_are_bounded() {
    let (sim, _clock) = setup_with_history(busy_history());
    let series = sim
        .metrics()
        .query_metrics(&vm(), &MetricsQuery::between(now() - Duration::days(60), now()));
    assert!(series[&Metric::PercentageCpu]
        .iter()
        .all(|p| (0. ..=100.).contains(&p.value)));
    for metric in [Metric::NetworkInTotal, Metric::NetworkOutTotal] {
        assert!(series[&metric].iter().all(|p| p.value >= 0.));
    }
}

#[test]
fn test_series_are_reproducible() {
    let query = MetricsQuery::between(now() - Duration::days(7), now());
    let (sim1, _clock1) = setup_with_history(busy_history());
    let (sim2, _clock2) = setup_with_history(busy_history());
    let a = sim1.metrics().query_metrics(&vm(), &query);
    let b = sim2.metrics().query_metrics(&vm(), &query);
    assert_eq!(a, b);
    // repeated query over the same state
    assert_eq!(a, sim1.metrics().query_metrics(&vm(), &query));

    let other = VmKey::new("sub1", "rg1", "vm2");
    let c = sim1.metrics().query_metrics(&other, &query);
    assert_ne!(a[&Metric::PercentageCpu], c[&Metric::PercentageCpu]);
}

#[test]
fn test_reversed_window_is_empty() {
    let (sim, _clock) = setup_with_history(busy_history());
    let series = sim
        .metrics()
        .query_metrics(&vm(), &MetricsQuery::between(now(), now() - Duration::hours(1)));
    assert_eq!(series.len(), 3);
    assert!(series.values().all(|points| points.is_empty()));
}

#[test]
fn test_lookback_is_clamped() {
    let (sim, _clock) = setup_with_history(busy_history());
    let metrics = sim.metrics();
    let far = metrics.query_metrics(&vm(), &MetricsQuery::between(now() - Duration::days(200), now()));
    let clamped = metrics.query_metrics(&vm(), &MetricsQuery::between(lookback_limit(now()), now()));
    assert_eq!(far, clamped);
    assert_eq!(far[&Metric::PercentageCpu][0].timestamp, lookback_limit(now()));
}

#[test]
fn test_startup_spike_decays() {
    let start = now() - Duration::hours(1);
    let (sim, _clock) = setup_with_history(vec![HistoryEvent::new(OperationKind::Start, start)]);
    let series = sim
        .metrics()
        .query_metrics(&vm(), &MetricsQuery::between(start - Duration::minutes(5), start + Duration::minutes(30)));
    let cpu = &series[&Metric::PercentageCpu];
    let net_in = &series[&Metric::NetworkInTotal];
    let net_out = &series[&Metric::NetworkOutTotal];
    // sample 5 is the start instant
    assert_eq!(cpu[5].timestamp, start);
    assert!(cpu[5].value >= 40.);
    assert!(net_in[5].value >= 2e6 && net_out[5].value >= 2e6);
    assert!(cpu[4].value < 10.);
    assert!(cpu[6].value < cpu[5].value);
    // the spike no longer contributes 10 minutes after the start
    for i in 15..cpu.len() {
        assert!(cpu[i].value < 10., "cpu at {} is {}", cpu[i].timestamp, cpu[i].value);
        assert!(net_in[i].value < 1e6);
    }
}

#[test]
fn test_inactivity_after_start() {
    let (sim, clock) = setup_with_history(Vec::new());
    let policy = InactivityPolicy::default();
    sim.compute().begin_start(&vm());
    clock.advance(Duration::minutes(1));
    let verdict = policy.evaluate(&sim.metrics().query_metrics(&vm(), &policy.query()));
    assert!(matches!(verdict, InactivityVerdict::Active { .. }));

    clock.advance(Duration::hours(1));
    let verdict = policy.evaluate(&sim.metrics().query_metrics(&vm(), &policy.query()));
    assert!(verdict.is_idle(), "unexpected verdict {:?}", verdict);
    assert!(clock.now() > now());
}
