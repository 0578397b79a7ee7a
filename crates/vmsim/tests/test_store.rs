use std::fs;
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use vmsim::core::clock::ManualClock;
use vmsim::core::config::{ConfigError, SimulatorConfig, UniformRange};
use vmsim::core::file_store::FileStore;
use vmsim::core::power_state::PowerState;
use vmsim::core::record::VmRecord;
use vmsim::core::store::StateStore;
use vmsim::core::vm_key::VmKey;
use vmsim::simulation::VmSimulation;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
}

fn vm() -> VmKey {
    VmKey::new("sub1", "rg1", "vm1")
}

#[test]
fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("sim_state.yaml");
    let clock = Rc::new(ManualClock::new(t0()));

    {
        let store = FileStore::open(&path, clock.clone()).unwrap();
        let sim = VmSimulation::new(Box::new(store), clock.clone(), SimulatorConfig::default());
        sim.compute().begin_start(&vm());
        clock.advance(Duration::seconds(20));
        assert_eq!(sim.compute().get_power_state(&vm()), PowerState::Running);
    }
    assert!(path.exists());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("vms:"));
    assert!(content.contains("sub1/rg1/vm1"));
    assert!(content.contains("PowerState/running"));

    let store = FileStore::open(&path, clock.clone()).unwrap();
    let sim = VmSimulation::new(Box::new(store), clock.clone(), SimulatorConfig::default());
    let record = sim.vm_record(&vm());
    assert_eq!(record.power_state(), PowerState::Running);
    assert_eq!(record.history().len(), 1);
    assert_eq!(sim.compute().get_running_since(&vm()), Some(t0() + Duration::seconds(20)));
}

#[test]
fn test_pending_operation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim_state.yaml");
    let clock = Rc::new(ManualClock::new(t0()));
    {
        let sim = VmSimulation::new(
            Box::new(FileStore::open(&path, clock.clone()).unwrap()),
            clock.clone(),
            SimulatorConfig::default(),
        );
        sim.compute().begin_deallocate(&vm());
    }
    clock.advance(Duration::minutes(1));
    let sim = VmSimulation::new(
        Box::new(FileStore::open(&path, clock.clone()).unwrap()),
        clock.clone(),
        SimulatorConfig::default(),
    );
    assert_eq!(sim.compute().get_power_state(&vm()), PowerState::Deallocated);
}

#[test]
fn test_corrupt_state_file_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim_state.yaml");
    let clock = Rc::new(ManualClock::new(t0()));
    fs::write(&path, "vms: [this is: not a map").unwrap();
    let mut store = FileStore::open(&path, clock.clone()).unwrap();
    assert!(store.keys().is_empty());
    let backup = dir.path().join("sim_state.yaml.corrupt");
    assert_eq!(fs::read_to_string(&backup).unwrap(), "vms: [this is: not a map");

    assert_eq!(store.load(&vm()).power_state(), PowerState::Deallocated);
    // the first save writes a valid state
    let reopened = FileStore::open(&path, clock.clone()).unwrap();
    assert_eq!(reopened.keys(), vec!["sub1/rg1/vm1".to_string()]);
}

const GOOD_AND_BAD_RECORDS: &str = "\
vms:
  s/rg/good:
    power_state: PowerState/running
    seed: 7
    last_start_utc: 2026-10-01T07:00:00.000000Z
    history:
      - type: start
        at: 2026-10-01T07:00:00.000000Z
  s/rg/bad:
    power_state: PowerState/running
    seed: 8
    history:
      - type: reboot
        at: 2026-10-01T06:00:00.000000Z
  s/rg/stuck:
    power_state: PowerState/starting
    seed: 9
";

#[test]
fn test_bad_record_does_not_hide_others() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim_state.yaml");
    let clock = Rc::new(ManualClock::new(t0()));
    fs::write(&path, GOOD_AND_BAD_RECORDS).unwrap();

    let mut store = FileStore::open(&path, clock.clone()).unwrap();
    assert_eq!(store.keys(), vec!["s/rg/good".to_string()]);
    assert_eq!(store.unreadable_keys(), vec!["s/rg/bad".to_string(), "s/rg/stuck".to_string()]);

    let good = VmKey::new("s", "rg", "good");
    let record = store.load(&good);
    assert_eq!(record.power_state(), PowerState::Running);
    assert_eq!(record.history().len(), 1);

    // unreadable VM is served as a fresh record without touching its stored data
    let bad = VmKey::new("s", "rg", "bad");
    assert_eq!(store.load(&bad).power_state(), PowerState::Deallocated);
    store.save(&good, &record.clone().with_power_state(PowerState::Deallocated));
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("type: reboot"));
    assert!(content.contains("PowerState/starting"));

    let mut reopened = FileStore::open(&path, clock.clone()).unwrap();
    assert_eq!(reopened.load(&good).power_state(), PowerState::Deallocated);
    assert_eq!(reopened.load(&good).history().len(), 1);
    assert_eq!(reopened.unreadable_keys().len(), 2);

    // a new record of the VM replaces the unreadable one
    reopened.save(&bad, &VmRecord::new(&bad));
    let reopened = FileStore::open(&path, clock.clone()).unwrap();
    assert_eq!(reopened.unreadable_keys(), vec!["s/rg/stuck".to_string()]);
    assert!(!fs::read_to_string(&path).unwrap().contains("type: reboot"));
}

#[test]
fn test_clear_all_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim_state.yaml");
    let clock = Rc::new(ManualClock::new(t0()));
    let mut store = FileStore::open(&path, clock.clone()).unwrap();
    store.load(&vm());
    store.load(&VmKey::new("sub1", "rg1", "vm2"));
    assert_eq!(store.keys().len(), 2);
    store.clear_all();
    assert!(FileStore::open(&path, clock.clone()).unwrap().keys().is_empty());
    assert!(!dir.path().join("sim_state.yaml.tmp").exists());
}

#[test]
fn test_config_from_file() {
    let config = SimulatorConfig::from_file(name_wrapper("config.yaml")).unwrap();
    assert_eq!(config.start_delay, UniformRange::new(1., 2.));
    assert_eq!(config.deallocate_delay, UniformRange::new(3., 3.));
    assert_eq!(config.default_window_minutes, 30);
    assert_eq!(config.spike_horizon_minutes, 5.);
    assert_eq!(config.cpu_spike.amplitude, UniformRange::new(20., 30.));
    // absent parameters keep their defaults
    assert_eq!(config.network_spike, SimulatorConfig::default().network_spike);
    assert_eq!(config.cpu_baseline, SimulatorConfig::default().cpu_baseline);
}

#[test]
fn test_config_changes_simulation() {
    let config = SimulatorConfig::from_file(name_wrapper("config.yaml")).unwrap();
    let clock = Rc::new(ManualClock::new(t0()));
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("sim_state.yaml"), clock.clone()).unwrap();
    let sim = VmSimulation::new(Box::new(store), clock.clone(), config);
    sim.compute().begin_start(&vm());
    clock.advance(Duration::seconds(2));
    assert_eq!(sim.compute().get_power_state(&vm()), PowerState::Running);
    sim.compute().begin_deallocate(&vm());
    let resolve_at = sim.vm_record(&vm()).pending_operation().unwrap().resolve_at;
    assert_eq!(resolve_at, t0() + Duration::seconds(5));
    let series = sim
        .metrics()
        .query_metrics(&vm(), &vmsim::core::window::MetricsQuery::default());
    assert_eq!(series.values().next().unwrap().len(), 31);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = SimulatorConfig::from_file(name_wrapper("invalid.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: "cpu_baseline", .. }));
    let err = SimulatorConfig::from_file(name_wrapper("missing.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
