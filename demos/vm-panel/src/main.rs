mod format;
mod inventory;
mod prefs;
mod runtime_state;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use sugars::rc;

use vmsim::client::VmClient;
use vmsim::core::clock::{Clock, SystemClock};
use vmsim::core::config::{BackendMode, SimulatorConfig};
use vmsim::core::file_store::FileStore;
use vmsim::core::inactivity::InactivityVerdict;
use vmsim::core::power_state::PowerState;
use vmsim::core::telemetry::Metric;
use vmsim::core::vm_key::VmKey;
use vmsim::core::window::MetricsQuery;
use vmsim::simulation::VmSimulation;

use crate::format::{format_bytes, format_datetime, format_uptime, power_state_label, NO_VALUE};
use crate::inventory::{load_inventory, resolve_vm, InventorySource};
use crate::prefs::{UiPrefs, WindowChoice};
use crate::runtime_state::RuntimeState;

const SIM_STATE_FILE: &str = "sim_state.yaml";

#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
struct Args {
    /// Directory with panel state and preferences
    #[clap(long, default_value = "configs/local")]
    state_dir: String,

    /// Simulator config file (YAML)
    #[clap(long)]
    config: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show power state and uptime of all VMs
    Status,
    /// Request VM start
    Start { vm: String },
    /// Request VM deallocation
    Stop { vm: String },
    /// Poll VM until it reaches the power state
    Wait {
        vm: String,
        state: PowerState,
        /// Timeout in seconds
        #[clap(long, default_value = "60")]
        timeout: u64,
    },
    /// Show CPU and network metrics
    Metrics {
        vm: String,
        /// Window length in minutes
        #[clap(long)]
        minutes: Option<u32>,
        /// Print full series as JSON
        #[clap(long)]
        json: bool,
    },
    /// Show start and deallocate events
    Events {
        vm: String,
        #[clap(long, default_value = "7")]
        days: i64,
    },
    /// Show VM runtime over a window: current, 1d, 7d, 30d or 90d
    Runtime {
        vm: String,
        /// Window, remembered in preferences when given
        #[clap(long)]
        window: Option<WindowChoice>,
    },
    /// Check whether a running VM is idle
    Idle { vm: String },
    /// Suppress shutdown suggestions for a VM
    Snooze {
        vm: String,
        #[clap(long, default_value = "60")]
        minutes: i64,
        /// Remove the snooze instead
        #[clap(long)]
        clear: bool,
    },
    /// Print simulation records of all VMs
    Diagnostics,
    /// Clear simulation and panel state
    Reset,
}

/// Returns the time `days` days before `time`, failing when it falls out of the supported range.
fn days_before(time: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|shift| time.checked_sub_signed(shift))
        .with_context(|| format!("{} days is out of range", days))
}

/// Returns the time `minutes` minutes after `time`, failing when it falls out of the supported range.
fn minutes_after(time: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|shift| time.checked_add_signed(shift))
        .with_context(|| format!("{} minutes is out of range", minutes))
}

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

struct Panel {
    sim: VmSimulation,
    client: VmClient,
    vms: Vec<VmKey>,
    prefs: UiPrefs,
    runtime: RuntimeState,
    state_dir: PathBuf,
}

impl Panel {
    fn open(state_dir: &Path, config: Option<&str>) -> Result<Self> {
        fs::create_dir_all(state_dir).with_context(|| format!("can't create {}", state_dir.display()))?;
        let sim_config = match config {
            Some(path) => SimulatorConfig::from_file(path)?,
            None => SimulatorConfig::default(),
        };
        let clock: Rc<dyn Clock> = rc!(SystemClock);
        let store = FileStore::open(state_dir.join(SIM_STATE_FILE), clock.clone())?;
        let sim = VmSimulation::new(Box::new(store), clock, sim_config);
        let client = VmClient::from_mode(BackendMode::from_env(), &sim);
        log::debug!("backend mode: {:?}", client.mode());
        Ok(Self {
            sim,
            client,
            vms: load_inventory(&InventorySource::detect(state_dir)),
            prefs: UiPrefs::load(state_dir),
            runtime: RuntimeState::load(state_dir),
            state_dir: state_dir.to_path_buf(),
        })
    }

    fn vm(&self, query: &str) -> Result<VmKey> {
        resolve_vm(&self.vms, query)
    }

    /// Returns uptime of the current run or `None` if VM is not running.
    fn current_uptime(&self, vm: &VmKey) -> Result<Option<u64>> {
        if !self.client.get_power_state(vm)?.is_running() {
            return Ok(None);
        }
        let now = self.sim.current_time();
        Ok(self
            .client
            .get_running_since(vm)?
            .map(|since| (now - since).num_seconds().max(0) as u64))
    }

    fn status(&self) -> Result<()> {
        println!("{:<40} {:<12} {:<20} {}", "VM", "STATE", "RUNNING SINCE", "UPTIME");
        for vm in &self.vms {
            let state = self.client.get_power_state(vm)?;
            let since = if state.is_running() {
                self.client.get_running_since(vm)?
            } else {
                None
            };
            let uptime = self
                .current_uptime(vm)?
                .map(format_uptime)
                .unwrap_or_else(|| NO_VALUE.to_string());
            println!(
                "{:<40} {:<12} {:<20} {}",
                vm.to_string(),
                power_state_label(state.code()),
                format_datetime(since),
                uptime
            );
        }
        Ok(())
    }

    fn wait(&self, vm: &VmKey, target: PowerState, timeout: u64) -> Result<()> {
        let started = Instant::now();
        loop {
            let state = self.client.get_power_state(vm)?;
            if state == target {
                println!("{}: {}", vm, power_state_label(state.code()));
                return Ok(());
            }
            if started.elapsed() >= StdDuration::from_secs(timeout) {
                bail!("{} is still {} after {}s", vm, state, timeout);
            }
            thread::sleep(StdDuration::from_secs(1));
        }
    }

    fn metrics(&self, vm: &VmKey, minutes: Option<u32>, json: bool) -> Result<()> {
        let query = minutes.map(MetricsQuery::last_minutes).unwrap_or_default();
        let series = self.client.query_metrics(vm, &query)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&series)?);
            return Ok(());
        }
        for (metric, points) in &series {
            if points.is_empty() {
                println!("{:<18} no data", metric.name());
                continue;
            }
            let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
            let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
            let last = points[points.len() - 1].value;
            let render = |value: f64| match metric {
                Metric::PercentageCpu => format!("{:.1}%", value),
                _ => format_bytes(value),
            };
            println!(
                "{:<18} points={:<4} mean={:<10} max={:<10} last={}",
                metric.name(),
                points.len(),
                render(mean),
                render(max),
                render(last)
            );
        }
        Ok(())
    }

    fn events(&self, vm: &VmKey, days: i64) -> Result<()> {
        let now = self.sim.current_time();
        let events = self.client.list_activity_events(vm, days_before(now, days)?, now)?;
        if events.is_empty() {
            println!("no activity in the last {} days", days);
        }
        for event in events {
            println!("{}  {}", format_datetime(Some(event.timestamp)), event.operation);
        }
        Ok(())
    }

    fn runtime(&mut self, vm: &VmKey, window: Option<WindowChoice>) -> Result<()> {
        if let Some(choice) = window {
            self.prefs.metrics_window_choice = choice;
            self.prefs.save(&self.state_dir)?;
        }
        let choice = self.prefs.metrics_window_choice;
        let value = match choice.minutes() {
            None => self.current_uptime(vm)?.map(format_uptime),
            Some(minutes) => {
                let now = self.sim.current_time();
                let start = now - Duration::minutes(minutes as i64);
                Some(format_uptime(self.client.total_runtime_in_window(vm, start, now)?))
            }
        };
        println!(
            "{} ({}): {}",
            vm,
            choice.label(),
            value.unwrap_or_else(|| NO_VALUE.to_string())
        );
        Ok(())
    }

    fn idle(&self, vm: &VmKey) -> Result<()> {
        if !self.client.get_power_state(vm)?.is_running() {
            println!("{} is not running", vm);
            return Ok(());
        }
        let policy = self.prefs.inactivity_policy();
        let series = self.client.query_metrics(vm, &policy.query())?;
        match policy.evaluate(&series) {
            InactivityVerdict::InsufficientData => println!("{}: not enough telemetry", vm),
            InactivityVerdict::Active { mean_cpu, network_mb } => {
                println!(
                    "{}: active (cpu {:.1}%, network {:.2} MB in {} min)",
                    vm, mean_cpu, network_mb, policy.window_minutes
                )
            }
            InactivityVerdict::Idle { mean_cpu, network_mb } => {
                println!(
                    "{}: idle (cpu {:.1}%, network {:.2} MB in {} min)",
                    vm, mean_cpu, network_mb, policy.window_minutes
                );
                let key = vm.to_string();
                if self.runtime.is_snoozed(&key, self.sim.current_time()) {
                    println!(
                        "shutdown suggestion snoozed until {}",
                        format_datetime(self.runtime.snoozed_until(&key))
                    );
                } else if self.prefs.inactivity_monitor_enabled {
                    println!("consider stopping it: vm-panel stop {}", vm);
                }
            }
        }
        Ok(())
    }

    fn snooze(&mut self, vm: &VmKey, minutes: i64, clear: bool) -> Result<()> {
        let key = vm.to_string();
        if clear {
            self.runtime.set_snooze(&key, None)?;
            println!("{}: snooze cleared", vm);
        } else {
            let until = minutes_after(self.sim.current_time(), minutes)?;
            self.runtime.set_snooze(&key, Some(until))?;
            println!("{}: snoozed until {}", vm, format_datetime(Some(until)));
        }
        Ok(())
    }

    fn diagnostics(&self) {
        for vm in &self.vms {
            let record = self.sim.vm_record(vm);
            println!("{}", vm);
            println!("  seed:        {}", record.seed());
            println!("  power state: {}", record.power_state());
            match record.pending_operation() {
                Some(pending) => println!(
                    "  pending:     {} at {}",
                    pending.op,
                    format_datetime(Some(pending.resolve_at))
                ),
                None => println!("  pending:     {}", NO_VALUE),
            }
            println!("  last start:  {}", format_datetime(record.last_start()));
            println!("  last stop:   {}", format_datetime(record.last_stop()));
            let history = record.history();
            println!("  history:     {} events", history.len());
            for event in &history[history.len().saturating_sub(5)..] {
                println!("    {:<10} {}", event.kind, event.at);
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.sim.reset();
        self.runtime.clear_all()?;
        println!("simulation state cleared");
        Ok(())
    }
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let mut panel = Panel::open(Path::new(&args.state_dir), args.config.as_deref())?;

    match args.command {
        Command::Status => panel.status()?,
        Command::Start { vm } => {
            let vm = panel.vm(&vm)?;
            panel.client.begin_start(&vm)?;
            println!("{}: start requested", vm);
        }
        Command::Stop { vm } => {
            let vm = panel.vm(&vm)?;
            panel.client.begin_deallocate(&vm)?;
            println!("{}: deallocation requested", vm);
        }
        Command::Wait { vm, state, timeout } => {
            let vm = panel.vm(&vm)?;
            panel.wait(&vm, state, timeout)?;
        }
        Command::Metrics { vm, minutes, json } => {
            let vm = panel.vm(&vm)?;
            panel.metrics(&vm, minutes, json)?;
        }
        Command::Events { vm, days } => {
            let vm = panel.vm(&vm)?;
            panel.events(&vm, days)?;
        }
        Command::Runtime { vm, window } => {
            let vm = panel.vm(&vm)?;
            panel.runtime(&vm, window)?;
        }
        Command::Idle { vm } => {
            let vm = panel.vm(&vm)?;
            panel.idle(&vm)?;
        }
        Command::Snooze { vm, minutes, clear } => {
            let vm = panel.vm(&vm)?;
            panel.snooze(&vm, minutes, clear)?;
        }
        Command::Diagnostics => panel.diagnostics(),
        Command::Reset => panel.reset()?,
    }
    Ok(())
}
