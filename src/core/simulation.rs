//! Driver side of the engine: a shared network handle, an inbox that any
//! thread can feed, and the fixed-period cycle that drains the inbox and steps
//! the network.
//!
//! Only the driver mutates structure. Readers take the read half of the same
//! lock, or work from an [`observer`](crate::observer) snapshot.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::dynamics::StepReport;
use crate::error::InputError;
use crate::network::Network;
use crate::observer::{NetworkAdapter, NetworkSnapshot};
use crate::policy::Policy;
use crate::unit::DataKey;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// Target cycle period in milliseconds.
    pub cycle_time_ms: u64,
    /// Level given to a pattern submitted without an explicit seed.
    pub default_seed: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycle_time_ms: 100,
            default_seed: 1.0,
        }
    }
}

impl SimulationConfig {
    pub fn with_cycle_time(mut self, millis: u64) -> Self {
        self.cycle_time_ms = millis;
        self
    }

    pub fn with_default_seed(mut self, seed: f64) -> Self {
        self.default_seed = seed;
        self
    }

    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms)
    }
}

/// Cloneable handle to one network behind a read-write lock.
pub struct SharedNetwork<K, P: Policy> {
    inner: Arc<RwLock<Network<K, P>>>,
}

impl<K, P: Policy> Clone for SharedNetwork<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: DataKey, P: Policy> SharedNetwork<K, P> {
    pub fn new(network: Network<K, P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(network)),
        }
    }

    // Poisoned locks are recovered rather than propagated.
    pub fn read(&self) -> RwLockReadGuard<'_, Network<K, P>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Network<K, P>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy-on-read view of the whole network.
    pub fn snapshot(&self) -> NetworkSnapshot<K> {
        NetworkAdapter::new(&*self.read()).snapshot()
    }
}

/// One queued event for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Input<K> {
    Pattern { key: K, seed: f64 },
    Command(Command<K>),
}

/// Sending half of the driver's input queue.
pub struct Inbox<K> {
    sender: UnboundedSender<Input<K>>,
    default_seed: f64,
}

impl<K> Clone for Inbox<K> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            default_seed: self.default_seed,
        }
    }
}

impl<K> Inbox<K> {
    pub fn send(&self, input: Input<K>) -> Result<(), InputError> {
        self.sender.send(input).map_err(|_| InputError::Closed)
    }

    pub fn pattern(&self, key: K, seed: f64) -> Result<(), InputError> {
        self.send(Input::Pattern { key, seed })
    }

    pub fn command(&self, command: Command<K>) -> Result<(), InputError> {
        self.send(Input::Command(command))
    }
}

impl Inbox<String> {
    /// Queue a raw protocol line: a command, or a pattern at the default seed.
    /// Malformed commands are rejected here and never reach the network.
    pub fn submit_line(&self, line: &str) -> Result<(), InputError> {
        match Command::parse(line) {
            Ok(Some(command)) => self.command(command),
            Ok(None) => self.pattern(line.trim().to_string(), self.default_seed),
            Err(e) => {
                warn!(line, error = %e, "rejected command");
                Err(e.into())
            }
        }
    }
}

/// What one driver cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleReport {
    pub commands: usize,
    pub ingested: usize,
    /// Inputs still waiting because the simulation is paused.
    pub deferred: usize,
    /// `None` while paused.
    pub step: Option<StepReport>,
    pub duration: Duration,
    pub overrun: bool,
}

pub struct Simulation<K, P: Policy> {
    network: SharedNetwork<K, P>,
    config: SimulationConfig,
    inbox: Inbox<K>,
    receiver: UnboundedReceiver<Input<K>>,
    pending: VecDeque<Input<K>>,
    paused: bool,
}

impl<K: DataKey, P: Policy> Simulation<K, P> {
    pub fn new(network: Network<K, P>, config: SimulationConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            network: SharedNetwork::new(network),
            config,
            inbox: Inbox {
                sender,
                default_seed: config.default_seed,
            },
            receiver,
            pending: VecDeque::new(),
            paused: false,
        }
    }

    pub fn network(&self) -> SharedNetwork<K, P> {
        self.network.clone()
    }

    pub fn inbox(&self) -> Inbox<K> {
        self.inbox.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Drain the inbox, apply it, and step the network once, all under one
    /// write lock.
    ///
    /// Inputs take effect in arrival order. While paused, patterns wait, and a
    /// command applies at once only if nothing is waiting ahead of it; otherwise
    /// it waits behind those patterns. `PAUSE` and `RESUME` always apply at once.
    pub fn cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        {
            let mut network = self.network.write();
            while let Ok(input) = self.receiver.try_recv() {
                match input {
                    Input::Pattern { .. } => self.pending.push_back(input),
                    Input::Command(Command::Pause) => {
                        if !self.paused {
                            drain(&mut *network, &mut self.pending, &mut report);
                        }
                        self.paused = true;
                        report.commands += 1;
                        info!("paused");
                    }
                    Input::Command(Command::Resume) => {
                        self.paused = false;
                        report.commands += 1;
                        info!("resumed");
                    }
                    Input::Command(command) => {
                        if self.paused && !self.pending.is_empty() {
                            self.pending.push_back(Input::Command(command));
                            continue;
                        }
                        drain(&mut *network, &mut self.pending, &mut report);
                        command.apply(&mut *network);
                        report.commands += 1;
                    }
                }
            }

            if !self.paused {
                drain(&mut *network, &mut self.pending, &mut report);
                report.step = Some(network.step());
            }
        }

        report.deferred = self.pending.len();
        report.duration = started.elapsed();
        report.overrun = report.duration > self.config.cycle_time();
        if report.overrun {
            warn!(
                duration_ms = report.duration.as_millis() as u64,
                cycle_time_ms = self.config.cycle_time_ms,
                "cycle time violation"
            );
        }
        report
    }

    /// Run cycles at the configured period until `shutdown` resolves.
    /// Late cycles are reported and run back to back; none is skipped.
    pub async fn run_until<F>(&mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.cycle_time());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let report = self.cycle();
                    cycles += 1;
                    debug!(
                        cycles,
                        ingested = report.ingested,
                        commands = report.commands,
                        paused = self.paused,
                        "cycle"
                    );
                }
            }
        }
        info!(cycles, "simulation stopped");
        cycles
    }
}

/// Apply every waiting input in arrival order.
fn drain<K: DataKey, P: Policy>(
    network: &mut Network<K, P>,
    pending: &mut VecDeque<Input<K>>,
    report: &mut CycleReport,
) {
    for input in pending.drain(..) {
        match input {
            Input::Pattern { key, seed } => {
                network.ingest(key, seed);
                report.ingested += 1;
            }
            Input::Command(command) => {
                command.apply(network);
                report.commands += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkConfig;
    use crate::temporal::TemporalPolicy;
    use crate::topology::TopologyPolicy;

    fn simulation() -> Simulation<String, TopologyPolicy> {
        Simulation::new(
            Network::new(TopologyPolicy::default(), NetworkConfig::topology()),
            SimulationConfig::default(),
        )
    }

    #[test]
    fn lines_become_units() {
        let mut sim = simulation();
        let inbox = sim.inbox();
        inbox.submit_line("cam red").unwrap();
        inbox.submit_line("cam blue").unwrap();

        let report = sim.cycle();
        assert_eq!(report.ingested, 2);
        assert_eq!(report.step.unwrap().generated, 2);

        let net = sim.network();
        let net = net.read();
        assert_eq!(net.unit_count(), 2);
        assert_eq!(net.association_count(), 2);
    }

    #[test]
    fn malformed_commands_never_reach_the_queue() {
        let mut sim = simulation();
        let inbox = sim.inbox();
        assert!(inbox.submit_line("cam COMMAND JOINDATA a").is_err());
        let report = sim.cycle();
        assert_eq!(report.commands, 0);
        assert_eq!(report.ingested, 0);
    }

    #[test]
    fn paused_simulation_defers_patterns_but_applies_commands() {
        let mut sim = simulation();
        let inbox = sim.inbox();
        inbox.submit_line("cam a").unwrap();
        inbox.submit_line("cam b").unwrap();
        sim.cycle();

        inbox.submit_line("cam COMMAND PAUSE").unwrap();
        inbox.submit_line("cam COMMAND DELETEDATA a").unwrap();
        inbox.submit_line("cam c").unwrap();
        let report = sim.cycle();
        assert!(sim.is_paused());
        assert!(report.step.is_none());
        assert_eq!(report.commands, 2);
        assert_eq!(report.deferred, 1);
        {
            let net = sim.network();
            let net = net.read();
            assert!(net.get_unit(&"cam a".to_string()).is_none());
            assert!(net.get_unit(&"cam c".to_string()).is_none());
            assert_eq!(net.cycles(), 1);
        }

        inbox.submit_line("cam COMMAND RESUME").unwrap();
        let report = sim.cycle();
        assert!(!sim.is_paused());
        assert_eq!(report.ingested, 1);
        assert!(sim.network().read().get_unit(&"cam c".to_string()).is_some());
    }

    #[test]
    fn paused_commands_wait_behind_earlier_patterns() {
        let mut sim = simulation();
        let inbox = sim.inbox();
        inbox.submit_line("cam COMMAND PAUSE").unwrap();
        inbox.submit_line("cam a").unwrap();
        inbox.submit_line("cam COMMAND DELETEDATA a").unwrap();
        let report = sim.cycle();
        assert_eq!(report.commands, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(sim.network().read().unit_count(), 0);

        inbox.submit_line("cam COMMAND RESUME").unwrap();
        let report = sim.cycle();
        assert_eq!(report.ingested, 1);
        assert_eq!(report.commands, 2);
        assert_eq!(report.deferred, 0);
        assert!(sim.network().read().get_unit(&"cam a".to_string()).is_none());
    }

    #[test]
    fn clear_network_drops_everything() {
        let mut sim = simulation();
        let inbox = sim.inbox();
        inbox.submit_line("cam a").unwrap();
        inbox.submit_line("cam b").unwrap();
        sim.cycle();
        inbox.submit_line("cam COMMAND CLEARNETWORK").unwrap();
        sim.cycle();
        let snapshot = sim.network().snapshot();
        assert!(snapshot.units.is_empty());
        assert!(snapshot.associations.is_empty());
    }

    #[test]
    fn producers_and_readers_on_other_threads() {
        let mut sim: Simulation<u32, TemporalPolicy> = Simulation::new(
            Network::new(TemporalPolicy::default(), NetworkConfig::temporal()),
            SimulationConfig::default(),
        );

        let producers: Vec<_> = (0..4u32)
            .map(|t| {
                let inbox = sim.inbox();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        inbox.pattern(t * 100 + i, 1.0).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let shared = sim.network();
        let reader = std::thread::spawn(move || {
            for _ in 0..50 {
                let snapshot = shared.snapshot();
                assert_eq!(
                    snapshot.diagnostics.association_count,
                    snapshot.associations.len()
                );
            }
        });

        let report = sim.cycle();
        reader.join().unwrap();
        assert_eq!(report.ingested, 100);
        assert_eq!(sim.network().read().verify(), Ok(()));
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let mut sim = Simulation::new(
            Network::new(TopologyPolicy::default(), NetworkConfig::topology()),
            SimulationConfig::default().with_cycle_time(5),
        );
        sim.inbox().pattern("cam a".to_string(), 1.0).unwrap();

        let cycles = sim
            .run_until(tokio::time::sleep(Duration::from_millis(60)))
            .await;
        assert!(cycles >= 2);
        assert_eq!(sim.network().read().cycles(), cycles);
    }
}
