/*!
Fake collaborators

Each fake is `Clone` and shares its state behind an `Arc`, so a test can
hand one copy to the orchestrator and inspect the other afterwards.
*/

use bringup_core::readiness::TimeoutReport;
use bringup_core::{Clock, CommandError, Deployer, Operator, Trigger, UnitSampler, UnitStatus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Snapshot = Result<Vec<UnitStatus>, String>;

/// Replays scripted snapshots in order; the last one repeats forever
#[derive(Clone, Default)]
pub struct ScriptedSampler {
    script: Arc<Mutex<VecDeque<Snapshot>>>,
    last: Arc<Mutex<Option<Snapshot>>>,
    filters: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next snapshot lists these `(name, status)` pairs
    pub fn then_units(self, units: &[(&str, &str)]) -> Self {
        let snapshot = units.iter().map(|(name, status)| UnitStatus::new(*name, *status)).collect();
        self.script.lock().push_back(Ok(snapshot));
        self
    }

    pub fn then_empty(self) -> Self {
        self.script.lock().push_back(Ok(Vec::new()));
        self
    }

    pub fn then_unavailable(self, reason: &str) -> Self {
        self.script.lock().push_back(Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.filters.lock().len()
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().clone()
    }
}

impl UnitSampler for ScriptedSampler {
    fn sample(&self, filter: &str) -> Result<Vec<UnitStatus>, CommandError> {
        self.filters.lock().push(filter.to_string());

        let next = self.script.lock().pop_front();
        let snapshot = match next {
            Some(snapshot) => {
                *self.last.lock() = Some(snapshot.clone());
                snapshot
            }
            None => self.last.lock().clone().unwrap_or_else(|| Ok(Vec::new())),
        };
        snapshot.map_err(CommandError::Unavailable)
    }
}

/// Deployer that records calls and can drop an inventory file like containerlab
#[derive(Clone, Default)]
pub struct StubDeployer {
    failure: Option<String>,
    inventory: Option<(PathBuf, String)>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl StubDeployer {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(stderr: &str) -> Self {
        Self { failure: Some(stderr.to_string()), ..Self::default() }
    }

    /// Writes `content` to `path` when `deploy` is called
    pub fn writing_inventory(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.inventory = Some((path.into(), content.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

impl Deployer for StubDeployer {
    fn deploy(&self, topology: &Path) -> Result<(), CommandError> {
        self.calls.lock().push(topology.to_path_buf());

        if let Some(stderr) = &self.failure {
            return Err(CommandError::Exit {
                program: "clab".into(),
                status: "exit status: 1".into(),
                stderr: stderr.clone(),
            });
        }

        if let Some((path, content)) = &self.inventory {
            let io_err = |source| CommandError::Spawn { program: "clab".into(), source };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::fs::write(path, content).map_err(io_err)?;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingTrigger {
    failure: Option<String>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(stderr: &str) -> Self {
        Self { failure: Some(stderr.to_string()), ..Self::default() }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

impl Trigger for RecordingTrigger {
    fn trigger(&self, inventory: &Path) -> Result<(), CommandError> {
        self.calls.lock().push(inventory.to_path_buf());
        match &self.failure {
            Some(stderr) => Err(CommandError::Exit {
                program: "ansible-playbook".into(),
                status: "exit status: 2".into(),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Answers every "proceed anyway?" question the same way
#[derive(Clone)]
pub struct ScriptedOperator {
    answer: bool,
    asked: Arc<Mutex<Vec<TimeoutReport>>>,
}

impl ScriptedOperator {
    pub fn answering(answer: bool) -> Self {
        Self { answer, asked: Arc::default() }
    }

    pub fn questions(&self) -> Vec<TimeoutReport> {
        self.asked.lock().clone()
    }
}

impl Operator for ScriptedOperator {
    fn confirm_proceed(&self, report: &TimeoutReport) -> bool {
        self.asked.lock().push(report.clone());
        self.answer
    }
}

/// Virtual time: `sleep` advances `now` instantly
#[derive(Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::default(),
            sleeps: Arc::default(),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}
