//! Seams to the outside world: deployment, container status, playbook run,
//! operator decisions and time.

use crate::readiness::{TimeoutReport, UnitStatus};
use std::path::Path;
use std::time::{Duration, Instant};

/// Failure of an external command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` failed with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("{0}")]
    Unavailable(String),
}

/// Brings the lab up (containerlab deploy)
pub trait Deployer {
    fn deploy(&self, topology: &Path) -> Result<(), CommandError>;
}

/// Point-in-time snapshot of the lab's runtime units
pub trait UnitSampler {
    fn sample(&self, filter: &str) -> Result<Vec<UnitStatus>, CommandError>;
}

/// Downstream configuration pass (ansible-playbook)
pub trait Trigger {
    fn trigger(&self, inventory: &Path) -> Result<(), CommandError>;
}

/// Explicit decision point after a readiness timeout
pub trait Operator {
    fn confirm_proceed(&self, report: &TimeoutReport) -> bool;
}

/// `start + budget`, pulled in to the furthest instant the platform can hold
pub fn deadline_after(start: Instant, budget: Duration) -> Instant {
    let mut budget = budget;
    loop {
        if let Some(deadline) = start.checked_add(budget) {
            return deadline;
        }
        budget /= 2;
    }
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock, blocking sleeps
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
