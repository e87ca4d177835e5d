//! Readiness polling over runtime-unit snapshots
//!
//! The container runtime only offers point-in-time listings, so readiness is
//! a bounded loop: sample, evaluate, then either stop (all ready), or sleep
//! and sample again until the deadline passes.
//!
//! - An empty listing is never "ready": the units may not be registered yet.
//! - All units must be ready in the same tick.
//! - A failed sample costs one tick of the same budget, nothing more.
//! - Running out of time is an outcome, not an error; the caller decides.

use crate::collaborators::{deadline_after, Clock, UnitSampler};
use crate::config::duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Smallest pause between ticks, keeps a zero interval from spinning
const MIN_PAUSE: Duration = Duration::from_millis(1);

/// One line of the runtime listing, e.g. `clab-ring-r1` / `Up 3 minutes (healthy)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub name: String,
    pub status: String,
}

/// Health-check state found in a status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheck {
    Healthy,
    /// Check present, reporting something else (`starting`, `unhealthy`)
    Reporting(String),
    Absent,
}

/// Parenthesized notes of a status string: `Up 2m (health: starting)` -> `health: starting`
fn annotations(status: &str) -> impl Iterator<Item = &str> {
    status
        .split('(')
        .skip(1)
        .filter_map(|chunk| chunk.split_once(')').map(|(note, _)| note.trim()))
}

impl UnitStatus {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self { name: name.into(), status: status.into() }
    }

    pub fn health_check(&self) -> HealthCheck {
        for note in annotations(&self.status) {
            let note = note.to_ascii_lowercase();
            if note == "healthy" {
                return HealthCheck::Healthy;
            }
            if note == "unhealthy" {
                return HealthCheck::Reporting(note);
            }
            if let Some(state) = note.strip_prefix("health:") {
                let state = state.trim();
                return match state {
                    "healthy" => HealthCheck::Healthy,
                    other => HealthCheck::Reporting(other.to_string()),
                };
            }
        }
        HealthCheck::Absent
    }

    /// `Up ...` (docker) or `running` (podman/containerd), and not paused
    pub fn is_running(&self) -> bool {
        let first = self.status.split_whitespace().next().unwrap_or_default();
        let up = first.eq_ignore_ascii_case("up") || first.eq_ignore_ascii_case("running");
        up && !annotations(&self.status).any(|note| note.eq_ignore_ascii_case("paused"))
    }

    pub fn is_ready(&self) -> bool {
        match self.health_check() {
            HealthCheck::Healthy => true,
            HealthCheck::Reporting(_) => false,
            HealthCheck::Absent => self.is_running(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    #[serde(with = "duration")]
    pub max_wait: Duration,
    #[serde(with = "duration")]
    pub interval: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            interval: Duration::from_secs(10),
        }
    }
}

/// What the last tick before the deadline saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LastSample {
    Units,
    Empty,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeoutReport {
    #[serde(with = "duration")]
    pub waited: Duration,
    pub ticks: u32,
    /// Units not ready at the last tick; empty unless `last_sample` is `Units`
    pub not_ready: Vec<String>,
    pub last_sample: LastSample,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReadinessOutcome {
    AllReady { ticks: u32, units: usize },
    TimedOut(TimeoutReport),
}

impl ReadinessOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessOutcome::AllReady { .. })
    }
}

enum Tick {
    AllReady(usize),
    NotReady(Vec<String>),
    Empty,
    Unavailable(String),
}

pub struct ReadinessPoller<'a> {
    sampler: &'a dyn UnitSampler,
    clock: &'a dyn Clock,
    settings: ReadinessSettings,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(sampler: &'a dyn UnitSampler, clock: &'a dyn Clock, settings: ReadinessSettings) -> Self {
        Self { sampler, clock, settings }
    }

    fn tick(&self, filter: &str) -> Tick {
        let units = match self.sampler.sample(filter) {
            Ok(units) => units,
            Err(e) => {
                warn!("Error checking container status: {}", e);
                return Tick::Unavailable(e.to_string());
            }
        };

        if units.is_empty() {
            info!("No containers found for lab filter '{}'", filter);
            return Tick::Empty;
        }

        for unit in &units {
            debug!("  {}: {}", unit.name, unit.status);
        }

        let not_ready: Vec<String> = units
            .iter()
            .filter(|u| !u.is_ready())
            .map(|u| u.name.clone())
            .collect();

        if not_ready.is_empty() {
            Tick::AllReady(units.len())
        } else {
            Tick::NotReady(not_ready)
        }
    }

    /// Blocks until every unit matching `filter` is ready or `max_wait` elapses
    pub fn wait(&self, filter: &str) -> ReadinessOutcome {
        info!(
            "Checking container health (max wait {}, every {})",
            humantime::format_duration(self.settings.max_wait),
            humantime::format_duration(self.settings.interval)
        );

        let started = self.clock.now();
        let deadline = deadline_after(started, self.settings.max_wait);
        let mut ticks = 0u32;
        let mut not_ready = Vec::new();

        loop {
            ticks += 1;
            let last_sample = match self.tick(filter) {
                Tick::AllReady(units) => {
                    info!("All {} containers are ready after {} checks", units, ticks);
                    return ReadinessOutcome::AllReady { ticks, units };
                }
                Tick::NotReady(names) => {
                    not_ready = names;
                    LastSample::Units
                }
                Tick::Empty => {
                    not_ready.clear();
                    LastSample::Empty
                }
                Tick::Unavailable(reason) => {
                    not_ready.clear();
                    LastSample::Unavailable(reason)
                }
            };

            let now = self.clock.now();
            if now >= deadline {
                let waited = now.saturating_duration_since(started);
                warn!(
                    "Timeout after waiting {} for containers to become healthy (not ready: {:?})",
                    humantime::format_duration(waited),
                    not_ready
                );
                return ReadinessOutcome::TimedOut(TimeoutReport {
                    waited,
                    ticks,
                    not_ready,
                    last_sample,
                });
            }

            let remaining = deadline - now;
            if last_sample == LastSample::Units {
                info!(
                    "Waiting for {} containers to become ready... (timeout in {}s)",
                    not_ready.len(),
                    remaining.as_secs()
                );
            }
            self.clock.sleep(self.settings.interval.min(remaining).max(MIN_PAUSE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(status: &str) -> bool {
        UnitStatus::new("clab-lab-r1", status).is_ready()
    }

    #[test]
    fn test_health_check_states() {
        let unit = |s: &str| UnitStatus::new("u", s).health_check();
        assert_eq!(unit("Up 3 minutes (healthy)"), HealthCheck::Healthy);
        assert_eq!(unit("Up 9 seconds (health: starting)"), HealthCheck::Reporting("starting".into()));
        assert_eq!(unit("Up 2 hours (unhealthy)"), HealthCheck::Reporting("unhealthy".into()));
        assert_eq!(unit("Up 2 hours"), HealthCheck::Absent);
        assert_eq!(unit("Exited (137) 5 seconds ago"), HealthCheck::Absent);
    }

    #[test]
    fn test_readiness_with_health_check() {
        assert!(ready("Up 3 minutes (healthy)"));
        assert!(ready("Up 3 minutes (health: healthy)"));
        assert!(!ready("Up 9 seconds (health: starting)"));
        assert!(!ready("Up 2 hours (unhealthy)"));
    }

    #[test]
    fn test_readiness_without_health_check() {
        assert!(ready("Up 2 hours"));
        assert!(ready("Up Less than a second"));
        assert!(ready("running"));
        assert!(!ready("Up 5 minutes (Paused)"));
        assert!(!ready("Exited (0) 2 minutes ago"));
        assert!(!ready("Restarting (1) 4 seconds ago"));
        assert!(!ready("Created"));
        assert!(!ready(""));
    }

    #[test]
    fn test_loose_health_text_is_not_a_health_check() {
        // "unhealthy" contains "healthy" and text outside parentheses is not a check
        assert!(!ready("Up 1 minute (unhealthy)"));
        assert_eq!(
            UnitStatus::new("u", "Up 4 minutes healthcheck-disabled").health_check(),
            HealthCheck::Absent
        );
        assert!(ready("Up 4 minutes healthcheck-disabled"));
    }

    #[test]
    fn test_default_settings() {
        let settings = ReadinessSettings::default();
        assert_eq!(settings.max_wait, Duration::from_secs(300));
        assert_eq!(settings.interval, Duration::from_secs(10));
    }
}
