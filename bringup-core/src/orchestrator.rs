//! Pipeline sequencing
//!
//! Deploy -> wait for inventory -> derive + merge -> readiness -> trigger.
//!
//! Structural failures (bad topology, failed deploy, missing or invalid
//! inventory) stop the run before anything is written. A readiness timeout
//! does not: it goes to the [`Operator`] who decides whether the trigger
//! still runs.

use crate::collaborators::{deadline_after, Clock, CommandError, Deployer, Operator, Trigger, UnitSampler};
use crate::config::BringupConfig;
use crate::inventory::{merge_inventory_file, LinkLocation, MergeError};
use crate::links::{derive_links, LinkError};
use crate::readiness::{ReadinessOutcome, ReadinessPoller};
use crate::topology::{self, TopologyDocument, TopologyError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("deployment failed: {0}")]
    DeployFailed(#[source] CommandError),
    #[error("inventory {} not found after {waited:?}", .path.display())]
    InventoryNotFound { path: PathBuf, waited: Duration },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("downstream trigger failed: {0}")]
    TriggerFailed(#[source] CommandError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    Ran,
    /// Readiness timed out and the operator chose to go ahead
    RanAfterConfirmation,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub lab: String,
    pub inventory: PathBuf,
    pub links: usize,
    pub location: LinkLocation,
    pub readiness: ReadinessOutcome,
    pub trigger: TriggerDecision,
}

/// Everything the pipeline talks to
pub struct Collaborators<'a> {
    pub deployer: &'a dyn Deployer,
    pub sampler: &'a dyn UnitSampler,
    pub trigger: &'a dyn Trigger,
    pub operator: &'a dyn Operator,
    pub clock: &'a dyn Clock,
}

pub struct Orchestrator<'a> {
    config: &'a BringupConfig,
    io: Collaborators<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a BringupConfig, io: Collaborators<'a>) -> Self {
        Self { config, io }
    }

    pub fn run(&self, topology_path: &Path) -> Result<RunReport, PipelineError> {
        let topology = TopologyDocument::load(topology_path)?;
        let lab = topology.lab_name()?.to_string();

        info!("Deploying topology: {}", topology_path.display());
        self.io.deployer.deploy(topology_path).map_err(PipelineError::DeployFailed)?;
        info!("Topology '{}' successfully deployed", lab);

        let inventory = topology::inventory_path(topology_path, &lab);
        self.wait_for_inventory(&inventory)?;

        let links = derive_links(topology.links())?;
        let location = merge_inventory_file(&inventory, &links, &self.config.inventory.merge_policy())?;

        let poller = ReadinessPoller::new(self.io.sampler, self.io.clock, self.config.readiness);
        let readiness = poller.wait(&topology::unit_filter(&lab));

        let trigger = match &readiness {
            ReadinessOutcome::AllReady { .. } => {
                info!("All containers are healthy, running the configuration pass");
                self.run_trigger(&inventory)?;
                TriggerDecision::Ran
            }
            ReadinessOutcome::TimedOut(report) => {
                warn!("Some containers are not healthy: {:?}", report.not_ready);
                if self.io.operator.confirm_proceed(report) {
                    self.run_trigger(&inventory)?;
                    TriggerDecision::RanAfterConfirmation
                } else {
                    warn!("Skipping the configuration pass");
                    TriggerDecision::Skipped
                }
            }
        };

        Ok(RunReport {
            lab,
            inventory,
            links: links.len(),
            location,
            readiness,
            trigger,
        })
    }

    /// Containerlab writes the inventory some time after `deploy` returns
    fn wait_for_inventory(&self, path: &Path) -> Result<(), PipelineError> {
        let settings = &self.config.inventory;
        let started = self.io.clock.now();
        let deadline = deadline_after(started, settings.wait);

        loop {
            if path.exists() {
                info!("Ansible inventory file found: {}", path.display());
                return Ok(());
            }

            let now = self.io.clock.now();
            if now >= deadline {
                return Err(PipelineError::InventoryNotFound {
                    path: path.to_path_buf(),
                    waited: now.saturating_duration_since(started),
                });
            }

            info!(
                "Waiting for ansible inventory file... ({}s/{}s)",
                now.saturating_duration_since(started).as_secs(),
                settings.wait.as_secs()
            );
            let pause = settings.poll_interval.min(deadline - now).max(Duration::from_millis(1));
            self.io.clock.sleep(pause);
        }
    }

    fn run_trigger(&self, inventory: &Path) -> Result<(), PipelineError> {
        self.io.trigger.trigger(inventory).map_err(PipelineError::TriggerFailed)?;
        info!("Configuration pass completed for {}", inventory.display());
        Ok(())
    }
}
