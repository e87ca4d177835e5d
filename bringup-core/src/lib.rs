//! Bring-up orchestration core for containerlab labs
//!
//! Handles:
//! - Topology parsing and link derivation (port addressing)
//! - Inventory merge with a location ladder over varying document shapes
//! - Bounded readiness polling over runtime-unit snapshots
//! - Pipeline sequencing with hard stops (structure) and soft stops (timing)
//!
//! Nothing in this crate spawns a process or talks to a terminal: effects go
//! through the traits in [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod inventory;
pub mod links;
pub mod orchestrator;
pub mod readiness;
pub mod topology;

pub use collaborators::{Clock, CommandError, Deployer, Operator, SystemClock, Trigger, UnitSampler};
pub use config::{load_config, BringupConfig, ConfigError};
pub use inventory::{merge_inventory_file, InventoryDocument, LinkLocation, MergeError, MergePolicy};
pub use links::{derive_links, DerivedLink, LinkError};
pub use orchestrator::{Collaborators, Orchestrator, PipelineError, RunReport, TriggerDecision};
pub use readiness::{ReadinessOutcome, ReadinessPoller, ReadinessSettings, TimeoutReport, UnitStatus};
pub use topology::{TopologyDocument, TopologyError, TopologyLink};
