//! clab-bringup - one-shot containerlab lab bring-up
//!
//! - Deploys the selected topology with containerlab
//! - Writes the topology links into the generated ansible inventory
//! - Waits for the lab containers to come up healthy
//! - Runs the ansible playbook against the lab

mod execution;
mod wizard;

use anyhow::{Context, Result};
use bringup_core::{
    load_config, Collaborators, Orchestrator, ReadinessOutcome, RunReport, SystemClock, TopologyDocument,
    TriggerDecision,
};
use clap::Parser;
use execution::{ClabDeployer, DockerSampler, PlaybookTrigger};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wizard::InteractiveOperator;

const DEFAULT_LOG_FILTER: &str = "clab_bringup=info,bringup_core=info";

#[derive(Debug, Parser)]
#[command(name = "clab-bringup", version, about)]
struct Cli {
    /// Topology file; prompts with the YAML files in the current directory when omitted
    topology: Option<PathBuf>,

    /// Playbook to run once the lab is ready
    #[arg(long)]
    playbook: Option<PathBuf>,

    /// Don't ask before deploying, never run the playbook after a readiness timeout
    #[arg(short, long)]
    yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Config file (defaults to $CLAB_BRINGUP_CONFIG or ./bringup.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    info!("clab-bringup v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let cwd = std::env::current_dir().context("Failed to resolve the current directory")?;

    let Some(topology) = wizard::select_topology(cli.topology.as_deref(), &cwd)? else {
        println!("❌ No valid YAML file selected. Exiting.");
        return Ok(ExitCode::from(2));
    };

    let lab = TopologyDocument::load(&topology)
        .and_then(|doc| doc.lab_name().map(str::to_string))
        .with_context(|| format!("Failed to read lab name from {}", topology.display()))?;

    if !cli.yes && !wizard::confirm_deploy(&topology, &lab)? {
        println!("❌ Deployment cancelled.");
        return Ok(ExitCode::from(2));
    }

    let deployer = ClabDeployer::new(&config.commands.deploy);
    let sampler = DockerSampler::new(&config.commands.status, config.commands.status_timeout);
    let trigger = PlaybookTrigger::new(&config.commands.trigger, cli.playbook.clone(), cwd, !cli.yes);
    let operator = InteractiveOperator::new(cli.yes);
    let clock = SystemClock;

    let orchestrator = Orchestrator::new(
        &config,
        Collaborators {
            deployer: &deployer,
            sampler: &sampler,
            trigger: &trigger,
            operator: &operator,
            clock: &clock,
        },
    );
    let report = orchestrator
        .run(&topology)
        .with_context(|| format!("Bring-up of lab '{}' failed", lab))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to encode report")?);
    } else {
        print_summary(&report);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &RunReport) {
    println!();
    println!("✅ Lab '{}' brought up", report.lab);
    println!("   Inventory: {}", report.inventory.display());
    println!("   Links written: {}", report.links);
    match &report.readiness {
        ReadinessOutcome::AllReady { ticks, units } => {
            println!("   Ready: {} nodes after {} checks", units, ticks)
        }
        ReadinessOutcome::TimedOut(timeout) => {
            println!("   Not ready: {}", timeout.not_ready.join(", "))
        }
    }
    let trigger = match report.trigger {
        TriggerDecision::Ran => "playbook ran",
        TriggerDecision::RanAfterConfirmation => "playbook ran after confirmation",
        TriggerDecision::Skipped => "playbook skipped",
    };
    println!("   Trigger: {}", trigger);
}
