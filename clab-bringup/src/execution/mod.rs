//! Shell-backed collaborators
//!
//! Handles:
//! - `clab deploy` (stdio inherited, sudo may prompt)
//! - `docker ps` status snapshots (captured, time-limited)
//! - `ansible-playbook` against the merged inventory
//!
//! Commands come from the config templates; placeholders are filled per
//! argument after shell-style splitting, so paths with spaces survive.

use crate::wizard;
use bringup_core::config::render_command;
use bringup_core::{CommandError, Deployer, Trigger, UnitSampler, UnitStatus};
use process_control::{ChildExt, Control};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

fn render(template: &str, vars: &[(&str, &str)]) -> Result<Vec<String>, CommandError> {
    render_command(template, vars).map_err(|e| CommandError::Unavailable(e.to_string()))
}

fn command_for(argv: &[String]) -> (String, Command) {
    let program = argv[0].clone();
    let mut command = Command::new(&program);
    command.args(&argv[1..]);
    (program, command)
}

/// Runs with the terminal attached and no time limit; only the status matters
fn run_inherited(argv: &[String]) -> Result<(), CommandError> {
    debug!("Executing: {}", argv.join(" "));
    let (program, mut command) = command_for(argv);

    let mut child = command.spawn().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;
    let status = child
        .controlled()
        .wait()
        .map_err(|source| CommandError::Spawn { program: program.clone(), source })?;

    match status {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(CommandError::Exit {
            program,
            status: status.to_string(),
            stderr: String::new(),
        }),
        None => Err(CommandError::Unavailable(format!("`{program}` did not report an exit status"))),
    }
}

/// Captures stdout, kills the process if it outlives `timeout`
fn run_captured(argv: &[String], timeout: Duration) -> Result<String, CommandError> {
    debug!("Executing: {} (timeout: {:?})", argv.join(" "), timeout);
    let (program, mut command) = command_for(argv);

    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CommandError::Spawn { program: program.clone(), source })?;

    let output = child
        .controlled_with_output()
        .time_limit(timeout)
        .terminate_for_timeout()
        .wait()
        .map_err(|source| CommandError::Spawn { program: program.clone(), source })?
        .ok_or_else(|| CommandError::TimedOut { program: program.clone(), timeout })?;

    if !output.status.success() {
        return Err(CommandError::Exit {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `name|status` lines as printed by `docker ps --format '{{.Names}}|{{.Status}}'`
pub fn parse_status_lines(stdout: &str) -> Vec<UnitStatus> {
    stdout
        .lines()
        .filter_map(|line| line.trim().split_once('|'))
        .map(|(name, status)| UnitStatus::new(name.trim(), status.trim()))
        .filter(|unit| !unit.name.is_empty())
        .collect()
}

pub struct ClabDeployer {
    template: String,
}

impl ClabDeployer {
    pub fn new(template: &str) -> Self {
        Self { template: template.to_string() }
    }
}

impl Deployer for ClabDeployer {
    fn deploy(&self, topology: &Path) -> Result<(), CommandError> {
        let topology = topology.to_string_lossy();
        let argv = render(&self.template, &[("topology", &topology)])?;
        run_inherited(&argv)
    }
}

pub struct DockerSampler {
    template: String,
    timeout: Duration,
}

impl DockerSampler {
    pub fn new(template: &str, timeout: Duration) -> Self {
        Self { template: template.to_string(), timeout }
    }
}

impl UnitSampler for DockerSampler {
    fn sample(&self, filter: &str) -> Result<Vec<UnitStatus>, CommandError> {
        let argv = render(&self.template, &[("filter", filter)])?;
        let stdout = run_captured(&argv, self.timeout)?;
        Ok(parse_status_lines(&stdout))
    }
}

/// Runs the playbook; which one is decided at trigger time
pub struct PlaybookTrigger {
    template: String,
    playbook: Option<PathBuf>,
    search_dir: PathBuf,
    interactive: bool,
}

impl PlaybookTrigger {
    pub fn new(template: &str, playbook: Option<PathBuf>, search_dir: PathBuf, interactive: bool) -> Self {
        Self {
            template: template.to_string(),
            playbook,
            search_dir,
            interactive,
        }
    }

    fn resolve_playbook(&self) -> Result<PathBuf, CommandError> {
        if let Some(playbook) = &self.playbook {
            return Ok(playbook.clone());
        }

        let mut found = wizard::discover_playbooks(&self.search_dir);
        match found.len() {
            0 => Err(CommandError::Unavailable(format!(
                "no playbook files found in {}",
                self.search_dir.display()
            ))),
            1 => Ok(found.remove(0)),
            _ if !self.interactive => Err(CommandError::Unavailable(
                "several playbooks found, choose one with --playbook".into(),
            )),
            _ => wizard::choose_file("playbook", &found)
                .map_err(|e| CommandError::Unavailable(e.to_string()))?
                .ok_or_else(|| CommandError::Unavailable("no playbook selected".into())),
        }
    }
}

impl Trigger for PlaybookTrigger {
    fn trigger(&self, inventory: &Path) -> Result<(), CommandError> {
        let playbook = self.resolve_playbook()?;
        info!("Running Ansible playbook {} with inventory {}", playbook.display(), inventory.display());

        let inventory = inventory.to_string_lossy();
        let playbook = playbook.to_string_lossy();
        let argv = render(&self.template, &[("inventory", &inventory), ("playbook", &playbook)])?;
        run_inherited(&argv)
    }
}
