//! Interactive prompts for picking files and confirming steps
//!
//! Everything here reads stdin line by line, so it also works when answers
//! are piped in.

use anyhow::Result;
use bringup_core::readiness::LastSample;
use bringup_core::{Operator, TimeoutReport};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("yaml" | "yml")
    )
}

/// YAML files directly under `dir`, sorted by name
pub fn discover_yaml_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_yaml(path))
        .collect();
    files.sort();
    files
}

pub fn discover_playbooks(dir: &Path) -> Vec<PathBuf> {
    discover_yaml_files(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase().contains("playbook"))
                .unwrap_or(false)
        })
        .collect()
}

/// A 1-based list number or a file name from `files`
pub fn parse_choice(input: &str, files: &[PathBuf]) -> Option<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(number) = input.parse::<usize>() {
        return number.checked_sub(1).and_then(|idx| files.get(idx)).cloned();
    }

    files
        .iter()
        .find(|path| path.file_name().is_some_and(|name| name == input) || path.as_os_str() == input)
        .cloned()
}

fn read_answer(prompt: &str) -> Result<String> {
    print!("❓ {} ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Keeps asking until the answer is y or n; no default
pub fn prompt_yes_no(prompt: &str) -> Result<bool> {
    loop {
        match read_answer(&format!("{} (y/n):", prompt))?.to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("❌ Please enter 'y' or 'n'."),
        }
    }
}

/// Lists `files` and lets the operator pick one, `None` if they give up
pub fn choose_file(kind: &str, files: &[PathBuf]) -> Result<Option<PathBuf>> {
    if files.is_empty() {
        println!("❌ No {kind} files found in the current directory.");
        return Ok(None);
    }

    loop {
        println!();
        println!("📂 Available {kind} files:");
        for (idx, path) in files.iter().enumerate() {
            let name = path.file_name().unwrap_or(path.as_os_str());
            println!("   {}. {}", idx + 1, name.to_string_lossy());
        }

        let answer = read_answer(&format!("Enter the number of the {kind} file, or type its name:"))?;
        if let Some(choice) = parse_choice(&answer, files) {
            return Ok(Some(choice));
        }

        println!("❌ Invalid choice: `{answer}`.");
        if !prompt_yes_no("Do you want to try again?")? {
            return Ok(None);
        }
    }
}

/// Uses `given` when it names an existing YAML file, otherwise asks
pub fn select_topology(given: Option<&Path>, dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = given {
        if path.is_file() && is_yaml(path) {
            return Ok(Some(path.to_path_buf()));
        }
        println!("❌ {} is not an existing .yaml/.yml file.", path.display());
    }

    choose_file("topology", &discover_yaml_files(dir))
}

pub fn confirm_deploy(topology: &Path, lab: &str) -> Result<bool> {
    println!();
    println!("🚀 About to deploy lab '{}' from {}", lab, topology.display());
    prompt_yes_no("Do you want to proceed with the deployment?")
}

/// Asks whether to trigger the playbook after readiness gave up
pub struct InteractiveOperator {
    assume_yes: bool,
}

impl InteractiveOperator {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Operator for InteractiveOperator {
    fn confirm_proceed(&self, report: &TimeoutReport) -> bool {
        println!();
        println!("⚠️  Nodes not ready after {}", humanize(report));
        match &report.last_sample {
            LastSample::Units => {
                for name in &report.not_ready {
                    println!("   - {name}");
                }
            }
            LastSample::Empty => println!("   (no lab containers were listed)"),
            LastSample::Unavailable(reason) => println!("   (status unavailable: {reason})"),
        }

        if self.assume_yes {
            warn!("Non-interactive run, not triggering the playbook after a readiness timeout");
            return false;
        }

        match prompt_yes_no("Do you want to run the Ansible playbook anyway?") {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Could not read an answer ({e}), skipping the playbook");
                false
            }
        }
    }
}

fn humanize(report: &TimeoutReport) -> String {
    format!("{} ({} checks)", humantime::format_duration(report.waited), report.ticks)
}
