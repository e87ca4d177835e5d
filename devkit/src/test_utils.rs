/*!
Test harness for pipeline runs

Lays a lab out in a temporary directory the way containerlab expects it:
`<dir>/<lab>.clab.yml` next to `<dir>/clab-<lab>/ansible-inventory.yml`.
*/

use anyhow::{Context, Result};
use bringup_core::topology;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestHarness {
    dir: TempDir,
    pub lab: String,
}

impl TestHarness {
    pub fn new(lab: &str) -> Result<Self> {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();

        Ok(Self {
            dir: tempfile::tempdir().context("failed to create temp lab dir")?,
            lab: lab.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn topology_path(&self) -> PathBuf {
        self.dir.path().join(format!("{}.clab.yml", self.lab))
    }

    pub fn inventory_path(&self) -> PathBuf {
        topology::inventory_path(&self.topology_path(), &self.lab)
    }

    pub fn write_topology(&self, text: &str) -> Result<PathBuf> {
        let path = self.topology_path();
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Writes the inventory now, as if a previous deploy had produced it
    pub fn write_inventory(&self, text: &str) -> Result<PathBuf> {
        let path = self.inventory_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn read_inventory_text(&self) -> Result<String> {
        let path = self.inventory_path();
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    pub fn read_inventory(&self) -> Result<Value> {
        Ok(serde_yaml::from_str(&self.read_inventory_text()?)?)
    }

    /// Value at a dotted key path, e.g. `all.children.nokia_sros.vars.links`
    pub fn inventory_at(&self, dotted: &str) -> Result<Option<Value>> {
        let root = self.read_inventory()?;
        Ok(dotted
            .split('.')
            .try_fold(&root, |node, key| node.get(key))
            .cloned())
    }
}
