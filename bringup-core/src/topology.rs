//! Topology document as written for containerlab
//!
//! Only the parts the bring-up needs are modelled: the lab `name` and the
//! `topology.links` list. Nodes, kinds and images stay opaque.

use serde::Deserialize;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

/// Directory containerlab creates next to the topology file: `clab-<name>`
const LAB_DIR_PREFIX: &str = "clab-";
const INVENTORY_FILE: &str = "ansible-inventory.yml";

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("cannot read topology {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid topology document: {0}")]
    Invalid(#[from] serde_yaml::Error),
    #[error("lab name not found in the topology document")]
    MissingLabName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopologyDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    topology: Option<TopologySection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TopologySection {
    #[serde(default)]
    links: Option<Vec<TopologyLink>>,
}

/// One `topology.links[]` entry, endpoints normalized to `node:interface`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawLink")]
pub struct TopologyLink {
    pub endpoints: [String; 2],
    pub vars: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    endpoints: Vec<RawEndpoint>,
    #[serde(default)]
    vars: Option<Mapping>,
}

/// Containerlab accepts `"node:eth1"` and `{node: .., interface: ..}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEndpoint {
    Brief(String),
    Extended { node: String, interface: String },
}

impl RawEndpoint {
    fn into_brief(self) -> String {
        match self {
            RawEndpoint::Brief(id) => id,
            RawEndpoint::Extended { node, interface } => format!("{node}:{interface}"),
        }
    }
}

impl TryFrom<RawLink> for TopologyLink {
    type Error = String;

    fn try_from(raw: RawLink) -> Result<Self, Self::Error> {
        let count = raw.endpoints.len();
        let mut endpoints = raw.endpoints.into_iter().map(RawEndpoint::into_brief);
        match (endpoints.next(), endpoints.next(), endpoints.next()) {
            (Some(a), Some(b), None) => Ok(TopologyLink { endpoints: [a, b], vars: raw.vars }),
            _ => Err(format!("a link needs exactly two endpoints, found {count}")),
        }
    }
}

impl TopologyLink {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self { endpoints: [a.into(), b.into()], vars: None }
    }

    pub fn with_vars(mut self, vars: Mapping) -> Self {
        self.vars = Some(vars);
        self
    }
}

impl TopologyDocument {
    pub fn from_yaml(text: &str) -> Result<Self, TopologyError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Lab instance name; absent or blank names are rejected
    pub fn lab_name(&self) -> Result<&str, TopologyError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(TopologyError::MissingLabName),
        }
    }

    pub fn links(&self) -> &[TopologyLink] {
        self.topology
            .as_ref()
            .and_then(|t| t.links.as_deref())
            .unwrap_or_default()
    }
}

/// `<topology dir>/clab-<lab>/ansible-inventory.yml`
pub fn inventory_path(topology_path: &Path, lab: &str) -> PathBuf {
    let base = topology_path.parent().unwrap_or_else(|| Path::new(""));
    base.join(format!("{LAB_DIR_PREFIX}{lab}")).join(INVENTORY_FILE)
}

/// Name filter matching every container of the lab
pub fn unit_filter(lab: &str) -> String {
    format!("{LAB_DIR_PREFIX}{lab}")
}
