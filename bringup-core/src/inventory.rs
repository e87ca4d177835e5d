//! Inventory merge: splice derived links into the ansible inventory
//!
//! The inventory is generated by containerlab and its shape changes across
//! versions, so the target location is picked by a ladder (first match wins):
//! 1. `all.children.<group>.vars` (vars created if absent)
//! 2. `all.vars`
//! 3. a new key on the document root
//!
//! Location resolution is pure; `attach` does the insertion and
//! [`merge_inventory_file`] performs the single replace-write. Everything
//! outside the link key is left as it was.

use crate::links::DerivedLink;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ALL: &str = "all";
const CHILDREN: &str = "children";
const VARS: &str = "vars";

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("inventory document is invalid: {0}")]
    InvalidDocument(String),
    #[error("no links derived from the topology, inventory left untouched")]
    NoLinksDerived,
    #[error("inventory I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize inventory: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Where to look for the platform group and how to name the link list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    pub target_group: String,
    pub links_key: String,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            target_group: "nokia_sros".to_string(),
            links_key: "links".to_string(),
        }
    }
}

/// Which rung of the ladder received the links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum LinkLocation {
    GroupVars { group: String },
    RootVars,
    DocumentRoot,
}

impl LinkLocation {
    /// Path of the mapping that holds the link key
    pub fn parent_path(&self) -> Vec<&str> {
        match self {
            LinkLocation::GroupVars { group } => vec![ALL, CHILDREN, group.as_str(), VARS],
            LinkLocation::RootVars => vec![ALL, VARS],
            LinkLocation::DocumentRoot => Vec::new(),
        }
    }

    pub fn key_path(&self, links_key: &str) -> String {
        let mut path = self.parent_path();
        path.push(links_key);
        path.join(".")
    }
}

/// Inventory tree; the root is always a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryDocument {
    root: Value,
}

impl InventoryDocument {
    pub fn parse(text: &str) -> Result<Self, MergeError> {
        let root: Value =
            serde_yaml::from_str(text).map_err(|e| MergeError::InvalidDocument(e.to_string()))?;
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            Value::Null => Err(MergeError::InvalidDocument("document is empty".into())),
            _ => Err(MergeError::InvalidDocument("document root is not a mapping".into())),
        }
    }

    pub fn to_yaml(&self) -> Result<String, MergeError> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Follows mapping keys; `None` as soon as a step is missing
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.root, |node, key| node.as_mapping()?.get(*key))
    }
}

/// A mapping, or null which YAML writes for an empty `key:`
fn is_mapping_like(value: &Value) -> bool {
    matches!(value, Value::Mapping(_) | Value::Null)
}

pub fn resolve_location(doc: &InventoryDocument, policy: &MergePolicy) -> LinkLocation {
    let group = doc.get(&[ALL, CHILDREN, policy.target_group.as_str()]);
    if let Some(group) = group.filter(|g| is_mapping_like(g)) {
        let vars_ok = group
            .as_mapping()
            .and_then(|m| m.get(VARS))
            .map_or(true, is_mapping_like);
        if vars_ok {
            return LinkLocation::GroupVars { group: policy.target_group.clone() };
        }
    }

    if doc.get(&[ALL, VARS]).is_some_and(is_mapping_like) {
        return LinkLocation::RootVars;
    }

    LinkLocation::DocumentRoot
}

/// Walks `path` from `root`, creating missing mappings and replacing nulls
fn mapping_at_mut<'a>(root: &'a mut Value, path: &[&str]) -> Option<&'a mut Mapping> {
    let mut node = root;
    for key in path {
        let map = node.as_mapping_mut()?;
        let child = map.entry(Value::from(*key)).or_insert(Value::Null);
        if child.is_null() {
            *child = Value::Mapping(Mapping::new());
        }
        node = child;
    }
    node.as_mapping_mut()
}

/// Replaces (never appends to) the link list at `location`
pub fn attach(
    doc: &mut InventoryDocument,
    location: &LinkLocation,
    policy: &MergePolicy,
    links: &[DerivedLink],
) -> Result<(), MergeError> {
    let parent = mapping_at_mut(&mut doc.root, &location.parent_path()).ok_or_else(|| {
        MergeError::InvalidDocument(format!(
            "cannot write {}",
            location.key_path(&policy.links_key)
        ))
    })?;

    let list = links.iter().map(DerivedLink::to_value).collect();
    parent.insert(Value::from(policy.links_key.as_str()), Value::Sequence(list));
    Ok(())
}

/// Pure merge: returns the updated document and where the links went
pub fn merge(
    doc: &InventoryDocument,
    links: &[DerivedLink],
    policy: &MergePolicy,
) -> Result<(InventoryDocument, LinkLocation), MergeError> {
    if links.is_empty() {
        return Err(MergeError::NoLinksDerived);
    }

    let location = resolve_location(doc, policy);
    let mut merged = doc.clone();
    attach(&mut merged, &location, policy, links)?;
    Ok((merged, location))
}

/// Writes `contents` to a hidden sibling, then renames it over `path`.
/// The sibling is removed if either step fails.
fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("inventory");
    let staging = path.with_file_name(format!(".{file_name}.tmp"));
    debug!("Writing merged inventory to {}", staging.display());

    let result = std::fs::write(&staging, contents).and_then(|()| std::fs::rename(&staging, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

/// Read, merge and replace the inventory at `path`
///
/// Nothing is written unless the merge succeeds. The new content goes to a
/// sibling temp file which is then renamed over the original.
pub fn merge_inventory_file(
    path: &Path,
    links: &[DerivedLink],
    policy: &MergePolicy,
) -> Result<LinkLocation, MergeError> {
    if links.is_empty() {
        return Err(MergeError::NoLinksDerived);
    }

    let io_err = |source| MergeError::Io { path: path.to_path_buf(), source };

    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let existing = InventoryDocument::parse(&text)?;
    let (merged, location) = merge(&existing, links, policy)?;
    let rendered = merged.to_yaml()?;

    replace_file(path, &rendered).map_err(io_err)?;

    info!(
        "Inventory {} updated: {} links at {}",
        path.display(),
        links.len(),
        location.key_path(&policy.links_key)
    );
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::derive_links;
    use crate::topology::TopologyLink;

    const CLAB_INVENTORY: &str = r#"
all:
  vars:
    ansible_connection: network_cli
  children:
    nokia_sros:
      hosts:
        clab-ring-r1:
          ansible_host: 172.20.20.2
        clab-ring-r2:
          ansible_host: 172.20.20.3
    linux:
      hosts:
        clab-ring-client: {}
"#;

    fn links() -> Vec<DerivedLink> {
        derive_links(&[
            TopologyLink::new("r1:eth1", "r2:eth1"),
            TopologyLink::new("r1:eth2", "r2:eth2"),
        ])
        .unwrap()
    }

    fn doc(text: &str) -> InventoryDocument {
        InventoryDocument::parse(text).unwrap()
    }

    fn link_count(doc: &InventoryDocument, path: &[&str]) -> Option<usize> {
        doc.get(path).and_then(Value::as_sequence).map(Vec::len)
    }

    #[test]
    fn test_resolve_group_vars_when_group_present() {
        let location = resolve_location(&doc(CLAB_INVENTORY), &MergePolicy::default());
        assert_eq!(location, LinkLocation::GroupVars { group: "nokia_sros".into() });
        assert_eq!(location.key_path("links"), "all.children.nokia_sros.vars.links");
    }

    #[test]
    fn test_resolve_root_vars_without_group() {
        let text = "all:\n  vars: {ansible_user: admin}\n  children:\n    linux: {}\n";
        assert_eq!(resolve_location(&doc(text), &MergePolicy::default()), LinkLocation::RootVars);
    }

    #[test]
    fn test_resolve_document_root_fallback() {
        let text = "hosts:\n  r1: {}\n";
        assert_eq!(
            resolve_location(&doc(text), &MergePolicy::default()),
            LinkLocation::DocumentRoot
        );
    }

    #[test]
    fn test_group_vars_created_when_absent() {
        let (merged, _) = merge(&doc(CLAB_INVENTORY), &links(), &MergePolicy::default()).unwrap();

        assert_eq!(link_count(&merged, &["all", "children", "nokia_sros", "vars", "links"]), Some(2));
        assert!(merged.get(&["all", "vars", "links"]).is_none());
        assert!(merged.get(&["links"]).is_none());
    }

    #[test]
    fn test_null_group_is_filled_in() {
        let text = "all:\n  children:\n    nokia_sros:\n";
        let (merged, location) = merge(&doc(text), &links(), &MergePolicy::default()).unwrap();

        assert!(matches!(location, LinkLocation::GroupVars { .. }));
        assert_eq!(link_count(&merged, &["all", "children", "nokia_sros", "vars", "links"]), Some(2));
    }

    #[test]
    fn test_group_with_unusable_vars_falls_through() {
        let text = "all:\n  vars: {}\n  children:\n    nokia_sros:\n      vars: [oops]\n";
        let (merged, location) = merge(&doc(text), &links(), &MergePolicy::default()).unwrap();

        assert_eq!(location, LinkLocation::RootVars);
        assert_eq!(link_count(&merged, &["all", "vars", "links"]), Some(2));
        assert_eq!(
            merged.get(&["all", "children", "nokia_sros", "vars"]),
            Some(&Value::Sequence(vec![Value::from("oops")]))
        );
    }

    #[test]
    fn test_custom_group_and_key() {
        let policy = MergePolicy { target_group: "linux".into(), links_key: "fabric".into() };
        let (merged, _) = merge(&doc(CLAB_INVENTORY), &links(), &policy).unwrap();

        assert_eq!(link_count(&merged, &["all", "children", "linux", "vars", "fabric"]), Some(2));
        assert!(merged.get(&["all", "children", "nokia_sros", "vars"]).is_none());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let policy = MergePolicy::default();
        let (once, _) = merge(&doc(CLAB_INVENTORY), &links(), &policy).unwrap();
        let (twice, _) = merge(&once, &links(), &policy).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.to_yaml().unwrap(), twice.to_yaml().unwrap());
    }

    #[test]
    fn test_unrelated_content_preserved() {
        let text = format!("{CLAB_INVENTORY}\nmeta:\n  generated_by: containerlab\n  version: 0.48\n");
        let before = doc(&text);
        let (after, _) = merge(&before, &links(), &MergePolicy::default()).unwrap();

        assert_eq!(after.get(&["meta"]), before.get(&["meta"]));
        assert_eq!(after.get(&["all", "vars"]), before.get(&["all", "vars"]));
        assert_eq!(
            after.get(&["all", "children", "nokia_sros", "hosts"]),
            before.get(&["all", "children", "nokia_sros", "hosts"])
        );
        assert_eq!(after.get(&["all", "children", "linux"]), before.get(&["all", "children", "linux"]));

        let top_keys: Vec<_> = after.root().as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(top_keys, vec![Value::from("all"), Value::from("meta")]);
    }

    #[test]
    fn test_invalid_documents() {
        for text in ["", "- a\n- b\n", "just a string", "all: [unclosed"] {
            assert!(
                matches!(InventoryDocument::parse(text), Err(MergeError::InvalidDocument(_))),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_empty_links_rejected() {
        let result = merge(&doc(CLAB_INVENTORY), &[], &MergePolicy::default());
        assert!(matches!(result, Err(MergeError::NoLinksDerived)));
    }

    #[test]
    fn test_file_merge_writes_once_and_cleans_staging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ansible-inventory.yml");
        std::fs::write(&path, CLAB_INVENTORY).unwrap();

        let location = merge_inventory_file(&path, &links(), &MergePolicy::default()).unwrap();
        assert!(matches!(location, LinkLocation::GroupVars { .. }));

        let reread = doc(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(link_count(&reread, &["all", "children", "nokia_sros", "vars", "links"]), Some(2));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failed_replace_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let target = dir.path().join("ansible-inventory.yml");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(replace_file(&target, "all: {}\n").is_err());

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        assert_eq!(names, ["ansible-inventory.yml"]);
        assert!(target.join("keep").exists());
    }

    #[test]
    fn test_file_untouched_on_failure() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("ansible-inventory.yml");
        std::fs::write(&path, CLAB_INVENTORY).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let result = merge_inventory_file(&path, &[], &MergePolicy::default());
        assert!(matches!(result, Err(MergeError::NoLinksDerived)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CLAB_INVENTORY);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);

        let broken = dir.path().join("broken.yml");
        std::fs::write(&broken, "all: [unclosed").unwrap();
        let result = merge_inventory_file(&broken, &links(), &MergePolicy::default());
        assert!(matches!(result, Err(MergeError::InvalidDocument(_))));
        assert_eq!(std::fs::read_to_string(&broken).unwrap(), "all: [unclosed");
    }
}
