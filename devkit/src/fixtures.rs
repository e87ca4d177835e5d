/*!
Document fixtures

Inventory shapes seen across containerlab versions, and a small topology
builder. Every inventory carries an unrelated `meta` block so tests can check
it survives the merge.
*/

/// Inventory with the `all.children.<group>` layout containerlab writes
pub fn grouped_inventory(lab: &str, group: &str, nodes: &[&str]) -> String {
    let mut out = String::from("all:\n  vars:\n    ansible_connection: network_cli\n  children:\n");
    out.push_str(&format!("    {group}:\n      hosts:\n"));
    for node in nodes {
        out.push_str(&format!("        clab-{lab}-{node}:\n          ansible_host: 172.20.20.10\n"));
    }
    out.push_str(META);
    out
}

/// No platform group, only `all.vars`
pub fn root_vars_inventory(lab: &str) -> String {
    format!("all:\n  vars:\n    ansible_user: admin\n  hosts:\n    clab-{lab}-r1: {{}}\n{META}")
}

/// Neither groups nor vars
pub fn flat_inventory(lab: &str) -> String {
    format!("hosts:\n  clab-{lab}-r1: {{}}\n{META}")
}

const META: &str = "meta:\n  generated_by: containerlab\n  schema: 2\n";

/// Topology with brief endpoints; each pair becomes one link
pub fn topology(lab: &str, links: &[(&str, &str)]) -> String {
    let mut out = format!("name: {lab}\ntopology:\n  nodes:\n    r1:\n      kind: nokia_sros\n  links:\n");
    if links.is_empty() {
        out.push_str("    []\n");
    }
    for (a, b) in links {
        out.push_str(&format!("    - endpoints: [\"{a}\", \"{b}\"]\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bringup_core::TopologyDocument;

    #[test]
    fn test_fixtures_parse() {
        for text in [grouped_inventory("lab", "nokia_sros", &["r1", "r2"]), root_vars_inventory("lab"), flat_inventory("lab")] {
            let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
            assert!(value.get("meta").is_some(), "{text}");
        }

        let doc = TopologyDocument::from_yaml(&topology("lab", &[("r1:eth1", "r2:eth1")])).unwrap();
        assert_eq!(doc.links().len(), 1);

        let doc = TopologyDocument::from_yaml(&topology("lab", &[])).unwrap();
        assert!(doc.links().is_empty());
    }
}
