//! Link derivation: topology links -> port-addressed inventory links
//!
//! `node1:eth3` maps to port `1/1/3`. The derivation is all-or-nothing: one
//! malformed endpoint aborts the whole batch, since the merge downstream
//! assumes every link is covered.

use crate::topology::TopologyLink;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// Separates the node from the interface number in an endpoint id
const INTERFACE_MARKER: &str = ":eth";
const PORT_KEY: &str = "port";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("malformed endpoint `{endpoint}`: expected <node>:eth<N>")]
    MalformedEndpoint { endpoint: String },
}

/// Link record as written into the inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedLink {
    pub endpoints: [String; 2],
    pub vars: Mapping,
}

impl DerivedLink {
    pub fn ports(&self) -> Option<&Value> {
        self.vars.get(PORT_KEY)
    }

    pub fn to_value(&self) -> Value {
        let endpoints = self.endpoints.iter().cloned().map(Value::String).collect();

        let mut record = Mapping::new();
        record.insert(Value::from("endpoints"), Value::Sequence(endpoints));
        record.insert(Value::from("vars"), Value::Mapping(self.vars.clone()));
        Value::Mapping(record)
    }
}

/// Port address for one endpoint id
pub fn port_address(endpoint: &str) -> Result<String, LinkError> {
    let malformed = || LinkError::MalformedEndpoint { endpoint: endpoint.to_string() };

    let (_, suffix) = endpoint.split_once(INTERFACE_MARKER).ok_or_else(malformed)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let number = match suffix.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };

    Ok(format!("1/1/{number}"))
}

pub fn derive_link(link: &TopologyLink) -> Result<DerivedLink, LinkError> {
    let ports = link
        .endpoints
        .iter()
        .map(|ep| port_address(ep).map(Value::String))
        .collect::<Result<Vec<_>, _>>()?;

    let mut vars = Mapping::new();
    vars.insert(Value::from(PORT_KEY), Value::Sequence(ports));

    if let Some(extra) = &link.vars {
        for (key, value) in extra {
            if key.as_str() == Some(PORT_KEY) {
                continue;
            }
            vars.insert(key.clone(), value.clone());
        }
    }

    Ok(DerivedLink { endpoints: link.endpoints.clone(), vars })
}

/// Same length, same order as the input, or the first error
pub fn derive_links(links: &[TopologyLink]) -> Result<Vec<DerivedLink>, LinkError> {
    links.iter().map(derive_link).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_port_address() {
        assert_eq!(port_address("node1:eth3").unwrap(), "1/1/3");
        assert_eq!(port_address("leaf-01:eth12").unwrap(), "1/1/12");
        assert_eq!(port_address("r1:eth03").unwrap(), "1/1/3");
        assert_eq!(port_address("r1:eth0").unwrap(), "1/1/0");
        assert_eq!(port_address("r1:eth000").unwrap(), "1/1/0");
    }

    #[test]
    fn test_port_address_keeps_large_interface_numbers() {
        assert_eq!(port_address("r1:eth99999999999").unwrap(), "1/1/99999999999");
        assert_eq!(
            port_address("r1:eth123456789012345678901234567890").unwrap(),
            "1/1/123456789012345678901234567890"
        );
    }

    #[test]
    fn test_port_address_rejects_bad_tokens() {
        for bad in ["node1", "node1:e1-1", "node1:eth", "node1:ethX", "node1:eth1.100"] {
            assert_eq!(
                port_address(bad),
                Err(LinkError::MalformedEndpoint { endpoint: bad.to_string() }),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_derive_example_link() {
        let derived = derive_link(&TopologyLink::new("node1:eth3", "node2:eth7")).unwrap();

        let expected: Value = serde_yaml::from_str(
            r#"{endpoints: ["node1:eth3", "node2:eth7"], vars: {port: ["1/1/3", "1/1/7"]}}"#,
        )
        .unwrap();
        assert_eq!(derived.to_value(), expected);
    }

    #[test]
    fn test_source_vars_overlay_but_port_wins() {
        let link = TopologyLink::new("a:eth1", "b:eth2")
            .with_vars(mapping("{port: [x, y], mtu: 9000, descr: uplink}"));
        let derived = derive_link(&link).unwrap();

        let keys: Vec<_> = derived.vars.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, ["port", "mtu", "descr"]);
        assert_eq!(derived.ports().unwrap(), &Value::from(vec!["1/1/1", "1/1/2"]));
        assert_eq!(derived.vars.get("mtu"), Some(&Value::from(9000)));
    }

    #[test]
    fn test_derive_links_preserves_length_and_order() {
        let links: Vec<_> = (1..=6)
            .map(|n| TopologyLink::new(format!("r{n}:eth{n}"), format!("r{}:eth{}", n + 1, n + 10)))
            .collect();
        let derived = derive_links(&links).unwrap();

        assert_eq!(derived.len(), links.len());
        for (n, (src, out)) in (1..).zip(links.iter().zip(&derived)) {
            assert_eq!(src.endpoints, out.endpoints);
            let expected = vec![format!("1/1/{n}"), format!("1/1/{}", n + 10)];
            assert_eq!(out.ports().unwrap(), &Value::from(expected));
        }
    }

    #[test]
    fn test_one_bad_endpoint_aborts_everything() {
        let links = vec![
            TopologyLink::new("a:eth1", "b:eth1"),
            TopologyLink::new("a:eth2", "b:mgmt0"),
            TopologyLink::new("a:eth3", "b:eth3"),
        ];
        assert_eq!(
            derive_links(&links),
            Err(LinkError::MalformedEndpoint { endpoint: "b:mgmt0".into() })
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let links = vec![TopologyLink::new("a:eth1", "b:eth1").with_vars(mapping("{z: 1, a: 2}"))];
        let first = serde_yaml::to_string(&derive_links(&links).unwrap()).unwrap();
        let second = serde_yaml::to_string(&derive_links(&links).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
