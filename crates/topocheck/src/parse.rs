use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use serde_json::Value;

use crate::{
    address::{HttpAddress, TransportAddress},
    error::{Error, Result},
};

/// Peers reported by a single node; order and duplicates are irrelevant.
pub type ObservedPeerSet = BTreeSet<TransportAddress>;

/// Peers reported for every node of the network, keyed by the node HTTP address.
pub type ObservedNetwork = BTreeMap<HttpAddress, Vec<TransportAddress>>;

/// Output format requested from the peer CLI.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Csv,
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Csv => write!(f, "csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    Peers(ObservedPeerSet),
    Network(ObservedNetwork),
}

/// Trims the output and rewrites single quotes into double quotes.
///
/// The CLIs print Python style dicts (`{'a': ['b']}`), which only become
/// valid JSON after the rewrite.
pub fn normalize_output(raw: &str) -> String {
    raw.trim().replace('\'', "\"")
}

pub fn parse(raw: &str, format: Format) -> Result<ParsedValue> {
    match format {
        Format::Json => parse_json(raw),
        Format::Csv => Ok(ParsedValue::Peers(parse_csv(raw))),
    }
}

/// Parses the output of a single node peer query.
pub fn parse_peer_set(raw: &str, format: Format) -> Result<ObservedPeerSet> {
    match parse(raw, format)? {
        ParsedValue::Peers(peers) => Ok(peers),
        ParsedValue::Network(_) => Err(Error::parse(
            format,
            raw,
            "expected a list of peers, found an object",
        )),
    }
}

/// Parses the output of the network wide peer query, which is always JSON.
pub fn parse_network(raw: &str) -> Result<ObservedNetwork> {
    match parse(raw, Format::Json)? {
        ParsedValue::Network(network) => Ok(network),
        ParsedValue::Peers(_) => Err(Error::parse(
            Format::Json,
            raw,
            "expected an object of peer lists, found an array",
        )),
    }
}

fn parse_json(raw: &str) -> Result<ParsedValue> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::parse(Format::Json, raw, e.to_string()))?;
    match value {
        Value::Array(items) => {
            let peers = items
                .into_iter()
                .map(|item| transport_address(item, raw))
                .collect::<Result<_>>()?;
            Ok(ParsedValue::Peers(peers))
        }
        Value::Object(entries) => {
            let mut network = ObservedNetwork::new();
            for (http, peers) in entries {
                let Value::Array(peers) = peers else {
                    return Err(Error::parse(
                        Format::Json,
                        raw,
                        format!("peers of {http} are not a list"),
                    ));
                };
                let peers = peers
                    .into_iter()
                    .map(|item| transport_address(item, raw))
                    .collect::<Result<_>>()?;
                network.insert(HttpAddress::from(http), peers);
            }
            Ok(ParsedValue::Network(network))
        }
        other => Err(Error::parse(
            Format::Json,
            raw,
            format!("unexpected json value: {other}"),
        )),
    }
}

fn transport_address(item: Value, raw: &str) -> Result<TransportAddress> {
    match item {
        Value::String(addr) => Ok(TransportAddress::from(addr)),
        other => Err(Error::parse(
            Format::Json,
            raw,
            format!("peer address is not a string: {other}"),
        )),
    }
}

fn parse_csv(raw: &str) -> ObservedPeerSet {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(TransportAddress::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(addrs: &[&str]) -> ObservedPeerSet {
        addrs.iter().copied().map(TransportAddress::from).collect()
    }

    #[test]
    fn json_peer_list() {
        let raw = r#"["tcp://validator-0:8800","tcp://validator-2:8800","tcp://validator-3:8800"]"#;
        let peers = parse_peer_set(raw, Format::Json).unwrap();
        assert_eq!(
            peers,
            set(&[
                "tcp://validator-0:8800",
                "tcp://validator-2:8800",
                "tcp://validator-3:8800"
            ])
        );
    }

    #[test]
    fn json_duplicates_collapse() {
        let raw = r#"["tcp://validator-1:8800","tcp://validator-1:8800"]"#;
        assert_eq!(
            parse_peer_set(raw, Format::Json).unwrap(),
            set(&["tcp://validator-1:8800"])
        );
    }

    #[test]
    fn csv_peer_list() {
        let peers =
            parse_peer_set("tcp://validator-1:8800,tcp://validator-2:8800", Format::Csv).unwrap();
        assert_eq!(
            peers,
            set(&["tcp://validator-1:8800", "tcp://validator-2:8800"])
        );
    }

    #[test]
    fn csv_empty_output_has_no_peers() {
        assert!(parse_peer_set("", Format::Csv).unwrap().is_empty());
    }

    #[test]
    fn python_style_output_after_normalization() {
        let raw = "  {'http://rest-api-0:8008': ['tcp://validator-1:8800']}\n";
        let network = parse_network(&normalize_output(raw)).unwrap();
        assert_eq!(
            network.get(&HttpAddress::from("http://rest-api-0:8008")),
            Some(&vec![TransportAddress::from("tcp://validator-1:8800")])
        );
    }

    #[test]
    fn network_keeps_list_order() {
        let raw = r#"{"http://rest-api-1:8008": ["tcp://validator-3:8800", "tcp://validator-0:8800"]}"#;
        let network = parse_network(raw).unwrap();
        let peers = &network[&HttpAddress::from("http://rest-api-1:8008")];
        assert_eq!(peers[0].as_str(), "tcp://validator-3:8800");
        assert_eq!(peers[1].as_str(), "tcp://validator-0:8800");
    }

    #[test]
    fn malformed_json_names_format_and_text() {
        let err = parse("['tcp://validator-1:8800'", Format::Json).unwrap_err();
        match err {
            Error::Parse { format, text, .. } => {
                assert_eq!(format, Format::Json);
                assert_eq!(text, "['tcp://validator-1:8800'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        assert!(parse_peer_set(r#"{"a": []}"#, Format::Json).is_err());
        assert!(parse_network(r#"["tcp://validator-1:8800"]"#).is_err());
        assert!(parse_peer_set("[1, 2]", Format::Json).is_err());
        assert!(parse_network(r#"{"http://rest-api-0:8008": "tcp://validator-1:8800"}"#).is_err());
        assert!(parse("42", Format::Json).is_err());
    }
}
