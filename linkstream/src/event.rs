use std::collections::BTreeMap;

use serde::Serialize;

use crate::canon::Identifier;

/// One page capture and the outlinks observed on it. Produced by a parser,
/// consumed by the batch builder within the same iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub source: Identifier,
    pub timestamp: String,
    pub outlinks: Vec<Identifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeType {
    VersionNode,
    Node,
}

#[derive(Serialize)]
struct NodeAttrs<'a> {
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
    #[serde(rename = "TYPE")]
    node_type: NodeType,
}

#[derive(Serialize)]
struct AddNode<'a> {
    an: BTreeMap<String, NodeAttrs<'a>>,
}

#[derive(Serialize)]
struct EdgeAttrs {
    directed: &'static str,
    source: String,
    target: String,
}

#[derive(Serialize)]
struct AddEdge {
    ae: BTreeMap<String, EdgeAttrs>,
}

// The graph streaming protocol wants CRLF after every event, a plain
// newline is not accepted by the Gephi master endpoint.
const LINE_END: &str = "\r\n";

fn to_line<T: Serialize>(event: &T) -> String {
    let mut line =
        serde_json::to_string(event).expect("wire events contain only strings and cannot fail");
    line.push_str(LINE_END);
    line
}

pub fn version_node_line(id: u64, identifier: &Identifier, timestamp: &str) -> String {
    let mut an = BTreeMap::new();
    an.insert(
        id.to_string(),
        NodeAttrs {
            identifier: identifier.as_str(),
            timestamp: Some(timestamp),
            node_type: NodeType::VersionNode,
        },
    );
    to_line(&AddNode { an })
}

pub fn node_line(id: u64, identifier: &Identifier) -> String {
    let mut an = BTreeMap::new();
    an.insert(
        id.to_string(),
        NodeAttrs {
            identifier: identifier.as_str(),
            timestamp: None,
            node_type: NodeType::Node,
        },
    );
    to_line(&AddNode { an })
}

pub fn edge_line(id: u64, source: u64, target: u64) -> String {
    let mut ae = BTreeMap::new();
    ae.insert(
        id.to_string(),
        EdgeAttrs {
            directed: "true",
            source: source.to_string(),
            target: target.to_string(),
        },
    );
    to_line(&AddEdge { ae })
}
