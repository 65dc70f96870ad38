use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque key naming one live value for the duration of a debug session.
///
/// Two observations with the same identity denote the same object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
    Unknown,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
            Scope::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Static,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// Scalar rendering, already cut to the preview length.
    Literal(String),
    /// Edge to another node of the same graph.
    Reference(Identity),
}

impl AttributeValue {
    pub fn reference(&self) -> Option<&Identity> {
        match self {
            AttributeValue::Reference(id) => Some(id),
            AttributeValue::Literal(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    pub type_name: String,
    pub value: AttributeValue,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNode {
    pub identity: Identity,
    /// `name:type` pairs of every binding that led to this object, first one wins as header.
    pub labels: Vec<String>,
    pub attributes: Vec<AttributeRecord>,
}

impl ObjectNode {
    pub fn new(identity: Identity, label: String) -> Self {
        Self {
            identity,
            labels: vec![label],
            attributes: Vec::new(),
        }
    }

    pub fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or_default()
    }

    pub fn add_label(&mut self, label: String) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    pub fn references(&self) -> impl Iterator<Item = &Identity> + '_ {
        self.attributes
            .iter()
            .filter_map(|attribute| attribute.value.reference())
    }
}

/// Identity-keyed arena of expanded objects. Edges are identity lookups, so
/// cyclic heaps never produce cyclic ownership.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGraph {
    nodes: IndexMap<Identity, ObjectNode>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: IndexMap<Identity, ObjectNode>) -> Self {
        Self { nodes }
    }

    pub fn insert(&mut self, node: ObjectNode) {
        self.nodes.insert(node.identity.clone(), node);
    }

    pub fn get(&self, identity: &Identity) -> Option<&ObjectNode> {
        self.nodes.get(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.nodes.contains_key(identity)
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &ObjectNode> + '_ {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableValue {
    Literal(String),
    /// The value is an expanded object; its attributes live in the graph.
    Object(Identity),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub identity: Identity,
    pub names: Vec<String>,
    pub type_name: String,
    pub scope: Scope,
    pub value: VariableValue,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableTable {
    records: IndexMap<Identity, VariableRecord>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, or merges its names into the record already held for the same identity.
    pub fn merge(&mut self, record: VariableRecord) {
        match self.records.get_mut(&record.identity) {
            Some(existing) => {
                for name in record.names {
                    if !existing.names.contains(&name) {
                        existing.names.push(name);
                    }
                }
            }
            None => {
                self.records.insert(record.identity.clone(), record);
            }
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<&VariableRecord> {
        self.records.get(identity)
    }

    pub fn by_name(&self, name: &str) -> Option<&VariableRecord> {
        self.records
            .values()
            .find(|record| record.names.iter().any(|n| n == name))
    }

    pub fn records(&self) -> impl Iterator<Item = &VariableRecord> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreadState {
    Running,
    Suspended,
    Waiting,
    Killed,
}

impl ThreadState {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Running => "RUNNING",
            ThreadState::Suspended => "SUSPENDED",
            ThreadState::Waiting => "WAITING",
            ThreadState::Killed => "KILLED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub name: String,
    pub state: ThreadState,
}

impl ThreadInfo {
    pub fn is_suspended(&self) -> bool {
        self.state == ThreadState::Suspended
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: String,
    pub name: String,
    pub thread: String,
}

/// A named value as reported by the runtime: a frame binding or the result of an evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteValue {
    pub name: String,
    pub type_name: String,
    pub value: String,
}

impl RemoteValue {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    /// Python renders predicate results as `True`/`False`.
    pub fn is_true(&self) -> bool {
        self.value.trim() == "True"
    }
}

/// Result of one collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub variables: VariableTable,
    pub graph: ObjectGraph,
    /// Set when at least one frame did not finish before the barrier deadline.
    pub partial: bool,
}
