use serde::{Deserialize, Serialize};

/// Identifier of a node in the decision tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single point in the branching narrative: either a narrator message or
/// one of the continuations proposed after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionNode {
    pub id: NodeId,
    /// Narrator prose, or the option's description.
    pub content: String,
    /// `None` only for the root narrator message.
    pub parent_id: Option<NodeId>,
    /// Child ids in insertion order.
    pub children: Vec<NodeId>,
    pub is_option: bool,
    /// True when the node lies on the path the user actually took.
    /// Narrator nodes are always selected.
    pub is_selected: bool,
    /// Milliseconds since the epoch, strictly increasing within a tree.
    pub timestamp: i64,
}

impl DecisionNode {
    pub fn narrator(content: impl Into<String>, parent_id: Option<NodeId>, timestamp: i64) -> Self {
        Self {
            id: NodeId::new(),
            content: content.into(),
            parent_id,
            children: Vec::new(),
            is_option: false,
            is_selected: true,
            timestamp,
        }
    }

    pub fn option(
        content: impl Into<String>,
        parent_id: NodeId,
        is_selected: bool,
        timestamp: i64,
    ) -> Self {
        Self {
            id: NodeId::new(),
            content: content.into(),
            parent_id: Some(parent_id),
            children: Vec::new(),
            is_option: true,
            is_selected,
            timestamp,
        }
    }

    pub fn is_narrator(&self) -> bool {
        !self.is_option
    }
}
