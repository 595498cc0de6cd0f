//! Graph mutation events and their wire operation codes.
//!
//! An event is turned into its mapping form `{"<op>": {"<id>": <value>}}`
//! before hooks run and before it is encoded as an envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StreamError};
use crate::types::{Attributes, ElementId};

/// Identifier used by the `clean` operation to address every node.
pub const DELETE_ALL_KEY: &str = "filter";
/// Value paired with [`DELETE_ALL_KEY`].
pub const DELETE_ALL_VALUE: &str = "ALL";

// ── Operation codes ───────────────────────────────────────────────

/// Two-letter operation code heading every envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OpCode {
    #[serde(rename = "an")]
    AddNode,
    #[serde(rename = "cn")]
    ChangeNode,
    #[serde(rename = "dn")]
    DeleteNode,
    #[serde(rename = "ae")]
    AddEdge,
    #[serde(rename = "de")]
    DeleteEdge,
}

impl OpCode {
    pub const ALL: [OpCode; 5] = [
        Self::AddNode,
        Self::ChangeNode,
        Self::DeleteNode,
        Self::AddEdge,
        Self::DeleteEdge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddNode => "an",
            Self::ChangeNode => "cn",
            Self::DeleteNode => "dn",
            Self::AddEdge => "ae",
            Self::DeleteEdge => "de",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpCode {
    type Err = StreamError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| StreamError::MalformedEnvelope(format!("unknown operation code {s:?}")))
    }
}

// ── Events ────────────────────────────────────────────────────────

/// A single graph mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AddNode {
        id: ElementId,
        attributes: Attributes,
    },
    ChangeNode {
        id: ElementId,
        attributes: Attributes,
    },
    DeleteNode {
        id: ElementId,
    },
    AddEdge {
        id: ElementId,
        source: ElementId,
        target: ElementId,
        directed: bool,
        attributes: Attributes,
    },
    DeleteEdge {
        id: ElementId,
    },
    /// Server convention for "delete every node" (and their incident edges).
    DeleteAllNodes,
}

impl Event {
    pub fn add_node(id: impl Into<ElementId>) -> Self {
        Self::AddNode {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn change_node(id: impl Into<ElementId>) -> Self {
        Self::ChangeNode {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn delete_node(id: impl Into<ElementId>) -> Self {
        Self::DeleteNode { id: id.into() }
    }

    /// A directed edge from `source` to `target`.
    pub fn add_edge(
        id: impl Into<ElementId>,
        source: impl Into<ElementId>,
        target: impl Into<ElementId>,
    ) -> Self {
        Self::AddEdge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            directed: true,
            attributes: Attributes::new(),
        }
    }

    pub fn delete_edge(id: impl Into<ElementId>) -> Self {
        Self::DeleteEdge { id: id.into() }
    }

    pub fn delete_all_nodes() -> Self {
        Self::DeleteAllNodes
    }

    /// Replace the attributes of an add/change event. Ignored for deletions.
    pub fn with_attributes(mut self, attrs: Attributes) -> Self {
        match &mut self {
            Self::AddNode { attributes, .. }
            | Self::ChangeNode { attributes, .. }
            | Self::AddEdge { attributes, .. } => *attributes = attrs,
            _ => {}
        }
        self
    }

    /// Set edge direction. Ignored for anything but `AddEdge`.
    pub fn directed(mut self, value: bool) -> Self {
        if let Self::AddEdge { directed, .. } = &mut self {
            *directed = value;
        }
        self
    }

    pub fn op(&self) -> OpCode {
        match self {
            Self::AddNode { .. } => OpCode::AddNode,
            Self::ChangeNode { .. } => OpCode::ChangeNode,
            Self::DeleteNode { .. } | Self::DeleteAllNodes => OpCode::DeleteNode,
            Self::AddEdge { .. } => OpCode::AddEdge,
            Self::DeleteEdge { .. } => OpCode::DeleteEdge,
        }
    }

    /// Deletions bypass the client buffer and are sent on their own.
    pub fn is_direct_send(&self) -> bool {
        matches!(
            self,
            Self::DeleteNode { .. } | Self::DeleteEdge { .. } | Self::DeleteAllNodes
        )
    }

    /// The key under the operation code: the element id, or `"filter"`.
    pub fn key(&self) -> String {
        match self {
            Self::AddNode { id, .. }
            | Self::ChangeNode { id, .. }
            | Self::DeleteNode { id }
            | Self::AddEdge { id, .. }
            | Self::DeleteEdge { id } => id.to_key(),
            Self::DeleteAllNodes => DELETE_ALL_KEY.to_string(),
        }
    }

    /// The caller attributes of an add/change event.
    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Self::AddNode { attributes, .. }
            | Self::ChangeNode { attributes, .. }
            | Self::AddEdge { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Build the mapping form `{"<op>": {"<id>": <value>}}`.
    ///
    /// For edges, `source`, `target` and `directed` overwrite any caller
    /// attributes with the same names. Fails if an attribute holds a
    /// value JSON cannot represent.
    pub fn to_mapping(&self) -> Result<Map<String, Value>> {
        let value = match self {
            Self::AddNode { attributes, .. } | Self::ChangeNode { attributes, .. } => {
                attributes.check()?;
                Value::Object(attributes.as_map().clone())
            }
            Self::AddEdge {
                source,
                target,
                directed,
                attributes,
                ..
            } => {
                let mut attrs = attributes.clone();
                attrs.insert("source", source.clone());
                attrs.insert("target", target.clone());
                attrs.insert("directed", *directed);
                Value::Object(attrs.try_into_map()?)
            }
            Self::DeleteNode { .. } | Self::DeleteEdge { .. } => Value::Object(Map::new()),
            Self::DeleteAllNodes => Value::String(DELETE_ALL_VALUE.to_string()),
        };

        let mut inner = Map::new();
        inner.insert(self.key(), value);

        let mut mapping = Map::new();
        mapping.insert(self.op().as_str().to_string(), Value::Object(inner));
        Ok(mapping)
    }
}
