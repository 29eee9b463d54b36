//! Read-only node catalog and personal answers
//!
//! Built once at startup from the nodes file and shared by the engine.

use crate::config::{CatalogFile, ContentKind, NodeRecord};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building the catalog
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// Two records share the same name
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),
}

/// What a node delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Literal text reply
    Text(String),
    /// Photo stored under an object key
    Photo {
        /// Object key in the content bucket
        key: String,
    },
    /// Voice message stored under an object key
    Voice {
        /// Object key in the content bucket
        key: String,
    },
}

impl NodeContent {
    fn from_record(kind: ContentKind, content: String) -> Self {
        match kind {
            ContentKind::Text => Self::Text(content),
            ContentKind::Photo => Self::Photo { key: content },
            ContentKind::Voice => Self::Voice { key: content },
        }
    }
}

/// A named menu entry with content and an optional code gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    /// Unique display name
    pub name: String,
    /// Secret code; `None` means the node is open
    pub secret_code: Option<String>,
    /// Payload
    pub content: NodeContent,
    /// Prompt shown while waiting for the code
    pub prompt_message: String,
}

impl NodeDefinition {
    /// Whether a code must be entered before the content is delivered
    #[must_use]
    pub const fn is_gated(&self) -> bool {
        self.secret_code.is_some()
    }

    /// Whether `text` redeems this node's code
    #[must_use]
    pub fn accepts_code(&self, text: &str) -> bool {
        self.secret_code.as_deref() == Some(text)
    }
}

impl From<NodeRecord> for NodeDefinition {
    fn from(record: NodeRecord) -> Self {
        Self {
            name: record.name,
            secret_code: record.code,
            content: NodeContent::from_record(record.kind, record.content),
            prompt_message: record.message,
        }
    }
}

/// Ordered, immutable collection of nodes
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    nodes: Vec<Arc<NodeDefinition>>,
    by_name: HashMap<String, usize>,
}

impl NodeCatalog {
    /// Build a catalog from records, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateNode` if two records share a name.
    pub fn from_records(records: Vec<NodeRecord>) -> Result<Self, CatalogError> {
        let mut nodes = Vec::with_capacity(records.len());
        let mut by_name = HashMap::with_capacity(records.len());
        for record in records {
            if by_name.contains_key(&record.name) {
                return Err(CatalogError::DuplicateNode(record.name));
            }
            by_name.insert(record.name.clone(), nodes.len());
            nodes.push(Arc::new(NodeDefinition::from(record)));
        }
        Ok(Self { nodes, by_name })
    }

    /// Look up a node by its display name
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Arc<NodeDefinition>> {
        self.by_name.get(name).and_then(|&idx| self.nodes.get(idx))
    }

    /// All nodes in configuration order
    #[must_use]
    pub fn all(&self) -> &[Arc<NodeDefinition>] {
        &self.nodes
    }

    /// Node names in configuration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.name.as_str())
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the catalog has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Question to answer mapping for the personal mode
#[derive(Debug, Clone, Default)]
pub struct PersonalQa {
    answers: HashMap<String, String>,
}

impl PersonalQa {
    /// Wrap a question to answer map
    #[must_use]
    pub const fn new(answers: HashMap<String, String>) -> Self {
        Self { answers }
    }

    /// Answer for an exact question
    #[must_use]
    pub fn answer(&self, question: &str) -> Option<&str> {
        self.answers.get(question).map(String::as_str)
    }

    /// Number of known questions
    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Whether there are no questions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Build both lookups from a parsed nodes file.
///
/// # Errors
///
/// Returns a `CatalogError` if the node records violate catalog invariants.
pub fn from_file(file: CatalogFile) -> Result<(NodeCatalog, PersonalQa), CatalogError> {
    let catalog = NodeCatalog::from_records(file.node_codes)?;
    Ok((catalog, PersonalQa::new(file.personal)))
}
