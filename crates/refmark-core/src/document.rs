//! Document type - the root container for message content.

use crate::{Node, NodeKind};

/// A parsed message: one tree rooted at a `Document` node.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root content node.
    pub content: Node,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            content: Node::new(NodeKind::Document),
        }
    }

    /// Set the root content node.
    pub fn with_content(mut self, content: Node) -> Self {
        self.content = content;
        self
    }

    /// Whether the document has no content at all.
    pub fn is_empty(&self) -> bool {
        self.content.children.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
