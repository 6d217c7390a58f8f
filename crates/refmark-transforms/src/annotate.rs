//! Tag text runs as annotatable spans.
//!
//! Every text node outside code is wrapped in an `Annotated` node, which
//! is where the writer resolves citation markers.

use refmark_core::{Document, Transformer};
use refmark_std::{Node, NodeKind, helpers};

/// Whether a text node under `ancestors` (root first) should be wrapped.
///
/// Only the nearest ancestor matters: text directly inside code or an
/// existing annotated span is left as is.
pub fn should_wrap(ancestors: &[NodeKind]) -> bool {
    match ancestors.last() {
        Some(kind) => !kind.is_verbatim() && *kind != NodeKind::Annotated,
        None => true,
    }
}

/// Wrap every eligible text node in an `Annotated` node.
pub struct TagReferenceSpans;

impl TagReferenceSpans {
    fn tag(node: &mut Node, ancestors: &mut Vec<NodeKind>) {
        ancestors.push(node.kind);
        let wrap = should_wrap(ancestors);
        for child in &mut node.children {
            if child.is(NodeKind::Text) {
                if wrap {
                    let text = std::mem::replace(child, Node::new(NodeKind::Annotated));
                    *child = helpers::annotated(text);
                }
            } else {
                Self::tag(child, ancestors);
            }
        }
        ancestors.pop();
    }
}

impl Transformer for TagReferenceSpans {
    fn name(&self) -> &str {
        "tag_reference_spans"
    }

    fn transform(&self, mut doc: Document) -> Document {
        let mut ancestors = Vec::new();
        Self::tag(&mut doc.content, &mut ancestors);
        doc
    }
}
