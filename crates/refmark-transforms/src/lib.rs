//! Standard transforms for refmark.
//!
//! This crate provides the pipeline stages that run around the parser:
//! - Marker normalization on raw text (before parsing)
//! - Image size lifting (registered into the parse pass)
//! - Reference span tagging (after parsing)
//! - Visitor utilities for custom transforms

mod annotate;
mod image_size;
pub mod normalize;
pub mod patterns;

pub use annotate::{TagReferenceSpans, should_wrap};
pub use image_size::{ImageSizes, lift_image_sizes, size_annotation};
pub use normalize::normalize;

use refmark_core::{Document, Transformer};
use refmark_std::{Node, NodeKind, prop};

/// Merge adjacent text nodes.
pub struct MergeText;

impl MergeText {
    fn transform_node(mut node: Node) -> Node {
        node.children = node
            .children
            .into_iter()
            .map(Self::transform_node)
            .collect();
        merge_adjacent_text(&mut node.children);
        node
    }
}

impl Transformer for MergeText {
    fn name(&self) -> &str {
        "merge_text"
    }

    fn transform(&self, doc: Document) -> Document {
        Document {
            content: Self::transform_node(doc.content),
        }
    }
}

/// Merge runs of adjacent text nodes in one sibling list.
pub fn merge_adjacent_text(children: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        if child.is(NodeKind::Text)
            && let Some(last) = merged.last_mut()
            && last.is(NodeKind::Text)
        {
            let mut content = last.props.get_str(prop::CONTENT).unwrap_or("").to_string();
            content.push_str(child.props.get_str(prop::CONTENT).unwrap_or(""));
            last.props.set(prop::CONTENT, content);
            continue;
        }
        merged.push(child);
    }
    *children = merged;
}

/// A transform pipeline that applies multiple transforms in sequence.
pub struct Pipeline {
    transforms: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Add a transform to the pipeline.
    pub fn then<T: Transformer + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Names of the stages, in order.
    pub fn stages(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn transform(&self, mut doc: Document) -> Document {
        for transform in &self.transforms {
            doc = transform.transform(doc);
        }
        doc
    }
}

/// Walk a document tree, calling a function on each node.
pub fn walk<F>(node: &Node, f: &mut F)
where
    F: FnMut(&Node),
{
    f(node);
    for child in &node.children {
        walk(child, f);
    }
}

/// Walk a document tree mutably, calling a function on each node.
pub fn walk_mut<F>(node: &mut Node, f: &mut F)
where
    F: FnMut(&mut Node),
{
    f(node);
    for child in &mut node.children {
        walk_mut(child, f);
    }
}
