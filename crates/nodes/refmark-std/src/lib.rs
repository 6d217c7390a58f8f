//! Standard property keys and node helpers for refmark.
//!
//! This crate provides the vocabulary every stage agrees on.
//! It re-exports `refmark-core` so users only need one import.

pub use refmark_core::*;

/// Standard property key constants.
pub mod prop {
    /// Heading level (1-6).
    pub const LEVEL: &str = "level";
    /// Whether a list is ordered.
    pub const ORDERED: &str = "ordered";
    /// Start number for ordered lists.
    pub const START: &str = "start";
    /// Language hint for code blocks.
    pub const LANGUAGE: &str = "language";
    /// URL for links and images.
    pub const URL: &str = "url";
    /// Title attribute for links and images.
    pub const TITLE: &str = "title";
    /// Alt text for images.
    pub const ALT: &str = "alt";
    /// Text content for text, code and raw nodes.
    pub const CONTENT: &str = "content";
    /// Identifier/anchor name.
    pub const ID: &str = "id";
    /// Footnote label.
    pub const LABEL: &str = "label";
    /// Column alignment (left, center, right).
    pub const ALIGN: &str = "align";
    /// Image width as written in the size annotation.
    pub const WIDTH: &str = "width";
    /// Image height as written in the size annotation.
    pub const HEIGHT: &str = "height";
    /// Task-list checkbox state.
    pub const CHECKED: &str = "checked";
    /// Source text of a math node.
    pub const MATH_SOURCE: &str = "math:source";
}

/// Helper functions for creating common nodes.
pub mod helpers {
    use crate::{Node, NodeKind, prop};

    /// Create a text node with the given content.
    pub fn text(content: impl Into<String>) -> Node {
        Node::new(NodeKind::Text).prop(prop::CONTENT, content.into())
    }

    /// Create a paragraph with children.
    pub fn paragraph(children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Paragraph).children(children)
    }

    /// Create a heading with the given level and children.
    pub fn heading(level: i64, children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Heading)
            .prop(prop::LEVEL, level)
            .children(children)
    }

    /// Create a code block with optional language.
    pub fn code_block(code: impl Into<String>, language: Option<&str>) -> Node {
        let mut node = Node::new(NodeKind::CodeBlock).prop(prop::CONTENT, code.into());
        if let Some(lang) = language {
            node = node.prop(prop::LANGUAGE, lang);
        }
        node
    }

    /// Create a link with URL and children.
    pub fn link(url: impl Into<String>, children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Link)
            .prop(prop::URL, url.into())
            .children(children)
    }

    /// Create an image with URL and alt text.
    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Node {
        Node::new(NodeKind::Image)
            .prop(prop::URL, url.into())
            .prop(prop::ALT, alt.into())
    }

    /// Create an unordered list.
    pub fn bullet_list(items: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::List)
            .prop(prop::ORDERED, false)
            .children(items)
    }

    /// Create a list item.
    pub fn list_item(children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::ListItem).children(children)
    }

    /// Create emphasis (italic).
    pub fn emphasis(children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Emphasis).children(children)
    }

    /// Create strong (bold).
    pub fn strong(children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Strong).children(children)
    }

    /// Create inline code.
    pub fn code(content: impl Into<String>) -> Node {
        Node::new(NodeKind::Code).prop(prop::CONTENT, content.into())
    }

    /// Create inline raw HTML.
    pub fn raw_inline(html: impl Into<String>) -> Node {
        Node::new(NodeKind::RawInline).prop(prop::CONTENT, html.into())
    }

    /// Wrap a text run so citation markers inside it are resolved.
    pub fn annotated(text_node: Node) -> Node {
        Node::new(NodeKind::Annotated).child(text_node)
    }

    /// Create a soft line break.
    pub fn soft_break() -> Node {
        Node::new(NodeKind::SoftBreak)
    }

    /// Create a document root with children.
    pub fn document(children: impl IntoIterator<Item = Node>) -> Node {
        Node::new(NodeKind::Document).children(children)
    }
}

/// Concatenated text of a subtree: text, code and math content, in order.
pub fn plain_text(node: &Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Node, out: &mut String) {
    match node.kind {
        NodeKind::Text | NodeKind::Code | NodeKind::CodeBlock => {
            if let Some(content) = node.props.get_str(prop::CONTENT) {
                out.push_str(content);
            }
        }
        NodeKind::MathInline | NodeKind::MathDisplay => {
            if let Some(source) = node.props.get_str(prop::MATH_SOURCE) {
                out.push_str(source);
            }
        }
        NodeKind::SoftBreak | NodeKind::LineBreak => out.push('\n'),
        _ => {}
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_text_node() {
        let node = helpers::text("Hello, world!");
        assert_eq!(node.kind, NodeKind::Text);
        assert_eq!(node.props.get_str(prop::CONTENT), Some("Hello, world!"));
    }

    #[test]
    fn test_create_heading() {
        let h1 = helpers::heading(1, [helpers::text("Title")]);
        assert_eq!(h1.kind, NodeKind::Heading);
        assert_eq!(h1.props.get_int(prop::LEVEL), Some(1));
        assert_eq!(h1.children.len(), 1);
    }

    #[test]
    fn test_annotated_wraps_single_text() {
        let wrapped = helpers::annotated(helpers::text("see ~~0=="));
        assert_eq!(wrapped.kind, NodeKind::Annotated);
        assert_eq!(wrapped.children.len(), 1);
        assert_eq!(plain_text(&wrapped), "see ~~0==");
    }

    #[test]
    fn test_plain_text_walks_in_order() {
        let doc = helpers::document([
            helpers::paragraph([
                helpers::text("a "),
                helpers::strong([helpers::text("b")]),
                helpers::soft_break(),
                helpers::code("c"),
            ]),
            helpers::code_block("d", Some("rust")),
        ]);
        assert_eq!(plain_text(&doc), "a b\ncd");
    }
}
