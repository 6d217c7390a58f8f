//! Node types for the document tree.

use crate::Properties;

/// A content node in the document tree.
///
/// Each node owns its children; there are no parent links. Context that
/// depends on ancestors is carried explicitly by the walk that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node type.
    pub kind: NodeKind,
    /// Attributes for this node (content, url, width, ...).
    pub props: Properties,
    /// Child nodes.
    pub children: Vec<Node>,
}

/// The closed set of node kinds the pipeline produces and renders.
///
/// Writers match on this exhaustively, so adding a kind forces every
/// renderer to decide what to do with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Block-level nodes
    /// Root document container.
    Document,
    /// A paragraph of text.
    Paragraph,
    /// A heading (use `level` property for h1-h6).
    Heading,
    /// A fenced or indented code block.
    CodeBlock,
    /// A block quotation.
    Blockquote,
    /// A list (use `ordered` property to distinguish).
    List,
    /// An item in a list.
    ListItem,
    /// A table.
    Table,
    /// Table head section.
    TableHead,
    /// Table body section.
    TableBody,
    /// A row in a table.
    TableRow,
    /// A cell in a table row.
    TableCell,
    /// A header cell in a table.
    TableHeader,
    /// A thematic break.
    HorizontalRule,
    /// Raw HTML block content.
    RawBlock,
    /// A definition list.
    DefinitionList,
    /// A term in a definition list.
    DefinitionTerm,
    /// A description in a definition list.
    DefinitionDesc,
    /// A footnote definition.
    FootnoteDef,
    /// Display math (`$$ ... $$`).
    MathDisplay,

    // Inline-level nodes
    /// Plain text content (use `content` property).
    Text,
    /// Emphasized text.
    Emphasis,
    /// Strong text.
    Strong,
    /// Strikethrough text.
    Strikeout,
    /// Inline code.
    Code,
    /// A hyperlink.
    Link,
    /// An image (`url`, `alt`, optional `title`, `width`, `height`).
    Image,
    /// A hard line break.
    LineBreak,
    /// A soft line break.
    SoftBreak,
    /// Raw inline HTML.
    RawInline,
    /// A footnote reference.
    FootnoteRef,
    /// Inline math (`$ ... $`).
    MathInline,
    /// A task-list checkbox (use `checked` property).
    TaskMarker,
    /// A text run wrapped so citation markers inside it can be resolved.
    Annotated,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            props: Properties::new(),
            children: Vec::new(),
        }
    }

    /// Add a property.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(key, value);
        self
    }

    /// Add a child node.
    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Add multiple child nodes.
    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Whether this node is of the given kind.
    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }
}

impl NodeKind {
    /// Stable snake_case name, used in debug output and CSS hooks.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading => "heading",
            NodeKind::CodeBlock => "code_block",
            NodeKind::Blockquote => "blockquote",
            NodeKind::List => "list",
            NodeKind::ListItem => "list_item",
            NodeKind::Table => "table",
            NodeKind::TableHead => "table_head",
            NodeKind::TableBody => "table_body",
            NodeKind::TableRow => "table_row",
            NodeKind::TableCell => "table_cell",
            NodeKind::TableHeader => "table_header",
            NodeKind::HorizontalRule => "horizontal_rule",
            NodeKind::RawBlock => "raw_block",
            NodeKind::DefinitionList => "definition_list",
            NodeKind::DefinitionTerm => "definition_term",
            NodeKind::DefinitionDesc => "definition_desc",
            NodeKind::FootnoteDef => "footnote_def",
            NodeKind::MathDisplay => "math_display",
            NodeKind::Text => "text",
            NodeKind::Emphasis => "emphasis",
            NodeKind::Strong => "strong",
            NodeKind::Strikeout => "strikeout",
            NodeKind::Code => "code",
            NodeKind::Link => "link",
            NodeKind::Image => "image",
            NodeKind::LineBreak => "line_break",
            NodeKind::SoftBreak => "soft_break",
            NodeKind::RawInline => "raw_inline",
            NodeKind::FootnoteRef => "footnote_ref",
            NodeKind::MathInline => "math_inline",
            NodeKind::TaskMarker => "task_marker",
            NodeKind::Annotated => "annotated",
        }
    }

    /// Verbatim regions: text beneath them is never re-tagged.
    pub fn is_verbatim(&self) -> bool {
        matches!(self, NodeKind::Code | NodeKind::CodeBlock)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Re-export PropValue for the prop() method
pub use crate::properties::PropValue;
