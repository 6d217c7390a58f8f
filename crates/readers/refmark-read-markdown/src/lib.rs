//! Markdown reader for refmark.
//!
//! Parses normalized message text (CommonMark with GFM extensions and
//! math) into the refmark document IR. Image size annotations are lifted
//! in the same pass, while each sibling list is still in source order.

mod autolink;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use refmark_core::{ConversionResult, Document, FidelityWarning, Severity, WarningKind};
use refmark_std::{Node, NodeKind, plain_text, prop};
use refmark_transforms::normalize::unguard_markers;
use refmark_transforms::{lift_image_sizes, merge_adjacent_text};
use serde::Deserialize;

/// Grammar extensions enabled while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub math: bool,
    pub footnotes: bool,
    pub tasklists: bool,
    /// Turn bare `http(s)://` and `www.` URLs into links.
    pub autolinks: bool,
    /// Lift `{width="W" height="H"}` annotations onto the preceding image.
    pub image_sizes: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            math: true,
            footnotes: true,
            tasklists: true,
            autolinks: true,
            image_sizes: true,
        }
    }
}

impl MarkdownOptions {
    fn pulldown(&self) -> Options {
        let mut opts = Options::empty();
        opts.set(Options::ENABLE_TABLES, self.tables);
        opts.set(Options::ENABLE_STRIKETHROUGH, self.strikethrough);
        opts.set(Options::ENABLE_MATH, self.math);
        opts.set(Options::ENABLE_FOOTNOTES, self.footnotes);
        opts.set(Options::ENABLE_TASKLISTS, self.tasklists);
        opts
    }
}

/// Parse normalized message text into a refmark Document.
pub fn parse(input: &str) -> ConversionResult<Document> {
    parse_with_options(input, &MarkdownOptions::default())
}

/// Parse with custom options.
pub fn parse_with_options(input: &str, options: &MarkdownOptions) -> ConversionResult<Document> {
    let events: Vec<_> = Parser::new_ext(input, options.pulldown()).collect();

    let mut ctx = Context {
        options,
        warnings: Vec::new(),
        link_depth: 0,
    };
    let children = parse_events(&events, &mut ctx);

    let root = Node::new(NodeKind::Document).children(children);
    ConversionResult::with_warnings(Document::new().with_content(root), ctx.warnings)
}

struct Context<'a> {
    options: &'a MarkdownOptions,
    warnings: Vec<FidelityWarning>,
    /// Inside link text or image alt, where autolinking is off.
    link_depth: usize,
}

/// Parse a slice of events into nodes.
fn parse_events(events: &[Event<'_>], ctx: &mut Context<'_>) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut idx = 0;

    while idx < events.len() {
        let (node, consumed) = parse_event(&events[idx..], ctx);
        if let Some(n) = node {
            nodes.push(n);
        }
        idx += consumed.max(1);
    }

    finish_siblings(&mut nodes, ctx);
    nodes
}

/// Fixups on a complete sibling list, before any later transform runs.
fn finish_siblings(nodes: &mut Vec<Node>, ctx: &mut Context<'_>) {
    merge_adjacent_text(nodes);
    if ctx.options.image_sizes {
        lift_image_sizes(nodes);
        flag_malformed_sizes(nodes, &mut ctx.warnings);
    }
    if ctx.options.autolinks && ctx.link_depth == 0 {
        autolink::linkify(nodes);
    }
}

fn flag_malformed_sizes(nodes: &[Node], warnings: &mut Vec<FidelityWarning>) {
    for pair in nodes.windows(2) {
        if pair[0].is(NodeKind::Image)
            && !pair[0].props.contains(prop::WIDTH)
            && let Some(text) = pair[1].props.get_str(prop::CONTENT)
            && pair[1].is(NodeKind::Text)
            && text.trim_start().starts_with("{width=")
        {
            warnings.push(FidelityWarning::new(
                Severity::Minor,
                WarningKind::MalformedSize(text.to_string()),
                "Image size annotation did not match; using intrinsic size",
            ));
        }
    }
}

/// Parse a single event or matched tag pair, returning the node and events consumed.
fn parse_event(events: &[Event<'_>], ctx: &mut Context<'_>) -> (Option<Node>, usize) {
    match &events[0] {
        Event::Start(tag) => parse_tag(tag.clone(), events, ctx),
        Event::Text(text) => (
            Some(Node::new(NodeKind::Text).prop(prop::CONTENT, text.to_string())),
            1,
        ),
        Event::Code(code) => (
            Some(Node::new(NodeKind::Code).prop(prop::CONTENT, code.to_string())),
            1,
        ),
        Event::SoftBreak => (Some(Node::new(NodeKind::SoftBreak)), 1),
        Event::HardBreak => (Some(Node::new(NodeKind::LineBreak)), 1),
        Event::Rule => (Some(Node::new(NodeKind::HorizontalRule)), 1),
        Event::End(_) => (None, 1), // Handled by parent
        Event::Html(html) => {
            let node = Node::new(NodeKind::RawBlock)
                .prop(prop::CONTENT, unguard_markers(html).into_owned());
            (Some(node), 1)
        }
        Event::InlineHtml(html) => {
            let node = Node::new(NodeKind::RawInline)
                .prop(prop::CONTENT, unguard_markers(html).into_owned());
            (Some(node), 1)
        }
        Event::FootnoteReference(label) => {
            let node = Node::new(NodeKind::FootnoteRef).prop(prop::LABEL, label.to_string());
            (Some(node), 1)
        }
        Event::TaskListMarker(checked) => {
            let node = Node::new(NodeKind::TaskMarker).prop(prop::CHECKED, *checked);
            (Some(node), 1)
        }
        Event::InlineMath(math) => {
            let node = Node::new(NodeKind::MathInline)
                .prop(prop::MATH_SOURCE, unguard_markers(math).into_owned());
            (Some(node), 1)
        }
        Event::DisplayMath(math) => {
            let node = Node::new(NodeKind::MathDisplay)
                .prop(prop::MATH_SOURCE, unguard_markers(math).into_owned());
            (Some(node), 1)
        }
    }
}

/// Parse a tag and its contents.
fn parse_tag(tag: Tag<'_>, events: &[Event<'_>], ctx: &mut Context<'_>) -> (Option<Node>, usize) {
    // Find the matching end tag
    let end_idx = find_matching_end(&events[1..], &tag);
    let inner_events = &events[1..=end_idx];
    let consumed = end_idx + 2; // +1 for start, +1 for end

    let children = match tag {
        Tag::CodeBlock(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) => Vec::new(),
        Tag::Link { .. } | Tag::Image { .. } => {
            ctx.link_depth += 1;
            let children = parse_events(inner_events, ctx);
            ctx.link_depth -= 1;
            children
        }
        _ => parse_events(inner_events, ctx),
    };

    let node = match tag {
        Tag::Paragraph => Some(Node::new(NodeKind::Paragraph).children(children)),

        Tag::Heading { level, id, .. } => {
            let level_num = match level {
                HeadingLevel::H1 => 1,
                HeadingLevel::H2 => 2,
                HeadingLevel::H3 => 3,
                HeadingLevel::H4 => 4,
                HeadingLevel::H5 => 5,
                HeadingLevel::H6 => 6,
            };
            let mut h = Node::new(NodeKind::Heading)
                .prop(prop::LEVEL, level_num as i64)
                .children(children);
            if let Some(id) = id {
                h = h.prop(prop::ID, id.to_string());
            }
            Some(h)
        }

        Tag::BlockQuote(_) => Some(Node::new(NodeKind::Blockquote).children(children)),

        Tag::CodeBlock(kind) => {
            let content = verbatim_text(inner_events);
            let node = Node::new(NodeKind::CodeBlock).prop(prop::CONTENT, content);
            let node = match kind {
                CodeBlockKind::Fenced(info) if !info.trim().is_empty() => {
                    node.prop(prop::LANGUAGE, info.trim())
                }
                _ => node,
            };
            Some(node)
        }

        Tag::List(start) => {
            let ordered = start.is_some();
            let mut list = Node::new(NodeKind::List)
                .prop(prop::ORDERED, ordered)
                .children(children);
            if let Some(start_num) = start {
                list = list.prop(prop::START, start_num as i64);
            }
            Some(list)
        }

        Tag::Item => Some(Node::new(NodeKind::ListItem).children(children)),

        Tag::FootnoteDefinition(label) => Some(
            Node::new(NodeKind::FootnoteDef)
                .prop(prop::LABEL, label.to_string())
                .children(children),
        ),

        Tag::Table(alignments) => Some(table(&alignments, children)),

        Tag::TableHead => Some(Node::new(NodeKind::TableHead).children(children)),

        Tag::TableRow => Some(Node::new(NodeKind::TableRow).children(children)),

        Tag::TableCell => Some(Node::new(NodeKind::TableCell).children(children)),

        Tag::Emphasis => Some(Node::new(NodeKind::Emphasis).children(children)),

        Tag::Strong => Some(Node::new(NodeKind::Strong).children(children)),

        Tag::Strikethrough => Some(Node::new(NodeKind::Strikeout).children(children)),

        Tag::Link {
            dest_url, title, ..
        } => {
            let mut link = Node::new(NodeKind::Link)
                .prop(prop::URL, dest_url.to_string())
                .children(children);
            if !title.is_empty() {
                link = link.prop(prop::TITLE, title.to_string());
            }
            Some(link)
        }

        Tag::Image {
            dest_url, title, ..
        } => {
            // For images, children are alt text
            let alt: String = children.iter().map(plain_text).collect();
            let mut img = Node::new(NodeKind::Image)
                .prop(prop::URL, dest_url.to_string())
                .prop(prop::ALT, alt);
            if !title.is_empty() {
                img = img.prop(prop::TITLE, title.to_string());
            }
            Some(img)
        }

        Tag::HtmlBlock => {
            let content = verbatim_text(inner_events);
            Some(Node::new(NodeKind::RawBlock).prop(prop::CONTENT, unguard_markers(&content).into_owned()))
        }

        Tag::MetadataBlock(_) => {
            ctx.warnings.push(FidelityWarning::new(
                Severity::Minor,
                WarningKind::UnsupportedNode("metadata_block".to_string()),
                "Metadata blocks are not rendered",
            ));
            None
        }

        Tag::DefinitionList => Some(Node::new(NodeKind::DefinitionList).children(children)),

        Tag::DefinitionListTitle => Some(Node::new(NodeKind::DefinitionTerm).children(children)),

        Tag::DefinitionListDefinition => {
            Some(Node::new(NodeKind::DefinitionDesc).children(children))
        }
    };

    (node, consumed)
}

/// Raw text of a code or HTML block, exactly as written.
fn verbatim_text(events: &[Event<'_>]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Text(text) | Event::Html(text) => Some(&**text),
            _ => None,
        })
        .collect()
}

/// Regroup a table as head and body, with header cells and per-cell alignment.
fn table(alignments: &[Alignment], children: Vec<Node>) -> Node {
    let mut head = None;
    let mut rows = Vec::new();

    for child in children {
        match child.kind {
            NodeKind::TableHead => {
                // Header cells may or may not arrive wrapped in a row.
                let cells = child
                    .children
                    .into_iter()
                    .flat_map(|c| {
                        if c.is(NodeKind::TableRow) {
                            c.children
                        } else {
                            vec![c]
                        }
                    })
                    .enumerate()
                    .map(|(col, mut cell)| {
                        cell.kind = NodeKind::TableHeader;
                        align(cell, alignments.get(col))
                    });
                let row = Node::new(NodeKind::TableRow).children(cells);
                head = Some(Node::new(NodeKind::TableHead).child(row));
            }
            NodeKind::TableRow => {
                let cells = child
                    .children
                    .into_iter()
                    .enumerate()
                    .map(|(col, cell)| align(cell, alignments.get(col)));
                rows.push(Node::new(NodeKind::TableRow).children(cells));
            }
            _ => rows.push(child),
        }
    }

    let mut table = Node::new(NodeKind::Table).children(head);
    if !rows.is_empty() {
        table = table.child(Node::new(NodeKind::TableBody).children(rows));
    }
    table
}

fn align(cell: Node, alignment: Option<&Alignment>) -> Node {
    let value = match alignment {
        Some(Alignment::Left) => "left",
        Some(Alignment::Center) => "center",
        Some(Alignment::Right) => "right",
        Some(Alignment::None) | None => return cell,
    };
    cell.prop(prop::ALIGN, value)
}

/// Find the index of the matching end tag.
fn find_matching_end(events: &[Event<'_>], start_tag: &Tag<'_>) -> usize {
    let mut depth = 1;
    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Start(t) if tags_match(t, start_tag) => depth += 1,
            Event::End(t) if tag_end_matches(t, start_tag) => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    events.len().saturating_sub(1)
}

/// Check if two start tags are the same type.
fn tags_match(a: &Tag<'_>, b: &Tag<'_>) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Check if an end tag matches a start tag.
fn tag_end_matches(end: &TagEnd, start: &Tag<'_>) -> bool {
    matches!(
        (end, start),
        (TagEnd::Paragraph, Tag::Paragraph)
            | (TagEnd::Heading(_), Tag::Heading { .. })
            | (TagEnd::BlockQuote(_), Tag::BlockQuote(_))
            | (TagEnd::CodeBlock, Tag::CodeBlock(_))
            | (TagEnd::List(_), Tag::List(_))
            | (TagEnd::Item, Tag::Item)
            | (TagEnd::FootnoteDefinition, Tag::FootnoteDefinition(_))
            | (TagEnd::Table, Tag::Table(_))
            | (TagEnd::TableHead, Tag::TableHead)
            | (TagEnd::TableRow, Tag::TableRow)
            | (TagEnd::TableCell, Tag::TableCell)
            | (TagEnd::Emphasis, Tag::Emphasis)
            | (TagEnd::Strong, Tag::Strong)
            | (TagEnd::Strikethrough, Tag::Strikethrough)
            | (TagEnd::Link, Tag::Link { .. })
            | (TagEnd::Image, Tag::Image { .. })
            | (TagEnd::HtmlBlock, Tag::HtmlBlock)
            | (TagEnd::MetadataBlock(_), Tag::MetadataBlock(_))
            | (TagEnd::DefinitionList, Tag::DefinitionList)
            | (TagEnd::DefinitionListTitle, Tag::DefinitionListTitle)
            | (
                TagEnd::DefinitionListDefinition,
                Tag::DefinitionListDefinition
            )
    )
}
