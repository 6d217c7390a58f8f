//! HTML writer for refmark.
//!
//! Emits a parsed message as an HTML5 fragment. Citation markers inside
//! annotated text become popover buttons, fenced code with a language is
//! highlighted, and the finished fragment goes through the sanitizer so
//! raw HTML from the message can never carry script into the output.

pub mod citation;
pub mod code;
pub mod sanitize;

pub use citation::{
    AnnotationMatch, ClickAction, DocumentSource, PopoverCache, PopoverContent, Segment,
    SourceIcon, click_action, find_markers, split_markers,
};
pub use sanitize::{Sanitized, sanitize};

use refmark_core::{
    ConversionResult, Document, FidelityWarning, NoThumbnails, ReferenceIndex, Severity,
    ThumbnailLookup, WarningKind,
};
use refmark_std::{Node, NodeKind, prop};
use serde::Deserialize;

/// Writer settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// syntect theme for highlighted code blocks.
    pub highlight_theme: String,
    /// Prefix joined with a chunk's `image_id` to form its image URL.
    pub image_url_prefix: String,
    /// Prefix for generic file-type icons (`{prefix}{ext}.svg`).
    pub file_icon_prefix: String,
    /// Conversion factor for `in` image sizes.
    pub pixels_per_inch: f64,
    /// Prepended to popover ids, so several messages can share a page.
    pub popover_id_prefix: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            highlight_theme: "InspiredGitHub".to_string(),
            image_url_prefix: "/v1/document/image/".to_string(),
            file_icon_prefix: "/file-icon/".to_string(),
            pixels_per_inch: 96.0,
            popover_id_prefix: String::new(),
        }
    }
}

/// What citation markers are resolved against during one render.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub reference: &'a ReferenceIndex,
    pub thumbnails: &'a dyn ThumbnailLookup,
    pub options: &'a HtmlOptions,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        reference: &'a ReferenceIndex,
        thumbnails: &'a dyn ThumbnailLookup,
        options: &'a HtmlOptions,
    ) -> Self {
        Self {
            reference,
            thumbnails,
            options,
        }
    }
}

/// Emit a document as HTML with no references and default options.
pub fn emit(doc: &Document) -> ConversionResult<String> {
    let reference = ReferenceIndex::empty();
    let options = HtmlOptions::default();
    let ctx = RenderContext::new(&reference, &NoThumbnails, &options);
    emit_with_context(doc, &ctx, &mut PopoverCache::new())
}

/// Emit a document as an HTML fragment, resolving citations through `ctx`.
///
/// `cache` must belong to the same reference snapshot, thumbnails and options.
pub fn emit_with_context(
    doc: &Document,
    ctx: &RenderContext<'_>,
    cache: &mut PopoverCache,
) -> ConversionResult<String> {
    let mut ectx = EmitContext::new(ctx);

    // Emit children of the root document node
    emit_nodes(&doc.content.children, &mut ectx);

    let clean = sanitize(&ectx.output);
    for element in clean.removed {
        ectx.warnings.push(FidelityWarning::new(
            Severity::Minor,
            WarningKind::Sanitized(element.clone()),
            format!("Removed unsafe or unsupported markup: <{element}>"),
        ));
    }

    // Popovers carry already-sanitized chunk content and go after the body,
    // so nothing left open in the body can swallow them.
    let mut html = clean.html;
    if !ectx.popovers.is_empty() {
        html.push_str("<div class=\"reference-popovers\">");
        for index in &ectx.popovers {
            html.push_str(cache.get_or_build(*index, ctx.reference, ctx.thumbnails, ctx.options));
        }
        html.push_str("</div>");
    }

    ConversionResult::with_warnings(html, ectx.warnings)
}

/// Emit a document as a complete HTML document with doctype.
pub fn emit_full_document(
    doc: &Document,
    ctx: &RenderContext<'_>,
    cache: &mut PopoverCache,
) -> ConversionResult<String> {
    emit_with_context(doc, ctx, cache).map(|body| standalone(&body))
}

/// Wrap an emitted fragment in a minimal HTML5 document.
pub fn standalone(body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 96);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n<body>\n");
    html.push_str(body);
    html.push_str("\n</body>\n</html>\n");
    html
}

/// Emit context for tracking state during emission.
struct EmitContext<'a> {
    ctx: &'a RenderContext<'a>,
    output: String,
    warnings: Vec<FidelityWarning>,
    /// Popovers referenced so far, in first-use order.
    popovers: Vec<Option<usize>>,
}

impl<'a> EmitContext<'a> {
    fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self {
            ctx,
            output: String::new(),
            warnings: Vec::new(),
            popovers: Vec::new(),
        }
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn warn(&mut self, severity: Severity, kind: WarningKind, message: impl Into<String>) {
        self.warnings
            .push(FidelityWarning::new(severity, kind, message));
    }
}

/// Emit a sequence of nodes.
fn emit_nodes(nodes: &[Node], ctx: &mut EmitContext<'_>) {
    for (i, node) in nodes.iter().enumerate() {
        if node.is(NodeKind::RawInline) {
            // Inline tags arrive one per node; a closer may be a later sibling.
            emit_raw(node, &nodes[i + 1..], ctx);
        } else {
            emit_node(node, ctx);
        }
    }
}

/// Emit a single node.
fn emit_node(node: &Node, ctx: &mut EmitContext<'_>) {
    match node.kind {
        NodeKind::Document => emit_nodes(&node.children, ctx),
        NodeKind::Paragraph => emit_tag("p", node, ctx),
        NodeKind::Heading => emit_heading(node, ctx),
        NodeKind::CodeBlock => emit_code_block(node, ctx),
        NodeKind::Blockquote => emit_tag("blockquote", node, ctx),
        NodeKind::List => emit_list(node, ctx),
        NodeKind::ListItem => emit_tag("li", node, ctx),
        NodeKind::Table => emit_tag("table", node, ctx),
        NodeKind::TableHead => emit_tag("thead", node, ctx),
        NodeKind::TableBody => emit_tag("tbody", node, ctx),
        NodeKind::TableRow => emit_tag("tr", node, ctx),
        NodeKind::TableCell => emit_table_cell(node, "td", ctx),
        NodeKind::TableHeader => emit_table_cell(node, "th", ctx),
        NodeKind::HorizontalRule => ctx.write("<hr>"),
        NodeKind::RawBlock | NodeKind::RawInline => emit_raw(node, &[], ctx),
        NodeKind::DefinitionList => emit_tag("dl", node, ctx),
        NodeKind::DefinitionTerm => emit_tag("dt", node, ctx),
        NodeKind::DefinitionDesc => emit_tag("dd", node, ctx),
        NodeKind::FootnoteDef => emit_footnote_def(node, ctx),
        NodeKind::MathDisplay => emit_math(node, "math math-display", "\\[", "\\]", ctx),
        NodeKind::Text => emit_text(node, ctx),
        NodeKind::Emphasis => emit_tag("em", node, ctx),
        NodeKind::Strong => emit_tag("strong", node, ctx),
        NodeKind::Strikeout => emit_tag("del", node, ctx),
        NodeKind::Code => emit_inline_code(node, ctx),
        NodeKind::Link => emit_link(node, ctx),
        NodeKind::Image => emit_image(node, ctx),
        NodeKind::LineBreak => ctx.write("<br>"),
        NodeKind::SoftBreak => ctx.write("\n"),
        NodeKind::FootnoteRef => emit_footnote_ref(node, ctx),
        NodeKind::MathInline => emit_math(node, "math math-inline", "\\(", "\\)", ctx),
        NodeKind::TaskMarker => emit_task_marker(node, ctx),
        NodeKind::Annotated => emit_annotated(node, ctx),
    }
}

/// Emit a simple tag with children.
fn emit_tag(tag: &str, node: &Node, ctx: &mut EmitContext<'_>) {
    ctx.write("<");
    ctx.write(tag);
    emit_id(node, ctx);
    ctx.write(">");
    emit_nodes(&node.children, ctx);
    ctx.write("</");
    ctx.write(tag);
    ctx.write(">");
}

fn emit_id(node: &Node, ctx: &mut EmitContext<'_>) {
    if let Some(id) = node.props.get_str(prop::ID) {
        ctx.write(" id=\"");
        ctx.write(&escape_attr(id));
        ctx.write("\"");
    }
}

/// Emit a heading element.
fn emit_heading(node: &Node, ctx: &mut EmitContext<'_>) {
    let level = node.props.get_int(prop::LEVEL).unwrap_or(1);
    let tag = match level {
        1 => "h1",
        2 => "h2",
        3 => "h3",
        4 => "h4",
        5 => "h5",
        _ => "h6",
    };
    emit_tag(tag, node, ctx);
}

/// Emit a code block, highlighted when it names a language.
fn emit_code_block(node: &Node, ctx: &mut EmitContext<'_>) {
    let content = node.props.get_str(prop::CONTENT).unwrap_or("");
    let Some(language) = node.props.get_str(prop::LANGUAGE).and_then(code::language_hint) else {
        ctx.write("<pre><code class=\"text-wrap\">");
        ctx.write(&escape_html(content));
        ctx.write("</code></pre>");
        return;
    };

    ctx.write("<div class=\"code-block\" data-language=\"");
    ctx.write(&escape_attr(language));
    ctx.write("\">");
    match code::highlight(content, language, &ctx.ctx.options.highlight_theme) {
        Some(html) => ctx.write(&html),
        None => {
            ctx.warn(
                Severity::Minor,
                WarningKind::FeatureLost("highlight".to_string()),
                format!("Could not highlight {language} code; emitted plain"),
            );
            ctx.write("<pre><code>");
            ctx.write(&escape_html(content.strip_suffix('\n').unwrap_or(content)));
            ctx.write("</code></pre>");
        }
    }
    ctx.write("</div>");
}

/// Emit a list.
fn emit_list(node: &Node, ctx: &mut EmitContext<'_>) {
    let ordered = node.props.get_bool(prop::ORDERED).unwrap_or(false);
    let tag = if ordered { "ol" } else { "ul" };

    ctx.write("<");
    ctx.write(tag);

    if ordered
        && let Some(start) = node.props.get_int(prop::START)
        && start != 1
    {
        ctx.write(" start=\"");
        ctx.write(&start.to_string());
        ctx.write("\"");
    }

    ctx.write(">");
    emit_nodes(&node.children, ctx);
    ctx.write("</");
    ctx.write(tag);
    ctx.write(">");
}

/// Emit a table cell.
fn emit_table_cell(node: &Node, tag: &str, ctx: &mut EmitContext<'_>) {
    ctx.write("<");
    ctx.write(tag);

    if let Some(align) = node.props.get_str(prop::ALIGN)
        && matches!(align, "left" | "center" | "right")
    {
        ctx.write(" style=\"text-align: ");
        ctx.write(align);
        ctx.write("\"");
    }

    ctx.write(">");
    emit_nodes(&node.children, ctx);
    ctx.write("</");
    ctx.write(tag);
    ctx.write(">");
}

/// Emit raw HTML; the sanitizer pass decides what survives.
///
/// Openers that would swallow the rest of the message are escaped first,
/// unless this node or an inline sibling in `following` closes them.
fn emit_raw(node: &Node, following: &[Node], ctx: &mut EmitContext<'_>) {
    if let Some(content) = node.props.get_str(prop::CONTENT) {
        let closed_later = |closer: &str| {
            following
                .iter()
                .filter(|n| n.is(NodeKind::RawInline))
                .filter_map(|n| n.props.get_str(prop::CONTENT))
                .any(|raw| raw.to_ascii_lowercase().contains(closer))
        };
        ctx.write(&sanitize::neutralize_raw(content, closed_later));
    }
}

/// Emit text content.
fn emit_text(node: &Node, ctx: &mut EmitContext<'_>) {
    if let Some(content) = node.props.get_str(prop::CONTENT) {
        ctx.write(&escape_html(content));
    }
}

/// Emit an annotated span, replacing citation markers with glyphs.
fn emit_annotated(node: &Node, ctx: &mut EmitContext<'_>) {
    for child in &node.children {
        match child.props.get_str(prop::CONTENT) {
            Some(text) if child.is(NodeKind::Text) => emit_citations(text, ctx),
            _ => emit_node(child, ctx),
        }
    }
}

fn emit_citations(text: &str, ctx: &mut EmitContext<'_>) {
    for segment in split_markers(text) {
        match segment {
            Segment::Text(text) => ctx.write(&escape_html(text)),
            Segment::Marker(marker) => {
                let in_range = marker
                    .chunk_index
                    .is_some_and(|i| i < ctx.ctx.reference.chunks.len());
                if !in_range {
                    ctx.warn(
                        Severity::Info,
                        WarningKind::UnresolvedCitation(marker.raw.to_string()),
                        format!("No chunk for citation {}; popover left empty", marker.raw),
                    );
                }
                citation::write_glyph(&mut ctx.output, &marker, ctx.ctx.options);
                if !ctx.popovers.contains(&marker.chunk_index) {
                    ctx.popovers.push(marker.chunk_index);
                }
            }
        }
    }
}

/// Emit inline code.
fn emit_inline_code(node: &Node, ctx: &mut EmitContext<'_>) {
    ctx.write("<code class=\"text-wrap\">");
    if let Some(content) = node.props.get_str(prop::CONTENT) {
        ctx.write(&escape_html(content));
    }
    ctx.write("</code>");
}

/// Emit a link.
fn emit_link(node: &Node, ctx: &mut EmitContext<'_>) {
    ctx.write("<a");

    if let Some(url) = node.props.get_str(prop::URL) {
        ctx.write(" href=\"");
        ctx.write(&escape_attr(url));
        ctx.write("\"");
    }

    if let Some(title) = node.props.get_str(prop::TITLE) {
        ctx.write(" title=\"");
        ctx.write(&escape_attr(title));
        ctx.write("\"");
    }

    ctx.write(">");
    emit_nodes(&node.children, ctx);
    ctx.write("</a>");
}

/// Emit an image, sized from its lifted `width`/`height` if present.
fn emit_image(node: &Node, ctx: &mut EmitContext<'_>) {
    ctx.write("<img");

    if let Some(url) = node.props.get_str(prop::URL) {
        ctx.write(" src=\"");
        ctx.write(&escape_attr(url));
        ctx.write("\"");
    }

    if let Some(alt) = node.props.get_str(prop::ALT) {
        ctx.write(" alt=\"");
        ctx.write(&escape_attr(alt));
        ctx.write("\"");
    }

    if let Some(title) = node.props.get_str(prop::TITLE) {
        ctx.write(" title=\"");
        ctx.write(&escape_attr(title));
        ctx.write("\"");
    }

    let width = node.props.get_str(prop::WIDTH);
    let height = node.props.get_str(prop::HEIGHT);
    if width.is_some() || height.is_some() {
        let width = image_dimension(width, ctx);
        let height = image_dimension(height, ctx);
        ctx.write(" style=\"width: ");
        ctx.write(&width);
        ctx.write("; height: ");
        ctx.write(&height);
        ctx.write("\"");
    }

    ctx.write(">");
}

fn image_dimension(value: Option<&str>, ctx: &mut EmitContext<'_>) -> String {
    let Some(value) = value else {
        return "auto".to_string();
    };
    match css_dimension(value, ctx.ctx.options.pixels_per_inch) {
        Some(css) => css,
        None => {
            ctx.warn(
                Severity::Minor,
                WarningKind::MalformedSize(value.to_string()),
                format!("Ignoring image size {value:?}"),
            );
            "auto".to_string()
        }
    }
}

/// A CSS length for an image size value.
///
/// `in` values become pixels; plain numbers and other unit suffixes pass
/// through unchanged. Anything else is not a length and yields `None`.
pub fn css_dimension(value: &str, pixels_per_inch: f64) -> Option<String> {
    let value = value.trim();
    if value == "auto" {
        return Some(value.to_string());
    }
    if let Some(inches) = value.strip_suffix("in") {
        let inches: f64 = inches.trim_end().parse().ok()?;
        if !inches.is_finite() || inches < 0.0 {
            return None;
        }
        let pixels = (inches * pixels_per_inch * 100.0).round() / 100.0;
        return Some(format!("{pixels}px"));
    }

    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number_ok = !number.is_empty() && number.parse::<f64>().is_ok();
    let unit_ok = unit == "%" || (unit.len() <= 4 && unit.chars().all(|c| c.is_ascii_alphabetic()));
    (number_ok && unit_ok).then(|| value.to_string())
}

/// Emit a task-list checkbox.
fn emit_task_marker(node: &Node, ctx: &mut EmitContext<'_>) {
    ctx.write("<input type=\"checkbox\" disabled=\"\"");
    if node.props.get_bool(prop::CHECKED).unwrap_or(false) {
        ctx.write(" checked=\"\"");
    }
    ctx.write(">");
}

/// Emit a footnote reference.
fn emit_footnote_ref(node: &Node, ctx: &mut EmitContext<'_>) {
    let label = node.props.get_str(prop::LABEL).unwrap_or("?");
    ctx.write("<sup><a href=\"#fn-");
    ctx.write(&escape_attr(label));
    ctx.write("\">");
    ctx.write(&escape_html(label));
    ctx.write("</a></sup>");
}

/// Emit a footnote definition.
fn emit_footnote_def(node: &Node, ctx: &mut EmitContext<'_>) {
    let label = node.props.get_str(prop::LABEL).unwrap_or("?");
    ctx.write("<div id=\"fn-");
    ctx.write(&escape_attr(label));
    ctx.write("\" class=\"footnote\"><sup>");
    ctx.write(&escape_html(label));
    ctx.write("</sup> ");
    emit_nodes(&node.children, ctx);
    ctx.write("</div>");
}

/// Emit math source for client-side typesetting.
fn emit_math(node: &Node, class: &str, open: &str, close: &str, ctx: &mut EmitContext<'_>) {
    if let Some(source) = node.props.get_str(prop::MATH_SOURCE) {
        ctx.write("<span class=\"");
        ctx.write(class);
        ctx.write("\">");
        ctx.write(open);
        ctx.write(&escape_html(source));
        ctx.write(close);
        ctx.write("</span>");
    }
}

/// Escape HTML special characters.
pub(crate) fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape attribute values.
pub(crate) fn escape_attr(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
