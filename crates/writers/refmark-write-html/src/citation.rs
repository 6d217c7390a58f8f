//! Citation markers and their reference popovers.
//!
//! Each `~~N==` marker in an annotated text run becomes a glyph button bound
//! to a popover for chunk `N`. Popovers are built on first use, memoized in
//! a [`PopoverCache`] for the lifetime of one reference snapshot, and
//! emitted once each after the document body.

use std::collections::BTreeMap;
use std::ops::Range;

use refmark_core::{Chunk, ReferenceIndex, ThumbnailLookup};
use refmark_transforms::patterns::CITATION_MARKER;

use crate::sanitize::sanitize;
use crate::{HtmlOptions, escape_attr, escape_html};

/// Popover id used by markers whose index does not fit in memory.
pub const INVALID_POPOVER_ID: &str = "reference-invalid";

/// One citation marker found in a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMatch<'a> {
    /// The marker exactly as written.
    pub raw: &'a str,
    /// Zero-based chunk index; `None` if the digits overflow.
    pub chunk_index: Option<usize>,
    /// Byte range of the marker in the text run.
    pub span: Range<usize>,
}

/// A text run split around its citation markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Marker(AnnotationMatch<'a>),
}

/// All markers in `text`, left to right, non-overlapping.
pub fn find_markers(text: &str) -> Vec<AnnotationMatch<'_>> {
    CITATION_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let digits = caps.get(1)?;
            Some(AnnotationMatch {
                raw: whole.as_str(),
                chunk_index: digits.as_str().parse().ok(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Split `text` into verbatim text and markers, preserving every byte.
pub fn split_markers(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for marker in find_markers(text) {
        if marker.span.start > last {
            segments.push(Segment::Text(&text[last..marker.span.start]));
        }
        last = marker.span.end;
        segments.push(Segment::Marker(marker));
    }
    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }
    segments
}

/// Popover element id for a chunk index, scoped by `prefix`.
pub fn popover_id(prefix: &str, chunk_index: Option<usize>) -> String {
    match chunk_index {
        Some(index) => format!("{prefix}reference-chunk-{index}"),
        None => format!("{prefix}{INVALID_POPOVER_ID}"),
    }
}

/// What activating a source document does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Hand the document to the host's in-app viewer (PDF sources).
    OpenDocument { document_id: String, chunk_index: usize },
    /// Open the document's URL in a new browsing context.
    OpenUrl(String),
    /// No URL is known; the name is inert.
    Nothing,
}

/// How a source document is pictured in the popover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceIcon {
    /// A fetched thumbnail handle.
    Thumbnail(String),
    /// Generic icon for the lowercase file extension.
    FileType(String),
}

/// The document a chunk came from, as shown in its popover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    pub doc_id: String,
    pub name: String,
    pub icon: SourceIcon,
    pub action: ClickAction,
}

/// Everything a resolved popover shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PopoverContent {
    pub chunk_index: usize,
    /// Full URL of the chunk's image, if it has one.
    pub image: Option<String>,
    /// Chunk content, already sanitized.
    pub content_html: String,
    pub source: Option<DocumentSource>,
}

/// Click behavior for the source document of chunk `chunk_index`.
pub fn click_action(reference: &ReferenceIndex, chunk_index: usize) -> ClickAction {
    let Some(chunk) = reference.chunk(chunk_index) else {
        return ClickAction::Nothing;
    };
    match reference.document(&chunk.document_id) {
        Some(doc) if doc.is_pdf() => ClickAction::OpenDocument {
            document_id: chunk.document_id.clone(),
            chunk_index,
        },
        Some(doc) => match doc.link() {
            Some(url) => ClickAction::OpenUrl(url.to_string()),
            None => ClickAction::Nothing,
        },
        None => ClickAction::Nothing,
    }
}

/// Resolve chunk `chunk_index`, or `None` when it is out of range.
pub fn resolve(
    chunk_index: usize,
    reference: &ReferenceIndex,
    thumbnails: &dyn ThumbnailLookup,
    options: &HtmlOptions,
) -> Option<PopoverContent> {
    let chunk = reference.chunk(chunk_index)?;
    let source = reference.document(&chunk.document_id).map(|doc| {
        let icon = match thumbnails.thumbnail(&doc.doc_id) {
            Some(handle) => SourceIcon::Thumbnail(handle.to_string()),
            None => SourceIcon::FileType(doc.extension()),
        };
        DocumentSource {
            doc_id: doc.doc_id.clone(),
            name: doc.doc_name.clone(),
            icon,
            action: click_action(reference, chunk_index),
        }
    });

    Some(PopoverContent {
        chunk_index,
        image: chunk_image(chunk, options),
        content_html: sanitize(&chunk.content).html,
        source,
    })
}

fn chunk_image(chunk: &Chunk, options: &HtmlOptions) -> Option<String> {
    chunk
        .image()
        .map(|id| format!("{}{}", options.image_url_prefix, id))
}

/// Write the glyph that replaces a marker in the text flow.
pub(crate) fn write_glyph(
    out: &mut String,
    marker: &AnnotationMatch<'_>,
    options: &HtmlOptions,
) {
    let id = popover_id(&options.popover_id_prefix, marker.chunk_index);
    out.push_str("<button type=\"button\" class=\"reference-glyph\" popovertarget=\"");
    out.push_str(&escape_attr(&id));
    out.push('"');
    if let Some(index) = marker.chunk_index {
        out.push_str(" data-chunk-index=\"");
        out.push_str(&index.to_string());
        out.push('"');
    }
    out.push_str(" aria-label=\"Show reference\">\u{24d8}</button>");
}

/// Render a popover element, empty when `content` is `None`.
pub fn render_popover(id: &str, content: Option<&PopoverContent>, options: &HtmlOptions) -> String {
    let mut out = String::new();
    out.push_str("<div popover=\"auto\" id=\"");
    out.push_str(&escape_attr(id));

    let Some(content) = content else {
        out.push_str("\" class=\"reference-popover reference-popover-empty\"></div>");
        return out;
    };
    out.push_str("\" class=\"reference-popover\">");

    if let Some(image) = &content.image {
        let preview_id = escape_attr(&format!(
            "{}reference-image-{}",
            options.popover_id_prefix, content.chunk_index
        ));
        out.push_str("<button type=\"button\" class=\"reference-image\" popovertarget=\"");
        out.push_str(&preview_id);
        out.push_str("\"><img src=\"");
        out.push_str(&escape_attr(image));
        out.push_str("\" alt=\"\" class=\"reference-thumbnail\"></button>");
        out.push_str("<div popover=\"auto\" id=\"");
        out.push_str(&preview_id);
        out.push_str("\" class=\"reference-image-preview\"><img src=\"");
        out.push_str(&escape_attr(image));
        out.push_str("\" alt=\"\"></div>");
    }

    out.push_str("<div class=\"reference-chunk-content\">");
    out.push_str(&content.content_html);
    out.push_str("</div>");

    if let Some(source) = &content.source {
        write_source(&mut out, source, content.chunk_index, options);
    }

    out.push_str("</div>");
    out
}

fn write_source(out: &mut String, source: &DocumentSource, chunk_index: usize, options: &HtmlOptions) {
    out.push_str("<div class=\"reference-source\">");
    match &source.icon {
        SourceIcon::Thumbnail(handle) => {
            out.push_str("<img class=\"reference-source-thumbnail\" src=\"");
            out.push_str(&escape_attr(handle));
            out.push_str("\" alt=\"\">");
        }
        SourceIcon::FileType(extension) => {
            out.push_str("<img class=\"reference-file-icon\" src=\"");
            out.push_str(&escape_attr(&format!(
                "{}{}.svg",
                options.file_icon_prefix, extension
            )));
            out.push_str("\" alt=\"");
            out.push_str(&escape_attr(extension));
            out.push_str("\">");
        }
    }

    let name = escape_html(&source.name);
    match &source.action {
        ClickAction::OpenUrl(url) => {
            out.push_str("<a class=\"reference-document\" href=\"");
            out.push_str(&escape_attr(url));
            out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
            out.push_str(&name);
            out.push_str("</a>");
        }
        ClickAction::OpenDocument { document_id, .. } => {
            out.push_str("<button type=\"button\" class=\"reference-document\" data-document-id=\"");
            out.push_str(&escape_attr(document_id));
            out.push_str("\" data-chunk-index=\"");
            out.push_str(&chunk_index.to_string());
            out.push_str("\">");
            out.push_str(&name);
            out.push_str("</button>");
        }
        ClickAction::Nothing => {
            out.push_str("<span class=\"reference-document\">");
            out.push_str(&name);
            out.push_str("</span>");
        }
    }
    out.push_str("</div>");
}

/// Rendered popovers for one reference snapshot, keyed by chunk index.
///
/// Clear it whenever the reference index, the thumbnails or the options
/// change.
#[derive(Debug, Default)]
pub struct PopoverCache {
    popovers: BTreeMap<Option<usize>, String>,
}

impl PopoverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The popover for `chunk_index`, building it on first use.
    pub fn get_or_build(
        &mut self,
        chunk_index: Option<usize>,
        reference: &ReferenceIndex,
        thumbnails: &dyn ThumbnailLookup,
        options: &HtmlOptions,
    ) -> &str {
        self.popovers.entry(chunk_index).or_insert_with(|| {
            let content = chunk_index.and_then(|i| resolve(i, reference, thumbnails, options));
            let popover = render_popover(
                &popover_id(&options.popover_id_prefix, chunk_index),
                content.as_ref(),
                options,
            );
            // Source URLs and image handles come from the reference data.
            sanitize(&popover).html
        })
    }

    /// Forget every built popover.
    pub fn clear(&mut self) {
        self.popovers.clear();
    }

    pub fn len(&self) -> usize {
        self.popovers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.popovers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use refmark_core::{DocumentAggregate, NoThumbnails};

    use super::*;

    fn reference() -> ReferenceIndex {
        ReferenceIndex {
            chunks: vec![
                Chunk {
                    id: "c0".into(),
                    document_id: "d0".into(),
                    content: "alpha <script>x()</script><b>beta</b>".into(),
                    image_id: Some("img0".into()),
                },
                Chunk {
                    id: "c1".into(),
                    document_id: "d1".into(),
                    content: "gamma".into(),
                    image_id: None,
                },
                Chunk {
                    id: "c2".into(),
                    document_id: "missing".into(),
                    content: "delta".into(),
                    image_id: None,
                },
            ],
            doc_aggs: vec![
                DocumentAggregate {
                    doc_id: "d0".into(),
                    doc_name: "Report.pdf".into(),
                    url: None,
                },
                DocumentAggregate {
                    doc_id: "d1".into(),
                    doc_name: "notes.docx".into(),
                    url: Some("https://example.com/notes".into()),
                },
            ],
        }
    }

    #[test]
    fn test_split_markers_preserves_text() {
        let text = "a ~~0== b ~~12==~~x==";
        let segments = split_markers(text);
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("a "));
        let Segment::Marker(first) = &segments[1] else {
            panic!("expected marker");
        };
        assert_eq!(first.chunk_index, Some(0));
        assert_eq!(first.span, 2..7);
        assert_eq!(
            segments[3],
            Segment::Marker(AnnotationMatch {
                raw: "~~12==",
                chunk_index: Some(12),
                span: 10..16,
            })
        );
        assert_eq!(segments[4], Segment::Text("~~x=="));

        let rebuilt: String = segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => *t,
                Segment::Marker(m) => m.raw,
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_overflowing_index() {
        let markers = find_markers("~~99999999999999999999999999==");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].chunk_index, None);
        assert_eq!(popover_id("", None), INVALID_POPOVER_ID);
    }

    #[test]
    fn test_popover_id_prefix() {
        assert_eq!(popover_id("", Some(3)), "reference-chunk-3");
        assert_eq!(popover_id("msg-7-", Some(3)), "msg-7-reference-chunk-3");
        assert_eq!(popover_id("msg-7-", None), "msg-7-reference-invalid");

        let options = HtmlOptions {
            popover_id_prefix: "msg-7-".to_string(),
            ..HtmlOptions::default()
        };
        let mut cache = PopoverCache::new();
        let popover = cache.get_or_build(Some(1), &reference(), &NoThumbnails, &options);
        assert!(popover.contains("id=\"msg-7-reference-chunk-1\""));

        let mut glyph = String::new();
        write_glyph(&mut glyph, &find_markers("~~1==")[0], &options);
        assert!(glyph.contains("popovertarget=\"msg-7-reference-chunk-1\""));
    }

    #[test]
    fn test_click_actions() {
        let reference = reference();
        assert_eq!(
            click_action(&reference, 0),
            ClickAction::OpenDocument {
                document_id: "d0".into(),
                chunk_index: 0
            }
        );
        assert_eq!(
            click_action(&reference, 1),
            ClickAction::OpenUrl("https://example.com/notes".into())
        );
        assert_eq!(click_action(&reference, 2), ClickAction::Nothing);
        assert_eq!(click_action(&reference, 9), ClickAction::Nothing);
    }

    #[test]
    fn test_resolve_sanitizes_and_picks_icon() {
        let reference = reference();
        let options = HtmlOptions::default();

        let content = resolve(0, &reference, &NoThumbnails, &options).unwrap();
        assert_eq!(content.content_html, "alpha <b>beta</b>");
        assert_eq!(content.image.as_deref(), Some("/v1/document/image/img0"));
        let source = content.source.unwrap();
        assert_eq!(source.icon, SourceIcon::FileType("pdf".into()));

        let thumbnails: HashMap<String, String> =
            [("d1".to_string(), "data:image/png;base64,AA".to_string())].into();
        let content = resolve(1, &reference, &thumbnails, &options).unwrap();
        assert_eq!(
            content.source.unwrap().icon,
            SourceIcon::Thumbnail("data:image/png;base64,AA".into())
        );

        let orphan = resolve(2, &reference, &NoThumbnails, &options).unwrap();
        assert!(orphan.source.is_none());
        assert!(resolve(3, &reference, &NoThumbnails, &options).is_none());
    }

    #[test]
    fn test_render_popover() {
        let reference = reference();
        let options = HtmlOptions::default();
        let content = resolve(1, &reference, &NoThumbnails, &options);
        let html = render_popover("reference-chunk-1", content.as_ref(), &options);
        assert!(html.starts_with("<div popover=\"auto\" id=\"reference-chunk-1\""));
        assert!(html.contains("<img class=\"reference-file-icon\" src=\"/file-icon/docx.svg\""));
        assert!(html.contains("href=\"https://example.com/notes\" target=\"_blank\""));
        assert!(html.contains(">notes.docx</a>"));

        let empty = render_popover("reference-chunk-7", None, &options);
        assert_eq!(
            empty,
            "<div popover=\"auto\" id=\"reference-chunk-7\" class=\"reference-popover reference-popover-empty\"></div>"
        );
    }

    #[test]
    fn test_cache_builds_once() {
        let reference = reference();
        let options = HtmlOptions::default();
        let mut cache = PopoverCache::new();
        let first = cache
            .get_or_build(Some(0), &reference, &NoThumbnails, &options)
            .to_string();

        // A different snapshot is ignored until the cache is cleared.
        let empty = ReferenceIndex::empty();
        let again = cache.get_or_build(Some(0), &empty, &NoThumbnails, &options);
        assert_eq!(again, first);
        assert_eq!(cache.len(), 1);

        cache.clear();
        let rebuilt = cache.get_or_build(Some(0), &empty, &NoThumbnails, &options);
        assert!(rebuilt.contains("reference-popover-empty"));
    }

    #[test]
    fn test_cached_popover_drops_unsafe_source_url() {
        let mut reference = reference();
        reference.doc_aggs[1].url = Some("javascript:alert(1)".into());
        let options = HtmlOptions::default();
        let mut cache = PopoverCache::new();
        let popover = cache.get_or_build(Some(1), &reference, &NoThumbnails, &options);
        assert!(!popover.contains("javascript:"));
        assert!(popover.contains(">notes.docx</a>"));
    }
}
