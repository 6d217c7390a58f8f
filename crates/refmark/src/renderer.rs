//! The end-to-end message pipeline and its stateful driver.

use std::collections::HashMap;
use std::sync::Arc;

use refmark_core::{
    ConversionResult, Document, DocumentClick, FetchError, FidelityWarning, ReferenceError,
    ReferenceIndex, ThumbnailLookup, Transformer,
};
use refmark_read_markdown::parse_with_options;
use refmark_transforms::{ImageSizes, MergeText, Pipeline, TagReferenceSpans, normalize};
use refmark_write_html::{ClickAction, PopoverCache, RenderContext, click_action, emit_with_context};

use crate::RenderOptions;
use crate::thumbnails::{ThumbnailCache, ThumbnailRequest};

/// Normalize, parse and tag `content`, ready for rendering.
///
/// Empty content is replaced by the searching placeholder.
pub fn prepare(content: &str, options: &RenderOptions) -> ConversionResult<Document> {
    let content = if content.is_empty() {
        options.searching_placeholder.as_str()
    } else {
        content
    };
    let normalized = normalize(content);
    let pipeline = Pipeline::new().then(TagReferenceSpans);
    parse_with_options(&normalized, &options.markdown).map(|doc| pipeline.transform(doc))
}

/// Tag a tree that was built without the markdown reader.
///
/// Text runs are merged and image sizes lifted first, as the reader would.
pub fn annotate_document(doc: Document) -> Document {
    Pipeline::new()
        .then(MergeText)
        .then(ImageSizes)
        .then(TagReferenceSpans)
        .transform(doc)
}

/// Render `content` to sanitized HTML in one shot.
pub fn render_message(
    content: &str,
    reference: &ReferenceIndex,
    thumbnails: &dyn ThumbnailLookup,
    options: &RenderOptions,
) -> ConversionResult<String> {
    let prepared = prepare(content, options);
    let ctx = RenderContext::new(reference, thumbnails, &options.html);
    let html = emit_with_context(&prepared.value, &ctx, &mut PopoverCache::new());
    combine(prepared.warnings, html)
}

fn combine(mut warnings: Vec<FidelityWarning>, result: ConversionResult<String>) -> ConversionResult<String> {
    warnings.extend(result.warnings);
    ConversionResult::with_warnings(result.value, warnings)
}

struct Prepared {
    content: String,
    document: Document,
    warnings: Vec<FidelityWarning>,
}

/// Renders one message as its content streams in.
///
/// The parsed tree is reused while the content is unchanged, popovers are
/// memoized per reference snapshot, and thumbnails are re-keyed whenever
/// the set of source documents changes.
pub struct MessageRenderer {
    options: RenderOptions,
    reference: Arc<ReferenceIndex>,
    thumbnails: ThumbnailCache,
    popovers: PopoverCache,
    prepared: Option<Prepared>,
    on_click: Option<Box<dyn DocumentClick>>,
}

impl MessageRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            reference: Arc::new(ReferenceIndex::empty()),
            thumbnails: ThumbnailCache::new(),
            popovers: PopoverCache::new(),
            prepared: None,
            on_click: None,
        }
    }

    /// Register the callback that opens PDF sources in the host viewer.
    pub fn with_click_handler(mut self, handler: impl DocumentClick + 'static) -> Self {
        self.on_click = Some(Box::new(handler));
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn reference(&self) -> &ReferenceIndex {
        &self.reference
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Swap in a new reference snapshot.
    ///
    /// Returns a thumbnail request when the set of source documents changed.
    pub fn set_reference(
        &mut self,
        reference: impl Into<Arc<ReferenceIndex>>,
    ) -> Option<ThumbnailRequest> {
        let reference = reference.into();
        if Arc::ptr_eq(&reference, &self.reference) {
            return None;
        }
        self.reference = reference;
        self.popovers.clear();
        log::debug!(
            "reference index replaced: {} chunks, {} documents",
            self.reference.chunks.len(),
            self.reference.doc_aggs.len()
        );
        self.thumbnails.recompute(self.reference.document_ids())
    }

    /// Like [`set_reference`](Self::set_reference), but a failed fetch keeps
    /// the last-known index.
    pub fn set_reference_result(
        &mut self,
        result: Result<ReferenceIndex, ReferenceError>,
    ) -> Option<ThumbnailRequest> {
        match result {
            Ok(reference) => self.set_reference(reference),
            Err(e) => {
                log::warn!("{e}; keeping the last-known reference index");
                None
            }
        }
    }

    /// Deliver thumbnails for `request`. Returns whether they were accepted.
    pub fn receive_thumbnails(
        &mut self,
        request: &ThumbnailRequest,
        result: Result<HashMap<String, String>, FetchError>,
    ) -> bool {
        let accepted = self.thumbnails.fulfill(request, result);
        if accepted {
            self.popovers.clear();
        }
        accepted
    }

    /// Render the current `content`.
    pub fn render(&mut self, content: &str) -> ConversionResult<String> {
        if self.prepared.as_ref().is_some_and(|p| p.content != content) {
            self.prepared = None;
        }
        let prepared = self.prepared.get_or_insert_with(|| {
            let result = prepare(content, &self.options);
            Prepared {
                content: content.to_string(),
                document: result.value,
                warnings: result.warnings,
            }
        });

        let ctx = RenderContext::new(&self.reference, &self.thumbnails, &self.options.html);
        let html = emit_with_context(&prepared.document, &ctx, &mut self.popovers);
        combine(prepared.warnings.clone(), html)
    }

    /// The parsed tree for the most recently rendered content.
    pub fn document(&self) -> Option<&Document> {
        self.prepared.as_ref().map(|p| &p.document)
    }

    /// Activate the source document of chunk `chunk_index`.
    ///
    /// PDF sources are handed to the click handler; the returned action
    /// tells the host what else to do.
    pub fn click_source(&self, chunk_index: usize) -> ClickAction {
        let action = click_action(&self.reference, chunk_index);
        if let ClickAction::OpenDocument { document_id, .. } = &action
            && let Some(handler) = &self.on_click
            && let Some(chunk) = self.reference.chunk(chunk_index)
        {
            handler.click_document(document_id, chunk);
        }
        action
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use refmark_core::{Chunk, DocumentAggregate, NoThumbnails};

    use super::*;

    fn reference() -> ReferenceIndex {
        ReferenceIndex {
            chunks: vec![
                Chunk {
                    id: "c0".into(),
                    document_id: "d0".into(),
                    content: "first".into(),
                    image_id: None,
                },
                Chunk {
                    id: "c1".into(),
                    document_id: "d1".into(),
                    content: "second".into(),
                    image_id: None,
                },
            ],
            doc_aggs: vec![
                DocumentAggregate {
                    doc_id: "d0".into(),
                    doc_name: "paper.PDF".into(),
                    url: None,
                },
                DocumentAggregate {
                    doc_id: "d1".into(),
                    doc_name: "page.html".into(),
                    url: Some("https://example.com".into()),
                },
            ],
        }
    }

    #[test]
    fn test_prepare_placeholder() {
        let doc = prepare("", &RenderOptions::default()).value;
        assert_eq!(refmark_std::plain_text(&doc.content), "Searching...");
    }

    #[test]
    fn test_annotate_built_document() {
        use refmark_core::NodeKind;
        use refmark_std::{helpers, prop};

        let doc = Document::new().with_content(helpers::document([helpers::paragraph([
            helpers::image("a.png", "a"),
            helpers::text("{width=\"2in\" "),
            helpers::text("height=\"1in\"}"),
            helpers::text("cite ~~0=="),
            helpers::code("~~0=="),
        ])]));
        let doc = annotate_document(doc);
        let para = &doc.content.children[0];
        assert_eq!(para.children.len(), 2);
        assert_eq!(para.children[0].props.get_str(prop::WIDTH), Some("2in"));
        assert_eq!(para.children[1].kind, NodeKind::Code);

        let html = refmark_write_html::emit(&doc).value;
        assert_eq!(html, "<p><img src=\"a.png\" alt=\"a\" style=\"width: 192px; height: 96px\"><code class=\"text-wrap\">~~0==</code></p>");
    }

    #[test]
    fn test_render_message() {
        let html = render_message(
            "Hi ~~0==",
            &reference(),
            &NoThumbnails,
            &RenderOptions::default(),
        )
        .value;
        assert!(html.starts_with("<p>Hi <button"));
        assert!(html.contains("id=\"reference-chunk-0\""));
    }

    #[test]
    fn test_reference_swap_rekeys_thumbnails() {
        let mut renderer = MessageRenderer::default();
        let request = renderer.set_reference(reference()).unwrap();
        assert_eq!(request.ids, vec!["d0".to_string(), "d1".to_string()]);

        let thumbnails = [("d1".to_string(), "/d1.png".to_string())].into();
        assert!(renderer.receive_thumbnails(&request, Ok(thumbnails)));
        assert!(renderer.render("x ~~1==").value.contains("src=\"/d1.png\""));

        // Same documents, different snapshot: no new fetch.
        assert!(renderer.set_reference(reference()).is_none());
    }

    #[test]
    fn test_failed_reference_keeps_last_known() {
        let mut renderer = MessageRenderer::default();
        renderer.set_reference(reference());
        let request = renderer.set_reference_result(Err(ReferenceError::Unavailable("503".into())));
        assert!(request.is_none());
        assert_eq!(renderer.reference().chunks.len(), 2);
    }

    #[test]
    fn test_render_reuses_tree_until_content_changes() {
        let mut renderer = MessageRenderer::default();
        let first = renderer.render("Hello").value;
        let second = renderer.render("Hello").value;
        assert_eq!(first, second);

        renderer.render("Hello, world");
        let text = refmark_std::plain_text(&renderer.document().unwrap().content);
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn test_click_source() {
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&clicks);
        let mut renderer = MessageRenderer::default().with_click_handler(
            move |document_id: &str, chunk: &Chunk| {
                sink.borrow_mut().push((document_id.to_string(), chunk.id.clone()));
            },
        );
        renderer.set_reference(reference());

        assert!(matches!(
            renderer.click_source(0),
            ClickAction::OpenDocument { chunk_index: 0, .. }
        ));
        assert_eq!(
            renderer.click_source(1),
            ClickAction::OpenUrl("https://example.com".into())
        );
        assert_eq!(renderer.click_source(5), ClickAction::Nothing);
        assert_eq!(*clicks.borrow(), vec![("d0".to_string(), "c0".to_string())]);
    }
}
