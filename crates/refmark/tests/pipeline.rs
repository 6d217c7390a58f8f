//! End-to-end tests for the message pipeline.
//!
//! Each module covers one observable guarantee of the rendered output.

use refmark::html::sanitize;
use refmark::nodes::{Node, NodeKind, prop};
use refmark::transforms::{normalize, walk};
use refmark::{
    Chunk, DocumentAggregate, MessageRenderer, NoThumbnails, ReferenceIndex, RenderOptions,
    WarningKind, prepare, render_message,
};

fn reference() -> ReferenceIndex {
    ReferenceIndex::from_json(
        r#"{
            "chunks": [
                {"id": "c0", "document_id": "d0", "content": "Chunk zero", "image_id": "img0"},
                {"id": "c1", "document_id": "d1", "content": "<p>Chunk one</p><script>alert(1)</script>"}
            ],
            "doc_aggs": [
                {"doc_id": "d0", "doc_name": "Manual.pdf"},
                {"doc_id": "d1", "doc_name": "faq.html", "url": "https://example.com/faq"}
            ]
        }"#,
    )
    .unwrap()
}

fn render(content: &str) -> String {
    render_message(content, &reference(), &NoThumbnails, &RenderOptions::default()).value
}

/// Visible text: sanitized markup with every tag removed.
fn visible_text(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn find_kind(node: &Node, kind: NodeKind) -> Vec<Node> {
    let mut found = Vec::new();
    walk(node, &mut |n: &Node| {
        if n.is(kind) {
            found.push(n.clone());
        }
    });
    found
}

mod idempotence {
    use super::*;

    #[test]
    fn test_normalizer_idempotent() {
        let inputs = [
            "",
            "plain",
            "a ~~1== b ##2$$ c",
            "<think>why</think>answer ~~0==",
            "<think>still thinking",
            "\\(x\\) and \\[y\\]",
            "```\n~~0== ##1$$\n```\nafter ##3$$",
            "`~~0==` ~~0==",
            "~~~~1====",
            "\\~\\~1== ~~",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_rendering_normalized_content_is_stable() {
        let content = "Fact ##0$$ and ~~1==.";
        assert_eq!(render(content), render(&normalize(content)));
    }
}

mod round_trip {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        let content = "Rust & C++ are languages. 2 < 3 > 1";
        let html = render(content);
        assert_eq!(html, "<p>Rust &amp; C++ are languages. 2 &lt; 3 &gt; 1</p>");
    }

    #[test]
    fn test_visible_text_matches_input() {
        let content = "One paragraph.\n\nAnother *emphasised* one.";
        let html = render(content);
        assert_eq!(visible_text(&html), "One paragraph.Another emphasised one.");
    }
}

mod determinism {
    use super::*;

    #[test]
    fn test_same_input_same_output() {
        let content = "A ~~0== B ~~1== C ~~0==";
        assert_eq!(render(content), render(content));

        let mut renderer = MessageRenderer::default();
        renderer.set_reference(reference());
        let first = renderer.render(content).value;
        let second = renderer.render(content).value;
        assert_eq!(first, second);
        assert_eq!(first, render(content));
    }

    #[test]
    fn test_one_popover_per_chunk() {
        let html = render("A ~~0== B ~~1== C ~~0==");
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 3);
        assert_eq!(html.matches("id=\"reference-chunk-0\"").count(), 1);
        assert_eq!(html.matches("id=\"reference-chunk-1\"").count(), 1);
        let zero = html.find("id=\"reference-chunk-0\"").unwrap();
        let one = html.find("id=\"reference-chunk-1\"").unwrap();
        assert!(zero < one);
    }
}

mod out_of_range {
    use super::*;

    #[test]
    fn test_out_of_range_marker_renders_empty_popover() {
        let result = render_message(
            "See ~~7==.",
            &reference(),
            &NoThumbnails,
            &RenderOptions::default(),
        );
        assert!(result.value.contains("popovertarget=\"reference-chunk-7\""));
        assert!(result.value.contains("reference-popover-empty"));
        assert!(!result.value.contains("reference-chunk-content"));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnresolvedCitation("~~7==".into()))
        );
    }

    #[test]
    fn test_overflowing_marker() {
        let html = render("x ~~123456789012345678901234567890==");
        assert!(html.contains("popovertarget=\"reference-invalid\""));
    }

    #[test]
    fn test_empty_reference() {
        let html = render_message(
            "x ~~0==",
            &ReferenceIndex::empty(),
            &NoThumbnails,
            &RenderOptions::default(),
        )
        .value;
        assert!(html.contains("reference-popover-empty"));
    }
}

mod image_size {
    use super::*;

    #[test]
    fn test_size_lifted_onto_image() {
        let content = "![alt](https://example.com/a.png){width=\"3in\" height=\"50\"}\n\nNext";
        let doc = prepare(content, &RenderOptions::default()).value;
        let images = find_kind(&doc.content, NodeKind::Image);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].props.get_str(prop::WIDTH), Some("3in"));
        assert_eq!(images[0].props.get_str(prop::HEIGHT), Some("50"));

        let html = render(content);
        assert!(html.contains("style=\"width: 288px; height: 50\""));
        assert!(!html.contains("width=&quot;"));
        assert!(!visible_text(&html).contains("width"));
        assert!(html.contains("<p>Next</p>"));
    }

    #[test]
    fn test_image_without_size() {
        let html = render("![alt](https://example.com/a.png)");
        assert_eq!(
            html,
            "<p><img src=\"https://example.com/a.png\" alt=\"alt\"></p>"
        );
    }

    #[test]
    fn test_malformed_size_left_as_text() {
        let html = render("![alt](a.png){width=3in}");
        assert!(!html.contains("style="));
        assert!(visible_text(&html).contains("{width=3in}"));
    }
}

mod code_exclusion {
    use super::*;

    #[test]
    fn test_fenced_code_markers_literal() {
        let html = render("```\nlet s = \"~~0==\";\n```");
        assert!(html.contains("~~0=="));
        assert!(!html.contains("reference-glyph"));
    }

    #[test]
    fn test_highlighted_code_markers_literal() {
        let html = render("```python\nx = \"~~0==\"\n```");
        assert!(html.contains("data-language=\"python\""));
        assert!(html.contains("~~0=="));
        assert!(!html.contains("reference-glyph"));
    }

    #[test]
    fn test_inline_code_markers_literal() {
        let html = render("Use `~~1==` to cite ~~1==.");
        assert!(html.contains("<code class=\"text-wrap\">~~1==</code>"));
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 1);
    }

    #[test]
    fn test_indented_code_untouched() {
        let html = render("Example:\n\n    printf(\"\\(x\\)\"); // ##1$$ ~~0==");
        assert!(html.contains("<pre><code"));
        assert!(html.contains("\\(x\\)"));
        assert!(html.contains("// ##1$$ ~~0=="));
        assert!(!html.contains("reference-glyph"));
    }

    #[test]
    fn test_legacy_marker_in_code_untouched() {
        let html = render("`##0$$`");
        assert!(html.contains("<code class=\"text-wrap\">##0$$</code>"));
    }
}

mod sanitization {
    use super::*;

    #[test]
    fn test_inline_script_removed() {
        let html = render("Hello <script>alert(1)</script> world");
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));
    }

    #[test]
    fn test_block_script_removed() {
        let html = render("<script>alert(1)</script>\n\nafter");
        assert!(!html.contains("<script"));
        assert!(html.contains("after"));
    }

    #[test]
    fn test_chunk_script_removed() {
        let html = render("cite ~~1==");
        assert!(html.contains("Chunk one"));
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));
    }

    #[test]
    fn test_event_handler_and_js_url_removed() {
        let html = render("<img src=x onerror=alert(1)> [x](javascript:alert(1))");
        assert!(!html.contains("onerror"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_unclosed_raw_text_tag_keeps_following_paragraphs() {
        for tag in ["textarea", "title", "style", "script", "xmp", "noscript"] {
            let html = render(&format!(
                "Put a label before the <{tag}> element ~~0==.\n\nThen submit the form."
            ));
            assert!(html.contains(&format!("&lt;{tag}&gt; element ")), "tag: {tag}");
            assert!(html.contains("<p>Then submit the form.</p>"), "tag: {tag}");
            assert!(html.contains("id=\"reference-chunk-0\""), "tag: {tag}");
        }
    }

    #[test]
    fn test_unterminated_comment_keeps_popovers() {
        let html = render("Fact ~~0==.\n\n<!-- note");
        assert!(html.contains("popovertarget=\"reference-chunk-0\""));
        assert!(html.contains("id=\"reference-chunk-0\""));
        assert!(!html.contains("<!--"));
    }

    #[test]
    fn test_output_is_sanitizer_fixpoint() {
        let html = render("**a** ~~0== <b onclick=x>b</b>\n\n| h |\n|---|\n| c |");
        assert_eq!(sanitize(&html).html, html);
    }
}

mod empty_content {
    use super::*;

    #[test]
    fn test_placeholder() {
        assert_eq!(render(""), "<p>Searching...</p>");
    }

    #[test]
    fn test_custom_placeholder() {
        let options = RenderOptions {
            searching_placeholder: "Thinking".into(),
            ..RenderOptions::default()
        };
        let html = render_message("", &ReferenceIndex::empty(), &NoThumbnails, &options).value;
        assert_eq!(html, "<p>Thinking</p>");
    }
}

mod popover_content {
    use super::*;

    #[test]
    fn test_pdf_source_and_image() {
        let html = render("x ~~0==");
        assert!(html.contains("src=\"/v1/document/image/img0\""));
        assert!(html.contains("popovertarget=\"reference-image-0\""));
        assert!(html.contains("src=\"/file-icon/pdf.svg\""));
        assert!(html.contains("data-document-id=\"d0\""));
        assert!(html.contains(">Manual.pdf</button>"));
    }

    #[test]
    fn test_url_source() {
        let html = render("x ~~1==");
        assert!(html.contains("href=\"https://example.com/faq\""));
        assert!(html.contains("target=\"_blank\""));
    }

    #[test]
    fn test_thumbnail_replaces_icon() {
        let mut renderer = MessageRenderer::default();
        let request = renderer.set_reference(reference()).unwrap();
        let before = renderer.render("x ~~0==").value;
        assert!(before.contains("/file-icon/pdf.svg"));

        let thumbnails = [("d0".to_string(), "/thumb/d0.png".to_string())].into();
        assert!(renderer.receive_thumbnails(&request, Ok(thumbnails)));
        let after = renderer.render("x ~~0==").value;
        assert!(after.contains("src=\"/thumb/d0.png\""));
        assert!(!after.contains("/file-icon/pdf.svg"));
    }

    #[test]
    fn test_orphan_chunk_has_no_source() {
        let reference = ReferenceIndex {
            chunks: vec![Chunk {
                id: "c".into(),
                document_id: "gone".into(),
                content: "orphan".into(),
                image_id: None,
            }],
            doc_aggs: vec![DocumentAggregate::default()],
        };
        let html =
            render_message("x ~~0==", &reference, &NoThumbnails, &RenderOptions::default()).value;
        assert!(html.contains("orphan"));
        assert!(!html.contains("reference-source"));
    }
}

mod dialect {
    use super::*;

    #[test]
    fn test_legacy_marker_resolved() {
        let html = render("Old style ##1$$.");
        assert!(html.contains("popovertarget=\"reference-chunk-1\""));
        assert!(!html.contains("##1$$"));
    }

    #[test]
    fn test_adjacent_markers_not_strikethrough() {
        let html = render("a ~~0== b ~~1== c");
        assert!(!html.contains("<del>"));
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 2);
    }

    #[test]
    fn test_think_section() {
        let html = render("<think>\nI should check **this**.\n</think>\n\nThe answer.");
        assert!(html.starts_with("<section class=\"think\">"));
        assert!(html.contains("<strong>this</strong>"));
        assert!(html.contains("<p>The answer.</p>"));
    }

    #[test]
    fn test_answer_on_same_line_as_think_close() {
        let html = render("<think>reasoning</think>The **answer** is 42 ~~0==.");
        assert!(html.contains("<p>reasoning</p></section>"));
        assert!(html.contains("<p>The <strong>answer</strong> is 42 <button"));
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 1);
        assert!(!visible_text(&html).contains("~~0=="));
    }

    #[test]
    fn test_author_escaped_marker() {
        let html = render(r"Already escaped \~~0== here");
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 1);
        assert!(!visible_text(&html).contains('\\'));
    }

    #[test]
    fn test_latex_delimiters() {
        let html = render("Inline \\(a^2\\) and display \\[b\\]");
        assert!(html.contains("<span class=\"math math-inline\">\\(a^2\\)</span>"));
        assert!(html.contains("<span class=\"math math-display\">\\[b\\]</span>"));
    }

    #[test]
    fn test_strikethrough_still_works() {
        let html = render("~~gone~~ ~~0==");
        assert!(html.contains("<del>gone</del>"));
        assert_eq!(html.matches("class=\"reference-glyph\"").count(), 1);
    }
}
