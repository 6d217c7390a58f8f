//! Refmark - render model-generated chat messages
//!
//! A message goes through four stages before it is shown:
//! - the marker normalizer rewrites legacy citation markers, LaTeX
//!   delimiters and `<think>` sections into one canonical dialect
//! - the markdown reader parses it, lifting `{width=.. height=..}`
//!   annotations onto the preceding image
//! - the reference-span tagger marks every text run outside code
//! - the HTML writer turns `~~N==` markers in tagged runs into popover
//!   buttons, highlights code and sanitizes everything
//!
//! # Quick Start
//!
//! ```rust
//! use refmark::{ReferenceIndex, RenderOptions, NoThumbnails};
//!
//! let reference = ReferenceIndex::from_json(
//!     r#"{"chunks": [{"id": "c0", "document_id": "d0", "content": "Water boils at 100C."}],
//!         "doc_aggs": [{"doc_id": "d0", "doc_name": "physics.pdf"}]}"#,
//! ).unwrap();
//!
//! let html = refmark::render_message(
//!     "It boils at 100C ~~0==.",
//!     &reference,
//!     &NoThumbnails,
//!     &RenderOptions::default(),
//! );
//!
//! assert!(html.value.contains("popovertarget=\"reference-chunk-0\""));
//! ```
//!
//! For streamed answers, [`MessageRenderer`] keeps the parsed tree,
//! popovers and thumbnails between renders.

mod config;
mod renderer;
mod thumbnails;

// Re-export core types
pub use refmark_core::*;

pub use config::{ConfigError, RenderOptions};
pub use renderer::{MessageRenderer, annotate_document, prepare, render_message};
pub use thumbnails::{ThumbnailCache, ThumbnailRequest, ThumbnailSource};

/// Property keys and node helpers.
pub mod nodes {
    pub use refmark_std::*;
}

/// Marker normalizer and tree transforms.
pub mod transforms {
    pub use refmark_transforms::*;
}

/// Markdown reader.
pub mod markdown {
    pub use refmark_read_markdown::{MarkdownOptions, parse, parse_with_options};
}

/// HTML writer, citation popovers and sanitizer.
pub mod html {
    pub use refmark_write_html::*;
}

/// Common imports for typical usage.
pub mod prelude {
    pub use crate::nodes::{helpers, prop};
    pub use crate::{
        ConversionResult, Document, MessageRenderer, Node, NodeKind, ReferenceIndex,
        RenderOptions,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html() {
        let result = markdown::parse("# Hello\n\nWorld!");
        let html = html::emit(&result.value).value;
        assert_eq!(html, "<h1>Hello</h1><p>World!</p>");
    }

    #[test]
    fn test_build_document_manually() {
        use prelude::*;

        let document = Document::new().with_content(helpers::document([
            helpers::heading(1, [helpers::text("Manual Document")]),
            helpers::paragraph([helpers::text("~~0==")]),
        ]));
        let html = html::emit(&document).value;
        assert!(html.contains("<h1>Manual Document</h1>"));
        assert!(html.contains("<p>~~0==</p>"));
    }
}
