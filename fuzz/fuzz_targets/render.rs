#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use refmark::html::sanitize;
use refmark::{Chunk, DocumentAggregate, NoThumbnails, ReferenceIndex, RenderOptions};

#[derive(Debug, Arbitrary)]
struct Input {
    content: String,
    chunks: Vec<(String, String, Option<String>)>,
    docs: Vec<(String, String, Option<String>)>,
}

fuzz_target!(|input: Input| {
    let reference = ReferenceIndex {
        chunks: input
            .chunks
            .into_iter()
            .enumerate()
            .map(|(i, (document_id, content, image_id))| Chunk {
                id: i.to_string(),
                document_id,
                content,
                image_id,
            })
            .collect(),
        doc_aggs: input
            .docs
            .into_iter()
            .map(|(doc_id, doc_name, url)| DocumentAggregate {
                doc_id,
                doc_name,
                url,
            })
            .collect(),
    };

    let html = refmark::render_message(
        &input.content,
        &reference,
        &NoThumbnails,
        &RenderOptions::default(),
    )
    .value;
    assert!(!html.contains("<script"));
    let _ = sanitize(&html);
});
