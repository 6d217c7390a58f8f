//! The marker dialect layered on top of the document grammar.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical citation marker: `~~`, a digit run, `==`.
pub static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile("CITATION_MARKER", r"~~(\d+)=="));

/// Legacy citation marker: `##`, a digit run, `$$`.
pub static LEGACY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile("LEGACY_MARKER", r"##(\d+)\$\$"));

/// A canonical marker after the normalizer escaped its tildes.
pub static GUARDED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile("GUARDED_MARKER", r"\\~\\~(\d+)=="));

/// Size annotation trailing an image. Unanchored: it may appear anywhere
/// in the text node that follows the image.
pub static SIZE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        "SIZE_ANNOTATION",
        r#"\{width="([^"]+)" height="([^"]+)"\}"#,
    )
});

/// A complete reasoning trace.
pub static THINK_PAIR: LazyLock<Regex> =
    LazyLock::new(|| compile("THINK_PAIR", r"(?s)<think>(.*?)</think>"));

/// `\[ ... \]` display math.
pub static LATEX_DISPLAY: LazyLock<Regex> =
    LazyLock::new(|| compile("LATEX_DISPLAY", r"(?s)\\\[(.*?)\\\]"));

/// `\( ... \)` inline math.
pub static LATEX_INLINE: LazyLock<Regex> =
    LazyLock::new(|| compile("LATEX_INLINE", r"(?s)\\\((.*?)\\\)"));

/// Candidate GFM autolink: scheme or `www.` up to whitespace or `<`.
pub static AUTOLINK: LazyLock<Regex> =
    LazyLock::new(|| compile("AUTOLINK", r"(?:https?://|www\.)[^\s<]+"));

fn compile(name: &str, pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| {
        log::error!("Failed to compile {name} regex: {e}");
        never_matching()
    })
}

fn never_matching() -> Regex {
    // An empty character class compiles and matches nothing.
    Regex::new(r"[^\s\S]").expect("empty class is a valid pattern")
}
