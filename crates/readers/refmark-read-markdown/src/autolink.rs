//! GFM-style autolinks for bare URLs in text.

use refmark_std::{Node, NodeKind, helpers, prop};
use refmark_transforms::patterns::{AUTOLINK, CITATION_MARKER};

/// Split text nodes in one sibling list around bare URLs.
pub(crate) fn linkify(nodes: &mut Vec<Node>) {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        if node.is(NodeKind::Text)
            && let Some(text) = node.props.get_str(prop::CONTENT)
            && AUTOLINK.is_match(text)
        {
            split_links(text, &mut out);
        } else {
            out.push(node);
        }
    }
    *nodes = out;
}

fn split_links(text: &str, out: &mut Vec<Node>) {
    let mut last = 0;
    for m in AUTOLINK.find_iter(text) {
        let start = m.start();
        let boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || "*_~(".contains(c));
        if !boundary {
            continue;
        }
        let url = trim_url(m.as_str());
        if !has_host(url) {
            continue;
        }
        if start > last {
            out.push(helpers::text(&text[last..start]));
        }
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(helpers::link(href, [helpers::text(url)]));
        last = start + url.len();
    }
    if last < text.len() {
        out.push(helpers::text(&text[last..]));
    }
}

/// Drop trailing punctuation, unbalanced parens and any citation marker.
fn trim_url(url: &str) -> &str {
    let mut url = match CITATION_MARKER.find(url) {
        Some(marker) => &url[..marker.start()],
        None => url,
    };
    loop {
        if let Some(stripped) = url.strip_suffix(['?', '!', '.', ',', ':', ';', '*', '_', '~', '\'', '"']) {
            url = stripped;
        } else if url.ends_with(')') && url.matches('(').count() < url.matches(')').count() {
            url = &url[..url.len() - 1];
        } else {
            return url;
        }
    }
}

fn has_host(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("www."))
        .unwrap_or_default();
    rest.chars().next().is_some_and(char::is_alphanumeric)
}
