//! Allowlist HTML sanitizer.
//!
//! Markup is parsed with html5ever first, so unbalanced or malformed input
//! is normalized the way a browser would see it before anything is kept.
//! Elements on the allowlist survive with filtered attributes; script-like
//! elements are dropped with their content; anything else is unwrapped.

use std::borrow::Cow;
use std::collections::BTreeSet;

use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::{escape_attr, escape_html};

/// Sanitized markup and the names of elements that did not survive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sanitized {
    pub html: String,
    pub removed: BTreeSet<String>,
}

const ALLOWED: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "button", "caption", "cite", "code", "col", "colgroup",
    "dd", "del", "details", "div", "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3",
    "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li", "mark", "ol", "p", "pre",
    "q", "s", "samp", "section", "small", "span", "strong", "sub", "summary", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "time", "tr", "u", "ul", "var", "wbr",
];

/// Dropped together with everything inside them.
const DROPPED: &[&str] = &[
    "applet", "audio", "base", "canvas", "embed", "form", "frame", "frameset", "iframe", "link",
    "math", "meta", "noembed", "noframes", "noscript", "object", "option", "param", "plaintext",
    "script", "select", "source", "style", "svg", "template", "textarea", "title", "track",
    "video", "xmp",
];

const VOID: &[&str] = &["br", "col", "hr", "img", "input", "wbr"];

/// Dropped elements that never have content.
const DROPPED_VOID: &[&str] = &[
    "base", "embed", "frame", "link", "meta", "param", "source", "track",
];

const GLOBAL_ATTRS: &[&str] = &[
    "class", "dir", "hidden", "id", "lang", "popover", "role", "tabindex", "title",
];

const STYLE_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "font-style",
    "font-weight",
    "height",
    "text-align",
    "text-decoration",
    "width",
];

/// Sanitize an HTML fragment.
pub fn sanitize(html: &str) -> Sanitized {
    let mut out = Sanitized::default();
    if !html.contains(['<', '>', '&']) {
        out.html.push_str(html);
        return out;
    }

    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    // Leading metadata-like elements land in <head>; none of them are kept.
    if let Some(head) = find_element(&dom.document, "head") {
        for child in head.children.borrow().iter() {
            if let NodeData::Element { name, .. } = &child.data {
                out.removed.insert(name.local.to_string());
            }
        }
    }
    if let Some(body) = find_element(&dom.document, "body") {
        write_children(&body, &mut out);
    }
    out
}

/// Escape openers in one raw HTML fragment that would swallow whatever
/// follows it once fragments are joined.
///
/// A dropped element that is closed neither within the fragment nor by
/// `closed_later` (given its lowercase end tag, e.g. `</style`), a
/// `<plaintext>` and an unterminated comment are turned into literal text.
pub fn neutralize_raw(raw: &str, closed_later: impl Fn(&str) -> bool) -> Cow<'_, str> {
    let lower = raw.to_ascii_lowercase();
    let mut out = String::new();
    let mut last = 0;

    for (at, _) in lower.match_indices('<') {
        let rest = &lower[at + 1..];
        let swallows = if let Some(comment) = rest.strip_prefix("!--") {
            !comment.contains("-->")
        } else {
            let name_len = rest.bytes().take_while(u8::is_ascii_alphanumeric).count();
            let name = &rest[..name_len];
            let closed = || {
                let closer = format!("</{name}");
                rest.contains(&closer) || closed_later(&closer)
            };
            DROPPED.contains(&name)
                && !DROPPED_VOID.contains(&name)
                && (name == "plaintext" || !closed())
        };
        if swallows {
            out.push_str(&raw[last..at]);
            out.push_str("&lt;");
            last = at + 1;
        }
    }

    if last == 0 {
        return Cow::Borrowed(raw);
    }
    out.push_str(&raw[last..]);
    Cow::Owned(out)
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &handle.data
        && name.local.as_ref() == tag
    {
        return Some(handle.clone());
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn write_children(handle: &Handle, out: &mut Sanitized) {
    for child in handle.children.borrow().iter() {
        write_node(child, out);
    }
}

fn write_node(handle: &Handle, out: &mut Sanitized) {
    match &handle.data {
        NodeData::Text { contents } => out.html.push_str(&escape_html(&contents.borrow())),
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            let attrs = attrs.borrow();

            if DROPPED.contains(&tag) || (tag == "input" && !is_checkbox(&attrs)) {
                out.removed.insert(tag.to_string());
                return;
            }
            if !ALLOWED.contains(&tag) {
                out.removed.insert(tag.to_string());
                write_children(handle, out);
                return;
            }

            out.html.push('<');
            out.html.push_str(tag);
            for attr in attrs.iter() {
                let key = attr.name.local.as_ref();
                if let Some(value) = allowed_value(tag, key, &attr.value) {
                    out.html.push(' ');
                    out.html.push_str(key);
                    out.html.push_str("=\"");
                    out.html.push_str(&escape_attr(&value));
                    out.html.push('"');
                }
            }
            out.html.push('>');

            if VOID.contains(&tag) {
                return;
            }
            write_children(handle, out);
            out.html.push_str("</");
            out.html.push_str(tag);
            out.html.push('>');
        }
        // Comments, doctypes and processing instructions.
        _ => {}
    }
}

fn is_checkbox(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.name.local.as_ref() == "type" && attr.value.eq_ignore_ascii_case("checkbox")
    })
}

/// The value to keep for an attribute, or `None` to drop it.
fn allowed_value(tag: &str, key: &str, value: &str) -> Option<String> {
    if GLOBAL_ATTRS.contains(&key) || key.starts_with("data-") || key.starts_with("aria-") {
        return Some(value.to_string());
    }
    let keep = match (tag, key) {
        (_, "style") => return safe_style(value),
        ("a", "href") => safe_url(value, false),
        ("a", "target") => value == "_blank",
        ("a", "rel") => true,
        ("img", "src") => safe_url(value, true),
        ("img", "alt" | "width" | "height" | "loading") => true,
        ("button", "type") => value == "button",
        ("button", "popovertarget" | "popovertargetaction" | "disabled") => true,
        ("input", "type" | "checked" | "disabled") => true,
        ("td" | "th", "colspan" | "rowspan" | "align") => true,
        ("ol", "start") => true,
        ("details", "open") => true,
        ("time", "datetime") => true,
        _ => false,
    };
    keep.then(|| value.to_string())
}

/// Keep only simple declarations whose values cannot reference anything.
fn safe_style(style: &str) -> Option<String> {
    let declarations: Vec<String> = style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            let simple = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || " #.%-".contains(c));
            (STYLE_PROPERTIES.contains(&property.as_str()) && simple)
                .then(|| format!("{property}: {value}"))
        })
        .collect();
    (!declarations.is_empty()).then(|| declarations.join("; "))
}

/// Relative URLs and http(s)/mailto/tel; raster `data:` images for `img`.
fn safe_url(url: &str, allow_data_image: bool) -> bool {
    // Browsers ignore whitespace and control characters inside the scheme.
    let compact: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    let scheme = match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => return true,
        (Some(colon), _) => &compact[..colon],
        (None, _) => return true,
    };

    match scheme {
        "http" | "https" | "mailto" | "tel" => true,
        "data" if allow_data_image => ["png", "jpeg", "jpg", "gif", "webp"]
            .iter()
            .any(|kind| compact.starts_with(&format!("data:image/{kind}"))),
        _ => false,
    }
}
