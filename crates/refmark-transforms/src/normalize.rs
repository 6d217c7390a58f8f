//! Marker normalization on raw message text.
//!
//! Runs before parsing. Reasoning traces become `<section class="think">`
//! blocks everywhere; outside code, LaTeX delimiters become `$`/`$$`,
//! legacy `##N$$` markers become `~~N==`, and every canonical marker is
//! escaped to `\~\~N==` so the strikethrough extension leaves it alone.
//! Every step is idempotent, so `normalize(normalize(s)) == normalize(s)`.

use std::borrow::Cow;

use regex::Regex;

use crate::patterns::{
    CITATION_MARKER, GUARDED_MARKER, LATEX_DISPLAY, LATEX_INLINE, LEGACY_MARKER, THINK_PAIR,
};

const THINK_OPEN: &str = "<think>";
const SECTION_OPEN: &str = "<section class=\"think\">";

/// Normalize raw message text into the canonical marker dialect.
pub fn normalize(text: &str) -> String {
    let text = think_sections(text);
    let mut out = String::with_capacity(text.len() + 16);
    for region in regions(&text) {
        match region {
            Region::Prose(prose) => out.push_str(&rewrite_prose(prose)),
            Region::Verbatim(code) => out.push_str(code),
        }
    }
    out
}

/// Undo the marker escape, for content the parser hands back verbatim.
pub fn unguard_markers(text: &str) -> Cow<'_, str> {
    GUARDED_MARKER.replace_all(text, "~~${1}==")
}

fn think_sections(text: &str) -> Cow<'_, str> {
    if !text.contains(THINK_OPEN) {
        return Cow::Borrowed(text);
    }
    // Blank lines on both sides of each tag keep the trace and the answer
    // after it out of the HTML blocks the tags start.
    let paired =
        THINK_PAIR.replace_all(text, "<section class=\"think\">\n\n${1}\n\n</section>\n\n");
    // Still streaming: an unclosed trace runs to the end of the text.
    match paired.find(THINK_OPEN) {
        Some(at) => {
            let mut open = String::with_capacity(paired.len() + 16);
            open.push_str(&paired[..at]);
            open.push_str(SECTION_OPEN);
            open.push_str("\n\n");
            open.push_str(&paired[at + THINK_OPEN.len()..].replace(THINK_OPEN, ""));
            Cow::Owned(open)
        }
        None => paired,
    }
}

fn rewrite_prose(prose: &str) -> Cow<'_, str> {
    let mut text = Cow::Borrowed(prose);

    // Nested delimiters can need more than one pass; each pass removes a pair.
    loop {
        let display = replace_in_place(&mut text, &LATEX_DISPLAY, "$$$$${1}$$$$");
        let inline = replace_in_place(&mut text, &LATEX_INLINE, "$$${1}$$");
        if !display && !inline {
            break;
        }
    }

    replace_in_place(&mut text, &LEGACY_MARKER, "~~${1}==");
    guard_markers(&mut text);
    text
}

/// Escape the tildes of every canonical marker the author did not escape.
fn guard_markers(text: &mut Cow<'_, str>) {
    let source: &str = &**text;
    let mut guarded = String::new();
    let mut last = 0;
    for marker in CITATION_MARKER.find_iter(source) {
        let backslashes = source[..marker.start()]
            .bytes()
            .rev()
            .take_while(|&b| b == b'\\')
            .count();
        if backslashes % 2 == 1 {
            continue;
        }
        guarded.push_str(&source[last..marker.start()]);
        guarded.push_str(r"\~\~");
        guarded.push_str(&marker.as_str()[2..]);
        last = marker.end();
    }
    if last > 0 {
        guarded.push_str(&source[last..]);
        *text = Cow::Owned(guarded);
    }
}

fn replace_in_place(text: &mut Cow<'_, str>, pattern: &Regex, replacement: &str) -> bool {
    let replaced = match pattern.replace_all(&**text, replacement) {
        Cow::Owned(replaced) => Some(replaced),
        Cow::Borrowed(_) => None,
    };
    match replaced {
        Some(replaced) => {
            *text = Cow::Owned(replaced);
            true
        }
        None => false,
    }
}

#[derive(Debug, PartialEq)]
enum Region<'a> {
    Prose(&'a str),
    Verbatim(&'a str),
}

/// Columns of indentation that make a line indented code.
const CODE_INDENT: usize = 4;

#[derive(Debug, Clone, Copy)]
enum CodeBlock {
    Fenced(Fence),
    /// Indented by at least this many columns.
    Indented(usize),
}

/// Split text into prose and code (fenced and indented blocks, inline spans).
fn regions(text: &str) -> Vec<Region<'_>> {
    let mut out = Vec::new();
    let mut prose_start = 0;
    let mut offset = 0;
    let mut block: Option<(usize, CodeBlock)> = None;
    // Indented code cannot interrupt a paragraph, and inside a list item
    // it is indented past the item's content column.
    let mut after_blank = true;
    let mut list_content: Option<usize> = None;

    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        let blank = line.trim().is_empty();

        match block {
            Some((start, CodeBlock::Fenced(open))) => {
                if open.is_closed_by(line) {
                    out.push(Region::Verbatim(&text[start..line_end]));
                    block = None;
                    prose_start = line_end;
                    after_blank = true;
                }
                offset = line_end;
                continue;
            }
            Some((_, CodeBlock::Indented(min))) if blank || indent_width(line) >= min => {
                after_blank = blank;
                offset = line_end;
                continue;
            }
            Some((start, CodeBlock::Indented(_))) => {
                out.push(Region::Verbatim(&text[start..offset]));
                block = None;
                prose_start = offset;
            }
            None => {}
        }

        let indent = indent_width(line);
        let code_indent = list_content.unwrap_or(0) + CODE_INDENT;
        if !blank && after_blank && indent >= code_indent {
            push_prose(&mut out, &text[prose_start..offset]);
            block = Some((offset, CodeBlock::Indented(code_indent)));
        } else if let Some(open) = Fence::open(line) {
            push_prose(&mut out, &text[prose_start..offset]);
            block = Some((offset, CodeBlock::Fenced(open)));
        } else if let Some(content) = list_item_content(line) {
            list_content = Some(content);
        } else if !blank && after_blank && list_content.is_some_and(|column| indent < column) {
            list_content = None;
        }
        after_blank = blank;
        offset = line_end;
    }

    match block {
        Some((start, _)) => out.push(Region::Verbatim(&text[start..])),
        None => push_prose(&mut out, &text[prose_start..]),
    }
    out
}

/// Leading whitespace in columns, with tab stops every four.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for b in line.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += CODE_INDENT - width % CODE_INDENT,
            _ => break,
        }
    }
    width
}

/// Content column of a list item: `-`, `+`, `*` or an ordinal like
/// `1.`/`1)`, then a space.
fn list_item_content(line: &str) -> Option<usize> {
    let lead = indent_width(line);
    let rest = line.trim_start_matches([' ', '\t']);
    let marker_len = match rest.as_bytes().first() {
        Some(b'-' | b'+' | b'*') => 1,
        Some(b) if b.is_ascii_digit() => {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            match rest.as_bytes().get(digits) {
                Some(b'.' | b')') if digits <= 9 => digits + 1,
                _ => return None,
            }
        }
        _ => return None,
    };
    let after = &rest.as_bytes()[marker_len..];
    let spaces = after.iter().take_while(|&&b| b == b' ').count();
    match after.get(spaces) {
        None | Some(b'\n' | b'\r' | b'\t') => Some(lead + marker_len + 1),
        _ if spaces == 0 => None,
        // Five or more spaces start indented code inside the item.
        _ if spaces > CODE_INDENT => Some(lead + marker_len + 1),
        _ => Some(lead + marker_len + spaces),
    }
}

/// Push a prose block, splitting out its inline code spans.
fn push_prose<'a>(out: &mut Vec<Region<'a>>, block: &'a str) {
    let bytes = block.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
            b'`' => {
                let run = backtick_run(&bytes[i..]);
                match closing_run(block, i + run, run) {
                    Some(end) => {
                        if start < i {
                            out.push(Region::Prose(&block[start..i]));
                        }
                        out.push(Region::Verbatim(&block[i..end]));
                        start = end;
                        i = end;
                    }
                    None => i += run,
                }
            }
            _ => i += 1,
        }
    }
    if start < block.len() {
        out.push(Region::Prose(&block[start..]));
    }
}

fn backtick_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| b == b'`').count()
}

/// End of the backtick run of exactly `len` that closes a span opened
/// before `from`, within the same paragraph.
fn closing_run(block: &str, from: usize, len: usize) -> Option<usize> {
    let limit = paragraph_end(block, from);
    let bytes = &block.as_bytes()[..limit];
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run = backtick_run(&bytes[i..]);
            if run == len {
                return Some(i + run);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

fn paragraph_end(block: &str, from: usize) -> usize {
    let mut offset = from;
    for (n, line) in block[from..].split_inclusive('\n').enumerate() {
        if n > 0 && line.trim().is_empty() {
            return offset;
        }
        offset += line.len();
    }
    block.len()
}

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
}

impl Fence {
    fn open(line: &str) -> Option<Self> {
        let rest = line.trim_start_matches([' ', '\t']);
        let marker = *rest.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = rest.bytes().take_while(|&b| b == marker).count();
        if len < 3 {
            return None;
        }
        if marker == b'`' && rest[len..].contains('`') {
            return None;
        }
        Some(Self { marker, len })
    }

    fn is_closed_by(&self, line: &str) -> bool {
        let rest = line.trim_start_matches([' ', '\t']);
        let run = rest.bytes().take_while(|&b| b == self.marker).count();
        run >= self.len && rest[run..].trim().is_empty()
    }
}
