//! Code-block rendering with syntect.

use std::sync::LazyLock;

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const FALLBACK_THEME: &str = "InspiredGitHub";

/// The language named by a fence info string or `language-xxx` class:
/// its leading run of word characters.
pub fn language_hint(info: &str) -> Option<&str> {
    let info = info.trim();
    let info = info.strip_prefix("language-").unwrap_or(info);
    let end = info
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(info.len());
    (end > 0).then(|| &info[..end])
}

/// Highlight `code` as `language`, or `None` if highlighting failed.
///
/// Exactly one trailing newline is trimmed first. Languages syntect does
/// not know are highlighted as plain text.
pub fn highlight(code: &str, language: &str, theme: &str) -> Option<String> {
    let code = code.strip_suffix('\n').unwrap_or(code);
    let syntax = find_syntax(language).unwrap_or_else(|| {
        log::debug!("No syntax for {language:?}, highlighting as plain text");
        SYNTAX_SET.find_syntax_plain_text()
    });
    let theme = find_theme(theme)?;

    match highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme) {
        Ok(html) => Some(html),
        Err(e) => {
            log::debug!("Highlighting {language:?} failed: {e}");
            None
        }
    }
}

/// Names of the bundled highlight themes, sorted.
pub fn theme_names() -> Vec<&'static str> {
    THEME_SET.themes.keys().map(String::as_str).collect()
}

/// Look a language up by name, token, then extension, ignoring case.
fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let lower = language.to_lowercase();
    SYNTAX_SET
        .find_syntax_by_token(language)
        .or_else(|| SYNTAX_SET.find_syntax_by_name(language))
        .or_else(|| SYNTAX_SET.find_syntax_by_token(&lower))
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(&lower))
}

fn find_theme(name: &str) -> Option<&'static Theme> {
    THEME_SET
        .themes
        .get(name)
        .or_else(|| {
            log::debug!("Unknown highlight theme {name:?}, using {FALLBACK_THEME}");
            THEME_SET.themes.get(FALLBACK_THEME)
        })
        .or_else(|| THEME_SET.themes.values().next())
}
