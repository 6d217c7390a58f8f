//! Render configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use refmark_read_markdown::MarkdownOptions;
use refmark_write_html::HtmlOptions;
use serde::Deserialize;

/// A config file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Options for the whole render pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Shown in place of empty content while an answer is pending.
    pub searching_placeholder: String,
    pub markdown: MarkdownOptions,
    pub html: HtmlOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            searching_placeholder: "Searching...".to_string(),
            markdown: MarkdownOptions::default(),
            html: HtmlOptions::default(),
        }
    }
}

impl RenderOptions {
    /// Parse options from TOML; missing keys keep their defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let options = RenderOptions::from_toml(
            r#"
searching_placeholder = "Looking..."

[markdown]
tables = false

[html]
pixels_per_inch = 72.0
"#,
        )
        .unwrap();
        assert_eq!(options.searching_placeholder, "Looking...");
        assert!(!options.markdown.tables);
        assert!(options.markdown.math);
        assert_eq!(options.html.pixels_per_inch, 72.0);
        assert_eq!(options.html.highlight_theme, "InspiredGitHub");
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(RenderOptions::from_toml("").unwrap(), RenderOptions::default());
    }

    #[test]
    fn test_invalid_config() {
        let err = RenderOptions::from_toml("markdown = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_missing_file() {
        let err = RenderOptions::load(Path::new("/nonexistent/refmark.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
