//! Fidelity tracking - know what was degraded while rendering.
//!
//! Pipeline stages never fail. When input is malformed they produce a
//! degraded-but-valid result and may record a warning here instead.

/// Result of a pipeline stage, including fidelity warnings.
#[derive(Debug)]
pub struct ConversionResult<T> {
    /// The stage output.
    pub value: T,
    /// Warnings about information that was dropped or simplified.
    pub warnings: Vec<FidelityWarning>,
}

impl<T> ConversionResult<T> {
    /// Create a result with no warnings.
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Create a result with warnings.
    pub fn with_warnings(value: T, warnings: Vec<FidelityWarning>) -> Self {
        Self { value, warnings }
    }

    /// Add a warning.
    pub fn warn(mut self, warning: FidelityWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if there are any major or error-level warnings.
    pub fn has_errors(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w.severity, Severity::Major | Severity::Error))
    }

    /// Transform the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ConversionResult<U> {
        ConversionResult {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

/// A warning about fidelity loss.
#[derive(Debug, Clone)]
pub struct FidelityWarning {
    /// How severe is this warning?
    pub severity: Severity,
    /// What kind of issue?
    pub kind: WarningKind,
    /// Human-readable message.
    pub message: String,
}

impl FidelityWarning {
    /// Create a new warning.
    pub fn new(severity: Severity, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
        }
    }
}

/// Severity of a fidelity warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Information only, nothing visible lost.
    Info,
    /// Minor formatting may differ.
    Minor,
    /// Significant information lost.
    Major,
    /// Output may be incorrect.
    Error,
}

/// Kind of fidelity issue.
#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    /// Node kind has no dedicated rendering, children emitted instead.
    UnsupportedNode(String),
    /// Markup was removed by the HTML sanitizer.
    Sanitized(String),
    /// A citation marker could not be bound to a chunk.
    UnresolvedCitation(String),
    /// A size annotation was present but unusable.
    MalformedSize(String),
    /// Feature lost (e.g. highlighting fell back to plain code).
    FeatureLost(String),
}
