//! Output extraction rules and sample parsing.
//!
//! A rule is rendered into the remote pipeline (`grep` + `awk`) so only one
//! numeric token crosses the exec boundary, and it can be applied locally to
//! captured tool output with the same semantics.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("tool produced no output")]
    Empty,

    #[error("expected a single number, got {raw:?}")]
    NotANumber { raw: String },

    #[error("sample is not finite: {raw:?}")]
    NotFinite { raw: String },
}

/// Select whitespace field `field` (1-based) of every line containing
/// `pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    pub pattern: &'static str,
    pub field: usize,
}

impl ExtractionRule {
    pub const fn new(pattern: &'static str, field: usize) -> Self {
        Self { pattern, field }
    }

    /// Shell suffix appended to the tool invocation.
    pub fn to_pipeline(&self) -> String {
        format!(
            " | grep '{}' | awk '{{print ${}}}'",
            self.pattern, self.field
        )
    }

    /// Apply the rule to raw output. Every matching line yields its field
    /// (empty when the line is too short), one per line, like `awk` would.
    pub fn apply(&self, output: &str) -> String {
        output
            .lines()
            .filter(|line| line.contains(self.pattern))
            .map(|line| {
                self.field
                    .checked_sub(1)
                    .and_then(|idx| line.split_whitespace().nth(idx))
                    .unwrap_or("")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse filtered tool output into one measurement sample.
pub fn parse_sample(stdout: &str) -> Result<f64, ParseError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let value: f64 = trimmed.parse().map_err(|_| ParseError::NotANumber {
        raw: trimmed.to_string(),
    })?;
    if !value.is_finite() {
        return Err(ParseError::NotFinite {
            raw: trimmed.to_string(),
        });
    }
    Ok(value)
}
