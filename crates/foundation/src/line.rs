//! Script line records
//!
//! Scripts are line-oriented. Splitting keeps the original line number
//! of every surviving line so diagnostics can point back at the source.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a line came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptLocation {
    pub source: String,
    /// 1-based line number; 0 marks a location outside any script
    pub line: u32,
}

impl ScriptLocation {
    pub fn new(source: impl Into<String>, line: u32) -> Self {
        ScriptLocation {
            source: source.into(),
            line,
        }
    }

    /// Location for names registered from code rather than a script
    pub fn internal(source: impl Into<String>) -> Self {
        ScriptLocation {
            source: source.into(),
            line: 0,
        }
    }
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}:{}", self.source, self.line)
        }
    }
}

/// One meaningful script line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub text: String,
    pub location: ScriptLocation,
}

impl ScriptLine {
    pub fn new(text: impl Into<String>, location: ScriptLocation) -> Self {
        ScriptLine {
            text: text.into(),
            location,
        }
    }
}

/// Split raw script text into meaningful lines.
///
/// Strips `#` comments (a `#` inside double quotes is literal), trims
/// surrounding whitespace and drops lines that end up empty.
pub fn script_lines(source: &str, text: &str) -> Vec<ScriptLine> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let stripped = strip_comment(raw);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            continue;
        }
        lines.push(ScriptLine::new(
            trimmed,
            ScriptLocation::new(source, index as u32 + 1),
        ));
    }
    lines
}

fn strip_comment(raw: &str) -> &str {
    let mut in_quotes = false;
    for (offset, ch) in raw.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &raw[..offset],
            _ => {}
        }
    }
    raw
}
