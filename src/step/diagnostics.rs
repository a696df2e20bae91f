// src/step/diagnostics.rs

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A `file:line:col: message` line emitted by a linter or compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<file>[^\s:][^:]*?):(?P<line>\d+):(?P<col>\d+):?\s*(?P<msg>.*)$")
        .unwrap_or_else(|e| panic!("invalid diagnostic regex: {e}"))
});

/// Parse every line of `output` that looks like `file:line:col: message`.
///
/// Lines that do not match are ignored.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Diagnostic> {
    let caps = LOCATION.captures(line)?;
    Some(Diagnostic {
        file: caps["file"].trim().to_string(),
        line: caps["line"].parse().ok()?,
        column: caps["col"].parse().ok()?,
        message: caps["msg"].trim().to_string(),
    })
}
