use serde::Deserialize;

/// How the inputs of a bundle task are ordered before concatenation.
///
/// - `Path`: selector order (sorted by path).
/// - `Requires`: files may declare `// requires: other.js` comments and are
///   placed after everything they require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcatOrder {
    #[default]
    Path,
    Requires,
}

/// Staleness granularity of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Every input produces its own artifact and is rebuilt on its own.
    PerFile,
    /// All inputs are concatenated into one artifact; any stale input
    /// rebuilds the whole bundle.
    Bundle,
}
