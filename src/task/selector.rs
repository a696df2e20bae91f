// src/task/selector.rs

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// A source file matched by a [`SourceSelector`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Absolute path of the source.
    pub path: PathBuf,
    /// Path relative to the selector's base directory; artifacts are written
    /// at the same relative path under the destination.
    pub rel: PathBuf,
}

/// Result of walking a selector's base directory.
#[derive(Debug, Clone, Default)]
pub struct SelectorWalk {
    /// Matched files, sorted by path.
    pub files: Vec<SourceFile>,
    /// Directories visited under the base, sorted.
    pub dirs: Vec<PathBuf>,
}

/// Glob pattern plus root directory.
///
/// Patterns are evaluated against paths relative to `root`, with `/` as the
/// separator; `*` never crosses a directory boundary, `**` does. The base
/// directory defaults to the glob-free prefix of the pattern, so
/// `images/**/*.png` has base `images` and `images/icons/a.png` gets the
/// relative output path `icons/a.png`.
#[derive(Clone)]
pub struct SourceSelector {
    root: PathBuf,
    pattern: String,
    base: PathBuf,
    include: GlobMatcher,
    excludes: Vec<String>,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSelector")
            .field("root", &self.root)
            .field("pattern", &self.pattern)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl SourceSelector {
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let pattern = pattern.into();
        let include = compile_glob(&pattern)?.compile_matcher();
        let base = root.join(literal_prefix(&pattern));
        Ok(Self {
            root,
            pattern,
            base,
            include,
            excludes: Vec::new(),
            exclude: None,
        })
    }

    /// Override the base directory (relative to root).
    pub fn with_base(mut self, base: impl AsRef<Path>) -> Self {
        self.base = self.root.join(base);
        self
    }

    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns).with_context(|| {
                format!("building exclude globset for selector {}", self.pattern)
            })?)
        };
        self.excludes = patterns.to_vec();
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Whether a path relative to root (forward slashes) is selected.
    pub fn matches(&self, rel_to_root: &str) -> bool {
        if !self.include.is_match(rel_to_root) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_to_root),
            None => true,
        }
    }

    /// Resolve the selector to its matched files, sorted by path.
    ///
    /// A missing base directory resolves to an empty list.
    pub fn resolve(&self, fs: &dyn FileSystem) -> Result<Vec<SourceFile>> {
        Ok(self.walk(fs)?.files)
    }

    /// Like [`resolve`](Self::resolve), but also reports every directory
    /// the walk visited.
    ///
    /// Directories are visited once by canonical path, so a symlink loop
    /// under the base ends the walk instead of recursing forever.
    pub fn walk(&self, fs: &dyn FileSystem) -> Result<SelectorWalk> {
        let mut walk = SelectorWalk::default();
        if fs.is_file(&self.base) {
            self.push_if_selected(&self.base, &mut walk.files);
            return Ok(walk);
        }
        if !fs.is_dir(&self.base) {
            return Ok(walk);
        }

        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack = vec![self.base.clone()];
        while let Some(dir) = stack.pop() {
            let key = fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(key) {
                continue;
            }
            for path in fs.read_dir(&dir)? {
                if fs.is_dir(&path) {
                    stack.push(path);
                } else if fs.is_file(&path) {
                    self.push_if_selected(&path, &mut walk.files);
                }
            }
            walk.dirs.push(dir);
        }

        walk.files.sort();
        walk.dirs.sort();
        Ok(walk)
    }

    fn push_if_selected(&self, path: &Path, files: &mut Vec<SourceFile>) {
        let Ok(rel_root) = path.strip_prefix(&self.root) else {
            return;
        };
        if !self.matches(&to_slash(rel_root)) {
            return;
        }
        let rel = match path.strip_prefix(&self.base) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            // The selector names a single file: its base is the parent dir.
            _ => PathBuf::from(path.file_name().unwrap_or(path.as_os_str())),
        };
        files.push(SourceFile {
            path: path.to_path_buf(),
            rel,
        });
    }
}

pub(crate) fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_glob_component(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// The leading directory components of `pattern` that contain no glob
/// syntax. A fully literal pattern yields its parent directory.
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    let literal = components
        .iter()
        .take_while(|c| !is_glob_component(c))
        .count();

    let take = if literal == components.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };
    components[..take].iter().collect()
}

fn compile_glob(pattern: &str) -> Result<Glob> {
    let pattern = pattern.trim_start_matches("./");
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn literal_prefix_stops_at_first_glob() {
        assert_eq!(literal_prefix("library/_src/images/**/*"), PathBuf::from("library/_src/images"));
        assert_eq!(literal_prefix("./js/*.js"), PathBuf::from("js"));
        assert_eq!(literal_prefix("scss/style.scss"), PathBuf::from("scss"));
        assert_eq!(literal_prefix("*.md"), PathBuf::new());
    }

    #[test]
    fn resolves_sorted_matches_relative_to_base() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/images/b.png", "b");
        fs.add_file("/p/images/icons/a.png", "a");
        fs.add_file("/p/images/notes.txt", "n");
        fs.add_file("/p/other/c.png", "c");

        let sel = SourceSelector::new("/p", "images/**/*.png").unwrap();
        let files = sel.resolve(&fs).unwrap();
        let rels: Vec<_> = files.iter().map(|f| to_slash(&f.rel)).collect();
        assert_eq!(rels, vec!["b.png", "icons/a.png"]);
        assert_eq!(files[0].path, PathBuf::from("/p/images/b.png"));
    }

    #[test]
    fn single_file_selector_and_excludes() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/scss/style.scss", "");
        fs.add_file("/p/scss/_partial.scss", "");

        let sel = SourceSelector::new("/p", "scss/style.scss").unwrap();
        let files = sel.resolve(&fs).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel, PathBuf::from("style.scss"));

        let sel = SourceSelector::new("/p", "scss/*.scss")
            .unwrap()
            .with_excludes(&["scss/_*".to_string()])
            .unwrap();
        let files = sel.resolve(&fs).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn star_does_not_cross_directories() {
        let sel = SourceSelector::new("/p", "js/*.js").unwrap();
        assert!(sel.matches("js/app.js"));
        assert!(!sel.matches("js/vendor/lib.js"));
    }

    #[test]
    fn walk_reports_visited_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/js/a.js", "");
        fs.add_file("/p/js/lib/b.js", "");

        let walk = SourceSelector::new("/p", "js/**/*.js").unwrap().walk(&fs).unwrap();
        assert_eq!(walk.files.len(), 2);
        assert_eq!(walk.dirs, vec![PathBuf::from("/p/js"), PathBuf::from("/p/js/lib")]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_loop_is_walked_once() {
        use crate::fs::RealFileSystem;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("js/lib")).unwrap();
        std::fs::write(root.join("js/lib/a.js"), "a();").unwrap();
        std::os::unix::fs::symlink(root.join("js"), root.join("js/lib/loop")).unwrap();

        let sel = SourceSelector::new(root, "js/**/*.js").unwrap();
        let files = sel.resolve(&RealFileSystem).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel, PathBuf::from("lib/a.js"));
    }

    #[test]
    fn missing_base_resolves_to_nothing() {
        let fs = MockFileSystem::new();
        let sel = SourceSelector::new("/p", "nowhere/**/*").unwrap();
        assert!(sel.resolve(&fs).unwrap().is_empty());
    }
}
