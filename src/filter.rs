//! Checkout filter pipeline - driver registry and per-read options.
//!
//! Filters transform content between its stored form and its working-tree
//! form (the clean/smudge pair). Drivers are selected per read by matching
//! the caller's hint path against registered patterns; the store itself
//! never interprets content.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{Error, Result};

/// Direction a filter pipeline is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDirection {
    /// Store to working tree (checkout); drivers smudge.
    ToWorktree,
    /// Working tree to store; drivers clean.
    ToOdb,
}

/// Options controlling a filtered content read.
///
/// Carries the hint path used to select drivers and the pipeline
/// direction. The hint path names where the content would be checked out;
/// it does not have to exist on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    hint_path: String,
    direction: FilterDirection,
}

impl FilterOptions {
    /// Options for checking content out at the given path.
    ///
    /// Defaults to [`FilterDirection::ToWorktree`].
    pub fn new(hint_path: impl Into<String>) -> Self {
        FilterOptions {
            hint_path: hint_path.into(),
            direction: FilterDirection::ToWorktree,
        }
    }

    /// Select the pipeline direction.
    pub fn with_direction(mut self, direction: FilterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// The path used to select filter drivers.
    pub fn hint_path(&self) -> &str {
        &self.hint_path
    }

    /// The pipeline direction.
    pub fn direction(&self) -> FilterDirection {
        self.direction
    }
}

/// A content-transforming filter driver.
///
/// Drivers are buffer-based; failures are reported as plain messages and
/// wrapped with the hint path by the registry.
pub trait FilterDriver: Send + Sync {
    /// Transform working-tree content into its stored form.
    fn to_odb(&self, content: &[u8]) -> std::result::Result<Vec<u8>, String>;

    /// Transform stored content into its working-tree form.
    fn to_worktree(&self, content: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

struct FilterRule {
    pattern: String,
    driver: Arc<dyn FilterDriver>,
}

/// Ordered registry mapping path patterns to filter drivers.
///
/// A read may match several rules. On the way into the store the matching
/// drivers run in registration order; on the way out they unwind in
/// reverse, so a clean/smudge pair composed with others round-trips.
#[derive(Default)]
pub struct FilterRegistry {
    rules: Vec<FilterRule>,
}

impl FilterRegistry {
    /// Create an empty registry. With no rules every read passes through
    /// unchanged.
    pub fn new() -> Self {
        FilterRegistry { rules: Vec::new() }
    }

    /// Register a driver for paths matching `pattern`.
    pub fn register(&mut self, pattern: impl Into<String>, driver: Arc<dyn FilterDriver>) {
        self.rules.push(FilterRule {
            pattern: pattern.into(),
            driver,
        });
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the pipeline selected by `options` over `content`.
    pub fn apply(&self, options: &FilterOptions, content: Vec<u8>) -> Result<Vec<u8>> {
        let path = options.hint_path();
        let selected: Vec<&FilterRule> = self
            .rules
            .iter()
            .filter(|rule| pattern_matches(&rule.pattern, path))
            .collect();

        let mut out = content;
        match options.direction() {
            FilterDirection::ToOdb => {
                for rule in &selected {
                    out = rule.driver.to_odb(&out).map_err(|message| Error::Filter {
                        path: path.to_string(),
                        message,
                    })?;
                }
            }
            FilterDirection::ToWorktree => {
                for rule in selected.iter().rev() {
                    out = rule
                        .driver
                        .to_worktree(&out)
                        .map_err(|message| Error::Filter {
                            path: path.to_string(),
                            message,
                        })?;
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let patterns: Vec<&str> = self.rules.iter().map(|r| r.pattern.as_str()).collect();
        f.debug_struct("FilterRegistry")
            .field("patterns", &patterns)
            .finish()
    }
}

/// Match a gitattributes-style pattern against a slash-separated path.
///
/// Supported forms: literal paths, `*.ext` (matches in any directory),
/// `**/name` (root or any subdirectory), and general `*` wildcards
/// anchored at both ends.
pub(crate) fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }

    // *.ext - the common case, matches the file name in any directory.
    if let Some(suffix) = pattern.strip_prefix('*') {
        if suffix.starts_with('.') && !suffix.contains('*') && !suffix.contains('/') {
            return path.ends_with(suffix);
        }
    }

    // **/name - match at the root or under any directory.
    if let Some(name) = pattern.strip_prefix("**/") {
        return path == name
            || (path.len() > name.len()
                && path.ends_with(name)
                && path.as_bytes()[path.len() - name.len() - 1] == b'/');
    }

    if pattern.contains('*') {
        return wildcard_matches(pattern, path);
    }

    false
}

/// General `*` matching: literals between wildcards must appear in order,
/// with the first anchored at the start and the last at the end.
fn wildcard_matches(pattern: &str, path: &str) -> bool {
    let pieces: Vec<&str> = pattern.split('*').collect();

    let first = pieces[0];
    let last = pieces[pieces.len() - 1];
    if !path.starts_with(first) || !path.ends_with(last) {
        return false;
    }
    if path.len() < first.len() + last.len() {
        return false;
    }

    let mut rest = &path[first.len()..path.len() - last.len()];
    for piece in &pieces[1..pieces.len() - 1] {
        if piece.is_empty() {
            continue;
        }
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    true
}
