//! Changed-path suppression: dotfiles, VCS metadata and configured patterns.

use gobzl_core::{GobzlError, GobzlResult};
use regex::Regex;

/// Version-control metadata directories; anything at or below one is ignored.
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Ignore patterns compiled once at startup.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Regex>,
}

impl IgnoreRules {
    /// Compile every pattern; the first invalid one is an error.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> GobzlResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| GobzlError::Pattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<GobzlResult<Vec<_>>>()?;
        Ok(IgnoreRules { patterns })
    }

    /// True when a workspace-relative changed path must not cause any reaction.
    pub fn is_ignored(&self, rel: &str) -> bool {
        rel.starts_with('.')
            || is_vcs_metadata(rel)
            || self.patterns.iter().any(|re| re.is_match(rel))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// True when any segment of `rel` is a VCS metadata directory.
pub fn is_vcs_metadata(rel: &str) -> bool {
    rel.split('/').any(|seg| VCS_DIRS.contains(&seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotfiles_are_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored(".tmp/file"));
        assert!(rules.is_ignored(".bazelrc"));
        assert!(!rules.is_ignored("pkg/a.go"));
    }

    #[test]
    fn vcs_metadata_at_any_depth() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored("vendor/x/.git"));
        assert!(rules.is_ignored("vendor/x/.git/HEAD"));
        assert!(rules.is_ignored("third_party/.hg/store"));
        assert!(!rules.is_ignored("pkg/.gitignore"));
        assert!(!rules.is_ignored("pkg/git/a.go"));
    }

    #[test]
    fn configured_patterns() {
        let rules = IgnoreRules::compile(&["^bazel-", r"\.swp$"]).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.is_ignored("bazel-out/k8/bin/x"));
        assert!(rules.is_ignored("pkg/.a.go.swp"));
        assert!(rules.is_ignored("pkg/a.go.swp"));
        assert!(!rules.is_ignored("pkg/bazel-ish.go"));
    }

    #[test]
    fn invalid_pattern_is_error() {
        let err = IgnoreRules::compile(&["(unclosed"]).unwrap_err();
        match err {
            GobzlError::Pattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected Pattern error, got {other:?}"),
        }
    }
}
