//! Per-event reaction: filter, invalidate, trigger builds.
//!
//! ```text
//! vendor/x/y.go      → invalidate x/y.go, {prefix}/vendor/x/y.go
//!                      go install x
//! pkg/api.proto      → invalidate {prefix}/pkg/api.proto
//!                      bazel build //pkg:*
//!                      go install {prefix}/pkg
//! .cache/anything    → (dropped)
//! ```
//!
//! Stateless between events: the same event twice reacts twice.

use std::sync::Arc;

use gobzl_core::config::BuildConfig;
use gobzl_core::{ChangeEvent, Invalidator, WorkspaceLayout};
use tracing::{debug, trace, warn};

use crate::exec::BuildRunner;
use crate::ignore::IgnoreRules;

/// What one event caused. Failures of the external tools land in `failures`
/// instead of being propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    pub invalidated: Vec<String>,
    pub build_target: Option<String>,
    pub install_package: Option<String>,
    pub failures: Vec<String>,
}

impl Reaction {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ChangeReactor<I: Invalidator, R: BuildRunner> {
    layout: Arc<WorkspaceLayout>,
    rules: IgnoreRules,
    build_file_exts: Vec<String>,
    source_exts: Vec<String>,
    invalidator: I,
    runner: R,
}

impl<I: Invalidator, R: BuildRunner> ChangeReactor<I, R> {
    /// Reactor with the default trigger extensions (`.proto` builds, `.go` installs).
    pub fn new(layout: Arc<WorkspaceLayout>, rules: IgnoreRules, invalidator: I, runner: R) -> Self {
        let defaults = BuildConfig::default();
        ChangeReactor {
            layout,
            rules,
            build_file_exts: defaults.build_file_exts,
            source_exts: defaults.source_exts,
            invalidator,
            runner,
        }
    }

    pub fn with_extensions(mut self, build_file_exts: Vec<String>, source_exts: Vec<String>) -> Self {
        self.build_file_exts = build_file_exts;
        self.source_exts = source_exts;
        self
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn invalidator(&self) -> &I {
        &self.invalidator
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// React to one event. `None` means the path was ignored.
    pub fn handle(&self, event: &ChangeEvent) -> Option<Reaction> {
        let rel = event.rel_path.as_str();
        if self.rules.is_ignored(rel) {
            trace!(path = rel, "ignored");
            return None;
        }
        debug!(path = rel, kind = ?event.kind, "change");

        let vendor_rest = self.layout.split_vendor(rel).map(|(_, rest)| rest);
        let mut reaction = Reaction::default();

        if let Some(rest) = vendor_rest {
            self.invalidate(rest, &mut reaction);
        }
        self.invalidate(&self.layout.prefixed(rel), &mut reaction);

        let is_build_file = has_ext(rel, &self.build_file_exts);
        let is_source = has_ext(rel, &self.source_exts);

        if is_build_file {
            let target = format!("{}:*", parent_dir(rel));
            if let Err(e) = self.runner.run_build(&self.layout.root, &target) {
                warn!(target = %target, "build failed: {e:#}");
                reaction.failures.push(format!("build {target}: {e:#}"));
            }
            reaction.build_target = Some(target);
        }

        if is_build_file || is_source {
            // Vendored packages keep their vendor-relative import path.
            let package = match vendor_rest {
                Some(rest) => parent_dir(rest).to_string(),
                None => self.layout.prefixed(parent_dir(rel)),
            };
            if package.is_empty() {
                debug!(path = rel, "no package to install");
            } else {
                if let Err(e) = self.runner.run_install(&package) {
                    warn!(package = %package, "install failed: {e:#}");
                    reaction.failures.push(format!("install {package}: {e:#}"));
                }
                reaction.install_package = Some(package);
            }
        }

        Some(reaction)
    }

    fn invalidate(&self, vpath: &str, reaction: &mut Reaction) {
        self.invalidator.invalidate(vpath);
        reaction.invalidated.push(vpath.to_string());
    }
}

fn has_ext(path: &str, exts: &[String]) -> bool {
    exts.iter().any(|ext| path.ends_with(ext.as_str()))
}

/// `a/b/c.go` → `a/b`; `c.go` → ``.
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
