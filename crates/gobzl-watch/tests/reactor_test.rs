//! Reactor behaviour with recording fakes for the invalidator and build tools.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gobzl_core::{ChangeEvent, ChangeKind, Invalidator, WorkspaceLayout};
use gobzl_watch::{BuildRunner, ChangeReactor, IgnoreRules};

const PREFIX: &str = "github.com/acme/proj";

#[derive(Default)]
struct RecordingInvalidator {
    paths: Mutex<Vec<String>>,
}

impl Invalidator for RecordingInvalidator {
    fn invalidate(&self, vpath: &str) {
        self.paths.lock().unwrap().push(vpath.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Build(PathBuf, String),
    Install(String),
}

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<Call>>,
    fail: bool,
}

impl BuildRunner for RecordingRunner {
    fn run_build(&self, workspace: &Path, target: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Build(workspace.to_path_buf(), target.to_string()));
        if self.fail {
            anyhow::bail!("bazel exploded");
        }
        Ok(())
    }

    fn run_install(&self, package: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Install(package.to_string()));
        if self.fail {
            anyhow::bail!("go exploded");
        }
        Ok(())
    }
}

type Reactor = ChangeReactor<Arc<RecordingInvalidator>, Arc<RecordingRunner>>;

fn reactor_with(runner: RecordingRunner, ignores: &[&str]) -> (Reactor, Arc<RecordingInvalidator>, Arc<RecordingRunner>) {
    let layout = Arc::new(WorkspaceLayout::new(
        "/ws",
        PREFIX,
        vec!["vendorA".into(), "third_party/go".into()],
        "bazel-genfiles",
    ));
    let inv = Arc::new(RecordingInvalidator::default());
    let runner = Arc::new(runner);
    let reactor = ChangeReactor::new(
        layout,
        IgnoreRules::compile(ignores).unwrap(),
        inv.clone(),
        runner.clone(),
    );
    (reactor, inv, runner)
}

fn reactor() -> (Reactor, Arc<RecordingInvalidator>, Arc<RecordingRunner>) {
    reactor_with(RecordingRunner::default(), &[])
}

fn event(rel: &str) -> ChangeEvent {
    ChangeEvent::under_root(Path::new("/ws"), &Path::new("/ws").join(rel), ChangeKind::Create).unwrap()
}

fn calls(runner: &RecordingRunner) -> Vec<Call> {
    runner.calls.lock().unwrap().clone()
}

#[test]
fn dotfile_change_does_nothing() {
    let (r, inv, runner) = reactor();
    assert!(r.handle(&event(".tmp/file")).is_none());
    assert!(inv.paths.lock().unwrap().is_empty());
    assert!(calls(&runner).is_empty());
}

#[test]
fn vcs_metadata_change_does_nothing() {
    let (r, inv, runner) = reactor();
    assert!(r.handle(&event("vendorA/dep/.git/index.go")).is_none());
    assert!(inv.paths.lock().unwrap().is_empty());
    assert!(calls(&runner).is_empty());
}

#[test]
fn configured_pattern_suppresses() {
    let (r, inv, runner) = reactor_with(RecordingRunner::default(), &["^bazel-"]);
    assert!(r.handle(&event("bazel-out/x/y.go")).is_none());
    assert!(inv.paths.lock().unwrap().is_empty());
    assert!(calls(&runner).is_empty());
}

#[test]
fn vendor_go_file_installs_unqualified_package() {
    let (r, inv, runner) = reactor();
    let reaction = r.handle(&event("vendorA/pkg/file.go")).unwrap();

    assert_eq!(calls(&runner), vec![Call::Install("pkg".into())]);
    assert_eq!(reaction.install_package.as_deref(), Some("pkg"));
    assert_eq!(reaction.build_target, None);
    assert_eq!(
        *inv.paths.lock().unwrap(),
        vec![
            "pkg/file.go".to_string(),
            format!("{PREFIX}/vendorA/pkg/file.go"),
        ]
    );
}

#[test]
fn nested_vendor_dir_is_matched() {
    let (r, _inv, runner) = reactor();
    r.handle(&event("third_party/go/golang.org/x/net/http.go")).unwrap();
    assert_eq!(calls(&runner), vec![Call::Install("golang.org/x/net".into())]);
}

#[test]
fn first_party_proto_builds_and_installs_prefixed_package() {
    let (r, inv, runner) = reactor();
    let reaction = r.handle(&event("pkg/file.proto")).unwrap();

    assert_eq!(
        calls(&runner),
        vec![
            Call::Build(PathBuf::from("/ws"), "pkg:*".into()),
            Call::Install(format!("{PREFIX}/pkg")),
        ]
    );
    assert_eq!(reaction.build_target.as_deref(), Some("pkg:*"));
    assert_eq!(*inv.paths.lock().unwrap(), vec![format!("{PREFIX}/pkg/file.proto")]);
    assert!(reaction.is_ok());
}

#[test]
fn first_party_go_file_installs_only() {
    let (r, _inv, runner) = reactor();
    r.handle(&event("cmd/server/main.go")).unwrap();
    assert_eq!(calls(&runner), vec![Call::Install(format!("{PREFIX}/cmd/server"))]);
}

#[test]
fn other_files_only_invalidate() {
    let (r, inv, runner) = reactor();
    let reaction = r.handle(&event("docs/README.md")).unwrap();
    assert!(calls(&runner).is_empty());
    assert_eq!(reaction.invalidated, vec![format!("{PREFIX}/docs/README.md")]);
    assert_eq!(inv.paths.lock().unwrap().len(), 1);
}

#[test]
fn vendor_root_file_has_no_package() {
    let (r, _inv, runner) = reactor();
    let reaction = r.handle(&event("vendorA/doc.go")).unwrap();
    assert!(calls(&runner).is_empty());
    assert_eq!(reaction.install_package, None);
}

#[test]
fn repeated_events_react_every_time() {
    let (r, inv, runner) = reactor();
    for _ in 0..3 {
        r.handle(&event("pkg/file.proto")).unwrap();
    }
    assert_eq!(calls(&runner).len(), 6);
    assert_eq!(inv.paths.lock().unwrap().len(), 3);
}

#[test]
fn tool_failures_are_recorded_not_propagated() {
    let failing = RecordingRunner {
        fail: true,
        ..RecordingRunner::default()
    };
    let (r, inv, runner) = reactor_with(failing, &[]);

    let reaction = r.handle(&event("pkg/file.proto")).unwrap();
    assert_eq!(reaction.failures.len(), 2);
    assert!(reaction.failures[0].contains("bazel exploded"));
    assert_eq!(calls(&runner).len(), 2);
    assert_eq!(inv.paths.lock().unwrap().len(), 1);

    // The next event is still processed.
    assert!(r.handle(&event("pkg/other.go")).is_some());
    assert_eq!(calls(&runner).len(), 3);
}

#[test]
fn custom_extensions() {
    let (r, _inv, runner) = reactor();
    let r = r.with_extensions(vec![".bzl".into()], vec![".s".into()]);
    r.handle(&event("pkg/defs.bzl")).unwrap();
    r.handle(&event("pkg/file.proto")).unwrap();
    assert_eq!(
        calls(&runner),
        vec![
            Call::Build(PathBuf::from("/ws"), "pkg:*".into()),
            Call::Install(format!("{PREFIX}/pkg")),
        ]
    );
}
