//! External build tooling: `bazel build` and `go install`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use gobzl_core::config::BuildConfig;
use tracing::{debug, info};

/// Fire-and-forget build capability injected into the change reactor.
///
/// Both calls block until the tool exits; an `Err` is reported by the caller
/// and never stops event processing.
pub trait BuildRunner: Send + Sync {
    /// Build `target` (e.g. `pkg:*`) inside `workspace`.
    fn run_build(&self, workspace: &Path, target: &str) -> Result<()>;

    /// Install the Go package `package` (e.g. `github.com/acme/proj/pkg`).
    fn run_install(&self, package: &str) -> Result<()>;
}

impl<T: BuildRunner + ?Sized> BuildRunner for Arc<T> {
    fn run_build(&self, workspace: &Path, target: &str) -> Result<()> {
        (**self).run_build(workspace, target)
    }

    fn run_install(&self, package: &str) -> Result<()> {
        (**self).run_install(package)
    }
}

/// Runs the real tools as child processes.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    bazel_bin: String,
    go_bin: String,
    install_args: Vec<String>,
    gopath: PathBuf,
}

impl CommandRunner {
    pub fn new(config: &BuildConfig, gopath: PathBuf) -> Self {
        CommandRunner {
            bazel_bin: config.bazel_bin.clone(),
            go_bin: config.go_bin.clone(),
            install_args: config.install_args.clone(),
            gopath,
        }
    }

    pub fn gopath(&self) -> &Path {
        &self.gopath
    }
}

impl BuildRunner for CommandRunner {
    fn run_build(&self, workspace: &Path, target: &str) -> Result<()> {
        let label = format!("//{target}");
        info!(target = %label, "running bazel build");

        let mut cmd = Command::new(&self.bazel_bin);
        cmd.args(["build", label.as_str()]).current_dir(workspace);
        run(cmd, &self.bazel_bin)
    }

    fn run_install(&self, package: &str) -> Result<()> {
        info!(package, "running go install");

        let mut cmd = Command::new(&self.go_bin);
        cmd.arg("install")
            .args(&self.install_args)
            .arg(package)
            .env("GOPATH", &self.gopath)
            .env("GO111MODULE", "off")
            .current_dir(self.gopath.join("src"));
        run(cmd, &self.go_bin)
    }
}

fn run(mut cmd: Command, program: &str) -> Result<()> {
    let output = cmd
        .output()
        .with_context(|| format!("running {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }
    debug!(program, "finished");
    Ok(())
}
