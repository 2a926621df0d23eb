//! Daemon lifecycle: layout, watcher wiring, mount

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gobzl_core::config::GobzlConfig;
use gobzl_core::WorkspaceLayout;
use gobzl_fuse::{InvalidationSet, MountConfig, OverlayFs, PathMapper};
use gobzl_watch::{ChangeReactor, CommandRunner, IgnoreRules};
use tracing::info;

use crate::dirs::{expand_tilde, GopathDirs};
use crate::hooks::WatchHooks;

pub async fn run(config: GobzlConfig, workspace: PathBuf) -> Result<()> {
    let root = workspace
        .canonicalize()
        .with_context(|| format!("resolving workspace {}", workspace.display()))?;

    let dirs = GopathDirs::new(expand_tilde(&config.gopath.dir));
    dirs.check_outside(&root)?;
    dirs.create()?;

    let rules = IgnoreRules::compile(&config.ignores)?;
    let layout = Arc::new(WorkspaceLayout::from_config(&root, &config));

    let attr_ttl = Duration::from_secs(config.fuse.attr_ttl_secs);
    let invalidations = Arc::new(InvalidationSet::new(attr_ttl.max(Duration::from_secs(1))));

    let runner = CommandRunner::new(&config.build, dirs.root.clone());
    let reactor = ChangeReactor::new(layout.clone(), rules, invalidations.clone(), runner)
        .with_extensions(
            config.build.build_file_exts.clone(),
            config.build.source_exts.clone(),
        );
    let hooks = WatchHooks::new(root.clone(), config.watch.channel_capacity, Arc::new(reactor));
    let fs = Arc::new(OverlayFs::with_hooks(PathMapper::new(layout.clone()), hooks));

    info!(
        workspace = %root.display(),
        prefix = %layout.prefix,
        vendors = ?layout.vendors,
        gopath = %dirs.root.display(),
        "overlay ready; export GOPATH={}",
        dirs.root.display()
    );

    gobzl_fuse::mount(
        fs,
        invalidations,
        MountConfig {
            mountpoint: dirs.src.clone(),
            attr_ttl,
            allow_other: config.fuse.allow_other,
        },
    )
    .await
    .with_context(|| format!("mounting {}", dirs.src.display()))?;

    info!("daemon stopped");
    Ok(())
}
