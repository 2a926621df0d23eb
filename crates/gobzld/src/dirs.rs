//! The synthetic GOPATH: `bin/`, `pkg/` and the `src/` mountpoint.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct GopathDirs {
    pub root: PathBuf,
    pub bin: PathBuf,
    pub pkg: PathBuf,
    pub src: PathBuf,
}

impl GopathDirs {
    pub fn new(root: PathBuf) -> Self {
        GopathDirs {
            bin: root.join("bin"),
            pkg: root.join("pkg"),
            src: root.join("src"),
            root,
        }
    }

    /// Create all directories (idempotent).
    pub fn create(&self) -> Result<()> {
        for dir in [&self.bin, &self.pkg, &self.src] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    /// The mountpoint must not sit inside the watched workspace, or every
    /// lookup through the mount would show up as a workspace change.
    pub fn check_outside(&self, workspace: &Path) -> Result<()> {
        if self.src.starts_with(workspace) {
            anyhow::bail!(
                "GOPATH {} is inside the workspace {}",
                self.root.display(),
                workspace.display()
            );
        }
        Ok(())
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/.cache/gobzl/gopath"));
        assert!(!expanded.to_string_lossy().starts_with("~/"));
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn test_create_layout() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = GopathDirs::new(dir.path().join("gopath"));
        dirs.create().unwrap();
        dirs.create().unwrap();
        assert!(dirs.bin.is_dir());
        assert!(dirs.pkg.is_dir());
        assert!(dirs.src.is_dir());
    }

    #[test]
    fn test_gopath_inside_workspace_rejected() {
        let dirs = GopathDirs::new(PathBuf::from("/ws/out/gopath"));
        assert!(dirs.check_outside(Path::new("/ws")).is_err());
        assert!(dirs.check_outside(Path::new("/other")).is_ok());
    }
}
