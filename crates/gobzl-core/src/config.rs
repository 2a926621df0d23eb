use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GobzlError, GobzlResult};

/// Default config file name, looked up at the workspace root.
pub const CONFIG_FILE_NAME: &str = ".gobzl.toml";

/// Top-level configuration (loaded from `.gobzl.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GobzlConfig {
    /// Virtual Go package prefix for first-party code (e.g. `github.com/acme/proj`)
    pub go_pkg_prefix: String,
    /// Vendor directories relative to the workspace root, highest priority first
    pub vendors: Vec<String>,
    /// Regular expressions matched against workspace-relative changed paths
    pub ignores: Vec<String>,
    pub gopath: GopathConfig,
    pub build: BuildConfig,
    pub fuse: FuseConfig,
    pub watch: WatchConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GopathConfig {
    /// Synthetic GOPATH; the overlay is mounted on `{dir}/src`
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build tool binary (default: bazel)
    pub bazel_bin: String,
    /// Go toolchain binary (default: go)
    pub go_bin: String,
    /// Generated-output directory relative to the workspace root
    pub genfiles_dir: String,
    /// Extensions of files that trigger a build of their package
    pub build_file_exts: Vec<String>,
    /// Extensions of first-party source files that trigger an install
    pub source_exts: Vec<String>,
    /// Extra arguments passed to `go install`
    pub install_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    /// Kernel attribute/entry cache TTL in seconds (default: 1)
    pub attr_ttl_secs: u64,
    /// Allow other users to access the mount
    pub allow_other: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of the change-event queue (default: 10)
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for GopathConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/.cache/gobzl/gopath"),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            bazel_bin: "bazel".into(),
            go_bin: "go".into(),
            genfiles_dir: "bazel-genfiles".into(),
            build_file_exts: vec![".proto".into()],
            source_exts: vec![".go".into()],
            install_args: Vec::new(),
        }
    }
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            attr_ttl_secs: 1,
            allow_other: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl GobzlConfig {
    /// Parse a config from TOML text.
    pub fn parse(text: &str) -> GobzlResult<Self> {
        let config: GobzlConfig =
            toml::from_str(text).map_err(|e| GobzlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> GobzlResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| GobzlError::Config(format!("reading {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    fn validate(&self) -> GobzlResult<()> {
        let prefix = self.go_pkg_prefix.as_str();
        if prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(GobzlError::Config(format!(
                "go_pkg_prefix must not start or end with '/': {prefix:?}"
            )));
        }
        for vendor in &self.vendors {
            if vendor.is_empty() || vendor.starts_with('/') || vendor.ends_with('/') {
                return Err(GobzlError::Config(format!(
                    "vendor must be a non-empty relative path without trailing '/': {vendor:?}"
                )));
            }
        }
        if self.watch.channel_capacity == 0 {
            return Err(GobzlError::Config("watch.channel_capacity must be > 0".into()));
        }
        Ok(())
    }
}
