//! FUSE adapter: serves a [`VirtualFs`] through the fuse3 path API.
//!
//! ## Mounted layout
//!
//! ```text
//! workspace /ws (prefix github.com/acme/proj, vendors [vendor]):
//!   /ws/pkg/a.go
//!   /ws/bazel-genfiles/pkg/a.pb.go
//!   /ws/vendor/golang.org/x/net/...
//!
//! mountpoint $GOPATH/src:
//!   golang.org/x/net/...            (from /ws/vendor)
//!   github.com/acme/proj/pkg/a.go    (from /ws)
//!   github.com/acme/proj/pkg/a.pb.go (from /ws/bazel-genfiles)
//! ```
//!
//! The mount is read-only; only attribute lookup, listing and access are
//! served. Paths marked in the [`InvalidationSet`] are answered once with a
//! zero TTL so the kernel drops its cached entry.

#[cfg(feature = "fuse")]
mod inner {
    use std::ffi::OsStr;
    use std::num::NonZeroU32;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use fuse3::path::prelude::*;
    use fuse3::{Errno, FileType, MountOptions};
    use futures_util::stream;
    use gobzl_core::types::{AttrRecord, S_IFDIR, S_IFLNK, S_IFMT};
    use tracing::{debug, error, info};

    use crate::invalidate::InvalidationSet;
    use crate::overlay::{child_path, normalize, DirEntry, VirtualFs};

    // ── Configuration ─────────────────────────────────────────────────────────

    const S_IFIFO: u32 = 0o010_000;
    const S_IFCHR: u32 = 0o020_000;
    const S_IFBLK: u32 = 0o060_000;
    const S_IFSOCK: u32 = 0o140_000;

    // ── GobzlFs ───────────────────────────────────────────────────────────────

    /// The FUSE filesystem driver.
    pub struct GobzlFs<V: VirtualFs> {
        fs: Arc<V>,
        invalidations: Arc<InvalidationSet>,
        attr_ttl: Duration,
        uid: u32,
        gid: u32,
    }

    impl<V: VirtualFs + 'static> GobzlFs<V> {
        pub fn new(fs: Arc<V>, invalidations: Arc<InvalidationSet>, attr_ttl: Duration) -> Self {
            let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
            GobzlFs {
                fs,
                invalidations,
                attr_ttl,
                uid,
                gid,
            }
        }

        /// TTL for a reply about `vpath`; zero once after an invalidation.
        fn ttl_for(&self, vpath: &str) -> Duration {
            self.invalidations.ttl_for(vpath, self.attr_ttl)
        }

        /// Resolve off the async workers: stat is a blocking syscall.
        async fn resolve(&self, vpath: String) -> fuse3::Result<AttrRecord> {
            let fs = self.fs.clone();
            tokio::task::spawn_blocking(move || fs.get_attr(&vpath))
                .await
                .map_err(|_| Errno::from(libc::EIO))?
                .ok_or_else(|| Errno::from(libc::ENOENT))
        }

        async fn list(&self, vpath: String) -> fuse3::Result<Vec<(DirEntry, AttrRecord)>> {
            let fs = self.fs.clone();
            tokio::task::spawn_blocking(move || {
                let entries = fs.list_dir(&vpath)?;
                Some(
                    entries
                        .into_iter()
                        .filter_map(|entry| {
                            let child = child_path(&vpath, &entry.name);
                            let attr = fs.get_attr(&child)?;
                            Some((entry, attr))
                        })
                        .collect(),
                )
            })
            .await
            .map_err(|_| Errno::from(libc::EIO))?
            .ok_or_else(|| Errno::from(libc::ENOENT))
        }

        fn file_attr(&self, rec: &AttrRecord) -> FileAttr {
            FileAttr {
                size: rec.size,
                blocks: rec.blocks,
                atime: rec.atime.to_system_time(),
                mtime: rec.mtime.to_system_time(),
                ctime: rec.ctime.to_system_time(),
                #[cfg(target_os = "macos")]
                crtime: rec.ctime.to_system_time(),
                kind: file_type(rec.mode),
                perm: rec.perm(),
                nlink: if rec.is_dir() { 2 } else { 1 },
                uid: self.uid,
                gid: self.gid,
                rdev: 0,
                blksize: 4096,
                #[cfg(target_os = "macos")]
                flags: 0,
            }
        }
    }

    fn file_type(mode: u32) -> FileType {
        match mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            S_IFIFO => FileType::NamedPipe,
            S_IFCHR => FileType::CharDevice,
            S_IFBLK => FileType::BlockDevice,
            S_IFSOCK => FileType::Socket,
            _ => FileType::RegularFile,
        }
    }

    fn kind_of(entry: &DirEntry) -> FileType {
        if entry.is_dir {
            FileType::Directory
        } else {
            FileType::RegularFile
        }
    }

    // ── PathFilesystem impl ────────────────────────────────────────────────────

    impl<V: VirtualFs + 'static> PathFilesystem for GobzlFs<V> {
        async fn init(&self, _req: Request) -> fuse3::Result<ReplyInit> {
            if let Err(e) = self.fs.on_mount() {
                error!("mount hook failed: {e}");
                return Err(Errno::from(libc::EIO));
            }
            debug!("gobzl-fuse init");
            Ok(ReplyInit {
                max_write: NonZeroU32::new(128 * 1024).unwrap(),
            })
        }

        async fn destroy(&self, _req: Request) {
            self.fs.on_unmount();
            info!("gobzl-fuse unmounted");
        }

        async fn getattr(
            &self,
            _req: Request,
            path: Option<&OsStr>,
            _fh: Option<u64>,
            _flags: u32,
        ) -> fuse3::Result<ReplyAttr> {
            let path_str = path
                .and_then(|p| p.to_str())
                .ok_or(Errno::from(libc::ENOENT))?;
            let vpath = normalize(path_str).to_string();

            let rec = self.resolve(vpath.clone()).await?;
            Ok(ReplyAttr {
                ttl: self.ttl_for(&vpath),
                attr: self.file_attr(&rec),
            })
        }

        async fn lookup(
            &self,
            _req: Request,
            parent: &OsStr,
            name: &OsStr,
        ) -> fuse3::Result<ReplyEntry> {
            let parent_str = parent.to_str().unwrap_or("/");
            let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;

            let vpath = child_path(normalize(parent_str), name_str);

            let rec = self.resolve(vpath.clone()).await?;
            Ok(ReplyEntry {
                ttl: self.ttl_for(&vpath),
                attr: self.file_attr(&rec),
            })
        }

        // Directory entry stream types
        type DirEntryStream<'a>
            = stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntry>>>
        where
            Self: 'a;

        type DirEntryPlusStream<'a>
            = stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntryPlus>>>
        where
            Self: 'a;

        async fn readdir<'a>(
            &'a self,
            _req: Request,
            path: &'a OsStr,
            _fh: u64,
            offset: i64,
        ) -> fuse3::Result<ReplyDirectory<Self::DirEntryStream<'a>>> {
            let vpath = normalize(path.to_str().unwrap_or("/")).to_string();
            let listed = self.list(vpath).await?;

            let mut entries: Vec<fuse3::Result<DirectoryEntry>> = Vec::new();
            if offset == 0 {
                entries.push(Ok(DirectoryEntry {
                    kind: FileType::Directory,
                    name: ".".into(),
                    offset: 1,
                }));
            }
            if offset <= 1 {
                entries.push(Ok(DirectoryEntry {
                    kind: FileType::Directory,
                    name: "..".into(),
                    offset: 2,
                }));
            }

            for (i, (entry, _)) in listed.iter().enumerate() {
                let entry_offset = i as i64 + 3;
                if entry_offset > offset {
                    entries.push(Ok(DirectoryEntry {
                        kind: kind_of(entry),
                        name: entry.name.clone().into(),
                        offset: entry_offset,
                    }));
                }
            }

            Ok(ReplyDirectory {
                entries: stream::iter(entries),
            })
        }

        async fn readdirplus<'a>(
            &'a self,
            _req: Request,
            path: &'a OsStr,
            _fh: u64,
            offset: u64,
            _lock_owner: u64,
        ) -> fuse3::Result<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
            let vpath = normalize(path.to_str().unwrap_or("/")).to_string();
            let dir_rec = self.resolve(vpath.clone()).await?;
            let listed = self.list(vpath.clone()).await?;
            let offset = offset as i64;

            let mut entries: Vec<fuse3::Result<DirectoryEntryPlus>> = Vec::new();
            if offset == 0 {
                let ttl = self.ttl_for(&vpath);
                entries.push(Ok(DirectoryEntryPlus {
                    kind: FileType::Directory,
                    name: ".".into(),
                    offset: 1,
                    attr: self.file_attr(&dir_rec),
                    entry_ttl: ttl,
                    attr_ttl: ttl,
                }));
            }
            if offset <= 1 {
                entries.push(Ok(DirectoryEntryPlus {
                    kind: FileType::Directory,
                    name: "..".into(),
                    offset: 2,
                    attr: self.file_attr(&dir_rec),
                    entry_ttl: self.attr_ttl,
                    attr_ttl: self.attr_ttl,
                }));
            }

            for (i, (entry, rec)) in listed.iter().enumerate() {
                let entry_offset = i as i64 + 3;
                if entry_offset > offset {
                    let ttl = self.ttl_for(&child_path(&vpath, &entry.name));
                    entries.push(Ok(DirectoryEntryPlus {
                        kind: file_type(rec.mode),
                        name: entry.name.clone().into(),
                        offset: entry_offset,
                        attr: self.file_attr(rec),
                        entry_ttl: ttl,
                        attr_ttl: ttl,
                    }));
                }
            }

            Ok(ReplyDirectoryPlus {
                entries: stream::iter(entries),
            })
        }

        async fn opendir(
            &self,
            _req: Request,
            _path: &OsStr,
            _flags: u32,
        ) -> fuse3::Result<ReplyOpen> {
            Ok(ReplyOpen { fh: 0, flags: 0 })
        }

        async fn access(&self, _req: Request, path: &OsStr, mask: u32) -> fuse3::Result<()> {
            let vpath = normalize(path.to_str().unwrap_or("/"));
            if self.fs.access(vpath, mask) {
                Ok(())
            } else {
                Err(Errno::from(libc::EACCES))
            }
        }

        async fn statfs(&self, _req: Request, _path: &OsStr) -> fuse3::Result<ReplyStatFs> {
            Ok(ReplyStatFs {
                blocks: 1 << 30,
                bfree: 0,
                bavail: 0,
                files: 1 << 20,
                ffree: 0,
                bsize: 4096,
                namelen: 255,
                frsize: 4096,
            })
        }
    }

    // ── Public mount API ──────────────────────────────────────────────────────

    /// Mount configuration
    pub struct MountConfig {
        pub mountpoint: PathBuf,
        pub attr_ttl: Duration,
        pub allow_other: bool,
    }

    /// Mount the overlay and block until unmounted.
    ///
    /// Returns when the filesystem is unmounted (e.g. via
    /// `fusermount3 -u <mountpoint>`). The filesystem's mount hook runs during
    /// the kernel handshake; its failure fails the mount.
    pub async fn mount<V: VirtualFs + 'static>(
        fs: Arc<V>,
        invalidations: Arc<InvalidationSet>,
        cfg: MountConfig,
    ) -> std::io::Result<()> {
        let driver = GobzlFs::new(fs, invalidations, cfg.attr_ttl);

        let mut opts = MountOptions::default();
        opts.fs_name("gobzl");
        opts.read_only(true);
        opts.force_readdir_plus(true);
        if cfg.allow_other {
            opts.allow_other(true);
        }

        info!(mountpoint = %cfg.mountpoint.display(), "mounting gobzl (unprivileged via fusermount3)");

        let handle = Session::new(opts)
            .mount_with_unprivileged(driver, &cfg.mountpoint)
            .await?;

        handle.await
    }
}

#[cfg(feature = "fuse")]
pub use inner::{mount, GobzlFs, MountConfig};
