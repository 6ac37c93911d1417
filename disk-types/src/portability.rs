//! The portability interface the Directory Walker consumes (spec.md §6).
//!
//! Platform-specific inode/physical-offset probing is an external
//! collaborator: this crate defines the contract, a real binary wires up
//! a concrete implementation (e.g. `std::os::unix::fs::MetadataExt` on
//! Unix), and tests provide a fake one.

use std::io;
use std::path::{Path, PathBuf};

/// The subset of `stat(2)` the Identity Resolver needs, independent of
/// platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo {
    /// File size in bytes.
    pub size: u64,
    /// Modification time, whole seconds.
    pub mtime_sec: i64,
    /// Modification time, sub-second nanoseconds.
    pub mtime_nsec: i32,
    /// Inode number.
    pub inode: u64,
    /// Hard-link count.
    pub nlink: u64,
    /// Device id the entry resides on, used for the mount-boundary
    /// check (spec.md §4.2 step 6).
    pub device: u64,
    /// Entry type, as `stat(2)`'s mode bits would report it. Used when
    /// no cheaper [`Portability::entry_kind_hint`] is available.
    pub kind: EntryKind,
}

/// What kind of filesystem entry the Directory Walker is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    Regular,
    /// A symbolic link.
    Symlink,
    /// A directory.
    Directory,
    /// Anything else (device, socket, fifo, ...).
    Other,
}

/// Platform-specific probes the Directory Walker and Identity Resolver
/// rely on but do not implement themselves.
pub trait Portability {
    /// `lstat` (does not follow symlinks) on `path`.
    fn lstat(&self, path: &Path) -> io::Result<StatInfo>;

    /// A platform-specific variant of `lstat` that can retrieve
    /// information ordinary `lstat` cannot (e.g. Windows file ids).
    /// Default: unsupported on this platform.
    fn lstat_ex(&self, path: &Path) -> Option<io::Result<StatInfo>> {
        let _ = path;
        None
    }

    /// Disk-geometry-derived ordering key for `path`, if the underlying
    /// filesystem can report one. Returns `Ok(None)` when unsupported
    /// rather than an error, since most filesystems don't offer this.
    fn filephy(&self, path: &Path, stat: &StatInfo) -> io::Result<Option<u64>>;

    /// Whether `dir`'s filesystem guarantees inode numbers survive
    /// unmount/remount (spec.md GLOSSARY: "Persistent inode").
    fn fsinfo(&self, dir: &Path) -> io::Result<bool>;

    /// Read a symlink's target text.
    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    /// Human-readable description of a special (non regular/symlink/dir)
    /// entry, for the warning emitted when the walker skips it.
    fn stat_desc(&self, stat: &StatInfo) -> String;

    /// Directory-entry type hint, if the platform's `readdir` can supply
    /// one without a separate `lstat` call (spec.md §4.2 step 3: "prefer
    /// directory-entry type hint; fall back to lstat"). Default: no
    /// hint available, forcing the `lstat` fallback.
    fn entry_kind_hint(&self, dir: &Path, name: &str) -> Option<EntryKind> {
        let _ = (dir, name);
        None
    }
}
