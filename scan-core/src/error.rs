//! Error and warning types raised while running a scan.
//!
//! Mirrors the teacher's `BlockLayerError`/`InodeLayerError`/`DirLayerError`
//! layering: this crate's own concerns get their own variants, and
//! `disk_types::error::DiskError` is wrapped in via `#[from]`.

use thiserror::Error;

/// Error type for a scan run.
#[derive(Error, Debug)]
pub enum ScanError {
    /// An inventory-primitive invariant was violated (duplicate path,
    /// duplicate inode, bad block state).
    #[error("inventory error")]
    Inventory(#[from] disk_types::error::DiskError),

    /// A filesystem operation the Directory Walker depends on failed
    /// (`read_dir`, `lstat`, `readlink`, ...).
    #[error("I/O error walking {path}")]
    WalkIo {
        /// Path the failing operation was for.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A scan-driver precondition was violated in a way that indicates a
    /// bug rather than bad input (e.g. a deferred observation missing
    /// its stat info).
    #[error("internal scan error: {0}")]
    Internal(&'static str),

    /// The zero-size safety gate (spec.md §4.3 Change case, §8 S3)
    /// tripped: a file that previously had non-zero size was observed
    /// at size zero, without `force_zero` set.
    #[error("{sub} on disk {disk} shrank to zero bytes; this can happen after an unclean shutdown truncates a file — pass force_zero to accept it as a real change")]
    ZeroSizeGuard {
        /// Name of the disk the file is on.
        disk: String,
        /// Path of the file, relative to the disk root.
        sub: String,
    },

    /// The mass-removal guard (spec.md §4.6, post-scan check) tripped:
    /// one or more disks saw removals or changes with no equal, moved,
    /// or restored entries at all — the signature of an unmounted or
    /// emptied disk, not a real reconciliation.
    #[error("disk(s) {} look silently wiped (no equal/moved/restored entries, but removals or changes present); pass force_empty to accept this", .disks.join(", "))]
    MassRemoval {
        /// Names of the affected disks.
        disks: Vec<String>,
    },
}

/// Alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Non-fatal conditions worth surfacing to whatever is driving the scan,
/// without aborting it (spec.md §6).
#[derive(Debug, Clone)]
pub enum ScanWarning {
    /// An entry was skipped because it was neither a regular file, a
    /// symlink, nor a directory (spec.md §4.2 step 3).
    SkippedSpecialFile {
        /// Disk the entry was found on.
        disk: String,
        /// Path, relative to the disk root.
        sub: relative_path::RelativePathBuf,
        /// Human-readable description of what it was.
        description: String,
    },
    /// Two deferred-insert files reported the same physical offset,
    /// downgrading the disk's ordering to alphabetical for the rest of
    /// this scan (spec.md §4.6 step 5).
    UnreliablePhysicalOffset {
        /// Disk the collision was observed on.
        disk: String,
    },
    /// A subtree was skipped because it crossed onto a different
    /// filesystem (spec.md §4.2 step 6).
    MountBoundaryCrossed {
        /// Disk the boundary was found on.
        disk: String,
        /// Path, relative to the disk root, of the crossing point.
        sub: relative_path::RelativePathBuf,
    },
    /// This disk's filesystem does not guarantee inode persistence
    /// across mounts; identity resolution fell back to the path axis
    /// for the whole scan (spec.md §4.6 step 1).
    NonPersistentInodes {
        /// Disk the condition was observed on.
        disk: String,
    },
}
