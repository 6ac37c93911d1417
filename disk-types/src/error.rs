//! Errors raised by the [`crate::disk::Disk`] inventory primitives.
//!
//! Mirrors the teacher's `BlockLayerError`/`InodeLayerError` layering:
//! a small `thiserror` enum per crate, wrapped by the next layer up via
//! `#[from]`. `scan_core::error::ScanError` wraps this one.

use thiserror::Error;

/// Error type for [`crate::disk::Disk`]'s insert/remove primitives.
#[derive(Error, Debug)]
pub enum DiskError {
    /// A path was inserted that already has an entry in `pathset`
    /// (spec.md §4.1 invariant (b)).
    #[error("duplicate path in inventory: {0}")]
    DuplicatePath(String),

    /// An inode was inserted that already has an entry in `inodeset`
    /// (spec.md §4.1 invariant (a)).
    #[error("duplicate inode in inventory: {0}")]
    DuplicateInode(u64),

    /// The Block Allocator encountered a block whose state was neither
    /// BLK, CHG nor NEW where the state machine requires one of those
    /// (spec.md §4.5).
    #[error("invalid block state during {0}")]
    BadBlockState(&'static str),
}

/// Alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DiskError>;
