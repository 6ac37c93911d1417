//! Per-record data model (spec.md §3): `Block`, `DeletedBlock`, `File`,
//! `Link`, `EmptyDir`.
//!
//! These are the records the (out-of-scope) content-file serializer reads
//! and writes, so they derive `Serialize`/`Deserialize` the way the
//! teacher's `SuperBlock`/`DInode`/`DirEntry` do, even though this crate
//! does not itself perform that I/O.

use bit_field::BitField;
use relative_path::RelativePathBuf;
use serde::{Deserialize, Serialize};

/// Width, in bytes, of a block's content hash.
pub const HASH_SIZE: usize = 32;

/// Fixed-size content hash carried by [`Block`] and [`DeletedBlock`].
pub type Hash = [u8; HASH_SIZE];

/// Sentinel stored in legacy records that never captured sub-second
/// mtime precision. Matches any observed nanosecond value during
/// identity resolution (spec.md §4.3).
pub const NSEC_INVALID: i32 = -1;

/// Relationship between a block's content and the parity that covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Parity reflects this block's hash.
    Blk,
    /// Block content changed since parity was last updated.
    Chg,
    /// Never included in parity.
    New,
    /// Replaced; implementation-dependent, carried through unmodified.
    ///
    /// This component only ever reads this variant (and rejects it as a
    /// fatal internal inconsistency wherever the state machine requires
    /// BLK/CHG/NEW) — it never writes it. See spec.md §9.
    Rep,
}

/// One element of a file's block vector: a parity-array slot plus the
/// relationship between the block's on-disk content and current parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Index into the owning disk's block array.
    pub parity_pos: u64,
    /// BLK / CHG / NEW / REP.
    pub state: BlockState,
    /// Content hash.
    pub hash: Hash,
}

impl Block {
    /// A freshly-allocated block.
    pub fn new(parity_pos: u64, state: BlockState, hash: Hash) -> Self {
        Block {
            parity_pos,
            state,
            hash,
        }
    }
}

/// Tombstone occupying a parity position after its owning file
/// disappeared; keeps the last known hash so parity can still be
/// verified or retired by a later phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBlock {
    /// Parity-array slot this tombstone occupies.
    pub parity_pos: u64,
    /// Last known content hash, or all-zero if it was undetermined at
    /// the time of deletion (spec.md §4.5).
    pub hash: Hash,
}

/// Bit position of the PRESENT flag, shared by `File`, `Link` and
/// `EmptyDir`'s flag words.
const FLAG_PRESENT: usize = 0;
/// Bit position of the WITHOUT_INODE flag on `File`.
const FLAG_WITHOUT_INODE: usize = 1;
/// Bit position of the link `kind` flag, packed into the same word as
/// `Link`'s PRESENT flag (spec.md §3).
const FLAG_LINK_KIND: usize = 1;

/// A regular file previously or currently known to a disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// Path relative to the disk's `root_dir`.
    pub sub: RelativePathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, whole seconds.
    pub mtime_sec: i64,
    /// Modification time, sub-second nanoseconds, or [`NSEC_INVALID`].
    pub mtime_nsec: i32,
    /// Inode number. Meaningless (and excluded from the inode index)
    /// while [`File::without_inode`] is set.
    pub inode: u64,
    /// Disk-geometry-derived ordering key, when the portability layer
    /// can report one.
    pub physical_offset: Option<u64>,
    /// This file's owned blocks. `blockarr` slots reference these by
    /// index rather than owning them (see [`crate::disk::BlockSlot`]).
    pub blockvec: Vec<Block>,
    flags: u8,
}

impl File {
    /// Construct a freshly observed file with no flags set.
    pub fn new(
        sub: RelativePathBuf,
        size: u64,
        mtime_sec: i64,
        mtime_nsec: i32,
        inode: u64,
        physical_offset: Option<u64>,
    ) -> Self {
        File {
            sub,
            size,
            mtime_sec,
            mtime_nsec,
            inode,
            physical_offset,
            blockvec: Vec::new(),
            flags: 0,
        }
    }

    /// Set when this file has been matched during the current scan.
    pub fn present(&self) -> bool {
        self.flags.get_bit(FLAG_PRESENT)
    }

    /// Mark this file as matched during the current scan.
    pub fn set_present(&mut self, present: bool) {
        self.flags.set_bit(FLAG_PRESENT, present);
    }

    /// Set once this file's inode has been invalidated (detached from
    /// the inode index; findable only by path, spec.md §4.3 Step 1).
    pub fn without_inode(&self) -> bool {
        self.flags.get_bit(FLAG_WITHOUT_INODE)
    }

    /// Detach or restore this file's inode-index membership.
    pub fn set_without_inode(&mut self, without_inode: bool) {
        self.flags.set_bit(FLAG_WITHOUT_INODE, without_inode);
    }

    /// True iff `(size, mtime_sec, mtime_nsec)` match the observation,
    /// with [`NSEC_INVALID`] matching any observed nanosecond value
    /// (spec.md §4.3, the "matches by identity" test used in both
    /// Step 1 and Step 2).
    pub fn matches_metadata(&self, size: u64, mtime_sec: i64, mtime_nsec: i32) -> bool {
        self.size == size
            && self.mtime_sec == mtime_sec
            && (self.mtime_nsec == mtime_nsec || self.mtime_nsec == NSEC_INVALID)
    }
}

/// Whether a [`Link`] record is a symbolic link or a hardlink
/// cross-reference to an already-present file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// A real symbolic link, `linkto` is the link target text.
    Symlink,
    /// A hardlink to another file on the same disk, `linkto` is that
    /// file's `sub` path.
    Hardlink,
}

/// A symbolic link or hardlink record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Path relative to the disk's `root_dir`.
    pub sub: RelativePathBuf,
    /// Symlink target text, or the `sub` of the file this hardlinks to.
    pub linkto: String,
    flags: u8,
}

impl Link {
    /// Construct a new link record with PRESENT unset.
    pub fn new(sub: RelativePathBuf, linkto: String, kind: LinkKind) -> Self {
        let mut link = Link {
            sub,
            linkto,
            flags: 0,
        };
        link.set_kind(kind);
        link
    }

    /// Set when this link has been matched during the current scan.
    pub fn present(&self) -> bool {
        self.flags.get_bit(FLAG_PRESENT)
    }

    /// Mark this link as matched during the current scan.
    pub fn set_present(&mut self, present: bool) {
        self.flags.set_bit(FLAG_PRESENT, present);
    }

    /// SYMLINK or HARDLINK, packed into the same flag word as PRESENT
    /// (spec.md §3).
    pub fn kind(&self) -> LinkKind {
        if self.flags.get_bit(FLAG_LINK_KIND) {
            LinkKind::Hardlink
        } else {
            LinkKind::Symlink
        }
    }

    /// Set this link's kind.
    pub fn set_kind(&mut self, kind: LinkKind) {
        self.flags
            .set_bit(FLAG_LINK_KIND, matches!(kind, LinkKind::Hardlink));
    }
}

/// A leaf directory tracked explicitly because it holds no protected
/// content, so it can still be re-created on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyDir {
    /// Path relative to the disk's `root_dir`.
    pub sub: RelativePathBuf,
    flags: u8,
}

impl EmptyDir {
    /// Construct a new empty-dir record with PRESENT unset.
    pub fn new(sub: RelativePathBuf) -> Self {
        EmptyDir { sub, flags: 0 }
    }

    /// Set when this directory has been matched during the current scan.
    pub fn present(&self) -> bool {
        self.flags.get_bit(FLAG_PRESENT)
    }

    /// Mark this directory as matched during the current scan.
    pub fn set_present(&mut self, present: bool) {
        self.flags.set_bit(FLAG_PRESENT, present);
    }
}
