//! Per-disk, per-scan bookkeeping: classification counters and the
//! deferred-insert lists (spec.md §3 "Global scan state").

use disk_types::disk::FileId;
use disk_types::types::{EmptyDir, Link};

/// Per-disk classification counters (spec.md §3, §8 invariant 4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    /// Unchanged files/links/dirs.
    pub equal: usize,
    /// Same inode, new path.
    pub moved: usize,
    /// Same path, identical content, new inode.
    pub restored: usize,
    /// Same identity, different content or metadata.
    pub changed: usize,
    /// Previously known, not observed this scan.
    pub removed: usize,
    /// Newly observed.
    pub inserted: usize,
}

impl ScanCounts {
    /// All-zero counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec.md §8 invariant 4's sum: everything but `inserted`, i.e. the
    /// dispositions of previously-known records.
    pub fn previously_known_total(&self) -> usize {
        self.equal + self.moved + self.restored + self.changed + self.removed
    }

    /// The mass-removal guard's trigger condition (spec.md §4.6): this
    /// disk saw no positive evidence that it is still the disk it was —
    /// just removals and/or changes.
    pub fn looks_like_silent_wipe(&self) -> bool {
        self.equal == 0 && self.moved == 0 && self.restored == 0 && (self.removed != 0 || self.changed != 0)
    }
}

/// A file record already indexed in `pathset`/`inodeset` via
/// [`disk_types::disk::Disk::insert_file_record`], waiting for block
/// allocation once this disk's removals are done (spec.md §4.6 step 5).
#[derive(Debug, Clone, Copy)]
pub struct DeferredFile {
    /// Id of the already-indexed record.
    pub id: FileId,
    /// Byte size observed at insert time, used to compute `blockmax`.
    pub size: u64,
    /// Physical offset reported for this file, if any (spec.md §4.2
    /// step 4), used by `PHYSICAL` ordering and its duplicate check.
    pub physical_offset: Option<u64>,
    /// Monotonically increasing order the walker observed this file in;
    /// the sort key for `DIR` ordering and the tiebreaker (stable sort)
    /// for every other ordering.
    pub walk_seq: u64,
}

/// Everything accumulated while walking one disk, before the deferred
/// insertion phase runs. Unlike files (which are indexed immediately
/// and only have their blocks deferred, spec.md §4.3 Step 3), new links
/// and empty directories are not indexed at all until their turn in the
/// insertion phase (spec.md §4.4, §4.6 step 5) — nothing about their
/// insertion needs to happen before that point.
#[derive(Debug, Default)]
pub struct DeferredInserts {
    /// Files awaiting block allocation; already indexed.
    pub files: Vec<DeferredFile>,
    /// Not-yet-indexed links.
    pub links: Vec<Link>,
    /// Not-yet-indexed empty directories.
    pub dirs: Vec<EmptyDir>,
}

impl DeferredInserts {
    /// An empty deferred-insert set.
    pub fn new() -> Self {
        Self::default()
    }
}
