//! The Identity Resolver (spec.md §4.3): the decision procedure that
//! turns one observed regular file into Equal / Move / Restore / Change
//! / Hardlink / Insert.

use crate::deferred::{DeferredFile, DeferredInserts, ScanCounts};
use crate::error::{Result, ScanError};
use crate::link_resolver::resolve_link;
use disk_types::disk::Disk;
use disk_types::portability::{EntryKind, StatInfo};
use disk_types::types::{File, LinkKind, NSEC_INVALID};
use relative_path::RelativePathBuf;

/// What a regular-file observation turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClassification {
    /// Same identity, same content and metadata.
    Equal,
    /// Same inode, new path.
    Move,
    /// Same path, identical content and metadata, new (persistent)
    /// inode.
    Restore,
    /// Same identity, different content or metadata.
    Change,
    /// A second name for an already-`PRESENT` file (recorded as a Link,
    /// not counted as its own bucket — spec.md §8 S7).
    Hardlink,
    /// Not previously known.
    Insert,
}

/// Resolve one regular-file observation against `disk` (spec.md §4.3).
///
/// `walk_seq` is this disk's monotonically increasing observation
/// counter, stashed on deferred inserts so `DIR` ordering (spec.md
/// §4.6 step 4) can recover the walk's original order.
#[allow(clippy::too_many_arguments)]
pub fn resolve_file(
    disk: &mut Disk,
    sub: RelativePathBuf,
    stat: StatInfo,
    physical_offset: Option<u64>,
    counts: &mut ScanCounts,
    deferred: &mut DeferredInserts,
    need_write: &mut bool,
    force_zero: bool,
    clear_undeterminate_hash: bool,
    walk_seq: u64,
) -> Result<FileClassification> {
    // Step 1 — inode lookup.
    if let Some(fid) = disk.file_by_inode(stat.inode) {
        let matches = disk.file(fid).matches_metadata(stat.size, stat.mtime_sec, stat.mtime_nsec);
        if matches {
            if disk.file(fid).present() {
                if stat.nlink > 1 {
                    let linkto = disk.file(fid).sub.to_string();
                    resolve_link(disk, sub, linkto, LinkKind::Hardlink, counts, deferred, need_write)?;
                    return Ok(FileClassification::Hardlink);
                }
                return Err(ScanError::Internal(
                    "inode matched an already-present file with nlink <= 1",
                ));
            }

            disk.file_mut(fid).set_present(true);
            upgrade_nsec(disk, fid, stat.mtime_nsec, need_write);

            if disk.file(fid).sub != sub {
                disk.rename_file(fid, sub);
                *need_write = true;
                counts.moved += 1;
                return Ok(FileClassification::Move);
            }
            counts.equal += 1;
            return Ok(FileClassification::Equal);
        }

        // Inode matches but other metadata differs: could be a
        // renamed+edited file, or a reused inode. Handle pessimistically.
        if disk.file(fid).present() {
            return Err(ScanError::Internal(
                "inode matched an already-present file whose metadata differs",
            ));
        }
        disk.detach_inode(fid);
        // Falls through to Step 2, findable only by path now.
    }

    // Step 2 — path lookup.
    if let Some(gid) = disk.file_by_path(&sub) {
        if disk.file(gid).without_inode() {
            disk.reattach_inode(gid, stat.inode);
        } else if disk.file(gid).inode == stat.inode {
            return Err(ScanError::Internal(
                "path matched an inode that Step 1 should already have found",
            ));
        }

        if disk.file(gid).present() {
            return Err(ScanError::Internal("path matched an already-present file"));
        }

        if disk.file(gid).matches_metadata(stat.size, stat.mtime_sec, stat.mtime_nsec) {
            disk.file_mut(gid).set_present(true);
            upgrade_nsec(disk, gid, stat.mtime_nsec, need_write);

            let previously_stored_inode = disk.file(gid).inode;
            if !disk.has_not_persistent_inodes && previously_stored_inode != stat.inode {
                disk.rekey_inode(gid, stat.inode);
                *need_write = true;
                counts.restored += 1;
                return Ok(FileClassification::Restore);
            }
            counts.equal += 1;
            return Ok(FileClassification::Equal);
        }

        // Path matches, metadata differs: Change.
        if disk.file(gid).size != 0 && stat.size == 0 && !force_zero {
            return Err(ScanError::ZeroSizeGuard {
                disk: disk.name.clone(),
                sub: sub.to_string(),
            });
        }
        disk.remove_file(gid, clear_undeterminate_hash, need_write)?;

        let id = insert_new_record(disk, sub, &stat, physical_offset, need_write)?;
        deferred.files.push(DeferredFile {
            id,
            size: stat.size,
            physical_offset,
            walk_seq,
        });
        counts.changed += 1;
        return Ok(FileClassification::Change);
    }

    // Not found anywhere: Insert.
    let id = insert_new_record(disk, sub, &stat, physical_offset, need_write)?;
    deferred.files.push(DeferredFile {
        id,
        size: stat.size,
        physical_offset,
        walk_seq,
    });
    counts.inserted += 1;
    Ok(FileClassification::Insert)
}

fn upgrade_nsec(disk: &mut Disk, id: disk_types::disk::FileId, observed_nsec: i32, need_write: &mut bool) {
    if disk.file(id).mtime_nsec == NSEC_INVALID && observed_nsec != NSEC_INVALID {
        disk.file_mut(id).mtime_nsec = observed_nsec;
        *need_write = true;
    }
}

fn insert_new_record(
    disk: &mut Disk,
    sub: RelativePathBuf,
    stat: &StatInfo,
    physical_offset: Option<u64>,
    need_write: &mut bool,
) -> Result<disk_types::disk::FileId> {
    let mut file = File::new(sub, stat.size, stat.mtime_sec, stat.mtime_nsec, stat.inode, physical_offset);
    file.set_present(true);
    Ok(disk.insert_file_record(file, need_write)?)
}
