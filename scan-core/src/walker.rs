//! The Directory Walker (spec.md §4.2): recursive traversal that feeds
//! every surviving entry to the Identity Resolver or the Link &
//! EmptyDir Resolver.

use crate::deferred::{DeferredInserts, ScanCounts};
use crate::error::{Result, ScanError, ScanWarning};
use crate::identity::{resolve_file, FileClassification};
use crate::link_resolver::{resolve_empty_dir, resolve_link, DirClassification, LinkClassification};
use crate::report::Reporter;
use disk_types::disk::Disk;
use disk_types::filters::FilterSet;
use disk_types::portability::{EntryKind, Portability, StatInfo};
use disk_types::types::LinkKind;
use relative_path::{RelativePath, RelativePathBuf};
use std::path::Path;

/// Flags that do not change while walking one disk, bundled so
/// recursive calls don't grow an ever-longer parameter list.
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Accept a file shrinking to zero bytes as a real Change rather
    /// than treating it as a fatal aborted-write symptom.
    pub force_zero: bool,
    /// Parity is known to already reflect the recorded state, so
    /// CHG/NEW hashes need not be zeroed on removal/reuse.
    pub clear_undeterminate_hash: bool,
    /// Ask the portability layer for a physical offset on every regular
    /// file (spec.md §4.2 step 4).
    pub compute_physical: bool,
}

/// Mutable state threaded through one disk's recursive walk.
pub struct WalkContext<'a> {
    /// Per-disk classification counters.
    pub counts: &'a mut ScanCounts,
    /// Deferred file/link/dir inserts accumulated so far.
    pub deferred: &'a mut DeferredInserts,
    /// Set whenever any mutation requires the inventory to be persisted.
    pub need_write: &'a mut bool,
    /// Non-fatal conditions observed during the walk.
    pub warnings: &'a mut Vec<ScanWarning>,
    /// Monotonic per-disk counter, used to recover directory order for
    /// `DIR`-ordered deferred insertion.
    pub walk_seq: &'a mut u64,
    /// Flags fixed for the whole walk.
    pub options: WalkOptions,
    /// Progress-output sink.
    pub reporter: &'a Reporter,
}

struct Candidate {
    sub: RelativePathBuf,
    abs: std::path::PathBuf,
    stat: StatInfo,
    kind_hint: Option<EntryKind>,
}

/// Recursively walk `abs_dir` (whose path relative to the disk root is
/// `sub_dir`), resolving every surviving entry. Returns `true` iff at
/// least one file or link was classified anywhere in this subtree
/// (spec.md §4.2): the caller registers `false` subtrees as
/// [`EmptyDir`](disk_types::types::EmptyDir)s.
pub fn walk_directory(
    disk: &mut Disk,
    portability: &dyn Portability,
    filters: &dyn FilterSet,
    disk_name: &str,
    abs_dir: &Path,
    sub_dir: &RelativePath,
    ctx: &mut WalkContext,
) -> Result<bool> {
    let read_dir = std::fs::read_dir(abs_dir).map_err(|e| ScanError::WalkIo {
        path: abs_dir.to_path_buf(),
        source: e,
    })?;

    let mut survivors = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ScanError::WalkIo {
            path: abs_dir.to_path_buf(),
            source: e,
        })?;
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue, // not representable; nothing sane to index it under
        };
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }
        // Hidden and content-file filters run before any stat, per
        // spec.md §4.2 step 1 — they need only the name/path.
        if filters.exclude_hidden(&name) {
            continue;
        }
        let child_sub = sub_dir.join(&name);
        let child_abs = abs_dir.join(&name);
        if filters.exclude_content(&child_abs) {
            continue;
        }
        survivors.push((name, child_sub, child_abs));
    }

    let mut candidates = Vec::with_capacity(survivors.len());
    for (name, child_sub, child_abs) in survivors {
        let kind_hint = portability.entry_kind_hint(abs_dir, &name);
        let stat = portability.lstat(&child_abs).map_err(|e| ScanError::WalkIo {
            path: child_abs.clone(),
            source: e,
        })?;
        candidates.push(Candidate {
            sub: child_sub,
            abs: child_abs,
            stat,
            kind_hint,
        });
    }

    // Step 2: stable-sort by inode for readdir/stat locality, but only
    // when this disk's inodes are trustworthy enough to sort by.
    if !disk.has_not_persistent_inodes {
        candidates.sort_by_key(|c| c.stat.inode);
    }

    let mut processed = false;
    for candidate in candidates {
        let kind = candidate.kind_hint.unwrap_or(candidate.stat.kind);
        match kind {
            EntryKind::Regular => {
                if filters.exclude_path(disk_name, &candidate.sub) {
                    continue;
                }
                let physical_offset = if ctx.options.compute_physical {
                    portability
                        .filephy(&candidate.abs, &candidate.stat)
                        .map_err(|e| ScanError::WalkIo {
                            path: candidate.abs.clone(),
                            source: e,
                        })?
                } else {
                    None
                };
                let seq = *ctx.walk_seq;
                *ctx.walk_seq += 1;
                let sub_text = candidate.sub.to_string();
                let cls = resolve_file(
                    disk,
                    candidate.sub,
                    candidate.stat,
                    physical_offset,
                    ctx.counts,
                    ctx.deferred,
                    ctx.need_write,
                    ctx.options.force_zero,
                    ctx.options.clear_undeterminate_hash,
                    seq,
                )?;
                ctx.reporter.scan_event(file_classification_verb(cls), disk_name, &sub_text, None);
                processed = true;
            }
            EntryKind::Symlink => {
                if filters.exclude_path(disk_name, &candidate.sub) {
                    continue;
                }
                let target = portability.readlink(&candidate.abs).map_err(|e| ScanError::WalkIo {
                    path: candidate.abs.clone(),
                    source: e,
                })?;
                let target = target.to_string_lossy().into_owned();
                let sub_text = candidate.sub.to_string();
                let cls = resolve_link(
                    disk,
                    candidate.sub,
                    target,
                    LinkKind::Symlink,
                    ctx.counts,
                    ctx.deferred,
                    ctx.need_write,
                )?;
                ctx.reporter.scan_event(link_classification_verb(cls), disk_name, &sub_text, None);
                processed = true;
            }
            EntryKind::Directory => {
                if filters.exclude_dir(disk_name, &candidate.sub) {
                    continue;
                }
                if candidate.stat.device != disk.device_id {
                    ctx.warnings.push(ScanWarning::MountBoundaryCrossed {
                        disk: disk_name.to_string(),
                        sub: candidate.sub,
                    });
                    continue;
                }
                let sub_text = candidate.sub.to_string();
                let child_processed =
                    walk_directory(disk, portability, filters, disk_name, &candidate.abs, &candidate.sub, ctx)?;
                if child_processed {
                    processed = true;
                } else {
                    let cls = resolve_empty_dir(disk, candidate.sub, ctx.counts, ctx.deferred)?;
                    ctx.reporter.scan_event(dir_classification_verb(cls), disk_name, &sub_text, None);
                }
            }
            EntryKind::Other => {
                ctx.warnings.push(ScanWarning::SkippedSpecialFile {
                    disk: disk_name.to_string(),
                    sub: candidate.sub,
                    description: portability.stat_desc(&candidate.stat),
                });
            }
        }
    }

    Ok(processed)
}

fn file_classification_verb(cls: FileClassification) -> &'static str {
    match cls {
        FileClassification::Equal => "equal",
        FileClassification::Move => "move",
        FileClassification::Restore => "restore",
        FileClassification::Change => "change",
        FileClassification::Hardlink => "hardlink",
        FileClassification::Insert => "insert",
    }
}

fn link_classification_verb(cls: LinkClassification) -> &'static str {
    match cls {
        LinkClassification::Equal => "equal",
        LinkClassification::Change => "change",
        LinkClassification::Insert => "insert",
    }
}

fn dir_classification_verb(cls: DirClassification) -> &'static str {
    match cls {
        DirClassification::Equal => "equal",
        DirClassification::Insert => "insert",
    }
}
