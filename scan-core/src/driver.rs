//! The Scan Driver (spec.md §4.6): orchestrates one disk's pre-clean,
//! walk, removal sweep, deferred insertion and, across every disk, the
//! mass-removal guard and final report.

use crate::deferred::{DeferredInserts, ScanCounts};
use crate::error::{ScanError, ScanWarning};
use crate::report::{DiskReport, Reporter, ScanSummary};
use crate::walker::{walk_directory, WalkContext, WalkOptions};
use disk_types::disk::Disk;
use disk_types::filters::FilterSet;
use disk_types::portability::Portability;
use relative_path::RelativePath;

/// The user-selected order new files are inserted in (spec.md §4.6
/// step 4). Controls Block Allocator reuse locality, not correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrder {
    /// Disk-geometry order, from `Portability::filephy`.
    Physical,
    /// Inode order.
    Inode,
    /// Lexicographic path order.
    Alpha,
    /// Preserve the order the Directory Walker encountered files in.
    Dir,
}

/// Options fixed for one scan run, standing in for the (out-of-scope)
/// parsed command-line/config-file layer (spec.md §6).
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// New-file insertion order.
    pub force_order: InsertOrder,
    /// Accept a previously non-zero-size file shrinking to zero bytes.
    pub force_zero: bool,
    /// Accept a disk that looks like it was silently wiped.
    pub force_empty: bool,
    /// Emit machine-readable `scan:`/`summary:` lines instead of plain
    /// text.
    pub gui: bool,
    /// Emit a line per classified entry even outside `gui` mode.
    pub verbose: bool,
    /// Bytes per parity block; determines `blockmax` for new files.
    pub block_size: u64,
    /// Name of the invoking command, used in diagnostics.
    pub command_name: String,
    /// Parity is known to already reflect the recorded state (set by
    /// the out-of-scope sync phase, never inferred here).
    pub clear_undeterminate_hash: bool,
}

impl ScanOptions {
    fn blockmax_for(&self, size: u64) -> u64 {
        if self.block_size == 0 || size == 0 {
            0
        } else {
            (size + self.block_size - 1) / self.block_size
        }
    }
}

/// One disk to scan, paired with its root's absolute path.
pub struct ScanTarget<'a> {
    /// The disk's in-memory inventory, mutated in place.
    pub disk: &'a mut Disk,
}

/// Orchestrates a full scan across one or more disks.
pub struct ScanDriver<'a> {
    portability: &'a dyn Portability,
    filters: &'a dyn FilterSet,
    options: ScanOptions,
}

impl<'a> ScanDriver<'a> {
    /// Build a driver for one scan run.
    pub fn new(portability: &'a dyn Portability, filters: &'a dyn FilterSet, options: ScanOptions) -> Self {
        ScanDriver {
            portability,
            filters,
            options,
        }
    }

    /// Run the scan across every given disk, then the cross-disk
    /// post-checks (spec.md §4.6). Returns the summary on success; a
    /// fatal condition from spec.md §7 aborts before anything is
    /// reported.
    pub fn scan(&self, disks: &mut [ScanTarget]) -> anyhow::Result<ScanSummary> {
        let reporter = Reporter::new(self.options.gui, self.options.verbose);
        let mut reports = Vec::with_capacity(disks.len());
        let mut warnings = Vec::new();
        let mut need_write = false;

        for target in disks.iter_mut() {
            let (report, disk_warnings, disk_need_write) = self.scan_one_disk(target.disk, &reporter)?;
            reports.push(report);
            warnings.extend(disk_warnings);
            need_write |= disk_need_write;
        }

        if !self.options.force_empty {
            let wiped: Vec<String> = reports
                .iter()
                .filter(|r| r.counts.looks_like_silent_wipe())
                .map(|r| r.name.clone())
                .collect();
            if !wiped.is_empty() {
                return Err(ScanError::MassRemoval { disks: wiped }.into());
            }
        }

        for warning in &warnings {
            reporter.warning(warning);
        }

        let summary = ScanSummary {
            disks: reports,
            warnings,
            need_write,
        };
        reporter.summary(&summary);
        Ok(summary)
    }

    /// Run the per-disk phases of spec.md §4.6 steps 1-5.
    fn scan_one_disk(&self, disk: &mut Disk, reporter: &Reporter) -> anyhow::Result<(DiskReport, Vec<ScanWarning>, bool)> {
        // Step 1: pre-clean + non-persistent-inode pre-pass.
        clear_present_flags(disk);
        let has_persistent_inode = self
            .portability
            .fsinfo(&disk.root_dir)
            .map_err(|e| ScanError::WalkIo {
                path: disk.root_dir.clone(),
                source: e,
            })?;
        if !has_persistent_inode {
            disk.erase_inode_knowledge();
        }

        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let mut need_write = false;
        let mut warnings = Vec::new();
        let mut walk_seq = 0u64;

        let disk_name = disk.name.clone();
        let root = disk.root_dir.clone();

        // Step 2: walk.
        {
            let mut ctx = WalkContext {
                counts: &mut counts,
                deferred: &mut deferred,
                need_write: &mut need_write,
                warnings: &mut warnings,
                walk_seq: &mut walk_seq,
                options: WalkOptions {
                    force_zero: self.options.force_zero,
                    clear_undeterminate_hash: self.options.clear_undeterminate_hash,
                    compute_physical: matches!(self.options.force_order, InsertOrder::Physical),
                },
                reporter,
            };
            walk_directory(disk, self.portability, self.filters, &disk_name, &root, RelativePath::new(""), &mut ctx)?;
        }

        // Step 3: removal sweep.
        self.sweep_removed(disk, &disk_name, &mut counts, &mut need_write, reporter)?;

        // Step 4: stable sort of the deferred file list.
        self.sort_deferred_files(disk, &mut deferred);

        // Step 5: deferred insertion (files, then links, then dirs).
        let had_duplicate_physical = self.insert_deferred(disk, &mut deferred, &mut need_write)?;
        if had_duplicate_physical {
            disk.has_not_reliable_physical = true;
            warnings.push(ScanWarning::UnreliablePhysicalOffset { disk: disk_name.clone() });
        }
        if disk.has_not_persistent_inodes {
            warnings.push(ScanWarning::NonPersistentInodes { disk: disk_name.clone() });
        }

        let report = DiskReport {
            name: disk_name,
            counts,
            has_not_persistent_inodes: disk.has_not_persistent_inodes,
            has_not_reliable_physical: disk.has_not_reliable_physical,
        };
        Ok((report, warnings, need_write))
    }

    fn sweep_removed(
        &self,
        disk: &mut Disk,
        disk_name: &str,
        counts: &mut ScanCounts,
        need_write: &mut bool,
        reporter: &Reporter,
    ) -> anyhow::Result<()> {
        let missing_files: Vec<_> = disk.iter_files().filter(|(_, f)| !f.present()).map(|(id, f)| (id, f.sub.to_string())).collect();
        for (id, sub) in missing_files {
            disk.remove_file(id, self.options.clear_undeterminate_hash, need_write)?;
            counts.removed += 1;
            reporter.scan_event("remove", disk_name, &sub, None);
        }

        let missing_links: Vec<_> = disk.iter_links().filter(|(_, l)| !l.present()).map(|(id, l)| (id, l.sub.to_string())).collect();
        for (id, sub) in missing_links {
            disk.remove_link(id, need_write);
            counts.removed += 1;
            reporter.scan_event("remove", disk_name, &sub, None);
        }

        let missing_dirs: Vec<_> = disk.iter_dirs().filter(|(_, d)| !d.present()).map(|(id, d)| (id, d.sub.to_string())).collect();
        for (id, sub) in missing_dirs {
            disk.remove_dir(id, need_write);
            counts.removed += 1;
            reporter.scan_event("remove", disk_name, &sub, None);
        }

        Ok(())
    }

    fn sort_deferred_files(&self, disk: &Disk, deferred: &mut DeferredInserts) {
        match self.options.force_order {
            InsertOrder::Physical => {
                deferred.files.sort_by_key(|f| f.physical_offset.unwrap_or(u64::MAX));
            }
            InsertOrder::Inode => {
                deferred.files.sort_by_key(|f| disk.file(f.id).inode);
            }
            InsertOrder::Alpha => {
                deferred.files.sort_by_key(|f| disk.file(f.id).sub.clone());
            }
            InsertOrder::Dir => {
                deferred.files.sort_by_key(|f| f.walk_seq);
            }
        }
    }

    /// Returns true iff a duplicate non-sentinel physical offset was
    /// observed between two consecutive non-empty files under
    /// `Physical` order (spec.md §4.6 step 5).
    fn insert_deferred(&self, disk: &mut Disk, deferred: &mut DeferredInserts, need_write: &mut bool) -> anyhow::Result<bool> {
        let mut duplicate_physical = false;
        let mut previous_offset: Option<u64> = None;

        for pending in deferred.files.drain(..) {
            if self.options.force_order == InsertOrder::Physical {
                if let (Some(offset), Some(previous)) = (pending.physical_offset, previous_offset) {
                    if offset == previous {
                        duplicate_physical = true;
                    }
                }
                previous_offset = pending.physical_offset;
            }
            let blockmax = self.options.blockmax_for(pending.size);
            disk.allocate_blocks_for(pending.id, blockmax, self.options.clear_undeterminate_hash)?;
        }

        for link in deferred.links.drain(..) {
            disk.insert_link(link, need_write)?;
        }
        for dir in deferred.dirs.drain(..) {
            disk.insert_dir(dir, need_write)?;
        }

        Ok(duplicate_physical)
    }
}

fn clear_present_flags(disk: &mut Disk) {
    let file_ids: Vec<_> = disk.iter_files().map(|(id, _)| id).collect();
    for id in file_ids {
        disk.file_mut(id).set_present(false);
    }
    let link_ids: Vec<_> = disk.iter_links().map(|(id, _)| id).collect();
    for id in link_ids {
        disk.link_mut(id).set_present(false);
    }
    let dir_ids: Vec<_> = disk.iter_dirs().map(|(id, _)| id).collect();
    for id in dir_ids {
        disk.dir_mut(id).set_present(false);
    }
}
