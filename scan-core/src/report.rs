//! Progress and summary output (spec.md §6): plain text for interactive
//! use, structured `scan:`/`summary:` lines when `gui` mode is enabled.
//! No logging crate — nothing in the retrieved corpus reaches for one;
//! the teacher's own tests talk to the user with plain `println!`.

use crate::deferred::ScanCounts;
use crate::error::ScanWarning;
use std::fmt::Write as _;

/// One disk's outcome after a completed scan.
#[derive(Debug, Clone)]
pub struct DiskReport {
    /// The disk's logical name.
    pub name: String,
    /// Classification counters for this disk.
    pub counts: ScanCounts,
    /// Set if this disk's filesystem does not guarantee inode
    /// persistence.
    pub has_not_persistent_inodes: bool,
    /// Set if duplicate physical offsets were observed while inserting
    /// under `Physical` order.
    pub has_not_reliable_physical: bool,
}

/// The full outcome of a scan across every disk.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Per-disk reports, in the order disks were scanned.
    pub disks: Vec<DiskReport>,
    /// Non-fatal conditions collected across every disk.
    pub warnings: Vec<ScanWarning>,
    /// Whether any mutation requires the inventory to be persisted.
    pub need_write: bool,
}

impl ScanSummary {
    /// True iff no disk reported any difference from the persisted
    /// inventory (spec.md §6 "summary:exit:{equal,diff}").
    pub fn is_equal(&self) -> bool {
        self.disks.iter().all(|d| {
            let c = &d.counts;
            c.moved == 0 && c.restored == 0 && c.changed == 0 && c.removed == 0 && c.inserted == 0
        })
    }
}

/// Emits progress output in one of two modes, as spec.md §6 requires:
/// plain human-readable text, or `gui`-mode structured lines
/// (`scan:<verb>:<disk>:<sub>[:<sub2>]`, `summary:<key>:<value>`,
/// `summary:exit:{equal,diff}`) meant for a machine reader.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    gui: bool,
    verbose: bool,
}

impl Reporter {
    /// Construct a reporter for the given output mode.
    pub fn new(gui: bool, verbose: bool) -> Self {
        Reporter { gui, verbose }
    }

    /// Report one classified entry.
    pub fn scan_event(&self, verb: &str, disk: &str, sub: &str, sub2: Option<&str>) {
        if self.gui {
            let mut line = format!("scan:{}:{}:{}", verb, disk, sub);
            if let Some(sub2) = sub2 {
                let _ = write!(line, ":{}", sub2);
            }
            println!("{}", line);
        } else if self.verbose {
            match sub2 {
                Some(sub2) => println!("{} {} -> {} [{}]", verb, sub, sub2, disk),
                None => println!("{} {} [{}]", verb, sub, disk),
            }
        }
    }

    /// Report a non-fatal warning.
    pub fn warning(&self, warning: &ScanWarning) {
        let text = match warning {
            ScanWarning::SkippedSpecialFile { disk, sub, description } => {
                format!("WARNING: skipping {} on {} ({})", sub, disk, description)
            }
            ScanWarning::UnreliablePhysicalOffset { disk } => {
                format!("WARNING: {} reported duplicate physical offsets; falling back to alphabetical order", disk)
            }
            ScanWarning::MountBoundaryCrossed { disk, sub } => {
                format!("WARNING: {} on {} crosses a mount point; subtree skipped", sub, disk)
            }
            ScanWarning::NonPersistentInodes { disk } => {
                format!("WARNING: {} does not guarantee persistent inodes; identity resolved by path only", disk)
            }
        };
        if self.gui {
            println!("summary:warning:{}", text);
        } else {
            eprintln!("{}", text);
        }
    }

    /// Report the final summary for the whole scan.
    pub fn summary(&self, summary: &ScanSummary) {
        let mut totals = ScanCounts::new();
        for disk in &summary.disks {
            totals.equal += disk.counts.equal;
            totals.moved += disk.counts.moved;
            totals.restored += disk.counts.restored;
            totals.changed += disk.counts.changed;
            totals.removed += disk.counts.removed;
            totals.inserted += disk.counts.inserted;
        }

        if self.gui {
            println!("summary:equal:{}", totals.equal);
            println!("summary:moved:{}", totals.moved);
            println!("summary:restored:{}", totals.restored);
            println!("summary:changed:{}", totals.changed);
            println!("summary:removed:{}", totals.removed);
            println!("summary:inserted:{}", totals.inserted);
            println!("summary:exit:{}", if summary.is_equal() { "equal" } else { "diff" });
        } else {
            println!(
                "equal {} moved {} restored {} changed {} removed {} inserted {}",
                totals.equal, totals.moved, totals.restored, totals.changed, totals.removed, totals.inserted
            );
            println!(
                "{}",
                if summary.is_equal() {
                    "everything matches the inventory"
                } else {
                    "there are differences"
                }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_equal_true_when_only_equal_nonzero() {
        let mut summary = ScanSummary::default();
        summary.disks.push(DiskReport {
            name: "d1".into(),
            counts: ScanCounts {
                equal: 5,
                ..ScanCounts::new()
            },
            has_not_persistent_inodes: false,
            has_not_reliable_physical: false,
        });
        assert!(summary.is_equal());
    }

    #[test]
    fn is_equal_false_when_anything_else_nonzero() {
        let mut summary = ScanSummary::default();
        summary.disks.push(DiskReport {
            name: "d1".into(),
            counts: ScanCounts {
                equal: 5,
                inserted: 1,
                ..ScanCounts::new()
            },
            has_not_persistent_inodes: false,
            has_not_reliable_physical: false,
        });
        assert!(!summary.is_equal());
    }
}
