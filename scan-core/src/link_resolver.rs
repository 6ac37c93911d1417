//! The Link & EmptyDir Resolver (spec.md §4.4): the symlink/hardlink and
//! leaf-empty-directory counterpart to the Identity Resolver.

use crate::deferred::{DeferredInserts, ScanCounts};
use crate::error::{ScanError, Result};
use disk_types::disk::Disk;
use disk_types::types::{EmptyDir, Link, LinkKind};
use relative_path::RelativePathBuf;

/// What a link observation turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClassification {
    /// Same `linkto` and `kind` as recorded.
    Equal,
    /// Same identity, different `linkto` or `kind`.
    Change,
    /// Not previously known; queued for deferred insertion.
    Insert,
}

/// Resolve one symlink or hardlink observation against `disk`'s link
/// index (spec.md §4.4).
///
/// Hardlinks are recorded through this same entry point: the Identity
/// Resolver calls it directly (not via the deferred list) the moment it
/// detects `stat.nlink > 1` on an already-`PRESENT` file, with
/// `kind = Hardlink` and `linkto` set to that file's `sub`.
pub fn resolve_link(
    disk: &mut Disk,
    sub: RelativePathBuf,
    linkto: String,
    kind: LinkKind,
    counts: &mut ScanCounts,
    deferred: &mut DeferredInserts,
    need_write: &mut bool,
) -> Result<LinkClassification> {
    match disk.link_by_path(&sub) {
        Some(id) => {
            if disk.link(id).present() {
                return Err(ScanError::Internal("duplicate link observed twice in one scan"));
            }
            let unchanged = disk.link(id).linkto == linkto && disk.link(id).kind() == kind;
            disk.link_mut(id).set_present(true);
            if unchanged {
                counts.equal += 1;
                Ok(LinkClassification::Equal)
            } else {
                let link = disk.link_mut(id);
                link.linkto = linkto;
                link.set_kind(kind);
                *need_write = true;
                counts.changed += 1;
                Ok(LinkClassification::Change)
            }
        }
        None => {
            let mut link = Link::new(sub, linkto, kind);
            link.set_present(true);
            deferred.links.push(link);
            counts.inserted += 1;
            Ok(LinkClassification::Insert)
        }
    }
}

/// What an empty-directory observation turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirClassification {
    /// Previously known, still a leaf empty directory.
    Equal,
    /// Not previously known; queued for deferred insertion.
    Insert,
}

/// Resolve one leaf-empty-directory observation against `disk`'s
/// empty-dir index (spec.md §4.4).
pub fn resolve_empty_dir(
    disk: &mut Disk,
    sub: RelativePathBuf,
    counts: &mut ScanCounts,
    deferred: &mut DeferredInserts,
) -> Result<DirClassification> {
    match disk.dir_by_path(&sub) {
        Some(id) => {
            if disk.dir(id).present() {
                return Err(ScanError::Internal("duplicate empty dir observed twice in one scan"));
            }
            disk.dir_mut(id).set_present(true);
            counts.equal += 1;
            Ok(DirClassification::Equal)
        }
        None => {
            let mut dir = EmptyDir::new(sub);
            dir.set_present(true);
            deferred.dirs.push(dir);
            counts.inserted += 1;
            Ok(DirClassification::Insert)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn disk() -> Disk {
        Disk::new("d1", PathBuf::from("/mnt/d1"), 1)
    }

    #[test]
    fn new_symlink_is_deferred_not_indexed() {
        let mut d = disk();
        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let mut need_write = false;

        let cls = resolve_link(
            &mut d,
            RelativePathBuf::from("l"),
            "target".into(),
            LinkKind::Symlink,
            &mut counts,
            &mut deferred,
            &mut need_write,
        )
        .unwrap();

        assert_eq!(cls, LinkClassification::Insert);
        assert_eq!(counts.inserted, 1);
        assert_eq!(deferred.links.len(), 1);
        assert_eq!(d.link_by_path(relative_path::RelativePath::new("l")), None);
        assert!(!need_write); // need_write belongs to the actual indexed insert, still to come
    }

    #[test]
    fn unchanged_symlink_is_equal() {
        let mut d = disk();
        let mut need_write = false;
        let id = d
            .insert_link(Link::new(RelativePathBuf::from("l"), "target".into(), LinkKind::Symlink), &mut need_write)
            .unwrap();
        d.link_mut(id).set_present(false);
        need_write = false;

        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let cls = resolve_link(
            &mut d,
            RelativePathBuf::from("l"),
            "target".into(),
            LinkKind::Symlink,
            &mut counts,
            &mut deferred,
            &mut need_write,
        )
        .unwrap();

        assert_eq!(cls, LinkClassification::Equal);
        assert_eq!(counts.equal, 1);
        assert!(!need_write);
        assert!(d.link(id).present());
    }

    #[test]
    fn changed_symlink_target_overwrites_and_marks_dirty() {
        let mut d = disk();
        let mut need_write = false;
        let id = d
            .insert_link(Link::new(RelativePathBuf::from("l"), "old".into(), LinkKind::Symlink), &mut need_write)
            .unwrap();
        d.link_mut(id).set_present(false);
        need_write = false;

        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let cls = resolve_link(
            &mut d,
            RelativePathBuf::from("l"),
            "new".into(),
            LinkKind::Symlink,
            &mut counts,
            &mut deferred,
            &mut need_write,
        )
        .unwrap();

        assert_eq!(cls, LinkClassification::Change);
        assert_eq!(counts.changed, 1);
        assert!(need_write);
        assert_eq!(d.link(id).linkto, "new");
    }

    #[test]
    fn already_present_link_is_fatal() {
        let mut d = disk();
        let mut need_write = false;
        d.insert_link(Link::new(RelativePathBuf::from("l"), "t".into(), LinkKind::Symlink), &mut need_write)
            .unwrap();
        // insert_link leaves PRESENT unset; simulate an already-matched record.
        let id = d.link_by_path(relative_path::RelativePath::new("l")).unwrap();
        d.link_mut(id).set_present(true);

        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let err = resolve_link(
            &mut d,
            RelativePathBuf::from("l"),
            "t".into(),
            LinkKind::Symlink,
            &mut counts,
            &mut deferred,
            &mut need_write,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::Internal(_)));
    }

    #[test]
    fn new_empty_dir_is_deferred() {
        let mut d = disk();
        let mut counts = ScanCounts::new();
        let mut deferred = DeferredInserts::new();
        let cls = resolve_empty_dir(&mut d, RelativePathBuf::from("e"), &mut counts, &mut deferred).unwrap();
        assert_eq!(cls, DirClassification::Insert);
        assert_eq!(deferred.dirs.len(), 1);
    }
}
