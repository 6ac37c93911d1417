//! The Indexed Disk Inventory (spec.md §3, §4.1) and the Block Allocator
//! (spec.md §4.5). One [`Disk`] models one data disk under protection:
//! its files, links, empty directories, and the dense parity-position
//! array, plus the inode/path/name indices kept in sync with them.

use crate::error::{DiskError, Result};
use crate::slab::{Id, Slab};
use crate::types::{Block, BlockState, DeletedBlock, EmptyDir, File, Link, HASH_SIZE};
use relative_path::{RelativePath, RelativePathBuf};
use std::collections::HashMap;
use std::path::PathBuf;

/// Stable handle to a [`File`] inside a [`Disk`].
pub type FileId = Id<File>;
/// Stable handle to a [`Link`] inside a [`Disk`].
pub type LinkId = Id<Link>;
/// Stable handle to an [`EmptyDir`] inside a [`Disk`].
pub type DirId = Id<EmptyDir>;

/// One element of a disk's dense parity-position array.
///
/// spec.md §9 notes that the reference implementation tags a raw pointer
/// to get this three-way union; in safe Rust the natural encoding is a
/// sum type whose `Live` case references the owning file by id+index
/// rather than by pointer, sidestepping the aliasing/lifetime problem
/// entirely.
#[derive(Debug, Clone)]
pub enum BlockSlot {
    /// Never allocated, or freed and not yet reused.
    Empty,
    /// Backed by `file.blockvec[block_index]` on the file identified by
    /// `file`.
    Live { file: FileId, block_index: usize },
    /// A tombstone left behind by a removed file.
    Deleted(DeletedBlock),
}

/// One data disk under protection: its root path, capability flags, and
/// the indexed collections of everything known about it.
#[derive(Debug)]
pub struct Disk {
    /// Logical name used in reports and log lines.
    pub name: String,
    /// Absolute path this disk is rooted at.
    pub root_dir: PathBuf,
    /// Device id, used for the Directory Walker's mount-boundary check.
    pub device_id: u64,
    /// Set when this disk's filesystem does not guarantee inode
    /// persistence across mounts (spec.md §4.6 step 1).
    pub has_not_persistent_inodes: bool,
    /// Set when two deferred files reported the same non-sentinel
    /// physical offset during `Physical`-order insertion (spec.md §4.6
    /// step 5).
    pub has_not_reliable_physical: bool,
    /// Lowest parity position not yet known to be occupied (live or
    /// deleted). A hint, not a guarantee — the Block Allocator always
    /// re-scans forward from here rather than trusting it blindly.
    pub first_free_block: u64,

    files: Slab<File>,
    inode_index: HashMap<u64, FileId>,
    path_index: HashMap<RelativePathBuf, FileId>,

    links: Slab<Link>,
    link_index: HashMap<RelativePathBuf, LinkId>,

    dirs: Slab<EmptyDir>,
    dir_index: HashMap<RelativePathBuf, DirId>,

    blockarr: Vec<BlockSlot>,
    /// Parity positions of deleted blocks, in the order they were
    /// tombstoned. Consumed by the (out-of-scope) parity-update phase.
    deletedlist: Vec<u64>,
}

impl Disk {
    /// Construct a disk with empty collections — the state a fresh
    /// `mkfs`-equivalent, or a freshly-loaded-but-empty inventory, would
    /// start from.
    pub fn new(name: impl Into<String>, root_dir: PathBuf, device_id: u64) -> Self {
        Disk {
            name: name.into(),
            root_dir,
            device_id,
            has_not_persistent_inodes: false,
            has_not_reliable_physical: false,
            first_free_block: 0,
            files: Slab::new(),
            inode_index: HashMap::new(),
            path_index: HashMap::new(),
            links: Slab::new(),
            link_index: HashMap::new(),
            dirs: Slab::new(),
            dir_index: HashMap::new(),
            blockarr: Vec::new(),
            deletedlist: Vec::new(),
        }
    }

    // ---- lookups -------------------------------------------------

    /// Find a file by its current inode number.
    pub fn file_by_inode(&self, inode: u64) -> Option<FileId> {
        self.inode_index.get(&inode).copied()
    }

    /// Find a file by its current relative path.
    pub fn file_by_path(&self, sub: &RelativePath) -> Option<FileId> {
        self.path_index.get(sub).copied()
    }

    /// Find a link by its relative path.
    pub fn link_by_path(&self, sub: &RelativePath) -> Option<LinkId> {
        self.link_index.get(sub).copied()
    }

    /// Find an empty-dir record by its relative path.
    pub fn dir_by_path(&self, sub: &RelativePath) -> Option<DirId> {
        self.dir_index.get(sub).copied()
    }

    /// Borrow a file by id.
    pub fn file(&self, id: FileId) -> &File {
        self.files.get(id).expect("stale FileId")
    }

    /// Mutably borrow a file by id.
    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        self.files.get_mut(id).expect("stale FileId")
    }

    /// Borrow a link by id.
    pub fn link(&self, id: LinkId) -> &Link {
        self.links.get(id).expect("stale LinkId")
    }

    /// Mutably borrow a link by id.
    pub fn link_mut(&mut self, id: LinkId) -> &mut Link {
        self.links.get_mut(id).expect("stale LinkId")
    }

    /// Borrow an empty-dir record by id.
    pub fn dir(&self, id: DirId) -> &EmptyDir {
        self.dirs.get(id).expect("stale DirId")
    }

    /// Mutably borrow an empty-dir record by id.
    pub fn dir_mut(&mut self, id: DirId) -> &mut EmptyDir {
        self.dirs.get_mut(id).expect("stale DirId")
    }

    /// Iterate files in insertion order (the order the removal sweep,
    /// spec.md §4.6 step 3, walks them in).
    pub fn iter_files(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.files.iter()
    }

    /// Iterate links in insertion order.
    pub fn iter_links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    /// Iterate empty-dir records in insertion order.
    pub fn iter_dirs(&self) -> impl Iterator<Item = (DirId, &EmptyDir)> {
        self.dirs.iter()
    }

    /// Number of deleted blocks queued for the parity-update phase.
    pub fn deleted_block_count(&self) -> usize {
        self.deletedlist.len()
    }

    // ---- non-persistent-inode pre-pass (spec.md §4.6 step 1) -----

    /// Detach every file from the inode index and mark it
    /// `WITHOUT_INODE`, forcing every identity decision in this scan
    /// onto the path axis. Not a fallback: an explicit mode switch
    /// (spec.md §9), applied once up front rather than checked on every
    /// observation.
    pub fn erase_inode_knowledge(&mut self) {
        self.has_not_persistent_inodes = true;
        let ids: Vec<FileId> = self.files.iter().map(|(id, _)| id).collect();
        for id in ids {
            let file = self.files.get_mut(id).unwrap();
            file.inode = 0;
            file.set_without_inode(true);
        }
        self.inode_index.clear();
    }

    // ---- identity-resolution support (spec.md §4.3) ---------------

    /// Step 1's pessimistic branch: detach `id` from the inode index and
    /// clear its inode, because the inode matched but other metadata
    /// did not (either a renamed+edited file, or a reused inode on a
    /// filesystem without persistent inodes).
    pub fn detach_inode(&mut self, id: FileId) {
        let inode = self.files.get(id).unwrap().inode;
        self.inode_index.remove(&inode);
        let file = self.files.get_mut(id).unwrap();
        file.inode = 0;
        file.set_without_inode(true);
    }

    /// Step 2's recovery branch: a file found by path that was
    /// previously detached from the inode index gets its inode
    /// re-established (the common rename-without-content-change case).
    pub fn reattach_inode(&mut self, id: FileId, inode: u64) {
        let file = self.files.get_mut(id).unwrap();
        file.inode = inode;
        file.set_without_inode(false);
        self.inode_index.insert(inode, id);
    }

    /// Re-key a file's inode (the Restore case, spec.md §4.3 Step 2: the
    /// path's file now has a different — but still persistent — inode).
    pub fn rekey_inode(&mut self, id: FileId, new_inode: u64) {
        let old_inode = self.files.get(id).unwrap().inode;
        self.inode_index.remove(&old_inode);
        self.files.get_mut(id).unwrap().inode = new_inode;
        self.inode_index.insert(new_inode, id);
    }

    /// Re-key a file's path (the Move case, spec.md §4.3 Step 1).
    pub fn rename_file(&mut self, id: FileId, new_sub: RelativePathBuf) {
        let old_sub = self.files.get(id).unwrap().sub.clone();
        self.path_index.remove(&old_sub);
        self.files.get_mut(id).unwrap().sub = new_sub.clone();
        self.path_index.insert(new_sub, id);
    }

    // ---- insert/remove primitives (spec.md §4.1) -------------------

    /// Insert a newly-observed file's record into `pathset`/`inodeset`
    /// without allocating any blocks. Used by the Identity Resolver's
    /// Insert case (spec.md §4.3 Step 3): the record is indexed
    /// immediately, but its blocks wait for [`Disk::allocate_blocks_for`]
    /// once all of this disk's removals have run. Sets `*need_write`.
    pub fn insert_file_record(&mut self, file: File, need_write: &mut bool) -> Result<FileId> {
        if self.path_index.contains_key(&file.sub) {
            return Err(DiskError::DuplicatePath(file.sub.to_string()));
        }
        if !file.without_inode() && self.inode_index.contains_key(&file.inode) {
            return Err(DiskError::DuplicateInode(file.inode));
        }
        let sub = file.sub.clone();
        let inode = file.inode;
        let without_inode = file.without_inode();

        let id = self.files.insert(file);
        self.path_index.insert(sub, id);
        if !without_inode {
            self.inode_index.insert(inode, id);
        }
        *need_write = true;
        Ok(id)
    }

    /// Insert a newly-observed file, running the Block Allocator's
    /// insert path (spec.md §4.5) immediately to give it `blockmax`
    /// blocks. A convenience for callers that have no reason to defer
    /// block allocation. Sets `*need_write`.
    pub fn insert_file(
        &mut self,
        file: File,
        blockmax: u64,
        clear_undeterminate_hash: bool,
        need_write: &mut bool,
    ) -> Result<FileId> {
        let id = self.insert_file_record(file, need_write)?;
        self.allocate_blocks(id, blockmax, clear_undeterminate_hash)?;
        Ok(id)
    }

    /// Run the Block Allocator's insert path (spec.md §4.5) for a file
    /// already indexed via [`Disk::insert_file_record`]. Called by the
    /// Scan Driver once all of this disk's removals have completed, so
    /// slots freed earlier in the same scan can be reused.
    pub fn allocate_blocks_for(&mut self, id: FileId, blockmax: u64, clear_undeterminate_hash: bool) -> Result<()> {
        self.allocate_blocks(id, blockmax, clear_undeterminate_hash)
    }

    /// Remove a file, running the Block Allocator's remove path
    /// (spec.md §4.5) first so every live `blockarr` slot it owned
    /// becomes a `Deleted` tombstone before the record itself is
    /// dropped. Sets `*need_write`.
    pub fn remove_file(&mut self, id: FileId, clear_undeterminate_hash: bool, need_write: &mut bool) -> Result<File> {
        self.release_blocks(id, clear_undeterminate_hash)?;
        let file = self.files.remove(id);
        self.path_index.remove(&file.sub);
        if !file.without_inode() {
            self.inode_index.remove(&file.inode);
        }
        *need_write = true;
        Ok(file)
    }

    /// Insert a newly-observed link. Sets `*need_write`.
    pub fn insert_link(&mut self, link: Link, need_write: &mut bool) -> Result<LinkId> {
        if self.link_index.contains_key(&link.sub) {
            return Err(DiskError::DuplicatePath(link.sub.to_string()));
        }
        let sub = link.sub.clone();
        let id = self.links.insert(link);
        self.link_index.insert(sub, id);
        *need_write = true;
        Ok(id)
    }

    /// Remove a link. Sets `*need_write`.
    pub fn remove_link(&mut self, id: LinkId, need_write: &mut bool) -> Link {
        let link = self.links.remove(id);
        self.link_index.remove(&link.sub);
        *need_write = true;
        link
    }

    /// Insert a newly-observed empty directory. Sets `*need_write`.
    pub fn insert_dir(&mut self, dir: EmptyDir, need_write: &mut bool) -> Result<DirId> {
        if self.dir_index.contains_key(&dir.sub) {
            return Err(DiskError::DuplicatePath(dir.sub.to_string()));
        }
        let sub = dir.sub.clone();
        let id = self.dirs.insert(dir);
        self.dir_index.insert(sub, id);
        *need_write = true;
        Ok(id)
    }

    /// Remove an empty-dir record. Sets `*need_write`.
    pub fn remove_dir(&mut self, id: DirId, need_write: &mut bool) -> EmptyDir {
        let dir = self.dirs.remove(id);
        self.dir_index.remove(&dir.sub);
        *need_write = true;
        dir
    }

    // ---- Block Allocator (spec.md §4.5) ----------------------------

    /// Insert path: give file `id` `blockmax` freshly-allocated blocks,
    /// scanning `blockarr` forward from `first_free_block` for slots
    /// that are not currently `Live`, growing the array as needed.
    fn allocate_blocks(&mut self, id: FileId, blockmax: u64, clear_undeterminate_hash: bool) -> Result<()> {
        let mut cursor = self.first_free_block;
        let mut allocated_any = false;

        for _ in 0..blockmax {
            while (cursor as usize) < self.blockarr.len() && matches!(self.blockarr[cursor as usize], BlockSlot::Live { .. }) {
                cursor += 1;
            }
            if cursor as usize >= self.blockarr.len() {
                self.blockarr.push(BlockSlot::Empty);
            }

            let slot = std::mem::replace(&mut self.blockarr[cursor as usize], BlockSlot::Empty);
            let (state, hash) = match slot {
                BlockSlot::Empty => (BlockState::New, [0u8; HASH_SIZE]),
                BlockSlot::Deleted(deleted) => {
                    // The replaced DeletedBlock's own stored hash would be
                    // zeroed here under !clear_undeterminate_hash per
                    // spec.md §4.5, but it is discarded by this very
                    // replacement and survives nowhere else, so there is
                    // nothing left to observe the zeroing on.
                    (BlockState::Chg, deleted.hash)
                }
                BlockSlot::Live { .. } => {
                    return Err(DiskError::BadBlockState("allocate_blocks: cursor landed on a live slot"))
                }
            };

            let block_index = {
                let file = self.files.get_mut(id).expect("stale FileId");
                file.blockvec.push(Block::new(cursor, state, hash));
                file.blockvec.len() - 1
            };
            self.blockarr[cursor as usize] = BlockSlot::Live { file: id, block_index };
            allocated_any = true;
            cursor += 1;
        }

        if allocated_any {
            self.first_free_block = cursor;
        }
        Ok(())
    }

    /// Remove path: convert every block still owned by file `id` into a
    /// `Deleted` tombstone, applying the BLK/CHG-NEW hash-retention rule
    /// (spec.md §4.5).
    fn release_blocks(&mut self, id: FileId, clear_undeterminate_hash: bool) -> Result<()> {
        let blocks: Vec<Block> = self.files.get(id).expect("stale FileId").blockvec.clone();
        for block in blocks {
            // Kept for completeness per spec.md §9's design note: with
            // removal always preceding insertion in one scan pass, this
            // adjustment cannot actually lower first_free_block below
            // what the insert-side scan would have found anyway.
            if block.parity_pos < self.first_free_block {
                self.first_free_block = block.parity_pos;
            }

            let hash = match block.state {
                BlockState::Blk => block.hash,
                BlockState::Chg | BlockState::New => {
                    if clear_undeterminate_hash {
                        block.hash
                    } else {
                        [0u8; HASH_SIZE]
                    }
                }
                BlockState::Rep => {
                    return Err(DiskError::BadBlockState("release_blocks: REP block encountered"))
                }
            };

            self.blockarr[block.parity_pos as usize] = BlockSlot::Deleted(DeletedBlock {
                parity_pos: block.parity_pos,
                hash,
            });
            self.deletedlist.push(block.parity_pos);
        }
        Ok(())
    }

    // ---- invariant checking (used by tests) ------------------------

    /// Check the invariants of spec.md §4.1/§8 item 1-3. Returns the
    /// first violation found, if any. Not called in production code —
    /// a debug aid for tests.
    pub fn debug_invariants(&self) -> std::result::Result<(), String> {
        for (id, file) in self.files.iter() {
            if self.path_index.get(&file.sub) != Some(&id) {
                return Err(format!("pathset[{}] does not map back to its file", file.sub));
            }
            if !file.without_inode() && self.inode_index.get(&file.inode) != Some(&id) {
                return Err(format!("inodeset[{}] does not map back to its file", file.inode));
            }
            if file.without_inode() && self.inode_index.values().any(|v| *v == id) {
                return Err("a WITHOUT_INODE file is still present in inodeset".to_string());
            }
            for (block_index, block) in file.blockvec.iter().enumerate() {
                match self.blockarr.get(block.parity_pos as usize) {
                    Some(BlockSlot::Live { file: f, block_index: bi }) => {
                        if *f != id || *bi != block_index {
                            return Err(format!(
                                "blockarr[{}] does not point back to file.blockvec[{}]",
                                block.parity_pos, block_index
                            ));
                        }
                    }
                    other => {
                        return Err(format!(
                            "blockarr[{}] is not a live reference to file.blockvec[{}] (found {:?})",
                            block.parity_pos,
                            block_index,
                            other.map(|s| format!("{:?}", s))
                        ))
                    }
                }
            }
        }
        if self.first_free_block as usize > self.blockarr.len() {
            return Err("first_free_block exceeds blockarr length".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkKind;

    fn disk() -> Disk {
        Disk::new("d1", PathBuf::from("/mnt/d1"), 1)
    }

    fn file(sub: &str, size: u64, mtime_sec: i64, inode: u64) -> File {
        File::new(RelativePathBuf::from(sub), size, mtime_sec, 0, inode, None)
    }

    #[test]
    fn insert_file_allocates_requested_blocks_as_new() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 20, 100, 1), 2, false, &mut need_write).unwrap();

        assert!(need_write);
        assert_eq!(d.file(id).blockvec.len(), 2);
        assert!(d.file(id).blockvec.iter().all(|b| b.state == BlockState::New));
        assert_eq!(d.first_free_block, 2);
        d.debug_invariants().unwrap();
    }

    #[test]
    fn remove_then_insert_reuses_freed_slots_as_chg() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 20, 100, 1), 2, false, &mut need_write).unwrap();
        let old_hash = [9u8; HASH_SIZE];
        d.file_mut(id).blockvec[0].state = BlockState::Blk;
        d.file_mut(id).blockvec[0].hash = old_hash;

        d.remove_file(id, false, &mut need_write).unwrap();
        assert_eq!(d.deleted_block_count(), 2);

        // Deletion resets the cursor hint to the lowest freed slot, so
        // the next insert reuses it instead of growing the array.
        let id2 = d.insert_file(file("a", 20, 100, 2), 1, false, &mut need_write).unwrap();
        let blk = d.file(id2).blockvec[0];
        assert_eq!(blk.parity_pos, 0);
        assert_eq!(blk.state, BlockState::Chg);
        assert_eq!(blk.hash, old_hash);
        d.debug_invariants().unwrap();
    }

    #[test]
    fn remove_zeroes_undetermined_hash_unless_told_not_to() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 20, 100, 1), 1, false, &mut need_write).unwrap();
        // Freshly allocated blocks start out NEW.
        assert_eq!(d.file(id).blockvec[0].state, BlockState::New);

        d.remove_file(id, false, &mut need_write).unwrap();
        match &d.blockarr[0] {
            BlockSlot::Deleted(deleted) => assert_eq!(deleted.hash, [0u8; HASH_SIZE]),
            other => panic!("expected Deleted, got {:?}", other),
        }
    }

    #[test]
    fn remove_keeps_new_hash_when_clear_undeterminate_hash_is_set() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 20, 100, 1), 1, false, &mut need_write).unwrap();
        d.file_mut(id).blockvec[0].hash = [3u8; HASH_SIZE];

        d.remove_file(id, true, &mut need_write).unwrap();
        match &d.blockarr[0] {
            BlockSlot::Deleted(deleted) => assert_eq!(deleted.hash, [3u8; HASH_SIZE]),
            other => panic!("expected Deleted, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let mut d = disk();
        let mut need_write = false;
        d.insert_file(file("a", 1, 1, 1), 0, false, &mut need_write).unwrap();
        let err = d.insert_file(file("a", 1, 1, 2), 0, false, &mut need_write).unwrap_err();
        assert!(matches!(err, DiskError::DuplicatePath(_)));
    }

    #[test]
    fn duplicate_inode_is_rejected() {
        let mut d = disk();
        let mut need_write = false;
        d.insert_file(file("a", 1, 1, 1), 0, false, &mut need_write).unwrap();
        let err = d.insert_file(file("b", 1, 1, 1), 0, false, &mut need_write).unwrap_err();
        assert!(matches!(err, DiskError::DuplicateInode(1)));
    }

    #[test]
    fn erase_inode_knowledge_detaches_every_file() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 1, 1, 17), 0, false, &mut need_write).unwrap();

        d.erase_inode_knowledge();
        assert!(d.has_not_persistent_inodes);
        assert!(d.file(id).without_inode());
        assert_eq!(d.file_by_inode(17), None);
        // still findable by path
        assert_eq!(d.file_by_path(RelativePath::new("a")), Some(id));
    }

    #[test]
    fn rename_file_rekeys_the_path_index_only() {
        let mut d = disk();
        let mut need_write = false;
        let id = d.insert_file(file("a", 1, 1, 17), 0, false, &mut need_write).unwrap();

        d.rename_file(id, RelativePathBuf::from("b"));
        assert_eq!(d.file_by_path(RelativePath::new("a")), None);
        assert_eq!(d.file_by_path(RelativePath::new("b")), Some(id));
        assert_eq!(d.file_by_inode(17), Some(id));
    }

    #[test]
    fn links_and_dirs_round_trip_through_insert_remove() {
        let mut d = disk();
        let mut need_write = false;
        let lid = d
            .insert_link(Link::new(RelativePathBuf::from("l"), "target".into(), LinkKind::Symlink), &mut need_write)
            .unwrap();
        assert_eq!(d.link_by_path(RelativePath::new("l")), Some(lid));
        d.remove_link(lid, &mut need_write);
        assert_eq!(d.link_by_path(RelativePath::new("l")), None);

        let did = d.insert_dir(EmptyDir::new(RelativePathBuf::from("e")), &mut need_write).unwrap();
        assert_eq!(d.dir_by_path(RelativePath::new("e")), Some(did));
        d.remove_dir(did, &mut need_write);
        assert_eq!(d.dir_by_path(RelativePath::new("e")), None);
    }
}
