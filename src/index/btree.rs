use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{IndexKey, PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::{
    node_kind, InternalNode, InternalNodeRef, LeafNode, LeafNodeRef, NodeKind, TreeHeader,
    TreeHeaderRef, MAX_INTERNAL_SIZE, MAX_LEAF_SIZE,
};
use super::iterator::IndexIterator;
use super::key_comparator::KeyComparator;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// Write-latched path retained during a mutation.
///
/// Guards are pushed root-first. Once a node proves "safe" (it can absorb
/// the mutation without structural change) everything above it, header
/// included, is released.
struct Context {
    header: Option<WritePageGuard>,
    write_set: Vec<WritePageGuard>,
}

/// Index of the first entry that moves to the new right sibling when a
/// node holding max_size + 1 entries splits. An odd max leaves the extra
/// entry on the left half.
fn split_point(max_size: usize) -> usize {
    if max_size % 2 == 1 {
        max_size / 2 + 1
    } else {
        max_size / 2
    }
}

/// A concurrent B+tree index over the buffer pool.
///
/// The tree owns only its header page id; the header page stores the root
/// page id. Traversals use latch crabbing: lookups hand read latches down
/// the path, mutations keep the write-latched prefix that might still be
/// structurally modified and release it as soon as a safe node proves it
/// cannot be.
pub struct BPlusTree {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    leaf_max_size: u32,
    internal_max_size: u32,
    /// Serializes root id swaps in the header page.
    root_latch: Mutex<()>,
    /// Identity token compared by iterators.
    tree_id: u64,
}

impl BPlusTree {
    /// Creates an empty tree, allocating its header page.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        assert!(
            (2..=MAX_LEAF_SIZE).contains(&leaf_max_size),
            "leaf_max_size out of range"
        );
        assert!(
            (3..=MAX_INTERNAL_SIZE).contains(&internal_max_size),
            "internal_max_size out of range"
        );

        let mut header_guard = bpm.new_page()?;
        let header_page_id = header_guard.page_id();
        {
            let mut data = header_guard.data_mut();
            TreeHeader::new(&mut data).set_root_page_id(INVALID_PAGE_ID);
        }
        drop(header_guard);

        Ok(Self {
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_latch: Mutex::new(()),
            tree_id: NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed),
        })
    }

    /// Adopts an existing tree by its header page id.
    pub fn open(
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Self {
        Self {
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_latch: Mutex::new(()),
            tree_id: NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Reads the current root page id from the header page.
    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(TreeHeaderRef::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root_page_id()? == INVALID_PAGE_ID)
    }

    /// Point lookup. Descends with read latches, releasing each parent once
    /// its child is held.
    pub fn get_value(&self, key: IndexKey) -> Result<Option<RecordId>> {
        let root_id = self.root_page_id()?;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        loop {
            match node_kind(guard.data()) {
                NodeKind::Internal => {
                    let child_id = {
                        let node = InternalNodeRef::new(guard.data());
                        node.child_at(node.child_index(key, &*self.comparator))
                    };
                    let child = self.bpm.fetch_page_read(child_id)?;
                    // The parent latch is released only now, by replacement.
                    guard = child;
                }
                NodeKind::Leaf => {
                    let leaf = LeafNodeRef::new(guard.data());
                    let pos = leaf.lower_bound(key, &*self.comparator);
                    if pos < leaf.size() as usize
                        && self.comparator.compare(leaf.key_at(pos), key) == Ordering::Equal
                    {
                        return Ok(Some(leaf.rid_at(pos)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Inserts a key/record pair. Returns false without modification if the
    /// key already exists.
    pub fn insert(&self, key: IndexKey, rid: RecordId) -> Result<bool> {
        let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = TreeHeaderRef::new(header_guard.data()).root_page_id();

        if root_id == INVALID_PAGE_ID {
            let mut root_guard = self.bpm.new_page()?;
            let root_id = root_guard.page_id();
            {
                let mut data = root_guard.data_mut();
                let mut leaf = LeafNode::new(&mut data);
                leaf.init(self.leaf_max_size);
                leaf.insert_at(0, key, rid);
            }
            drop(root_guard);

            let _swap = self.root_latch.lock();
            TreeHeader::new(header_guard.data_mut()).set_root_page_id(root_id);
            debug!(root = root_id.as_u32(), "started new tree");
            return Ok(true);
        }

        let mut ctx = Context {
            header: Some(header_guard),
            write_set: Vec::new(),
        };
        ctx.write_set.push(self.bpm.fetch_page_write(root_id)?);

        loop {
            let child_id = {
                let top = ctx.write_set.last().unwrap();
                let data = top.data();
                if node_kind(data) == NodeKind::Leaf {
                    break;
                }
                let node = InternalNodeRef::new(data);
                node.child_at(node.child_index(key, &*self.comparator))
            };

            let child = self.bpm.fetch_page_write(child_id)?;
            // A child with room for one more entry cannot split, so nothing
            // above it will be modified: release the retained prefix.
            let child_safe = {
                let data = child.data();
                match node_kind(data) {
                    NodeKind::Leaf => {
                        let node = LeafNodeRef::new(data);
                        node.size() < node.max_size()
                    }
                    NodeKind::Internal => {
                        let node = InternalNodeRef::new(data);
                        node.size() < node.max_size()
                    }
                }
            };
            if child_safe {
                ctx.write_set.clear();
                ctx.header = None;
            }
            ctx.write_set.push(child);
        }

        self.insert_into_leaf(&mut ctx, key, rid)
    }

    fn insert_into_leaf(&self, ctx: &mut Context, key: IndexKey, rid: RecordId) -> Result<bool> {
        let mut leaf_guard = ctx
            .write_set
            .pop()
            .expect("descent always ends at a leaf");
        let leaf_pid = leaf_guard.page_id();

        let (pos, size, max, duplicate) = {
            let leaf = LeafNodeRef::new(leaf_guard.data());
            let pos = leaf.lower_bound(key, &*self.comparator);
            let duplicate = pos < leaf.size() as usize
                && self.comparator.compare(leaf.key_at(pos), key) == Ordering::Equal;
            (pos, leaf.size(), leaf.max_size(), duplicate)
        };
        if duplicate {
            return Ok(false);
        }

        if size < max {
            LeafNode::new(leaf_guard.data_mut()).insert_at(pos, key, rid);
            return Ok(true);
        }

        // Split: distribute the max + 1 entries over the old leaf and a new
        // right sibling. The separator is the first key of the right half.
        let mut entries: Vec<(IndexKey, RecordId)> = {
            let leaf = LeafNodeRef::new(leaf_guard.data());
            (0..size as usize).map(|i| leaf.entry_at(i)).collect()
        };
        entries.insert(pos, (key, rid));
        let right_entries = entries.split_off(split_point(max as usize));
        let separator = right_entries[0].0;
        let old_next = LeafNodeRef::new(leaf_guard.data()).next_leaf_id();

        let mut new_guard = self.bpm.new_page()?;
        let new_pid = new_guard.page_id();
        {
            let mut data = new_guard.data_mut();
            let mut new_leaf = LeafNode::new(&mut data);
            new_leaf.init(max);
            new_leaf.write_entries(&right_entries);
            new_leaf.set_next_leaf_id(old_next);
        }
        {
            let mut leaf = LeafNode::new(leaf_guard.data_mut());
            leaf.write_entries(&entries);
            leaf.set_next_leaf_id(new_pid);
        }
        drop(new_guard);
        drop(leaf_guard);

        self.insert_into_parent(ctx, separator, leaf_pid, new_pid)?;
        Ok(true)
    }

    /// Installs the separator for a freshly split child, splitting upward
    /// as needed. `left_pid` is the page that kept the lower half.
    fn insert_into_parent(
        &self,
        ctx: &mut Context,
        separator: IndexKey,
        left_pid: PageId,
        right_pid: PageId,
    ) -> Result<()> {
        let Some(mut parent_guard) = ctx.write_set.pop() else {
            // The split ran off the top of the retained path: the root
            // itself split, so a new root takes both halves.
            let header_guard = ctx
                .header
                .as_mut()
                .expect("root split requires the header guard");

            let mut root_guard = self.bpm.new_page()?;
            let new_root_id = root_guard.page_id();
            {
                let mut data = root_guard.data_mut();
                let mut root = InternalNode::new(&mut data);
                root.init(self.internal_max_size);
                root.write_entries(&[(0, left_pid), (separator, right_pid)]);
            }
            drop(root_guard);

            let _swap = self.root_latch.lock();
            TreeHeader::new(header_guard.data_mut()).set_root_page_id(new_root_id);
            debug!(root = new_root_id.as_u32(), "root split");
            return Ok(());
        };
        let parent_pid = parent_guard.page_id();

        let (idx, size, max) = {
            let node = InternalNodeRef::new(parent_guard.data());
            (
                node.upper_bound(separator, &*self.comparator),
                node.size(),
                node.max_size(),
            )
        };

        if size < max {
            InternalNode::new(parent_guard.data_mut()).insert_at(idx, separator, right_pid);
            return Ok(());
        }

        // Split symmetrically: the middle key moves up and its child leads
        // the new right sibling.
        let mut entries: Vec<(IndexKey, PageId)> = {
            let node = InternalNodeRef::new(parent_guard.data());
            (0..size as usize).map(|i| node.entry_at(i)).collect()
        };
        entries.insert(idx, (separator, right_pid));
        let right_entries = entries.split_off(split_point(max as usize));
        let push_up = right_entries[0].0;

        let mut new_guard = self.bpm.new_page()?;
        let new_pid = new_guard.page_id();
        {
            let mut data = new_guard.data_mut();
            let mut new_node = InternalNode::new(&mut data);
            new_node.init(max);
            // Entry 0's key is stale after this, which readers never see.
            new_node.write_entries(&right_entries);
        }
        {
            InternalNode::new(parent_guard.data_mut()).write_entries(&entries);
        }
        drop(new_guard);
        drop(parent_guard);

        self.insert_into_parent(ctx, push_up, parent_pid, new_pid)
    }

    /// Removes a key. Absent keys are a silent no-op.
    pub fn remove(&self, key: IndexKey) -> Result<()> {
        let header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = TreeHeaderRef::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let mut header = Some(header_guard);
        // Each entry pairs a write guard with the node's child index within
        // its parent, recorded during the descent.
        let mut stack: Vec<(WritePageGuard, usize)> = Vec::new();
        stack.push((self.bpm.fetch_page_write(root_id)?, 0));

        loop {
            let (child_id, child_idx) = {
                let (top, _) = stack.last().unwrap();
                let data = top.data();
                if node_kind(data) == NodeKind::Leaf {
                    break;
                }
                let node = InternalNodeRef::new(data);
                let idx = node.child_index(key, &*self.comparator);
                (node.child_at(idx), idx)
            };

            let child = self.bpm.fetch_page_write(child_id)?;
            // A child above minimum occupancy absorbs the deletion without
            // rebalancing: release the retained prefix.
            let child_safe = {
                let data = child.data();
                match node_kind(data) {
                    NodeKind::Leaf => {
                        let node = LeafNodeRef::new(data);
                        node.size() > node.min_size()
                    }
                    NodeKind::Internal => {
                        let node = InternalNodeRef::new(data);
                        node.size() > node.min_size()
                    }
                }
            };
            if child_safe {
                stack.clear();
                header = None;
            }
            stack.push((child, child_idx));
        }

        let (mut leaf_guard, leaf_idx) = stack.pop().unwrap();
        let pos = {
            let leaf = LeafNodeRef::new(leaf_guard.data());
            let pos = leaf.lower_bound(key, &*self.comparator);
            if pos >= leaf.size() as usize
                || self.comparator.compare(leaf.key_at(pos), key) != Ordering::Equal
            {
                return Ok(());
            }
            pos
        };
        LeafNode::new(leaf_guard.data_mut()).remove_at(pos);

        if stack.is_empty() {
            // Either the leaf proved safe during the descent, or it is the
            // root (the header is then still held). A root leaf is exempt
            // from minimum occupancy; emptying it empties the tree.
            if let Some(mut header_guard) = header {
                if LeafNodeRef::new(leaf_guard.data()).size() == 0 {
                    let leaf_pid = leaf_guard.page_id();
                    drop(leaf_guard);
                    let _swap = self.root_latch.lock();
                    TreeHeader::new(header_guard.data_mut())
                        .set_root_page_id(INVALID_PAGE_ID);
                    drop(header_guard);
                    let _ = self.bpm.delete_page(leaf_pid);
                    debug!("tree emptied");
                }
            }
            return Ok(());
        }

        // The leaf underflowed beneath a retained path: rebalance upward.
        let mut node_guard = leaf_guard;
        let mut node_idx = leaf_idx;
        loop {
            if stack.is_empty() {
                // node_guard is the deepest retained ancestor. With the
                // header still held it is the root; an internal root left
                // with a single child hands its role to that child.
                if header.is_some() {
                    let collapse = {
                        let data = node_guard.data();
                        node_kind(data) == NodeKind::Internal
                            && InternalNodeRef::new(data).size() == 1
                    };
                    if collapse {
                        let header_guard = header.as_mut().unwrap();
                        let only_child = InternalNodeRef::new(node_guard.data()).child_at(0);
                        let old_root = node_guard.page_id();
                        drop(node_guard);
                        let _swap = self.root_latch.lock();
                        TreeHeader::new(header_guard.data_mut()).set_root_page_id(only_child);
                        let _ = self.bpm.delete_page(old_root);
                        debug!(root = only_child.as_u32(), "root collapsed");
                    }
                }
                return Ok(());
            }

            let underflow = {
                let data = node_guard.data();
                match node_kind(data) {
                    NodeKind::Leaf => {
                        let node = LeafNodeRef::new(data);
                        node.size() < node.min_size()
                    }
                    NodeKind::Internal => {
                        let node = InternalNodeRef::new(data);
                        node.size() < node.min_size()
                    }
                }
            };
            if !underflow {
                return Ok(());
            }

            let (mut parent_guard, parent_idx) = stack.pop().unwrap();
            self.rebalance(&mut parent_guard, node_guard, node_idx)?;
            node_guard = parent_guard;
            node_idx = parent_idx;
        }
    }

    /// Restores minimum occupancy of an underflowing node by redistributing
    /// from a sibling with surplus, or merging with one at minimum. The
    /// parent loses one entry on merge; the caller re-examines it.
    fn rebalance(
        &self,
        parent_guard: &mut WritePageGuard,
        node_guard: WritePageGuard,
        node_idx: usize,
    ) -> Result<()> {
        let parent_size = InternalNodeRef::new(parent_guard.data()).size() as usize;
        debug_assert!(parent_size >= 2, "internal node with a lone child");

        if node_idx > 0 {
            let left_id = InternalNodeRef::new(parent_guard.data()).child_at(node_idx - 1);
            let left_guard = self.bpm.fetch_page_write(left_id)?;

            if Self::has_surplus(&left_guard) {
                self.borrow_from_left(parent_guard, left_guard, node_guard, node_idx);
                return Ok(());
            }

            if node_idx + 1 < parent_size {
                let right_id = InternalNodeRef::new(parent_guard.data()).child_at(node_idx + 1);
                let right_guard = self.bpm.fetch_page_write(right_id)?;
                if Self::has_surplus(&right_guard) {
                    self.borrow_from_right(parent_guard, node_guard, right_guard, node_idx);
                    return Ok(());
                }
            }

            // Both siblings at minimum: fold the node into its left sibling.
            self.merge_into_left(parent_guard, left_guard, node_guard, node_idx)
        } else {
            let right_id = InternalNodeRef::new(parent_guard.data()).child_at(1);
            let right_guard = self.bpm.fetch_page_write(right_id)?;

            if Self::has_surplus(&right_guard) {
                self.borrow_from_right(parent_guard, node_guard, right_guard, node_idx);
                return Ok(());
            }

            self.merge_into_left(parent_guard, node_guard, right_guard, 1)
        }
    }

    fn has_surplus(guard: &WritePageGuard) -> bool {
        let data = guard.data();
        match node_kind(data) {
            NodeKind::Leaf => {
                let node = LeafNodeRef::new(data);
                node.size() > node.min_size()
            }
            NodeKind::Internal => {
                let node = InternalNodeRef::new(data);
                node.size() > node.min_size()
            }
        }
    }

    /// Moves the left sibling's last entry across the separator at
    /// `parent.key(node_idx)`.
    fn borrow_from_left(
        &self,
        parent_guard: &mut WritePageGuard,
        mut left_guard: WritePageGuard,
        mut node_guard: WritePageGuard,
        node_idx: usize,
    ) {
        match node_kind(node_guard.data()) {
            NodeKind::Leaf => {
                let last = LeafNodeRef::new(left_guard.data()).size() as usize - 1;
                let (key, rid) = LeafNodeRef::new(left_guard.data()).entry_at(last);
                LeafNode::new(left_guard.data_mut()).remove_at(last);
                LeafNode::new(node_guard.data_mut()).insert_at(0, key, rid);
                InternalNode::new(parent_guard.data_mut()).set_key_at(node_idx, key);
            }
            NodeKind::Internal => {
                let last = InternalNodeRef::new(left_guard.data()).size() as usize - 1;
                let (lkey, lchild) = InternalNodeRef::new(left_guard.data()).entry_at(last);
                let separator = InternalNodeRef::new(parent_guard.data()).key_at(node_idx);
                {
                    let mut node = InternalNode::new(node_guard.data_mut());
                    let old_first_child = node.child_at(0);
                    // The separator comes down in front of the old leftmost
                    // child; the borrowed child becomes the new leftmost.
                    node.insert_at(1, separator, old_first_child);
                    node.set_child_at(0, lchild);
                }
                InternalNode::new(parent_guard.data_mut()).set_key_at(node_idx, lkey);
                InternalNode::new(left_guard.data_mut()).remove_at(last);
            }
        }
    }

    /// Moves the right sibling's first entry across the separator at
    /// `parent.key(node_idx + 1)`.
    fn borrow_from_right(
        &self,
        parent_guard: &mut WritePageGuard,
        mut node_guard: WritePageGuard,
        mut right_guard: WritePageGuard,
        node_idx: usize,
    ) {
        match node_kind(node_guard.data()) {
            NodeKind::Leaf => {
                let (key, rid) = LeafNodeRef::new(right_guard.data()).entry_at(0);
                LeafNode::new(right_guard.data_mut()).remove_at(0);
                let new_first = LeafNodeRef::new(right_guard.data()).key_at(0);
                let size = LeafNodeRef::new(node_guard.data()).size() as usize;
                LeafNode::new(node_guard.data_mut()).insert_at(size, key, rid);
                InternalNode::new(parent_guard.data_mut()).set_key_at(node_idx + 1, new_first);
            }
            NodeKind::Internal => {
                let separator = InternalNodeRef::new(parent_guard.data()).key_at(node_idx + 1);
                let first_child = InternalNodeRef::new(right_guard.data()).child_at(0);
                let new_separator = InternalNodeRef::new(right_guard.data()).key_at(1);
                {
                    let mut node = InternalNode::new(node_guard.data_mut());
                    let size = node.size() as usize;
                    // The separator comes down as the key of the appended
                    // child borrowed from the right.
                    node.insert_at(size, separator, first_child);
                }
                InternalNode::new(parent_guard.data_mut()).set_key_at(node_idx + 1, new_separator);
                {
                    let mut right = InternalNode::new(right_guard.data_mut());
                    let second_child = right.child_at(1);
                    right.set_child_at(0, second_child);
                    right.remove_at(1);
                }
            }
        }
    }

    /// Folds the right participant into the left one and removes the
    /// separator entry at `right_idx` from the parent. The right page is
    /// released back to the pool.
    fn merge_into_left(
        &self,
        parent_guard: &mut WritePageGuard,
        mut left_guard: WritePageGuard,
        right_guard: WritePageGuard,
        right_idx: usize,
    ) -> Result<()> {
        let right_pid = right_guard.page_id();

        match node_kind(left_guard.data()) {
            NodeKind::Leaf => {
                let (entries, next) = {
                    let right = LeafNodeRef::new(right_guard.data());
                    let entries: Vec<(IndexKey, RecordId)> =
                        (0..right.size() as usize).map(|i| right.entry_at(i)).collect();
                    (entries, right.next_leaf_id())
                };
                let mut left = LeafNode::new(left_guard.data_mut());
                for (key, rid) in entries {
                    let size = left.size() as usize;
                    left.insert_at(size, key, rid);
                }
                left.set_next_leaf_id(next);
            }
            NodeKind::Internal => {
                let separator = InternalNodeRef::new(parent_guard.data()).key_at(right_idx);
                let entries: Vec<(IndexKey, PageId)> = {
                    let right = InternalNodeRef::new(right_guard.data());
                    (0..right.size() as usize).map(|i| right.entry_at(i)).collect()
                };
                let mut left = InternalNode::new(left_guard.data_mut());
                // The separator comes down between the two halves, keyed to
                // the right participant's leftmost child.
                let size = left.size() as usize;
                left.insert_at(size, separator, entries[0].1);
                for &(key, child) in &entries[1..] {
                    let size = left.size() as usize;
                    left.insert_at(size, key, child);
                }
            }
        }

        InternalNode::new(parent_guard.data_mut()).remove_at(right_idx);
        drop(right_guard);
        drop(left_guard);
        // A lagging scan may still pin the right page; failing to recycle
        // its id loses nothing but reuse.
        let _ = self.bpm.delete_page(right_pid);
        Ok(())
    }

    /// Iterator positioned at the first entry of the leftmost leaf.
    pub fn begin(&self) -> Result<IndexIterator> {
        let root_id = self.root_page_id()?;
        if root_id == INVALID_PAGE_ID {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm), self.tree_id));
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        loop {
            match node_kind(guard.data()) {
                NodeKind::Internal => {
                    let child_id = InternalNodeRef::new(guard.data()).child_at(0);
                    let child = self.bpm.fetch_page_read(child_id)?;
                    guard = child;
                }
                NodeKind::Leaf => break,
            }
        }
        IndexIterator::new(Arc::clone(&self.bpm), self.tree_id, Some(guard), 0)
    }

    /// Iterator positioned at the first entry whose key is not less than
    /// `key`.
    pub fn begin_at(&self, key: IndexKey) -> Result<IndexIterator> {
        let root_id = self.root_page_id()?;
        if root_id == INVALID_PAGE_ID {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm), self.tree_id));
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        loop {
            match node_kind(guard.data()) {
                NodeKind::Internal => {
                    let child_id = {
                        let node = InternalNodeRef::new(guard.data());
                        node.child_at(node.child_index(key, &*self.comparator))
                    };
                    let child = self.bpm.fetch_page_read(child_id)?;
                    guard = child;
                }
                NodeKind::Leaf => break,
            }
        }
        let slot = LeafNodeRef::new(guard.data()).lower_bound(key, &*self.comparator);
        IndexIterator::new(Arc::clone(&self.bpm), self.tree_id, Some(guard), slot)
    }

    /// The past-the-end iterator.
    pub fn end(&self) -> IndexIterator {
        IndexIterator::end(Arc::clone(&self.bpm), self.tree_id)
    }
}
