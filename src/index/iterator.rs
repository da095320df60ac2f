use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{IndexKey, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::LeafNodeRef;

/// Forward cursor over the leaf chain of a B+tree.
///
/// Holds a read guard on the current leaf; advancing past a leaf releases
/// it before the next leaf's guard is acquired. The cursor guarantees that
/// each step sees a valid leaf, not a stable snapshot under concurrent
/// mutation.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    /// Identity of the owning tree; iterators of different trees never
    /// compare equal.
    tree_id: u64,
    /// Current leaf, or None at the end.
    leaf: Option<ReadPageGuard>,
    slot: usize,
}

impl IndexIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        tree_id: u64,
        leaf: Option<ReadPageGuard>,
        slot: usize,
    ) -> Result<Self> {
        let mut iter = Self {
            bpm,
            tree_id,
            leaf,
            slot,
        };
        iter.skip_exhausted()?;
        Ok(iter)
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>, tree_id: u64) -> Self {
        Self {
            bpm,
            tree_id,
            leaf: None,
            slot: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.leaf.is_none()
    }

    /// The (key, record id) pair under the cursor, or None at the end.
    pub fn entry(&self) -> Option<(IndexKey, RecordId)> {
        let guard = self.leaf.as_ref()?;
        let leaf = LeafNodeRef::new(guard.data());
        debug_assert!(self.slot < leaf.size() as usize);
        Some(leaf.entry_at(self.slot))
    }

    /// Steps to the next entry, following the leaf chain as needed.
    pub fn advance(&mut self) -> Result<()> {
        if self.leaf.is_none() {
            return Ok(());
        }
        self.slot += 1;
        self.skip_exhausted()
    }

    /// Moves past leaves whose entries are exhausted. Releases the current
    /// leaf's guard before acquiring the next one.
    fn skip_exhausted(&mut self) -> Result<()> {
        loop {
            let Some(guard) = self.leaf.as_ref() else {
                return Ok(());
            };
            let (size, next) = {
                let leaf = LeafNodeRef::new(guard.data());
                (leaf.size() as usize, leaf.next_leaf_id())
            };
            if self.slot < size {
                return Ok(());
            }

            self.leaf = None;
            if next == INVALID_PAGE_ID {
                return Ok(());
            }
            self.leaf = Some(self.bpm.fetch_page_read(next)?);
            self.slot = 0;
        }
    }

    /// Returns the current entry and advances, or None at the end.
    pub fn next(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        let Some(entry) = self.entry() else {
            return Ok(None);
        };
        self.advance()?;
        Ok(Some(entry))
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        if self.tree_id != other.tree_id {
            return false;
        }
        match (self.leaf.as_ref(), other.leaf.as_ref()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.page_id() == b.page_id() && self.slot == other.slot,
            _ => false,
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match IndexIterator::next(self) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
