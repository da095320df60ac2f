use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Which ordered collection currently holds a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    /// Fewer than k recorded accesses; ordered FIFO by first access.
    Young,
    /// Full history; ordered by the oldest retained sample, i.e. by
    /// backward k-distance.
    Mature,
}

/// Tracks access history for a single frame
#[derive(Debug)]
struct LruKNode {
    /// History of access timestamps, oldest at the front, at most k entries
    history: VecDeque<Timestamp>,
    bucket: Bucket,
    is_evictable: bool,
}

struct ReplacerInner {
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than k samples, in order of first access
    young: VecDeque<FrameId>,
    /// Frames with k samples, keyed by their oldest retained sample.
    /// The smallest key has the largest backward k-distance.
    mature: BTreeSet<(Timestamp, FrameId)>,
    /// Logical clock; every access increments it under the replacer lock,
    /// so timestamps are unique and totally ordered.
    current_timestamp: Timestamp,
    num_evictable: usize,
}

/// LRU-K Replacement Policy
///
/// Evicts the frame whose backward k-distance is the maximum over all
/// evictable frames. Backward k-distance is the difference between the
/// current timestamp and the timestamp of the k-th previous access.
///
/// A frame with fewer than k historical accesses has +inf backward
/// k-distance; among those, the one with the earliest first access is
/// evicted first.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            k,
            max_frames,
            inner: Mutex::new(ReplacerInner {
                nodes: HashMap::new(),
                young: VecDeque::new(),
                mature: BTreeSet::new(),
                current_timestamp: 0,
                num_evictable: 0,
            }),
        }
    }

    /// Evicts the frame with the largest backward k-distance and drops its
    /// tracking state. Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.num_evictable == 0 {
            return None;
        }

        // Young frames all have +inf distance and take priority, in FIFO
        // order of entry.
        let nodes = &inner.nodes;
        if let Some(pos) = inner.young.iter().position(|fid| nodes[fid].is_evictable) {
            let frame_id = inner.young.remove(pos).unwrap();
            inner.nodes.remove(&frame_id);
            inner.num_evictable -= 1;
            return Some(frame_id);
        }

        // Mature frames are ordered by oldest sample: the first evictable
        // entry has the largest backward k-distance.
        let victim = inner
            .mature
            .iter()
            .find(|(_, fid)| nodes[fid].is_evictable)
            .copied();
        if let Some(key) = victim {
            inner.mature.remove(&key);
            inner.nodes.remove(&key.1);
            inner.num_evictable -= 1;
            return Some(key.1);
        }

        None
    }

    /// Records that the given frame was accessed, stamping it with the next
    /// logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let timestamp = inner.current_timestamp;
        inner.current_timestamp += 1;

        match inner.nodes.get_mut(&frame_id) {
            None => {
                inner.nodes.insert(
                    frame_id,
                    LruKNode {
                        history: VecDeque::from([timestamp]),
                        bucket: Bucket::Young,
                        is_evictable: false,
                    },
                );
                inner.young.push_back(frame_id);
            }
            Some(node) => match node.bucket {
                Bucket::Young => {
                    node.history.push_back(timestamp);
                }
                Bucket::Mature => {
                    let old_key = (*node.history.front().unwrap(), frame_id);
                    node.history.push_back(timestamp);
                    while node.history.len() > self.k {
                        node.history.pop_front();
                    }
                    let new_key = (*node.history.front().unwrap(), frame_id);
                    inner.mature.remove(&old_key);
                    inner.mature.insert(new_key);
                }
            },
        }

        // Promote a young frame once its k-th sample arrives; its position
        // among mature frames is dictated by its oldest sample.
        let node = inner.nodes.get_mut(&frame_id).unwrap();
        if node.bucket == Bucket::Young && node.history.len() >= self.k {
            node.bucket = Bucket::Mature;
            let key = (*node.history.front().unwrap(), frame_id);
            let pos = inner
                .young
                .iter()
                .position(|fid| *fid == frame_id)
                .unwrap();
            inner.young.remove(pos);
            inner.mature.insert(key);
        }
    }

    /// Sets whether a frame is evictable. The frame must be tracked.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let node = match inner.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => panic!("set_evictable: {} is not tracked by the replacer", frame_id),
        };

        if node.is_evictable != is_evictable {
            node.is_evictable = is_evictable;
            if is_evictable {
                inner.num_evictable += 1;
            } else {
                inner.num_evictable -= 1;
            }
        }
    }

    /// Removes a frame from the replacer entirely. No-op if the frame is not
    /// tracked; removing a tracked non-evictable frame is a contract
    /// violation.
    pub fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(node) = inner.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "remove: {} is pinned and cannot leave the replacer",
            frame_id
        );

        match node.bucket {
            Bucket::Young => {
                let pos = inner
                    .young
                    .iter()
                    .position(|fid| *fid == frame_id)
                    .unwrap();
                inner.young.remove(pos);
            }
            Bucket::Mature => {
                let key = (*node.history.front().unwrap(), frame_id);
                inner.mature.remove(&key);
            }
        }
        inner.nodes.remove(&frame_id);
        inner.num_evictable -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_k_replacer_new() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_young_fifo() {
        let replacer = LruKReplacer::new(2, 10);

        for i in 0..5 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }
        assert_eq!(replacer.size(), 5);

        // All have a single access, so all have +inf distance; eviction
        // follows first-access order.
        for i in 0..5 {
            assert_eq!(replacer.evict(), Some(FrameId::new(i)));
        }
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_young_before_mature() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0 gets k accesses, frame 1 only one.
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 has +inf distance, so it goes first.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_largest_k_distance() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0: t=0,1; frame 1: t=2,3; frame 2: t=4,5.
        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.record_access(FrameId::new(i));
        }
        for i in 0..3 {
            replacer.set_evictable(FrameId::new(i), true);
        }

        // Frame 0's k-th most recent access is the oldest, so its backward
        // k-distance is the largest.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_lru_k_replacer_mixed_young_and_mature() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));
        replacer.record_access(FrameId::new(3));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(1), true);
        replacer.set_evictable(FrameId::new(2), true);
        replacer.set_evictable(FrameId::new(3), true);

        // Frames 2 and 3 still have +inf distance; frame 2 was seen first.
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(3)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_remove() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        // Removing an untracked frame is a no-op.
        replacer.remove(FrameId::new(7));
    }

    #[test]
    #[should_panic(expected = "cannot leave the replacer")]
    fn test_lru_k_replacer_remove_pinned_panics() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.remove(FrameId::new(0));
    }

    #[test]
    fn test_lru_k_replacer_reaccess_reorders_mature() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0: t=0,1; frame 1: t=2,3; then frame 0 again at t=4.
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(0));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0's retained window is now t=1,4 and frame 1's is t=2,3;
        // frame 0's oldest sample is older, so it is still evicted first.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
