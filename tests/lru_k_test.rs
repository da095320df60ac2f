//! Integration tests for the LRU-K replacer

use stratum::buffer::LruKReplacer;
use stratum::common::FrameId;

#[test]
fn test_lru_k_eviction_order() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i));
        replacer.set_evictable(FrameId::new(i), true);
    }

    assert_eq!(replacer.size(), 5);

    // All frames have a single access (< k = 2), so all have +inf distance
    // and leave in first-access order.
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }

    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_respects_k_distance() {
    let replacer = LruKReplacer::new(2, 10);

    // Frame 0: accessed once (+inf k-distance).
    replacer.record_access(FrameId::new(0));

    // Frames 1 and 2: accessed twice each, frame 1 earlier.
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));
    replacer.record_access(FrameId::new(2));

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

#[test]
fn test_lru_k_young_fifo_tiebreak() {
    // record(1); record(2); record(3); record(1): frame 1 fills its history
    // while frames 2 and 3 stay young. The young frames leave first, in
    // order of first access.
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));
    replacer.record_access(FrameId::new(3));
    replacer.record_access(FrameId::new(1));

    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);
    replacer.set_evictable(FrameId::new(3), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

#[test]
fn test_lru_k_pinned_frames_not_evicted() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));

    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);

    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_toggle_evictable() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);
    assert_eq!(replacer.size(), 2);

    replacer.set_evictable(FrameId::new(0), false);
    assert_eq!(replacer.size(), 1);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), None);

    replacer.set_evictable(FrameId::new(0), true);
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_remove_untracked_is_noop() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.set_evictable(FrameId::new(0), true);

    replacer.remove(FrameId::new(5));
    assert_eq!(replacer.size(), 1);

    replacer.remove(FrameId::new(0));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_k_k_equals_one_degenerates_to_lru() {
    let replacer = LruKReplacer::new(1, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(0));

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    // With k = 1 every frame is mature; frame 1's only sample is older.
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}
