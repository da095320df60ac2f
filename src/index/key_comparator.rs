use std::cmp::Ordering;

use crate::common::IndexKey;

/// External ordering for index keys. The tree never compares raw key bits
/// directly.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: IndexKey, b: IndexKey) -> Ordering;
}

/// Orders keys by their unsigned integer value.
pub struct NumericComparator;

impl KeyComparator for NumericComparator {
    fn compare(&self, a: IndexKey, b: IndexKey) -> Ordering {
        a.cmp(&b)
    }
}

/// Orders keys in reverse numeric order.
pub struct ReverseComparator;

impl KeyComparator for ReverseComparator {
    fn compare(&self, a: IndexKey, b: IndexKey) -> Ordering {
        b.cmp(&a)
    }
}
