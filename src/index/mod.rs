pub mod btree;
pub mod btree_page;
pub mod iterator;
pub mod key_comparator;

pub use btree::BPlusTree;
pub use btree_page::{node_kind, NodeKind, MAX_INTERNAL_SIZE, MAX_LEAF_SIZE};
pub use iterator::IndexIterator;
pub use key_comparator::{KeyComparator, NumericComparator, ReverseComparator};
