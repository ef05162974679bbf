use crate::prelude::*;

mod bptree;
mod field_index;

pub use bptree::{BPTreeIndex, Double, FixedStr, Key, LeafRun};
pub(crate) use field_index::FieldIndex;

mod prelude {
    pub(crate) use super::*;
}
