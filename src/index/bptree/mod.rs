use super::prelude::*;

mod core;
mod key;
mod meta;
mod node;

pub use self::core::{BPTreeIndex, LeafRun};
pub use key::{Double, FixedStr, Key};

mod prelude {
    pub(super) use super::*;
    pub(super) use meta::{NodeMeta, TreeMeta, NODE_META_SIZE, TREE_META_SIZE};
    pub(super) use node::{Node, NodeBody};
    pub(super) use std::marker::PhantomData;
}
