use super::*;

pub(super) const TREE_META_SIZE: u64 = 16;
pub(super) const NODE_META_SIZE: usize = 32;

/// Index file header: root node offset and head of the free block list, `-1` when unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct TreeMeta {
    pub(super) root: i64,
    pub(super) free_head: i64,
}

impl Default for TreeMeta {
    fn default() -> Self {
        Self {
            root: NULL_OFFSET,
            free_head: NULL_OFFSET,
        }
    }
}

impl TreeMeta {
    pub(super) fn serialized_size_default() -> bincode::Result<u64> {
        let meta = Self::default();
        meta.serialized_size()
    }

    #[inline]
    pub(super) fn serialized_size(&self) -> bincode::Result<u64> {
        bincode::serialized_size(&self)
    }

    #[inline]
    pub(super) fn from_raw(buf: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(buf)
    }

    #[inline]
    pub(super) fn to_raw(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(&self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub(super) struct NodeMeta {
    pub(super) size: u64,
    pub(super) is_leaf: u64,
    pub(super) prev: i64,
    pub(super) next: i64,
}

impl NodeMeta {
    pub(super) fn new(size: usize, is_leaf: bool, prev: i64, next: i64) -> Self {
        Self {
            size: size as u64,
            is_leaf: u64::from(is_leaf),
            prev,
            next,
        }
    }

    #[inline]
    pub(super) fn serialized_size(&self) -> bincode::Result<u64> {
        bincode::serialized_size(&self)
    }

    pub(super) fn serialized_size_default() -> bincode::Result<u64> {
        let meta = Self::default();
        meta.serialized_size()
    }
}

static_assertions::const_assert_eq!(NODE_META_SIZE, 4 * IX_SIZE as usize);
static_assertions::const_assert_eq!(TREE_META_SIZE, 2 * IX_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_sizes_are_pinned() {
        assert_eq!(TreeMeta::serialized_size_default().unwrap(), TREE_META_SIZE);
        assert_eq!(
            NodeMeta::serialized_size_default().unwrap(),
            NODE_META_SIZE as u64
        );
        let raw = TreeMeta::default().to_raw().unwrap();
        assert_eq!(raw, [[0xffu8; 8], [0xffu8; 8]].concat());
        assert_eq!(TreeMeta::from_raw(&raw).unwrap(), TreeMeta::default());
    }
}
