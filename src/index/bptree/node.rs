use super::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum NodeBody {
    /// `keys.len() + 1` child block offsets
    Internal { children: Vec<u64> },
    /// one record id per key, siblings form the ordered leaf chain
    Leaf { data: Vec<i64>, prev: i64, next: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Node<K> {
    pub(super) offset: u64,
    pub(super) keys: Vec<K>,
    pub(super) body: NodeBody,
}

impl<K: Key> Node<K> {
    pub(super) fn new_leaf(offset: u64) -> Self {
        Self {
            offset,
            keys: Vec::new(),
            body: NodeBody::Leaf {
                data: Vec::new(),
                prev: NULL_OFFSET,
                next: NULL_OFFSET,
            },
        }
    }

    pub(super) fn new_internal(offset: u64, keys: Vec<K>, children: Vec<u64>) -> Self {
        Self {
            offset,
            keys,
            body: NodeBody::Internal { children },
        }
    }

    pub(super) fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    pub(super) fn len(&self) -> usize {
        self.keys.len()
    }

    /// First position whose key is `>= key`.
    pub(super) fn lower_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// First position whose key is `> key`; equal keys route right.
    pub(super) fn upper_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    pub(super) fn children(&self) -> Result<&[u64]> {
        match &self.body {
            NodeBody::Internal { children } => Ok(children),
            NodeBody::Leaf { .. } => Err(self.unexpected("internal")),
        }
    }

    pub(super) fn children_mut(&mut self) -> Result<&mut Vec<u64>> {
        match &mut self.body {
            NodeBody::Internal { children } => Ok(children),
            NodeBody::Leaf { .. } => Err(Error::corrupted(format!(
                "node at {} is a leaf, internal expected",
                self.offset
            ))
            .into()),
        }
    }

    pub(super) fn data(&self) -> Result<&[i64]> {
        match &self.body {
            NodeBody::Leaf { data, .. } => Ok(data),
            NodeBody::Internal { .. } => Err(self.unexpected("leaf")),
        }
    }

    /// `(prev, next)` siblings of a leaf.
    pub(super) fn siblings(&self) -> Result<(i64, i64)> {
        match &self.body {
            NodeBody::Leaf { prev, next, .. } => Ok((*prev, *next)),
            NodeBody::Internal { .. } => Err(self.unexpected("leaf")),
        }
    }

    pub(super) fn set_prev(&mut self, offset: i64) {
        if let NodeBody::Leaf { prev, .. } = &mut self.body {
            *prev = offset;
        }
    }

    pub(super) fn set_next(&mut self, offset: i64) {
        if let NodeBody::Leaf { next, .. } = &mut self.body {
            *next = offset;
        }
    }

    fn unexpected(&self, expected: &str) -> anyhow::Error {
        Error::corrupted(format!(
            "node at {} has wrong kind, {} expected",
            self.offset, expected
        ))
        .into()
    }

    pub(super) fn serialize(&self, key_size: usize, block_size: usize) -> Result<BytesMut> {
        let (meta, pointers): (NodeMeta, Vec<i64>) = match &self.body {
            NodeBody::Internal { children } => (
                NodeMeta::new(self.keys.len(), false, NULL_OFFSET, NULL_OFFSET),
                children.iter().map(|c| *c as i64).collect(),
            ),
            NodeBody::Leaf { data, prev, next } => {
                (NodeMeta::new(self.keys.len(), true, *prev, *next), data.clone())
            }
        };
        let required = NODE_META_SIZE + self.keys.len() * key_size + pointers.len() * 8;
        if required > block_size {
            return Err(Error::corrupted(format!(
                "node of {} keys needs {}b, block is {}b",
                self.keys.len(),
                required,
                block_size
            ))
            .into());
        }
        let mut buf = BytesMut::zeroed(block_size);
        buf[..NODE_META_SIZE].copy_from_slice(&serialize(&meta)?);
        let mut pos = NODE_META_SIZE;
        for key in &self.keys {
            key.encode_into(&mut buf[pos..pos + key_size])?;
            pos += key_size;
        }
        for pointer in pointers {
            buf[pos..pos + 8].copy_from_slice(&pointer.to_le_bytes());
            pos += 8;
        }
        Ok(buf)
    }

    pub(super) fn deserialize(offset: u64, buf: &[u8], key_size: usize) -> Result<Self> {
        let meta: NodeMeta = deserialize(&buf[..NODE_META_SIZE.min(buf.len())])?;
        let size = meta.size as usize;
        let pointers_count = if meta.is_leaf == 1 { size } else { size + 1 };
        let keys_end = NODE_META_SIZE + size * key_size;
        let end = keys_end + pointers_count * 8;
        if end > buf.len() {
            return Err(Error::corrupted(format!(
                "node at {} claims {} keys, doesn't fit into {}b",
                offset,
                size,
                buf.len()
            ))
            .into());
        }
        let keys = buf[NODE_META_SIZE..keys_end]
            .chunks(key_size)
            .map(K::decode)
            .collect::<Result<Vec<_>>>()?;
        let pointers = buf[keys_end..end]
            .chunks(8)
            .map(crate::types::read_i64)
            .collect::<Result<Vec<_>>>()?;
        let body = if meta.is_leaf == 1 {
            NodeBody::Leaf {
                data: pointers,
                prev: meta.prev,
                next: meta.next,
            }
        } else {
            NodeBody::Internal {
                children: pointers.into_iter().map(|p| p as u64).collect(),
            }
        };
        Ok(Self { offset, keys, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_SIZE: usize = 8;
    const BLOCK: usize = 256;

    #[test]
    fn serialize_deserialize_leaf() {
        let node = Node {
            offset: 16,
            keys: vec![1i64, 5, 5, 9],
            body: NodeBody::Leaf {
                data: vec![10, 11, 12, 13],
                prev: NULL_OFFSET,
                next: 272,
            },
        };
        let buf = node.serialize(KEY_SIZE, BLOCK).unwrap();
        assert_eq!(buf.len(), BLOCK);
        assert_eq!(Node::<i64>::deserialize(16, &buf, KEY_SIZE).unwrap(), node);
    }

    #[test]
    fn serialize_deserialize_internal() {
        let node = Node::new_internal(272, vec![3i64, 7], vec![16, 528, 784]);
        let buf = node.serialize(KEY_SIZE, BLOCK).unwrap();
        let restored = Node::<i64>::deserialize(272, &buf, KEY_SIZE).unwrap();
        assert_eq!(restored, node);
        assert!(!restored.is_leaf());
    }

    #[test]
    fn overfull_node_is_rejected() {
        let keys: Vec<i64> = (0..20).collect();
        let node = Node::new_internal(16, keys, (0..21).collect());
        assert!(node.serialize(KEY_SIZE, BLOCK).is_err());
    }

    #[test]
    fn bounds_route_ties_right() {
        let node = Node::new_internal(16, vec![2i64, 4, 4, 6], vec![0, 1, 2, 3, 4]);
        assert_eq!(node.lower_bound(&4), 1);
        assert_eq!(node.upper_bound(&4), 3);
        assert_eq!(node.upper_bound(&1), 0);
        assert_eq!(node.lower_bound(&7), 4);
    }
}
