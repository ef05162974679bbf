/// structure of b+-tree index file from the beginning:
/// 1. Header: root node offset, head of the free block list (8 bytes each, `-1` if unset)
/// 2. Blocks of `block_size` bytes, each holding one node in format
///    `NodeMeta - key - ... - key - pointer - ... - pointer`,
///    where pointers are child block offsets for internal nodes (`keys + 1` of them)
///    and record ids for leaves (one per key). Leaves are doubly linked through
///    `NodeMeta::prev`/`NodeMeta::next` in key order
/// 3. Released blocks are chained through their first 8 bytes
use super::prelude::*;

/// Contiguous run of equal keys inside one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRun {
    /// Offset of the leaf block
    pub leaf: u64,
    /// Position of the first matching entry
    pub from: usize,
    /// Position of the last matching entry (inclusive)
    pub to: usize,
    /// Record ids of the run
    pub ids: Vec<i64>,
}

/// Disk-resident B+tree mapping fixed-width keys to record ids, duplicates allowed.
///
/// Every call opens the index file, re-reads the header and closes the file on return.
#[derive(Debug, Clone)]
pub struct BPTreeIndex<K> {
    path: PathBuf,
    key_size: usize,
    block_size: usize,
    capacity: usize,
    marker: PhantomData<K>,
}

enum Removal {
    Missing,
    Removed,
    Emptied,
}

impl<K: Key> BPTreeIndex<K> {
    /// Binds index to an existing file.
    ///
    /// Node capacity defaults to the number of keys that fit into one block.
    /// # Errors
    /// Fails with `WrongConfig` if `key_size` is zero or the capacity is below 3 or
    /// doesn't fit into `block_size`.
    pub fn new(
        path: impl Into<PathBuf>,
        key_size: usize,
        block_size: usize,
        node_capacity: Option<usize>,
    ) -> Result<Self> {
        if key_size == 0 {
            return Err(Error::wrong_config("index key size must be positive").into());
        }
        let fit = block_size.saturating_sub(NODE_META_SIZE + IX_SIZE as usize)
            / (key_size + IX_SIZE as usize);
        let capacity = node_capacity.unwrap_or(fit);
        if capacity < 3 || capacity > fit {
            return Err(Error::wrong_config(format!(
                "node capacity {} is not in [3, {}] for {}b keys in {}b blocks",
                capacity, fit, key_size, block_size
            ))
            .into());
        }
        Ok(Self {
            path: path.into(),
            key_size,
            block_size,
            capacity,
            marker: PhantomData,
        })
    }

    /// Creates (or truncates) an empty index file.
    /// # Errors
    /// See [`BPTreeIndex::new`]; fails on I/O errors too.
    pub fn create(
        path: impl Into<PathBuf>,
        key_size: usize,
        block_size: usize,
        node_capacity: Option<usize>,
    ) -> Result<Self> {
        let index = Self::new(path, key_size, block_size, node_capacity)?;
        index.init_file()?;
        Ok(index)
    }

    /// Truncates the index file down to an empty header.
    pub(crate) fn init_file(&self) -> Result<()> {
        let mut file = File::create(&self.path)
            .with_context(|| format!("failed to create index {}", self.path.display()))?;
        file.write_all_at(0, &TreeMeta::default().to_raw()?)?;
        debug!(
            "index {} created, capacity {}",
            self.path.display(),
            self.capacity
        );
        Ok(())
    }

    /// Maximum number of keys in one node
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Width of encoded keys
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn open(&self) -> Result<TreeFile<'_, K>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open index {}", self.path.display()))?;
        let buf = file.read_exact_at(TREE_META_SIZE as usize, 0)?;
        let meta = TreeMeta::from_raw(&buf)?;
        Ok(TreeFile {
            index: self,
            file,
            meta,
        })
    }

    /// Whether the tree holds no entries.
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.open()?.meta.root == NULL_OFFSET)
    }

    /// Adds `(key, id)`. Equal keys are kept as separate adjacent entries, the new one
    /// after the existing ones.
    /// # Errors
    /// Fails on I/O errors or if the key doesn't fit into `key_size`.
    pub fn insert(&self, key: &K, id: i64) -> Result<()> {
        let mut tree = self.open()?;
        if tree.meta.root == NULL_OFFSET {
            let offset = tree.alloc()?;
            let mut leaf = Node::new_leaf(offset);
            leaf.keys.push(key.clone());
            push_entry(&mut leaf, 0, id)?;
            tree.write_node(&leaf)?;
            tree.meta.root = offset as i64;
            return tree.save_meta();
        }

        let mut path = Vec::new();
        let mut node = tree.read_node(tree.meta.root as u64)?;
        while !node.is_leaf() {
            let idx = node.upper_bound(key);
            let child = node.children()?[idx];
            path.push((node, idx));
            node = tree.read_node(child)?;
        }

        let pos = node.upper_bound(key);
        node.keys.insert(pos, key.clone());
        push_entry(&mut node, pos, id)?;
        if node.len() <= self.capacity {
            return tree.write_node(&node);
        }

        let right = tree.split_leaf(&mut node)?;
        let separator = right.keys[0].clone();
        self.shift_tree_level(&mut tree, path, separator, node.offset, right.offset)
    }

    /// Pushes separator `key` with `right` child into the parents recorded in `path`,
    /// splitting them on overflow. Grows a new root when the old root splits.
    fn shift_tree_level(
        &self,
        tree: &mut TreeFile<'_, K>,
        mut path: Vec<(Node<K>, usize)>,
        mut key: K,
        mut left: u64,
        mut right: u64,
    ) -> Result<()> {
        loop {
            let (mut parent, idx) = match path.pop() {
                Some(entry) => entry,
                None => {
                    let offset = tree.alloc()?;
                    let root = Node::new_internal(offset, vec![key], vec![left, right]);
                    tree.write_node(&root)?;
                    tree.meta.root = offset as i64;
                    trace!("{}: new root at {}", self.path.display(), offset);
                    return tree.save_meta();
                }
            };
            parent.keys.insert(idx, key);
            parent.children_mut()?.insert(idx + 1, right);
            if parent.len() <= self.capacity {
                return tree.write_node(&parent);
            }

            let mid = parent.len() / 2;
            let offset = tree.alloc()?;
            let mut right_keys = parent.keys.split_off(mid);
            let promoted = right_keys.remove(0);
            let right_children = parent.children_mut()?.split_off(mid + 1);
            let sibling = Node::new_internal(offset, right_keys, right_children);
            tree.write_node(&parent)?;
            tree.write_node(&sibling)?;
            trace!(
                "{}: internal node {} split, new sibling {}",
                self.path.display(),
                parent.offset,
                offset
            );
            key = promoted;
            left = parent.offset;
            right = offset;
        }
    }

    fn descend(&self, tree: &TreeFile<'_, K>, key: &K) -> Result<Option<Node<K>>> {
        if tree.meta.root == NULL_OFFSET {
            return Ok(None);
        }
        let mut node = tree.read_node(tree.meta.root as u64)?;
        while !node.is_leaf() {
            let child = node.children()?[node.lower_bound(key)];
            node = tree.read_node(child)?;
        }
        Ok(Some(node))
    }

    fn edge_leaf(&self, tree: &TreeFile<'_, K>, rightmost: bool) -> Result<Option<Node<K>>> {
        if tree.meta.root == NULL_OFFSET {
            return Ok(None);
        }
        let mut node = tree.read_node(tree.meta.root as u64)?;
        while !node.is_leaf() {
            let children = node.children()?;
            let child = if rightmost {
                children.last()
            } else {
                children.first()
            };
            let child = *child.ok_or_else(|| {
                Error::corrupted(format!("internal node at {} has no children", node.offset))
            })?;
            node = tree.read_node(child)?;
        }
        Ok(Some(node))
    }

    /// All runs of entries equal to `key`, in leaf chain order.
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn find(&self, key: &K) -> Result<Vec<LeafRun>> {
        let tree = self.open()?;
        let mut runs = Vec::new();
        let mut node = match self.descend(&tree, key)? {
            Some(node) => node,
            None => return Ok(runs),
        };
        let mut pos = node.lower_bound(key);
        loop {
            let end = pos + node.keys[pos..].iter().take_while(|k| *k == key).count();
            if end > pos {
                runs.push(LeafRun {
                    leaf: node.offset,
                    from: pos,
                    to: end - 1,
                    ids: node.data()?[pos..end].to_vec(),
                });
            }
            let (_, next) = node.siblings()?;
            if end < node.len() || next == NULL_OFFSET {
                break;
            }
            node = tree.read_node(next as u64)?;
            pos = 0;
        }
        Ok(runs)
    }

    /// Ids of all entries equal to `key`.
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn find_ids(&self, key: &K) -> Result<Vec<i64>> {
        Ok(self.find(key)?.into_iter().flat_map(|run| run.ids).collect())
    }

    /// Ids of all entries with `low <= key <= high`, in key order.
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn find_range(&self, low: &K, high: &K) -> Result<Vec<i64>> {
        let tree = self.open()?;
        let mut ids = Vec::new();
        if low > high {
            return Ok(ids);
        }
        let mut node = match self.descend(&tree, low)? {
            Some(node) => node,
            None => return Ok(ids),
        };
        let mut pos = node.lower_bound(low);
        loop {
            let data = node.data()?;
            while pos < node.len() {
                if &node.keys[pos] > high {
                    return Ok(ids);
                }
                ids.push(data[pos]);
                pos += 1;
            }
            let (_, next) = node.siblings()?;
            if next == NULL_OFFSET {
                return Ok(ids);
            }
            node = tree.read_node(next as u64)?;
            pos = 0;
        }
    }

    /// Walks the leaf chain from the smallest key, skipping `skip` entries and returning
    /// at most `n` ids (all of them for `None`).
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn get_first_n_values_with_offset(&self, n: Option<usize>, skip: usize) -> Result<Vec<i64>> {
        self.walk_chain(n, skip, false)
    }

    /// Same as [`BPTreeIndex::get_first_n_values_with_offset`] from the largest key
    /// backwards.
    /// # Errors
    /// Fails if the index file can't be read.
    pub fn get_last_n_values_with_offset(&self, n: Option<usize>, skip: usize) -> Result<Vec<i64>> {
        self.walk_chain(n, skip, true)
    }

    fn walk_chain(&self, n: Option<usize>, mut skip: usize, backwards: bool) -> Result<Vec<i64>> {
        let tree = self.open()?;
        let limit = n.unwrap_or(usize::MAX);
        let mut ids = Vec::new();
        let mut leaf = self.edge_leaf(&tree, backwards)?;
        while let Some(node) = leaf {
            if ids.len() >= limit {
                break;
            }
            let data = node.data()?;
            let take = |ids: &mut Vec<i64>, skip: &mut usize, id: i64| {
                if *skip > 0 {
                    *skip -= 1;
                } else if ids.len() < limit {
                    ids.push(id);
                }
            };
            if backwards {
                data.iter().rev().for_each(|id| take(&mut ids, &mut skip, *id));
            } else {
                data.iter().for_each(|id| take(&mut ids, &mut skip, *id));
            }
            let (prev, next) = node.siblings()?;
            let sibling = if backwards { prev } else { next };
            leaf = if sibling == NULL_OFFSET {
                None
            } else {
                Some(tree.read_node(sibling as u64)?)
            };
        }
        Ok(ids)
    }

    /// Removes one `(key, id)` entry. Returns `false` if there was none.
    ///
    /// Nodes are never merged: emptied leaves are unlinked from the chain and released
    /// together with internal nodes left without children. A root with a single child
    /// and no keys is replaced by that child.
    /// # Errors
    /// Fails if the index file can't be read or written.
    pub fn remove(&self, key: &K, id: i64) -> Result<bool> {
        let mut tree = self.open()?;
        if tree.meta.root == NULL_OFFSET {
            return Ok(false);
        }
        let root = tree.meta.root as u64;
        match self.remove_from(&mut tree, root, key, id)? {
            Removal::Missing => Ok(false),
            Removal::Emptied => {
                trace!("{}: tree emptied", self.path.display());
                tree.meta.root = NULL_OFFSET;
                tree.save_meta()?;
                Ok(true)
            }
            Removal::Removed => {
                self.collapse_root(&mut tree)?;
                Ok(true)
            }
        }
    }

    fn remove_from(
        &self,
        tree: &mut TreeFile<'_, K>,
        offset: u64,
        key: &K,
        id: i64,
    ) -> Result<Removal> {
        let mut node = tree.read_node(offset)?;
        let (lo, hi) = (node.lower_bound(key), node.upper_bound(key));
        if node.is_leaf() {
            let pos = match (lo..hi).find(|&i| node.data().map_or(false, |d| d[i] == id)) {
                Some(pos) => pos,
                None => return Ok(Removal::Missing),
            };
            node.keys.remove(pos);
            if let NodeBody::Leaf { data, .. } = &mut node.body {
                data.remove(pos);
            }
            if !node.keys.is_empty() {
                tree.write_node(&node)?;
                return Ok(Removal::Removed);
            }
            let (prev, next) = node.siblings()?;
            if prev != NULL_OFFSET {
                let mut sibling = tree.read_node(prev as u64)?;
                sibling.set_next(next);
                tree.write_node(&sibling)?;
            }
            if next != NULL_OFFSET {
                let mut sibling = tree.read_node(next as u64)?;
                sibling.set_prev(prev);
                tree.write_node(&sibling)?;
            }
            tree.free(offset)?;
            trace!("{}: leaf {} released", self.path.display(), offset);
            return Ok(Removal::Emptied);
        }

        for idx in lo..=hi {
            let child = node.children()?[idx];
            match self.remove_from(tree, child, key, id)? {
                Removal::Missing => continue,
                Removal::Removed => return Ok(Removal::Removed),
                Removal::Emptied => {
                    node.children_mut()?.remove(idx);
                    if !node.keys.is_empty() {
                        node.keys.remove(idx.saturating_sub(1));
                    }
                    if node.children()?.is_empty() {
                        tree.free(offset)?;
                        return Ok(Removal::Emptied);
                    }
                    tree.write_node(&node)?;
                    return Ok(Removal::Removed);
                }
            }
        }
        Ok(Removal::Missing)
    }

    fn collapse_root(&self, tree: &mut TreeFile<'_, K>) -> Result<()> {
        loop {
            let root = tree.read_node(tree.meta.root as u64)?;
            if root.is_leaf() || !root.keys.is_empty() {
                return Ok(());
            }
            let child = match root.children()? {
                [child] => *child,
                _ => return Ok(()),
            };
            tree.meta.root = child as i64;
            tree.save_meta()?;
            tree.free(root.offset)?;
        }
    }
}

fn push_entry<K: Key>(node: &mut Node<K>, pos: usize, id: i64) -> Result<()> {
    match &mut node.body {
        NodeBody::Leaf { data, .. } => {
            data.insert(pos, id);
            Ok(())
        }
        NodeBody::Internal { .. } => Err(Error::corrupted(format!(
            "entry pushed into internal node at {}",
            node.offset
        ))
        .into()),
    }
}

/// Open index file together with its header.
pub(super) struct TreeFile<'a, K> {
    index: &'a BPTreeIndex<K>,
    file: File,
    pub(super) meta: TreeMeta,
}

impl<'a, K: Key> TreeFile<'a, K> {
    pub(super) fn read_node(&self, offset: u64) -> Result<Node<K>> {
        let buf = self.file.read_exact_at(self.index.block_size, offset)?;
        Node::deserialize(offset, &buf, self.index.key_size)
    }

    fn write_node(&mut self, node: &Node<K>) -> Result<()> {
        let buf = node.serialize(self.index.key_size, self.index.block_size)?;
        self.file.write_all_at(node.offset, &buf)
    }

    fn save_meta(&mut self) -> Result<()> {
        self.file.write_all_at(0, &self.meta.to_raw()?)
    }

    /// Takes a block from the free list, or reserves a zeroed block at the end of file.
    fn alloc(&mut self) -> Result<u64> {
        if self.meta.free_head != NULL_OFFSET {
            let offset = self.meta.free_head as u64;
            self.meta.free_head = self.file.read_i64_at(offset)?;
            self.save_meta()?;
            trace!("block {} reused", offset);
            return Ok(offset);
        }
        self.file
            .write_append_all(&vec![0; self.index.block_size])
    }

    fn free(&mut self, offset: u64) -> Result<()> {
        self.file.write_i64_at(offset, self.meta.free_head)?;
        self.meta.free_head = offset as i64;
        self.save_meta()
    }

    /// Moves the upper half of an overfull leaf into a new right sibling and relinks
    /// the leaf chain.
    fn split_leaf(&mut self, node: &mut Node<K>) -> Result<Node<K>> {
        let mid = node.len() / 2;
        let offset = self.alloc()?;
        let keys = node.keys.split_off(mid);
        let (data, old_next) = match &mut node.body {
            NodeBody::Leaf { data, next, .. } => {
                let old_next = *next;
                *next = offset as i64;
                (data.split_off(mid), old_next)
            }
            NodeBody::Internal { .. } => {
                return Err(Error::corrupted(format!(
                    "node at {} is not a leaf",
                    node.offset
                ))
                .into())
            }
        };
        let right = Node {
            offset,
            keys,
            body: NodeBody::Leaf {
                data,
                prev: node.offset as i64,
                next: old_next,
            },
        };
        if old_next != NULL_OFFSET {
            let mut after = self.read_node(old_next as u64)?;
            after.set_prev(offset as i64);
            self.write_node(&after)?;
        }
        self.write_node(node)?;
        self.write_node(&right)?;
        trace!("leaf {} split, new sibling {}", node.offset, offset);
        Ok(right)
    }
}
