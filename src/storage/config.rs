use super::prelude::*;

const DEFAULT_BLOCK_SIZE: usize = 1024;
const DEFAULT_MAX_CLUSTER_SIZE: u64 = 100_000;
const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;
const DEFAULT_INDEX_CANDIDATE_RATIO: f64 = 0.3;
const DEFAULT_READ_CHUNK_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub(crate) struct Config {
    work_dir: Option<PathBuf>,
    block_size: usize,
    node_capacity: Option<usize>,
    max_cluster_size: u64,
    min_cluster_size: usize,
    index_candidate_ratio: f64,
    read_chunk_size: usize,
}

// Getters
impl Config {
    #[inline]
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_ref().map(AsRef::as_ref)
    }

    #[inline]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub const fn node_capacity(&self) -> Option<usize> {
        self.node_capacity
    }

    #[inline]
    pub const fn max_cluster_size(&self) -> u64 {
        self.max_cluster_size
    }

    #[inline]
    pub const fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    #[inline]
    pub const fn index_candidate_ratio(&self) -> f64 {
        self.index_candidate_ratio
    }

    #[inline]
    pub const fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }
}

//Setters
impl Config {
    pub fn set_work_dir(&mut self, path: PathBuf) {
        self.work_dir = Some(path);
    }

    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
    }

    pub fn set_node_capacity(&mut self, capacity: usize) {
        self.node_capacity = Some(capacity);
    }

    pub fn set_max_cluster_size(&mut self, size: u64) {
        self.max_cluster_size = size;
    }

    pub fn set_min_cluster_size(&mut self, len: usize) {
        self.min_cluster_size = len;
    }

    pub fn set_index_candidate_ratio(&mut self, ratio: f64) {
        self.index_candidate_ratio = ratio;
    }

    pub fn set_read_chunk_size(&mut self, size: usize) {
        self.read_chunk_size = size;
    }
}

// Impl Traits
impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: None,
            block_size: DEFAULT_BLOCK_SIZE,
            node_capacity: None,
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            index_candidate_ratio: DEFAULT_INDEX_CANDIDATE_RATIO,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}
