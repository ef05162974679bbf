use super::prelude::*;

const MIN_BLOCK_SIZE: usize = 128;
const MIN_NODE_CAPACITY: usize = 3;

/// `Builder` used for initializing a [`Database`].
/// # Examples
/// ```no_run
/// use tabula::Builder;
///
/// let db = Builder::new()
///     .work_dir("/tmp/tabula/")
///     .block_size(4096)
///     .build()
///     .unwrap();
/// ```
#[derive(Default, Debug)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Initializes the `Builder` with defaults
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates [`Database`] based on given configuration.
    /// Creates the work dir if it doesn't exist.
    /// # Errors
    /// Fails with `WrongConfig` if work dir is not set and on I/O errors.
    pub fn build(self) -> Result<Database> {
        let work_dir = self
            .config
            .work_dir()
            .ok_or_else(|| Error::wrong_config("work dir is not set"))?
            .to_path_buf();
        fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create work dir {}", work_dir.display()))?;
        Ok(Database::new(work_dir, self.config))
    }

    /// # Description
    /// Sets the directory all schemas live in.
    /// If path not exists, it is created by [`Builder::build`].
    /// # Examples
    /// ```no_run
    /// let builder = tabula::Builder::new().work_dir("/tmp/tabula/");
    /// ```
    #[must_use]
    pub fn work_dir<S: Into<PathBuf>>(mut self, work_dir: S) -> Self {
        debug!("set work dir");
        let path: PathBuf = work_dir.into();
        info!("work dir set to: {}", path.display());
        self.config.set_work_dir(path);
        self
    }

    /// # Description
    /// Sets size of a B+tree node block in bytes.
    /// Must be at least 128, default is 1024
    #[must_use]
    pub fn block_size(mut self, block_size: usize) -> Self {
        if block_size >= MIN_BLOCK_SIZE {
            self.config.set_block_size(block_size);
            info!("index block size set to: {}", block_size);
        } else {
            error!(
                "block size {} is less than {}, not set",
                block_size, MIN_BLOCK_SIZE
            );
        }
        self
    }

    /// # Description
    /// Fixes the number of keys a B+tree node holds instead of deriving it from the
    /// block and key sizes.
    /// Must be at least 3
    #[must_use]
    pub fn node_capacity(mut self, capacity: usize) -> Self {
        if capacity >= MIN_NODE_CAPACITY {
            self.config.set_node_capacity(capacity);
            info!("index node capacity set to: {}", capacity);
        } else {
            error!("node capacity {} is too small, not set", capacity);
        }
        self
    }

    /// # Description
    /// Sets max byte span of a single clustered heap read.
    /// Must be greater than zero
    #[must_use]
    pub fn max_cluster_size(mut self, size: u64) -> Self {
        if size > 0 {
            self.config.set_max_cluster_size(size);
            info!("max cluster size set to: {}", size);
        } else {
            error!("zero cluster size is useless, not set");
        }
        self
    }

    /// # Description
    /// Sets min number of records worth a combined read.
    /// Must be greater than zero
    #[must_use]
    pub fn min_cluster_size(mut self, len: usize) -> Self {
        if len > 0 {
            self.config.set_min_cluster_size(len);
            info!("min cluster size set to: {}", len);
        } else {
            error!("zero cluster length is useless, not set");
        }
        self
    }

    /// # Description
    /// Sets the share of live rows an index-narrowed candidate set may reach before
    /// the query falls back to a full scan.
    /// Must be within `[0, 1]`
    #[must_use]
    pub fn index_candidate_ratio(mut self, ratio: f64) -> Self {
        if (0.0..=1.0).contains(&ratio) {
            self.config.set_index_candidate_ratio(ratio);
            info!("index candidate ratio set to: {}", ratio);
        } else {
            error!("index candidate ratio {} is out of [0, 1], not set", ratio);
        }
        self
    }

    /// # Description
    /// Sets size of the chunks the primary index is read in.
    /// Must be a non-zero multiple of 8
    #[must_use]
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        if size > 0 && size % IX_SIZE as usize == 0 {
            self.config.set_read_chunk_size(size);
            info!("read chunk size set to: {}", size);
        } else {
            error!("read chunk size {} is not a multiple of {}, not set", size, IX_SIZE);
        }
        self
    }
}
