//! structure of the primary index file from the beginning:
//! 1. Header: `free_head`, `free_tail` (two 8 byte words), offsets of the first and the last
//!    reclaimed heap slot, `-1` when the free list is empty
//! 2. One 8 byte heap offset per logical record id, append-only in id order; `-1` marks a
//!    deleted id
use super::prelude::*;

pub(crate) const PK_HEADER_SIZE: u64 = 2 * IX_SIZE;

/// Free list bounds, loaded from disk at the start of every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AllocatorState {
    pub(crate) head: i64,
    pub(crate) tail: i64,
}

impl Default for AllocatorState {
    fn default() -> Self {
        Self {
            head: NULL_OFFSET,
            tail: NULL_OFFSET,
        }
    }
}

impl AllocatorState {
    pub(crate) fn is_empty(&self) -> bool {
        self.head == NULL_OFFSET
    }

    #[inline]
    pub(crate) fn from_raw(buf: &[u8]) -> bincode::Result<Self> {
        deserialize(buf)
    }

    #[inline]
    pub(crate) fn to_raw(&self) -> bincode::Result<Vec<u8>> {
        serialize(self)
    }

    pub(crate) fn serialized_size_default() -> bincode::Result<u64> {
        serialized_size(&Self::default())
    }
}

#[derive(Debug)]
pub(crate) struct PrimaryIndex {
    file: File,
}

impl PrimaryIndex {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)?;
        file.write_all_at(0, &AllocatorState::default().to_raw()?)?;
        Ok(Self { file })
    }

    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.size() < PK_HEADER_SIZE || (file.size() - PK_HEADER_SIZE) % IX_SIZE != 0 {
            return Err(Error::corrupted(format!(
                "primary index {} has invalid size {}",
                file.path().display(),
                file.size()
            ))
            .into());
        }
        Ok(Self { file })
    }

    pub(crate) fn load_state(&self) -> Result<AllocatorState> {
        let size = AllocatorState::serialized_size_default()? as usize;
        let buf = self.file.read_exact_at(size, 0)?;
        AllocatorState::from_raw(&buf).map_err(|e| Error::from(e).into())
    }

    pub(crate) fn save_state(&mut self, state: &AllocatorState) -> Result<()> {
        trace!("save allocator state {:?}", state);
        self.file.write_all_at(0, &state.to_raw()?)
    }

    /// Number of ids ever issued, deleted ones included.
    pub(crate) fn len(&self) -> i64 {
        ((self.file.size() - PK_HEADER_SIZE) / IX_SIZE) as i64
    }

    fn position(id: i64) -> u64 {
        PK_HEADER_SIZE + id as u64 * IX_SIZE
    }

    fn check_bounds(&self, id: i64) -> Result<()> {
        let len = self.len();
        if len == 0 {
            Err(Error::no_records().into())
        } else if id < 0 || id >= len {
            Err(Error::id_out_of_range(id, len - 1).into())
        } else {
            Ok(())
        }
    }

    /// Raw entry for `id`: a heap offset or `-1` if the record was deleted.
    pub(crate) fn entry(&self, id: i64) -> Result<i64> {
        self.check_bounds(id)?;
        self.file.read_i64_at(Self::position(id))
    }

    /// Heap offset of a live record.
    pub(crate) fn offset_of(&self, id: i64) -> Result<u64> {
        match self.entry(id)? {
            NULL_OFFSET => Err(Error::record_deleted(id).into()),
            offset if offset < 0 => Err(Error::corrupted(format!(
                "primary index entry for id {} is {}",
                id, offset
            ))
            .into()),
            offset => Ok(offset as u64),
        }
    }

    pub(crate) fn set_entry(&mut self, id: i64, offset: i64) -> Result<()> {
        self.check_bounds(id)?;
        self.file.write_i64_at(Self::position(id), offset)
    }

    /// Appends an entry and returns the id it was issued under.
    pub(crate) fn append(&mut self, offset: u64) -> Result<i64> {
        let id = self.len();
        self.file.write_append_all(&(offset as i64).to_le_bytes())?;
        Ok(id)
    }

    /// All live `(id, offset)` pairs in id order.
    pub(crate) fn live_entries(&self, chunk_size: usize) -> Result<Vec<(i64, u64)>> {
        let mut entries = Vec::with_capacity(self.len() as usize);
        self.file
            .read_chunks(PK_HEADER_SIZE, chunk_size, |chunk_offset, buf| {
                let first_id = ((chunk_offset - PK_HEADER_SIZE) / IX_SIZE) as i64;
                for (i, word) in buf.chunks_exact(IX_SIZE as usize).enumerate() {
                    let offset = i64::from_le_bytes(word.try_into()?);
                    if offset >= 0 {
                        entries.push((first_id + i as i64, offset as u64));
                    }
                }
                Ok(())
            })?;
        Ok(entries)
    }
}
