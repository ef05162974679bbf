use super::prelude::*;
use crate::types::decode;

/// One live record as produced by reads and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Logical record id
    pub id: i64,
    /// Raw record bytes, `record_size` long
    pub data: Bytes,
}

impl Row {
    /// Decodes all fields of the row.
    /// # Errors
    /// Fails if the buffer does not match the model layout.
    pub fn values(&self, model: &ModelDef) -> Result<Vec<Value>> {
        model.decode_record(&self.data)
    }

    /// Decodes single field by position.
    /// # Errors
    /// Fails with `UnknownField` if `idx` is out of bounds.
    pub fn value(&self, model: &ModelDef, idx: usize) -> Result<Value> {
        decode(model.field_bytes(idx, &self.data)?, model.field(idx)?)
    }
}

/// Fixed-size record storage for one table.
///
/// Records live in the heap file as `[8 byte slot][fields]`. A live record has `-1` in
/// its slot, a reclaimed one holds the offset of the next reclaimed slot. The primary
/// index file maps ids to heap offsets and keeps the free list bounds in its header.
/// No handle is kept between calls.
#[derive(Debug, Clone)]
pub struct RecordHeap {
    model: ModelDef,
    heap_path: PathBuf,
    index_path: PathBuf,
}

impl RecordHeap {
    /// Binds heap to existing files.
    pub fn new(model: ModelDef, heap_path: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            heap_path: heap_path.into(),
            index_path: index_path.into(),
        }
    }

    /// Creates (or truncates) an empty heap file and primary index.
    /// # Errors
    /// Fails if any of the files can't be created.
    pub fn create(
        model: ModelDef,
        heap_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let heap = Self::new(model, heap_path, index_path);
        File::create(&heap.heap_path)?;
        PrimaryIndex::create(&heap.index_path)?;
        debug!(
            "heap for {} created at {}",
            heap.model.name(),
            heap.heap_path.display()
        );
        Ok(heap)
    }

    /// Model of stored records
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Path of the heap file
    pub fn heap_path(&self) -> &Path {
        &self.heap_path
    }

    /// Path of the primary index file
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn open(&self) -> Result<(File, PrimaryIndex)> {
        let heap = File::open(&self.heap_path)
            .with_context(|| format!("failed to open heap file {}", self.heap_path.display()))?;
        let index = PrimaryIndex::open(&self.index_path).with_context(|| {
            format!("failed to open primary index {}", self.index_path.display())
        })?;
        Ok((heap, index))
    }

    fn check_len(&self, record: &[u8]) -> Result<()> {
        if record.len() == self.model.record_size() {
            Ok(())
        } else {
            Err(Error::wrong_config(format!(
                "record of {} must be {}b, got {}b",
                self.model.name(),
                self.model.record_size(),
                record.len()
            ))
            .into())
        }
    }

    fn slot(record: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(record.len() + IX_SIZE as usize);
        buf.extend_from_slice(&NULL_OFFSET.to_le_bytes());
        buf.extend_from_slice(record);
        buf
    }

    /// Stores an encoded record and returns its new id.
    ///
    /// Reuses the first reclaimed slot if there is one, otherwise appends to the heap.
    /// # Errors
    /// Fails on I/O errors or if `record` has the wrong length.
    pub fn insert(&self, record: &[u8]) -> Result<i64> {
        self.check_len(record)?;
        let (mut heap, mut index) = self.open()?;
        let mut state = index.load_state()?;
        let offset = if state.is_empty() {
            heap.write_append_all(&Self::slot(record))?
        } else {
            let offset = state.head as u64;
            let next = heap.read_i64_at(offset)?;
            state.head = next;
            if next == NULL_OFFSET {
                state.tail = NULL_OFFSET;
            }
            index.save_state(&state)?;
            heap.write_all_at(offset, &Self::slot(record))?;
            offset
        };
        let id = index.append(offset)?;
        debug!("{}: inserted id {} at {}", self.model.name(), id, offset);
        Ok(id)
    }

    /// Encodes `values` and stores them as a new record.
    /// # Errors
    /// See [`ModelDef::encode_record`] and [`RecordHeap::insert`].
    pub fn insert_values(&self, values: &[Value]) -> Result<i64> {
        let record = self.model.encode_record(values)?;
        self.insert(&record)
    }

    /// Overwrites record `id` in place and returns `(old, new)` record bytes.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is deleted or out of range.
    pub fn update(&self, id: i64, record: &[u8]) -> Result<(Bytes, Bytes)> {
        self.check_len(record)?;
        let (mut heap, index) = self.open()?;
        let offset = index.offset_of(id)?;
        let old = heap.read_exact_at(self.model.record_size(), offset + IX_SIZE)?;
        heap.write_all_at(offset + IX_SIZE, record)?;
        debug!("{}: updated id {} at {}", self.model.name(), id, offset);
        Ok((old.freeze(), Bytes::copy_from_slice(record)))
    }

    /// Deletes record `id` and reclaims its slot. Returns the deleted record bytes.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is already deleted or out of range.
    pub fn delete(&self, id: i64) -> Result<Bytes> {
        let (mut heap, mut index) = self.open()?;
        let offset = index.offset_of(id)?;
        let old = heap.read_exact_at(self.model.record_size(), offset + IX_SIZE)?;
        let mut state = index.load_state()?;
        index.set_entry(id, NULL_OFFSET)?;
        heap.write_i64_at(offset, NULL_OFFSET)?;
        if state.tail == NULL_OFFSET {
            state.head = offset as i64;
        } else {
            heap.write_i64_at(state.tail as u64, offset as i64)?;
        }
        state.tail = offset as i64;
        index.save_state(&state)?;
        debug!("{}: deleted id {}, slot {} reclaimed", self.model.name(), id, offset);
        Ok(old.freeze())
    }

    /// Reads raw bytes of record `id`.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is deleted or out of range.
    pub fn get(&self, id: i64) -> Result<Bytes> {
        let (heap, index) = self.open()?;
        let offset = index.offset_of(id)?;
        let buf = heap.read_exact_at(self.model.record_size(), offset + IX_SIZE)?;
        Ok(buf.freeze())
    }

    /// Whether `id` was issued and is not deleted.
    /// # Errors
    /// Fails on I/O errors only.
    pub fn is_live(&self, id: i64) -> Result<bool> {
        let index = PrimaryIndex::open(&self.index_path)?;
        Ok(id >= 0 && id < index.len() && index.entry(id)? != NULL_OFFSET)
    }

    /// Number of ids ever issued, deleted ones included.
    /// # Errors
    /// Fails if the primary index can't be opened.
    pub fn issued(&self) -> Result<i64> {
        Ok(PrimaryIndex::open(&self.index_path)?.len())
    }

    /// Live `(id, offset)` pairs in id order, read in chunks of `chunk_size` bytes.
    /// # Errors
    /// Fails if the primary index can't be read.
    pub fn live_entries(&self, chunk_size: usize) -> Result<Vec<(i64, u64)>> {
        let index = PrimaryIndex::open(&self.index_path)?;
        let entries = index.live_entries(chunk_size)?;
        trace!("{}: {} live entries", self.model.name(), entries.len());
        Ok(entries)
    }

    pub(crate) fn reader(&self) -> Result<HeapReader> {
        let file = File::open(&self.heap_path)
            .with_context(|| format!("failed to open heap file {}", self.heap_path.display()))?;
        Ok(HeapReader {
            file,
            record_size: self.model.record_size(),
        })
    }
}

/// Read handle kept open for the duration of one query.
#[derive(Debug)]
pub(crate) struct HeapReader {
    file: File,
    record_size: usize,
}

impl HeapReader {
    /// Reads a run of records sorted by offset with a single read spanning
    /// `[first, last + slot)` and slices the records out of it.
    pub(crate) fn read_cluster(&self, entries: &[(u64, i64)]) -> Result<Vec<Row>> {
        let (first, last) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Ok(Vec::new()),
        };
        let slot = self.record_size as u64 + IX_SIZE;
        let span = (last - first + slot) as usize;
        trace!("cluster read {}b at {} ({} records)", span, first, entries.len());
        let buf = self.file.read_exact_at(span, first)?.freeze();
        Ok(entries
            .iter()
            .map(|(offset, id)| {
                let start = (offset - first + IX_SIZE) as usize;
                Row {
                    id: *id,
                    data: buf.slice(start..start + self.record_size),
                }
            })
            .collect())
    }

    pub(crate) fn read_one(&self, offset: u64, id: i64) -> Result<Row> {
        let data = self
            .file
            .read_exact_at(self.record_size, offset + IX_SIZE)?
            .freeze();
        Ok(Row { id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDef {
        ModelDef::new(
            "item",
            vec![
                FieldDef::new("name", FieldType::String(8)),
                FieldDef::new("qty", FieldType::Int),
            ],
        )
        .unwrap()
    }

    fn heap(dir: &Path) -> RecordHeap {
        RecordHeap::create(model(), dir.join("item.bin"), dir.join("ix_item.bin")).unwrap()
    }

    fn values(name: &str, qty: i64) -> Vec<Value> {
        vec![Value::from(name), Value::Int(qty)]
    }

    #[test]
    fn insert_get_update() {
        let dir = tempfile::tempdir().unwrap();
        let heap = heap(dir.path());
        assert_eq!(heap.insert_values(&values("a", 1)).unwrap(), 0);
        assert_eq!(heap.insert_values(&values("b", 2)).unwrap(), 1);

        let row = heap.get(1).unwrap();
        assert_eq!(heap.model().decode_record(&row).unwrap(), values("b", 2));

        let new = heap.model().encode_record(&values("bb", 20)).unwrap();
        let (old, written) = heap.update(1, &new).unwrap();
        assert_eq!(heap.model().decode_record(&old).unwrap(), values("b", 2));
        assert_eq!(&written[..], &new[..]);
        assert_eq!(
            heap.model().decode_record(&heap.get(1).unwrap()).unwrap(),
            values("bb", 20)
        );
    }

    #[test]
    fn deleted_slots_are_reused_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let heap = heap(dir.path());
        for i in 0..4 {
            heap.insert_values(&values("x", i)).unwrap();
        }
        let slot = heap.model().slot_size() as u64;
        heap.delete(2).unwrap();
        heap.delete(0).unwrap();

        let index = PrimaryIndex::open(heap.index_path()).unwrap();
        let state = index.load_state().unwrap();
        assert_eq!(state.head, 2 * slot as i64);
        assert_eq!(state.tail, 0);

        assert_eq!(heap.insert_values(&values("y", 10)).unwrap(), 4);
        assert_eq!(heap.insert_values(&values("z", 11)).unwrap(), 5);
        assert_eq!(heap.insert_values(&values("w", 12)).unwrap(), 6);

        let entries = heap.live_entries(64).unwrap();
        assert_eq!(
            entries,
            vec![
                (1, slot),
                (3, 3 * slot),
                (4, 2 * slot),
                (5, 0),
                (6, 4 * slot)
            ]
        );
        let state = PrimaryIndex::open(heap.index_path())
            .unwrap()
            .load_state()
            .unwrap();
        assert!(state.is_empty());
        assert_eq!(state.tail, NULL_OFFSET);
    }

    #[test]
    fn deleted_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let heap = heap(dir.path());
        let err = heap.get(0).unwrap_err();
        assert!(err
            .downcast_ref::<Error>()
            .unwrap()
            .is(&Kind::RecordNotFound(String::new())));

        heap.insert_values(&values("a", 1)).unwrap();
        heap.delete(0).unwrap();
        assert!(heap.get(0).is_err());
        assert!(heap.delete(0).is_err());
        assert!(!heap.is_live(0).unwrap());
        assert!(!heap.is_live(7).unwrap());
        assert_eq!(heap.issued().unwrap(), 1);
    }

    #[test]
    fn cluster_read_slices_records() {
        let dir = tempfile::tempdir().unwrap();
        let heap = heap(dir.path());
        for i in 0..5 {
            heap.insert_values(&values("r", i)).unwrap();
        }
        let entries: Vec<_> = heap
            .live_entries(1024)
            .unwrap()
            .into_iter()
            .map(|(id, offset)| (offset, id))
            .filter(|(_, id)| id % 2 == 0)
            .collect();
        let reader = heap.reader().unwrap();
        let rows = reader.read_cluster(&entries).unwrap();
        let qty: Vec<_> = rows
            .iter()
            .map(|row| row.value(heap.model(), 1).unwrap())
            .collect();
        assert_eq!(qty, vec![Value::Int(0), Value::Int(2), Value::Int(4)]);
        assert_eq!(reader.read_one(entries[1].0, 2).unwrap(), rows[1]);
    }
}
