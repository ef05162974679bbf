use super::prelude::*;

/// Record heap of one model together with the secondary indexes of its indexed fields.
///
/// Every mutation goes to the heap first and is then mirrored into each index whose
/// field bytes changed.
#[derive(Debug, Clone)]
pub struct Table {
    heap: RecordHeap,
    indexes: Vec<(usize, FieldIndex)>,
}

impl Table {
    pub(crate) fn new(dir: &Path, model: &ModelDef, config: &Config) -> Result<Self> {
        let heap = RecordHeap::new(
            model.clone(),
            FileName::heap(dir, model),
            FileName::primary_index(dir, model),
        );
        let indexes = model
            .indexed_fields()
            .map(|(idx, field)| {
                FieldIndex::new(
                    FileName::field_index(dir, model, field),
                    field,
                    config.block_size(),
                    config.node_capacity(),
                )
                .map(|index| (idx, index))
            })
            .collect::<Result<_>>()?;
        Ok(Self { heap, indexes })
    }

    /// Creates empty heap, primary index and field index files.
    pub(crate) fn create(dir: &Path, model: &ModelDef, config: &Config) -> Result<Self> {
        let heap = RecordHeap::create(
            model.clone(),
            FileName::heap(dir, model),
            FileName::primary_index(dir, model),
        )?;
        let indexes = model
            .indexed_fields()
            .map(|(idx, field)| {
                FieldIndex::create(
                    FileName::field_index(dir, model, field),
                    field,
                    config.block_size(),
                    config.node_capacity(),
                )
                .map(|index| (idx, index))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "table {} created with {} field indexes",
            model.name(),
            indexes.len()
        );
        Ok(Self { heap, indexes })
    }

    /// Table model
    pub fn model(&self) -> &ModelDef {
        self.heap.model()
    }

    /// Underlying record heap
    pub fn heap(&self) -> &RecordHeap {
        &self.heap
    }

    pub(crate) fn field_index(&self, idx: usize) -> Option<&FieldIndex> {
        self.indexes
            .iter()
            .find(|(field, _)| *field == idx)
            .map(|(_, index)| index)
    }

    /// Encodes and stores a new row, returns its id.
    /// # Errors
    /// Fails with `FieldTooLarge` or `InvalidOperator` if a value doesn't fit its field.
    pub fn insert(&self, values: &[Value]) -> Result<i64> {
        let record = self.model().encode_record(values)?;
        self.insert_raw(&record)
    }

    /// Stores an already encoded record, returns its id.
    /// # Errors
    /// Fails if the record length doesn't match the model and on I/O errors.
    pub fn insert_raw(&self, record: &[u8]) -> Result<i64> {
        let id = self.heap.insert(record)?;
        for (idx, index) in &self.indexes {
            index.insert(self.model().field_bytes(*idx, record)?, id)?;
        }
        Ok(id)
    }

    /// Overwrites row `id`; indexes of changed fields are updated.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is deleted or out of range.
    pub fn update(&self, id: i64, values: &[Value]) -> Result<()> {
        let record = self.model().encode_record(values)?;
        let (old, new) = self.heap.update(id, &record)?;
        for (idx, index) in &self.indexes {
            let before = self.model().field_bytes(*idx, &old)?;
            let after = self.model().field_bytes(*idx, &new)?;
            if before != after {
                trace!("{}: index {} moves id {}", self.model().name(), index.field(), id);
                index.remove(before, id)?;
                index.insert(after, id)?;
            }
        }
        Ok(())
    }

    /// Deletes row `id` and its index entries.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is already deleted or out of range.
    pub fn delete(&self, id: i64) -> Result<()> {
        let old = self.heap.delete(id)?;
        for (idx, index) in &self.indexes {
            index.remove(self.model().field_bytes(*idx, &old)?, id)?;
        }
        Ok(())
    }

    /// Decoded values of row `id`.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is deleted or out of range.
    pub fn get(&self, id: i64) -> Result<Vec<Value>> {
        let record = self.heap.get(id)?;
        self.model().decode_record(&record)
    }

    /// Raw record bytes of row `id`.
    /// # Errors
    /// Fails with `RecordNotFound` if `id` is deleted or out of range.
    pub fn get_raw(&self, id: i64) -> Result<Bytes> {
        self.heap.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDef {
        ModelDef::new(
            "pet",
            vec![
                FieldDef::new("name", FieldType::String(8)).indexed(),
                FieldDef::new("age", FieldType::Int).indexed(),
                FieldDef::new("weight", FieldType::Double),
            ],
        )
        .unwrap()
    }

    fn values(name: &str, age: i64) -> Vec<Value> {
        vec![Value::from(name), Value::Int(age), Value::Double(1.5)]
    }

    #[test]
    fn mutations_keep_indexes_in_sync() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.set_node_capacity(3);
        let table = Table::create(dir.path(), &model(), &config).unwrap();
        for (i, name) in ["rex", "tom", "rex", "kit", "bo"].iter().enumerate() {
            assert_eq!(table.insert(&values(name, i as i64)).unwrap(), i as i64);
        }
        let names = table.field_index(0).unwrap();
        let ages = table.field_index(1).unwrap();
        assert!(table.field_index(2).is_none());
        assert_eq!(names.find_value(&Value::from("rex")).unwrap(), vec![0, 2]);

        table.update(2, &values("tom", 2)).unwrap();
        assert_eq!(names.find_value(&Value::from("rex")).unwrap(), vec![0]);
        assert_eq!(names.find_value(&Value::from("tom")).unwrap(), vec![1, 2]);
        assert_eq!(ages.find_value(&Value::Int(2)).unwrap(), vec![2]);

        table.delete(1).unwrap();
        assert_eq!(names.find_value(&Value::from("tom")).unwrap(), vec![2]);
        assert!(ages.find_value(&Value::Int(1)).unwrap().is_empty());
        assert_eq!(table.get(2).unwrap(), values("tom", 2));
        assert!(table.get(1).is_err());

        let reopened = Table::new(dir.path(), &model(), &config).unwrap();
        assert_eq!(reopened.get_raw(3).unwrap(), table.get_raw(3).unwrap());
    }
}
