use super::prelude::*;
use crate::types::{read_f64, read_i64};

#[derive(Debug, Clone)]
enum Tree {
    Int(BPTreeIndex<i64>),
    Double(BPTreeIndex<Double>),
    Str(BPTreeIndex<FixedStr>),
}

/// Secondary index of one model field, keyed by the field's raw bytes.
///
/// Integer-like fields (`Int`, `DateTime`, `Link`, `Bool`) share `i64` keys.
#[derive(Debug, Clone)]
pub(crate) struct FieldIndex {
    field: String,
    ty: FieldType,
    tree: Tree,
}

impl FieldIndex {
    pub(crate) fn new(
        path: PathBuf,
        field: &FieldDef,
        block_size: usize,
        node_capacity: Option<usize>,
    ) -> Result<Self> {
        let ty = field.ty();
        let tree = match ty {
            FieldType::String(size) => {
                Tree::Str(BPTreeIndex::new(path, size, block_size, node_capacity)?)
            }
            FieldType::Double => Tree::Double(BPTreeIndex::new(
                path,
                IX_SIZE as usize,
                block_size,
                node_capacity,
            )?),
            FieldType::VirtualLink => {
                return Err(Error::wrong_config(format!(
                    "virtual link `{}` can't be indexed",
                    field.name()
                ))
                .into())
            }
            _ => Tree::Int(BPTreeIndex::new(
                path,
                IX_SIZE as usize,
                block_size,
                node_capacity,
            )?),
        };
        Ok(Self {
            field: field.name().to_owned(),
            ty,
            tree,
        })
    }

    /// Creates an empty index file for `field`.
    pub(crate) fn create(
        path: PathBuf,
        field: &FieldDef,
        block_size: usize,
        node_capacity: Option<usize>,
    ) -> Result<Self> {
        let index = Self::new(path, field, block_size, node_capacity)?;
        match &index.tree {
            Tree::Int(tree) => tree.init_file()?,
            Tree::Double(tree) => tree.init_file()?,
            Tree::Str(tree) => tree.init_file()?,
        }
        Ok(index)
    }

    pub(crate) fn field(&self) -> &str {
        &self.field
    }

    fn int_key(&self, raw: &[u8]) -> Result<i64> {
        match self.ty {
            FieldType::Bool => raw
                .first()
                .map(|b| i64::from(*b))
                .ok_or_else(|| Error::corrupted("empty bool field").into()),
            _ => read_i64(raw),
        }
    }

    /// Adds the entry for the raw field bytes of record `id`.
    pub(crate) fn insert(&self, raw: &[u8], id: i64) -> Result<()> {
        match &self.tree {
            Tree::Int(tree) => tree.insert(&self.int_key(raw)?, id),
            Tree::Double(tree) => tree.insert(&Double(read_f64(raw)?), id),
            Tree::Str(tree) => tree.insert(&FixedStr::from_padded(raw), id),
        }
    }

    pub(crate) fn remove(&self, raw: &[u8], id: i64) -> Result<bool> {
        let removed = match &self.tree {
            Tree::Int(tree) => tree.remove(&self.int_key(raw)?, id)?,
            Tree::Double(tree) => tree.remove(&Double(read_f64(raw)?), id)?,
            Tree::Str(tree) => tree.remove(&FixedStr::from_padded(raw), id)?,
        };
        if !removed {
            warn!("index {}: entry for id {} not found", self.field, id);
        }
        Ok(removed)
    }

    fn mismatch(&self, value: &Value) -> anyhow::Error {
        Error::invalid_operator(format!(
            "value {} can't be compared with field `{}` of type {:?}",
            value, self.field, self.ty
        ))
        .into()
    }

    fn value_as_int(&self, value: &Value) -> Result<i64> {
        match value {
            Value::Null if self.ty == FieldType::Link => Ok(NULL_OFFSET),
            v => v.as_i64().ok_or_else(|| self.mismatch(v)),
        }
    }

    fn value_as_double(&self, value: &Value) -> Result<Double> {
        value.as_f64().map(Double).ok_or_else(|| self.mismatch(value))
    }

    fn value_as_str(&self, value: &Value) -> Result<FixedStr> {
        value
            .as_str()
            .map(FixedStr::from)
            .ok_or_else(|| self.mismatch(value))
    }

    /// Ids of records whose field equals `value`.
    pub(crate) fn find_value(&self, value: &Value) -> Result<Vec<i64>> {
        match &self.tree {
            Tree::Int(tree) => tree.find_ids(&self.value_as_int(value)?),
            Tree::Double(tree) => tree.find_ids(&self.value_as_double(value)?),
            Tree::Str(tree) => tree.find_ids(&self.value_as_str(value)?),
        }
    }

    /// Ids of records whose field lies in `[low, high]`.
    pub(crate) fn find_between(&self, low: &Value, high: &Value) -> Result<Vec<i64>> {
        match &self.tree {
            Tree::Int(tree) => {
                tree.find_range(&self.value_as_int(low)?, &self.value_as_int(high)?)
            }
            Tree::Double(tree) => {
                tree.find_range(&self.value_as_double(low)?, &self.value_as_double(high)?)
            }
            Tree::Str(tree) => tree.find_range(&self.value_as_str(low)?, &self.value_as_str(high)?),
        }
    }

    /// Ids in field order, walking the leaf chain.
    pub(crate) fn ordered_ids(&self, ascending: bool, n: Option<usize>, skip: usize) -> Result<Vec<i64>> {
        match (&self.tree, ascending) {
            (Tree::Int(tree), true) => tree.get_first_n_values_with_offset(n, skip),
            (Tree::Int(tree), false) => tree.get_last_n_values_with_offset(n, skip),
            (Tree::Double(tree), true) => tree.get_first_n_values_with_offset(n, skip),
            (Tree::Double(tree), false) => tree.get_last_n_values_with_offset(n, skip),
            (Tree::Str(tree), true) => tree.get_first_n_values_with_offset(n, skip),
            (Tree::Str(tree), false) => tree.get_last_n_values_with_offset(n, skip),
        }
    }
}
