use super::prelude::*;

/// Scalar type of a model field together with its fixed storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Signed 64-bit integer
    Int,
    /// 64-bit float
    Double,
    /// Single byte boolean
    Bool,
    /// Zero padded string of at most `N` bytes
    String(usize),
    /// Unix timestamp in seconds
    DateTime,
    /// Id of a row in another table, `-1` when missing
    Link,
    /// One-to-many relationship, resolved by joins and never stored
    VirtualLink,
}

impl FieldType {
    /// Number of bytes the field occupies inside a record.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int | FieldType::Double | FieldType::DateTime | FieldType::Link => 8,
            FieldType::Bool => 1,
            FieldType::String(n) => *n,
            FieldType::VirtualLink => 0,
        }
    }

    /// Stable numeric code of the type.
    pub const fn code(&self) -> u8 {
        match self {
            FieldType::Int => 0,
            FieldType::String(_) => 1,
            FieldType::Bool => 2,
            FieldType::DateTime => 3,
            FieldType::Link => 4,
            FieldType::Double => 5,
            FieldType::VirtualLink => 6,
        }
    }

    /// Compares two encoded values of this type.
    ///
    /// # Errors
    /// Fails with `InvalidOperator` for `VirtualLink`, which has no stored value.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Result<CmpOrdering> {
        let ord = match self {
            FieldType::Int | FieldType::DateTime | FieldType::Link => {
                read_i64(a)?.cmp(&read_i64(b)?)
            }
            FieldType::Double => read_f64(a)?.total_cmp(&read_f64(b)?),
            FieldType::Bool => a.first().cmp(&b.first()),
            FieldType::String(_) => a.cmp(b),
            FieldType::VirtualLink => {
                return Err(Error::invalid_operator("virtual link fields are not comparable").into())
            }
        };
        Ok(ord)
    }
}

pub(crate) fn read_i64(buf: &[u8]) -> Result<i64> {
    let word: [u8; 8] = buf
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::corrupted(format!("expected 8 bytes, got {}", buf.len())))?;
    Ok(i64::from_le_bytes(word))
}

pub(crate) fn read_f64(buf: &[u8]) -> Result<f64> {
    read_i64(buf).map(|bits| f64::from_bits(bits as u64))
}

/// Single field of a model: name, type, byte offset inside the record and whether
/// a secondary index is kept for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    name: String,
    ty: FieldType,
    offset: usize,
    indexed: bool,
}

impl FieldDef {
    /// Creates a non-indexed field. The offset is assigned by [`ModelDef::new`].
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: 0,
            indexed: false,
        }
    }

    /// Marks field as backed by a secondary index.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type
    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Byte size inside the record
    pub fn size(&self) -> usize {
        self.ty.size()
    }

    /// Byte offset inside the record, housekeeping slot excluded
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether a secondary index is maintained for this field
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }
}

/// Immutable table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    name: String,
    fields: Vec<FieldDef>,
    record_size: usize,
}

impl ModelDef {
    /// Creates model and lays fields out in declaration order.
    /// # Errors
    /// Fails with `WrongConfig` on duplicate or empty field names, zero sized strings and
    /// indexes requested on virtual links.
    pub fn new(name: impl Into<String>, mut fields: Vec<FieldDef>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::wrong_config("model name is empty").into());
        }
        let mut seen = HashSet::new();
        let mut offset = 0;
        for field in &mut fields {
            if field.name.is_empty() || !seen.insert(field.name.clone()) {
                return Err(Error::wrong_config(format!(
                    "model {}: empty or duplicate field name `{}`",
                    name, field.name
                ))
                .into());
            }
            match field.ty {
                FieldType::String(0) => {
                    return Err(Error::wrong_config(format!(
                        "model {}: string field `{}` has zero size",
                        name, field.name
                    ))
                    .into())
                }
                FieldType::VirtualLink if field.indexed => {
                    return Err(Error::wrong_config(format!(
                        "model {}: virtual link `{}` can't be indexed",
                        name, field.name
                    ))
                    .into())
                }
                _ => {}
            }
            field.offset = offset;
            offset += field.size();
        }
        Ok(Self {
            name,
            fields,
            record_size: offset,
        })
    }

    /// Model (table) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Field by position.
    /// # Errors
    /// Fails with `UnknownField` if `idx` is out of bounds.
    pub fn field(&self, idx: usize) -> Result<&FieldDef> {
        self.fields
            .get(idx)
            .ok_or_else(|| Error::unknown_field(format!("{}.#{}", self.name, idx)).into())
    }

    /// Position of a field by name.
    /// # Errors
    /// Fails with `UnknownField` if no field has this name.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::unknown_field(format!("{}.{}", self.name, name)).into())
    }

    /// Sum of all field sizes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// On-disk size of one record: fields plus the 8 byte housekeeping slot.
    pub fn slot_size(&self) -> usize {
        self.record_size + IX_SIZE as usize
    }

    pub(crate) fn indexed_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields.iter().enumerate().filter(|(_, f)| f.indexed)
    }

    /// Slice of `record` holding field `idx`.
    pub(crate) fn field_bytes<'a>(&self, idx: usize, record: &'a [u8]) -> Result<&'a [u8]> {
        let field = self.field(idx)?;
        record
            .get(field.offset..field.offset + field.size())
            .ok_or_else(|| {
                Error::corrupted(format!(
                    "record of {}b is too short for field {}",
                    record.len(),
                    field.name
                ))
                .into()
            })
    }

    /// Encodes a full row into a record buffer of `record_size` bytes.
    /// # Errors
    /// Fails if the number of values differs from the number of fields or a value
    /// can't be encoded into its field.
    pub fn encode_record(&self, values: &[Value]) -> Result<BytesMut> {
        if values.len() != self.fields.len() {
            return Err(Error::wrong_config(format!(
                "model {} has {} fields, got {} values",
                self.name,
                self.fields.len(),
                values.len()
            ))
            .into());
        }
        let mut buf = BytesMut::zeroed(self.record_size);
        for (field, value) in self.fields.iter().zip(values) {
            let encoded = encode(value, field)?;
            buf[field.offset..field.offset + field.size()].copy_from_slice(&encoded);
        }
        Ok(buf)
    }

    /// Decodes a record buffer into typed values, one per field.
    /// # Errors
    /// Fails if the buffer is shorter than `record_size`.
    pub fn decode_record(&self, record: &[u8]) -> Result<Vec<Value>> {
        (0..self.fields.len())
            .map(|idx| decode(self.field_bytes(idx, record)?, &self.fields[idx]))
            .collect()
    }
}
