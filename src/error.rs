use crate::prelude::*;

/// The error type for engine operations.
///
/// Public operations return [`anyhow::Result`]; the typed error can be recovered with
/// `err.downcast_ref::<Error>()` and inspected through [`Error::kind`].
#[derive(Debug, Error)]
pub struct Error {
    repr: Repr,
}

impl Error {
    /// Returns the corresponding `Kind` for this error.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        match &self.repr {
            Repr::Inner(kind) => kind,
        }
    }

    pub(crate) fn no_records() -> Self {
        Kind::RecordNotFound("no records exist in the table yet".to_owned()).into()
    }

    pub(crate) fn id_out_of_range(id: i64, last_id: i64) -> Self {
        Kind::RecordNotFound(format!(
            "record id ({}) is out of range, last inserted: {}",
            id, last_id
        ))
        .into()
    }

    pub(crate) fn record_deleted(id: i64) -> Self {
        Kind::RecordNotFound(format!("record with id {} has been deleted", id)).into()
    }

    pub(crate) fn field_too_large(field: impl Into<String>, max: usize, actual: usize) -> Self {
        Kind::FieldTooLarge {
            field: field.into(),
            max,
            actual,
        }
        .into()
    }

    pub(crate) fn invalid_operator(msg: impl Into<String>) -> Self {
        Kind::InvalidOperator(msg.into()).into()
    }

    pub(crate) fn wrong_config(msg: impl Into<String>) -> Self {
        Kind::WrongConfig(msg.into()).into()
    }

    pub(crate) fn unknown_field(name: impl Into<String>) -> Self {
        Kind::UnknownField(name.into()).into()
    }

    pub(crate) fn schema_not_found(name: impl Into<String>) -> Self {
        Kind::SchemaNotFound(name.into()).into()
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Kind::Corrupted(msg.into()).into()
    }

    /// Whether the error is of the same kind as `other`, payload ignored.
    pub fn is(&self, other: &Kind) -> bool {
        discriminant(self.kind()) == discriminant(other)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.repr, f)
    }
}

impl From<Kind> for Error {
    #[must_use]
    fn from(kind: Kind) -> Self {
        Self {
            repr: Repr::Inner(kind),
        }
    }
}

impl From<IOError> for Error {
    #[must_use]
    fn from(e: IOError) -> Self {
        Kind::Io(e.to_string()).into()
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    #[must_use]
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        Kind::Bincode(e.to_string()).into()
    }
}

#[derive(Debug)]
enum Repr {
    Inner(Kind),
}

impl Display for Repr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Repr::Inner(kind) => Display::fmt(kind, f),
        }
    }
}

/// A list specifying categories of engine error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Kind {
    /// Operation addressed a deleted or out-of-range record id
    #[error("record not found: {0}")]
    RecordNotFound(String),
    /// Encoded value exceeds the fixed byte budget of its field
    #[error("field `{field}` exceeds max length {max} ({actual} bytes)")]
    FieldTooLarge {
        /// Field name
        field: String,
        /// Fixed size of the field
        max: usize,
        /// Size of the rejected value
        actual: usize,
    },
    /// Type/operator combination is not defined
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    /// File open/seek/read/write failure
    #[error("io error: {0}")]
    Io(String),
    /// Operation exists in the interface but is not available
    #[error("unimplemented operation: {0}")]
    Unimplemented(String),
    /// Input configuration is wrong
    #[error("wrong config: {0}")]
    WrongConfig(String),
    /// Field name does not exist in the model
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// Schema directory or manifest is missing
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    /// On-disk structure does not match its expected layout
    #[error("corrupted file: {0}")]
    Corrupted(String),
    /// Bincode serialization deserialization error
    #[error("bincode error: {0}")]
    Bincode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_anyhow() {
        let res: Result<()> = Err(Error::record_deleted(4).into());
        let err = res.unwrap_err();
        let e = err.downcast_ref::<Error>().expect("typed error");
        assert!(e.is(&Kind::RecordNotFound(String::new())));
        assert_eq!(
            e.to_string(),
            "record not found: record with id 4 has been deleted"
        );
    }

    #[test]
    fn is_ignores_payload() {
        let e = Error::field_too_large("name", 4, 9);
        assert!(e.is(&Kind::FieldTooLarge {
            field: String::new(),
            max: 0,
            actual: 0,
        }));
        assert!(!e.is(&Kind::Io(String::new())));
        assert_eq!(e.to_string(), "field `name` exceeds max length 4 (9 bytes)");
    }
}
