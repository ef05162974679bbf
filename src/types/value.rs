use super::field::{read_f64, read_i64};
use super::prelude::*;

/// Typed value crossing the typed/binary boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer
    Int(i64),
    /// Float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// String, stored zero padded
    String(String),
    /// Unix timestamp in seconds
    DateTime(i64),
    /// Linked row id, `-1` for a missing link
    Link(i64),
    /// Absence of a value (virtual links, missing links)
    Null,
}

impl Value {
    /// `Null` and a `-1` link are the only null values.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Link(NULL_OFFSET))
    }

    /// Integer payload of integer-like values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) | Value::DateTime(v) | Value::Link(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric payload of integer-like and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Int(v) | Value::DateTime(v) | Value::Link(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Null => f.write_str("null"),
        }
    }
}

/// Encodes `value` into exactly `field.size()` bytes.
///
/// Integers are accepted by every integer-like field and by doubles; booleans accept
/// integers (non-zero is `true`). Links accept `Null` as `-1`.
/// # Errors
/// `FieldTooLarge` when a string does not fit, `InvalidOperator` when the value
/// variant can't be stored in the field type.
pub fn encode(value: &Value, field: &FieldDef) -> Result<Vec<u8>> {
    let mismatch = || {
        Error::invalid_operator(format!(
            "value {} can't be stored in field `{}` of type {:?}",
            value,
            field.name(),
            field.ty()
        ))
    };
    let buf = match (field.ty(), value) {
        (FieldType::Int, Value::Int(v))
        | (FieldType::DateTime, Value::DateTime(v) | Value::Int(v))
        | (FieldType::Link, Value::Link(v) | Value::Int(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Link, Value::Null) => NULL_OFFSET.to_le_bytes().to_vec(),
        (FieldType::Double, Value::Double(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Double, Value::Int(v)) => (*v as f64).to_le_bytes().to_vec(),
        (FieldType::Bool, Value::Bool(v)) => vec![u8::from(*v)],
        (FieldType::Bool, Value::Int(v)) => vec![u8::from(*v != 0)],
        (FieldType::String(size), Value::String(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() > size {
                return Err(Error::field_too_large(field.name(), size, bytes.len()).into());
            }
            let mut buf = vec![0; size];
            buf[..bytes.len()].copy_from_slice(bytes);
            buf
        }
        (FieldType::VirtualLink, _) => Vec::new(),
        _ => return Err(mismatch().into()),
    };
    Ok(buf)
}

/// Decodes the fixed-width bytes of `field` back into a typed value.
/// # Errors
/// Fails with `Corrupted` if `bytes` is not exactly `field.size()` long.
pub fn decode(bytes: &[u8], field: &FieldDef) -> Result<Value> {
    if bytes.len() != field.size() {
        return Err(Error::corrupted(format!(
            "field `{}` expects {}b, got {}b",
            field.name(),
            field.size(),
            bytes.len()
        ))
        .into());
    }
    let value = match field.ty() {
        FieldType::Int => Value::Int(read_i64(bytes)?),
        FieldType::DateTime => Value::DateTime(read_i64(bytes)?),
        FieldType::Link => Value::Link(read_i64(bytes)?),
        FieldType::Double => Value::Double(read_f64(bytes)?),
        FieldType::Bool => Value::Bool(bytes[0] != 0),
        FieldType::String(_) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::VirtualLink => Value::Null,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_is_zero_padded() {
        let field = FieldDef::new("name", FieldType::String(6));
        let buf = encode(&Value::from("abc"), &field).unwrap();
        assert_eq!(buf, b"abc\0\0\0");
        assert_eq!(decode(&buf, &field).unwrap(), Value::from("abc"));
    }

    #[test]
    fn string_too_large() {
        let field = FieldDef::new("name", FieldType::String(3));
        let err = encode(&Value::from("abcd"), &field).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>().unwrap().kind(),
            &Kind::FieldTooLarge {
                field: "name".to_owned(),
                max: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn full_width_string_decodes_without_terminator() {
        let field = FieldDef::new("code", FieldType::String(3));
        let buf = encode(&Value::from("xyz"), &field).unwrap();
        assert_eq!(decode(&buf, &field).unwrap(), Value::from("xyz"));
    }

    #[test]
    fn only_trailing_zeros_are_padding() {
        let field = FieldDef::new("code", FieldType::String(6));
        let buf = encode(&Value::from("a\0b"), &field).unwrap();
        assert_eq!(buf, b"a\0b\0\0\0");
        assert_eq!(decode(&buf, &field).unwrap(), Value::from("a\0b"));
    }

    #[test]
    fn coercions_and_mismatch() {
        let link = FieldDef::new("owner", FieldType::Link);
        assert_eq!(encode(&Value::Null, &link).unwrap(), (-1i64).to_le_bytes());
        assert!(decode(&(-1i64).to_le_bytes(), &link).unwrap().is_null());

        let flag = FieldDef::new("flag", FieldType::Bool);
        assert_eq!(encode(&Value::Int(7), &flag).unwrap(), vec![1]);

        let int = FieldDef::new("n", FieldType::Int);
        let err = encode(&Value::from("7"), &int).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>().unwrap().kind(),
            Kind::InvalidOperator(_)
        ));
    }
}
