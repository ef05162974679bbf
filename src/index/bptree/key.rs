use super::prelude::*;

/// Fixed-width key stored in B+tree nodes.
///
/// The width is a property of the index (`key_size`), not of the type, so string keys of
/// different fields can share one implementation. Ordering of decoded keys must agree
/// with the ordering of the field values they were taken from.
pub trait Key: Ord + Clone + Debug + Send + Sync {
    /// Writes the key into `buf`, which is exactly `key_size` long.
    /// # Errors
    /// Fails with `FieldTooLarge` if the key doesn't fit.
    fn encode_into(&self, buf: &mut [u8]) -> Result<()>;

    /// Reads the key back from `key_size` bytes.
    /// # Errors
    /// Fails with `Corrupted` if `buf` is too short.
    fn decode(buf: &[u8]) -> Result<Self>;
}

impl Key for i64 {
    fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let size = buf.len();
        buf.get_mut(..8)
            .ok_or_else(|| Error::field_too_large("key", size, 8))?
            .copy_from_slice(&self.to_le_bytes());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        crate::types::read_i64(buf)
    }
}

/// Float key with total ordering.
#[derive(Debug, Clone, Copy)]
pub struct Double(pub f64);

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Double {}

impl PartialOrd for Double {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Double {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

impl Key for Double {
    fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let size = buf.len();
        buf.get_mut(..8)
            .ok_or_else(|| Error::field_too_large("key", size, 8))?
            .copy_from_slice(&self.0.to_le_bytes());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        crate::types::read_f64(buf).map(Double)
    }
}

/// Zero padded string key. Trailing zero bytes are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedStr(Vec<u8>);

impl FixedStr {
    /// Key from raw (possibly padded) field bytes.
    pub fn from_padded(buf: &[u8]) -> Self {
        let end = buf.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        Self(buf[..end].to_vec())
    }

    /// Key bytes without padding
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the key without padding
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is an empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for FixedStr {
    fn from(s: &str) -> Self {
        Self::from_padded(s.as_bytes())
    }
}

impl Key for FixedStr {
    fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if self.0.len() > buf.len() {
            return Err(Error::field_too_large("key", buf.len(), self.0.len()).into());
        }
        buf[..self.0.len()].copy_from_slice(&self.0);
        buf[self.0.len()..].fill(0);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(Self::from_padded(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_strings_keep_field_order() {
        let mut a = [0u8; 6];
        let mut ad = [0u8; 6];
        FixedStr::from("a").encode_into(&mut a).unwrap();
        FixedStr::from("ad").encode_into(&mut ad).unwrap();
        assert!(a < ad);
        assert_eq!(FixedStr::decode(&a).unwrap(), FixedStr::from("a"));
        assert!(FixedStr::decode(&a).unwrap() < FixedStr::decode(&ad).unwrap());
        assert!(FixedStr::from("abcdefg").encode_into(&mut a).is_err());
    }

    #[test]
    fn doubles_are_totally_ordered() {
        let mut buf = [0u8; 8];
        Double(-2.5).encode_into(&mut buf).unwrap();
        assert_eq!(Double::decode(&buf).unwrap(), Double(-2.5));
        assert!(Double(-2.5) < Double(0.0));
        assert!(Double(1.0) < Double(f64::INFINITY));
    }
}
