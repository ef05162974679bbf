use super::prelude::*;

/// Splits `entries` (`(offset, id)`, sorted by offset) into runs that are read with a
/// single I/O each.
///
/// A run grows while the span from its first offset to the end of its last record stays
/// within `max_span` bytes. Runs shorter than `min_len` entries are not worth a combined
/// read and are returned as singletons.
pub(crate) fn clusterify(
    entries: &[(u64, i64)],
    slot_size: u64,
    max_span: u64,
    min_len: usize,
) -> Vec<&[(u64, i64)]> {
    let mut clusters = Vec::new();
    let mut i = 0;
    while i < entries.len() {
        let first = entries[i].0;
        let mut j = i;
        while j + 1 < entries.len() && entries[j + 1].0 + slot_size - first <= max_span {
            j += 1;
        }
        if j + 1 - i >= min_len {
            clusters.push(&entries[i..=j]);
        } else {
            clusters.extend((i..=j).map(|k| &entries[k..=k]));
        }
        i = j + 1;
    }
    clusters
}
