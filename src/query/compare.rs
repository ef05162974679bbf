use super::prelude::*;

/// Orders rows by a list of `(field, ascending)` keys in priority order.
///
/// Rows equal on every key are ordered by id, so bounded selection and a full sort agree.
#[derive(Debug, Clone)]
pub(crate) struct RowComparator {
    keys: Vec<(SortKey, bool)>,
}

#[derive(Debug, Clone, Copy)]
enum SortKey {
    Id,
    Field {
        ty: FieldType,
        offset: usize,
        size: usize,
    },
}

impl RowComparator {
    pub(crate) fn new(model: &ModelDef, order: &[(FieldRef, bool)]) -> Result<Self> {
        let keys = order
            .iter()
            .map(|(field, asc)| {
                let key = match field {
                    FieldRef::Id => SortKey::Id,
                    FieldRef::Field(idx) => {
                        let def = model.field(*idx)?;
                        if def.ty() == FieldType::VirtualLink {
                            return Err(Error::invalid_operator(format!(
                                "can't order by virtual link `{}`",
                                def.name()
                            ))
                            .into());
                        }
                        SortKey::Field {
                            ty: def.ty(),
                            offset: def.offset(),
                            size: def.size(),
                        }
                    }
                };
                Ok((key, *asc))
            })
            .collect::<Result<_>>()?;
        Ok(Self { keys })
    }

    pub(crate) fn compare(&self, a: &Row, b: &Row) -> CmpOrdering {
        for (key, asc) in &self.keys {
            let ord = match key {
                SortKey::Id => a.id.cmp(&b.id),
                SortKey::Field { ty, offset, size } => {
                    let range = *offset..*offset + *size;
                    match (a.data.get(range.clone()), b.data.get(range)) {
                        (Some(x), Some(y)) => ty.compare(x, y).unwrap_or(CmpOrdering::Equal),
                        _ => CmpOrdering::Equal,
                    }
                }
            };
            let ord = if *asc { ord } else { ord.reverse() };
            if ord != CmpOrdering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// Row ranked by a comparator, for bounded top-k selection in a [`BinaryHeap`].
pub(crate) struct Ranked<'a> {
    pub(crate) row: Row,
    cmp: &'a RowComparator,
}

impl<'a> Ranked<'a> {
    pub(crate) fn new(row: Row, cmp: &'a RowComparator) -> Self {
        Self { row, cmp }
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Ranked<'_> {}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.cmp.compare(&self.row, &other.row)
    }
}

/// Keeps the `capacity` best rows seen so far; the heap top is the worst kept row.
pub(crate) struct TopK<'a> {
    heap: BinaryHeap<Ranked<'a>>,
    capacity: usize,
    cmp: &'a RowComparator,
}

impl<'a> TopK<'a> {
    pub(crate) fn new(capacity: usize, cmp: &'a RowComparator) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1 << 16)),
            capacity,
            cmp,
        }
    }

    pub(crate) fn push(&mut self, row: Row) {
        if self.heap.len() == self.capacity {
            match self.heap.peek() {
                Some(worst) if self.cmp.compare(&row, &worst.row) == CmpOrdering::Less => {}
                _ => return,
            }
        }
        self.heap.push(Ranked::new(row, self.cmp));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    pub(crate) fn into_sorted(self) -> Vec<Row> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDef {
        ModelDef::new(
            "p",
            vec![
                FieldDef::new("name", FieldType::String(4)),
                FieldDef::new("age", FieldType::Int),
                FieldDef::new("tags", FieldType::VirtualLink),
            ],
        )
        .unwrap()
    }

    fn row(model: &ModelDef, id: i64, name: &str, age: i64) -> Row {
        let data = model
            .encode_record(&[Value::from(name), Value::Int(age), Value::Null])
            .unwrap()
            .freeze();
        Row { id, data }
    }

    #[test]
    fn priority_and_direction() {
        let model = model();
        let cmp = RowComparator::new(
            &model,
            &[(FieldRef::Field(1), false), (FieldRef::Field(0), true)],
        )
        .unwrap();
        let mut rows = vec![
            row(&model, 0, "bo", 30),
            row(&model, 1, "al", 30),
            row(&model, 2, "cy", 41),
            row(&model, 3, "al", 30),
        ];
        rows.sort_by(|a, b| cmp.compare(a, b));
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 0]);
    }

    #[test]
    fn top_k_matches_full_sort() {
        let model = model();
        let cmp = RowComparator::new(&model, &[(FieldRef::Field(1), true)]).unwrap();
        let rows: Vec<_> = (0..50)
            .map(|i| row(&model, i, "x", (i * 37) % 11))
            .collect();
        let mut top = TopK::new(7, &cmp);
        rows.iter().cloned().for_each(|r| top.push(r));
        let mut sorted = rows;
        sorted.sort_by(|a, b| cmp.compare(a, b));
        sorted.truncate(7);
        assert_eq!(top.into_sorted(), sorted);
    }

    #[test]
    fn virtual_link_is_not_orderable() {
        let err = RowComparator::new(&model(), &[(FieldRef::Field(2), true)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>().unwrap().kind(),
            Kind::InvalidOperator(_)
        ));
    }
}
