use super::condition::Scalar;
use super::prelude::*;
use std::hash::{Hash, Hasher};

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFn {
    /// Number of rows, nulls included
    Count,
    /// Sum of non-null values
    Sum,
    /// Smallest non-null value
    Min,
    /// Largest non-null value
    Max,
}

/// Aggregation part of a query: optional group-by field and the functions to compute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSpec {
    group_by: Option<FieldRef>,
    functions: Vec<(AggFn, FieldRef)>,
}

impl AggregateSpec {
    /// Global aggregate without functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups rows by `field`.
    #[must_use]
    pub fn group_by(mut self, field: FieldRef) -> Self {
        self.group_by = Some(field);
        self
    }

    /// Adds function `f` over `field`; result values follow the order of calls.
    #[must_use]
    pub fn function(mut self, f: AggFn, field: FieldRef) -> Self {
        self.functions.push((f, field));
        self
    }

    /// Group-by field
    pub fn grouping(&self) -> Option<FieldRef> {
        self.group_by
    }

    /// Requested functions
    pub fn functions(&self) -> &[(AggFn, FieldRef)] {
        &self.functions
    }
}

/// Aggregated value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggValue {
    /// Result over integer-like fields and counts
    Int(i64),
    /// Result over double fields
    Double(f64),
}

/// Value of the group-by field identifying a group.
#[derive(Debug, Clone)]
pub enum GroupKey {
    /// Integer-like field
    Int(i64),
    /// String field, padding stripped
    Str(String),
    /// Double field
    Double(f64),
}

impl GroupKey {
    fn rank(&self) -> u8 {
        match self {
            GroupKey::Int(_) => 0,
            GroupKey::Double(_) => 1,
            GroupKey::Str(_) => 2,
        }
    }

    fn from_scalar(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Int(v) => GroupKey::Int(v),
            Scalar::Double(v) => GroupKey::Double(v),
            Scalar::Str(s) => GroupKey::Str(String::from_utf8_lossy(&s).into_owned()),
        }
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        match (self, other) {
            (GroupKey::Int(a), GroupKey::Int(b)) => a.cmp(b),
            (GroupKey::Double(a), GroupKey::Double(b)) => a.total_cmp(b),
            (GroupKey::Str(a), GroupKey::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            GroupKey::Int(v) => v.hash(state),
            GroupKey::Double(v) => v.to_bits().hash(state),
            GroupKey::Str(s) => s.hash(state),
        }
    }
}

/// One output row of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    /// Group value, `None` for a global aggregate
    pub group: Option<GroupKey>,
    /// One value per requested function
    pub values: Vec<AggValue>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    f: AggFn,
    field: FieldRef,
    nullable: bool,
    acc: AggValue,
}

impl Slot {
    fn new(model: &ModelDef, f: AggFn, field: FieldRef) -> Result<Self> {
        let ty = match field {
            FieldRef::Id => FieldType::Int,
            FieldRef::Field(idx) => model.field(idx)?.ty(),
        };
        let unsupported = |what: &str| {
            Error::invalid_operator(format!("{:?} over {} field {:?}", f, what, field))
        };
        match ty {
            FieldType::VirtualLink => return Err(unsupported("virtual link").into()),
            FieldType::String(_) if f != AggFn::Count => {
                return Err(unsupported("string").into())
            }
            _ => {}
        }
        let double = ty == FieldType::Double;
        let acc = match (f, double) {
            (AggFn::Count, _) => AggValue::Int(0),
            (AggFn::Sum, false) => AggValue::Int(0),
            (AggFn::Sum, true) => AggValue::Double(0.0),
            (AggFn::Min, false) => AggValue::Int(i64::MAX),
            (AggFn::Min, true) => AggValue::Double(f64::MAX),
            (AggFn::Max, false) => AggValue::Int(i64::MIN),
            (AggFn::Max, true) => AggValue::Double(f64::MIN),
        };
        Ok(Self {
            f,
            field,
            nullable: ty == FieldType::Link,
            acc,
        })
    }

    fn update(&mut self, model: &ModelDef, row: &Row) -> Result<()> {
        if self.f == AggFn::Count {
            if let AggValue::Int(n) = &mut self.acc {
                *n += 1;
            }
            return Ok(());
        }
        let value = Scalar::from_row(model, self.field, row)?;
        if self.nullable && value == Scalar::Int(NULL_OFFSET) {
            return Ok(());
        }
        match (&mut self.acc, value) {
            (AggValue::Int(acc), Scalar::Int(v)) => {
                *acc = match self.f {
                    AggFn::Sum => acc.wrapping_add(v),
                    AggFn::Min => (*acc).min(v),
                    _ => (*acc).max(v),
                }
            }
            (AggValue::Double(acc), Scalar::Double(v)) => {
                *acc = match self.f {
                    AggFn::Sum => *acc + v,
                    AggFn::Min => acc.min(v),
                    _ => acc.max(v),
                }
            }
            (_, value) => {
                return Err(Error::corrupted(format!(
                    "{:?} accumulator of {:?} can't take {:?}",
                    self.f, self.field, value
                ))
                .into())
            }
        }
        Ok(())
    }
}

/// Running accumulators, one tuple per group created on first encounter.
#[derive(Debug)]
pub(crate) struct Aggregator<'a> {
    model: &'a ModelDef,
    group_by: Option<FieldRef>,
    template: Vec<Slot>,
    groups: HashMap<Option<GroupKey>, Vec<Slot>>,
}

impl<'a> Aggregator<'a> {
    pub(crate) fn new(model: &'a ModelDef, spec: &AggregateSpec) -> Result<Self> {
        if let Some(FieldRef::Field(idx)) = spec.group_by {
            if model.field(idx)?.ty() == FieldType::VirtualLink {
                return Err(Error::invalid_operator("can't group by a virtual link").into());
            }
        }
        let template = spec
            .functions
            .iter()
            .map(|(f, field)| Slot::new(model, *f, *field))
            .collect::<Result<Vec<_>>>()?;
        let mut groups = HashMap::new();
        if spec.group_by.is_none() {
            groups.insert(None, template.clone());
        }
        Ok(Self {
            model,
            group_by: spec.group_by,
            template,
            groups,
        })
    }

    pub(crate) fn push(&mut self, row: &Row) -> Result<()> {
        let key = match self.group_by {
            Some(field) => Some(GroupKey::from_scalar(Scalar::from_row(
                self.model, field, row,
            )?)),
            None => None,
        };
        let template = &self.template;
        let slots = self.groups.entry(key).or_insert_with(|| template.clone());
        for slot in slots {
            slot.update(self.model, row)?;
        }
        Ok(())
    }

    /// Groups ordered by key, sliced by `offset` and `limit`.
    pub(crate) fn finish(self, limit: Option<usize>, offset: usize) -> Vec<AggregateResult> {
        let mut groups: Vec<_> = self.groups.into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));
        groups
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(group, slots)| AggregateResult {
                group,
                values: slots.into_iter().map(|slot| slot.acc).collect(),
            })
            .collect()
    }
}
