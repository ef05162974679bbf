use super::prelude::*;
use crate::types::{read_f64, read_i64};
use regex::bytes::{Regex, RegexBuilder};

/// Field a condition, ordering or link refers to. `Id` is the logical record id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// Logical record id
    Id,
    /// Model field by position
    Field(usize),
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// Unanchored regular expression search, strings only
    Regex,
    /// Value is one of a list
    IsIn,
    /// Value is none of a list
    NotIn,
    /// Inclusive range
    Between,
    /// Case-insensitive [`Operator::Regex`]
    IRegex,
}

impl Operator {
    /// Stable numeric code of the operator.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Whether conditions with this operator can be answered by a secondary index.
    pub const fn supports_index(&self) -> bool {
        matches!(self, Operator::Equal | Operator::IsIn | Operator::Between)
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Single value
    Value(Value),
    /// Values for `IsIn`/`NotIn`
    List(Vec<Value>),
    /// Inclusive bounds for `Between`
    Range(Value, Value),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(v: Vec<Value>) -> Self {
        Operand::List(v)
    }
}

impl From<(Value, Value)> for Operand {
    fn from((low, high): (Value, Value)) -> Self {
        Operand::Range(low, high)
    }
}

/// Single predicate `field <op> operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: FieldRef,
    op: Operator,
    operand: Operand,
}

impl Condition {
    /// Creates condition
    pub fn new(field: FieldRef, op: Operator, operand: impl Into<Operand>) -> Self {
        Self {
            field,
            op,
            operand: operand.into(),
        }
    }

    /// Target field
    pub fn field(&self) -> FieldRef {
        self.field
    }

    /// Operator
    pub fn op(&self) -> Operator {
        self.op
    }

    /// Operand
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub(crate) fn is_index_eligible(&self, model: &ModelDef) -> bool {
        self.op.supports_index()
            && match self.field {
                FieldRef::Id => true,
                FieldRef::Field(idx) => model.field(idx).map_or(false, FieldDef::is_indexed),
            }
    }
}

/// Node of a condition tree.
///
/// The node holds when all (`AND`) or any (`OR`) of its conditions, index conditions and
/// children hold. A node without terms always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    is_and: bool,
    conditions: Vec<Condition>,
    index_conditions: Vec<Condition>,
    children: Vec<ConditionNode>,
}

impl ConditionNode {
    /// Empty conjunction
    pub fn and() -> Self {
        Self::with_kind(true)
    }

    /// Empty disjunction
    pub fn or() -> Self {
        Self::with_kind(false)
    }

    fn with_kind(is_and: bool) -> Self {
        Self {
            is_and,
            conditions: Vec::new(),
            index_conditions: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds a condition checked against every row. Conditions that an index can answer
    /// are moved to the index path when the query runs.
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds a condition that must be answered by an index.
    #[must_use]
    pub fn index_condition(mut self, condition: Condition) -> Self {
        self.index_conditions.push(condition);
        self
    }

    /// Adds a nested node.
    #[must_use]
    pub fn child(mut self, node: ConditionNode) -> Self {
        self.children.push(node);
        self
    }

    /// `true` for AND nodes
    pub fn is_and(&self) -> bool {
        self.is_and
    }

    pub(crate) fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

/// Comparable scalar taken from a field or an operand.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    Int(i64),
    Double(f64),
    Str(Vec<u8>),
}

impl Scalar {
    fn cmp(&self, other: &Scalar) -> Option<CmpOrdering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Double(a), Scalar::Double(b)) => Some(a.total_cmp(b)),
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Scalar stored in `field` of a raw record, `id` for [`FieldRef::Id`].
    pub(crate) fn from_row(model: &ModelDef, field: FieldRef, row: &Row) -> Result<Self> {
        let idx = match field {
            FieldRef::Id => return Ok(Scalar::Int(row.id)),
            FieldRef::Field(idx) => idx,
        };
        let raw = model.field_bytes(idx, &row.data)?;
        let scalar = match model.field(idx)?.ty() {
            FieldType::Bool => Scalar::Int(i64::from(raw.first().copied().unwrap_or(0))),
            FieldType::Double => Scalar::Double(read_f64(raw)?),
            FieldType::String(_) => {
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                Scalar::Str(raw[..end].to_vec())
            }
            FieldType::VirtualLink => {
                return Err(Error::invalid_operator(format!(
                    "virtual link `{}` has no stored value",
                    model.field(idx)?.name()
                ))
                .into())
            }
            _ => Scalar::Int(read_i64(raw)?),
        };
        Ok(scalar)
    }

    fn from_value(model: &ModelDef, field: FieldRef, value: &Value) -> Result<Self> {
        let ty = match field {
            FieldRef::Id => FieldType::Int,
            FieldRef::Field(idx) => model.field(idx)?.ty(),
        };
        let scalar = match (ty, value) {
            (FieldType::Link, Value::Null) => Some(Scalar::Int(NULL_OFFSET)),
            (FieldType::Double, v) => v.as_f64().map(Scalar::Double),
            (FieldType::String(_), v) => v.as_str().map(|s| Scalar::Str(s.as_bytes().to_vec())),
            (FieldType::VirtualLink, _) => None,
            (_, v) => v.as_i64().map(Scalar::Int),
        };
        scalar.ok_or_else(|| {
            Error::invalid_operator(format!("value {} is not comparable with {:?}", value, ty))
                .into()
        })
    }
}

#[derive(Debug)]
enum Target {
    One(Scalar),
    List(Vec<Scalar>),
    Range(Scalar, Scalar),
    Pattern(Regex),
}

/// Condition validated and converted against a model.
#[derive(Debug)]
pub(crate) struct CompiledCondition {
    field: FieldRef,
    op: Operator,
    target: Target,
}

impl CompiledCondition {
    pub(crate) fn compile(model: &ModelDef, condition: &Condition) -> Result<Self> {
        let field = condition.field;
        if let FieldRef::Field(idx) = field {
            if model.field(idx)?.ty() == FieldType::VirtualLink {
                return Err(Error::invalid_operator(format!(
                    "condition on virtual link `{}`",
                    model.field(idx)?.name()
                ))
                .into());
            }
        }
        let wrong_operand = || {
            Error::invalid_operator(format!(
                "operator {:?} doesn't accept operand {:?}",
                condition.op, condition.operand
            ))
        };
        let target = match (condition.op, &condition.operand) {
            (Operator::Regex | Operator::IRegex, Operand::Value(Value::String(pattern))) => {
                let is_string = match field {
                    FieldRef::Field(idx) => matches!(model.field(idx)?.ty(), FieldType::String(_)),
                    FieldRef::Id => false,
                };
                if !is_string {
                    return Err(Error::invalid_operator("regex conditions need a string field").into());
                }
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(condition.op == Operator::IRegex)
                    .build()
                    .map_err(|e| Error::invalid_operator(format!("bad pattern {:?}: {}", pattern, e)))?;
                Target::Pattern(regex)
            }
            (Operator::IsIn | Operator::NotIn, Operand::List(values)) => Target::List(
                values
                    .iter()
                    .map(|v| Scalar::from_value(model, field, v))
                    .collect::<Result<_>>()?,
            ),
            (Operator::Between, Operand::Range(low, high)) => Target::Range(
                Scalar::from_value(model, field, low)?,
                Scalar::from_value(model, field, high)?,
            ),
            (
                Operator::Equal
                | Operator::NotEqual
                | Operator::Greater
                | Operator::GreaterOrEqual
                | Operator::Less
                | Operator::LessOrEqual,
                Operand::Value(value),
            ) => Target::One(Scalar::from_value(model, field, value)?),
            _ => return Err(wrong_operand().into()),
        };
        Ok(Self {
            field,
            op: condition.op,
            target,
        })
    }

    pub(crate) fn matches(&self, model: &ModelDef, row: &Row) -> Result<bool> {
        let value = Scalar::from_row(model, self.field, row)?;
        let ord = |other: &Scalar| value.cmp(other);
        let res = match (&self.target, self.op) {
            (Target::One(v), Operator::Equal) => ord(v) == Some(CmpOrdering::Equal),
            (Target::One(v), Operator::NotEqual) => ord(v) != Some(CmpOrdering::Equal),
            (Target::One(v), Operator::Greater) => ord(v) == Some(CmpOrdering::Greater),
            (Target::One(v), Operator::GreaterOrEqual) => {
                matches!(ord(v), Some(CmpOrdering::Greater | CmpOrdering::Equal))
            }
            (Target::One(v), Operator::Less) => ord(v) == Some(CmpOrdering::Less),
            (Target::One(v), Operator::LessOrEqual) => {
                matches!(ord(v), Some(CmpOrdering::Less | CmpOrdering::Equal))
            }
            (Target::List(values), Operator::IsIn) => {
                values.iter().any(|v| ord(v) == Some(CmpOrdering::Equal))
            }
            (Target::List(values), Operator::NotIn) => {
                !values.iter().any(|v| ord(v) == Some(CmpOrdering::Equal))
            }
            (Target::Range(low, high), _) => {
                matches!(ord(low), Some(CmpOrdering::Greater | CmpOrdering::Equal))
                    && matches!(ord(high), Some(CmpOrdering::Less | CmpOrdering::Equal))
            }
            (Target::Pattern(regex), _) => match &value {
                Scalar::Str(s) => regex.is_match(s),
                _ => false,
            },
            _ => return Err(Error::invalid_operator(format!("{:?}", self.op)).into()),
        };
        Ok(res)
    }
}

/// Condition tree with index conditions resolved into id sets.
#[derive(Debug)]
pub(crate) struct PreparedNode {
    is_and: bool,
    conditions: Vec<CompiledCondition>,
    index_sets: Vec<HashSet<i64>>,
    children: Vec<PreparedNode>,
    index_resolved: bool,
}

impl PreparedNode {
    /// Compiles `node`, answering index-eligible conditions with `resolve`.
    pub(crate) fn prepare<F>(model: &ModelDef, node: &ConditionNode, resolve: &mut F) -> Result<Self>
    where
        F: FnMut(&Condition) -> Result<HashSet<i64>>,
    {
        let mut conditions = Vec::new();
        let mut index_sets = Vec::new();
        for condition in &node.index_conditions {
            if !condition.is_index_eligible(model) {
                return Err(Error::invalid_operator(format!(
                    "condition {:?} can't be answered by an index",
                    condition
                ))
                .into());
            }
            CompiledCondition::compile(model, condition)?;
            index_sets.push(resolve(condition)?);
        }
        for condition in &node.conditions {
            let compiled = CompiledCondition::compile(model, condition)?;
            if condition.is_index_eligible(model) {
                index_sets.push(resolve(condition)?);
            } else {
                conditions.push(compiled);
            }
        }
        let children = node
            .children
            .iter()
            .map(|child| Self::prepare(model, child, resolve))
            .collect::<Result<_>>()?;
        Ok(Self {
            is_and: node.is_and,
            conditions,
            index_sets,
            children,
            index_resolved: false,
        })
    }

    /// Ids that can satisfy the node according to its index sets alone, if the index
    /// sets are the only thing the node's result depends on (OR) or a necessary
    /// condition of it (AND).
    pub(crate) fn index_candidates(&self) -> Option<HashSet<i64>> {
        if self.index_sets.is_empty() {
            return None;
        }
        if self.is_and {
            let mut sets = self.index_sets.iter();
            let first = sets.next()?.clone();
            Some(sets.fold(first, |acc, set| acc.intersection(set).copied().collect()))
        } else if self.conditions.is_empty() && self.children.is_empty() {
            Some(self.index_sets.iter().flatten().copied().collect())
        } else {
            None
        }
    }

    /// Marks the index sets of this node as already applied to the candidate rows.
    pub(crate) fn set_index_resolved(&mut self) {
        self.index_resolved = true;
    }

    pub(crate) fn matches(&self, model: &ModelDef, row: &Row) -> Result<bool> {
        let mut terms = 0;
        let mut any = false;
        for set in &self.index_sets {
            let hit = self.index_resolved || set.contains(&row.id);
            terms += 1;
            if self.is_and && !hit {
                return Ok(false);
            }
            any |= hit;
        }
        for condition in &self.conditions {
            let hit = condition.matches(model, row)?;
            terms += 1;
            if self.is_and && !hit {
                return Ok(false);
            }
            if !self.is_and && hit {
                return Ok(true);
            }
        }
        for child in &self.children {
            let hit = child.matches(model, row)?;
            terms += 1;
            if self.is_and && !hit {
                return Ok(false);
            }
            if !self.is_and && hit {
                return Ok(true);
            }
        }
        Ok(self.is_and || terms == 0 || any)
    }
}
