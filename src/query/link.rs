use super::condition::Scalar;
use super::prelude::*;

/// Join of a linked table into the rows of a parent query.
///
/// A direct link follows a `Link` field of the parent to the child with that id and
/// attaches at most one row. A virtual link collects every child whose `Link` field
/// points back at the parent id.
#[derive(Debug, Clone)]
pub struct LinkObject {
    query: Query,
    direct: bool,
    parent_field: FieldRef,
    child_field: FieldRef,
    limit: Option<usize>,
    offset: usize,
}

impl LinkObject {
    /// One-to-one link through the parent's `Link` field at position `link_field`.
    pub fn direct(link_field: usize, query: Query) -> Self {
        Self::new(query, true, FieldRef::Field(link_field), FieldRef::Id)
    }

    /// One-to-many link: children whose `Link` field at position `child_link_field`
    /// holds the parent id.
    pub fn virtual_link(child_link_field: usize, query: Query) -> Self {
        Self::new(query, false, FieldRef::Id, FieldRef::Field(child_link_field))
    }

    /// Link matching `parent_field` of parent rows against `child_field` of child rows.
    pub fn new(query: Query, direct: bool, parent_field: FieldRef, child_field: FieldRef) -> Self {
        Self {
            query,
            direct,
            parent_field,
            child_field,
            limit: None,
            offset: 0,
        }
    }

    /// Max number of children attached to one parent row of a virtual link.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Number of children skipped for every parent row of a virtual link.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// `true` for one-to-one links
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// Query over the linked table
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub(crate) fn parent_key(&self, model: &ModelDef, row: &Row) -> Result<i64> {
        key_of(model, self.parent_field, row)
    }

    pub(crate) fn child_key(&self, row: &Row) -> Result<i64> {
        key_of(self.query.model(), self.child_field, row)
    }

    /// Child query restricted to rows whose key is one of `keys`. Limit and offset of
    /// the linked query apply per parent, so they are dropped here.
    pub(crate) fn child_query(&self, keys: &[i64]) -> Query {
        let condition = Condition::new(
            self.child_field,
            Operator::IsIn,
            keys.iter().map(|k| Value::Int(*k)).collect::<Vec<_>>(),
        );
        let filter = match self.query.conditions() {
            Some(node) if node.is_and() => {
                let mut node = node.clone();
                node.push_condition(condition);
                node
            }
            Some(node) => ConditionNode::and()
                .condition(condition)
                .child(node.clone()),
            None => ConditionNode::and().condition(condition),
        };
        self.query.clone().without_window().filter(filter)
    }

    /// Value attached to a parent row given the children sharing its key.
    pub(crate) fn attach(&self, children: Option<&[JoinedRow]>) -> Linked {
        match (self.direct, children) {
            (true, Some(children)) => children
                .first()
                .map_or(Linked::Missing, |child| Linked::One(Box::new(child.clone()))),
            (true, None) => Linked::Missing,
            (false, Some(children)) => Linked::Many(
                children
                    .iter()
                    .skip(self.offset)
                    .take(self.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect(),
            ),
            (false, None) => Linked::Many(Vec::new()),
        }
    }
}

fn key_of(model: &ModelDef, field: FieldRef, row: &Row) -> Result<i64> {
    match Scalar::from_row(model, field, row)? {
        Scalar::Int(key) => Ok(key),
        other => Err(Error::invalid_operator(format!(
            "link key {:?} of {} must be integer, got {:?}",
            field,
            model.name(),
            other
        ))
        .into()),
    }
}

/// Row with the results of its links, in the order links were added to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    /// Row of the queried table
    pub row: Row,
    /// One entry per link
    pub links: Vec<Linked>,
}

/// Link result attached to a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Linked {
    /// Direct link whose target doesn't exist or is null (`-1`)
    Missing,
    /// Direct link target
    One(Box<JoinedRow>),
    /// Virtual link children
    Many(Vec<JoinedRow>),
}

impl Linked {
    /// Rows attached by this link.
    pub fn rows(&self) -> Vec<&JoinedRow> {
        match self {
            Linked::Missing => Vec::new(),
            Linked::One(row) => vec![row.as_ref()],
            Linked::Many(rows) => rows.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDef {
        ModelDef::new("c", vec![FieldDef::new("owner", FieldType::Link)]).unwrap()
    }

    fn joined(id: i64) -> JoinedRow {
        let data = model()
            .encode_record(&[Value::Link(id)])
            .unwrap()
            .freeze();
        JoinedRow {
            row: Row { id, data },
            links: Vec::new(),
        }
    }

    #[test]
    fn child_query_keeps_or_filter_as_child() {
        let or = ConditionNode::or()
            .condition(Condition::new(FieldRef::Id, Operator::Less, Value::Int(3)))
            .condition(Condition::new(FieldRef::Id, Operator::Greater, Value::Int(9)));
        let link = LinkObject::virtual_link(0, Query::new(model()).filter(or.clone()).limit(2))
            .limit(1);
        let query = link.child_query(&[4, 5]);
        let expected = ConditionNode::and()
            .condition(Condition::new(
                FieldRef::Field(0),
                Operator::IsIn,
                vec![Value::Int(4), Value::Int(5)],
            ))
            .child(or);
        assert_eq!(query.conditions(), Some(&expected));
        assert_eq!(query.window(), (None, 0));
    }

    #[test]
    fn attach_slices_virtual_children() {
        let children = vec![joined(1), joined(2), joined(3)];
        let link = LinkObject::virtual_link(0, Query::new(model()))
            .offset(1)
            .limit(1);
        assert_eq!(link.attach(Some(&children[..])), Linked::Many(vec![joined(2)]));

        let direct = LinkObject::direct(0, Query::new(model()));
        assert_eq!(direct.attach(None), Linked::Missing);
        assert_eq!(
            direct.attach(Some(&children[..])).rows(),
            vec![&joined(1)]
        );
    }
}
