use super::aggregate::Aggregator;
use super::cluster::clusterify;
use super::compare::{RowComparator, TopK};
use super::condition::PreparedNode;
use super::prelude::*;
use crate::storage::{Database, Table};

/// Query over one table.
///
/// Built with consuming setters:
/// ```no_run
/// # use tabula::{Condition, ConditionNode, FieldDef, FieldRef, FieldType, ModelDef, Operator, Query, Value};
/// # let model = ModelDef::new("user", vec![FieldDef::new("age", FieldType::Int)]).unwrap();
/// let query = Query::new(model)
///     .filter(ConditionNode::and().condition(Condition::new(
///         FieldRef::Field(0),
///         Operator::Greater,
///         Value::Int(18),
///     )))
///     .order_by(FieldRef::Field(0), false)
///     .limit(10);
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    model: ModelDef,
    order: Vec<(FieldRef, bool)>,
    filter: Option<ConditionNode>,
    limit: Option<usize>,
    offset: usize,
    aggregate: Option<AggregateSpec>,
    links: Vec<LinkObject>,
}

impl Query {
    /// Query returning every live row of `model`
    pub fn new(model: ModelDef) -> Self {
        Self {
            model,
            order: Vec::new(),
            filter: None,
            limit: None,
            offset: 0,
            aggregate: None,
            links: Vec::new(),
        }
    }

    /// Appends an ordering key; earlier keys take priority.
    #[must_use]
    pub fn order_by(mut self, field: FieldRef, ascending: bool) -> Self {
        self.order.push((field, ascending));
        self
    }

    /// Sets the condition tree rows must satisfy.
    #[must_use]
    pub fn filter(mut self, node: ConditionNode) -> Self {
        self.filter = Some(node);
        self
    }

    /// Max number of rows (or groups) returned.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Number of leading rows (or groups) dropped from the result.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Turns the query into an aggregation.
    #[must_use]
    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregate = Some(spec);
        self
    }

    /// Adds a join with another table.
    #[must_use]
    pub fn link(mut self, link: LinkObject) -> Self {
        self.links.push(link);
        self
    }

    /// Queried model
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Ordering keys in priority order
    pub fn ordering(&self) -> &[(FieldRef, bool)] {
        &self.order
    }

    /// Condition tree
    pub fn conditions(&self) -> Option<&ConditionNode> {
        self.filter.as_ref()
    }

    /// `(limit, offset)`
    pub fn window(&self) -> (Option<usize>, usize) {
        (self.limit, self.offset)
    }

    /// Aggregation spec
    pub fn aggregation(&self) -> Option<&AggregateSpec> {
        self.aggregate.as_ref()
    }

    /// Joins
    pub fn links(&self) -> &[LinkObject] {
        &self.links
    }

    pub(crate) fn without_window(mut self) -> Self {
        self.limit = None;
        self.offset = 0;
        self
    }

    fn wanted(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_add(self.offset))
    }
}

/// Result of [`QueryEngine::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Plain rows
    Rows(Vec<Row>),
    /// Aggregation groups ordered by group value
    Aggregate(Vec<AggregateResult>),
    /// Rows with their joins
    Joined(Vec<JoinedRow>),
}

/// Executes queries against the tables of one schema.
///
/// Nothing is cached between calls: every query re-reads the primary index and the
/// index headers it needs.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    db: Database,
    schema: String,
}

impl QueryEngine {
    /// Engine over tables of `schema`
    pub fn new(db: Database, schema: impl Into<String>) -> Self {
        Self {
            db,
            schema: schema.into(),
        }
    }

    /// Runs `query`: aggregation if it has one, join if it has links, plain rows otherwise.
    /// # Errors
    /// See [`QueryEngine::rows`], [`QueryEngine::aggregate`] and [`QueryEngine::joined`].
    pub fn execute(&self, query: &Query) -> Result<QueryOutput> {
        if query.aggregate.is_some() {
            self.aggregate(query).map(QueryOutput::Aggregate)
        } else if !query.links.is_empty() {
            self.joined(query).map(QueryOutput::Joined)
        } else {
            self.rows(query).map(QueryOutput::Rows)
        }
    }

    /// Rows matching the filter, ordered and windowed. Without ordering, rows come in
    /// id order.
    /// # Errors
    /// Fails with `InvalidOperator` on conditions or orderings a field type doesn't
    /// support, `SchemaNotFound` if the table doesn't exist, and on I/O errors.
    pub fn rows(&self, query: &Query) -> Result<Vec<Row>> {
        debug!(
            "query {}.{}: order {:?}, limit {:?}, offset {}",
            self.schema,
            query.model.name(),
            query.order,
            query.limit,
            query.offset
        );
        let table = self.db.table(&self.schema, &query.model)?;
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }
        if let Some(rows) = self.ordered_scan(&table, query)? {
            return Ok(rows);
        }
        let cmp = RowComparator::new(&query.model, &query.order)?;
        let filter = query.filter.as_ref();
        // with no ordering keys the comparator orders by id alone
        let rows = if let Some(wanted) = query.wanted() {
            let mut top = TopK::new(wanted, &cmp);
            self.scan(&table, filter, |row| {
                top.push(row);
                Ok(true)
            })?;
            top.into_sorted()
        } else {
            let mut rows = Vec::new();
            self.scan(&table, filter, |row| {
                rows.push(row);
                Ok(true)
            })?;
            rows.sort_by(|a, b| cmp.compare(a, b));
            rows
        };
        Ok(window(rows, query.limit, query.offset))
    }

    /// Aggregation groups ordered by group value, windowed by limit and offset.
    /// Ordering keys of the query are ignored.
    /// # Errors
    /// Fails with `WrongConfig` if the query has no aggregation spec and with
    /// `InvalidOperator` if a function doesn't apply to its field.
    pub fn aggregate(&self, query: &Query) -> Result<Vec<AggregateResult>> {
        let spec = query
            .aggregate
            .as_ref()
            .ok_or_else(|| Error::wrong_config("query has no aggregation"))?;
        debug!(
            "aggregate {}.{}: {:?}",
            self.schema,
            query.model.name(),
            spec
        );
        let table = self.db.table(&self.schema, &query.model)?;
        let mut aggregator = Aggregator::new(&query.model, spec)?;
        self.scan(&table, query.filter.as_ref(), |row| {
            aggregator.push(&row)?;
            Ok(true)
        })?;
        Ok(aggregator.finish(query.limit, query.offset))
    }

    /// Rows of `query` with every link resolved, recursively through the links of the
    /// linked queries.
    /// # Errors
    /// Fails if any of the involved queries fails or a link key is not an integer field.
    pub fn joined(&self, query: &Query) -> Result<Vec<JoinedRow>> {
        let mut joined: Vec<_> = self
            .rows(query)?
            .into_iter()
            .map(|row| JoinedRow {
                row,
                links: Vec::with_capacity(query.links.len()),
            })
            .collect();
        for link in &query.links {
            let keys = joined
                .iter()
                .map(|parent| link.parent_key(&query.model, &parent.row))
                .collect::<Result<Vec<_>>>()?;
            let mut distinct: Vec<_> = keys
                .iter()
                .copied()
                .filter(|key| *key != NULL_OFFSET)
                .collect();
            distinct.sort_unstable();
            distinct.dedup();
            let mut groups: HashMap<i64, Vec<JoinedRow>> = HashMap::new();
            if !distinct.is_empty() {
                for child in self.joined(&link.child_query(&distinct))? {
                    groups
                        .entry(link.child_key(&child.row)?)
                        .or_default()
                        .push(child);
                }
            }
            trace!(
                "link {} -> {}: {} keys, {} groups",
                query.model.name(),
                link.query().model().name(),
                distinct.len(),
                groups.len()
            );
            for (parent, key) in joined.iter_mut().zip(keys) {
                parent
                    .links
                    .push(link.attach(groups.get(&key).map(Vec::as_slice)));
            }
        }
        Ok(joined)
    }

    /// Walks the leaf chain of the index on the single ordering field instead of sorting.
    ///
    /// The walk runs past `limit + offset` ids while the key equals the last taken one,
    /// then the rows are sorted like any other ordered query so ties fall by id.
    fn ordered_scan(&self, table: &Table, query: &Query) -> Result<Option<Vec<Row>>> {
        let (idx, ascending) = match query.order.as_slice() {
            [(FieldRef::Field(idx), ascending)] if query.filter.is_none() => (*idx, *ascending),
            _ => return Ok(None),
        };
        let index = match table.field_index(idx) {
            Some(index) => index,
            None => return Ok(None),
        };
        let cmp = RowComparator::new(&query.model, &query.order)?;
        let live: HashMap<_, _> = table
            .heap()
            .live_entries(self.db.config().read_chunk_size())?
            .into_iter()
            .collect();
        let reader = table.heap().reader()?;
        let read = |id: i64| -> Result<Option<Row>> {
            live.get(&id)
                .map(|offset| reader.read_one(*offset, id))
                .transpose()
        };
        let wanted = query.wanted();
        let ids = index.ordered_ids(ascending, wanted, 0)?;
        let mut walked = ids.len();
        let mut rows = Vec::with_capacity(walked);
        for id in ids {
            rows.extend(read(id)?);
        }
        let boundary = match (wanted, rows.last()) {
            (Some(wanted), Some(last)) if walked == wanted => {
                Some((wanted, query.model.field_bytes(idx, &last.data)?.to_vec()))
            }
            _ => None,
        };
        if let Some((batch, key)) = boundary {
            'ties: loop {
                let ids = index.ordered_ids(ascending, Some(batch), walked)?;
                let exhausted = ids.len() < batch;
                walked += ids.len();
                for id in ids {
                    if let Some(row) = read(id)? {
                        if query.model.field_bytes(idx, &row.data)? != key.as_slice() {
                            break 'ties;
                        }
                        rows.push(row);
                    }
                }
                if exhausted {
                    break;
                }
            }
        }
        debug!(
            "ordered scan of {} by {}: {} ids walked",
            query.model.name(),
            index.field(),
            walked
        );
        rows.sort_by(|a, b| cmp.compare(a, b));
        Ok(Some(window(rows, query.limit, query.offset)))
    }

    /// Feeds every live row satisfying `filter` to `f`, in heap order, until `f`
    /// returns `false`.
    fn scan<F>(&self, table: &Table, filter: Option<&ConditionNode>, mut f: F) -> Result<()>
    where
        F: FnMut(Row) -> Result<bool>,
    {
        let model = table.model();
        let config = self.db.config();
        let (mut entries, prepared) = self.candidates(table, filter)?;
        entries.sort_unstable();
        let reader = table.heap().reader()?;
        let clusters = clusterify(
            &entries,
            model.slot_size() as u64,
            config.max_cluster_size(),
            config.min_cluster_size(),
        );
        trace!(
            "{}: {} candidates in {} reads",
            model.name(),
            entries.len(),
            clusters.len()
        );
        for cluster in clusters {
            let rows = match cluster {
                [(offset, id)] => vec![reader.read_one(*offset, *id)?],
                _ => reader.read_cluster(cluster)?,
            };
            for row in rows {
                if let Some(node) = &prepared {
                    if !node.matches(model, &row)? {
                        continue;
                    }
                }
                if !f(row)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// `(offset, id)` pairs of rows that may satisfy `filter`, and the prepared filter.
    fn candidates(
        &self,
        table: &Table,
        filter: Option<&ConditionNode>,
    ) -> Result<(Vec<(u64, i64)>, Option<PreparedNode>)> {
        let config = self.db.config();
        let live = table.heap().live_entries(config.read_chunk_size())?;
        let node = match filter {
            Some(node) => node,
            None => return Ok((live.into_iter().map(|(id, off)| (off, id)).collect(), None)),
        };
        let id_bound = live.last().map_or(0, |(id, _)| id + 1);
        let mut prepared =
            PreparedNode::prepare(table.model(), node, &mut |c: &Condition| resolve(table, c, id_bound))?;
        let narrowed = prepared
            .index_candidates()
            .filter(|ids| ids.len() as f64 <= config.index_candidate_ratio() * live.len() as f64);
        let entries = match narrowed {
            Some(ids) => {
                trace!("index narrowed {} live rows to {}", live.len(), ids.len());
                prepared.set_index_resolved();
                live.into_iter()
                    .filter(|(id, _)| ids.contains(id))
                    .map(|(id, off)| (off, id))
                    .collect()
            }
            None => live.into_iter().map(|(id, off)| (off, id)).collect(),
        };
        Ok((entries, Some(prepared)))
    }
}

/// Ids satisfying an index-eligible condition.
fn resolve(table: &Table, condition: &Condition, id_bound: i64) -> Result<HashSet<i64>> {
    let idx = match condition.field() {
        FieldRef::Id => return resolve_ids(condition, id_bound),
        FieldRef::Field(idx) => idx,
    };
    let index = table.field_index(idx).ok_or_else(|| {
        Error::invalid_operator(format!(
            "field #{} of {} has no index",
            idx,
            table.model().name()
        ))
    })?;
    let ids = match (condition.op(), condition.operand()) {
        (Operator::Equal, Operand::Value(value)) => index.find_value(value)?,
        (Operator::IsIn, Operand::List(values)) => {
            let mut ids = Vec::new();
            for value in values {
                ids.extend(index.find_value(value)?);
            }
            ids
        }
        (Operator::Between, Operand::Range(low, high)) => index.find_between(low, high)?,
        (op, operand) => return Err(unindexable(op, operand).into()),
    };
    Ok(ids.into_iter().collect())
}

pub(super) fn resolve_ids(condition: &Condition, id_bound: i64) -> Result<HashSet<i64>> {
    let id = |value: &Value| {
        value
            .as_i64()
            .ok_or_else(|| Error::invalid_operator(format!("id can't be compared with {}", value)))
    };
    let ids = match (condition.op(), condition.operand()) {
        (Operator::Equal, Operand::Value(value)) => std::iter::once(id(value)?).collect(),
        (Operator::IsIn, Operand::List(values)) => {
            values.iter().map(id).collect::<Result<_, _>>()?
        }
        (Operator::Between, Operand::Range(low, high)) => {
            (id(low)?.max(0)..=id(high)?.min(id_bound - 1)).collect()
        }
        (op, operand) => return Err(unindexable(op, operand).into()),
    };
    Ok(ids)
}

fn unindexable(op: Operator, operand: &Operand) -> Error {
    Error::invalid_operator(format!("{:?} {:?} can't be answered by an index", op, operand))
}

pub(super) fn window(rows: Vec<Row>, limit: Option<usize>, offset: usize) -> Vec<Row> {
    rows.into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
