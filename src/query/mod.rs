use crate::prelude::*;

mod aggregate;
mod cluster;
mod compare;
mod condition;
mod core;
mod link;

pub use self::aggregate::{AggFn, AggValue, AggregateResult, AggregateSpec, GroupKey};
pub use self::condition::{Condition, ConditionNode, FieldRef, Operand, Operator};
pub use self::core::{Query, QueryEngine, QueryOutput};
pub use self::link::{JoinedRow, LinkObject, Linked};
pub use crate::heap::Row;

mod prelude {
    pub(super) use super::*;
}
