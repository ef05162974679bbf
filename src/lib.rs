#![warn(missing_docs)]
#![deny(missing_debug_implementations)]

//! # tabula
//!
//! The `tabula` crate provides an embedded, file-backed table engine.
//!
//! Every table is a flat heap of fixed-size binary records addressed through a
//! primary-key index file with an embedded free list. Any field can be backed by
//! a disk-resident B+tree secondary index. Queries combine condition trees,
//! ordering, limits, aggregation and foreign-key joins on top of both.
//!
//! All I/O is synchronous. No file handle or cached page outlives a single call:
//! every operation reopens the files it needs and re-reads their headers.
//!
//! # Examples
//!
//! ```no_run
//! use tabula::{Builder, FieldDef, FieldType, ModelDef, Query, Value};
//!
//! fn main() -> anyhow::Result<()> {
//!     let db = Builder::new().work_dir("/tmp/tabula").build()?;
//!     let user = ModelDef::new(
//!         "user",
//!         vec![
//!             FieldDef::new("name", FieldType::String(32)),
//!             FieldDef::new("age", FieldType::Int).indexed(),
//!         ],
//!     )?;
//!     db.create_schema("app", vec![user.clone()], true)?;
//!     let users = db.table("app", &user)?;
//!     users.insert(&[Value::from("ada"), Value::Int(36)])?;
//!     let rows = db.engine("app").rows(&Query::new(user).limit(10))?;
//!     assert_eq!(rows.len(), 1);
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

/// Build information
pub mod build_info;

mod error;
mod heap;
mod index;
mod io;
mod query;
mod storage;
mod types;

pub use error::{Error, Kind};
pub use heap::RecordHeap;
pub use index::{BPTreeIndex, Double, FixedStr, Key, LeafRun};
pub use query::{
    AggFn, AggValue, AggregateResult, AggregateSpec, Condition, ConditionNode, FieldRef,
    GroupKey, JoinedRow, LinkObject, Linked, Operand, Operator, Query, QueryEngine, QueryOutput,
    Row,
};
pub use storage::{Builder, Database, Table};
pub use types::{decode, encode, FieldDef, FieldType, ModelDef, Value};

mod prelude {
    pub(crate) use anyhow::{Context, Result};
    pub(crate) use bincode::{deserialize, serialize, serialized_size};
    pub(crate) use bytes::{Bytes, BytesMut};
    pub(crate) use std::{
        cmp::Ordering as CmpOrdering,
        collections::{BinaryHeap, HashMap, HashSet},
        fmt::{Debug, Display, Formatter, Result as FmtResult},
        fs::{self, File as StdFile, OpenOptions},
        io::Error as IOError,
        mem::discriminant,
        path::{Path, PathBuf},
    };
    pub(crate) use thiserror::Error;

    pub(crate) use crate::error::{Error, Kind};
    pub(crate) use crate::io::File;
    pub(crate) use crate::types::{FieldDef, FieldType, ModelDef, Value};

    /// Size of one offset/id word in every file of the engine.
    pub(crate) const IX_SIZE: u64 = 8;
    /// Marker for a missing offset, a deleted id or an unset pointer.
    pub(crate) const NULL_OFFSET: i64 = -1;
}
