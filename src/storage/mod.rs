mod builder;
mod config;
mod core;
mod file_name;
mod schema;
mod table;

pub use self::{builder::Builder, core::Database, table::Table};

mod prelude {
    pub(crate) use {
        super::{config::Config, core::Database, file_name::FileName, table::Table},
        crate::heap::RecordHeap,
        crate::index::FieldIndex,
        crate::prelude::*,
        crate::query::QueryEngine,
    };
}
