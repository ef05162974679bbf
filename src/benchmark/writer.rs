use anyhow::Result;
use std::path::Path;
use tabula::{Builder, Database, ModelDef, QueryEngine, Table, Value};

const SCHEMA: &str = "benchmark";

pub struct Writer {
    db: Database,
    table: Table,
}

impl Writer {
    pub fn new(dir: &Path, model: ModelDef) -> Result<Self> {
        let db = Builder::new().work_dir(dir).build()?;
        db.create_schema(SCHEMA, vec![model.clone()], true)?;
        let table = db.table(SCHEMA, &model)?;
        Ok(Self { db, table })
    }

    pub fn insert(&self, values: &[Value]) -> Result<i64> {
        self.table.insert(values)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.table.delete(id)
    }

    pub fn engine(&self) -> QueryEngine {
        self.db.engine(SCHEMA)
    }

    pub fn close(self) -> Result<()> {
        debug!("drop schema {}", SCHEMA);
        self.db.delete_schema(SCHEMA)
    }
}
