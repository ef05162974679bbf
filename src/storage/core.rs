use super::prelude::*;

/// A main database handle.
///
/// This type is clonable, cloning it copies the configuration only: the handle keeps
/// no open files, every operation opens what it needs and closes it before returning.
/// Writes to one table must be serialized by the caller.
///
/// # Examples
///
/// ```no_run
/// use tabula::{Builder, FieldDef, FieldType, ModelDef, Value};
///
/// let db = Builder::new().work_dir("/tmp/tabula/").build().unwrap();
/// let city = ModelDef::new("city", vec![FieldDef::new("name", FieldType::String(16))]).unwrap();
/// db.create_schema("geo", vec![city.clone()], false).unwrap();
/// let id = db.table("geo", &city).unwrap().insert(&[Value::from("Oslo")]).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    work_dir: PathBuf,
    config: Config,
}

impl Database {
    pub(crate) fn new(work_dir: PathBuf, config: Config) -> Self {
        Self { work_dir, config }
    }

    /// Directory all schemas live in
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn schema_dir(&self, schema: &str) -> PathBuf {
        self.work_dir.join(schema)
    }

    /// Binds the files of `model` in `schema`.
    /// # Errors
    /// Fails with `SchemaNotFound` if the schema or the table files don't exist.
    pub fn table(&self, schema: &str, model: &ModelDef) -> Result<Table> {
        let dir = self.schema_dir(schema);
        let heap = FileName::heap(&dir, model);
        if !heap.is_file() {
            return Err(Error::schema_not_found(format!(
                "table {} of schema {} ({})",
                model.name(),
                schema,
                heap.display()
            ))
            .into());
        }
        Table::new(&dir, model, &self.config)
    }

    /// Query engine over the tables of `schema`.
    #[must_use]
    pub fn engine(&self, schema: impl Into<String>) -> QueryEngine {
        QueryEngine::new(self.clone(), schema)
    }
}
