use super::prelude::*;
use rayon::prelude::*;

impl Database {
    /// Creates directory `<work_dir>/<name>` with empty files for every model and
    /// stores the model definitions next to them. Tables are created in parallel.
    ///
    /// An existing schema is wiped first if `delete_old` is set, otherwise it is an
    /// error.
    /// # Errors
    /// Fails with `WrongConfig` on duplicate model names or an existing schema, and on
    /// I/O errors.
    pub fn create_schema(&self, name: &str, models: Vec<ModelDef>, delete_old: bool) -> Result<()> {
        let mut names = HashSet::new();
        if let Some(dup) = models.iter().find(|m| !names.insert(m.name())) {
            return Err(Error::wrong_config(format!(
                "schema {}: model {} is defined twice",
                name,
                dup.name()
            ))
            .into());
        }
        let dir = self.schema_dir(name);
        if dir.exists() {
            if !delete_old {
                return Err(Error::wrong_config(format!("schema {} already exists", name)).into());
            }
            warn!("schema {} exists and will be replaced", name);
            self.delete_schema(name)?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create schema dir {}", dir.display()))?;
        models
            .par_iter()
            .map(|model| Table::create(&dir, model, self.config()).map(|_| ()))
            .collect::<Result<()>>()?;
        let buf = serialize(&models)?;
        let path = FileName::models(&dir);
        fs::write(&path, buf)
            .with_context(|| format!("failed to write models to {}", path.display()))?;
        info!("schema {} created with {} tables", name, models.len());
        Ok(())
    }

    /// Removes the schema directory with all its tables.
    /// # Errors
    /// Fails with `SchemaNotFound` if there is no such schema.
    pub fn delete_schema(&self, name: &str) -> Result<()> {
        let dir = self.schema_dir(name);
        if !dir.is_dir() {
            return Err(Error::schema_not_found(name).into());
        }
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to remove schema dir {}", dir.display()))?;
        info!("schema {} deleted", name);
        Ok(())
    }

    /// Whether a schema with stored models exists.
    #[must_use]
    pub fn schema_exists(&self, name: &str) -> bool {
        FileName::models(&self.schema_dir(name)).is_file()
    }

    /// Model definitions stored by [`Database::create_schema`].
    /// # Errors
    /// Fails with `SchemaNotFound` if there is no such schema.
    pub fn open_schema(&self, name: &str) -> Result<Vec<ModelDef>> {
        let path = FileName::models(&self.schema_dir(name));
        if !path.is_file() {
            return Err(Error::schema_not_found(name).into());
        }
        let buf = fs::read(&path)
            .with_context(|| format!("failed to read models from {}", path.display()))?;
        let models: Vec<ModelDef> = deserialize(&buf)?;
        debug!("schema {}: {} models loaded", name, models.len());
        Ok(models)
    }
}
