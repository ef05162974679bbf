use super::prelude::*;

const EXTENSION: &str = "bin";
const PRIMARY_INDEX_PREFIX: &str = "ix";
const FIELD_INDEX_PREFIX: &str = "fix";
const MODELS_FILE: &str = "models";

/// Layout of table files inside a schema directory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileName;

impl FileName {
    /// `<model>.bin`
    pub(crate) fn heap(dir: &Path, model: &ModelDef) -> PathBuf {
        dir.join(format!("{}.{}", model.name(), EXTENSION))
    }

    /// `ix_<model>.bin`
    pub(crate) fn primary_index(dir: &Path, model: &ModelDef) -> PathBuf {
        dir.join(format!(
            "{}_{}.{}",
            PRIMARY_INDEX_PREFIX,
            model.name(),
            EXTENSION
        ))
    }

    /// `fix_<model>_<field>.bin`
    pub(crate) fn field_index(dir: &Path, model: &ModelDef, field: &FieldDef) -> PathBuf {
        dir.join(format!(
            "{}_{}_{}.{}",
            FIELD_INDEX_PREFIX,
            model.name(),
            field.name(),
            EXTENSION
        ))
    }

    pub(crate) fn models(dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", MODELS_FILE, EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_file_names() {
        let model = ModelDef::new(
            "user",
            vec![FieldDef::new("age", FieldType::Int).indexed()],
        )
        .unwrap();
        let dir = Path::new("/data/app");
        assert_eq!(FileName::heap(dir, &model), dir.join("user.bin"));
        assert_eq!(FileName::primary_index(dir, &model), dir.join("ix_user.bin"));
        assert_eq!(
            FileName::field_index(dir, &model, &model.fields()[0]),
            dir.join("fix_user_age.bin")
        );
        assert_eq!(FileName::models(dir), dir.join("models.bin"));
    }
}
