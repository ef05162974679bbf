use crate::prelude::*;

mod field;
mod value;

pub use field::{FieldDef, FieldType, ModelDef};
pub(crate) use field::{read_f64, read_i64};
pub use value::{decode, encode, Value};

mod prelude {
    pub(super) use super::*;
}
