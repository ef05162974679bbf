use crate::prelude::*;

mod core;
mod primary;

pub use self::core::{RecordHeap, Row};
pub(crate) use self::core::HeapReader;
pub(crate) use primary::{PrimaryIndex, PK_HEADER_SIZE};

static_assertions::const_assert_eq!(PK_HEADER_SIZE, 16);

mod prelude {
    pub(super) use super::*;
}
