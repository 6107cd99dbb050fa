//! Data model for tabular values

mod span;
mod table;
mod value;

pub use span::Span;
pub use table::Table;
pub use value::{coerce, coerce_token, Row, Value};
