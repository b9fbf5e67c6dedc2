pub mod email;
pub mod extractor;
pub mod field_locator;
pub mod line_items;
pub mod order_total;

pub use extractor::{DocumentKind, Extraction, Extractor};
