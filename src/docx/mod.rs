//! Reading, editing and writing WordprocessingML (.docx) packages.

pub mod document;
pub mod package;
pub mod photos;
pub mod placeholders;
pub mod tables;
pub mod xml;

pub use document::Document;
pub use package::DocxPackage;
pub use photos::{overlay_photos, OverlayReport};
pub use placeholders::substitute_placeholders;
pub use tables::{fill_table_after_caption, insert_filtered_tables, FillOutcome};
