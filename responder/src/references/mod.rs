//! Reference formatting: cleans retrieved chunks and renders them as numbered
//! citation blocks.

pub mod clean;
pub mod formatter;
pub mod literal;
pub mod record;

pub use clean::{clean_content, RepairTable};
pub use formatter::{basename, FormattedReference, ReferenceFormatter};
pub use record::parse_record;
