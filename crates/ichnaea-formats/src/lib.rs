//! Format-aware parsing for Ichnaea.
//!
//! Raw dataset bytes are parsed into a [`StructuralDocument`] according to a
//! declared [`DocumentFormat`], then rendered to deterministic canonical text
//! with [`canonicalize`]. Two versions of the same dataset canonicalize to
//! texts whose line diff reflects structural changes rather than incidental
//! formatting.
//!
//! # Formats
//!
//! - [`DocumentFormat::Tabular`] -- comma-separated values with a header row
//! - [`DocumentFormat::Hierarchical`] -- JSON objects, arrays and scalars
//! - [`DocumentFormat::ElementTree`] -- an XML subset (elements, attributes, text)

pub mod canonical;
pub mod document;
pub mod element_tree;
pub mod error;
pub mod format;
pub mod hierarchical;
pub mod tabular;

pub use canonical::canonicalize;
pub use document::{Element, Record, StructuralDocument, Table};
pub use error::{ParseError, UnsupportedFormat};
pub use format::{parse, DocumentFormat};
