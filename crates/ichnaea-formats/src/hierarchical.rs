//! Hierarchical (JSON) input.
//!
//! Parsed with `serde_json` built with `preserve_order`, so object members
//! keep their source order. When a key repeats within one object, the member
//! stays at the position of its first occurrence and takes the value of the
//! last.

use serde_json::Value;

use crate::error::ParseError;
use crate::format::DocumentFormat;

pub fn parse_value(text: &str) -> Result<Value, ParseError> {
    serde_json::from_str(text).map_err(|e| {
        ParseError::new(
            DocumentFormat::Hierarchical,
            format!("line {} column {}: {e}", e.line(), e.column()),
        )
    })
}
