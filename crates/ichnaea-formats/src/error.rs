use crate::format::DocumentFormat;

/// Input bytes are not well formed for the declared format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {format} input: {detail}")]
pub struct ParseError {
    pub format: DocumentFormat,
    pub detail: String,
}

impl ParseError {
    pub fn new(format: DocumentFormat, detail: impl Into<String>) -> Self {
        Self {
            format,
            detail: detail.into(),
        }
    }

    pub(crate) fn at_line(format: DocumentFormat, line: usize, detail: impl std::fmt::Display) -> Self {
        Self::new(format, format!("line {line}: {detail}"))
    }
}

/// The requested format name or file extension is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported format: {0:?}")]
pub struct UnsupportedFormat(pub String);
