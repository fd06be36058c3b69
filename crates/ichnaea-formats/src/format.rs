use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::StructuralDocument;
use crate::error::{ParseError, UnsupportedFormat};
use crate::{element_tree, hierarchical, tabular};

/// Declared structure of a dataset file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFormat {
    Tabular,
    Hierarchical,
    ElementTree,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [
        DocumentFormat::Tabular,
        DocumentFormat::Hierarchical,
        DocumentFormat::ElementTree,
    ];

    /// Infer the format from a file extension (`csv`, `json`, `xml`).
    pub fn from_extension(ext: &str) -> Result<Self, UnsupportedFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(DocumentFormat::Tabular),
            "json" => Ok(DocumentFormat::Hierarchical),
            "xml" => Ok(DocumentFormat::ElementTree),
            _ => Err(UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DocumentFormat::Tabular => "tabular",
            DocumentFormat::Hierarchical => "hierarchical",
            DocumentFormat::ElementTree => "element-tree",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DocumentFormat {
    type Err = UnsupportedFormat;

    /// Accepts either the structural name or the common file-format name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" | "tabular" => Ok(DocumentFormat::Tabular),
            "json" | "hierarchical" => Ok(DocumentFormat::Hierarchical),
            "xml" | "element-tree" | "elementtree" => Ok(DocumentFormat::ElementTree),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// Parse raw bytes as `format`.
///
/// Input must be UTF-8; a leading byte-order mark is ignored.
pub fn parse(format: DocumentFormat, bytes: &[u8]) -> Result<StructuralDocument, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        ParseError::new(format, format!("not valid UTF-8 at byte {}", e.valid_up_to()))
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let document = match format {
        DocumentFormat::Tabular => StructuralDocument::Tabular(tabular::parse_table(text)?),
        DocumentFormat::Hierarchical => {
            StructuralDocument::Hierarchical(hierarchical::parse_value(text)?)
        }
        DocumentFormat::ElementTree => {
            StructuralDocument::ElementTree(element_tree::parse_element_tree(text)?)
        }
    };
    debug!(%format, bytes = bytes.len(), "document parsed");
    Ok(document)
}
