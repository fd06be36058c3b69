use serde::Serialize;
use serde_json::Value;

use crate::format::DocumentFormat;

/// A parsed dataset, tagged by the format it was read as.
///
/// No variant reorders or deduplicates what the source contained.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "format", content = "document", rename_all = "kebab-case")]
pub enum StructuralDocument {
    Tabular(Table),
    Hierarchical(Value),
    ElementTree(Element),
}

impl StructuralDocument {
    pub fn format(&self) -> DocumentFormat {
        match self {
            StructuralDocument::Tabular(_) => DocumentFormat::Tabular,
            StructuralDocument::Hierarchical(_) => DocumentFormat::Hierarchical,
            StructuralDocument::ElementTree(_) => DocumentFormat::ElementTree,
        }
    }
}

/// Header-ordered fields plus records in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.records.is_empty()
    }

    /// Value of `field` in `record`, if the field exists and is set.
    pub fn value<'a>(&self, record: &'a Record, field: &str) -> Option<&'a str> {
        let index = self.fields.iter().position(|f| f == field)?;
        record.get(index)
    }
}

/// One row; values are positional against [`Table::fields`]. `None` marks a
/// trailing field the row did not supply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub values: Vec<Option<String>>,
}

impl Record {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }
}

/// Element node: name, ordered attributes, ordered children, and text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Children with the given name, in order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}
