//! Deterministic canonical text for structural documents.
//!
//! Every line ends with `\n`, indentation is two spaces per level, and
//! source order is preserved. Equal documents always render to equal
//! text, and each structural item (record, member, element) occupies its own
//! line(s) so a line diff isolates structural changes.

use serde_json::Value;

use crate::document::{Element, StructuralDocument, Table};

const INDENT: &str = "  ";

pub fn canonicalize(document: &StructuralDocument) -> String {
    let mut out = String::new();
    match document {
        StructuralDocument::Tabular(table) => write_table(&mut out, table),
        StructuralDocument::Hierarchical(value) => write_value(&mut out, 0, None, value),
        StructuralDocument::ElementTree(root) => write_element(&mut out, 0, root),
    }
    out
}

// Tabular

fn write_table(out: &mut String, table: &Table) {
    if table.is_empty() {
        return;
    }
    write_row(out, table.fields.iter().map(String::as_str));
    for record in &table.records {
        write_row(out, record.values.iter().map(|v| v.as_deref().unwrap_or("")));
    }
}

fn write_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
        || field.starts_with(' ')
        || field.ends_with(' ')
}

// Hierarchical
//
// Members carry no separator commas so appending a member never rewrites
// the line of the member before it.

fn write_value(out: &mut String, depth: usize, key: Option<&str>, value: &Value) {
    push_indent(out, depth);
    if let Some(key) = key {
        out.push_str(&json_string(key));
        out.push_str(": ");
    }
    match value {
        Value::Object(map) if map.is_empty() => out.push_str("{}\n"),
        Value::Array(items) if items.is_empty() => out.push_str("[]\n"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (k, v) in map {
                write_value(out, depth + 1, Some(k), v);
            }
            push_indent(out, depth);
            out.push_str("}\n");
        }
        Value::Array(items) => {
            out.push_str("[\n");
            for item in items {
                write_value(out, depth + 1, None, item);
            }
            push_indent(out, depth);
            out.push_str("]\n");
        }
        scalar => {
            out.push_str(&scalar.to_string());
            out.push('\n');
        }
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

// Element tree

fn write_element(out: &mut String, depth: usize, element: &Element) {
    push_indent(out, depth);
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }

    if element.children.is_empty() {
        if element.text.is_empty() {
            out.push_str("/>\n");
        } else {
            out.push('>');
            out.push_str(&escape(&element.text, false));
            close_tag(out, &element.name);
        }
        return;
    }

    out.push_str(">\n");
    if !element.text.is_empty() {
        push_indent(out, depth + 1);
        out.push_str(&escape(&element.text, false));
        out.push('\n');
    }
    for child in &element.children {
        write_element(out, depth + 1, child);
    }
    push_indent(out, depth);
    close_tag(out, &element.name);
}

fn close_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{parse, DocumentFormat};
    use proptest::prelude::*;

    fn canonical(format: DocumentFormat, input: &str) -> String {
        canonicalize(&parse(format, input.as_bytes()).unwrap())
    }

    #[test]
    fn tabular_rendering() {
        assert_eq!(
            canonical(DocumentFormat::Tabular, "id,name\r\n1,John\r\n\r\n2,\"Doe, Jane\"\r\n"),
            "id,name\n1,John\n2,\"Doe, Jane\"\n"
        );
    }

    #[test]
    fn tabular_unset_and_padded_fields() {
        assert_eq!(
            canonical(DocumentFormat::Tabular, "a,b,c\n1\n\" x\",\"q\"\"\"\n"),
            "a,b,c\n1,,\n\" x\",\"q\"\"\",\n"
        );
    }

    #[test]
    fn tabular_empty_input_is_empty_text() {
        assert_eq!(canonical(DocumentFormat::Tabular, ""), "");
    }

    #[test]
    fn hierarchical_rendering() {
        assert_eq!(
            canonical(
                DocumentFormat::Hierarchical,
                r#"{"name":"t","tags":["a",2,true,null],"meta":{},"list":[],"nested":{"x":1.5}}"#
            ),
            "{\n  \"name\": \"t\"\n  \"tags\": [\n    \"a\"\n    2\n    true\n    null\n  ]\n  \"meta\": {}\n  \"list\": []\n  \"nested\": {\n    \"x\": 1.5\n  }\n}\n"
        );
    }

    #[test]
    fn hierarchical_scalar_root() {
        assert_eq!(canonical(DocumentFormat::Hierarchical, "\"hi\""), "\"hi\"\n");
    }

    #[test]
    fn hierarchical_escapes_keys() {
        assert_eq!(
            canonical(DocumentFormat::Hierarchical, r#"{"a\"b": "line\nbreak"}"#),
            "{\n  \"a\\\"b\": \"line\\nbreak\"\n}\n"
        );
    }

    #[test]
    fn hierarchical_formatting_is_irrelevant() {
        let compact = canonical(DocumentFormat::Hierarchical, r#"{"a":1,"b":[1,2]}"#);
        let pretty = canonical(
            DocumentFormat::Hierarchical,
            "{\n    \"a\" : 1,\n    \"b\" : [ 1 , 2 ]\n}",
        );
        assert_eq!(compact, pretty);
    }

    #[test]
    fn tabular_formatting_is_irrelevant() {
        let plain = canonical(DocumentFormat::Tabular, "id,name\n1,John\n2,Jane\n");
        let quoted_crlf = canonical(
            DocumentFormat::Tabular,
            "\"id\",\"name\"\r\n\"1\",\"John\"\r\n\r\n2,\"Jane\"",
        );
        assert_eq!(plain, quoted_crlf);
    }

    #[test]
    fn element_tree_formatting_is_irrelevant() {
        let compact = canonical(
            DocumentFormat::ElementTree,
            r#"<r kind="a"><item id="1"><empty/></item><item id="2">x</item></r>"#,
        );
        let reformatted = canonical(
            DocumentFormat::ElementTree,
            "<?xml version='1.0'?>\n<r   kind='a' >\n    <item id = '1'>\n        <empty></empty>\n    </item>\n    <item id=\"2\">\n        x\n    </item>\n</r>\n",
        );
        assert_eq!(compact, reformatted);
    }

    #[test]
    fn element_tree_rendering() {
        let text = canonical(
            DocumentFormat::ElementTree,
            r#"<?xml version="1.0"?>
<readings station="n&amp;e">
  intro
  <measurement id="1"><value>10</value></measurement>
  <empty/>
</readings>"#,
        );
        assert_eq!(
            text,
            "<readings station=\"n&amp;e\">\n  intro\n  <measurement id=\"1\">\n    <value>10</value>\n  </measurement>\n  <empty/>\n</readings>\n"
        );
    }

    #[test]
    fn element_tree_escapes_text() {
        assert_eq!(
            canonical(DocumentFormat::ElementTree, "<a q='&quot;'>&lt;b&gt;</a>"),
            "<a q=\"&quot;\">&lt;b&gt;</a>\n"
        );
    }

    proptest! {
        #[test]
        fn tabular_canonical_form_is_a_fixed_point(
            rows in proptest::collection::vec(
                proptest::collection::vec("[a-z ,\"]{0,6}", 3),
                1..6,
            )
        ) {
            let mut input = String::new();
            write_row(&mut input, ["h1", "h2", "h3"].into_iter());
            for row in &rows {
                write_row(&mut input, row.iter().map(String::as_str));
            }
            let once = canonical(DocumentFormat::Tabular, &input);
            prop_assert_eq!(&once, &input);
            let twice = canonical(DocumentFormat::Tabular, &once);
            prop_assert_eq!(once, twice);
        }
    }
}
