//! Comma-separated tabular input.
//!
//! Dialect: `,` delimiter, `"` quote, `""` escape inside quotes, and `\n`,
//! `\r\n` or `\r` line endings. The first non-blank row is the header.

use crate::document::{Record, Table};
use crate::error::ParseError;
use crate::format::DocumentFormat;

const FORMAT: DocumentFormat = DocumentFormat::Tabular;

/// A raw row and the line it started on.
struct Row {
    line: usize,
    fields: Vec<String>,
}

/// Parse tabular text into a [`Table`].
///
/// Rows shorter than the header leave trailing fields unset; longer rows
/// are rejected. Blank lines are skipped and empty input is an empty table.
pub fn parse_table(text: &str) -> Result<Table, ParseError> {
    let mut rows = split_rows(text)?.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };

    let width = header.fields.len();
    let mut records = Vec::new();
    for row in rows {
        if row.fields.len() > width {
            return Err(ParseError::at_line(
                FORMAT,
                row.line,
                format!("record has {} fields but header has {width}", row.fields.len()),
            ));
        }
        let mut values: Vec<Option<String>> = row.fields.into_iter().map(Some).collect();
        values.resize(width, None);
        records.push(Record { values });
    }

    Ok(Table {
        fields: header.fields,
        records,
    })
}

fn split_rows(text: &str) -> Result<Vec<Row>, ParseError> {
    let mut rows = Vec::new();
    let mut chars = text.chars().peekable();

    let mut line = 1;
    let mut row_line = 1;
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    // Anything consumed for the current row besides its terminator.
    let mut row_has_content = false;
    let mut in_quotes = false;
    let mut field_quoted = false;
    let mut after_quote = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    after_quote = true;
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                '\r' => {
                    if chars.peek() != Some(&'\n') {
                        line += 1;
                    }
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                row_has_content = true;
                fields.push(std::mem::take(&mut field));
                field_quoted = false;
                after_quote = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if row_has_content {
                    fields.push(std::mem::take(&mut field));
                    rows.push(Row {
                        line: row_line,
                        fields: std::mem::take(&mut fields),
                    });
                }
                line += 1;
                row_line = line;
                row_has_content = false;
                field_quoted = false;
                after_quote = false;
            }
            '"' => {
                if after_quote {
                    return Err(ParseError::at_line(FORMAT, line, "unexpected quote after closing quote"));
                }
                if field_quoted || !field.is_empty() {
                    return Err(ParseError::at_line(FORMAT, line, "bare quote in unquoted field"));
                }
                row_has_content = true;
                in_quotes = true;
                field_quoted = true;
            }
            _ => {
                if after_quote {
                    return Err(ParseError::at_line(
                        FORMAT,
                        line,
                        format!("unexpected character {c:?} after closing quote"),
                    ));
                }
                row_has_content = true;
                field.push(c);
            }
        }
    }

    if in_quotes {
        return Err(ParseError::at_line(FORMAT, row_line, "unterminated quoted field"));
    }
    if row_has_content {
        fields.push(field);
        rows.push(Row {
            line: row_line,
            fields,
        });
    }
    Ok(rows)
}
