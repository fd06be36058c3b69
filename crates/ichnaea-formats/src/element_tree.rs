//! Element-tree (XML subset) input.
//!
//! Supports elements, attributes, character data, CDATA sections, the five
//! predefined entities and numeric character references. The XML
//! declaration, processing instructions, comments and a DOCTYPE are skipped.
//! Namespaces are treated as part of the name; external entities are never
//! resolved.
//!
//! Character data between markup is trimmed; empty runs are dropped and the
//! rest are joined with a single space into [`Element::text`].

use crate::document::Element;
use crate::error::ParseError;
use crate::format::DocumentFormat;

/// Deepest element nesting accepted; the parser and canonical writer recurse per level.
pub const MAX_ELEMENT_DEPTH: usize = 256;

pub fn parse_element_tree(text: &str) -> Result<Element, ParseError> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
    };
    parser.skip_misc()?;
    if parser.at_end() {
        return Err(parser.error("missing root element"));
    }
    if !parser.src[parser.pos..].starts_with('<') {
        return Err(parser.error("content outside the root element"));
    }
    let root = parser.element()?;
    parser.skip_misc()?;
    if !parser.at_end() {
        return Err(parser.error("content after the root element"));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}")))
        }
    }

    fn line(&self) -> usize {
        self.src[..self.pos.min(self.src.len())].matches('\n').count() + 1
    }

    fn error(&self, detail: impl std::fmt::Display) -> ParseError {
        ParseError::at_line(DocumentFormat::ElementTree, self.line(), detail)
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Advance past `terminator`, failing with `what` if it never appears.
    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<&'a str, ParseError> {
        match self.rest().find(terminator) {
            Some(offset) => {
                let skipped = &self.rest()[..offset];
                self.pos += offset + terminator.len();
                Ok(skipped)
            }
            None => Err(self.error(format!("unterminated {what}"))),
        }
    }

    /// Whitespace, declaration, processing instructions, comments, DOCTYPE.
    fn skip_misc(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.eat("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if self.eat("<!--") {
                self.skip_past("-->", "comment")?;
            } else if self.eat("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error("unterminated DOCTYPE"))
    }

    fn name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let valid = if self.pos == start {
                c.is_alphabetic() || c == '_' || c == ':'
            } else {
                c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
            };
            if !valid {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Parse one element; the cursor is on its `<`.
    fn element(&mut self) -> Result<Element, ParseError> {
        if self.depth >= MAX_ELEMENT_DEPTH {
            return Err(self.error(format!("element nesting exceeds {MAX_ELEMENT_DEPTH}")));
        }
        self.expect("<")?;
        let mut element = Element::new(self.name()?);

        loop {
            let had_space = self.peek().is_some_and(char::is_whitespace);
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok(element);
            }
            if self.eat(">") {
                break;
            }
            if self.at_end() {
                return Err(self.error(format!("unclosed tag <{}>", element.name)));
            }
            if !had_space {
                return Err(self.error("expected whitespace before attribute"));
            }
            let (key, value) = self.attribute()?;
            if element.attribute(&key).is_some() {
                return Err(self.error(format!(
                    "duplicate attribute {key:?} on <{}>",
                    element.name
                )));
            }
            element.attributes.push((key, value));
        }

        self.depth += 1;
        let content = self.content(&mut element);
        self.depth -= 1;
        content?;
        Ok(element)
    }

    fn attribute(&mut self) -> Result<(String, String), ParseError> {
        let key = self.name()?;
        self.skip_whitespace();
        self.expect("=")?;
        self.skip_whitespace();
        let quote = match self.bump() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error(format!("attribute {key:?} value must be quoted"))),
        };
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(format!("unterminated value for attribute {key:?}"))),
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('<') => return Err(self.error("'<' in attribute value")),
                Some('&') => value.push_str(&self.entity()?),
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
        Ok((key, value))
    }

    /// Children and text up to the matching end tag.
    fn content(&mut self, element: &mut Element) -> Result<(), ParseError> {
        let mut runs: Vec<String> = Vec::new();
        let mut run = String::new();

        loop {
            if self.at_end() {
                return Err(self.error(format!("unclosed element <{}>", element.name)));
            }
            if self.eat("</") {
                let name = self.name()?;
                if name != element.name {
                    return Err(self.error(format!(
                        "mismatched end tag: expected </{}>, found </{name}>",
                        element.name
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                break;
            }
            if self.eat("<![CDATA[") {
                run.push_str(self.skip_past("]]>", "CDATA section")?);
            } else if self.eat("<!--") {
                self.skip_past("-->", "comment")?;
                runs.push(std::mem::take(&mut run));
            } else if self.eat("<?") {
                self.skip_past("?>", "processing instruction")?;
                runs.push(std::mem::take(&mut run));
            } else if self.rest().starts_with('<') {
                runs.push(std::mem::take(&mut run));
                let child = self.element()?;
                element.children.push(child);
            } else if self.rest().starts_with('&') {
                run.push_str(&self.entity()?);
            } else if let Some(c) = self.bump() {
                run.push(c);
            }
        }
        runs.push(run);

        element.text = runs
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(())
    }

    /// Decode one entity reference; the cursor is on its `&`.
    fn entity(&mut self) -> Result<String, ParseError> {
        self.expect("&")?;
        let body = match self.rest().find(';') {
            Some(end) if end <= 32 => &self.rest()[..end],
            _ => return Err(self.error("unterminated entity reference")),
        };
        let decoded = match body {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = body.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = body.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    return Err(self.error(format!("unknown entity &{body};")));
                };
                match code.and_then(char::from_u32) {
                    Some(c) => c,
                    None => return Err(self.error(format!("invalid character reference &{body};"))),
                }
            }
        };
        self.pos += body.len() + 1;
        Ok(decoded.to_string())
    }
}
