// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key-value document parser and writer using nom
//!
//! The nested `"key" "value"` / `"key" { ... }` text format used for the
//! combine cache. Keys repeat freely and are looked up case-insensitively.
//! Inside quotes, `\"` and `\\` escape a quote and a backslash.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, multispace1, not_line_ending},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::error::{Error, Result};

/// Value of a property: either a leaf string or a nested block
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Block(Vec<Property>),
}

/// A named key-value entry
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Property {
    /// Leaf property
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::String(value.into()),
        }
    }

    /// Block property
    pub fn block(name: impl Into<String>, children: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            value: Value::Block(children),
        }
    }

    /// Leaf value, `None` for blocks
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            Value::Block(_) => None,
        }
    }

    /// Child properties, empty for leaves
    pub fn children(&self) -> &[Property] {
        match &self.value {
            Value::String(_) => &[],
            Value::Block(children) => children,
        }
    }

    /// All children with the given name
    pub fn find_all<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Property> + 's {
        self.children()
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    /// Leaf value of the first child with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.children()
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .find_map(Property::as_str)
    }

    /// Append the text form of this property at the given nesting depth
    pub fn export(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        match &self.value {
            Value::String(v) => {
                out.push_str(&format!("{}\"{}\" \"{}\"\n", indent, escape(&self.name), escape(v)));
            }
            Value::Block(children) => {
                out.push_str(&format!("{}\"{}\"\n{}{{\n", indent, escape(&self.name), indent));
                for child in children {
                    child.export(out, depth + 1);
                }
                out.push_str(&format!("{}}}\n", indent));
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Serialise a list of top-level properties
pub fn to_string(props: &[Property]) -> String {
    let mut out = String::new();
    for prop in props {
        prop.export(&mut out, 0);
    }
    out
}

/// Parse a complete document into its top-level properties
pub fn parse(input: &str) -> Result<Vec<Property>> {
    match all_consuming(terminated(many0(property), ws))(input) {
        Ok((_, props)) => Ok(props),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let consumed = input.len() - e.input.len();
            let line = input[..consumed].matches('\n').count() + 1;
            Err(Error::parse(line, format!("Invalid key-value syntax ({:?})", e.code)))
        }
        Err(nom::Err::Incomplete(_)) => Err(Error::parse(0, "Incomplete key-value input")),
    }
}

/// Skip whitespace and `//` comments
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(tag("//"), not_line_ending)),
        ))),
    )(input)
}

fn is_bare(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '"')
}

/// Quoted string, escapes resolved
fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", char('\\')), value("\"", char('"')))),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

/// Quoted or bare string
fn string(input: &str) -> IResult<&str, String> {
    alt((quoted, map(take_while1(is_bare), str::to_string)))(input)
}

/// `{ property* }`
fn block(input: &str) -> IResult<&str, Vec<Property>> {
    delimited(char('{'), many0(property), preceded(ws, char('}')))(input)
}

fn property(input: &str) -> IResult<&str, Property> {
    let (input, name) = preceded(ws, string)(input)?;
    let (input, value) = preceded(
        ws,
        alt((
            map(block, Value::Block),
            map(string, Value::String),
        )),
    )(input)?;
    Ok((
        input,
        Property { name, value },
    ))
}
