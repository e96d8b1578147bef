// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token scanner for build descriptor (QC) files
//!
//! Only the lexical subset the descriptor parser needs: quoted or bare
//! strings, braces and line breaks. Comments (`//` and `/* */`) are skipped.
//! Escape sequences are not interpreted, backslashes in paths are common.

use crate::error::{Error, Result};

/// Descriptor token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Quoted or bare word
    String(&'a str),
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// End of a line
    Newline,
}

/// Zero-copy scanner over descriptor text
pub struct Tokenizer<'a> {
    content: &'a str,
    position: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a new scanner. A leading byte order mark is skipped.
    pub fn new(content: &'a str) -> Self {
        Self {
            content: content.strip_prefix('\u{feff}').unwrap_or(content),
            position: 0,
            line: 1,
        }
    }

    /// Current 1-based line number
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Build a parse error at the current line
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.line, message)
    }

    /// Scan the next token, `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let bytes = self.content.as_bytes();

        while self.position < bytes.len() {
            let b = bytes[self.position];
            match b {
                b'\n' => {
                    self.position += 1;
                    self.line += 1;
                    return Ok(Some(Token::Newline));
                }
                b' ' | b'\t' | b'\r' => self.position += 1,
                b'{' => {
                    self.position += 1;
                    return Ok(Some(Token::BraceOpen));
                }
                b'}' => {
                    self.position += 1;
                    return Ok(Some(Token::BraceClose));
                }
                b'/' if bytes.get(self.position + 1) == Some(&b'/') => {
                    // Leave the newline itself for the next call
                    let rest = &self.content[self.position..];
                    self.position += rest.find('\n').unwrap_or(rest.len());
                }
                b'/' if bytes.get(self.position + 1) == Some(&b'*') => {
                    let rest = &self.content[self.position + 2..];
                    let end = rest
                        .find("*/")
                        .ok_or_else(|| self.error("Unterminated block comment"))?;
                    self.line += rest[..end].matches('\n').count();
                    self.position += 2 + end + 2;
                }
                b'"' => {
                    let start = self.position + 1;
                    let end = self.content[start..]
                        .find('"')
                        .map(|i| start + i)
                        .ok_or_else(|| self.error("Unterminated string"))?;
                    let value = &self.content[start..end];
                    self.line += value.matches('\n').count();
                    self.position = end + 1;
                    return Ok(Some(Token::String(value)));
                }
                _ => {
                    let start = self.position;
                    // Form feeds, NBSP and other Unicode spaces
                    if let Some(c) = self.content[start..].chars().next() {
                        if c.is_whitespace() {
                            self.position += c.len_utf8();
                            continue;
                        }
                    }
                    let end = self.content[start..]
                        .find(|c: char| c.is_whitespace() || matches!(c, '{' | '}' | '"'))
                        .map(|i| start + i)
                        .unwrap_or(bytes.len());
                    self.position = end;
                    return Ok(Some(Token::String(&self.content[start..end])));
                }
            }
        }

        Ok(None)
    }

    /// Next token that is not a line break
    pub fn next_skipping_newlines(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            match self.next_token()? {
                Some(Token::Newline) => continue,
                other => return Ok(other),
            }
        }
    }

    /// Require a string, skipping line breaks before it
    pub fn expect_string(&mut self) -> Result<&'a str> {
        match self.next_skipping_newlines()? {
            Some(Token::String(value)) => Ok(value),
            Some(other) => Err(self.error(format!("Expected string, got {:?}", other))),
            None => Err(self.error("Expected string, got end of file")),
        }
    }

    /// Require a specific token, skipping line breaks before it
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        match self.next_skipping_newlines()? {
            Some(token) if token == expected => Ok(()),
            Some(other) => Err(self.error(format!("Expected {:?}, got {:?}", expected, other))),
            None => Err(self.error(format!("Expected {:?}, got end of file", expected))),
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}
