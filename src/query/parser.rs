//! Recursive descent parser for the ingest-side query grammar
//!
//! ```text
//! or     := and ('|' and)*
//! and    := simple (('&' | implicit) simple)*
//! simple := '-' simple | '(' or ')' | term
//! term   := [stream ':'] ('"' token* '"' | token)
//! token  := chars excluding & | ( ) : - " and whitespace; '\' escapes
//! ```
//!
//! Errors carry the character offset at which parsing stopped. Stream
//! prefixes resolve through a caller-supplied name map; a bare integer
//! prefix is its own stream id; a bare token is a unigram on stream 0.

use std::collections::HashMap;

use crate::error::{Result, SigdexError};
use crate::query::ast::{TermMatchNode, ESCAPED_CHARS};
use crate::term::StreamId;

const END_OF_TOKEN: &str = "&|():-\"";

pub struct QueryParser {
    input: Vec<char>,
    position: usize,
    streams: HashMap<String, StreamId>,
}

impl QueryParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            streams: HashMap::new(),
        }
    }

    /// Supply the stream-name resolution map.
    pub fn with_streams(mut self, streams: HashMap<String, StreamId>) -> Self {
        self.streams = streams;
        self
    }

    pub fn parse(&mut self) -> Result<TermMatchNode> {
        let tree = self.parse_or()?;
        self.skip_white();
        if self.peek().is_some() {
            return Err(self.error("unexpected character after query"));
        }
        Ok(tree)
    }

    fn parse_or(&mut self) -> Result<TermMatchNode> {
        let mut children = vec![self.parse_and()?];
        loop {
            self.skip_white();
            if self.peek() != Some('|') {
                break;
            }
            self.advance();
            children.push(self.parse_and()?);
        }
        Ok(collapse(children, TermMatchNode::Or))
    }

    fn parse_and(&mut self) -> Result<TermMatchNode> {
        let mut children = vec![self.parse_simple()?];
        loop {
            self.skip_white();
            match self.peek() {
                None | Some(')') | Some('|') => break,
                Some('&') => {
                    // Explicit operator: another simple operand must follow.
                    self.advance();
                    children.push(self.parse_simple()?);
                }
                Some(_) => {
                    // Juxtaposition is an implicit '&'.
                    children.push(self.parse_simple()?);
                }
            }
        }
        Ok(collapse(children, TermMatchNode::And))
    }

    fn parse_simple(&mut self) -> Result<TermMatchNode> {
        self.skip_white();
        match self.peek() {
            Some('-') => {
                self.advance();
                let child = self.parse_simple()?;
                Ok(TermMatchNode::Not(Box::new(child)))
            }
            Some('(') => {
                self.advance();
                let tree = self.parse_or()?;
                self.skip_white();
                self.expect(')')?;
                Ok(tree)
            }
            _ => self.parse_term(),
        }
    }

    fn parse_term(&mut self) -> Result<TermMatchNode> {
        self.skip_white();
        if self.peek() == Some('"') {
            return self.parse_phrase(0);
        }

        let left = self.parse_token()?;
        if self.peek() == Some(':') {
            // 'left' turns out to be a stream name.
            self.advance();
            let stream = self.resolve_stream(&left)?;
            if self.peek() == Some('"') {
                self.parse_phrase(stream)
            } else {
                let right = self.parse_token()?;
                Ok(TermMatchNode::unigram(right, stream))
            }
        } else {
            Ok(TermMatchNode::unigram(left, 0))
        }
    }

    fn parse_phrase(&mut self, stream: StreamId) -> Result<TermMatchNode> {
        self.expect('"')?;
        let mut grams = Vec::new();
        loop {
            self.skip_white();
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                None => return Err(self.error("unterminated phrase")),
                Some(_) => grams.push(self.parse_token()?),
            }
        }
        Ok(TermMatchNode::phrase(grams, stream))
    }

    fn parse_token(&mut self) -> Result<String> {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || END_OF_TOKEN.contains(c) {
                break;
            }
            token.push(self.get_with_escape()?);
        }
        if token.is_empty() {
            return Err(self.error("expected token"));
        }
        Ok(token)
    }

    fn resolve_stream(&self, name: &str) -> Result<StreamId> {
        if name.chars().all(|c| c.is_ascii_digit()) {
            return name.parse::<StreamId>().map_err(|_| {
                self.error(format!("stream id '{name}' out of range"))
            });
        }
        self.streams
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("unknown stream '{name}'")))
    }

    fn get_with_escape(&mut self) -> Result<char> {
        match self.peek() {
            Some('\\') => {
                self.advance();
                match self.peek() {
                    Some(c) if ESCAPED_CHARS.contains(c) => {
                        self.advance();
                        Ok(c)
                    }
                    _ => Err(self.error("bad escape character")),
                }
            }
            Some(c) => {
                self.advance();
                Ok(c)
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn skip_white(&mut self) {
        while self.peek().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> SigdexError {
        SigdexError::Parse {
            message: message.into(),
            position: self.position,
        }
    }
}

fn collapse(
    mut children: Vec<TermMatchNode>,
    combine: fn(Vec<TermMatchNode>) -> TermMatchNode,
) -> TermMatchNode {
    if children.len() == 1 {
        children.pop().unwrap()
    } else {
        combine(children)
    }
}
