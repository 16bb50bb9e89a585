//! Term match tree produced by the query parser

use std::fmt;

use crate::term::StreamId;

/// Characters that terminate a token and therefore need escaping when a
/// tree is printed back to query syntax.
pub(crate) const ESCAPED_CHARS: &str = "&|\\()\":-";

/// A parsed boolean match expression over terms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TermMatchNode {
    Or(Vec<TermMatchNode>),
    And(Vec<TermMatchNode>),
    Not(Box<TermMatchNode>),
    Unigram { text: String, stream: StreamId },
    Phrase { grams: Vec<String>, stream: StreamId },
}

impl TermMatchNode {
    pub fn unigram(text: impl Into<String>, stream: StreamId) -> Self {
        Self::Unigram {
            text: text.into(),
            stream,
        }
    }

    pub fn phrase(grams: Vec<String>, stream: StreamId) -> Self {
        Self::Phrase { grams, stream }
    }

    fn fmt_or_level(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    child.fmt_and_level(f)?;
                }
                Ok(())
            }
            _ => self.fmt_and_level(f),
        }
    }

    fn fmt_and_level(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    child.fmt_simple_level(f)?;
                }
                Ok(())
            }
            Self::Or(_) => self.fmt_parenthesized(f),
            _ => self.fmt_simple_level(f),
        }
    }

    fn fmt_simple_level(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not(child) => {
                write!(f, "-")?;
                child.fmt_simple_level(f)
            }
            Self::Unigram { text, stream } => {
                write_stream_prefix(f, *stream)?;
                write!(f, "{}", escape_token(text))
            }
            Self::Phrase { grams, stream } => {
                write_stream_prefix(f, *stream)?;
                write!(f, "\"")?;
                for (i, gram) in grams.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", escape_token(gram))?;
                }
                write!(f, "\"")
            }
            Self::And(_) | Self::Or(_) => self.fmt_parenthesized(f),
        }
    }

    fn fmt_parenthesized(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        self.fmt_or_level(f)?;
        write!(f, ")")
    }
}

/// Pretty-prints query syntax that re-parses to an equivalent tree.
impl fmt::Display for TermMatchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_or_level(f)
    }
}

fn write_stream_prefix(f: &mut fmt::Formatter<'_>, stream: StreamId) -> fmt::Result {
    if stream != 0 {
        write!(f, "{stream}:")?;
    }
    Ok(())
}

fn escape_token(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        if ESCAPED_CHARS.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unigram_and_stream() {
        assert_eq!(TermMatchNode::unigram("cat", 0).to_string(), "cat");
        assert_eq!(TermMatchNode::unigram("cat", 3).to_string(), "3:cat");
    }

    #[test]
    fn test_display_escapes_specials() {
        assert_eq!(TermMatchNode::unigram("a&b", 0).to_string(), "a\\&b");
        assert_eq!(TermMatchNode::unigram("&", 0).to_string(), "\\&");
    }

    #[test]
    fn test_display_nested_structure() {
        let tree = TermMatchNode::And(vec![
            TermMatchNode::Or(vec![
                TermMatchNode::unigram("cat", 0),
                TermMatchNode::unigram("dog", 0),
            ]),
            TermMatchNode::Not(Box::new(TermMatchNode::phrase(
                vec!["hello".to_string(), "world".to_string()],
                0,
            ))),
        ]);
        assert_eq!(tree.to_string(), "(cat | dog) & -\"hello world\"");
    }
}
