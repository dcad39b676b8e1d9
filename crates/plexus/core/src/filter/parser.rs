// Plexus
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use thiserror::Error;

use crate::filter::ast::FilterExpression;

/// Errors produced while parsing a filter string.
///
/// Offsets are byte positions into the original input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unexpected end of filter at offset {0}")]
    UnexpectedEnd(usize),
    #[error("Unexpected character '{found}' at offset {offset}, expected {expected}")]
    Unexpected {
        found: char,
        offset: usize,
        expected: &'static str,
    },
    #[error("Empty attribute name at offset {0}")]
    EmptyAttribute(usize),
    #[error("Composite filter has no operands at offset {0}")]
    EmptyOperandList(usize),
    #[error("Trailing characters after filter at offset {0}")]
    TrailingInput(usize),
}

/// Parse an RFC 1960 filter string into its AST.
///
/// Parsing is deterministic: the same input always yields the same tree.
/// `\` escapes the following character inside attribute values, which is how
/// literal `(`, `)`, `*` and `\` are written.
pub fn parse(input: &str) -> Result<FilterExpression, FilterError> {
    let mut parser = Parser { input, pos: 0 };
    parser.skip_whitespace();
    let filter = parser.parse_filter()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(FilterError::TrailingInput(parser.pos));
    }
    Ok(filter)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Result<char, FilterError> {
        let ch = self.peek().ok_or(FilterError::UnexpectedEnd(self.pos))?;
        self.pos += ch.len_utf8();
        Ok(ch)
    }

    fn expect(&mut self, expected: char, what: &'static str) -> Result<(), FilterError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.pos += ch.len_utf8();
                Ok(())
            }
            Some(ch) => Err(FilterError::Unexpected {
                found: ch,
                offset: self.pos,
                expected: what,
            }),
            None => Err(FilterError::UnexpectedEnd(self.pos)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn parse_filter(&mut self) -> Result<FilterExpression, FilterError> {
        self.expect('(', "'('")?;
        let filter = match self.peek() {
            Some('&') => {
                self.bump()?;
                FilterExpression::And(self.parse_operands()?)
            }
            Some('|') => {
                self.bump()?;
                FilterExpression::Or(self.parse_operands()?)
            }
            Some('!') => {
                self.bump()?;
                self.skip_whitespace();
                FilterExpression::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(FilterError::UnexpectedEnd(self.pos)),
        };
        self.expect(')', "')'")?;
        Ok(filter)
    }

    fn parse_operands(&mut self) -> Result<Vec<FilterExpression>, FilterError> {
        let start = self.pos;
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('(') => operands.push(self.parse_filter()?),
                _ => break,
            }
        }
        if operands.is_empty() {
            return Err(FilterError::EmptyOperandList(start));
        }
        Ok(operands)
    }

    fn parse_item(&mut self) -> Result<FilterExpression, FilterError> {
        let attribute = self.parse_attribute()?;
        match self.peek() {
            Some('=') => {
                self.bump()?;
                self.parse_equals_rhs(attribute)
            }
            Some('>') => {
                self.bump()?;
                self.expect('=', "'=' after '>'")?;
                let value = self.parse_value()?.into_plain();
                Ok(FilterExpression::GreaterEq { attribute, value })
            }
            Some('<') => {
                self.bump()?;
                self.expect('=', "'=' after '<'")?;
                let value = self.parse_value()?.into_plain();
                Ok(FilterExpression::LessEq { attribute, value })
            }
            Some(ch) => Err(FilterError::Unexpected {
                found: ch,
                offset: self.pos,
                expected: "an operator ('=', '>=', '<=')",
            }),
            None => Err(FilterError::UnexpectedEnd(self.pos)),
        }
    }

    fn parse_attribute(&mut self) -> Result<String, FilterError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, '=' | '<' | '>' | '~' | '(' | ')') {
                break;
            }
            self.pos += ch.len_utf8();
        }
        let attribute = self.input[start..self.pos].trim();
        if attribute.is_empty() {
            return Err(FilterError::EmptyAttribute(start));
        }
        Ok(attribute.to_string())
    }

    fn parse_equals_rhs(&mut self, attribute: String) -> Result<FilterExpression, FilterError> {
        let value = self.parse_value()?;
        if value.segments.len() == 1 {
            // No unescaped '*': plain equality.
            let text = value.into_plain();
            return Ok(FilterExpression::Equals { attribute, value: text });
        }
        if value.segments.len() == 2 && value.segments.iter().all(String::is_empty) {
            // The value was exactly "*".
            return Ok(FilterExpression::Present { attribute });
        }
        let mut segments = value.segments;
        let final_segment = segments.pop().unwrap_or_default();
        let mut iter = segments.into_iter();
        let initial_segment = iter.next().unwrap_or_default();
        let any = iter.filter(|part| !part.is_empty()).collect();
        Ok(FilterExpression::Substring {
            attribute,
            initial: (!initial_segment.is_empty()).then_some(initial_segment),
            any,
            final_part: (!final_segment.is_empty()).then_some(final_segment),
        })
    }

    /// Read an attribute value up to the closing parenthesis, resolving
    /// escapes and splitting at unescaped wildcards.
    fn parse_value(&mut self) -> Result<Value, FilterError> {
        let mut segments = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                Some(')') => break,
                Some('(') => {
                    return Err(FilterError::Unexpected {
                        found: '(',
                        offset: self.pos,
                        expected: "an attribute value or ')'",
                    });
                }
                Some('*') => {
                    self.bump()?;
                    segments.push(std::mem::take(&mut current));
                }
                Some('\\') => {
                    self.bump()?;
                    current.push(self.bump()?);
                }
                Some(ch) => {
                    self.bump()?;
                    current.push(ch);
                }
                None => return Err(FilterError::UnexpectedEnd(self.pos)),
            }
        }
        segments.push(current);
        Ok(Value { segments })
    }
}

struct Value {
    // Text between unescaped '*' wildcards; a single segment means no
    // wildcard was present.
    segments: Vec<String>,
}

impl Value {
    fn into_plain(mut self) -> String {
        // Re-join on '*' for the comparison operators, where a wildcard has
        // no special meaning.
        if self.segments.len() == 1 {
            return self.segments.remove(0);
        }
        self.segments.join("*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_equality() {
        let filter = parse("(host=db01)").unwrap();
        assert_eq!(
            filter,
            FilterExpression::Equals {
                attribute: "host".into(),
                value: "db01".into()
            }
        );
    }

    #[test]
    fn test_parse_presence_and_substring() {
        assert_eq!(parse("(host=*)").unwrap(), FilterExpression::Present { attribute: "host".into() });
        assert_eq!(
            parse("(name=plexus*reg*ry)").unwrap(),
            FilterExpression::Substring {
                attribute: "name".into(),
                initial: Some("plexus".into()),
                any: vec!["reg".into()],
                final_part: Some("ry".into()),
            }
        );
    }

    #[test]
    fn test_parse_composite() {
        let filter = parse("(&(a=1)(|(b=2)(c>=3))(!(d<=4)))").unwrap();
        match filter {
            FilterExpression::And(operands) => assert_eq!(operands.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_allows_whitespace_between_operands() {
        assert!(parse(" (&  (a=1) (b=2) ) ").is_ok());
    }

    #[test]
    fn test_escaped_metacharacters() {
        let filter = parse(r"(path=\*literal\(\))").unwrap();
        assert_eq!(
            filter,
            FilterExpression::Equals {
                attribute: "path".into(),
                value: "*literal()".into()
            }
        );
    }

    #[test]
    fn test_double_wildcard_collapses() {
        assert_eq!(
            parse("(name=a**b)").unwrap(),
            FilterExpression::Substring {
                attribute: "name".into(),
                initial: Some("a".into()),
                any: vec![],
                final_part: Some("b".into()),
            }
        );
    }

    #[test]
    fn test_errors_carry_offsets() {
        assert_eq!(parse(""), Err(FilterError::UnexpectedEnd(0)));
        assert_eq!(parse("(=x)"), Err(FilterError::EmptyAttribute(1)));
        assert_eq!(parse("(a=1)(b=2)"), Err(FilterError::TrailingInput(5)));
        assert!(matches!(parse("(&)"), Err(FilterError::EmptyOperandList(_))));
        assert!(matches!(parse("(a~1)"), Err(FilterError::Unexpected { found: '~', .. })));
        assert!(matches!(parse("(a=1"), Err(FilterError::UnexpectedEnd(_))));
    }

    #[test]
    fn test_deterministic_parse() {
        let raw = "(&(host=db*)(port>=1024)(!(zone=eu)))";
        assert_eq!(parse(raw).unwrap(), parse(raw).unwrap());
    }
}
