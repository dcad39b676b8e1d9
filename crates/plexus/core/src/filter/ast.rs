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

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::properties::value::PropertyValue;
use crate::properties::PropertyMap;

/// Boolean predicate AST over a service property map.
///
/// Attribute names match case-insensitively (property map convention);
/// values are untyped literals whose comparison semantics live in
/// [`PropertyValue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Not(Box<FilterExpression>),
    Equals {
        attribute: String,
        value: String,
    },
    GreaterEq {
        attribute: String,
        value: String,
    },
    LessEq {
        attribute: String,
        value: String,
    },
    Present {
        attribute: String,
    },
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        final_part: Option<String>,
    },
}

impl FilterExpression {
    /// Convenience constructor for the common single-equality filter.
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpression::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Evaluate this filter against a property map. Pure and side-effect
    /// free.
    pub fn matches(&self, properties: &PropertyMap) -> bool {
        match self {
            FilterExpression::And(operands) => operands.iter().all(|f| f.matches(properties)),
            FilterExpression::Or(operands) => operands.iter().any(|f| f.matches(properties)),
            FilterExpression::Not(operand) => !operand.matches(properties),
            FilterExpression::Equals { attribute, value } => {
                properties.get(attribute).is_some_and(|v| v.equals_literal(value))
            }
            FilterExpression::GreaterEq { attribute, value } => {
                properties.get(attribute).is_some_and(|v| ordered_match(v, value, Ordering::is_ge))
            }
            FilterExpression::LessEq { attribute, value } => {
                properties.get(attribute).is_some_and(|v| ordered_match(v, value, Ordering::is_le))
            }
            FilterExpression::Present { attribute } => properties.contains_key(attribute),
            FilterExpression::Substring {
                attribute,
                initial,
                any,
                final_part,
            } => properties
                .get(attribute)
                .is_some_and(|v| substring_match_value(v, initial.as_deref(), any, final_part.as_deref())),
        }
    }
}

fn ordered_match(value: &PropertyValue, literal: &str, accept: fn(Ordering) -> bool) -> bool {
    match value {
        PropertyValue::List(elements) => elements.iter().any(|e| ordered_match(e, literal, accept)),
        scalar => scalar.compare_literal(literal).is_some_and(accept),
    }
}

fn substring_match_value(value: &PropertyValue, initial: Option<&str>, any: &[String], final_part: Option<&str>) -> bool {
    match value {
        PropertyValue::Str(s) => substring_match(s, initial, any, final_part),
        PropertyValue::List(elements) => elements.iter().any(|e| substring_match_value(e, initial, any, final_part)),
        _ => false,
    }
}

fn substring_match(candidate: &str, initial: Option<&str>, any: &[String], final_part: Option<&str>) -> bool {
    let mut rest = candidate;
    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix) {
            Some(stripped) => rest = stripped,
            None => return false,
        }
    }
    if let Some(suffix) = final_part {
        match rest.strip_suffix(suffix) {
            Some(stripped) => rest = stripped,
            None => return false,
        }
    }
    for part in any {
        match rest.find(part.as_str()) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// Escape filter metacharacters in an attribute value.
fn escape(value: &str, out: &mut String) {
    for ch in value.chars() {
        if matches!(ch, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        render(self, &mut out);
        f.write_str(&out)
    }
}

fn render(filter: &FilterExpression, out: &mut String) {
    match filter {
        FilterExpression::And(operands) => {
            out.push_str("(&");
            for operand in operands {
                render(operand, out);
            }
            out.push(')');
        }
        FilterExpression::Or(operands) => {
            out.push_str("(|");
            for operand in operands {
                render(operand, out);
            }
            out.push(')');
        }
        FilterExpression::Not(operand) => {
            out.push_str("(!");
            render(operand, out);
            out.push(')');
        }
        FilterExpression::Equals { attribute, value } => {
            out.push('(');
            out.push_str(attribute);
            out.push('=');
            escape(value, out);
            out.push(')');
        }
        FilterExpression::GreaterEq { attribute, value } => {
            out.push('(');
            out.push_str(attribute);
            out.push_str(">=");
            escape(value, out);
            out.push(')');
        }
        FilterExpression::LessEq { attribute, value } => {
            out.push('(');
            out.push_str(attribute);
            out.push_str("<=");
            escape(value, out);
            out.push(')');
        }
        FilterExpression::Present { attribute } => {
            out.push('(');
            out.push_str(attribute);
            out.push_str("=*)");
        }
        FilterExpression::Substring {
            attribute,
            initial,
            any,
            final_part,
        } => {
            out.push('(');
            out.push_str(attribute);
            out.push('=');
            if let Some(prefix) = initial {
                escape(prefix, out);
            }
            out.push('*');
            for part in any {
                escape(part, out);
                out.push('*');
            }
            if let Some(suffix) = final_part {
                escape(suffix, out);
            }
            out.push(')');
        }
    }
}

impl FromStr for FilterExpression {
    type Err = crate::filter::FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::filter::parse(s)
    }
}

impl Serialize for FilterExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilterExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
