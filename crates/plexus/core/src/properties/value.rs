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

use serde::{Deserialize, Serialize};

/// A single service property value.
///
/// Filter literals are untyped strings; the comparison helpers below define
/// how a literal relates to each value variant. Both the filter evaluator and
/// the filter indexes go through [`PropertyValue::equality_keys`] /
/// [`equality_key`], which is what guarantees an indexed lookup always agrees
/// with a full linear scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropertyValue>),
}

/// Canonical equality key for a filter literal.
///
/// Numeric-looking literals collapse to their canonical rendering, so
/// `(port=08080)` and `(port=8080)` select the same bucket and match the
/// same registrations.
pub fn equality_key(literal: &str) -> String {
    if let Ok(i) = literal.parse::<i64>() {
        return i.to_string();
    }
    if let Ok(f) = literal.parse::<f64>() {
        if f.is_finite() {
            return f.to_string();
        }
    }
    literal.to_string()
}

impl PropertyValue {
    /// The canonical equality keys this value answers to.
    ///
    /// Scalars produce one key; a list contributes one key per element.
    pub fn equality_keys(&self) -> Vec<String> {
        match self {
            PropertyValue::Bool(b) => vec![b.to_string()],
            PropertyValue::Int(i) => vec![i.to_string()],
            PropertyValue::Float(f) => vec![f.to_string()],
            PropertyValue::Str(s) => vec![equality_key(s)],
            PropertyValue::List(values) => values.iter().flat_map(PropertyValue::equality_keys).collect(),
        }
    }

    /// Equality against an untyped filter literal.
    pub fn equals_literal(&self, literal: &str) -> bool {
        let key = equality_key(literal);
        self.equality_keys().iter().any(|k| *k == key)
    }

    /// Ordering against an untyped filter literal, for `>=` / `<=` clauses.
    ///
    /// Numeric values compare numerically when the literal parses; strings
    /// compare lexicographically. Returns `None` when the two sides are not
    /// comparable (e.g. an integer property against a non-numeric literal).
    pub fn compare_literal(&self, literal: &str) -> Option<Ordering> {
        match self {
            PropertyValue::Int(i) => {
                if let Ok(rhs) = literal.parse::<i64>() {
                    Some(i.cmp(&rhs))
                } else {
                    let rhs = literal.parse::<f64>().ok()?;
                    (*i as f64).partial_cmp(&rhs)
                }
            }
            PropertyValue::Float(f) => {
                let rhs = literal.parse::<f64>().ok()?;
                f.partial_cmp(&rhs)
            }
            PropertyValue::Bool(b) => {
                let rhs = literal.parse::<bool>().ok()?;
                Some(b.cmp(&rhs))
            }
            PropertyValue::Str(s) => Some(s.as_str().cmp(literal)),
            // Lists are handled element-wise by the evaluator.
            PropertyValue::List(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}
