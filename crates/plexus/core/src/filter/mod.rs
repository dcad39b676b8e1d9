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

//! LDAP-style (RFC 1960) service filters.
//!
//! A filter string parses deterministically into a [`FilterExpression`] AST;
//! evaluation against a property map is a pure function. Malformed filters
//! are rejected at parse time, never at match time.

pub mod ast;
pub mod parser;

pub use ast::FilterExpression;
pub use parser::{FilterError, parse};
