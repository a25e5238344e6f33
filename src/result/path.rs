#![forbid(unsafe_code)]

//! Key-path grammar for flattened payloads.
//!
//! ```text
//! key        := "data.data." root tail
//! tail       := ( "children." block ".data." row "." )* field
//!             | ( "children." block ".data." row "." )* "children." block ".schema"
//! ```
//!
//! `schemas`, `schemas.*` and `data.schema` are reserved. A field name may
//! contain dots but cannot start with a `children` segment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const DATA_PREFIX: &str = "data.data.";
const CHILDREN: &str = "children";

/// Why a flattened key could not be tokenized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyPathError {
    /// The key does not start with `data.data.`.
    #[error("key '{key}' does not start with 'data.data.'")]
    MissingPrefix {
        /// Offending key.
        key: String,
    },
    /// A row or block index is not a plain decimal number.
    #[error("key '{key}' has non-numeric index '{segment}'")]
    BadIndex {
        /// Offending key.
        key: String,
        /// Segment that should have been an index.
        segment: String,
    },
    /// A `children` hop stops before its `data.<row>` part.
    #[error("key '{key}' has an incomplete children hop")]
    IncompleteHop {
        /// Offending key.
        key: String,
    },
    /// Nothing follows the last index.
    #[error("key '{key}' names no field")]
    MissingField {
        /// Offending key.
        key: String,
    },
}

impl KeyPathError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            KeyPathError::MissingPrefix { .. } => "MissingPrefix",
            KeyPathError::BadIndex { .. } => "BadIndex",
            KeyPathError::IncompleteHop { .. } => "IncompleteHop",
            KeyPathError::MissingField { .. } => "MissingField",
        }
    }
}

/// One `children.<block>.data.<row>` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NestingHop {
    /// Index into the parent row's `children` array.
    pub block: u32,
    /// Row index inside that child block.
    pub row: u32,
}

/// Path of a cell below its root row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    /// Nesting steps from the root row.
    pub hops: Vec<NestingHop>,
    /// Field name at the end of the path.
    pub field: String,
}

impl FieldPath {
    /// A root-level field.
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            hops: Vec::new(),
            field: field.into(),
        }
    }

    /// Number of nesting steps.
    pub fn depth(&self) -> usize {
        self.hops.len()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            write!(f, "{CHILDREN}.{}.data.{}.", hop.block, hop.row)?;
        }
        f.write_str(&self.field)
    }
}

impl FromStr for FieldPath {
    type Err = KeyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_tail(s, s)? {
            Tail::Field(path) => Ok(path),
            Tail::SchemaMarker => Err(KeyPathError::MissingField { key: s.to_owned() }),
        }
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A fully tokenized data key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPath {
    /// Root row index.
    pub root: u64,
    /// Path below the root row.
    pub path: FieldPath,
}

/// Classification of one flattened key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedKey {
    /// A data cell.
    Field(KeyPath),
    /// A schema marker or schema list entry.
    Reserved,
}

/// Tokenizes a flattened payload key.
pub fn parse_key(key: &str) -> Result<ParsedKey, KeyPathError> {
    if key == "schemas" || key.starts_with("schemas.") || key == "data.schema" {
        return Ok(ParsedKey::Reserved);
    }
    let rest = key
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| KeyPathError::MissingPrefix { key: key.to_owned() })?;
    let (root, rest) = split_segment(rest);
    let root = parse_index(key, root)?;
    match parse_tail(key, rest)? {
        Tail::SchemaMarker => Ok(ParsedKey::Reserved),
        Tail::Field(path) => Ok(ParsedKey::Field(KeyPath { root, path })),
    }
}

enum Tail {
    Field(FieldPath),
    SchemaMarker,
}

fn parse_tail(key: &str, mut rest: &str) -> Result<Tail, KeyPathError> {
    let incomplete = || KeyPathError::IncompleteHop { key: key.to_owned() };
    let mut hops = Vec::new();
    loop {
        let (head, tail) = split_segment(rest);
        if head != CHILDREN {
            break;
        }
        let (block, tail) = split_segment(tail);
        if block.is_empty() {
            return Err(incomplete());
        }
        let block = parse_index(key, block)?;
        let (marker, tail) = split_segment(tail);
        match marker {
            "schema" if tail.is_empty() => return Ok(Tail::SchemaMarker),
            "data" => {}
            _ => return Err(incomplete()),
        }
        let (row, tail) = split_segment(tail);
        if row.is_empty() {
            return Err(incomplete());
        }
        let row = parse_index(key, row)?;
        hops.push(NestingHop { block, row });
        rest = tail;
    }
    if rest.is_empty() {
        return Err(KeyPathError::MissingField { key: key.to_owned() });
    }
    Ok(Tail::Field(FieldPath {
        hops,
        field: rest.to_owned(),
    }))
}

fn split_segment(s: &str) -> (&str, &str) {
    s.split_once('.').unwrap_or((s, ""))
}

fn parse_index<T: FromStr>(key: &str, segment: &str) -> Result<T, KeyPathError> {
    let bad = || KeyPathError::BadIndex {
        key: key.to_owned(),
        segment: segment.to_owned(),
    };
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    segment.parse().map_err(|_| bad())
}
