//! Address paths
//!
//! A [`NodePath`] locates a node or value by the sequence of selectors taken
//! from the root collection: `[0].Items[2]` is "root 0, member `Items`,
//! element 2". Paths compare structurally, which makes them usable as map
//! keys for lookup by path.
//!
//! The same type is used for member paths relative to a node (`Body.Inner`),
//! which simply do not start with a root index.

mod text;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::{ArborError, Result};

/// One selector in a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathPart {
    /// Named member of a node or record
    Field(String),
    /// Position in the root collection or in a list
    Index(usize),
}

impl PathPart {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathPart::Field(name) => Some(name),
            PathPart::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathPart::Index(i) => Some(*i),
            PathPart::Field(_) => None,
        }
    }
}

impl From<&str> for PathPart {
    fn from(name: &str) -> Self {
        PathPart::Field(name.to_string())
    }
}

impl From<usize> for PathPart {
    fn from(index: usize) -> Self {
        PathPart::Index(index)
    }
}

/// Structured locator from a root collection to a node or value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    parts: Vec<PathPart>,
}

impl NodePath {
    /// The empty path (addresses the root collection itself)
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    /// Path of the root at `index`
    pub fn root(index: usize) -> Self {
        Self {
            parts: vec![PathPart::Index(index)],
        }
    }

    pub fn from_parts(parts: Vec<PathPart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<PathPart> {
        self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of selectors
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    pub fn last_part(&self) -> Option<&PathPart> {
        self.parts.last()
    }

    /// Root index when the path starts with an index selector
    pub fn root_index(&self) -> Option<usize> {
        self.parts.first().and_then(PathPart::as_index)
    }

    /// New path with `part` appended
    pub fn append(&self, part: impl Into<PathPart>) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part.into());
        Self { parts }
    }

    /// Builder shorthand for appending a field selector
    pub fn field(self, name: &str) -> Self {
        self.with_part(PathPart::Field(name.to_string()))
    }

    /// Builder shorthand for appending an index selector
    pub fn index(self, index: usize) -> Self {
        self.with_part(PathPart::Index(index))
    }

    fn with_part(mut self, part: PathPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Append in place
    pub fn push(&mut self, part: impl Into<PathPart>) {
        self.parts.push(part.into());
    }

    /// Concatenate `other` after this path
    pub fn combine(&self, other: &NodePath) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + other.parts.len());
        parts.extend_from_slice(&self.parts);
        parts.extend_from_slice(&other.parts);
        Self { parts }
    }

    /// Path without its last selector; `None` for the empty path
    pub fn parent(&self) -> Option<Self> {
        if self.parts.is_empty() {
            return None;
        }
        Some(Self {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// `other` is a prefix of this path (equal paths included)
    pub fn starts_with(&self, other: &NodePath) -> bool {
        self.parts.starts_with(&other.parts)
    }

    /// `other` is a strict prefix of this path
    pub fn is_child_of(&self, other: &NodePath) -> bool {
        self.parts.len() > other.parts.len() && self.starts_with(other)
    }

    /// Remainder after removing `prefix`, if it is a prefix
    pub fn strip_prefix(&self, prefix: &NodePath) -> Option<Self> {
        self.parts
            .strip_prefix(prefix.parts.as_slice())
            .map(|rest| Self {
                parts: rest.to_vec(),
            })
    }

    /// All proper prefixes, longest first
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (0..self.parts.len()).rev().map(move |len| Self {
            parts: self.parts[..len].to_vec(),
        })
    }

    /// Parse the canonical text form
    ///
    /// # Errors
    ///
    /// Returns `PathParse` with the byte offset of the first invalid character.
    pub fn parse(text: &str) -> Result<Self> {
        text::parse(text)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        text::write_path(f, &self.parts)
    }
}

impl FromStr for NodePath {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        NodePath::parse(&text).map_err(serde::de::Error::custom)
    }
}
