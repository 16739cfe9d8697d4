use super::ids::EdgeKey;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The class of an attachment point, written `rule:subclass`.
///
/// The rule names the kind of chemical bond the AP can form and selects its bond order; the
/// subclass distinguishes the two sides of an asymmetric connection (e.g. `amide:0` and
/// `amide:1`). Which classes may be joined is decided by the building-block library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct ApClass {
    rule: String,
    subclass: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid attachment point class '{0}' (expected 'rule:subclass')")]
pub struct ParseApClassError(pub String);

impl ApClass {
    pub fn new(rule: impl Into<String>, subclass: u32) -> Self {
        Self {
            rule: rule.into(),
            subclass,
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn subclass(&self) -> u32 {
        self.subclass
    }
}

impl FromStr for ApClass {
    type Err = ParseApClassError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseApClassError(s.to_string());
        let (rule, sub) = s.trim().split_once(':').ok_or_else(invalid)?;
        if rule.is_empty()
            || !rule
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid());
        }
        let subclass = sub.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(rule, subclass))
    }
}

impl TryFrom<String> for ApClass {
    type Error = ParseApClassError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ApClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rule, self.subclass)
    }
}

/// An attachment point: a typed, free-or-used connection slot on a vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPoint {
    /// Class governing compatibility and bond order.
    pub class: ApClass,
    /// Index of the atom (within the building block) this AP is rooted on.
    pub source_atom: usize,
    /// The edge using this AP, if any.
    pub(crate) edge: Option<EdgeKey>,
}

impl AttachmentPoint {
    pub fn new(class: ApClass, source_atom: usize) -> Self {
        Self {
            class,
            source_atom,
            edge: None,
        }
    }

    pub fn edge(&self) -> Option<EdgeKey> {
        self.edge
    }

    pub fn is_free(&self) -> bool {
        self.edge.is_none()
    }

    pub fn is_used(&self) -> bool {
        self.edge.is_some()
    }

    /// Returns `true` when both APs have the same class and source atom.
    pub fn same_as(&self, other: &AttachmentPoint) -> bool {
        self.class == other.class && self.source_atom == other.source_atom
    }
}
