use super::ids::{ApRef, VertexKey};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Default for BondOrder {
    fn default() -> Self {
        BondOrder::Single
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "s" | "single" => Ok(Self::Single),
            "2" | "d" | "double" => Ok(Self::Double),
            "3" | "t" | "triple" => Ok(Self::Triple),
            "ar" | "aromatic" => Ok(Self::Aromatic),
            _ => Err(ParseBondOrderError),
        }
    }
}

impl TryFrom<String> for BondOrder {
    type Error = ParseBondOrderError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
            }
        )
    }
}

/// A directed parent-to-child link between two attachment points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: ApRef, // AP on the parent vertex
    pub target: ApRef, // AP on the child vertex
    pub order: BondOrder,
}

impl Edge {
    pub fn new(source: ApRef, target: ApRef, order: BondOrder) -> Self {
        Self {
            source,
            target,
            order,
        }
    }

    pub fn contains(&self, vertex: VertexKey) -> bool {
        self.source.vertex == vertex || self.target.vertex == vertex
    }

    /// Returns the AP at the opposite end from `ap`, if `ap` belongs to this edge.
    pub fn other_end(&self, ap: ApRef) -> Option<ApRef> {
        if ap == self.source {
            Some(self.target)
        } else if ap == self.target {
            Some(self.source)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_vertex_key(n: u64) -> VertexKey {
        VertexKey::from(KeyData::from_ffi(n))
    }

    #[test]
    fn bond_order_from_str_parses_valid_strings() {
        assert_eq!("1".parse::<BondOrder>().unwrap(), BondOrder::Single);
        assert_eq!("single".parse::<BondOrder>().unwrap(), BondOrder::Single);
        assert_eq!("D".parse::<BondOrder>().unwrap(), BondOrder::Double);
        assert_eq!("triple".parse::<BondOrder>().unwrap(), BondOrder::Triple);
        assert_eq!("ar".parse::<BondOrder>().unwrap(), BondOrder::Aromatic);
    }

    #[test]
    fn bond_order_from_str_rejects_invalid_strings() {
        assert!("".parse::<BondOrder>().is_err());
        assert!("quadruple".parse::<BondOrder>().is_err());
        assert!("0".parse::<BondOrder>().is_err());
    }

    #[test]
    fn bond_order_default_is_single() {
        assert_eq!(BondOrder::default(), BondOrder::Single);
        assert_eq!(BondOrder::Aromatic.to_string(), "Aromatic");
    }

    #[test]
    fn edge_contains_both_vertices() {
        let (a, b) = (dummy_vertex_key(1), dummy_vertex_key(2));
        let edge = Edge::new(ApRef::new(a, 0), ApRef::new(b, 1), BondOrder::Double);
        assert!(edge.contains(a));
        assert!(edge.contains(b));
        assert!(!edge.contains(dummy_vertex_key(3)));
    }

    #[test]
    fn edge_other_end_returns_opposite_ap() {
        let (a, b) = (dummy_vertex_key(1), dummy_vertex_key(2));
        let edge = Edge::new(ApRef::new(a, 0), ApRef::new(b, 1), BondOrder::Single);
        assert_eq!(edge.other_end(ApRef::new(a, 0)), Some(ApRef::new(b, 1)));
        assert_eq!(edge.other_end(ApRef::new(b, 1)), Some(ApRef::new(a, 0)));
        assert_eq!(edge.other_end(ApRef::new(a, 1)), None);
    }
}
