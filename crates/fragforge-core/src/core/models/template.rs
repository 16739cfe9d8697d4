use super::attachment_point::AttachmentPoint;
use super::graph::Graph;
use super::ids::ApRef;
use super::vertex::{BuildingBlockType, Vertex, VertexContent};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How much of an embedded graph may change during evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractLevel {
    /// Any subgraph may be swapped.
    #[default]
    Free,
    /// Only subgraphs of identical shape may be swapped.
    FixedStructure,
    /// Nothing inside may change.
    Fixed,
}

#[derive(Debug, Error)]
#[error("Invalid contract level string")]
pub struct ParseContractLevelError;

impl FromStr for ContractLevel {
    type Err = ParseContractLevelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "free" => Ok(Self::Free),
            "fixed-structure" => Ok(Self::FixedStructure),
            "fixed" => Ok(Self::Fixed),
            _ => Err(ParseContractLevelError),
        }
    }
}

impl fmt::Display for ContractLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Free => "Free",
                Self::FixedStructure => "FixedStructure",
                Self::Fixed => "Fixed",
            }
        )
    }
}

/// Records how a graph sits inside a template vertex.
///
/// `projections[i]` is the inner free AP that outer AP `i` of the template vertex stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    pub contract: ContractLevel,
    pub projections: Vec<ApRef>,
}

impl Embedding {
    pub fn is_projected(&self, ap: ApRef) -> bool {
        self.projections.contains(&ap)
    }

    pub(crate) fn update_projection(&mut self, old: ApRef, new: ApRef) {
        for p in &mut self.projections {
            if *p == old {
                *p = new;
            }
        }
    }
}

impl Vertex {
    /// Wraps `inner` into a template vertex.
    ///
    /// Every free AP of the inner graph is projected onto the surface of the template, in vertex
    /// order, so the template's outer APs mirror their classes.
    pub fn template(
        id: u64,
        building_block_id: usize,
        kind: BuildingBlockType,
        mut inner: Graph,
        contract: ContractLevel,
    ) -> Self {
        let projections = inner.free_aps();
        let aps = projections
            .iter()
            .enumerate()
            .filter_map(|(i, ap)| inner.ap(*ap).map(|a| AttachmentPoint::new(a.class.clone(), i)))
            .collect();
        let heavy_atoms = inner.heavy_atom_count();
        inner.set_embedding(Some(Embedding {
            contract,
            projections,
        }));
        let mut vertex = Vertex::new(id, building_block_id, kind, aps).with_heavy_atoms(heavy_atoms);
        vertex.content = VertexContent::Template(Box::new(inner));
        vertex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::attachment_point::ApClass;
    use crate::core::models::edge::BondOrder;

    fn two_vertex_inner() -> Graph {
        let mut g = Graph::new();
        let a = g.add_vertex(
            Vertex::new(
                1,
                0,
                BuildingBlockType::Fragment,
                vec![
                    AttachmentPoint::new(ApClass::new("A", 0), 0),
                    AttachmentPoint::new(ApClass::new("B", 0), 1),
                ],
            )
            .with_heavy_atoms(3),
        );
        let b = g.add_vertex(
            Vertex::new(
                2,
                1,
                BuildingBlockType::Fragment,
                vec![
                    AttachmentPoint::new(ApClass::new("B", 1), 0),
                    AttachmentPoint::new(ApClass::new("C", 0), 1),
                ],
            )
            .with_heavy_atoms(2),
        );
        g.add_edge(ApRef::new(a, 1), ApRef::new(b, 0), BondOrder::Single)
            .unwrap();
        g
    }

    #[test]
    fn contract_level_parses_and_displays() {
        assert_eq!(
            "fixed_structure".parse::<ContractLevel>().unwrap(),
            ContractLevel::FixedStructure
        );
        assert_eq!("FREE".parse::<ContractLevel>().unwrap(), ContractLevel::Free);
        assert!("loose".parse::<ContractLevel>().is_err());
        assert_eq!(ContractLevel::Fixed.to_string(), "Fixed");
    }

    #[test]
    fn template_projects_free_inner_aps() {
        let template = Vertex::template(
            5,
            0,
            BuildingBlockType::Fragment,
            two_vertex_inner(),
            ContractLevel::Free,
        );
        assert!(template.is_template());
        assert_eq!(template.aps().len(), 2);
        assert_eq!(template.aps()[0].class, ApClass::new("A", 0));
        assert_eq!(template.aps()[1].class, ApClass::new("C", 0));
        assert_eq!(template.heavy_atoms(), 5);
        assert_eq!(template.contract_level(), Some(ContractLevel::Free));
        let inner = template.inner_graph().unwrap();
        let embedding = inner.embedding().unwrap();
        assert_eq!(embedding.projections.len(), 2);
        assert!(embedding.is_projected(inner.free_aps()[0]));
    }
}
