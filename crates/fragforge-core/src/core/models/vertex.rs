use super::attachment_point::AttachmentPoint;
use super::graph::Graph;
use super::template::ContractLevel;
use phf::{Map, phf_map};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The role a building block plays in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingBlockType {
    /// Root block a graph is grown from.
    Scaffold,
    /// Ordinary building block.
    Fragment,
    /// Capping group saturating a free attachment point.
    Cap,
    #[default]
    Undefined,
}

#[derive(Debug, Error)]
#[error("Invalid building block type string")]
pub struct ParseBuildingBlockTypeError;

impl FromStr for BuildingBlockType {
    type Err = ParseBuildingBlockTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scaffold" => Ok(Self::Scaffold),
            "fragment" => Ok(Self::Fragment),
            "cap" => Ok(Self::Cap),
            "undefined" => Ok(Self::Undefined),
            _ => Err(ParseBuildingBlockTypeError),
        }
    }
}

impl fmt::Display for BuildingBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Scaffold => "Scaffold",
                Self::Fragment => "Fragment",
                Self::Cap => "Cap",
                Self::Undefined => "Undefined",
            }
        )
    }
}

/// The kinds of edit a mutation can apply at a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum MutationType {
    ChangeBranch,
    ChangeLink,
    DeleteLink,
    DeleteChain,
    AddLink,
    Extend,
    Delete,
}

static MUTATION_TYPE_NAMES: Map<&'static str, MutationType> = phf_map! {
    "CHANGEBRANCH" => MutationType::ChangeBranch,
    "CHANGELINK" => MutationType::ChangeLink,
    "DELETELINK" => MutationType::DeleteLink,
    "DELETECHAIN" => MutationType::DeleteChain,
    "ADDLINK" => MutationType::AddLink,
    "EXTEND" => MutationType::Extend,
    "DELETE" => MutationType::Delete,
};

impl MutationType {
    pub const ALL: [MutationType; 7] = [
        MutationType::ChangeBranch,
        MutationType::ChangeLink,
        MutationType::DeleteLink,
        MutationType::DeleteChain,
        MutationType::AddLink,
        MutationType::Extend,
        MutationType::Delete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChangeBranch => "CHANGEBRANCH",
            Self::ChangeLink => "CHANGELINK",
            Self::DeleteLink => "DELETELINK",
            Self::DeleteChain => "DELETECHAIN",
            Self::AddLink => "ADDLINK",
            Self::Extend => "EXTEND",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown mutation type '{0}'")]
pub struct ParseMutationTypeError(pub String);

impl FromStr for MutationType {
    type Err = ParseMutationTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MUTATION_TYPE_NAMES
            .get(s.trim().to_uppercase().as_str())
            .copied()
            .ok_or_else(|| ParseMutationTypeError(s.to_string()))
    }
}

impl TryFrom<String> for MutationType {
    type Error = ParseMutationTypeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a vertex stands for: a plain library building block or an embedded graph.
#[derive(Debug, Clone, Default)]
pub enum VertexContent {
    #[default]
    BuildingBlock,
    Template(Box<Graph>),
}

/// A node of a fragment graph.
///
/// A vertex carries the identity of the building block it instantiates, its ordered list of
/// attachment points and the groups of APs that are equivalent under constitutional symmetry.
/// Vertices are owned by exactly one [`Graph`] and addressed through a
/// [`VertexKey`](super::ids::VertexKey).
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) id: u64,
    pub(crate) building_block_id: usize,
    pub(crate) kind: BuildingBlockType,
    pub(crate) aps: Vec<AttachmentPoint>,
    pub(crate) symmetric_aps: Vec<Vec<usize>>,
    pub(crate) ring_closing: bool,
    pub(crate) heavy_atoms: usize,
    pub(crate) allowed_mutations: Vec<MutationType>,
    pub(crate) content: VertexContent,
}

impl Vertex {
    /// Creates a plain building-block vertex with every mutation type allowed.
    ///
    /// # Arguments
    ///
    /// * `id` - Graph-local numeric identifier.
    /// * `building_block_id` - Index of the block in the library list matching `kind`.
    /// * `kind` - Role of the building block.
    /// * `aps` - Ordered attachment points, all free.
    pub fn new(
        id: u64,
        building_block_id: usize,
        kind: BuildingBlockType,
        aps: Vec<AttachmentPoint>,
    ) -> Self {
        Self {
            id,
            building_block_id,
            kind,
            aps,
            symmetric_aps: Vec::new(),
            ring_closing: false,
            heavy_atoms: 1,
            allowed_mutations: MutationType::ALL.to_vec(),
            content: VertexContent::BuildingBlock,
        }
    }

    /// Declares groups of symmetric APs. Groups with fewer than two members are ignored.
    pub fn with_symmetric_aps(mut self, groups: Vec<Vec<usize>>) -> Self {
        self.symmetric_aps = groups.into_iter().filter(|g| g.len() > 1).collect();
        self
    }

    pub fn with_ring_closing(mut self, ring_closing: bool) -> Self {
        self.ring_closing = ring_closing;
        self
    }

    pub fn with_heavy_atoms(mut self, heavy_atoms: usize) -> Self {
        self.heavy_atoms = heavy_atoms;
        self
    }

    pub fn with_allowed_mutations(mut self, allowed: Vec<MutationType>) -> Self {
        self.allowed_mutations = allowed;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn building_block_id(&self) -> usize {
        self.building_block_id
    }

    pub fn kind(&self) -> BuildingBlockType {
        self.kind
    }

    pub fn is_ring_closing(&self) -> bool {
        self.ring_closing
    }

    pub fn heavy_atoms(&self) -> usize {
        self.heavy_atoms
    }

    pub fn allowed_mutations(&self) -> &[MutationType] {
        &self.allowed_mutations
    }

    pub fn aps(&self) -> &[AttachmentPoint] {
        &self.aps
    }

    /// Retrieves an attachment point by index.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the AP in this vertex's list.
    ///
    /// # Return
    ///
    /// Returns `Some(&AttachmentPoint)` if the index is in range, otherwise `None`.
    pub fn ap(&self, index: usize) -> Option<&AttachmentPoint> {
        self.aps.get(index)
    }

    pub(crate) fn ap_mut(&mut self, index: usize) -> Option<&mut AttachmentPoint> {
        self.aps.get_mut(index)
    }

    pub fn free_ap_indices(&self) -> Vec<usize> {
        (0..self.aps.len()).filter(|&i| self.aps[i].is_free()).collect()
    }

    pub fn used_ap_indices(&self) -> Vec<usize> {
        (0..self.aps.len()).filter(|&i| self.aps[i].is_used()).collect()
    }

    pub fn has_free_ap(&self) -> bool {
        self.aps.iter().any(AttachmentPoint::is_free)
    }

    pub fn symmetric_ap_groups(&self) -> &[Vec<usize>] {
        &self.symmetric_aps
    }

    /// Returns the symmetry group containing the AP at `index`, if any.
    pub fn symmetric_aps_of(&self, index: usize) -> Option<&[usize]> {
        self.symmetric_aps
            .iter()
            .find(|group| group.contains(&index))
            .map(Vec::as_slice)
    }

    pub fn content(&self) -> &VertexContent {
        &self.content
    }

    pub fn is_template(&self) -> bool {
        matches!(self.content, VertexContent::Template(_))
    }

    pub fn inner_graph(&self) -> Option<&Graph> {
        match &self.content {
            VertexContent::Template(inner) => Some(inner),
            VertexContent::BuildingBlock => None,
        }
    }

    pub fn inner_graph_mut(&mut self) -> Option<&mut Graph> {
        match &mut self.content {
            VertexContent::Template(inner) => Some(inner),
            VertexContent::BuildingBlock => None,
        }
    }

    /// Contract level of an embedded graph, `None` for plain building blocks.
    pub fn contract_level(&self) -> Option<ContractLevel> {
        self.inner_graph()
            .and_then(Graph::embedding)
            .map(|embedding| embedding.contract)
    }

    /// Returns `true` if both vertices instantiate the same building block with the same APs.
    pub fn same_as(&self, other: &Vertex) -> bool {
        self.building_block_id == other.building_block_id
            && self.kind == other.kind
            && self.aps.len() == other.aps.len()
            && self.aps.iter().zip(&other.aps).all(|(a, b)| a.same_as(b))
    }

    /// Returns a copy of this vertex with all APs freed and a new id.
    pub fn fresh_copy(&self, id: u64) -> Vertex {
        let mut copy = self.clone();
        copy.id = id;
        for ap in &mut copy.aps {
            ap.edge = None;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::attachment_point::ApClass;

    fn three_ap_vertex() -> Vertex {
        let aps = (0..3)
            .map(|i| AttachmentPoint::new(ApClass::new("A", 1), i))
            .collect();
        Vertex::new(7, 0, BuildingBlockType::Scaffold, aps)
            .with_symmetric_aps(vec![vec![0, 1, 2], vec![1]])
    }

    mod enums {
        use super::*;

        #[test]
        fn mutation_type_from_str_parses_valid_strings() {
            assert_eq!(
                "CHANGEBRANCH".parse::<MutationType>().unwrap(),
                MutationType::ChangeBranch
            );
            assert_eq!(
                "deletechain".parse::<MutationType>().unwrap(),
                MutationType::DeleteChain
            );
            assert_eq!(" extend ".parse::<MutationType>().unwrap(), MutationType::Extend);
        }

        #[test]
        fn mutation_type_from_str_rejects_invalid_strings() {
            assert!("".parse::<MutationType>().is_err());
            assert!("MUTATE".parse::<MutationType>().is_err());
        }

        #[test]
        fn mutation_type_display_matches_names() {
            for t in MutationType::ALL {
                assert_eq!(t.to_string().parse::<MutationType>().unwrap(), t);
            }
            assert_eq!(MutationType::AddLink.to_string(), "ADDLINK");
        }

        #[test]
        fn building_block_type_parses_and_displays() {
            assert_eq!(
                "cap".parse::<BuildingBlockType>().unwrap(),
                BuildingBlockType::Cap
            );
            assert!("ligand".parse::<BuildingBlockType>().is_err());
            assert_eq!(BuildingBlockType::Scaffold.to_string(), "Scaffold");
            assert_eq!(BuildingBlockType::default(), BuildingBlockType::Undefined);
        }
    }

    mod vertex {
        use super::*;

        #[test]
        fn new_vertex_allows_all_mutations_and_has_free_aps() {
            let v = three_ap_vertex();
            assert_eq!(v.allowed_mutations().len(), 7);
            assert!(v.has_free_ap());
            assert_eq!(v.free_ap_indices(), vec![0, 1, 2]);
            assert!(v.used_ap_indices().is_empty());
            assert!(!v.is_template());
        }

        #[test]
        fn singleton_symmetry_groups_are_dropped() {
            let v = three_ap_vertex();
            assert_eq!(v.symmetric_ap_groups().len(), 1);
            assert_eq!(v.symmetric_aps_of(2), Some(&[0usize, 1, 2][..]));
        }

        #[test]
        fn same_as_compares_block_identity_and_aps() {
            let a = three_ap_vertex();
            let b = a.fresh_copy(99);
            assert!(a.same_as(&b));
            assert_eq!(b.id(), 99);
            let c = Vertex::new(8, 1, BuildingBlockType::Scaffold, a.aps().to_vec());
            assert!(!a.same_as(&c));
        }
    }
}
