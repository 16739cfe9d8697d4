//! Searches the library for building blocks that can stand in for, or be inserted next to, a
//! vertex without breaking the compatibility of the edges around it.

use crate::core::library::fragment_space::FragmentSpace;
use crate::core::models::attachment_point::ApClass;
use crate::core::models::graph::Graph;
use crate::core::models::ids::{ApRef, EdgeKey, VertexKey};
use crate::core::models::vertex::{BuildingBlockType, VertexContent};
use crate::core::utils::mapping::{MappingSlot, enumerate_mappings};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

const MAX_LINK_MAPPINGS: usize = 20;

/// A fragment that can replace a vertex, with the AP each used AP of the vertex moves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAlternative {
    pub building_block: usize,
    pub ap_map: BTreeMap<usize, usize>,
}

/// A fragment that can split an edge: the former parent bonds to `target_on_new`, the former
/// child hangs from `source_on_new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInsertion {
    pub building_block: usize,
    pub target_on_new: usize,
    pub source_on_new: usize,
}

/// What an AP of the replaced vertex requires from its replacement.
enum Requirement {
    /// The AP receives an edge from a parent AP of this class.
    FromParent(ApClass),
    /// The AP starts an edge towards a child AP of this class.
    ToChild(ApClass),
    /// The AP is projected out of an embedded graph and must keep its class.
    Projected(ApClass),
}

impl Requirement {
    fn accepts(&self, space: &FragmentSpace, class: &ApClass) -> bool {
        match self {
            Self::FromParent(parent) => space.is_compatible(parent, class),
            Self::ToChild(child) => space.is_compatible(class, child),
            Self::Projected(own) => own == class,
        }
    }
}

fn requirements(graph: &Graph, vertex: VertexKey) -> Option<Vec<(usize, Requirement)>> {
    let v = graph.vertex(vertex)?;
    let mut out = Vec::new();
    for (index, ap) in v.aps().iter().enumerate() {
        let here = ApRef::new(vertex, index);
        match graph.linked_ap(here) {
            Some(other) => {
                let class = graph.ap(other)?.class.clone();
                if graph.is_source(here) {
                    out.push((index, Requirement::ToChild(class)));
                } else {
                    out.push((index, Requirement::FromParent(class)));
                }
            }
            None if graph.embedding().is_some_and(|e| e.is_projected(here)) => {
                out.push((index, Requirement::Projected(ap.class.clone())));
            }
            None => {}
        }
    }
    Some(out)
}

/// AP maps sending every constrained AP of `vertex` onto a compatible AP of `building_block`.
fn mappings_onto(
    graph: &Graph,
    vertex: VertexKey,
    building_block: usize,
    space: &FragmentSpace,
    limit: usize,
) -> Vec<BTreeMap<usize, usize>> {
    let Some(requirements) = requirements(graph, vertex) else {
        return Vec::new();
    };
    let Some(block) = space.building_block(BuildingBlockType::Fragment, building_block) else {
        return Vec::new();
    };
    let slots: Vec<MappingSlot<usize, usize>> = requirements
        .iter()
        .map(|(index, req)| {
            let candidates = block
                .attachment_points
                .iter()
                .enumerate()
                .filter(|(_, def)| req.accepts(space, &def.class))
                .map(|(i, _)| i)
                .collect();
            MappingSlot::required(*index, candidates)
        })
        .collect();
    enumerate_mappings(&slots, limit, |_| true)
        .into_iter()
        .map(|m| m.into_iter().collect())
        .collect()
}

/// Picks a random fragment, different from the one `vertex` instantiates, that can take the
/// place of `vertex`.
///
/// Ring-closing vertices are only replaced by ring-closing fragments and vice versa. Vertices
/// embedding a graph have no alternative.
pub fn find_alternative_link<R: Rng>(
    graph: &Graph,
    vertex: VertexKey,
    space: &FragmentSpace,
    rng: &mut R,
) -> Option<LinkAlternative> {
    let v = graph.vertex(vertex)?;
    if !matches!(v.content(), VertexContent::BuildingBlock) {
        return None;
    }
    let mut options: Vec<(usize, Vec<BTreeMap<usize, usize>>)> = space
        .fragments()
        .iter()
        .enumerate()
        .filter(|(id, block)| {
            !(v.kind() == BuildingBlockType::Fragment && *id == v.building_block_id())
                && block.ring_closing == v.is_ring_closing()
        })
        .map(|(id, _)| (id, mappings_onto(graph, vertex, id, space, MAX_LINK_MAPPINGS)))
        .filter(|(_, maps)| !maps.is_empty())
        .collect();
    options.shuffle(rng);
    let (building_block, maps) = options.into_iter().next()?;
    let ap_map = maps.choose(rng)?.clone();
    Some(LinkAlternative {
        building_block,
        ap_map,
    })
}

/// The first AP map sending `vertex` onto `building_block`, if any.
pub fn mapping_for(
    graph: &Graph,
    vertex: VertexKey,
    building_block: usize,
    space: &FragmentSpace,
) -> Option<BTreeMap<usize, usize>> {
    mappings_onto(graph, vertex, building_block, space, 1)
        .into_iter()
        .next()
}

/// Picks a random fragment able to split `edge`.
///
/// The fragment needs one AP accepting the parent side of the edge and another AP able to bond
/// to the child side.
pub fn find_link_for_edge<R: Rng>(
    graph: &Graph,
    edge: EdgeKey,
    space: &FragmentSpace,
    rng: &mut R,
) -> Option<LinkInsertion> {
    let e = graph.edge(edge)?;
    let parent_class = &graph.ap(e.source)?.class;
    let child_class = &graph.ap(e.target)?.class;
    let mut options = Vec::new();
    for (id, block) in space.fragments().iter().enumerate() {
        if block.ring_closing {
            continue;
        }
        for (t, in_ap) in block.attachment_points.iter().enumerate() {
            if !space.is_compatible(parent_class, &in_ap.class) {
                continue;
            }
            for (s, out_ap) in block.attachment_points.iter().enumerate() {
                if s != t && space.is_compatible(&out_ap.class, child_class) {
                    options.push(LinkInsertion {
                        building_block: id,
                        target_on_new: t,
                        source_on_new: s,
                    });
                }
            }
        }
    }
    options.choose(rng).copied()
}
