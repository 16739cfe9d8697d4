use super::{Graph, GraphError};
use crate::core::models::edge::BondOrder;
use crate::core::models::ids::{ApRef, VertexKey};
use crate::core::models::ring::Ring;
use crate::core::models::symmetry::SymmetricSet;
use std::collections::{HashMap, HashSet};

/// A boundary edge of a subgraph about to be replaced.
struct BoundaryLink {
    /// AP of the subgraph that held the edge.
    inside: ApRef,
    /// AP of the rest of the graph at the other end.
    outside: ApRef,
    /// Whether the outside end was the parent.
    outside_is_parent: bool,
    order: BondOrder,
}

impl Graph {
    /// APs of `subgraph` that connect it to the rest of the world.
    ///
    /// These are the APs used by an edge leaving the subgraph, plus the free APs projected to
    /// the surface of an enclosing template.
    pub fn interface_aps(&self, subgraph: &[VertexKey]) -> Vec<ApRef> {
        let inside: HashSet<VertexKey> = subgraph.iter().copied().collect();
        let mut out = Vec::new();
        for &key in subgraph {
            let Some(v) = self.vertex(key) else {
                continue;
            };
            for i in 0..v.aps.len() {
                let ap = ApRef::new(key, i);
                let crosses = self
                    .linked_ap(ap)
                    .is_some_and(|other| !inside.contains(&other.vertex));
                let projected = self.embedding.as_ref().is_some_and(|e| e.is_projected(ap));
                if crosses || projected {
                    out.push(ap);
                }
            }
        }
        out
    }

    /// APs a replacement for `subgraph` may have to honour: its interface APs and its free APs.
    pub fn subgraph_aps(&self, subgraph: &[VertexKey]) -> Vec<ApRef> {
        let interface: HashSet<ApRef> = self.interface_aps(subgraph).into_iter().collect();
        let mut out = Vec::new();
        for &key in subgraph {
            let Some(v) = self.vertex(key) else {
                continue;
            };
            for (i, ap) in v.aps.iter().enumerate() {
                let r = ApRef::new(key, i);
                if ap.is_free() || interface.contains(&r) {
                    out.push(r);
                }
            }
        }
        out
    }

    /// Copies `subgraph` into an independent graph.
    ///
    /// Vertex keys are preserved, so APs of the copy are addressed exactly like the APs of the
    /// original vertices. Edges leaving the subgraph are dropped, which frees the APs that held
    /// them; rings are kept only when all their members are inside.
    pub fn extract_subgraph(&self, subgraph: &[VertexKey]) -> Graph {
        let keep: HashSet<VertexKey> = subgraph.iter().copied().collect();
        let mut out = self.clone();
        for &key in &self.order {
            if !keep.contains(&key) {
                out.remove_vertex(key);
            }
        }
        out.embedding = None;
        out.closable_chains.clear();
        out.annotation.clear();
        out
    }

    /// Copies every vertex, edge, ring and symmetric set of `other` into this graph.
    ///
    /// # Return
    ///
    /// The key each vertex of `other` received in this graph.
    pub(crate) fn absorb(
        &mut self,
        other: &Graph,
    ) -> Result<HashMap<VertexKey, VertexKey>, GraphError> {
        let mut map = HashMap::new();
        for (key, v) in other.vertices() {
            let mut copy = v.clone();
            for ap in &mut copy.aps {
                ap.edge = None;
            }
            map.insert(key, self.add_vertex(copy));
        }
        let translate = |ap: ApRef, map: &HashMap<VertexKey, VertexKey>| {
            map.get(&ap.vertex)
                .map(|&k| ApRef::new(k, ap.index))
                .ok_or(GraphError::VertexNotFound(ap.vertex))
        };
        for (_, edge) in other.edges() {
            let source = translate(edge.source, &map)?;
            let target = translate(edge.target, &map)?;
            self.add_edge(source, target, edge.order)?;
        }
        for ring in &other.rings {
            let mut copy = ring.clone();
            if copy.remap(|k| map.get(&k).copied()) {
                self.rings.push(copy);
            }
        }
        for set in &other.symmetric_sets {
            let members = set
                .members()
                .iter()
                .filter_map(|k| map.get(k).copied())
                .collect();
            self.add_symmetric_set(SymmetricSet::new(members));
        }
        Ok(map)
    }

    /// Swaps `old` for a copy of `incoming`.
    ///
    /// Every AP of the interface of `old` must appear in `ap_map`, which names the AP of
    /// `incoming` taking over its role. Boundary edges are recreated with their former bond
    /// order and direction, rings running across the boundary are re-routed through the new
    /// vertices, and template projections follow the mapping.
    ///
    /// # Return
    ///
    /// The keys of the inserted vertices, in the order of `incoming`, or `Ok(None)` if some
    /// interface AP is not mapped.
    pub fn replace_subgraph(
        &mut self,
        old: &[VertexKey],
        incoming: &Graph,
        ap_map: &HashMap<ApRef, ApRef>,
    ) -> Result<Option<Vec<VertexKey>>, GraphError> {
        if old.is_empty() {
            return Ok(None);
        }
        for &key in old {
            if !self.contains_vertex(key) {
                return Err(GraphError::VertexNotFound(key));
            }
        }

        let mut links = Vec::new();
        let mut projections = Vec::new();
        for ap in self.interface_aps(old) {
            let Some(&replacement) = ap_map.get(&ap) else {
                return Ok(None);
            };
            if incoming.ap(replacement).is_none() {
                return Err(GraphError::ApNotFound {
                    vertex_id: incoming.vertex(replacement.vertex).map_or(0, |v| v.id),
                    index: replacement.index,
                });
            }
            match self.linked_ap(ap) {
                Some(outside) => {
                    let order = self
                        .ap(ap)
                        .and_then(|a| a.edge)
                        .and_then(|e| self.edges.get(e))
                        .map_or(BondOrder::Single, |e| e.order);
                    links.push(BoundaryLink {
                        inside: replacement,
                        outside,
                        outside_is_parent: !self.is_source(ap),
                        order,
                    });
                }
                None => projections.push((ap, replacement)),
            }
        }

        let inside: HashSet<VertexKey> = old.iter().copied().collect();
        let crossing: Vec<Ring> = self
            .rings
            .iter()
            .filter(|r| {
                r.vertices().iter().any(|v| inside.contains(v))
                    && r.head().is_some_and(|h| !inside.contains(&h))
                    && r.tail().is_some_and(|t| !inside.contains(&t))
            })
            .cloned()
            .collect();
        self.rings.retain(|r| !crossing.contains(r));

        for &key in old {
            self.remove_vertex(key);
        }
        let map = self.absorb(incoming)?;
        let translate = |ap: ApRef| {
            map.get(&ap.vertex)
                .map(|&k| ApRef::new(k, ap.index))
                .ok_or(GraphError::VertexNotFound(ap.vertex))
        };

        links.sort_by_key(|l| !l.outside_is_parent);
        for link in links {
            let inside = translate(link.inside)?;
            if link.outside_is_parent {
                self.add_edge(link.outside, inside, link.order)?;
            } else {
                self.add_edge(inside, link.outside, link.order)?;
            }
        }
        for (old_ap, new_ap) in projections {
            let new_ap = translate(new_ap)?;
            if let Some(embedding) = self.embedding.as_mut() {
                embedding.update_projection(old_ap, new_ap);
            }
        }

        self.rings.extend(crossing);
        self.refresh_ring_paths();
        Ok(Some(incoming.order.iter().filter_map(|k| map.get(k).copied()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::ids::IdGenerator;
    use crate::core::models::vertex::BuildingBlockType;

    #[test]
    fn interface_aps_are_edges_leaving_the_subgraph() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (g, keys) = linear_graph(&space, &ids, 3);
        let interface = g.interface_aps(&keys[1..3]);
        assert_eq!(interface, vec![ApRef::new(keys[1], 0), ApRef::new(keys[2], 1)]);
        assert_eq!(
            g.subgraph_aps(&keys[3..]),
            vec![ApRef::new(keys[3], 0), ApRef::new(keys[3], 1)]
        );
    }

    #[test]
    fn extract_subgraph_keeps_keys_and_internal_edges() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (g, keys) = linear_graph(&space, &ids, 3);
        let sub = g.extract_subgraph(&keys[1..3]);
        assert_eq!(sub.vertex_count(), 2);
        assert_eq!(sub.edge_count(), 1);
        assert_eq!(sub.parent(keys[2]), Some(keys[1]));
        assert!(sub.ap(ApRef::new(keys[1], 0)).unwrap().is_free());
        assert!(sub.check_consistency().is_ok());
    }

    #[test]
    fn reinserting_an_extracted_subgraph_gives_an_isomorphic_graph() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (mut g, keys) = linear_graph(&space, &ids, 3);
        let before = g.canonical_form();
        let old = keys[1..3].to_vec();
        let sub = g.extract_subgraph(&old);
        let identity: HashMap<ApRef, ApRef> = g
            .interface_aps(&old)
            .into_iter()
            .map(|ap| (ap, ap))
            .collect();
        let added = g.replace_subgraph(&old, &sub, &identity).unwrap().unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.canonical_form(), before);
        assert!(g.check_consistency().is_ok());
    }

    #[test]
    fn replace_subgraph_requires_every_interface_ap() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (mut g, keys) = linear_graph(&space, &ids, 2);
        let sub = g.extract_subgraph(&keys[1..2]);
        let partial = HashMap::from([(ApRef::new(keys[1], 0), ApRef::new(keys[1], 0))]);
        assert_eq!(g.replace_subgraph(&keys[1..2], &sub, &partial), Ok(None));
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn ring_across_the_boundary_is_rerouted() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (mut g, s) = scaffold_graph(&space, &ids, 1);
        let a = attach(&mut g, &space, &ids, ApRef::new(s, 0), LINKER);
        let r1 = attach(&mut g, &space, &ids, ApRef::new(a, 1), RCV);
        let b = attach(&mut g, &space, &ids, ApRef::new(s, 1), LINKER);
        let r2 = attach(&mut g, &space, &ids, ApRef::new(b, 1), RCV);
        g.add_ring(Ring::new(vec![r1, a, s, b, r2], BondOrder::Single));

        let mut donor = Graph::new();
        let d1 = donor.add_vertex(
            space
                .instantiate(BuildingBlockType::Fragment, LINKER, 90)
                .unwrap(),
        );
        let d2 = donor
            .append_vertex_on_ap(
                ApRef::new(d1, 1),
                space
                    .instantiate(BuildingBlockType::Fragment, LINKER, 91)
                    .unwrap(),
                0,
                BondOrder::Single,
            )
            .unwrap();
        let map = HashMap::from([
            (ApRef::new(a, 0), ApRef::new(d1, 0)),
            (ApRef::new(a, 1), ApRef::new(d2, 1)),
        ]);
        let added = g.replace_subgraph(&[a], &donor, &map).unwrap().unwrap();
        assert_eq!(g.rings().len(), 1);
        assert_eq!(g.rings()[0].vertices(), &[r1, added[1], added[0], s, b, r2]);
        assert!(g.check_consistency().is_ok());
    }
}
