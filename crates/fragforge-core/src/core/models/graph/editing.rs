use super::{Graph, GraphError};
use crate::core::library::fragment_space::FragmentSpace;
use crate::core::models::edge::{BondOrder, Edge};
use crate::core::models::ids::{ApRef, EdgeKey, VertexKey};
use crate::core::models::ring::Ring;
use crate::core::models::vertex::{BuildingBlockType, Vertex};
use crate::core::utils::mapping::{MappingSlot, enumerate_mappings};
use std::collections::{BTreeMap, HashSet, VecDeque};

const MAX_WELD_MAPPINGS: usize = 500;

impl Graph {
    /// Returns `true` if chains must stop at `vertex`: scaffolds, and vertices with more than two
    /// neighbours that are not capping groups.
    pub fn is_branch_point(&self, vertex: VertexKey) -> bool {
        self.vertex(vertex).is_some_and(|v| {
            v.kind == BuildingBlockType::Scaffold || self.non_cap_used_ap_count(vertex) > 2
        })
    }

    /// Removes `vertex` and bonds its parent directly to its former children.
    ///
    /// Each child is reattached through a parent AP compatible with the child's AP: the AP that
    /// held `vertex`, or any free AP of the parent. Children that cannot be reattached lose
    /// their whole branch. Among the possible assignments, the one keeping most children that
    /// sit in rings wins, then the one keeping most children.
    ///
    /// # Arguments
    ///
    /// * `vertex` - The vertex to cut out.
    /// * `space` - Library providing AP compatibility and bond orders.
    /// * `symmetry` - Whether to repeat the operation on the symmetric siblings of `vertex`.
    ///
    /// # Return
    ///
    /// Returns `Ok(false)` when no assignment exists or when welding would collapse a
    /// three-membered ring onto a single atom. The graph may already be modified in that case,
    /// so callers work on a clone.
    ///
    /// # Errors
    ///
    /// Returns an error if `vertex` is not in the graph or has no parent.
    pub fn remove_vertex_and_weld(
        &mut self,
        vertex: VertexKey,
        space: &FragmentSpace,
        symmetry: bool,
    ) -> Result<bool, GraphError> {
        if !self.contains_vertex(vertex) {
            return Err(GraphError::VertexNotFound(vertex));
        }
        let targets = if symmetry {
            self.symmetric_siblings(vertex)
        } else {
            vec![vertex]
        };
        for target in targets {
            if !self.remove_single_vertex_and_weld(target, space)? {
                return Ok(false);
            }
        }
        Ok(!self.contains_vertex(vertex) && !self.has_collapsed_ring())
    }

    fn remove_single_vertex_and_weld(
        &mut self,
        vertex: VertexKey,
        space: &FragmentSpace,
    ) -> Result<bool, GraphError> {
        let vertex_id = self
            .vertex(vertex)
            .map(|v| v.id)
            .ok_or(GraphError::VertexNotFound(vertex))?;
        let parent_edge = self
            .parent_edge(vertex)
            .and_then(|e| self.edges.get(e).copied())
            .ok_or(GraphError::NoParentEdge { vertex_id })?;
        self.remove_capping_groups_on(vertex);

        let parent = parent_edge.source.vertex;
        let mut parent_aps = vec![parent_edge.source];
        parent_aps.extend(
            self.vertices[parent]
                .free_ap_indices()
                .into_iter()
                .map(|i| ApRef::new(parent, i)),
        );

        let child_links: Vec<ApRef> = self
            .child_edges(vertex)
            .into_iter()
            .filter_map(|e| self.edges.get(e).map(|edge| edge.target))
            .collect();
        let slots: Vec<MappingSlot<ApRef, ApRef>> = child_links
            .iter()
            .map(|&child_ap| {
                let candidates = match self.ap(child_ap) {
                    Some(trg) => parent_aps
                        .iter()
                        .copied()
                        .filter(|&p| {
                            self.ap(p)
                                .is_some_and(|src| space.is_compatible(&src.class, &trg.class))
                        })
                        .collect(),
                    None => Vec::new(),
                };
                MappingSlot::optional(child_ap, candidates)
            })
            .collect();
        let mappings = enumerate_mappings(&slots, MAX_WELD_MAPPINGS, |m| {
            slots.is_empty() || !m.is_empty()
        });
        let ring_score = |m: &Vec<(ApRef, ApRef)>| {
            m.iter()
                .filter(|(child, _)| self.is_vertex_in_ring(child.vertex))
                .count()
        };
        let Some(best) = mappings
            .iter()
            .max_by_key(|m| (ring_score(m), m.len()))
            .cloned()
        else {
            return Ok(false);
        };

        let saved_rings: Vec<Ring> = self
            .rings
            .iter()
            .filter(|r| r.contains(vertex) && r.head() != Some(vertex) && r.tail() != Some(vertex))
            .cloned()
            .collect();
        self.rings.retain(|r| !saved_rings.contains(r));

        self.remove_vertex(vertex);
        for &(child_ap, parent_ap) in &best {
            let order = self
                .ap(parent_ap)
                .map_or(BondOrder::Single, |a| space.bond_order(&a.class));
            self.add_edge(parent_ap, child_ap, order)?;
        }
        for child_ap in child_links {
            if !best.iter().any(|(c, _)| *c == child_ap) {
                self.remove_branch(child_ap.vertex, false);
            }
        }

        self.rings.extend(saved_rings);
        self.refresh_ring_paths();
        Ok(true)
    }

    /// Returns `true` if a three-membered ring closes two APs sitting on the same atom.
    fn has_collapsed_ring(&self) -> bool {
        self.rings.iter().filter(|r| r.len() == 3).any(|r| {
            let ends: Vec<Option<(VertexKey, usize)>> = [r.head(), r.tail()]
                .into_iter()
                .map(|end| {
                    let edge = self.parent_edge(end?)?;
                    let src = self.edges.get(edge)?.source;
                    Some((src.vertex, self.ap(src)?.source_atom))
                })
                .collect();
            matches!(ends.as_slice(), [Some(a), Some(b)] if a == b)
        })
    }

    /// Replaces `vertex` in place by `replacement`, keeping every edge, ring and symmetric set
    /// it took part in.
    ///
    /// # Arguments
    ///
    /// * `vertex` - The vertex to replace.
    /// * `replacement` - The new vertex, with free APs.
    /// * `ap_map` - AP index on `vertex` to AP index on `replacement`; must cover every used AP.
    ///
    /// # Return
    ///
    /// The key of the new vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if `vertex` is missing, if a used AP is not mapped, or if the map points
    /// to an AP `replacement` does not have.
    pub fn replace_vertex(
        &mut self,
        vertex: VertexKey,
        replacement: Vertex,
        ap_map: &BTreeMap<usize, usize>,
    ) -> Result<VertexKey, GraphError> {
        let old = self
            .vertices
            .get(vertex)
            .ok_or(GraphError::VertexNotFound(vertex))?;
        for index in old.used_ap_indices() {
            if !ap_map.contains_key(&index) {
                return Err(GraphError::IncompleteApMapping {
                    vertex_id: old.id,
                    index,
                });
            }
        }
        for &index in ap_map.values() {
            if replacement.ap(index).is_none() {
                return Err(GraphError::ApNotFound {
                    vertex_id: replacement.id,
                    index,
                });
            }
        }

        let mut links: Vec<(usize, Edge)> = Vec::new();
        for index in old.used_ap_indices() {
            if let Some(edge) = old.aps[index].edge.and_then(|e| self.edges.get(e)) {
                links.push((index, *edge));
            }
        }
        let edge_keys: Vec<EdgeKey> = old.aps.iter().filter_map(|ap| ap.edge).collect();
        for e in edge_keys {
            self.remove_edge(e);
        }

        let position = self.position_of(vertex).unwrap_or(self.order.len());
        let key = self.vertices.insert(replacement);
        self.order.insert(position, key);
        for ring in &mut self.rings {
            ring.replace_vertex(vertex, key);
        }
        for set in &mut self.symmetric_sets {
            set.replace(vertex, key);
        }
        self.remove_vertex(vertex);

        for (index, edge) in links {
            let new_ap = ApRef::new(key, ap_map[&index]);
            if edge.source.vertex == vertex {
                self.add_edge(new_ap, edge.target, edge.order)?;
            } else {
                self.add_edge(edge.source, new_ap, edge.order)?;
            }
        }
        Ok(key)
    }

    /// Splits `edge` by inserting `vertex` between its two ends.
    ///
    /// The former parent bonds to AP `target_on_new` of the new vertex, and AP `source_on_new`
    /// becomes the parent of the former child. Rings running along the edge grow by one member.
    pub fn insert_vertex(
        &mut self,
        edge: EdgeKey,
        vertex: Vertex,
        target_on_new: usize,
        source_on_new: usize,
        space: &FragmentSpace,
    ) -> Result<VertexKey, GraphError> {
        let old = *self.edges.get(edge).ok_or(GraphError::EdgeNotFound(edge))?;
        for index in [target_on_new, source_on_new] {
            if vertex.ap(index).is_none() {
                return Err(GraphError::ApNotFound {
                    vertex_id: vertex.id,
                    index,
                });
            }
        }
        if target_on_new == source_on_new {
            return Err(GraphError::ApInUse {
                vertex_id: vertex.id,
                index: source_on_new,
            });
        }
        let inner_order = vertex
            .ap(source_on_new)
            .map_or(BondOrder::Single, |a| space.bond_order(&a.class));

        self.remove_edge(edge);
        let position = self
            .position_of(old.target.vertex)
            .unwrap_or(self.order.len());
        let key = self.vertices.insert(vertex);
        self.order.insert(position, key);
        self.add_edge(old.source, ApRef::new(key, target_on_new), old.order)?;
        self.add_edge(ApRef::new(key, source_on_new), old.target, inner_order)?;
        self.refresh_ring_paths();
        Ok(key)
    }

    /// Removes the run of non-branching vertices around `vertex`.
    ///
    /// Outside rings, the run extends upwards to the nearest branch point and downwards to the
    /// leaves, and the whole branch it starts is removed. Inside rings, the chain is delimited by
    /// the nearest branch points along the ring where `vertex` sits closest to a ring-closing end;
    /// if that leaves the ring closure in place, the closure becomes a real edge.
    ///
    /// # Return
    ///
    /// Returns `Ok(false)` when the chain cannot be delimited or removing it would empty the
    /// graph.
    pub fn remove_chain_up_to_branching(&mut self, vertex: VertexKey) -> Result<bool, GraphError> {
        if !self.contains_vertex(vertex) {
            return Err(GraphError::VertexNotFound(vertex));
        }
        if self.is_vertex_in_ring(vertex) {
            self.remove_ring_chain(vertex)
        } else {
            Ok(self.remove_open_chain(vertex))
        }
    }

    fn remove_open_chain(&mut self, vertex: VertexKey) -> bool {
        let mut top = vertex;
        while let Some(parent) = self.parent(top) {
            if self.is_branch_point(parent) {
                break;
            }
            top = parent;
        }
        if self.parent(top).is_none() {
            return false;
        }
        self.remove_branch(top, false) && !self.is_empty()
    }

    fn remove_ring_chain(&mut self, vertex: VertexKey) -> Result<bool, GraphError> {
        let Some(frame) = self
            .rings
            .iter()
            .filter(|r| r.contains(vertex))
            .min_by_key(|r| r.distance_to_nearest_end(vertex).unwrap_or(usize::MAX))
            .cloned()
        else {
            return Ok(false);
        };
        let members = frame.vertices().to_vec();
        let n = members.len();
        let Some(pos) = frame.position(vertex) else {
            return Ok(false);
        };

        let branching: Vec<usize> = (0..n)
            .filter(|&i| self.is_branch_point(members[i]))
            .collect();
        let frame_has_branching = members.iter().any(|&m| {
            self.vertex(m)
                .is_some_and(|v| v.kind != BuildingBlockType::Scaffold)
                && self.non_cap_used_ap_count(m) > 2
        });
        if (self.rings.len() == 1 && !frame_has_branching)
            || branching.is_empty()
            || branching.contains(&pos)
        {
            return Ok(false);
        }

        let downstream = (1..n)
            .map(|d| (pos + d) % n)
            .find(|i| branching.contains(i));
        let upstream = (1..n)
            .map(|d| (pos + n - d) % n)
            .find(|i| branching.contains(i));
        let (Some(downstream), Some(upstream)) = (downstream, upstream) else {
            return Ok(false);
        };

        let mut to_remove = Vec::new();
        let mut i = (upstream + 1) % n;
        while i != downstream {
            to_remove.push(members[i]);
            i = (i + 1) % n;
        }
        if to_remove.len() == 2
            && to_remove
                .iter()
                .all(|&k| self.vertex(k).is_some_and(Vertex::is_ring_closing))
        {
            return Ok(false);
        }
        let Some(root) = self.root() else {
            return Ok(false);
        };
        if to_remove.contains(&root) {
            return Ok(false);
        }

        let head = members[0];
        let tail = members[n - 1];
        if !to_remove.contains(&head) && !to_remove.contains(&tail) {
            let head_src = self.parent_source_ap(head)?;
            let tail_src = self.parent_source_ap(tail)?;
            self.remove_vertex(head);
            self.remove_vertex(tail);
            self.add_edge(head_src, tail_src, frame.order())?;
        } else {
            self.rings.retain(|r| r != &frame);
        }

        for &k in &to_remove {
            let caps: Vec<VertexKey> = self
                .children(k)
                .into_iter()
                .filter(|&c| self.vertex(c).is_some_and(|v| v.kind == BuildingBlockType::Cap))
                .collect();
            for c in caps {
                self.remove_vertex(c);
            }
            self.remove_vertex(k);
        }

        if !self.reorient_edges_from(root) {
            return Err(GraphError::Inconsistent {
                graph_id: self.graph_id,
                reason: "chain removal disconnected the graph".into(),
            });
        }
        self.refresh_ring_paths();
        Ok(!self.contains_vertex(vertex) && self.vertex_count() > 1)
    }

    fn parent_source_ap(&self, vertex: VertexKey) -> Result<ApRef, GraphError> {
        self.parent_edge(vertex)
            .and_then(|e| self.edges.get(e))
            .map(|e| e.source)
            .ok_or_else(|| GraphError::NoParentEdge {
                vertex_id: self.vertex(vertex).map_or(0, |v| v.id),
            })
    }

    /// Turns every edge so that it points away from `root`.
    ///
    /// # Return
    ///
    /// Returns `false` if some vertex cannot be reached from `root` through edges.
    pub(crate) fn reorient_edges_from(&mut self, root: VertexKey) -> bool {
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let Some(v) = self.vertices.get(current) else {
                continue;
            };
            let incident: Vec<(usize, EdgeKey)> = v
                .aps
                .iter()
                .enumerate()
                .filter_map(|(i, ap)| ap.edge.map(|e| (i, e)))
                .collect();
            for (index, e) in incident {
                let Some(edge) = self.edges.get_mut(e) else {
                    continue;
                };
                let here = ApRef::new(current, index);
                let Some(there) = edge.other_end(here) else {
                    continue;
                };
                if visited.contains(&there.vertex) {
                    continue;
                }
                if edge.source != here {
                    *edge = Edge::new(here, there, edge.order);
                }
                visited.insert(there.vertex);
                queue.push_back(there.vertex);
            }
        }
        visited.len() == self.vertex_count()
    }

    /// Recomputes the vertex list of every ring as the current tree path between its ends.
    ///
    /// Rings whose ends are gone or whose path is shorter than three vertices are dropped.
    pub(crate) fn refresh_ring_paths(&mut self) {
        let rings = std::mem::take(&mut self.rings);
        for ring in rings {
            let (Some(head), Some(tail)) = (ring.head(), ring.tail()) else {
                continue;
            };
            if let Some(path) = self.path_between(head, tail) {
                if path.len() >= 3 {
                    self.rings.push(Ring::new(path, ring.order()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::ids::IdGenerator;

    mod welding {
        use super::*;

        #[test]
        fn weld_reconnects_parent_and_child() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 3);
            assert!(g.remove_vertex_and_weld(keys[2], &space, false).unwrap());
            assert_eq!(g.vertex_count(), 3);
            assert_eq!(g.parent(keys[3]), Some(keys[1]));
            assert_eq!(g.linked_ap(ApRef::new(keys[1], 1)), Some(ApRef::new(keys[3], 0)));
            assert!(g.check_consistency().is_ok());
        }

        #[test]
        fn weld_requires_a_parent() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 1);
            assert!(matches!(
                g.remove_vertex_and_weld(keys[0], &space, false),
                Err(GraphError::NoParentEdge { .. })
            ));
        }

        #[test]
        fn weld_keeps_ring_through_removed_vertex() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, s) = scaffold_graph(&space, &ids, 1);
            let a = attach(&mut g, &space, &ids, ApRef::new(s, 0), LINKER);
            let b = attach(&mut g, &space, &ids, ApRef::new(a, 1), LINKER);
            let r1 = attach(&mut g, &space, &ids, ApRef::new(b, 1), RCV);
            let c = attach(&mut g, &space, &ids, ApRef::new(s, 1), LINKER);
            let r2 = attach(&mut g, &space, &ids, ApRef::new(c, 1), RCV);
            g.add_ring(Ring::new(vec![r1, b, a, s, c, r2], BondOrder::Single));

            assert!(g.remove_vertex_and_weld(b, &space, false).unwrap());
            assert_eq!(g.rings().len(), 1);
            assert_eq!(g.rings()[0].vertices(), &[r1, a, s, c, r2]);
            assert!(g.check_consistency().is_ok());
        }
    }

    mod replacing {
        use super::*;

        #[test]
        fn replace_vertex_keeps_edges_and_position() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 2);
            let branch = space
                .instantiate(BuildingBlockType::Fragment, BRANCH, ids.next_vertex_id())
                .unwrap();
            let map = BTreeMap::from([(0, 0), (1, 1)]);
            let new = g.replace_vertex(keys[1], branch, &map).unwrap();
            assert!(!g.contains_vertex(keys[1]));
            assert_eq!(g.position_of(new), Some(1));
            assert_eq!(g.parent(new), Some(keys[0]));
            assert_eq!(g.children(new), vec![keys[2]]);
            assert!(g.ap(ApRef::new(new, 2)).unwrap().is_free());
            assert!(g.check_consistency().is_ok());
        }

        #[test]
        fn replace_vertex_rejects_incomplete_mapping() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 2);
            let end = space
                .instantiate(BuildingBlockType::Fragment, END, ids.next_vertex_id())
                .unwrap();
            let map = BTreeMap::from([(0, 0)]);
            assert!(matches!(
                g.replace_vertex(keys[1], end, &map),
                Err(GraphError::IncompleteApMapping { index: 1, .. })
            ));
        }

        #[test]
        fn insert_vertex_splits_edge() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 1);
            let edge = g.parent_edge(keys[1]).unwrap();
            let linker = space
                .instantiate(BuildingBlockType::Fragment, LINKER, ids.next_vertex_id())
                .unwrap();
            let new = g.insert_vertex(edge, linker, 0, 1, &space).unwrap();
            assert_eq!(g.vertex_keys(), &[keys[0], new, keys[1]]);
            assert_eq!(g.parent(keys[1]), Some(new));
            assert_eq!(g.parent(new), Some(keys[0]));
            assert!(g.check_consistency().is_ok());
        }
    }

    mod chains {
        use super::*;
        use crate::core::models::graph::test_utils::linear_chain;

        #[test]
        fn open_chain_is_removed_down_to_the_leaves() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, keys) = linear_graph(&space, &ids, 3);
            assert!(g.remove_chain_up_to_branching(keys[1]).unwrap());
            assert_eq!(g.vertex_keys(), &[keys[0]]);
        }

        #[test]
        fn open_chain_refuses_to_empty_the_graph() {
            let (mut g, keys) = linear_chain(3);
            g.vertex_mut(keys[0]).unwrap().kind = BuildingBlockType::Fragment;
            assert!(!g.remove_chain_up_to_branching(keys[1]).unwrap());
            assert_eq!(g.vertex_count(), 3);
        }

        /// `di -> branch`, with `branch.1 -> a -> r1` and `branch.2 -> b -> c`, where `c` is a
        /// branch carrying `r2` and an `end`. Ring: `r1 a branch b c r2`.
        fn ring_with_two_branch_points() -> (Graph, FragmentSpace, Vec<VertexKey>) {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, s) = scaffold_graph(&space, &ids, 1);
            let hub = attach(&mut g, &space, &ids, ApRef::new(s, 0), BRANCH);
            let a = attach(&mut g, &space, &ids, ApRef::new(hub, 1), LINKER);
            let r1 = attach(&mut g, &space, &ids, ApRef::new(a, 1), RCV);
            let b = attach(&mut g, &space, &ids, ApRef::new(hub, 2), LINKER);
            let c = attach(&mut g, &space, &ids, ApRef::new(b, 1), BRANCH);
            let r2 = attach(&mut g, &space, &ids, ApRef::new(c, 1), RCV);
            let e = attach(&mut g, &space, &ids, ApRef::new(c, 2), END);
            g.add_ring(Ring::new(vec![r1, a, hub, b, c, r2], BondOrder::Single));
            (g, space, vec![s, hub, a, r1, b, c, r2, e])
        }

        #[test]
        fn ring_chain_turns_closure_into_edge() {
            let (mut g, _space, k) = ring_with_two_branch_points();
            let (s, hub, a, r1, b, c, r2, e) = (k[0], k[1], k[2], k[3], k[4], k[5], k[6], k[7]);
            assert!(g.remove_chain_up_to_branching(b).unwrap());
            for gone in [b, r1, r2] {
                assert!(!g.contains_vertex(gone));
            }
            assert_eq!(g.vertex_count(), 5);
            assert!(g.rings().is_empty());
            assert_eq!(g.root(), Some(s));
            assert_eq!(g.parent(c), Some(a));
            assert_eq!(g.parent(e), Some(c));
            assert_eq!(g.parent(a), Some(hub));
            assert!(g.check_consistency().is_ok());
        }

        #[test]
        fn single_ring_without_branching_is_left_alone() {
            let space = test_library();
            let ids = IdGenerator::new();
            let (mut g, s) = scaffold_graph(&space, &ids, 1);
            let a = attach(&mut g, &space, &ids, ApRef::new(s, 0), LINKER);
            let r1 = attach(&mut g, &space, &ids, ApRef::new(a, 1), RCV);
            let b = attach(&mut g, &space, &ids, ApRef::new(s, 1), LINKER);
            let r2 = attach(&mut g, &space, &ids, ApRef::new(b, 1), RCV);
            g.add_ring(Ring::new(vec![r1, a, s, b, r2], BondOrder::Single));
            assert!(!g.remove_chain_up_to_branching(a).unwrap());
            assert_eq!(g.vertex_count(), 5);
        }
    }
}
