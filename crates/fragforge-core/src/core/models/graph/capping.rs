use super::{Graph, GraphError};
use crate::core::library::fragment_space::FragmentSpace;
use crate::core::models::ids::{ApRef, IdGenerator, VertexKey};
use crate::core::models::vertex::BuildingBlockType;

impl Graph {
    /// Saturates every free AP that has a capping group in the library.
    ///
    /// # Return
    ///
    /// The number of capping groups added.
    pub fn add_capping_groups(
        &mut self,
        space: &FragmentSpace,
        ids: &IdGenerator,
    ) -> Result<usize, GraphError> {
        let targets = self.order.clone();
        self.add_capping_groups_on(&targets, space, ids)
    }

    /// Saturates the free APs of `vertices` that have a capping group in the library.
    pub fn add_capping_groups_on(
        &mut self,
        vertices: &[VertexKey],
        space: &FragmentSpace,
        ids: &IdGenerator,
    ) -> Result<usize, GraphError> {
        let mut added = 0;
        for &key in vertices {
            let Some(v) = self.vertex(key) else {
                continue;
            };
            if v.kind == BuildingBlockType::Cap {
                continue;
            }
            let free: Vec<(usize, _)> = v
                .free_ap_indices()
                .into_iter()
                .filter_map(|i| space.capping_group_for(&v.aps[i].class).map(|cap| (i, cap)))
                .collect();
            for (index, cap) in free {
                let Some(vertex) =
                    space.instantiate(BuildingBlockType::Cap, cap.building_block, ids.next_vertex_id())
                else {
                    continue;
                };
                let source = ApRef::new(key, index);
                let order = self
                    .ap(source)
                    .map(|a| space.bond_order(&a.class))
                    .unwrap_or_default();
                self.append_vertex_on_ap(source, vertex, cap.ap_index, order)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes the capping groups hanging from `vertex`, freeing its APs.
    pub fn remove_capping_groups_on(&mut self, vertex: VertexKey) -> usize {
        let caps: Vec<VertexKey> = self
            .children(vertex)
            .into_iter()
            .filter(|&c| self.vertex(c).is_some_and(|v| v.kind == BuildingBlockType::Cap))
            .collect();
        for &c in &caps {
            self.remove_vertex(c);
        }
        caps.len()
    }

    /// Removes every capping group in the graph.
    pub fn remove_capping_groups(&mut self) -> usize {
        let caps: Vec<VertexKey> = self
            .vertices()
            .filter(|(_, v)| v.kind == BuildingBlockType::Cap)
            .map(|(k, _)| k)
            .collect();
        for &c in &caps {
            self.remove_vertex(c);
        }
        caps.len()
    }

    /// Returns `true` if a free AP of a class that must never stay free is left.
    pub fn has_forbidden_end(&self, space: &FragmentSpace) -> bool {
        self.free_aps().into_iter().any(|ap| {
            self.ap(ap).is_some_and(|a| space.is_forbidden_end(&a.class))
                && !self.embedding.as_ref().is_some_and(|e| e.is_projected(ap))
        })
    }

    /// Removes ring-closing vertices that did not end up closing a ring.
    pub fn remove_unused_ring_closing_vertices(&mut self) -> usize {
        let unused: Vec<VertexKey> = self
            .vertices()
            .filter(|&(k, v)| v.ring_closing && !self.is_vertex_in_ring(k))
            .map(|(k, _)| k)
            .collect();
        for &k in &unused {
            self.remove_branch(k, false);
        }
        unused.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::edge::BondOrder;
    use crate::core::models::ring::Ring;

    #[test]
    fn capping_fills_every_cappable_free_ap() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (mut g, keys) = linear_graph(&space, &ids, 2);
        assert_eq!(g.add_capping_groups(&space, &ids).unwrap(), 2);
        assert!(g.free_aps().is_empty());
        assert!(g.is_capped(ApRef::new(keys[2], 1)));
        assert!(g.check_consistency().is_ok());

        assert_eq!(g.remove_capping_groups_on(keys[2]), 1);
        assert_eq!(g.remove_capping_groups(), 1);
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn unused_ring_closing_vertices_are_removed() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (mut g, s) = scaffold_graph(&space, &ids, 1);
        let a = attach(&mut g, &space, &ids, ApRef::new(s, 0), RCV);
        let b = attach(&mut g, &space, &ids, ApRef::new(s, 1), LINKER);
        let c = attach(&mut g, &space, &ids, ApRef::new(b, 1), RCV);
        assert_eq!(g.remove_unused_ring_closing_vertices(), 2);
        assert!(!g.contains_vertex(a));
        assert!(!g.contains_vertex(c));

        let r = attach(&mut g, &space, &ids, ApRef::new(b, 1), RCV);
        let q = attach(&mut g, &space, &ids, ApRef::new(s, 0), RCV);
        g.add_ring(Ring::new(vec![r, b, s, q], BondOrder::Single));
        assert_eq!(g.remove_unused_ring_closing_vertices(), 0);
    }

    #[test]
    fn forbidden_free_end_is_detected() {
        let space = FragmentSpace::parse(
            &TEST_LIBRARY.replace(r#"forbidden-ends = ["X:0"]"#, r#"forbidden-ends = ["A:0"]"#),
            "inline",
        )
        .unwrap();
        let ids = IdGenerator::new();
        let (g, _) = linear_graph(&space, &ids, 1);
        assert!(g.has_forbidden_end(&space));
    }
}
