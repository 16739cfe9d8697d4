//! # Library Module
//!
//! This module provides the building-block library every graph operation consults: the
//! fragment space and the archive of ring-closing chains.
//!
//! ## Overview
//!
//! The library answers the questions the evolutionary operators keep asking:
//!
//! - **Which blocks exist** - Scaffolds to grow from, fragments to attach, capping groups
//! - **What may bond** - The compatibility matrix between attachment-point classes
//! - **What may close a ring** - Ring-closure compatibility between classes
//! - **What saturates a free AP** - The capping map and the classes that must never stay free
//!
//! ## Key Components
//!
//! - [`fragment_space`] - TOML-loaded building blocks and connection rules
//! - [`ring_closures`] - Closable chains indexed by their turning-point block

pub mod fragment_space;
pub mod ring_closures;

#[cfg(test)]
pub(crate) mod test_utils {
    use super::fragment_space::FragmentSpace;
    use crate::core::models::edge::BondOrder;
    use crate::core::models::graph::Graph;
    use crate::core::models::ids::{ApRef, IdGenerator, VertexKey};
    use crate::core::models::symmetry::SymmetricSet;
    use crate::core::models::vertex::BuildingBlockType;

    pub const TEST_LIBRARY: &str = r#"
        forbidden-ends = ["X:0"]

        [[scaffolds]]
        name = "tri"
        heavy-atoms = 6
        attachment-points = [{ class = "A:0" }, { class = "A:0" }, { class = "A:0" }]
        symmetric-aps = [[0, 1, 2]]

        [[scaffolds]]
        name = "di"
        heavy-atoms = 4
        attachment-points = [{ class = "A:0" }, { class = "A:0" }]

        [[fragments]]
        name = "linker"
        heavy-atoms = 2
        fitness = 1.0
        attachment-points = [{ class = "A:1" }, { class = "A:0" }]

        [[fragments]]
        name = "end"
        fitness = 0.5
        attachment-points = [{ class = "A:1" }]

        [[fragments]]
        name = "branch"
        heavy-atoms = 3
        fitness = 2.0
        attachment-points = [{ class = "A:1" }, { class = "A:0" }, { class = "A:0" }]
        symmetric-aps = [[1, 2]]

        [[fragments]]
        name = "rcv"
        heavy-atoms = 0
        ring-closing = true
        attachment-points = [{ class = "A:1" }]

        [[caps]]
        name = "H"
        heavy-atoms = 0
        attachment-points = [{ class = "H:0" }]

        [compatibility]
        "A:0" = ["A:1"]

        [ring-closures]
        "A:0" = ["A:0"]

        [capping]
        "A:0" = "H:0"

        [bond-orders]
        D = "double"
    "#;

    pub const LINKER: usize = 0;
    pub const END: usize = 1;
    pub const BRANCH: usize = 2;
    pub const RCV: usize = 3;

    pub fn test_library() -> FragmentSpace {
        FragmentSpace::parse(TEST_LIBRARY, "test-library").unwrap()
    }

    /// Attaches a fresh fragment `bb` (through its AP 0) on `source`.
    pub fn attach(
        graph: &mut Graph,
        space: &FragmentSpace,
        ids: &IdGenerator,
        source: ApRef,
        bb: usize,
    ) -> VertexKey {
        let v = space
            .instantiate(BuildingBlockType::Fragment, bb, ids.next_vertex_id())
            .unwrap();
        graph
            .append_vertex_on_ap(source, v, 0, BondOrder::Single)
            .unwrap()
    }

    pub fn scaffold_graph(space: &FragmentSpace, ids: &IdGenerator, scaffold: usize) -> (Graph, VertexKey) {
        let mut g = Graph::with_id(ids.next_graph_id());
        let s = g.add_vertex(
            space
                .instantiate(BuildingBlockType::Scaffold, scaffold, ids.next_vertex_id())
                .unwrap(),
        );
        (g, s)
    }

    /// `di` scaffold followed by `n` linkers on its AP 0: `[scaffold, l1, ..., ln]`.
    pub fn linear_graph(space: &FragmentSpace, ids: &IdGenerator, n: usize) -> (Graph, Vec<VertexKey>) {
        let (mut g, s) = scaffold_graph(space, ids, 1);
        let mut keys = vec![s];
        let mut source = ApRef::new(s, 0);
        for _ in 0..n {
            let k = attach(&mut g, space, ids, source, LINKER);
            keys.push(k);
            source = ApRef::new(k, 1);
        }
        (g, keys)
    }

    /// `tri` scaffold with an `end` on each AP, the three ends forming a symmetric set.
    pub fn symmetric_graph(space: &FragmentSpace, ids: &IdGenerator) -> (Graph, Vec<VertexKey>) {
        let (mut g, s) = scaffold_graph(space, ids, 0);
        let mut keys = vec![s];
        for i in 0..3 {
            keys.push(attach(&mut g, space, ids, ApRef::new(s, i), END));
        }
        g.add_symmetric_set(SymmetricSet::new(keys[1..].to_vec()));
        (g, keys)
    }
}
