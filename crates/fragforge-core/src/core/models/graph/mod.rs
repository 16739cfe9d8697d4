use super::attachment_point::AttachmentPoint;
use super::edge::{BondOrder, Edge};
use super::ids::{ApRef, EdgeKey, IdGenerator, VertexKey};
use super::ring::{ClosableChain, Ring};
use super::symmetry::SymmetricSet;
use super::template::Embedding;
use super::vertex::{BuildingBlockType, MutationType, Vertex};
use itertools::Itertools;
use slotmap::SlotMap;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

mod canonical;
mod capping;
mod editing;
mod subgraph;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Vertex {0:?} is not part of the graph")]
    VertexNotFound(VertexKey),

    #[error("Attachment point {index} does not exist on vertex {vertex_id}")]
    ApNotFound { vertex_id: u64, index: usize },

    #[error("Attachment point {index} on vertex {vertex_id} is already in use")]
    ApInUse { vertex_id: u64, index: usize },

    #[error("Edge {0:?} is not part of the graph")]
    EdgeNotFound(EdgeKey),

    #[error("Vertex {vertex_id} has no parent edge")]
    NoParentEdge { vertex_id: u64 },

    #[error("Used attachment point {index} of vertex {vertex_id} has no counterpart in the mapping")]
    IncompleteApMapping { vertex_id: u64, index: usize },

    #[error("Duplicate vertex id {0}")]
    DuplicateVertexId(u64),

    #[error("Inconsistent graph {graph_id}: {reason}")]
    Inconsistent { graph_id: u64, reason: String },
}

/// A graph of building blocks connected through attachment points.
///
/// Vertices and edges live in slot-map arenas, so every cross reference (AP to edge, edge to
/// AP, ring to vertex, symmetric set to vertex) is a key. Keys survive `Clone`: a key taken
/// from a graph addresses the same element in any clone of it.
///
/// Edges form a spanning tree directed from parent to child. Rings and symmetric sets are
/// annotations on top of the tree.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: SlotMap<VertexKey, Vertex>,
    order: Vec<VertexKey>,
    edges: SlotMap<EdgeKey, Edge>,
    rings: Vec<Ring>,
    symmetric_sets: Vec<SymmetricSet>,
    closable_chains: Vec<ClosableChain>,
    embedding: Option<Embedding>,
    graph_id: u64,
    annotation: String,
}

impl Graph {
    /// Creates a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(graph_id: u64) -> Self {
        Self {
            graph_id,
            ..Self::default()
        }
    }

    pub fn graph_id(&self) -> u64 {
        self.graph_id
    }

    pub fn set_graph_id(&mut self, graph_id: u64) {
        self.graph_id = graph_id;
    }

    /// Free-text provenance of this graph (how it was built or edited).
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub fn set_annotation(&mut self, annotation: impl Into<String>) {
        self.annotation = annotation.into();
    }

    pub fn append_annotation(&mut self, text: &str) {
        self.annotation.push_str(text);
    }

    pub fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }

    pub(crate) fn embedding_mut(&mut self) -> Option<&mut Embedding> {
        self.embedding.as_mut()
    }

    pub fn set_embedding(&mut self, embedding: Option<Embedding>) {
        self.embedding = embedding;
    }

    pub fn closable_chains(&self) -> &[ClosableChain] {
        &self.closable_chains
    }

    pub fn set_closable_chains(&mut self, chains: Vec<ClosableChain>) {
        self.closable_chains = chains;
    }

    pub fn vertex_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains_vertex(&self, key: VertexKey) -> bool {
        self.vertices.contains_key(key)
    }

    /// Retrieves an immutable reference to a vertex by its key.
    ///
    /// # Arguments
    ///
    /// * `key` - The vertex key to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(&Vertex)` if the vertex exists, otherwise `None`.
    pub fn vertex(&self, key: VertexKey) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    /// Retrieves a mutable reference to a vertex by its key.
    ///
    /// # Arguments
    ///
    /// * `key` - The vertex key to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(&mut Vertex)` if the vertex exists, otherwise `None`.
    pub fn vertex_mut(&mut self, key: VertexKey) -> Option<&mut Vertex> {
        self.vertices.get_mut(key)
    }

    /// Keys of all vertices in insertion order.
    pub fn vertex_keys(&self) -> &[VertexKey] {
        &self.order
    }

    /// Returns an iterator over all vertices in insertion order.
    ///
    /// # Return
    ///
    /// An iterator yielding `(VertexKey, &Vertex)` pairs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &Vertex)> + '_ {
        self.order
            .iter()
            .filter_map(|&k| self.vertices.get(k).map(|v| (k, v)))
    }

    pub fn position_of(&self, key: VertexKey) -> Option<usize> {
        self.order.iter().position(|&k| k == key)
    }

    /// Finds a vertex by its numeric id.
    ///
    /// # Arguments
    ///
    /// * `id` - The graph-local vertex id.
    ///
    /// # Return
    ///
    /// Returns `Some(VertexKey)` if a vertex carries that id, otherwise `None`.
    pub fn vertex_by_id(&self, id: u64) -> Option<VertexKey> {
        self.vertices().find(|(_, v)| v.id == id).map(|(k, _)| k)
    }

    /// The vertex every other vertex descends from.
    pub fn root(&self) -> Option<VertexKey> {
        self.order
            .iter()
            .copied()
            .find(|&k| self.parent_edge(k).is_none())
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &Edge)> + '_ {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn ap(&self, ap: ApRef) -> Option<&AttachmentPoint> {
        self.vertices.get(ap.vertex).and_then(|v| v.ap(ap.index))
    }

    pub(crate) fn require_ap(&self, ap: ApRef) -> Result<&AttachmentPoint, GraphError> {
        let vertex = self
            .vertices
            .get(ap.vertex)
            .ok_or(GraphError::VertexNotFound(ap.vertex))?;
        vertex.ap(ap.index).ok_or(GraphError::ApNotFound {
            vertex_id: vertex.id,
            index: ap.index,
        })
    }

    /// Returns the AP at the other end of the edge using `ap`.
    pub fn linked_ap(&self, ap: ApRef) -> Option<ApRef> {
        let edge = self.ap(ap)?.edge?;
        self.edges.get(edge)?.other_end(ap)
    }

    /// Returns `true` if `ap` is the source end of its edge.
    pub fn is_source(&self, ap: ApRef) -> bool {
        self.ap(ap)
            .and_then(|a| a.edge)
            .and_then(|e| self.edges.get(e))
            .is_some_and(|e| e.source == ap)
    }

    /// Returns `true` if `ap` is used by an edge leading to a capping group.
    pub fn is_capped(&self, ap: ApRef) -> bool {
        self.linked_ap(ap)
            .and_then(|other| self.vertex(other.vertex))
            .is_some_and(|v| v.kind == BuildingBlockType::Cap)
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexKey {
        let key = self.vertices.insert(vertex);
        self.order.push(key);
        key
    }

    /// Connects two free attachment points with a new parent-to-child edge.
    ///
    /// # Arguments
    ///
    /// * `source` - AP on the parent vertex.
    /// * `target` - AP on the child vertex.
    /// * `order` - Bond order carried by the edge.
    ///
    /// # Errors
    ///
    /// Returns an error if either AP does not exist, is already used, or both belong to the
    /// same vertex.
    pub fn add_edge(
        &mut self,
        source: ApRef,
        target: ApRef,
        order: BondOrder,
    ) -> Result<EdgeKey, GraphError> {
        for ap in [source, target] {
            let found = self.require_ap(ap)?;
            if found.is_used() {
                return Err(GraphError::ApInUse {
                    vertex_id: self.vertices[ap.vertex].id,
                    index: ap.index,
                });
            }
        }
        if source.vertex == target.vertex {
            return Err(GraphError::Inconsistent {
                graph_id: self.graph_id,
                reason: format!(
                    "edge would loop on vertex {}",
                    self.vertices[source.vertex].id
                ),
            });
        }
        let key = self.edges.insert(Edge::new(source, target, order));
        self.set_ap_edge(source, Some(key));
        self.set_ap_edge(target, Some(key));
        Ok(key)
    }

    /// Removes an edge and frees both of its attachment points.
    pub fn remove_edge(&mut self, key: EdgeKey) -> Option<Edge> {
        let edge = self.edges.remove(key)?;
        for ap in [edge.source, edge.target] {
            if self.ap(ap).and_then(|a| a.edge) == Some(key) {
                self.set_ap_edge(ap, None);
            }
        }
        Some(edge)
    }

    fn set_ap_edge(&mut self, ap: ApRef, edge: Option<EdgeKey>) {
        if let Some(found) = self
            .vertices
            .get_mut(ap.vertex)
            .and_then(|v| v.ap_mut(ap.index))
        {
            found.edge = edge;
        }
    }

    /// Adds `vertex` as a child of the AP `source`, linking it through its AP `target_ap`.
    pub fn append_vertex_on_ap(
        &mut self,
        source: ApRef,
        vertex: Vertex,
        target_ap: usize,
        order: BondOrder,
    ) -> Result<VertexKey, GraphError> {
        if vertex.ap(target_ap).is_none() {
            return Err(GraphError::ApNotFound {
                vertex_id: vertex.id,
                index: target_ap,
            });
        }
        if self.require_ap(source)?.is_used() {
            return Err(GraphError::ApInUse {
                vertex_id: self.vertices[source.vertex].id,
                index: source.index,
            });
        }
        let key = self.add_vertex(vertex);
        self.add_edge(source, ApRef::new(key, target_ap), order)?;
        Ok(key)
    }

    pub fn parent_edge(&self, vertex: VertexKey) -> Option<EdgeKey> {
        let v = self.vertices.get(vertex)?;
        v.aps
            .iter()
            .filter_map(|ap| ap.edge)
            .find(|&e| self.edges.get(e).is_some_and(|edge| edge.target.vertex == vertex))
    }

    pub fn parent(&self, vertex: VertexKey) -> Option<VertexKey> {
        self.parent_edge(vertex)
            .and_then(|e| self.edges.get(e))
            .map(|e| e.source.vertex)
    }

    /// Edges leading to the children of `vertex`, in the order of the APs they start from.
    pub fn child_edges(&self, vertex: VertexKey) -> Vec<EdgeKey> {
        let Some(v) = self.vertices.get(vertex) else {
            return Vec::new();
        };
        v.aps
            .iter()
            .filter_map(|ap| ap.edge)
            .filter(|&e| self.edges.get(e).is_some_and(|edge| edge.source.vertex == vertex))
            .collect()
    }

    pub fn children(&self, vertex: VertexKey) -> Vec<VertexKey> {
        self.child_edges(vertex)
            .into_iter()
            .filter_map(|e| self.edges.get(e).map(|edge| edge.target.vertex))
            .collect()
    }

    fn ancestry(&self, vertex: VertexKey) -> Vec<VertexKey> {
        let mut chain = vec![vertex];
        let mut current = vertex;
        while let Some(parent) = self.parent(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Depth of a vertex in the spanning tree.
    ///
    /// The root sits at level -1, so its direct children are at level 0.
    pub fn level(&self, vertex: VertexKey) -> Option<i32> {
        if !self.contains_vertex(vertex) {
            return None;
        }
        Some(self.ancestry(vertex).len() as i32 - 2)
    }

    /// All descendants of `vertex` (the vertex itself excluded), depth first.
    pub fn child_tree(&self, vertex: VertexKey) -> Vec<VertexKey> {
        let mut out = Vec::new();
        let mut stack: Vec<VertexKey> = self.children(vertex).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            if out.contains(&current) || current == vertex {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    /// The vertex followed by all its descendants.
    pub fn branch(&self, vertex: VertexKey) -> Vec<VertexKey> {
        let mut out = vec![vertex];
        out.extend(self.child_tree(vertex));
        out
    }

    /// Vertices on the tree path from `a` to `b`, both ends included.
    pub fn path_between(&self, a: VertexKey, b: VertexKey) -> Option<Vec<VertexKey>> {
        if !self.contains_vertex(a) || !self.contains_vertex(b) {
            return None;
        }
        let up_a = self.ancestry(a);
        let up_b = self.ancestry(b);
        let lca_in_a = up_a.iter().position(|v| up_b.contains(v))?;
        let lca = up_a[lca_in_a];
        let lca_in_b = up_b.iter().position(|&v| v == lca)?;
        let mut path = up_a[..=lca_in_a].to_vec();
        path.extend(up_b[..lca_in_b].iter().rev());
        Some(path)
    }

    /// Removes a vertex together with its edges and the rings that involve it.
    ///
    /// Symmetric sets are repaired: a set that would drop below two members is removed.
    pub fn remove_vertex(&mut self, vertex: VertexKey) -> Option<Vertex> {
        if !self.vertices.contains_key(vertex) {
            return None;
        }
        self.rings.retain(|r| !r.contains(vertex));
        let edge_keys: Vec<EdgeKey> = self.vertices[vertex]
            .aps
            .iter()
            .filter_map(|ap| ap.edge)
            .collect();
        for e in edge_keys {
            self.remove_edge(e);
        }
        self.symmetric_sets.retain_mut(|set| {
            if set.contains(vertex) {
                if set.len() < 3 {
                    return false;
                }
                set.remove(vertex);
            }
            true
        });
        self.order.retain(|&k| k != vertex);
        self.vertices.remove(vertex)
    }

    /// Removes the branch rooted at `vertex`, optionally on all its symmetric siblings too.
    ///
    /// # Return
    ///
    /// Returns `true` if `vertex` is no longer part of the graph.
    pub fn remove_branch(&mut self, vertex: VertexKey, symmetry: bool) -> bool {
        let starts = if symmetry {
            self.symmetric_siblings(vertex)
        } else {
            vec![vertex]
        };
        for start in starts {
            if !self.contains_vertex(start) {
                continue;
            }
            if let Some(e) = self.parent_edge(start) {
                self.remove_edge(e);
            }
            for descendant in self.child_tree(start) {
                self.remove_vertex(descendant);
            }
            self.remove_vertex(start);
        }
        !self.contains_vertex(vertex)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn add_ring(&mut self, ring: Ring) {
        self.rings.push(ring);
    }

    pub(crate) fn rings_mut(&mut self) -> &mut Vec<Ring> {
        &mut self.rings
    }

    pub fn rings_involving(&self, vertex: VertexKey) -> Vec<&Ring> {
        self.rings.iter().filter(|r| r.contains(vertex)).collect()
    }

    pub fn is_vertex_in_ring(&self, vertex: VertexKey) -> bool {
        self.rings.iter().any(|r| r.contains(vertex))
    }

    pub fn symmetric_sets(&self) -> &[SymmetricSet] {
        &self.symmetric_sets
    }

    /// Declares a set of vertices symmetric.
    ///
    /// Members are taken out of any set they already belonged to; sets left with fewer than two
    /// members disappear. Sets smaller than two are ignored.
    pub fn add_symmetric_set(&mut self, set: SymmetricSet) {
        let members: Vec<VertexKey> = set
            .members()
            .iter()
            .copied()
            .filter(|&v| self.contains_vertex(v))
            .collect();
        if members.len() < 2 {
            return;
        }
        for existing in &mut self.symmetric_sets {
            for &m in &members {
                existing.remove(m);
            }
        }
        self.symmetric_sets.retain(|s| s.len() > 1);
        self.symmetric_sets.push(SymmetricSet::new(members));
    }

    pub(crate) fn symmetric_sets_mut(&mut self) -> &mut Vec<SymmetricSet> {
        &mut self.symmetric_sets
    }

    pub fn symmetric_set_of(&self, vertex: VertexKey) -> Option<&SymmetricSet> {
        self.symmetric_sets.iter().find(|s| s.contains(vertex))
    }

    pub fn has_symmetry_involving(&self, vertex: VertexKey) -> bool {
        self.symmetric_set_of(vertex).is_some()
    }

    /// Members of the symmetric set of `vertex`, or just `vertex` when it has none.
    pub fn symmetric_siblings(&self, vertex: VertexKey) -> Vec<VertexKey> {
        match self.symmetric_set_of(vertex) {
            Some(set) => set.members().to_vec(),
            None => vec![vertex],
        }
    }

    /// Number of used APs sharing the source atom of `ap` that do not lead to a capping group.
    pub fn crowdedness(&self, ap: ApRef) -> usize {
        let Some(vertex) = self.vertex(ap.vertex) else {
            return 0;
        };
        let Some(target) = vertex.ap(ap.index) else {
            return 0;
        };
        (0..vertex.aps.len())
            .filter(|&i| {
                let other = &vertex.aps[i];
                other.source_atom == target.source_atom
                    && other.is_used()
                    && !self.is_capped(ApRef::new(ap.vertex, i))
            })
            .count()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.vertices().map(|(_, v)| v.heavy_atoms).sum()
    }

    pub fn max_vertex_id(&self) -> u64 {
        self.vertices().map(|(_, v)| v.id).max().unwrap_or(0)
    }

    /// Gives every vertex a fresh id from `ids`.
    pub fn renumber_vertices(&mut self, ids: &IdGenerator) {
        for &key in &self.order {
            if let Some(v) = self.vertices.get_mut(key) {
                v.id = ids.next_vertex_id();
            }
        }
    }

    /// All free APs, in vertex order then AP order.
    pub fn free_aps(&self) -> Vec<ApRef> {
        self.vertices()
            .flat_map(|(k, v)| {
                v.free_ap_indices()
                    .into_iter()
                    .map(move |i| ApRef::new(k, i))
            })
            .collect()
    }

    pub fn capped_ap_count(&self, vertex: VertexKey) -> usize {
        self.vertex(vertex).map_or(0, |v| {
            (0..v.aps.len())
                .filter(|&i| self.is_capped(ApRef::new(vertex, i)))
                .count()
        })
    }

    /// Number of used APs on `vertex` whose edge does not lead to a capping group.
    pub fn non_cap_used_ap_count(&self, vertex: VertexKey) -> usize {
        self.vertex(vertex).map_or(0, |v| {
            v.used_ap_indices().len() - self.capped_ap_count(vertex)
        })
    }

    /// Mutation types that can legally be applied at `vertex`.
    ///
    /// Starts from the vertex's allowed types and removes the ones its position in the graph
    /// rules out, then the globally `excluded` ones.
    pub fn mutation_types(&self, vertex: VertexKey, excluded: &[MutationType]) -> Vec<MutationType> {
        let Some(v) = self.vertex(vertex) else {
            return Vec::new();
        };
        let mut types = v.allowed_mutations.clone();
        let remove = |types: &mut Vec<MutationType>, t: MutationType| types.retain(|&x| x != t);

        if self.children(vertex).is_empty() {
            remove(&mut types, MutationType::AddLink);
            remove(&mut types, MutationType::ChangeLink);
        }
        let free = v.free_ap_indices().len();
        let capped = self.capped_ap_count(vertex);
        if free + capped == 0 {
            remove(&mut types, MutationType::Extend);
        }
        if self.vertex_count() <= 1 {
            remove(&mut types, MutationType::Delete);
        }
        if self.non_cap_used_ap_count(vertex) > 2 {
            remove(&mut types, MutationType::DeleteChain);
        }
        if v.aps.len() - free < 2 {
            remove(&mut types, MutationType::DeleteLink);
        }
        if v.kind == BuildingBlockType::Scaffold {
            for t in [
                MutationType::DeleteChain,
                MutationType::DeleteLink,
                MutationType::ChangeLink,
                MutationType::ChangeBranch,
                MutationType::Delete,
            ] {
                remove(&mut types, t);
            }
        }
        types.retain(|t| !excluded.contains(t));
        types
    }

    /// Vertices where at least one mutation type applies. Capping groups are never sites.
    pub fn mutable_sites(&self, excluded: &[MutationType]) -> Vec<VertexKey> {
        self.vertices()
            .filter(|(_, v)| v.kind != BuildingBlockType::Cap)
            .map(|(k, _)| k)
            .filter(|&k| !self.mutation_types(k, excluded).is_empty())
            .collect()
    }

    /// Follows a path of template vertices down to an embedded graph.
    pub fn inner_graph_at(&self, path: &[VertexKey]) -> Option<&Graph> {
        let mut current = self;
        for &key in path {
            current = current.vertex(key)?.inner_graph()?;
        }
        Some(current)
    }

    pub fn inner_graph_at_mut(&mut self, path: &[VertexKey]) -> Option<&mut Graph> {
        let mut current = self;
        for &key in path {
            current = current.vertices.get_mut(key)?.inner_graph_mut()?;
        }
        Some(current)
    }

    /// Verifies the structural invariants of the graph.
    ///
    /// Every AP is free or used by exactly one edge whose ends point back at it, vertex ids are
    /// unique, and every vertex but the root has exactly one parent reachable from the root.
    pub fn check_consistency(&self) -> Result<(), GraphError> {
        let fail = |reason: String| GraphError::Inconsistent {
            graph_id: self.graph_id,
            reason,
        };

        if self.order.len() != self.vertices.len()
            || self.order.iter().any(|&k| !self.vertices.contains_key(k))
        {
            return Err(fail("vertex order out of sync with vertex arena".into()));
        }

        let mut ids = HashSet::new();
        for (_, v) in self.vertices() {
            if !ids.insert(v.id) {
                return Err(GraphError::DuplicateVertexId(v.id));
            }
        }

        for (key, edge) in self.edges.iter() {
            for ap in [edge.source, edge.target] {
                let found = self.require_ap(ap)?;
                if found.edge != Some(key) {
                    return Err(fail(format!(
                        "AP {} of vertex {} does not point back at its edge",
                        ap.index, self.vertices[ap.vertex].id
                    )));
                }
            }
            if edge.source.vertex == edge.target.vertex {
                return Err(fail("edge loops on a single vertex".into()));
            }
        }

        for (key, v) in self.vertices() {
            for (i, ap) in v.aps.iter().enumerate() {
                if let Some(e) = ap.edge {
                    let edge = self.edges.get(e).ok_or(GraphError::EdgeNotFound(e))?;
                    if edge.other_end(ApRef::new(key, i)).is_none() {
                        return Err(fail(format!(
                            "AP {i} of vertex {} refers to an edge that does not use it",
                            v.id
                        )));
                    }
                }
            }
            let parents = v
                .aps
                .iter()
                .filter_map(|ap| ap.edge)
                .filter(|&e| self.edges[e].target.vertex == key)
                .count();
            if parents > 1 {
                return Err(fail(format!("vertex {} has {parents} parents", v.id)));
            }
        }

        if let Some(root) = self.root() {
            let reachable = 1 + self.child_tree(root).len();
            if reachable != self.vertex_count() {
                return Err(fail(format!(
                    "only {reachable} of {} vertices reachable from the root",
                    self.vertex_count()
                )));
            }
        } else if !self.is_empty() {
            return Err(fail("no root vertex".into()));
        }

        for ring in &self.rings {
            if ring.vertices().iter().any(|&v| !self.contains_vertex(v)) {
                return Err(fail("ring refers to a missing vertex".into()));
            }
        }
        for set in &self.symmetric_sets {
            if set.len() < 2 || set.members().iter().any(|&v| !self.contains_vertex(v)) {
                return Err(fail("malformed symmetric set".into()));
            }
        }
        if let Some(embedding) = &self.embedding {
            for &p in &embedding.projections {
                if self.require_ap(p)?.is_used() {
                    return Err(fail("projected AP is used inside the template".into()));
                }
            }
        }
        Ok(())
    }

    fn vertex_label(&self, key: VertexKey) -> String {
        self.vertex(key)
            .map_or_else(|| "?".to_string(), |v| v.id.to_string())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertices = self
            .vertices()
            .map(|(_, v)| {
                let kind = match v.kind {
                    BuildingBlockType::Scaffold => 'S',
                    BuildingBlockType::Fragment => 'F',
                    BuildingBlockType::Cap => 'C',
                    BuildingBlockType::Undefined => 'U',
                };
                let tag = if v.is_template() { "T" } else { "" };
                format!("{}:{kind}{}{tag}", v.id, v.building_block_id)
            })
            .join(",");
        let mut edges: Vec<(usize, String)> = self
            .edges
            .values()
            .map(|e| {
                (
                    self.position_of(e.target.vertex).unwrap_or(usize::MAX),
                    format!(
                        "{}.{}>{}.{}",
                        self.vertex_label(e.source.vertex),
                        e.source.index,
                        self.vertex_label(e.target.vertex),
                        e.target.index
                    ),
                )
            })
            .collect();
        edges.sort();
        let edges = edges.into_iter().map(|(_, s)| s).join(",");
        let rings = self
            .rings
            .iter()
            .map(|r| format!("({})", r.vertices().iter().map(|&v| self.vertex_label(v)).join("-")))
            .join(",");
        let sym = self
            .symmetric_sets
            .iter()
            .map(|s| format!("({})", s.members().iter().map(|&v| self.vertex_label(v)).join(",")))
            .join(",");
        write!(
            f,
            "#{} [{vertices}] [{edges}] [{rings}] [{sym}]",
            self.graph_id
        )
    }
}
