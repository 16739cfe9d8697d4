use super::Graph;
use crate::core::models::edge::Edge;
use crate::core::models::ids::VertexKey;
use crate::core::models::vertex::BuildingBlockType;
use itertools::Itertools;

type VertexLabel = fn(&Graph, VertexKey) -> String;
type EdgeLabel = fn(&Graph, &Edge) -> String;

fn kind_letter(kind: BuildingBlockType) -> char {
    match kind {
        BuildingBlockType::Scaffold => 'S',
        BuildingBlockType::Fragment => 'F',
        BuildingBlockType::Cap => 'C',
        BuildingBlockType::Undefined => 'U',
    }
}

fn block_label(graph: &Graph, key: VertexKey) -> String {
    let Some(v) = graph.vertex(key) else {
        return String::new();
    };
    match v.inner_graph() {
        Some(inner) => format!(
            "{}{}{{{}}}",
            kind_letter(v.kind),
            v.building_block_id,
            inner.canonical_form()
        ),
        None => format!("{}{}", kind_letter(v.kind), v.building_block_id),
    }
}

fn class_edge_label(graph: &Graph, edge: &Edge) -> String {
    let class = |ap| {
        graph
            .ap(ap)
            .map_or_else(String::new, |a| a.class.to_string())
    };
    format!("{}>{}:{}", class(edge.source), class(edge.target), edge.order)
}

fn shape_label(graph: &Graph, key: VertexKey) -> String {
    graph
        .vertex(key)
        .map_or_else(String::new, |v| format!("{}{}", kind_letter(v.kind), v.aps.len()))
}

fn index_edge_label(_: &Graph, edge: &Edge) -> String {
    format!("{}>{}", edge.source.index, edge.target.index)
}

impl Graph {
    /// A string identical for any two graphs built from the same blocks connected the same way.
    ///
    /// Each vertex is labelled by role and building block, each edge by the classes of its two
    /// APs and its bond order; children are sorted, so the order in which branches were added
    /// does not matter. Rings contribute the labels along their path.
    pub fn canonical_form(&self) -> String {
        self.tree_form(block_label, class_edge_label)
    }

    /// Like [`canonical_form`](Self::canonical_form), but blind to building-block identity:
    /// only roles, AP counts and the AP indices used by edges count.
    pub fn shape_form(&self) -> String {
        self.tree_form(shape_label, index_edge_label)
    }

    pub fn is_isomorphic_to(&self, other: &Graph) -> bool {
        self.vertex_count() == other.vertex_count()
            && self.edge_count() == other.edge_count()
            && self.canonical_form() == other.canonical_form()
    }

    pub fn is_isostructural_to(&self, other: &Graph) -> bool {
        self.vertex_count() == other.vertex_count() && self.shape_form() == other.shape_form()
    }

    /// Canonical form of the graph induced by `subgraph`.
    pub fn subgraph_canonical_form(&self, subgraph: &[VertexKey]) -> String {
        self.extract_subgraph(subgraph).canonical_form()
    }

    fn tree_form(&self, label: VertexLabel, edge_label: EdgeLabel) -> String {
        let trees = self
            .vertex_keys()
            .iter()
            .filter(|&&k| self.parent_edge(k).is_none())
            .map(|&k| self.subtree_form(k, label, edge_label))
            .sorted()
            .join("|");
        let rings = self
            .rings
            .iter()
            .map(|r| {
                let forward = r.vertices().iter().map(|&v| label(self, v)).join("-");
                let backward = r.vertices().iter().rev().map(|&v| label(self, v)).join("-");
                format!("<{}:{}>", forward.min(backward), r.order())
            })
            .sorted()
            .join("");
        format!("{trees}{rings}")
    }

    fn subtree_form(&self, key: VertexKey, label: VertexLabel, edge_label: EdgeLabel) -> String {
        let children = self
            .child_edges(key)
            .into_iter()
            .filter_map(|e| self.edges.get(e))
            .map(|edge| {
                format!(
                    "{}~{}",
                    edge_label(self, edge),
                    self.subtree_form(edge.target.vertex, label, edge_label)
                )
            })
            .sorted()
            .join(",");
        format!("{}({children})", label(self, key))
    }
}
