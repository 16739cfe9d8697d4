use super::error::EngineError;
use crate::core::library::fragment_space::FragmentSpace;
use crate::core::models::attachment_point::ApClass;
use crate::core::models::graph::Graph;
use crate::core::models::ids::{ApRef, IdGenerator, VertexKey};
use crate::core::models::template::ContractLevel;
use crate::core::models::vertex::BuildingBlockType;
use crate::core::utils::mapping::{MappingSlot, enumerate_mappings};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

const MAX_XOVER_MAPPINGS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossoverType {
    /// Whole branches are swapped.
    Branch,
    /// A run of vertices between two edges is swapped; ring-closing vertices never take part.
    Subgraph,
}

/// A pair of subgraphs, one per parent graph, that can be swapped.
///
/// Each side is addressed by the path of template vertices leading to the graph that holds it
/// (empty for the outermost graph) and by the keys of its vertices in that graph. Needy APs are
/// the APs a replacement must take over: those bonded to the rest of the graph and those
/// projected onto the surface of an enclosing template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XoverSite {
    pub a_path: Vec<VertexKey>,
    pub a_vertices: Vec<VertexKey>,
    pub a_needy: Vec<ApRef>,
    pub b_path: Vec<VertexKey>,
    pub b_vertices: Vec<VertexKey>,
    pub b_needy: Vec<ApRef>,
    pub kind: CrossoverType,
}

impl XoverSite {
    /// The same site seen from the other parent.
    pub fn mirrored(&self) -> Self {
        Self {
            a_path: self.b_path.clone(),
            a_vertices: self.b_vertices.clone(),
            a_needy: self.b_needy.clone(),
            b_path: self.a_path.clone(),
            b_vertices: self.a_vertices.clone(),
            b_needy: self.a_needy.clone(),
            kind: self.kind,
        }
    }
}

/// One graph level visited while looking for sites.
#[derive(Clone, Copy)]
struct Level<'g> {
    graph: &'g Graph,
    path: &'g [VertexKey],
}

impl Level<'_> {
    fn contract(&self) -> ContractLevel {
        self.graph
            .embedding()
            .map_or(ContractLevel::Free, |e| e.contract)
    }
}

/// Enumerates the sites where `a` and `b` can exchange subgraphs.
///
/// For every pair of edges (capping groups excluded) whose classes allow both cross
/// connections, a branch site is produced, plus subgraph sites ending at a downstream pair of
/// edges that also allow both cross connections. Subgraphs larger than `max_size` vertices and
/// pairs of isomorphic subgraphs are skipped. Pairs of templates that are not fixed, found at
/// the same embedding depth, are searched recursively.
#[instrument(level = "debug", skip_all, fields(a = a.graph_id(), b = b.graph_id()))]
pub fn locate_compatible_xover_sites(
    a: &Graph,
    b: &Graph,
    space: &FragmentSpace,
    max_size: usize,
) -> Vec<XoverSite> {
    let mut sites = Vec::new();
    let a_path: Vec<VertexKey> = Vec::new();
    let b_path: Vec<VertexKey> = Vec::new();
    locate_in(
        Level {
            graph: a,
            path: &a_path,
        },
        Level {
            graph: b,
            path: &b_path,
        },
        space,
        max_size,
        &mut sites,
    );
    debug!(count = sites.len(), "Crossover sites located");
    sites
}

fn locate_in(a: Level, b: Level, space: &FragmentSpace, max_size: usize, sites: &mut Vec<XoverSite>) {
    let (ca, cb) = (a.contract(), b.contract());
    if ca == ContractLevel::Fixed || cb == ContractLevel::Fixed {
        return;
    }
    let same_shape_only = ca == ContractLevel::FixedStructure || cb == ContractLevel::FixedStructure;

    let a_edges = crossable_edges(a.graph);
    let b_edges = crossable_edges(b.graph);
    for &(a_src, a_trg) in &a_edges {
        for &(b_src, b_trg) in &b_edges {
            if !cross_compatible(a.graph, a_src, a_trg, b.graph, b_src, b_trg, space) {
                continue;
            }
            let a_branch = a.graph.branch(a_trg.vertex);
            let b_branch = b.graph.branch(b_trg.vertex);
            push_site(a, &a_branch, b, &b_branch, CrossoverType::Branch, same_shape_only, max_size, sites);

            for &(a_end_src, a_end_trg) in &a_edges {
                if !a_branch.contains(&a_end_src.vertex) {
                    continue;
                }
                let a_region = region_between(a.graph, &a_branch, a_end_trg.vertex);
                for &(b_end_src, b_end_trg) in &b_edges {
                    if !b_branch.contains(&b_end_src.vertex)
                        || !cross_compatible(
                            a.graph, a_end_src, a_end_trg, b.graph, b_end_src, b_end_trg, space,
                        )
                    {
                        continue;
                    }
                    let b_region = region_between(b.graph, &b_branch, b_end_trg.vertex);
                    push_site(a, &a_region, b, &b_region, CrossoverType::Subgraph, same_shape_only, max_size, sites);
                }
            }
        }
    }

    for (ta, va) in a.graph.vertices() {
        let Some(inner_a) = va.inner_graph() else {
            continue;
        };
        for (tb, vb) in b.graph.vertices() {
            let Some(inner_b) = vb.inner_graph() else {
                continue;
            };
            let mut a_path = a.path.to_vec();
            a_path.push(ta);
            let mut b_path = b.path.to_vec();
            b_path.push(tb);
            locate_in(
                Level {
                    graph: inner_a,
                    path: &a_path,
                },
                Level {
                    graph: inner_b,
                    path: &b_path,
                },
                space,
                max_size,
                sites,
            );
        }
    }
}

/// Edges as `(source, target)` AP pairs, leaving out edges to capping groups.
fn crossable_edges(graph: &Graph) -> Vec<(ApRef, ApRef)> {
    graph
        .edges()
        .filter(|(_, e)| {
            graph
                .vertex(e.target.vertex)
                .is_some_and(|v| v.kind() != BuildingBlockType::Cap)
        })
        .map(|(_, e)| (e.source, e.target))
        .collect()
}

fn cross_compatible(
    a: &Graph,
    a_src: ApRef,
    a_trg: ApRef,
    b: &Graph,
    b_src: ApRef,
    b_trg: ApRef,
    space: &FragmentSpace,
) -> bool {
    let class = |g: &Graph, ap: ApRef| g.ap(ap).map(|x| x.class.clone());
    let (Some(sa), Some(ta), Some(sb), Some(tb)) =
        (class(a, a_src), class(a, a_trg), class(b, b_src), class(b, b_trg))
    else {
        return false;
    };
    space.is_compatible(&sa, &tb) && space.is_compatible(&sb, &ta)
}

/// Vertices of `branch` that are not below `end`.
fn region_between(graph: &Graph, branch: &[VertexKey], end: VertexKey) -> Vec<VertexKey> {
    let below: HashSet<VertexKey> = graph.branch(end).into_iter().collect();
    branch
        .iter()
        .copied()
        .filter(|k| !below.contains(k))
        .collect()
}

/// Returns `true` if a ring closing inside `region` runs through vertices outside it.
fn cuts_ring(graph: &Graph, region: &HashSet<VertexKey>) -> bool {
    graph.rings().iter().any(|r| {
        let end_inside = r.head().is_some_and(|h| region.contains(&h))
            || r.tail().is_some_and(|t| region.contains(&t));
        end_inside && r.vertices().iter().any(|v| !region.contains(v))
    })
}

#[allow(clippy::too_many_arguments)]
fn push_site(
    a: Level,
    a_region: &[VertexKey],
    b: Level,
    b_region: &[VertexKey],
    kind: CrossoverType,
    same_shape_only: bool,
    max_size: usize,
    sites: &mut Vec<XoverSite>,
) {
    if a_region.is_empty()
        || b_region.is_empty()
        || a_region.len() > max_size
        || b_region.len() > max_size
    {
        return;
    }
    let valid = |level: Level, region: &[VertexKey]| {
        let set: HashSet<VertexKey> = region.iter().copied().collect();
        let has_rcv = region
            .iter()
            .any(|&k| level.graph.vertex(k).is_some_and(|v| v.is_ring_closing()));
        let rcv_in_ring = region.iter().any(|&k| {
            level.graph.vertex(k).is_some_and(|v| v.is_ring_closing())
                && level.graph.is_vertex_in_ring(k)
        });
        !(kind == CrossoverType::Subgraph && has_rcv)
            && !(same_shape_only && rcv_in_ring)
            && !cuts_ring(level.graph, &set)
            && level.graph.root().is_some_and(|r| !set.contains(&r))
    };
    if !valid(a, a_region) || !valid(b, b_region) {
        return;
    }
    let a_sub = a.graph.extract_subgraph(a_region);
    let b_sub = b.graph.extract_subgraph(b_region);
    if a_sub.is_isomorphic_to(&b_sub) {
        return;
    }
    if same_shape_only && !a_sub.is_isostructural_to(&b_sub) {
        return;
    }
    let site = XoverSite {
        a_path: a.path.to_vec(),
        a_vertices: a_region.to_vec(),
        a_needy: a.graph.interface_aps(a_region),
        b_path: b.path.to_vec(),
        b_vertices: b_region.to_vec(),
        b_needy: b.graph.interface_aps(b_region),
        kind,
    };
    if !sites.contains(&site) {
        sites.push(site);
    }
}

/// Role of a needy AP with respect to the rest of its graph.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exposure {
    /// Target of an edge coming from an outside AP of this class.
    FromParent(ApClass),
    /// Source of an edge going to an outside AP of this class.
    ToChild(ApClass),
    /// Free AP projected out of an embedded graph.
    Projected,
}

fn exposure(graph: &Graph, ap: ApRef) -> Option<Exposure> {
    match graph.linked_ap(ap) {
        Some(other) => {
            let class = graph.ap(other)?.class.clone();
            if graph.is_source(ap) {
                Some(Exposure::ToChild(class))
            } else {
                Some(Exposure::FromParent(class))
            }
        }
        None => Some(Exposure::Projected),
    }
}

/// Whether the AP `incoming` of the other subgraph can take over the role of `needy`.
fn takes_over(
    host: &Graph,
    needy: ApRef,
    donor: &Graph,
    incoming: ApRef,
    space: &FragmentSpace,
) -> bool {
    let (Some(role), Some(own), Some(candidate)) =
        (exposure(host, needy), host.ap(needy), donor.ap(incoming))
    else {
        return false;
    };
    match role {
        Exposure::FromParent(parent) => {
            matches!(exposure(donor, incoming), Some(Exposure::FromParent(_)))
                && space.is_compatible(&parent, &candidate.class)
        }
        Exposure::ToChild(child) => {
            matches!(exposure(donor, incoming), Some(Exposure::ToChild(_)))
                && space.is_compatible(&candidate.class, &child)
        }
        Exposure::Projected => candidate.class == own.class,
    }
}

/// Pairs every needy AP of one side with an AP of the other, in both directions.
///
/// # Return
///
/// The map from needy APs of `a` to APs of the `b` subgraph and the map from needy APs of `b`
/// to APs of the `a` subgraph, or `None` if no pairing covers every needy AP.
fn pair_needy_aps(
    a: &Graph,
    a_region: &[VertexKey],
    a_needy: &[ApRef],
    b: &Graph,
    b_region: &[VertexKey],
    b_needy: &[ApRef],
    space: &FragmentSpace,
) -> Option<(HashMap<ApRef, ApRef>, HashMap<ApRef, ApRef>)> {
    let b_aps = b.subgraph_aps(b_region);
    let a_free: Vec<ApRef> = a
        .subgraph_aps(a_region)
        .into_iter()
        .filter(|ap| !a_needy.contains(ap))
        .collect();

    let mut slots: Vec<MappingSlot<ApRef, ApRef>> = a_needy
        .iter()
        .map(|&needy| {
            let candidates = b_aps
                .iter()
                .copied()
                .filter(|&x| {
                    takes_over(a, needy, b, x, space)
                        && (!b_needy.contains(&x) || takes_over(b, x, a, needy, space))
                })
                .collect();
            MappingSlot::required(needy, candidates)
        })
        .collect();
    for &free in &a_free {
        let candidates = b_needy
            .iter()
            .copied()
            .filter(|&x| takes_over(b, x, a, free, space))
            .collect();
        slots.push(MappingSlot::optional(free, candidates));
    }

    let mappings = enumerate_mappings(&slots, MAX_XOVER_MAPPINGS, |m| {
        b_needy
            .iter()
            .all(|needy| m.iter().any(|(_, image)| image == needy))
    });
    let chosen = mappings.into_iter().next()?;
    let a_map: HashMap<ApRef, ApRef> = chosen
        .iter()
        .filter(|(from, _)| a_needy.contains(from))
        .copied()
        .collect();
    let b_map: HashMap<ApRef, ApRef> = chosen
        .iter()
        .filter(|(_, to)| b_needy.contains(to))
        .map(|&(from, to)| (to, from))
        .collect();
    Some((a_map, b_map))
}

/// Swaps the two subgraphs of `site` between `a` and `b`.
///
/// Both graphs are edited on clones and only replaced when both swaps succeed, so on failure
/// neither graph changes. Vertices moving into a graph receive fresh ids.
///
/// # Return
///
/// Returns `Ok(false)` if the site no longer addresses both graphs or no AP pairing exists.
///
/// # Errors
///
/// Returns `EngineError::CorruptedGraph` if a swapped graph fails its consistency check.
#[instrument(level = "debug", skip_all, fields(kind = ?site.kind))]
pub fn perform_crossover(
    a: &mut Graph,
    b: &mut Graph,
    site: &XoverSite,
    space: &FragmentSpace,
    ids: &IdGenerator,
) -> Result<bool, EngineError> {
    let (Some(inner_a), Some(inner_b)) = (a.inner_graph_at(&site.a_path), b.inner_graph_at(&site.b_path))
    else {
        return Ok(false);
    };
    if site
        .a_vertices
        .iter()
        .any(|&k| !inner_a.contains_vertex(k))
        || site.b_vertices.iter().any(|&k| !inner_b.contains_vertex(k))
    {
        return Ok(false);
    }
    let Some((a_map, b_map)) = pair_needy_aps(
        inner_a,
        &site.a_vertices,
        &site.a_needy,
        inner_b,
        &site.b_vertices,
        &site.b_needy,
        space,
    ) else {
        debug!("No AP pairing between crossover subgraphs");
        return Ok(false);
    };
    let a_sub = inner_a.extract_subgraph(&site.a_vertices);
    let b_sub = inner_b.extract_subgraph(&site.b_vertices);

    let mut new_a = a.clone();
    let mut new_b = b.clone();
    if !swap_in(&mut new_a, &site.a_path, &site.a_vertices, &b_sub, &a_map, ids)?
        || !swap_in(&mut new_b, &site.b_path, &site.b_vertices, &a_sub, &b_map, ids)?
    {
        return Ok(false);
    }
    for graph in [&new_a, &new_b] {
        if let Err(e) = graph.check_consistency() {
            return Err(EngineError::CorruptedGraph {
                operation: "crossover",
                reason: e.to_string(),
                graph: graph.to_string(),
            });
        }
    }
    *a = new_a;
    *b = new_b;
    Ok(true)
}

fn swap_in(
    graph: &mut Graph,
    path: &[VertexKey],
    old: &[VertexKey],
    incoming: &Graph,
    ap_map: &HashMap<ApRef, ApRef>,
    ids: &IdGenerator,
) -> Result<bool, EngineError> {
    let Some(inner) = graph.inner_graph_at_mut(path) else {
        return Ok(false);
    };
    let Some(inserted) = inner.replace_subgraph(old, incoming, ap_map)? else {
        return Ok(false);
    };
    for key in inserted {
        if let Some(v) = inner.vertex_mut(key) {
            v.set_id(ids.next_vertex_id());
        }
    }
    Ok(true)
}
