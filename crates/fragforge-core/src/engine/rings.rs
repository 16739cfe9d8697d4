use super::context::GaContext;
use super::error::EngineError;
use super::growth::chance;
use crate::core::models::graph::Graph;
use crate::core::models::ids::{ApRef, VertexKey};
use crate::core::models::ring::Ring;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// A ring-closing vertex not yet part of a ring, with the parent AP it hangs from.
struct OpenEnd {
    vertex: VertexKey,
    parent_ap: ApRef,
}

fn open_ends(graph: &Graph) -> Vec<OpenEnd> {
    graph
        .vertices()
        .filter(|&(k, v)| v.is_ring_closing() && !graph.is_vertex_in_ring(k))
        .filter_map(|(k, _)| {
            let edge = graph.parent_edge(k).and_then(|e| graph.edge(e))?;
            Some(OpenEnd {
                vertex: k,
                parent_ap: edge.source,
            })
        })
        .collect()
}

/// Closes rings between free-standing ring-closing vertices of `graph`.
///
/// Pairs are tried in random order. A pair closes when the APs the two vertices hang from are
/// ring-closure compatible, the ring path (ring-closing vertices excluded) fits the configured
/// size bounds, and both APs pass the crowding gate. Ring-closing vertices left open afterwards
/// are removed and the APs they held are capped.
///
/// # Return
///
/// Returns `Ok(false)` when closures are required, ring-closing vertices were present and
/// none of them closed a ring.
#[instrument(level = "debug", skip_all, fields(graph_id = graph.graph_id()))]
pub fn setup_rings<R: Rng>(graph: &mut Graph, ctx: &GaContext, rng: &mut R) -> Result<bool, EngineError> {
    let settings = &ctx.config.rings;
    let growth = &ctx.config.growth;
    let ends = open_ends(graph);

    let mut closed = 0;
    if settings.enabled && ends.len() > 1 {
        let mut pairs: Vec<(usize, usize)> = (0..ends.len())
            .flat_map(|i| (i + 1..ends.len()).map(move |j| (i, j)))
            .collect();
        pairs.shuffle(rng);
        let mut used = vec![false; ends.len()];
        for (i, j) in pairs {
            if closed >= settings.max_closures {
                break;
            }
            if used[i] || used[j] {
                continue;
            }
            let (head, tail) = (&ends[i], &ends[j]);
            let (Some(head_ap), Some(tail_ap)) = (graph.ap(head.parent_ap), graph.ap(tail.parent_ap))
            else {
                continue;
            };
            if !ctx
                .space
                .is_ring_closure_compatible(&head_ap.class, &tail_ap.class)
            {
                continue;
            }
            let order = ctx.space.bond_order(&head_ap.class);
            let Some(path) = graph.path_between(head.vertex, tail.vertex) else {
                continue;
            };
            let size = path.len().saturating_sub(2);
            if size < settings.min_ring_size || size > settings.max_ring_size {
                continue;
            }
            let accepted = chance(
                rng,
                growth.crowding_probability(graph.crowdedness(head.parent_ap)),
            ) && chance(
                rng,
                growth.crowding_probability(graph.crowdedness(tail.parent_ap)),
            );
            if !accepted {
                continue;
            }
            graph.add_ring(Ring::new(path, order));
            used[i] = true;
            used[j] = true;
            closed += 1;
        }
    }

    if settings.require_closure && !ends.is_empty() && closed == 0 {
        debug!(open = ends.len(), "No ring could be closed");
        return Ok(false);
    }

    let parents: Vec<VertexKey> = ends
        .iter()
        .filter(|e| !graph.is_vertex_in_ring(e.vertex))
        .map(|e| e.parent_ap.vertex)
        .collect();
    let removed = graph.remove_unused_ring_closing_vertices();
    if removed > 0 {
        graph.add_capping_groups_on(&parents, ctx.space, ctx.ids)?;
    }
    debug!(closed, removed, "Rings set up");
    Ok(true)
}
