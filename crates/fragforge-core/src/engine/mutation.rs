use super::context::GaContext;
use super::error::EngineError;
use super::growth::{GrowthOptions, extend_graph};
use super::link_finder::{find_alternative_link, find_link_for_edge, mapping_for};
use super::monitor::CounterId;
use super::utils::sampling::number_of_sites_to_mutate;
use crate::core::library::fragment_space::BlockAp;
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::ids::{ApRef, VertexKey};
use crate::core::models::vertex::{BuildingBlockType, MutationType};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// Optional steering of a single mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationChoice {
    /// Skip the growth gates when the mutation grows new fragments.
    pub force: bool,
    /// AP of the mutated vertex to act on (the edge to split for ADDLINK).
    pub ap: Option<usize>,
    /// Fragment to attach when the mutation grows new fragments.
    pub fragment: Option<BlockAp>,
}

/// Applies one mutation of type `mutation` at `vertex`.
///
/// The graph is edited in place and may be left partially modified when the mutation fails,
/// so callers mutate a clone and drop it on failure. On success the mutation is recorded in
/// the graph annotation.
///
/// # Return
///
/// Returns `Ok(false)` for the ordinary failures of a stochastic edit: a type not allowed at
/// `vertex`, no suitable building block, no compatible AP mapping. Each failure increments
/// its counter on the context's monitor.
///
/// # Errors
///
/// Returns an error if `vertex` is not in `graph`, if a requested AP does not exist or does not
/// start an edge, or if the mutation needs a parent edge that `vertex` lacks.
#[instrument(level = "debug", skip_all, fields(mutation = %mutation))]
pub fn perform_mutation<R: Rng>(
    graph: &mut Graph,
    vertex: VertexKey,
    mutation: MutationType,
    choice: MutationChoice,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let vertex_id = graph
        .vertex(vertex)
        .map(|v| v.id())
        .ok_or(GraphError::VertexNotFound(vertex))?;
    let position = graph.position_of(vertex).unwrap_or_default();
    let monitor = ctx.monitor;

    if !graph
        .mutation_types(vertex, &ctx.config.excluded_mutations)
        .contains(&mutation)
    {
        monitor.increase(CounterId::FailedMutAttemptsPerformBadMutType);
        debug!(vertex_id, "Mutation type not allowed on vertex");
        return Ok(false);
    }

    let done = match mutation {
        MutationType::ChangeBranch => {
            let done = rebuild_branch(graph, vertex, choice, ctx, rng)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoChangeBranch);
            }
            done
        }
        MutationType::ChangeLink => {
            let done = substitute_link(graph, vertex, ctx, rng)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoChangeLink);
            }
            done
        }
        MutationType::DeleteLink => {
            let done = remove_link(graph, vertex, ctx)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoChangeLink);
            }
            done
        }
        MutationType::DeleteChain => {
            let done = delete_chain(graph, vertex, ctx)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoDeleteChain);
            }
            done
        }
        MutationType::AddLink => {
            let done = add_link(graph, vertex, choice, ctx, rng)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoAddLink);
            }
            done
        }
        MutationType::Extend => {
            graph.remove_capping_groups_on(vertex);
            let options = GrowthOptions {
                recursive: false,
                symmetric_on_aps: false,
                force: choice.force,
                choice: choice.fragment,
            };
            let done = extend_graph(graph, vertex, options, ctx, rng)?;
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoExtend);
            }
            done
        }
        MutationType::Delete => {
            let done = delete_fragment(graph, vertex);
            if !done {
                monitor.increase(CounterId::FailedMutAttemptsPerformNoDelete);
            }
            done
        }
    };

    if done {
        graph.append_annotation(&format!("|{mutation}|{vertex_id} ({position})"));
    }
    debug!(vertex_id, success = done, "Mutation attempted");
    Ok(done)
}

/// Mutates up to a configured number of random sites of `graph`.
///
/// Sites and mutation types are drawn anew before each edit, since earlier edits change the
/// graph. Stops at the first failed edit.
#[instrument(level = "debug", skip_all, fields(graph_id = graph.graph_id()))]
pub fn perform_graph_mutation<R: Rng>(
    graph: &mut Graph,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let excluded = &ctx.config.excluded_mutations;
    if graph.mutable_sites(excluded).is_empty() {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoMutSite);
        return Ok(false);
    }
    let sites_to_mutate = number_of_sites_to_mutate(&ctx.config.multi_site_weights, rng);
    let mut done = false;
    for _ in 0..sites_to_mutate {
        let sites = graph.mutable_sites(excluded);
        let Some(&site) = sites.choose(rng) else {
            break;
        };
        let types = graph.mutation_types(site, excluded);
        let Some(&mutation) = types.choose(rng) else {
            break;
        };
        if !perform_mutation(graph, site, mutation, MutationChoice::default(), ctx, rng)? {
            return Ok(false);
        }
        done = true;
    }
    Ok(done)
}

/// Removes the branch at `vertex` and regrows one level from its former parent.
fn rebuild_branch<R: Rng>(
    graph: &mut Graph,
    vertex: VertexKey,
    choice: MutationChoice,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let vertex_id = graph.vertex(vertex).map_or(0, |v| v.id());
    let parent = graph
        .parent(vertex)
        .ok_or(EngineError::MissingParentEdge {
            mutation: MutationType::ChangeBranch,
            vertex_id,
        })?;
    let symmetry = graph.has_symmetry_involving(vertex);
    if !delete_fragment(graph, vertex) {
        return Ok(false);
    }
    let options = GrowthOptions {
        recursive: false,
        symmetric_on_aps: symmetry,
        force: choice.force,
        choice: choice.fragment,
    };
    extend_graph(graph, parent, options, ctx, rng)
}

/// Removes the branch at `vertex` and at each of its symmetric siblings.
fn delete_fragment(graph: &mut Graph, vertex: VertexKey) -> bool {
    let symmetry = graph.has_symmetry_involving(vertex);
    graph.remove_branch(vertex, symmetry);
    !graph.contains_vertex(vertex) && graph.vertex_count() > 1
}

/// Swaps `vertex`, and its symmetric siblings, for another fragment with compatible APs.
fn substitute_link<R: Rng>(
    graph: &mut Graph,
    vertex: VertexKey,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let Some(alternative) = find_alternative_link(graph, vertex, ctx.space, rng) else {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoChangeLinkFind);
        return Ok(false);
    };
    for sibling in graph.symmetric_siblings(vertex) {
        let ap_map = if sibling == vertex {
            Some(alternative.ap_map.clone())
        } else {
            mapping_for(graph, sibling, alternative.building_block, ctx.space)
        };
        let replacement = ctx.space.instantiate(
            BuildingBlockType::Fragment,
            alternative.building_block,
            ctx.ids.next_vertex_id(),
        );
        let (Some(ap_map), Some(replacement)) = (ap_map, replacement) else {
            ctx.monitor
                .increase(CounterId::FailedMutAttemptsPerformNoChangeLinkEdit);
            return Ok(false);
        };
        if let Err(e) = graph.replace_vertex(sibling, replacement, &ap_map) {
            debug!(error = %e, "Could not replace vertex");
            ctx.monitor
                .increase(CounterId::FailedMutAttemptsPerformNoChangeLinkEdit);
            return Ok(false);
        }
    }
    Ok(true)
}

/// Cuts `vertex` out of its chain, bonding its parent to its children.
fn remove_link(graph: &mut Graph, vertex: VertexKey, ctx: &GaContext) -> Result<bool, EngineError> {
    if graph.parent(vertex).is_none() {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoDelLinkFindParent);
        return Ok(false);
    }
    let symmetry = graph.has_symmetry_involving(vertex);
    let done = graph.remove_vertex_and_weld(vertex, ctx.space, symmetry)?;
    if !done {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoDelLinkEdit);
    }
    Ok(done)
}

/// Removes the non-branching chain around `vertex` and around those of its symmetric siblings
/// that allow it.
fn delete_chain(graph: &mut Graph, vertex: VertexKey, ctx: &GaContext) -> Result<bool, EngineError> {
    let excluded = &ctx.config.excluded_mutations;
    let targets: Vec<VertexKey> = graph
        .symmetric_siblings(vertex)
        .into_iter()
        .filter(|&s| s == vertex || graph.mutation_types(s, excluded).contains(&MutationType::DeleteChain))
        .collect();
    for target in targets {
        if !graph.contains_vertex(target) {
            continue;
        }
        if !graph.remove_chain_up_to_branching(target)? && target == vertex {
            return Ok(false);
        }
    }
    Ok(!graph.contains_vertex(vertex) && !graph.is_empty())
}

/// Splits an edge leaving `vertex` with a new fragment.
fn add_link<R: Rng>(
    graph: &mut Graph,
    vertex: VertexKey,
    choice: MutationChoice,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let vertex_id = graph.vertex(vertex).map_or(0, |v| v.id());
    let source = match choice.ap {
        Some(index) => {
            let ap = ApRef::new(vertex, index);
            if graph.ap(ap).is_none() {
                return Err(EngineError::ApOutOfRange { vertex_id, index });
            }
            if !graph.is_source(ap) {
                return Err(EngineError::NotASourceAp { vertex_id, index });
            }
            ap
        }
        None => {
            let sources: Vec<ApRef> = graph
                .child_edges(vertex)
                .into_iter()
                .filter_map(|e| graph.edge(e).map(|edge| edge.source))
                .collect();
            match sources.choose(rng) {
                Some(&ap) => ap,
                None => return Ok(false),
            }
        }
    };
    let Some(edge) = graph.ap(source).and_then(|a| a.edge()) else {
        return Err(EngineError::NotASourceAp {
            vertex_id,
            index: source.index,
        });
    };

    let Some(link) = find_link_for_edge(graph, edge, ctx.space, rng) else {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoAddLinkFind);
        return Ok(false);
    };
    let Some(fresh) = ctx.space.instantiate(
        BuildingBlockType::Fragment,
        link.building_block,
        ctx.ids.next_vertex_id(),
    ) else {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoAddLinkFind);
        return Ok(false);
    };
    if graph.heavy_atom_count() + fresh.heavy_atoms() > ctx.config.growth.max_heavy_atoms {
        ctx.monitor
            .increase(CounterId::FailedMutAttemptsPerformNoAddLinkFind);
        return Ok(false);
    }
    match graph.insert_vertex(edge, fresh, link.target_on_new, link.source_on_new, ctx.space) {
        Ok(_) => Ok(true),
        Err(e) => {
            debug!(error = %e, "Could not insert link");
            ctx.monitor
                .increase(CounterId::FailedMutAttemptsPerformNoAddLinkEdit);
            Ok(false)
        }
    }
}
