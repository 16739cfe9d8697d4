//! Candidate generation: the four ways a new member of the population is produced.
//!
//! Each builder works on graphs owned by the attempt, counts what happened on the monitor of the
//! context, and returns `Ok(None)` when the attempt fails for an expected reason. Nothing is
//! added to the population here.

use crate::core::models::graph::Graph;
use crate::core::models::ids::VertexKey;
use crate::engine::candidate::{Candidate, CandidateSource};
use crate::engine::context::GaContext;
use crate::engine::crossover::perform_crossover;
use crate::engine::error::EngineError;
use crate::engine::evaluation::{Evaluation, Evaluator};
use crate::engine::growth::grow_from_scaffold;
use crate::engine::monitor::CounterId;
use crate::engine::mutation::perform_graph_mutation;
use crate::engine::population::Population;
use crate::engine::rings::setup_rings;
use crate::engine::selection::{perform_fbcc, select};
use itertools::Itertools;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Counters charged when finalizing an offspring fails at one of its checkpoints.
struct Checkpoints {
    setup_rings: CounterId,
    eval: CounterId,
    forbidden_ends: CounterId,
}

const XOVER_CHECKS: Checkpoints = Checkpoints {
    setup_rings: CounterId::FailedXoverAttemptsSetupRings,
    eval: CounterId::FailedXoverAttemptsEval,
    forbidden_ends: CounterId::FailedXoverAttemptsForbiddenEnds,
};

const MUTATION_CHECKS: Checkpoints = Checkpoints {
    setup_rings: CounterId::FailedMutAttemptsSetupRings,
    eval: CounterId::FailedMutAttemptsEval,
    forbidden_ends: CounterId::FailedMutAttemptsForbiddenEnds,
};

const BUILD_CHECKS: Checkpoints = Checkpoints {
    setup_rings: CounterId::FailedBuildAttemptsSetupRings,
    eval: CounterId::FailedBuildAttemptsEval,
    forbidden_ends: CounterId::FailedBuildAttemptsForbiddenEnds,
};

fn evaluate(
    graph: &Graph,
    failure: CounterId,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
) -> Option<Evaluation> {
    ctx.monitor.increase(CounterId::FitnessEvals);
    match evaluator.evaluate(graph) {
        Ok(evaluation) => Some(evaluation),
        Err(e) => {
            debug!(graph_id = graph.graph_id(), error = %e, "Evaluation failed");
            ctx.monitor.increase(CounterId::FailedFitnessEvals);
            ctx.monitor.increase(failure);
            None
        }
    }
}

/// Closes rings, caps free APs, rejects forbidden ends and evaluates.
fn finalize<R: Rng>(
    graph: &mut Graph,
    checks: &Checkpoints,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
    rng: &mut R,
) -> Result<Option<Evaluation>, EngineError> {
    if !setup_rings(graph, ctx, rng)? {
        ctx.monitor.increase(checks.setup_rings);
        return Ok(None);
    }
    graph.add_capping_groups(ctx.space, ctx.ids)?;
    if graph.has_forbidden_end(ctx.space) {
        ctx.monitor.increase(checks.forbidden_ends);
        return Ok(None);
    }
    Ok(evaluate(graph, checks.eval, ctx, evaluator))
}

fn named(
    source: CandidateSource,
    graph: Graph,
    generation: usize,
    evaluation: Evaluation,
    ctx: &GaContext,
) -> Candidate {
    let name = Candidate::name_for(ctx.ids.next_candidate_id());
    Candidate::new(name, graph, generation, source).with_evaluation(evaluation)
}

fn describe_parent(parent: &Candidate, vertex_ids: &[u64]) -> String {
    format!(
        "Gen:{} Cand:{}|{}|{}",
        parent.generation(),
        parent.name(),
        parent.graph().graph_id(),
        vertex_ids.iter().map(|id| format!("_{id}")).join("")
    )
}

fn site_vertex_ids(graph: &Graph, path: &[VertexKey], vertices: &[VertexKey]) -> Vec<u64> {
    graph
        .inner_graph_at(path)
        .map(|inner| {
            vertices
                .iter()
                .filter_map(|&k| inner.vertex(k).map(|v| v.id()))
                .collect()
        })
        .unwrap_or_default()
}

/// Swaps subgraphs between two parents chosen among `eligible` and keeps one valid offspring.
#[instrument(level = "debug", skip_all, fields(generation = generation))]
pub fn build_candidate_by_xover<R: Rng>(
    eligible: &[Arc<Candidate>],
    population: &Population,
    generation: usize,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
    rng: &mut R,
) -> Result<Option<Candidate>, EngineError> {
    ctx.monitor.increase(CounterId::XoverAttempts);
    ctx.monitor.increase(CounterId::NewCandidateAttempts);

    let mut attempts = 0;
    let mut found = None;
    while found.is_none() && attempts < ctx.config.max_genetic_op_attempts {
        attempts += 1;
        found = perform_fbcc(population, eligible, ctx, rng);
    }
    ctx.monitor
        .increase_by(CounterId::XoverParentSearch, attempts as u64);
    let Some((parent_a, parent_b, site)) = found else {
        ctx.monitor
            .increase(CounterId::FailedXoverAttemptsFindParents);
        ctx.monitor.increase(CounterId::FailedXoverAttempts);
        return Ok(None);
    };

    let mut graph_a = parent_a.graph().clone();
    let mut graph_b = parent_b.graph().clone();
    if !perform_crossover(&mut graph_a, &mut graph_b, &site, ctx.space, ctx.ids)? {
        ctx.monitor.increase(CounterId::FailedXoverAttemptsPerform);
        ctx.monitor.increase(CounterId::FailedXoverAttempts);
        return Ok(None);
    }

    let from_a = describe_parent(
        &parent_a,
        &site_vertex_ids(parent_a.graph(), &site.a_path, &site.a_vertices),
    );
    let from_b = describe_parent(
        &parent_b,
        &site_vertex_ids(parent_b.graph(), &site.b_path, &site.b_vertices),
    );
    let annotations = [
        format!("Xover: {from_a} X {from_b}"),
        format!("Xover: {from_b} X {from_a}"),
    ];

    let mut offspring = Vec::with_capacity(2);
    for (mut graph, annotation) in [graph_a, graph_b].into_iter().zip(annotations) {
        graph.set_graph_id(ctx.ids.next_graph_id());
        graph.set_annotation(annotation);
        if let Some(evaluation) = finalize(&mut graph, &XOVER_CHECKS, ctx, evaluator, rng)? {
            offspring.push((graph, evaluation));
        }
    }
    if offspring.is_empty() {
        ctx.monitor.increase(CounterId::FailedXoverAttempts);
        return Ok(None);
    }
    let index = rng.gen_range(0..offspring.len());
    let (graph, evaluation) = offspring.swap_remove(index);
    Ok(Some(named(
        CandidateSource::Crossover,
        graph,
        generation,
        evaluation,
        ctx,
    )))
}

/// Mutates a clone of a parent chosen among `eligible`.
#[instrument(level = "debug", skip_all, fields(generation = generation))]
pub fn build_candidate_by_mutation<R: Rng>(
    eligible: &[Arc<Candidate>],
    generation: usize,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
    rng: &mut R,
) -> Result<Option<Candidate>, EngineError> {
    ctx.monitor.increase(CounterId::MutAttempts);
    ctx.monitor.increase(CounterId::NewCandidateAttempts);

    let mut failed_searches = 0;
    let mut parent = None;
    while failed_searches < ctx.config.max_genetic_op_attempts {
        parent = select(ctx.config.selection, eligible, 1, rng).pop();
        if parent.is_some() {
            break;
        }
        failed_searches += 1;
    }
    ctx.monitor
        .increase_by(CounterId::MutParentSearch, failed_searches as u64);
    let Some(parent) = parent else {
        ctx.monitor.increase(CounterId::FailedMutAttempts);
        return Ok(None);
    };

    let mut graph = parent.graph().clone();
    graph.set_annotation(format!(
        "Mutation: Gen:{} Cand:{}|{}",
        parent.generation(),
        parent.name(),
        parent.graph().graph_id()
    ));
    if !perform_graph_mutation(&mut graph, ctx, rng)? {
        ctx.monitor.increase(CounterId::FailedMutAttemptsPerform);
        ctx.monitor.increase(CounterId::FailedMutAttempts);
        return Ok(None);
    }
    // Annotated ids refer to the parent's vertices.
    graph.renumber_vertices(ctx.ids);
    graph.set_graph_id(ctx.ids.next_graph_id());

    match finalize(&mut graph, &MUTATION_CHECKS, ctx, evaluator, rng)? {
        Some(evaluation) => Ok(Some(named(
            CandidateSource::Mutation,
            graph,
            generation,
            evaluation,
            ctx,
        ))),
        None => {
            ctx.monitor.increase(CounterId::FailedMutAttempts);
            Ok(None)
        }
    }
}

/// Grows a new graph from a random scaffold.
#[instrument(level = "debug", skip_all, fields(generation = generation))]
pub fn build_candidate_from_scratch<R: Rng>(
    generation: usize,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
    rng: &mut R,
) -> Result<Option<Candidate>, EngineError> {
    ctx.monitor.increase(CounterId::BuildAnewAttempts);
    ctx.monitor.increase(CounterId::NewCandidateAttempts);

    let Some(mut graph) = grow_from_scaffold(ctx, rng)? else {
        ctx.monitor
            .increase(CounterId::FailedBuildAttemptsGraphBuild);
        ctx.monitor.increase(CounterId::FailedBuildAttempts);
        return Ok(None);
    };
    graph.set_annotation("NEW");

    match finalize(&mut graph, &BUILD_CHECKS, ctx, evaluator, rng)? {
        Some(evaluation) => Ok(Some(named(
            CandidateSource::Construction,
            graph,
            generation,
            evaluation,
            ctx,
        ))),
        None => {
            ctx.monitor.increase(CounterId::FailedBuildAttempts);
            Ok(None)
        }
    }
}

/// Turns a user-supplied graph into a candidate.
///
/// Only structural consistency and evaluation are checked: rings are not set up and forbidden
/// ends are tolerated, so graphs the operators could never produce can still be seeded.
#[instrument(level = "debug", skip_all, fields(graph_id = graph.graph_id()))]
pub fn build_candidate_manually(
    mut graph: Graph,
    generation: usize,
    ctx: &GaContext,
    evaluator: &dyn Evaluator,
) -> Result<Option<Candidate>, EngineError> {
    ctx.monitor.increase(CounterId::ManualAddAttempts);
    ctx.monitor.increase(CounterId::NewCandidateAttempts);

    if graph.is_empty() || graph.check_consistency().is_err() {
        ctx.monitor.increase(CounterId::FailedManualAddAttempts);
        return Ok(None);
    }
    ctx.ids.ensure_vertex_id_above(graph.max_vertex_id());
    ctx.ids.ensure_graph_id_above(graph.graph_id());
    graph.set_annotation("MANUAL_ADD");

    let Some(evaluation) = evaluate(
        &graph,
        CounterId::FailedManualAddAttemptsEval,
        ctx,
        evaluator,
    ) else {
        ctx.monitor.increase(CounterId::FailedManualAddAttempts);
        return Ok(None);
    };
    let candidate = named(CandidateSource::Manual, graph, generation, evaluation, ctx);
    debug!(name = candidate.name(), "Candidate added manually");
    Ok(Some(candidate))
}
