use crate::core::library::fragment_space::FragmentSpace;
use crate::core::models::graph::Graph;
use crate::core::models::vertex::BuildingBlockType;
use thiserror::Error;

/// The outcome of evaluating a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Identity string; two graphs with the same UID are the same candidate.
    pub uid: String,
    pub fitness: f64,
    pub representation: Option<String>,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Graph {graph_id} rejected by the evaluator: {reason}")]
    Rejected { graph_id: u64, reason: String },

    #[error("Fitness computation failed: {0}")]
    Failed(String),
}

/// Computes identity and fitness of a graph.
///
/// Implementations must be shareable between the workers of a generation.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, graph: &Graph) -> Result<Evaluation, EvaluationError>;
}

/// Sums the fitness contribution of every building block and subtracts a per-heavy-atom
/// penalty. The UID is the canonical form of the graph.
pub struct AdditiveEvaluator<'a> {
    space: &'a FragmentSpace,
    size_penalty: f64,
}

impl<'a> AdditiveEvaluator<'a> {
    pub fn new(space: &'a FragmentSpace, size_penalty: f64) -> Self {
        Self {
            space,
            size_penalty,
        }
    }
}

impl Evaluator for AdditiveEvaluator<'_> {
    fn evaluate(&self, graph: &Graph) -> Result<Evaluation, EvaluationError> {
        let non_caps = graph
            .vertices()
            .filter(|(_, v)| v.kind() != BuildingBlockType::Cap)
            .count();
        if non_caps == 0 {
            return Err(EvaluationError::Rejected {
                graph_id: graph.graph_id(),
                reason: "no building block besides capping groups".into(),
            });
        }
        let contributions: f64 = graph
            .vertices()
            .map(|(_, v)| self.space.fitness_contribution(v.kind(), v.building_block_id()))
            .sum();
        let fitness = contributions - self.size_penalty * graph.heavy_atom_count() as f64;
        if !fitness.is_finite() {
            return Err(EvaluationError::Failed(format!(
                "non-finite fitness {fitness} for graph {}",
                graph.graph_id()
            )));
        }
        Ok(Evaluation {
            uid: graph.canonical_form(),
            fitness,
            representation: Some(graph.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::ids::IdGenerator;

    #[test]
    fn size_penalty_scales_with_heavy_atoms() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (g, _) = linear_graph(&space, &ids, 2);
        let plain = AdditiveEvaluator::new(&space, 0.0).evaluate(&g).unwrap();
        let penalized = AdditiveEvaluator::new(&space, 0.5).evaluate(&g).unwrap();
        let heavy = g.heavy_atom_count() as f64;
        assert!((plain.fitness - penalized.fitness - 0.5 * heavy).abs() < 1e-12);
    }

    #[test]
    fn isomorphic_graphs_share_a_uid() {
        let space = test_library();
        let ids = IdGenerator::new();
        let (a, _) = linear_graph(&space, &ids, 2);
        let (b, _) = linear_graph(&space, &ids, 2);
        let (c, _) = linear_graph(&space, &ids, 3);
        let evaluator = AdditiveEvaluator::new(&space, 0.1);
        let uid = |g: &Graph| evaluator.evaluate(g).unwrap().uid;
        assert_eq!(uid(&a), uid(&b));
        assert_ne!(uid(&a), uid(&c));
    }

    #[test]
    fn empty_graph_is_rejected() {
        let space = test_library();
        let evaluator = AdditiveEvaluator::new(&space, 0.1);
        assert!(matches!(
            evaluator.evaluate(&Graph::new()),
            Err(EvaluationError::Rejected { .. })
        ));
    }
}
