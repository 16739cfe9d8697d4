use super::evaluation::Evaluation;
use crate::core::models::graph::Graph;
use std::fmt;

/// How a candidate came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    Crossover,
    Mutation,
    Construction,
    Manual,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Crossover => "CROSSOVER",
                Self::Mutation => "MUTATION",
                Self::Construction => "CONSTRUCTION",
                Self::Manual => "MANUAL",
            }
        )
    }
}

/// A member of the search space: a graph that survived validation, its identity and fitness.
#[derive(Debug, Clone)]
pub struct Candidate {
    name: String,
    uid: String,
    fitness: Option<f64>,
    generation: usize,
    source: CandidateSource,
    representation: Option<String>,
    graph: Graph,
}

impl Candidate {
    pub fn new(name: impl Into<String>, graph: Graph, generation: usize, source: CandidateSource) -> Self {
        Self {
            name: name.into(),
            uid: String::new(),
            fitness: None,
            generation,
            source,
            representation: None,
            graph,
        }
    }

    /// Attaches the outcome of an evaluation.
    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.uid = evaluation.uid;
        self.fitness = Some(evaluation.fitness);
        self.representation = evaluation.representation;
        self
    }

    /// Candidate names are built from the candidate counter, zero padded.
    pub fn name_for(candidate_id: u64) -> String {
        format!("M{candidate_id:08}")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// `None` until the candidate has been evaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn source(&self) -> CandidateSource {
        self.source
    }

    pub fn representation(&self) -> Option<&str> {
        self.representation.as_deref()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fitness {
            Some(fitness) => write!(f, "{} [{}] fitness={fitness:.4}", self.name, self.uid),
            None => write!(f, "{} [{}] unevaluated", self.name, self.uid),
        }
    }
}
