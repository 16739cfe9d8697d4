//! # Engine Module
//!
//! This module implements the evolutionary machinery of FragForge: the stochastic operators
//! that edit building-block graphs and the population layer that decides which graphs get
//! edited.
//!
//! ## Overview
//!
//! Operators never edit a graph that is shared. Callers clone the graph of a parent, hand the
//! clone to an operator together with a [`context::GaContext`] and an explicit random number
//! generator, and drop the clone if the operator reports failure. Expected failures are `false`
//! or `None` returns counted on the [`monitor::Monitor`]; contract violations are
//! [`error::EngineError`]s.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters, growth gates and their builder
//! - **Context** ([`context`]) - The shared references every operator needs
//! - **Growth** ([`growth`]) - Probabilistic extension of graphs from their free attachment points
//! - **Mutation** ([`mutation`], [`link_finder`]) - Single and multi-site graph mutations
//! - **Crossover** ([`crossover`]) - Site discovery and subgraph swapping between two graphs
//! - **Rings** ([`rings`]) - Closing rings between ring-closing vertices
//! - **Candidates** ([`candidate`], [`evaluation`]) - Validated graphs with identity and fitness
//! - **Population** ([`population`], [`selection`]) - Thread-safe members, crossover-site cache
//!   and parent selection
//! - **Observability** ([`monitor`], [`progress`]) - Event counters and progress callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **All-or-nothing edits** performed on clones owned by the attempt
//! - **Reproducible randomness** through injected, seedable generators
//! - **Parallel crossover-site discovery** behind the `parallel` feature

pub mod candidate;
pub mod config;
pub mod context;
pub mod crossover;
pub mod error;
pub mod evaluation;
pub mod growth;
pub mod link_finder;
pub mod monitor;
pub mod mutation;
pub mod population;
pub mod progress;
pub mod rings;
pub mod selection;
pub(crate) mod utils;
