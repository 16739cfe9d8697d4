//! # Workflows Module
//!
//! This module provides the high-level entry points that tie the [`engine`](crate::engine)
//! operators into complete procedures.
//!
//! ## Overview
//!
//! Workflows are what a front end calls. They own the id generator and the per-generation
//! monitors of a run, decide how each new candidate is produced, and report progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter).
//!
//! ## Architecture
//!
//! - **Candidate Generation** ([`generate`]) - Crossover, mutation, construction from scratch and
//!   manual addition, each with its own failure counters
//! - **Evolution** ([`evolve`]) - Initial population, generations of offspring, duplicate
//!   rejection and trimming
//!
//! ## Key Capabilities
//!
//! - **Reproducible parallel generations** with one random stream per production slot
//! - **Attempt budgets** that abandon unproductive requests instead of looping forever
//! - **Per-generation monitors** ready to be written as reports

pub mod evolve;
pub mod generate;
