//! # FragForge Core Library
//!
//! An evolutionary design engine for graphs of building blocks connected through typed
//! attachment points.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear separation of concerns,
//! making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the graph model (`Graph`, `Vertex`, attachment points,
//!   rings and symmetric sets), structural editing primitives and the building-block library
//!   (`FragmentSpace`) every operation consults.
//!
//! - **[`engine`]: The Logic Core.** This layer owns the evolutionary machinery: the growth
//!   probability model, mutation and crossover operators, candidates, the thread-safe
//!   `Population` with its crossover-site cache, selection strategies and event counters.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer. It ties the
//!   `engine` and `core` together into candidate generation and a generational evolution driver.

pub mod core;
pub mod engine;
pub mod workflows;
