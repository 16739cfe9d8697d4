//! # Core Module
//!
//! This module provides the data structures every other layer of FragForge builds on: the
//! building-block graph and the library describing which blocks exist and how they connect.
//!
//! ## Overview
//!
//! Nothing in here is stochastic. The graph exposes structural edits that either succeed and
//! leave every invariant intact or report why they could not proceed; deciding *which* edit to
//! attempt is the job of the [`engine`](crate::engine).
//!
//! ## Architecture
//!
//! - **Graph Representation** ([`models`]) - Vertices, attachment points, edges, rings, symmetric
//!   sets and embedded template graphs
//! - **Building-Block Library** ([`library`]) - Fragment space and ring-closure archive
//! - **Utilities** ([`utils`]) - Combinatorial helpers shared by the operators
//!
//! ## Key Capabilities
//!
//! - **Arena-backed graphs** whose keys survive cloning
//! - **Invariant-preserving edits** such as welding, vertex replacement and subgraph swapping
//! - **Canonical forms** for isomorphism checks between graphs and subgraphs

pub mod library;
pub mod models;
pub mod utils;
