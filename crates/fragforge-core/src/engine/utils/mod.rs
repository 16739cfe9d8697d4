//! Utility functions for the engine module.
//!
//! Weighted random draws shared by the genetic operators and the candidate-generation loop.

pub mod sampling;
