//! # Core Models Module
//!
//! This module contains the data structures used to represent building-block graphs.
//!
//! ## Overview
//!
//! A [`graph::Graph`] owns its [`vertex::Vertex`] and [`edge::Edge`] values in slot-map arenas.
//! Every other structure refers to them by key:
//!
//! - **Attachment points** know the edge that uses them
//! - **Edges** name the two attachment points they join
//! - **Rings** list the vertices along a cycle closed by two ring-closing vertices
//! - **Symmetric sets** group vertices that must be edited together
//!
//! ## Key Components
//!
//! - [`ids`] - Arena keys, attachment-point references and the id generator
//! - [`attachment_point`] - Typed attachment points and their classes
//! - [`vertex`] - Vertices, building-block roles and mutation types
//! - [`edge`] - Directed parent-to-child edges and bond orders
//! - [`ring`] - Rings and closable chains
//! - [`symmetry`] - Symmetric vertex sets
//! - [`template`] - Graphs embedded inside template vertices
//! - [`graph`] - The graph itself and every structural edit on it

pub mod attachment_point;
pub mod edge;
pub mod graph;
pub mod ids;
pub mod ring;
pub mod symmetry;
pub mod template;
pub mod vertex;
