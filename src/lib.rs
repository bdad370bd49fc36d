//! Graphlens - Interactive Entity-Relation Graph Viewer
//!
//! Loads project graphs from a backend or from host-supplied data, lays them
//! out, and serves selection, search, zoom and export against a single render
//! surface per mount point.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod visualization;
