//! Domain models for the entity-relation graph and engine state.

mod entity;
mod filter;
mod graph;
mod state;

pub use entity::{property_number, Entity, Properties, Relation};
pub use filter::FilterOptions;
pub use graph::{
    DomainGraph, ExternalEdge, ExternalNode, GraphData, GraphQuery, GraphResponse,
    GraphStatistics, VisualOverride, VisualOverrides,
};
pub use state::{LoadStatus, Notice, NoticeLevel, Point, Selection, ViewportState};
