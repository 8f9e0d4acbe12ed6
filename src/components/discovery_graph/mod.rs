//! Incremental species-discovery graph rendered on a canvas.
//!
//! Sightings are revealed over time, deduplicated by species name and wired
//! together either by the user who made them or by taxonomic group.

mod api;
mod colors;
mod component;
mod config;
mod graph;
mod images;
mod ingest;
mod interaction;
mod labels;
mod merge;
mod physics;
mod render;
mod scheduler;
mod state;
mod types;
mod viewport;

pub use component::DiscoveryGraphCanvas;
pub use config::{GraphConfig, RevealMode};
pub use ingest::QuestBatch;
pub use state::NodeClick;
pub use types::{Point, SightingRecord};
