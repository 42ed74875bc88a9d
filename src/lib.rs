pub mod cluster;
pub mod config;
pub mod engine;
pub mod geo;
pub mod icon;
pub mod map;
pub mod render;
pub mod scene;
pub mod sim;
pub mod spiderfier;

#[cfg(feature = "cli")]
pub mod cli;

pub use cluster::Cluster;
pub use config::{ClusterOptions, Config, OptionChange, OptionReaction, SpiderfierOptions};
pub use engine::{ClusterEngine, ClusterExpanded};
pub use geo::{LatLng, LatLngBounds, Point};
pub use map::{EventKind, EventTarget, Icon, MapEvent, MapHost, MarkerId};
pub use sim::SimMap;
pub use spiderfier::OverlapSpiderfier;

#[cfg(feature = "cli")]
pub use cli::run;
