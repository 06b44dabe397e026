mod config;
mod error;
mod gateway;
mod geometry;
mod layout;
mod model;
mod navigation;
mod registry;
mod render;
mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EvictionPolicy, GraphConfig};
pub use gateway::FileGateway;
pub use navigation::{GraphEvent, Navigator};
pub use registry::{ChildCache, NodeKey, VisualState};
pub use render::{ConnectorHandle, ConnectorStyle, RenderSink};
pub use viewport::ViewState;
