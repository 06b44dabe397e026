use std::collections::{HashMap, HashSet};

use eframe::egui::Vec2;

use super::config::EvictionPolicy;
use super::error::FetchError;
use super::gateway::{ChildGateway, FetchReply};
use super::model::{ChildDescriptor, DisplayData, NodeDescriptor};
use super::registry::{FetchTicket, NodeKey, NodeRegistry, NodeSeed};
use super::render::{ConnectorHandle, ConnectorStyle, RenderSink};

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    DrawConnector {
        handle: ConnectorHandle,
        from: Vec2,
        to: Vec2,
    },
    UpdateConnector {
        handle: ConnectorHandle,
        to: Vec2,
    },
    ConnectorWidth {
        handle: ConnectorHandle,
        width: f32,
    },
    RemoveConnector(ConnectorHandle),
    Animate {
        node: NodeKey,
        target: Vec2,
        duration_ms: f64,
        opacity: Option<f32>,
    },
    RemoveElement(NodeKey),
    Pan {
        target: Vec2,
        duration_ms: f64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorState {
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
    pub colour: String,
}

#[derive(Default)]
pub struct RecordingSink {
    pub calls: Vec<RenderCall>,
    pub connectors: HashMap<ConnectorHandle, ConnectorState>,
    pub positions: HashMap<NodeKey, Vec2>,
    next_handle: u64,
}

impl RecordingSink {
    pub const HALF_EXTENT: Vec2 = Vec2::new(40.0, 15.0);

    pub fn pans(&self) -> Vec<(Vec2, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RenderCall::Pan {
                    target,
                    duration_ms,
                } => Some((*target, *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn removed_elements(&self) -> HashSet<NodeKey> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RenderCall::RemoveElement(key) => Some(*key),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn measure(&mut self, _label: &str) -> Vec2 {
        Self::HALF_EXTENT
    }

    fn draw_connector(&mut self, from: Vec2, to: Vec2, style: &ConnectorStyle) -> ConnectorHandle {
        self.next_handle += 1;
        let handle = ConnectorHandle(self.next_handle);
        self.connectors.insert(
            handle,
            ConnectorState {
                from,
                to,
                width: style.width,
                colour: style.colour.clone(),
            },
        );
        self.calls
            .push(RenderCall::DrawConnector { handle, from, to });
        handle
    }

    fn update_connector(&mut self, handle: ConnectorHandle, from: Vec2, to: Vec2, _duration_ms: f64) {
        if let Some(state) = self.connectors.get_mut(&handle) {
            state.from = from;
            state.to = to;
        }
        self.calls.push(RenderCall::UpdateConnector { handle, to });
    }

    fn set_connector_width(&mut self, handle: ConnectorHandle, width: f32) {
        if let Some(state) = self.connectors.get_mut(&handle) {
            state.width = width;
        }
        self.calls.push(RenderCall::ConnectorWidth { handle, width });
    }

    fn remove_connector(&mut self, handle: ConnectorHandle) {
        self.connectors.remove(&handle);
        self.calls.push(RenderCall::RemoveConnector(handle));
    }

    fn animate_position(
        &mut self,
        node: NodeKey,
        target: Vec2,
        duration_ms: f64,
        opacity: Option<f32>,
    ) {
        self.positions.insert(node, target);
        self.calls.push(RenderCall::Animate {
            node,
            target,
            duration_ms,
            opacity,
        });
    }

    fn remove_element(&mut self, node: NodeKey) {
        self.positions.remove(&node);
        self.calls.push(RenderCall::RemoveElement(node));
    }

    fn pan_viewport_to(&mut self, target: Vec2, duration_ms: f64) {
        self.calls.push(RenderCall::Pan {
            target,
            duration_ms,
        });
    }
}

/// Gateway whose replies wait until the test releases them.
#[derive(Default)]
pub struct ScriptedGateway {
    nodes: HashMap<String, Result<NodeDescriptor, String>>,
    pub requested: Vec<(FetchTicket, String)>,
    pub cancelled: Vec<FetchTicket>,
    queued: Vec<(FetchTicket, String)>,
    ready: Vec<FetchReply>,
}

impl ScriptedGateway {
    pub fn with_node(mut self, id: &str, children: &[&str]) -> Self {
        let children = children
            .iter()
            .map(|child| ChildDescriptor::new(*child).with_title(&child.to_uppercase()))
            .collect();
        self.nodes
            .insert(id.to_owned(), Ok(NodeDescriptor::with_children(children)));
        self
    }

    pub fn with_failure(mut self, id: &str, message: &str) -> Self {
        self.nodes.insert(id.to_owned(), Err(message.to_owned()));
        self
    }

    pub fn requests_for(&self, id: &str) -> usize {
        self.requested
            .iter()
            .filter(|(_, requested)| requested == id)
            .count()
    }

    /// Deliver every queued request on the next poll.
    pub fn release_all(&mut self) {
        for (ticket, id) in std::mem::take(&mut self.queued) {
            let result = match self.nodes.get(&id) {
                Some(Ok(node)) => Ok(node.clone()),
                Some(Err(message)) => Err(FetchError::Rejected(message.clone())),
                None => Err(FetchError::Rejected(format!("no such node {id}"))),
            };
            self.ready.push(FetchReply {
                ticket,
                node_id: id,
                result,
            });
        }
    }
}

impl ChildGateway for ScriptedGateway {
    fn request(&mut self, ticket: FetchTicket, node_id: &str) {
        self.requested.push((ticket, node_id.to_owned()));
        self.queued.push((ticket, node_id.to_owned()));
    }

    fn cancel(&mut self, ticket: FetchTicket) {
        self.cancelled.push(ticket);
    }

    fn poll(&mut self) -> Vec<FetchReply> {
        std::mem::take(&mut self.ready)
    }
}

/// Key of a freshly created root, for sinks tested without an engine.
pub fn sample_key() -> NodeKey {
    let mut registry = NodeRegistry::new();
    let display = DisplayData::new();
    let (key, _) = registry.create_root(
        NodeSeed {
            id: "root",
            kind: None,
            display: &display,
            label: "root".to_owned(),
            line_colour: "#fff".to_owned(),
            half_extent: Vec2::ZERO,
        },
        &NodeDescriptor::default(),
        EvictionPolicy::Retain,
    );
    key
}
