use eframe::egui::Vec2;

use super::registry::NodeKey;

/// Sink-owned identifier for one connector line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectorHandle(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorStyle {
    pub width: f32,
    pub colour: String,
}

/// Drawing surface the engine drives.
///
/// Points are world coordinates with the root anchored at the origin. Element
/// offsets are relative to the element's parent. Every animation request
/// supersedes whatever animation the same element or connector was running.
pub trait RenderSink {
    /// Half width and half height of a node showing `label`.
    fn measure(&mut self, label: &str) -> Vec2;

    fn draw_connector(&mut self, from: Vec2, to: Vec2, style: &ConnectorStyle)
    -> ConnectorHandle;

    fn update_connector(&mut self, handle: ConnectorHandle, from: Vec2, to: Vec2, duration_ms: f64);

    fn set_connector_width(&mut self, handle: ConnectorHandle, width: f32);

    fn remove_connector(&mut self, handle: ConnectorHandle);

    fn animate_position(
        &mut self,
        node: NodeKey,
        target: Vec2,
        duration_ms: f64,
        opacity: Option<f32>,
    );

    fn remove_element(&mut self, node: NodeKey);

    /// Move the viewport translation to `target` screen pixels.
    fn pan_viewport_to(&mut self, target: Vec2, duration_ms: f64);
}
