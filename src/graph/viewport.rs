use eframe::egui::Vec2;
use tracing::debug;

use super::error::GraphResult;
use super::registry::{NodeKey, NodeRegistry};
use super::render::RenderSink;

const REFERENCE_TRAVEL_PX: f64 = 260.0;
const REFERENCE_TRAVEL_MS: f64 = 600.0;
const MAX_PAN_MS: f64 = 3000.0;

/// Current viewport translation (screen pixels) and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanRequest {
    pub target: Vec2,
    pub duration_ms: f64,
}

/// Computes where the viewport has to go to center a node.
///
/// Screen position of a world point is `viewport_center + pan + world * zoom`,
/// and node positions name node centers, so centering a node is a matter of
/// cancelling its scaled world position.
#[derive(Clone, Copy, Debug)]
pub struct ViewportController {
    pub travel_px: f64,
    pub travel_ms: f64,
    pub max_duration_ms: f64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self {
            travel_px: REFERENCE_TRAVEL_PX,
            travel_ms: REFERENCE_TRAVEL_MS,
            max_duration_ms: MAX_PAN_MS,
        }
    }
}

impl ViewportController {
    /// Pan duration that keeps the perceived speed constant.
    pub fn travel_duration(&self, from: Vec2, to: Vec2) -> f64 {
        let distance = f64::from((to - from).length());
        ((distance / self.travel_px) * self.travel_ms)
            .floor()
            .min(self.max_duration_ms)
    }

    pub fn pan_to(&self, world_center: Vec2, view: ViewState) -> PanRequest {
        let target = -(world_center * view.zoom);
        PanRequest {
            target,
            duration_ms: self.travel_duration(view.pan, target),
        }
    }

    /// Issue one pan request that brings `key` to the middle of the viewport.
    pub fn center_on<S>(
        &self,
        registry: &NodeRegistry,
        key: NodeKey,
        view: ViewState,
        sink: &mut S,
    ) -> GraphResult<PanRequest>
    where
        S: RenderSink + ?Sized,
    {
        registry.node(key)?;
        let world_center = registry.absolute_position(key).unwrap_or_default();
        let request = self.pan_to(world_center, view);
        debug!(%key, target = ?request.target, duration_ms = request.duration_ms, "centering viewport");
        sink.pan_viewport_to(request.target, request.duration_ms);
        Ok(request)
    }
}
