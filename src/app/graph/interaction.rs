use eframe::egui::{self, Pos2, Rect, Ui, Vec2};

use crate::graph::NodeKey;

use super::super::ViewModel;

const ZOOM_STEP: f32 = 1.5;

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.scene.zoom_about(pointer - rect.center(), zoom_factor);
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Primary)
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.scene.drag(response.drag_delta());
        }
    }

    pub(in crate::app) fn step_zoom(&mut self, steps: i32) {
        self.scene.zoom_about(Vec2::ZERO, ZOOM_STEP.powi(steps));
    }

    pub(in crate::app) fn hovered_node(
        &self,
        ui: &Ui,
        boxes: &[(NodeKey, Rect, f32)],
    ) -> Option<NodeKey> {
        let pointer: Pos2 = ui.input(|input| input.pointer.hover_pos())?;
        boxes
            .iter()
            .rev()
            .find(|(_, rect, _)| rect.contains(pointer))
            .map(|(key, _, _)| *key)
    }
}
