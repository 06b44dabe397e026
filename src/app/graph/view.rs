use eframe::egui::{self, Align2, Color32, CornerRadius, FontId, Rect, Sense, Stroke, Ui, Vec2, vec2};

use crate::graph::{NodeKey, VisualState};
use crate::util::short_label;

use super::super::ViewModel;
use super::super::render_utils::{blend_color, draw_background, fade, parse_hex_colour, world_to_screen};
use super::super::scene::{LABEL_FONT_SIZE, MAX_LABEL_CHARS};

const IDLE_FILL: Color32 = Color32::from_rgb(38, 46, 58);
const TRAIL_FILL: Color32 = Color32::from_rgb(74, 92, 118);
const SELECTED_FILL: Color32 = Color32::from_rgb(245, 206, 93);
const HOVER_FILL: Color32 = Color32::from_rgb(255, 164, 101);

impl ViewModel {
    fn animated_position(&self, key: NodeKey) -> Option<Vec2> {
        let registry = self.navigator.registry();
        let mut position = Vec2::ZERO;
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let node = registry.get(current)?;
            position += self.scene.node_offset(current).unwrap_or(node.offset);
            cursor = node.parent();
        }
        Some(position)
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);

        let view = self.scene.view();
        draw_background(&painter, rect, view.pan, view.zoom);

        let width_scale = view.zoom.sqrt();
        for (from, to, connector) in self.scene.connectors() {
            painter.line_segment(
                [
                    world_to_screen(rect, view.pan, view.zoom, from),
                    world_to_screen(rect, view.pan, view.zoom, to),
                ],
                Stroke::new(connector.width * width_scale, connector.colour),
            );
        }

        let registry = self.navigator.registry();
        if registry.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No nodes on screen",
                FontId::proportional(16.0),
                Color32::from_gray(160),
            );
            return;
        }

        let mut boxes = Vec::with_capacity(registry.len());
        for (key, node) in registry.iter() {
            let Some(world) = self.animated_position(key) else {
                continue;
            };
            let center = world_to_screen(rect, view.pan, view.zoom, world);
            let node_rect = Rect::from_center_size(center, node.half_extent * 2.0 * view.zoom);
            if !rect.intersects(node_rect) {
                continue;
            }
            boxes.push((key, node_rect, self.scene.node_opacity(key)));
        }

        let hovered = self.hovered_node(ui, &boxes);
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        let font = FontId::proportional(LABEL_FONT_SIZE * view.zoom);
        for &(key, node_rect, opacity) in &boxes {
            let Some(node) = registry.get(key) else {
                continue;
            };
            let accent = parse_hex_colour(&node.line_colour).unwrap_or(Color32::WHITE);
            let base = match node.visual_state {
                VisualState::Selected => SELECTED_FILL,
                VisualState::Trailing => blend_color(TRAIL_FILL, accent, 0.18),
                VisualState::Idle => IDLE_FILL,
            };
            let fill = if hovered == Some(key) && node.visual_state != VisualState::Selected {
                blend_color(base, HOVER_FILL, 0.55)
            } else {
                base
            };
            let text_colour = if node.visual_state == VisualState::Selected {
                Color32::from_gray(20)
            } else {
                Color32::from_gray(238)
            };

            let rounding = CornerRadius::same((6.0 * view.zoom).round().clamp(1.0, 16.0) as u8);
            painter.rect_filled(node_rect, rounding, fade(fill, opacity));
            painter.rect_stroke(
                node_rect,
                rounding,
                Stroke::new(1.5, fade(accent, opacity)),
                egui::StrokeKind::Inside,
            );
            painter.text(
                node_rect.center(),
                Align2::CENTER_CENTER,
                short_label(&node.label, MAX_LABEL_CHARS),
                font.clone(),
                fade(text_colour, opacity),
            );
        }

        if let Some(key) = hovered
            && let Some(node) = registry.get(key)
        {
            let panel_text = format!(
                "{}  |  id {}  |  children {} ({})",
                node.title(),
                node.id,
                node.children().len(),
                node.cache.label()
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if response.dragged() {
            ui.ctx().request_repaint();
        }

        if response.clicked_by(egui::PointerButton::Primary)
            && let Some(key) = hovered
        {
            self.navigate_to(key);
        }
    }
}
