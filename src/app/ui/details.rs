use eframe::egui::{self, RichText, Ui};
use serde_json::Value;
use tracing::warn;

use crate::graph::{ChildCache, NodeKey};
use crate::util::short_label;

use super::super::ViewModel;

const MAX_FIELD_CHARS: usize = 160;

enum DetailAction {
    ShowChildren(NodeKey),
    RemoveChildren(NodeKey),
    Navigate(NodeKey),
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected) = self.navigator.selected() else {
            ui.label("Nothing is selected yet.");
            return;
        };
        let registry = self.navigator.registry();
        let Some(node) = registry.get(selected) else {
            ui.label("The selected node is no longer on screen.");
            return;
        };

        let mut action = None;

        ui.label(RichText::new(node.title()).strong());
        ui.small(format!("id {}", node.id));
        ui.add_space(6.0);

        if let Some(kind) = &node.kind {
            ui.label(format!("Type: {kind}"));
        }
        ui.label(format!("Depth: {}", node.depth));
        ui.label(format!(
            "Children: {} on screen, {}",
            node.children().len(),
            node.cache.label()
        ));
        ui.label(format!(
            "Data: {}",
            self.navigator.gateway().location_for(&node.id).display()
        ));

        ui.separator();
        ui.horizontal_wrapped(|ui| {
            let loading = matches!(node.cache, ChildCache::Pending(_));
            if ui
                .add_enabled(!loading, egui::Button::new("Show children"))
                .clicked()
            {
                action = Some(DetailAction::ShowChildren(selected));
            }
            if ui
                .add_enabled(!node.children().is_empty(), egui::Button::new("Remove children"))
                .clicked()
            {
                action = Some(DetailAction::RemoveChildren(selected));
            }
            if let Some(parent) = node.parent()
                && ui.button("Go to parent").clicked()
            {
                action = Some(DetailAction::Navigate(parent));
            }
        });

        if !node.display.is_empty() {
            ui.separator();
            ui.label(RichText::new("Fields").strong());
            egui::Grid::new("display_fields")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui| {
                    for (name, value) in &node.display {
                        let text = match value {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        };
                        ui.label(name.as_str());
                        ui.label(short_label(&text, MAX_FIELD_CHARS).into_owned());
                        ui.end_row();
                    }
                });
        }

        let children = node.children();
        if !children.is_empty() {
            ui.separator();
            ui.label(RichText::new("Children").strong());
            egui::ScrollArea::vertical()
                .id_salt("details_children_scroll")
                .max_height(220.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for &child in children {
                        let Some(child_node) = registry.get(child) else {
                            continue;
                        };
                        if ui.link(short_label(child_node.title(), 40).into_owned()).clicked() {
                            action = Some(DetailAction::Navigate(child));
                        }
                    }
                });
        }

        let Some(action) = action else {
            return;
        };
        let result = match action {
            DetailAction::ShowChildren(key) => self.navigator.children_of(key, &mut self.scene),
            DetailAction::RemoveChildren(key) => {
                self.navigator.remove_children(key, &mut self.scene)
            }
            DetailAction::Navigate(key) => {
                self.navigate_to(key);
                Ok(())
            }
        };
        if let Err(error) = result {
            warn!(%error, "node action failed");
        }
    }
}
