use eframe::egui::{self, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::warn;

use crate::graph::{EvictionPolicy, NodeKey};
use crate::util::short_label;

use super::super::ViewModel;

const MAX_SEARCH_RESULTS: usize = 30;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search visible nodes")
            .on_hover_text("Fuzzy-match titles and ids of the nodes currently on screen.");
        ui.text_edit_singleline(&mut self.search);
        if let Some(key) = self.draw_search_results(ui) {
            self.navigate_to(key);
        }

        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("−").on_hover_text("Zoom out").clicked() {
                self.step_zoom(-1);
            }
            ui.label(format!("{:.0}%", self.scene.zoom() * 100.0));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.step_zoom(1);
            }
            if ui
                .button("Center selection")
                .on_hover_text("Pan back to the selected node.")
                .clicked()
                && let Some(key) = self.navigator.selected()
            {
                self.recenter(key);
            }
        });

        ui.separator();

        egui::CollapsingHeader::new("Layout")
            .default_open(true)
            .show(ui, |ui| self.draw_layout_options(ui));

        egui::CollapsingHeader::new("Behaviour")
            .default_open(true)
            .show(ui, |ui| self.draw_behaviour_options(ui));
    }

    fn draw_search_results(&self, ui: &mut Ui) -> Option<NodeKey> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let matcher = SkimMatcherV2::default();
        let mut matches = self
            .navigator
            .registry()
            .iter()
            .filter_map(|(key, node)| {
                let score = fuzzy_match_score(&matcher, node.title(), query)
                    .max(fuzzy_match_score(&matcher, &node.id, query))?;
                Some((score, key, node))
            })
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.2.depth.cmp(&b.2.depth)));

        if matches.is_empty() {
            ui.small("No matching nodes on screen.");
            return None;
        }

        let mut picked = None;
        egui::ScrollArea::vertical()
            .id_salt("search_results_scroll")
            .max_height(180.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for (_, key, node) in matches.iter().take(MAX_SEARCH_RESULTS) {
                    let label = format!("{}  ({})", short_label(node.title(), 36), node.id);
                    if ui.link(label).clicked() {
                        picked = Some(*key);
                    }
                }
            });
        picked
    }

    fn draw_layout_options(&mut self, ui: &mut Ui) {
        let config = self.navigator.config_mut();

        ui.add(egui::Slider::new(&mut config.distance_nodes, 60.0..=600.0).text("Node distance"))
            .on_hover_text("Border-to-border spacing of nodes off the trail.");
        ui.add(
            egui::Slider::new(&mut config.distance_increment, 1.0..=4.0)
                .text("Selected spacing ×"),
        )
        .on_hover_text("Multiplier applied to the spacing of the selected node.");
        ui.add(egui::Slider::new(&mut config.variation, 0.0..=200.0).text("Variation"))
            .on_hover_text("Alternate sibling distances in and out by this amount.");
        ui.add(egui::Slider::new(&mut config.angle_limit, 30.0..=360.0).text("Angle limit"))
            .on_hover_text("Arc shared by the children of a non-root node.");
        ui.add(
            egui::Slider::new(&mut config.move_time, 0.0..=3000.0)
                .step_by(50.0)
                .text("Move time (ms)"),
        )
        .on_hover_text("Animation length, also the delay before children are shown.");
        ui.add(egui::Slider::new(&mut config.line_width, 0.5..=12.0).text("Line width"));
        ui.add(
            egui::Slider::new(&mut config.line_width_selected, 0.5..=12.0)
                .text("Trail line width"),
        );
        ui.small("Spacing changes apply to nodes laid out from now on.");

        ui.separator();

        let mut start_angle = self.navigator.config().start_angle.unwrap_or(0.0);
        let toggled = ui
            .checkbox(&mut self.fixed_start_angle, "Fixed start angle")
            .on_hover_text("Otherwise the root's children start at a random angle.")
            .changed();
        let moved = ui
            .add_enabled(
                self.fixed_start_angle,
                egui::Slider::new(&mut start_angle, 0.0..=359.0).text("Start angle"),
            )
            .changed();
        if toggled || moved {
            self.navigator
                .set_start_angle(self.fixed_start_angle.then_some(start_angle));
        }
    }

    fn draw_behaviour_options(&mut self, ui: &mut Ui) {
        let config = self.navigator.config_mut();

        ui.checkbox(&mut config.return_to_parent, "Return to parent on reselect")
            .on_hover_text("Clicking the selected node again selects its parent.");
        ui.checkbox(&mut config.show_children, "Show children after select")
            .on_hover_text("Fetch and lay out the children of each newly selected node.");
        ui.checkbox(&mut config.prune_off_trail, "Hide siblings off the trail")
            .on_hover_text("Only nodes on the trail keep their children on screen.");

        let mut eviction = config.eviction;
        egui::ComboBox::from_label("Fetched children")
            .selected_text(match eviction {
                EvictionPolicy::Retain => "retain",
                EvictionPolicy::Discard => "discard",
            })
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut eviction, EvictionPolicy::Retain, "retain")
                    .on_hover_text("Keep fetched children so re-expanding is instant.");
                ui.selectable_value(&mut eviction, EvictionPolicy::Discard, "discard")
                    .on_hover_text("Fetch children again every time a node expands.");
            });
        if eviction != self.navigator.config().eviction {
            self.navigator.set_eviction(eviction);
        }
    }

    fn recenter(&mut self, key: NodeKey) {
        let view = self.scene.view();
        if let Err(error) = self.navigator.center_on(key, view, &mut self.scene) {
            warn!(%error, "could not center the selection");
        }
    }
}
