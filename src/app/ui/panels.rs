use eframe::egui::{self, Align, Color32, Context, Layout, RichText};

use crate::util::short_label;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context, data_url: &str, reload_requested: &mut bool) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("trail-graph");
                    ui.separator();
                    if let Some(node) = self.navigator.current_node() {
                        ui.label(format!("current: {}", short_label(node.title(), 40)));
                    }
                    ui.label(format!("nodes: {}", self.navigator.registry().len()));
                    ui.label(format!("data: {data_url}"));
                    if ui.button("Reload").clicked() {
                        *reload_requested = true;
                    }
                    if self.navigator.has_pending_work() {
                        ui.spinner();
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(error) = &self.last_error {
                            let dismissed = ui.small_button("x").clicked();
                            ui.label(RichText::new(error).color(Color32::from_rgb(240, 120, 110)));
                            if dismissed {
                                self.last_error = None;
                            }
                        }
                    });
                });

                self.draw_breadcrumbs(ui);
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }

    fn draw_breadcrumbs(&mut self, ui: &mut egui::Ui) {
        let mut clicked = None;
        ui.horizontal_wrapped(|ui| {
            let trail = self.navigator.trail();
            for (index, &key) in trail.iter().enumerate() {
                let Some(node) = self.navigator.registry().get(key) else {
                    continue;
                };
                if index > 0 {
                    ui.label("›");
                }
                let text = short_label(node.title(), 24).into_owned();
                if index + 1 == trail.len() {
                    ui.label(RichText::new(text).strong());
                } else if ui.link(text).clicked() {
                    clicked = Some(key);
                }
            }
        });

        if let Some(key) = clicked {
            self.navigate_to(key);
        }
    }
}
