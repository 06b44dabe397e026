use std::time::Instant;

use anyhow::Context as _;
use eframe::egui::{self, Context};
use tracing::{debug, info, warn};

use crate::graph::{FileGateway, GraphConfig, GraphEvent, Navigator, NodeKey};

mod graph;
mod render_utils;
mod scene;
mod ui;

use scene::Scene;

pub struct TrailGraphApp {
    config: GraphConfig,
    data_url: String,
    state: AppState,
}

enum AppState {
    Loading(Box<ViewModel>),
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    navigator: Navigator<FileGateway>,
    scene: Scene,
    clock: Instant,
    search: String,
    fixed_start_angle: bool,
    last_error: Option<String>,
    root_error: Option<String>,
}

impl TrailGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: GraphConfig, data_url: String) -> Self {
        let state = Self::start_load(&config, &data_url);
        Self {
            config,
            data_url,
            state,
        }
    }

    fn start_load(config: &GraphConfig, data_url: &str) -> AppState {
        match ViewModel::new(config.clone(), data_url) {
            Ok(model) => AppState::Loading(Box::new(model)),
            Err(error) => AppState::Error(format!("{error:#}")),
        }
    }
}

impl ViewModel {
    fn new(config: GraphConfig, data_url: &str) -> anyhow::Result<Self> {
        let fixed_start_angle = config.start_angle.is_some();
        let mut navigator = Navigator::new(config, FileGateway::new(data_url))
            .context("invalid graph configuration")?;
        let mut scene = Scene::new();
        navigator.start(&mut scene);

        Ok(Self {
            navigator,
            scene,
            clock: Instant::now(),
            search: String::new(),
            fixed_start_angle,
            last_error: None,
            root_error: None,
        })
    }

    fn now_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    fn tick(&mut self, ctx: &Context) {
        let now = self.now_ms();
        self.scene.set_time(now);
        let view = self.scene.view();
        if let Err(error) = self.navigator.poll(now, view, &mut self.scene) {
            warn!(%error, "failed to apply graph update");
        }
        if self.scene.take_pan_settled() {
            self.navigator.viewport_settled();
        }

        for event in self.navigator.drain_events() {
            self.handle_event(event);
        }

        if self.scene.is_animating() || self.navigator.has_pending_work() {
            ctx.request_repaint();
        }
    }

    fn handle_event(&mut self, event: GraphEvent) {
        match event {
            GraphEvent::SelectionChanged(key) => {
                if let Some(node) = self.navigator.registry().get(key) {
                    info!(id = %node.id, title = node.title(), "selection changed");
                }
            }
            GraphEvent::ChildrenLaidOut { parent, added } => {
                debug!(%parent, added, "children laid out");
            }
            GraphEvent::FetchFailed { node_id, error } => {
                let message = format!("{node_id}: {:#}", anyhow::Error::new(error));
                if self.navigator.start_node().is_none() {
                    self.root_error = Some(message.clone());
                }
                self.last_error = Some(message);
            }
            GraphEvent::Centered(key) => {
                debug!(%key, "viewport centered");
            }
        }
    }

    /// Select `key` and pan to it, the way a click on the canvas does.
    pub(in crate::app) fn navigate_to(&mut self, key: NodeKey) {
        let now = self.now_ms();
        self.scene.set_time(now);
        let view = self.scene.view();
        if let Err(error) = self.navigator.navigate(key, now, view, &mut self.scene) {
            warn!(%error, "navigation failed");
        }
    }
}

impl eframe::App for TrailGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut reload_requested = false;

        match &mut self.state {
            AppState::Loading(model) => {
                model.tick(ctx);
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!(
                            "Loading {}...",
                            model.navigator.config().initial_node_id
                        ));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the start node");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        reload_requested = true;
                    }
                });
            }
            AppState::Ready(model) => {
                model.tick(ctx);
                model.show(ctx, &self.data_url, &mut reload_requested);
            }
        }

        let state = std::mem::replace(&mut self.state, AppState::Error(String::new()));
        self.state = match state {
            _ if reload_requested => Self::start_load(&self.config, &self.data_url),
            AppState::Loading(mut model) | AppState::Ready(mut model) => {
                match model.root_error.take() {
                    Some(error) => AppState::Error(error),
                    None if model.navigator.start_node().is_some() => AppState::Ready(model),
                    None => AppState::Loading(model),
                }
            }
            error => error,
        };
    }
}
