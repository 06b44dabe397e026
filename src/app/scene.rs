use std::collections::HashMap;
use std::ops::{Add, Mul, Sub};

use eframe::egui::{Color32, Vec2, vec2};

use crate::graph::{ConnectorHandle, ConnectorStyle, NodeKey, RenderSink, ViewState};
use crate::util::short_label;

use super::render_utils::parse_hex_colour;

pub(super) const LABEL_FONT_SIZE: f32 = 14.0;
pub(super) const MAX_LABEL_CHARS: usize = 32;
const CHAR_WIDTH: f32 = 0.56;
const LABEL_PADDING: Vec2 = vec2(12.0, 8.0);

pub(super) const MIN_ZOOM: f32 = 4.0 / 9.0;
pub(super) const MAX_ZOOM: f32 = 2.25;

type EasingFn = fn(f32) -> f32;

fn linear(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Clone, Copy, Debug)]
struct Tween<T> {
    from: T,
    to: T,
    start_ms: f64,
    duration_ms: f64,
}

impl<T> Tween<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>,
{
    fn settled(value: T) -> Self {
        Self {
            from: value,
            to: value,
            start_ms: 0.0,
            duration_ms: 0.0,
        }
    }

    fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    fn sample(&self, now_ms: f64, ease: EasingFn) -> T {
        self.from + (self.to - self.from) * ease(self.progress(now_ms))
    }

    fn done(&self, now_ms: f64) -> bool {
        self.progress(now_ms) >= 1.0
    }

    fn retarget(&mut self, to: T, now_ms: f64, duration_ms: f64, ease: EasingFn) {
        self.from = self.sample(now_ms, ease);
        self.to = to;
        self.start_ms = now_ms;
        self.duration_ms = duration_ms.max(0.0);
    }
}

struct NodeSprite {
    offset: Tween<Vec2>,
    opacity: Tween<f32>,
}

pub(super) struct ConnectorSprite {
    from: Tween<Vec2>,
    to: Tween<Vec2>,
    pub(super) width: f32,
    pub(super) colour: Color32,
}

pub(super) struct Scene {
    now_ms: f64,
    nodes: HashMap<NodeKey, NodeSprite>,
    connectors: HashMap<ConnectorHandle, ConnectorSprite>,
    next_connector: u64,
    pan: Tween<Vec2>,
    pan_settling: bool,
    zoom: f32,
}

impl Scene {
    pub(super) fn new() -> Self {
        Self {
            now_ms: 0.0,
            nodes: HashMap::new(),
            connectors: HashMap::new(),
            next_connector: 0,
            pan: Tween::settled(Vec2::ZERO),
            pan_settling: false,
            zoom: 1.0,
        }
    }

    pub(super) fn set_time(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    pub(super) fn view(&self) -> ViewState {
        ViewState {
            pan: self.pan.sample(self.now_ms, ease_in_out_cubic),
            zoom: self.zoom,
        }
    }

    pub(super) fn node_offset(&self, key: NodeKey) -> Option<Vec2> {
        self.nodes
            .get(&key)
            .map(|sprite| sprite.offset.sample(self.now_ms, ease_out_cubic))
    }

    pub(super) fn node_opacity(&self, key: NodeKey) -> f32 {
        self.nodes
            .get(&key)
            .map_or(1.0, |sprite| sprite.opacity.sample(self.now_ms, linear))
    }

    pub(super) fn connectors(&self) -> impl Iterator<Item = (Vec2, Vec2, &ConnectorSprite)> {
        self.connectors.values().map(|connector| {
            (
                connector.from.sample(self.now_ms, ease_out_cubic),
                connector.to.sample(self.now_ms, ease_out_cubic),
                connector,
            )
        })
    }

    pub(super) fn is_animating(&self) -> bool {
        let now = self.now_ms;
        !self.pan.done(now)
            || self
                .nodes
                .values()
                .any(|sprite| !sprite.offset.done(now) || !sprite.opacity.done(now))
            || self
                .connectors
                .values()
                .any(|connector| !connector.from.done(now) || !connector.to.done(now))
    }

    /// True once, when the last requested pan has arrived.
    pub(super) fn take_pan_settled(&mut self) -> bool {
        if self.pan_settling && self.pan.done(self.now_ms) {
            self.pan_settling = false;
            return true;
        }
        false
    }

    pub(super) fn drag(&mut self, delta: Vec2) {
        let current = self.view().pan;
        self.pan = Tween::settled(current + delta);
        self.pan_settling = false;
    }

    /// Scale about `anchor`, given relative to the viewport center.
    pub(super) fn zoom_about(&mut self, anchor: Vec2, factor: f32) {
        let view = self.view();
        let world_before = (anchor - view.pan) / view.zoom;
        self.zoom = (view.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Tween::settled(anchor - world_before * self.zoom);
        self.pan_settling = false;
    }

    pub(super) fn zoom(&self) -> f32 {
        self.zoom
    }
}

impl RenderSink for Scene {
    fn measure(&mut self, label: &str) -> Vec2 {
        let chars = short_label(label, MAX_LABEL_CHARS).chars().count().max(1) as f32;
        let size = vec2(chars * LABEL_FONT_SIZE * CHAR_WIDTH, LABEL_FONT_SIZE) + LABEL_PADDING * 2.0;
        size * 0.5
    }

    fn draw_connector(&mut self, from: Vec2, to: Vec2, style: &ConnectorStyle) -> ConnectorHandle {
        self.next_connector += 1;
        let handle = ConnectorHandle(self.next_connector);
        self.connectors.insert(
            handle,
            ConnectorSprite {
                from: Tween::settled(from),
                to: Tween::settled(to),
                width: style.width,
                colour: parse_hex_colour(&style.colour).unwrap_or(Color32::WHITE),
            },
        );
        handle
    }

    fn update_connector(&mut self, handle: ConnectorHandle, from: Vec2, to: Vec2, duration_ms: f64) {
        let now = self.now_ms;
        if let Some(connector) = self.connectors.get_mut(&handle) {
            connector.from.retarget(from, now, duration_ms, ease_out_cubic);
            connector.to.retarget(to, now, duration_ms, ease_out_cubic);
        }
    }

    fn set_connector_width(&mut self, handle: ConnectorHandle, width: f32) {
        if let Some(connector) = self.connectors.get_mut(&handle) {
            connector.width = width;
        }
    }

    fn remove_connector(&mut self, handle: ConnectorHandle) {
        self.connectors.remove(&handle);
    }

    fn animate_position(
        &mut self,
        node: NodeKey,
        target: Vec2,
        duration_ms: f64,
        opacity: Option<f32>,
    ) {
        let now = self.now_ms;
        let sprite = self.nodes.entry(node).or_insert_with(|| NodeSprite {
            offset: Tween::settled(Vec2::ZERO),
            opacity: Tween::settled(if opacity.is_some() { 0.0 } else { 1.0 }),
        });
        sprite
            .offset
            .retarget(target, now, duration_ms, ease_out_cubic);
        if let Some(opacity) = opacity {
            sprite
                .opacity
                .retarget(opacity, now, duration_ms, linear);
        }
    }

    fn remove_element(&mut self, node: NodeKey) {
        self.nodes.remove(&node);
    }

    fn pan_viewport_to(&mut self, target: Vec2, duration_ms: f64) {
        let now = self.now_ms;
        self.pan
            .retarget(target, now, duration_ms, ease_in_out_cubic);
        self.pan_settling = true;
    }
}
