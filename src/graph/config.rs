use std::collections::HashMap;

use serde::Deserialize;

use super::error::{GraphError, GraphResult};
use super::geometry::ArcSpec;

/// What happens to fetched child data when a node's subtree collapses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Keep fetched descriptors so a later expansion skips the gateway.
    #[default]
    Retain,
    /// Forget fetched descriptors; re-expanding fetches again.
    Discard,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    #[serde(alias = "initialNodeID")]
    pub initial_node_id: String,
    /// Border-to-border spacing of a node that is not selected.
    pub distance_nodes: f64,
    /// Multiplier applied to the spacing of the selected node.
    pub distance_increment: f64,
    /// Milliseconds for node moves; also the post-select fetch delay.
    pub move_time: f64,
    /// Arc, in degrees, shared by the children of a non-root node.
    pub angle_limit: f64,
    pub start_angle: Option<f64>,
    #[serde(alias = "returnToParentOnReselect")]
    pub return_to_parent: bool,
    #[serde(alias = "showChildrenAfterSelect")]
    pub show_children: bool,
    pub line_colour: String,
    pub line_width: f32,
    pub line_width_selected: f32,
    /// Amplitude of the alternating sibling distance offset.
    pub variation: f64,
    pub eviction: EvictionPolicy,
    /// Collapse children of trail ancestors that are not on the trail.
    pub prune_off_trail: bool,
    pub templates: HashMap<String, String>,
    pub seed: Option<u64>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            initial_node_id: "root".to_owned(),
            distance_nodes: 220.0,
            distance_increment: 2.0,
            move_time: 1000.0,
            angle_limit: 180.0,
            start_angle: None,
            return_to_parent: true,
            show_children: true,
            line_colour: "#fff".to_owned(),
            line_width: 6.0,
            line_width_selected: 3.0,
            variation: 0.0,
            eviction: EvictionPolicy::Retain,
            prune_off_trail: true,
            templates: HashMap::from([("default".to_owned(), "[%title%]".to_owned())]),
            seed: None,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> GraphResult<()> {
        if self.initial_node_id.trim().is_empty() {
            return Err(GraphError::config("initialNodeId must not be empty"));
        }
        if !(self.distance_nodes.is_finite() && self.distance_nodes > 0.0) {
            return Err(GraphError::config("distanceNodes must be a positive number"));
        }
        if !(self.distance_increment.is_finite() && self.distance_increment > 0.0) {
            return Err(GraphError::config(
                "distanceIncrement must be a positive number",
            ));
        }
        if !(self.move_time.is_finite() && self.move_time >= 0.0) {
            return Err(GraphError::config("moveTime must not be negative"));
        }
        if !(self.angle_limit > 0.0 && self.angle_limit <= 360.0) {
            return Err(GraphError::config("angleLimit must be within (0, 360]"));
        }
        if !(self.line_width >= 0.0 && self.line_width_selected >= 0.0) {
            return Err(GraphError::config("line widths must not be negative"));
        }
        Ok(())
    }

    /// Spacing a node returns to when it leaves the trail, never below zero.
    ///
    /// Stored on the node when it is laid out, so later changes only affect
    /// nodes created afterwards.
    pub fn resting_distance(&self, sibling_index: usize) -> f64 {
        let wave = (std::f64::consts::FRAC_PI_2 * sibling_index as f64).sin();
        // sin(k * pi/2) lands on -1, 0 or 1 up to float noise
        (self.distance_nodes + self.variation * wave.round()).max(0.0)
    }

    pub fn selected_distance(&self) -> f64 {
        self.distance_nodes * self.distance_increment
    }

    pub fn arc(&self) -> ArcSpec {
        ArcSpec {
            angle_limit: self.angle_limit,
            start_angle: self.start_angle,
        }
    }

    /// Template for a node type, falling back to `default`.
    pub fn template_for(&self, kind: Option<&str>) -> &str {
        kind.and_then(|kind| self.templates.get(kind))
            .or_else(|| self.templates.get("default"))
            .map(String::as_str)
            .unwrap_or("[%title%]")
    }
}
