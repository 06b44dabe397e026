use rand::Rng;
use tracing::debug;

use crate::util::fill_template;

use super::config::GraphConfig;
use super::error::GraphResult;
use super::geometry::{allocate_angles, child_offset};
use super::model::{ChildDescriptor, DisplayData, display_text};
use super::registry::{NodeKey, NodeRegistry, NodeSeed};
use super::render::{ConnectorStyle, RenderSink};

/// Label text for a node, from the template its `type` selects.
pub fn node_label(config: &GraphConfig, kind: Option<&str>, display: &DisplayData) -> String {
    fill_template(config.template_for(kind), |field| display_text(display, field))
}

/// Place the children of `parent` that are not on screen yet.
///
/// Existing children keep their angle and position; only the new batch takes
/// part in angle allocation. Returns the newly created keys.
pub fn layout_children<R, S>(
    registry: &mut NodeRegistry,
    config: &GraphConfig,
    rng: &mut R,
    sink: &mut S,
    parent: NodeKey,
    descriptors: &[ChildDescriptor],
) -> GraphResult<Vec<NodeKey>>
where
    R: Rng,
    S: RenderSink + ?Sized,
{
    if descriptors.is_empty() {
        return Ok(Vec::new());
    }

    let parent_node = registry.node(parent)?;
    let has_parent = parent_node.parent().is_some();
    let inherited_angle = has_parent.then_some(parent_node.angle_from_parent);

    let created = registry.materialize_children(parent, descriptors, config.eviction, |descriptor| {
        let kind = descriptor.kind.as_deref();
        let label = node_label(config, kind, &descriptor.display);
        let half_extent = sink.measure(&label);
        NodeSeed {
            id: &descriptor.uid,
            kind,
            display: &descriptor.display,
            label,
            line_colour: descriptor
                .line_colour
                .clone()
                .unwrap_or_else(|| config.line_colour.clone()),
            half_extent,
        }
    })?;
    if created.is_empty() {
        return Ok(Vec::new());
    }

    let angles = allocate_angles(has_parent, created.len(), inherited_angle, config.arc(), rng);
    let origin = registry.absolute_position(parent).unwrap_or_default();

    let mut keys = Vec::with_capacity(created.len());
    for (index, ((key, _descriptor), angle)) in created.into_iter().zip(angles).enumerate() {
        let node = registry.node_mut(key)?;
        node.angle_from_parent = angle;
        node.resting_distance = config.resting_distance(index);
        let style = ConnectorStyle {
            width: config.line_width,
            colour: node.line_colour.clone(),
        };
        node.connector = Some(sink.draw_connector(origin, origin, &style));
        keys.push(key);

        let resting = node.resting_distance;
        move_to_distance(registry, config, sink, key, resting)?;
    }

    debug!(%parent, added = keys.len(), "laid out children");
    Ok(keys)
}

/// Set a node's nominal distance from its parent and animate it there.
pub fn move_to_distance<S>(
    registry: &mut NodeRegistry,
    config: &GraphConfig,
    sink: &mut S,
    key: NodeKey,
    distance: f64,
) -> GraphResult<()>
where
    S: RenderSink + ?Sized,
{
    let Some(parent) = registry.node(key)?.parent() else {
        return Ok(());
    };
    let parent_half = registry.node(parent)?.half_extent;

    let node = registry.node_mut(key)?;
    node.distance_from_parent = distance;
    node.offset = child_offset(distance, node.angle_from_parent, node.half_extent, parent_half);
    sink.animate_position(key, node.offset, config.move_time, Some(1.0));

    refresh_connectors(registry, sink, key, config.move_time * 0.5)
}

/// Re-target the connectors of `key` and every live descendant.
pub fn refresh_connectors<S>(
    registry: &NodeRegistry,
    sink: &mut S,
    key: NodeKey,
    duration_ms: f64,
) -> GraphResult<()>
where
    S: RenderSink + ?Sized,
{
    for current in std::iter::once(key).chain(registry.descendants(key)) {
        let node = registry.node(current)?;
        let (Some(handle), Some(parent)) = (node.connector, node.parent()) else {
            continue;
        };
        let (Some(from), Some(to)) = (
            registry.absolute_position(parent),
            registry.absolute_position(current),
        ) else {
            continue;
        };
        sink.update_connector(handle, from, to, duration_ms);
    }
    Ok(())
}
