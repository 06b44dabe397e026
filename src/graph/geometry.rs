use eframe::egui::{Vec2, vec2};
use rand::Rng;

const MIN_EXTENT: f64 = 1e-6;
const SMALL_BATCH_JITTER_DEG: f64 = 30.0;

/// Arc parameters that stay fixed across one `allocate_angles` call.
#[derive(Clone, Copy, Debug)]
pub struct ArcSpec {
    pub angle_limit: f64,
    pub start_angle: Option<f64>,
}

/// Spread `count` children around a parent.
///
/// Children of the root share the full circle; deeper children are packed into
/// `angle_limit` degrees centered on the direction their parent arrived from.
pub fn allocate_angles<R: Rng>(
    parent_has_parent: bool,
    count: usize,
    inherited_angle: Option<f64>,
    arc: ArcSpec,
    rng: &mut R,
) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }

    let span = if parent_has_parent {
        arc.angle_limit
    } else {
        360.0
    };

    let mut base = match inherited_angle.filter(|_| parent_has_parent) {
        Some(angle) => angle,
        None => arc
            .start_angle
            .unwrap_or_else(|| rng.gen_range(0.0..360.0_f64).floor()),
    };

    let increment = span / count as f64;
    if count > 2 {
        base -= (increment * (count - 1) as f64 / 2.0).floor();
    } else {
        base += rng.gen_range(-SMALL_BATCH_JITTER_DEG..=SMALL_BATCH_JITTER_DEG);
    }

    (0..count)
        .map(|index| base + increment * index as f64)
        .collect()
}

/// Fold any angle into `[0, 90]` using the symmetry of an axis-aligned box.
pub fn fold_angle(angle_deg: f64) -> f64 {
    let angle = angle_deg.rem_euclid(360.0);
    if angle > 270.0 {
        360.0 - angle
    } else if angle > 180.0 {
        angle - 180.0
    } else if angle > 90.0 {
        180.0 - angle
    } else {
        angle
    }
}

/// Length of the ray from a box's center to its border at a folded angle.
fn exit_distance(folded_deg: f64, half: Vec2) -> f64 {
    let half_width = f64::from(half.x).max(0.0);
    let half_height = f64::from(half.y).max(0.0);
    let corner = (half_width / half_height.max(MIN_EXTENT)).atan().to_degrees();
    let radians = folded_deg.to_radians();

    if folded_deg < corner {
        half_height / radians.cos().max(MIN_EXTENT)
    } else {
        half_width / radians.sin().max(MIN_EXTENT)
    }
}

/// Center-to-center distance that leaves `nominal` of visible line between
/// the borders of the node and its parent.
pub fn border_corrected_distance(
    nominal: f64,
    angle_deg: f64,
    node_half: Vec2,
    parent_half: Vec2,
) -> f64 {
    let folded = fold_angle(angle_deg);
    nominal + exit_distance(folded, node_half) + exit_distance(folded, parent_half)
}

/// Polar to cartesian, angle 0 pointing along +y, rounded to whole pixels.
pub fn polar_offset(distance: f64, angle_deg: f64) -> Vec2 {
    let radians = angle_deg.to_radians();
    vec2(
        (distance * radians.sin()).round() as f32,
        (distance * radians.cos()).round() as f32,
    )
}

/// Offset of a child relative to its parent for a given nominal spacing.
pub fn child_offset(nominal: f64, angle_deg: f64, node_half: Vec2, parent_half: Vec2) -> Vec2 {
    polar_offset(
        border_corrected_distance(nominal, angle_deg, node_half, parent_half),
        angle_deg,
    )
}
