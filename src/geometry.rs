//! Geometric helpers for collision detection and containment.
//!
//! All tests work on axis-aligned boxes. Faces that merely touch are never
//! counted as overlapping; stacking relies on that.
//!
//! Centers are computed (`level + h / 2`, clamped wall positions, grid steps),
//! so a contact can come out a few ulps inside its neighbour. The item-level
//! checks treat anything up to `EPSILON_GENERAL` per axis as contact. The
//! placement engine decides with the same tolerance, so a load it accepts
//! always passes these checks.

use crate::model::{ContainerProfile, PlacedItem};
use crate::types::{BoundingBox, EPSILON_GENERAL, EPSILON_HEIGHT};

/// Checks whether an item lies entirely inside the cargo volume.
///
/// An item flush against a wall is contained.
pub fn bounds_contains(container: &ContainerProfile, item: &PlacedItem) -> bool {
    bounds_contains_within(container, &item.bounding_box(), EPSILON_GENERAL)
}

/// Like [`bounds_contains`], but lets the item poke out by at most `tolerance`
/// per face. Absorbs rounding from clamping centers against the walls.
pub fn bounds_contains_within(container: &ContainerProfile, item: &BoundingBox, tolerance: f64) -> bool {
    let outer = container.bounding_box();
    item.min.x >= outer.min.x - tolerance
        && item.max.x <= outer.max.x + tolerance
        && item.min.y >= outer.min.y - tolerance
        && item.max.y <= outer.max.y + tolerance
        && item.min.z >= outer.min.z - tolerance
        && item.max.z <= outer.max.z + tolerance
}

/// Checks whether two placed items overlap in space.
///
/// Two items do NOT overlap when they are separated (or only touching) on at
/// least one axis.
///
/// # Examples
/// ```
/// use truck_loader::geometry::overlaps;
/// use truck_loader::model::{ItemTemplate, Orientation, PlacedItem};
/// use truck_loader::types::Vec3;
///
/// let crate_ = ItemTemplate::new("crate", "Crate", (1.0, 1.0, 1.0), 5.0, "crate").unwrap();
/// let a = PlacedItem::new("a", crate_.clone(), Vec3::new(0.0, 0.5, 0.0), Orientation::Original);
/// let b = PlacedItem::new("b", crate_, Vec3::new(0.0, 1.5, 0.0), Orientation::Original);
/// assert!(!overlaps(&a, &b));
/// ```
pub fn overlaps(a: &PlacedItem, b: &PlacedItem) -> bool {
    overlaps_within(&a.bounding_box(), &b.bounding_box(), EPSILON_GENERAL)
}

/// Overlap test that ignores penetrations of at most `tolerance` per axis.
///
/// Items placed by arithmetic (`level + h / 2`) can end up a rounding error
/// inside their supporter; this keeps such contacts from counting as overlap.
pub fn overlaps_within(a: &BoundingBox, b: &BoundingBox, tolerance: f64) -> bool {
    let ox = BoundingBox::overlap_1d(a.min.x, a.max.x, b.min.x, b.max.x);
    let oy = BoundingBox::overlap_1d(a.min.y, a.max.y, b.min.y, b.max.y);
    let oz = BoundingBox::overlap_1d(a.min.z, a.max.z, b.min.z, b.max.z);
    ox > tolerance && oy > tolerance && oz > tolerance
}

/// Checks whether the floor projections of two boxes overlap by more than
/// `margin` on both the X and the Z axis.
pub fn footprints_overlap(a: &BoundingBox, b: &BoundingBox, margin: f64) -> bool {
    let (ox, oz) = a.footprint_overlap(b);
    ox > margin && oz > margin
}

/// Checks whether `upper` sits directly on the top face of `lower`.
pub fn rests_on(upper: &BoundingBox, lower: &BoundingBox, margin: f64) -> bool {
    (upper.bottom_y() - lower.top_y()).abs() <= EPSILON_HEIGHT
        && footprints_overlap(upper, lower, margin)
}

/// Generates candidate center coordinates along one axis.
///
/// Walks from the low wall to the high wall in `step` increments, keeping the
/// object flush with the high wall as the last position.
///
/// # Parameters
/// * `container_len` - Length of the container along this axis
/// * `object_len` - Length of the object along this axis
/// * `step` - Grid spacing
/// * `epsilon` - Numerical tolerance
pub fn grid_positions(container_len: f64, object_len: f64, step: f64, epsilon: f64) -> Vec<f64> {
    let max_offset = container_len - object_len;
    if max_offset < -epsilon || step <= 0.0 {
        return Vec::new();
    }

    let low = -container_len / 2.0 + object_len / 2.0;
    let max_offset = max_offset.max(0.0);
    let mut positions = Vec::new();

    if max_offset <= epsilon {
        positions.push(low);
        return positions;
    }

    let mut offset = 0.0;
    while offset <= max_offset + epsilon {
        positions.push(low + offset.min(max_offset));
        offset += step;
    }

    if let Some(&last) = positions.last() {
        if (last - (low + max_offset)).abs() > epsilon {
            positions.push(low + max_offset);
        }
    }

    positions.dedup_by(|a, b| (*a - *b).abs() < epsilon);
    positions
}
