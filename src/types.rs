//! Common types and traits for 3D geometry.
//!
//! Coordinates are container-local: `x` runs left (negative) to right,
//! `y` is vertical with the floor at `0`, and `z` runs from the rear
//! (negative) to the front of the cargo area.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance for matching resting heights when items are stacked.
pub const EPSILON_HEIGHT: f64 = 1e-6;

/// Represents a 3D vector or point in container space.
///
/// # Examples
/// ```
/// use truck_loader::types::Vec3;
///
/// let center = Vec3::new(0.0, 0.5, 0.0);
/// let half = Vec3::new(1.0, 0.5, 0.5);
/// assert_eq!(center + half, Vec3::new(1.0, 1.0, 0.5));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (lateral)
    /// * `y` - Y component (vertical)
    /// * `z` - Z component (depth)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Product of all components, for extent vectors.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Half of every component.
    #[inline]
    pub fn half(&self) -> Self {
        *self * 0.5
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Trait for objects with 3D extents (width, height, depth).
pub trait Dimensional {
    /// Returns the extents as `(width, height, depth)` packed into a `Vec3`.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Axis-Aligned Bounding Box (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from its center and full extents.
    #[inline]
    pub fn from_center_and_extents(center: Vec3, extents: Vec3) -> Self {
        let half = extents.half();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Overlap length of two closed intervals, at least 0.0.
    #[inline]
    pub fn overlap_1d(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
        (a_max.min(b_max) - a_min.max(b_min)).max(0.0)
    }

    /// Overlap lengths along X and Z.
    #[inline]
    pub fn footprint_overlap(&self, other: &Self) -> (f64, f64) {
        (
            Self::overlap_1d(self.min.x, self.max.x, other.min.x, other.max.x),
            Self::overlap_1d(self.min.z, self.max.z, other.min.z, other.max.z),
        )
    }

    /// Returns the bottom (Y minimum).
    #[inline]
    pub fn bottom_y(&self) -> f64 {
        self.min.y
    }

    /// Returns the top (Y maximum).
    #[inline]
    pub fn top_y(&self) -> f64 {
        self.max.y
    }
}

/// Accumulates weighted floor positions for a center of mass in the XZ plane.
#[derive(Clone, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted_x: f64,
    weighted_z: f64,
    total_weight: f64,
}

impl CenterOfMassCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted point.
    ///
    /// # Parameters
    /// * `x` - Lateral position of the point
    /// * `z` - Depth position of the point
    /// * `weight` - Weight of the point
    pub fn add_point(&mut self, x: f64, z: f64, weight: f64) {
        self.weighted_x += x * weight;
        self.weighted_z += z * weight;
        self.total_weight += weight;
    }

    /// `Some((x, z))` for a valid center of mass, `None` if no weight is present.
    pub fn compute(&self) -> Option<(f64, f64)> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some((
                self.weighted_x / self.total_weight,
                self.weighted_z / self.total_weight,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_extents_offset_a_center() {
        let center = Vec3::new(-3.0, 0.4, -7.4);
        let half = Vec3::new(1.0, 0.8, 1.2).half();

        assert_eq!(half, Vec3::new(0.5, 0.4, 0.6));
        assert_eq!(center - half, Vec3::new(-3.5, 0.0, -8.0));
        assert_eq!(half * 2.0, Vec3::new(1.0, 0.8, 1.2));
        assert_eq!((center + half).y, 0.8);
    }

    #[test]
    fn furniture_volume() {
        let wardrobe = Vec3::new(1.5, 2.0, 0.6);
        assert!((wardrobe.volume() - 1.8).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn interval_overlap_is_never_negative() {
        assert_eq!(BoundingBox::overlap_1d(0.0, 1.0, 0.5, 2.0), 0.5);
        assert_eq!(BoundingBox::overlap_1d(0.0, 1.0, 1.0, 2.0), 0.0);
        assert_eq!(BoundingBox::overlap_1d(0.0, 1.0, 3.0, 4.0), 0.0);
    }

    #[test]
    fn footprint_overlap_ignores_height() {
        let sofa = BoundingBox::from_center_and_extents(Vec3::new(0.0, 0.45, 0.0), Vec3::new(2.0, 0.9, 1.0));
        let lamp = BoundingBox::from_center_and_extents(Vec3::new(0.75, 3.0, 0.25), Vec3::new(0.5, 1.0, 0.5));

        let (ox, oz) = sofa.footprint_overlap(&lamp);
        assert!((ox - 0.5).abs() < EPSILON_GENERAL);
        assert!((oz - 0.5).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn stacked_boxes_share_a_face() {
        let lower = BoundingBox::from_center_and_extents(Vec3::new(0.0, 0.5, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let upper = BoundingBox::from_center_and_extents(Vec3::new(0.0, 1.5, 0.0), Vec3::new(1.0, 1.0, 1.0));
        assert!((lower.top_y() - upper.bottom_y()).abs() < EPSILON_HEIGHT);
    }

    #[test]
    fn test_center_of_mass_calculator() {
        let mut calc = CenterOfMassCalculator::new();
        assert!(calc.compute().is_none());

        calc.add_point(-1.0, 0.0, 10.0);
        calc.add_point(1.0, 4.0, 30.0);

        let (x, z) = calc.compute().unwrap();
        assert!((x - 0.5).abs() < EPSILON_GENERAL);
        assert!((z - 3.0).abs() < EPSILON_GENERAL);
    }
}
