//! Running weight and volume totals against a profile's ceilings.
//!
//! The tracker makes the weight ceiling check O(1). It is not the source of
//! truth for what is loaded; `LoadState` owns the items.

use serde::Serialize;

use crate::model::ContainerProfile;
use crate::types::EPSILON_GENERAL;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapacityTracker {
    current_weight: f64,
    used_volume: f64,
    max_weight: f64,
    max_volume: f64,
}

impl CapacityTracker {
    /// Creates an empty tracker for the given profile.
    pub fn new(profile: &ContainerProfile) -> Self {
        Self {
            current_weight: 0.0,
            used_volume: 0.0,
            max_weight: profile.max_weight,
            max_volume: profile.volume(),
        }
    }

    /// `true` if `weight` more still fits under the ceiling.
    ///
    /// ```
    /// use truck_loader::capacity::CapacityTracker;
    /// use truck_loader::model::ContainerProfile;
    ///
    /// let truck = ContainerProfile::new((2.0, 2.0, 3.0), 100.0, 2.0).unwrap();
    /// let mut tracker = CapacityTracker::new(&truck);
    /// tracker.add(80.0, 1.0);
    /// assert!(tracker.can_add(20.0));
    /// assert!(!tracker.can_add(30.0));
    /// ```
    #[inline]
    pub fn can_add(&self, weight: f64) -> bool {
        self.current_weight + weight <= self.max_weight
    }

    pub fn add(&mut self, weight: f64, volume: f64) {
        self.current_weight += weight.max(0.0);
        self.used_volume += volume.max(0.0);
    }

    /// Subtracts, flooring at zero so redundant calls are harmless.
    pub fn remove(&mut self, weight: f64, volume: f64) {
        self.current_weight = (self.current_weight - weight.max(0.0)).max(0.0);
        self.used_volume = (self.used_volume - volume.max(0.0)).max(0.0);
        // clear rounding residue left by add/remove sequences
        if self.current_weight < EPSILON_GENERAL {
            self.current_weight = 0.0;
        }
        if self.used_volume < EPSILON_GENERAL {
            self.used_volume = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.current_weight = 0.0;
        self.used_volume = 0.0;
    }

    #[inline]
    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    #[inline]
    pub fn used_volume(&self) -> f64 {
        self.used_volume
    }

    /// Weight usage in percent (0.0 to 100.0).
    pub fn weight_percent(&self) -> f64 {
        if self.max_weight <= 0.0 {
            return 0.0;
        }
        (self.current_weight / self.max_weight * 100.0).min(100.0)
    }

    /// Volume usage in percent (0.0 to 100.0).
    pub fn volume_percent(&self) -> f64 {
        if self.max_volume <= 0.0 {
            return 0.0;
        }
        (self.used_volume / self.max_volume * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck() -> ContainerProfile {
        ContainerProfile::new((2.0, 2.0, 5.0), 100.0, 2.0).unwrap()
    }

    #[test]
    fn ceiling_is_inclusive() {
        let mut tracker = CapacityTracker::new(&truck());
        tracker.add(60.0, 1.0);
        assert!(tracker.can_add(40.0));
        assert!(!tracker.can_add(40.5));
        assert_eq!(tracker.current_weight(), 60.0);
    }

    #[test]
    fn remove_floors_at_zero() {
        let mut tracker = CapacityTracker::new(&truck());
        tracker.add(10.0, 2.0);
        tracker.remove(10.0, 2.0);
        tracker.remove(10.0, 2.0);
        assert_eq!(tracker.current_weight(), 0.0);
        assert_eq!(tracker.used_volume(), 0.0);
    }

    #[test]
    fn percentages() {
        let mut tracker = CapacityTracker::new(&truck());
        tracker.add(25.0, 5.0);
        assert!((tracker.weight_percent() - 25.0).abs() < EPSILON_GENERAL);
        assert!((tracker.volume_percent() - 25.0).abs() < EPSILON_GENERAL);

        tracker.reset();
        assert_eq!(tracker.weight_percent(), 0.0);
    }
}
