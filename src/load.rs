//! The live cargo load: placed items plus their running totals.
//!
//! A `LoadState` only changes through accepted placements, removals, resets
//! or by being replaced wholesale with an optimizer result. After every one of
//! those the weight ceiling, containment and non-overlap invariants hold.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::capacity::CapacityTracker;
use crate::geometry::{bounds_contains, overlaps, rests_on};
use crate::model::{ContainerProfile, PlacedItem};
use crate::types::{CenterOfMassCalculator, Dimensional};

/// Reasons an externally supplied load cannot be restored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("Duplicate placed item id: {0}")]
    DuplicateId(String),
    #[error("Placed item {0} lies outside the container")]
    OutOfBounds(String),
    #[error("Placed items {0} and {1} overlap")]
    Overlap(String, String),
    #[error("Total weight {total} exceeds the maximum of {max}")]
    WeightCeilingExceeded { total: f64, max: f64 },
}

/// A point on the truck floor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct FloorPoint {
    pub x: f64,
    pub z: f64,
}

/// Usage figures for a load, as shown next to the truck.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LoadStatistics {
    pub item_count: usize,
    pub current_weight: f64,
    pub max_weight: f64,
    pub weight_percent: f64,
    pub used_volume: f64,
    pub container_volume: f64,
    pub volume_percent: f64,
    /// Weighted center of all items on the floor plane, `None` when empty.
    pub center_of_mass: Option<FloorPoint>,
}

#[derive(Clone, Debug)]
pub struct LoadState {
    items: Vec<PlacedItem>,
    capacity: CapacityTracker,
    next_serial: u64,
}

impl LoadState {
    /// Creates an empty load for the given profile.
    pub fn new(profile: &ContainerProfile) -> Self {
        Self {
            items: Vec::new(),
            capacity: CapacityTracker::new(profile),
            next_serial: 0,
        }
    }

    /// Rebuilds a load from previously exported items, checking every invariant.
    ///
    /// # Returns
    /// `Ok(LoadState)` if all items are inside the truck, pairwise disjoint,
    /// uniquely identified and within the weight ceiling.
    pub fn restore(profile: &ContainerProfile, items: Vec<PlacedItem>) -> Result<Self, LoadError> {
        let mut load = Self::new(profile);

        for (idx, item) in items.iter().enumerate() {
            if items[..idx].iter().any(|other| other.id == item.id) {
                return Err(LoadError::DuplicateId(item.id.clone()));
            }
            if !bounds_contains(profile, item) {
                return Err(LoadError::OutOfBounds(item.id.clone()));
            }
            if let Some(other) = items[..idx].iter().find(|other| overlaps(other, item)) {
                return Err(LoadError::Overlap(other.id.clone(), item.id.clone()));
            }
        }

        let total: f64 = items.iter().map(|item| item.template.weight).sum();
        if total > profile.max_weight {
            return Err(LoadError::WeightCeilingExceeded {
                total,
                max: profile.max_weight,
            });
        }

        load.next_serial = items.len() as u64;
        for item in items {
            load.push(item);
        }
        Ok(load)
    }

    /// Empty load with the same ceilings and id sequence.
    pub(crate) fn empty_like(&self) -> Self {
        let mut capacity = self.capacity.clone();
        capacity.reset();
        Self {
            items: Vec::new(),
            capacity,
            next_serial: self.next_serial,
        }
    }

    pub fn items(&self) -> &[PlacedItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&PlacedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Items resting directly on the top face of `id`.
    ///
    /// `margin` is the footprint overlap an item needs to count as resting.
    pub fn carried_by(&self, id: &str, margin: f64) -> Vec<&PlacedItem> {
        let Some(base) = self.get(id) else {
            return Vec::new();
        };
        let base_box = base.bounding_box();
        self.items
            .iter()
            .filter(|item| item.id != id && rests_on(&item.bounding_box(), &base_box, margin))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_weight(&self) -> f64 {
        self.capacity.current_weight()
    }

    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    /// Id that the next accepted new item will receive.
    pub fn next_instance_id(&self, template_id: &str) -> String {
        let mut serial = self.next_serial + 1;
        loop {
            let candidate = format!("{template_id}#{serial}");
            if !self.contains(&candidate) {
                return candidate;
            }
            serial += 1;
        }
    }

    /// Appends an item that already has an instance id and books its weight.
    pub(crate) fn push(&mut self, item: PlacedItem) {
        self.capacity.add(item.template.weight, item.template.volume());
        self.items.push(item);
    }

    /// Appends a freshly created instance and advances the id sequence.
    pub(crate) fn push_new(&mut self, item: PlacedItem) {
        self.next_serial += 1;
        self.push(item);
    }

    /// Replaces position and orientation of an already loaded item.
    ///
    /// Weight is untouched; the item is the same instance.
    pub(crate) fn replace(&mut self, item: PlacedItem) -> bool {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item;
                true
            }
            None => false,
        }
    }

    /// Removes an item by instance id and releases its weight.
    pub fn remove(&mut self, id: &str) -> Option<PlacedItem> {
        let idx = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(idx);
        self.capacity
            .remove(removed.template.weight, removed.template.volume());
        if self.items.is_empty() {
            self.capacity.reset();
        }
        Some(removed)
    }

    /// Unloads everything.
    pub fn reset(&mut self) {
        self.items.clear();
        self.capacity.reset();
    }

    /// Calculates usage figures for display.
    pub fn statistics(&self, profile: &ContainerProfile) -> LoadStatistics {
        let mut com = CenterOfMassCalculator::new();
        for item in &self.items {
            com.add_point(item.position.x, item.position.z, item.template.weight);
        }

        LoadStatistics {
            item_count: self.items.len(),
            current_weight: self.capacity.current_weight(),
            max_weight: profile.max_weight,
            weight_percent: self.capacity.weight_percent(),
            used_volume: self.capacity.used_volume(),
            container_volume: profile.volume(),
            volume_percent: self.capacity.volume_percent(),
            center_of_mass: com.compute().map(|(x, z)| FloorPoint { x, z }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemTemplate, Orientation};
    use crate::types::Vec3;

    fn truck() -> ContainerProfile {
        ContainerProfile::new((8.0, 8.0, 16.0), 100.0, 8.0).unwrap()
    }

    fn crate_item(id: &str, weight: f64, pos: (f64, f64, f64)) -> PlacedItem {
        PlacedItem::new(
            id,
            ItemTemplate::new("crate", "Crate", (1.0, 1.0, 1.0), weight, "crate").unwrap(),
            Vec3::new(pos.0, pos.1, pos.2),
            Orientation::Original,
        )
    }

    #[test]
    fn restore_accepts_valid_load() {
        let load = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 30.0, (0.0, 0.5, 0.0)),
                crate_item("b", 20.0, (0.0, 1.5, 0.0)),
            ],
        )
        .unwrap();
        assert_eq!(load.len(), 2);
        assert!((load.current_weight() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn restore_rejects_broken_loads() {
        let overlap = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 10.0, (0.0, 0.5, 0.0)),
                crate_item("b", 10.0, (0.5, 0.5, 0.0)),
            ],
        );
        assert_eq!(
            overlap.unwrap_err(),
            LoadError::Overlap("a".to_string(), "b".to_string())
        );

        let outside = LoadState::restore(&truck(), vec![crate_item("a", 10.0, (4.0, 0.5, 0.0))]);
        assert_eq!(outside.unwrap_err(), LoadError::OutOfBounds("a".to_string()));

        let duplicate = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 10.0, (0.0, 0.5, 0.0)),
                crate_item("a", 10.0, (2.0, 0.5, 0.0)),
            ],
        );
        assert_eq!(duplicate.unwrap_err(), LoadError::DuplicateId("a".to_string()));

        let heavy = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 60.0, (0.0, 0.5, 0.0)),
                crate_item("b", 60.0, (2.0, 0.5, 0.0)),
            ],
        );
        assert!(matches!(
            heavy.unwrap_err(),
            LoadError::WeightCeilingExceeded { .. }
        ));
    }

    #[test]
    fn instance_ids_skip_taken_ones() {
        let load = LoadState::restore(&truck(), vec![crate_item("crate#2", 10.0, (0.0, 0.5, 0.0))])
            .unwrap();
        // serial after restore is 1, so the first guess is crate#2
        assert_eq!(load.next_instance_id("crate"), "crate#3");
    }

    #[test]
    fn remove_and_reset() {
        let mut load = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 30.0, (0.0, 0.5, 0.0)),
                crate_item("b", 20.0, (2.0, 0.5, 0.0)),
            ],
        )
        .unwrap();

        assert!(load.remove("a").is_some());
        assert!(load.remove("a").is_none());
        assert!((load.current_weight() - 20.0).abs() < 1e-9);

        load.reset();
        load.reset();
        assert!(load.is_empty());
        assert_eq!(load.current_weight(), 0.0);
    }

    #[test]
    fn statistics_report_center_of_mass() {
        let load = LoadState::restore(
            &truck(),
            vec![
                crate_item("a", 30.0, (-2.0, 0.5, -4.0)),
                crate_item("b", 30.0, (2.0, 0.5, -4.0)),
            ],
        )
        .unwrap();

        let stats = load.statistics(&truck());
        assert_eq!(stats.item_count, 2);
        assert!((stats.weight_percent - 60.0).abs() < 1e-9);
        assert!((stats.used_volume - 2.0).abs() < 1e-9);
        let com = stats.center_of_mass.unwrap();
        assert!(com.x.abs() < 1e-9);
        assert!((com.z + 4.0).abs() < 1e-9);

        assert!(LoadState::new(&truck()).statistics(&truck()).center_of_mass.is_none());
    }
}
