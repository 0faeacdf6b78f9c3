//! Shared pieces of the two arrangement heuristics.
//!
//! Both heuristics take the current load and return a freshly built one plus a
//! report of the items they could not place. They never fail as a whole: an
//! item that does not fit is reported and the pass moves on.
//!
//! - `balance`: heavy items to the rear, alternating sides
//! - `space_fill`: largest items first, lowest free level on a grid

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::balance::arrange_by_weight_with_progress;
use crate::load::LoadState;
use crate::model::{ContainerProfile, Orientation, PlacedItem};
use crate::space_fill::arrange_by_space_with_progress;
use crate::stacking::StackingRules;
use crate::types::Vec3;

/// Tuning knobs for validation and both heuristics.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Spacing of candidate positions on the floor grid
    pub grid_step: f64,
    /// Minimum footprint overlap on X and Z for an item to count as underneath
    pub footprint_tolerance: f64,
    /// How much larger than its base an item may be and still be stacked (0.1 = 10%)
    pub stack_fit_tolerance: f64,
    /// Whether the space-fill pass may swap width and depth
    pub allow_rotation: bool,
    /// General numerical tolerance
    pub general_epsilon: f64,
}

impl PackingConfig {
    pub const DEFAULT_GRID_STEP: f64 = 0.5;
    pub const DEFAULT_FOOTPRINT_TOLERANCE: f64 = 1e-3;
    pub const DEFAULT_STACK_FIT_TOLERANCE: f64 = 0.1;
    pub const DEFAULT_ALLOW_ROTATION: bool = true;
    pub const DEFAULT_GENERAL_EPSILON: f64 = 1e-6;

    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            grid_step: Self::DEFAULT_GRID_STEP,
            footprint_tolerance: Self::DEFAULT_FOOTPRINT_TOLERANCE,
            stack_fit_tolerance: Self::DEFAULT_STACK_FIT_TOLERANCE,
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn footprint_tolerance(mut self, tolerance: f64) -> Self {
        self.config.footprint_tolerance = tolerance;
        self
    }

    pub fn stack_fit_tolerance(mut self, tolerance: f64) -> Self {
        self.config.stack_fit_tolerance = tolerance;
        self
    }

    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Which heuristic to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Heavy items to the rear, alternating left and right
    Weight,
    /// Largest items first, lowest free level wins
    Space,
}

impl Strategy {
    pub fn code(&self) -> &'static str {
        match self {
            Strategy::Weight => "weight",
            Strategy::Space => "space",
        }
    }
}

/// Result of an arrangement pass.
#[derive(Clone, Debug)]
pub struct ArrangeResult {
    pub load: LoadState,
    pub unplaced: Vec<UnplacedItem>,
}

impl ArrangeResult {
    /// `true` if every input item found a position.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.load.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }
}

/// Item dropped from the load by an arrangement pass.
#[derive(Clone, Debug)]
pub struct UnplacedItem {
    pub item: PlacedItem,
    pub reason: UnplacedReason,
}

/// Why an arrangement pass left an item out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    /// No position passed the checks
    Unplaceable,
    /// Adding the item would exceed the weight ceiling
    WeightExceeded,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::Unplaceable => "unplaceable",
            UnplacedReason::WeightExceeded => "weight_exceeded",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::Unplaceable => {
                write!(f, "No free position found for the item")
            }
            UnplacedReason::WeightExceeded => {
                write!(f, "Item would exceed the container weight ceiling")
            }
        }
    }
}

/// Progress of an arrangement pass, in the order the pass makes decisions.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ArrangeEvent {
    /// The pass begins with `items` items to arrange.
    Started { strategy: Strategy, items: usize },
    /// An item received its final position.
    ItemPlaced {
        id: String,
        position: Vec3,
        orientation: Orientation,
        total_weight: f64,
    },
    /// An item was left out.
    ItemUnplaced {
        id: String,
        reason_code: String,
        reason_text: String,
    },
    /// The pass is done; `current_weight` is the weight of the arranged load.
    Finished {
        placed: usize,
        unplaced: usize,
        current_weight: f64,
    },
}

/// Rearranges the whole load with the chosen heuristic.
///
/// # Parameters
/// * `strategy` - Which heuristic to run
/// * `load` - Current load, left untouched
/// * `profile` - Container the load lives in
/// * `rules` - Stacking allow-list
/// * `config` - Tuning parameters
///
/// # Returns
/// A new load and the list of items that found no position
pub fn optimize(
    strategy: Strategy,
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> ArrangeResult {
    optimize_with_progress(strategy, load, profile, rules, config, |_| {})
}

/// Like `optimize`, with a callback for every decision (suited for SSE).
pub fn optimize_with_progress(
    strategy: Strategy,
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
    on_event: impl FnMut(&ArrangeEvent),
) -> ArrangeResult {
    match strategy {
        Strategy::Weight => arrange_by_weight_with_progress(load, profile, rules, config, on_event),
        Strategy::Space => arrange_by_space_with_progress(load, profile, rules, config, on_event),
    }
}

/// Appends a positioned item to the new load and announces it.
pub(crate) fn record_placed(
    arranged: &mut LoadState,
    item: PlacedItem,
    on_event: &mut impl FnMut(&ArrangeEvent),
) {
    log::debug!(
        "placed {} at ({:.3}, {:.3}, {:.3})",
        item.id,
        item.position.x,
        item.position.y,
        item.position.z
    );
    let id = item.id.clone();
    let position = item.position;
    let orientation = item.orientation;
    arranged.push(item);
    on_event(&ArrangeEvent::ItemPlaced {
        id,
        position,
        orientation,
        total_weight: arranged.current_weight(),
    });
}

/// Records an item the pass had to leave out and announces it.
pub(crate) fn record_unplaced(
    unplaced: &mut Vec<UnplacedItem>,
    item: PlacedItem,
    reason: UnplacedReason,
    on_event: &mut impl FnMut(&ArrangeEvent),
) {
    log::warn!("could not place {}: {}", item.id, reason);
    on_event(&ArrangeEvent::ItemUnplaced {
        id: item.id.clone(),
        reason_code: reason.code().to_string(),
        reason_text: reason.to_string(),
    });
    unplaced.push(UnplacedItem { item, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemTemplate;

    fn crate_item(id: &str, weight: f64, pos: (f64, f64, f64)) -> PlacedItem {
        PlacedItem::new(
            id,
            ItemTemplate::new("crate", "Crate", (1.0, 1.0, 1.0), weight, "crate").unwrap(),
            Vec3::new(pos.0, pos.1, pos.2),
            Orientation::Original,
        )
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = PackingConfig::builder()
            .grid_step(0.25)
            .allow_rotation(false)
            .build();
        assert_eq!(config.grid_step, 0.25);
        assert!(!config.allow_rotation);
        assert_eq!(
            config.footprint_tolerance,
            PackingConfig::DEFAULT_FOOTPRINT_TOLERANCE
        );
        assert_eq!(PackingConfig::builder().build(), PackingConfig::default());
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(UnplacedReason::Unplaceable.code(), "unplaceable");
        assert_eq!(UnplacedReason::WeightExceeded.code(), "weight_exceeded");
        assert_eq!(Strategy::Space.code(), "space");
    }

    #[test]
    fn both_strategies_emit_start_and_finish() {
        let truck = ContainerProfile::new((8.0, 8.0, 16.0), 100.0, 8.0).unwrap();
        let load = LoadState::restore(
            &truck,
            vec![
                crate_item("a", 30.0, (0.0, 0.5, 0.0)),
                crate_item("b", 20.0, (2.0, 0.5, 0.0)),
            ],
        )
        .unwrap();

        for strategy in [Strategy::Weight, Strategy::Space] {
            let mut events = Vec::new();
            let result = optimize_with_progress(
                strategy,
                &load,
                &truck,
                &StackingRules::new(),
                &PackingConfig::default(),
                |event| events.push(event.clone()),
            );

            assert!(result.is_complete());
            assert_eq!(result.placed_count(), 2);
            assert!(matches!(
                events.first(),
                Some(ArrangeEvent::Started { items: 2, .. })
            ));
            assert!(matches!(
                events.last(),
                Some(ArrangeEvent::Finished {
                    placed: 2,
                    unplaced: 0,
                    current_weight,
                }) if (*current_weight - 50.0).abs() < 1e-9
            ));
            let placed = events
                .iter()
                .filter(|e| matches!(e, ArrangeEvent::ItemPlaced { .. }))
                .count();
            assert_eq!(placed, 2);
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ArrangeEvent::Finished {
            placed: 3,
            unplaced: 1,
            current_weight: 42.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Finished");
        assert_eq!(json["placed"], 3);
        assert_eq!(json["current_weight"], 42.5);
    }
}
