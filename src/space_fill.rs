//! Space-fill arrangement.
//!
//! Largest items go first. Each item scans a floor grid (rear to front, left
//! to right) in every allowed orientation and takes the lowest level where it
//! fits; among equal levels the first cell found wins.

use std::cmp::Ordering;

use crate::geometry::{footprints_overlap, grid_positions};
use crate::load::LoadState;
use crate::model::{ContainerProfile, ItemTemplate, Orientation, PlacedItem};
use crate::optimizer::{
    record_placed, record_unplaced, ArrangeEvent, ArrangeResult, PackingConfig, Strategy,
    UnplacedReason,
};
use crate::stacking::StackingRules;
use crate::types::{BoundingBox, EPSILON_HEIGHT, Vec3};
use crate::validator::{check_fixed, is_legal_support};

/// Rearranges the load to keep items low and packed.
pub fn arrange_by_space(
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> ArrangeResult {
    arrange_by_space_with_progress(load, profile, rules, config, |_| {})
}

/// Like `arrange_by_space`, reporting each decision to `on_event`.
pub fn arrange_by_space_with_progress(
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
    mut on_event: impl FnMut(&ArrangeEvent),
) -> ArrangeResult {
    let mut items: Vec<PlacedItem> = load.items().to_vec();
    items.sort_by(|a, b| {
        b.template
            .extents()
            .volume()
            .partial_cmp(&a.template.extents().volume())
            .unwrap_or(Ordering::Equal)
    });

    log::info!("space fill pass over {} items", items.len());
    on_event(&ArrangeEvent::Started {
        strategy: Strategy::Space,
        items: items.len(),
    });

    let mut arranged = load.empty_like();
    let mut unplaced = Vec::new();

    for item in items {
        if !arranged.capacity().can_add(item.template.weight) {
            record_unplaced(&mut unplaced, item, UnplacedReason::WeightExceeded, &mut on_event);
            continue;
        }

        match best_position(&item.template, &arranged, profile, rules, config) {
            Some((position, orientation)) => {
                let placed = PlacedItem::new(item.id, item.template, position, orientation);
                record_placed(&mut arranged, placed, &mut on_event);
            }
            None => {
                record_unplaced(&mut unplaced, item, UnplacedReason::Unplaceable, &mut on_event);
            }
        }
    }

    on_event(&ArrangeEvent::Finished {
        placed: arranged.len(),
        unplaced: unplaced.len(),
        current_weight: arranged.current_weight(),
    });
    ArrangeResult {
        load: arranged,
        unplaced,
    }
}

/// Orientations worth trying for a template.
fn orientations(template: &ItemTemplate, config: &PackingConfig) -> Vec<Orientation> {
    if config.allow_rotation && template.width != template.depth {
        Orientation::ALL.to_vec()
    } else {
        vec![Orientation::Original]
    }
}

/// Lowest position over all grid cells and orientations.
///
/// # Returns
/// `Some((center, orientation))`, or `None` when no cell has room
fn best_position(
    template: &ItemTemplate,
    arranged: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> Option<(Vec3, Orientation)> {
    let mut best: Option<(Vec3, Orientation)> = None;

    'search: for orientation in orientations(template, config) {
        let dims = orientation.extents(template);
        let zs = grid_positions(profile.depth, dims.z, config.grid_step, config.general_epsilon);
        let xs = grid_positions(profile.width, dims.x, config.grid_step, config.general_epsilon);

        for &z in &zs {
            for &x in &xs {
                let Some(y) = lowest_fit(x, z, dims, &template.type_id, arranged, profile, rules, config)
                else {
                    continue;
                };

                let lower = best.is_none_or(|(current, _)| y < current.y - EPSILON_HEIGHT);
                if lower {
                    best = Some((Vec3::new(x, y, z), orientation));
                }
                if y - dims.y * 0.5 <= EPSILON_HEIGHT {
                    // nothing beats the floor
                    break 'search;
                }
            }
        }
    }

    best
}

/// Scans the resting levels of one cell upward and returns the first center
/// height where the item fits.
///
/// Levels are the floor plus every top face under the footprint. A level
/// above the floor only counts if the stack is allowed.
#[allow(clippy::too_many_arguments)]
fn lowest_fit(
    x: f64,
    z: f64,
    dims: Vec3,
    type_id: &str,
    arranged: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> Option<f64> {
    let footprint = BoundingBox::from_center_and_extents(Vec3::new(x, dims.y * 0.5, z), dims);

    let mut levels: Vec<f64> = arranged
        .items()
        .iter()
        .map(|item| item.bounding_box())
        .filter(|bbox| footprints_overlap(bbox, &footprint, config.footprint_tolerance))
        .map(|bbox| bbox.top_y())
        .collect();
    levels.push(0.0);
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| (*a - *b).abs() <= EPSILON_HEIGHT);

    let limit = profile.ceiling() + config.general_epsilon;
    for level in levels {
        let y = level + dims.y * 0.5;
        if y + dims.y * 0.5 > limit {
            break;
        }
        let bbox = BoundingBox::from_center_and_extents(Vec3::new(x, y, z), dims);
        if check_fixed(&bbox, arranged, profile, config).is_err() {
            continue;
        }
        if !is_legal_support(&bbox, type_id, arranged, rules, config.footprint_tolerance) {
            continue;
        }
        return Some(y);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacking::StackingRule;

    fn template(id: &str, dims: (f64, f64, f64), weight: f64) -> ItemTemplate {
        ItemTemplate::new(id, id, dims, weight, id).unwrap()
    }

    fn load_of(profile: &ContainerProfile, items: Vec<(&str, ItemTemplate, (f64, f64, f64))>) -> LoadState {
        let items = items
            .into_iter()
            .map(|(id, template, (x, y, z))| {
                PlacedItem::new(id, template, Vec3::new(x, y, z), Orientation::Original)
            })
            .collect();
        LoadState::restore(profile, items).unwrap()
    }

    #[test]
    fn largest_item_takes_the_rear_left_corner() {
        let profile = ContainerProfile::new((4.0, 4.0, 8.0), 1000.0, 4.0).unwrap();
        let load = load_of(
            &profile,
            vec![
                ("small", template("small", (1.0, 1.0, 1.0), 5.0), (1.5, 0.5, 3.5)),
                ("big", template("big", (2.0, 1.0, 2.0), 20.0), (0.0, 0.5, 0.0)),
            ],
        );

        let result = arrange_by_space(&load, &profile, &StackingRules::new(), &PackingConfig::default());
        assert!(result.is_complete());

        let big = result.load.get("big").unwrap();
        assert_eq!(big.position, Vec3::new(-1.0, 0.5, -3.0));
        let small = result.load.get("small").unwrap();
        assert_eq!(small.position, Vec3::new(0.5, 0.5, -3.5));
        assert_eq!(result.load.items()[0].id, "big");
    }

    #[test]
    fn stacks_only_when_floor_is_full_and_rules_allow() {
        let profile = ContainerProfile::new((2.0, 4.0, 2.0), 1000.0, 4.0).unwrap();
        let cube = template("cube", (2.0, 1.0, 2.0), 10.0);
        let load = load_of(
            &profile,
            vec![
                ("a", cube.clone(), (0.0, 0.5, 0.0)),
                ("b", cube.clone(), (0.0, 1.5, 0.0)),
            ],
        );

        let forbidden = arrange_by_space(&load, &profile, &StackingRules::new(), &PackingConfig::default());
        assert_eq!(forbidden.placed_count(), 1);
        assert_eq!(forbidden.unplaced[0].reason, UnplacedReason::Unplaceable);

        let rules = StackingRules::from_rules([StackingRule::new("cube", "cube")]);
        let allowed = arrange_by_space(&load, &profile, &rules, &PackingConfig::default());
        assert!(allowed.is_complete());
        let mut heights: Vec<f64> = allowed.load.items().iter().map(|i| i.position.y).collect();
        heights.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(heights, vec![0.5, 1.5]);
    }

    #[test]
    fn rotation_lets_long_items_fit() {
        let profile = ContainerProfile::new((3.0, 2.0, 1.0), 1000.0, 2.0).unwrap();
        let beam = template("beam", (1.0, 1.0, 3.0), 10.0);
        let mut beam_load = LoadState::new(&profile);
        beam_load.push(PlacedItem::new("beam#1", beam, Vec3::new(0.0, 0.5, 0.0), Orientation::Original));

        let result = arrange_by_space(&beam_load, &profile, &StackingRules::new(), &PackingConfig::default());
        assert!(result.is_complete());
        assert_eq!(result.load.items()[0].orientation, Orientation::Rotated);

        let fixed = PackingConfig::builder().allow_rotation(false).build();
        let result = arrange_by_space(&beam_load, &profile, &StackingRules::new(), &fixed);
        assert_eq!(result.unplaced_count(), 1);
    }

    #[test]
    fn square_items_are_not_rotated() {
        let square = template("square", (1.0, 1.0, 1.0), 1.0);
        assert_eq!(orientations(&square, &PackingConfig::default()), vec![Orientation::Original]);

        let long = template("long", (1.0, 1.0, 2.0), 1.0);
        assert_eq!(orientations(&long, &PackingConfig::default()).len(), 2);
    }

    #[test]
    fn respects_stack_height_limit() {
        let profile = ContainerProfile::new((1.0, 4.0, 1.0), 1000.0, 1.5).unwrap();
        let cube = template("cube", (1.0, 1.0, 1.0), 10.0);
        let mut load = LoadState::new(&profile);
        load.push(PlacedItem::new("a", cube.clone(), Vec3::new(0.0, 0.5, 0.0), Orientation::Original));
        load.push(PlacedItem::new("b", cube, Vec3::new(0.0, 1.5, 0.0), Orientation::Original));

        let rules = StackingRules::from_rules([StackingRule::new("cube", "cube")]);
        let result = arrange_by_space(&load, &profile, &rules, &PackingConfig::default());
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced_count(), 1);
    }
}
