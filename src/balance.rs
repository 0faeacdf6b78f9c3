//! Weight-balance arrangement.
//!
//! Items are ranked by weight. The heaviest fifth goes to the rear third of
//! the truck, the next three tenths to the middle third and the rest to the
//! front third. Inside a band items alternate between the left and the right
//! half. Each item first tries to stack on a similar-sized item of its band
//! and otherwise takes the free floor spot closest to its target.

use std::cmp::Ordering;

use crate::geometry::footprints_overlap;
use crate::load::LoadState;
use crate::model::{ContainerProfile, Orientation, PlacedItem};
use crate::optimizer::{
    record_placed, record_unplaced, ArrangeEvent, ArrangeResult, PackingConfig, Strategy,
    UnplacedReason,
};
use crate::stacking::StackingRules;
use crate::types::{BoundingBox, Vec3};
use crate::validator::{check_fixed, is_legal_support};

/// Depth band of the truck an item is assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightBand {
    Rear,
    Center,
    Front,
}

impl WeightBand {
    /// Band for the item at `rank` (0 = heaviest) out of `count` items.
    pub fn for_rank(rank: usize, count: usize) -> Self {
        let rank = rank as f64;
        let count = count as f64;
        if rank < 0.2 * count {
            WeightBand::Rear
        } else if rank < 0.5 * count {
            WeightBand::Center
        } else {
            WeightBand::Front
        }
    }

    /// Z range of the band's third of the truck.
    pub fn zone(self, depth: f64) -> (f64, f64) {
        let third = depth / 3.0;
        let rear = -depth / 2.0;
        match self {
            WeightBand::Rear => (rear, rear + third),
            WeightBand::Center => (rear + third, rear + 2.0 * third),
            WeightBand::Front => (rear + 2.0 * third, depth / 2.0),
        }
    }

    /// Z the band's floor search starts from.
    pub fn target_z(self, depth: f64) -> f64 {
        match self {
            WeightBand::Rear => -depth / 3.0,
            WeightBand::Center => 0.0,
            WeightBand::Front => depth / 4.0,
        }
    }

    /// Distance of the target from the center line.
    pub fn lateral_offset(self, width: f64) -> f64 {
        match self {
            WeightBand::Rear => width / 4.0,
            WeightBand::Center => width / 5.0,
            WeightBand::Front => width / 6.0,
        }
    }
}

/// Half of the truck an item is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    fn flipped(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Range of center X values for an item of width `w` on this side.
    fn x_range(self, width: f64, w: f64) -> (f64, f64) {
        let half = (width - w) * 0.5;
        match self {
            Side::Left => (-half, 0.0_f64.min(half)),
            Side::Right => (0.0_f64.max(-half), half),
        }
    }
}

/// Band and side for each rank, with the side starting left in every band.
pub fn assign_slots(count: usize) -> Vec<(WeightBand, Side)> {
    let mut slots = Vec::with_capacity(count);
    let mut previous: Option<WeightBand> = None;
    let mut side = Side::Left;

    for rank in 0..count {
        let band = WeightBand::for_rank(rank, count);
        if previous != Some(band) {
            side = Side::Left;
            previous = Some(band);
        }
        slots.push((band, side));
        side = side.flipped();
    }
    slots
}

/// Rearranges the load for weight distribution.
pub fn arrange_by_weight(
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> ArrangeResult {
    arrange_by_weight_with_progress(load, profile, rules, config, |_| {})
}

/// Like `arrange_by_weight`, reporting each decision to `on_event`.
///
/// # Parameters
/// * `load` - Current load, left untouched
/// * `profile` - Container the load lives in
/// * `rules` - Stacking allow-list
/// * `config` - Grid step and tolerances
/// * `on_event` - Progress callback
///
/// # Returns
/// The rebuilt load; items outside their band's reach are reported as unplaced
pub fn arrange_by_weight_with_progress(
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
    mut on_event: impl FnMut(&ArrangeEvent),
) -> ArrangeResult {
    let mut items: Vec<PlacedItem> = load.items().to_vec();
    items.sort_by(|a, b| {
        b.template
            .weight
            .partial_cmp(&a.template.weight)
            .unwrap_or(Ordering::Equal)
    });

    log::info!("weight balance pass over {} items", items.len());
    on_event(&ArrangeEvent::Started {
        strategy: Strategy::Weight,
        items: items.len(),
    });

    let slots = assign_slots(items.len());
    let mut arranged = load.empty_like();
    let mut bands: Vec<WeightBand> = Vec::with_capacity(items.len());
    let mut unplaced = Vec::new();

    for (item, (band, side)) in items.into_iter().zip(slots) {
        if !arranged.capacity().can_add(item.template.weight) {
            record_unplaced(&mut unplaced, item, UnplacedReason::WeightExceeded, &mut on_event);
            continue;
        }

        let position = stack_position(&item, band, side, &arranged, &bands, profile, rules, config)
            .or_else(|| floor_position(&item, band, side, &arranged, profile, config));

        match position {
            Some(position) => {
                let placed = PlacedItem::new(item.id, item.template, position, Orientation::Original);
                record_placed(&mut arranged, placed, &mut on_event);
                bands.push(band);
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

fn target_point(band: WeightBand, side: Side, profile: &ContainerProfile) -> (f64, f64) {
    (
        side.sign() * band.lateral_offset(profile.width),
        band.target_z(profile.depth),
    )
}

/// Tries to put the item on top of an item of the same band.
///
/// `bands[i]` is the band of `arranged.items()[i]`.
#[allow(clippy::too_many_arguments)]
fn stack_position(
    item: &PlacedItem,
    band: WeightBand,
    side: Side,
    arranged: &LoadState,
    bands: &[WeightBand],
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> Option<Vec3> {
    let dims = item.template.extents();
    let (tx, tz) = target_point(band, side, profile);
    let target = BoundingBox::from_center_and_extents(Vec3::new(tx, dims.y * 0.5, tz), dims);
    let fit = 1.0 + config.stack_fit_tolerance;

    arranged
        .items()
        .iter()
        .zip(bands)
        .filter(|(_, base_band)| **base_band == band)
        .map(|(base, _)| base)
        .filter(|base| rules.may_stack(base.type_id(), item.type_id()))
        .filter(|base| {
            let base_dims = base.extents();
            dims.x <= base_dims.x * fit && dims.z <= base_dims.z * fit
        })
        .filter(|base| footprints_overlap(&base.bounding_box(), &target, config.footprint_tolerance))
        .find_map(|base| {
            let position = Vec3::new(
                base.position.x,
                base.bounding_box().top_y() + dims.y * 0.5,
                base.position.z,
            );
            let bbox = BoundingBox::from_center_and_extents(position, dims);
            let legal = check_fixed(&bbox, arranged, profile, config).is_ok()
                && is_legal_support(&bbox, item.type_id(), arranged, rules, config.footprint_tolerance);
            legal.then_some(position)
        })
}

/// Free floor spot in the item's zone and side, closest to the target first.
fn floor_position(
    item: &PlacedItem,
    band: WeightBand,
    side: Side,
    arranged: &LoadState,
    profile: &ContainerProfile,
    config: &PackingConfig,
) -> Option<Vec3> {
    let dims = item.template.extents();
    let (tx, tz) = target_point(band, side, profile);
    let eps = config.general_epsilon;

    let (x_lo, x_hi) = side.x_range(profile.width, dims.x);
    let (zone_lo, zone_hi) = band.zone(profile.depth);
    let half_d = (profile.depth - dims.z) * 0.5;
    let z_lo = zone_lo.max(-half_d);
    let z_hi = zone_hi.min(half_d);

    let xs = axis_candidates(tx, x_lo, x_hi, config.grid_step, eps);
    let zs = axis_candidates(tz, z_lo, z_hi, config.grid_step, eps);
    let (cx, cz) = match (xs.first(), zs.first()) {
        (Some(_), Some(_)) => (tx.clamp(x_lo, x_hi.max(x_lo)), tz.clamp(z_lo, z_hi.max(z_lo))),
        _ => return None,
    };

    let mut points: Vec<(f64, f64)> = zs
        .iter()
        .flat_map(|&z| xs.iter().map(move |&x| (x, z)))
        .collect();
    points.sort_by(|a, b| {
        let da = (a.0 - cx).powi(2) + (a.1 - cz).powi(2);
        let db = (b.0 - cx).powi(2) + (b.1 - cz).powi(2);
        compare_with_epsilon(da, db, eps)
            .then_with(|| compare_with_epsilon((a.1 - cz).abs(), (b.1 - cz).abs(), eps))
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| a.0.total_cmp(&b.0))
    });

    points.into_iter().find_map(|(x, z)| {
        let position = Vec3::new(x, dims.y * 0.5, z);
        let bbox = BoundingBox::from_center_and_extents(position, dims);
        check_fixed(&bbox, arranged, profile, config)
            .is_ok()
            .then_some(position)
    })
}

/// Positions `target ± k * step` inside `[lo, hi]`, plus both ends.
fn axis_candidates(target: f64, lo: f64, hi: f64, step: f64, eps: f64) -> Vec<f64> {
    if lo > hi + eps {
        return Vec::new();
    }
    let hi = hi.max(lo);
    let center = target.clamp(lo, hi);
    let mut values = vec![center, lo, hi];

    if step > 0.0 {
        let mut k = 1.0;
        loop {
            let down = center - k * step;
            let up = center + k * step;
            let mut extended = false;
            if down >= lo - eps {
                values.push(down.max(lo));
                extended = true;
            }
            if up <= hi + eps {
                values.push(up.min(hi));
                extended = true;
            }
            if !extended {
                break;
            }
            k += 1.0;
        }
    }

    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() <= eps);
    values
}

fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemTemplate;
    use crate::stacking::StackingRule;

    fn truck() -> ContainerProfile {
        ContainerProfile::new((8.0, 8.0, 16.0), 1000.0, 8.0).unwrap()
    }

    fn crate_item(id: &str, weight: f64, pos: (f64, f64, f64)) -> PlacedItem {
        PlacedItem::new(
            id,
            ItemTemplate::new("crate", "Crate", (1.0, 1.0, 1.0), weight, "crate").unwrap(),
            Vec3::new(pos.0, pos.1, pos.2),
            Orientation::Original,
        )
    }

    fn row_load(profile: &ContainerProfile, weights: &[f64]) -> LoadState {
        let items = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let x = -3.5 + (i % 8) as f64;
                let z = (i / 8) as f64 * 2.0;
                crate_item(&format!("c{i}"), w, (x, 0.5, z))
            })
            .collect::<Vec<_>>();
        LoadState::restore(profile, items).unwrap()
    }

    fn descending(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 - i as f64 * 10.0).collect()
    }

    fn in_zone(item: &PlacedItem, band: WeightBand, depth: f64) -> bool {
        let (lo, hi) = band.zone(depth);
        item.position.z >= lo && item.position.z <= hi
    }

    #[test]
    fn bands_follow_rank() {
        let bands: Vec<_> = (0..10).map(|r| WeightBand::for_rank(r, 10)).collect();
        assert_eq!(&bands[..2], &[WeightBand::Rear; 2]);
        assert_eq!(&bands[2..5], &[WeightBand::Center; 3]);
        assert_eq!(&bands[5..], &[WeightBand::Front; 5]);

        assert_eq!(WeightBand::for_rank(0, 1), WeightBand::Rear);
    }

    #[test]
    fn front_target_sits_a_quarter_ahead() {
        assert_eq!(WeightBand::Rear.target_z(12.0), -4.0);
        assert_eq!(WeightBand::Center.target_z(12.0), 0.0);
        assert_eq!(WeightBand::Front.target_z(12.0), 3.0);
    }

    #[test]
    fn sides_restart_left_in_each_band() {
        let slots = assign_slots(10);
        let sides: Vec<_> = slots.iter().map(|(_, side)| *side).collect();
        assert_eq!(
            sides,
            vec![
                Side::Left,
                Side::Right,
                Side::Left,
                Side::Right,
                Side::Left,
                Side::Left,
                Side::Right,
                Side::Left,
                Side::Right,
                Side::Left
            ]
        );
    }

    #[test]
    fn ten_items_land_in_their_zones() {
        let profile = truck();
        let load = row_load(&profile, &descending(10));

        let result = arrange_by_weight(&load, &profile, &StackingRules::new(), &PackingConfig::default());
        assert!(result.is_complete());

        for i in 0..10 {
            let item = result.load.get(&format!("c{i}")).unwrap();
            let band = WeightBand::for_rank(i, 10);
            assert!(in_zone(item, band, profile.depth), "c{i} left its zone");
            assert!((item.position.y - 0.5).abs() < 1e-9);
        }

        assert!(result.load.get("c0").unwrap().position.x < 0.0);
        assert!(result.load.get("c1").unwrap().position.x > 0.0);

        // the first front pair takes the free spot right at the front target
        for id in ["c5", "c6"] {
            let item = result.load.get(id).unwrap();
            assert!((item.position.z - 4.0).abs() < 1e-9, "{id} missed the front target");
        }
    }

    #[test]
    fn similar_items_stack_when_allowed() {
        let profile = truck();
        let rules = StackingRules::from_rules([StackingRule::new("crate", "crate")]);
        let load = row_load(&profile, &descending(10));

        let result = arrange_by_weight(&load, &profile, &rules, &PackingConfig::default());
        assert!(result.is_complete());

        // the second left-hand item of a band lands on the first one
        for (lower_id, upper_id) in [("c2", "c4"), ("c5", "c7")] {
            let lower = result.load.get(lower_id).unwrap();
            let upper = result.load.get(upper_id).unwrap();
            assert_eq!(lower.position.y, 0.5);
            assert_eq!(upper.position.y, 1.5);
            assert_eq!(upper.position.x, lower.position.x);
            assert_eq!(upper.position.z, lower.position.z);
        }

        let top = result.load.get("c9").unwrap();
        assert_eq!(top.position.y, 2.5);
    }

    #[test]
    fn orientation_resets_to_original() {
        let profile = truck();
        let mut rotated = crate_item("c0", 10.0, (0.0, 0.5, 0.0));
        rotated.orientation = Orientation::Rotated;
        let load = LoadState::restore(&profile, vec![rotated]).unwrap();

        let result = arrange_by_weight(&load, &profile, &StackingRules::new(), &PackingConfig::default());
        assert_eq!(result.load.items()[0].orientation, Orientation::Original);
    }

    #[test]
    fn crowded_zone_reports_unplaceable() {
        // one item fills the whole width and a whole third of the depth
        let profile = ContainerProfile::new((2.0, 2.0, 6.0), 1000.0, 2.0).unwrap();
        let slab = ItemTemplate::new("slab", "Slab", (2.0, 1.0, 2.0), 10.0, "slab").unwrap();
        let spots = [
            (0.5, -2.0),
            (0.5, 0.0),
            (0.5, 2.0),
            (1.5, -2.0),
            (1.5, 0.0),
        ];
        let items: Vec<PlacedItem> = spots
            .iter()
            .enumerate()
            .map(|(i, &(y, z))| {
                let mut template = slab.clone();
                template.weight = 50.0 - i as f64 * 10.0;
                PlacedItem::new(format!("s{i}"), template, Vec3::new(0.0, y, z), Orientation::Original)
            })
            .collect();
        let load = LoadState::restore(&profile, items).unwrap();

        let result = arrange_by_weight(&load, &profile, &StackingRules::new(), &PackingConfig::default());

        let dropped: Vec<&str> = result.unplaced.iter().map(|u| u.item.id.as_str()).collect();
        assert_eq!(dropped, vec!["s2", "s4"]);
        for item in &result.unplaced {
            assert_eq!(item.reason, UnplacedReason::Unplaceable);
        }
        assert_eq!(result.placed_count(), 3);
    }

    #[test]
    fn weight_ceiling_is_reported() {
        let profile = ContainerProfile::new((8.0, 8.0, 16.0), 80.0, 8.0).unwrap();
        let mut overloaded = LoadState::new(&profile);
        overloaded.push(crate_item("c0", 60.0, (-2.0, 0.5, 0.0)));
        overloaded.push(crate_item("c1", 40.0, (2.0, 0.5, 0.0)));

        let result = arrange_by_weight(&overloaded, &profile, &StackingRules::new(), &PackingConfig::default());
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced[0].reason, UnplacedReason::WeightExceeded);
        assert_eq!(result.unplaced[0].item.id, "c1");
    }

    #[test]
    fn axis_candidates_stay_in_range() {
        let values = axis_candidates(1.0, 0.0, 2.2, 0.5, 1e-9);
        assert!(values.iter().all(|v| (0.0..=2.2).contains(v)));
        assert!(values.contains(&1.0));
        assert!(values.contains(&2.2));
        assert!(values.contains(&0.0));

        assert!(axis_candidates(0.0, 1.0, 0.5, 0.5, 1e-9).is_empty());
    }
}
