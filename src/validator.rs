//! Accept/reject decisions for single placements.
//!
//! A candidate runs through a fixed sequence of checks and stops at the first
//! failure:
//! 1. horizontal clamp and size check (`OutOfBounds`)
//! 2. weight ceiling for new items (`WeightExceeded`)
//! 3. resting height on the highest item that allows it
//! 4. stack height (`StackHeightExceeded`)
//! 5. overlap with other items, or touching the underside of an item that
//!    may not rest on the candidate (`Collision`)
//!
//! The load is only touched when every check passes.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::geometry::{bounds_contains_within, footprints_overlap, overlaps_within, rests_on};
use crate::load::LoadState;
use crate::model::{ContainerProfile, ItemTemplate, Orientation, PlacedItem};
use crate::optimizer::PackingConfig;
use crate::stacking::StackingRules;
use crate::types::{BoundingBox, EPSILON_HEIGHT, Vec3};

/// Why a placement was refused. All of these are recoverable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Item does not fit inside the container")]
    OutOfBounds,
    #[error("Item would exceed the container weight ceiling")]
    WeightExceeded,
    #[error("Item would exceed the maximum stack height")]
    StackHeightExceeded,
    #[error("Item collides with another placed item")]
    Collision,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::OutOfBounds => "out_of_bounds",
            RejectionReason::WeightExceeded => "weight_exceeded",
            RejectionReason::StackHeightExceeded => "stack_height_exceeded",
            RejectionReason::Collision => "collision",
        }
    }
}

/// A proposed position for an item.
///
/// `existing_id` is set when an already loaded item is being moved; that item
/// is ignored for collision and support and its weight is not counted twice.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub template: &'a ItemTemplate,
    pub existing_id: Option<&'a str>,
    pub x: f64,
    pub z: f64,
    pub orientation: Orientation,
}

impl<'a> Candidate<'a> {
    /// A new instance of `template` dropped at `(x, z)`.
    pub fn new(template: &'a ItemTemplate, x: f64, z: f64, orientation: Orientation) -> Self {
        Self {
            template,
            existing_id: None,
            x,
            z,
            orientation,
        }
    }

    /// Marks the candidate as a move of the loaded item `id`.
    pub fn moving(mut self, id: &'a str) -> Self {
        self.existing_id = Some(id);
        self
    }

    fn is_excluded(&self, item: &PlacedItem) -> bool {
        self.existing_id == Some(item.id.as_str())
    }
}

/// Runs all checks without changing the load.
///
/// # Parameters
/// * `candidate` - Item, drop point and orientation
/// * `load` - Current load
/// * `profile` - Container limits
/// * `rules` - Stacking allow-list
/// * `config` - Tolerances
///
/// # Returns
/// The resolved center position, or the first failed check
pub fn evaluate(
    candidate: &Candidate<'_>,
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> Result<Vec3, RejectionReason> {
    let dims = candidate.orientation.extents(candidate.template);

    if !candidate.x.is_finite()
        || !candidate.z.is_finite()
        || dims.x > profile.width
        || dims.z > profile.depth
        || dims.y > profile.height
    {
        return Err(RejectionReason::OutOfBounds);
    }
    let half_w = (profile.width - dims.x) * 0.5;
    let half_d = (profile.depth - dims.z) * 0.5;
    let x = candidate.x.clamp(-half_w, half_w);
    let z = candidate.z.clamp(-half_d, half_d);

    let is_new = candidate.existing_id.is_none_or(|id| !load.contains(id));
    if is_new && !load.capacity().can_add(candidate.template.weight) {
        return Err(RejectionReason::WeightExceeded);
    }

    let y = resting_height(candidate, x, z, dims, load, profile, rules, config);

    if y + dims.y * 0.5 > profile.max_stack_height + config.general_epsilon {
        return Err(RejectionReason::StackHeightExceeded);
    }

    let bbox = BoundingBox::from_center_and_extents(Vec3::new(x, y, z), dims);
    let collides = load
        .items()
        .iter()
        .filter(|item| !candidate.is_excluded(item))
        .any(|item| overlaps_within(&item.bounding_box(), &bbox, config.general_epsilon));
    if collides {
        return Err(RejectionReason::Collision);
    }

    let carries_forbidden = load
        .items()
        .iter()
        .filter(|item| !candidate.is_excluded(item))
        .filter(|item| rests_on(&item.bounding_box(), &bbox, config.footprint_tolerance))
        .any(|item| !rules.may_stack(&candidate.template.type_id, item.type_id()));
    if carries_forbidden {
        return Err(RejectionReason::Collision);
    }

    Ok(Vec3::new(x, y, z))
}

/// Center height for the candidate: on the floor, or on the highest top face
/// under its footprint where every item at that level allows the stack.
#[allow(clippy::too_many_arguments)]
fn resting_height(
    candidate: &Candidate<'_>,
    x: f64,
    z: f64,
    dims: Vec3,
    load: &LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> f64 {
    let footprint = BoundingBox::from_center_and_extents(Vec3::new(x, dims.y * 0.5, z), dims);
    let top_type = candidate.template.type_id.as_str();

    let under: Vec<&PlacedItem> = load
        .items()
        .iter()
        .filter(|item| !candidate.is_excluded(item))
        .filter(|item| {
            footprints_overlap(&item.bounding_box(), &footprint, config.footprint_tolerance)
        })
        .collect();

    let mut levels: Vec<f64> = under
        .iter()
        .filter(|item| rules.may_stack(item.type_id(), top_type))
        .map(|item| item.bounding_box().top_y())
        .collect();
    levels.sort_by(|a, b| b.total_cmp(a));
    levels.dedup_by(|a, b| (*a - *b).abs() <= EPSILON_HEIGHT);

    for level in levels {
        if level + dims.y > profile.height + config.general_epsilon {
            continue;
        }
        let blocked = under.iter().any(|item| {
            (item.bounding_box().top_y() - level).abs() <= EPSILON_HEIGHT
                && !rules.may_stack(item.type_id(), top_type)
        });
        if blocked {
            continue;
        }
        log::debug!(
            "{} rests at level {:.3} over ({:.3}, {:.3})",
            candidate.template.id,
            level,
            x,
            z
        );
        return level + dims.y * 0.5;
    }

    dims.y * 0.5
}

/// Validates the candidate and applies it to the load.
///
/// A new item gets a fresh instance id and its weight is booked; a moved item
/// keeps its id and only changes position and orientation.
///
/// # Returns
/// The placed item as stored in the load, or the rejection reason. On
/// rejection the load is unchanged.
pub fn place(
    candidate: &Candidate<'_>,
    load: &mut LoadState,
    profile: &ContainerProfile,
    rules: &StackingRules,
    config: &PackingConfig,
) -> Result<PlacedItem, RejectionReason> {
    let position = match evaluate(candidate, load, profile, rules, config) {
        Ok(position) => position,
        Err(reason) => {
            log::debug!("rejected {}: {}", candidate.template.id, reason.code());
            return Err(reason);
        }
    };

    match candidate.existing_id.filter(|id| load.contains(id)) {
        Some(id) => {
            let moved = PlacedItem::new(
                id,
                candidate.template.clone(),
                position,
                candidate.orientation,
            );
            load.replace(moved.clone());
            log::debug!("moved {} to ({:.3}, {:.3}, {:.3})", id, position.x, position.y, position.z);
            Ok(moved)
        }
        None => {
            let id = load.next_instance_id(&candidate.template.id);
            let placed = PlacedItem::new(
                id,
                candidate.template.clone(),
                position,
                candidate.orientation,
            );
            load.push_new(placed.clone());
            log::debug!(
                "accepted {} at ({:.3}, {:.3}, {:.3})",
                placed.id,
                position.x,
                position.y,
                position.z
            );
            Ok(placed)
        }
    }
}

/// Checks a fully resolved box against containment, the stack limit and
/// every item already in `load`.
pub(crate) fn check_fixed(
    bbox: &BoundingBox,
    load: &LoadState,
    profile: &ContainerProfile,
    config: &PackingConfig,
) -> Result<(), RejectionReason> {
    if !bounds_contains_within(profile, bbox, config.general_epsilon) {
        return Err(RejectionReason::OutOfBounds);
    }
    if bbox.top_y() > profile.max_stack_height + config.general_epsilon {
        return Err(RejectionReason::StackHeightExceeded);
    }
    if load
        .items()
        .iter()
        .any(|item| overlaps_within(&item.bounding_box(), bbox, config.general_epsilon))
    {
        return Err(RejectionReason::Collision);
    }
    Ok(())
}

/// `true` if the box stands on the floor, or if it rests on at least one item
/// and every item it touches from above allows `type_id` on top.
pub(crate) fn is_legal_support(
    bbox: &BoundingBox,
    type_id: &str,
    load: &LoadState,
    rules: &StackingRules,
    margin: f64,
) -> bool {
    if bbox.bottom_y() <= EPSILON_HEIGHT {
        return true;
    }

    let mut supporters = load
        .items()
        .iter()
        .filter(|item| rests_on(bbox, &item.bounding_box(), margin))
        .peekable();

    supporters.peek().is_some() && supporters.all(|item| rules.may_stack(item.type_id(), type_id))
}
