//! Command facade over the engine.
//!
//! A `LoadPlanner` binds the profile, catalog, stacking rules and tuning for
//! one request and applies a single command to a load. It holds no load of
//! its own; the caller passes the current load in and keeps the one that
//! comes back.

use thiserror::Error;

use crate::geometry::grid_positions;
use crate::load::LoadState;
use crate::model::{Catalog, ContainerProfile, Orientation, PlacedItem};
use crate::optimizer::{
    optimize_with_progress, ArrangeEvent, ArrangeResult, PackingConfig, Strategy, UnplacedItem,
};
use crate::stacking::StackingRules;
use crate::types::{EPSILON_HEIGHT, Vec3};
use crate::validator::{evaluate, place, Candidate, RejectionReason};

/// A command names something that does not exist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Unknown item template: {0}")]
    UnknownTemplate(String),
    #[error("Unknown placed item: {0}")]
    UnknownPlacedItem(String),
    #[error("Placed item {base} still carries {top}")]
    CarriesItems { base: String, top: String },
}

/// What a placement request refers to.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementTarget {
    /// A new instance of a catalog template
    Template(String),
    /// An item already in the load, to be moved
    Placed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementRequest {
    pub target: PlacementTarget,
    pub x: f64,
    pub z: f64,
    pub orientation: Orientation,
}

/// One operation on a load.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadCommand {
    Place(PlacementRequest),
    Remove { placed_id: String },
    OptimizeByWeight,
    OptimizeBySpace,
    Reset,
}

/// Answer to a placement request.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementOutcome {
    Accepted { id: String, position: Vec3 },
    Rejected { reason: RejectionReason },
}

/// New load after a command, with the details the command produced.
#[derive(Clone, Debug)]
pub struct CommandOutcome {
    pub load: LoadState,
    /// Set for placement commands
    pub placement: Option<PlacementOutcome>,
    /// Items an optimizer pass left out
    pub unplaced: Vec<UnplacedItem>,
}

impl From<ArrangeResult> for CommandOutcome {
    fn from(result: ArrangeResult) -> Self {
        Self {
            load: result.load,
            placement: None,
            unplaced: result.unplaced,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadPlanner<'a> {
    profile: &'a ContainerProfile,
    catalog: &'a Catalog,
    rules: &'a StackingRules,
    config: PackingConfig,
}

impl<'a> LoadPlanner<'a> {
    pub fn new(profile: &'a ContainerProfile, catalog: &'a Catalog, rules: &'a StackingRules) -> Self {
        Self {
            profile,
            catalog,
            rules,
            config: PackingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profile(&self) -> &ContainerProfile {
        self.profile
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Places a new item or moves a loaded one.
    ///
    /// # Returns
    /// `Ok` with the validator's verdict. `Err` if the request names an
    /// unknown template or placed item, or moves an item that carries others.
    pub fn place(
        &self,
        load: &mut LoadState,
        request: &PlacementRequest,
    ) -> Result<PlacementOutcome, RequestError> {
        let (template, existing_id) = match &request.target {
            PlacementTarget::Template(id) => {
                let template = self
                    .catalog
                    .get(id)
                    .ok_or_else(|| RequestError::UnknownTemplate(id.clone()))?;
                (template.clone(), None)
            }
            PlacementTarget::Placed(id) => {
                let item = load
                    .get(id)
                    .ok_or_else(|| RequestError::UnknownPlacedItem(id.clone()))?;
                self.ensure_nothing_on_top(load, id)?;
                (item.template.clone(), Some(id.as_str()))
            }
        };

        let mut candidate = Candidate::new(&template, request.x, request.z, request.orientation);
        if let Some(id) = existing_id {
            candidate = candidate.moving(id);
        }

        let outcome = match place(&candidate, load, self.profile, self.rules, &self.config) {
            Ok(placed) => PlacementOutcome::Accepted {
                id: placed.id,
                position: placed.position,
            },
            Err(reason) => PlacementOutcome::Rejected { reason },
        };
        Ok(outcome)
    }

    /// Unloads one item. Items resting on it have to be unloaded first.
    pub fn remove(&self, load: &mut LoadState, placed_id: &str) -> Result<PlacedItem, RequestError> {
        self.ensure_nothing_on_top(load, placed_id)?;
        let removed = load
            .remove(placed_id)
            .ok_or_else(|| RequestError::UnknownPlacedItem(placed_id.to_string()))?;
        log::debug!("removed {}", removed.id);
        Ok(removed)
    }

    fn ensure_nothing_on_top(&self, load: &LoadState, placed_id: &str) -> Result<(), RequestError> {
        match load.carried_by(placed_id, self.config.footprint_tolerance).first() {
            Some(top) => Err(RequestError::CarriesItems {
                base: placed_id.to_string(),
                top: top.id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Runs an arrangement pass on the load.
    pub fn optimize(&self, load: &LoadState, strategy: Strategy) -> ArrangeResult {
        self.optimize_with_progress(load, strategy, |_| {})
    }

    pub fn optimize_with_progress(
        &self,
        load: &LoadState,
        strategy: Strategy,
        on_event: impl FnMut(&ArrangeEvent),
    ) -> ArrangeResult {
        optimize_with_progress(strategy, load, self.profile, self.rules, &self.config, on_event)
    }

    /// First free floor spot for a new instance of `template_id`.
    ///
    /// Scans rear to front, left to right in the original orientation.
    ///
    /// # Returns
    /// `Ok(None)` if no floor spot is accepted, e.g. because the load is at
    /// its weight ceiling.
    pub fn suggest_position(
        &self,
        load: &LoadState,
        template_id: &str,
    ) -> Result<Option<Vec3>, RequestError> {
        let template = self
            .catalog
            .get(template_id)
            .ok_or_else(|| RequestError::UnknownTemplate(template_id.to_string()))?;

        if !load.capacity().can_add(template.weight) {
            return Ok(None);
        }

        let floor_y = template.height * 0.5;
        let eps = self.config.general_epsilon;
        let zs = grid_positions(self.profile.depth, template.depth, self.config.grid_step, eps);
        let xs = grid_positions(self.profile.width, template.width, self.config.grid_step, eps);

        for &z in &zs {
            for &x in &xs {
                let candidate = Candidate::new(template, x, z, Orientation::Original);
                if let Ok(position) = evaluate(&candidate, load, self.profile, self.rules, &self.config) {
                    if (position.y - floor_y).abs() <= EPSILON_HEIGHT {
                        return Ok(Some(position));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Applies one command and returns the resulting load.
    ///
    /// Rejected placements return the load unchanged together with the reason.
    pub fn apply(&self, load: LoadState, command: LoadCommand) -> Result<CommandOutcome, RequestError> {
        self.apply_with_progress(load, command, |_| {})
    }

    /// Like `apply`, forwarding optimizer progress to `on_event`.
    pub fn apply_with_progress(
        &self,
        mut load: LoadState,
        command: LoadCommand,
        on_event: impl FnMut(&ArrangeEvent),
    ) -> Result<CommandOutcome, RequestError> {
        let outcome = match command {
            LoadCommand::Place(request) => {
                let placement = self.place(&mut load, &request)?;
                CommandOutcome {
                    load,
                    placement: Some(placement),
                    unplaced: Vec::new(),
                }
            }
            LoadCommand::Remove { placed_id } => {
                self.remove(&mut load, &placed_id)?;
                CommandOutcome {
                    load,
                    placement: None,
                    unplaced: Vec::new(),
                }
            }
            LoadCommand::OptimizeByWeight => {
                self.optimize_with_progress(&load, Strategy::Weight, on_event).into()
            }
            LoadCommand::OptimizeBySpace => {
                self.optimize_with_progress(&load, Strategy::Space, on_event).into()
            }
            LoadCommand::Reset => {
                load.reset();
                CommandOutcome {
                    load,
                    placement: None,
                    unplaced: Vec::new(),
                }
            }
        };
        Ok(outcome)
    }
}
