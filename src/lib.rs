//! Cargo placement engine for truck loads.
//!
//! Items from a catalog are placed into a box-shaped cargo volume under
//! containment, collision, weight, stack height and stacking-rule
//! constraints. Two arrangement heuristics rebuild a load either for axle
//! balance (`balance`) or for dense low packing (`space_fill`).
//!
//! `planner::LoadPlanner` is the entry point for callers; `api` exposes it
//! over HTTP.

pub mod api;
pub mod balance;
pub mod capacity;
pub mod config;
pub mod geometry;
pub mod load;
pub mod model;
pub mod optimizer;
pub mod planner;
pub mod space_fill;
pub mod stacking;
pub mod types;
pub mod validator;
