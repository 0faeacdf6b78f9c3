//! Data models for the cargo placement engine.
//!
//! This module defines the fundamental data structures:
//! - `ItemTemplate`: a catalog entry with dimensions, weight and stacking type
//! - `PlacedItem`: an instance of a template at a position in the truck
//! - `ContainerProfile`: the cargo volume with its weight and stack limits
//! - `Catalog`: the ordered set of templates a load may draw from
//!
//! Malformed values are rejected when these are constructed, never later
//! inside the placement algorithms.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{BoundingBox, Dimensional, Vec3};

/// Validation error for catalog and profile data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_extents(dims: (f64, f64, f64), prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.0, &format!("{prefix}width"))?;
    validate_dimension(dims.1, &format!("{prefix}height"))?;
    validate_dimension(dims.2, &format!("{prefix}depth"))?;
    Ok(())
}

fn validate_identifier(value: &str, name: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidConfiguration(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

/// Catalog entry describing one kind of furniture item.
///
/// # Fields
/// * `id` - Unique identifier within the catalog
/// * `name` - Display name
/// * `width`, `height`, `depth` - Extents in container units
/// * `weight` - Weight in kg
/// * `type_id` - Tag looked up in the stacking rule table
/// * `color` - Opaque display metadata, carried through unchanged
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "table",
    "name": "Dining Table",
    "width": 2.0,
    "height": 0.8,
    "depth": 1.2,
    "weight": 40.0,
    "type_id": "table",
    "color": "#10b981"
}))]
pub struct ItemTemplate {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ItemTemplate {
    /// Creates a new template with validation.
    ///
    /// # Parameters
    /// * `id` - Unique ID
    /// * `name` - Display name
    /// * `dims` - Extents (width, height, depth)
    /// * `weight` - Weight in kg
    /// * `type_id` - Stacking type tag
    ///
    /// # Returns
    /// `Ok(ItemTemplate)` for valid values, otherwise `Err(ValidationError)`
    ///
    /// # Examples
    /// ```
    /// use truck_loader::model::ItemTemplate;
    ///
    /// let chair = ItemTemplate::new("chair", "Chair", (0.6, 0.9, 0.6), 7.0, "chair");
    /// assert!(chair.is_ok());
    ///
    /// let broken = ItemTemplate::new("chair", "Chair", (0.6, -0.9, 0.6), 7.0, "chair");
    /// assert!(broken.is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        dims: (f64, f64, f64),
        weight: f64,
        type_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let template = Self {
            id: id.into(),
            name: name.into(),
            width: dims.0,
            height: dims.1,
            depth: dims.2,
            weight,
            type_id: type_id.into(),
            color: None,
        };
        template.validate()?;
        Ok(template)
    }

    /// Attaches display color metadata.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Re-checks all invariants, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.id, "Item id")?;
        validate_identifier(&self.type_id, "Item type")?;
        validate_extents((self.width, self.height, self.depth), "Item ")?;
        validate_weight_value(self.weight, "Item weight")
    }

    /// Unrotated extents.
    #[inline]
    pub fn extents(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }
}

impl Dimensional for ItemTemplate {
    fn dimensions(&self) -> Vec3 {
        self.extents()
    }
}

/// Rotation of a placed item about the vertical axis.
///
/// Only quarter turns are supported, which swap width and depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Original,
    Rotated,
}

impl Orientation {
    /// Both orientations in scan order.
    pub const ALL: [Orientation; 2] = [Orientation::Original, Orientation::Rotated];

    /// Extents of `template` when laid out in this orientation.
    #[inline]
    pub fn extents(self, template: &ItemTemplate) -> Vec3 {
        match self {
            Orientation::Original => Vec3::new(template.width, template.height, template.depth),
            Orientation::Rotated => Vec3::new(template.depth, template.height, template.width),
        }
    }

    /// Rotation about the vertical axis in radians, as the renderer expects it.
    pub fn yaw_radians(self) -> f64 {
        match self {
            Orientation::Original => 0.0,
            Orientation::Rotated => std::f64::consts::FRAC_PI_2,
        }
    }
}

/// A template instance with its center position in the truck.
///
/// # Fields
/// * `id` - Instance identifier, unique within a load
/// * `template` - The catalog entry this instance was created from
/// * `position` - Center of the item in container coordinates
/// * `orientation` - Quarter turn about the vertical axis
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    pub id: String,
    pub template: ItemTemplate,
    pub position: Vec3,
    pub orientation: Orientation,
}

impl PlacedItem {
    pub fn new(
        id: impl Into<String>,
        template: ItemTemplate,
        position: Vec3,
        orientation: Orientation,
    ) -> Self {
        Self {
            id: id.into(),
            template,
            position,
            orientation,
        }
    }

    /// Extents after applying the orientation.
    #[inline]
    pub fn extents(&self) -> Vec3 {
        self.orientation.extents(&self.template)
    }

    /// Axis-aligned box occupied by the item.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_center_and_extents(self.position, self.extents())
    }

    /// Y coordinate of the top face.
    #[inline]
    pub fn top_y(&self) -> f64 {
        self.position.y + self.template.height / 2.0
    }

    /// Y coordinate of the bottom face.
    #[inline]
    pub fn bottom_y(&self) -> f64 {
        self.position.y - self.template.height / 2.0
    }

    #[inline]
    pub fn type_id(&self) -> &str {
        &self.template.type_id
    }
}

impl Dimensional for PlacedItem {
    fn dimensions(&self) -> Vec3 {
        self.extents()
    }
}

/// Cargo volume of a truck with its loading limits.
///
/// # Fields
/// * `width`, `height`, `depth` - Interior extents
/// * `max_weight` - Maximum total load in kg
/// * `max_stack_height` - Upper bound for the top face of any item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "truck-pequeno",
    "name": "Caminhão 3/4",
    "width": 2.5,
    "height": 2.2,
    "depth": 5.5,
    "max_weight": 3500.0,
    "max_stack_height": 6.0
}))]
pub struct ContainerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub max_weight: f64,
    pub max_stack_height: f64,
}

impl ContainerProfile {
    /// Profile selected when the caller does not choose one.
    pub const DEFAULT_PRESET_ID: &'static str = "truck-pequeno";

    /// Creates a new profile with validation.
    ///
    /// # Parameters
    /// * `dims` - Extents (width, height, depth)
    /// * `max_weight` - Weight ceiling in kg
    /// * `max_stack_height` - Highest allowed top face
    pub fn new(
        dims: (f64, f64, f64),
        max_weight: f64,
        max_stack_height: f64,
    ) -> Result<Self, ValidationError> {
        let profile = Self {
            id: None,
            name: None,
            width: dims.0,
            height: dims.1,
            depth: dims.2,
            max_weight,
            max_stack_height,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Re-checks all invariants, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_extents((self.width, self.height, self.depth), "Container ")?;
        validate_weight_value(self.max_weight, "Maximum weight")?;
        validate_dimension(self.max_stack_height, "Maximum stack height")
    }

    #[inline]
    pub fn extents(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }

    /// The cargo volume as a box: floor at `y = 0`, centered on X and Z.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_center_and_extents(
            Vec3::new(0.0, self.height / 2.0, 0.0),
            self.extents(),
        )
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.extents().volume()
    }

    /// Highest allowed top face, taking the roof into account.
    #[inline]
    pub fn ceiling(&self) -> f64 {
        self.height.min(self.max_stack_height)
    }

    /// Built-in truck types offered to new users.
    pub fn presets() -> Vec<ContainerProfile> {
        const PRESETS: [(&str, &str, (f64, f64, f64), f64, f64); 5] = [
            ("furgao-pequeno", "Furgão Pequeno", (2.0, 2.0, 3.0), 1000.0, 4.0),
            ("furgao-medio", "Furgão Médio", (2.5, 2.5, 5.0), 2000.0, 5.0),
            ("truck-pequeno", "Caminhão 3/4", (2.5, 2.2, 5.5), 3500.0, 6.0),
            ("caminhao-grande", "Caminhão Baú", (2.5, 2.5, 7.5), 8000.0, 7.0),
            ("carreta", "Carreta", (2.5, 2.7, 14.0), 30000.0, 8.0),
        ];

        PRESETS
            .iter()
            .map(|&(id, name, (w, h, d), max_weight, max_stack_height)| ContainerProfile {
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                width: w,
                height: h,
                depth: d,
                max_weight,
                max_stack_height,
            })
            .collect()
    }

    /// Looks up a built-in preset by id.
    pub fn preset(id: &str) -> Option<ContainerProfile> {
        Self::presets()
            .into_iter()
            .find(|profile| profile.id.as_deref() == Some(id))
    }
}

impl Dimensional for ContainerProfile {
    fn dimensions(&self) -> Vec3 {
        self.extents()
    }
}

/// Ordered set of templates with unique ids.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    templates: Vec<ItemTemplate>,
}

impl Catalog {
    /// Builds a catalog, validating every template and rejecting duplicate ids.
    pub fn new(templates: Vec<ItemTemplate>) -> Result<Self, ValidationError> {
        for (idx, template) in templates.iter().enumerate() {
            template.validate()?;
            if templates[..idx].iter().any(|t| t.id == template.id) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "Duplicate item id in catalog: {}",
                    template.id
                )));
            }
        }
        Ok(Self { templates })
    }

    pub fn get(&self, id: &str) -> Option<&ItemTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
