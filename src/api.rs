//! REST API for the cargo placement engine.
//!
//! Every request carries the whole scene (profile, catalog, rules, current
//! load) plus one command; the server keeps no load between requests.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::load::{LoadError, LoadState, LoadStatistics, FloorPoint};
use crate::model::{Catalog, ContainerProfile, ItemTemplate, Orientation, PlacedItem, ValidationError};
use crate::optimizer::{PackingConfig, Strategy, UnplacedItem};
use crate::planner::{
    CommandOutcome, LoadCommand, LoadPlanner, PlacementOutcome, PlacementRequest, PlacementTarget,
    RequestError,
};
use crate::stacking::{StackingRule, StackingRules};
use crate::types::Vec3;
use crate::validator::RejectionReason;

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>truck_loader API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Catalog entry as sent by the client.
///
/// `type_id` defaults to `id`, so rules can be written against item ids.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({
    "id": "table",
    "name": "Dining Table",
    "width": 2.0,
    "height": 0.8,
    "depth": 1.2,
    "weight": 40.0,
    "color": "#10b981"
}))]
pub struct TemplateRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl TemplateRequest {
    fn into_template(self) -> Result<ItemTemplate, ValidationError> {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let type_id = self.type_id.unwrap_or_else(|| self.id.clone());
        let template = ItemTemplate::new(
            self.id,
            name,
            (self.width, self.height, self.depth),
            self.weight,
            type_id,
        )?;
        Ok(match self.color {
            Some(color) => template.with_color(color),
            None => template,
        })
    }
}

/// An item of the current load, referencing its catalog template.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({
    "id": "table#1",
    "template_id": "table",
    "position": { "x": 0.0, "y": 0.4, "z": 0.0 },
    "orientation": "original"
}))]
pub struct PlacedItemRequest {
    pub id: String,
    pub template_id: String,
    pub position: Vec3,
    #[serde(default)]
    pub orientation: Orientation,
}

/// One operation to apply to the load.
#[derive(Deserialize, Clone, Debug, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandRequest {
    /// Place a new instance (`template_id`) or move a loaded item (`placed_id`).
    Place {
        #[serde(default)]
        template_id: Option<String>,
        #[serde(default)]
        placed_id: Option<String>,
        x: f64,
        z: f64,
        #[serde(default)]
        orientation: Orientation,
    },
    Remove {
        placed_id: String,
    },
    OptimizeByWeight,
    OptimizeBySpace,
    Reset,
}

impl CommandRequest {
    fn into_command(self) -> Result<LoadCommand, String> {
        Ok(match self {
            CommandRequest::Place {
                template_id,
                placed_id,
                x,
                z,
                orientation,
            } => {
                let target = match (template_id, placed_id) {
                    (Some(id), None) => PlacementTarget::Template(id),
                    (None, Some(id)) => PlacementTarget::Placed(id),
                    _ => {
                        return Err(
                            "place needs exactly one of template_id and placed_id".to_string()
                        );
                    }
                };
                LoadCommand::Place(PlacementRequest {
                    target,
                    x,
                    z,
                    orientation,
                })
            }
            CommandRequest::Remove { placed_id } => LoadCommand::Remove { placed_id },
            CommandRequest::OptimizeByWeight => LoadCommand::OptimizeByWeight,
            CommandRequest::OptimizeBySpace => LoadCommand::OptimizeBySpace,
            CommandRequest::Reset => LoadCommand::Reset,
        })
    }
}

/// Scene shared by all load requests. Without a profile the default preset is used.
#[derive(Deserialize, Clone, ToSchema)]
pub struct SceneRequest {
    #[serde(default)]
    pub profile: Option<ContainerProfile>,
    pub catalog: Vec<TemplateRequest>,
    #[serde(default)]
    pub rules: Vec<StackingRule>,
    #[serde(default)]
    pub placed: Vec<PlacedItemRequest>,
    /// Overrides the server's rotation setting for the space-fill pass
    #[serde(default)]
    pub allow_rotation: Option<bool>,
}

#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({
    "profile": {
        "width": 2.5, "height": 2.2, "depth": 5.5,
        "max_weight": 3500.0, "max_stack_height": 6.0
    },
    "catalog": [
        { "id": "table", "width": 2.0, "height": 0.8, "depth": 1.2, "weight": 40.0 },
        { "id": "chair", "width": 0.6, "height": 0.9, "depth": 0.6, "weight": 7.0 }
    ],
    "rules": [{ "bottom_type": "table", "top_type": "chair" }],
    "placed": [],
    "command": { "type": "place", "template_id": "table", "x": 0.0, "z": 0.0 }
}))]
pub struct ApplyRequest {
    #[serde(flatten)]
    pub scene: SceneRequest,
    pub command: CommandRequest,
}

#[derive(Deserialize, Clone, ToSchema)]
pub struct SuggestRequest {
    #[serde(flatten)]
    pub scene: SceneRequest,
    pub template_id: String,
}

/// A scene whose data passed every check.
#[derive(Debug)]
struct ValidatedScene {
    profile: ContainerProfile,
    catalog: Catalog,
    rules: StackingRules,
    load: LoadState,
    allow_rotation: Option<bool>,
}

impl ValidatedScene {
    fn packing_config(&self, base: PackingConfig) -> PackingConfig {
        match self.allow_rotation {
            Some(allow) => PackingConfig { allow_rotation: allow, ..base },
            None => base,
        }
    }
}

#[derive(Debug)]
enum SceneValidationError {
    InvalidProfile(ValidationError),
    InvalidTemplate(ValidationError),
    UnknownTemplate { placed_id: String, template_id: String },
    InvalidLoad(LoadError),
    InvalidCommand(String),
}

impl SceneRequest {
    fn into_validated(self) -> Result<ValidatedScene, SceneValidationError> {
        let profile = match self.profile {
            Some(profile) => profile,
            None => ContainerProfile::preset(ContainerProfile::DEFAULT_PRESET_ID).ok_or_else(|| {
                SceneValidationError::InvalidProfile(ValidationError::InvalidConfiguration(
                    "default profile missing".to_string(),
                ))
            })?,
        };
        profile
            .validate()
            .map_err(SceneValidationError::InvalidProfile)?;

        let templates = self
            .catalog
            .into_iter()
            .map(TemplateRequest::into_template)
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(SceneValidationError::InvalidTemplate)?;
        let catalog = Catalog::new(templates).map_err(SceneValidationError::InvalidTemplate)?;

        let items = self
            .placed
            .into_iter()
            .map(|entry| match catalog.get(&entry.template_id) {
                Some(template) => Ok(PlacedItem::new(
                    entry.id,
                    template.clone(),
                    entry.position,
                    entry.orientation,
                )),
                None => Err(SceneValidationError::UnknownTemplate {
                    placed_id: entry.id,
                    template_id: entry.template_id,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let load = LoadState::restore(&profile, items).map_err(SceneValidationError::InvalidLoad)?;

        Ok(ValidatedScene {
            profile,
            catalog,
            rules: StackingRules::from_rules(self.rules),
            load,
            allow_rotation: self.allow_rotation,
        })
    }
}

/// Placed item as returned to the client, enough to render it.
#[derive(Serialize, ToSchema)]
pub struct PlacedItemResponse {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
    pub type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub position: Vec3,
    pub orientation: Orientation,
    /// Rotation about the vertical axis in radians
    pub rotation_y: f64,
}

impl From<&PlacedItem> for PlacedItemResponse {
    fn from(item: &PlacedItem) -> Self {
        Self {
            id: item.id.clone(),
            template_id: item.template.id.clone(),
            name: item.template.name.clone(),
            width: item.template.width,
            height: item.template.height,
            depth: item.template.depth,
            weight: item.template.weight,
            type_id: item.template.type_id.clone(),
            color: item.template.color.clone(),
            position: item.position,
            orientation: item.orientation,
            rotation_y: item.orientation.yaw_radians(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PlacementResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
}

impl From<PlacementOutcome> for PlacementResponse {
    fn from(outcome: PlacementOutcome) -> Self {
        match outcome {
            PlacementOutcome::Accepted { id, position } => Self {
                accepted: true,
                id: Some(id),
                position: Some(position),
                reason: None,
                reason_text: None,
            },
            PlacementOutcome::Rejected { reason } => Self {
                accepted: false,
                id: None,
                position: None,
                reason: Some(reason),
                reason_text: Some(reason.to_string()),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UnplacedItemResponse {
    pub id: String,
    pub template_id: String,
    pub weight: f64,
    pub reason_code: String,
    pub reason: String,
}

impl From<&UnplacedItem> for UnplacedItemResponse {
    fn from(entry: &UnplacedItem) -> Self {
        Self {
            id: entry.item.id.clone(),
            template_id: entry.item.template.id.clone(),
            weight: entry.item.template.weight,
            reason_code: entry.reason.code().to_string(),
            reason: entry.reason.to_string(),
        }
    }
}

/// New load after a command.
#[derive(Serialize, ToSchema)]
pub struct ApplyResponse {
    pub profile: ContainerProfile,
    pub placed: Vec<PlacedItemResponse>,
    pub current_weight: f64,
    pub statistics: LoadStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementResponse>,
    pub unplaced: Vec<UnplacedItemResponse>,
    pub is_complete: bool,
}

impl ApplyResponse {
    fn from_outcome(profile: ContainerProfile, outcome: CommandOutcome) -> Self {
        let CommandOutcome {
            load,
            placement,
            unplaced,
        } = outcome;

        Self {
            placed: load.items().iter().map(PlacedItemResponse::from).collect(),
            current_weight: load.current_weight(),
            statistics: load.statistics(&profile),
            placement: placement.map(PlacementResponse::from),
            is_complete: unplaced.is_empty(),
            unplaced: unplaced.iter().map(UnplacedItemResponse::from).collect(),
            profile,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SuggestResponse {
    /// First free floor spot, `null` if there is none
    pub position: Option<Vec3>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfilesResponse {
    pub default_id: String,
    pub profiles: Vec<ContainerProfile>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn scene_error(err: SceneValidationError) -> Response {
    let (error, details) = match err {
        SceneValidationError::InvalidProfile(err) => ("Invalid container profile", err.to_string()),
        SceneValidationError::InvalidTemplate(err) => ("Invalid catalog", err.to_string()),
        SceneValidationError::UnknownTemplate {
            placed_id,
            template_id,
        } => (
            "Invalid load",
            format!("Placed item {placed_id} references unknown template {template_id}"),
        ),
        SceneValidationError::InvalidLoad(err) => ("Invalid load", err.to_string()),
        SceneValidationError::InvalidCommand(details) => ("Invalid command", details),
    };
    error_response(StatusCode::UNPROCESSABLE_ENTITY, error, details)
}

fn request_error(err: RequestError) -> Response {
    let error = match err {
        RequestError::UnknownTemplate(_) | RequestError::UnknownPlacedItem(_) => "Unknown item",
        RequestError::CarriesItems { .. } => "Item is carrying other items",
    };
    error_response(StatusCode::UNPROCESSABLE_ENTITY, error, err.to_string())
}

fn parse_apply_request(
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Result<(ValidatedScene, LoadCommand), Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    let command = payload
        .command
        .into_command()
        .map_err(|details| scene_error(SceneValidationError::InvalidCommand(details)))?;
    let scene = payload.scene.into_validated().map_err(scene_error)?;
    Ok((scene, command))
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_apply, handle_optimize_stream, handle_suggest, handle_profiles),
    components(
        schemas(
            ApplyRequest,
            SceneRequest,
            SuggestRequest,
            TemplateRequest,
            PlacedItemRequest,
            CommandRequest,
            ApplyResponse,
            PlacedItemResponse,
            PlacementResponse,
            UnplacedItemResponse,
            SuggestResponse,
            ProfilesResponse,
            ErrorResponse,
            ContainerProfile,
            StackingRule,
            LoadStatistics,
            FloorPoint,
            RejectionReason,
            Orientation,
            Strategy,
            Vec3
        )
    ),
    tags((name = "loading", description = "Endpoints for placing and arranging truck cargo"))
)]
struct ApiDoc;

/// Builds the router with all endpoints.
pub fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/apply", post(handle_apply))
        .route("/optimize_stream", post(handle_optimize_stream))
        .route("/suggest", post(handle_suggest))
        .route("/profiles", get(handle_profiles))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { optimizer_config })
}

/// Starts the API server and blocks until it terminates.
///
/// # Returns
/// `Err` if the address cannot be bound or the server fails.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer_config: OptimizerConfig,
) -> std::io::Result<()> {
    let app = router(optimizer_config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    log::info!("Server running on http://{}:{}", display_host, config.port());
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        log::info!("Local access: http://localhost:{}", config.port());
    }
    log::info!("API endpoints: POST /apply, POST /optimize_stream, POST /suggest, GET /profiles");
    log::info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /apply.
///
/// Applies one command (place, remove, optimize, reset) to the load in the
/// request and returns the new load.
#[utoipa::path(
    post,
    path = "/apply",
    request_body = ApplyRequest,
    responses(
        (status = 200, description = "Command applied; placements may still be rejected", body = ApplyResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid scene, command or unknown ids",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_apply(
    State(state): State<ApiState>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Response {
    let (scene, command) = match parse_apply_request(payload) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    log::info!(
        "apply {:?} to {} items ({} templates, {} rules)",
        command,
        scene.load.len(),
        scene.catalog.len(),
        scene.rules.len()
    );

    let config = scene.packing_config(state.optimizer_config.packing_config());
    let ValidatedScene {
        profile,
        catalog,
        rules,
        load,
        ..
    } = scene;

    let planner = LoadPlanner::new(&profile, &catalog, &rules).with_config(config);
    let outcome = match planner.apply(load, command) {
        Ok(outcome) => outcome,
        Err(err) => return request_error(err),
    };

    if let Some(PlacementOutcome::Rejected { reason }) = &outcome.placement {
        log::info!("placement rejected: {}", reason.code());
    }

    let response = ApplyResponse::from_outcome(profile.clone(), outcome);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /optimize_stream (SSE).
///
/// Runs an optimizer command and streams its events (`Started`,
/// `ItemPlaced`, `ItemUnplaced`, `Finished`) as they happen.
#[utoipa::path(
    post,
    path = "/optimize_stream",
    request_body = ApplyRequest,
    responses(
        (
            status = 200,
            description = "Streams optimizer events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid scene or a command other than an optimizer run",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_optimize_stream(
    State(state): State<ApiState>,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Response {
    let (scene, command) = match parse_apply_request(payload) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let strategy = match command {
        LoadCommand::OptimizeByWeight => Strategy::Weight,
        LoadCommand::OptimizeBySpace => Strategy::Space,
        _ => {
            return scene_error(SceneValidationError::InvalidCommand(
                "streaming is only available for optimize_by_weight and optimize_by_space"
                    .to_string(),
            ));
        }
    };

    let config = scene.packing_config(state.optimizer_config.packing_config());
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let planner = LoadPlanner::new(&scene.profile, &scene.catalog, &scene.rules).with_config(config);
        let result = planner.optimize_with_progress(&scene.load, strategy, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // a closed receiver means the client left; the rest is dropped
                let _ = tx.blocking_send(json);
            }
        });
        log::info!(
            "streamed {} pass: {} placed, {} unplaced",
            strategy.code(),
            result.placed_count(),
            result.unplaced_count()
        );
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /suggest.
///
/// Returns the first free floor spot for a new instance of a template.
#[utoipa::path(
    post,
    path = "/suggest",
    request_body = SuggestRequest,
    responses(
        (status = 200, description = "Suggested drop point", body = SuggestResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid scene or unknown template",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_suggest(
    State(state): State<ApiState>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let template_id = payload.template_id;
    let scene = match payload.scene.into_validated() {
        Ok(scene) => scene,
        Err(err) => return scene_error(err),
    };

    let config = scene.packing_config(state.optimizer_config.packing_config());
    let planner = LoadPlanner::new(&scene.profile, &scene.catalog, &scene.rules).with_config(config);
    match planner.suggest_position(&scene.load, &template_id) {
        Ok(position) => (StatusCode::OK, Json(SuggestResponse { position })).into_response(),
        Err(err) => request_error(err),
    }
}

/// Handler for GET /profiles: the built-in truck presets.
#[utoipa::path(
    get,
    path = "/profiles",
    responses((status = 200, description = "Built-in truck profiles", body = ProfilesResponse)),
    tag = "loading"
)]
async fn handle_profiles() -> Json<ProfilesResponse> {
    Json(ProfilesResponse {
        default_id: ContainerProfile::DEFAULT_PRESET_ID.to_string(),
        profiles: ContainerProfile::presets(),
    })
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ApiState {
        ApiState {
            optimizer_config: OptimizerConfig::default(),
        }
    }

    fn apply_json(placed: serde_json::Value, command: serde_json::Value) -> ApplyRequest {
        let body = json!({
            "profile": {
                "width": 8.0, "height": 8.0, "depth": 16.0,
                "max_weight": 100.0, "max_stack_height": 8.0
            },
            "catalog": [
                { "id": "box", "width": 2.0, "height": 1.0, "depth": 1.0, "weight": 80.0, "color": "#f00" },
                { "id": "light", "width": 1.0, "height": 1.0, "depth": 1.0, "weight": 30.0 }
            ],
            "placed": placed,
            "command": command
        });
        serde_json::from_value(body).expect("Should parse valid JSON")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/apply", "/optimize_stream", "/suggest", "/profiles"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {path} path"
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["ApplyRequest", "ApplyResponse", "ErrorResponse", "ContainerProfile"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn command_requests_use_type_tag() {
        let place: CommandRequest =
            serde_json::from_value(json!({ "type": "place", "template_id": "box", "x": 1.0, "z": 2.0 }))
                .unwrap();
        assert_eq!(
            place.into_command().unwrap(),
            LoadCommand::Place(PlacementRequest {
                target: PlacementTarget::Template("box".to_string()),
                x: 1.0,
                z: 2.0,
                orientation: Orientation::Original,
            })
        );

        let optimize: CommandRequest =
            serde_json::from_value(json!({ "type": "optimize_by_space" })).unwrap();
        assert_eq!(optimize.into_command().unwrap(), LoadCommand::OptimizeBySpace);
    }

    #[test]
    fn place_needs_exactly_one_target() {
        let both = CommandRequest::Place {
            template_id: Some("box".into()),
            placed_id: Some("box#1".into()),
            x: 0.0,
            z: 0.0,
            orientation: Orientation::Original,
        };
        assert!(both.into_command().is_err());
    }

    #[test]
    fn template_type_defaults_to_id() {
        let request: TemplateRequest = serde_json::from_value(
            json!({ "id": "sofa", "width": 2.0, "height": 0.9, "depth": 0.9, "weight": 50.0 }),
        )
        .unwrap();
        let template = request.into_template().unwrap();
        assert_eq!(template.type_id, "sofa");
        assert_eq!(template.name, "sofa");
    }

    #[test]
    fn missing_profile_uses_default_preset() {
        let request: SceneRequest = serde_json::from_value(json!({ "catalog": [] })).unwrap();
        let scene = request.into_validated().unwrap();
        assert_eq!(scene.profile.id.as_deref(), Some(ContainerProfile::DEFAULT_PRESET_ID));
    }

    #[test]
    fn corrupt_loads_are_rejected() {
        let request = apply_json(
            json!([
                { "id": "a", "template_id": "light", "position": { "x": 0.0, "y": 0.5, "z": 0.0 } },
                { "id": "b", "template_id": "light", "position": { "x": 0.5, "y": 0.5, "z": 0.0 } }
            ]),
            json!({ "type": "reset" }),
        );
        assert!(matches!(
            request.scene.into_validated(),
            Err(SceneValidationError::InvalidLoad(LoadError::Overlap(_, _)))
        ));

        let request = apply_json(
            json!([{ "id": "a", "template_id": "ghost", "position": { "x": 0.0, "y": 0.5, "z": 0.0 } }]),
            json!({ "type": "reset" }),
        );
        assert!(matches!(
            request.scene.into_validated(),
            Err(SceneValidationError::UnknownTemplate { .. })
        ));
    }

    #[test]
    fn rotation_override_replaces_server_setting() {
        let mut request = apply_json(json!([]), json!({ "type": "reset" }));
        request.scene.allow_rotation = Some(false);
        let scene = request.scene.into_validated().unwrap();
        assert!(!scene.packing_config(PackingConfig::default()).allow_rotation);
    }

    #[tokio::test]
    async fn apply_reports_accept_and_reject() {
        let request = apply_json(
            json!([]),
            json!({ "type": "place", "template_id": "box", "x": 0.0, "z": 0.0 }),
        );
        let response = handle_apply(State(state()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["placement"]["accepted"], true);
        assert_eq!(body["placed"][0]["id"], "box#1");
        assert_eq!(body["placed"][0]["color"], "#f00");
        assert_eq!(body["current_weight"], 80.0);

        let request = apply_json(
            json!([{ "id": "box#1", "template_id": "box", "position": { "x": 0.0, "y": 0.5, "z": 0.0 } }]),
            json!({ "type": "place", "template_id": "light", "x": 3.0, "z": 3.0 }),
        );
        let body = body_json(handle_apply(State(state()), Ok(Json(request))).await).await;
        assert_eq!(body["placement"]["accepted"], false);
        assert_eq!(body["placement"]["reason"], "weight_exceeded");
        assert_eq!(body["placed"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn unknown_ids_return_422() {
        let request = apply_json(json!([]), json!({ "type": "remove", "placed_id": "box#9" }));
        let response = handle_apply(State(state()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unknown item");
    }

    #[tokio::test]
    async fn removing_a_loaded_base_returns_422() {
        let request = apply_json(
            json!([
                { "id": "light#1", "template_id": "light", "position": { "x": 0.0, "y": 0.5, "z": 0.0 } },
                { "id": "light#2", "template_id": "light", "position": { "x": 0.0, "y": 1.5, "z": 0.0 } }
            ]),
            json!({ "type": "remove", "placed_id": "light#1" }),
        );
        let response = handle_apply(State(state()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Item is carrying other items");
        assert_eq!(body["details"], "Placed item light#1 still carries light#2");
    }

    #[tokio::test]
    async fn stream_refuses_non_optimizer_commands() {
        let request = apply_json(json!([]), json!({ "type": "reset" }));
        let response = handle_optimize_stream(State(state()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn profiles_lists_presets() {
        let Json(body) = handle_profiles().await;
        assert_eq!(body.profiles.len(), 5);
        assert_eq!(body.default_id, "truck-pequeno");
    }
}
