use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use room_core::{Room, RoomError, RoomStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Process-wide room store. Constructed once in `main`, cloned into every
/// handler through axum state. Mutating handlers hold the write lock across
/// the whole lookup-check-mutate sequence, so per-room operations never
/// interleave.
#[derive(Clone, Default)]
pub struct AppState {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/create_room", post(create_room))
        .route("/join_room", post(join_room))
        .route("/get_room_info/:room_id", get(get_room_info))
        .route("/start_game", post(start_game))
        .route("/submit_wishes", post(submit_wishes))
        .route("/get_my_owner/:room_id/:angel_name", get(get_my_owner))
        .route("/check_all_wishes/:room_id", get(check_all_wishes))
        .route("/end_game", post(end_game))
        .route("/get_assignments/:room_id", get(get_assignments))
        .route("/get_all_relationships/:room_id", get(get_all_relationships))
        .route("/get_wishes/:room_id/:player_name", get(get_wishes))
        .route("/clear_all_data", post(clear_all_data))
        .route("/healthz", get(health))
        .route("/", get(index))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failure envelope: every error leaves the process as
/// `{"success": false, "message": ...}` with the mapped status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        let status = match err {
            RoomError::NotRunning => StatusCode::NOT_FOUND,
            RoomError::NameTaken => StatusCode::CONFLICT,
            RoomError::NotOwner => StatusCode::FORBIDDEN,
            RoomError::AlreadyStarted
            | RoomError::NotEnoughPlayers
            | RoomError::NotParticipant
            | RoomError::NotInProgress
            | RoomError::NotOver => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    owner_name: String,
}

#[derive(Serialize)]
struct CreateRoomResponse {
    success: bool,
    room_id: String,
}

#[derive(Deserialize)]
struct JoinRoomRequest {
    room_id: String,
    player_name: String,
}

#[derive(Serialize)]
struct OkResponse {
    success: bool,
}

#[derive(Serialize)]
struct RoomInfoResponse {
    success: bool,
    status: RoomStatus,
    owner: String,
    players: Vec<String>,
}

#[derive(Deserialize)]
struct StartGameRequest {
    room_id: String,
}

#[derive(Deserialize)]
struct StartParams {
    seed: Option<u64>,
}

#[derive(Serialize)]
struct AssignmentsResponse {
    success: bool,
    assignments: HashMap<String, String>,
}

#[derive(Serialize)]
struct RelationshipsResponse {
    success: bool,
    relationships: HashMap<String, String>,
}

#[derive(Deserialize)]
struct SubmitWishesRequest {
    room_id: String,
    player_name: String,
    wishes: Vec<String>,
}

#[derive(Serialize)]
struct OwnerResponse {
    success: bool,
    owner_name: String,
    tasks: Vec<String>,
}

#[derive(Serialize)]
struct AllWishesResponse {
    success: bool,
    all_submitted: bool,
}

#[derive(Deserialize)]
struct EndGameRequest {
    room_id: String,
    player_name: String,
}

#[derive(Serialize)]
struct WishesResponse {
    success: bool,
    wishes: Vec<String>,
}

/// Room codes are the first 8 hex chars of a v4 UUID; regenerate on the
/// rare collision against a live room.
fn fresh_room_id(rooms: &HashMap<String, Room>) -> String {
    loop {
        let full = Uuid::new_v4().to_string();
        let id = full[..8].to_string();
        if !rooms.contains_key(&id) {
            return id;
        }
    }
}

async fn create_room(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let owner_name = payload.owner_name.trim();
    if owner_name.is_empty() {
        return Err(ApiError::bad_request("owner name required"));
    }

    let mut rooms = state.rooms.write().await;
    let room_id = fresh_room_id(&rooms);
    rooms.insert(room_id.clone(), Room::new(room_id.clone(), owner_name));
    info!(room_id = %room_id, owner = %owner_name, "room created");

    Ok(Json(CreateRoomResponse {
        success: true,
        room_id,
    }))
}

async fn join_room(
    State(state): State<AppState>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let player_name = payload.player_name.trim();
    if player_name.is_empty() {
        return Err(ApiError::bad_request("player name required"));
    }

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&payload.room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;
    room.join(player_name)?;

    Ok(Json(OkResponse { success: true }))
}

async fn get_room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfoResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;

    Ok(Json(RoomInfoResponse {
        success: true,
        status: room.status.clone(),
        owner: room.owner.clone(),
        players: room.players.iter().map(|p| p.name.clone()).collect(),
    }))
}

async fn start_game(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
    Json(payload): Json<StartGameRequest>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&payload.room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;

    let mut rng = params
        .seed
        .map(ChaCha8Rng::seed_from_u64)
        .unwrap_or_else(|| ChaCha8Rng::from_entropy());
    let assignments = room.start(&mut rng)?;
    info!(room_id = %payload.room_id, players = room.players.len(), "game started");

    Ok(Json(AssignmentsResponse {
        success: true,
        assignments,
    }))
}

async fn submit_wishes(
    State(state): State<AppState>,
    Json(payload): Json<SubmitWishesRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&payload.room_id)
        .ok_or_else(|| ApiError::not_found("game not found or not in progress"))?;
    room.submit_wishes(&payload.player_name, payload.wishes)?;

    Ok(Json(OkResponse { success: true }))
}

async fn get_my_owner(
    State(state): State<AppState>,
    Path((room_id, angel_name)): Path<(String, String)>,
) -> Result<Json<OwnerResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("game not found or not in progress"))?;
    let (owner_name, wishes) = room.owner_of(&angel_name)?;

    Ok(Json(OwnerResponse {
        success: true,
        owner_name: owner_name.to_string(),
        tasks: wishes.to_vec(),
    }))
}

async fn check_all_wishes(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<AllWishesResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("game not found or not in progress"))?;
    let all_submitted = room.all_wishes_submitted()?;

    Ok(Json(AllWishesResponse {
        success: true,
        all_submitted,
    }))
}

async fn end_game(
    State(state): State<AppState>,
    Json(payload): Json<EndGameRequest>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&payload.room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;
    let assignments = room.end(&payload.player_name)?;
    info!(room_id = %payload.room_id, "game ended");

    Ok(Json(AssignmentsResponse {
        success: true,
        assignments,
    }))
}

async fn get_assignments(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;
    let assignments = room.final_assignments()?.clone();

    Ok(Json(AssignmentsResponse {
        success: true,
        assignments,
    }))
}

async fn get_all_relationships(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RelationshipsResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;
    let relationships = room.final_assignments()?.clone();

    Ok(Json(RelationshipsResponse {
        success: true,
        relationships,
    }))
}

async fn get_wishes(
    State(state): State<AppState>,
    Path((room_id, player_name)): Path<(String, String)>,
) -> Result<Json<WishesResponse>, ApiError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .ok_or_else(|| ApiError::not_found("room not found"))?;

    Ok(Json(WishesResponse {
        success: true,
        wishes: room.wishes_of(&player_name).to_vec(),
    }))
}

async fn clear_all_data(State(state): State<AppState>) -> Json<OkResponse> {
    let mut rooms = state.rooms.write().await;
    let dropped = rooms.len();
    rooms.clear();
    info!(dropped, "cleared all room data");

    Json(OkResponse { success: true })
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn index() -> Response {
    let dir = env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string());
    match tokio::fs::read(PathBuf::from(dir).join("index.html")).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
