//! HTTP JSON API for the surrounding admin UI
//!
//! Thin wrappers over the same room methods the socket commands use; every
//! state-changing verb takes the same room lock. Responses are
//! `{status:"ok", ...}` or `{status:"error", message}`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use trivion_core::{Error, Question, DEADLINE_DEFAULT_SECS};

use crate::ws;
use crate::AppHandle;

pub fn router(app: AppHandle) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(health))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/:code", get(room_detail).delete(delete_room))
        .route(
            "/api/rooms/:code/questions",
            get(list_questions)
                .post(add_question)
                .delete(clear_questions),
        )
        .route("/api/rooms/:code/questions/:index", axum::routing::delete(remove_question))
        .route("/api/rooms/:code/game/start", post(game_start))
        .route("/api/rooms/:code/game/next", post(game_next))
        .route("/api/rooms/:code/game/end", post(game_end))
        .route("/api/rooms/:code/game/back-to-lobby", post(game_back_to_lobby))
        .route("/api/rooms/:code/game/state", get(game_state))
        .route("/api/rooms/:code/members/:id", axum::routing::delete(kick_member))
        .with_state(app)
}

/// Core error mapped onto an HTTP response body.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::RoomNotFound | Error::MemberNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = json!({"status": "error", "message": self.0.user_message()});
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn ok() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

async fn list_rooms(State(app): State<AppHandle>) -> Json<Value> {
    let rooms = app.rooms.list_public().await;
    Json(json!({ "rooms": rooms }))
}

async fn room_detail(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    let summary = room.lock().await.summary();
    Ok(Json(serde_json::to_value(summary).unwrap_or_default()))
}

async fn delete_room(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.destroy(&code).await?;
    app.reconnect.purge_room(&room.code).await;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
struct QuestionRequest {
    text: String,
    options: Vec<String>,
    correct: usize,
    #[serde(default = "default_time_limit")]
    time_limit: u32,
}

fn default_time_limit() -> u32 {
    DEADLINE_DEFAULT_SECS
}

async fn list_questions(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    let questions = room.lock().await.questions();
    Ok(Json(json!({ "questions": questions })))
}

async fn add_question(
    State(app): State<AppHandle>,
    Path(code): Path<String>,
    Json(req): Json<QuestionRequest>,
) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    let question = Question::new(req.text, req.options, req.correct, req.time_limit)?;
    room.lock().await.add_question(question)?;
    Ok(ok())
}

async fn remove_question(
    State(app): State<AppHandle>,
    Path((code, index)): Path<(String, usize)>,
) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.remove_question(index)?;
    Ok(ok())
}

async fn clear_questions(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.clear_questions()?;
    Ok(ok())
}

async fn game_start(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.start_game(None, &app.rooms)?;
    Ok(ok())
}

async fn game_next(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.next(None, &app.rooms)?;
    Ok(ok())
}

async fn game_end(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.end_game(None)?;
    Ok(ok())
}

async fn game_back_to_lobby(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    room.lock().await.back_to_lobby(None)?;
    Ok(ok())
}

async fn game_state(State(app): State<AppHandle>, Path(code): Path<String>) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    let snapshot = room.lock().await.snapshot();
    Ok(Json(serde_json::to_value(snapshot).unwrap_or_default()))
}

async fn kick_member(
    State(app): State<AppHandle>,
    Path((code, id)): Path<(String, Uuid)>,
) -> ApiResult {
    let room = app.rooms.find(&code).await.ok_or(Error::RoomNotFound)?;
    let mut st = room.lock().await;
    let member = st.kick_member(None, id)?;
    let empty = st.roster.is_empty();
    drop(st);
    app.reconnect.purge_member(member.id).await;
    if empty {
        app.rooms.destroy_if_empty(&code).await;
    }
    Ok(ok())
}
