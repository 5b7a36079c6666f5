use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domain::{ChatMessage, Timestamp, User};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
    before: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    message: &'static str,
    token: String,
}

#[derive(Debug, Serialize)]
struct UsersResponse {
    users: Vec<User>,
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: Timestamp,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .nest("/api", api_routes())
        .fallback(endpoint_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/users", get(list_users))
        .route("/messages", get(get_history))
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
}

async fn root_redirect() -> Redirect {
    Redirect::temporary("/api/health")
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now(),
    })
}

async fn endpoint_not_found() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse {
            message: "Endpoint not found",
        }),
    )
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let raw_id = payload
        .id
        .ok_or_else(|| ApiError::bad_request("Valid ID is required"))?;
    state.user_service.register(&raw_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registration successful",
        }),
    ))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let raw_id = payload
        .id
        .ok_or_else(|| ApiError::bad_request("Valid ID is required"))?;
    let user = state.user_service.login(&raw_id).await?;
    let token = state.jwt_service.generate_token(user.id.as_str())?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
    }))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.user_service.list_users().await?;
    Ok(Json(UsersResponse { users }))
}

async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    state.jwt_service.extract_user_from_headers(&headers)?;

    let limit = match query.limit {
        Some(limit) if limit > 0 => limit.min(100),
        _ => 20,
    };
    let messages = state.chat_service.history(limit, query.before).await?;

    Ok(Json(MessagesResponse { messages }))
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // 匿名连接允许升级，带 token 则必须有效
    let user_id = match query.token.as_deref() {
        Some(token) => Some(state.jwt_service.verify_token(token)?.user_id),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, user_id).run()))
}
