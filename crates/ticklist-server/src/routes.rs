use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ticklist_core::db::{
    Database, SettingsRepository, SnapshotStore, SubscriptionStore, WriteOutcome,
};
use ticklist_core::reminder::ReminderPayload;
use ticklist_core::{Subscription, Task};

use crate::auth::{extract_bearer_token, user_fingerprint, AuthenticatedUser, TokenVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::push::{ensure_push_public_key, NotificationDispatcher};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    verifier: Arc<TokenVerifier>,
    snapshots: SnapshotStore,
    subscriptions: SubscriptionStore,
    settings: SettingsRepository,
    dispatcher: Arc<NotificationDispatcher>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        database: &Database,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let conn = database.connection().clone();
        Self {
            verifier: Arc::new(TokenVerifier::new(&config)),
            snapshots: SnapshotStore::new(conn.clone()),
            subscriptions: SubscriptionStore::new(conn.clone()),
            settings: SettingsRepository::new(conn),
            dispatcher,
            config,
        }
    }

    pub fn snapshots(&self) -> SnapshotStore {
        self.snapshots.clone()
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/data", get(get_data).post(put_data))
        .route("/push/public-key", get(push_public_key))
        .route("/push/subscribe", post(push_subscribe))
        .route("/push/unsubscribe", post(push_unsubscribe))
        .route("/push/test", post(push_test))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.verifier.verify(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct DataResponse {
    data: Vec<Task>,
    version: i64,
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    data: Vec<Task>,
    #[serde(default)]
    version: i64,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    version: i64,
}

async fn get_data(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<DataResponse>, AppError> {
    let snapshot = state.snapshots.read(&user.username).await?;
    Ok(Json(DataResponse {
        data: snapshot.tasks,
        version: snapshot.version,
    }))
}

async fn put_data(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    if request.data.iter().any(|task| task.id.trim().is_empty()) {
        return Err(AppError::bad_request("Task ids must not be empty"));
    }

    let outcome = state
        .snapshots
        .write(&user.username, &request.data, request.version, request.force)
        .await?;

    match outcome {
        WriteOutcome::Accepted { version } => {
            tracing::info!(
                user = user_fingerprint(&user.username),
                version,
                task_count = request.data.len(),
                forced = request.force,
                "Accepted snapshot write"
            );
            Ok(Json(SyncResponse {
                success: true,
                version,
            }))
        }
        WriteOutcome::Conflict { server_version } => Err(AppError::Conflict { server_version }),
    }
}

#[derive(Debug, Serialize)]
struct PublicKeyResponse {
    key: String,
}

async fn push_public_key(
    State(state): State<AppState>,
) -> Result<Json<PublicKeyResponse>, AppError> {
    let key = ensure_push_public_key(&state.settings).await?;
    Ok(Json(PublicKeyResponse { key }))
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    subscription: SubscriptionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionPayload {
    endpoint: String,
    keys: SubscriptionKeys,
    #[serde(default)]
    expiration_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionKeys {
    p256dh: String,
    auth: String,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

const fn success() -> SuccessResponse {
    SuccessResponse { success: true }
}

async fn push_subscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let payload = request.subscription;
    let endpoint = payload.endpoint.trim();
    let p256dh = payload.keys.p256dh.trim();
    let auth = payload.keys.auth.trim();
    if endpoint.is_empty() || p256dh.is_empty() || auth.is_empty() {
        return Err(AppError::bad_request(
            "Subscription endpoint and keys must not be empty",
        ));
    }

    let subscription = Subscription::new(
        endpoint,
        user.username.as_str(),
        p256dh,
        auth,
        payload.expiration_time,
    );
    state.subscriptions.upsert(&subscription).await?;

    tracing::info!(
        user = user_fingerprint(&user.username),
        "Registered push subscription"
    );
    Ok(Json(success()))
}

#[derive(Debug, Deserialize, Default)]
struct UnsubscribeRequest {
    #[serde(default)]
    endpoint: Option<String>,
}

async fn push_unsubscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    match request.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            state
                .subscriptions
                .remove_for_user(endpoint, &user.username)
                .await?;
        }
        _ => {
            state
                .subscriptions
                .remove_all_for_user(&user.username)
                .await?;
        }
    }

    tracing::info!(
        user = user_fingerprint(&user.username),
        "Removed push subscription(s)"
    );
    Ok(Json(success()))
}

async fn push_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<SuccessResponse>, AppError> {
    let registered = state.subscriptions.list_for_user(&user.username).await?;
    if registered.is_empty() {
        return Err(AppError::not_found("No push subscription registered"));
    }

    state
        .dispatcher
        .dispatch(&user.username, &ReminderPayload::test())
        .await?;
    Ok(Json(success()))
}
