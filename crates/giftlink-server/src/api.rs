use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use giftlink_shared::LaunchDataVerifier;
use giftlink_store::{ClosePerson, ClosePersonUpdate, NewClosePerson};

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::service::ContactService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ContactService>,
    pub verifier: Arc<LaunchDataVerifier>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route(
            "/api/close-people",
            get(list_close_people)
                .post(add_close_person)
                .put(update_close_person)
                .delete(delete_close_people),
        )
        .route("/api/invitation/{inviter_id}", post(accept_invitation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the API until the task is dropped.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct PeopleResponse {
    people: Vec<ClosePerson>,
}

#[derive(Serialize)]
struct AddResponse {
    success: bool,
    person_db_id: i64,
}

#[derive(Deserialize)]
struct UpdateRequest {
    person_db_id: i64,
    #[serde(flatten)]
    fields: ClosePersonUpdate,
}

#[derive(Serialize)]
struct UpdateResponse {
    success: bool,
    updated: bool,
}

#[derive(Deserialize)]
struct DeleteRequest {
    person_db_ids: Vec<i64>,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    deleted: usize,
}

#[derive(Serialize)]
struct InvitationResponse {
    success: bool,
    message: &'static str,
    invitation_created: bool,
    close_person_id: Option<i64>,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Gift Bot API is running",
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_close_people(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<PeopleResponse>, ServerError> {
    state.service.ensure_user(&user).await?;
    let people = state.service.list_close_people(&user.user_id()).await?;
    Ok(Json(PeopleResponse { people }))
}

async fn add_close_person(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(person): Json<NewClosePerson>,
) -> Result<Json<AddResponse>, ServerError> {
    state.service.ensure_user(&user).await?;
    let person_db_id = state
        .service
        .add_close_person(&user.user_id(), person)
        .await?;
    Ok(Json(AddResponse {
        success: true,
        person_db_id,
    }))
}

async fn update_close_person(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ServerError> {
    state.service.ensure_user(&user).await?;
    let updated = state
        .service
        .update_close_person(&user.user_id(), req.person_db_id, req.fields)
        .await?;
    Ok(Json(UpdateResponse {
        success: true,
        updated,
    }))
}

async fn delete_close_people(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ServerError> {
    state.service.ensure_user(&user).await?;
    let deleted = state
        .service
        .delete_close_people(&user.user_id(), req.person_db_ids)
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(inviter_id): Path<String>,
) -> Result<Json<InvitationResponse>, ServerError> {
    let outcome = state.service.accept_invitation(&inviter_id, &user).await?;
    Ok(Json(InvitationResponse {
        success: true,
        message: "Invitation accepted",
        invitation_created: outcome.invitation_created,
        close_person_id: outcome.close_person_id,
    }))
}
