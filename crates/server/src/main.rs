use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{cast_vote, create_agenda, get_agenda, open_agenda, ApiContext};
use shared::{
    domain::AgendaId,
    error::{ApiError, ErrorCode},
    protocol::{AgendaResult, AgendaSummary, CastVoteRequest, CreateAgendaRequest, VotePayload},
};
use storage::Storage;
use tracing::{error, info};

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "voting server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/agendas", post(http_create_agenda))
        .route("/agendas/:agenda_id", get(http_get_agenda))
        .route("/agendas/:agenda_id/start", post(http_open_agenda))
        .route("/agendas/:agenda_id/votes", post(http_cast_vote))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_create_agenda(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAgendaRequest>,
) -> Result<(StatusCode, Json<AgendaSummary>), (StatusCode, Json<ApiError>)> {
    let agenda = create_agenda(&state.api, &req.name, req.duration_minutes)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(agenda)))
}

async fn http_open_agenda(
    State(state): State<Arc<AppState>>,
    Path(agenda_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    open_agenda(&state.api, AgendaId(agenda_id))
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_cast_vote(
    State(state): State<Arc<AppState>>,
    Path(agenda_id): Path<i64>,
    Json(req): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<VotePayload>), (StatusCode, Json<ApiError>)> {
    let vote = cast_vote(&state.api, AgendaId(agenda_id), &req.associate, req.choice)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(vote)))
}

async fn http_get_agenda(
    State(state): State<Arc<AppState>>,
    Path(agenda_id): Path<i64>,
) -> Result<Json<AgendaResult>, (StatusCode, Json<ApiError>)> {
    let agenda = get_agenda(&state.api, AgendaId(agenda_id))
        .await
        .map_err(error_response)?;
    Ok(Json(agenda))
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::AgendaNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::CONFLICT,
    };
    (status, Json(err))
}
