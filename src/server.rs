use crate::aggregate::{DashboardOptions, DashboardSummary};
use crate::error::{DashboardError, Result};
use crate::metrics::{self, ApiMetrics};
use crate::storage::TicketStore;
use crate::table::{build_table, TableRow, TicketQuery};
use crate::types::{TicketRecord, UpsertOutcome};
use axum::{
    extract::{MatchedPath, Path, Query, State},
    http::{header, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TicketStore>,
    pub options: DashboardOptions,
}

/// Error body returned by every handler
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::MissingField(_) | DashboardError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run a blocking store call off the async workers
async fn with_store<T, F>(store: Arc<dyn TicketStore>, f: F) -> Result<T>
where
    F: FnOnce(&dyn TicketStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref())).await?
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ticket-dash",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> ApiResult<Json<Vec<TableRow>>> {
    let records = with_store(state.store, |store| store.list_tickets()).await?;
    Ok(Json(build_table(&records, &query, &Local::now())))
}

async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<TicketRecord>> {
    let lookup = ticket_id.clone();
    with_store(state.store, move |store| store.get_ticket(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| DashboardError::NotFound(ticket_id).into())
}

async fn upsert_ticket(
    State(state): State<AppState>,
    Json(record): Json<TicketRecord>,
) -> ApiResult<(StatusCode, Json<UpsertOutcome>)> {
    if record.ticket_id.trim().is_empty() {
        return Err(DashboardError::MissingField("ticket_id".to_string()).into());
    }
    let outcome = with_store(state.store, move |store| store.upsert_ticket(&record)).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

async fn delete_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<StatusCode> {
    let target = ticket_id.clone();
    if with_store(state.store, move |store| store.delete_ticket(&target)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DashboardError::NotFound(ticket_id).into())
    }
}

async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    let records = with_store(state.store, |store| store.list_tickets()).await?;
    let summary = DashboardSummary::build(&records, &Local::now(), &state.options);
    ApiMetrics::record_dashboard_built(summary.total_tickets, summary.unparsed_dates);
    Ok(Json(summary))
}

async fn render_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render().unwrap_or_default(),
    )
}

async fn track_requests<B>(req: Request<B>, next: Next<B>) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();
    let response = next.run(req).await;
    ApiMetrics::record_request(&route, response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/tickets", get(list_tickets).post(upsert_ticket))
        .route("/api/tickets/:ticket_id", get(get_ticket).delete(delete_ticket))
        .route("/api/dashboard", get(dashboard))
        .route("/metrics", get(render_metrics))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Dashboard: http://localhost:{port}/api/dashboard");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
