use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use clap::Parser;
use inventory_api::{ApiError, InventoryApi, NewItemRequest, API_CONTRACT_VERSION};
use inventory_core::{HistoryEntry, Item, PackagingRequest, User};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");
const USER_HEADER: &str = "x-user-id";
const SERVER_ERROR: &str = "Server Error";

#[derive(Debug, Clone)]
struct ServiceState {
    api: InventoryApi,
}

/// `{success, message?, count?, data?}` body shared by every response.
#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Debug, Clone)]
struct ServiceError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service_contract_version: &'static str,
    api_contract_version: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "inventory-service")]
#[command(about = "HTTP service for inventory items and their packaging")]
struct Args {
    #[arg(long, env = "INVENTORY_DB", default_value = "./inventory.sqlite3")]
    db: PathBuf,
    #[arg(long, env = "INVENTORY_BIND", default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body: ServiceEnvelope<()> =
            ServiceEnvelope { success: false, message: Some(self.message), count: None, data: None };
        (self.status, Json(body)).into_response()
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        let (status, message) = match err {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
        };
        Self { status, message }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: rejection.body_text() }
    }
}

fn data<T: Serialize>(value: T) -> Json<ServiceEnvelope<T>> {
    Json(ServiceEnvelope { success: true, message: None, count: None, data: Some(value) })
}

fn listing<T: Serialize>(values: Vec<T>) -> Json<ServiceEnvelope<Vec<T>>> {
    Json(ServiceEnvelope {
        success: true,
        message: None,
        count: Some(values.len()),
        data: Some(values),
    })
}

fn with_message<T: Serialize>(message: &str, value: Option<T>) -> Json<ServiceEnvelope<T>> {
    Json(ServiceEnvelope {
        success: true,
        message: Some(message.to_string()),
        count: None,
        data: value,
    })
}

impl ServiceState {
    fn requesting_user(&self, headers: &HeaderMap) -> Result<User, ServiceError> {
        let user_id = headers.get(USER_HEADER).and_then(|value| value.to_str().ok());
        Ok(self.api.authenticate(user_id)?)
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/openapi", get(openapi))
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/:id", get(get_item))
        .route(
            "/api/items/:id/packaging",
            get(get_packaging_by_item_id).post(add_packaging).put(update_packaging),
        )
        .route("/api/items/:id/packaging/history", get(get_packaging_history))
        .route("/api/items/:id/packaging/:type", delete(delete_packaging))
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("INVENTORY_LOG")
        .unwrap_or_else(|_| EnvFilter::new("inventory=info,warn"));
    let format = std::env::var("INVENTORY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => registry.with(fmt::layer().json().with_ansi(false)).init(),
        _ => registry.with(fmt::layer().compact()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let api = InventoryApi::new(args.db.clone());
    let migration = api.migrate(false)?;
    tracing::info!(
        db = %args.db.display(),
        schema_version = migration.after_version,
        "database ready"
    );

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "listening");
    axum::serve(listener, app(ServiceState { api })).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    data(HealthResponse {
        status: "ok",
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
    })
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn list_items(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<Item>>>, ServiceError> {
    Ok(listing(state.api.list_items()?))
}

async fn create_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    payload: Result<Json<NewItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceEnvelope<Item>>), ServiceError> {
    state.requesting_user(&headers)?;
    let Json(request) = payload?;
    let item = state.api.create_item(request)?;
    Ok((StatusCode::CREATED, with_message("Item created successfully", Some(item))))
}

async fn get_item(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<Item>>, ServiceError> {
    Ok(data(state.api.get_item(&id)?))
}

async fn add_packaging(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<PackagingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceEnvelope<Item>>), ServiceError> {
    let user = state.requesting_user(&headers)?;
    let Json(request) = payload?;
    let item = state.api.add_packaging(&id, &request, user.id)?;
    Ok((StatusCode::CREATED, with_message("Packaging added successfully", Some(item))))
}

async fn update_packaging(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<PackagingRequest>, JsonRejection>,
) -> Result<Json<ServiceEnvelope<Item>>, ServiceError> {
    let user = state.requesting_user(&headers)?;
    let Json(request) = payload?;
    let item = state.api.update_packaging(&id, &request, user.id)?;
    Ok(with_message("Packaging updated successfully", Some(item)))
}

async fn delete_packaging(
    State(state): State<ServiceState>,
    Path((id, packaging_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ServiceEnvelope<()>>, ServiceError> {
    state.requesting_user(&headers)?;
    state.api.delete_packaging(&id, &packaging_type)?;
    Ok(with_message("Packaging deleted successfully", None))
}

async fn get_packaging_by_item_id(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<HistoryEntry>>>, ServiceError> {
    Ok(listing(state.api.packaging_by_item_id(&id)?))
}

async fn get_packaging_history(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<HistoryEntry>>>, ServiceError> {
    Ok(listing(state.api.packaging_history(&id)?))
}
