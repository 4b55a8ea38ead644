//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::error;

use crate::app::AppState;
use crate::domain::{
    AppError, AssignRoleRequest, BlockchainError, DatabaseError, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, OverviewResponse, ProductListResponse,
    ProgramError, RegisterProductRequest, RegisterProductResponse, RegistryEntry, RoleResponse,
    TransactionResponse, UpdateProductRequest, UpdateProductResponse, VerifyQuery,
};

const DEFAULT_QR_SIZE: u32 = 256;

#[derive(Debug, Default, Deserialize)]
pub struct QrParams {
    pub size: Option<u32>,
}

/// Landing page data
pub async fn overview_handler(State(state): State<Arc<AppState>>) -> Json<OverviewResponse> {
    Json(state.service.overview().await)
}

/// Register a product and notify the customer
pub async fn register_product_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterProductRequest>,
) -> Result<(StatusCode, Json<RegisterProductResponse>), AppError> {
    let response = state.service.register_product(&payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Without an address: every product. With one: verify it on-chain.
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, AppError> {
    match query.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => {
            let verified = state.service.verify_product(address).await?;
            Ok(Json(verified).into_response())
        }
        _ => {
            let products = state.service.list_products().await?;
            Ok(Json(products).into_response())
        }
    }
}

/// Products the connected wallet may update
pub async fn updater_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductListResponse>, AppError> {
    Ok(Json(state.service.updater_products().await?))
}

pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<UpdateProductResponse>, AppError> {
    Ok(Json(state.service.update_product(&payload).await?))
}

pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductListResponse>, AppError> {
    Ok(Json(state.service.list_products().await?))
}

/// SVG QR code for a product's verification link
pub async fn product_qr_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<QrParams>,
) -> Result<Response, AppError> {
    let size = params.size.unwrap_or(DEFAULT_QR_SIZE).clamp(64, 1024);
    let svg = state.service.product_qr(&address, size)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

pub async fn registry_list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RegistryEntry>>, AppError> {
    Ok(Json(state.service.registry_entries().await?))
}

pub async fn registry_lookup_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<RegistryEntry>, AppError> {
    Ok(Json(state.service.lookup_registry(&name).await?))
}

pub async fn role_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoleResponse>, AppError> {
    Ok(Json(state.service.current_role().await?))
}

pub async fn initialize_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TransactionResponse>, AppError> {
    Ok(Json(state.service.initialize_program().await?))
}

pub async fn assign_role_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    Ok(Json(state.service.assign_role(&payload).await?))
}

/// Overall health status
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Liveness check
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness check: serving needs the RPC node, not the registry.
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape output
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Program(program_err) => match program_err {
                ProgramError::WalletNotConnected => {
                    (StatusCode::UNAUTHORIZED, "wallet_not_connected")
                }
                ProgramError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "invalid_address"),
                ProgramError::UnauthorizedUpdater => {
                    (StatusCode::FORBIDDEN, "unauthorized_updater")
                }
                ProgramError::NotAdmin => (StatusCode::FORBIDDEN, "not_admin"),
                ProgramError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
                ProgramError::Rejected(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "transaction_rejected")
                }
            },
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "database_error")
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::Blockchain(bc_err) => match bc_err {
                BlockchainError::Connection(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "blockchain_error")
                }
                BlockchainError::InsufficientFunds => {
                    (StatusCode::PAYMENT_REQUIRED, "insufficient_funds")
                }
                BlockchainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "blockchain_error"),
            },
            AppError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "external_service_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Authorization(_) => (StatusCode::UNAUTHORIZED, "authorization_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
