//! CRUD handlers for client quota records.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::http::response::json_error;
use crate::http::server::AppState;
use crate::store::{ClientQuota, StoreError};

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub rate_per_sec: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub capacity: i64,
    pub rate_per_sec: i64,
}

/// GET /clients
pub async fn list_clients(State(state): State<AppState>) -> Response {
    match state.repo.list_all().await {
        Ok(clients) => (StatusCode::OK, Json(clients)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list clients");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Error with server")
        }
    }
}

/// POST /clients
///
/// Omitted or non-positive `capacity`/`rate_per_sec` fall back to the
/// configured defaults; the bucket starts full.
pub async fn create_client(
    State(state): State<AppState>,
    Json(req): Json<CreateClientRequest>,
) -> Response {
    if req.client_id.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Client ID is required");
    }

    let capacity = req
        .capacity
        .filter(|c| *c > 0)
        .unwrap_or(state.rate_limit.default_capacity);
    let rate_per_sec = req
        .rate_per_sec
        .filter(|r| *r > 0)
        .unwrap_or(state.rate_limit.default_rate_per_sec);

    let quota = ClientQuota::new(req.client_id, capacity, rate_per_sec);
    match state.repo.create(&quota).await {
        Ok(()) => {
            tracing::info!(
                client_id = %quota.client_id,
                capacity,
                rate_per_sec,
                "Client created"
            );
            (StatusCode::CREATED, Json(quota)).into_response()
        }
        Err(StoreError::AlreadyExists(id)) => {
            json_error(StatusCode::CONFLICT, &format!("Client with id {id} already exists"))
        }
        Err(e) => {
            tracing::error!(client_id = %quota.client_id, error = %e, "Failed to create client");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create client")
        }
    }
}

/// PUT /clients/{client_id}
///
/// Shrinking the capacity clamps the current balance down with it.
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Json(req): Json<UpdateClientRequest>,
) -> Response {
    if req.capacity <= 0 {
        return json_error(StatusCode::BAD_REQUEST, "Capacity must be greater than 0");
    }
    if req.rate_per_sec <= 0 {
        return json_error(StatusCode::BAD_REQUEST, "Rate per second must be greater than 0");
    }

    let mut client = match state.repo.get(&client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return json_error(
                StatusCode::NOT_FOUND,
                &format!("Client with id {client_id} not found"),
            );
        }
        Err(e) => {
            tracing::error!(client_id = %client_id, error = %e, "Failed to get client");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get client");
        }
    };

    client.capacity = req.capacity;
    client.rate_per_sec = req.rate_per_sec;
    if client.tokens > req.capacity {
        client.tokens = req.capacity;
    }
    client.last_refill = Utc::now();

    match state.repo.update(&client).await {
        Ok(updated_at) => {
            client.updated_at = updated_at;
            tracing::info!(
                client_id = %client.client_id,
                capacity = client.capacity,
                rate_per_sec = client.rate_per_sec,
                "Client updated"
            );
            (StatusCode::OK, Json(client)).into_response()
        }
        Err(StoreError::NotFound(id)) => {
            json_error(StatusCode::NOT_FOUND, &format!("Client with id {id} not found"))
        }
        Err(e) => {
            tracing::error!(client_id = %client.client_id, error = %e, "Failed to update client");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update client")
        }
    }
}

/// DELETE /clients/{client_id}
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Response {
    match state.repo.delete(&client_id).await {
        Ok(()) => {
            tracing::info!(client_id = %client_id, "Client deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::error!(client_id = %client_id, error = %e, "Failed to delete client");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete client")
        }
    }
}
