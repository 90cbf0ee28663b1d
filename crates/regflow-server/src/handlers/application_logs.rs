//! Application log API handlers.
//!
//! Endpoints under `/application-logs` for reading the log chain, applying
//! workflow transitions and administrative single-row access.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    ApplicationLogEntry, BulkCreateRequest, BulkCreateResponse, LastIndexResponse,
    LogEntryRequest,
};
use crate::engine::{ChainReport, Timeline, TransitionRequest};
use crate::error::AppResult;
use crate::services::{ApplicationLogService, LogFilter};

/// Query parameters for listing log rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLogsQuery {
    pub dtn: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for a workflow transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub main_db_id: i64,
    pub entries: Vec<ApplicationLogEntry>,
}

/// Response for a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub status: String,
}

/// List log rows, newest first.
///
/// `GET /application-logs/?dtn=<DTN>&limit=&offset=`
pub async fn list(
    State(service): State<ApplicationLogService>,
    Query(query): Query<ListLogsQuery>,
) -> AppResult<Json<Vec<ApplicationLogEntry>>> {
    let filter = LogFilter {
        dtn: query.dtn,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(service.list(&filter).await?))
}

/// Rows of one application, newest first.
///
/// `GET /application-logs/main-db/{id}`
pub async fn list_by_main_db(
    State(service): State<ApplicationLogService>,
    Path(main_db_id): Path<i64>,
) -> AppResult<Json<Vec<ApplicationLogEntry>>> {
    Ok(Json(service.list_by_main_db(main_db_id).await?))
}

/// `GET /application-logs/main-db/{id}/step/{step}`
pub async fn list_by_step(
    State(service): State<ApplicationLogService>,
    Path((main_db_id, step)): Path<(i64, String)>,
) -> AppResult<Json<Vec<ApplicationLogEntry>>> {
    Ok(Json(service.list_by_step(main_db_id, &step).await?))
}

/// `GET /application-logs/main-db/{id}/last-index`
///
/// ```json
/// { "main_db_id": 42, "last_index": 5, "next_index": 6 }
/// ```
pub async fn last_index(
    State(service): State<ApplicationLogService>,
    Path(main_db_id): Path<i64>,
) -> AppResult<Json<LastIndexResponse>> {
    Ok(Json(service.last_index(main_db_id).await?))
}

/// `GET /application-logs/main-db/{id}/timeline`
pub async fn timeline(
    State(service): State<ApplicationLogService>,
    Path(main_db_id): Path<i64>,
) -> AppResult<Json<Timeline>> {
    Ok(Json(service.timeline(main_db_id).await?))
}

/// `GET /application-logs/main-db/{id}/verify`
pub async fn verify(
    State(service): State<ApplicationLogService>,
    Path(main_db_id): Path<i64>,
) -> AppResult<Json<ChainReport>> {
    Ok(Json(service.verify(main_db_id).await?))
}

/// Apply a workflow decision.
///
/// `POST /application-logs/main-db/{id}/transition`
///
/// # Request Body
///
/// ```json
/// {
///   "stage": "Decking",
///   "actor": "decker",
///   "decision": "For S&E and Quality Evaluation",
///   "remarks": "complete dossier",
///   "assignees": { "S&E": "se_reviewer", "Quality Evaluation": "evaluator" }
/// }
/// ```
pub async fn transition(
    State(service): State<ApplicationLogService>,
    Path(main_db_id): Path<i64>,
    Json(request): Json<TransitionRequest>,
) -> AppResult<(StatusCode, Json<TransitionResponse>)> {
    let entries = service.transition(main_db_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(TransitionResponse {
            main_db_id,
            entries,
        }),
    ))
}

/// `POST /application-logs/`
pub async fn create(
    State(service): State<ApplicationLogService>,
    Json(request): Json<LogEntryRequest>,
) -> AppResult<(StatusCode, Json<ApplicationLogEntry>)> {
    let entry = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `POST /application-logs/bulk`
pub async fn bulk_create(
    State(service): State<ApplicationLogService>,
    Json(request): Json<BulkCreateRequest>,
) -> AppResult<(StatusCode, Json<BulkCreateResponse>)> {
    let response = service.bulk_create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /application-logs/{id}`
pub async fn get(
    State(service): State<ApplicationLogService>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApplicationLogEntry>> {
    Ok(Json(service.get(id).await?))
}

/// `PUT /application-logs/{id}`
pub async fn update(
    State(service): State<ApplicationLogService>,
    Path(id): Path<i64>,
    Json(request): Json<LogEntryRequest>,
) -> AppResult<Json<ApplicationLogEntry>> {
    Ok(Json(service.update(id, request).await?))
}

/// `DELETE /application-logs/{id}`
pub async fn delete(
    State(service): State<ApplicationLogService>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    service.delete(id).await?;
    Ok(Json(DeleteResponse {
        id,
        status: "deleted".to_string(),
    }))
}
