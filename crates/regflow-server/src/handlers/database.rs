//! Database schema handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::db::schema::{existing_tables, init_schema, missing_tables, SCHEMA_NAME};
use crate::db::DbPool;
use crate::error::AppError;

/// Response for database schema operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaOperationResponse {
    pub status: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

/// Apply the schema DDL.
///
/// POST /api/db/init
pub async fn init_database(
    State(db): State<DbPool>,
) -> Result<Json<SchemaOperationResponse>, AppError> {
    init_schema(&db).await?;
    let tables = existing_tables(&db).await?;
    let missing = missing_tables(&tables);

    Ok(Json(SchemaOperationResponse {
        status: "ok".to_string(),
        message: format!("Schema '{}' initialized", SCHEMA_NAME),
        valid: Some(missing.is_empty()),
        tables: Some(tables),
        missing: Some(missing),
    }))
}

/// Check that every required table exists.
///
/// GET /api/db/validate
pub async fn validate_database(
    State(db): State<DbPool>,
) -> Result<Json<SchemaOperationResponse>, AppError> {
    let tables = existing_tables(&db).await?;
    let missing = missing_tables(&tables);
    let valid = missing.is_empty();

    Ok(Json(SchemaOperationResponse {
        status: "ok".to_string(),
        message: if valid {
            "Database schema is valid".to_string()
        } else {
            format!("Missing tables: {}", missing.join(", "))
        },
        valid: Some(valid),
        tables: Some(tables),
        missing: Some(missing),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_response_serialization() {
        let response = SchemaOperationResponse {
            status: "ok".to_string(),
            message: "Schema valid".to_string(),
            valid: Some(true),
            tables: Some(vec!["application_logs".to_string()]),
            missing: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"valid\":true"));
        assert!(!json.contains("missing"));
    }
}
