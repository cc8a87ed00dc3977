//! Diagram REST handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info};

use sketchwire_core::diagram::{CreatedDiagram, Diagram, DiagramSummary, NewDiagram};
use sketchwire_core::error::SketchError;

use crate::state::RelayState;

/// Error body in the `{"detail": "..."}` shape the drawing clients expect.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<SketchError> for ApiError {
    fn from(err: SketchError) -> Self {
        match err {
            SketchError::InvalidDiagram(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            SketchError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "Diagram not found"),
            other => {
                error!(error = %other, "Diagram store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub async fn create_diagram(
    State(state): State<Arc<RelayState>>,
    Json(payload): Json<NewDiagram>,
) -> Result<Json<CreatedDiagram>, ApiError> {
    let owner = payload.owner.clone();
    let id = state.store.create(payload).await?;
    info!(id, owner = %owner, "Diagram saved");

    Ok(Json(CreatedDiagram {
        id,
        message: "Diagram saved successfully".into(),
    }))
}

pub async fn list_user_diagrams(
    State(state): State<Arc<RelayState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<DiagramSummary>>, ApiError> {
    Ok(Json(state.store.list_by_owner(&owner).await?))
}

pub async fn list_shared_diagrams(
    State(state): State<Arc<RelayState>>,
) -> Result<Json<Vec<DiagramSummary>>, ApiError> {
    Ok(Json(state.store.list_shared().await?))
}

pub async fn get_diagram(
    State(state): State<Arc<RelayState>>,
    Path(id): Path<u64>,
) -> Result<Json<Diagram>, ApiError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| SketchError::NotFound(id).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let err = ApiError::from(SketchError::InvalidDiagram(
            "Owner and title are required".into(),
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "Owner and title are required");

        let err = ApiError::from(SketchError::NotFound(7));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.detail, "Diagram not found");

        let err = ApiError::from(SketchError::Store("disk full".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
