//! `POST /ai/cleanup` handler.

use axum::Json;
use tracing::debug;

use sketchwire_core::cleanup::{cleanup_strokes, CleanupParams, StrokeSet};
use sketchwire_core::stroke::point_count;

/// Snap and thin the submitted strokes. Stateless; nothing is broadcast.
pub async fn cleanup_handler(Json(payload): Json<StrokeSet>) -> Json<StrokeSet> {
    let strokes = cleanup_strokes(&payload.strokes, CleanupParams::default());
    debug!(
        strokes_in = payload.strokes.len(),
        points_in = point_count(&payload.strokes),
        strokes_out = strokes.len(),
        points_out = point_count(&strokes),
        "Cleaned up strokes"
    );
    Json(StrokeSet { strokes })
}
