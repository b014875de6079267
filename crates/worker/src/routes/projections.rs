//! Projection status endpoint.

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::ProjectionLag;

use crate::AppState;
use crate::error::ApiError;

/// GET /projections/product-catalog: position and lag of the catalog.
pub async fn product_catalog<S: EventStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ProjectionLag>, ApiError> {
    let lag = state.processor.lag().await?;
    Ok(Json(lag))
}
