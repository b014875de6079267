//! Product read-model lookups.

use axum::Json;
use axum::extract::{Path, State};
use common::AggregateId;
use event_store::EventStore;
use projections::{ProductReadModel, ProductReadModelStore};

use crate::AppState;
use crate::error::ApiError;

/// GET /products: every product in the catalog, oldest first.
pub async fn list<S: EventStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<ProductReadModel>>, ApiError> {
    let products = state.processor.projection().read_models().list().await?;
    Ok(Json(products))
}

/// GET /products/{id}: one product record.
pub async fn get<S: EventStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ProductReadModel>, ApiError> {
    let product_id: AggregateId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid product id: {id}")))?;

    state
        .processor
        .projection()
        .product(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))
}
