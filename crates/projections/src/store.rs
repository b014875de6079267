//! Storage seams for the read model and projection positions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::ProjectionPosition;
use crate::read_model::ProductReadModel;

/// Keyed storage for product read-model records.
#[async_trait]
pub trait ProductReadModelStore: Send + Sync {
    async fn get(&self, product_id: AggregateId) -> Result<Option<ProductReadModel>>;

    /// Inserts or replaces the record for its product id.
    async fn upsert(&self, record: ProductReadModel) -> Result<()>;

    /// All records, ordered by creation time.
    async fn list(&self) -> Result<Vec<ProductReadModel>>;

    async fn count(&self) -> Result<usize>;

    /// Removes every record.
    async fn clear(&self) -> Result<()>;
}

/// Durable storage for projection cursors, keyed by projection name.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn load(&self, projection_name: &str) -> Result<Option<ProjectionPosition>>;

    async fn save(&self, position: ProjectionPosition) -> Result<()>;
}

/// In-memory read model store.
#[derive(Clone, Default)]
pub struct InMemoryProductReadModelStore {
    records: Arc<RwLock<HashMap<AggregateId, ProductReadModel>>>,
}

impl InMemoryProductReadModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductReadModelStore for InMemoryProductReadModelStore {
    async fn get(&self, product_id: AggregateId) -> Result<Option<ProductReadModel>> {
        Ok(self.records.read().await.get(&product_id).cloned())
    }

    async fn upsert(&self, record: ProductReadModel) -> Result<()> {
        self.records.write().await.insert(record.product_id, record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProductReadModel>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

/// In-memory position store.
#[derive(Clone, Default)]
pub struct InMemoryPositionStore {
    positions: Arc<RwLock<HashMap<String, ProjectionPosition>>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn load(&self, projection_name: &str) -> Result<Option<ProjectionPosition>> {
        Ok(self.positions.read().await.get(projection_name).cloned())
    }

    async fn save(&self, position: ProjectionPosition) -> Result<()> {
        self.positions
            .write()
            .await
            .insert(position.projection_name.clone(), position);
        Ok(())
    }
}
