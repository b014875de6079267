//! Product service providing a simplified API for product operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    ActivateProduct, ChangePrice, CreateProduct, DeleteProduct, DiscontinueProduct, Product,
    UpdateProduct,
};

type ServiceResult = Result<CommandResult<Product>, DomainError>;

/// Service for managing products.
///
/// Wraps the command handler: every command loads the product's stream,
/// runs the aggregate method and appends whatever it produced.
pub struct ProductService<S: EventStore> {
    handler: CommandHandler<S, Product>,
}

impl<S: EventStore> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Product> {
        &self.handler
    }

    /// Creates a new draft product.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn create_product(&self, cmd: CreateProduct) -> ServiceResult {
        let result = match Product::create_with_id(
            cmd.product_id,
            cmd.sku,
            cmd.name,
            cmd.description,
            cmd.price_cents,
        ) {
            Ok(outcome) => self.handler.create(outcome).await,
            Err(e) => Err(e.into()),
        };
        record("create_product", result)
    }

    /// Changes a product's name and description.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn update_product(&self, cmd: UpdateProduct) -> ServiceResult {
        let UpdateProduct {
            name,
            description,
            expected_version,
            ..
        } = cmd.clone();

        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| {
                product.update(name, description, expected_version)
            })
            .await;
        record("update_product", result)
    }

    /// Changes a product's price.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn change_price(&self, cmd: ChangePrice) -> ServiceResult {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| {
                product.change_price(
                    cmd.new_price_cents,
                    cmd.expected_version,
                    cmd.confirm_large_change,
                )
            })
            .await;
        record("change_price", result)
    }

    /// Makes a draft product available for sale.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn activate_product(&self, cmd: ActivateProduct) -> ServiceResult {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| {
                product.activate(cmd.expected_version)
            })
            .await;
        record("activate_product", result)
    }

    /// Withdraws a product from sale.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn discontinue_product(&self, cmd: DiscontinueProduct) -> ServiceResult {
        let reason = cmd.reason.clone();

        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| {
                product.discontinue(cmd.expected_version, reason)
            })
            .await;
        record("discontinue_product", result)
    }

    /// Deletes a product.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn delete_product(&self, cmd: DeleteProduct) -> ServiceResult {
        let deleted_by = cmd.deleted_by.clone();

        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| {
                product.delete(cmd.expected_version, deleted_by)
            })
            .await;
        record("delete_product", result)
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: AggregateId) -> Result<Option<Product>, DomainError> {
        self.handler.load(product_id).await
    }
}

/// Counts the command by outcome and logs rejections.
fn record(command: &'static str, result: ServiceResult) -> ServiceResult {
    let outcome = match &result {
        Ok(r) if r.events.is_empty() => "unchanged",
        Ok(_) => "accepted",
        Err(e) if e.is_concurrency_conflict() => "conflict",
        Err(_) => "rejected",
    };
    metrics::counter!("domain_commands_total", "command" => command, "outcome" => outcome)
        .increment(1);

    match &result {
        Ok(r) => tracing::debug!(command, version = %r.new_version, events = r.events.len(), "command handled"),
        Err(e) => tracing::info!(command, error = %e, "command rejected"),
    }
    result
}
