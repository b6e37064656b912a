//! Purchases: goods received into a warehouse

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    non_negative_amount, positive_quantity, validate_unique_products, DateRange, Purchase,
    PurchaseLine, StockKey,
};
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{finish, TransactionCoordinator};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, LockMode};

/// Input for creating or replacing a purchase
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseInput {
    pub warehouse_id: Uuid,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate]
    pub lines: Vec<PurchaseLineInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseLineInput {
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub unit_cost: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub sale_price: Option<Decimal>,
    #[validate(custom = "non_negative_amount")]
    pub min_sale_price: Option<Decimal>,
}

impl PurchaseInput {
    fn check(&self, require_lines: bool) -> AppResult<()> {
        self.validate()?;
        if require_lines && self.lines.is_empty() {
            return Err(AppError::validation("lines", "At least one line is required"));
        }
        validate_unique_products(self.lines.iter().map(|l| l.product_id))
            .map_err(|m| AppError::validation("lines", m))
    }

    fn line_for(&self, product_id: Uuid) -> Option<&PurchaseLineInput> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    /// Receive every line into the purchase warehouse
    pub async fn create_purchase(&self, input: PurchaseInput) -> AppResult<Purchase> {
        input.check(true)?;
        let mut tx = self.begin("purchase.create").await?;
        let result = self.apply_purchase_create(&mut tx, input).await;
        finish(tx, result, "purchase.create").await
    }

    async fn apply_purchase_create(
        &self,
        tx: &mut S::Tx,
        input: PurchaseInput,
    ) -> AppResult<Purchase> {
        self.require_warehouse(tx, input.warehouse_id).await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        let id = Uuid::new_v4();
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            lines.push(self.receive_purchase_line(tx, id, input.warehouse_id, line).await?);
        }

        let now = Utc::now();
        let purchase = Purchase {
            id,
            warehouse_id: input.warehouse_id,
            responsible_id: input.responsible_id,
            date: input.date,
            note: input.note,
            lines,
            created_at: now,
            updated_at: now,
        };
        tx.save_purchase(&purchase).await?;

        tracing::info!(purchase_id = %id, warehouse_id = %purchase.warehouse_id, lines = purchase.lines.len(), "purchase created");
        Ok(purchase)
    }

    async fn receive_purchase_line(
        &self,
        tx: &mut S::Tx,
        purchase_id: Uuid,
        warehouse_id: Uuid,
        line: &PurchaseLineInput,
    ) -> AppResult<PurchaseLine> {
        let key = StockKey::new(warehouse_id, line.product_id);
        self.receive(
            tx,
            key,
            line.quantity,
            line.unit_cost,
            format!("Purchase {}", purchase_id),
        )
        .await?;
        self.prices
            .apply(tx, line.product_id, line.sale_price, line.min_sale_price)
            .await?;

        Ok(PurchaseLine {
            id: Uuid::new_v4(),
            product_id: line.product_id,
            quantity: line.quantity,
            unit_cost: line.unit_cost,
            sale_price: line.sale_price,
            min_sale_price: line.min_sale_price,
        })
    }

    /// Replace a purchase, applying only the difference to the ledger.
    ///
    /// A warehouse change first moves every existing line to the new
    /// warehouse. Lines are then matched by product: quantity deltas become
    /// inflows or outflows, new products are received, dropped products are
    /// issued back out. With a warehouse change and no lines supplied the
    /// existing lines are kept as moved.
    pub async fn update_purchase(&self, id: Uuid, input: PurchaseInput) -> AppResult<Purchase> {
        input.check(false)?;
        let mut tx = self.begin("purchase.update").await?;
        let result = self.apply_purchase_update(&mut tx, id, input).await;
        finish(tx, result, "purchase.update").await
    }

    async fn apply_purchase_update(
        &self,
        tx: &mut S::Tx,
        id: Uuid,
        input: PurchaseInput,
    ) -> AppResult<Purchase> {
        let mut purchase = tx
            .purchase(id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
        let old_warehouse = self.require_warehouse(tx, purchase.warehouse_id).await?;
        let new_warehouse = self.require_warehouse(tx, input.warehouse_id).await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        let moved = old_warehouse.id != new_warehouse.id;
        if moved {
            for line in &purchase.lines {
                self.issue(
                    tx,
                    StockKey::new(old_warehouse.id, line.product_id),
                    line.quantity,
                    format!("Purchase {} moved to {}", id, new_warehouse.name),
                )
                .await?;
                self.receive(
                    tx,
                    StockKey::new(new_warehouse.id, line.product_id),
                    line.quantity,
                    line.unit_cost,
                    format!("Purchase {} moved from {}", id, old_warehouse.name),
                )
                .await?;
            }
        }

        if !(moved && input.lines.is_empty()) {
            purchase.lines = self
                .reconcile_purchase_lines(tx, &purchase, new_warehouse.id, &input)
                .await?;
        }

        purchase.warehouse_id = input.warehouse_id;
        purchase.responsible_id = input.responsible_id;
        purchase.date = input.date;
        purchase.note = input.note;
        purchase.updated_at = Utc::now();
        tx.save_purchase(&purchase).await?;

        tracing::info!(purchase_id = %id, moved, lines = purchase.lines.len(), "purchase updated");
        Ok(purchase)
    }

    /// Apply line differences at `warehouse_id`, where the old lines now sit
    async fn reconcile_purchase_lines(
        &self,
        tx: &mut S::Tx,
        existing: &Purchase,
        warehouse_id: Uuid,
        input: &PurchaseInput,
    ) -> AppResult<Vec<PurchaseLine>> {
        let mut lines = Vec::with_capacity(input.lines.len());

        for new_line in &input.lines {
            let key = StockKey::new(warehouse_id, new_line.product_id);
            let Some(old_line) = existing.line_for(new_line.product_id) else {
                lines.push(
                    self.receive_purchase_line(tx, existing.id, warehouse_id, new_line)
                        .await?,
                );
                continue;
            };

            let delta = new_line.quantity - old_line.quantity;
            if delta > Decimal::ZERO {
                self.receive(
                    tx,
                    key,
                    delta,
                    new_line.unit_cost,
                    format!("Purchase {} quantity increased", existing.id),
                )
                .await?;
            } else if delta < Decimal::ZERO {
                self.issue(
                    tx,
                    key,
                    -delta,
                    format!("Purchase {} quantity reduced", existing.id),
                )
                .await?;
            }
            self.prices
                .apply(tx, new_line.product_id, new_line.sale_price, new_line.min_sale_price)
                .await?;

            lines.push(PurchaseLine {
                id: old_line.id,
                product_id: new_line.product_id,
                quantity: new_line.quantity,
                unit_cost: new_line.unit_cost,
                sale_price: new_line.sale_price,
                min_sale_price: new_line.min_sale_price,
            });
        }

        for old_line in &existing.lines {
            if input.line_for(old_line.product_id).is_none() {
                self.issue(
                    tx,
                    StockKey::new(warehouse_id, old_line.product_id),
                    old_line.quantity,
                    format!("Purchase {} line removed", existing.id),
                )
                .await?;
            }
        }

        Ok(lines)
    }

    /// Issue every line back out, then delete the purchase
    pub async fn remove_purchase(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.begin("purchase.remove").await?;
        let result = self.apply_purchase_remove(&mut tx, id).await;
        finish(tx, result, "purchase.remove").await
    }

    async fn apply_purchase_remove(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<()> {
        let purchase = tx
            .purchase(id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        for line in &purchase.lines {
            self.issue(
                tx,
                StockKey::new(purchase.warehouse_id, line.product_id),
                line.quantity,
                format!("Purchase {} removed", id),
            )
            .await?;
        }
        tx.delete_purchase(id).await?;

        tracing::info!(purchase_id = %id, lines = purchase.lines.len(), "purchase removed");
        Ok(())
    }

    pub async fn purchase(&self, id: Uuid) -> AppResult<Purchase> {
        let mut tx = self.begin("purchase.get").await?;
        let result = tx
            .purchase(id, LockMode::Read)
            .await
            .and_then(|p| p.ok_or_else(|| AppError::NotFound("Purchase".to_string())));
        finish(tx, result, "purchase.get").await
    }

    /// Purchases dated within `range`, oldest first
    pub async fn purchases(&self, range: Option<DateRange>) -> AppResult<Vec<Purchase>> {
        let mut tx = self.begin("purchase.list").await?;
        let result = tx.purchases(range).await;
        finish(tx, result, "purchase.list").await
    }
}
