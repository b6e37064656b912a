//! Manual stock corrections

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{positive_quantity, Adjustment, AdjustmentKind, StockKey};
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{finish, TransactionCoordinator};
use crate::error::AppResult;
use crate::store::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustmentInput {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub kind: AdjustmentKind,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    /// Recorded as the movement description
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    /// Correct one balance. Increases go in at the current average cost.
    pub async fn adjust_stock(&self, input: AdjustmentInput) -> AppResult<Adjustment> {
        input.validate()?;
        let mut tx = self.begin("adjustment.apply").await?;
        let result = self.apply_adjustment(&mut tx, input).await;
        finish(tx, result, "adjustment.apply").await
    }

    async fn apply_adjustment(
        &self,
        tx: &mut S::Tx,
        input: AdjustmentInput,
    ) -> AppResult<Adjustment> {
        self.require_warehouse(tx, input.warehouse_id).await?;
        self.require_product(tx, input.product_id).await?;

        let key = StockKey::new(input.warehouse_id, input.product_id);
        let movement = match input.kind {
            AdjustmentKind::Increase => {
                self.restock(tx, key, input.quantity, input.reason.clone())
                    .await?
            }
            AdjustmentKind::Decrease => {
                self.issue(tx, key, input.quantity, input.reason.clone())
                    .await?
            }
        };

        let adjustment = Adjustment {
            id: Uuid::new_v4(),
            warehouse_id: input.warehouse_id,
            product_id: input.product_id,
            kind: input.kind,
            quantity: input.quantity,
            unit_cost: movement.unit_cost,
            reason: input.reason,
            responsible_id: input.responsible_id,
            date: input.date,
            created_at: Utc::now(),
        };
        tx.insert_adjustment(&adjustment).await?;

        tracing::info!(adjustment_id = %adjustment.id, %key, kind = adjustment.kind.as_str(), quantity = %adjustment.quantity, "stock adjusted");
        Ok(adjustment)
    }

    /// Adjustments in creation order, optionally for one balance
    pub async fn adjustments(&self, key: Option<StockKey>) -> AppResult<Vec<Adjustment>> {
        let mut tx = self.begin("adjustment.list").await?;
        let result = tx.adjustments(key).await;
        finish(tx, result, "adjustment.list").await
    }
}
