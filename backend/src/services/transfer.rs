//! Transfers between warehouses

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    positive_quantity, validate_unique_products, DateRange, StockKey, Transfer, TransferLine,
    Warehouse,
};
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{finish, TransactionCoordinator};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, LockMode};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferInput {
    pub origin_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate]
    pub lines: Vec<TransferLineInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferLineInput {
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
}

impl TransferInput {
    fn check(&self, require_lines: bool) -> AppResult<()> {
        self.validate()?;
        if self.origin_warehouse_id == self.destination_warehouse_id {
            return Err(AppError::validation(
                "destination_warehouse_id",
                "Destination must differ from origin",
            ));
        }
        if require_lines && self.lines.is_empty() {
            return Err(AppError::validation("lines", "At least one line is required"));
        }
        validate_unique_products(self.lines.iter().map(|l| l.product_id))
            .map_err(|m| AppError::validation("lines", m))
    }
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    /// Move goods out of the origin at its average cost and into the destination
    pub async fn create_transfer(&self, input: TransferInput) -> AppResult<Transfer> {
        input.check(true)?;
        let mut tx = self.begin("transfer.create").await?;
        let result = self.apply_transfer_create(&mut tx, input).await;
        finish(tx, result, "transfer.create").await
    }

    async fn apply_transfer_create(
        &self,
        tx: &mut S::Tx,
        input: TransferInput,
    ) -> AppResult<Transfer> {
        let origin = self.require_warehouse(tx, input.origin_warehouse_id).await?;
        let destination = self
            .require_warehouse(tx, input.destination_warehouse_id)
            .await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        let lines = self
            .move_transfer_lines(tx, &origin, &destination, &input.lines)
            .await?;

        let now = Utc::now();
        let transfer = Transfer {
            id: Uuid::new_v4(),
            origin_warehouse_id: origin.id,
            destination_warehouse_id: destination.id,
            responsible_id: input.responsible_id,
            date: input.date,
            note: input.note,
            lines,
            created_at: now,
            updated_at: now,
        };
        tx.save_transfer(&transfer).await?;

        tracing::info!(transfer_id = %transfer.id, origin = %origin.id, destination = %destination.id, lines = transfer.lines.len(), "transfer created");
        Ok(transfer)
    }

    async fn move_transfer_lines(
        &self,
        tx: &mut S::Tx,
        origin: &Warehouse,
        destination: &Warehouse,
        lines: &[TransferLineInput],
    ) -> AppResult<Vec<TransferLine>> {
        let mut moved = Vec::with_capacity(lines.len());
        for line in lines {
            let outflow = self
                .issue(
                    tx,
                    StockKey::new(origin.id, line.product_id),
                    line.quantity,
                    format!("Transfer to {}", destination.name),
                )
                .await?;
            self.receive(
                tx,
                StockKey::new(destination.id, line.product_id),
                line.quantity,
                outflow.unit_cost,
                format!("Transfer from {}", origin.name),
            )
            .await?;

            moved.push(TransferLine {
                id: Uuid::new_v4(),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_cost: outflow.unit_cost,
            });
        }
        Ok(moved)
    }

    /// Take goods back out of the destination and return them to the origin
    async fn revert_transfer_lines(&self, tx: &mut S::Tx, transfer: &Transfer) -> AppResult<()> {
        let origin = self
            .require_warehouse(tx, transfer.origin_warehouse_id)
            .await?;
        let destination = self
            .require_warehouse(tx, transfer.destination_warehouse_id)
            .await?;

        for line in &transfer.lines {
            self.issue(
                tx,
                StockKey::new(destination.id, line.product_id),
                line.quantity,
                format!("Transfer from {} reverted", origin.name),
            )
            .await?;
            self.restock(
                tx,
                StockKey::new(origin.id, line.product_id),
                line.quantity,
                format!("Transfer to {} reverted", destination.name),
            )
            .await?;
        }
        Ok(())
    }

    /// Revert every original line, then apply the new ones as on create
    pub async fn update_transfer(&self, id: Uuid, input: TransferInput) -> AppResult<Transfer> {
        input.check(false)?;
        let mut tx = self.begin("transfer.update").await?;
        let result = self.apply_transfer_update(&mut tx, id, input).await;
        finish(tx, result, "transfer.update").await
    }

    async fn apply_transfer_update(
        &self,
        tx: &mut S::Tx,
        id: Uuid,
        input: TransferInput,
    ) -> AppResult<Transfer> {
        let mut transfer = tx
            .transfer(id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;
        let origin = self.require_warehouse(tx, input.origin_warehouse_id).await?;
        let destination = self
            .require_warehouse(tx, input.destination_warehouse_id)
            .await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        self.revert_transfer_lines(tx, &transfer).await?;
        transfer.lines = self
            .move_transfer_lines(tx, &origin, &destination, &input.lines)
            .await?;

        transfer.origin_warehouse_id = origin.id;
        transfer.destination_warehouse_id = destination.id;
        transfer.responsible_id = input.responsible_id;
        transfer.date = input.date;
        transfer.note = input.note;
        transfer.updated_at = Utc::now();
        tx.save_transfer(&transfer).await?;

        tracing::info!(transfer_id = %id, lines = transfer.lines.len(), "transfer updated");
        Ok(transfer)
    }

    pub async fn remove_transfer(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.begin("transfer.remove").await?;
        let result = self.apply_transfer_remove(&mut tx, id).await;
        finish(tx, result, "transfer.remove").await
    }

    async fn apply_transfer_remove(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<()> {
        let transfer = tx
            .transfer(id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        self.revert_transfer_lines(tx, &transfer).await?;
        tx.delete_transfer(id).await?;

        tracing::info!(transfer_id = %id, "transfer removed");
        Ok(())
    }

    pub async fn transfer(&self, id: Uuid) -> AppResult<Transfer> {
        let mut tx = self.begin("transfer.get").await?;
        let result = tx
            .transfer(id, LockMode::Read)
            .await
            .and_then(|t| t.ok_or_else(|| AppError::NotFound("Transfer".to_string())));
        finish(tx, result, "transfer.get").await
    }

    /// Transfers dated within `range`, oldest first
    pub async fn transfers(&self, range: Option<DateRange>) -> AppResult<Vec<Transfer>> {
        let mut tx = self.begin("transfer.list").await?;
        let result = tx.transfers(range).await;
        finish(tx, result, "transfer.list").await
    }
}
