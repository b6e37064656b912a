//! Sales, including void and restore

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    extended_value, non_negative_amount, positive_quantity, round_cost, sale_code,
    validate_discount, validate_unique_products, DateRange, Sale, SaleLine, StockKey,
};
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{finish, TransactionCoordinator};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, LockMode};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleInput {
    pub warehouse_id: Uuid,
    pub seller_id: Uuid,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    #[validate(custom = "non_negative_amount")]
    pub discount: Decimal,
    #[validate]
    pub lines: Vec<SaleLineInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub unit_price: Decimal,
}

impl SaleInput {
    /// Validate and return (subtotal, total)
    fn check(&self, require_lines: bool) -> AppResult<(Decimal, Decimal)> {
        self.validate()?;
        if require_lines && self.lines.is_empty() {
            return Err(AppError::validation("lines", "At least one line is required"));
        }
        validate_unique_products(self.lines.iter().map(|l| l.product_id))
            .map_err(|m| AppError::validation("lines", m))?;

        let mut subtotal = Decimal::ZERO;
        for line in &self.lines {
            subtotal += extended_value(line.quantity, line.unit_price)?;
        }
        validate_discount(self.discount, subtotal)
            .map_err(|m| AppError::validation("discount", m))?;
        Ok((subtotal, round_cost(subtotal - self.discount)))
    }

    fn line_for(&self, product_id: Uuid) -> Option<&SaleLineInput> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    /// Issue every line out of the sale warehouse at its average cost
    pub async fn create_sale(&self, input: SaleInput) -> AppResult<Sale> {
        let totals = input.check(true)?;
        let mut tx = self.begin("sale.create").await?;
        let result = self.apply_sale_create(&mut tx, input, totals).await;
        finish(tx, result, "sale.create").await
    }

    async fn apply_sale_create(
        &self,
        tx: &mut S::Tx,
        input: SaleInput,
        (subtotal, total): (Decimal, Decimal),
    ) -> AppResult<Sale> {
        self.require_warehouse(tx, input.warehouse_id).await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        let code = sale_code(tx.next_sale_number().await?);
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            lines.push(self.sell_line(tx, input.warehouse_id, &code, line).await?);
        }

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            code,
            warehouse_id: input.warehouse_id,
            seller_id: input.seller_id,
            customer_name: input.customer_name,
            date: input.date,
            lines,
            subtotal,
            discount: input.discount,
            total,
            active: true,
            voided_at: None,
            voided_by: None,
            created_at: now,
            updated_at: now,
        };
        tx.save_sale(&sale).await?;

        tracing::info!(sale_id = %sale.id, code = %sale.code, lines = sale.lines.len(), total = %sale.total, "sale created");
        Ok(sale)
    }

    async fn sell_line(
        &self,
        tx: &mut S::Tx,
        warehouse_id: Uuid,
        code: &str,
        line: &SaleLineInput,
    ) -> AppResult<SaleLine> {
        let outflow = self
            .issue(
                tx,
                StockKey::new(warehouse_id, line.product_id),
                line.quantity,
                format!("Sale {}", code),
            )
            .await?;

        Ok(SaleLine {
            id: Uuid::new_v4(),
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: extended_value(line.quantity, line.unit_price)?,
            unit_cost: outflow.unit_cost,
        })
    }

    /// Replace a sale's lines.
    ///
    /// A warehouse change returns every original line and sells all new
    /// lines afresh. Otherwise only dropped lines and lines whose quantity
    /// changed are returned and resold; the rest keep their ledger effect.
    pub async fn update_sale(&self, id: Uuid, input: SaleInput) -> AppResult<Sale> {
        let totals = input.check(false)?;
        let mut tx = self.begin("sale.update").await?;
        let result = self.apply_sale_update(&mut tx, id, input, totals).await;
        finish(tx, result, "sale.update").await
    }

    async fn apply_sale_update(
        &self,
        tx: &mut S::Tx,
        id: Uuid,
        input: SaleInput,
        (subtotal, total): (Decimal, Decimal),
    ) -> AppResult<Sale> {
        let mut sale = self.locked_sale(tx, id).await?;
        if sale.is_void() {
            return Err(AppError::conflict("sale", "A voided sale cannot be edited"));
        }
        self.require_warehouse(tx, input.warehouse_id).await?;
        self.require_products(tx, input.lines.iter().map(|l| l.product_id).collect::<Vec<_>>())
            .await?;

        let moved = sale.warehouse_id != input.warehouse_id;
        let mut lines = Vec::with_capacity(input.lines.len());

        if moved {
            for line in &sale.lines {
                self.restock(
                    tx,
                    StockKey::new(sale.warehouse_id, line.product_id),
                    line.quantity,
                    format!("Sale {} moved", sale.code),
                )
                .await?;
            }
            for line in &input.lines {
                lines.push(self.sell_line(tx, input.warehouse_id, &sale.code, line).await?);
            }
        } else {
            for old_line in &sale.lines {
                let unchanged = input
                    .line_for(old_line.product_id)
                    .is_some_and(|l| l.quantity == old_line.quantity);
                if !unchanged {
                    self.restock(
                        tx,
                        StockKey::new(sale.warehouse_id, old_line.product_id),
                        old_line.quantity,
                        format!("Sale {} line reversed", sale.code),
                    )
                    .await?;
                }
            }
            for line in &input.lines {
                match sale.line_for(line.product_id) {
                    Some(old_line) if old_line.quantity == line.quantity => {
                        lines.push(SaleLine {
                            unit_price: line.unit_price,
                            subtotal: extended_value(line.quantity, line.unit_price)?,
                            ..old_line.clone()
                        });
                    }
                    _ => {
                        lines.push(self.sell_line(tx, input.warehouse_id, &sale.code, line).await?);
                    }
                }
            }
        }

        sale.warehouse_id = input.warehouse_id;
        sale.seller_id = input.seller_id;
        sale.customer_name = input.customer_name;
        sale.date = input.date;
        sale.lines = lines;
        sale.subtotal = subtotal;
        sale.discount = input.discount;
        sale.total = total;
        sale.updated_at = Utc::now();
        tx.save_sale(&sale).await?;

        tracing::info!(sale_id = %id, code = %sale.code, moved, "sale updated");
        Ok(sale)
    }

    /// Correct the date of a sale; stock is not touched
    pub async fn update_sale_date(&self, id: Uuid, date: NaiveDate) -> AppResult<Sale> {
        let mut tx = self.begin("sale.update_date").await?;
        let result = self.apply_sale_date(&mut tx, id, date).await;
        finish(tx, result, "sale.update_date").await
    }

    async fn apply_sale_date(&self, tx: &mut S::Tx, id: Uuid, date: NaiveDate) -> AppResult<Sale> {
        let mut sale = self.locked_sale(tx, id).await?;
        sale.date = date;
        sale.updated_at = Utc::now();
        tx.save_sale(&sale).await?;

        tracing::info!(sale_id = %id, code = %sale.code, %date, "sale date changed");
        Ok(sale)
    }

    /// Return every line to stock and mark the sale void
    pub async fn void_sale(&self, id: Uuid, voided_by: Uuid) -> AppResult<Sale> {
        let mut tx = self.begin("sale.void").await?;
        let result = self.apply_sale_void(&mut tx, id, voided_by).await;
        finish(tx, result, "sale.void").await
    }

    async fn apply_sale_void(&self, tx: &mut S::Tx, id: Uuid, voided_by: Uuid) -> AppResult<Sale> {
        let mut sale = self.locked_sale(tx, id).await?;
        if sale.is_void() {
            return Err(AppError::conflict("sale", "Sale is already void"));
        }

        for line in &sale.lines {
            self.restock(
                tx,
                StockKey::new(sale.warehouse_id, line.product_id),
                line.quantity,
                format!("Sale {} voided", sale.code),
            )
            .await?;
        }

        let now = Utc::now();
        sale.active = false;
        sale.voided_at = Some(now);
        sale.voided_by = Some(voided_by);
        sale.updated_at = now;
        tx.save_sale(&sale).await?;

        tracing::info!(sale_id = %id, code = %sale.code, %voided_by, "sale voided");
        Ok(sale)
    }

    /// Take a voided sale's goods out of stock again
    pub async fn restore_sale(&self, id: Uuid) -> AppResult<Sale> {
        let mut tx = self.begin("sale.restore").await?;
        let result = self.apply_sale_restore(&mut tx, id).await;
        finish(tx, result, "sale.restore").await
    }

    async fn apply_sale_restore(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<Sale> {
        let mut sale = self.locked_sale(tx, id).await?;
        if !sale.is_void() {
            return Err(AppError::conflict("sale", "Sale is not void"));
        }

        let mut lines = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            let outflow = self
                .issue(
                    tx,
                    StockKey::new(sale.warehouse_id, line.product_id),
                    line.quantity,
                    format!("Sale {} restored", sale.code),
                )
                .await?;
            lines.push(SaleLine {
                unit_cost: outflow.unit_cost,
                ..line.clone()
            });
        }

        sale.lines = lines;
        sale.active = true;
        sale.voided_at = None;
        sale.voided_by = None;
        sale.updated_at = Utc::now();
        tx.save_sale(&sale).await?;

        tracing::info!(sale_id = %id, code = %sale.code, "sale restored");
        Ok(sale)
    }

    /// Delete a sale; only a voided sale may be deleted
    pub async fn remove_sale(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.begin("sale.remove").await?;
        let result = self.apply_sale_remove(&mut tx, id).await;
        finish(tx, result, "sale.remove").await
    }

    async fn apply_sale_remove(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<()> {
        let sale = self.locked_sale(tx, id).await?;
        if !sale.is_void() {
            return Err(AppError::conflict(
                "sale",
                "Only a voided sale can be deleted",
            ));
        }
        tx.delete_sale(id).await?;

        tracing::info!(sale_id = %id, code = %sale.code, "sale removed");
        Ok(())
    }

    pub async fn sale(&self, id: Uuid) -> AppResult<Sale> {
        let mut tx = self.begin("sale.get").await?;
        let result = tx
            .sale(id, LockMode::Read)
            .await
            .and_then(|s| s.ok_or_else(|| AppError::NotFound("Sale".to_string())));
        finish(tx, result, "sale.get").await
    }

    /// Sales dated within `range`, oldest first, void ones included
    pub async fn sales(&self, range: Option<DateRange>) -> AppResult<Vec<Sale>> {
        let mut tx = self.begin("sale.list").await?;
        let result = tx.sales(range).await;
        finish(tx, result, "sale.list").await
    }

    async fn locked_sale(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<Sale> {
        tx.sale(id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))
    }
}
