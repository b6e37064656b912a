//! Initial inventory load

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{non_negative_amount, positive_quantity, StockKey};
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{finish, TransactionCoordinator};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, LockMode};

pub const IMPORT_DESCRIPTION: &str = "Initial inventory load";

/// One parsed row of an inventory import
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImportRow {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub unit_cost: Decimal,
    #[validate(custom = "non_negative_amount")]
    pub sale_price: Option<Decimal>,
    #[validate(custom = "non_negative_amount")]
    pub min_sale_price: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
}

/// A rejected row, numbered from 1
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub code: String,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<ImportRowError>,
}

impl ImportRowError {
    fn new(row: usize, error: AppError) -> Self {
        let detail = error.detail();
        Self {
            row,
            code: detail.code,
            field: detail.field,
            message: detail.message,
        }
    }
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    /// Load opening balances in one transaction.
    ///
    /// Rows with invalid values or unknown references are reported and
    /// skipped. Any other failure aborts the whole batch.
    pub async fn import_stock(&self, rows: Vec<ImportRow>) -> AppResult<ImportReport> {
        let mut tx = self.begin("import.apply").await?;
        let result = self.apply_import(&mut tx, rows).await;
        finish(tx, result, "import.apply").await
    }

    async fn apply_import(&self, tx: &mut S::Tx, rows: Vec<ImportRow>) -> AppResult<ImportReport> {
        let mut report = ImportReport::default();

        for (index, row) in rows.iter().enumerate() {
            let number = index + 1;
            if let Err(rejection) = self.check_import_row(tx, row).await? {
                tracing::warn!(row = number, code = rejection.code(), "import row rejected");
                report.errors.push(ImportRowError::new(number, rejection));
                continue;
            }

            let key = StockKey::new(row.warehouse_id, row.product_id);
            self.receive(tx, key, row.quantity, row.unit_cost, IMPORT_DESCRIPTION.to_string())
                .await?;
            if row.expiration_date.is_some() {
                self.ledger
                    .set_expiration(tx, key, row.expiration_date)
                    .await?;
            }
            self.prices
                .apply(tx, row.product_id, row.sale_price, row.min_sale_price)
                .await?;
            report.imported += 1;
        }

        tracing::info!(imported = report.imported, rejected = report.errors.len(), "inventory import applied");
        Ok(report)
    }

    /// Outer error aborts the batch; inner error rejects the row
    async fn check_import_row(
        &self,
        tx: &mut S::Tx,
        row: &ImportRow,
    ) -> AppResult<Result<(), AppError>> {
        if let Err(errors) = row.validate() {
            return Ok(Err(errors.into()));
        }
        if tx.warehouse(row.warehouse_id).await?.is_none() {
            return Ok(Err(AppError::NotFound("Warehouse".to_string())));
        }
        if tx.product(row.product_id, LockMode::Read).await?.is_none() {
            return Ok(Err(AppError::NotFound("Product".to_string())));
        }
        Ok(Ok(()))
    }
}
