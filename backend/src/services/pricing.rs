//! Sale price history driven by purchases

use chrono::Utc;
use rust_decimal::Decimal;
use shared::PriceChangeRecord;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, LockMode};

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceHistoryRecorder;

impl PriceHistoryRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Push sale and minimum prices from a purchase line onto the product.
    ///
    /// A history entry is written only when the sale price actually changes.
    /// Prices that are not supplied keep their current value.
    pub async fn apply<T: LedgerTx>(
        &self,
        tx: &mut T,
        product_id: Uuid,
        sale_price: Option<Decimal>,
        min_sale_price: Option<Decimal>,
    ) -> AppResult<Option<PriceChangeRecord>> {
        if sale_price.is_none() && min_sale_price.is_none() {
            return Ok(None);
        }

        let product = tx
            .product(product_id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let mut change = None;
        if let Some(new_price) = sale_price {
            if product.sale_price != Some(new_price) {
                let record = PriceChangeRecord {
                    id: Uuid::new_v4(),
                    product_id,
                    previous_sale_price: product.sale_price.unwrap_or(Decimal::ZERO),
                    new_sale_price: new_price,
                    changed_at: Utc::now(),
                };
                tx.append_price_change(&record).await?;
                tracing::info!(%product_id, previous = %record.previous_sale_price, new = %new_price, "sale price changed");
                change = Some(record);
            }
        }

        let next_sale = sale_price.or(product.sale_price);
        let next_min = min_sale_price.or(product.min_sale_price);
        if next_sale != product.sale_price || next_min != product.min_sale_price {
            tx.update_product_prices(product_id, next_sale, next_min).await?;
        }

        Ok(change)
    }

    pub async fn history<T: LedgerTx>(
        &self,
        tx: &mut T,
        product_id: Uuid,
    ) -> AppResult<Vec<PriceChangeRecord>> {
        tx.price_changes(product_id).await
    }
}
