//! PostgreSQL ledger store
//!
//! One sqlx transaction per `PgTx`. Row locks are `SELECT ... FOR UPDATE`;
//! `lock_timeout` is set per transaction so no caller waits forever.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Adjustment, AdjustmentKind, DateRange, MovementKind, MovementRecord, NewMovement,
    PriceChangeRecord, Product, Purchase, PurchaseLine, Sale, SaleLine, StockKey, StockRecord,
    Transfer, TransferLine, Warehouse,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, LockMode};
use crate::error::{AppError, AppResult};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(db: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        let mut tx = self.db.begin().await?;
        // SET does not take bind parameters
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(PgTx { tx })
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn lock_clause(mode: LockMode) -> &'static str {
    match mode {
        LockMode::Read => "",
        LockMode::Exclusive => " FOR UPDATE",
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    sku: String,
    unit_of_measure: Option<String>,
    sale_price: Option<Decimal>,
    min_sale_price: Option<Decimal>,
    active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            name: row.name,
            sku: row.sku,
            unit_of_measure: row.unit_of_measure,
            sale_price: row.sale_price,
            min_sale_price: row.min_sale_price,
            active: row.active,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    warehouse_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    sku: String,
    expiration_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockRecord {
    fn from(row: StockRow) -> Self {
        StockRecord {
            id: row.id,
            warehouse_id: row.warehouse_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            sku: row.sku,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    sequence: i64,
    warehouse_id: Uuid,
    product_id: Uuid,
    kind: String,
    quantity: Decimal,
    unit_cost: Decimal,
    average_cost: Decimal,
    description: String,
    resulting_balance: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for MovementRecord {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        let kind = MovementKind::parse(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("unknown movement kind {}", row.kind)))?;
        Ok(MovementRecord {
            id: row.id,
            sequence: row.sequence,
            warehouse_id: row.warehouse_id,
            product_id: row.product_id,
            kind,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            average_cost: row.average_cost,
            description: row.description,
            resulting_balance: row.resulting_balance,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PriceChangeRow {
    id: Uuid,
    product_id: Uuid,
    previous_sale_price: Decimal,
    new_sale_price: Decimal,
    changed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: Uuid,
    warehouse_id: Uuid,
    responsible_id: Uuid,
    date: NaiveDate,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PurchaseLineRow {
    id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_cost: Decimal,
    sale_price: Option<Decimal>,
    min_sale_price: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    origin_warehouse_id: Uuid,
    destination_warehouse_id: Uuid,
    responsible_id: Uuid,
    date: NaiveDate,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TransferLineRow {
    id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_cost: Decimal,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    code: String,
    warehouse_id: Uuid,
    seller_id: Uuid,
    customer_name: Option<String>,
    date: NaiveDate,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    active: bool,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    subtotal: Decimal,
    unit_cost: Decimal,
}

#[derive(Debug, FromRow)]
struct AdjustmentRow {
    id: Uuid,
    warehouse_id: Uuid,
    product_id: Uuid,
    kind: String,
    quantity: Decimal,
    unit_cost: Decimal,
    reason: String,
    responsible_id: Uuid,
    date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdjustmentRow> for Adjustment {
    type Error = AppError;

    fn try_from(row: AdjustmentRow) -> AppResult<Self> {
        let kind = AdjustmentKind::parse(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("unknown adjustment kind {}", row.kind)))?;
        Ok(Adjustment {
            id: row.id,
            warehouse_id: row.warehouse_id,
            product_id: row.product_id,
            kind,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            reason: row.reason,
            responsible_id: row.responsible_id,
            date: row.date,
            created_at: row.created_at,
        })
    }
}

const STOCK_COLUMNS: &str = "id, warehouse_id, product_id, quantity, unit_cost, sku, \
                             expiration_date, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, sequence, warehouse_id, product_id, kind, quantity, \
                                unit_cost, average_cost, description, resulting_balance, created_at";

const PURCHASE_COLUMNS: &str =
    "id, warehouse_id, responsible_id, date, note, created_at, updated_at";

const TRANSFER_COLUMNS: &str = "id, origin_warehouse_id, destination_warehouse_id, \
                                responsible_id, date, note, created_at, updated_at";

const SALE_COLUMNS: &str = "id, code, warehouse_id, seller_id, customer_name, date, subtotal, \
                            discount, total, active, voided_at, voided_by, created_at, updated_at";

impl PgTx {
    async fn load_purchase(&mut self, header: PurchaseRow) -> AppResult<Purchase> {
        let lines = sqlx::query_as::<_, PurchaseLineRow>(
            r#"
            SELECT id, product_id, quantity, unit_cost, sale_price, min_sale_price
            FROM purchase_lines
            WHERE purchase_id = $1
            ORDER BY position
            "#,
        )
        .bind(header.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Purchase {
            id: header.id,
            warehouse_id: header.warehouse_id,
            responsible_id: header.responsible_id,
            date: header.date,
            note: header.note,
            lines: lines
                .into_iter()
                .map(|row| PurchaseLine {
                    id: row.id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    unit_cost: row.unit_cost,
                    sale_price: row.sale_price,
                    min_sale_price: row.min_sale_price,
                })
                .collect(),
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }

    async fn load_transfer(&mut self, header: TransferRow) -> AppResult<Transfer> {
        let lines = sqlx::query_as::<_, TransferLineRow>(
            r#"
            SELECT id, product_id, quantity, unit_cost
            FROM transfer_lines
            WHERE transfer_id = $1
            ORDER BY position
            "#,
        )
        .bind(header.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Transfer {
            id: header.id,
            origin_warehouse_id: header.origin_warehouse_id,
            destination_warehouse_id: header.destination_warehouse_id,
            responsible_id: header.responsible_id,
            date: header.date,
            note: header.note,
            lines: lines
                .into_iter()
                .map(|row| TransferLine {
                    id: row.id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    unit_cost: row.unit_cost,
                })
                .collect(),
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }

    async fn load_sale(&mut self, header: SaleRow) -> AppResult<Sale> {
        let lines = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT id, product_id, quantity, unit_price, subtotal, unit_cost
            FROM sale_lines
            WHERE sale_id = $1
            ORDER BY position
            "#,
        )
        .bind(header.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Sale {
            id: header.id,
            code: header.code,
            warehouse_id: header.warehouse_id,
            seller_id: header.seller_id,
            customer_name: header.customer_name,
            date: header.date,
            lines: lines
                .into_iter()
                .map(|row| SaleLine {
                    id: row.id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    unit_price: row.unit_price,
                    subtotal: row.subtotal,
                    unit_cost: row.unit_cost,
                })
                .collect(),
            subtotal: header.subtotal,
            discount: header.discount,
            total: header.total,
            active: header.active,
            voided_at: header.voided_at,
            voided_by: header.voided_by,
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT id, name, location FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, name, location)| Warehouse { id, name, location }))
    }

    async fn product(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Product>> {
        let sql = format!(
            "SELECT id, code, name, sku, unit_of_measure, sale_price, min_sale_price, active \
             FROM products WHERE id = $1{}",
            lock_clause(mode)
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Product::from))
    }

    async fn update_product_prices(
        &mut self,
        id: Uuid,
        sale_price: Option<Decimal>,
        min_sale_price: Option<Decimal>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET sale_price = $2, min_sale_price = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(sale_price)
        .bind(min_sale_price)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn stock(&mut self, key: StockKey, mode: LockMode) -> AppResult<Option<StockRecord>> {
        let sql = format!(
            "SELECT {} FROM stock_records WHERE warehouse_id = $1 AND product_id = $2{}",
            STOCK_COLUMNS,
            lock_clause(mode)
        );
        let row = sqlx::query_as::<_, StockRow>(&sql)
            .bind(key.warehouse_id)
            .bind(key.product_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn stock_for_inflow(&mut self, key: StockKey) -> AppResult<Option<StockRecord>> {
        // Concurrent first inflows converge on the same row
        sqlx::query(
            r#"
            INSERT INTO stock_records (id, warehouse_id, product_id, quantity, unit_cost, sku)
            SELECT $1, $2, p.id, 0, NULL, p.sku FROM products p WHERE p.id = $3
            ON CONFLICT (warehouse_id, product_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.warehouse_id)
        .bind(key.product_id)
        .execute(&mut *self.tx)
        .await?;

        self.stock(key, LockMode::Exclusive).await
    }

    async fn save_stock(&mut self, record: &StockRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (
                id, warehouse_id, product_id, quantity, unit_cost, sku,
                expiration_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (warehouse_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                unit_cost = EXCLUDED.unit_cost,
                sku = EXCLUDED.sku,
                expiration_date = EXCLUDED.expiration_date,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id)
        .bind(record.warehouse_id)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(record.unit_cost)
        .bind(&record.sku)
        .bind(record.expiration_date)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_stock(&mut self, warehouse_id: Option<Uuid>) -> AppResult<Vec<StockRecord>> {
        let sql = format!(
            "SELECT {} FROM stock_records \
             WHERE ($1::uuid IS NULL OR warehouse_id = $1) \
             ORDER BY warehouse_id, product_id",
            STOCK_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockRow>(&sql)
            .bind(warehouse_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows.into_iter().map(StockRecord::from).collect())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord> {
        let sql = format!(
            "INSERT INTO movement_records ( \
                 id, warehouse_id, product_id, kind, quantity, unit_cost, \
                 average_cost, description, resulting_balance \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            MOVEMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(movement.key.warehouse_id)
            .bind(movement.key.product_id)
            .bind(movement.kind.as_str())
            .bind(movement.quantity)
            .bind(movement.unit_cost)
            .bind(movement.average_cost)
            .bind(&movement.description)
            .bind(movement.resulting_balance)
            .fetch_one(&mut *self.tx)
            .await?;

        MovementRecord::try_from(row)
    }

    async fn movements(
        &mut self,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let sql = format!(
            "SELECT {} FROM movement_records \
             WHERE warehouse_id = $1 AND product_id = $2 \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at < $4) \
             ORDER BY sequence",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(key.warehouse_id)
            .bind(key.product_id)
            .bind(range.as_ref().map(DateRange::starts_at))
            .bind(range.as_ref().map(DateRange::ends_before))
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(MovementRecord::try_from).collect()
    }

    async fn movements_by_warehouse(
        &mut self,
        warehouse_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let sql = format!(
            "SELECT {} FROM movement_records \
             WHERE warehouse_id = $1 \
               AND ($2::timestamptz IS NULL OR created_at >= $2) \
               AND ($3::timestamptz IS NULL OR created_at < $3) \
             ORDER BY sequence",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(warehouse_id)
            .bind(range.as_ref().map(DateRange::starts_at))
            .bind(range.as_ref().map(DateRange::ends_before))
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(MovementRecord::try_from).collect()
    }

    async fn append_price_change(&mut self, record: &PriceChangeRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO price_changes (id, product_id, previous_sale_price, new_sale_price, changed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.product_id)
        .bind(record.previous_sale_price)
        .bind(record.new_sale_price)
        .bind(record.changed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn price_changes(&mut self, product_id: Uuid) -> AppResult<Vec<PriceChangeRecord>> {
        let rows = sqlx::query_as::<_, PriceChangeRow>(
            r#"
            SELECT id, product_id, previous_sale_price, new_sale_price, changed_at
            FROM price_changes
            WHERE product_id = $1
            ORDER BY changed_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PriceChangeRecord {
                id: row.id,
                product_id: row.product_id,
                previous_sale_price: row.previous_sale_price,
                new_sale_price: row.new_sale_price,
                changed_at: row.changed_at,
            })
            .collect())
    }

    async fn purchase(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Purchase>> {
        let sql = format!(
            "SELECT {} FROM purchases WHERE id = $1{}",
            PURCHASE_COLUMNS,
            lock_clause(mode)
        );
        let header = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match header {
            Some(header) => Ok(Some(self.load_purchase(header).await?)),
            None => Ok(None),
        }
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (id, warehouse_id, responsible_id, date, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                warehouse_id = EXCLUDED.warehouse_id,
                responsible_id = EXCLUDED.responsible_id,
                date = EXCLUDED.date,
                note = EXCLUDED.note,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.warehouse_id)
        .bind(purchase.responsible_id)
        .bind(purchase.date)
        .bind(&purchase.note)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM purchase_lines WHERE purchase_id = $1")
            .bind(purchase.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, line) in purchase.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_lines (
                    id, purchase_id, position, product_id, quantity, unit_cost,
                    sale_price, min_sale_price
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id)
            .bind(purchase.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.sale_price)
            .bind(line.min_sale_price)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()> {
        // Lines go with the header (ON DELETE CASCADE)
        sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn purchases(&mut self, range: Option<DateRange>) -> AppResult<Vec<Purchase>> {
        let sql = format!(
            "SELECT {} FROM purchases \
             WHERE ($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2) \
             ORDER BY date, created_at",
            PURCHASE_COLUMNS
        );
        let headers = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(range.as_ref().map(|r| r.start))
            .bind(range.as_ref().map(|r| r.end))
            .fetch_all(&mut *self.tx)
            .await?;

        let mut documents = Vec::with_capacity(headers.len());
        for header in headers {
            documents.push(self.load_purchase(header).await?);
        }
        Ok(documents)
    }

    async fn transfer(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Transfer>> {
        let sql = format!(
            "SELECT {} FROM transfers WHERE id = $1{}",
            TRANSFER_COLUMNS,
            lock_clause(mode)
        );
        let header = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match header {
            Some(header) => Ok(Some(self.load_transfer(header).await?)),
            None => Ok(None),
        }
    }

    async fn save_transfer(&mut self, transfer: &Transfer) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, origin_warehouse_id, destination_warehouse_id, responsible_id,
                date, note, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                origin_warehouse_id = EXCLUDED.origin_warehouse_id,
                destination_warehouse_id = EXCLUDED.destination_warehouse_id,
                responsible_id = EXCLUDED.responsible_id,
                date = EXCLUDED.date,
                note = EXCLUDED.note,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.origin_warehouse_id)
        .bind(transfer.destination_warehouse_id)
        .bind(transfer.responsible_id)
        .bind(transfer.date)
        .bind(&transfer.note)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM transfer_lines WHERE transfer_id = $1")
            .bind(transfer.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, line) in transfer.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_lines (id, transfer_id, position, product_id, quantity, unit_cost)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id)
            .bind(transfer.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM transfers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn transfers(&mut self, range: Option<DateRange>) -> AppResult<Vec<Transfer>> {
        let sql = format!(
            "SELECT {} FROM transfers \
             WHERE ($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2) \
             ORDER BY date, created_at",
            TRANSFER_COLUMNS
        );
        let headers = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(range.as_ref().map(|r| r.start))
            .bind(range.as_ref().map(|r| r.end))
            .fetch_all(&mut *self.tx)
            .await?;

        let mut documents = Vec::with_capacity(headers.len());
        for header in headers {
            documents.push(self.load_transfer(header).await?);
        }
        Ok(documents)
    }

    async fn sale(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE id = $1{}",
            SALE_COLUMNS,
            lock_clause(mode)
        );
        let header = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match header {
            Some(header) => Ok(Some(self.load_sale(header).await?)),
            None => Ok(None),
        }
    }

    async fn save_sale(&mut self, sale: &Sale) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, code, warehouse_id, seller_id, customer_name, date, subtotal, discount,
                total, active, voided_at, voided_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                warehouse_id = EXCLUDED.warehouse_id,
                seller_id = EXCLUDED.seller_id,
                customer_name = EXCLUDED.customer_name,
                date = EXCLUDED.date,
                subtotal = EXCLUDED.subtotal,
                discount = EXCLUDED.discount,
                total = EXCLUDED.total,
                active = EXCLUDED.active,
                voided_at = EXCLUDED.voided_at,
                voided_by = EXCLUDED.voided_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(sale.id)
        .bind(&sale.code)
        .bind(sale.warehouse_id)
        .bind(sale.seller_id)
        .bind(&sale.customer_name)
        .bind(sale.date)
        .bind(sale.subtotal)
        .bind(sale.discount)
        .bind(sale.total)
        .bind(sale.active)
        .bind(sale.voided_at)
        .bind(sale.voided_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM sale_lines WHERE sale_id = $1")
            .bind(sale.id)
            .execute(&mut *self.tx)
            .await?;

        for (position, line) in sale.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    id, sale_id, position, product_id, quantity, unit_price, subtotal, unit_cost
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id)
            .bind(sale.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .bind(line.unit_cost)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn sales(&mut self, range: Option<DateRange>) -> AppResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales \
             WHERE ($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2) \
             ORDER BY date, created_at",
            SALE_COLUMNS
        );
        let headers = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(range.as_ref().map(|r| r.start))
            .bind(range.as_ref().map(|r| r.end))
            .fetch_all(&mut *self.tx)
            .await?;

        let mut documents = Vec::with_capacity(headers.len());
        for header in headers {
            documents.push(self.load_sale(header).await?);
        }
        Ok(documents)
    }

    async fn next_sale_number(&mut self) -> AppResult<i64> {
        let number = sqlx::query_scalar::<_, i64>("SELECT nextval('sale_number_seq')")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(number)
    }

    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO adjustments (
                id, warehouse_id, product_id, kind, quantity, unit_cost, reason,
                responsible_id, date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(adjustment.id)
        .bind(adjustment.warehouse_id)
        .bind(adjustment.product_id)
        .bind(adjustment.kind.as_str())
        .bind(adjustment.quantity)
        .bind(adjustment.unit_cost)
        .bind(&adjustment.reason)
        .bind(adjustment.responsible_id)
        .bind(adjustment.date)
        .bind(adjustment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn adjustments(&mut self, key: Option<StockKey>) -> AppResult<Vec<Adjustment>> {
        let rows = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT id, warehouse_id, product_id, kind, quantity, unit_cost, reason,
                   responsible_id, date, created_at
            FROM adjustments
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
            ORDER BY created_at
            "#,
        )
        .bind(key.map(|k| k.warehouse_id))
        .bind(key.map(|k| k.product_id))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Adjustment::try_from).collect()
    }
}
