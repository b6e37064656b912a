//! In-process ledger store
//!
//! Committed state sits behind one short-lived mutex. Each transaction
//! stages its writes in a private overlay and publishes them on commit.
//! Row locks are per-key async mutexes held by the transaction until it
//! ends, acquired with a timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    Adjustment, DateRange, MovementRecord, NewMovement, PriceChangeRecord, Product, Purchase,
    Sale, StockKey, StockRecord, Transfer, Warehouse,
};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, LockMode};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Stock(StockKey),
    Product(Uuid),
    Document(Uuid),
}

#[derive(Default)]
struct State {
    warehouses: HashMap<Uuid, Warehouse>,
    products: HashMap<Uuid, Product>,
    stock: HashMap<StockKey, StockRecord>,
    movements: Vec<MovementRecord>,
    price_changes: Vec<PriceChangeRecord>,
    purchases: HashMap<Uuid, Purchase>,
    transfers: HashMap<Uuid, Transfer>,
    sales: HashMap<Uuid, Sale>,
    adjustments: Vec<Adjustment>,
}

/// Writes staged by one transaction. `None` marks a deleted document.
#[derive(Default)]
struct Overlay {
    products: HashMap<Uuid, Product>,
    stock: HashMap<StockKey, StockRecord>,
    movements: Vec<MovementRecord>,
    price_changes: Vec<PriceChangeRecord>,
    purchases: HashMap<Uuid, Option<Purchase>>,
    transfers: HashMap<Uuid, Option<Transfer>>,
    sales: HashMap<Uuid, Option<Sale>>,
    adjustments: Vec<Adjustment>,
}

struct Shared {
    state: Mutex<State>,
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
    movement_seq: AtomicI64,
    sale_seq: AtomicI64,
    lock_timeout: Duration,
}

impl Shared {
    fn state(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("ledger state lock poisoned".to_string()))
    }

    fn row_lock(&self, key: LockKey) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Internal("lock table poisoned".to_string()))?;
        Ok(locks.entry(key).or_default().clone())
    }
}

/// Ledger store kept in process memory
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                locks: Mutex::new(HashMap::new()),
                movement_seq: AtomicI64::new(0),
                sale_seq: AtomicI64::new(0),
                lock_timeout,
            }),
        }
    }

    /// Register a warehouse in the catalog
    pub fn add_warehouse(&self, warehouse: Warehouse) -> AppResult<()> {
        self.shared.state()?.warehouses.insert(warehouse.id, warehouse);
        Ok(())
    }

    /// Register a product in the catalog
    pub fn add_product(&self, product: Product) -> AppResult<()> {
        self.shared.state()?.products.insert(product.id, product);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        Ok(MemoryTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            overlay: Overlay::default(),
        })
    }
}

pub struct MemoryTx {
    shared: Arc<Shared>,
    held: HashMap<LockKey, OwnedMutexGuard<()>>,
    overlay: Overlay,
}

impl MemoryTx {
    async fn lock(&mut self, key: LockKey) -> AppResult<()> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let row = self.shared.row_lock(key)?;
        let guard = tokio::time::timeout(self.shared.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| AppError::Internal(format!("timed out waiting for lock on {:?}", key)))?;
        self.held.insert(key, guard);
        Ok(())
    }

    async fn lock_if(&mut self, mode: LockMode, key: LockKey) -> AppResult<()> {
        match mode {
            LockMode::Exclusive => self.lock(key).await,
            LockMode::Read => Ok(()),
        }
    }

    fn read_stock(&self, key: StockKey) -> AppResult<Option<StockRecord>> {
        if let Some(record) = self.overlay.stock.get(&key) {
            return Ok(Some(record.clone()));
        }
        Ok(self.shared.state()?.stock.get(&key).cloned())
    }

    /// Release every held row lock and forget table entries nobody else holds
    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        self.held.clear();
        if let Ok(mut locks) = self.shared.locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    fn read_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        if let Some(product) = self.overlay.products.get(&id) {
            return Ok(Some(product.clone()));
        }
        Ok(self.shared.state()?.products.get(&id).cloned())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.release_locks();
    }
}

/// Staged version wins over the committed one
fn layered<T: Clone>(
    staged: &HashMap<Uuid, Option<T>>,
    committed: &HashMap<Uuid, T>,
    id: Uuid,
) -> Option<T> {
    match staged.get(&id) {
        Some(entry) => entry.clone(),
        None => committed.get(&id).cloned(),
    }
}

/// Committed documents merged with staged ones, filtered
fn listed<T: Clone>(
    staged: &HashMap<Uuid, Option<T>>,
    committed: &HashMap<Uuid, T>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut merged: HashMap<Uuid, T> = committed.clone();
    publish(&mut merged, staged.clone());
    merged.into_values().filter(|d| keep(d)).collect()
}

fn publish<T>(committed: &mut HashMap<Uuid, T>, staged: HashMap<Uuid, Option<T>>) {
    for (id, entry) in staged {
        match entry {
            Some(document) => {
                committed.insert(id, document);
            }
            None => {
                committed.remove(&id);
            }
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(mut self) -> AppResult<()> {
        let overlay = std::mem::take(&mut self.overlay);
        {
            let mut state = self.shared.state()?;
            state.products.extend(overlay.products);
            state.stock.extend(overlay.stock);
            state.movements.extend(overlay.movements);
            state.price_changes.extend(overlay.price_changes);
            publish(&mut state.purchases, overlay.purchases);
            publish(&mut state.transfers, overlay.transfers);
            publish(&mut state.sales, overlay.sales);
            state.adjustments.extend(overlay.adjustments);
        }
        // Row locks are released when `self` drops, after publishing
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        Ok(())
    }

    async fn warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self.shared.state()?.warehouses.get(&id).cloned())
    }

    async fn product(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Product>> {
        self.lock_if(mode, LockKey::Product(id)).await?;
        self.read_product(id)
    }

    async fn update_product_prices(
        &mut self,
        id: Uuid,
        sale_price: Option<Decimal>,
        min_sale_price: Option<Decimal>,
    ) -> AppResult<()> {
        let mut product = self
            .read_product(id)?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.sale_price = sale_price;
        product.min_sale_price = min_sale_price;
        self.overlay.products.insert(id, product);
        Ok(())
    }

    async fn stock(&mut self, key: StockKey, mode: LockMode) -> AppResult<Option<StockRecord>> {
        self.lock_if(mode, LockKey::Stock(key)).await?;
        self.read_stock(key)
    }

    async fn stock_for_inflow(&mut self, key: StockKey) -> AppResult<Option<StockRecord>> {
        self.lock(LockKey::Stock(key)).await?;
        if let Some(record) = self.read_stock(key)? {
            return Ok(Some(record));
        }
        let Some(product) = self.read_product(key.product_id)? else {
            return Ok(None);
        };
        let record = StockRecord::empty(key, product.sku);
        self.overlay.stock.insert(key, record.clone());
        Ok(Some(record))
    }

    async fn save_stock(&mut self, record: &StockRecord) -> AppResult<()> {
        self.overlay.stock.insert(record.key(), record.clone());
        Ok(())
    }

    async fn list_stock(&mut self, warehouse_id: Option<Uuid>) -> AppResult<Vec<StockRecord>> {
        let mut merged = self.shared.state()?.stock.clone();
        merged.extend(self.overlay.stock.iter().map(|(k, v)| (*k, v.clone())));
        let mut records: Vec<StockRecord> = merged
            .into_values()
            .filter(|r| warehouse_id.map_or(true, |w| r.warehouse_id == w))
            .collect();
        records.sort_by_key(|r| (r.warehouse_id, r.product_id));
        Ok(records)
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord> {
        let sequence = self.shared.movement_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let record = MovementRecord {
            id: Uuid::new_v4(),
            sequence,
            warehouse_id: movement.key.warehouse_id,
            product_id: movement.key.product_id,
            kind: movement.kind,
            quantity: movement.quantity,
            unit_cost: movement.unit_cost,
            average_cost: movement.average_cost,
            description: movement.description,
            resulting_balance: movement.resulting_balance,
            created_at: Utc::now(),
        };
        self.overlay.movements.push(record.clone());
        Ok(record)
    }

    async fn movements(
        &mut self,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let in_scope = |m: &&MovementRecord| {
            m.key() == key && range.as_ref().map_or(true, |r| r.contains(m.created_at))
        };
        let mut movements: Vec<MovementRecord> = self
            .shared
            .state()?
            .movements
            .iter()
            .filter(in_scope)
            .cloned()
            .collect();
        movements.extend(self.overlay.movements.iter().filter(in_scope).cloned());
        movements.sort_by_key(|m| m.sequence);
        Ok(movements)
    }

    async fn movements_by_warehouse(
        &mut self,
        warehouse_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let in_scope = |m: &&MovementRecord| {
            m.warehouse_id == warehouse_id
                && range.as_ref().map_or(true, |r| r.contains(m.created_at))
        };
        let mut movements: Vec<MovementRecord> = self
            .shared
            .state()?
            .movements
            .iter()
            .filter(in_scope)
            .cloned()
            .collect();
        movements.extend(self.overlay.movements.iter().filter(in_scope).cloned());
        movements.sort_by_key(|m| m.sequence);
        Ok(movements)
    }

    async fn append_price_change(&mut self, record: &PriceChangeRecord) -> AppResult<()> {
        self.overlay.price_changes.push(record.clone());
        Ok(())
    }

    async fn price_changes(&mut self, product_id: Uuid) -> AppResult<Vec<PriceChangeRecord>> {
        let mut changes: Vec<PriceChangeRecord> = self
            .shared
            .state()?
            .price_changes
            .iter()
            .chain(self.overlay.price_changes.iter())
            .filter(|c| c.product_id == product_id)
            .cloned()
            .collect();
        changes.sort_by_key(|c| c.changed_at);
        Ok(changes)
    }

    async fn purchase(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Purchase>> {
        self.lock_if(mode, LockKey::Document(id)).await?;
        let state = self.shared.state()?;
        Ok(layered(&self.overlay.purchases, &state.purchases, id))
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        self.overlay
            .purchases
            .insert(purchase.id, Some(purchase.clone()));
        Ok(())
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()> {
        self.overlay.purchases.insert(id, None);
        Ok(())
    }

    async fn purchases(&mut self, range: Option<DateRange>) -> AppResult<Vec<Purchase>> {
        let state = self.shared.state()?;
        let mut purchases = listed(&self.overlay.purchases, &state.purchases, |p| {
            range.as_ref().map_or(true, |r| r.includes(p.date))
        });
        purchases.sort_by_key(|p| (p.date, p.created_at));
        Ok(purchases)
    }

    async fn transfer(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Transfer>> {
        self.lock_if(mode, LockKey::Document(id)).await?;
        let state = self.shared.state()?;
        Ok(layered(&self.overlay.transfers, &state.transfers, id))
    }

    async fn save_transfer(&mut self, transfer: &Transfer) -> AppResult<()> {
        self.overlay
            .transfers
            .insert(transfer.id, Some(transfer.clone()));
        Ok(())
    }

    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()> {
        self.overlay.transfers.insert(id, None);
        Ok(())
    }

    async fn transfers(&mut self, range: Option<DateRange>) -> AppResult<Vec<Transfer>> {
        let state = self.shared.state()?;
        let mut transfers = listed(&self.overlay.transfers, &state.transfers, |t| {
            range.as_ref().map_or(true, |r| r.includes(t.date))
        });
        transfers.sort_by_key(|t| (t.date, t.created_at));
        Ok(transfers)
    }

    async fn sale(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Sale>> {
        self.lock_if(mode, LockKey::Document(id)).await?;
        let state = self.shared.state()?;
        Ok(layered(&self.overlay.sales, &state.sales, id))
    }

    async fn save_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.overlay.sales.insert(sale.id, Some(sale.clone()));
        Ok(())
    }

    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()> {
        self.overlay.sales.insert(id, None);
        Ok(())
    }

    async fn sales(&mut self, range: Option<DateRange>) -> AppResult<Vec<Sale>> {
        let state = self.shared.state()?;
        let mut sales = listed(&self.overlay.sales, &state.sales, |s| {
            range.as_ref().map_or(true, |r| r.includes(s.date))
        });
        sales.sort_by_key(|s| (s.date, s.created_at));
        Ok(sales)
    }

    async fn next_sale_number(&mut self) -> AppResult<i64> {
        Ok(self.shared.sale_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> AppResult<()> {
        self.overlay.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn adjustments(&mut self, key: Option<StockKey>) -> AppResult<Vec<Adjustment>> {
        let mut adjustments: Vec<Adjustment> = self
            .shared
            .state()?
            .adjustments
            .iter()
            .chain(self.overlay.adjustments.iter())
            .filter(|a| {
                key.map_or(true, |k| {
                    a.warehouse_id == k.warehouse_id && a.product_id == k.product_id
                })
            })
            .cloned()
            .collect();
        adjustments.sort_by_key(|a| a.created_at);
        Ok(adjustments)
    }
}
