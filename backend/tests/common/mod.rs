//! Fixtures shared by the ledger integration tests

#![allow(dead_code)]

use std::str::FromStr;

use chrono::NaiveDate;
use inventory_ledger::config::LedgerConfig;
use inventory_ledger::services::{
    InventoryService, PurchaseInput, PurchaseLineInput, SaleInput, SaleLineInput,
    TransactionCoordinator, TransferInput, TransferLineInput,
};
use inventory_ledger::MemoryStore;
use rust_decimal::Decimal;
use shared::{Product, StockKey, Warehouse};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

/// Seeded in-memory ledger with two warehouses and three products
pub struct Fixture {
    pub store: MemoryStore,
    pub coordinator: TransactionCoordinator<MemoryStore>,
    pub inventory: InventoryService<MemoryStore>,
    pub warehouse_a: Uuid,
    pub warehouse_b: Uuid,
    pub products: Vec<Uuid>,
    pub user: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::default();
        let warehouse_a = Uuid::new_v4();
        let warehouse_b = Uuid::new_v4();
        store
            .add_warehouse(Warehouse {
                id: warehouse_a,
                name: "Central".to_string(),
                location: Some("Main street".to_string()),
            })
            .unwrap();
        store
            .add_warehouse(Warehouse {
                id: warehouse_b,
                name: "Branch".to_string(),
                location: None,
            })
            .unwrap();

        let products: Vec<Uuid> = (1..=3)
            .map(|n| {
                let id = Uuid::new_v4();
                store
                    .add_product(Product {
                        id,
                        code: format!("P-{}", n),
                        name: format!("Product {}", n),
                        sku: format!("SKU-{}", n),
                        unit_of_measure: Some("unit".to_string()),
                        sale_price: None,
                        min_sale_price: None,
                        active: true,
                    })
                    .unwrap();
                id
            })
            .collect();

        Self {
            coordinator: TransactionCoordinator::new(store.clone()),
            inventory: InventoryService::new(store.clone(), LedgerConfig::default()),
            store,
            warehouse_a,
            warehouse_b,
            products,
            user: Uuid::new_v4(),
        }
    }

    pub fn product(&self) -> Uuid {
        self.products[0]
    }

    pub fn key_a(&self, product: Uuid) -> StockKey {
        StockKey::new(self.warehouse_a, product)
    }

    pub fn key_b(&self, product: Uuid) -> StockKey {
        StockKey::new(self.warehouse_b, product)
    }

    pub fn purchase_line(&self, product: Uuid, quantity: &str, cost: &str) -> PurchaseLineInput {
        PurchaseLineInput {
            product_id: product,
            quantity: dec(quantity),
            unit_cost: dec(cost),
            sale_price: None,
            min_sale_price: None,
        }
    }

    pub fn purchase_input(&self, warehouse: Uuid, lines: Vec<PurchaseLineInput>) -> PurchaseInput {
        PurchaseInput {
            warehouse_id: warehouse,
            responsible_id: self.user,
            date: day(),
            note: None,
            lines,
        }
    }

    /// Purchase one product into a warehouse
    pub async fn stock_up(&self, warehouse: Uuid, product: Uuid, quantity: &str, cost: &str) {
        let line = self.purchase_line(product, quantity, cost);
        let input = self.purchase_input(warehouse, vec![line]);
        self.coordinator.create_purchase(input).await.unwrap();
    }

    pub fn sale_input(&self, warehouse: Uuid, lines: Vec<(Uuid, &str, &str)>) -> SaleInput {
        SaleInput {
            warehouse_id: warehouse,
            seller_id: self.user,
            customer_name: Some("Walk-in".to_string()),
            date: day(),
            discount: Decimal::ZERO,
            lines: lines
                .into_iter()
                .map(|(product, quantity, price)| SaleLineInput {
                    product_id: product,
                    quantity: dec(quantity),
                    unit_price: dec(price),
                })
                .collect(),
        }
    }

    pub fn transfer_input(
        &self,
        origin: Uuid,
        destination: Uuid,
        lines: Vec<(Uuid, &str)>,
    ) -> TransferInput {
        TransferInput {
            origin_warehouse_id: origin,
            destination_warehouse_id: destination,
            responsible_id: self.user,
            date: day(),
            note: None,
            lines: lines
                .into_iter()
                .map(|(product, quantity)| TransferLineInput {
                    product_id: product,
                    quantity: dec(quantity),
                })
                .collect(),
        }
    }

    /// (quantity, unit cost) of a balance
    pub async fn balance(&self, key: StockKey) -> (Decimal, Option<Decimal>) {
        let record = self.inventory.stock(key).await.unwrap();
        (record.quantity, record.unit_cost)
    }

    pub async fn assert_reconciled(&self) {
        for report in self.inventory.reconcile_all().await.unwrap() {
            assert!(report.consistent, "journal disagrees with stock: {:?}", report);
        }
    }
}
