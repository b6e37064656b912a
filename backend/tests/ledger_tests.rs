//! Stock ledger tests
//!
//! Tests for the balance primitives including:
//! - Property: balance equals inflows minus outflows
//! - Property: a rejected decrease leaves the balance untouched
//! - Property: outflows never change the average cost
//! - Weighted-average cost scenarios

mod common;

use common::{dec, Fixture};
use inventory_ledger::services::StockLedger;
use inventory_ledger::{AppError, AppResult, LedgerStore, LedgerTx, MemoryStore};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{StockKey, StockRecord};

async fn increase(
    store: &MemoryStore,
    key: StockKey,
    qty: Decimal,
    cost: Decimal,
) -> AppResult<StockRecord> {
    let mut tx = store.begin().await?;
    let record = StockLedger::new().increase(&mut tx, key, qty, cost).await?;
    tx.commit().await?;
    Ok(record)
}

async fn decrease(store: &MemoryStore, key: StockKey, qty: Decimal) -> AppResult<StockRecord> {
    let mut tx = store.begin().await?;
    let record = StockLedger::new().decrease(&mut tx, key, qty).await?;
    tx.commit().await?;
    Ok(record)
}

async fn peek(store: &MemoryStore, key: StockKey) -> AppResult<StockRecord> {
    let mut tx = store.begin().await?;
    StockLedger::new().peek(&mut tx, key).await
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10 @ 2.00, 10 @ 4.00, -5, then an oversized decrease
    #[tokio::test]
    async fn test_weighted_average_scenario() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());

        let first = increase(&fx.store, key, dec("10"), dec("2.00")).await.unwrap();
        assert_eq!(first.quantity, dec("10"));
        assert_eq!(first.unit_cost, Some(dec("2.00")));

        let second = increase(&fx.store, key, dec("10"), dec("4.00")).await.unwrap();
        assert_eq!(second.quantity, dec("20"));
        assert_eq!(second.unit_cost, Some(dec("3.00")));

        let third = decrease(&fx.store, key, dec("5")).await.unwrap();
        assert_eq!(third.quantity, dec("15"));
        assert_eq!(third.unit_cost, Some(dec("3.00")));

        let err = decrease(&fx.store, key, dec("20")).await.unwrap_err();
        match err {
            AppError::InsufficientStock { requested, available, .. } => {
                assert_eq!(requested, dec("20"));
                assert_eq!(available, dec("15"));
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        let after = peek(&fx.store, key).await.unwrap();
        assert_eq!(after.quantity, dec("15"));
        assert_eq!(after.unit_cost, Some(dec("3.00")));
    }

    #[tokio::test]
    async fn test_first_inflow_creates_record_with_product_sku() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());

        assert!(matches!(peek(&fx.store, key).await, Err(AppError::NotFound(_))));

        let record = increase(&fx.store, key, dec("3"), dec("1.5")).await.unwrap();
        assert_eq!(record.sku, "SKU-1");
        assert_eq!(record.warehouse_id, fx.warehouse_a);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());

        for qty in ["0", "-1"] {
            let err = increase(&fx.store, key, dec(qty), dec("1")).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
        let err = increase(&fx.store, key, dec("1"), dec("-0.01")).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_decrease_without_record_is_not_found() {
        let fx = Fixture::new();
        let err = decrease(&fx.store, fx.key_b(fx.product()), dec("1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_increase_unknown_product_is_not_found() {
        let fx = Fixture::new();
        let key = fx.key_a(uuid::Uuid::new_v4());
        let err = increase(&fx.store, key, dec("1"), dec("1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_balance_is_kept() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());
        increase(&fx.store, key, dec("4"), dec("2")).await.unwrap();
        decrease(&fx.store, key, dec("4")).await.unwrap();

        let record = peek(&fx.store, key).await.unwrap();
        assert_eq!(record.quantity, Decimal::ZERO);
        assert_eq!(record.unit_cost, Some(dec("2")));

        // Next inflow is averaged against zero on hand
        let record = increase(&fx.store, key, dec("2"), dec("7")).await.unwrap();
        assert_eq!(record.unit_cost, Some(dec("7")));
    }

    #[tokio::test]
    async fn test_increase_at_current_cost_keeps_average() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());
        increase(&fx.store, key, dec("3"), dec("0.3333")).await.unwrap();

        let mut tx = fx.store.begin().await.unwrap();
        let record = StockLedger::new()
            .increase_at_current_cost(&mut tx, key, dec("1"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(record.quantity, dec("4"));
        assert_eq!(record.unit_cost, Some(dec("0.3333")));
    }

    #[tokio::test]
    async fn test_uncommitted_mutation_is_discarded() {
        let fx = Fixture::new();
        let key = fx.key_a(fx.product());
        increase(&fx.store, key, dec("5"), dec("1")).await.unwrap();

        let mut tx = fx.store.begin().await.unwrap();
        StockLedger::new().decrease(&mut tx, key, dec("5")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(peek(&fx.store, key).await.unwrap().quantity, dec("5"));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        In(i64, i64),
        Out(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..1_000, 0i64..100_000).prop_map(|(q, c)| Op::In(q, c)),
            (1i64..1_500).prop_map(Op::Out),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Final balance is inflows minus accepted outflows; rejected
        /// outflows change nothing and outflows never move the cost
        #[test]
        fn prop_balance_matches_accepted_operations(ops in prop::collection::vec(op_strategy(), 1..30)) {
            tokio_test::block_on(async {
                let fx = Fixture::new();
                let key = fx.key_a(fx.product());
                let mut expected = Decimal::ZERO;

                for op in ops {
                    match op {
                        Op::In(q, c) => {
                            let cost = Decimal::new(c, 2);
                            let record = increase(&fx.store, key, Decimal::from(q), cost).await.unwrap();
                            expected += Decimal::from(q);
                            prop_assert_eq!(record.quantity, expected);
                        }
                        Op::Out(q) => {
                            let before = peek(&fx.store, key).await.ok();
                            match decrease(&fx.store, key, Decimal::from(q)).await {
                                Ok(record) => {
                                    expected -= Decimal::from(q);
                                    prop_assert_eq!(record.quantity, expected);
                                    prop_assert_eq!(record.unit_cost, before.and_then(|b| b.unit_cost));
                                }
                                Err(AppError::InsufficientStock { .. }) | Err(AppError::NotFound(_)) => {
                                    let after = peek(&fx.store, key).await.ok();
                                    prop_assert_eq!(after, before);
                                }
                                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                            }
                        }
                    }
                }

                if let Ok(record) = peek(&fx.store, key).await {
                    prop_assert_eq!(record.quantity, expected);
                    prop_assert!(record.quantity >= Decimal::ZERO);
                }
                Ok(())
            })?;
        }

        /// Two receipts average to (q1*c1 + q2*c2) / (q1 + q2) within 1e-4
        #[test]
        fn prop_two_receipts_average(q1 in 1i64..10_000, c1 in 0i64..1_000_000, q2 in 1i64..10_000, c2 in 0i64..1_000_000) {
            tokio_test::block_on(async {
                let fx = Fixture::new();
                let key = fx.key_a(fx.product());
                let (c1, c2) = (Decimal::new(c1, 4), Decimal::new(c2, 4));
                let (q1, q2) = (Decimal::from(q1), Decimal::from(q2));

                increase(&fx.store, key, q1, c1).await.unwrap();
                let record = increase(&fx.store, key, q2, c2).await.unwrap();

                let exact = (q1 * c1 + q2 * c2) / (q1 + q2);
                let cost = record.unit_cost.unwrap();
                prop_assert!((cost - exact).abs() <= dec("0.0001"), "cost {} exact {}", cost, exact);
                Ok(())
            })?;
        }
    }
}
