//! Purchase tests
//!
//! Tests for purchase create/update/remove including:
//! - Property: a warehouse change fully reverses the old warehouse
//! - Quantity deltas, added and dropped lines
//! - Sale price history side effects
//! - Listing by document date

mod common;

use chrono::NaiveDate;
use common::{day, dec, Fixture};
use inventory_ledger::AppError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{DateRange, MovementKind};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_receives_every_line() {
        let fx = Fixture::new();
        let (p1, p2) = (fx.products[0], fx.products[1]);
        let input = fx.purchase_input(
            fx.warehouse_a,
            vec![fx.purchase_line(p1, "10", "2"), fx.purchase_line(p2, "4", "5.5")],
        );

        let purchase = fx.coordinator.create_purchase(input).await.unwrap();
        assert_eq!(purchase.lines.len(), 2);

        assert_eq!(fx.balance(fx.key_a(p1)).await, (dec("10"), Some(dec("2"))));
        assert_eq!(fx.balance(fx.key_a(p2)).await, (dec("4"), Some(dec("5.5"))));

        let stored = fx.coordinator.purchase(purchase.id).await.unwrap();
        assert_eq!(stored, purchase);
    }

    #[tokio::test]
    async fn test_create_requires_lines() {
        let fx = Fixture::new();
        let err = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "lines"));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_products() {
        let fx = Fixture::new();
        let p = fx.product();
        let input = fx.purchase_input(
            fx.warehouse_a,
            vec![fx.purchase_line(p, "1", "1"), fx.purchase_line(p, "2", "1")],
        );
        let err = fx.coordinator.create_purchase(input).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_line_values() {
        let fx = Fixture::new();
        let line = fx.purchase_line(fx.product(), "0", "1");
        let input = fx.purchase_input(fx.warehouse_a, vec![line]);
        let err = fx.coordinator.create_purchase(input).await.unwrap_err();
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "lines[0].quantity");
                assert_eq!(message, "Quantity must be positive");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_everything() {
        let fx = Fixture::new();
        let input = fx.purchase_input(
            fx.warehouse_a,
            vec![
                fx.purchase_line(fx.product(), "5", "1"),
                fx.purchase_line(uuid::Uuid::new_v4(), "5", "1"),
            ],
        );
        let err = fx.coordinator.create_purchase(input).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(fx.inventory.stock(fx.key_a(fx.product())).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_warehouse_is_not_found() {
        let fx = Fixture::new();
        let line = fx.purchase_line(fx.product(), "5", "1");
        let input = fx.purchase_input(uuid::Uuid::new_v4(), vec![line]);
        let err = fx.coordinator.create_purchase(input).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref r) if r == "Warehouse"));
    }

    #[tokio::test]
    async fn test_sale_price_history_recorded_on_change_only() {
        let fx = Fixture::new();
        let p = fx.product();
        let mut line = fx.purchase_line(p, "1", "1");
        line.sale_price = Some(dec("3"));
        line.min_sale_price = Some(dec("2.5"));

        fx.coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![line.clone()]))
            .await
            .unwrap();
        fx.coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![line.clone()]))
            .await
            .unwrap();
        line.sale_price = Some(dec("4"));
        fx.coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![line]))
            .await
            .unwrap();

        let history = fx.inventory.price_history(p).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].previous_sale_price, Decimal::ZERO);
        assert_eq!(history[0].new_sale_price, dec("3"));
        assert_eq!(history[1].previous_sale_price, dec("3"));
        assert_eq!(history[1].new_sale_price, dec("4"));
    }

    #[tokio::test]
    async fn test_update_quantity_deltas() {
        let fx = Fixture::new();
        let (p1, p2, p3) = (fx.products[0], fx.products[1], fx.products[2]);
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(
                fx.warehouse_a,
                vec![fx.purchase_line(p1, "10", "2"), fx.purchase_line(p2, "10", "2")],
            ))
            .await
            .unwrap();

        // p1 grows by 10 @ 4, p2 is dropped, p3 is new
        let updated = fx
            .coordinator
            .update_purchase(
                purchase.id,
                fx.purchase_input(
                    fx.warehouse_a,
                    vec![fx.purchase_line(p1, "20", "4"), fx.purchase_line(p3, "3", "1")],
                ),
            )
            .await
            .unwrap();

        assert_eq!(updated.lines.len(), 2);
        assert_eq!(updated.line_for(p1).unwrap().id, purchase.line_for(p1).unwrap().id);
        assert_eq!(fx.balance(fx.key_a(p1)).await, (dec("20"), Some(dec("3"))));
        assert_eq!(fx.balance(fx.key_a(p2)).await.0, Decimal::ZERO);
        assert_eq!(fx.balance(fx.key_a(p3)).await, (dec("3"), Some(dec("1"))));

        // Shrink p1 back: outflow at the average, cost unchanged
        fx.coordinator
            .update_purchase(
                purchase.id,
                fx.purchase_input(
                    fx.warehouse_a,
                    vec![fx.purchase_line(p1, "5", "4"), fx.purchase_line(p3, "3", "1")],
                ),
            )
            .await
            .unwrap();
        assert_eq!(fx.balance(fx.key_a(p1)).await, (dec("5"), Some(dec("3"))));
        fx.assert_reconciled().await;
    }

    #[tokio::test]
    async fn test_update_price_only_has_no_ledger_effect() {
        let fx = Fixture::new();
        let p = fx.product();
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(
                fx.warehouse_a,
                vec![fx.purchase_line(p, "10", "2")],
            ))
            .await
            .unwrap();

        let updated = fx
            .coordinator
            .update_purchase(
                purchase.id,
                fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "10", "9")]),
            )
            .await
            .unwrap();

        assert_eq!(updated.lines[0].unit_cost, dec("9"));
        assert_eq!(fx.balance(fx.key_a(p)).await, (dec("10"), Some(dec("2"))));
        assert_eq!(fx.inventory.movements(fx.key_a(p), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_warehouse_change_moves_everything() {
        let fx = Fixture::new();
        let p = fx.product();
        fx.stock_up(fx.warehouse_b, p, "5", "1").await;
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "5", "3")]))
            .await
            .unwrap();

        let updated = fx
            .coordinator
            .update_purchase(
                purchase.id,
                fx.purchase_input(fx.warehouse_b, vec![fx.purchase_line(p, "5", "3")]),
            )
            .await
            .unwrap();

        assert_eq!(updated.warehouse_id, fx.warehouse_b);
        assert_eq!(fx.balance(fx.key_a(p)).await.0, Decimal::ZERO);
        assert_eq!(fx.balance(fx.key_b(p)).await, (dec("10"), Some(dec("2"))));
        fx.assert_reconciled().await;
    }

    #[tokio::test]
    async fn test_update_warehouse_change_without_lines_keeps_lines() {
        let fx = Fixture::new();
        let p = fx.product();
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "5", "3")]))
            .await
            .unwrap();

        let updated = fx
            .coordinator
            .update_purchase(purchase.id, fx.purchase_input(fx.warehouse_b, vec![]))
            .await
            .unwrap();

        assert_eq!(updated.lines, purchase.lines);
        assert_eq!(fx.balance(fx.key_b(p)).await, (dec("5"), Some(dec("3"))));
    }

    #[tokio::test]
    async fn test_update_fails_when_stock_already_sold() {
        let fx = Fixture::new();
        let p = fx.product();
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "5", "3")]))
            .await
            .unwrap();
        fx.coordinator
            .create_sale(fx.sale_input(fx.warehouse_a, vec![(p, "4", "10")]))
            .await
            .unwrap();

        let err = fx
            .coordinator
            .update_purchase(
                purchase.id,
                fx.purchase_input(fx.warehouse_b, vec![fx.purchase_line(p, "5", "3")]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(fx.balance(fx.key_a(p)).await.0, dec("1"));
        assert!(fx.inventory.stock(fx.key_b(p)).await.is_err());
        let kept = fx.coordinator.purchase(purchase.id).await.unwrap();
        assert_eq!(kept.warehouse_id, fx.warehouse_a);
    }

    #[tokio::test]
    async fn test_remove_reverses_and_deletes() {
        let fx = Fixture::new();
        let p = fx.product();
        fx.stock_up(fx.warehouse_a, p, "2", "1").await;
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "6", "5")]))
            .await
            .unwrap();

        fx.coordinator.remove_purchase(purchase.id).await.unwrap();

        assert_eq!(fx.balance(fx.key_a(p)).await.0, dec("2"));
        assert!(matches!(
            fx.coordinator.purchase(purchase.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.coordinator.remove_purchase(purchase.id).await,
            Err(AppError::NotFound(_))
        ));
        fx.assert_reconciled().await;
    }

    #[tokio::test]
    async fn test_remove_issues_at_current_average() {
        let fx = Fixture::new();
        let p = fx.product();
        fx.stock_up(fx.warehouse_a, p, "2", "1").await;
        let purchase = fx
            .coordinator
            .create_purchase(fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "6", "5")]))
            .await
            .unwrap();
        // (2 * 1 + 6 * 5) / 8
        assert_eq!(fx.balance(fx.key_a(p)).await, (dec("8"), Some(dec("4"))));

        fx.coordinator.remove_purchase(purchase.id).await.unwrap();

        let last = fx.inventory.movements(fx.key_a(p), None).await.unwrap().pop().unwrap();
        assert_eq!(last.kind, MovementKind::Outflow);
        assert_eq!(last.quantity, dec("6"));
        assert_eq!(last.unit_cost, dec("4"));
        assert_eq!(fx.balance(fx.key_a(p)).await, (dec("2"), Some(dec("4"))));
    }

    #[tokio::test]
    async fn test_purchases_listed_by_date() {
        let fx = Fixture::new();
        let p = fx.product();
        let mut earlier = fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "1", "1")]);
        earlier.date = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let later = fx.purchase_input(fx.warehouse_a, vec![fx.purchase_line(p, "2", "1")]);
        let later = fx.coordinator.create_purchase(later).await.unwrap();
        let earlier = fx.coordinator.create_purchase(earlier).await.unwrap();

        let all = fx.coordinator.purchases(None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|doc| doc.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
        assert_eq!(all[1].lines.len(), 1);

        let may = DateRange::new(day(), day()).unwrap();
        let in_may = fx.coordinator.purchases(Some(may)).await.unwrap();
        assert_eq!(in_may.len(), 1);
        assert_eq!(in_may[0].id, later.id);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Moving a purchase returns the old warehouse to its prior balance
        /// and lands the full quantity in the new one
        #[test]
        fn prop_warehouse_change_fully_reverses(
            prior in 0i64..100,
            qty in 1i64..100,
            cost in 0i64..10_000,
        ) {
            tokio_test::block_on(async {
                let fx = Fixture::new();
                let p = fx.product();
                if prior > 0 {
                    fx.stock_up(fx.warehouse_a, p, &prior.to_string(), "1").await;
                }

                let purchase = fx.coordinator
                    .create_purchase(fx.purchase_input(
                        fx.warehouse_a,
                        vec![fx.purchase_line(p, &qty.to_string(), &Decimal::new(cost, 2).to_string())],
                    ))
                    .await
                    .unwrap();
                let same_lines = purchase
                    .lines
                    .iter()
                    .map(|l| fx.purchase_line(p, &l.quantity.to_string(), &l.unit_cost.to_string()))
                    .collect();
                fx.coordinator
                    .update_purchase(purchase.id, fx.purchase_input(fx.warehouse_b, same_lines))
                    .await
                    .unwrap();

                prop_assert_eq!(fx.balance(fx.key_a(p)).await.0, Decimal::from(prior));
                let (moved_qty, moved_cost) = fx.balance(fx.key_b(p)).await;
                prop_assert_eq!(moved_qty, Decimal::from(qty));
                prop_assert_eq!(moved_cost, Some(Decimal::new(cost, 2)));
                Ok(())
            })?;
        }
    }
}
