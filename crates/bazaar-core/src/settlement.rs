//! # Settlement Rules
//!
//! Pure functions deciding when money can move.
//!
//! ## Timeline of an Order
//! ```text
//!  checkout            created_at + 3 days
//!     │                        │
//!     ▼                        ▼
//! ────●────────────────────────●─────────────────────────────────►  time
//!     │◄──── report window ───►│◄──── seller may withdraw ────────
//!     │  buyer may dispute     │  scheduler promotes order to
//!     │  (completed only)      │  ready_for_withdrawal
//! ```
//!
//! The clock is always passed in. Nothing in this module reads system time.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult, Ineligibility, OrderIneligibility};
use crate::money::{FeeRate, FeeSplit, Money};
use crate::types::{Order, OrderStatus};
use crate::REPORT_WINDOW_DAYS;

/// Length of the report window as a duration.
#[inline]
pub fn report_window() -> Duration {
    Duration::days(REPORT_WINDOW_DAYS)
}

/// When an order created at `created_at` becomes withdrawable.
#[inline]
pub fn withdrawable_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + report_window()
}

/// Whether a buyer may still file a report at `now`.
///
/// The boundary instant itself is still inside the window.
#[inline]
pub fn is_within_report_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at <= report_window()
}

/// Whether the scheduler should promote `order` at `now`.
///
/// Mirrors the conditional update the scheduler issues: completed, not yet
/// withdrawable, never reported and strictly past `withdrawable_at`.
pub fn is_due_for_promotion(order: &Order, now: DateTime<Utc>) -> bool {
    order.status == OrderStatus::Completed
        && !order.can_withdraw
        && order.report_id.is_none()
        && order.withdrawable_at < now
}

// =============================================================================
// Withdrawal Eligibility
// =============================================================================

/// Checks every order against the withdrawal rules for `seller_id`.
///
/// Returns all violations, not only the first. An order can fail several
/// rules at once.
pub fn withdrawal_ineligibilities(orders: &[Order], seller_id: &str) -> Vec<OrderIneligibility> {
    let mut problems = Vec::new();

    for order in orders {
        if !order.has_seller(seller_id) {
            problems.push(OrderIneligibility {
                order_id: order.id.clone(),
                reason: Ineligibility::NotOrderSeller,
            });
        }
        if order.status != OrderStatus::ReadyForWithdrawal {
            problems.push(OrderIneligibility {
                order_id: order.id.clone(),
                reason: Ineligibility::OrderNotReady {
                    status: order.status,
                },
            });
        }
        if !order.can_withdraw {
            problems.push(OrderIneligibility {
                order_id: order.id.clone(),
                reason: Ineligibility::OrderNotWithdrawable,
            });
        }
    }

    problems
}

/// Amounts of a validated withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalQuote {
    pub rate: FeeRate,
    pub split: FeeSplit,
}

/// Validates `orders` and prices the withdrawal.
///
/// ## Errors
/// - [`CoreError::IneligibleOrders`] with every violation found
/// - [`CoreError::ZeroAmount`] when the seller's share sums to zero
pub fn quote_withdrawal(orders: &[Order], seller_id: &str, rate: FeeRate) -> CoreResult<WithdrawalQuote> {
    let problems = withdrawal_ineligibilities(orders, seller_id);
    if !problems.is_empty() {
        return Err(CoreError::IneligibleOrders(problems));
    }

    let gross: Money = orders.iter().map(|o| o.seller_share(seller_id)).sum();
    if !gross.is_positive() {
        return Err(CoreError::ZeroAmount);
    }

    Ok(WithdrawalQuote {
        rate,
        split: gross.split_fee(rate),
    })
}

/// Removes duplicate ids while keeping first-seen order.
pub fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, PaymentMethod};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn order(id: &str, status: OrderStatus, can_withdraw: bool, lines: &[(&str, i64)]) -> Order {
        let items: Vec<OrderItem> = lines
            .iter()
            .enumerate()
            .map(|(i, (seller, cents))| OrderItem {
                id: format!("{}-{}", id, i),
                order_id: id.to_string(),
                product_id: format!("p-{}-{}", id, i),
                product_title: "Ebook".to_string(),
                quantity: 1,
                unit_price_cents: *cents,
                subtotal_cents: *cents,
                seller_id: seller.to_string(),
            })
            .collect();
        Order {
            id: id.to_string(),
            buyer_id: "buyer".to_string(),
            total_cents: items.iter().map(|i| i.subtotal_cents).sum(),
            status,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items,
            can_withdraw,
            withdrawable_at: withdrawable_at(t0()),
            report_id: None,
            cancel_reason: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[test]
    fn test_report_window_boundary() {
        let created = t0();
        assert!(is_within_report_window(created, created));
        assert!(is_within_report_window(created, created + Duration::days(3)));
        assert!(!is_within_report_window(
            created,
            created + Duration::days(3) + Duration::seconds(1)
        ));
    }

    #[test]
    fn test_promotion_is_strictly_after_withdrawable_at() {
        let o = order("a", OrderStatus::Completed, false, &[("s", 100)]);
        assert!(!is_due_for_promotion(&o, o.withdrawable_at));
        assert!(is_due_for_promotion(&o, o.withdrawable_at + Duration::seconds(1)));

        let mut reported = o.clone();
        reported.report_id = Some("r".to_string());
        assert!(!is_due_for_promotion(&reported, o.withdrawable_at + Duration::days(1)));
    }

    #[test]
    fn test_quote_sums_only_seller_items() {
        let orders = vec![
            order("a", OrderStatus::ReadyForWithdrawal, true, &[("s", 10_000_000), ("x", 500)]),
            order("b", OrderStatus::ReadyForWithdrawal, true, &[("s", 10_000_000)]),
        ];
        let quote = quote_withdrawal(&orders, "s", FeeRate::from_bps(1700)).unwrap();
        assert_eq!(quote.split.gross.cents(), 20_000_000);
        assert_eq!(quote.split.fee.cents(), 3_400_000);
        assert_eq!(quote.split.net.cents(), 16_600_000);
    }

    #[test]
    fn test_every_violation_is_collected() {
        let orders = vec![
            order("a", OrderStatus::ReadyForWithdrawal, true, &[("s", 100)]),
            order("b", OrderStatus::Completed, false, &[("s", 100)]),
            order("c", OrderStatus::ReadyForWithdrawal, true, &[("other", 100)]),
        ];
        let problems = withdrawal_ineligibilities(&orders, "s");
        assert_eq!(problems.len(), 3);
        assert_eq!(problems[0].order_id, "b");
        assert_eq!(
            problems[0].reason,
            Ineligibility::OrderNotReady {
                status: OrderStatus::Completed
            }
        );
        assert_eq!(problems[1].reason, Ineligibility::OrderNotWithdrawable);
        assert_eq!(problems[2].order_id, "c");
        assert_eq!(problems[2].reason, Ineligibility::NotOrderSeller);

        let err = quote_withdrawal(&orders, "s", FeeRate::default()).unwrap_err();
        assert!(matches!(err, CoreError::IneligibleOrders(list) if list.len() == 3));
    }

    #[test]
    fn test_zero_amount() {
        let orders = vec![order("a", OrderStatus::ReadyForWithdrawal, true, &[("s", 0)])];
        let err = quote_withdrawal(&orders, "s", FeeRate::default()).unwrap_err();
        assert!(matches!(err, CoreError::ZeroAmount));
    }

    #[test]
    fn test_dedup_ids_keeps_order() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_ids(&ids), vec!["b".to_string(), "a".to_string()]);
    }
}
