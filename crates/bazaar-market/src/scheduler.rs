//! # Order Scheduler
//!
//! Promotes orders whose report window passed without a report.
//!
//! ## Sweep
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Order Scheduler                                      │
//! │                                                                         │
//! │  every `interval` (default 1h)          POST /admin/scheduler/sweep     │
//! │           │                                        │                    │
//! │           └──────────────┬─────────────────────────┘                    │
//! │                          ▼                                              │
//! │               sweep guard (try_lock)  ── busy ──► skipped               │
//! │                          │                                              │
//! │  1. Select: status = completed AND can_withdraw = 0                     │
//! │             AND report_id IS NULL AND withdrawable_at < now             │
//! │                                                                         │
//! │  2. Promote each order with one conditional UPDATE repeating the        │
//! │     predicate → ready_for_withdrawal, can_withdraw = 1                  │
//! │                                                                         │
//! │  3. Only if a row changed: notify each distinct seller with their share │
//! │                                                                         │
//! │  A failing order is logged and retried on the next sweep.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use bazaar_core::Order;
use bazaar_db::Database;

use crate::clock::Clock;
use crate::error::MarketResult;
use crate::notifier::{self, Notifier};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Maximum orders examined per sweep.
    pub batch_size: u32,
    /// When false, `run` returns immediately; manual sweeps still work.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            batch_size: 500,
            enabled: true,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders matching the predicate when selected.
    pub due: usize,
    /// Orders this sweep actually promoted.
    pub promoted: usize,
    /// Orders that failed and wait for the next sweep.
    pub failed: usize,
}

// =============================================================================
// Sweeper
// =============================================================================

/// Shared between the loop and the handle so both go through one guard.
#[derive(Debug, Clone)]
struct Sweeper {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    batch_size: u32,
    guard: Arc<Mutex<()>>,
}

impl Sweeper {
    /// Runs a sweep unless one is already running.
    async fn try_sweep(&self) -> Option<MarketResult<SweepReport>> {
        let Ok(_running) = self.guard.try_lock() else {
            debug!("Sweep already running, skipping");
            return None;
        };
        Some(self.sweep().await)
    }

    async fn sweep(&self) -> MarketResult<SweepReport> {
        let now = self.clock.now();
        let due = self.db.orders().find_due_for_promotion(now, self.batch_size).await?;

        let mut report = SweepReport {
            due: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!("No orders due for promotion");
            return Ok(report);
        }

        for order in &due {
            match self.db.orders().promote_if_due(&order.id, now).await {
                Ok(true) => {
                    report.promoted += 1;
                    debug!(order_id = %order.id, "Order ready for withdrawal");
                    self.notifier.send(seller_notifications(order)).await;
                }
                Ok(false) => {
                    debug!(order_id = %order.id, "Order changed since selection, not promoted");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(order_id = %order.id, error = %e, "Failed to promote order");
                }
            }
        }

        info!(
            due = report.due,
            promoted = report.promoted,
            failed = report.failed,
            "Order sweep finished"
        );
        Ok(report)
    }
}

/// One notification per distinct seller in the order.
fn seller_notifications(order: &Order) -> Vec<bazaar_core::NewNotification> {
    let mut sellers: Vec<&str> = Vec::new();
    for item in &order.items {
        if !sellers.contains(&item.seller_id.as_str()) {
            sellers.push(&item.seller_id);
        }
    }

    sellers
        .into_iter()
        .map(|seller| notifier::order_ready_for_withdrawal(&order.id, seller, order.seller_share(seller)))
        .collect()
}

// =============================================================================
// Scheduler
// =============================================================================

/// Background task promoting orders on a fixed period.
pub struct OrderScheduler {
    sweeper: Sweeper,
    config: SchedulerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for triggering sweeps and stopping the scheduler.
#[derive(Debug, Clone)]
pub struct OrderSchedulerHandle {
    sweeper: Sweeper,
    shutdown_tx: mpsc::Sender<()>,
}

impl OrderSchedulerHandle {
    /// Runs a sweep now. `None` if one is already running.
    pub async fn trigger(&self) -> Option<MarketResult<SweepReport>> {
        self.sweeper.try_sweep().await
    }

    /// Stops the loop after the current sweep.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Order scheduler already stopped");
        }
    }
}

impl OrderScheduler {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
        config: SchedulerConfig,
    ) -> (Self, OrderSchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweeper = Sweeper {
            db,
            clock,
            notifier,
            batch_size: config.batch_size,
            guard: Arc::new(Mutex::new(())),
        };

        let handle = OrderSchedulerHandle {
            sweeper: sweeper.clone(),
            shutdown_tx,
        };
        let scheduler = OrderScheduler {
            sweeper,
            config,
            shutdown_rx,
        };

        (scheduler, handle)
    }

    /// Runs the sweep loop. Spawn as a background task.
    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("Order scheduler disabled");
            return;
        }
        info!(interval_secs = self.config.interval.as_secs(), "Order scheduler starting");

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweeper.try_sweep().await {
                        Some(Err(e)) => error!(error = %e, "Order sweep failed"),
                        None => warn!("Scheduled sweep skipped, manual sweep in progress"),
                        Some(Ok(_)) => {}
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Order scheduler shutting down");
                    break;
                }
            }
        }

        info!("Order scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{buy, market};
    use bazaar_core::{NotificationKind, OrderStatus};
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_promotes_once_after_window() {
        let (market, clock) = market().await;
        let order = buy(&market, "buyer", "seller", 40_000).await;
        let (_scheduler, handle) = market.order_scheduler(SchedulerConfig::default());

        clock.advance(ChronoDuration::days(3));
        let report = handle.trigger().await.unwrap().unwrap();
        assert_eq!(report.promoted, 0, "withdrawable_at is exclusive");

        clock.advance(ChronoDuration::seconds(1));
        let report = handle.trigger().await.unwrap().unwrap();
        assert_eq!(report.promoted, 1);

        let promoted = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(promoted.status, OrderStatus::ReadyForWithdrawal);
        assert!(promoted.can_withdraw);

        let again = handle.trigger().await.unwrap().unwrap();
        assert_eq!(again, SweepReport::default());

        let inbox = market.notifications().list("seller", false).await.unwrap();
        let ready: Vec<_> = inbox
            .iter()
            .filter(|n| n.kind == NotificationKind::OrderReadyForWithdrawal)
            .collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].metadata["amount"], 40_000);
        assert_eq!(ready[0].action_url.as_deref(), Some("/orders/sold"));
    }

    #[tokio::test]
    async fn test_reported_orders_stay() {
        let (market, clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;
        market
            .reports()
            .create_report(
                "buyer",
                crate::NewReport {
                    order_id: order.id.clone(),
                    product_id: order.items[0].product_id.clone(),
                    reason: "Not as described".to_string(),
                    evidence_urls: Vec::new(),
                },
            )
            .await
            .unwrap();
        let (_scheduler, handle) = market.order_scheduler(SchedulerConfig::default());

        clock.advance(ChronoDuration::days(10));
        let report = handle.trigger().await.unwrap().unwrap();
        assert_eq!(report.due, 0);
    }

    #[test]
    fn test_one_notification_per_seller() {
        use bazaar_core::{OrderItem, PaymentMethod};
        let now = chrono::Utc::now();
        let item = |seller: &str, cents: i64| OrderItem {
            id: format!("i-{seller}-{cents}"),
            order_id: "o1".to_string(),
            product_id: format!("p-{seller}-{cents}"),
            product_title: "Course".to_string(),
            quantity: 1,
            unit_price_cents: cents,
            subtotal_cents: cents,
            seller_id: seller.to_string(),
        };
        let order = Order {
            id: "o1".to_string(),
            buyer_id: "buyer".to_string(),
            total_cents: 600,
            status: OrderStatus::Completed,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items: vec![item("a", 100), item("b", 200), item("a", 300)],
            can_withdraw: false,
            withdrawable_at: now,
            report_id: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let notes = seller_notifications(&order);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].user_id, "a");
        assert_eq!(notes[0].metadata["amount"], 400);
        assert_eq!(notes[1].metadata["amount"], 200);
    }

    #[tokio::test]
    async fn test_run_sweeps_until_shutdown() {
        let (market, clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;
        clock.advance(ChronoDuration::days(4));

        let (scheduler, handle) = market.order_scheduler(SchedulerConfig {
            interval: Duration::from_millis(20),
            ..Default::default()
        });
        let task = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        let promoted = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(promoted.status, OrderStatus::ReadyForWithdrawal);
    }
}
