//! # Notification Dispatcher
//!
//! Delivers recorded notifications to an external channel.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    notifications table (outbox)                         │
//! │                                                                         │
//! │  id | user_id | kind               | attempts | dispatched_at           │
//! │  ───┼─────────┼────────────────────┼──────────┼──────────────           │
//! │  a  │ seller  │ report_created     │ 0        │ NULL                    │
//! │  b  │ buyer   │ report_rejected    │ 3        │ NULL                    │
//! │  c  │ seller  │ withdrawal_approved│ 1        │ 2024-03-04T…            │
//! └────────────────────────────┬────────────────────────────────────────────┘
//!                              │ poll: dispatched_at IS NULL AND attempts < 10
//!                              ▼
//!              NotificationDispatcher ──► sink.deliver() (bounded timeout)
//!                              │
//!                ok ───────────┴────────── error / timeout
//!         mark_dispatched                  mark_failed (attempts += 1)
//! ```
//!
//! Rows that reach [`MAX_DELIVERY_ATTEMPTS`] stay in the inbox but are no
//! longer delivered.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bazaar_core::Notification;
use bazaar_db::Database;

use crate::clock::Clock;
use crate::error::MarketResult;

// =============================================================================
// Constants
// =============================================================================

/// Delivery attempts before a notification is skipped.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 10;

// =============================================================================
// Sink
// =============================================================================

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Where notifications go (push, email, websocket, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Emits each notification as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            target: "bazaar::notifications",
            id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            title = %notification.title,
            action_url = notification.action_url.as_deref().unwrap_or(""),
            "Notification delivered"
        );
        Ok(())
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Upper bound for one `deliver` call.
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            delivery_timeout: Duration::from_millis(3000),
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Polls the outbox and hands rows to a [`NotificationSink`].
pub struct NotificationDispatcher {
    db: Database,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    config: DispatcherConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct NotificationDispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl NotificationDispatcherHandle {
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Notification dispatcher already stopped");
        }
    }
}

impl NotificationDispatcher {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        config: DispatcherConfig,
    ) -> (Self, NotificationDispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let dispatcher = NotificationDispatcher {
            db,
            clock,
            sink,
            config,
            shutdown_rx,
        };
        (dispatcher, NotificationDispatcherHandle { shutdown_tx })
    }

    /// Runs the poll loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Notification dispatcher starting"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_once().await {
                        error!(error = %e, "Failed to dispatch notifications");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Notification dispatcher stopped");
    }

    /// Delivers one batch of undelivered notifications.
    pub async fn dispatch_once(&self) -> MarketResult<DispatchReport> {
        let pending = self
            .db
            .notifications()
            .fetch_undelivered(MAX_DELIVERY_ATTEMPTS, self.config.batch_size)
            .await?;

        let mut report = DispatchReport::default();
        if pending.is_empty() {
            return Ok(report);
        }
        debug!(count = pending.len(), "Dispatching notifications");

        let repo = self.db.notifications();
        for notification in &pending {
            let outcome = tokio::time::timeout(self.config.delivery_timeout, self.sink.deliver(notification)).await;

            let failure = match outcome {
                Ok(Ok(())) => {
                    repo.mark_dispatched(&notification.id, self.clock.now()).await?;
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("delivery timed out after {}ms", self.config.delivery_timeout.as_millis()),
            };

            report.failed += 1;
            repo.mark_failed(&notification.id, &failure).await?;

            let attempts = notification.attempts + 1;
            if attempts >= i64::from(MAX_DELIVERY_ATTEMPTS) {
                warn!(
                    id = %notification.id,
                    user_id = %notification.user_id,
                    attempts,
                    error = %failure,
                    "Giving up on notification"
                );
            } else {
                debug!(id = %notification.id, attempts, error = %failure, "Notification delivery failed");
            }
        }

        if report.failed > 0 {
            warn!(delivered = report.delivered, failed = report.failed, "Notification batch had failures");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::market;
    use bazaar_core::{NewNotification, NotificationKind};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records deliveries; fails while `failing` is set.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
        failing: Mutex<bool>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
            if *self.failing.lock().unwrap() {
                return Err(DeliveryError("push gateway unavailable".to_string()));
            }
            self.delivered.lock().unwrap().push(notification.id.clone());
            Ok(())
        }
    }

    struct StuckSink;

    #[async_trait]
    impl NotificationSink for StuckSink {
        async fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn note(user: &str) -> NewNotification {
        NewNotification {
            user_id: user.to_string(),
            kind: NotificationKind::ReportCreated,
            title: "Your product has been reported".to_string(),
            message: "Buyer reported order #1".to_string(),
            action_url: Some("/reports/r1".to_string()),
            metadata: json!({ "reportId": "r1" }),
        }
    }

    #[tokio::test]
    async fn test_delivers_each_notification_once() {
        let (market, _clock) = market().await;
        market.notifier().send(vec![note("a"), note("b")]).await;

        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _handle) = market.notification_dispatcher(sink.clone(), DispatcherConfig::default());

        let report = dispatcher.dispatch_once().await.unwrap();
        assert_eq!(report, DispatchReport { delivered: 2, failed: 0 });
        let again = dispatcher.dispatch_once().await.unwrap();
        assert_eq!(again, DispatchReport::default());
        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_retry_until_limit() {
        let (market, _clock) = market().await;
        market.notifier().send(vec![note("a")]).await;

        let sink = Arc::new(RecordingSink::default());
        *sink.failing.lock().unwrap() = true;
        let (dispatcher, _handle) = market.notification_dispatcher(sink.clone(), DispatcherConfig::default());

        for _ in 0..MAX_DELIVERY_ATTEMPTS {
            let report = dispatcher.dispatch_once().await.unwrap();
            assert_eq!(report.failed, 1);
        }
        *sink.failing.lock().unwrap() = false;
        assert_eq!(dispatcher.dispatch_once().await.unwrap(), DispatchReport::default());

        let inbox = market.notifications().list("a", false).await.unwrap();
        assert_eq!(inbox[0].attempts, i64::from(MAX_DELIVERY_ATTEMPTS));
        assert!(inbox[0].last_error.as_deref().unwrap().contains("push gateway unavailable"));
        assert!(inbox[0].dispatched_at.is_none());
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let (market, _clock) = market().await;
        market.notifier().send(vec![note("a")]).await;

        let config = DispatcherConfig {
            delivery_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let (dispatcher, _handle) = market.notification_dispatcher(Arc::new(StuckSink), config);

        let report = dispatcher.dispatch_once().await.unwrap();
        assert_eq!(report.failed, 1);
        let inbox = market.notifications().list("a", false).await.unwrap();
        assert!(inbox[0].last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let (market, _clock) = market().await;
        market.notifier().send(vec![note("a")]).await;
        let (dispatcher, handle) = market.notification_dispatcher(Arc::new(LogSink), DispatcherConfig::default());

        assert_eq!(dispatcher.dispatch_once().await.unwrap().delivered, 1);
        let task = tokio::spawn(dispatcher.run());
        handle.shutdown().await;
        task.await.unwrap();
    }
}
