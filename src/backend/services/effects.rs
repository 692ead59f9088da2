// src/backend/services/effects.rs
use crate::adapter::{Clock, EffectJournal, Metering, Notifier, OrderLedger, PickupCache};
use crate::models::{Order, OrderId, PickupEffectRecord, UsageEventType};
use std::rc::Rc;

/// Counts from one dispatch round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub delivered: u32,
    pub failed: u32,
}

impl EffectReport {
    fn absorb(&mut self, other: EffectReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Post-pickup notifications, metering and cache invalidation.
///
/// The order's journal row is written as pending before any effect runs and
/// updated as effects land, so re-emitting only performs what is still
/// pending. Failures are logged and left for the maintenance retry; they
/// never reach the pickup outcome.
pub struct PickupEffects {
    ledger: Rc<dyn OrderLedger>,
    notifier: Rc<dyn Notifier>,
    metering: Rc<dyn Metering>,
    cache: Rc<dyn PickupCache>,
    journal: Rc<dyn EffectJournal>,
    clock: Rc<dyn Clock>,
}

impl PickupEffects {
    pub fn new(
        ledger: Rc<dyn OrderLedger>,
        notifier: Rc<dyn Notifier>,
        metering: Rc<dyn Metering>,
        cache: Rc<dyn PickupCache>,
        journal: Rc<dyn EffectJournal>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            notifier,
            metering,
            cache,
            journal,
            clock,
        }
    }

    pub async fn emit(&self, order: &Order) -> EffectReport {
        let mut report = EffectReport::default();
        let Some(collected_by) = order.collected_by else {
            log_error!("EFFECTS: order {} has no collector recorded", order.order_id);
            report.failed += 1;
            return report;
        };
        let mut record = match self.journal.load(order.order_id).await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                log_error!("EFFECTS: journal unavailable for order {}: {}", order.order_id, e);
                PickupEffectRecord::default()
            }
        };
        if record.is_complete() {
            return report;
        }
        record.attempts = record.attempts.saturating_add(1);
        record.last_attempt_at = Some(self.clock.now());
        // Pending row goes in before any effect runs.
        if let Err(e) = self.journal.store(order.order_id, &record).await {
            log_error!("EFFECTS: failed to mark order {} pending: {}", order.order_id, e);
        }

        if !record.customer_notified {
            let message = if collected_by == order.customer_id {
                format!("Your package {} was picked up.", order.vendor_reference)
            } else {
                format!(
                    "Your package {} was picked up by your trusted contact.",
                    order.vendor_reference
                )
            };
            record.customer_notified = self
                .attempt(order.order_id, "customer notification", &mut report, async {
                    self.notifier
                        .notify(order.customer_id, Some(order.order_id), message)
                        .await
                })
                .await;
        }

        if !record.collector_notified {
            record.collector_notified = if collected_by == order.customer_id {
                true
            } else {
                let message = format!("You picked up package {}.", order.vendor_reference);
                self.attempt(order.order_id, "collector notification", &mut report, async {
                    self.notifier
                        .notify(collected_by, Some(order.order_id), message)
                        .await
                })
                .await
            };
        }

        if !record.usage_recorded {
            record.usage_recorded = self
                .attempt(order.order_id, "usage event", &mut report, async {
                    self.metering
                        .record_event(order.order_id, UsageEventType::PackagePickedUp, 1)
                        .await
                })
                .await;
        }

        if !record.cache_invalidated {
            record.cache_invalidated = self
                .attempt(order.order_id, "cache invalidation", &mut report, async {
                    self.cache.invalidate(order.customer_id).await
                })
                .await;
        }

        if let Err(e) = self.journal.store(order.order_id, &record).await {
            log_error!("EFFECTS: failed to journal order {}: {}", order.order_id, e);
        }
        report
    }

    /// Re-emits effects still pending for up to `limit` orders.
    pub async fn retry_pending(&self, limit: usize) -> EffectReport {
        let mut total = EffectReport::default();
        let pending: Vec<OrderId> = match self.journal.incomplete(limit).await {
            Ok(pending) => pending,
            Err(e) => {
                log_error!("EFFECTS: cannot list pending effects: {}", e);
                return total;
            }
        };
        for order_id in pending {
            match self.ledger.find_order(order_id).await {
                Ok(Some(order)) => total.absorb(self.emit(&order).await),
                Ok(None) => log_warn!("EFFECTS: journaled order {} no longer exists", order_id),
                Err(e) => {
                    log_warn!("EFFECTS: cannot load order {} for retry: {}", order_id, e);
                    total.failed += 1;
                }
            }
        }
        total
    }

    pub async fn record(&self, order_id: OrderId) -> Option<PickupEffectRecord> {
        self.journal.load(order_id).await.ok().flatten()
    }

    async fn attempt<F>(&self, order_id: OrderId, what: &str, report: &mut EffectReport, effect: F) -> bool
    where
        F: std::future::Future<Output = Result<(), crate::error::LockerError>>,
    {
        match effect.await {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(e) => {
                log_warn!("EFFECTS: {} failed for order {}: {}", what, order_id, e);
                report.failed += 1;
                false
            }
        }
    }
}
