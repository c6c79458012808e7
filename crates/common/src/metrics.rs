//! Fire-and-forget stats counters.
//!
//! The pipeline only ever increments. Publishing is owned by an external
//! batching client that drains [`QueuedMetrics`]; a full queue drops the event
//! rather than slowing the request down.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::openrtb::CreativeType;
use crate::rejection::RejectionReason;

/// Counter sink used by the post-auction stages.
pub trait MetricsEngine: Send + Sync {
    fn record_rejected_bid(&self, seat: &str, reason: RejectionReason);
    fn record_deal_bid(&self, seat: &str, deal_id: &str);
    fn record_currency_conversion_error(&self, from: &str, to: &str);
    fn record_injection_error(&self, seat: &str, creative_type: CreativeType);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsEngine for NoopMetrics {
    fn record_rejected_bid(&self, _seat: &str, _reason: RejectionReason) {}
    fn record_deal_bid(&self, _seat: &str, _deal_id: &str) {}
    fn record_currency_conversion_error(&self, _from: &str, _to: &str) {}
    fn record_injection_error(&self, _seat: &str, _creative_type: CreativeType) {}
}

/// A single counter increment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatsEvent {
    RejectedBid {
        seat: String,
        reason: RejectionReason,
    },
    DealBid {
        seat: String,
        deal_id: String,
    },
    CurrencyConversionError {
        from: String,
        to: String,
    },
    InjectionError {
        seat: String,
        creative_type: CreativeType,
    },
}

/// Bounded queue in front of the stats publisher.
#[derive(Debug)]
pub struct QueuedMetrics {
    sender: Sender<StatsEvent>,
    dropped: AtomicU64,
}

impl QueuedMetrics {
    /// Create the sink and the receiver the publisher drains.
    ///
    /// `queue_size` is clamped to at least one slot.
    #[must_use]
    pub fn new(queue_size: usize) -> (Self, Receiver<StatsEvent>) {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Events discarded because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn publish(&self, event: StatsEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Stats queue full, dropping {:?}", event);
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl MetricsEngine for QueuedMetrics {
    fn record_rejected_bid(&self, seat: &str, reason: RejectionReason) {
        self.publish(StatsEvent::RejectedBid {
            seat: seat.to_string(),
            reason,
        });
    }

    fn record_deal_bid(&self, seat: &str, deal_id: &str) {
        self.publish(StatsEvent::DealBid {
            seat: seat.to_string(),
            deal_id: deal_id.to_string(),
        });
    }

    fn record_currency_conversion_error(&self, from: &str, to: &str) {
        self.publish(StatsEvent::CurrencyConversionError {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn record_injection_error(&self, seat: &str, creative_type: CreativeType) {
        self.publish(StatsEvent::InjectionError {
            seat: seat.to_string(),
            creative_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_metrics_delivers_events() {
        let (metrics, mut receiver) = QueuedMetrics::new(4);

        metrics.record_rejected_bid("appnexus", RejectionReason::BelowAuctionFloor);
        metrics.record_deal_bid("pubmatic", "deal-1");

        assert_eq!(
            receiver.try_recv().expect("first event"),
            StatsEvent::RejectedBid {
                seat: "appnexus".to_string(),
                reason: RejectionReason::BelowAuctionFloor,
            }
        );
        assert_eq!(
            receiver.try_recv().expect("second event"),
            StatsEvent::DealBid {
                seat: "pubmatic".to_string(),
                deal_id: "deal-1".to_string(),
            }
        );
        assert_eq!(metrics.dropped(), 0);
    }

    #[test]
    fn test_queued_metrics_drops_when_full() {
        let (metrics, mut receiver) = QueuedMetrics::new(1);

        metrics.record_currency_conversion_error("EUR", "USD");
        metrics.record_currency_conversion_error("JPY", "USD");
        metrics.record_injection_error("pubmatic", CreativeType::Video);

        assert_eq!(metrics.dropped(), 2, "overflowing events are dropped");
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err(), "only one event was queued");
    }

    #[test]
    fn test_queued_metrics_counts_closed_queue_as_dropped() {
        let (metrics, receiver) = QueuedMetrics::new(2);
        drop(receiver);

        metrics.record_deal_bid("pubmatic", "deal-1");
        assert_eq!(metrics.dropped(), 1);
    }
}
