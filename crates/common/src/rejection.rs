//! Rejected bid records for analytics.

use derive_more::Display;
use serde::Serialize;

use crate::openrtb::Bid;

/// Why a bid was taken out of the auction.
#[derive(Debug, Clone, Copy, Display, Serialize, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    #[display("bid price below auction floor")]
    BelowAuctionFloor,
    #[display("bid price below deal floor")]
    BelowDealFloor,
    #[display("advertiser blocked")]
    AdvertiserBlocked,
}

/// A bid removed by a post-auction stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RejectedBid {
    pub bid: Bid,
    pub seat: String,
    pub reason: RejectionReason,
    /// Human readable `bid rejected [bid ID: ..] reason: ..` line.
    pub message: String,
}

impl RejectedBid {
    #[must_use]
    pub fn new(bid: Bid, seat: &str, reason: RejectionReason, detail: &str) -> Self {
        let message = rejection_message(&bid.id, detail);
        Self {
            bid,
            seat: seat.to_string(),
            reason,
            message,
        }
    }
}

#[must_use]
pub fn rejection_message(bid_id: &str, detail: &str) -> String {
    format!("bid rejected [bid ID: {bid_id}] reason: {detail}")
}

/// Request-scoped, append-only collection of rejected bids.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RejectionLog {
    entries: Vec<RejectedBid>,
}

impl RejectionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rejected: RejectedBid) {
        self.entries.push(rejected);
    }

    pub fn extend(&mut self, rejected: impl IntoIterator<Item = RejectedBid>) {
        self.entries.extend(rejected);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RejectedBid> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_bid_message_shape() {
        let bid = Bid {
            id: "bid-1".to_string(),
            ..Bid::default()
        };
        let rejected = RejectedBid::new(
            bid,
            "appnexus",
            RejectionReason::AdvertiserBlocked,
            "Bid (From 'appnexus') belongs to blocked advertiser 'a.com'",
        );

        assert_eq!(
            rejected.message,
            "bid rejected [bid ID: bid-1] reason: Bid (From 'appnexus') belongs to blocked advertiser 'a.com'"
        );
        assert_eq!(rejected.seat, "appnexus");
    }

    #[test]
    fn test_rejection_log_is_append_only_in_order() {
        let mut log = RejectionLog::new();
        assert!(log.is_empty());

        for id in ["a", "b"] {
            log.push(RejectedBid::new(
                Bid {
                    id: id.to_string(),
                    ..Bid::default()
                },
                "seat",
                RejectionReason::BelowAuctionFloor,
                "floor",
            ));
        }
        log.extend(vec![RejectedBid::new(
            Bid {
                id: "c".to_string(),
                ..Bid::default()
            },
            "seat",
            RejectionReason::BelowDealFloor,
            "deal floor",
        )]);

        let ids: Vec<&str> = log.iter().map(|r| r.bid.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.iter().last().map(|r| r.message.as_str()),
            Some("bid rejected [bid ID: c] reason: deal floor")
        );
    }
}
