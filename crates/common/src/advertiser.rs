//! Advertiser domain blocking for tag/VAST bidders.
//!
//! Matching is public-suffix aware, case-insensitive and subdomain aware.
//! Standard RTB seats are never filtered here.

use crate::constants::BIDDER_VAST_TAG;
use crate::domain::normalize_domain;
use crate::openrtb::{Bid, SeatBids};
use crate::rejection::{RejectedBid, RejectionReason};

/// Result of the advertiser stage.
#[derive(Debug, Default)]
pub struct AdvertiserBlocking {
    pub seat_bids: SeatBids,
    pub rejected: Vec<RejectedBid>,
}

/// Normalize a publisher block list, dropping entries that fail or come
/// out empty. Request order is kept.
#[must_use]
pub fn normalize_block_list(blocked_domains: &[String]) -> Vec<String> {
    blocked_domains
        .iter()
        .filter_map(|raw| match normalize_domain(raw) {
            Ok(domain) if !domain.is_empty() => Some(domain),
            Ok(_) => None,
            Err(report) => {
                log::debug!("Ignoring blocked advertiser '{}': {}", raw, report);
                None
            }
        })
        .collect()
}

/// Remove tag-bidder bids whose advertiser matches the block list.
#[must_use]
pub fn block_advertisers(
    blocked_domains: &[String],
    mut seat_bids: SeatBids,
) -> AdvertiserBlocking {
    let blocked = normalize_block_list(blocked_domains);
    if blocked.is_empty() {
        return AdvertiserBlocking {
            seat_bids,
            rejected: Vec::new(),
        };
    }

    let mut rejected = Vec::new();
    for (seat_name, seat) in &mut seat_bids {
        if seat.core_bidder_name != BIDDER_VAST_TAG {
            continue;
        }

        for index in (0..seat.bids.len()).rev() {
            let Some(domain) = blocked_match(&seat.bids[index], &blocked) else {
                continue;
            };
            let bid = seat.bids.remove(index);
            let detail =
                format!("Bid (From '{seat_name}') belongs to blocked advertiser '{domain}'");
            log::info!("Rejecting bid {}: {}", bid.id, detail);
            rejected.push(RejectedBid::new(
                bid,
                seat_name,
                RejectionReason::AdvertiserBlocked,
                &detail,
            ));
        }
    }

    AdvertiserBlocking {
        seat_bids,
        rejected,
    }
}

/// First blocked domain that matches the bid, if any.
fn blocked_match<'a>(bid: &Bid, blocked: &'a [String]) -> Option<&'a str> {
    blocked
        .iter()
        .find(|b| {
            // Unknown advertiser under an active block list.
            bid.advertiser_domains.is_empty()
                || bid
                    .advertiser_domains
                    .iter()
                    .any(|raw| domain_matches(raw, b))
        })
        .map(String::as_str)
}

fn domain_matches(raw: &str, blocked: &str) -> bool {
    let Ok(domain) = normalize_domain(raw) else {
        return false;
    };
    if domain.is_empty() {
        return !blocked.is_empty();
    }
    domain == blocked || domain.ends_with(&format!(".{blocked}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::SeatBid;
    use crate::test_support::tests::{bid, seat};

    fn tag_bid(id: &str, domains: &[&str]) -> Bid {
        Bid {
            advertiser_domains: domains.iter().map(|d| (*d).to_string()).collect(),
            ..bid(id, "imp-1", 1.0)
        }
    }

    fn vast_seat(name: &str, bids: Vec<Bid>) -> SeatBid {
        SeatBid {
            core_bidder_name: BIDDER_VAST_TAG.to_string(),
            ..seat(name, "USD", bids)
        }
    }

    fn blocked(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| (*d).to_string()).collect()
    }

    fn remaining(outcome: &AdvertiserBlocking, seat: &str) -> Vec<String> {
        outcome.seat_bids[seat].bids.iter().map(|b| b.id.clone()).collect()
    }

    #[test]
    fn test_subdomain_suffix_matching() {
        let seat_bids = SeatBids::from([(
            "spotx".to_string(),
            vast_seat(
                "spotx",
                vec![
                    tag_bid("keep", &["b.a.com.shri.com"]),
                    tag_bid("block", &["b.a.com.a.com.b.c.d.a.com"]),
                    tag_bid("exact", &["https://www.A.com/landing"]),
                ],
            ),
        )]);

        let outcome = block_advertisers(&blocked(&["a.com"]), seat_bids);

        assert_eq!(remaining(&outcome, "spotx"), vec!["keep"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == RejectionReason::AdvertiserBlocked));
        assert_eq!(
            outcome.rejected[0].message,
            "bid rejected [bid ID: exact] reason: Bid (From 'spotx') belongs to blocked advertiser 'a.com'"
        );
    }

    #[test]
    fn test_rtb_seats_are_never_filtered() {
        let seat_bids = SeatBids::from([(
            "appnexus".to_string(),
            seat("appnexus", "USD", vec![tag_bid("bid-1", &["a.com"])]),
        )]);

        let outcome = block_advertisers(&blocked(&["a.com"]), seat_bids);

        assert_eq!(remaining(&outcome, "appnexus"), vec!["bid-1"]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_bid_without_advertiser_is_blocked() {
        let seat_bids = SeatBids::from([(
            "spotx".to_string(),
            vast_seat("spotx", vec![tag_bid("bid-1", &[])]),
        )]);

        let outcome = block_advertisers(&blocked(&["a.com"]), seat_bids);

        assert!(outcome.seat_bids["spotx"].bids.is_empty());
        assert_eq!(outcome.rejected[0].bid.id, "bid-1");
    }

    #[test]
    fn test_empty_or_unusable_block_list_is_noop() {
        let seat_bids = SeatBids::from([(
            "spotx".to_string(),
            vast_seat("spotx", vec![tag_bid("bid-1", &[])]),
        )]);

        let outcome = block_advertisers(&blocked(&["", "co.in", "com"]), seat_bids);

        assert_eq!(remaining(&outcome, "spotx"), vec!["bid-1"]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_unparsable_advertiser_domain_is_skipped() {
        let seat_bids = SeatBids::from([(
            "spotx".to_string(),
            vast_seat("spotx", vec![tag_bid("bid-1", &["co.uk", "good.org"])]),
        )]);

        let outcome = block_advertisers(&blocked(&["a.com"]), seat_bids);

        assert_eq!(remaining(&outcome, "spotx"), vec!["bid-1"]);
    }

    #[test]
    fn test_first_blocked_domain_wins() {
        let seat_bids = SeatBids::from([(
            "spotx".to_string(),
            vast_seat("spotx", vec![tag_bid("bid-1", &["x.b.com", "a.com"])]),
        )]);

        let outcome = block_advertisers(&blocked(&["a.com", "b.com"]), seat_bids);

        assert!(outcome.rejected[0]
            .message
            .ends_with("belongs to blocked advertiser 'a.com'"));
    }

    #[test]
    fn test_normalize_block_list_keeps_order() {
        let list = normalize_block_list(&blocked(&["www.Z.com", "co.in", "a.org", " "]));
        assert_eq!(list, vec!["z.com", "a.org"]);
    }
}
