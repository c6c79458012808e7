//! Per-bid floor enforcement.

use std::collections::HashMap;

use error_stack::Report;

use crate::constants::USD;
use crate::context::ImpressionFloor;
use crate::currency::{conversion_rate, RateConverter};
use crate::error::ExchangeError;
use crate::metrics::MetricsEngine;
use crate::openrtb::{Bid, BidFloors, SeatBid, SeatBids};
use crate::rejection::{RejectedBid, RejectionReason};

/// Result of running the floor stage over all seats.
#[derive(Debug, Default)]
pub struct FloorEnforcement {
    /// Seats with sub-floor bids removed, original bid order preserved.
    pub seat_bids: SeatBids,
    /// Per-bid conversion failures. Each one dropped its bid.
    pub errors: Vec<Report<ExchangeError>>,
    pub rejected: Vec<RejectedBid>,
}

/// Remove bids priced below their impression floor.
///
/// Deal bids bypass every check unless `enforce_deal_floors` is set. Bids
/// whose impression has no floor record pass. Prices are converted from the
/// seat currency into the floor currency and compared without tolerance:
/// a bid is rejected iff `floor_price > rate * price`.
#[must_use]
pub fn enforce_floors(
    impression_floors: &HashMap<String, ImpressionFloor>,
    seat_bids: SeatBids,
    converter: &dyn RateConverter,
    metrics: &dyn MetricsEngine,
    enforce_deal_floors: bool,
) -> FloorEnforcement {
    let mut outcome = FloorEnforcement::default();

    for (seat_name, seat) in seat_bids {
        let mut eligible = Vec::with_capacity(seat.bids.len());

        for bid in &seat.bids {
            match check_bid(
                impression_floors,
                &seat_name,
                &seat,
                bid,
                converter,
                enforce_deal_floors,
            ) {
                Verdict::Keep => eligible.push(bid.clone()),
                Verdict::Reject(reason, detail) => {
                    log::info!(
                        "Rejecting bid {} from '{}': {}",
                        bid.id,
                        seat_name,
                        detail
                    );
                    outcome
                        .rejected
                        .push(RejectedBid::new(bid.clone(), &seat_name, reason, &detail));
                }
                Verdict::Drop(error, floor_currency) => {
                    metrics.record_currency_conversion_error(&seat.currency, &floor_currency);
                    log::warn!("Dropping bid {} from '{}': {}", bid.id, seat_name, error);
                    outcome.errors.push(error);
                }
            }
        }

        let filtered = seat.with_bids(eligible);
        outcome.seat_bids.insert(seat_name, filtered);
    }

    outcome
}

enum Verdict {
    Keep,
    Reject(RejectionReason, String),
    Drop(Report<ExchangeError>, String),
}

fn check_bid(
    impression_floors: &HashMap<String, ImpressionFloor>,
    seat_name: &str,
    seat: &SeatBid,
    bid: &Bid,
    converter: &dyn RateConverter,
    enforce_deal_floors: bool,
) -> Verdict {
    if bid.deal_id().is_some() && !enforce_deal_floors {
        return Verdict::Keep;
    }

    let Some(floor) = impression_floors.get(&bid.imp_id) else {
        log::debug!(
            "No floor record for impression '{}', passing bid {}",
            bid.imp_id,
            bid.id
        );
        return Verdict::Keep;
    };

    let floor_currency = if floor.floor_currency.is_empty() {
        USD
    } else {
        floor.floor_currency.as_str()
    };

    let rate = match conversion_rate(converter, &seat.currency, floor_currency) {
        Ok(rate) => rate,
        Err(report) => {
            let message = format!(
                "error in rate conversion from = {} to {} with bidder {} for impression id {} and bid id {}",
                seat.currency, floor_currency, seat_name, bid.imp_id, bid.id
            );
            return Verdict::Drop(
                report.change_context(ExchangeError::CurrencyConversion { message }),
                floor_currency.to_string(),
            );
        }
    };

    let converted_price = rate * bid.price;
    if floor.floor_price > converted_price {
        let reason = if bid.deal_id().is_some() {
            RejectionReason::BelowDealFloor
        } else {
            RejectionReason::BelowAuctionFloor
        };
        let detail = format!(
            "bid price value {:.4} {} is less than bidFloor value {:.4} {} for impression id {} bidder {}",
            converted_price,
            floor_currency,
            floor.floor_price,
            floor_currency,
            bid.imp_id,
            seat_name
        );
        return Verdict::Reject(reason, detail);
    }

    Verdict::Keep
}

/// Attach floor provenance to every bid whose impression carries a floor rule.
///
/// Runs whether or not enforcement did, so analytics can see the floors that
/// were computed for the request.
#[must_use]
pub fn annotate_floor_provenance(
    impression_floors: &HashMap<String, ImpressionFloor>,
    mut seat_bids: SeatBids,
) -> SeatBids {
    for seat in seat_bids.values_mut() {
        for bid in &mut seat.bids {
            let Some(floor) = impression_floors.get(&bid.imp_id) else {
                continue;
            };
            if let Some(rule) = &floor.rule {
                bid.ext.floors = Some(BidFloors {
                    floor_rule: rule.floor_rule.clone(),
                    floor_rule_value: rule.floor_rule_value,
                    floor_value: rule.floor_value,
                    floor_currency: floor.floor_currency.clone(),
                });
            }
        }
    }
    seat_bids
}
