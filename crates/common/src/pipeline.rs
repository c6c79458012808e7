//! Post-auction pipeline: floors, advertiser blocking, winner selection,
//! trackers and creative injection.
//!
//! Each stage takes the seat bids by value and hands back a new set, so the
//! stages can be tested on their own and nothing is mutated behind the
//! caller's back. Per-bid failures are collected on the outcome and never
//! abort the request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use derive_more::Display;
use error_stack::Report;
use rand::Rng;
use serde::Serialize;

use crate::advertiser::block_advertisers;
use crate::context::RequestContext;
use crate::creative::inject_trackers;
use crate::currency::RateConverter;
use crate::error::ExchangeError;
use crate::floors::{annotate_floor_provenance, enforce_floors, FloorDecision};
use crate::metrics::MetricsEngine;
use crate::openrtb::SeatBids;
use crate::rejection::{RejectedBid, RejectionLog};
use crate::settings::Settings;
use crate::tracker::{build_trackers, OwTracker, TrackerKey};

/// Pipeline progress. A request always reaches [`Stage::Final`].
#[derive(Debug, Clone, Copy, Display, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Collected,
    FloorChecked,
    AdvertiserChecked,
    WinnersSelected,
    Tracked,
    Injected,
    Final,
}

/// Picks the bids that go on to tracking and injection.
pub trait WinnerSelector: Send + Sync {
    fn select(&self, seat_bids: SeatBids) -> SeatBids;
}

/// Best price per impression across all seats. The first bid seen wins a
/// tie, seats being visited in name order.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighestPricePerImpression;

impl WinnerSelector for HighestPricePerImpression {
    fn select(&self, seat_bids: SeatBids) -> SeatBids {
        let winners: HashSet<(String, usize)> = {
            let mut best: HashMap<&str, (&str, usize, f64)> = HashMap::new();
            for (seat_name, seat) in &seat_bids {
                for (index, bid) in seat.bids.iter().enumerate() {
                    let replace = best
                        .get(bid.imp_id.as_str())
                        .is_none_or(|(_, _, price)| bid.price > *price);
                    if replace {
                        best.insert(bid.imp_id.as_str(), (seat_name.as_str(), index, bid.price));
                    }
                }
            }
            best.into_values()
                .map(|(seat_name, index, _)| (seat_name.to_string(), index))
                .collect()
        };

        seat_bids
            .into_iter()
            .map(|(seat_name, seat)| {
                let bids = seat
                    .bids
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| winners.contains(&(seat_name.clone(), *index)))
                    .map(|(_, bid)| bid.clone())
                    .collect();
                let filtered = seat.with_bids(bids);
                (seat_name, filtered)
            })
            .collect()
    }
}

/// Keeps every bid.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllBids;

impl WinnerSelector for AllBids {
    fn select(&self, seat_bids: SeatBids) -> SeatBids {
        seat_bids
    }
}

/// What the pipeline produced for one request.
#[derive(Debug)]
pub struct PostAuctionOutcome {
    pub stage: Stage,
    pub seat_bids: SeatBids,
    pub trackers: HashMap<TrackerKey, OwTracker>,
    pub rejections: RejectionLog,
    pub errors: Vec<Report<ExchangeError>>,
}

impl PostAuctionOutcome {
    fn new(seat_bids: SeatBids) -> Self {
        Self {
            stage: Stage::Collected,
            seat_bids,
            trackers: HashMap::new(),
            rejections: RejectionLog::new(),
            errors: Vec::new(),
        }
    }

    fn advance(&mut self, stage: Stage) {
        log::debug!("Post-auction stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    #[must_use]
    pub fn bid_count(&self) -> usize {
        self.seat_bids.values().map(|seat| seat.bids.len()).sum()
    }
}

/// Runs the post-auction stages for a request.
pub struct ResponsePostProcessor {
    settings: Settings,
    converter: Arc<dyn RateConverter + Send + Sync>,
    metrics: Arc<dyn MetricsEngine>,
    selector: Arc<dyn WinnerSelector>,
}

impl ResponsePostProcessor {
    pub fn new(
        settings: Settings,
        converter: Arc<dyn RateConverter + Send + Sync>,
        metrics: Arc<dyn MetricsEngine>,
        selector: Arc<dyn WinnerSelector>,
    ) -> Self {
        Self {
            settings,
            converter,
            metrics,
            selector,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run every stage over the bids collected for `ctx`.
    pub fn process<R: Rng>(
        &self,
        ctx: &RequestContext,
        seat_bids: SeatBids,
        rng: &mut R,
    ) -> PostAuctionOutcome {
        let mut outcome = PostAuctionOutcome::new(seat_bids);
        log::debug!(
            "Collected {} bids from {} seats for publisher {}",
            outcome.bid_count(),
            outcome.seat_bids.len(),
            ctx.pub_id
        );
        self.record_deal_bids(&outcome.seat_bids);

        self.check_floors(ctx, &mut outcome, rng);
        outcome.advance(Stage::FloorChecked);

        let blocking = block_advertisers(
            &ctx.blocked_advertisers,
            std::mem::take(&mut outcome.seat_bids),
        );
        outcome.seat_bids = blocking.seat_bids;
        self.reject(&mut outcome, blocking.rejected);
        outcome.advance(Stage::AdvertiserChecked);

        outcome.seat_bids = self
            .selector
            .select(std::mem::take(&mut outcome.seat_bids));
        outcome.advance(Stage::WinnersSelected);

        let build = build_trackers(ctx, &outcome.seat_bids, &self.settings);
        outcome.trackers = build.trackers;
        outcome.errors.extend(build.errors);
        outcome.advance(Stage::Tracked);

        self.inject(ctx, &mut outcome);
        outcome.advance(Stage::Injected);

        log::info!(
            "Post-auction processing done: {} bids kept, {} rejected, {} errors",
            outcome.bid_count(),
            outcome.rejections.len(),
            outcome.errors.len()
        );
        outcome.advance(Stage::Final);
        outcome
    }

    fn check_floors<R: Rng>(
        &self,
        ctx: &RequestContext,
        outcome: &mut PostAuctionOutcome,
        rng: &mut R,
    ) {
        let impression_floors = ctx.impression_floors();
        let decision = FloorDecision::evaluate(&self.settings.floors, ctx, rng);
        let mut seat_bids = std::mem::take(&mut outcome.seat_bids);

        if decision.enforce {
            let enforcement = enforce_floors(
                &impression_floors,
                seat_bids,
                self.converter.as_ref(),
                self.metrics.as_ref(),
                decision.enforce_deal_floors,
            );
            seat_bids = enforcement.seat_bids;
            outcome.errors.extend(enforcement.errors);
            self.reject(outcome, enforcement.rejected);
        } else {
            log::debug!("Floor enforcement skipped for publisher {}", ctx.pub_id);
        }

        outcome.seat_bids = annotate_floor_provenance(&impression_floors, seat_bids);
    }

    fn inject(&self, ctx: &RequestContext, outcome: &mut PostAuctionOutcome) {
        for (seat_name, seat) in &mut outcome.seat_bids {
            for bid in &mut seat.bids {
                let Some(tracker) = outcome.trackers.get(&TrackerKey::new(seat_name, bid)) else {
                    continue;
                };
                let platform = ctx.platform;
                match inject_trackers(bid, tracker, seat_name, platform, &self.settings.tracker) {
                    Ok(markup) => bid.creative_markup = markup,
                    Err(report) => {
                        log::warn!(
                            "Leaving creative of bid {} from '{}' untracked: {}",
                            bid.id,
                            seat_name,
                            report
                        );
                        self.metrics
                            .record_injection_error(seat_name, bid.creative_type);
                        outcome.errors.push(report);
                    }
                }
            }
        }
    }

    fn reject(&self, outcome: &mut PostAuctionOutcome, rejected: Vec<RejectedBid>) {
        for rejection in &rejected {
            self.metrics
                .record_rejected_bid(&rejection.seat, rejection.reason);
        }
        outcome.rejections.extend(rejected);
    }

    fn record_deal_bids(&self, seat_bids: &SeatBids) {
        for (seat_name, seat) in seat_bids {
            for deal_id in seat.bids.iter().filter_map(|bid| bid.deal_id()) {
                self.metrics.record_deal_bid(seat_name, deal_id);
            }
        }
    }
}
