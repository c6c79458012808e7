use std::collections::HashMap;

use error_stack::Report;

use crate::constants::PRICE_MODEL_CPM;
use crate::context::{BidderMeta, ImpContext, RequestContext};
use crate::domain::extract_domain;
use crate::error::ExchangeError;
use crate::openrtb::{original_bid_id, Bid, CreativeType, SeatBid, SeatBids};
use crate::settings::Settings;
use crate::tracker::slot::{key_pattern, resolve_kgpv};
use crate::tracker::url::{
    error_url, tracker_macro_url, tracker_scheme, tracker_url, ErrorTrackerContext,
};
use crate::tracker::{OwTracker, Tracker, TrackerKey};

/// Trackers keyed by seat, impression and bid id, plus per-bid rendering
/// failures.
#[derive(Debug, Default)]
pub struct TrackerBuild {
    pub trackers: HashMap<TrackerKey, OwTracker>,
    pub errors: Vec<Report<ExchangeError>>,
}

/// Partner id and slot key recorded for the parent bidder of an impression.
#[derive(Debug, Clone)]
struct ParentSlot {
    partner_id: String,
    kgpv: String,
}

/// Build a tracker for every bid in `seat_bids`.
///
/// A second pass copies the parent bidder's partner id and slot key onto
/// trackers of alternate bidder codes from the request's marketplace list,
/// then re-renders their URLs.
#[must_use]
pub fn build_trackers(
    ctx: &RequestContext,
    seat_bids: &SeatBids,
    settings: &Settings,
) -> TrackerBuild {
    let mut build = TrackerBuild::default();
    let mut parents: HashMap<String, ParentSlot> = HashMap::new();
    let parent_bidder = settings.marketplace.parent_bidder.as_str();

    for (seat_name, seat) in seat_bids {
        for bid in &seat.bids {
            match build_tracker(ctx, bid, seat_name, seat, settings) {
                Ok(tracker) => {
                    if seat_name == parent_bidder {
                        parents.insert(
                            bid.imp_id.clone(),
                            ParentSlot {
                                partner_id: tracker.tracker.partner_id.clone(),
                                kgpv: tracker.tracker.kgpv.clone(),
                            },
                        );
                    }
                    build
                        .trackers
                        .insert(TrackerKey::new(seat_name, bid), tracker);
                }
                Err(report) => {
                    log::warn!("Failed to build tracker for bid {}: {}", bid.id, report);
                    build.errors.push(report);
                }
            }
        }
    }

    if !ctx.marketplace_bidders.is_empty() {
        for tracker in build.trackers.values_mut() {
            if !ctx.marketplace_bidders.contains(&tracker.tracker.partner_id) {
                continue;
            }
            let Some(parent) = parents.get(&tracker.tracker.imp_id) else {
                continue;
            };
            tracker.tracker.partner_id.clone_from(&parent.partner_id);
            tracker.tracker.kgpv.clone_from(&parent.kgpv);

            let secure = ctx
                .impressions
                .get(&tracker.tracker.imp_id)
                .is_some_and(|imp| imp.secure);
            let scheme = tracker_scheme(ctx.platform, secure);
            let endpoint = settings.tracker.endpoint.as_str();
            match tracker_url(endpoint, &tracker.tracker, scheme) {
                Ok(url) => tracker.tracker_url = url,
                Err(report) => build.errors.push(report),
            }
            match tracker_macro_url(endpoint, &tracker.tracker, scheme) {
                Ok(url) => tracker.tracker_macro_url = url,
                Err(report) => build.errors.push(report),
            }
        }
    }

    build
}

/// Build the tracker for one bid.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidEndpoint`] when a configured endpoint
/// cannot be parsed.
pub fn build_tracker(
    ctx: &RequestContext,
    bid: &Bid,
    seat_name: &str,
    seat: &SeatBid,
    settings: &Settings,
) -> Result<OwTracker, Report<ExchangeError>> {
    let default_imp = ImpContext::default();
    let default_meta = BidderMeta::default();
    let imp = ctx.impressions.get(&bid.imp_id).unwrap_or(&default_imp);
    let meta = imp.bidders.get(seat_name).unwrap_or(&default_meta);

    let mut partner_id = if meta.partner_id.is_empty() {
        seat_name.to_string()
    } else {
        meta.partner_id.clone()
    };
    let mut matched_slot = meta.matched_slot.as_str();

    if let Some(adapter_code) = bid
        .ext
        .adapter_code
        .as_deref()
        .filter(|code| !code.is_empty() && *code != seat_name)
    {
        partner_id = adapter_code.to_string();
        if let Some(adapter_meta) = imp.bidders.get(adapter_code) {
            matched_slot = adapter_meta.matched_slot.as_str();
        }
    }

    let kgp = key_pattern(meta, &ctx.partners, seat_name);
    let kgpv = resolve_kgpv(bid, meta, matched_slot, imp, kgp);

    let gross_ecpm = round2(bid.price);
    let net_ecpm = bid.ext.net_ecpm.unwrap_or(gross_ecpm);

    let advertiser = bid
        .advertiser_domains
        .first()
        .filter(|domain| !domain.is_empty())
        .and_then(|domain| match extract_domain(domain) {
            Ok(host) => Some(host),
            Err(report) => {
                log::debug!("Ignoring advertiser domain '{}': {}", domain, report);
                None
            }
        })
        .unwrap_or_default();

    let tracker = Tracker {
        pub_id: ctx.pub_id,
        page_url: ctx.page_url.clone(),
        timestamp: ctx.start_time,
        logger_impression_id: ctx.logger_impression_id.clone(),
        profile_id: ctx.profile_id,
        version_id: ctx.version_id,
        imp_id: bid.imp_id.clone(),
        slot_id: format!("{}_{}", bid.imp_id, imp.tag_id),
        adunit: imp.tag_id.clone(),
        rewarded: imp.rewarded,
        partner_id,
        bidder_code: seat_name.to_string(),
        kgpv,
        gross_ecpm,
        net_ecpm,
        bid_id: bid
            .ext
            .generated_bid_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| bid.id.clone()),
        orig_bid_id: original_bid_id(&bid.id).to_string(),
        ssai: ctx.ssai.clone().unwrap_or_default(),
        advertiser,
        creative_id: bid.creative_id.clone().unwrap_or_default(),
    };

    let scheme = tracker_scheme(ctx.platform, imp.secure);
    let tracker_url = tracker_url(&settings.tracker.endpoint, &tracker, scheme)?;
    let tracker_macro_url = tracker_macro_url(&settings.tracker.endpoint, &tracker, scheme)?;

    let error_url = if bid.creative_type == CreativeType::Video
        && !settings.tracker.error_endpoint.is_empty()
    {
        error_url(
            &settings.tracker.error_endpoint,
            &tracker,
            ErrorTrackerContext {
                origin: &ctx.origin,
                device_platform: ctx.device_platform,
            },
            scheme,
        )?
    } else {
        String::new()
    };

    Ok(OwTracker {
        tracker,
        tracker_url,
        tracker_macro_url,
        error_url,
        price: bid.price,
        price_model: PRICE_MODEL_CPM.to_string(),
        price_currency: seat.currency.clone(),
        creative_type: bid.creative_type,
        dsp_id: bid.ext.dsp_id.unwrap_or_default(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
