//! Impression and error trackers built per winning bid.
//!
//! [`builder`] resolves the reporting fields for each bid, [`url`] renders
//! them into the tracker query strings and [`slot`] holds the slot-key
//! algorithm both depend on.

pub mod builder;
pub mod slot;
pub mod url;

use serde::Serialize;

use crate::openrtb::{Bid, CreativeType};

pub use builder::{build_trackers, TrackerBuild};
pub use slot::generate_slot_name;

/// Identifies the tracker of one bid. Bid ids are only unique within a seat
/// and impression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackerKey {
    pub seat: String,
    pub imp_id: String,
    pub bid_id: String,
}

impl TrackerKey {
    #[must_use]
    pub fn new(seat: &str, bid: &Bid) -> Self {
        Self {
            seat: seat.to_string(),
            imp_id: bid.imp_id.clone(),
            bid_id: bid.id.clone(),
        }
    }
}

/// Reporting fields rendered into the impression tracker.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Tracker {
    pub pub_id: i32,
    pub page_url: String,
    pub timestamp: i64,
    pub logger_impression_id: String,
    pub profile_id: i32,
    pub version_id: i32,
    pub imp_id: String,
    /// `<impID>_<tagID>`.
    pub slot_id: String,
    pub adunit: String,
    pub rewarded: bool,
    pub partner_id: String,
    pub bidder_code: String,
    pub kgpv: String,
    pub gross_ecpm: f64,
    pub net_ecpm: f64,
    pub bid_id: String,
    pub orig_bid_id: String,
    pub ssai: String,
    pub advertiser: String,
    pub creative_id: String,
}

/// Tracker plus everything the creative injectors need.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OwTracker {
    pub tracker: Tracker,
    pub tracker_url: String,
    /// Same keys as `tracker_url`, per-render fields left as macros.
    pub tracker_macro_url: String,
    /// Empty unless the bid is a video bid and an error endpoint is set.
    pub error_url: String,
    pub price: f64,
    pub price_model: String,
    pub price_currency: String,
    pub creative_type: CreativeType,
    pub dsp_id: i32,
}
