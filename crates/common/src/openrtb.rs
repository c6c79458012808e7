//! Bid-side OpenRTB subset consumed by the post-auction pipeline.
//!
//! Seats are keyed by seat name in a `BTreeMap` so every stage walks them in
//! a stable order and the rejection log is reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Seat bids keyed by seat name.
pub type SeatBids = BTreeMap<String, SeatBid>;

/// Kind of creative carried in `adm`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CreativeType {
    #[default]
    Banner,
    Video,
    Native,
}

impl CreativeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Video => "video",
            Self::Native => "native",
        }
    }
}

/// Floor provenance attached to a surviving bid for analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidFloors {
    #[serde(rename = "floorRule")]
    pub floor_rule: String,
    #[serde(rename = "floorRuleValue")]
    pub floor_rule_value: f64,
    #[serde(rename = "floorValue")]
    pub floor_value: f64,
    #[serde(rename = "floorCurrency")]
    pub floor_currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BidExt {
    /// Adapter actually responsible for the bid when it differs from the
    /// seat (marketplace / alternate bidder codes).
    #[serde(rename = "adaptercode", skip_serializing_if = "Option::is_none")]
    pub adapter_code: Option<String>,
    #[serde(rename = "dspid", skip_serializing_if = "Option::is_none")]
    pub dsp_id: Option<i32>,
    /// Net eCPM after revenue share, computed upstream.
    #[serde(rename = "netecpm", skip_serializing_if = "Option::is_none")]
    pub net_ecpm: Option<f64>,
    /// Exchange-generated bid id, when bid id generation is on.
    #[serde(rename = "bidid", skip_serializing_if = "Option::is_none")]
    pub generated_bid_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floors: Option<BidFloors>,
}

/// One bid from one bidder for one impression.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: String,
    #[serde(rename = "impid")]
    pub imp_id: String,
    pub price: f64,
    #[serde(rename = "dealid", default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(rename = "adomain", default, skip_serializing_if = "Vec::is_empty")]
    pub advertiser_domains: Vec<String>,
    #[serde(rename = "adm", default)]
    pub creative_markup: String,
    #[serde(rename = "crid", default, skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,
    #[serde(rename = "type", default)]
    pub creative_type: CreativeType,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub ext: BidExt,
}

impl Bid {
    /// Deal id, treating an empty string as no deal.
    #[must_use]
    pub fn deal_id(&self) -> Option<&str> {
        self.deal_id.as_deref().filter(|id| !id.is_empty())
    }

    /// A zero-priced, zero-sized bid stands in for "no bid".
    #[must_use]
    pub fn is_default_bid(&self) -> bool {
        self.price == 0.0 && self.w == 0 && self.h == 0
    }
}

/// Bids from one bidder. All bids share `currency`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeatBid {
    pub seat: String,
    /// Underlying adapter, distinct from any alias the seat is named after.
    #[serde(rename = "bidderCoreName")]
    pub core_bidder_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(rename = "bid", default)]
    pub bids: Vec<Bid>,
}

fn default_currency() -> String {
    crate::constants::USD.to_string()
}

impl SeatBid {
    /// Same seat metadata with a different set of bids.
    #[must_use]
    pub fn with_bids(&self, bids: Vec<Bid>) -> Self {
        Self {
            seat: self.seat.clone(),
            core_bidder_name: self.core_bidder_name.clone(),
            currency: self.currency.clone(),
            bids,
        }
    }
}

/// Strip the exchange suffix from a bid id (`<original>::<generated>`).
#[must_use]
pub fn original_bid_id(bid_id: &str) -> &str {
    bid_id.split("::").next().unwrap_or(bid_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deal_id_treats_empty_as_absent() {
        let mut bid = Bid {
            deal_id: Some(String::new()),
            ..Bid::default()
        };
        assert_eq!(bid.deal_id(), None);

        bid.deal_id = Some("deal-1".to_string());
        assert_eq!(bid.deal_id(), Some("deal-1"));
    }

    #[test]
    fn test_is_default_bid() {
        let mut bid = Bid::default();
        assert!(bid.is_default_bid());

        bid.w = 300;
        assert!(!bid.is_default_bid());
    }

    #[test]
    fn test_original_bid_id() {
        assert_eq!(original_bid_id("abc::123-456"), "abc");
        assert_eq!(original_bid_id("abc"), "abc");
        assert_eq!(original_bid_id(""), "");
    }

    #[test]
    fn test_seat_bid_deserializes_openrtb_names() {
        let json = r#"{
            "seat": "pubmatic",
            "bidderCoreName": "pubmatic",
            "currency": "EUR",
            "bid": [{
                "id": "bid-1",
                "impid": "imp-1",
                "price": 1.5,
                "dealid": "deal-9",
                "adomain": ["advertiser.com"],
                "adm": "<div>ad</div>",
                "type": "video",
                "w": 640,
                "h": 480,
                "ext": {"adaptercode": "groupm", "dspid": 80}
            }]
        }"#;

        let seat: SeatBid = serde_json::from_str(json).expect("should parse seat bid");
        assert_eq!(seat.currency, "EUR");
        let bid = &seat.bids[0];
        assert_eq!(bid.imp_id, "imp-1");
        assert_eq!(bid.deal_id(), Some("deal-9"));
        assert_eq!(bid.creative_type, CreativeType::Video);
        assert_eq!(bid.ext.adapter_code.as_deref(), Some("groupm"));
        assert_eq!(bid.ext.dsp_id, Some(80));
    }

    #[test]
    fn test_seat_bid_currency_defaults_to_usd() {
        let seat: SeatBid =
            serde_json::from_str(r#"{"seat": "appnexus", "bidderCoreName": "appnexus"}"#)
                .expect("should parse seat bid");
        assert_eq!(seat.currency, "USD");
        assert!(seat.bids.is_empty());
    }
}
