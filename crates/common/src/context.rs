//! Request-scoped context assembled before the post-auction stages run.
//!
//! Everything here is resolved once per request by the request-assembly
//! stage and is read-only afterwards.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::USD;

/// Integration surface the request came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Platform {
    #[default]
    #[serde(rename = "display")]
    Display,
    #[serde(rename = "amp")]
    Amp,
    #[serde(rename = "in-app")]
    InApp,
    #[serde(rename = "video")]
    Video,
}

/// Per-seat slot metadata for one impression.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidderMeta {
    /// Partner name reported in trackers. Falls back to the seat name.
    #[serde(default)]
    pub partner_id: String,
    #[serde(default)]
    pub matched_slot: String,
    /// Key-generation pattern (for example `_AU_@_W_x_H_`).
    #[serde(default)]
    pub kgp: String,
    /// Resolved key-generation pattern value.
    #[serde(default)]
    pub kgpv: String,
    /// Whether `kgpv` was produced by a regex slot mapping.
    #[serde(default)]
    pub is_regex: bool,
}

/// Floor rule that produced an impression floor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorRuleMeta {
    pub floor_rule: String,
    pub floor_rule_value: f64,
    pub floor_value: f64,
}

/// Impression data consumed by the trackers and the floor stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImpContext {
    #[serde(default)]
    pub tag_id: String,
    #[serde(default)]
    pub div: String,
    /// Forces the tracker scheme on the legacy display platform.
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub rewarded: bool,
    /// Video source, used by the `_AU_@_SRC_@_VASTTAG_` slot pattern.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub bid_floor: f64,
    #[serde(default)]
    pub bid_floor_cur: Option<String>,
    #[serde(default)]
    pub floor_rule: Option<FloorRuleMeta>,
    /// Slot metadata keyed by seat name.
    #[serde(default)]
    pub bidders: HashMap<String, BidderMeta>,
}

/// Floor context for one impression, derived once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionFloor {
    pub floor_price: f64,
    pub floor_currency: String,
    pub rule: Option<FloorRuleMeta>,
}

/// Account-level price floor switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountFloors {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the global deal-floor default when present.
    #[serde(default)]
    pub enforce_deal_floors: Option<bool>,
    /// Overrides the global enforce rate when present.
    #[serde(default)]
    pub enforce_floor_rate: Option<u32>,
}

impl Default for AccountFloors {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_deal_floors: None,
            enforce_floor_rate: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Floor switches carried on the request extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestFloors {
    /// Absent means enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// `enforcement.enforcepbs`; `Some(false)` turns enforcement off.
    #[serde(default)]
    pub enforce_pbs: Option<bool>,
    /// `enforcement.enforcerate`, percent.
    #[serde(default)]
    pub enforce_rate: Option<u32>,
    /// `enforcement.floordeals`.
    #[serde(default)]
    pub floor_deals: Option<bool>,
}

/// Typed partner configuration resolved at context construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartnerConfig {
    pub partner_id: i32,
    pub bidder_code: String,
    /// Default key-generation pattern for the partner's slots.
    #[serde(default)]
    pub kgp: String,
}

/// Partner configurations keyed by partner id, with a bidder-code index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<PartnerConfig>", into = "Vec<PartnerConfig>")]
pub struct PartnerConfigs {
    by_id: HashMap<i32, PartnerConfig>,
    id_by_bidder_code: HashMap<String, i32>,
}

impl PartnerConfigs {
    #[must_use]
    pub fn get(&self, partner_id: i32) -> Option<&PartnerConfig> {
        self.by_id.get(&partner_id)
    }

    #[must_use]
    pub fn by_bidder_code(&self, bidder_code: &str) -> Option<&PartnerConfig> {
        self.id_by_bidder_code
            .get(bidder_code)
            .and_then(|id| self.get(*id))
    }
}

impl From<Vec<PartnerConfig>> for PartnerConfigs {
    fn from(partners: Vec<PartnerConfig>) -> Self {
        let mut configs = Self::default();
        for partner in partners {
            configs
                .id_by_bidder_code
                .insert(partner.bidder_code.clone(), partner.partner_id);
            configs.by_id.insert(partner.partner_id, partner);
        }
        configs
    }
}

impl From<PartnerConfigs> for Vec<PartnerConfig> {
    fn from(configs: PartnerConfigs) -> Self {
        let mut partners: Vec<PartnerConfig> = configs.by_id.into_values().collect();
        partners.sort_by_key(|p| p.partner_id);
        partners
    }
}

/// Everything the post-auction stages know about the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestContext {
    pub pub_id: i32,
    pub profile_id: i32,
    pub version_id: i32,
    #[serde(default)]
    pub page_url: String,
    /// Source URL reported to the error tracker.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub platform: Platform,
    /// Numeric device platform id (`pfi`).
    #[serde(default)]
    pub device_platform: i32,
    /// Request start, unix seconds.
    #[serde(default)]
    pub start_time: i64,
    /// Logger impression id shared by all trackers of the request.
    #[serde(default)]
    pub logger_impression_id: String,
    #[serde(default)]
    pub ssai: Option<String>,
    /// Request currencies (`cur`), first entry is the default.
    #[serde(default)]
    pub currencies: Vec<String>,
    /// Blocked advertiser domains (`badv`) as sent by the publisher.
    #[serde(default)]
    pub blocked_advertisers: Vec<String>,
    /// Bidder codes allowed to bid on behalf of the parent bidder.
    #[serde(default)]
    pub marketplace_bidders: HashSet<String>,
    #[serde(default)]
    pub account_floors: AccountFloors,
    #[serde(default)]
    pub request_floors: Option<RequestFloors>,
    #[serde(default)]
    pub partners: PartnerConfigs,
    /// Impression contexts keyed by impression id.
    #[serde(default)]
    pub impressions: HashMap<String, ImpContext>,
}

impl RequestContext {
    /// Fill in the logger impression id when the caller did not supply one.
    #[must_use]
    pub fn with_logger_impression_id(mut self) -> Self {
        if self.logger_impression_id.is_empty() {
            self.logger_impression_id = Uuid::new_v4().to_string();
        }
        self
    }

    /// Currency floors default to: the request's first currency, else USD.
    #[must_use]
    pub fn default_currency(&self) -> &str {
        self.currencies
            .first()
            .map(String::as_str)
            .filter(|cur| !cur.is_empty())
            .unwrap_or(USD)
    }

    /// Whether any impression carries a positive floor.
    #[must_use]
    pub fn has_floors(&self) -> bool {
        self.impressions.values().any(|imp| imp.bid_floor > 0.0)
    }

    /// Derive the per-impression floor map.
    #[must_use]
    pub fn impression_floors(&self) -> HashMap<String, ImpressionFloor> {
        self.impressions
            .iter()
            .map(|(imp_id, imp)| {
                let floor_currency = imp
                    .bid_floor_cur
                    .as_deref()
                    .filter(|cur| !cur.is_empty())
                    .unwrap_or_else(|| self.default_currency())
                    .to_string();
                (
                    imp_id.clone(),
                    ImpressionFloor {
                        floor_price: imp.bid_floor,
                        floor_currency,
                        rule: imp.floor_rule.clone(),
                    },
                )
            })
            .collect()
    }
}
