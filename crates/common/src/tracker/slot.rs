//! Slot keys (KGPV) derived from key-generation patterns.

use crate::context::{BidderMeta, ImpContext, PartnerConfigs};
use crate::openrtb::Bid;

pub const PATTERN_AU: &str = "_AU_";
pub const PATTERN_DIV: &str = "_DIV_";
pub const PATTERN_AU_SIZE: &str = "_AU_@_W_x_H_";
pub const PATTERN_DIV_SIZE: &str = "_DIV_@_W_x_H_";
pub const PATTERN_SIZE_SIZE: &str = "_W_x_H_@_W_x_H_";
pub const PATTERN_AU_DIV_SIZE: &str = "_AU_@_DIV_@_W_x_H_";
pub const PATTERN_AU_SRC_VASTTAG: &str = "_AU_@_SRC_@_VASTTAG_";

/// Expand a key-generation pattern. Unknown patterns yield an empty string,
/// meaning no slot key is available.
#[must_use]
pub fn generate_slot_name(
    h: u32,
    w: u32,
    kgp: &str,
    tag_id: &str,
    div: &str,
    src: &str,
) -> String {
    match kgp {
        PATTERN_AU => tag_id.to_string(),
        PATTERN_DIV => div.to_string(),
        PATTERN_AU_SIZE => format!("{tag_id}@{w}x{h}"),
        PATTERN_DIV_SIZE => format!("{div}@{w}x{h}"),
        PATTERN_SIZE_SIZE => format!("{w}x{h}@{w}x{h}"),
        // Both div branches produce the same key.
        PATTERN_AU_DIV_SIZE => {
            if div.is_empty() {
                format!("{tag_id}@{div}@s{w}x{h}")
            } else {
                format!("{tag_id}@{div}@s{w}x{h}")
            }
        }
        PATTERN_AU_SRC_VASTTAG => format!("{tag_id}@{src}@s_VASTTAG_"),
        _ => String::new(),
    }
}

/// Resolve the KGPV reported for a bid.
///
/// A no-bid keeps the matched slot unless a regex mapping produced a value.
/// Regex mappings are never regenerated. Other patterns are regenerated from
/// the bid size when it is known. An empty result falls back to the matched
/// slot, or to the regenerated slot name when there was one.
#[must_use]
pub fn resolve_kgpv(
    bid: &Bid,
    meta: &BidderMeta,
    matched_slot: &str,
    imp: &ImpContext,
    kgp: &str,
) -> String {
    let mut kgpv = meta.kgpv.clone();
    let mut kgpsv = matched_slot.to_string();

    if bid.is_default_bid() {
        if !(meta.is_regex && !kgpv.is_empty()) {
            kgpv = matched_slot.to_string();
        }
    } else if !meta.is_regex && bid.w != 0 && bid.h != 0 {
        kgpv = generate_slot_name(bid.h, bid.w, kgp, &imp.tag_id, &imp.div, &imp.source);
        if !kgpv.is_empty() {
            kgpsv = kgpv.clone();
        }
    }

    if kgpv.is_empty() {
        kgpv = kgpsv;
    }
    kgpv
}

/// Key-generation pattern for a seat: the slot's own, else the partner default.
#[must_use]
pub fn key_pattern<'a>(
    meta: &'a BidderMeta,
    partners: &'a PartnerConfigs,
    seat: &str,
) -> &'a str {
    if meta.kgp.is_empty() {
        partners
            .by_bidder_code(seat)
            .map(|partner| partner.kgp.as_str())
            .unwrap_or_default()
    } else {
        meta.kgp.as_str()
    }
}
