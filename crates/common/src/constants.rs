//! Shared literals: bidder names, tracker query keys and creative templates.

/// Core adapter name of the tag/VAST bidder family, the only family the
/// advertiser blocker filters.
pub const BIDDER_VAST_TAG: &str = "vastbidder";

/// Seat that can trigger Open-Measurement script injection on in-app traffic.
pub const BIDDER_PUBMATIC: &str = "pubmatic";

/// Demand-side platform id of DV360.
pub const DSP_ID_DV360: i32 = 80;

pub const USD: &str = "USD";
pub const PRICE_MODEL_CPM: &str = "CPM";
pub const DEFAULT_VAST_VERSION: &str = "2.0";

// Impression tracker query keys, in emission order.
pub const TRK_PUB_ID: &str = "pubid";
pub const TRK_PAGE_URL: &str = "purl";
pub const TRK_TIMESTAMP: &str = "tst";
pub const TRK_IID: &str = "iid";
pub const TRK_PROFILE_ID: &str = "pid";
pub const TRK_VERSION_ID: &str = "pdvid";
pub const TRK_SLOT_ID: &str = "slot";
pub const TRK_ADUNIT: &str = "au";
pub const TRK_REWARDED: &str = "rwrd";
pub const TRK_PARTNER_ID: &str = "pn";
pub const TRK_BIDDER_CODE: &str = "bc";
pub const TRK_KGPV: &str = "kgpv";
pub const TRK_GROSS_ECPM: &str = "eg";
pub const TRK_NET_ECPM: &str = "en";
pub const TRK_BID_ID: &str = "bidid";
pub const TRK_ORIG_BID_ID: &str = "origbidid";
pub const TRK_SSAI: &str = "ssai";

// Placeholders of the macro tracker, filled in when the creative renders.
pub const MACRO_TIMESTAMP: &str = "${TIMESTAMP}";
pub const MACRO_GROSS_ECPM: &str = "${G_ECPM}";
pub const MACRO_NET_ECPM: &str = "${N_ECPM}";
pub const MACRO_BID_ID: &str = "${BID_ID}";
pub const MACRO_ORIG_BID_ID: &str = "${ORIGBID_ID}";

// Error tracker query keys, in emission order.
pub const ERR_OPER_ID: &str = "operId";
pub const ERR_OPER_ID_VALUE: &str = "8";
pub const ERR_PUB_ID: &str = "p";
pub const ERR_PROFILE_ID: &str = "pid";
pub const ERR_VERSION_ID: &str = "v";
pub const ERR_TIMESTAMP: &str = "ts";
pub const ERR_PARTNER_ID: &str = "pn";
pub const ERR_BIDDER_CODE: &str = "bc";
pub const ERR_ADUNIT: &str = "au";
pub const ERR_SOURCE_URL: &str = "sURL";
pub const ERR_PLATFORM: &str = "pfi";
pub const ERR_ADVERTISER: &str = "adv";
pub const ERR_SSAI: &str = "ssai";
pub const ERR_CREATIVE_ID: &str = "crId";
pub const ERR_ERROR_CODE: &str = "ier";
/// Left unresolved; the video player substitutes it.
pub const ERR_ERROR_CODE_MACRO: &str = "[ERRORCODE]";

/// Hidden 0x0 wrapper for banner and native impression pixels.
pub const TRACKER_PIXEL_PREFIX: &str =
    r#"<div style="position:absolute;left:0px;top:0px;visibility:hidden;"><img src=""#;
pub const TRACKER_PIXEL_SUFFIX: &str = r#""></div>"#;
