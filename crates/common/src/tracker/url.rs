//! Tracker query-string rendering.
//!
//! Key names and their order are read by downstream log parsers and must
//! not change.

use error_stack::{Report, ResultExt};
use url::{form_urlencoded, Url};

use crate::constants::{
    ERR_ADUNIT, ERR_ADVERTISER, ERR_BIDDER_CODE, ERR_CREATIVE_ID, ERR_ERROR_CODE,
    ERR_ERROR_CODE_MACRO, ERR_OPER_ID, ERR_OPER_ID_VALUE, ERR_PARTNER_ID, ERR_PLATFORM,
    ERR_PROFILE_ID, ERR_PUB_ID, ERR_SOURCE_URL, ERR_SSAI, ERR_TIMESTAMP, ERR_VERSION_ID,
    MACRO_BID_ID, MACRO_GROSS_ECPM, MACRO_NET_ECPM, MACRO_ORIG_BID_ID, MACRO_TIMESTAMP,
    TRK_ADUNIT, TRK_BIDDER_CODE, TRK_BID_ID, TRK_GROSS_ECPM, TRK_IID, TRK_KGPV, TRK_NET_ECPM,
    TRK_ORIG_BID_ID, TRK_PAGE_URL, TRK_PARTNER_ID, TRK_PROFILE_ID, TRK_PUB_ID, TRK_REWARDED,
    TRK_SLOT_ID, TRK_SSAI, TRK_TIMESTAMP, TRK_VERSION_ID,
};
use crate::context::Platform;
use crate::error::ExchangeError;
use crate::tracker::Tracker;

const NO_CREATIVE_ID: &str = "-1";

/// Scheme applied to rendered trackers.
///
/// The legacy display integration follows the impression's `secure` flag;
/// every other platform is upgraded to https.
#[must_use]
pub fn tracker_scheme(platform: Platform, secure: bool) -> &'static str {
    match platform {
        Platform::Display if !secure => "http",
        _ => "https",
    }
}

/// Render the impression tracker URL.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidEndpoint`] if `endpoint` is not an
/// absolute URL.
pub fn tracker_url(
    endpoint: &str,
    tracker: &Tracker,
    scheme: &str,
) -> Result<String, Report<ExchangeError>> {
    let mut url = parse_endpoint(endpoint)?;
    url.query_pairs_mut().extend_pairs(tracker_pairs(tracker));

    apply_scheme(&mut url, scheme);
    Ok(url.into())
}

/// Render the macro tracker handed to clients that fire the impression
/// themselves.
///
/// Keys and order match [`tracker_url`]. Timestamp, prices and bid ids are
/// left as `${...}` macros for the client to substitute at render time.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidEndpoint`] if `endpoint` is not an
/// absolute URL.
pub fn tracker_macro_url(
    endpoint: &str,
    tracker: &Tracker,
    scheme: &str,
) -> Result<String, Report<ExchangeError>> {
    let mut url = parse_endpoint(endpoint)?;

    let mut query = url.query().map(str::to_string).unwrap_or_default();
    for (key, value) in tracker_pairs(tracker) {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(key);
        query.push('=');
        // Macros must reach the client unencoded.
        match tracker_macro(key) {
            Some(placeholder) => query.push_str(placeholder),
            None => query.extend(form_urlencoded::byte_serialize(value.as_bytes())),
        }
    }
    url.set_query(Some(&query));

    apply_scheme(&mut url, scheme);
    Ok(url.into())
}

/// Impression tracker fields in emission order.
fn tracker_pairs(tracker: &Tracker) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        (TRK_PUB_ID, tracker.pub_id.to_string()),
        (TRK_PAGE_URL, tracker.page_url.clone()),
        (TRK_TIMESTAMP, tracker.timestamp.to_string()),
        (TRK_IID, tracker.logger_impression_id.clone()),
        (TRK_PROFILE_ID, tracker.profile_id.to_string()),
        (TRK_VERSION_ID, tracker.version_id.to_string()),
        (TRK_SLOT_ID, tracker.slot_id.clone()),
        (TRK_ADUNIT, tracker.adunit.clone()),
    ];
    if tracker.rewarded {
        pairs.push((TRK_REWARDED, "1".to_string()));
    }
    pairs.extend([
        (TRK_PARTNER_ID, tracker.partner_id.clone()),
        (TRK_BIDDER_CODE, tracker.bidder_code.clone()),
        (TRK_KGPV, tracker.kgpv.clone()),
        (TRK_GROSS_ECPM, tracker.gross_ecpm.to_string()),
        (TRK_NET_ECPM, tracker.net_ecpm.to_string()),
        (TRK_BID_ID, tracker.bid_id.clone()),
        (TRK_ORIG_BID_ID, tracker.orig_bid_id.clone()),
    ]);
    if !tracker.ssai.is_empty() {
        pairs.push((TRK_SSAI, tracker.ssai.clone()));
    }
    pairs
}

fn tracker_macro(key: &str) -> Option<&'static str> {
    match key {
        TRK_TIMESTAMP => Some(MACRO_TIMESTAMP),
        TRK_GROSS_ECPM => Some(MACRO_GROSS_ECPM),
        TRK_NET_ECPM => Some(MACRO_NET_ECPM),
        TRK_BID_ID => Some(MACRO_BID_ID),
        TRK_ORIG_BID_ID => Some(MACRO_ORIG_BID_ID),
        _ => None,
    }
}

/// Request-level fields the error tracker adds on top of the [`Tracker`].
#[derive(Debug, Clone, Copy)]
pub struct ErrorTrackerContext<'a> {
    pub origin: &'a str,
    pub device_platform: i32,
}

/// Render the video error tracker URL. `operId` is always first and the
/// unresolved `[ERRORCODE]` macro always last.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidEndpoint`] if `endpoint` is not an
/// absolute URL.
pub fn error_url(
    endpoint: &str,
    tracker: &Tracker,
    request: ErrorTrackerContext<'_>,
    scheme: &str,
) -> Result<String, Report<ExchangeError>> {
    let mut url = parse_endpoint(endpoint)?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(ERR_OPER_ID, ERR_OPER_ID_VALUE)
            .append_pair(ERR_PUB_ID, &tracker.pub_id.to_string())
            .append_pair(ERR_PROFILE_ID, &tracker.profile_id.to_string())
            .append_pair(ERR_VERSION_ID, &tracker.version_id.to_string())
            .append_pair(ERR_TIMESTAMP, &tracker.timestamp.to_string())
            .append_pair(ERR_PARTNER_ID, &tracker.partner_id)
            .append_pair(ERR_BIDDER_CODE, &tracker.bidder_code)
            .append_pair(ERR_ADUNIT, &tracker.adunit)
            .append_pair(ERR_SOURCE_URL, request.origin)
            .append_pair(ERR_PLATFORM, &request.device_platform.to_string())
            .append_pair(ERR_ADVERTISER, &tracker.advertiser);
        if !tracker.ssai.is_empty() {
            query.append_pair(ERR_SSAI, &tracker.ssai);
        }
        let creative_id = if tracker.creative_id.is_empty() {
            NO_CREATIVE_ID
        } else {
            tracker.creative_id.as_str()
        };
        query.append_pair(ERR_CREATIVE_ID, creative_id);
    }

    // The macro must reach the player unencoded.
    let query = format!(
        "{}&{}={}",
        url.query().unwrap_or_default(),
        ERR_ERROR_CODE,
        ERR_ERROR_CODE_MACRO
    );
    url.set_query(Some(&query));

    apply_scheme(&mut url, scheme);
    Ok(url.into())
}

fn parse_endpoint(endpoint: &str) -> Result<Url, Report<ExchangeError>> {
    Url::parse(endpoint).change_context(ExchangeError::InvalidEndpoint {
        message: format!("'{endpoint}' is not an absolute URL"),
    })
}

fn apply_scheme(url: &mut Url, scheme: &str) {
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        log::warn!("Cannot switch tracker {} to {}", url, scheme);
    }
}
