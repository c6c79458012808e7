//! Banner and native tracker injection.

use crate::constants::{BIDDER_PUBMATIC, DSP_ID_DV360, TRACKER_PIXEL_PREFIX, TRACKER_PIXEL_SUFFIX};
use crate::context::Platform;
use crate::tracker::OwTracker;

/// Append the impression tracker to banner or native markup.
///
/// In-app DV360 creatives served through the parent seat get the
/// Open-Measurement verification script instead of the hidden pixel.
#[must_use]
pub fn inject_banner_tracker(
    markup: &str,
    tracker: &OwTracker,
    seat_name: &str,
    platform: Platform,
    om_script_url: &str,
) -> String {
    let snippet = if platform == Platform::InApp
        && seat_name == BIDDER_PUBMATIC
        && tracker.dsp_id == DSP_ID_DV360
    {
        om_verification_script(&tracker.tracker_url, om_script_url)
    } else {
        tracker_pixel(&tracker.tracker_url)
    };

    let mut out = String::with_capacity(markup.len() + snippet.len());
    out.push_str(markup);
    out.push_str(&snippet);
    out
}

/// Hidden 0x0 wrapper around an image pixel.
#[must_use]
pub fn tracker_pixel(tracker_url: &str) -> String {
    format!("{TRACKER_PIXEL_PREFIX}{tracker_url}{TRACKER_PIXEL_SUFFIX}")
}

fn om_verification_script(tracker_url: &str, om_script_url: &str) -> String {
    format!(
        r#"<script id="OWPubOMVerification" data-owurl="{tracker_url}" src="{om_script_url}"></script>"#
    )
}
