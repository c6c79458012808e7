//! Creative rewriting: splice trackers into winning bids' markup.

pub mod banner;
pub mod vast;

use error_stack::Report;

use crate::context::Platform;
use crate::error::ExchangeError;
use crate::openrtb::{Bid, CreativeType};
use crate::settings::TrackerSettings;
use crate::tracker::OwTracker;

pub use banner::inject_banner_tracker;
pub use vast::{inject_vast_trackers, VastDocument};

/// Return the bid's markup with its trackers injected.
///
/// # Errors
///
/// Video creatives fail with the VAST errors described on
/// [`inject_vast_trackers`]. Banner and native injection cannot fail.
pub fn inject_trackers(
    bid: &Bid,
    tracker: &OwTracker,
    seat_name: &str,
    platform: Platform,
    settings: &TrackerSettings,
) -> Result<String, Report<ExchangeError>> {
    match bid.creative_type {
        CreativeType::Video => {
            inject_vast_trackers(&bid.creative_markup, tracker, &settings.wrapper_ad_system)
        }
        CreativeType::Banner | CreativeType::Native => Ok(inject_banner_tracker(
            &bid.creative_markup,
            tracker,
            seat_name,
            platform,
            &settings.om_script_url,
        )),
    }
}
