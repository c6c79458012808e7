//! Request-level switch deciding whether floors are enforced.

use rand::Rng;

use crate::context::RequestContext;
use crate::settings::FloorSettings;

const ENFORCE_RATE_MAX: u32 = 100;

/// Outcome of the floor gate for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloorDecision {
    /// Run the floor enforcer.
    pub enforce: bool,
    /// Deal bids are held to the floor as well.
    pub enforce_deal_floors: bool,
}

impl FloorDecision {
    /// Evaluate the account, request and global switches plus sampling.
    ///
    /// Enforcement requires floors to be enabled on the account, the request
    /// (absent means enabled) and globally, the request to carry floor data,
    /// and the sampling check to pass.
    pub fn evaluate<R: Rng>(
        settings: &FloorSettings,
        ctx: &RequestContext,
        rng: &mut R,
    ) -> Self {
        let request_enabled = ctx
            .request_floors
            .as_ref()
            .and_then(|floors| floors.enabled)
            .unwrap_or(true);

        if !(ctx.account_floors.enabled && request_enabled && settings.enabled) {
            log::debug!("Floors disabled for publisher {}", ctx.pub_id);
            return Self::default();
        }

        let request_floor_deals = ctx
            .request_floors
            .as_ref()
            .and_then(|floors| floors.floor_deals)
            .unwrap_or(false);
        let account_deal_floors = ctx
            .account_floors
            .enforce_deal_floors
            .unwrap_or(settings.enforce_deal_floors);
        let enforce_deal_floors = account_deal_floors && request_floor_deals;

        let enforce_rate = ctx
            .account_floors
            .enforce_floor_rate
            .unwrap_or(settings.enforce_floor_rate);

        let enforce = request_has_floors(ctx) && should_enforce(ctx, enforce_rate, rng);

        Self {
            enforce,
            enforce_deal_floors,
        }
    }
}

/// Whether the request carries floor data worth enforcing.
#[must_use]
pub fn request_has_floors(ctx: &RequestContext) -> bool {
    ctx.has_floors()
}

/// Sampling check driven by an enforce rate in percent.
///
/// `enforcement.enforcepbs = false` on the request turns enforcement off; a
/// request-level enforce rate replaces the configured one.
pub fn should_enforce<R: Rng>(
    ctx: &RequestContext,
    configured_rate: u32,
    rng: &mut R,
) -> bool {
    let request_floors = ctx.request_floors.as_ref();

    if request_floors.and_then(|floors| floors.enforce_pbs) == Some(false) {
        return false;
    }

    let rate = request_floors
        .and_then(|floors| floors.enforce_rate)
        .unwrap_or(configured_rate)
        .min(ENFORCE_RATE_MAX);

    rng.gen_range(0..ENFORCE_RATE_MAX) < rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AccountFloors, ImpContext, RequestFloors};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn floored_context() -> RequestContext {
        let mut ctx = RequestContext::default();
        ctx.impressions.insert(
            "imp-1".to_string(),
            ImpContext {
                bid_floor: 1.0,
                ..ImpContext::default()
            },
        );
        ctx
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_gate_enforces_when_everything_enabled() {
        let decision =
            FloorDecision::evaluate(&FloorSettings::default(), &floored_context(), &mut rng());
        assert!(decision.enforce);
        assert!(!decision.enforce_deal_floors);
    }

    #[test]
    fn test_gate_disabled_by_any_switch() {
        let mut settings = FloorSettings::default();
        settings.enabled = false;
        assert!(!FloorDecision::evaluate(&settings, &floored_context(), &mut rng()).enforce);

        let mut ctx = floored_context();
        ctx.account_floors.enabled = false;
        assert!(!FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng()).enforce);

        let mut ctx = floored_context();
        ctx.request_floors = Some(RequestFloors {
            enabled: Some(false),
            ..RequestFloors::default()
        });
        assert!(!FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng()).enforce);
    }

    #[test]
    fn test_gate_requires_floor_data() {
        let ctx = RequestContext::default();
        let decision = FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng());
        assert!(!decision.enforce);
    }

    #[test]
    fn test_deal_floors_need_account_and_request_flags() {
        let mut ctx = floored_context();
        ctx.account_floors = AccountFloors {
            enforce_deal_floors: Some(true),
            ..AccountFloors::default()
        };
        let decision = FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng());
        assert!(!decision.enforce_deal_floors, "request flag missing");

        ctx.request_floors = Some(RequestFloors {
            floor_deals: Some(true),
            ..RequestFloors::default()
        });
        let decision = FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng());
        assert!(decision.enforce_deal_floors);

        ctx.account_floors.enforce_deal_floors = Some(false);
        let decision = FloorDecision::evaluate(&FloorSettings::default(), &ctx, &mut rng());
        assert!(!decision.enforce_deal_floors, "account flag missing");

        ctx.account_floors.enforce_deal_floors = None;
        let settings = FloorSettings {
            enforce_deal_floors: true,
            ..FloorSettings::default()
        };
        let decision = FloorDecision::evaluate(&settings, &ctx, &mut rng());
        assert!(decision.enforce_deal_floors, "global default applies");
    }

    #[test]
    fn test_should_enforce_rate_bounds() {
        let ctx = floored_context();
        let mut rng = rng();
        for _ in 0..50 {
            assert!(should_enforce(&ctx, 100, &mut rng));
            assert!(!should_enforce(&ctx, 0, &mut rng));
        }
    }

    #[test]
    fn test_should_enforce_request_overrides() {
        let mut ctx = floored_context();
        ctx.request_floors = Some(RequestFloors {
            enforce_pbs: Some(false),
            ..RequestFloors::default()
        });
        assert!(!should_enforce(&ctx, 100, &mut rng()));

        ctx.request_floors = Some(RequestFloors {
            enforce_rate: Some(0),
            ..RequestFloors::default()
        });
        assert!(!should_enforce(&ctx, 100, &mut rng()));
    }

    #[test]
    fn test_should_enforce_samples_roughly_at_rate() {
        let ctx = floored_context();
        let mut rng = rng();
        let hits = (0..1000)
            .filter(|_| should_enforce(&ctx, 30, &mut rng))
            .count();
        assert!(
            (200..400).contains(&hits),
            "expected about 30% enforcement, got {hits}/1000"
        );
    }
}
