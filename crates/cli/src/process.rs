//! Offline pipeline runs over recorded auctions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use error_stack::Report;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rtb_exchange_common::context::RequestContext;
use rtb_exchange_common::currency::RateTable;
use rtb_exchange_common::error::ExchangeError;
use rtb_exchange_common::metrics::{QueuedMetrics, StatsEvent};
use rtb_exchange_common::openrtb::SeatBids;
use rtb_exchange_common::pipeline::{
    AllBids, HighestPricePerImpression, ResponsePostProcessor, Stage, WinnerSelector,
};
use rtb_exchange_common::rejection::RejectionLog;
use rtb_exchange_common::settings::Settings;
use rtb_exchange_common::tracker::{OwTracker, TrackerKey};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Arguments of the `process` command.
#[derive(Debug, Clone)]
pub struct ProcessArgs {
    pub settings: PathBuf,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
    pub all_bids: bool,
}

/// A recorded auction: request context, collected seat bids and the
/// currency rates in effect.
#[derive(Debug, Deserialize)]
pub struct AuctionFixture {
    pub context: RequestContext,
    pub seat_bids: SeatBids,
    #[serde(default)]
    pub rates: RateTable,
}

/// A tracker along with the seat, impression and bid it belongs to.
#[derive(Debug, Serialize)]
pub struct KeyedTracker {
    #[serde(flatten)]
    pub key: TrackerKey,
    #[serde(flatten)]
    pub tracker: OwTracker,
}

/// Everything the pipeline produced, in printable form.
#[derive(Debug, Serialize)]
pub struct ProcessedAuction {
    pub stage: Stage,
    pub seat_bids: SeatBids,
    /// Sorted by seat, impression and bid id.
    pub trackers: Vec<KeyedTracker>,
    pub rejections: RejectionLog,
    pub errors: Vec<String>,
    pub stats: Vec<StatsEvent>,
}

pub fn load_settings(path: &Path) -> Result<Settings, CliError> {
    let content = fs::read_to_string(path).map_err(CliError::io(path))?;
    Settings::from_toml(&content).map_err(|report| CliError::Settings {
        path: path.to_path_buf(),
        report,
    })
}

/// Run one fixture through the pipeline.
pub fn process_fixture(
    settings: Settings,
    fixture: AuctionFixture,
    seed: Option<u64>,
    all_bids: bool,
) -> ProcessedAuction {
    let (metrics, mut receiver) = QueuedMetrics::new(settings.stats.queue_size);
    let selector: Arc<dyn WinnerSelector> = if all_bids {
        Arc::new(AllBids)
    } else {
        Arc::new(HighestPricePerImpression)
    };
    let processor =
        ResponsePostProcessor::new(settings, Arc::new(fixture.rates), Arc::new(metrics), selector);

    let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let ctx = fixture.context.with_logger_impression_id();
    let outcome = processor.process(&ctx, fixture.seat_bids, &mut rng);

    let mut stats = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        stats.push(event);
    }

    let mut trackers: Vec<KeyedTracker> = outcome
        .trackers
        .into_iter()
        .map(|(key, tracker)| KeyedTracker { key, tracker })
        .collect();
    trackers.sort_by(|a, b| a.key.cmp(&b.key));

    ProcessedAuction {
        stage: outcome.stage,
        seat_bids: outcome.seat_bids,
        trackers,
        rejections: outcome.rejections,
        errors: outcome.errors.iter().map(describe).collect(),
        stats,
    }
}

fn describe(report: &Report<ExchangeError>) -> String {
    format!("{report}")
}

/// `process` command.
pub fn run(args: &ProcessArgs) -> Result<(), CliError> {
    let settings = load_settings(&args.settings)?;
    let content = fs::read_to_string(&args.input).map_err(CliError::io(&args.input))?;
    let fixture: AuctionFixture =
        serde_json::from_str(&content).map_err(|source| CliError::Fixture {
            path: args.input.clone(),
            source,
        })?;

    log::debug!(
        "Processing {} seats from {}",
        fixture.seat_bids.len(),
        args.input.display()
    );

    let processed = process_fixture(settings, fixture, args.seed, args.all_bids);
    let json = serde_json::to_string_pretty(&processed).map_err(CliError::Output)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(CliError::io(parent))?;
                }
            }
            fs::write(path, json).map_err(CliError::io(path))?;
            log::info!("Result written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// `validate` command.
pub fn validate(path: &Path) -> Result<(), CliError> {
    let settings = load_settings(path)?;
    let canonical = settings.to_canonical_toml().map_err(CliError::Render)?;

    println!("{}", canonical);
    Ok(())
}
