//! Post-auction bid decisions and creative tracking for an RTB exchange.
//!
//! The crate takes the seat bids collected for one auction request and runs
//! them through the post-auction stages before the response is serialized.
//!
//! # Modules
//!
//! - [`advertiser`]: Advertiser domain blocking for tag/VAST bidders
//! - [`constants`]: Bidder names, tracker query keys and creative templates
//! - [`context`]: Request-scoped context resolved before the stages run
//! - [`creative`]: Banner pixel and VAST tracker injection
//! - [`currency`]: Rate converter capability and an in-memory rate table
//! - [`domain`]: Public-suffix aware domain normalization
//! - [`error`]: Error types and error handling utilities
//! - [`floors`]: Floor gate and per-bid floor enforcement
//! - [`metrics`]: Fire-and-forget stats counters
//! - [`openrtb`]: Bid-side OpenRTB subset
//! - [`pipeline`]: Stage orchestration and winner selection
//! - [`rejection`]: Rejected bid records for analytics
//! - [`settings`]: Configuration management and validation
//! - [`tracker`]: Impression and error tracker construction
//! - [`test_support`]: Testing utilities

pub mod advertiser;
pub mod constants;
pub mod context;
pub mod creative;
pub mod currency;
pub mod domain;
pub mod error;
pub mod floors;
pub mod metrics;
pub mod openrtb;
pub mod pipeline;
pub mod rejection;
pub mod settings;
pub mod tracker;
