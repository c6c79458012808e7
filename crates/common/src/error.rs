//! Error types for the post-auction pipeline.
//!
//! Every fallible operation returns `error_stack::Report<ExchangeError>` so
//! callers can attach context while errors travel from a single bid up to the
//! request-level error list.

use derive_more::Display;

/// Errors raised while deciding on bids and rewriting their creatives.
#[derive(Debug, Display)]
pub enum ExchangeError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// No usable rate between two currencies.
    #[display("Currency conversion error: {message}")]
    CurrencyConversion { message: String },

    /// A bare public suffix can never be used as a block or match target.
    #[display("Domain '{domain}' is a public suffix")]
    PublicSuffixDomain { domain: String },

    /// The domain string could not be parsed as a URL host.
    #[display("Invalid domain: {message}")]
    InvalidDomain { message: String },

    /// The creative markup is empty or not parseable.
    #[display("Invalid creative: {message}")]
    InvalidCreative { message: String },

    #[display("VAST tag not found")]
    MissingVastRoot,

    #[display("Ad tag not found")]
    MissingAdElement,

    /// An `<Ad>` element carries neither `<Wrapper>` nor `<InLine>`.
    #[display("video creative not in required VAST format")]
    UnsupportedVastAd,

    #[display("XML serialization error: {message}")]
    XmlSerialization { message: String },

    /// A configured tracker endpoint is not a valid absolute URL.
    #[display("Invalid tracker endpoint: {message}")]
    InvalidEndpoint { message: String },
}

impl core::error::Error for ExchangeError {}
