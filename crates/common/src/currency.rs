//! Currency conversion capability consumed by the floor stage.

use std::collections::HashMap;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;

/// Source of conversion rates. Implementations are injected by the caller.
pub trait RateConverter {
    /// Rate that converts an amount in `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::CurrencyConversion`] when no rate is known.
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, Report<ExchangeError>>;
}

/// Rate lookup that answers `1.0` for identical currencies without touching
/// the converter.
///
/// # Errors
///
/// Propagates the converter's error.
pub fn conversion_rate(
    converter: &dyn RateConverter,
    from: &str,
    to: &str,
) -> Result<f64, Report<ExchangeError>> {
    if from.eq_ignore_ascii_case(to) {
        return Ok(1.0);
    }
    converter.get_rate(from, to)
}

/// In-memory rate table: `rates[from][to]`.
///
/// Missing direct rates fall back to the inverse of the opposite direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RateTable {
    rates: HashMap<String, HashMap<String, f64>>,
}

impl RateTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rate for `from -> to`. Codes are stored upper-case.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates
            .entry(from.to_ascii_uppercase())
            .or_default()
            .insert(to.to_ascii_uppercase(), rate);
        self
    }

    fn direct(&self, from: &str, to: &str) -> Option<f64> {
        self.rates.get(from).and_then(|row| row.get(to)).copied()
    }
}

impl RateConverter for RateTable {
    fn get_rate(&self, from: &str, to: &str) -> Result<f64, Report<ExchangeError>> {
        let from = from.to_ascii_uppercase();
        let to = to.to_ascii_uppercase();

        if from == to {
            return Ok(1.0);
        }

        if let Some(rate) = self.direct(&from, &to) {
            return Ok(rate);
        }

        match self.direct(&to, &from) {
            Some(inverse) if inverse != 0.0 => Ok(1.0 / inverse),
            _ => Err(Report::new(ExchangeError::CurrencyConversion {
                message: format!("currency conversion rate not found: '{from}' => '{to}'"),
            })),
        }
    }
}
