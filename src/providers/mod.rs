//! Upstream flight-data providers.
//!
//! Each adapter fetches its provider's raw offers and normalizes them one by
//! one. A record that cannot be normalized is logged and skipped; only a
//! response that is structurally unusable fails the whole call.
//!
//! - [`duffel`]: Duffel offer requests
//! - [`amadeus`]: Amadeus Self-Service flight offers search

pub mod amadeus;
pub mod duffel;

pub use amadeus::AmadeusClient;
pub use duffel::DuffelClient;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::NormalizedFlight;
use crate::{ApiSource, FlightError, SearchCriteria};

/// A source of normalized flight offers.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Tag stamped on every offer this provider returns.
    fn source(&self) -> ApiSource;

    /// Search and normalize. Malformed individual offers are already excluded.
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<NormalizedFlight>, FlightError>;
}

/// Pull the offer array out of a provider response body.
pub(crate) fn offer_list(
    provider: ApiSource,
    body: &mut Value,
    pointer: &str,
) -> Result<Vec<Value>, FlightError> {
    match body.pointer_mut(pointer).map(Value::take) {
        Some(Value::Array(offers)) => Ok(offers),
        Some(Value::Null) | None => Err(FlightError::ParseError(format!(
            "{} response has no offer list at {}",
            provider, pointer
        ))),
        Some(other) => Err(FlightError::ParseError(format!(
            "{} offer list at {} is not an array (found {})",
            provider,
            pointer,
            json_kind(&other)
        ))),
    }
}

/// Normalize every raw offer, dropping malformed ones and any priced in a
/// currency other than the one requested.
pub(crate) fn normalize_batch<F>(
    provider: ApiSource,
    raw_offers: &[Value],
    currency: &str,
    normalize: F,
) -> Vec<NormalizedFlight>
where
    F: Fn(&Value) -> Result<NormalizedFlight, FlightError>,
{
    let mut flights = Vec::with_capacity(raw_offers.len());
    let mut skipped = 0usize;

    for raw in raw_offers {
        match normalize(raw) {
            Ok(flight) if flight.currency.eq_ignore_ascii_case(currency) => flights.push(flight),
            Ok(flight) => {
                skipped += 1;
                warn!(
                    provider = %provider,
                    offer_id = %flight.id,
                    currency = %flight.currency,
                    expected = currency,
                    "Dropping offer priced in unexpected currency"
                );
            }
            Err(e) => {
                skipped += 1;
                warn!(provider = %provider, error = %e, "Skipping malformed offer");
            }
        }
    }

    debug!(
        provider = %provider,
        normalized = flights.len(),
        skipped,
        "Normalized provider offers"
    );

    flights
}

/// Offer id for error messages, best effort.
pub(crate) fn raw_offer_id(raw: &Value) -> String {
    raw.get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
