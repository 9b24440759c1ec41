//! Provider-independent flight offer representation.

use serde::{Deserialize, Serialize};

use crate::{ApiSource, CabinClass};

/// One bookable offer, whatever provider it came from.
///
/// `id` is only unique within `api_source`. `fare_options` stays `None` until
/// route grouping builds the display record for a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFlight {
    pub id: String,
    pub carrier: String,
    /// Display string such as `BA117`; not a structured key.
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub origin_name: String,
    pub destination_name: String,
    pub departure: String,
    pub arrival: String,
    /// ISO-8601 duration of the first slice, e.g. `PT7H45M`.
    pub duration: String,
    pub price: f64,
    pub currency: String,
    pub cabin_class: CabinClass,
    pub stops: u32,
    pub api_source: ApiSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Amenities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baggage: Option<Baggage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare_options: Option<Vec<NormalizedFlight>>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw_data: serde_json::Value,
}

impl NormalizedFlight {
    /// Number of fare options attached by route grouping, 1 for an ungrouped offer.
    pub fn fare_option_count(&self) -> usize {
        self.fare_options.as_ref().map_or(1, Vec::len)
    }
}

/// On-board amenities. `None` on a flag means the provider did not say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenities {
    pub wifi: Option<bool>,
    pub power: Option<bool>,
    pub entertainment: Option<bool>,
    pub meals: Option<bool>,
    /// Set when the flags were guessed from the cabin class instead of reported.
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baggage {
    pub carry_on: BaggageAllowance,
    pub checked: BaggageAllowance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaggageAllowance {
    pub quantity: u32,
    /// Kilograms, when the provider states a weight limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl BaggageAllowance {
    pub fn pieces(quantity: u32) -> Self {
        Self {
            quantity,
            weight: None,
        }
    }
}

impl Default for Baggage {
    fn default() -> Self {
        Self {
            carry_on: BaggageAllowance::pieces(1),
            checked: BaggageAllowance::pieces(0),
        }
    }
}
