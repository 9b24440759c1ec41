//! # Flight Merge
//!
//! Searches several flight-data providers at once and folds their offers into
//! one price-ranked result set. Each provider adapter turns its own raw offer
//! schema into a [`NormalizedFlight`]; the merge engine deduplicates and sorts
//! them, and route grouping attaches alternate fares of the same physical
//! flight to a single display record.

pub mod config;
pub mod filter;
pub mod grouping;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod providers;
pub mod search;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use config::AppConfig;
pub use filter::{
    filter_flights, group_flights, parse_duration_hours, sort_flights, FilterCriteria, GroupBy,
    SortBy,
};
pub use grouping::{group_offers_by_route, route_key, RouteGroups, RouteKey};
pub use merge::{dedup_key, merge_flights};
pub use model::{Amenities, Baggage, BaggageAllowance, NormalizedFlight};
pub use providers::{AmadeusClient, DuffelClient, FlightProvider};
pub use search::{FlightSearchService, ProviderReport, ProviderStatus, SearchOutcome};

/// Error types for the flight merge library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("Malformed {provider} offer {offer_id}: {reason}")]
    MalformedOffer {
        provider: ApiSource,
        offer_id: String,
        reason: String,
    },

    #[error("{provider} responded with status {status}: {message}")]
    ProviderResponse {
        provider: ApiSource,
        status: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid date format: {0}")]
    DateParseError(String),
}

/// Upstream provider that produced an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    Duffel,
    Amadeus,
}

impl ApiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiSource::Duffel => "duffel",
            ApiSource::Amadeus => "amadeus",
        }
    }
}

impl fmt::Display for ApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical cabin vocabulary shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium_economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }

    /// Anything above the main cabin.
    pub fn is_premium(&self) -> bool {
        !matches!(self, CabinClass::Economy)
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium-economy" | "premium_economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(FlightError::InvalidCriteria(format!("Invalid cabin class: {}", s))),
        }
    }
}

/// Parameters for one search across all providers.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub origin: String,      // IATA airport code
    pub destination: String, // IATA airport code
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passenger_count: u32,
    pub cabin_class: Option<CabinClass>,
    /// Every provider is asked for this currency; offers priced otherwise are dropped.
    pub currency: String,
    pub max_results: usize,
}

impl SearchCriteria {
    /// One adult, economy-agnostic, one-way search priced in USD.
    pub fn one_way(origin: &str, destination: &str, departure_date: &str) -> Result<Self, FlightError> {
        let criteria = Self {
            origin: origin.trim().to_uppercase(),
            destination: destination.trim().to_uppercase(),
            departure_date: Self::parse_date(departure_date)?,
            return_date: None,
            passenger_count: 1,
            cabin_class: None,
            currency: "USD".to_string(),
            max_results: 50,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn with_return_date(mut self, return_date: &str) -> Result<Self, FlightError> {
        self.return_date = Some(Self::parse_date(return_date)?);
        self.validate()?;
        Ok(self)
    }

    /// Parse a `YYYY-MM-DD` date.
    pub fn parse_date(date: &str) -> Result<NaiveDate, FlightError> {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| FlightError::DateParseError(format!("{}: {}", date, e)))
    }

    pub fn validate(&self) -> Result<(), FlightError> {
        for (label, code) in [("origin", &self.origin), ("destination", &self.destination)] {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(FlightError::InvalidCriteria(format!(
                    "{} must be a 3-letter IATA code, got {:?}",
                    label, code
                )));
            }
        }
        if self.passenger_count < 1 {
            return Err(FlightError::InvalidCriteria(
                "passenger_count must be at least 1".to_string(),
            ));
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(FlightError::InvalidCriteria(format!(
                    "return date {} is before departure date {}",
                    return_date, self.departure_date
                )));
            }
        }
        if self.currency.len() != 3 {
            return Err(FlightError::InvalidCriteria(format!(
                "currency must be an ISO 4217 code, got {:?}",
                self.currency
            )));
        }
        Ok(())
    }
}

/// Main public API function: search every provider in `config`, keeping only
/// routes that pass `filter`. Build `criteria` with [`AppConfig::criteria`] to
/// pick up the configured currency and result cap.
pub async fn search_flights(
    config: &AppConfig,
    criteria: &SearchCriteria,
    filter: &FilterCriteria,
    sort_by: SortBy,
) -> Result<SearchOutcome, FlightError> {
    let service = FlightSearchService::from_config(config)?;
    service.search_filtered(criteria, filter, sort_by).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cabin_class_parsing() {
        assert!(matches!("economy".parse::<CabinClass>(), Ok(CabinClass::Economy)));
        assert!(matches!("premium-economy".parse::<CabinClass>(), Ok(CabinClass::PremiumEconomy)));
        assert!(matches!("premium_economy".parse::<CabinClass>(), Ok(CabinClass::PremiumEconomy)));
        assert!(matches!("Business".parse::<CabinClass>(), Ok(CabinClass::Business)));
        assert!(matches!("first".parse::<CabinClass>(), Ok(CabinClass::First)));
        assert!("polaris".parse::<CabinClass>().is_err());
    }

    #[test]
    fn test_cabin_class_serializes_snake_case() {
        let json = serde_json::to_string(&CabinClass::PremiumEconomy).unwrap();
        assert_eq!(json, "\"premium_economy\"");
    }

    #[test]
    fn test_api_source_display() {
        assert_eq!(ApiSource::Duffel.to_string(), "duffel");
        assert_eq!(ApiSource::Amadeus.to_string(), "amadeus");
    }

    #[test]
    fn test_search_criteria_one_way() {
        let criteria = SearchCriteria::one_way("lhr", "JFK", "2025-08-15").unwrap();
        assert_eq!(criteria.origin, "LHR");
        assert_eq!(criteria.passenger_count, 1);
        assert_eq!(criteria.return_date, None);
    }

    #[test]
    fn test_search_criteria_rejects_bad_input() {
        assert!(SearchCriteria::one_way("LONDON", "JFK", "2025-08-15").is_err());
        assert!(SearchCriteria::one_way("LHR", "JFK", "15/08/2025").is_err());

        let criteria = SearchCriteria::one_way("LHR", "JFK", "2025-08-15").unwrap();
        assert!(criteria.clone().with_return_date("2025-08-10").is_err());
        assert!(criteria.with_return_date("2025-08-22").is_ok());
    }

    #[test]
    fn test_search_criteria_rejects_zero_passengers() {
        let mut criteria = SearchCriteria::one_way("LHR", "JFK", "2025-08-15").unwrap();
        criteria.passenger_count = 0;
        assert!(matches!(criteria.validate(), Err(FlightError::InvalidCriteria(_))));
    }
}
