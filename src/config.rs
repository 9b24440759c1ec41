//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `DUFFEL_ACCESS_TOKEN` | unset (Duffel disabled) |
//! | `DUFFEL_BASE_URL` | `https://api.duffel.com` |
//! | `AMADEUS_CLIENT_ID` / `AMADEUS_CLIENT_SECRET` | unset (Amadeus disabled) |
//! | `AMADEUS_BASE_URL` | `https://test.api.amadeus.com` |
//! | `FLIGHTS_PROVIDER_TIMEOUT_SECS` | 20 |
//! | `FLIGHTS_CURRENCY` | `USD` |
//! | `FLIGHTS_MAX_RESULTS` | 50 |

use std::env;
use std::time::Duration;

use crate::providers::amadeus::AMADEUS_API_BASE;
use crate::providers::duffel::DUFFEL_API_BASE;
use crate::{FlightError, SearchCriteria};

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_MAX_RESULTS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct DuffelConfig {
    pub access_token: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmadeusConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub duffel: Option<DuffelConfig>,
    pub amadeus: Option<AmadeusConfig>,
    pub provider_timeout: Duration,
    pub currency: String,
    pub max_results: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            duffel: None,
            amadeus: None,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            currency: DEFAULT_CURRENCY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, FlightError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlightError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let duffel = get("DUFFEL_ACCESS_TOKEN").map(|access_token| DuffelConfig {
            access_token,
            base_url: get("DUFFEL_BASE_URL").unwrap_or_else(|| DUFFEL_API_BASE.to_string()),
        });

        let amadeus = match (get("AMADEUS_CLIENT_ID"), get("AMADEUS_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(AmadeusConfig {
                client_id,
                client_secret,
                base_url: get("AMADEUS_BASE_URL").unwrap_or_else(|| AMADEUS_API_BASE.to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(FlightError::ConfigError(
                    "AMADEUS_CLIENT_ID and AMADEUS_CLIENT_SECRET must be set together".to_string(),
                ))
            }
        };

        let provider_timeout = match get("FLIGHTS_PROVIDER_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                FlightError::ConfigError(format!("FLIGHTS_PROVIDER_TIMEOUT_SECS={}: {}", raw, e))
            })?),
            None => Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        };

        let max_results = match get("FLIGHTS_MAX_RESULTS") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                FlightError::ConfigError(format!("FLIGHTS_MAX_RESULTS={}: {}", raw, e))
            })?,
            None => DEFAULT_MAX_RESULTS,
        };

        let currency = get("FLIGHTS_CURRENCY")
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_uppercase();
        if currency.len() != 3 {
            return Err(FlightError::ConfigError(format!(
                "FLIGHTS_CURRENCY must be an ISO 4217 code, got {:?}",
                currency
            )));
        }

        Ok(Self {
            duffel,
            amadeus,
            provider_timeout,
            currency,
            max_results,
        })
    }

    /// One-way criteria priced in the configured currency and capped at the
    /// configured result count.
    pub fn criteria(
        &self,
        origin: &str,
        destination: &str,
        departure_date: &str,
    ) -> Result<SearchCriteria, FlightError> {
        let mut criteria = SearchCriteria::one_way(origin, destination, departure_date)?;
        criteria.currency = self.currency.clone();
        criteria.max_results = self.max_results;
        Ok(criteria)
    }
}
