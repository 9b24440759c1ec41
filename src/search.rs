//! Search orchestration: fan out to every provider, tolerate failures, then
//! merge and group whatever came back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::filter::{sort_flights, FilterCriteria, SortBy};
use crate::grouping::group_offers_by_route;
use crate::merge::merge_flights;
use crate::model::NormalizedFlight;
use crate::providers::{AmadeusClient, DuffelClient, FlightProvider};
use crate::{ApiSource, FlightError, SearchCriteria};

/// How one provider fared during a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderStatus {
    Succeeded { offers: usize },
    Failed { error: String },
    TimedOut { after_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub provider: ApiSource,
    #[serde(flatten)]
    pub status: ProviderStatus,
    pub duration_ms: u64,
}

/// Result of a search: one display record per route plus per-provider reports.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub flights: Vec<NormalizedFlight>,
    /// Offers left after merging, before route grouping.
    pub total_offers: usize,
    /// Routes that passed the filter, before the result cap.
    pub matching_routes: usize,
    pub providers: Vec<ProviderReport>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

/// Runs a search across a set of injected providers.
pub struct FlightSearchService {
    providers: Vec<Arc<dyn FlightProvider>>,
    provider_timeout: Duration,
}

impl FlightSearchService {
    pub fn new(provider_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn FlightProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the service with every provider that has credentials configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, FlightError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.provider_timeout)
            .build()?;

        let mut service = Self::new(config.provider_timeout);

        match &config.duffel {
            Some(duffel) => {
                service = service.with_provider(Arc::new(
                    DuffelClient::new(http_client.clone(), duffel.access_token.clone())
                        .with_base_url(&duffel.base_url),
                ));
            }
            None => warn!("DUFFEL_ACCESS_TOKEN not set, Duffel disabled"),
        }

        match &config.amadeus {
            Some(amadeus) => {
                service = service.with_provider(Arc::new(
                    AmadeusClient::new(
                        http_client,
                        amadeus.client_id.clone(),
                        amadeus.client_secret.clone(),
                    )
                    .with_base_url(&amadeus.base_url),
                ));
            }
            None => warn!("AMADEUS_CLIENT_ID/AMADEUS_CLIENT_SECRET not set, Amadeus disabled"),
        }

        if service.providers.is_empty() {
            return Err(FlightError::ConfigError(
                "no flight providers configured".to_string(),
            ));
        }

        Ok(service)
    }

    pub fn providers(&self) -> impl Iterator<Item = ApiSource> + '_ {
        self.providers.iter().map(|p| p.source())
    }

    /// Query every provider concurrently. A failed or timed-out provider
    /// contributes an empty list.
    #[instrument(level = "info", skip(self, criteria), fields(providers = self.providers.len()))]
    pub async fn gather(
        &self,
        criteria: &SearchCriteria,
    ) -> (Vec<Vec<NormalizedFlight>>, Vec<ProviderReport>) {
        let timeout = self.provider_timeout;
        let calls = self.providers.iter().map(|provider| async move {
            let source = provider.source();
            let start_time = Instant::now();
            let result = tokio::time::timeout(timeout, provider.search(criteria)).await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let (flights, status) = match result {
                Ok(Ok(flights)) => {
                    info!(provider = %source, offers = flights.len(), duration_ms, "Provider search succeeded");
                    let offers = flights.len();
                    (flights, ProviderStatus::Succeeded { offers })
                }
                Ok(Err(e)) => {
                    warn!(provider = %source, error = %e, duration_ms, "Provider search failed");
                    (Vec::new(), ProviderStatus::Failed { error: e.to_string() })
                }
                Err(_) => {
                    let after_ms = timeout.as_millis() as u64;
                    warn!(provider = %source, after_ms, "Provider search timed out");
                    (Vec::new(), ProviderStatus::TimedOut { after_ms })
                }
            };

            (
                flights,
                ProviderReport {
                    provider: source,
                    status,
                    duration_ms,
                },
            )
        });

        join_all(calls).await.into_iter().unzip()
    }

    /// Unfiltered search, cheapest routes first.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, FlightError> {
        self.search_filtered(criteria, &FilterCriteria::default(), SortBy::Price)
            .await
    }

    /// Validate, gather, merge and group, then filter and sort the display
    /// records before capping them at `criteria.max_results`. Provider
    /// failures never surface as an error here; only invalid criteria do.
    #[instrument(level = "info", skip(self, criteria, filter), fields(origin = %criteria.origin, destination = %criteria.destination))]
    pub async fn search_filtered(
        &self,
        criteria: &SearchCriteria,
        filter: &FilterCriteria,
        sort_by: SortBy,
    ) -> Result<SearchOutcome, FlightError> {
        criteria.validate()?;

        let (provider_results, reports) = self.gather(criteria).await;

        let merged = merge_flights(provider_results);
        let total_offers = merged.len();
        let groups = group_offers_by_route(merged);
        debug!(offers = total_offers, routes = groups.len(), "Grouped merged offers");

        let mut flights = groups.into_display_records();
        if !filter.is_empty() {
            flights.retain(|flight| filter.matches(flight));
        }
        sort_flights(&mut flights, sort_by);
        let matching_routes = flights.len();
        flights.truncate(criteria.max_results);

        info!(
            offers = total_offers,
            matching_routes,
            results = flights.len(),
            "Flight search completed"
        );

        Ok(SearchOutcome {
            flights,
            total_offers,
            matching_routes,
            providers: reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_a_provider() {
        let result = FlightSearchService::from_config(&AppConfig::default());
        assert!(matches!(result, Err(FlightError::ConfigError(_))));
    }

    #[test]
    fn test_from_config_registers_configured_providers() {
        let config = AppConfig {
            duffel: Some(crate::config::DuffelConfig {
                access_token: "duffel_test".to_string(),
                base_url: "http://127.0.0.1:9".to_string(),
            }),
            ..AppConfig::default()
        };
        let service = FlightSearchService::from_config(&config).unwrap();
        assert_eq!(service.providers().collect::<Vec<_>>(), vec![ApiSource::Duffel]);
    }

    #[test]
    fn test_provider_report_serialization() {
        let report = ProviderReport {
            provider: ApiSource::Amadeus,
            status: ProviderStatus::TimedOut { after_ms: 20_000 },
            duration_ms: 20_001,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["provider"], "amadeus");
        assert_eq!(json["status"], "timed_out");
        assert_eq!(json["after_ms"], 20_000);
    }
}
