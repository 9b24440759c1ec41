//! Amadeus Self-Service adapter.
//!
//! Uses the OAuth2 client-credentials flow, then
//! `GET /v2/shopping/flight-offers`. Carrier names are not on the offer
//! itself; they come from the response's `dictionaries.carriers` table.
//!
//! # API Reference
//!
//! See: <https://developers.amadeus.com/self-service/category/flights/api-doc/flight-offers-search>

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use super::{normalize_batch, offer_list, raw_offer_id, FlightProvider};
use crate::model::{BaggageAllowance, NormalizedFlight};
use crate::normalize::{
    amenities_from_kinds, classify_amenity, display_name, extract_baggage, heuristic_amenities,
    normalize_cabin_class, parse_price, stops_for_segments,
};
use crate::{ApiSource, CabinClass, FlightError, SearchCriteria};

/// Base URL for the Amadeus test environment.
pub const AMADEUS_API_BASE: &str = "https://test.api.amadeus.com";

/// Refresh the token this long before Amadeus says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const POUNDS_TO_KG: f64 = 0.453_592_37;

/// Raw Amadeus flight offer, only the parts normalization reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusOffer {
    pub id: String,
    pub itineraries: Vec<AmadeusItinerary>,
    pub price: AmadeusPrice,
    #[serde(default)]
    pub traveler_pricings: Vec<AmadeusTravelerPricing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmadeusItinerary {
    pub duration: Option<String>,
    pub segments: Vec<AmadeusSegment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusSegment {
    pub id: Option<String>,
    pub departure: AmadeusEndpoint,
    pub arrival: AmadeusEndpoint,
    pub carrier_code: String,
    pub number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusEndpoint {
    pub iata_code: String,
    pub at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusPrice {
    pub currency: String,
    pub total: Option<String>,
    pub grand_total: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusTravelerPricing {
    #[serde(default)]
    pub fare_details_by_segment: Vec<AmadeusFareDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusFareDetails {
    pub segment_id: Option<String>,
    pub cabin: Option<String>,
    pub branded_fare_label: Option<String>,
    pub included_checked_bags: Option<AmadeusBags>,
    pub included_cabin_bags: Option<AmadeusBags>,
    #[serde(default)]
    pub amenities: Vec<AmadeusAmenity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusBags {
    pub quantity: Option<u32>,
    pub weight: Option<u32>,
    pub weight_unit: Option<String>,
}

impl AmadeusBags {
    /// A weight-only allowance means one bag up to that weight.
    fn allowance(&self) -> BaggageAllowance {
        let weight = self.weight.map(|w| match self.weight_unit.as_deref() {
            Some(unit) if unit.eq_ignore_ascii_case("LB") => (f64::from(w) * POUNDS_TO_KG).round() as u32,
            _ => w,
        });
        let quantity = self
            .quantity
            .unwrap_or(if weight.is_some() { 1 } else { 0 });
        BaggageAllowance { quantity, weight }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusAmenity {
    pub description: Option<String>,
    pub amenity_type: Option<String>,
    pub is_chargeable: Option<bool>,
}

/// Lookup tables shipped alongside the offers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmadeusDictionaries {
    #[serde(default)]
    pub carriers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client for the Amadeus flight offers search.
#[derive(Clone)]
pub struct AmadeusClient {
    http_client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl AmadeusClient {
    /// Create a client on a caller-supplied HTTP handle.
    pub fn new(
        http_client: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: AMADEUS_API_BASE.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Point the client at a different host (production or test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Query string for a flight offers search.
    pub fn search_params(criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("originLocationCode", criteria.origin.clone()),
            ("destinationLocationCode", criteria.destination.clone()),
            ("departureDate", criteria.departure_date.format("%Y-%m-%d").to_string()),
            ("adults", criteria.passenger_count.to_string()),
            ("currencyCode", criteria.currency.to_uppercase()),
            ("max", criteria.max_results.to_string()),
        ];
        if let Some(return_date) = criteria.return_date {
            params.push(("returnDate", return_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(cabin) = criteria.cabin_class {
            params.push(("travelClass", travel_class(cabin).to_string()));
        }
        params
    }

    async fn access_token(&self) -> Result<String, FlightError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Amadeus access token");
        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, "Amadeus token request failed");
            return Err(FlightError::AuthError(format!(
                "Amadeus token request failed with status {}: {}",
                status, message
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    /// Fetch raw offers together with the response dictionaries.
    #[instrument(level = "info", skip(self, criteria), fields(origin = %criteria.origin, destination = %criteria.destination))]
    pub async fn fetch_offers(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<(Vec<Value>, AmadeusDictionaries), FlightError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/shopping/flight-offers", self.base_url);
        info!(url = %url, "Requesting Amadeus offers");

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&Self::search_params(criteria))
            .send()
            .await?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Amadeus request completed"
        );

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, "Amadeus request failed");
            return Err(FlightError::ProviderResponse {
                provider: ApiSource::Amadeus,
                status: status.as_u16(),
                message,
            });
        }

        let mut body: Value = response.json().await?;
        let offers = offer_list(ApiSource::Amadeus, &mut body, "/data")?;
        let dictionaries = body
            .get_mut("dictionaries")
            .map(Value::take)
            .map(serde_json::from_value::<AmadeusDictionaries>)
            .transpose()?
            .unwrap_or_default();

        debug!(offers = offers.len(), carriers = dictionaries.carriers.len(), "Received Amadeus offers");
        Ok((offers, dictionaries))
    }

    /// Normalize one raw Amadeus offer.
    pub fn normalize_offer(
        raw: &Value,
        dictionaries: &AmadeusDictionaries,
    ) -> Result<NormalizedFlight, FlightError> {
        let malformed = |reason: String| FlightError::MalformedOffer {
            provider: ApiSource::Amadeus,
            offer_id: raw_offer_id(raw),
            reason,
        };

        let offer: AmadeusOffer =
            serde_json::from_value(raw.clone()).map_err(|e| malformed(e.to_string()))?;
        let itinerary = offer
            .itineraries
            .first()
            .ok_or_else(|| malformed("offer has no itineraries".to_string()))?;
        let first_segment = itinerary
            .segments
            .first()
            .ok_or_else(|| malformed("first itinerary has no segments".to_string()))?;
        let last_segment = itinerary.segments.last().unwrap_or(first_segment);
        let price = offer
            .price
            .grand_total
            .as_deref()
            .or(offer.price.total.as_deref())
            .and_then(parse_price)
            .ok_or_else(|| malformed("missing or unparseable price total".to_string()))?;

        let carrier_code = first_segment.carrier_code.trim().to_uppercase();
        let carrier = dictionaries
            .carriers
            .get(&carrier_code)
            .cloned()
            .unwrap_or_else(|| carrier_code.clone());
        let flight_number = format!("{}{}", carrier_code, first_segment.number.trim());

        // Fare details for the first segment, first traveler.
        let fare_details = offer.traveler_pricings.first().and_then(|pricing| {
            let details = &pricing.fare_details_by_segment;
            details
                .iter()
                .find(|d| d.segment_id.is_some() && d.segment_id == first_segment.id)
                .or_else(|| details.first())
        });

        let cabin_class = normalize_cabin_class(&[
            fare_details.and_then(|d| d.branded_fare_label.as_deref()),
            fare_details.and_then(|d| d.cabin.as_deref()),
        ]);

        let amenities = match fare_details {
            Some(details) if !details.amenities.is_empty() => {
                amenities_from_kinds(details.amenities.iter().filter_map(|a| {
                    classify_amenity(a.amenity_type.as_deref(), a.description.as_deref())
                }))
            }
            _ => heuristic_amenities(cabin_class),
        };

        let baggage = extract_baggage(fare_details.into_iter().flat_map(|d| {
            let carry_on = d.included_cabin_bags.as_ref().map(|b| ("carry_on", b.allowance()));
            let checked = d.included_checked_bags.as_ref().map(|b| ("checked", b.allowance()));
            carry_on.into_iter().chain(checked)
        }));

        let origin = first_segment.departure.iata_code.clone();
        let destination = last_segment.arrival.iata_code.clone();

        Ok(NormalizedFlight {
            id: offer.id.clone(),
            carrier,
            flight_number,
            origin_name: display_name(None, &origin),
            destination_name: display_name(None, &destination),
            origin,
            destination,
            departure: first_segment.departure.at.clone(),
            arrival: last_segment.arrival.at.clone(),
            duration: itinerary.duration.clone().unwrap_or_default(),
            price,
            currency: offer.price.currency.to_uppercase(),
            cabin_class,
            stops: stops_for_segments(itinerary.segments.len()),
            api_source: ApiSource::Amadeus,
            amenities: Some(amenities),
            baggage: Some(baggage),
            fare_options: None,
            raw_data: raw.clone(),
        })
    }
}

fn travel_class(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "ECONOMY",
        CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
        CabinClass::Business => "BUSINESS",
        CabinClass::First => "FIRST",
    }
}

#[async_trait]
impl FlightProvider for AmadeusClient {
    fn source(&self) -> ApiSource {
        ApiSource::Amadeus
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<NormalizedFlight>, FlightError> {
        let (raw_offers, dictionaries) = self.fetch_offers(criteria).await?;
        Ok(normalize_batch(
            ApiSource::Amadeus,
            &raw_offers,
            &criteria.currency,
            |raw| Self::normalize_offer(raw, &dictionaries),
        ))
    }
}
