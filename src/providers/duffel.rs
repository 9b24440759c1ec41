//! Duffel adapter.
//!
//! Offers come back from `POST /air/offer_requests?return_offers=true`. Each
//! offer carries slices, each slice its segments, and each segment a
//! per-passenger block with cabin, baggage and structured amenity data.
//!
//! # API Reference
//!
//! See: <https://duffel.com/docs/api/offer-requests/create-offer-request>

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use super::{normalize_batch, offer_list, raw_offer_id, FlightProvider};
use crate::model::{Amenities, BaggageAllowance, NormalizedFlight};
use crate::normalize::{
    display_name, extract_baggage, heuristic_amenities, normalize_cabin_class, parse_price,
    stops_for_segments,
};
use crate::{ApiSource, FlightError, SearchCriteria};

/// Base URL for the Duffel API.
pub const DUFFEL_API_BASE: &str = "https://api.duffel.com";

const DUFFEL_VERSION: &str = "v2";

/// Raw Duffel offer, only the parts normalization reads.
#[derive(Debug, Clone, Deserialize)]
pub struct DuffelOffer {
    pub id: String,
    pub total_amount: String,
    pub total_currency: String,
    #[serde(default)]
    pub owner: Option<DuffelCarrier>,
    pub slices: Vec<DuffelSlice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelCarrier {
    pub name: Option<String>,
    pub iata_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelSlice {
    pub origin: DuffelPlace,
    pub destination: DuffelPlace,
    pub duration: Option<String>,
    pub segments: Vec<DuffelSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelPlace {
    pub iata_code: String,
    pub city_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelSegment {
    pub departing_at: String,
    pub arriving_at: String,
    pub marketing_carrier: Option<DuffelCarrier>,
    pub marketing_carrier_flight_number: Option<String>,
    #[serde(default)]
    pub passengers: Vec<DuffelSegmentPassenger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelSegmentPassenger {
    pub cabin_class: Option<String>,
    pub cabin_class_marketing_name: Option<String>,
    #[serde(default)]
    pub baggages: Vec<DuffelBaggage>,
    pub cabin: Option<DuffelCabin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelBaggage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelCabin {
    pub amenities: Option<DuffelAmenities>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelAmenities {
    pub wifi: Option<DuffelAvailability>,
    pub power: Option<DuffelAvailability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuffelAvailability {
    pub available: Option<bool>,
}

/// Client for Duffel offer requests.
#[derive(Clone)]
pub struct DuffelClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl DuffelClient {
    /// Create a client on a caller-supplied HTTP handle.
    pub fn new(http_client: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: DUFFEL_API_BASE.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Point the client at a different host (sandbox or test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request body for an offer request.
    pub fn offer_request_body(criteria: &SearchCriteria) -> Value {
        let mut slices = vec![json!({
            "origin": criteria.origin,
            "destination": criteria.destination,
            "departure_date": criteria.departure_date.format("%Y-%m-%d").to_string(),
        })];
        if let Some(return_date) = criteria.return_date {
            slices.push(json!({
                "origin": criteria.destination,
                "destination": criteria.origin,
                "departure_date": return_date.format("%Y-%m-%d").to_string(),
            }));
        }

        let passengers: Vec<Value> = (0..criteria.passenger_count)
            .map(|_| json!({ "type": "adult" }))
            .collect();

        let mut data = json!({
            "slices": slices,
            "passengers": passengers,
        });
        if let Some(cabin) = criteria.cabin_class {
            data["cabin_class"] = json!(cabin.as_str());
        }

        json!({ "data": data })
    }

    /// Fetch raw offers. The returned values are untouched provider JSON.
    #[instrument(level = "info", skip(self, criteria), fields(origin = %criteria.origin, destination = %criteria.destination))]
    pub async fn fetch_offers(&self, criteria: &SearchCriteria) -> Result<Vec<Value>, FlightError> {
        let url = format!("{}/air/offer_requests?return_offers=true", self.base_url);
        info!(url = %url, "Requesting Duffel offers");

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Duffel-Version", DUFFEL_VERSION)
            .header("Accept", "application/json")
            .json(&Self::offer_request_body(criteria))
            .send()
            .await?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Duffel request completed"
        );

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, "Duffel request failed");
            return Err(FlightError::ProviderResponse {
                provider: ApiSource::Duffel,
                status: status.as_u16(),
                message,
            });
        }

        let mut body: Value = response.json().await?;
        let offers = offer_list(ApiSource::Duffel, &mut body, "/data/offers")?;
        debug!(offers = offers.len(), "Received Duffel offers");
        Ok(offers)
    }

    /// Normalize one raw Duffel offer.
    pub fn normalize_offer(raw: &Value) -> Result<NormalizedFlight, FlightError> {
        let malformed = |reason: String| FlightError::MalformedOffer {
            provider: ApiSource::Duffel,
            offer_id: raw_offer_id(raw),
            reason,
        };

        let offer: DuffelOffer =
            serde_json::from_value(raw.clone()).map_err(|e| malformed(e.to_string()))?;
        let slice = offer
            .slices
            .first()
            .ok_or_else(|| malformed("offer has no slices".to_string()))?;
        let first_segment = slice
            .segments
            .first()
            .ok_or_else(|| malformed("first slice has no segments".to_string()))?;
        let last_segment = slice.segments.last().unwrap_or(first_segment);
        let price = parse_price(&offer.total_amount)
            .ok_or_else(|| malformed(format!("unparseable total_amount {:?}", offer.total_amount)))?;

        let marketing = first_segment.marketing_carrier.as_ref();
        let carrier_code = marketing
            .and_then(|c| c.iata_code.clone())
            .or_else(|| offer.owner.as_ref().and_then(|o| o.iata_code.clone()))
            .unwrap_or_default();
        let carrier = marketing
            .and_then(|c| c.name.clone())
            .or_else(|| offer.owner.as_ref().and_then(|o| o.name.clone()))
            .unwrap_or_else(|| carrier_code.clone());
        let flight_number = format!(
            "{}{}",
            carrier_code,
            first_segment.marketing_carrier_flight_number.as_deref().unwrap_or_default()
        );

        let passenger = first_segment.passengers.first();
        let cabin_class = normalize_cabin_class(&[
            passenger.and_then(|p| p.cabin_class_marketing_name.as_deref()),
            passenger.and_then(|p| p.cabin_class.as_deref()),
        ]);

        let amenities = passenger
            .and_then(|p| p.cabin.as_ref())
            .and_then(|c| c.amenities.as_ref())
            .map(|a| Amenities {
                wifi: a.wifi.as_ref().and_then(|w| w.available),
                power: a.power.as_ref().and_then(|p| p.available),
                entertainment: None,
                meals: None,
                estimated: false,
            })
            .unwrap_or_else(|| heuristic_amenities(cabin_class));

        let baggage = passenger.map(|p| {
            extract_baggage(
                p.baggages
                    .iter()
                    .map(|b| (b.kind.as_str(), BaggageAllowance::pieces(b.quantity))),
            )
        });

        Ok(NormalizedFlight {
            id: offer.id.clone(),
            carrier,
            flight_number,
            origin: slice.origin.iata_code.clone(),
            destination: slice.destination.iata_code.clone(),
            origin_name: display_name(
                slice.origin.city_name.as_deref().or(slice.origin.name.as_deref()),
                &slice.origin.iata_code,
            ),
            destination_name: display_name(
                slice.destination.city_name.as_deref().or(slice.destination.name.as_deref()),
                &slice.destination.iata_code,
            ),
            departure: first_segment.departing_at.clone(),
            arrival: last_segment.arriving_at.clone(),
            duration: slice.duration.clone().unwrap_or_default(),
            price,
            currency: offer.total_currency.to_uppercase(),
            cabin_class,
            stops: stops_for_segments(slice.segments.len()),
            api_source: ApiSource::Duffel,
            amenities: Some(amenities),
            baggage: Some(baggage.unwrap_or_default()),
            fare_options: None,
            raw_data: raw.clone(),
        })
    }
}

#[async_trait]
impl FlightProvider for DuffelClient {
    fn source(&self) -> ApiSource {
        ApiSource::Duffel
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<NormalizedFlight>, FlightError> {
        let raw_offers = self.fetch_offers(criteria).await?;
        Ok(normalize_batch(
            ApiSource::Duffel,
            &raw_offers,
            &criteria.currency,
            Self::normalize_offer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CabinClass;

    fn sample_offer() -> Value {
        json!({
            "id": "off_0000AEdGRhtp5AUUdJqMxo",
            "total_amount": "450.00",
            "total_currency": "usd",
            "owner": { "name": "United Airlines", "iata_code": "UA" },
            "slices": [{
                "origin": { "iata_code": "SFO", "city_name": "San Francisco", "name": "San Francisco International" },
                "destination": { "iata_code": "LHR", "city_name": "London", "name": "Heathrow" },
                "duration": "PT10H25M",
                "segments": [{
                    "departing_at": "2025-08-15T16:05:00",
                    "arriving_at": "2025-08-16T10:30:00",
                    "marketing_carrier": { "name": "United Airlines", "iata_code": "UA" },
                    "marketing_carrier_flight_number": "901",
                    "passengers": [{
                        "cabin_class": "business",
                        "cabin_class_marketing_name": "Polaris",
                        "baggages": [
                            { "type": "checked", "quantity": 2 },
                            { "type": "carry_on", "quantity": 1 }
                        ],
                        "cabin": {
                            "amenities": {
                                "wifi": { "available": true, "cost": "paid" },
                                "power": { "available": true }
                            }
                        }
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_normalize_full_offer() {
        let flight = DuffelClient::normalize_offer(&sample_offer()).unwrap();

        assert_eq!(flight.id, "off_0000AEdGRhtp5AUUdJqMxo");
        assert_eq!(flight.carrier, "United Airlines");
        assert_eq!(flight.flight_number, "UA901");
        assert_eq!(flight.origin, "SFO");
        assert_eq!(flight.destination_name, "London");
        assert_eq!(flight.price, 450.0);
        assert_eq!(flight.currency, "USD");
        assert_eq!(flight.cabin_class, CabinClass::Business);
        assert_eq!(flight.stops, 0);
        assert_eq!(flight.api_source, ApiSource::Duffel);
        assert!(flight.fare_options.is_none());

        let amenities = flight.amenities.unwrap();
        assert_eq!(amenities.wifi, Some(true));
        assert_eq!(amenities.meals, None);
        assert!(!amenities.estimated);

        let baggage = flight.baggage.unwrap();
        assert_eq!(baggage.checked.quantity, 2);
        assert_eq!(baggage.carry_on.quantity, 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = sample_offer();
        let first = DuffelClient::normalize_offer(&raw).unwrap();
        let second = DuffelClient::normalize_offer(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_minimal_offer_uses_defaults() {
        let raw = json!({
            "id": "off_min",
            "total_amount": "99.99",
            "total_currency": "USD",
            "slices": [{
                "origin": { "iata_code": "JFK" },
                "destination": { "iata_code": "BOS" },
                "segments": [
                    { "departing_at": "2025-08-15T07:00:00", "arriving_at": "2025-08-15T08:00:00" },
                    { "departing_at": "2025-08-15T09:00:00", "arriving_at": "2025-08-15T10:15:00" }
                ]
            }]
        });

        let flight = DuffelClient::normalize_offer(&raw).unwrap();
        assert_eq!(flight.origin_name, "JFK");
        assert_eq!(flight.stops, 1);
        assert_eq!(flight.arrival, "2025-08-15T10:15:00");
        assert_eq!(flight.cabin_class, CabinClass::Economy);
        assert_eq!(flight.duration, "");
        assert!(flight.amenities.unwrap().estimated);
        assert_eq!(flight.baggage.unwrap().carry_on.quantity, 1);
    }

    #[test]
    fn test_normalize_rejects_missing_segments() {
        let mut raw = sample_offer();
        raw["slices"][0]["segments"] = json!([]);
        let result = DuffelClient::normalize_offer(&raw);
        assert!(matches!(result, Err(FlightError::MalformedOffer { provider: ApiSource::Duffel, .. })));
    }

    #[test]
    fn test_normalize_rejects_bad_price() {
        let mut raw = sample_offer();
        raw["total_amount"] = json!("n/a");
        assert!(DuffelClient::normalize_offer(&raw).is_err());

        let mut raw = sample_offer();
        raw.as_object_mut().unwrap().remove("slices");
        assert!(DuffelClient::normalize_offer(&raw).is_err());
    }

    #[test]
    fn test_offer_request_body() {
        let mut criteria = SearchCriteria::one_way("SFO", "LHR", "2025-08-15")
            .unwrap()
            .with_return_date("2025-08-22")
            .unwrap();
        criteria.passenger_count = 2;
        criteria.cabin_class = Some(CabinClass::PremiumEconomy);

        let body = DuffelClient::offer_request_body(&criteria);
        assert_eq!(body["data"]["slices"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["slices"][1]["origin"], "LHR");
        assert_eq!(body["data"]["passengers"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["cabin_class"], "premium_economy");
    }

    #[test]
    fn test_batch_skips_malformed_and_foreign_currency() {
        let mut eur = sample_offer();
        eur["id"] = json!("off_eur");
        eur["total_currency"] = json!("EUR");
        let broken = json!({ "id": "off_broken" });

        let flights = normalize_batch(
            ApiSource::Duffel,
            &[sample_offer(), broken, eur],
            "USD",
            DuffelClient::normalize_offer,
        );
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].id, "off_0000AEdGRhtp5AUUdJqMxo");
    }
}
