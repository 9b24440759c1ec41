//! Route grouping: cluster offers for the same physical flight so every
//! cabin and fare of that flight is shown as one result.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::debug;

use crate::model::NormalizedFlight;

const HOUR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Grouping identity: carrier, flight number, route and departure hour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round a departure timestamp down to the hour by zeroing minutes and
/// seconds of its wall-clock time.
///
/// An offset, when present, is dropped after truncation: departure times are
/// local to the origin airport, so `18:30+00:00` and `18:30` land in the same
/// hour. Anything unparseable is used verbatim so it still groups
/// deterministically.
pub fn departure_hour(departure: &str) -> String {
    let departure = departure.trim();

    let wall_clock = DateTime::parse_from_rfc3339(departure)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(departure, fmt).ok())
        });

    wall_clock
        .and_then(|dt| dt.with_minute(0)?.with_second(0)?.with_nanosecond(0))
        .map(|hour| hour.format(HOUR_FORMAT).to_string())
        .unwrap_or_else(|| departure.to_string())
}

/// Build the route key for one offer. Carrier and flight number are
/// compared case-insensitively.
pub fn route_key(flight: &NormalizedFlight) -> RouteKey {
    RouteKey(format!(
        "{}|{}|{}|{}|{}",
        flight.carrier.trim().to_uppercase(),
        flight.flight_number.trim().to_uppercase(),
        flight.origin.trim().to_uppercase(),
        flight.destination.trim().to_uppercase(),
        departure_hour(&flight.departure)
    ))
}

/// Offers bucketed by route, in first-seen order. Each bucket is price-ascending.
#[derive(Debug, Clone, Default)]
pub struct RouteGroups {
    groups: Vec<(RouteKey, Vec<NormalizedFlight>)>,
}

impl RouteGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &RouteKey) -> Option<&[NormalizedFlight]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, offers)| offers.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteKey, &[NormalizedFlight])> {
        self.groups.iter().map(|(k, offers)| (k, offers.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.groups.iter().map(|(k, _)| k)
    }

    /// Number of offers across all buckets.
    pub fn total_offers(&self) -> usize {
        self.groups.iter().map(|(_, offers)| offers.len()).sum()
    }

    pub fn into_inner(self) -> Vec<(RouteKey, Vec<NormalizedFlight>)> {
        self.groups
    }

    /// One record per route: a copy of the cheapest offer carrying the whole
    /// bucket (itself included) as `fare_options`.
    pub fn into_display_records(self) -> Vec<NormalizedFlight> {
        self.groups
            .into_iter()
            .filter_map(|(_, offers)| {
                let mut display = offers.first()?.clone();
                display.fare_options = Some(offers);
                Some(display)
            })
            .collect()
    }
}

/// Group offers by [`route_key`].
pub fn group_offers_by_route(flights: Vec<NormalizedFlight>) -> RouteGroups {
    let mut groups: Vec<(RouteKey, Vec<NormalizedFlight>)> = Vec::new();
    let mut index: HashMap<RouteKey, usize> = HashMap::new();

    for flight in flights {
        let key = route_key(&flight);
        match index.get(&key) {
            Some(&position) => groups[position].1.push(flight),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![flight]));
            }
        }
    }

    for (_, offers) in &mut groups {
        offers.sort_by(|a, b| a.price.total_cmp(&b.price));
    }

    debug!(routes = groups.len(), "Grouped offers by route");

    RouteGroups { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_flights;
    use crate::merge::tests::flight;
    use crate::ApiSource;
    use test_case::test_case;

    #[test_case("2025-08-15T16:05:00", "2025-08-15T16:00:00"; "naive seconds")]
    #[test_case("2025-08-15T16:59", "2025-08-15T16:00:00"; "naive minutes")]
    #[test_case("2025-08-15T16:05:00.000", "2025-08-15T16:00:00"; "naive fractional")]
    #[test_case("2025-08-15T16:59:59+02:00", "2025-08-15T16:00:00"; "offset keeps wall clock")]
    #[test_case("2025-08-15T23:30:00-01:00", "2025-08-15T23:00:00"; "negative offset stays on its day")]
    #[test_case("2025-08-15T10:15:00+05:30", "2025-08-15T10:00:00"; "half hour offset early")]
    #[test_case("2025-08-15T10:45:00+05:30", "2025-08-15T10:00:00"; "half hour offset late")]
    #[test_case("sometime", "sometime"; "unparseable verbatim")]
    fn test_departure_hour(input: &str, expected: &str) {
        assert_eq!(departure_hour(input), expected);
    }

    #[test]
    fn test_rounds_down_not_nearest() {
        assert_eq!(departure_hour("2025-08-15T16:45:00"), "2025-08-15T16:00:00");
    }

    #[test]
    fn test_zero_offset_and_naive_share_an_hour() {
        assert_eq!(
            departure_hour("2025-08-15T18:30:00+00:00"),
            departure_hour("2025-08-15T18:30")
        );
        assert_eq!(
            departure_hour("2025-08-15T18:05:00Z"),
            departure_hour("2025-08-15T18:55:10")
        );
    }

    #[test]
    fn test_half_hour_offset_departures_group_together() {
        let mut a = flight(ApiSource::Duffel, "a", 410.0);
        a.departure = "2025-08-15T10:15:00+05:30".to_string();
        let mut b = flight(ApiSource::Amadeus, "b", 395.0);
        b.departure = "2025-08-15T10:45:00".to_string();

        let groups = group_offers_by_route(vec![a, b]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.total_offers(), 2);
    }

    #[test]
    fn test_route_key_ignores_minutes_and_case() {
        let a = flight(ApiSource::Duffel, "a", 100.0);
        let mut b = flight(ApiSource::Amadeus, "b", 100.0);
        b.carrier = "UNITED AIRLINES".to_string();
        b.departure = "2025-08-15T16:20:00".to_string();
        assert_eq!(route_key(&a), route_key(&b));

        b.departure = "2025-08-15T17:05:00".to_string();
        assert_ne!(route_key(&a), route_key(&b));
    }

    #[test]
    fn test_group_empty() {
        let groups = group_offers_by_route(vec![]);
        assert!(groups.is_empty());
        assert!(groups.into_display_records().is_empty());
    }

    #[test]
    fn test_buckets_are_price_ascending_regardless_of_input_order() {
        let mut other = flight(ApiSource::Duffel, "z", 80.0);
        other.flight_number = "UA1".to_string();

        let groups = group_offers_by_route(vec![
            flight(ApiSource::Duffel, "a", 700.0),
            other,
            flight(ApiSource::Amadeus, "b", 300.0),
            flight(ApiSource::Duffel, "c", 500.0),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.total_offers(), 4);
        for (_, offers) in groups.iter() {
            assert!(offers.windows(2).all(|w| w[0].price <= w[1].price));
        }

        let first_key = groups.keys().next().unwrap().clone();
        let prices: Vec<f64> = groups.get(&first_key).unwrap().iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![300.0, 500.0, 700.0]);
    }

    #[test]
    fn test_cross_provider_offers_share_a_display_record() {
        let merged = merge_flights(vec![
            vec![flight(ApiSource::Duffel, "X", 520.0)],
            vec![flight(ApiSource::Amadeus, "X", 480.0)],
        ]);
        assert_eq!(merged.len(), 2);

        let display = group_offers_by_route(merged).into_display_records();
        assert_eq!(display.len(), 1);

        let record = &display[0];
        assert_eq!(record.price, 480.0);
        assert_eq!(record.api_source, ApiSource::Amadeus);
        let options = record.fare_options.as_ref().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].api_source, ApiSource::Amadeus);
        assert_eq!(options[1].api_source, ApiSource::Duffel);
        assert!(options.iter().all(|o| o.fare_options.is_none()));
        assert_eq!(record.fare_option_count(), 2);
    }

    #[test]
    fn test_every_input_lands_in_exactly_one_bucket() {
        let mut input = Vec::new();
        for i in 0..12 {
            let mut f = flight(ApiSource::Duffel, &format!("id{}", i), 100.0 + i as f64);
            f.flight_number = format!("UA{}", i % 3);
            f.departure = format!("2025-08-15T{:02}:{:02}:00", 8 + i % 2, i * 4);
            input.push(f);
        }

        let groups = group_offers_by_route(input.clone());
        assert_eq!(groups.total_offers(), input.len());

        for f in &input {
            let hits = groups
                .iter()
                .filter(|(_, offers)| offers.iter().any(|o| o.id == f.id))
                .count();
            assert_eq!(hits, 1);
        }
    }
}
