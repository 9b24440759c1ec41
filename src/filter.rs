//! Post-processing over a flat offer list: filtering, display grouping and
//! sorting. Nothing here is required by the merge pipeline.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::model::NormalizedFlight;
use crate::{CabinClass, FlightError};

/// Optional constraints, combined with AND. `None` imposes nothing.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub max_price: Option<f64>,
    pub max_stops: Option<u32>,
    /// Matched against the carrier name or the flight-number prefix.
    pub preferred_carriers: Option<Vec<String>>,
    pub cabin_class: Option<CabinClass>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.max_price.is_none()
            && self.max_stops.is_none()
            && self.preferred_carriers.as_ref().map_or(true, Vec::is_empty)
            && self.cabin_class.is_none()
    }

    pub fn matches(&self, flight: &NormalizedFlight) -> bool {
        if !self.max_price.map_or(true, |max| flight.price <= max) {
            return false;
        }

        if !self.max_stops.map_or(true, |max| flight.stops <= max) {
            return false;
        }

        if let Some(carriers) = self.preferred_carriers.as_ref().filter(|c| !c.is_empty()) {
            let name = flight.carrier.to_lowercase();
            let number = flight.flight_number.to_lowercase();
            let preferred = carriers
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .any(|c| name.contains(&c) || number.starts_with(&c));
            if !preferred {
                return false;
            }
        }

        self.cabin_class.map_or(true, |cabin| flight.cabin_class == cabin)
    }
}

/// Keep flights satisfying every criterion, in input order.
pub fn filter_flights(flights: &[NormalizedFlight], criteria: &FilterCriteria) -> Vec<NormalizedFlight> {
    flights
        .iter()
        .filter(|flight| criteria.matches(flight))
        .cloned()
        .collect()
}

/// Display grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Carrier,
    Price,
    Duration,
    Stops,
}

impl FromStr for GroupBy {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "carrier" | "airline" => Ok(GroupBy::Carrier),
            "price" => Ok(GroupBy::Price),
            "duration" => Ok(GroupBy::Duration),
            "stops" => Ok(GroupBy::Stops),
            _ => Err(FlightError::InvalidCriteria(format!("Invalid group-by: {}", s))),
        }
    }
}

/// A labelled display bucket.
#[derive(Debug, Clone, Serialize)]
pub struct FlightGroup {
    pub label: String,
    pub flights: Vec<NormalizedFlight>,
}

pub fn price_band(price: f64) -> &'static str {
    if price < 200.0 {
        "Under 200"
    } else if price < 500.0 {
        "200-500"
    } else if price < 1000.0 {
        "500-1000"
    } else {
        "Over 1000"
    }
}

pub fn duration_band(hours: f64) -> &'static str {
    if hours < 3.0 {
        "Under 3h"
    } else if hours < 6.0 {
        "3-6h"
    } else if hours < 12.0 {
        "6-12h"
    } else {
        "Over 12h"
    }
}

pub fn stops_label(stops: u32) -> String {
    match stops {
        0 => "Non-stop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{} stops", n),
    }
}

fn group_label(flight: &NormalizedFlight, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Carrier => flight.carrier.clone(),
        GroupBy::Price => price_band(flight.price).to_string(),
        GroupBy::Duration => duration_band(parse_duration_hours(&flight.duration)).to_string(),
        GroupBy::Stops => stops_label(flight.stops),
    }
}

/// Partition flights into labelled buckets, in order of first appearance.
pub fn group_flights(flights: &[NormalizedFlight], group_by: GroupBy) -> Vec<FlightGroup> {
    let mut groups: Vec<FlightGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for flight in flights {
        let label = group_label(flight, group_by);
        match index.get(&label) {
            Some(&position) => groups[position].flights.push(flight.clone()),
            None => {
                index.insert(label.clone(), groups.len());
                groups.push(FlightGroup {
                    label,
                    flights: vec![flight.clone()],
                });
            }
        }
    }

    groups
}

fn duration_regex() -> &'static Regex {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    DURATION.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Parse an ISO-8601 duration (`PT7H45M`, `P1DT2H`) into fractional hours.
/// Anything that does not parse counts as zero.
pub fn parse_duration_hours(duration: &str) -> f64 {
    let Some(captures) = duration_regex().captures(duration.trim()) else {
        return 0.0;
    };

    let part = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    part(1) * 24.0 + part(2) + part(3) / 60.0 + part(4) / 3600.0
}

/// Sort order for result lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Price,
    Duration,
    Departure,
    Stops,
}

impl FromStr for SortBy {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(SortBy::Price),
            "duration" => Ok(SortBy::Duration),
            "departure" => Ok(SortBy::Departure),
            "stops" => Ok(SortBy::Stops),
            _ => Err(FlightError::InvalidCriteria(format!("Invalid sort order: {}", s))),
        }
    }
}

/// Stable sort in place; ties keep their current order.
pub fn sort_flights(flights: &mut [NormalizedFlight], sort_by: SortBy) {
    match sort_by {
        SortBy::Price => flights.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortBy::Duration => flights.sort_by(|a, b| {
            parse_duration_hours(&a.duration).total_cmp(&parse_duration_hours(&b.duration))
        }),
        SortBy::Departure => flights.sort_by(|a, b| a.departure.cmp(&b.departure)),
        SortBy::Stops => flights.sort_by_key(|f| f.stops),
    }
}
