//! Normalization helpers shared by every provider adapter.
//!
//! Adapters own their raw schemas; the vocabulary rules that must agree
//! across providers (cabin classes, amenity kinds, baggage defaults) live here.

use crate::model::{Amenities, Baggage, BaggageAllowance};
use crate::CabinClass;

// Checked in this order: business, then premium economy, then first.
const BUSINESS_KEYWORDS: &[&str] = &[
    "business",
    "polaris",
    "delta one",
    "club world",
    "club europe",
    "upper class",
    "mint",
    "qsuite",
];
const PREMIUM_KEYWORDS: &[&str] = &["premium", "comfort"];
const FIRST_KEYWORDS: &[&str] = &["first"];

/// Match a provider cabin label against the keyword table.
///
/// Returns `None` when nothing matches so callers can fall through to the
/// next label before settling on economy.
pub fn match_cabin_keyword(label: &str) -> Option<CabinClass> {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| label.contains(k));

    if contains_any(BUSINESS_KEYWORDS) {
        Some(CabinClass::Business)
    } else if contains_any(PREMIUM_KEYWORDS) {
        Some(CabinClass::PremiumEconomy)
    } else if contains_any(FIRST_KEYWORDS) {
        Some(CabinClass::First)
    } else if label.contains("economy") || label.contains("coach") {
        Some(CabinClass::Economy)
    } else {
        None
    }
}

/// Resolve a cabin from labels in precedence order (marketing name first).
pub fn normalize_cabin_class(labels: &[Option<&str>]) -> CabinClass {
    labels
        .iter()
        .flatten()
        .find_map(|label| match_cabin_keyword(label))
        .unwrap_or(CabinClass::Economy)
}

/// The amenity flags tracked on a [`NormalizedFlight`](crate::NormalizedFlight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmenityKind {
    Wifi,
    Power,
    Entertainment,
    Meals,
}

impl AmenityKind {
    /// Map a provider amenity type code (e.g. `MEAL`, `ENTERTAINMENT`).
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "WIFI" | "WI_FI" | "INTERNET" => Some(AmenityKind::Wifi),
            "POWER" | "POWER_OUTLET" | "USB" => Some(AmenityKind::Power),
            "ENTERTAINMENT" | "IN_FLIGHT_ENTERTAINMENT" => Some(AmenityKind::Entertainment),
            "MEAL" | "MEALS" | "FOOD" => Some(AmenityKind::Meals),
            _ => None,
        }
    }

    /// Case-insensitive substring match on a free-text description.
    pub fn from_description(description: &str) -> Option<Self> {
        let text = description.to_lowercase();
        if text.contains("wifi") || text.contains("wi-fi") || text.contains("internet") {
            Some(AmenityKind::Wifi)
        } else if text.contains("power") || text.contains("usb") || text.contains("outlet") {
            Some(AmenityKind::Power)
        } else if text.contains("entertainment") || text.contains("movie") {
            Some(AmenityKind::Entertainment)
        } else if text.contains("meal") || text.contains("snack") || text.contains("food") {
            Some(AmenityKind::Meals)
        } else {
            None
        }
    }
}

/// Classify one amenity entry: the type code wins, the description is the fallback.
pub fn classify_amenity(type_code: Option<&str>, description: Option<&str>) -> Option<AmenityKind> {
    type_code
        .and_then(AmenityKind::from_type_code)
        .or_else(|| description.and_then(AmenityKind::from_description))
}

/// Fold classified entries into flags. Every flag is reported, since the
/// provider did send an amenity list.
pub fn amenities_from_kinds<I>(kinds: I) -> Amenities
where
    I: IntoIterator<Item = AmenityKind>,
{
    let mut amenities = Amenities {
        wifi: Some(false),
        power: Some(false),
        entertainment: Some(false),
        meals: Some(false),
        estimated: false,
    };

    for kind in kinds {
        match kind {
            AmenityKind::Wifi => amenities.wifi = Some(true),
            AmenityKind::Power => amenities.power = Some(true),
            AmenityKind::Entertainment => amenities.entertainment = Some(true),
            AmenityKind::Meals => amenities.meals = Some(true),
        }
    }

    amenities
}

/// Best-effort guess used when a provider sends no amenity data at all.
pub fn heuristic_amenities(cabin: CabinClass) -> Amenities {
    Amenities {
        wifi: None,
        power: None,
        entertainment: Some(cabin.is_premium()),
        meals: Some(cabin.is_premium()),
        estimated: true,
    }
}

/// Take the first `carry_on` and first `checked` entry from a per-passenger
/// baggage list. Missing entries default to one carry-on and no checked bags.
pub fn extract_baggage<'a, I>(entries: I) -> Baggage
where
    I: IntoIterator<Item = (&'a str, BaggageAllowance)>,
{
    let mut carry_on = None;
    let mut checked = None;

    for (kind, allowance) in entries {
        match kind.trim().to_lowercase().as_str() {
            "carry_on" if carry_on.is_none() => carry_on = Some(allowance),
            "checked" if checked.is_none() => checked = Some(allowance),
            _ => {}
        }
    }

    let defaults = Baggage::default();
    Baggage {
        carry_on: carry_on.unwrap_or(defaults.carry_on),
        checked: checked.unwrap_or(defaults.checked),
    }
}

/// Parse a provider decimal price string. Negative or non-finite amounts are rejected.
pub fn parse_price(amount: &str) -> Option<f64> {
    amount
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

pub fn stops_for_segments(segment_count: usize) -> u32 {
    u32::try_from(segment_count.saturating_sub(1)).unwrap_or(u32::MAX)
}

/// Display name for an airport, falling back to its IATA code.
pub fn display_name(name: Option<&str>, iata_code: &str) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(iata_code)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Premium Business Select", CabinClass::Business; "business beats premium")]
    #[test_case("Polaris", CabinClass::Business; "united brand")]
    #[test_case("Delta One Suites", CabinClass::Business; "delta brand")]
    #[test_case("Comfort+", CabinClass::PremiumEconomy; "comfort plus")]
    #[test_case("PREMIUM_ECONOMY", CabinClass::PremiumEconomy; "amadeus cabin code")]
    #[test_case("  First Class ", CabinClass::First; "padded first")]
    #[test_case("Main Cabin", CabinClass::Economy; "no keyword")]
    #[test_case("", CabinClass::Economy; "empty label")]
    fn test_cabin_normalization(label: &str, expected: CabinClass) {
        assert_eq!(normalize_cabin_class(&[Some(label)]), expected);
    }

    #[test]
    fn test_cabin_falls_through_to_next_label() {
        // Unknown marketing name, generic cabin field still resolves.
        let cabin = normalize_cabin_class(&[Some("Main Cabin"), Some("premium_economy")]);
        assert_eq!(cabin, CabinClass::PremiumEconomy);

        let cabin = normalize_cabin_class(&[None, Some("business")]);
        assert_eq!(cabin, CabinClass::Business);

        assert_eq!(normalize_cabin_class(&[]), CabinClass::Economy);
    }

    #[test]
    fn test_cabin_normalization_is_total() {
        let labels = ["", " ", "xyz", "FIRST", "Sleeper", "Economy Light", "Upper Class", "\u{2708}"];
        for label in labels {
            let cabin = normalize_cabin_class(&[Some(label)]);
            assert!(matches!(
                cabin,
                CabinClass::Economy | CabinClass::PremiumEconomy | CabinClass::Business | CabinClass::First
            ));
        }
    }

    #[test]
    fn test_classify_amenity_prefers_type_code() {
        assert_eq!(classify_amenity(Some("MEAL"), Some("Free wifi")), Some(AmenityKind::Meals));
        assert_eq!(classify_amenity(Some("BRANDED_FARES"), Some("Onboard WiFi")), Some(AmenityKind::Wifi));
        assert_eq!(classify_amenity(None, Some("In-seat power")), Some(AmenityKind::Power));
        assert_eq!(classify_amenity(None, Some("Priority boarding")), None);
        assert_eq!(classify_amenity(None, None), None);
    }

    #[test]
    fn test_amenities_from_kinds_is_an_or() {
        let amenities = amenities_from_kinds([AmenityKind::Wifi, AmenityKind::Wifi, AmenityKind::Meals]);
        assert_eq!(amenities.wifi, Some(true));
        assert_eq!(amenities.meals, Some(true));
        assert_eq!(amenities.power, Some(false));
        assert!(!amenities.estimated);
    }

    #[test]
    fn test_heuristic_amenities() {
        let economy = heuristic_amenities(CabinClass::Economy);
        assert_eq!(economy.meals, Some(false));
        assert_eq!(economy.wifi, None);
        assert!(economy.estimated);

        let business = heuristic_amenities(CabinClass::Business);
        assert_eq!(business.entertainment, Some(true));
        assert_eq!(business.meals, Some(true));
    }

    #[test]
    fn test_extract_baggage_takes_first_of_each_kind() {
        let baggage = extract_baggage([
            ("checked", BaggageAllowance { quantity: 2, weight: Some(23) }),
            ("checked", BaggageAllowance::pieces(5)),
            ("carry_on", BaggageAllowance::pieces(1)),
        ]);
        assert_eq!(baggage.checked.quantity, 2);
        assert_eq!(baggage.checked.weight, Some(23));
        assert_eq!(baggage.carry_on.quantity, 1);
    }

    #[test]
    fn test_extract_baggage_defaults() {
        let baggage = extract_baggage(std::iter::empty());
        assert_eq!(baggage, Baggage::default());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("399.00"), Some(399.0));
        assert_eq!(parse_price(" 12.5 "), Some(12.5));
        assert_eq!(parse_price("-1"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn test_stops_and_names() {
        assert_eq!(stops_for_segments(1), 0);
        assert_eq!(stops_for_segments(3), 2);
        assert_eq!(stops_for_segments(0), 0);
        assert_eq!(display_name(Some("London"), "LHR"), "London");
        assert_eq!(display_name(Some("  "), "LHR"), "LHR");
        assert_eq!(display_name(None, "JFK"), "JFK");
    }
}
