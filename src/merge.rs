//! Merge engine: flatten per-provider results into one deduplicated,
//! price-ascending list.
//!
//! Deduplication is provider-scoped. Two providers returning the same
//! physical flight under the same id are both kept; reconciling them is
//! route grouping's job.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::model::NormalizedFlight;

/// `apiSource:id`, unique per provider-local offer.
pub fn dedup_key(flight: &NormalizedFlight) -> String {
    format!("{}:{}", flight.api_source, flight.id)
}

/// Merge provider result lists.
///
/// A repeated dedup key keeps the cheaper record, at the position of the
/// first occurrence. The result is stably sorted by price, so equal prices
/// keep their input order. Prices are compared as plain numbers; callers are
/// expected to have requested one currency from every provider.
pub fn merge_flights(provider_results: Vec<Vec<NormalizedFlight>>) -> Vec<NormalizedFlight> {
    let input_len: usize = provider_results.iter().map(Vec::len).sum();
    let mut merged: Vec<NormalizedFlight> = Vec::with_capacity(input_len);
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(input_len);

    for flight in provider_results.into_iter().flatten() {
        match positions.entry(dedup_key(&flight)) {
            Entry::Occupied(slot) => {
                let existing = &mut merged[*slot.get()];
                if flight.price < existing.price {
                    *existing = flight;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(flight);
            }
        }
    }

    let currencies: HashSet<&str> = merged.iter().map(|f| f.currency.as_str()).collect();
    if currencies.len() > 1 {
        warn!(?currencies, "Merging offers priced in more than one currency");
    }

    // sort_by is stable
    merged.sort_by(|a, b| a.price.total_cmp(&b.price));

    debug!(
        input = input_len,
        merged = merged.len(),
        duplicates = input_len - merged.len(),
        "Merged provider results"
    );

    merged
}
