//! CLI interface for flight-merge

use anyhow::Context;
use clap::{Parser, Subcommand};
use flight_merge::{
    group_flights, search_flights, AppConfig, CabinClass, FilterCriteria, GroupBy, SortBy,
};
use std::fs;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flight-merge")]
#[command(about = "Search Duffel and Amadeus at once and merge the offers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of passengers
        #[arg(long, default_value = "1")]
        passengers: u32,
        /// Cabin class requested from providers (economy, premium-economy, business, first)
        #[arg(long)]
        class: Option<String>,
        /// Currency every provider is asked to price in
        #[arg(long)]
        currency: Option<String>,
        /// Drop offers above this price
        #[arg(long)]
        max_price: Option<f64>,
        /// Maximum number of stops
        #[arg(long)]
        max_stops: Option<u32>,
        /// Preferred airlines (comma-separated names or codes)
        #[arg(long)]
        airlines: Option<String>,
        /// Group results for display (carrier, price, duration, stops)
        #[arg(long)]
        group_by: Option<String>,
        /// Sort results (price, duration, departure, stops)
        #[arg(long, default_value = "price")]
        sort: String,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_logging() -> anyhow::Result<()> {
    // stdout carries the JSON results, logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("flight_merge=info"))?)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            from,
            to,
            date,
            return_date,
            passengers,
            class,
            currency,
            max_price,
            max_stops,
            airlines,
            group_by,
            sort,
            output,
        } => {
            let config = AppConfig::from_env()?;
            let mut criteria = config.criteria(&from, &to, &date)?;
            if let Some(return_date) = return_date {
                criteria = criteria.with_return_date(&return_date)?;
            }
            criteria.passenger_count = passengers;
            criteria.cabin_class = class.as_deref().map(str::parse::<CabinClass>).transpose()?;
            if let Some(currency) = currency {
                criteria.currency = currency.to_uppercase();
            }
            criteria.validate()?;

            let filter = FilterCriteria {
                max_price,
                max_stops,
                preferred_carriers: airlines
                    .map(|a| a.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()),
                cabin_class: criteria.cabin_class,
            };
            let sort_by = sort.parse::<SortBy>()?;
            let group_by = group_by.as_deref().map(str::parse::<GroupBy>).transpose()?;

            info!(origin = %criteria.origin, destination = %criteria.destination, "Searching for flights");
            let outcome = search_flights(&config, &criteria, &filter, sort_by).await?;
            let flights = &outcome.flights;

            let json = match group_by {
                Some(group_by) => serde_json::to_string_pretty(&group_flights(flights, group_by))?,
                None => serde_json::to_string_pretty(flights)?,
            };

            if let Some(output_file) = output {
                fs::write(&output_file, &json)
                    .with_context(|| format!("writing results to {}", output_file))?;
                eprintln!("Results saved to {}", output_file);
            } else {
                println!("{}", json);
            }

            // Summary
            eprintln!("\nSummary:");
            for report in &outcome.providers {
                eprintln!("  {}: {:?}", report.provider, report.status);
            }
            eprintln!(
                "Merged {} offers, {} routes matched, showing {}",
                outcome.total_offers,
                outcome.matching_routes,
                flights.len()
            );

            if let Some(best) = flights.first() {
                eprintln!(
                    "Best flight: {} {} {} {:.2} {} ({} fare options)",
                    best.carrier,
                    best.flight_number,
                    best.departure,
                    best.price,
                    best.currency,
                    best.fare_option_count()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "flight-merge",
            "search",
            "--from", "LAX",
            "--to", "JFK",
            "--date", "2025-08-15",
            "--max-stops", "1",
            "--group-by", "stops",
        ]);

        assert!(cli.is_ok());

        if let Ok(Cli { command: Commands::Search { from, to, date, max_stops, group_by, sort, .. } }) = cli {
            assert_eq!(from, "LAX");
            assert_eq!(to, "JFK");
            assert_eq!(date, "2025-08-15");
            assert_eq!(max_stops, Some(1));
            assert_eq!(group_by.as_deref(), Some("stops"));
            assert_eq!(sort, "price");
        }
    }

    #[test]
    fn test_cli_requires_route() {
        assert!(Cli::try_parse_from(["flight-merge", "search", "--from", "LAX"]).is_err());
    }
}
