// src/mcp_server.rs

use rmcp::{
    ServerHandler, ServiceExt,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
};
use flight_merge::{
    group_flights, AppConfig, ApiSource, CabinClass, FilterCriteria, FlightSearchService, GroupBy,
    NormalizedFlight, ProviderReport, SearchCriteria, SortBy,
};
use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, error, debug};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flight search MCP server
#[derive(Clone)]
pub struct FlightServer {
    service: Arc<FlightSearchService>,
    config: Arc<AppConfig>,
}

impl FlightServer {
    pub fn new(service: FlightSearchService, config: AppConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    /// Initialize logging to file. stdout is the MCP transport.
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "flight-merge-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .or_else(|_| EnvFilter::try_new("info"))?
                    .add_directive("flight_merge=debug".parse()?)
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
            )
            .init();

        info!("Logging initialized - logs will be written to logs/flight-merge-mcp.log.*");
        Ok(())
    }
}

/// Flight search parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FlightSearchParams {
    #[schemars(description = "Origin airport code (e.g., LAX, JFK)")]
    pub from_airport: String,
    #[schemars(description = "Destination airport code (e.g., JFK, LHR)")]
    pub to_airport: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub departure_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format for round trips")]
    pub return_date: Option<String>,
    #[schemars(description = "Number of passengers (default: 1)")]
    pub passengers: Option<u32>,
    #[schemars(description = "Cabin class: economy, premium-economy, business, first")]
    pub cabin_class: Option<String>,
    #[schemars(description = "ISO 4217 currency to price in (default from server config)")]
    pub currency: Option<String>,
    #[schemars(description = "Maximum price")]
    pub max_price: Option<f64>,
    #[schemars(description = "Maximum number of stops")]
    pub max_stops: Option<u32>,
    #[schemars(description = "Preferred airlines (comma-separated names or codes, e.g., 'AA,DL,United')")]
    pub airlines: Option<String>,
    #[schemars(description = "Group results by: carrier, price, duration, stops")]
    pub group_by: Option<String>,
    #[schemars(description = "Sort results by: price (default), duration, departure, stops")]
    pub sort: Option<String>,
    #[schemars(description = "Maximum number of flights to return (default: 30)")]
    pub max_flights: Option<usize>,
}

#[derive(Debug, Serialize, Clone)]
pub struct FareOptionInfo {
    pub id: String,
    pub provider: ApiSource,
    pub cabin_class: CabinClass,
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct FlightInfo {
    pub carrier: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub stops: u32,
    pub price: f64,
    pub currency: String,
    pub cabin_class: CabinClass,
    pub provider: ApiSource,
    pub fare_options: Vec<FareOptionInfo>,
}

impl From<&NormalizedFlight> for FareOptionInfo {
    fn from(flight: &NormalizedFlight) -> Self {
        Self {
            id: flight.id.clone(),
            provider: flight.api_source,
            cabin_class: flight.cabin_class,
            price: flight.price,
            currency: flight.currency.clone(),
        }
    }
}

impl From<&NormalizedFlight> for FlightInfo {
    fn from(flight: &NormalizedFlight) -> Self {
        Self {
            carrier: flight.carrier.clone(),
            flight_number: flight.flight_number.clone(),
            origin: flight.origin.clone(),
            destination: flight.destination.clone(),
            departure_time: flight.departure.clone(),
            arrival_time: flight.arrival.clone(),
            duration: flight.duration.clone(),
            stops: flight.stops,
            price: flight.price,
            currency: flight.currency.clone(),
            cabin_class: flight.cabin_class,
            provider: flight.api_source,
            fare_options: flight
                .fare_options
                .iter()
                .flatten()
                .map(FareOptionInfo::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlightGroupInfo {
    pub label: String,
    pub flights: Vec<FlightInfo>,
}

#[derive(Debug, Serialize)]
pub struct FlightSearchResult {
    pub total_offers: usize,
    pub matching_routes: usize,
    pub total_flights: usize,
    pub providers: Vec<ProviderReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights: Option<Vec<FlightInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<FlightGroupInfo>>,
}

#[tool(tool_box)]
impl FlightServer {
    /// Merged multi-provider flight search
    #[tool(description = "Search Duffel and Amadeus for flights between two airports. Offers for the same physical flight are merged into one result with all fare options attached, cheapest first.")]
    async fn search_flights(
        &self,
        #[tool(aggr)] params: FlightSearchParams,
    ) -> String {
        info!(
            from_airport = %params.from_airport,
            to_airport = %params.to_airport,
            departure_date = %params.departure_date,
            return_date = params.return_date.as_deref(),
            passengers = params.passengers.unwrap_or(1),
            cabin_class = params.cabin_class.as_deref(),
            group_by = params.group_by.as_deref(),
            "Flight search request received"
        );

        let (criteria, filter, sort_by, group_by) = match build_search(&params, &self.config) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Invalid search parameters: {}", e);
                return serde_json::json!({ "error": format!("Invalid search parameters: {}", e) }).to_string();
            }
        };
        debug!(?criteria, "Built search criteria");

        match self.service.search_filtered(&criteria, &filter, sort_by).await {
            Ok(outcome) => {
                let mut flights = outcome.flights;
                flights.truncate(params.max_flights.unwrap_or(30));

                info!(
                    total_offers = outcome.total_offers,
                    matching_routes = outcome.matching_routes,
                    flights_returned = flights.len(),
                    "Flight search completed successfully"
                );

                let (flight_infos, groups) = match group_by {
                    Some(group_by) => {
                        let groups = group_flights(&flights, group_by)
                            .into_iter()
                            .map(|g| FlightGroupInfo {
                                label: g.label,
                                flights: g.flights.iter().map(FlightInfo::from).collect(),
                            })
                            .collect();
                        (None, Some(groups))
                    }
                    None => (Some(flights.iter().map(FlightInfo::from).collect()), None),
                };

                let result = FlightSearchResult {
                    total_offers: outcome.total_offers,
                    matching_routes: outcome.matching_routes,
                    total_flights: flights.len(),
                    providers: outcome.providers,
                    flights: flight_infos,
                    groups,
                };

                serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                    serde_json::json!({ "error": format!("Failed to serialize results: {}", e) }).to_string()
                })
            }
            Err(e) => {
                error!("Flight search failed: {}", e);
                serde_json::json!({ "error": format!("Flight search failed: {}", e) }).to_string()
            }
        }
    }
}

// Helper for parameter conversion
fn build_search(
    params: &FlightSearchParams,
    config: &AppConfig,
) -> Result<(SearchCriteria, FilterCriteria, SortBy, Option<GroupBy>), flight_merge::FlightError> {
    let mut criteria = config.criteria(&params.from_airport, &params.to_airport, &params.departure_date)?;
    if let Some(return_date) = params.return_date.as_deref() {
        criteria = criteria.with_return_date(return_date)?;
    }
    criteria.passenger_count = params.passengers.unwrap_or(1);
    criteria.cabin_class = params.cabin_class.as_deref().map(str::parse::<CabinClass>).transpose()?;
    if let Some(currency) = params.currency.as_deref() {
        criteria.currency = currency.to_uppercase();
    }
    criteria.validate()?;

    let filter = FilterCriteria {
        max_price: params.max_price,
        max_stops: params.max_stops,
        preferred_carriers: params.airlines.as_ref().map(|airlines_str| {
            airlines_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<String>>()
        }),
        cabin_class: criteria.cabin_class,
    };

    let sort_by = params.sort.as_deref().unwrap_or("price").parse::<SortBy>()?;
    let group_by = params.group_by.as_deref().map(str::parse::<GroupBy>).transpose()?;

    Ok((criteria, filter, sort_by, group_by))
}

#[tool(tool_box)]
impl ServerHandler for FlightServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A flight search server that queries Duffel and Amadeus concurrently and returns one merged, price-ranked result per physical flight with alternate fares attached.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = FlightServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without logging rather than failing
    }

    info!("Starting MCP Flight Server");

    let config = AppConfig::from_env()?;
    let service = FlightSearchService::from_config(&config)?;
    info!(providers = ?service.providers().collect::<Vec<_>>(), "Providers configured");

    let server = FlightServer::new(service, config);
    let transport = stdio();

    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
