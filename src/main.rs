use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use event_scout::apis::build_providers;
use event_scout::common::types::{
    LocationQuery, PricePreference, SearchRequest, SortKey, UserPreferences,
};
use event_scout::config::Config;
use event_scout::geocoding::providers::{MapboxGeocoder, StaticCityTable, TomTomGeocoder};
use event_scout::geocoding::{parse_coordinate_text, GeocodeProvider, GeocodingResolver};
use event_scout::infra::http::HttpFetcher;
use event_scout::infra::persistence::{EventSink, FlatEventRecord, JsonlSink};
use event_scout::observability::{logging, metrics};
use event_scout::Aggregator;

#[derive(Parser)]
#[command(name = "event-scout")]
#[command(about = "Multi-provider local event search and aggregation")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Relevance,
    Distance,
    Date,
}

impl From<SortArg> for SortKey {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Relevance => SortKey::Relevance,
            SortArg::Distance => SortKey::Distance,
            SortArg::Date => SortKey::Date,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search events around a location and print the result envelope
    Search {
        /// Free-text location ("Seattle, WA") or "<lat>, <lng>"
        #[arg(long)]
        location: String,
        #[arg(long)]
        keyword: Option<String>,
        /// Search radius in miles
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
        sort: SortArg,
        /// Only keep events whose price reads as free
        #[arg(long)]
        free_only: bool,
    },
    /// Aggregate events and append flattened records to a JSONL sink
    Populate {
        #[arg(long)]
        location: String,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        radius: Option<f64>,
        /// Output path for the JSONL records
        #[arg(long, default_value = "events.jsonl")]
        out: PathBuf,
    },
    /// Resolve a location string to coordinates (or an address with --reverse)
    Geocode {
        #[arg(long)]
        query: String,
        /// Treat the query as "<lat>, <lng>" and look up an address
        #[arg(long)]
        reverse: bool,
    },
}

fn build_geocoder(config: &Config) -> anyhow::Result<Arc<GeocodingResolver>> {
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(10))?);
    let providers: Vec<Box<dyn GeocodeProvider>> = vec![
        Box::new(MapboxGeocoder::from_env(fetcher.clone())),
        Box::new(TomTomGeocoder::from_env(fetcher)),
        Box::new(StaticCityTable),
    ];
    Ok(Arc::new(GeocodingResolver::with_ttl(
        providers,
        Duration::from_secs(config.geocoding.cache_ttl_hours * 60 * 60),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    if config.metrics.enabled {
        metrics::init_prometheus(config.metrics.port)
            .context("failed to install metrics exporter")?;
    }

    match cli.command {
        Commands::Search {
            location,
            keyword,
            radius,
            page,
            size,
            sort,
            free_only,
        } => {
            let geocoder = build_geocoder(&config)?;
            let providers = build_providers(&config)?;
            let aggregator = Aggregator::new(geocoder, providers);

            let request = SearchRequest {
                keyword,
                location: Some(LocationQuery::Text(location)),
                radius_miles: radius.unwrap_or(config.search.default_radius_miles),
                page,
                size: size.unwrap_or(config.search.default_page_size),
                sort: sort.into(),
                price_range: None,
                preferences: free_only.then(|| UserPreferences {
                    price_preference: PricePreference::Free,
                    ..Default::default()
                }),
            };

            let envelope = aggregator.aggregate(&request).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Populate {
            location,
            keyword,
            radius,
            out,
        } => {
            let geocoder = build_geocoder(&config)?;
            let providers = build_providers(&config)?;
            let aggregator = Aggregator::new(geocoder, providers);

            let request = SearchRequest {
                keyword,
                location: Some(LocationQuery::Text(location)),
                radius_miles: radius.unwrap_or(config.search.default_radius_miles),
                ..Default::default()
            };

            let events = aggregator.collect_sourced(&request).await?;
            let now = chrono::Utc::now();
            let records: Vec<FlatEventRecord> = events
                .iter()
                .map(|event| FlatEventRecord::from_sourced(event, now))
                .collect();

            let mut sink = JsonlSink::new(&out);
            let written = sink.write_records(&records)?;
            info!(written, path = %out.display(), "population run complete");
            println!("Wrote {} event records to {}", written, out.display());
        }
        Commands::Geocode { query, reverse } => {
            let geocoder = build_geocoder(&config)?;
            if reverse {
                let coords = parse_coordinate_text(&query)
                    .context("--reverse expects a \"<lat>, <lng>\" query")?;
                match geocoder.reverse_geocode(coords).await {
                    Some(address) => println!("{}", address),
                    None => anyhow::bail!("no address found for {}, {}", coords.lat, coords.lng),
                }
            } else {
                match geocoder.resolve(&LocationQuery::Text(query.clone())).await {
                    Some(coords) => println!("{}, {}", coords.lat, coords.lng),
                    None => anyhow::bail!("could not geocode '{}'", query),
                }
            }
        }
    }

    Ok(())
}
