//! Geocoder CLI
//!
//! Command-line front end for the Nominatim geocoding client: address search,
//! place details, reverse geocoding and cache maintenance.

#![allow(clippy::print_stdout)]

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use domain::{LocationSuggestion, PlaceDetail};
use integration_geocoding::{FileStore, GeocodingClient, NominatimGeocodingClient};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

/// Geocoder CLI
#[derive(Parser)]
#[command(name = "geocoder-cli")]
#[command(author, version, about = "Address search and reverse geocoding via Nominatim", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./geocoder.toml if present)
    #[arg(short, long, env = "GEOCODER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for addresses matching a query
    Search {
        /// Free-text address query
        query: String,
    },

    /// Simulate typing a query one character at a time
    ///
    /// Each prefix goes through the debounced search; only the final
    /// prefix should reach the network.
    Autocomplete {
        /// Text to type
        text: String,

        /// Pause between keystrokes in milliseconds
        #[arg(long, default_value = "100")]
        keystroke_ms: u64,
    },

    /// Resolve a suggestion id into coordinates and an address
    Details {
        /// Place id from a search result
        place_id: String,
    },

    /// Convert coordinates to an address
    Reverse {
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// Remove every cached entry
    ClearCache,

    /// Show cache statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins unless `-v` was given
fn env_filter(verbose: u8) -> EnvFilter {
    if verbose == 0 {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_filter_from_verbosity(0)))
    } else {
        EnvFilter::new(log_filter_from_verbosity(verbose))
    }
}

/// One line per suggestion: primary label, then secondary label and id
fn format_suggestion(index: usize, suggestion: &LocationSuggestion) -> String {
    let mut line = format!("{:>2}. {}", index + 1, suggestion.primary_label);
    if let Some(secondary) = &suggestion.secondary_label {
        line.push_str(&format!(" ({secondary})"));
    }
    line.push_str(&format!("  [id {}]", suggestion.id));
    if let Some(location) = &suggestion.location {
        line.push_str(&format!("  {location}"));
    }
    line
}

fn format_place(place: &PlaceDetail) -> String {
    format!(
        "{}\n   📍 {:.6}, {:.6}",
        place.formatted_address,
        place.location.latitude(),
        place.location.longitude()
    )
}

fn print_suggestions(suggestions: &[LocationSuggestion]) {
    if suggestions.is_empty() {
        println!("🔍 No results");
        return;
    }
    println!("🔍 {} result(s):", suggestions.len());
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("{}", format_suggestion(i, suggestion));
    }
}

async fn autocomplete(
    client: Arc<NominatimGeocodingClient>,
    text: &str,
    keystroke: Duration,
) -> anyhow::Result<Vec<LocationSuggestion>> {
    let prefixes: Vec<String> = text
        .char_indices()
        .map(|(i, c)| text[..i + c.len_utf8()].to_string())
        .collect();

    let mut handles = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.debounced_search(&prefix).await
        }));
        tokio::time::sleep(keystroke).await;
    }

    let mut last = Vec::new();
    for handle in handles {
        let results = handle.await?;
        if !results.is_empty() {
            last = results;
        }
    }
    Ok(last)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(env_filter(cli.verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app_config = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!(
        base_url = %app_config.nominatim.base_url,
        storage = %app_config.storage.path.display(),
        "Configuration loaded"
    );
    let store = Arc::new(FileStore::new(&app_config.storage.path));
    let client = Arc::new(NominatimGeocodingClient::new(&app_config.nominatim, store)?);
    client.initialize_cache().await;

    match cli.command {
        Commands::Search { query } => {
            let suggestions = client.search_address(&query).await;
            print_suggestions(&suggestions);
        },

        Commands::Autocomplete { text, keystroke_ms } => {
            println!("⌨️  Typing: {text}");
            let suggestions =
                autocomplete(Arc::clone(&client), &text, Duration::from_millis(keystroke_ms))
                    .await?;
            print_suggestions(&suggestions);
        },

        Commands::Details { place_id } => match client.place_details(&place_id).await {
            Ok(place) => println!("🏠 {}", format_place(&place)),
            Err(e) => {
                println!("❌ Lookup failed: {e}");
                std::process::exit(1);
            },
        },

        Commands::Reverse {
            latitude,
            longitude,
        } => {
            let address = client.reverse_geocode(latitude, longitude).await;
            println!("📍 {address}");
            if !client.is_network_reachable() {
                println!("⚠️  Geocoding service unreachable, address may be approximate");
            }
        },

        Commands::ClearCache => {
            client.clear_cache().await?;
            println!("🧹 Cache cleared");
        },

        Commands::Stats { json } => {
            let stats = client.cache_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("📊 Cache: {} entries", stats.entries);
                println!("   📁 {}", app_config.storage.path.display());
                for key in &stats.keys {
                    println!("   • {key}");
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::GeoLocation;

    #[test]
    fn log_filter_verbosity_zero() {
        assert_eq!(log_filter_from_verbosity(0), "warn");
    }

    #[test]
    fn log_filter_verbosity_one() {
        assert_eq!(log_filter_from_verbosity(1), "info");
    }

    #[test]
    fn log_filter_verbosity_two() {
        assert_eq!(log_filter_from_verbosity(2), "debug");
    }

    #[test]
    fn log_filter_verbosity_three_or_more() {
        assert_eq!(log_filter_from_verbosity(3), "trace");
        assert_eq!(log_filter_from_verbosity(10), "trace");
    }

    #[test]
    fn format_suggestion_with_all_parts() {
        let suggestion = LocationSuggestion::new(
            "3718244",
            "Lagos, Lagos Island, Lagos State, Nigeria",
            None,
            Some(GeoLocation::new_unchecked(6.455, 3.394)),
            Some("city".to_string()),
        );
        let line = format_suggestion(0, &suggestion);
        assert!(line.starts_with(" 1. Lagos (Lagos Island, Lagos State)"));
        assert!(line.contains("[id 3718244]"));
    }

    #[test]
    fn format_suggestion_without_secondary() {
        let suggestion = LocationSuggestion::new("7", "Nigeria", None, None, None);
        assert_eq!(format_suggestion(9, &suggestion), "10. Nigeria  [id 7]");
    }

    #[test]
    fn format_place_shows_coordinates() {
        let place = PlaceDetail::new("1", "Ring Road, Benin City", GeoLocation::benin_city());
        let text = format_place(&place);
        assert!(text.starts_with("Ring Road, Benin City\n"));
        assert!(text.contains("📍"));
    }
}
