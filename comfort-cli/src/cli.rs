use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use comfort_core::{
    ComfortError, Config, DefaultLocation, FusionPipeline, PlaceSearch, ProviderId, QueryParams,
    config::DEFAULT_TIMEOUT_SECS,
};
use inquire::{Confirm, CustomType, Select, Text};
use tracing::{debug, info};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "comfort", version, about = "Weather comfort check for a place and day")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify the weather for a location and day.
    Check {
        /// Latitude in degrees, -90..=90.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude in degrees, -180..=180.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Place name to look up instead of coordinates.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        place: Option<String>,

        /// Day to check, YYYYMMDD or YYYY-MM-DD; defaults to today (UTC).
        #[arg(long)]
        date: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Keep raw provider payloads in the JSON report.
        #[arg(long, requires = "json")]
        raw: bool,
    },

    /// Interactively set the default location, timeout and provider endpoints.
    Configure,

    /// Print the path of the config file.
    ConfigPath,
}

/// Coordinates a check runs against, with an optional label for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl From<&DefaultLocation> for Location {
    fn from(loc: &DefaultLocation) -> Self {
        Self {
            name: loc.name.clone(),
            lat: loc.lat,
            lon: loc.lon,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Check {
                lat,
                lon,
                place,
                date,
                json,
                raw,
            } => {
                let config = Config::load()?;
                let location = resolve_location(&config, lat, lon, place).await?;
                let date = date
                    .unwrap_or_else(|| Utc::now().date_naive().format("%Y%m%d").to_string());

                info!(lat = location.lat, lon = location.lon, %date, "running comfort check");

                let pipeline = FusionPipeline::from_config(&config)?;
                let params = QueryParams {
                    lat: Some(location.lat.into()),
                    lon: Some(location.lon.into()),
                    date: Some(date),
                };
                let report = pipeline.run(&params).await.map_err(describe_failure)?;

                if json {
                    let report = if raw {
                        report
                    } else {
                        report.without_raw()
                    };
                    let body = serde_json::to_string_pretty(&report)
                        .context("Failed to serialize report")?;
                    println!("{body}");
                } else {
                    print!("{}", output::render(&report, location.name.as_deref()));
                }
            }
            Command::Configure => configure().await?,
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
            }
        }

        Ok(())
    }
}

fn describe_failure(err: ComfortError) -> anyhow::Error {
    if err.is_client_error() {
        anyhow!("Invalid request: {err}")
    } else {
        anyhow!(err).context("Comfort check failed")
    }
}

/// Coordinates from flags, then a place search, then the configured
/// default, then an interactive prompt.
async fn resolve_location(
    config: &Config,
    lat: Option<f64>,
    lon: Option<f64>,
    place: Option<String>,
) -> anyhow::Result<Location> {
    if let (Some(lat), Some(lon)) = (lat, lon) {
        return Ok(Location {
            name: None,
            lat,
            lon,
        });
    }

    if let Some(place) = place {
        let search = PlaceSearch::from_config(config)?;
        return pick_place(&search, &place).await;
    }

    if let Some(loc) = &config.default_location {
        debug!(name = ?loc.name, "using configured default location");
        return Ok(loc.into());
    }

    prompt_coordinates(None)
}

async fn pick_place(search: &PlaceSearch, query: &str) -> anyhow::Result<Location> {
    let mut places = search.search(query).await;

    match places.len() {
        0 => bail!("No places found for '{query}'. Try a longer name or pass --lat/--lon."),
        1 => {
            let place = places.remove(0);
            Ok(Location {
                name: Some(place.display_name),
                lat: place.lat,
                lon: place.lon,
            })
        }
        _ => {
            let names: Vec<String> = places.iter().map(|p| p.display_name.clone()).collect();
            let choice = Select::new("Several places match, pick one:", names).raw_prompt()?;
            let place = places.swap_remove(choice.index);
            Ok(Location {
                name: Some(place.display_name),
                lat: place.lat,
                lon: place.lon,
            })
        }
    }
}

fn prompt_coordinates(current: Option<&DefaultLocation>) -> anyhow::Result<Location> {
    let mut lat = CustomType::<f64>::new("Latitude:")
        .with_error_message("Please type a number between -90 and 90");
    let mut lon = CustomType::<f64>::new("Longitude:")
        .with_error_message("Please type a number between -180 and 180");
    if let Some(current) = current {
        lat = lat.with_default(current.lat);
        lon = lon.with_default(current.lon);
    }

    let lat = lat.prompt()?;
    let lon = lon.prompt()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("Coordinates {lat}, {lon} are out of range");
    }

    Ok(Location {
        name: None,
        lat,
        lon,
    })
}

async fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let set_location = Confirm::new("Set a default location?")
        .with_default(config.default_location.is_none())
        .prompt()?;
    if set_location {
        let query = Text::new("Place name (leave empty to enter coordinates):").prompt()?;
        let location = if query.trim().is_empty() {
            prompt_coordinates(config.default_location.as_ref())?
        } else {
            pick_place(&PlaceSearch::from_config(&config)?, &query).await?
        };

        config.set_default_location(DefaultLocation {
            name: location.name,
            lat: location.lat,
            lon: location.lon,
        });
    }

    let timeout = CustomType::<u64>::new("Provider timeout in seconds:")
        .with_default(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
        .with_error_message("Please type a whole number of seconds")
        .prompt()?;
    config.timeout_secs = (timeout != DEFAULT_TIMEOUT_SECS).then_some(timeout);

    if Confirm::new("Change provider endpoints?").with_default(false).prompt()? {
        for &id in ProviderId::all() {
            let url = Text::new(&format!("{id} base URL:"))
                .with_default(config.base_url(id))
                .prompt()?;
            let url = url.trim();

            if url.is_empty() || url == id.default_base_url() {
                config.remove_provider_override(id);
            } else {
                config.upsert_provider_base_url(id, url.to_string());
            }
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}
