use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    Config,
    provider::{ProviderId, available, get_json, http_client},
};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const SEARCH_PATH: &str = "/search";
const MAX_RESULTS: usize = 5;
/// Shorter queries match too broadly to be useful.
const MIN_QUERY_LEN: usize = 3;

/// A candidate place returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    // Nominatim sends coordinates as strings.
    lat: String,
    lon: String,
}

/// Turns a free-text place name into coordinates using Nominatim
/// (OpenStreetMap), which needs no API key.
#[derive(Debug, Clone)]
pub struct PlaceSearch {
    base_url: String,
    http: Client,
}

impl PlaceSearch {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let http = http_client(config.timeout())?;
        Ok(Self::new(http, config.base_url(ProviderId::Nominatim)))
    }

    /// Search for places matching `query`, best match first.
    /// Returns an empty list on failure; the caller can ask for coordinates.
    pub async fn search(&self, query: &str) -> Vec<Place> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            debug!(query, "place query too short, skipping search");
            return Vec::new();
        }

        available("Nominatim", self.fetch(query).await).unwrap_or_default()
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Place>> {
        let url = format!("{}{SEARCH_PATH}", self.base_url);
        let params = [
            ("format", "json".to_string()),
            ("q", query.to_string()),
            ("limit", MAX_RESULTS.to_string()),
        ];

        let body = get_json(&self.http, &url, &params, "Nominatim").await?;
        let raw: Vec<NominatimPlace> =
            serde_json::from_value(body).context("Unexpected Nominatim search response")?;

        Ok(raw
            .into_iter()
            .filter_map(|p| {
                let lat = p.lat.trim().parse().ok()?;
                let lon = p.lon.trim().parse().ok()?;
                Some(Place {
                    display_name: p.display_name,
                    lat,
                    lon,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_queries_do_not_hit_the_network() {
        // Unroutable base URL: any request would fail, not return places.
        let search = PlaceSearch::new(Client::new(), "http://127.0.0.1:9");

        assert!(search.search("ab").await.is_empty());
        assert!(search.search("   ").await.is_empty());
    }

    #[tokio::test]
    async fn failures_yield_no_places() {
        let search = PlaceSearch::new(Client::new(), "http://127.0.0.1:9");
        assert!(search.search("New Delhi").await.is_empty());
    }
}
