//! Core library for the `comfort` CLI.
//!
//! This crate defines:
//! - Sanitizing and classifying daily weather metrics
//! - Adapters over the NASA POWER and Open-Meteo providers
//! - The fallback pipeline (observation, forecast, historical prediction)
//! - Configuration and place search
//!
//! It is used by `comfort-cli`, but can also be reused by other binaries or services.

pub mod classify;
pub mod config;
pub mod error;
pub mod geocode;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod provider;
pub mod request;
pub mod sanitize;

pub use classify::classify;
pub use config::{Config, DefaultLocation, ProviderConfig};
pub use error::{ComfortError, RequestError};
pub use geocode::{Place, PlaceSearch};
pub use model::{Category, ComfortReport, Field, Metrics, Source};
pub use pipeline::FusionPipeline;
pub use provider::{DailyProvider, ProviderId, RangeProvider};
pub use request::{ComfortQuery, Coordinate, QueryParams};
pub use sanitize::sanitize;
