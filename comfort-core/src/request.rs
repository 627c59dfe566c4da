use chrono::{Days, NaiveDate};
use serde::Deserialize;

use crate::error::RequestError;

const YMD_FORMAT: &str = "%Y%m%d";

/// A coordinate as callers send it: a JSON number or text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Coordinate::Number(value)
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Coordinate::Text(value.to_string())
    }
}

/// Unvalidated query parameters, e.g. from a query string or JSON body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub lat: Option<Coordinate>,
    #[serde(default)]
    pub lon: Option<Coordinate>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A validated comfort query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortQuery {
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
}

impl ComfortQuery {
    pub fn new(lat: f64, lon: f64, date: NaiveDate) -> Result<Self, RequestError> {
        Ok(Self {
            lat: check_range("lat", lat, 90.0)?,
            lon: check_range("lon", lon, 180.0)?,
            date,
        })
    }

    /// Validate raw parameters. Runs before any network activity.
    pub fn parse(params: &QueryParams) -> Result<Self, RequestError> {
        let lat = params.lat.as_ref().ok_or(RequestError::MissingParameter("lat"))?;
        let lon = params.lon.as_ref().ok_or(RequestError::MissingParameter("lon"))?;
        let date = params
            .date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(RequestError::MissingParameter("date"))?;

        let lat = parse_coordinate("lat", lat)?;
        let lon = parse_coordinate("lon", lon)?;
        let date = normalize_date(date)?;

        Self::new(lat, lon, date)
    }

    /// The normalized `YYYYMMDD` form of the query date.
    pub fn date_key(&self) -> String {
        format_ymd(self.date)
    }
}

fn parse_coordinate(name: &'static str, raw: &Coordinate) -> Result<f64, RequestError> {
    let invalid = |value: String| RequestError::InvalidCoordinate { name, value };

    let value = match raw {
        Coordinate::Number(n) => *n,
        Coordinate::Text(s) if s.trim().is_empty() => {
            return Err(RequestError::MissingParameter(name));
        }
        Coordinate::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid(s.clone()))?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(value.to_string()))
    }
}

fn check_range(name: &'static str, value: f64, limit: f64) -> Result<f64, RequestError> {
    if (-limit..=limit).contains(&value) {
        Ok(value)
    } else {
        Err(RequestError::CoordinateOutOfRange {
            name,
            value,
            min: -limit,
            max: limit,
        })
    }
}

/// Accept `YYYYMMDD` or `YYYY-MM-DD` and return the calendar date.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, RequestError> {
    let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if compact.len() != 8 || !compact.chars().all(|c| c.is_ascii_digit()) {
        return Err(RequestError::InvalidDate(raw.to_string()));
    }

    NaiveDate::parse_from_str(&compact, YMD_FORMAT)
        .map_err(|_| RequestError::InvalidDate(raw.to_string()))
}

/// Render a date as `YYYYMMDD`.
pub fn format_ymd(date: NaiveDate) -> String {
    date.format(YMD_FORMAT).to_string()
}

/// Shift a date by a signed number of days, `None` outside chrono's range.
pub fn shift_days(date: NaiveDate, delta: i64) -> Option<NaiveDate> {
    let days = Days::new(delta.unsigned_abs());
    if delta >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    }
}
