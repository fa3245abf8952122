// Copyright 2025 Skyscan Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! FlightRadar24 live flight positions provider.
//!
//! Calls the `live/flight-positions/full` endpoint with a bearer token and
//! normalizes the keyed flight objects it returns. The response envelope has
//! been observed as an object with a `data` key, an object with a `flights`
//! key, and a bare array; all three are accepted.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::filter::BoundingBox;
use crate::record::{clean_callsign, is_valid_position, FlightRecord};

use super::{FetchError, FlightSource, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://fr24api.flightradar24.com";
const ENDPOINT: &str = "/api/live/flight-positions/full";

// Feed units: altitude in feet, ground speed in knots, vertical speed in fpm.
const FEET_PER_METER: f64 = 3.280_84;
const KMH_PER_KNOT: f64 = 1.852;
const FPM_PER_MS: f64 = 196.85;

/// FlightRadar24 data source.
///
/// The token is injected at construction; resolution order (CLI, environment,
/// config file) is the application's concern.
#[derive(Debug, Clone)]
pub struct Fr24Provider {
    base_url: String,
    token: Option<String>,
    categories: String,
}

impl Fr24Provider {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            categories: "P".to_string(),
        }
    }

    /// Override the API base URL (used by the config file).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the aircraft category filter sent with every request.
    #[must_use]
    pub fn with_categories(mut self, categories: impl Into<String>) -> Self {
        self.categories = categories.into();
        self
    }

    /// Bounds query value: `north,west,south,east`, whole-world when
    /// no region is selected.
    fn bounds_param(bounds: Option<BoundingBox>) -> String {
        match bounds {
            Some(b) => format!("{:.2},{:.2},{:.2},{:.2}", b.north, b.west, b.south, b.east),
            None => "90.00,-180.00,-90.00,180.00".to_string(),
        }
    }
}

impl FlightSource for Fr24Provider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::FlightRadar24
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<FlightRecord>, FetchError> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(FetchError::MissingToken("FlightRadar24"))?;

        let url = format!("{}{}", self.base_url, ENDPOINT);
        let response = client
            .get(&url)
            .header("Accept", "application/json")
            .header("Accept-Version", "v1")
            .bearer_auth(token)
            .query(&[
                ("bounds", Self::bounds_param(bounds)),
                ("categories", self.categories.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        let body: Value = response.json().await?;
        let records = normalize(&body)?;
        debug!("fr24: normalized {} records", records.len());
        Ok(records)
    }
}

/// Pull the server's error message out of a failure body, falling back to the
/// raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("details"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Extract the flight array from whichever envelope the response uses and
/// normalize each element. Individual malformed flights are dropped; a body
/// with no recognizable flight array at all is an error.
fn normalize(body: &Value) -> Result<Vec<FlightRecord>, FetchError> {
    let flights = if let Some(array) = body.as_array() {
        array
    } else if let Some(array) = body.get("data").and_then(Value::as_array) {
        array
    } else if let Some(array) = body.get("flights").and_then(Value::as_array) {
        array
    } else {
        return Err(FetchError::UnexpectedShape(
            "no `data` or `flights` array in FlightRadar24 response",
        ));
    };

    Ok(flights.iter().filter_map(normalize_flight).collect())
}

fn normalize_flight(flight: &Value) -> Option<FlightRecord> {
    let field_str = |key: &str| flight.get(key).and_then(Value::as_str);
    let field_f64 = |key: &str| flight.get(key).and_then(Value::as_f64);

    let latitude = field_f64("lat")?;
    let longitude = field_f64("lon")?;
    if !is_valid_position(latitude, longitude) {
        return None;
    }

    // The flight id keys the marker; without one the record cannot be
    // identified, so fall back to the callsign before giving up.
    let id = field_str("fr24_id")
        .or_else(|| field_str("callsign"))?
        .to_string();

    let callsign = field_str("callsign")
        .or_else(|| field_str("flight"))
        .and_then(clean_callsign);

    let altitude_m = field_f64("alt").map(|ft| ft / FEET_PER_METER);
    let ground_speed_kmh = field_f64("gspeed").map(|kt| kt * KMH_PER_KNOT);
    let vertical_rate_ms = field_f64("vspeed").map(|fpm| fpm / FPM_PER_MS);

    // The full feed carries no ground flag; a non-positive altitude is the
    // best available signal.
    let on_ground = altitude_m.is_some_and(|alt| alt <= 0.0);

    let last_contact = field_str("timestamp")
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(FlightRecord {
        provider: ProviderKind::FlightRadar24,
        id,
        callsign,
        latitude,
        longitude,
        track: field_f64("track"),
        altitude_m,
        ground_speed_kmh,
        vertical_rate_ms,
        origin: field_str("orig_iata").map(ToString::to_string),
        destination: field_str("dest_iata").map(ToString::to_string),
        aircraft_type: field_str("type").map(ToString::to_string),
        eta: field_str("eta").map(ToString::to_string),
        on_ground,
        last_contact,
    })
}
