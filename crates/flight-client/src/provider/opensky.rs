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

//! OpenSky Network `states/all` provider.
//!
//! OpenSky encodes each aircraft as a fixed-position array (a "state
//! vector"); the positions used here follow the published REST API layout.
//! The endpoint is unauthenticated and may return `states: null` when the
//! queried box is empty, which normalizes to an empty set rather than an
//! error.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::filter::BoundingBox;
use crate::record::{clean_callsign, is_valid_position, FlightRecord};

use super::{FetchError, FlightSource, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://opensky-network.org";
const ENDPOINT: &str = "/api/states/all";

// State vector positions, per the OpenSky REST API documentation.
const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_LAST_CONTACT: usize = 4;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_ON_GROUND: usize = 8;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;
const IDX_VERTICAL_RATE: usize = 11;
const IDX_GEO_ALTITUDE: usize = 13;

// Feed units: velocity in m/s, altitudes already in meters.
const KMH_PER_MS: f64 = 3.6;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    states: Option<Vec<Vec<Value>>>,
}

/// OpenSky Network data source.
#[derive(Debug, Clone)]
pub struct OpenSkyProvider {
    base_url: String,
}

impl Default for OpenSkyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenSkyProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (used by the config file).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl FlightSource for OpenSkyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenSky
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<FlightRecord>, FetchError> {
        let url = format!("{}{}", self.base_url, ENDPOINT);
        let mut request = client.get(&url);
        if let Some(b) = bounds {
            request = request.query(&[
                ("lamin", b.south),
                ("lomin", b.west),
                ("lamax", b.north),
                ("lomax", b.east),
            ]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let body: StatesResponse = response.json().await?;
        let records = normalize(&body);
        debug!("opensky: normalized {} records", records.len());
        Ok(records)
    }
}

fn normalize(response: &StatesResponse) -> Vec<FlightRecord> {
    response
        .states
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|state| normalize_state(state))
        .collect()
}

fn normalize_state(state: &[Value]) -> Option<FlightRecord> {
    let field_f64 = |idx: usize| state.get(idx).and_then(Value::as_f64);

    let latitude = field_f64(IDX_LATITUDE)?;
    let longitude = field_f64(IDX_LONGITUDE)?;
    if !is_valid_position(latitude, longitude) {
        return None;
    }

    let id = state.get(IDX_ICAO24)?.as_str()?.to_string();

    let callsign = state
        .get(IDX_CALLSIGN)
        .and_then(Value::as_str)
        .and_then(clean_callsign);

    // Barometric altitude preferred, geometric as fallback.
    let altitude_m = field_f64(IDX_BARO_ALTITUDE).or_else(|| field_f64(IDX_GEO_ALTITUDE));

    let last_contact = field_f64(IDX_LAST_CONTACT)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

    Some(FlightRecord {
        provider: ProviderKind::OpenSky,
        id,
        callsign,
        latitude,
        longitude,
        track: field_f64(IDX_TRUE_TRACK),
        altitude_m,
        ground_speed_kmh: field_f64(IDX_VELOCITY).map(|ms| ms * KMH_PER_MS),
        vertical_rate_ms: field_f64(IDX_VERTICAL_RATE),
        origin: None,
        destination: None,
        aircraft_type: None,
        eta: None,
        on_ground: state
            .get(IDX_ON_GROUND)
            .and_then(Value::as_bool)
            .unwrap_or(false),
        last_contact,
    })
}
