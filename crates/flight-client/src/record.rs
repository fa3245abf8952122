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

//! Normalized flight record shared by all data providers.

use chrono::{DateTime, Utc};

use crate::provider::ProviderKind;

/// One aircraft's reported state at a point in time, normalized from a
/// provider-specific response shape.
///
/// Records are created fresh on every poll cycle and replaced wholesale;
/// there is no identity tracking across cycles. A record only exists if its
/// position passed [`is_valid_position`], so latitude and longitude are
/// plain `f64`, not options.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    /// Data source this record came from.
    pub provider: ProviderKind,
    /// Provider-assigned identifier (FR24 flight id, OpenSky ICAO24).
    pub id: String,
    /// Callsign, if the provider reported one.
    pub callsign: Option<String>,
    /// Latitude in degrees, within ±90.
    pub latitude: f64,
    /// Longitude in degrees, within ±180.
    pub longitude: f64,
    /// Track angle in degrees (0-360, north = 0).
    pub track: Option<f64>,
    /// Altitude in meters (barometric where the provider distinguishes,
    /// geometric as fallback).
    pub altitude_m: Option<f64>,
    /// Ground speed in km/h.
    pub ground_speed_kmh: Option<f64>,
    /// Vertical rate in m/s (positive = climb, negative = descend).
    pub vertical_rate_ms: Option<f64>,
    /// Origin airport IATA code, where the provider has route data.
    pub origin: Option<String>,
    /// Destination airport IATA code, where the provider has route data.
    pub destination: Option<String>,
    /// Aircraft type designator (e.g. "B738").
    pub aircraft_type: Option<String>,
    /// Estimated arrival time as reported by the provider.
    pub eta: Option<String>,
    /// Whether the aircraft is on the ground.
    pub on_ground: bool,
    /// Timestamp of the provider's last contact with the aircraft.
    pub last_contact: Option<DateTime<Utc>>,
}

impl FlightRecord {
    /// Globally unique marker key.
    ///
    /// Callsigns are display data and can collide between concurrent flights,
    /// so identity is always the provider plus the provider's own id.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider.short_name(), self.id)
    }

    /// Callsign for display, with the conventional placeholder when absent.
    #[must_use]
    pub fn display_callsign(&self) -> &str {
        self.callsign.as_deref().unwrap_or("N/A")
    }
}

/// Whether a coordinate pair is plottable: both finite and within
/// ±90 / ±180 degrees.
#[must_use]
pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Normalize a callsign-ish string: trimmed, empty becomes `None`.
#[must_use]
pub fn clean_callsign(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
