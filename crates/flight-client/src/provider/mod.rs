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

//! Provider layer: one fetch-and-normalize strategy per upstream API.
//!
//! Each provider issues a single parameterized GET request and maps whatever
//! response shape it returns into a `Vec<FlightRecord>`. The two supported
//! upstreams differ in both auth scheme and schema:
//!
//! - FlightRadar24 live flight positions: bearer token, object with a nested
//!   array of keyed flight objects
//! - OpenSky `states/all`: unauthenticated, fixed-position "state vector"
//!   arrays
//!
//! Records that cannot be plotted (missing or out-of-range coordinates) are
//! dropped during normalization; only whole-response failures surface as
//! errors.

mod fr24;
mod opensky;

pub use fr24::Fr24Provider;
pub use opensky::OpenSkyProvider;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::filter::BoundingBox;
use crate::record::FlightRecord;

/// Per-request timeout applied by the HTTP client the poller builds.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while fetching and decoding a provider response.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(&'static str),

    #[error("{0} requires an API token (set FR24_API_TOKEN or configure one)")]
    MissingToken(&'static str),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Which upstream a record or provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// FlightRadar24 live flight positions (bearer token auth).
    #[default]
    FlightRadar24,
    /// OpenSky Network `states/all` (unauthenticated).
    OpenSky,
}

impl ProviderKind {
    /// Human-readable name for UI display.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FlightRadar24 => "FlightRadar24",
            Self::OpenSky => "OpenSky Network",
        }
    }

    /// Short stable name used in record keys and the persisted config.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::FlightRadar24 => "fr24",
            Self::OpenSky => "opensky",
        }
    }

    /// Parse the short name back, for the CLI and config file.
    #[must_use]
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fr24" | "flightradar24" => Some(Self::FlightRadar24),
            "opensky" => Some(Self::OpenSky),
            _ => None,
        }
    }

    /// Web page for one flight, for the "open in browser" action.
    #[must_use]
    pub fn flight_url(&self, record: &FlightRecord) -> String {
        match self {
            Self::FlightRadar24 => format!(
                "https://www.flightradar24.com/data/flights/{}",
                record.display_callsign().to_ascii_lowercase()
            ),
            Self::OpenSky => format!(
                "https://opensky-network.org/aircraft-profile?icao24={}",
                record.id
            ),
        }
    }
}

/// A fetch-and-normalize strategy for one upstream API.
///
/// The poller is generic over this trait; tests substitute a scripted source.
pub trait FlightSource {
    /// The provider this source reports into record keys.
    fn kind(&self) -> ProviderKind;

    /// Fetch the current flight set within `bounds` (or unbounded when
    /// `None`) and normalize it.
    fn fetch(
        &self,
        client: &reqwest::Client,
        bounds: Option<BoundingBox>,
    ) -> impl Future<Output = Result<Vec<FlightRecord>, FetchError>> + Send;
}

/// The concrete provider set, selectable at runtime.
///
/// One view parameterized by this strategy replaces per-provider view copies.
#[derive(Debug, Clone)]
pub enum Provider {
    Fr24(Fr24Provider),
    OpenSky(OpenSkyProvider),
}

impl FlightSource for Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Self::Fr24(p) => p.kind(),
            Self::OpenSky(p) => p.kind(),
        }
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<FlightRecord>, FetchError> {
        match self {
            Self::Fr24(p) => p.fetch(client, bounds).await,
            Self::OpenSky(p) => p.fetch(client, bounds).await,
        }
    }
}
