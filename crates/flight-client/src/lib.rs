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

//! Client library for live flight-position APIs.
//!
//! This library fetches live aircraft positions from public REST APIs,
//! normalizes the heterogeneous response shapes into one record type, and
//! drives the fetch cycle on a timer. The layers can be used independently or
//! composed together:
//!
//! - **Provider layer**: one fetch-and-normalize strategy per upstream
//!   (FlightRadar24 live positions, OpenSky `states/all`)
//! - **Filter layer**: region presets, altitude bands, and the pure filter
//!   engine
//! - **Poller layer**: periodic re-fetch with filter hot-reload, stale
//!   response discarding, and cancellation
//!
//! # Quick Start
//!
//! ```no_run
//! use flight_client::{FilterState, OpenSkyProvider, Poller, PollerConfig, Provider};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let poller = Poller::spawn(
//!         Provider::OpenSky(OpenSkyProvider::new()),
//!         PollerConfig {
//!             interval: Duration::from_secs(30),
//!             initial_filter: FilterState::default(),
//!         },
//!     );
//!
//!     loop {
//!         let snapshot = poller.snapshot();
//!         for flight in &snapshot.flights {
//!             println!("{}: {:?}", flight.key(), flight.callsign);
//!         }
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!     }
//! }
//! ```
//!
//! # Using the filter engine alone
//!
//! ```
//! use flight_client::filter::{self, AltitudeBand, FilterState, Region};
//!
//! let filter = FilterState {
//!     region: Region::by_name("Europe").unwrap(),
//!     altitude: AltitudeBand::by_name("Above 6,000 m").unwrap(),
//! };
//! let visible = filter::apply(&[], &filter);
//! assert!(visible.is_empty());
//! ```

pub mod filter;
pub mod poller;
pub mod provider;
pub mod record;

pub use filter::{AltitudeBand, BoundingBox, FilterState, Region};
pub use poller::{PollSnapshot, PollState, PollStats, Poller, PollerConfig, DEFAULT_POLL_INTERVAL};
pub use provider::{
    FetchError, FlightSource, Fr24Provider, OpenSkyProvider, Provider, ProviderKind,
};
pub use record::FlightRecord;
