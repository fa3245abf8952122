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

//! Filter state and the pure filter engine.
//!
//! The geographic bounding box is applied upstream: it is sent to the data
//! provider as a request parameter and drives the map viewport. Client-side
//! filtering only covers the altitude band, so a provider that returns a
//! broader area than requested (OpenSky does for small boxes) is not
//! second-guessed here.

use crate::record::FlightRecord;

/// Geographic rectangle used to scope a query and center the map viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build a bounding box, validating that the edges are within range and
    /// north is not below south.
    #[must_use]
    pub fn new(north: f64, south: f64, west: f64, east: f64) -> Option<Self> {
        let lat_ok = (-90.0..=90.0).contains(&north) && (-90.0..=90.0).contains(&south);
        let lon_ok = (-180.0..=180.0).contains(&west) && (-180.0..=180.0).contains(&east);
        if lat_ok && lon_ok && north >= south {
            Some(Self { north, south, west, east })
        } else {
            None
        }
    }

    /// Center of the box, used to position the map viewport.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.west + self.east) / 2.0)
    }
}

/// A named region preset with an optional bounding box.
///
/// `World` carries no box: providers are queried unbounded and the map keeps
/// its default viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub bounds: Option<BoundingBox>,
}

const fn bbox(north: f64, west: f64, south: f64, east: f64) -> BoundingBox {
    BoundingBox { north, south, west, east }
}

const REGION_PRESETS: [Region; 8] = [
    Region { name: "All Regions", bounds: None },
    Region { name: "Europe", bounds: Some(bbox(72.0, 20.0, 35.0, 40.0)) },
    Region { name: "North America", bounds: Some(bbox(72.0, -168.0, 15.0, -50.0)) },
    Region { name: "South America", bounds: Some(bbox(15.0, -82.0, -56.0, -33.0)) },
    Region { name: "Africa", bounds: Some(bbox(38.0, -18.0, -35.0, 52.0)) },
    Region { name: "Middle East", bounds: Some(bbox(42.0, 32.0, 12.0, 65.0)) },
    Region { name: "Asia", bounds: Some(bbox(82.0, 65.0, 10.0, 180.0)) },
    Region { name: "Australasia", bounds: Some(bbox(0.0, 100.0, -50.0, 180.0)) },
];

impl Region {
    /// The built-in region table offered by the filter controls.
    #[must_use]
    pub fn presets() -> &'static [Region] {
        &REGION_PRESETS
    }

    /// Look up a preset by name (case-insensitive). Used by the CLI and the
    /// persisted configuration.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Region> {
        Self::presets()
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .copied()
    }

    /// The unbounded default region.
    #[must_use]
    pub fn world() -> Region {
        Self::presets()[0]
    }
}

/// An altitude interval in meters. Either side may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeBand {
    pub name: &'static str,
    pub min_m: Option<f64>,
    pub max_m: Option<f64>,
}

const ALTITUDE_PRESETS: [AltitudeBand; 5] = [
    AltitudeBand { name: "All Altitudes", min_m: None, max_m: None },
    AltitudeBand { name: "0-1,500 m", min_m: Some(0.0), max_m: Some(1500.0) },
    AltitudeBand { name: "1,500-3,000 m", min_m: Some(1500.0), max_m: Some(3000.0) },
    AltitudeBand { name: "3,000-6,000 m", min_m: Some(3000.0), max_m: Some(6000.0) },
    AltitudeBand { name: "Above 6,000 m", min_m: Some(6000.0), max_m: None },
];

impl AltitudeBand {
    /// The built-in altitude bands offered by the filter controls.
    #[must_use]
    pub fn presets() -> &'static [AltitudeBand] {
        &ALTITUDE_PRESETS
    }

    /// Look up a preset band by name (case-insensitive).
    #[must_use]
    pub fn by_name(name: &str) -> Option<AltitudeBand> {
        Self::presets()
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
            .copied()
    }

    /// The unbounded default band.
    #[must_use]
    pub fn all() -> AltitudeBand {
        Self::presets()[0]
    }

    /// Whether this band is unbounded on both sides.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.min_m.is_none() && self.max_m.is_none()
    }

    /// Whether an altitude passes this band. Bounds are inclusive and applied
    /// independently, so min-only and max-only filtering both work. A flight
    /// with unknown altitude passes only when the band is unbounded.
    #[must_use]
    pub fn matches(&self, altitude_m: Option<f64>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(alt) = altitude_m else {
            return false;
        };
        self.min_m.is_none_or(|min| alt >= min) && self.max_m.is_none_or(|max| alt <= max)
    }
}

/// User-selected filters: region preset plus altitude band.
///
/// Mutated only by the filter controls; the poller observes changes through a
/// watch channel and re-fetches immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub region: Region,
    pub altitude: AltitudeBand,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            region: Region::world(),
            altitude: AltitudeBand::all(),
        }
    }
}

/// Apply the client-side part of the filter to a record set.
///
/// Pure: the input is never mutated. With an unbounded band this is the
/// identity on the input.
#[must_use]
pub fn apply(records: &[FlightRecord], filter: &FilterState) -> Vec<FlightRecord> {
    records
        .iter()
        .filter(|r| filter.altitude.matches(r.altitude_m))
        .cloned()
        .collect()
}
