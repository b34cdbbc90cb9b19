//! Scenario files: one itinerary, its rule records, and the fare paths to price.
//!
//! ```json
//! {
//!   "store": { "sub_codes": [...], "service_rules": [...], "us_dot_carriers": ["AA"] },
//!   "segments": [ { "origin": {...}, "destination": {...}, "marketing_carrier": "AA",
//!                   "cabin": "Y", "departure": "2026-05-01" } ],
//!   "groups": [[0, 1], [1, 2]],
//!   "passengers": ["ADT"],
//!   "checked_bags": 2,
//!   "fare_paths": [ { "components": [ { "fare": {...}, "segments": [0, 1] } ] } ]
//! }
//! ```
//!
//! `trip_type` is classified from the segments when omitted; `groups` defaults to one
//! group spanning the whole itinerary.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;

use serde::Deserialize;

use farebag_core::{BaggageTravel, FarePath, Itinerary, TravelSeg, TripType};
use farebag_engine::analysis;
use farebag_engine::store::StoreData;
use farebag_engine::{EngineError, MemoryStore};

#[derive(Debug)]
pub enum ScenarioError {
    /// File could not be read.
    Io(String),
    /// JSON parse / deserialization error.
    Parse(String),
    /// Parsed, but does not describe a usable itinerary.
    Invalid(String),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Parse(msg) => write!(f, "scenario parse error: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid scenario: {msg}"),
        }
    }
}

impl std::error::Error for ScenarioError {}

fn default_passengers() -> Vec<String> {
    vec!["ADT".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub store: StoreData,
    pub segments: Vec<TravelSeg>,
    #[serde(default)]
    pub trip_type: Option<TripType>,
    /// Segment whose destination is the journey's furthest point.
    #[serde(default)]
    pub furthest_point: Option<usize>,
    /// Baggage travels as `[start, end)` segment ranges.
    #[serde(default)]
    pub groups: Vec<[usize; 2]>,
    #[serde(default = "default_passengers")]
    pub passengers: Vec<String>,
    #[serde(default)]
    pub checked_bags: u8,
    #[serde(default)]
    pub fare_paths: Vec<FarePath>,
}

impl Scenario {
    pub fn from_json(input: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario =
            serde_json::from_str(input).map_err(|e| ScenarioError::Parse(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.segments.is_empty() {
            return Err(ScenarioError::Invalid("no segments".into()));
        }
        if self.passengers.is_empty() {
            return Err(ScenarioError::Invalid("no passengers".into()));
        }
        let n = self.segments.len();
        for &[start, end] in &self.groups {
            if start >= end || end > n {
                return Err(ScenarioError::Invalid(format!(
                    "group [{start}, {end}) is not a segment range of a {n}-segment itinerary"
                )));
            }
        }
        if let Some(i) = self.furthest_point.filter(|&i| i >= n) {
            return Err(ScenarioError::Invalid(format!("furthest_point {i} out of range")));
        }
        Ok(())
    }

    pub fn itinerary(&self) -> Itinerary {
        let trip_type = self
            .trip_type
            .unwrap_or_else(|| analysis::classify_trip_type(&self.segments, self.furthest_point));
        Itinerary {
            segments: self.segments.clone(),
            trip_type,
        }
    }

    pub fn group_ranges(&self) -> Vec<Range<usize>> {
        if self.groups.is_empty() {
            return vec![0..self.segments.len()];
        }
        self.groups.iter().map(|&[start, end]| start..end).collect()
    }

    /// Baggage travels with their MSS and MSS-journey worked out.
    pub fn travels(&self, itin: &Itinerary) -> Result<Vec<BaggageTravel>, EngineError> {
        analysis::assign_mss(itin, &self.group_ranges())
    }

    pub fn store(&self) -> Result<MemoryStore, EngineError> {
        MemoryStore::from_data(self.store.clone())
    }
}
