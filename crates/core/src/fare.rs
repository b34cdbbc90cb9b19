use serde::{Deserialize, Serialize};

use crate::{CarrierCode, VendorCode};

/// Fare indicator category matched by S7 `fare_ind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareCategory {
    /// Category 19-22 discounted fare.
    Discounted,
    /// Category 25 fare-by-rule.
    FareByRule,
    /// Category 35 negotiated fare.
    Negotiated,
}

impl std::fmt::Display for FareCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discounted => write!(f, "discounted"),
            Self::FareByRule => write!(f, "fare_by_rule"),
            Self::Negotiated => write!(f, "negotiated"),
        }
    }
}

/// The fare-level facts fare-dependent checks look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fare {
    #[serde(default)]
    pub vendor: VendorCode,
    pub carrier: CarrierCode,
    pub fare_class: String,
    #[serde(default)]
    pub fare_type: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub rule_tariff: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_designator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FareCategory>,
}

/// One priced fare and the itinerary segment indices it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareComponent {
    pub fare: Fare,
    pub segments: Vec<usize>,
}

impl FareComponent {
    pub fn covers(&self, segment: usize) -> bool {
        self.segments.contains(&segment)
    }
}

/// A (possibly partial) assignment of fares to segments.
///
/// Segments that no component covers have no fare yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FarePath {
    pub components: Vec<FareComponent>,
}

impl FarePath {
    pub fn new(components: Vec<FareComponent>) -> Self {
        Self { components }
    }

    /// Segments covered by more than one component, in ascending order.
    pub fn overlapping_segments(&self) -> Vec<usize> {
        let mut seen = Vec::new();
        let mut dup = Vec::new();
        for seg in self.components.iter().flat_map(|c| c.segments.iter().copied()) {
            if seen.contains(&seg) {
                if !dup.contains(&seg) {
                    dup.push(seg);
                }
            } else {
                seen.push(seg);
            }
        }
        dup.sort_unstable();
        dup
    }
}

/// Fare lookup by itinerary segment index.
///
/// Returns the fare and an identifier of the component carrying it, so callers can
/// tell whether two segments share one fare.
pub trait FareLookup {
    fn fare_at(&self, segment: usize) -> Option<(usize, &Fare)>;
}

impl FareLookup for FarePath {
    fn fare_at(&self, segment: usize) -> Option<(usize, &Fare)> {
        self.components
            .iter()
            .enumerate()
            .find(|(_, c)| c.covers(segment))
            .map(|(i, c)| (i, &c.fare))
    }
}

impl FareLookup for FareComponent {
    fn fare_at(&self, segment: usize) -> Option<(usize, &Fare)> {
        self.covers(segment).then_some((0, &self.fare))
    }
}

/// No fares known at all. Used by the soft-pass path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFares;

impl FareLookup for NoFares {
    fn fare_at(&self, _segment: usize) -> Option<(usize, &Fare)> {
        None
    }
}
