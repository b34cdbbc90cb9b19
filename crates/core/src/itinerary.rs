use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::segment::TravelSeg;

/// Regulatory classification of the whole journey for baggage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    WhollyWithinUs,
    WhollyWithinCa,
    ToFromUs,
    ToFromCa,
    BetweenUsCa,
    Other,
}

impl TripType {
    pub fn is_wholly_within_us_or_ca(&self) -> bool {
        matches!(self, Self::WhollyWithinUs | Self::WhollyWithinCa)
    }

    /// US DOT baggage rules apply.
    pub fn is_us_dot(&self) -> bool {
        matches!(self, Self::WhollyWithinUs | Self::ToFromUs | Self::BetweenUsCa)
    }

    /// Canadian Transportation Agency baggage rules apply.
    pub fn is_cta(&self) -> bool {
        matches!(self, Self::WhollyWithinCa | Self::ToFromCa | Self::BetweenUsCa)
    }
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhollyWithinUs => write!(f, "wholly_within_us"),
            Self::WhollyWithinCa => write!(f, "wholly_within_ca"),
            Self::ToFromUs => write!(f, "to_from_us"),
            Self::ToFromCa => write!(f, "to_from_ca"),
            Self::BetweenUsCa => write!(f, "between_us_ca"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub segments: Vec<TravelSeg>,
    pub trip_type: TripType,
}

impl Itinerary {
    pub fn segment(&self, index: usize) -> Option<&TravelSeg> {
        self.segments.get(index)
    }

    pub fn first_segment(&self) -> Option<&TravelSeg> {
        self.segments.first()
    }

    /// Indices of flown (non-surface) segments over the whole journey.
    pub fn flown_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_air())
            .map(|(i, _)| i)
    }
}

/// A baggage travel: the contiguous run of segments `start..end` treated as one unit
/// for baggage purposes, between two checked points.
///
/// `mss` and `mss_journey` are itinerary segment indices. For journeys where US DOT
/// rules do not apply, `mss_journey` equals `mss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaggageTravel {
    pub start: usize,
    pub end: usize,
    pub mss: usize,
    pub mss_journey: usize,
}

impl BaggageTravel {
    pub fn new(start: usize, end: usize, mss: usize) -> Self {
        Self {
            start,
            end,
            mss,
            mss_journey: mss,
        }
    }

    pub fn with_mss_journey(mut self, mss_journey: usize) -> Self {
        self.mss_journey = mss_journey;
        self
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, segment: usize) -> bool {
        self.range().contains(&segment)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_type_regimes() {
        assert!(TripType::BetweenUsCa.is_us_dot());
        assert!(TripType::BetweenUsCa.is_cta());
        assert!(TripType::WhollyWithinCa.is_wholly_within_us_or_ca());
        assert!(!TripType::Other.is_us_dot());
        assert!(!TripType::ToFromCa.is_us_dot());
    }

    #[test]
    fn baggage_travel_range() {
        let bt = BaggageTravel::new(1, 3, 2);
        assert_eq!(bt.len(), 2);
        assert!(bt.contains(1));
        assert!(!bt.contains(3));
        assert_eq!(bt.mss_journey, 2);
        assert_eq!(bt.with_mss_journey(0).mss_journey, 0);
    }
}
