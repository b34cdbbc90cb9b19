use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::location::Loc;
use crate::CarrierCode;

/// Booked cabin, using the one-letter codes carried on S7 records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cabin {
    #[serde(rename = "R")]
    PremiumFirst,
    #[serde(rename = "F")]
    First,
    #[serde(rename = "J")]
    PremiumBusiness,
    #[serde(rename = "C")]
    Business,
    #[serde(rename = "P")]
    PremiumEconomy,
    #[serde(rename = "Y")]
    Economy,
}

impl Cabin {
    pub fn code(&self) -> char {
        match self {
            Self::PremiumFirst => 'R',
            Self::First => 'F',
            Self::PremiumBusiness => 'J',
            Self::Business => 'C',
            Self::PremiumEconomy => 'P',
            Self::Economy => 'Y',
        }
    }
}

impl std::fmt::Display for Cabin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Flown, confirmed segment.
    #[default]
    Air,
    /// Open segment: carrier known, flight and date may not be.
    Open,
    /// Surface sector (ARUNK). Never governs, never matched against carrier tables.
    Surface,
}

/// Booking change applied during fare validation (booking code and cabin after rebook).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebooking {
    pub booking_code: String,
    pub cabin: Cabin,
}

/// One itinerary segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelSeg {
    pub origin: Loc,
    pub destination: Loc,
    #[serde(default)]
    pub kind: SegmentKind,
    #[serde(default)]
    pub marketing_carrier: CarrierCode,
    /// Absent when the marketing carrier operates the flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_carrier: Option<CarrierCode>,
    #[serde(default)]
    pub flight_number: u32,
    pub cabin: Cabin,
    #[serde(default)]
    pub booking_code: String,
    pub departure: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebooked: Option<Rebooking>,
}

impl TravelSeg {
    pub fn is_air(&self) -> bool {
        !matches!(self.kind, SegmentKind::Surface)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.kind, SegmentKind::Open)
    }

    /// Operating carrier, falling back to the marketing carrier for open segments
    /// and for segments without a separate operator.
    pub fn operating_carrier(&self) -> &str {
        if self.is_open() {
            return &self.marketing_carrier;
        }
        self.operating_carrier
            .as_deref()
            .unwrap_or(&self.marketing_carrier)
    }

    pub fn is_codeshare(&self) -> bool {
        self.marketing_carrier != self.operating_carrier()
    }

    /// Cabin after any rebook.
    pub fn effective_cabin(&self) -> Cabin {
        self.rebooked.as_ref().map(|r| r.cabin).unwrap_or(self.cabin)
    }

    /// Booking code after any rebook.
    pub fn effective_booking_code(&self) -> &str {
        match &self.rebooked {
            Some(r) if !r.booking_code.is_empty() => &r.booking_code,
            _ => &self.booking_code,
        }
    }
}
