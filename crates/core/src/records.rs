//! Carrier-published baggage records and the side tables they reference.
//!
//! Item numbers of `0` and blank strings mean "no condition". One-letter ATPCO codes
//! are kept as serde renames so fixture files read like the published data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fare::FareCategory;
use crate::segment::Cabin;
use crate::{CarrierCode, VendorCode};

// ---------------------------------------------------------------------------
// S5
// ---------------------------------------------------------------------------

/// Rule family of a service (`fltTktMerchInd` on S5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "A")]
    Allowance,
    #[serde(rename = "C")]
    Charges,
    #[serde(rename = "B")]
    CarryOn,
    #[serde(rename = "E")]
    Embargo,
}

impl ServiceType {
    pub fn code(&self) -> char {
        match self {
            Self::Allowance => 'A',
            Self::Charges => 'C',
            Self::CarryOn => 'B',
            Self::Embargo => 'E',
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowance => write!(f, "allowance"),
            Self::Charges => write!(f, "charges"),
            Self::CarryOn => write!(f, "carry_on"),
            Self::Embargo => write!(f, "embargo"),
        }
    }
}

/// Carrier service sub-code record (S5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCodeRecord {
    pub vendor: VendorCode,
    pub carrier: CarrierCode,
    pub service_sub_code: String,
    pub service_type: ServiceType,
    #[serde(default)]
    pub concur: String,
    #[serde(default)]
    pub rfic: String,
    #[serde(default)]
    pub ssim_code: String,
    #[serde(default)]
    pub ssr_code: String,
    #[serde(default)]
    pub emd_type: String,
    #[serde(default)]
    pub booking_ind: String,
}

// ---------------------------------------------------------------------------
// S7
// ---------------------------------------------------------------------------

/// Baggage travel application: how per-segment results combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bta {
    #[serde(rename = "A")]
    All,
    #[serde(rename = "S")]
    Any,
    #[serde(rename = "M")]
    MostSignificant,
    #[serde(rename = "J")]
    Journey,
    #[default]
    #[serde(rename = "")]
    Blank,
}

impl std::fmt::Display for Bta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
            Self::MostSignificant => write!(f, "mss"),
            Self::Journey => write!(f, "journey"),
            Self::Blank => write!(f, "blank"),
        }
    }
}

/// Not-available / no-charge indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NotAvailNoCharge {
    #[default]
    #[serde(rename = "")]
    Blank,
    /// Service not available.
    #[serde(rename = "X")]
    NotAvailable,
    /// Free, no EMD issued.
    #[serde(rename = "F")]
    FreeNoEmd,
    /// Free, EMD issued.
    #[serde(rename = "E")]
    FreeEmd,
    /// Free, no book, no EMD.
    #[serde(rename = "G")]
    FreeNoBookNoEmd,
    /// Free, no book, EMD issued.
    #[serde(rename = "H")]
    FreeNoBookEmd,
    /// Defer to the marketing carrier's rules.
    #[serde(rename = "D")]
    DeferToMarketing,
    /// Defer to the operating carrier's rules.
    #[serde(rename = "O")]
    DeferToOperating,
}

impl NotAvailNoCharge {
    pub fn is_defer(&self) -> bool {
        matches!(self, Self::DeferToMarketing | Self::DeferToOperating)
    }

    pub fn is_free(&self) -> bool {
        matches!(
            self,
            Self::FreeNoEmd | Self::FreeEmd | Self::FreeNoBookNoEmd | Self::FreeNoBookEmd
        )
    }

    pub fn code(&self) -> char {
        match self {
            Self::Blank => ' ',
            Self::NotAvailable => 'X',
            Self::FreeNoEmd => 'F',
            Self::FreeEmd => 'E',
            Self::FreeNoBookNoEmd => 'G',
            Self::FreeNoBookEmd => 'H',
            Self::DeferToMarketing => 'D',
            Self::DeferToOperating => 'O',
        }
    }
}

/// Optional service rule record (S7): one allowance or charge plus its conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRule {
    pub vendor: VendorCode,
    pub carrier: CarrierCode,
    pub service_sub_code: String,
    pub seq_no: u32,
    pub effective: NaiveDate,
    pub discontinue: NaiveDate,
    #[serde(default)]
    pub pax_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabin: Option<Cabin>,
    /// T198 booking-class table.
    #[serde(default)]
    pub booking_class_item: u32,
    /// T186 carrier/flight table.
    #[serde(default)]
    pub carrier_flight_item: u32,
    /// T171 resulting-fare-class table.
    #[serde(default)]
    pub resulting_fare_class_item: u32,
    #[serde(default)]
    pub ticket_designator: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_tariff: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare_ind: Option<FareCategory>,
    #[serde(default)]
    pub bta: Bta,
    #[serde(default)]
    pub not_avail_no_charge: NotAvailNoCharge,
    /// Free checked pieces (allowance records).
    #[serde(default)]
    pub free_pieces: u8,
    /// Charge in minor units of `currency` (charge records).
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    /// First excess piece this charge applies to; 0 behaves as 1.
    #[serde(default)]
    pub occurrence_first: u8,
    /// Last excess piece this charge applies to; 0 means no upper limit.
    #[serde(default)]
    pub occurrence_last: u8,
}

impl ServiceRule {
    pub fn is_cancelled(&self, ticketing: NaiveDate) -> bool {
        self.effective == self.discontinue && self.effective == ticketing
    }

    pub fn is_in_effect(&self, travel: NaiveDate) -> bool {
        self.effective <= travel && travel <= self.discontinue
    }
}

// ---------------------------------------------------------------------------
// Side tables
// ---------------------------------------------------------------------------

/// Which carrier of a segment a booking-class entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MktOperInd {
    #[default]
    #[serde(rename = "M")]
    Marketing,
    #[serde(rename = "O")]
    Operating,
    #[serde(rename = "E")]
    Either,
}

/// T198 row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingClassEntry {
    #[serde(default)]
    pub mkt_oper: MktOperInd,
    pub carrier: CarrierCode,
    pub booking_codes: Vec<String>,
}

/// T186 row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierFlightEntry {
    pub marketing_carrier: CarrierCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_carrier: Option<CarrierCode>,
    /// `-1` matches any flight.
    #[serde(default = "any_flight")]
    pub flight1: i32,
    /// `0`: `flight1` is a single flight number; otherwise the inclusive upper bound.
    #[serde(default)]
    pub flight2: i32,
}

fn any_flight() -> i32 {
    -1
}

/// T171 row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultingFareClassEntry {
    pub carrier: CarrierCode,
    /// Fare class pattern; `-` stands for any run of characters.
    pub fare_class: String,
    #[serde(default)]
    pub fare_type: String,
}
