//! `farebag-core`: domain types shared by the baggage rule engine and its callers.
//!
//! Everything here is plain data: itineraries, baggage travels (segment groups),
//! fares and fare paths, and the carrier-published rule records (S5/S7) with their
//! side tables. No lookups, no validation logic.

pub mod fare;
pub mod itinerary;
pub mod location;
pub mod records;
pub mod segment;

pub use fare::{Fare, FareCategory, FareComponent, FareLookup, FarePath, NoFares};
pub use itinerary::{BaggageTravel, Itinerary, TripType};
pub use location::Loc;
pub use records::{
    BookingClassEntry, Bta, CarrierFlightEntry, MktOperInd, NotAvailNoCharge,
    ResultingFareClassEntry, ServiceRule, ServiceType, SubCodeRecord,
};
pub use segment::{Cabin, Rebooking, SegmentKind, TravelSeg};

/// Two- or three-character airline designator ("AA", "LH", "9W").
pub type CarrierCode = String;

/// Record vendor ("ATP" for ATPCO, "MMGR" for Merch Manager).
pub type VendorCode = String;

/// Passenger type code ("ADT", "CNN").
pub type PaxTypeCode = String;

/// ATPCO vendor code.
pub const ATPCO_VENDOR: &str = "ATP";

/// Merch Manager vendor code.
pub const MERCH_MANAGER_VENDOR: &str = "MMGR";
