//! Check categories and the masks built from them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use farebag_core::ServiceRule;

bitflags! {
    /// A set of check categories. Used both for "which checks are active on a record"
    /// and for the soft-pass mask of checks still waiting on fares.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CheckSet: u16 {
        const CABIN = 1 << 0;
        const BOOKING_CLASS = 1 << 1;
        const CARRIER_FLIGHT = 1 << 2;
        const RESULTING_FARE_CLASS = 1 << 3;
        const TICKET_DESIGNATOR = 1 << 4;
        const RULE = 1 << 5;
        const RULE_TARIFF = 1 << 6;
        const FARE_IND = 1 << 7;

        const FARE_INDEPENDENT = Self::CABIN.bits()
            | Self::BOOKING_CLASS.bits()
            | Self::CARRIER_FLIGHT.bits();
        const FARE_DEPENDENT = Self::RESULTING_FARE_CLASS.bits()
            | Self::TICKET_DESIGNATOR.bits()
            | Self::RULE.bits()
            | Self::RULE_TARIFF.bits()
            | Self::FARE_IND.bits();
    }
}

impl CheckSet {
    /// Checks whose S7 field is populated.
    pub fn populated(rule: &ServiceRule) -> Self {
        let mut set = Self::empty();
        set.set(Self::CABIN, rule.cabin.is_some());
        set.set(Self::BOOKING_CLASS, rule.booking_class_item != 0);
        set.set(Self::CARRIER_FLIGHT, rule.carrier_flight_item != 0);
        set.set(Self::RESULTING_FARE_CLASS, rule.resulting_fare_class_item != 0);
        set.set(Self::TICKET_DESIGNATOR, !rule.ticket_designator.trim().is_empty());
        set.set(Self::RULE, !rule.rule.trim().is_empty());
        set.set(Self::RULE_TARIFF, rule.rule_tariff.is_some());
        set.set(Self::FARE_IND, rule.fare_ind.is_some());
        set
    }

    /// Individual checks in evaluation order.
    pub fn checks(self) -> impl Iterator<Item = Check> {
        Check::ORDER.into_iter().filter(move |c| self.contains(c.flag()))
    }
}

/// One check category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Cabin,
    BookingClass,
    ResultingFareClass,
    TicketDesignator,
    RuleTariff,
    Rule,
    FareInd,
    CarrierFlight,
}

impl Check {
    /// Evaluation order; carrier/flight last, the way published rules are applied.
    pub const ORDER: [Check; 8] = [
        Check::Cabin,
        Check::BookingClass,
        Check::ResultingFareClass,
        Check::TicketDesignator,
        Check::RuleTariff,
        Check::Rule,
        Check::FareInd,
        Check::CarrierFlight,
    ];

    pub fn flag(self) -> CheckSet {
        match self {
            Self::Cabin => CheckSet::CABIN,
            Self::BookingClass => CheckSet::BOOKING_CLASS,
            Self::CarrierFlight => CheckSet::CARRIER_FLIGHT,
            Self::ResultingFareClass => CheckSet::RESULTING_FARE_CLASS,
            Self::TicketDesignator => CheckSet::TICKET_DESIGNATOR,
            Self::Rule => CheckSet::RULE,
            Self::RuleTariff => CheckSet::RULE_TARIFF,
            Self::FareInd => CheckSet::FARE_IND,
        }
    }

    pub fn is_fare_dependent(self) -> bool {
        CheckSet::FARE_DEPENDENT.contains(self.flag())
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cabin => write!(f, "cabin"),
            Self::BookingClass => write!(f, "booking class (T198)"),
            Self::CarrierFlight => write!(f, "carrier/flight (T186)"),
            Self::ResultingFareClass => write!(f, "resulting fare class (T171)"),
            Self::TicketDesignator => write!(f, "ticket designator"),
            Self::Rule => write!(f, "rule"),
            Self::RuleTariff => write!(f, "rule tariff"),
            Self::FareInd => write!(f, "fare indicator"),
        }
    }
}
