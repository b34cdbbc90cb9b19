//! Read-only collaborators: record store, regulatory carrier tables, currency.
//!
//! The engine only ever borrows these. [`MemoryStore`] is the in-process
//! implementation used by the CLI and tests; it loads from a JSON document.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use farebag_core::{
    BookingClassEntry, CarrierFlightEntry, ResultingFareClassEntry, ServiceRule, SubCodeRecord,
};

use crate::error::EngineError;

/// Keyed record lookups. S7 slices come back sorted by ascending sequence number.
pub trait RecordStore {
    fn sub_codes(&self, vendor: &str, carrier: &str) -> &[SubCodeRecord];
    fn service_rules(&self, vendor: &str, carrier: &str, sub_code: &str) -> &[Arc<ServiceRule>];
    fn booking_classes(&self, vendor: &str, item: u32) -> Option<&[BookingClassEntry]>;
    fn carrier_flights(&self, vendor: &str, item: u32) -> Option<&[CarrierFlightEntry]>;
    fn resulting_fare_classes(&self, vendor: &str, item: u32)
        -> Option<&[ResultingFareClassEntry]>;
}

/// Regulatory carrier-class membership.
pub trait CarrierTables {
    fn is_us_dot_carrier(&self, carrier: &str) -> bool;
    fn is_cta_carrier(&self, carrier: &str) -> bool;
}

pub trait CurrencyConverter {
    /// Convert minor units of `from` into minor units of `to`. `None` when no rate exists.
    fn convert(&self, amount: i64, from: &str, to: &str) -> Option<i64>;
}

/// Converter that knows no rates: same-currency (or unpriced) amounts pass through,
/// everything else is unconvertible.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameCurrency;

impl CurrencyConverter for SameCurrency {
    fn convert(&self, amount: i64, from: &str, to: &str) -> Option<i64> {
        (from.is_empty() || from == to).then_some(amount)
    }
}

// ---------------------------------------------------------------------------
// Serialized form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTable<T> {
    pub vendor: String,
    pub item: u32,
    pub entries: Vec<T>,
}

/// JSON document shape accepted by [`MemoryStore::from_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub sub_codes: Vec<SubCodeRecord>,
    pub service_rules: Vec<ServiceRule>,
    pub booking_class_tables: Vec<ItemTable<BookingClassEntry>>,
    pub carrier_flight_tables: Vec<ItemTable<CarrierFlightEntry>>,
    pub resulting_fare_class_tables: Vec<ItemTable<ResultingFareClassEntry>>,
    pub us_dot_carriers: Vec<String>,
    pub cta_carriers: Vec<String>,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

type CarrierKey = (String, String);
type RuleKey = (String, String, String);
type ItemKey = (String, u32);

#[derive(Debug, Default)]
pub struct MemoryStore {
    sub_codes: FxHashMap<CarrierKey, Vec<SubCodeRecord>>,
    rules: FxHashMap<RuleKey, Vec<Arc<ServiceRule>>>,
    booking_classes: FxHashMap<ItemKey, Vec<BookingClassEntry>>,
    carrier_flights: FxHashMap<ItemKey, Vec<CarrierFlightEntry>>,
    fare_classes: FxHashMap<ItemKey, Vec<ResultingFareClassEntry>>,
    us_dot: FxHashSet<String>,
    cta: FxHashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> Result<Self, EngineError> {
        let data: StoreData =
            serde_json::from_str(input).map_err(|e| EngineError::Store(e.to_string()))?;
        Self::from_data(data)
    }

    pub fn from_data(data: StoreData) -> Result<Self, EngineError> {
        let mut store = Self::new();
        for s5 in data.sub_codes {
            store.add_sub_code(s5);
        }
        for s7 in data.service_rules {
            store.check_rule(&s7)?;
            store.add_rule(s7);
        }
        for t in data.booking_class_tables {
            store.insert_table(TableKind::BookingClass, &t.vendor, t.item)?;
            store.booking_classes.insert((t.vendor, t.item), t.entries);
        }
        for t in data.carrier_flight_tables {
            store.insert_table(TableKind::CarrierFlight, &t.vendor, t.item)?;
            store.carrier_flights.insert((t.vendor, t.item), t.entries);
        }
        for t in data.resulting_fare_class_tables {
            store.insert_table(TableKind::ResultingFareClass, &t.vendor, t.item)?;
            store.fare_classes.insert((t.vendor, t.item), t.entries);
        }
        store.us_dot.extend(data.us_dot_carriers);
        store.cta.extend(data.cta_carriers);
        Ok(store)
    }

    fn insert_table(&self, kind: TableKind, vendor: &str, item: u32) -> Result<(), EngineError> {
        if item == 0 {
            return Err(EngineError::Store(format!(
                "{kind} table for vendor {vendor} has item number 0"
            )));
        }
        let key = (vendor.to_string(), item);
        let dup = match kind {
            TableKind::BookingClass => self.booking_classes.contains_key(&key),
            TableKind::CarrierFlight => self.carrier_flights.contains_key(&key),
            TableKind::ResultingFareClass => self.fare_classes.contains_key(&key),
        };
        if dup {
            return Err(EngineError::Store(format!(
                "duplicate {kind} table {vendor}/{item}"
            )));
        }
        Ok(())
    }

    /// Reject an S7 that would make pricing ambiguous or nonsensical.
    fn check_rule(&self, s7: &ServiceRule) -> Result<(), EngineError> {
        let id = format!("{}/{}/{} seq {}", s7.vendor, s7.carrier, s7.service_sub_code, s7.seq_no);
        if s7.amount < 0 {
            return Err(EngineError::Store(format!("S7 {id} has negative amount {}", s7.amount)));
        }
        let key = (s7.vendor.clone(), s7.carrier.clone(), s7.service_sub_code.clone());
        if self
            .rules
            .get(&key)
            .is_some_and(|list| list.iter().any(|r| r.seq_no == s7.seq_no))
        {
            return Err(EngineError::Store(format!("duplicate S7 {id}")));
        }
        Ok(())
    }

    pub fn add_sub_code(&mut self, s5: SubCodeRecord) {
        self.sub_codes
            .entry((s5.vendor.clone(), s5.carrier.clone()))
            .or_default()
            .push(s5);
    }

    /// Insert an S7, keeping its key's list in sequence order.
    pub fn add_rule(&mut self, s7: ServiceRule) {
        let list = self
            .rules
            .entry((s7.vendor.clone(), s7.carrier.clone(), s7.service_sub_code.clone()))
            .or_default();
        if list.iter().any(|r| r.seq_no == s7.seq_no) {
            log::warn!(
                "duplicate S7 sequence {} for {}/{}/{}",
                s7.seq_no,
                s7.vendor,
                s7.carrier,
                s7.service_sub_code
            );
        }
        let pos = list.partition_point(|r| r.seq_no <= s7.seq_no);
        list.insert(pos, Arc::new(s7));
    }

    pub fn add_booking_class_table(
        &mut self,
        vendor: &str,
        item: u32,
        entries: Vec<BookingClassEntry>,
    ) {
        self.booking_classes.insert((vendor.to_string(), item), entries);
    }

    pub fn add_carrier_flight_table(
        &mut self,
        vendor: &str,
        item: u32,
        entries: Vec<CarrierFlightEntry>,
    ) {
        self.carrier_flights.insert((vendor.to_string(), item), entries);
    }

    pub fn add_resulting_fare_class_table(
        &mut self,
        vendor: &str,
        item: u32,
        entries: Vec<ResultingFareClassEntry>,
    ) {
        self.fare_classes.insert((vendor.to_string(), item), entries);
    }

    pub fn add_us_dot_carrier(&mut self, carrier: &str) {
        self.us_dot.insert(carrier.to_string());
    }

    pub fn add_cta_carrier(&mut self, carrier: &str) {
        self.cta.insert(carrier.to_string());
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Copy)]
enum TableKind {
    BookingClass,
    CarrierFlight,
    ResultingFareClass,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BookingClass => write!(f, "T198"),
            Self::CarrierFlight => write!(f, "T186"),
            Self::ResultingFareClass => write!(f, "T171"),
        }
    }
}

impl RecordStore for MemoryStore {
    fn sub_codes(&self, vendor: &str, carrier: &str) -> &[SubCodeRecord] {
        self.sub_codes
            .get(&(vendor.to_string(), carrier.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn service_rules(&self, vendor: &str, carrier: &str, sub_code: &str) -> &[Arc<ServiceRule>] {
        self.rules
            .get(&(vendor.to_string(), carrier.to_string(), sub_code.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn booking_classes(&self, vendor: &str, item: u32) -> Option<&[BookingClassEntry]> {
        self.booking_classes
            .get(&(vendor.to_string(), item))
            .map(Vec::as_slice)
    }

    fn carrier_flights(&self, vendor: &str, item: u32) -> Option<&[CarrierFlightEntry]> {
        self.carrier_flights
            .get(&(vendor.to_string(), item))
            .map(Vec::as_slice)
    }

    fn resulting_fare_classes(
        &self,
        vendor: &str,
        item: u32,
    ) -> Option<&[ResultingFareClassEntry]> {
        self.fare_classes
            .get(&(vendor.to_string(), item))
            .map(Vec::as_slice)
    }
}

impl CarrierTables for MemoryStore {
    fn is_us_dot_carrier(&self, carrier: &str) -> bool {
        self.us_dot.contains(carrier)
    }

    fn is_cta_carrier(&self, carrier: &str) -> bool {
        self.cta.contains(carrier)
    }
}
