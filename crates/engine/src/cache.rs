//! Precomputed match cache.
//!
//! Matched fee records live in one arena and are addressed by [`MatchedFeeId`].
//! The tree above it (passenger type → baggage travel → carrier key) only holds
//! index lists, so invalidating an entry never leaves a dangling reference:
//!
//! ```text
//! pax "ADT"
//!   └─ travel 0
//!        ├─ allowance  { AA→BA: [#0, #1], BA: [#2] }
//!        ├─ charges    { AA: [#3, #4, #5] }
//!        ├─ ancillary  { (carry_on, AA): [#6], (embargo, AA): [] }
//!        └─ resolution
//! ```
//!
//! An entry whose `s5_found` flag is clear is recomputed on next access; the
//! recompute replaces its index list. Arena slots are never reused.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use farebag_core::{BaggageTravel, CarrierCode, PaxTypeCode, ServiceRule};

use crate::bta::RuleKind;
use crate::check::CheckSet;
use crate::resolver::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MatchedFeeId(pub usize);

impl std::fmt::Display for MatchedFeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of matching one S7 against one baggage travel.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedFee {
    pub id: MatchedFeeId,
    pub kind: RuleKind,
    pub group: usize,
    pub travel: BaggageTravel,
    pub rule: Arc<ServiceRule>,
    pub carrier: CarrierCode,
    /// Defer target and governing segment the record was matched with.
    pub defer_target: Option<CarrierCode>,
    pub carrier_segment: Option<usize>,
    /// Fare-dependent checks still open.
    pub soft_pass: CheckSet,
    /// Segments the open checks are evaluated over.
    pub eligible: Vec<usize>,
    /// Excess-bag ordinals covered; bit `n - 1` is ordinal `n`. Charges only.
    pub ordinals: u8,
    /// Record hands the allowance over to another carrier.
    pub defer: bool,
    /// Charge in calculation-currency minor units. Zero for free and
    /// not-available records.
    pub amount: i64,
    /// False for "service not available" records.
    pub available: bool,
}

impl MatchedFee {
    pub fn is_definite(&self) -> bool {
        self.soft_pass.is_empty()
    }

    pub fn covers_ordinal(&self, ordinal: u8) -> bool {
        (1..=8).contains(&ordinal) && self.ordinals & (1 << (ordinal - 1)) != 0
    }

    pub fn free_pieces(&self) -> u8 {
        self.rule.free_pieces
    }
}

/// Ordinal mask for a charge's occurrence range, clipped to `1..=max`.
/// A first occurrence of 0 is treated as 1; a last occurrence of 0 means "up to max".
pub fn ordinal_mask(first: u8, last: u8, max: u8) -> u8 {
    let max = max.min(8);
    let first = first.max(1);
    let last = if last == 0 { max } else { last.min(max) };
    (first..=last).fold(0u8, |m, n| m | (1 << (n - 1)))
}

pub fn full_ordinal_mask(max: u8) -> u8 {
    ordinal_mask(1, 0, max)
}

/// Allowance cache key: the governing carrier and the carrier a deferring record
/// would hand over to. The same carrier can yield different matches for different
/// defer targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CarrierKey {
    pub carrier: CarrierCode,
    pub defer_target: Option<CarrierCode>,
}

impl CarrierKey {
    pub fn new(carrier: &str, defer_target: Option<&str>) -> Self {
        Self {
            carrier: carrier.to_string(),
            defer_target: defer_target.map(String::from),
        }
    }
}

impl std::fmt::Display for CarrierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.defer_target {
            Some(t) => write!(f, "{}→{}", self.carrier, t),
            None => write!(f, "{}", self.carrier),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub s5_found: bool,
    pub vendor: Option<String>,
    pub records: Vec<MatchedFeeId>,
}

#[derive(Debug, Default)]
pub struct GroupCache {
    pub allowance: FxHashMap<CarrierKey, CacheEntry>,
    pub charges: FxHashMap<CarrierCode, CacheEntry>,
    /// Carry-on and embargo entries, by kind and MSS carrier.
    pub ancillary: FxHashMap<(RuleKind, CarrierCode), CacheEntry>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Default)]
pub struct FeeCache {
    arena: Vec<MatchedFee>,
    tree: FxHashMap<PaxTypeCode, FxHashMap<usize, GroupCache>>,
}

impl FeeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a match, assigning its id.
    pub fn push(&mut self, mut fee: MatchedFee) -> MatchedFeeId {
        let id = MatchedFeeId(self.arena.len());
        fee.id = id;
        self.arena.push(fee);
        id
    }

    pub fn get(&self, id: MatchedFeeId) -> Option<&MatchedFee> {
        self.arena.get(id.0)
    }

    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    pub fn group(&self, pax: &str, group: usize) -> Option<&GroupCache> {
        self.tree.get(pax).and_then(|g| g.get(&group))
    }

    pub fn group_mut(&mut self, pax: &str, group: usize) -> &mut GroupCache {
        self.tree
            .entry(pax.to_string())
            .or_default()
            .entry(group)
            .or_default()
    }

    /// A usable allowance entry: present and not invalidated.
    pub fn allowance_entry(
        &self,
        pax: &str,
        group: usize,
        key: &CarrierKey,
    ) -> Option<&CacheEntry> {
        self.group(pax, group)
            .and_then(|g| g.allowance.get(key))
            .filter(|e| e.s5_found)
    }

    pub fn charges_entry(&self, pax: &str, group: usize, carrier: &str) -> Option<&CacheEntry> {
        self.group(pax, group)
            .and_then(|g| g.charges.get(carrier))
            .filter(|e| e.s5_found)
    }

    pub fn ancillary_entry(
        &self,
        pax: &str,
        group: usize,
        kind: RuleKind,
        carrier: &str,
    ) -> Option<&CacheEntry> {
        self.group(pax, group)
            .and_then(|g| g.ancillary.get(&(kind, carrier.to_string())))
            .filter(|e| e.s5_found)
    }

    /// Clear the `s5_found` flag on every entry of `group` keyed by `carrier` and drop
    /// the group's resolution. Cached matches stay in the arena and in the index
    /// lists until the next recompute. Returns the number of entries invalidated.
    pub fn invalidate(&mut self, pax: &str, group: usize, carrier: &str) -> usize {
        let Some(g) = self.tree.get_mut(pax).and_then(|g| g.get_mut(&group)) else {
            return 0;
        };
        let mut n = 0;
        for (key, entry) in g.allowance.iter_mut() {
            if key.carrier == carrier && entry.s5_found {
                entry.s5_found = false;
                n += 1;
            }
        }
        if let Some(entry) = g.charges.get_mut(carrier) {
            if entry.s5_found {
                entry.s5_found = false;
                n += 1;
            }
        }
        for ((_, c), entry) in g.ancillary.iter_mut() {
            if c == carrier && entry.s5_found {
                entry.s5_found = false;
                n += 1;
            }
        }
        g.resolution = None;
        n
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.tree.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use farebag_core::{Bta, NotAvailNoCharge};

    fn fee(carrier: &str) -> MatchedFee {
        MatchedFee {
            id: MatchedFeeId(usize::MAX),
            kind: RuleKind::Allowance,
            group: 0,
            travel: BaggageTravel::new(0, 1, 0),
            rule: Arc::new(ServiceRule {
                vendor: "ATP".into(),
                carrier: carrier.into(),
                service_sub_code: "0DF".into(),
                seq_no: 1,
                effective: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                discontinue: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
                pax_type: String::new(),
                cabin: None,
                booking_class_item: 0,
                carrier_flight_item: 0,
                resulting_fare_class_item: 0,
                ticket_designator: String::new(),
                rule: String::new(),
                rule_tariff: None,
                fare_ind: None,
                bta: Bta::Blank,
                not_avail_no_charge: NotAvailNoCharge::FreeNoEmd,
                free_pieces: 2,
                amount: 0,
                currency: String::new(),
                occurrence_first: 0,
                occurrence_last: 0,
            }),
            carrier: carrier.into(),
            defer_target: None,
            carrier_segment: Some(0),
            soft_pass: CheckSet::empty(),
            eligible: vec![0],
            ordinals: 0,
            defer: false,
            amount: 0,
            available: true,
        }
    }

    #[test]
    fn ordinal_masks() {
        assert_eq!(ordinal_mask(0, 0, 4), 0b1111);
        assert_eq!(ordinal_mask(1, 1, 4), 0b0001);
        assert_eq!(ordinal_mask(2, 3, 4), 0b0110);
        assert_eq!(ordinal_mask(3, 9, 4), 0b1100);
        assert_eq!(ordinal_mask(5, 6, 4), 0);
        assert_eq!(full_ordinal_mask(2), 0b11);
    }

    #[test]
    fn arena_assigns_stable_ids() {
        let mut cache = FeeCache::new();
        let a = cache.push(fee("AA"));
        let b = cache.push(fee("BA"));
        assert_eq!(a, MatchedFeeId(0));
        assert_eq!(b, MatchedFeeId(1));
        assert_eq!(cache.get(b).unwrap().id, b);
        assert!(cache.get(MatchedFeeId(2)).is_none());
    }

    #[test]
    fn invalidate_clears_flag_but_keeps_matches() {
        let mut cache = FeeCache::new();
        let id = cache.push(fee("AA"));
        let key = CarrierKey::new("AA", Some("BA"));
        cache.group_mut("ADT", 0).allowance.insert(
            key.clone(),
            CacheEntry { s5_found: true, vendor: Some("ATP".into()), records: vec![id] },
        );
        assert!(cache.allowance_entry("ADT", 0, &key).is_some());

        assert_eq!(cache.invalidate("ADT", 0, "AA"), 1);
        assert!(cache.allowance_entry("ADT", 0, &key).is_none());
        let raw = &cache.group("ADT", 0).unwrap().allowance[&key];
        assert_eq!(raw.records, vec![id]);
        assert!(cache.get(id).is_some());
        // other passenger types untouched
        assert_eq!(cache.invalidate("CNN", 0, "AA"), 0);
    }

    #[test]
    fn ancillary_entries_are_keyed_by_kind() {
        let mut cache = FeeCache::new();
        let id = cache.push(fee("AA"));
        let entry = CacheEntry { s5_found: true, vendor: Some("ATP".into()), records: vec![id] };
        cache
            .group_mut("ADT", 0)
            .ancillary
            .insert((RuleKind::CarryOn, "AA".into()), entry);
        assert!(cache.ancillary_entry("ADT", 0, RuleKind::CarryOn, "AA").is_some());
        assert!(cache.ancillary_entry("ADT", 0, RuleKind::Embargo, "AA").is_none());

        assert_eq!(cache.invalidate("ADT", 0, "AA"), 1);
        assert!(cache.ancillary_entry("ADT", 0, RuleKind::CarryOn, "AA").is_none());
    }

    #[test]
    fn covers_ordinal() {
        let mut f = fee("AA");
        f.ordinals = ordinal_mask(2, 2, 4);
        assert!(!f.covers_ordinal(1));
        assert!(f.covers_ordinal(2));
        assert!(!f.covers_ordinal(0));
        assert!(!f.covers_ordinal(9));
    }
}
