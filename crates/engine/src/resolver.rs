//! Governing-carrier resolution.
//!
//! Resolution has two halves. [`plan`] picks the candidate carriers for a baggage
//! travel from the trip-type policy and the regulatory carrier tables; it never
//! touches rule records. [`resolve`] then walks the plan against an
//! [`AllowanceSource`], following at most one defer hop per chain and at most one
//! fallback, and never evaluating more than two carriers that have an S5.

use serde::Serialize;

use farebag_core::{BaggageTravel, CarrierCode, Itinerary, TravelSeg, TripType};

use crate::cache::{CarrierKey, MatchedFeeId};
use crate::diag::{DiagSink, TraceEvent};
use crate::store::CarrierTables;

/// Most carriers with an S5 whose records are evaluated in one resolution.
pub const MAX_EVALUATED_CARRIERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Request-level allowance carrier override.
    Override,
    WhollyWithin,
    UsDot,
    International,
}

impl Policy {
    pub fn for_trip(trip_type: TripType) -> Self {
        if trip_type.is_wholly_within_us_or_ca() {
            Self::WhollyWithin
        } else if trip_type.is_us_dot() {
            Self::UsDot
        } else {
            Self::International
        }
    }
}

/// One carrier to try, with the segment its selection came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierChoice {
    pub key: CarrierKey,
    pub segment: Option<usize>,
}

impl CarrierChoice {
    fn new(carrier: &str, defer_target: Option<&str>, segment: Option<usize>) -> Self {
        let defer_target = defer_target.filter(|t| !t.is_empty() && *t != carrier);
        Self {
            key: CarrierKey::new(carrier, defer_target),
            segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierPlan {
    pub policy: Policy,
    pub primary: CarrierChoice,
    /// Tried once when the primary chain's governing carrier has no S5.
    pub fallback: Option<CarrierChoice>,
    /// Primary carrier picked from a regulatory table; re-checked on cache reuse.
    pub table_carrier: Option<CarrierCode>,
}

/// Carrier the non-DOT rule selects on `seg`: operating under the IATA
/// resolution 302 mandate, marketing otherwise.
pub fn non_dot_carrier(seg: &TravelSeg, mandate: bool) -> &str {
    if mandate {
        seg.operating_carrier()
    } else {
        &seg.marketing_carrier
    }
}

/// Whether `carrier` is in the table the trip's regime consults.
pub fn in_regulatory_table(trip_type: TripType, tables: &dyn CarrierTables, carrier: &str) -> bool {
    if trip_type.is_cta() {
        tables.is_cta_carrier(carrier)
    } else {
        tables.is_us_dot_carrier(carrier)
    }
}

/// Candidate carriers for `travel`. `None` when the travel has no flown segment to
/// take a carrier from.
pub fn plan(
    itin: &Itinerary,
    travel: &BaggageTravel,
    tables: &dyn CarrierTables,
    mandate: bool,
) -> Option<CarrierPlan> {
    let policy = Policy::for_trip(itin.trip_type);
    match policy {
        Policy::WhollyWithin => {
            let first = itin.first_segment()?;
            Some(CarrierPlan {
                policy,
                primary: CarrierChoice::new(&first.marketing_carrier, None, Some(0)),
                fallback: None,
                table_carrier: None,
            })
        }
        Policy::UsDot => {
            let mssj = itin.segment(travel.mss_journey)?;
            let first = itin.first_segment()?;
            Some(CarrierPlan {
                policy,
                primary: CarrierChoice::new(
                    &mssj.marketing_carrier,
                    Some(mssj.operating_carrier()),
                    Some(travel.mss_journey),
                ),
                fallback: Some(CarrierChoice::new(
                    &first.marketing_carrier,
                    Some(first.operating_carrier()),
                    Some(0),
                )),
                table_carrier: None,
            })
        }
        Policy::International => international_plan(itin, travel, tables, mandate),
        Policy::Override => None,
    }
}

fn international_plan(
    itin: &Itinerary,
    travel: &BaggageTravel,
    tables: &dyn CarrierTables,
    mandate: bool,
) -> Option<CarrierPlan> {
    let qualifies = |c: &str| in_regulatory_table(itin.trip_type, tables, c);
    let flown: Vec<(usize, &TravelSeg)> = travel
        .range()
        .filter_map(|i| itin.segment(i).filter(|s| s.is_air()).map(|s| (i, s)))
        .collect();
    let &(first_idx, first) = flown.first()?;
    let fallback = CarrierChoice::new(
        &first.marketing_carrier,
        Some(non_dot_carrier(first, mandate)),
        Some(first_idx),
    );

    let hit = flown
        .iter()
        .find(|(_, s)| qualifies(&s.marketing_carrier))
        .copied();
    let (primary, table_carrier) = match hit {
        Some((idx, seg)) => {
            let carrier = seg.marketing_carrier.as_str();
            let target = itin
                .segment(travel.mss_journey)
                .map(|s| s.marketing_carrier.as_str())
                .filter(|c| *c != carrier && qualifies(c))
                .unwrap_or_else(|| non_dot_carrier(first, mandate));
            (
                CarrierChoice::new(carrier, Some(target), Some(idx)),
                Some(carrier.to_string()),
            )
        }
        None => {
            let mss = itin.segment(travel.mss)?;
            (
                CarrierChoice::new(
                    &mss.marketing_carrier,
                    Some(non_dot_carrier(mss, mandate)),
                    Some(travel.mss),
                ),
                None,
            )
        }
    };
    Some(CarrierPlan {
        policy: Policy::International,
        primary,
        fallback: Some(fallback),
        table_carrier,
    })
}

/// Plan for a request-level allowance carrier override: that carrier only, on
/// the MSS, with no defer and no fallback.
pub fn override_plan(carrier: &str, travel: &BaggageTravel) -> CarrierPlan {
    CarrierPlan {
        policy: Policy::Override,
        primary: CarrierChoice::new(carrier, None, Some(travel.mss)),
        fallback: None,
        table_carrier: None,
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Allowance candidates of one carrier key, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub vendor: String,
    /// Matched records and whether each defers.
    pub candidates: Vec<(MatchedFeeId, bool)>,
}

/// Where [`resolve`] gets allowance candidates from. The engine answers from its
/// cache, scanning records on a miss.
pub trait AllowanceSource {
    /// `None` when `key.carrier` has no qualifying allowance S5.
    fn probe(&mut self, key: &CarrierKey, segment: Option<usize>) -> Option<Probe>;
}

/// Outcome of carrier resolution for one baggage travel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub policy: Policy,
    /// Keys walked by the fee calculator: a deferring winner under one key hands
    /// over to the next.
    pub allowance_chain: Vec<CarrierKey>,
    /// First candidate that does not defer, when any.
    pub allowance: Option<MatchedFeeId>,
    pub allowance_carrier: Option<CarrierCode>,
    pub charges_carrier: Option<CarrierCode>,
    /// The first candidate of the chain that ends up governing defers.
    pub deferred: bool,
    pub process_charges: bool,
    /// Carriers with an S5 whose records were evaluated.
    pub evaluated: Vec<CarrierCode>,
    /// Every carrier looked up.
    pub probed: Vec<CarrierCode>,
    pub table_carrier: Option<CarrierCode>,
}

impl Resolution {
    /// Resolution for a travel no carrier could be taken from.
    pub fn unresolved(policy: Policy) -> Self {
        Self {
            policy,
            allowance_chain: Vec::new(),
            allowance: None,
            allowance_carrier: None,
            charges_carrier: None,
            deferred: false,
            process_charges: false,
            evaluated: Vec::new(),
            probed: Vec::new(),
            table_carrier: None,
        }
    }

    /// Apply a request-level charges carrier override.
    pub fn with_charges_override(mut self, carrier: &str) -> Self {
        self.charges_carrier = Some(carrier.to_string());
        self.process_charges = true;
        self
    }
}

struct Chain {
    keys: Vec<CarrierKey>,
    governing: CarrierCode,
    governing_s5: bool,
    deferred: bool,
    allowance: Option<MatchedFeeId>,
}

struct Walk<'s> {
    group: usize,
    sink: Option<&'s dyn DiagSink>,
    probed: Vec<CarrierCode>,
    evaluated: Vec<CarrierCode>,
}

impl<'s> Walk<'s> {
    fn probe(
        &mut self,
        source: &mut dyn AllowanceSource,
        key: &CarrierKey,
        segment: Option<usize>,
    ) -> Option<Probe> {
        self.probed.push(key.carrier.clone());
        let found = source.probe(key, segment);
        log::debug!(
            "travel {}: allowance carrier {key}: {}",
            self.group,
            match &found {
                Some(p) => format!("{} S5, {} candidate(s)", p.vendor, p.candidates.len()),
                None => "no S5".to_string(),
            }
        );
        if let Some(sink) = self.sink {
            sink.record(TraceEvent::CarrierTried {
                group: self.group,
                carrier: key.carrier.clone(),
                vendor: found.as_ref().map(|p| p.vendor.clone()),
                s5_found: found.is_some(),
            });
        }
        if found.is_some() {
            self.evaluated.push(key.carrier.clone());
        }
        found
    }

    fn chain(&mut self, source: &mut dyn AllowanceSource, choice: &CarrierChoice) -> Chain {
        let key = &choice.key;
        let Some(probe) = self.probe(source, key, choice.segment) else {
            return Chain {
                keys: vec![key.clone()],
                governing: key.carrier.clone(),
                governing_s5: false,
                deferred: false,
                allowance: None,
            };
        };

        let mut chain = Chain {
            keys: vec![key.clone()],
            governing: key.carrier.clone(),
            governing_s5: true,
            deferred: probe.candidates.first().is_some_and(|&(_, d)| d),
            allowance: probe.candidates.first().filter(|(_, d)| !d).map(|&(id, _)| id),
        };
        let any_defer = probe.candidates.iter().any(|&(_, d)| d);
        let Some(target) = key.defer_target.as_deref().filter(|_| any_defer) else {
            return chain;
        };
        let tried = self.probed.iter().any(|c| c == target);
        if tried || self.evaluated.len() >= MAX_EVALUATED_CARRIERS {
            log::debug!("travel {}: defer {} -> {target} not followed", self.group, key.carrier);
            return chain;
        }

        if let Some(sink) = self.sink {
            sink.record(TraceEvent::Deferred {
                group: self.group,
                from: key.carrier.clone(),
                to: target.to_string(),
            });
        }
        let sub_key = CarrierKey::new(target, None);
        let sub = self.probe(source, &sub_key, choice.segment);
        if chain.deferred {
            chain.governing = target.to_string();
            chain.governing_s5 = sub.is_some();
            chain.allowance = sub
                .as_ref()
                .and_then(|p| p.candidates.first())
                .map(|&(id, _)| id);
        }
        if sub.is_some() {
            chain.keys.push(sub_key);
        }
        chain
    }
}

/// Walk `plan` against `source`.
pub fn resolve(
    plan: &CarrierPlan,
    group: usize,
    source: &mut dyn AllowanceSource,
    sink: Option<&dyn DiagSink>,
) -> Resolution {
    let mut walk = Walk {
        group,
        sink,
        probed: Vec::new(),
        evaluated: Vec::new(),
    };
    let mut chain = walk.chain(source, &plan.primary);

    if !chain.governing_s5 {
        if let Some(fb) = &plan.fallback {
            let tried = walk.probed.contains(&fb.key.carrier);
            if !tried && walk.evaluated.len() < MAX_EVALUATED_CARRIERS {
                log::debug!("travel {group}: falling back to {}", fb.key);
                chain = walk.chain(source, fb);
            }
        }
    }

    Resolution {
        policy: plan.policy,
        allowance_chain: chain.keys,
        allowance: chain.allowance,
        allowance_carrier: Some(chain.governing.clone()),
        charges_carrier: Some(chain.governing),
        deferred: chain.deferred,
        process_charges: chain.governing_s5,
        evaluated: walk.evaluated,
        probed: walk.probed,
        table_carrier: plan.table_carrier.clone(),
    }
}
