//! Baggage travel application: how per-segment check results combine into one
//! verdict for a record.
//!
//! | BTA     | fare-independent checks        | fare-dependent checks            |
//! |---------|--------------------------------|----------------------------------|
//! | `A` ALL | every segment of the group     | every distinct fare of the group |
//! | `S` ANY | one segment must pass everything                                  |
//! | `M` MSS | the most significant segment only                                 |
//! | `J`     | ANY, over every flown segment of the itinerary                    |
//! | blank   | cabin on MSS, T186 on the defer segment, the rest ALL             |

use farebag_core::{
    BaggageTravel, Bta, Fare, FareLookup, Itinerary, ServiceRule, ServiceType,
};

use crate::check::{Check, CheckSet};
use crate::diag::{DiagSink, TraceEvent};
use crate::store::RecordStore;
use crate::validators;
use crate::verdict::Verdict;

// ---------------------------------------------------------------------------
// Rule kinds
// ---------------------------------------------------------------------------

/// Rule family. All four share one aggregation; they differ only in which checks
/// apply and in how the not-available indicator is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Allowance,
    Charge,
    CarryOn,
    Embargo,
}

impl RuleKind {
    pub fn applicable_checks(self) -> CheckSet {
        match self {
            Self::Allowance | Self::Charge => CheckSet::all(),
            Self::CarryOn => {
                CheckSet::FARE_INDEPENDENT
                    | CheckSet::RESULTING_FARE_CLASS
                    | CheckSet::TICKET_DESIGNATOR
            }
            Self::Embargo => CheckSet::CABIN | CheckSet::CARRIER_FLIGHT,
        }
    }

    pub fn service_type(self) -> ServiceType {
        match self {
            Self::Allowance => ServiceType::Allowance,
            Self::Charge => ServiceType::Charges,
            Self::CarryOn => ServiceType::CarryOn,
            Self::Embargo => ServiceType::Embargo,
        }
    }

    pub fn can_defer(self) -> bool {
        self == Self::Allowance
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowance => write!(f, "allowance"),
            Self::Charge => write!(f, "charge"),
            Self::CarryOn => write!(f, "carry-on"),
            Self::Embargo => write!(f, "embargo"),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Evaluates single checks of one record against itinerary segments and fares.
pub struct Evaluator<'a> {
    pub itin: &'a Itinerary,
    pub store: &'a dyn RecordStore,
    pub rule: &'a ServiceRule,
    pub fares: &'a dyn FareLookup,
    pub sink: Option<&'a dyn DiagSink>,
}

impl<'a> Evaluator<'a> {
    /// One check on one segment. Fare checks without a fare are indeterminate.
    pub fn on_segment(&self, check: Check, segment: usize) -> Verdict {
        let Some(seg) = self.itin.segment(segment) else {
            log::warn!("segment {segment} outside itinerary");
            return Verdict::Fail;
        };
        let rule = self.rule;
        match check {
            Check::Cabin => match rule.cabin {
                Some(c) => Verdict::from_bool(validators::cabin(seg, c)),
                None => Verdict::Pass,
            },
            Check::BookingClass => {
                let table = self.store.booking_classes(&rule.vendor, rule.booking_class_item);
                if table.is_none() {
                    log::warn!("T198 {}/{} not found", rule.vendor, rule.booking_class_item);
                }
                Verdict::from_bool(validators::booking_class(seg, table))
            }
            Check::CarrierFlight => {
                let table = self.store.carrier_flights(&rule.vendor, rule.carrier_flight_item);
                if table.is_none() {
                    log::warn!("T186 {}/{} not found", rule.vendor, rule.carrier_flight_item);
                }
                Verdict::from_bool(validators::carrier_flight(seg, table))
            }
            _ => match self.fares.fare_at(segment) {
                Some((_, fare)) => Verdict::from_bool(self.on_fare(check, fare)),
                None => Verdict::Indeterminate,
            },
        }
    }

    /// One fare-dependent check on one fare.
    pub fn on_fare(&self, check: Check, fare: &Fare) -> bool {
        let rule = self.rule;
        match check {
            Check::ResultingFareClass => {
                let table = self
                    .store
                    .resulting_fare_classes(&rule.vendor, rule.resulting_fare_class_item);
                if table.is_none() {
                    log::warn!(
                        "T171 {}/{} not found",
                        rule.vendor,
                        rule.resulting_fare_class_item
                    );
                }
                validators::resulting_fare_class(fare, table)
            }
            Check::TicketDesignator => validators::ticket_designator(fare, &rule.ticket_designator),
            Check::Rule => validators::rule(fare, &rule.rule),
            Check::RuleTariff => rule
                .rule_tariff
                .map_or(true, |t| validators::rule_tariff(fare, t)),
            Check::FareInd => rule
                .fare_ind
                .map_or(true, |c| validators::fare_ind(fare, c)),
            Check::Cabin | Check::BookingClass | Check::CarrierFlight => true,
        }
    }

    /// ALL over `segments` for one check. Fare checks are evaluated once per
    /// distinct fare.
    pub fn all_segments(&self, check: Check, segments: &[usize]) -> Verdict {
        if !check.is_fare_dependent() {
            return Verdict::all(segments.iter().map(|&s| self.on_segment(check, s)));
        }
        let mut seen: Vec<usize> = Vec::new();
        Verdict::all(segments.iter().filter_map(|&s| match self.fares.fare_at(s) {
            Some((component, fare)) => {
                if seen.contains(&component) {
                    None
                } else {
                    seen.push(component);
                    Some(Verdict::from_bool(self.on_fare(check, fare)))
                }
            }
            None => Some(Verdict::Indeterminate),
        }))
    }

    /// Every check in `checks` on one segment.
    pub fn segment_passes(&self, checks: CheckSet, segment: usize) -> Verdict {
        Verdict::all(checks.checks().map(|c| self.on_segment(c, segment)))
    }

    fn check_outcome(&self, check: Check, verdict: Verdict) {
        log::trace!("seq {} {check}: {verdict}", self.rule.seq_no);
        if let Some(sink) = self.sink {
            sink.record(TraceEvent::CheckOutcome {
                seq_no: self.rule.seq_no,
                check,
                verdict,
            });
        }
    }

    fn segment_outcome(&self, segment: usize, verdict: Verdict) {
        log::trace!("seq {} segment {segment}: {verdict}", self.rule.seq_no);
        if let Some(sink) = self.sink {
            sink.record(TraceEvent::SegmentOutcome {
                seq_no: self.rule.seq_no,
                segment,
                verdict,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Result of aggregating a record's checks over a baggage travel.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub verdict: Verdict,
    /// Segments fare checks still have to be evaluated on: the segments that passed
    /// every fare-independent check (ANY / journey), or the segments in scope.
    pub eligible: Vec<usize>,
}

/// Where the blank-BTA carrier/flight check runs for a deferring record.
/// `None` inside means no such segment could be determined, which fails the check.
pub type DeferSegment = Option<Option<usize>>;

/// Full evaluation of `checks` for a record, dispatched on its BTA.
pub fn aggregate(
    ev: &Evaluator<'_>,
    travel: &BaggageTravel,
    checks: CheckSet,
    defer_segment: DeferSegment,
) -> Aggregate {
    let group: Vec<usize> = flown(ev.itin, travel.range());
    match ev.rule.bta {
        Bta::All => all_mode(ev, checks, group),
        Bta::MostSignificant => all_mode(ev, checks, vec![travel.mss]),
        Bta::Any => any_mode(ev, checks, group),
        Bta::Journey => any_mode(ev, checks, flown(ev.itin, 0..ev.itin.segments.len())),
        Bta::Blank => blank_mode(ev, checks, travel, group, defer_segment),
    }
}

/// Evaluation of fare-dependent `checks` only, over segments already known to pass
/// the fare-independent ones.
pub fn aggregate_fare_checks(ev: &Evaluator<'_>, checks: CheckSet, eligible: &[usize]) -> Verdict {
    match ev.rule.bta {
        Bta::Any | Bta::Journey => Verdict::any(eligible.iter().map(|&s| {
            let v = ev.segment_passes(checks, s);
            ev.segment_outcome(s, v);
            v
        })),
        Bta::All | Bta::MostSignificant | Bta::Blank => {
            Verdict::all(checks.checks().map(|c| {
                let v = ev.all_segments(c, eligible);
                ev.check_outcome(c, v);
                v
            }))
        }
    }
}

/// Per-check verdicts for ALL-style modes; used to work out which checks remain open.
pub fn per_check_verdicts(
    ev: &Evaluator<'_>,
    checks: CheckSet,
    eligible: &[usize],
) -> Vec<(Check, Verdict)> {
    checks
        .checks()
        .map(|c| (c, ev.all_segments(c, eligible)))
        .collect()
}

fn flown(itin: &Itinerary, range: std::ops::Range<usize>) -> Vec<usize> {
    range
        .filter(|&i| itin.segment(i).is_some_and(|s| s.is_air()))
        .collect()
}

fn all_mode(ev: &Evaluator<'_>, checks: CheckSet, segments: Vec<usize>) -> Aggregate {
    let verdict = Verdict::all(checks.checks().map(|c| {
        let v = ev.all_segments(c, &segments);
        ev.check_outcome(c, v);
        v
    }));
    Aggregate {
        verdict,
        eligible: segments,
    }
}

fn any_mode(ev: &Evaluator<'_>, checks: CheckSet, segments: Vec<usize>) -> Aggregate {
    let independent = checks & CheckSet::FARE_INDEPENDENT;
    let dependent = checks & CheckSet::FARE_DEPENDENT;
    let mut eligible = Vec::new();
    let verdict = Verdict::any(segments.iter().map(|&s| {
        let base = ev.segment_passes(independent, s);
        let v = if base.is_pass() {
            eligible.push(s);
            ev.segment_passes(dependent, s)
        } else {
            base
        };
        ev.segment_outcome(s, v);
        v
    }));
    Aggregate { verdict, eligible }
}

fn blank_mode(
    ev: &Evaluator<'_>,
    checks: CheckSet,
    travel: &BaggageTravel,
    group: Vec<usize>,
    defer_segment: DeferSegment,
) -> Aggregate {
    let verdict = Verdict::all(checks.checks().map(|c| {
        let v = match (c, defer_segment) {
            (Check::Cabin, _) => ev.on_segment(c, travel.mss),
            (Check::CarrierFlight, Some(Some(seg))) => ev.on_segment(c, seg),
            (Check::CarrierFlight, Some(None)) => Verdict::Fail,
            _ => ev.all_segments(c, &group),
        };
        ev.check_outcome(c, v);
        v
    }));
    Aggregate {
        verdict,
        eligible: group,
    }
}
