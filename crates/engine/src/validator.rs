//! Two-phase record validation.
//!
//! Soft phase: fare-independent checks are decided, fare-dependent checks that have
//! no fare yet are left open and recorded in the soft-pass mask. Hard phase: every
//! active check is decided against the fares given; anything left open fails.

use chrono::NaiveDate;

use farebag_core::{BaggageTravel, FareLookup, Itinerary, NotAvailNoCharge, ServiceRule};

use crate::bta::{self, Evaluator, RuleKind};
use crate::check::CheckSet;
use crate::diag::{DiagSink, RecordOutcome, TraceEvent};
use crate::store::RecordStore;
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Soft,
    Hard,
}

/// Transaction-wide inputs shared by every record validation.
pub struct ValidationContext<'a> {
    pub itin: &'a Itinerary,
    pub store: &'a dyn RecordStore,
    pub sink: Option<&'a dyn DiagSink>,
    pub ticketing_date: NaiveDate,
    pub pax_type: &'a str,
    pub allow_soft_match: bool,
    pub iata_reso_302_mandate: bool,
}

/// What one record is being matched for.
#[derive(Debug, Clone, Copy)]
pub struct RecordRequest<'a> {
    pub kind: RuleKind,
    pub travel: &'a BaggageTravel,
    pub carrier: &'a str,
    /// Carrier a deferring allowance record would hand over to.
    pub defer_target: Option<&'a str>,
    /// Segment whose carrier was selected as governing.
    pub carrier_segment: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordMatch {
    Rejected(RecordOutcome),
    Matched {
        soft_pass: CheckSet,
        eligible: Vec<usize>,
        defer: bool,
    },
}

impl RecordMatch {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Reading of the not-available / no-charge indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAvail {
    Pass,
    Fail,
    Defer,
}

pub fn not_avail(
    kind: RuleKind,
    rule: &ServiceRule,
    defer_target: Option<&str>,
    us_dot: bool,
    mandate: bool,
) -> NotAvail {
    let ind = rule.not_avail_no_charge;
    match kind {
        RuleKind::Allowance => {
            if ind == NotAvailNoCharge::FreeNoEmd {
                return NotAvail::Pass;
            }
            if !ind.is_defer() || rule.bta != farebag_core::Bta::Blank {
                return NotAvail::Fail;
            }
            let target = defer_target.unwrap_or("");
            if target.is_empty() || target == rule.carrier {
                return NotAvail::Fail;
            }
            if ind == NotAvailNoCharge::DeferToMarketing && !us_dot && mandate {
                return NotAvail::Fail;
            }
            if ind == NotAvailNoCharge::DeferToOperating && (us_dot || !mandate) {
                return NotAvail::Fail;
            }
            NotAvail::Defer
        }
        RuleKind::Charge | RuleKind::CarryOn => {
            if ind.is_defer() {
                NotAvail::Fail
            } else {
                NotAvail::Pass
            }
        }
        RuleKind::Embargo => {
            if ind == NotAvailNoCharge::NotAvailable {
                NotAvail::Pass
            } else {
                NotAvail::Fail
            }
        }
    }
}

impl<'a> ValidationContext<'a> {
    /// Match one record. Soft phase ignores `fares` beyond what is passed in; the
    /// engine passes `NoFares` there.
    pub fn validate(
        &self,
        req: &RecordRequest<'_>,
        rule: &ServiceRule,
        fares: &dyn FareLookup,
        phase: Phase,
    ) -> RecordMatch {
        let outcome = self.validate_inner(req, rule, fares, phase);
        let traced = match &outcome {
            RecordMatch::Rejected(o) => *o,
            RecordMatch::Matched { defer: true, .. } => RecordOutcome::Defer,
            RecordMatch::Matched { soft_pass, .. } if !soft_pass.is_empty() => {
                RecordOutcome::SoftMatched
            }
            RecordMatch::Matched { .. } => RecordOutcome::Matched,
        };
        log::trace!(
            "{} {} seq {}: {:?}",
            req.kind,
            req.carrier,
            rule.seq_no,
            traced
        );
        if let Some(sink) = self.sink {
            sink.record(TraceEvent::RecordConsidered {
                carrier: req.carrier.to_string(),
                seq_no: rule.seq_no,
                outcome: traced,
            });
        }
        outcome
    }

    fn validate_inner(
        &self,
        req: &RecordRequest<'_>,
        rule: &ServiceRule,
        fares: &dyn FareLookup,
        phase: Phase,
    ) -> RecordMatch {
        if rule.is_cancelled(self.ticketing_date) {
            return RecordMatch::Rejected(RecordOutcome::Cancelled);
        }
        let travel_date = self
            .itin
            .segment(req.travel.start)
            .map(|s| s.departure)
            .unwrap_or(self.ticketing_date);
        if !rule.is_in_effect(travel_date) {
            return RecordMatch::Rejected(RecordOutcome::NotInEffect);
        }
        if !rule.pax_type.is_empty() && rule.pax_type != self.pax_type {
            return RecordMatch::Rejected(RecordOutcome::PaxType);
        }

        let active = CheckSet::populated(rule) & req.kind.applicable_checks();
        let us_dot = self.itin.trip_type.is_us_dot();

        let defer_segment = if req.kind.can_defer() && rule.not_avail_no_charge.is_defer() {
            Some(match req.defer_target {
                None | Some("") => None,
                Some(_) if us_dot => Some(req.travel.mss_journey),
                Some(_) => req.carrier_segment,
            })
        } else {
            None
        };

        let ev = Evaluator {
            itin: self.itin,
            store: self.store,
            rule,
            fares,
            sink: self.sink,
        };
        let agg = bta::aggregate(&ev, req.travel, active, defer_segment);
        let soft = phase == Phase::Soft && self.allow_soft_match;
        let verdict = if soft { agg.verdict } else { agg.verdict.definite() };
        if verdict.is_fail() {
            return RecordMatch::Rejected(RecordOutcome::ChecksFailed);
        }

        let defer = match not_avail(
            req.kind,
            rule,
            req.defer_target,
            us_dot,
            self.iata_reso_302_mandate,
        ) {
            NotAvail::Fail => return RecordMatch::Rejected(RecordOutcome::NotAvailFailed),
            NotAvail::Pass => false,
            NotAvail::Defer => true,
        };

        let soft_pass = if verdict == Verdict::Indeterminate {
            active & CheckSet::FARE_DEPENDENT
        } else {
            CheckSet::empty()
        };
        RecordMatch::Matched {
            soft_pass,
            eligible: agg.eligible,
            defer,
        }
    }
}
