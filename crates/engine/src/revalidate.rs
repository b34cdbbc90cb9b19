//! Revalidation of soft-matched records once fares are (partly) known.
//!
//! Only the checks left in a record's soft-pass mask are re-run, over the segments
//! recorded at match time. The cached record is never modified: the same record is
//! revalidated against many fare paths.

use serde::Serialize;

use farebag_core::{Bta, FareLookup, Itinerary};

use crate::bta::{self, Evaluator};
use crate::cache::MatchedFee;
use crate::check::CheckSet;
use crate::diag::DiagSink;
use crate::store::RecordStore;
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Revalidation {
    pub verdict: Verdict,
    /// Checks still open after this revalidation. Always a subset of the record's
    /// soft-pass mask; empty once the verdict is definite.
    pub remaining: CheckSet,
}

impl Revalidation {
    pub const PASS: Self = Self {
        verdict: Verdict::Pass,
        remaining: CheckSet::empty(),
    };
}

pub fn revalidate(
    itin: &Itinerary,
    store: &dyn RecordStore,
    fee: &MatchedFee,
    fares: &dyn FareLookup,
    sink: Option<&dyn DiagSink>,
) -> Revalidation {
    if fee.is_definite() {
        return Revalidation::PASS;
    }
    let ev = Evaluator {
        itin,
        store,
        rule: &fee.rule,
        fares,
        sink,
    };
    let verdict = bta::aggregate_fare_checks(&ev, fee.soft_pass, &fee.eligible);
    let remaining = if !verdict.is_indeterminate() {
        CheckSet::empty()
    } else {
        match fee.rule.bta {
            Bta::Any | Bta::Journey => fee.soft_pass,
            Bta::All | Bta::MostSignificant | Bta::Blank => bta::per_check_verdicts(
                &ev,
                fee.soft_pass,
                &fee.eligible,
            )
            .into_iter()
            .filter(|(_, v)| v.is_indeterminate())
            .fold(CheckSet::empty(), |m, (c, _)| m | c.flag()),
        }
    };
    log::trace!(
        "revalidate {} seq {}: {} (open: {:?})",
        fee.id,
        fee.rule.seq_no,
        verdict,
        remaining
    );
    Revalidation { verdict, remaining }
}
