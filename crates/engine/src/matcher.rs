//! S5 lookup and the soft-pass scan over a carrier's S7 records.

use std::sync::Arc;

use farebag_core::{BaggageTravel, NoFares, NotAvailNoCharge, ServiceRule, SubCodeRecord};

use crate::bta::RuleKind;
use crate::cache::{full_ordinal_mask, ordinal_mask, MatchedFee, MatchedFeeId};
use crate::diag::{RecordOutcome, TraceEvent};
use crate::store::CurrencyConverter;
use crate::validator::{Phase, RecordMatch, RecordRequest, ValidationContext};

/// Sub-code carried by the checked-baggage allowance S5.
pub const ALLOWANCE_SUB_CODE: &str = "0DF";

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Fixed structural filter an S5 must pass to be used for `kind`.
pub fn s5_qualifies(kind: RuleKind, s5: &SubCodeRecord) -> bool {
    if s5.service_type != kind.service_type() {
        return false;
    }
    let common = s5.concur == "X"
        && blank(&s5.ssim_code)
        && blank(&s5.ssr_code)
        && blank(&s5.booking_ind);
    match kind {
        RuleKind::Allowance => {
            s5.service_sub_code == ALLOWANCE_SUB_CODE && common && emd_and_rfic(s5)
        }
        RuleKind::Charge | RuleKind::CarryOn => common && emd_and_rfic(s5),
        RuleKind::Embargo => common,
    }
}

fn emd_and_rfic(s5: &SubCodeRecord) -> bool {
    (s5.rfic == "C" || blank(&s5.rfic)) && s5.emd_type == "4"
}

/// S7 matches found for one carrier.
#[derive(Debug, Default)]
pub struct Scan {
    /// Vendor whose S5 was used; `None` when no qualifying S5 exists.
    pub vendor: Option<String>,
    pub matches: Vec<MatchedFee>,
}

impl Scan {
    pub fn s5_found(&self) -> bool {
        self.vendor.is_some()
    }
}

pub struct Matcher<'a> {
    pub ctx: ValidationContext<'a>,
    pub vendors: &'a [String],
    pub converter: &'a dyn CurrencyConverter,
    pub currency: &'a str,
    pub max_excess_pieces: u8,
}

impl<'a> Matcher<'a> {
    /// Qualifying S5 records of the first vendor (in precedence order) that has any.
    /// Allowance uses a single record; charges use every qualifying sub-code.
    pub fn find_s5(
        &self,
        kind: RuleKind,
        carrier: &str,
    ) -> Option<(&'a str, Vec<&'a SubCodeRecord>)> {
        let store = self.ctx.store;
        for vendor in self.vendors {
            let mut found: Vec<&'a SubCodeRecord> = store
                .sub_codes(vendor, carrier)
                .iter()
                .filter(|s5| s5_qualifies(kind, s5))
                .collect();
            if found.is_empty() {
                continue;
            }
            if kind != RuleKind::Charge {
                found.truncate(1);
            }
            return Some((found[0].vendor.as_str(), found));
        }
        None
    }

    /// Soft-pass scan of `carrier`'s records for one baggage travel.
    ///
    /// Records are visited in sequence order. Soft matches are kept and the scan
    /// goes on; it stops at the first definite match (for charges: once every
    /// ordinal has a definite match).
    pub fn scan(&self, req: &RecordRequest<'_>, group: usize) -> Scan {
        let Some((vendor, s5s)) = self.find_s5(req.kind, req.carrier) else {
            return Scan::default();
        };
        let store = self.ctx.store;
        let mut rules: Vec<&Arc<ServiceRule>> = s5s
            .iter()
            .flat_map(|s5| store.service_rules(vendor, req.carrier, &s5.service_sub_code))
            .collect();
        if s5s.len() > 1 {
            rules.sort_by_key(|r| r.seq_no);
        }

        let charge = req.kind == RuleKind::Charge;
        let full = full_ordinal_mask(self.max_excess_pieces);
        let mut decided = 0u8;
        let mut matches = Vec::new();

        for rule in rules {
            let ordinals = if charge {
                ordinal_mask(rule.occurrence_first, rule.occurrence_last, self.max_excess_pieces)
                    & !decided
            } else {
                0
            };
            if charge && ordinals == 0 {
                continue;
            }
            let Some((amount, available)) = self.price(req.kind, rule) else {
                self.unpriceable(req.carrier, rule);
                continue;
            };
            let RecordMatch::Matched {
                soft_pass,
                eligible,
                defer,
            } = self.ctx.validate(req, rule, &NoFares, Phase::Soft)
            else {
                continue;
            };
            let definite = soft_pass.is_empty();
            matches.push(MatchedFee {
                id: MatchedFeeId(usize::MAX),
                kind: req.kind,
                group,
                travel: *req.travel,
                rule: Arc::clone(rule),
                carrier: req.carrier.to_string(),
                defer_target: req.defer_target.map(String::from),
                carrier_segment: req.carrier_segment,
                soft_pass,
                eligible,
                ordinals,
                defer,
                amount,
                available,
            });
            if definite {
                if !charge {
                    break;
                }
                decided |= ordinals;
                if decided == full {
                    break;
                }
            }
        }

        Scan {
            vendor: Some(vendor.to_string()),
            matches,
        }
    }

    /// Amount in calculation currency and availability. `None` when the amount
    /// is negative or cannot be converted.
    fn price(&self, kind: RuleKind, rule: &ServiceRule) -> Option<(i64, bool)> {
        let available = rule.not_avail_no_charge != NotAvailNoCharge::NotAvailable;
        match kind {
            RuleKind::Allowance | RuleKind::Embargo => Some((0, available)),
            RuleKind::Charge | RuleKind::CarryOn => {
                if !available || rule.not_avail_no_charge.is_free() {
                    return Some((0, available));
                }
                if rule.amount < 0 {
                    return None;
                }
                self.converter
                    .convert(rule.amount, &rule.currency, self.currency)
                    .filter(|a| *a >= 0)
                    .map(|a| (a, true))
            }
        }
    }

    fn unpriceable(&self, carrier: &str, rule: &ServiceRule) {
        let outcome = if rule.amount < 0 {
            log::warn!("{carrier} seq {}: negative amount {}", rule.seq_no, rule.amount);
            RecordOutcome::NegativeAmount
        } else {
            log::debug!(
                "{carrier} seq {}: cannot convert {} {} to {}",
                rule.seq_no,
                rule.amount,
                rule.currency,
                self.currency
            );
            RecordOutcome::CurrencyUnconvertible
        };
        if let Some(sink) = self.ctx.sink {
            sink.record(TraceEvent::RecordConsidered {
                carrier: carrier.to_string(),
                seq_no: rule.seq_no,
                outcome,
            });
        }
    }
}
