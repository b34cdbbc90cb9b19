//! The per-transaction engine: one itinerary, its baggage travels, and the cache
//! built up while a fare-path search asks about them.
//!
//! The soft path (`determine_*`) populates the cache; `compute_fee`,
//! `compute_lower_bound` and `revalidate` only read it, populating lazily when a
//! group has not been looked at yet.

use chrono::NaiveDate;

use farebag_config::EngineConfig;
use farebag_core::{BaggageTravel, FareComponent, FareLookup, FarePath, Itinerary};

use crate::bta::RuleKind;
use crate::cache::{CacheEntry, CarrierKey, FeeCache, MatchedFee, MatchedFeeId};
use crate::diag::{DiagSink, TraceEvent};
use crate::error::EngineError;
use crate::fee::{FeeAmount, GroupFees};
use crate::matcher::Matcher;
use crate::resolver::{self, AllowanceSource, Policy, Probe, Resolution};
use crate::revalidate::{self, Revalidation};
use crate::store::{CarrierTables, CurrencyConverter, RecordStore, SameCurrency};
use crate::validator::{Phase, RecordMatch, RecordRequest, ValidationContext};

static SAME_CURRENCY: SameCurrency = SameCurrency;

pub struct BaggageEngine<'a> {
    store: &'a dyn RecordStore,
    tables: &'a dyn CarrierTables,
    converter: &'a dyn CurrencyConverter,
    sink: Option<&'a dyn DiagSink>,
    config: EngineConfig,
    ticketing_date: NaiveDate,
    itin: Itinerary,
    travels: Vec<BaggageTravel>,
    cache: FeeCache,
}

/// Matcher over the engine's read-only parts, built from fields so the cache can
/// be borrowed mutably alongside it.
fn matcher<'s>(
    itin: &'s Itinerary,
    store: &'s dyn RecordStore,
    converter: &'s dyn CurrencyConverter,
    sink: Option<&'s dyn DiagSink>,
    config: &'s EngineConfig,
    ticketing_date: NaiveDate,
    pax: &'s str,
) -> Matcher<'s> {
    Matcher {
        ctx: ValidationContext {
            itin,
            store,
            sink,
            ticketing_date,
            pax_type: pax,
            allow_soft_match: config.engine.allow_soft_match,
            iata_reso_302_mandate: config.engine.iata_reso_302_mandate,
        },
        vendors: &config.engine.vendors,
        converter,
        currency: &config.engine.calculation_currency,
        max_excess_pieces: config.engine.max_excess_pieces,
    }
}

/// Allowance candidates answered from the cache, scanning on a miss.
struct CacheSource<'s, 'c> {
    cache: &'c mut FeeCache,
    matcher: &'c Matcher<'s>,
    pax: &'c str,
    group: usize,
    travel: BaggageTravel,
}

impl AllowanceSource for CacheSource<'_, '_> {
    fn probe(&mut self, key: &CarrierKey, segment: Option<usize>) -> Option<Probe> {
        if let Some(entry) = self.cache.allowance_entry(self.pax, self.group, key) {
            let candidates = entry
                .records
                .iter()
                .filter_map(|&id| self.cache.get(id).map(|f| (id, f.defer)))
                .collect();
            return Some(Probe {
                vendor: entry.vendor.clone().unwrap_or_default(),
                candidates,
            });
        }

        let req = RecordRequest {
            kind: RuleKind::Allowance,
            travel: &self.travel,
            carrier: &key.carrier,
            defer_target: key.defer_target.as_deref(),
            carrier_segment: segment,
        };
        let scan = self.matcher.scan(&req, self.group);
        let s5_found = scan.s5_found();
        let vendor = scan.vendor;
        let candidates: Vec<(MatchedFeeId, bool)> = scan
            .matches
            .into_iter()
            .map(|f| {
                let defer = f.defer;
                (self.cache.push(f), defer)
            })
            .collect();
        self.cache.group_mut(self.pax, self.group).allowance.insert(
            key.clone(),
            CacheEntry {
                s5_found,
                vendor: vendor.clone(),
                records: candidates.iter().map(|&(id, _)| id).collect(),
            },
        );
        vendor.map(|vendor| Probe { vendor, candidates })
    }
}

impl<'a> BaggageEngine<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        tables: &'a dyn CarrierTables,
        itin: Itinerary,
        travels: Vec<BaggageTravel>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let n = itin.segments.len();
        for bt in &travels {
            for index in [bt.start, bt.mss, bt.mss_journey] {
                if index >= n {
                    return Err(EngineError::UnknownSegment { index });
                }
            }
            if bt.end > n || bt.is_empty() {
                return Err(EngineError::UnknownSegment { index: bt.end });
            }
        }
        let ticketing_date = config.engine.ticketing_date_or_today();
        Ok(Self {
            store,
            tables,
            converter: &SAME_CURRENCY,
            sink: None,
            config,
            ticketing_date,
            itin,
            travels,
            cache: FeeCache::new(),
        })
    }

    pub fn with_converter(mut self, converter: &'a dyn CurrencyConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn DiagSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn itinerary(&self) -> &Itinerary {
        &self.itin
    }

    pub fn travels(&self) -> &[BaggageTravel] {
        &self.travels
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matched(&self, id: MatchedFeeId) -> Option<&MatchedFee> {
        self.cache.get(id)
    }

    /// Cached resolution, without computing one.
    pub fn resolution(&self, pax: &str, group: usize) -> Option<&Resolution> {
        self.cache.group(pax, group).and_then(|g| g.resolution.as_ref())
    }

    /// Number of matched records held by the cache.
    pub fn cached_records(&self) -> usize {
        self.cache.arena_len()
    }

    fn travel(&self, group: usize) -> Result<BaggageTravel, EngineError> {
        self.travels
            .get(group)
            .copied()
            .ok_or(EngineError::UnknownGroup { index: group })
    }

    fn emit(&self, event: TraceEvent) {
        if let Some(sink) = self.sink {
            sink.record(event);
        }
    }

    // -----------------------------------------------------------------------
    // Soft path
    // -----------------------------------------------------------------------

    /// Resolve the governing carrier of `group` for `pax`, reusing the cached
    /// resolution unless its regulatory-table carrier no longer qualifies.
    pub fn resolve(&mut self, pax: &str, group: usize) -> Result<&Resolution, EngineError> {
        let travel = self.travel(group)?;
        let trip_type = self.itin.trip_type;

        let stale = match self.resolution(pax, group) {
            None => None,
            Some(res) => Some(
                res.table_carrier
                    .clone()
                    .filter(|c| !resolver::in_regulatory_table(trip_type, self.tables, c)),
            ),
        };
        let recompute = match stale {
            None => true,
            Some(None) => false,
            Some(Some(carrier)) => {
                self.invalidate(pax, group, &carrier);
                true
            }
        };

        if recompute {
            let overrides = &self.config.overrides;
            let plan = match &overrides.allowance_carrier {
                Some(c) => Some(resolver::override_plan(c, &travel)),
                None => resolver::plan(
                    &self.itin,
                    &travel,
                    self.tables,
                    self.config.engine.iata_reso_302_mandate,
                ),
            };
            let m = matcher(
                &self.itin,
                self.store,
                self.converter,
                self.sink,
                &self.config,
                self.ticketing_date,
                pax,
            );
            let mut source = CacheSource {
                cache: &mut self.cache,
                matcher: &m,
                pax,
                group,
                travel,
            };
            let mut res = match &plan {
                Some(p) => resolver::resolve(p, group, &mut source, self.sink),
                None => Resolution::unresolved(Policy::for_trip(trip_type)),
            };
            if let Some(c) = &overrides.charges_carrier {
                res = res.with_charges_override(c);
            }
            log::debug!(
                "{pax} travel {group}: allowance {:?}, charges {:?}, process charges {}",
                res.allowance_carrier,
                res.charges_carrier,
                res.process_charges
            );
            self.cache.group_mut(pax, group).resolution = Some(res);
        }

        self.resolution(pax, group)
            .ok_or(EngineError::UnknownGroup { index: group })
    }

    /// Soft-pass allowance: the governing carrier's first candidate that does not
    /// defer. `None` when no allowance is determinable from the records.
    pub fn determine_allowance(
        &mut self,
        pax: &str,
        group: usize,
    ) -> Result<Option<MatchedFeeId>, EngineError> {
        Ok(self.resolve(pax, group)?.allowance)
    }

    /// Soft-pass charge candidates of the resolved charges carrier, in sequence
    /// order. Empty when charge processing is off for the group.
    pub fn determine_charges(
        &mut self,
        pax: &str,
        group: usize,
    ) -> Result<Vec<MatchedFeeId>, EngineError> {
        let travel = self.travel(group)?;
        let res = self.resolve(pax, group)?;
        let Some(carrier) = res.charges_carrier.clone().filter(|_| res.process_charges) else {
            return Ok(Vec::new());
        };
        if let Some(entry) = self.cache.charges_entry(pax, group, &carrier) {
            return Ok(entry.records.clone());
        }

        let m = matcher(
            &self.itin,
            self.store,
            self.converter,
            self.sink,
            &self.config,
            self.ticketing_date,
            pax,
        );
        let req = RecordRequest {
            kind: RuleKind::Charge,
            travel: &travel,
            carrier: &carrier,
            defer_target: None,
            carrier_segment: Some(travel.mss),
        };
        let scan = m.scan(&req, group);
        if !scan.s5_found() {
            log::debug!("{pax} travel {group}: no charges S5 for {carrier}");
        }
        let s5_found = scan.s5_found();
        let vendor = scan.vendor;
        let ids: Vec<MatchedFeeId> = scan.matches.into_iter().map(|f| self.cache.push(f)).collect();
        self.cache.group_mut(pax, group).charges.insert(
            carrier,
            CacheEntry {
                s5_found,
                vendor,
                records: ids.clone(),
            },
        );
        Ok(ids)
    }

    /// Carry-on allowance/charge candidates of the MSS marketing carrier. Cached
    /// like charges: repeated calls return the same ids.
    pub fn determine_carry_on(
        &mut self,
        pax: &str,
        group: usize,
    ) -> Result<Vec<MatchedFeeId>, EngineError> {
        self.mss_scan(RuleKind::CarryOn, pax, group)
    }

    /// Embargo candidates of the MSS marketing carrier.
    pub fn determine_embargo(
        &mut self,
        pax: &str,
        group: usize,
    ) -> Result<Vec<MatchedFeeId>, EngineError> {
        self.mss_scan(RuleKind::Embargo, pax, group)
    }

    fn mss_scan(
        &mut self,
        kind: RuleKind,
        pax: &str,
        group: usize,
    ) -> Result<Vec<MatchedFeeId>, EngineError> {
        let travel = self.travel(group)?;
        let carrier = self
            .itin
            .segment(travel.mss)
            .map(|s| s.marketing_carrier.clone())
            .ok_or(EngineError::UnknownSegment { index: travel.mss })?;
        if let Some(entry) = self.cache.ancillary_entry(pax, group, kind, &carrier) {
            return Ok(entry.records.clone());
        }

        let m = matcher(
            &self.itin,
            self.store,
            self.converter,
            self.sink,
            &self.config,
            self.ticketing_date,
            pax,
        );
        let req = RecordRequest {
            kind,
            travel: &travel,
            carrier: &carrier,
            defer_target: None,
            carrier_segment: Some(travel.mss),
        };
        let scan = m.scan(&req, group);
        log::debug!(
            "{pax} travel {group}: {kind} {carrier}: {} candidate(s)",
            scan.matches.len()
        );
        let s5_found = scan.s5_found();
        let vendor = scan.vendor;
        let ids: Vec<MatchedFeeId> = scan.matches.into_iter().map(|f| self.cache.push(f)).collect();
        self.cache.group_mut(pax, group).ancillary.insert(
            (kind, carrier),
            CacheEntry {
                s5_found,
                vendor,
                records: ids.clone(),
            },
        );
        Ok(ids)
    }

    /// Clear the cached entries of `group` keyed by `carrier`. Matches already
    /// cached stay addressable; the next access rescans.
    pub fn invalidate(&mut self, pax: &str, group: usize, carrier: &str) -> usize {
        let n = self.cache.invalidate(pax, group, carrier);
        log::debug!("{pax} travel {group}: invalidated {n} entr(ies) for {carrier}");
        self.emit(TraceEvent::CacheInvalidated {
            group,
            carrier: carrier.to_string(),
        });
        n
    }

    // -----------------------------------------------------------------------
    // Fares known
    // -----------------------------------------------------------------------

    /// Re-run a record's open checks against `fares`.
    pub fn revalidate(
        &self,
        id: MatchedFeeId,
        fares: &dyn FareLookup,
    ) -> Result<Revalidation, EngineError> {
        let fee = self
            .cache
            .get(id)
            .ok_or(EngineError::UnknownRecord { id: id.0 })?;
        Ok(revalidate::revalidate(
            &self.itin, self.store, fee, fares, self.sink,
        ))
    }

    /// Full hard-pass validation of a cached record's rule against `fares`: every
    /// active check, missing fares failing.
    pub fn validate_hard(
        &self,
        pax: &str,
        id: MatchedFeeId,
        fares: &dyn FareLookup,
    ) -> Result<bool, EngineError> {
        let fee = self
            .cache
            .get(id)
            .ok_or(EngineError::UnknownRecord { id: id.0 })?;
        let m = matcher(
            &self.itin,
            self.store,
            self.converter,
            self.sink,
            &self.config,
            self.ticketing_date,
            pax,
        );
        let req = RecordRequest {
            kind: fee.kind,
            travel: &fee.travel,
            carrier: &fee.carrier,
            defer_target: fee.defer_target.as_deref(),
            carrier_segment: fee.carrier_segment,
        };
        Ok(matches!(
            m.ctx.validate(&req, &fee.rule, fares, Phase::Hard),
            RecordMatch::Matched { .. }
        ))
    }

    fn check_segments(&self, what: &str, segments: &[usize]) -> Result<(), EngineError> {
        let n = self.itin.segments.len();
        match segments.iter().find(|&&s| s >= n) {
            Some(s) => Err(EngineError::InvalidFarePath(format!(
                "{what} covers segment {s}, itinerary has {n}"
            ))),
            None => Ok(()),
        }
    }

    fn entry_records<'s>(&'s self, entry: Option<&'s CacheEntry>) -> Vec<&'s MatchedFee> {
        entry
            .map(|e| e.records.iter().filter_map(|&id| self.cache.get(id)).collect())
            .unwrap_or_default()
    }

    fn group_fees(&self, pax: &str, group: usize) -> GroupFees<'_> {
        let max_excess_pieces = self.config.engine.max_excess_pieces;
        let cached = (self.cache.group(pax, group), self.resolution(pax, group));
        let (Some(g), Some(res)) = cached else {
            return GroupFees {
                max_excess_pieces,
                ..GroupFees::default()
            };
        };
        GroupFees {
            allowance_chain: res
                .allowance_chain
                .iter()
                .map(|key| self.entry_records(g.allowance.get(key)))
                .collect(),
            charges: res
                .charges_carrier
                .as_ref()
                .map(|c| self.entry_records(g.charges.get(c)))
                .unwrap_or_default(),
            process_charges: res.process_charges,
            max_excess_pieces,
        }
    }

    fn populate(&mut self, pax: &str, group: usize) -> Result<(), EngineError> {
        self.determine_allowance(pax, group)?;
        self.determine_charges(pax, group)?;
        Ok(())
    }

    /// Exact baggage charge of a finished fare path, summed over every baggage
    /// travel. [`FeeAmount::Invalid`] when any travel cannot be resolved.
    pub fn compute_fee(
        &mut self,
        pax: &str,
        path: &FarePath,
        checked_bags: u8,
    ) -> Result<FeeAmount, EngineError> {
        for c in &path.components {
            self.check_segments(&format!("fare {}", c.fare.fare_class), &c.segments)?;
        }
        if let Some(s) = path.overlapping_segments().first() {
            return Err(EngineError::InvalidFarePath(format!(
                "segment {s} is covered by more than one fare"
            )));
        }
        for group in 0..self.travels.len() {
            self.populate(pax, group)?;
        }

        let mut total = FeeAmount::Valid(0);
        for group in 0..self.travels.len() {
            let fees = self.group_fees(pax, group);
            let mut reval = |f: &MatchedFee| {
                revalidate::revalidate(&self.itin, self.store, f, path, self.sink).verdict
            };
            let amount = fees.exact(checked_bags, &mut reval);
            log::debug!("{pax} travel {group}: fee {amount}");
            total = total.plus(amount);
        }
        Ok(total)
    }

    /// Least charge obtainable for the baggage travels attributed to `component`
    /// (those whose first flown segment it covers), whatever fares the rest of
    /// the path ends up with.
    pub fn compute_lower_bound(
        &mut self,
        pax: &str,
        component: &FareComponent,
        checked_bags: u8,
    ) -> Result<FeeAmount, EngineError> {
        self.check_segments(
            &format!("fare {}", component.fare.fare_class),
            &component.segments,
        )?;
        let attributed: Vec<usize> = self
            .travels
            .iter()
            .enumerate()
            .filter(|(_, bt)| {
                bt.range()
                    .find(|&i| self.itin.segment(i).is_some_and(|s| s.is_air()))
                    .is_some_and(|first| component.covers(first))
            })
            .map(|(i, _)| i)
            .collect();
        for &group in &attributed {
            self.populate(pax, group)?;
        }

        let mut total = FeeAmount::Valid(0);
        for group in attributed {
            let fees = self.group_fees(pax, group);
            let mut reval = |f: &MatchedFee| {
                revalidate::revalidate(&self.itin, self.store, f, component, self.sink).verdict
            };
            total = total.plus(fees.lower_bound(checked_bags, &mut reval));
        }
        Ok(total)
    }
}
