//! Running a scenario through the engine and rendering what came out.

use std::fmt::Write as _;

use serde::Serialize;

use farebag_config::EngineConfig;
use farebag_core::BaggageTravel;
use farebag_engine::{
    BaggageEngine, CheckSet, EngineError, FeeAmount, MatchedFee, MatchedFeeId, RecordingSink,
    Resolution, TraceEvent,
};

use crate::scenario::Scenario;

/// One cached match, flattened for output.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRow {
    pub id: MatchedFeeId,
    pub carrier: String,
    pub vendor: String,
    pub sub_code: String,
    pub seq_no: u32,
    pub free_pieces: u8,
    pub amount: i64,
    pub available: bool,
    pub defer: bool,
    /// Checks still waiting on fares.
    pub soft_pass: CheckSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinals: Option<Vec<u8>>,
}

impl MatchRow {
    fn new(fee: &MatchedFee) -> Self {
        let ordinals = (fee.ordinals != 0)
            .then(|| (1..=8).filter(|&n| fee.covers_ordinal(n)).collect());
        Self {
            id: fee.id,
            carrier: fee.carrier.clone(),
            vendor: fee.rule.vendor.clone(),
            sub_code: fee.rule.service_sub_code.clone(),
            seq_no: fee.rule.seq_no,
            free_pieces: fee.free_pieces(),
            amount: fee.amount,
            available: fee.available,
            defer: fee.defer,
            soft_pass: fee.soft_pass,
            ordinals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub mss: usize,
    pub mss_journey: usize,
    pub resolution: Resolution,
    pub allowance: Option<MatchRow>,
    pub charges: Vec<MatchRow>,
    pub carry_on: Vec<MatchRow>,
    pub embargo: Vec<MatchRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FarePathReport {
    pub index: usize,
    pub fee: FeeAmount,
    /// Lower bound per fare component, in component order.
    pub lower_bounds: Vec<FeeAmount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerReport {
    pub pax_type: String,
    pub groups: Vec<GroupReport>,
    pub fare_paths: Vec<FarePathReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub trip_type: String,
    pub checked_bags: u8,
    pub currency: String,
    pub passengers: Vec<PassengerReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceEvent>,
}

impl Report {
    /// Any fare path without a valid fee.
    pub fn has_invalid_fee(&self) -> bool {
        self.passengers
            .iter()
            .flat_map(|p| &p.fare_paths)
            .any(|f| !f.fee.is_valid())
    }
}

fn rows(engine: &BaggageEngine<'_>, ids: &[MatchedFeeId]) -> Vec<MatchRow> {
    ids.iter()
        .filter_map(|&id| engine.matched(id))
        .map(MatchRow::new)
        .collect()
}

fn group_report(
    engine: &mut BaggageEngine<'_>,
    pax: &str,
    index: usize,
    travel: BaggageTravel,
) -> Result<GroupReport, EngineError> {
    let resolution = engine.resolve(pax, index)?.clone();
    let allowance = resolution
        .allowance
        .and_then(|id| engine.matched(id))
        .map(MatchRow::new);
    let charges = engine.determine_charges(pax, index)?;
    let carry_on = engine.determine_carry_on(pax, index)?;
    let embargo = engine.determine_embargo(pax, index)?;
    Ok(GroupReport {
        index,
        start: travel.start,
        end: travel.end,
        mss: travel.mss,
        mss_journey: travel.mss_journey,
        resolution,
        allowance,
        charges: rows(engine, &charges),
        carry_on: rows(engine, &carry_on),
        embargo: rows(engine, &embargo),
    })
}

/// Run every passenger of `scenario` through one engine: soft path per group, then
/// exact fees and per-component lower bounds for each fare path.
pub fn run(scenario: &Scenario, config: EngineConfig, trace: bool) -> Result<Report, EngineError> {
    let store = scenario.store()?;
    let itin = scenario.itinerary();
    let travels = scenario.travels(&itin)?;
    let currency = config.engine.calculation_currency.clone();
    let trip_type = itin.trip_type.to_string();
    let sink = RecordingSink::new();

    let mut engine = BaggageEngine::new(&store, &store, itin, travels.clone(), config)?;
    if trace {
        engine = engine.with_sink(&sink);
    }

    let mut passengers = Vec::with_capacity(scenario.passengers.len());
    for pax in &scenario.passengers {
        let mut groups = Vec::with_capacity(travels.len());
        for (index, &travel) in travels.iter().enumerate() {
            groups.push(group_report(&mut engine, pax, index, travel)?);
        }

        let mut fare_paths = Vec::with_capacity(scenario.fare_paths.len());
        for (index, path) in scenario.fare_paths.iter().enumerate() {
            let fee = engine.compute_fee(pax, path, scenario.checked_bags)?;
            let mut lower_bounds = Vec::with_capacity(path.components.len());
            for component in &path.components {
                let bound = engine.compute_lower_bound(pax, component, scenario.checked_bags)?;
                lower_bounds.push(bound);
            }
            log::info!("{pax} fare path {index}: fee {fee}");
            fare_paths.push(FarePathReport {
                index,
                fee,
                lower_bounds,
            });
        }

        passengers.push(PassengerReport {
            pax_type: pax.clone(),
            groups,
            fare_paths,
        });
    }

    drop(engine);
    Ok(Report {
        trip_type,
        checked_bags: scenario.checked_bags,
        currency,
        passengers,
        trace: sink.take(),
    })
}

// ---------------------------------------------------------------------------
// Human-readable rendering
// ---------------------------------------------------------------------------

fn describe(row: &MatchRow) -> String {
    let mut s = format!("{} {} seq {}", row.vendor, row.sub_code, row.seq_no);
    if row.defer {
        s.push_str(" (defers)");
    }
    if !row.soft_pass.is_empty() {
        let _ = write!(s, " [open: {:?}]", row.soft_pass);
    }
    s
}

fn money(amount: FeeAmount, currency: &str) -> String {
    match amount {
        FeeAmount::Valid(a) => format!("{a} {currency}"),
        FeeAmount::Invalid => "invalid".to_string(),
    }
}

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "trip type {}, {} checked bag(s)",
        report.trip_type, report.checked_bags
    );
    for p in &report.passengers {
        let _ = writeln!(out, "\npassenger {}", p.pax_type);
        for g in &p.groups {
            let r = &g.resolution;
            let _ = writeln!(
                out,
                "  travel {} [{}..{}) mss {}: {:?} policy",
                g.index, g.start, g.end, g.mss, r.policy,
            );
            let _ = writeln!(
                out,
                "    allowance carrier {}, charges carrier {}{}",
                r.allowance_carrier.as_deref().unwrap_or("-"),
                r.charges_carrier.as_deref().unwrap_or("-"),
                if r.process_charges { "" } else { " (charges not processed)" },
            );
            match &g.allowance {
                Some(a) => {
                    let _ = writeln!(out, "    allowance: {} free, {}", a.free_pieces, describe(a));
                }
                None => {
                    let _ = writeln!(out, "    allowance: none");
                }
            }
            for c in &g.charges {
                let pieces = c
                    .ordinals
                    .as_ref()
                    .map(|o| o.iter().map(u8::to_string).collect::<Vec<_>>().join(","))
                    .unwrap_or_default();
                let amount = if c.available {
                    format!("{} {}", c.amount, report.currency)
                } else {
                    "not available".to_string()
                };
                let _ = writeln!(out, "    charge #{pieces}: {amount}, {}", describe(c));
            }
            if !g.carry_on.is_empty() {
                let _ = writeln!(out, "    carry-on: {} rule(s)", g.carry_on.len());
            }
            if !g.embargo.is_empty() {
                let _ = writeln!(out, "    embargo: {} rule(s)", g.embargo.len());
            }
        }
        for f in &p.fare_paths {
            let bounds: Vec<String> = f
                .lower_bounds
                .iter()
                .map(|b| money(*b, &report.currency))
                .collect();
            let _ = writeln!(
                out,
                "  fare path {}: {} (lower bounds {})",
                f.index,
                money(f.fee, &report.currency),
                bounds.join(", ")
            );
        }
    }
    out
}
