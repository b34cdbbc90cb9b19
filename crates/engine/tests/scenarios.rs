use std::cell::Cell;

use chrono::NaiveDate;

use farebag_config::EngineConfig;
use farebag_core::{
    BaggageTravel, Bta, Cabin, Fare, FareComponent, FarePath, Itinerary, Loc, NoFares,
    NotAvailNoCharge, ResultingFareClassEntry, SegmentKind, ServiceRule, ServiceType,
    SubCodeRecord, TravelSeg, TripType,
};
use farebag_engine::{
    BaggageEngine, CarrierTables, EngineError, FeeAmount, MemoryStore, Policy, RecordingSink,
    TraceEvent, Verdict,
};

// -------------------------------------------------------------------------
// Builders
// -------------------------------------------------------------------------

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn seg(from: (&str, &str, u8), to: (&str, &str, u8), mkt: &str, opr: &str) -> TravelSeg {
    TravelSeg {
        origin: Loc::new(from.0, from.1, from.2, ""),
        destination: Loc::new(to.0, to.1, to.2, ""),
        kind: SegmentKind::Air,
        marketing_carrier: mkt.into(),
        operating_carrier: Some(opr.into()),
        flight_number: 400,
        cabin: Cabin::Economy,
        booking_code: "Y".into(),
        departure: date("2026-05-01"),
        rebooked: None,
    }
}

const FRA: (&str, &str, u8) = ("FRA", "DE", 2);
const MUC: (&str, &str, u8) = ("MUC", "DE", 2);
const NRT: (&str, &str, u8) = ("NRT", "JP", 3);
const DFW: (&str, &str, u8) = ("DFW", "US", 1);
const ORD: (&str, &str, u8) = ("ORD", "US", 1);

fn s5(carrier: &str, sub: &str, ty: ServiceType) -> SubCodeRecord {
    SubCodeRecord {
        vendor: "ATP".into(),
        carrier: carrier.into(),
        service_sub_code: sub.into(),
        service_type: ty,
        concur: "X".into(),
        rfic: "C".into(),
        ssim_code: String::new(),
        ssr_code: String::new(),
        emd_type: "4".into(),
        booking_ind: String::new(),
    }
}

fn s7(carrier: &str, sub: &str, seq: u32, ind: NotAvailNoCharge) -> ServiceRule {
    ServiceRule {
        vendor: "ATP".into(),
        carrier: carrier.into(),
        service_sub_code: sub.into(),
        seq_no: seq,
        effective: date("2026-01-01"),
        discontinue: date("2026-12-31"),
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
        not_avail_no_charge: ind,
        free_pieces: 1,
        amount: 0,
        currency: String::new(),
        occurrence_first: 0,
        occurrence_last: 0,
    }
}

fn allowance(store: &mut MemoryStore, carrier: &str, rules: Vec<ServiceRule>) {
    store.add_sub_code(s5(carrier, "0DF", ServiceType::Allowance));
    for r in rules {
        store.add_rule(r);
    }
}

fn charge(store: &mut MemoryStore, carrier: &str, seq: u32, amount: i64) {
    store.add_sub_code(s5(carrier, "0GO", ServiceType::Charges));
    let mut r = s7(carrier, "0GO", seq, NotAvailNoCharge::Blank);
    r.amount = amount;
    r.currency = "USD".into();
    store.add_rule(r);
}

fn fare(class: &str, segments: Vec<usize>) -> FareComponent {
    FareComponent {
        fare: Fare {
            vendor: "ATP".into(),
            carrier: "AA".into(),
            fare_class: class.into(),
            fare_type: String::new(),
            rule: String::new(),
            rule_tariff: 0,
            ticket_designator: None,
            category: None,
        },
        segments,
    }
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.ticketing_date = Some(date("2026-02-01"));
    config
}

fn fare_class_table(store: &mut MemoryStore, item: u32, pattern: &str) {
    store.add_resulting_fare_class_table(
        "ATP",
        item,
        vec![ResultingFareClassEntry {
            carrier: "AA".into(),
            fare_class: pattern.into(),
            fare_type: String::new(),
        }],
    );
}

// -------------------------------------------------------------------------
// Matching
// -------------------------------------------------------------------------

/// Two AA segments; the MSS cabin alone decides, fares never matter.
#[test]
fn most_significant_cabin_resolves_without_fares() {
    let itin = Itinerary {
        segments: vec![seg(DFW, ORD, "AA", "AA"), seg(ORD, FRA, "AA", "AA")],
        trip_type: TripType::ToFromUs,
    };
    let mut rule = s7("AA", "0DF", 10, NotAvailNoCharge::FreeNoEmd);
    rule.cabin = Some(Cabin::Economy);
    rule.bta = Bta::MostSignificant;
    let mut store = MemoryStore::new();
    allowance(&mut store, "AA", vec![rule]);

    let travels = vec![BaggageTravel::new(0, 2, 1)];
    let mut e = BaggageEngine::new(&store, &store, itin.clone(), travels, config()).unwrap();
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert!(e.matched(id).unwrap().is_definite());
    assert!(e.validate_hard("ADT", id, &NoFares).unwrap());
    let any = FarePath::new(vec![fare("ZZZ", vec![0, 1])]);
    assert_eq!(e.revalidate(id, &any).unwrap().verdict, Verdict::Pass);

    // Business on the MSS: no match
    let mut business = itin;
    business.segments[1].cabin = Cabin::Business;
    let travels = vec![BaggageTravel::new(0, 2, 1)];
    let mut e = BaggageEngine::new(&store, &store, business, travels, config()).unwrap();
    assert!(e.determine_allowance("ADT", 0).unwrap().is_none());
}

/// BTA ALL with a fare-class check: one qualifying and one non-qualifying fare fail.
#[test]
fn all_mode_fare_class_fails_on_mixed_fares() {
    let itin = Itinerary {
        segments: vec![seg(FRA, MUC, "AA", "AA"), seg(MUC, FRA, "AA", "AA")],
        trip_type: TripType::Other,
    };
    let mut rule = s7("AA", "0DF", 10, NotAvailNoCharge::FreeNoEmd);
    rule.bta = Bta::All;
    rule.resulting_fare_class_item = 9;
    let mut store = MemoryStore::new();
    fare_class_table(&mut store, 9, "Y-");
    allowance(&mut store, "AA", vec![rule]);

    let mut e = BaggageEngine::new(
        &store,
        &store,
        itin,
        vec![BaggageTravel::new(0, 2, 0)],
        config(),
    )
    .unwrap();
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();

    let mixed = FarePath::new(vec![fare("YOW", vec![0]), fare("BOW", vec![1])]);
    assert_eq!(e.revalidate(id, &mixed).unwrap().verdict, Verdict::Fail);
    assert!(!e.validate_hard("ADT", id, &mixed).unwrap());

    // No stale result left behind
    let good = FarePath::new(vec![fare("YOW", vec![0]), fare("YRT", vec![1])]);
    assert_eq!(e.revalidate(id, &good).unwrap().verdict, Verdict::Pass);
    assert!(e.validate_hard("ADT", id, &good).unwrap());
    assert_eq!(e.revalidate(id, &mixed).unwrap().verdict, Verdict::Fail);
}

#[test]
fn soft_match_can_be_disabled() {
    let itin = Itinerary {
        segments: vec![seg(FRA, MUC, "AA", "AA")],
        trip_type: TripType::Other,
    };
    let mut soft = s7("AA", "0DF", 10, NotAvailNoCharge::FreeNoEmd);
    soft.resulting_fare_class_item = 9;
    let definite = s7("AA", "0DF", 20, NotAvailNoCharge::FreeNoEmd);
    let mut store = MemoryStore::new();
    fare_class_table(&mut store, 9, "Y-");
    allowance(&mut store, "AA", vec![soft, definite]);

    let mut cfg = config();
    cfg.engine.allow_soft_match = false;
    let mut e = BaggageEngine::new(&store, &store, itin, vec![BaggageTravel::new(0, 1, 0)], cfg)
        .unwrap();
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(id).unwrap().rule.seq_no, 20);
}

// -------------------------------------------------------------------------
// Carrier resolution
// -------------------------------------------------------------------------

/// Segment 0 FM operated by FO, segment 1 (the MSS) MM operated by MO.
fn no_dot_table_itin() -> Itinerary {
    Itinerary {
        segments: vec![seg(FRA, MUC, "FM", "FO"), seg(MUC, NRT, "MM", "MO")],
        trip_type: TripType::Other,
    }
}

fn no_dot_engine(store: &MemoryStore) -> BaggageEngine<'_> {
    BaggageEngine::new(
        store,
        store,
        no_dot_table_itin(),
        vec![BaggageTravel::new(0, 2, 1)],
        config(),
    )
    .unwrap()
}

#[test]
fn no_s5_means_no_charge_processing() {
    let itin = Itinerary {
        segments: vec![seg(FRA, MUC, "BB", "BB")],
        trip_type: TripType::Other,
    };
    let store = MemoryStore::new();
    let travels = vec![BaggageTravel::new(0, 1, 0)];
    let mut e = BaggageEngine::new(&store, &store, itin, travels, config()).unwrap();
    assert!(e.determine_allowance("ADT", 0).unwrap().is_none());
    assert!(!e.resolution("ADT", 0).unwrap().process_charges);
    assert!(e.determine_charges("ADT", 0).unwrap().is_empty());

    let path = FarePath::new(vec![fare("YOW", vec![0])]);
    assert_eq!(e.compute_fee("ADT", &path, 0).unwrap(), FeeAmount::Valid(0));
    assert_eq!(e.compute_fee("ADT", &path, 1).unwrap(), FeeAmount::Invalid);
}

#[test]
fn mss_carrier_defers_to_operating_carrier() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "MM", vec![s7("MM", "0DF", 1, NotAvailNoCharge::DeferToOperating)]);
    let mut granted = s7("MO", "0DF", 1, NotAvailNoCharge::FreeNoEmd);
    granted.free_pieces = 2;
    allowance(&mut store, "MO", vec![granted]);
    charge(&mut store, "MO", 5, 4000);

    let mut e = no_dot_engine(&store);
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(id).unwrap().carrier, "MO");
    let res = e.resolution("ADT", 0).unwrap();
    assert!(res.deferred);
    assert_eq!(res.charges_carrier.as_deref(), Some("MO"));

    let path = FarePath::new(vec![fare("YOW", vec![0, 1])]);
    assert_eq!(e.compute_fee("ADT", &path, 2).unwrap(), FeeAmount::Valid(0));
    assert_eq!(e.compute_fee("ADT", &path, 3).unwrap(), FeeAmount::Valid(4000));
}

#[test]
fn defer_to_carrier_without_s5_falls_back_to_first_segment() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "MM", vec![s7("MM", "0DF", 1, NotAvailNoCharge::DeferToOperating)]);
    allowance(&mut store, "FM", vec![s7("FM", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);

    let mut e = no_dot_engine(&store);
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(id).unwrap().carrier, "FM");
    let res = e.resolution("ADT", 0).unwrap();
    assert!(res.process_charges);
    assert!(!res.deferred);
    assert_eq!(res.evaluated.len(), 2);
}

#[test]
fn fallback_deferring_to_carrier_without_s5_stops_charges() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "FM", vec![s7("FM", "0DF", 1, NotAvailNoCharge::DeferToOperating)]);

    let mut e = no_dot_engine(&store);
    assert!(e.determine_allowance("ADT", 0).unwrap().is_none());
    let res = e.resolution("ADT", 0).unwrap();
    assert_eq!(res.allowance_carrier.as_deref(), Some("FO"));
    assert!(!res.process_charges);
}

#[test]
fn defer_to_marketing_rejected_under_mandate() {
    // Non-DOT trip with the mandate on: a defer to marketing is not a valid defer
    let mut store = MemoryStore::new();
    allowance(
        &mut store,
        "MM",
        vec![
            s7("MM", "0DF", 1, NotAvailNoCharge::DeferToMarketing),
            s7("MM", "0DF", 2, NotAvailNoCharge::FreeNoEmd),
        ],
    );
    let mut e = no_dot_engine(&store);
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(id).unwrap().rule.seq_no, 2);
    assert!(!e.resolution("ADT", 0).unwrap().deferred);
}

#[test]
fn carrier_overrides() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "MM", vec![s7("MM", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    allowance(&mut store, "XX", vec![s7("XX", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    charge(&mut store, "ZZ", 1, 999);

    let mut cfg = config();
    cfg.overrides.allowance_carrier = Some("XX".into());
    cfg.overrides.charges_carrier = Some("ZZ".into());
    let mut e = BaggageEngine::new(
        &store,
        &store,
        no_dot_table_itin(),
        vec![BaggageTravel::new(0, 2, 1)],
        cfg,
    )
    .unwrap();
    let id = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(id).unwrap().carrier, "XX");
    let res = e.resolution("ADT", 0).unwrap();
    assert_eq!(res.policy, Policy::Override);
    assert_eq!(res.charges_carrier.as_deref(), Some("ZZ"));

    let path = FarePath::new(vec![fare("YOW", vec![0, 1])]);
    assert_eq!(e.compute_fee("ADT", &path, 2).unwrap(), FeeAmount::Valid(999));
}

// -------------------------------------------------------------------------
// Invalidation
// -------------------------------------------------------------------------

/// US DOT table whose membership can change mid-transaction.
struct Toggle {
    lh_listed: Cell<bool>,
}

impl CarrierTables for Toggle {
    fn is_us_dot_carrier(&self, carrier: &str) -> bool {
        carrier == "LH" && self.lh_listed.get()
    }

    fn is_cta_carrier(&self, _carrier: &str) -> bool {
        false
    }
}

#[test]
fn table_carrier_dropping_out_invalidates_the_cache() {
    let itin = Itinerary {
        segments: vec![seg(FRA, MUC, "LH", "LH"), seg(MUC, NRT, "NH", "NH")],
        trip_type: TripType::Other,
    };
    let mut store = MemoryStore::new();
    allowance(&mut store, "LH", vec![s7("LH", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    allowance(&mut store, "NH", vec![s7("NH", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    let tables = Toggle {
        lh_listed: Cell::new(true),
    };
    let sink = RecordingSink::new();
    let travels = vec![BaggageTravel::new(0, 2, 1)];
    let mut e = BaggageEngine::new(&store, &tables, itin, travels, config())
        .unwrap()
        .with_sink(&sink);

    let first = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(first).unwrap().carrier, "LH");
    assert_eq!(e.determine_allowance("ADT", 0).unwrap(), Some(first));
    sink.take();

    tables.lh_listed.set(false);
    let second = e.determine_allowance("ADT", 0).unwrap().unwrap();
    assert_eq!(e.matched(second).unwrap().carrier, "NH");
    assert!(sink.events().iter().any(|ev| matches!(
        ev,
        TraceEvent::CacheInvalidated { carrier, .. } if carrier == "LH"
    )));
    // The earlier match is still addressable
    assert_eq!(e.matched(first).unwrap().carrier, "LH");
}

#[test]
fn explicit_invalidation_forces_a_rescan() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "MM", vec![s7("MM", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    let mut e = no_dot_engine(&store);
    let before = e.determine_allowance("ADT", 0).unwrap();
    let records = e.cached_records();

    assert_eq!(e.invalidate("ADT", 0, "MM"), 1);
    assert!(e.resolution("ADT", 0).is_none());
    let after = e.determine_allowance("ADT", 0).unwrap();
    assert_ne!(before, after);
    assert_eq!(e.cached_records(), records + 1);
}

// -------------------------------------------------------------------------
// Other kinds and surface
// -------------------------------------------------------------------------

#[test]
fn carry_on_and_embargo_use_mss_carrier() {
    let mut store = MemoryStore::new();
    store.add_sub_code(s5("MM", "0MN", ServiceType::CarryOn));
    store.add_rule(s7("MM", "0MN", 1, NotAvailNoCharge::FreeNoEmd));
    store.add_sub_code(s5("MM", "0GV", ServiceType::Embargo));
    let mut not_emb = s7("MM", "0GV", 1, NotAvailNoCharge::NotAvailable);
    not_emb.cabin = Some(Cabin::Business);
    store.add_rule(not_emb);
    let mut emb = s7("MM", "0GV", 2, NotAvailNoCharge::NotAvailable);
    emb.cabin = Some(Cabin::Economy);
    store.add_rule(emb);

    let mut e = no_dot_engine(&store);
    let carry = e.determine_carry_on("ADT", 0).unwrap();
    assert_eq!(carry.len(), 1);
    let embargo = e.determine_embargo("ADT", 0).unwrap();
    assert_eq!(embargo.len(), 1);
    let m = e.matched(embargo[0]).unwrap();
    assert_eq!(m.rule.seq_no, 2);
    assert!(!m.available);
}

#[test]
fn carry_on_and_embargo_lookups_are_cached() {
    let mut store = MemoryStore::new();
    store.add_sub_code(s5("MM", "0MN", ServiceType::CarryOn));
    store.add_rule(s7("MM", "0MN", 1, NotAvailNoCharge::FreeNoEmd));
    store.add_sub_code(s5("MM", "0GV", ServiceType::Embargo));
    store.add_rule(s7("MM", "0GV", 1, NotAvailNoCharge::NotAvailable));

    let mut e = no_dot_engine(&store);
    let carry = e.determine_carry_on("ADT", 0).unwrap();
    let embargo = e.determine_embargo("ADT", 0).unwrap();
    let records = e.cached_records();
    assert_eq!(records, 2);
    for _ in 0..100 {
        assert_eq!(e.determine_carry_on("ADT", 0).unwrap(), carry);
        assert_eq!(e.determine_embargo("ADT", 0).unwrap(), embargo);
    }
    assert_eq!(e.cached_records(), records);

    // Invalidating the carrier forces one rescan
    e.invalidate("ADT", 0, "MM");
    let rescanned = e.determine_carry_on("ADT", 0).unwrap();
    assert_ne!(rescanned, carry);
    assert_eq!(e.cached_records(), records + 1);
}

// -------------------------------------------------------------------------
// Amounts
// -------------------------------------------------------------------------

fn no_free_pieces(store: &mut MemoryStore) {
    let mut none = s7("MM", "0DF", 1, NotAvailNoCharge::FreeNoEmd);
    none.free_pieces = 0;
    allowance(store, "MM", vec![none]);
}

#[test]
fn charge_total_overflow_is_invalid() {
    let mut store = MemoryStore::new();
    no_free_pieces(&mut store);
    charge(&mut store, "MM", 1, i64::MAX);

    let mut e = no_dot_engine(&store);
    let path = FarePath::new(vec![fare("YOW", vec![0, 1])]);
    assert_eq!(e.compute_fee("ADT", &path, 1).unwrap(), FeeAmount::Valid(i64::MAX));
    assert_eq!(e.compute_fee("ADT", &path, 2).unwrap(), FeeAmount::Invalid);
    assert_eq!(
        e.compute_lower_bound("ADT", &fare("YOW", vec![0, 1]), 2).unwrap(),
        FeeAmount::Invalid
    );
}

#[test]
fn negative_charge_is_never_used() {
    let mut store = MemoryStore::new();
    no_free_pieces(&mut store);
    charge(&mut store, "MM", 1, -5000);

    let mut e = no_dot_engine(&store);
    assert!(e.determine_charges("ADT", 0).unwrap().is_empty());
    let path = FarePath::new(vec![fare("YOW", vec![0, 1])]);
    assert_eq!(e.compute_fee("ADT", &path, 1).unwrap(), FeeAmount::Invalid);
}

#[test]
fn results_do_not_depend_on_a_sink() {
    let mut store = MemoryStore::new();
    allowance(&mut store, "MM", vec![s7("MM", "0DF", 1, NotAvailNoCharge::DeferToOperating)]);
    allowance(&mut store, "MO", vec![s7("MO", "0DF", 1, NotAvailNoCharge::FreeNoEmd)]);
    charge(&mut store, "MO", 1, 3000);
    let path = FarePath::new(vec![fare("YOW", vec![0, 1])]);

    let mut plain = no_dot_engine(&store);
    let sink = RecordingSink::new();
    let mut traced = no_dot_engine(&store).with_sink(&sink);
    for bags in 0..4 {
        assert_eq!(
            plain.compute_fee("ADT", &path, bags).unwrap(),
            traced.compute_fee("ADT", &path, bags).unwrap()
        );
    }
    assert_eq!(
        plain.resolution("ADT", 0).unwrap(),
        traced.resolution("ADT", 0).unwrap()
    );
    assert!(!sink.is_empty());
}

#[test]
fn malformed_input_is_an_error() {
    let store = MemoryStore::new();
    let itin = no_dot_table_itin();
    let past_the_end = vec![BaggageTravel::new(0, 5, 1)];
    assert!(matches!(
        BaggageEngine::new(&store, &store, itin.clone(), past_the_end, config()),
        Err(EngineError::UnknownSegment { .. })
    ));

    let mut bad_config = config();
    bad_config.engine.max_excess_pieces = 0;
    assert!(matches!(
        BaggageEngine::new(&store, &store, itin, vec![], bad_config),
        Err(EngineError::Config(_))
    ));

    let mut e = no_dot_engine(&store);
    assert!(matches!(
        e.determine_allowance("ADT", 7),
        Err(EngineError::UnknownGroup { index: 7 })
    ));
    let outside = FarePath::new(vec![fare("YOW", vec![0, 9])]);
    assert!(matches!(
        e.compute_fee("ADT", &outside, 1),
        Err(EngineError::InvalidFarePath(_))
    ));
    let overlap = FarePath::new(vec![fare("YOW", vec![0, 1]), fare("YRT", vec![1])]);
    assert!(matches!(
        e.compute_fee("ADT", &overlap, 1),
        Err(EngineError::InvalidFarePath(_))
    ));
}
