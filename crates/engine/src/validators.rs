//! Per-check predicates over one segment (and, for fare checks, one fare).
//!
//! A side table that could not be found fails the check.

use farebag_core::{
    BookingClassEntry, Cabin, CarrierFlightEntry, Fare, FareCategory, MktOperInd,
    ResultingFareClassEntry, TravelSeg,
};

pub fn cabin(seg: &TravelSeg, required: Cabin) -> bool {
    seg.effective_cabin() == required
}

/// T198. Uses the rebooked booking code when there is one.
pub fn booking_class(seg: &TravelSeg, entries: Option<&[BookingClassEntry]>) -> bool {
    let Some(entries) = entries else {
        return false;
    };
    let code = seg.effective_booking_code();
    entries.iter().any(|e| {
        if e.mkt_oper == MktOperInd::Operating && seg.is_codeshare() {
            return false;
        }
        if e.carrier != seg.marketing_carrier {
            return false;
        }
        e.booking_codes.iter().any(|c| c == code)
    })
}

/// T186.
pub fn carrier_flight(seg: &TravelSeg, entries: Option<&[CarrierFlightEntry]>) -> bool {
    let Some(entries) = entries else {
        return false;
    };
    if !seg.is_air() {
        return false;
    }
    entries.iter().any(|e| carrier_flight_entry(seg, e))
}

fn carrier_flight_entry(seg: &TravelSeg, e: &CarrierFlightEntry) -> bool {
    if e.marketing_carrier != seg.marketing_carrier {
        return false;
    }
    if let Some(op) = &e.operating_carrier {
        if op != seg.operating_carrier() {
            return false;
        }
    }
    if seg.is_open() || e.flight1 == -1 {
        return true;
    }
    let flight = i64::from(seg.flight_number);
    if e.flight2 == 0 {
        flight == i64::from(e.flight1)
    } else {
        i64::from(e.flight1) <= flight && flight <= i64::from(e.flight2)
    }
}

/// T171.
pub fn resulting_fare_class(fare: &Fare, entries: Option<&[ResultingFareClassEntry]>) -> bool {
    let Some(entries) = entries else {
        return false;
    };
    entries.iter().any(|e| {
        e.carrier == fare.carrier
            && fare_class_matches(&e.fare_class, &fare.fare_class)
            && (e.fare_type.is_empty() || e.fare_type == fare.fare_type)
    })
}

pub fn ticket_designator(fare: &Fare, designator: &str) -> bool {
    fare.ticket_designator.as_deref() == Some(designator.trim())
}

pub fn rule(fare: &Fare, rule: &str) -> bool {
    fare.rule == rule.trim()
}

pub fn rule_tariff(fare: &Fare, tariff: u16) -> bool {
    fare.rule_tariff == tariff
}

pub fn fare_ind(fare: &Fare, category: FareCategory) -> bool {
    fare.category == Some(category)
}

/// Fare class pattern match. `-` in the pattern matches any run of characters
/// (including none); everything else matches literally.
pub fn fare_class_matches(pattern: &str, fare_class: &str) -> bool {
    let p = pattern.as_bytes();
    let s = fare_class.as_bytes();
    let (mut pi, mut si) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while si < s.len() {
        if pi < p.len() && p[pi] == b'-' {
            star = Some((pi, si));
            pi += 1;
        } else if pi < p.len() && p[pi] == s[si] {
            pi += 1;
            si += 1;
        } else if let Some((sp, ss)) = star {
            pi = sp + 1;
            si = ss + 1;
            star = Some((sp, ss + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&b| b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use farebag_core::{Loc, Rebooking, SegmentKind};

    fn seg(mkt: &str, opr: Option<&str>, flight: u32) -> TravelSeg {
        TravelSeg {
            origin: Loc::new("DFW", "US", 1, "11"),
            destination: Loc::new("ORD", "US", 1, "11"),
            kind: SegmentKind::Air,
            marketing_carrier: mkt.into(),
            operating_carrier: opr.map(String::from),
            flight_number: flight,
            cabin: Cabin::Economy,
            booking_code: "Y".into(),
            departure: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            rebooked: None,
        }
    }

    fn fare(class: &str) -> Fare {
        Fare {
            vendor: "ATP".into(),
            carrier: "AA".into(),
            fare_class: class.into(),
            fare_type: "EIP".into(),
            rule: "2000".into(),
            rule_tariff: 3,
            ticket_designator: Some("CH".into()),
            category: Some(FareCategory::Discounted),
        }
    }

    fn cf(mkt: &str, opr: Option<&str>, f1: i32, f2: i32) -> CarrierFlightEntry {
        CarrierFlightEntry {
            marketing_carrier: mkt.into(),
            operating_carrier: opr.map(String::from),
            flight1: f1,
            flight2: f2,
        }
    }

    #[test]
    fn cabin_uses_rebooked_cabin() {
        let mut s = seg("AA", None, 1);
        assert!(cabin(&s, Cabin::Economy));
        s.rebooked = Some(Rebooking { booking_code: "J".into(), cabin: Cabin::Business });
        assert!(!cabin(&s, Cabin::Economy));
        assert!(cabin(&s, Cabin::Business));
    }

    #[test]
    fn booking_class_rules() {
        let entries = vec![BookingClassEntry {
            mkt_oper: MktOperInd::Marketing,
            carrier: "AA".into(),
            booking_codes: vec!["Y".into(), "B".into()],
        }];
        assert!(booking_class(&seg("AA", None, 1), Some(&entries)));
        assert!(!booking_class(&seg("BA", None, 1), Some(&entries)));
        assert!(!booking_class(&seg("AA", None, 1), None));

        let oper_only = vec![BookingClassEntry {
            mkt_oper: MktOperInd::Operating,
            carrier: "AA".into(),
            booking_codes: vec!["Y".into()],
        }];
        assert!(booking_class(&seg("AA", None, 1), Some(&oper_only)));
        assert!(!booking_class(&seg("AA", Some("BA"), 1), Some(&oper_only)));
    }

    #[test]
    fn booking_class_uses_rebooked_code() {
        let entries = vec![BookingClassEntry {
            mkt_oper: MktOperInd::Either,
            carrier: "AA".into(),
            booking_codes: vec!["Q".into()],
        }];
        let mut s = seg("AA", None, 1);
        assert!(!booking_class(&s, Some(&entries)));
        s.rebooked = Some(Rebooking { booking_code: "Q".into(), cabin: Cabin::Economy });
        assert!(booking_class(&s, Some(&entries)));
    }

    #[test]
    fn carrier_flight_ranges() {
        let s = seg("AA", None, 150);
        assert!(carrier_flight(&s, Some(&[cf("AA", None, -1, 0)])));
        assert!(carrier_flight(&s, Some(&[cf("AA", None, 150, 0)])));
        assert!(!carrier_flight(&s, Some(&[cf("AA", None, 151, 0)])));
        assert!(carrier_flight(&s, Some(&[cf("AA", None, 100, 150)])));
        assert!(!carrier_flight(&s, Some(&[cf("AA", None, 100, 149)])));
        assert!(!carrier_flight(&s, Some(&[cf("BA", None, -1, 0)])));
        assert!(!carrier_flight(&s, Some(&[])));
        assert!(!carrier_flight(&s, None));
    }

    #[test]
    fn carrier_flight_operating_carrier() {
        let s = seg("AA", Some("BA"), 7);
        assert!(carrier_flight(&s, Some(&[cf("AA", Some("BA"), -1, 0)])));
        assert!(!carrier_flight(&s, Some(&[cf("AA", Some("AA"), -1, 0)])));
    }

    #[test]
    fn open_segment_skips_flight_number() {
        let mut s = seg("AA", Some("BA"), 0);
        s.kind = SegmentKind::Open;
        // open segments report the marketing carrier as operator
        assert!(carrier_flight(&s, Some(&[cf("AA", Some("AA"), 500, 0)])));
    }

    #[test]
    fn surface_segment_never_matches_carrier_table() {
        let mut s = seg("AA", None, 1);
        s.kind = SegmentKind::Surface;
        assert!(!carrier_flight(&s, Some(&[cf("AA", None, -1, 0)])));
    }

    #[test]
    fn fare_class_patterns() {
        assert!(fare_class_matches("Y26", "Y26"));
        assert!(fare_class_matches("Y-", "Y26"));
        assert!(fare_class_matches("-OW", "QLOW"));
        assert!(fare_class_matches("Q-W", "QLOW"));
        assert!(fare_class_matches("-", "ANY"));
        assert!(!fare_class_matches("Y-", "QLOW"));
        assert!(!fare_class_matches("Y26", "Y2"));
        assert!(!fare_class_matches("-OW", "QLOX"));
    }

    #[test]
    fn resulting_fare_class_rules() {
        let entries = vec![ResultingFareClassEntry {
            carrier: "AA".into(),
            fare_class: "Y-".into(),
            fare_type: String::new(),
        }];
        assert!(resulting_fare_class(&fare("Y26"), Some(&entries)));
        assert!(!resulting_fare_class(&fare("QLOW"), Some(&entries)));
        assert!(!resulting_fare_class(&fare("Y26"), None));

        let typed = vec![ResultingFareClassEntry {
            carrier: "AA".into(),
            fare_class: "-".into(),
            fare_type: "XEX".into(),
        }];
        assert!(!resulting_fare_class(&fare("Y26"), Some(&typed)));
    }

    #[test]
    fn fare_scalar_checks() {
        let f = fare("Y26");
        assert!(ticket_designator(&f, "CH"));
        assert!(!ticket_designator(&f, "ID90"));
        assert!(rule(&f, "2000"));
        assert!(!rule(&f, "2001"));
        assert!(rule_tariff(&f, 3));
        assert!(!rule_tariff(&f, 4));
        assert!(fare_ind(&f, FareCategory::Discounted));
        assert!(!fare_ind(&f, FareCategory::Negotiated));
    }
}
