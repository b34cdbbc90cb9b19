//! Itinerary analysis helpers: trip type, most significant segment, MSS-journey.
//!
//! Callers that already know these (a pricing front end usually does) can skip
//! this module and build [`BaggageTravel`]s directly.

use std::ops::Range;

use farebag_core::{BaggageTravel, Itinerary, Loc, TravelSeg, TripType};

use crate::error::EngineError;

/// Classify the journey. `furthest` is the index of the segment whose destination
/// is the furthest checked point; `None` skips that point.
pub fn classify_trip_type(segments: &[TravelSeg], furthest: Option<usize>) -> TripType {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return TripType::Other;
    };
    let all_points = || segments.iter().flat_map(|s| [&s.origin, &s.destination]);
    if all_points().all(Loc::is_us_territory) {
        return TripType::WhollyWithinUs;
    }
    if all_points().all(Loc::is_canada) {
        return TripType::WhollyWithinCa;
    }

    let mut points = vec![&first.origin, &last.destination];
    if let Some(seg) = furthest.and_then(|i| segments.get(i)) {
        points.push(&seg.destination);
    }
    let us = points.iter().any(|l| l.is_us_territory());
    let ca = points.iter().any(|l| l.is_canada());
    match (us, ca) {
        (true, true) => TripType::BetweenUsCa,
        (true, false) => TripType::ToFromUs,
        (false, true) => TripType::ToFromCa,
        (false, false) => TripType::Other,
    }
}

/// Most significant segment of `range`: the first area change, else the first
/// sub-area change, else the first nation change, else the first segment.
///
/// An Area 3 → Area 2 crossing keeps looking: a later Area 2 → Area 1 crossing
/// takes over, any other area change ends the search.
pub fn determine_mss(itin: &Itinerary, range: Range<usize>) -> usize {
    let mut mss = range.start;
    let mut area_changed = false;
    let mut subarea_changed = false;
    let mut nation_changed = false;

    for i in range {
        let Some(seg) = itin.segment(i).filter(|s| s.is_air()) else {
            continue;
        };
        let (o, d) = (&seg.origin, &seg.destination);
        if o.area != d.area {
            if area_changed {
                if o.area == 2 && d.area == 1 {
                    mss = i;
                }
                break;
            }
            mss = i;
            if o.area != 3 || d.area != 2 {
                break;
            }
            area_changed = true;
        } else if !area_changed && !subarea_changed && o.subarea != d.subarea {
            subarea_changed = true;
            mss = i;
        } else if !area_changed && !subarea_changed && !nation_changed && o.nation != d.nation {
            nation_changed = true;
            mss = i;
        }
    }
    mss
}

/// Build baggage travels for `groups` (segment index ranges), with MSS and
/// MSS-journey filled in.
pub fn assign_mss(
    itin: &Itinerary,
    groups: &[Range<usize>],
) -> Result<Vec<BaggageTravel>, EngineError> {
    let n = itin.segments.len();
    for g in groups {
        if g.start >= g.end || g.end > n {
            return Err(EngineError::UnknownSegment { index: g.end.max(g.start) });
        }
    }

    let mut travels: Vec<BaggageTravel> = groups
        .iter()
        .map(|g| BaggageTravel::new(g.start, g.end, determine_mss(itin, g.clone())))
        .collect();

    if !itin.trip_type.is_us_dot() {
        return Ok(travels);
    }
    let wholly_within = itin.trip_type.is_wholly_within_us_or_ca();
    match travels.as_mut_slice() {
        [outbound, inbound] => {
            let journey = if wholly_within {
                outbound.start
            } else {
                determine_mss(itin, outbound.start..inbound.end)
            };
            outbound.mss_journey = journey;
            inbound.mss_journey = journey;
        }
        [outbound, ..] if wholly_within => outbound.mss_journey = outbound.start,
        _ => {}
    }
    log::debug!("baggage travels: {travels:?}");
    Ok(travels)
}
