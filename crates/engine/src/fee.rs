//! Fee and lower-bound calculation over cached matches.
//!
//! Both calculators work per baggage travel on the candidates the soft path cached,
//! asking a revalidation callback for each candidate's verdict under the fares at
//! hand. They differ in how they treat a candidate that is still indeterminate:
//! the exact fee gives up (the path is unusable), the lower bound assumes whatever
//! outcome is cheapest.

use std::fmt;

use serde::Serialize;

use crate::cache::MatchedFee;
use crate::verdict::Verdict;

/// A charge in calculation-currency minor units, or the sentinel telling the caller
/// to reject the fare path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeAmount {
    Valid(i64),
    Invalid,
}

impl FeeAmount {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn amount(&self) -> Option<i64> {
        match self {
            Self::Valid(a) => Some(*a),
            Self::Invalid => None,
        }
    }

    /// Sum of two amounts; invalid if either is, or if the sum overflows.
    pub fn plus(self, other: Self) -> Self {
        match (self, other) {
            (Self::Valid(a), Self::Valid(b)) => a.checked_add(b).into(),
            _ => Self::Invalid,
        }
    }
}

impl From<Option<i64>> for FeeAmount {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Self::Invalid, Self::Valid)
    }
}

impl fmt::Display for FeeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(a) => write!(f, "{a}"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Cached candidates of one baggage travel, as the calculators see them.
#[derive(Debug, Default)]
pub struct GroupFees<'c> {
    /// Allowance candidates per key of the resolution's chain, in order.
    pub allowance_chain: Vec<Vec<&'c MatchedFee>>,
    /// Charge candidates in sequence order.
    pub charges: Vec<&'c MatchedFee>,
    pub process_charges: bool,
    pub max_excess_pieces: u8,
}

/// Result of picking the allowance winner.
#[derive(Debug, Clone, Copy)]
enum Pick<'c> {
    Winner(&'c MatchedFee),
    NoWinner,
    Unresolved,
}

impl<'c> GroupFees<'c> {
    /// First candidate that revalidates to a pass. A deferring winner hands over to
    /// the next key of the chain; with no next key there is no allowance.
    fn allowance(&self, reval: &mut dyn FnMut(&MatchedFee) -> Verdict) -> Pick<'c> {
        'keys: for candidates in &self.allowance_chain {
            for &c in candidates {
                match reval(c) {
                    Verdict::Fail => continue,
                    Verdict::Indeterminate => return Pick::Unresolved,
                    Verdict::Pass if c.defer => continue 'keys,
                    Verdict::Pass => return Pick::Winner(c),
                }
            }
            return Pick::NoWinner;
        }
        Pick::NoWinner
    }

    /// Exact fee for `checked_bags` under fully known fares.
    pub fn exact(
        &self,
        checked_bags: u8,
        reval: &mut dyn FnMut(&MatchedFee) -> Verdict,
    ) -> FeeAmount {
        let free = match self.allowance(reval) {
            Pick::Winner(w) => w.free_pieces(),
            Pick::NoWinner => 0,
            Pick::Unresolved => return FeeAmount::Invalid,
        };
        let excess = checked_bags.saturating_sub(free);
        if excess == 0 {
            return FeeAmount::Valid(0);
        }
        if !self.process_charges || excess > self.max_excess_pieces {
            return FeeAmount::Invalid;
        }

        let mut total: i64 = 0;
        for ordinal in 1..=excess {
            let mut winner = None;
            for &c in self.charges.iter().filter(|c| c.covers_ordinal(ordinal)) {
                match reval(c) {
                    Verdict::Pass => {
                        winner = Some(c);
                        break;
                    }
                    Verdict::Fail => continue,
                    Verdict::Indeterminate => return FeeAmount::Invalid,
                }
            }
            total = match winner {
                Some(w) if w.available => match total.checked_add(w.amount) {
                    Some(t) => t,
                    None => return FeeAmount::Invalid,
                },
                _ => return FeeAmount::Invalid,
            };
        }
        FeeAmount::Valid(total)
    }

    /// Least fee consistent with the fares known so far.
    pub fn lower_bound(
        &self,
        checked_bags: u8,
        reval: &mut dyn FnMut(&MatchedFee) -> Verdict,
    ) -> FeeAmount {
        let free = self.max_possible_free(reval);
        let excess = checked_bags.saturating_sub(free);
        if excess == 0 {
            return FeeAmount::Valid(0);
        }
        if !self.process_charges || excess > self.max_excess_pieces {
            return FeeAmount::Invalid;
        }

        let mut total: i64 = 0;
        for ordinal in 1..=excess {
            let mut cheapest: Option<i64> = None;
            for &c in self.charges.iter().filter(|c| c.covers_ordinal(ordinal)) {
                let v = reval(c);
                if v.is_fail() {
                    continue;
                }
                if c.available {
                    cheapest = Some(cheapest.map_or(c.amount, |m| m.min(c.amount)));
                }
                if v.is_pass() {
                    break;
                }
            }
            match cheapest.and_then(|a| total.checked_add(a)) {
                Some(t) => total = t,
                None => return FeeAmount::Invalid,
            }
        }
        FeeAmount::Valid(total)
    }

    /// Most free pieces any still-possible allowance winner grants.
    fn max_possible_free(&self, reval: &mut dyn FnMut(&MatchedFee) -> Verdict) -> u8 {
        let mut best = 0;
        for candidates in &self.allowance_chain {
            // Whether the winner under this key could be a deferring record
            let mut may_defer = false;
            for &c in candidates {
                let v = reval(c);
                if v.is_fail() {
                    continue;
                }
                if c.defer {
                    may_defer = true;
                } else {
                    best = best.max(c.free_pieces());
                }
                if v.is_pass() {
                    break;
                }
            }
            if !may_defer {
                break;
            }
        }
        best
    }
}
