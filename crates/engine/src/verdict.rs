//! Three-valued check outcome.
//!
//! `Indeterminate` means "a fare this check needs is not assigned yet". It is never
//! a failure: it propagates through aggregation until the fare is known.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Indeterminate,
}

impl Verdict {
    pub fn from_bool(pass: bool) -> Self {
        if pass {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    pub fn is_fail(self) -> bool {
        self == Self::Fail
    }

    pub fn is_indeterminate(self) -> bool {
        self == Self::Indeterminate
    }

    /// Conjunction: any `Fail` wins, then any `Indeterminate`.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fail, _) | (_, Self::Fail) => Self::Fail,
            (Self::Indeterminate, _) | (_, Self::Indeterminate) => Self::Indeterminate,
            _ => Self::Pass,
        }
    }

    /// Disjunction: any `Pass` wins, then any `Indeterminate`.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Pass, _) | (_, Self::Pass) => Self::Pass,
            (Self::Indeterminate, _) | (_, Self::Indeterminate) => Self::Indeterminate,
            _ => Self::Fail,
        }
    }

    /// ALL aggregation. Stops pulling from `verdicts` at the first `Fail`.
    /// Empty input passes.
    pub fn all<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Self {
        let mut acc = Self::Pass;
        for v in verdicts {
            if v == Self::Fail {
                return Self::Fail;
            }
            acc = acc.and(v);
        }
        acc
    }

    /// ANY aggregation. Stops pulling from `verdicts` at the first `Pass`.
    /// Empty input fails.
    pub fn any<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Self {
        let mut acc = Self::Fail;
        for v in verdicts {
            if v == Self::Pass {
                return Self::Pass;
            }
            acc = acc.or(v);
        }
        acc
    }

    /// Hard-mode view: an unresolved check is a failed check.
    pub fn definite(self) -> Self {
        match self {
            Self::Indeterminate => Self::Fail,
            v => v,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Indeterminate => write!(f, "indeterminate"),
        }
    }
}
