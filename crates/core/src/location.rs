use serde::{Deserialize, Serialize};

/// An airport or city with the geography the baggage rules care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub code: String,
    /// ISO nation code ("US", "CA", "DE").
    pub nation: String,
    /// IATA traffic conference area (1, 2 or 3).
    pub area: u8,
    /// IATA sub-area code, blank when unknown.
    #[serde(default)]
    pub subarea: String,
}

impl Loc {
    pub fn new(code: &str, nation: &str, area: u8, subarea: &str) -> Self {
        Self {
            code: code.into(),
            nation: nation.into(),
            area,
            subarea: subarea.into(),
        }
    }

    /// US territory for baggage purposes (includes Puerto Rico and the US Virgin Islands).
    pub fn is_us_territory(&self) -> bool {
        matches!(self.nation.as_str(), "US" | "PR" | "VI")
    }

    pub fn is_canada(&self) -> bool {
        self.nation == "CA"
    }
}
