use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper limit on excess-bag ordinals a charge search will consider.
pub const MAX_EXCESS_PIECES_LIMIT: u8 = 8;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub overrides: Overrides,
}

// ---------------------------------------------------------------------------
// [engine]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Date used for record cancellation checks. Defaults to today.
    pub ticketing_date: Option<NaiveDate>,
    /// When false the soft-pass path evaluates fare checks like the hard path,
    /// treating missing fares as failures.
    pub allow_soft_match: bool,
    /// IATA resolution 302: non-DOT defer retries use the operating carrier.
    pub iata_reso_302_mandate: bool,
    pub max_excess_pieces: u8,
    /// S5 vendor precedence.
    pub vendors: Vec<String>,
    pub calculation_currency: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ticketing_date: None,
            allow_soft_match: true,
            iata_reso_302_mandate: true,
            max_excess_pieces: 4,
            vendors: vec!["ATP".into(), "MMGR".into()],
            calculation_currency: "USD".into(),
        }
    }
}

impl EngineSettings {
    pub fn ticketing_date_or_today(&self) -> NaiveDate {
        self.ticketing_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

// ---------------------------------------------------------------------------
// [overrides]
// ---------------------------------------------------------------------------

/// Request-level carrier overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    /// Bypasses governing-carrier resolution for allowance.
    pub allowance_carrier: Option<String>,
    /// Selects the charges carrier regardless of the allowance outcome.
    pub charges_carrier: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// `<config dir>/farebag/engine.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("farebag")
            .join("engine.toml")
    }

    /// Load from `default_path()`, or defaults when no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.engine;

        if e.max_excess_pieces == 0 || e.max_excess_pieces > MAX_EXCESS_PIECES_LIMIT {
            return Err(ConfigError::Validation(format!(
                "max_excess_pieces must be 1..={MAX_EXCESS_PIECES_LIMIT}, got {}",
                e.max_excess_pieces
            )));
        }

        if e.vendors.is_empty() {
            return Err(ConfigError::Validation("vendors must not be empty".into()));
        }
        for (i, v) in e.vendors.iter().enumerate() {
            if v.trim().is_empty() {
                return Err(ConfigError::Validation("vendor codes must not be blank".into()));
            }
            if e.vendors[..i].contains(v) {
                return Err(ConfigError::Validation(format!("duplicate vendor '{v}'")));
            }
        }

        if e.calculation_currency.len() != 3
            || !e.calculation_currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(ConfigError::Validation(format!(
                "calculation_currency must be 3 uppercase letters, got '{}'",
                e.calculation_currency
            )));
        }

        for (field, value) in [
            ("allowance_carrier", &self.overrides.allowance_carrier),
            ("charges_carrier", &self.overrides.charges_carrier),
        ] {
            if let Some(cxr) = value {
                if !is_carrier_code(cxr) {
                    return Err(ConfigError::Validation(format!(
                        "overrides.{field}: '{cxr}' is not a carrier code"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_carrier_code(s: &str) -> bool {
    (2..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.max_excess_pieces, 4);
        assert_eq!(config.engine.vendors, vec!["ATP", "MMGR"]);
        assert!(config.engine.allow_soft_match);
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
[engine]
ticketing_date = "2026-03-01"
allow_soft_match = false
iata_reso_302_mandate = false
max_excess_pieces = 2
vendors = ["MMGR"]
calculation_currency = "EUR"

[overrides]
allowance_carrier = "LH"
"#;
        let config = EngineConfig::from_toml(input).unwrap();
        assert_eq!(
            config.engine.ticketing_date,
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(
            config.engine.ticketing_date_or_today(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(!config.engine.allow_soft_match);
        assert_eq!(config.engine.max_excess_pieces, 2);
        assert_eq!(config.overrides.allowance_carrier.as_deref(), Some("LH"));
        assert!(config.overrides.charges_carrier.is_none());
    }

    #[test]
    fn reject_max_excess_pieces_out_of_range() {
        for n in [0, 9] {
            let input = format!("[engine]\nmax_excess_pieces = {n}\n");
            let err = EngineConfig::from_toml(&input).unwrap_err();
            assert!(err.to_string().contains("max_excess_pieces"), "{err}");
        }
    }

    #[test]
    fn reject_duplicate_vendor() {
        let err = EngineConfig::from_toml("[engine]\nvendors = [\"ATP\", \"ATP\"]\n").unwrap_err();
        assert!(err.to_string().contains("duplicate vendor"));
    }

    #[test]
    fn reject_empty_vendors() {
        let err = EngineConfig::from_toml("[engine]\nvendors = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn reject_bad_currency() {
        let err =
            EngineConfig::from_toml("[engine]\ncalculation_currency = \"usd\"\n").unwrap_err();
        assert!(err.to_string().contains("calculation_currency"));
    }

    #[test]
    fn reject_bad_override_carrier() {
        let err = EngineConfig::from_toml("[overrides]\ncharges_carrier = \"A-A\"\n").unwrap_err();
        assert!(err.to_string().contains("overrides.charges_carrier"));
    }

    #[test]
    fn parse_error_is_reported() {
        let err = EngineConfig::from_toml("[engine\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[engine]\nmax_excess_pieces = 3\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.engine.max_excess_pieces, 3);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(EngineConfig::load(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn default_path_is_under_farebag() {
        let path = EngineConfig::default_path();
        assert!(path.ends_with("farebag/engine.toml"));
    }
}
