use std::fmt;

use farebag_config::ConfigError;

#[derive(Debug)]
pub enum EngineError {
    /// Record store data could not be loaded or is malformed.
    Store(String),
    /// Baggage travel index outside the itinerary's groups.
    UnknownGroup { index: usize },
    /// Segment index outside the itinerary.
    UnknownSegment { index: usize },
    /// Matched fee id not present in the arena.
    UnknownRecord { id: usize },
    /// Fare path references a segment outside the itinerary or covers one twice.
    InvalidFarePath(String),
    Config(ConfigError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(msg) => write!(f, "record store error: {msg}"),
            Self::UnknownGroup { index } => write!(f, "unknown baggage travel {index}"),
            Self::UnknownSegment { index } => write!(f, "unknown segment {index}"),
            Self::UnknownRecord { id } => write!(f, "unknown matched fee #{id}"),
            Self::InvalidFarePath(msg) => write!(f, "invalid fare path: {msg}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
