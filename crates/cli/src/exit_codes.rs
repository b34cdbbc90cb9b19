//! CLI Exit Code Registry
//!
//! Single source of truth for `fbag` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage error (bad args, unreadable file)          |
//! | 3    | Scenario file malformed                          |
//! | 4    | Engine config invalid                            |
//! | 5    | Engine rejected the input                        |
//! | 6    | A fare path has no valid fee (`--strict` only)   |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable input file.
pub const EXIT_USAGE: u8 = 2;

/// Scenario JSON failed to parse or is inconsistent (bad group ranges, no segments).
pub const EXIT_SCENARIO: u8 = 3;

/// Engine config failed to parse or validate.
pub const EXIT_CONFIG: u8 = 4;

/// Engine returned an error (malformed store data, fare path outside the itinerary).
pub const EXIT_ENGINE: u8 = 5;

/// At least one fare path came out `invalid` and `--strict` was given.
pub const EXIT_FEE_INVALID: u8 = 6;
