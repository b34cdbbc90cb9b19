//! `farebag-cli` library half: scenario loading and report building, shared by the
//! `fbag` binary and its tests.

pub mod report;
pub mod scenario;
