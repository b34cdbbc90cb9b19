pub mod analysis;
pub mod bta;
pub mod cache;
pub mod check;
pub mod diag;
pub mod engine;
pub mod error;
pub mod fee;
pub mod matcher;
pub mod resolver;
pub mod revalidate;
pub mod store;
pub mod validator;
pub mod validators;
pub mod verdict;

pub use bta::RuleKind;
pub use cache::{CarrierKey, MatchedFee, MatchedFeeId};
pub use check::{Check, CheckSet};
pub use diag::{DiagSink, LogSink, RecordOutcome, RecordingSink, TraceEvent};
pub use engine::BaggageEngine;
pub use error::EngineError;
pub use fee::FeeAmount;
pub use resolver::{Policy, Resolution};
pub use revalidate::Revalidation;
pub use store::{CarrierTables, CurrencyConverter, MemoryStore, RecordStore, SameCurrency};
pub use verdict::Verdict;
