// Engagement analytics — picks representative posts from a user's history.
//
// Pure functions only: no I/O, no clock reads, no logging. The caller passes
// `now` so the same input always yields the same result.

pub mod analyzer;
pub mod ranking;

pub use analyzer::{AnalyzerSettings, EngagementAnalyzer};
