// Tallybot: engagement stats on demand for Bluesky
//
// This is the library root. Each module corresponds to a major subsystem
// of the mention-to-reply pipeline.

pub mod analytics;
pub mod bluesky;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod web;
