//! Application services: freshness, aggregation, and the engagement orchestrator.

pub mod engagement;
pub mod error;
pub mod freshness;
pub mod inflight;
pub mod pipeline;
pub mod repos;
