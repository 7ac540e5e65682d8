//! Engagement reach service: resolves a status URL to the reach of its
//! retweets, caching each result and collapsing concurrent recomputations.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
