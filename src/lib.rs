//! Rivulet: a command-line RSS aggregator.
//!
//! Users register feed sources and follow them; `rivulet agg <interval>`
//! polls registered feeds one at a time in least-recently-fetched order,
//! parses each document, and stores new posts dedup-safely in SQLite.

pub mod agg;
pub mod commands;
pub mod config;
pub mod feed;
pub mod session;
pub mod storage;
pub mod util;
