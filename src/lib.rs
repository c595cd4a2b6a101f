#![warn(missing_docs)]
//! Watchpost polls remote targets for a condition of interest and notifies
//! when it appears, when a target goes down and when it recovers, with
//! cooldowns, rate limits and fingerprint deduplication in front of every
//! notification.

pub mod activity;
pub mod cmd;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod matcher;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod resolver;
pub mod supervisor;
pub mod test_helpers;
