//! Signal relay library
//!
//! Receives trading alerts over HTTP, keeps the trade book in SQLite and
//! fans each accepted signal out to notification and broker-relay
//! destinations.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod secrets;
