pub mod activity;
pub mod forwarding_config;
pub mod signal;
pub mod trade;
