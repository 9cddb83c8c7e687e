pub mod activity_log;
pub mod forwarding_router;
pub mod payload_normalizer;
pub mod session_calendar;
pub mod text_alert;
pub mod trade_lifecycle;
pub mod trade_stats;
