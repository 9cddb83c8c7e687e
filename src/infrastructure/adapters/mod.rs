//! Destination adapters
//!
//! Each adapter turns a `ForwardedSignal` into the JSON document its third
//! party expects. Shapes are fixed integration contracts; transport is the
//! `DestinationSink`'s job.

pub mod broker_relay;
pub mod discord;
pub mod external_dashboard;
pub mod telegram;

use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;

use crate::domain::entities::signal::SignalKind;

/// `+$12.50` / `-$3.00`
pub(crate) fn signed_dollars(value: f64) -> String {
    if value >= 0.0 {
        format!("+${:.2}", value)
    } else {
        format!("-${:.2}", value.abs())
    }
}

/// `+0.23%` / `-1.50%`
pub(crate) fn signed_percent(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.2}%", value)
    } else {
        format!("{:.2}%", value)
    }
}

pub(crate) fn kind_emoji(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::Entry | SignalKind::LimitEntry => "🟢",
        SignalKind::TakeProfit => "🎯",
        SignalKind::StopLoss | SignalKind::CancelOrder => "🛑",
    }
}

/// Wall-clock time on the exchange's calendar.
pub(crate) fn exchange_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&New_York)
        .format("%b %-d, %Y %-I:%M:%S %p ET")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signed_formatting() {
        assert_eq!(signed_dollars(100.0), "+$100.00");
        assert_eq!(signed_dollars(-12.345), "-$12.35");
        assert_eq!(signed_percent(0.2326), "+0.23%");
        assert_eq!(signed_percent(-1.5), "-1.50%");
    }

    #[test]
    fn test_exchange_time_uses_new_york() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 23, 5, 9).unwrap();
        assert_eq!(exchange_time(at), "Jan 15, 2026 6:05:09 PM ET");
    }
}
