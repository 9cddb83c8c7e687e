//! Telegram Bot API `sendMessage` adapter.

use chrono::{DateTime, Utc};
use serde_json::json;
use zeroize::Zeroizing;

use super::{exchange_time, kind_emoji, signed_dollars, signed_percent};
use crate::domain::entities::signal::SignalKind;
use crate::domain::entities::trade::Direction;
use crate::domain::services::forwarding_router::ForwardedSignal;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: Zeroizing<String>,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramConfig {
    /// Endpoint URL. Embeds the bot token, never log it.
    pub fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token.as_str()
        )
    }
}

fn signal_type(forwarded: &ForwardedSignal) -> &'static str {
    match (forwarded.signal.kind, forwarded.signal.direction) {
        (SignalKind::Entry, Some(Direction::Long)) => "BUY",
        (SignalKind::Entry, Some(Direction::Short)) => "SELL",
        (SignalKind::TakeProfit, _) => "TAKE PROFIT",
        (SignalKind::StopLoss, _) => "STOP LOSS",
        _ => "ENTRY",
    }
}

pub fn format_message(forwarded: &ForwardedSignal, at: DateTime<Utc>) -> String {
    let signal = &forwarded.signal;
    let mut message = format!(
        "{} *{}* Signal\n\n*Ticker:* {}\n",
        kind_emoji(signal.kind),
        signal_type(forwarded),
        signal.ticker
    );

    if let Some(strategy) = &signal.strategy {
        message.push_str(&format!("*Strategy:* {}\n", strategy));
    }
    message.push_str(&format!("*Price:* ${}\n", signal.price));
    if let Some(direction) = signal.direction {
        message.push_str(&format!(
            "*Direction:* {}\n",
            direction.as_str().to_ascii_uppercase()
        ));
    }
    if let Some(quantity) = signal.quantity.filter(|q| *q > 0.0) {
        let plural = if quantity > 1.0 { "s" } else { "" };
        message.push_str(&format!("*Position Size:* {} contract{}\n", quantity, plural));
    }

    if signal.kind == SignalKind::Entry {
        if let Some(tp) = signal.take_profit {
            message.push_str(&format!("*Take Profit:* ${}\n", tp));
        }
        if let Some(sl) = signal.stop_loss {
            message.push_str(&format!("*Stop Loss:* ${}\n", sl));
        }
    }

    if signal.kind.is_exit() {
        if let Some(entry) = forwarded.entry_price {
            message.push_str(&format!("*Entry Price:* ${}\n", entry));
        }
        if let Some(pnl) = forwarded.pnl {
            let emoji = if pnl >= 0.0 { "💰" } else { "📉" };
            message.push_str(&format!("{} *P&L:* {}", emoji, signed_dollars(pnl)));
            if let Some(pct) = forwarded.pnl_percent {
                message.push_str(&format!(" ({})", signed_percent(pct)));
            }
            message.push('\n');
        }
    }

    message.push_str(&format!("\n_Time:_ {}", exchange_time(at)));
    message
}

pub fn build_request(
    config: &TelegramConfig,
    forwarded: &ForwardedSignal,
    at: DateTime<Utc>,
) -> (String, serde_json::Value) {
    let body = json!({
        "chat_id": config.chat_id,
        "text": format_message(forwarded, at),
        "parse_mode": "Markdown",
    });
    (config.send_message_url(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::Signal;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
    }

    fn entry() -> ForwardedSignal {
        ForwardedSignal {
            signal: Signal {
                kind: SignalKind::Entry,
                ticker: "CL1!".to_string(),
                price: 68.5,
                direction: Some(Direction::Long),
                stop_loss: Some(68.0),
                take_profit: Some(69.5),
                quantity: Some(2.0),
                pnl: None,
                strategy: Some("CL-5M".to_string()),
            },
            trade_id: Some(1),
            entry_price: Some(68.5),
            pnl: None,
            pnl_percent: None,
        }
    }

    #[test]
    fn test_entry_message() {
        let text = format_message(&entry(), at());
        assert!(text.starts_with("🟢 *BUY* Signal\n\n*Ticker:* CL1!\n*Strategy:* CL-5M\n"));
        assert!(text.contains("*Price:* $68.5\n"));
        assert!(text.contains("*Direction:* LONG\n"));
        assert!(text.contains("*Position Size:* 2 contracts\n"));
        assert!(text.contains("*Take Profit:* $69.5\n*Stop Loss:* $68\n"));
        assert!(!text.contains("P&L"));
        assert!(text.ends_with("\n_Time:_ Mar 2, 2026 10:00:00 AM ET"));
    }

    #[test]
    fn test_exit_message() {
        let mut forwarded = entry();
        forwarded.signal.kind = SignalKind::StopLoss;
        forwarded.signal.price = 68.0;
        forwarded.signal.quantity = Some(1.0);
        forwarded.pnl = Some(-1.0);
        forwarded.pnl_percent = Some(-0.7299);

        let text = format_message(&forwarded, at());
        assert!(text.starts_with("🛑 *STOP LOSS* Signal"));
        assert!(text.contains("*Position Size:* 1 contract\n"));
        assert!(text.contains("*Entry Price:* $68.5\n"));
        assert!(text.contains("📉 *P&L:* -$1.00 (-0.73%)\n"));
        assert!(!text.contains("*Take Profit:*"));
    }

    #[test]
    fn test_request_shape() {
        let config = TelegramConfig {
            api_base: "https://api.telegram.org/".to_string(),
            bot_token: Zeroizing::new("123:abc".to_string()),
            chat_id: "-100".to_string(),
        };
        let (url, body) = build_request(&config, &entry(), at());
        assert_eq!(url, "https://api.telegram.org/bot123:abc/sendMessage");
        assert_eq!(body["chat_id"], "-100");
        assert_eq!(body["parse_mode"], "Markdown");
        assert!(!format!("{:?}", config).contains("abc"));
    }
}
