//! Discord incoming-webhook adapter (single embed).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use super::{kind_emoji, signed_dollars, signed_percent};
use crate::domain::entities::signal::SignalKind;
use crate::domain::services::forwarding_router::ForwardedSignal;

const COLOR_ENTRY: u32 = 0x00ff00;
const COLOR_TAKE_PROFIT: u32 = 0x0099ff;
const COLOR_STOP_LOSS: u32 = 0xff0000;

fn field(name: &str, value: String) -> serde_json::Value {
    json!({ "name": name, "value": value, "inline": true })
}

pub fn build_embed(forwarded: &ForwardedSignal, at: DateTime<Utc>) -> serde_json::Value {
    let signal = &forwarded.signal;
    let action = signal.action().to_ascii_uppercase();
    let color = match signal.kind {
        SignalKind::Entry | SignalKind::LimitEntry => COLOR_ENTRY,
        SignalKind::TakeProfit => COLOR_TAKE_PROFIT,
        SignalKind::StopLoss | SignalKind::CancelOrder => COLOR_STOP_LOSS,
    };

    let mut fields = vec![
        field("Action", action.clone()),
        field("Ticker", signal.ticker.clone()),
        field("Price", format!("${}", signal.price)),
    ];
    if let Some(strategy) = &signal.strategy {
        fields.push(field("Strategy", strategy.clone()));
    }
    if let Some(direction) = signal.direction {
        fields.push(field("Direction", direction.as_str().to_ascii_uppercase()));
    }

    if signal.kind == SignalKind::Entry {
        if let Some(tp) = signal.take_profit {
            fields.push(field("Take Profit", format!("${}", tp)));
        }
        if let Some(sl) = signal.stop_loss {
            fields.push(field("Stop Loss", format!("${}", sl)));
        }
    }

    if signal.kind.is_exit() {
        if let Some(entry) = forwarded.entry_price {
            fields.push(field("Entry Price", format!("${}", entry)));
            if let Some(pnl) = forwarded.pnl {
                let dot = if pnl >= 0.0 { "🟢" } else { "🔴" };
                fields.push(field("P&L", format!("{} {}", dot, signed_dollars(pnl))));
            }
            if let Some(pct) = forwarded.pnl_percent {
                fields.push(field("P&L %", signed_percent(pct)));
            }
        }
    }

    json!({
        "title": format!("{} {} Signal", kind_emoji(signal.kind), action),
        "description": format!("New trading signal received for {}", signal.ticker),
        "color": color,
        "fields": fields,
        "timestamp": at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "footer": { "text": "TradingView Webhook" },
    })
}

pub fn build_body(forwarded: &ForwardedSignal, at: DateTime<Utc>) -> serde_json::Value {
    json!({ "embeds": [build_embed(forwarded, at)] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::Signal;
    use crate::domain::entities::trade::Direction;

    fn forwarded(kind: SignalKind) -> ForwardedSignal {
        ForwardedSignal {
            signal: Signal {
                kind,
                ticker: "MNQ1!".to_string(),
                price: 21550.0,
                direction: Some(Direction::Long),
                stop_loss: Some(21400.0),
                take_profit: Some(21600.0),
                quantity: Some(2.0),
                pnl: None,
                strategy: Some("S1".to_string()),
            },
            trade_id: Some(3),
            entry_price: Some(21500.0),
            pnl: Some(100.0),
            pnl_percent: Some(0.2326),
        }
    }

    fn names(embed: &serde_json::Value) -> Vec<String> {
        embed["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_entry_embed() {
        let embed = build_embed(&forwarded(SignalKind::Entry), Utc::now());
        assert_eq!(embed["title"], "🟢 ENTRY Signal");
        assert_eq!(embed["color"], 0x00ff00);
        assert_eq!(
            names(&embed),
            vec!["Action", "Ticker", "Price", "Strategy", "Direction", "Take Profit", "Stop Loss"]
        );
        assert_eq!(embed["footer"]["text"], "TradingView Webhook");
    }

    #[test]
    fn test_take_profit_embed() {
        let body = build_body(&forwarded(SignalKind::TakeProfit), Utc::now());
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "🎯 TAKE_PROFIT Signal");
        assert_eq!(embed["color"], 0x0099ff);
        assert_eq!(embed["fields"][0]["value"], "TAKE_PROFIT");
        assert_eq!(embed["fields"][2]["value"], "$21550");
        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields[fields.len() - 2]["value"], "🟢 +$100.00");
        assert_eq!(fields[fields.len() - 1]["value"], "+0.23%");
    }
}
