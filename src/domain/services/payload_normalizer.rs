//! Payload Normalizer
//!
//! Single parsing boundary between raw webhook bodies and the canonical
//! `Signal`. A body is first classified into an `InboundPayload`:
//!
//! - not JSON at all, a JSON string, or a JSON object with a string
//!   `content` field: a free-text alert line, extracted immediately;
//! - any other JSON object: structured fields, validated later.
//!
//! The caller checks the shared secret between classification and
//! validation, so an unauthenticated caller never learns which field was
//! missing.

use serde::Deserialize;

use super::text_alert::parse_alert_line;
use crate::domain::entities::signal::{Signal, SignalKind};
use crate::domain::entities::trade::Direction;
use crate::domain::errors::{ParseError, ValidationError};

/// Number that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberField {
    Number(f64),
    Text(String),
}

impl NumberField {
    fn value(&self) -> Option<f64> {
        match self {
            NumberField::Number(n) => Some(*n),
            NumberField::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|n| n.is_finite())
    }
}

/// Structured webhook body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSignal {
    pub secret: Option<String>,
    pub action: Option<String>,
    pub ticker: Option<String>,
    pub price: Option<NumberField>,
    pub direction: Option<String>,
    pub take_profit: Option<NumberField>,
    pub stop_loss: Option<NumberField>,
    pub quantity: Option<NumberField>,
    pub pnl: Option<NumberField>,
    pub strategy: Option<String>,
    pub order_type: Option<String>,
}

/// Free-text alert, already extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSignal {
    pub content: String,
    pub secret: Option<String>,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    Json(JsonSignal),
    Text(TextSignal),
}

impl InboundPayload {
    /// Classify a raw body. Only free-text extraction can fail here.
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        if body.trim().is_empty() {
            return Err(ParseError::EmptyBody);
        }

        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return Self::text(body, None),
        };

        if let Some(serde_json::Value::String(content)) = value.get("content") {
            let secret = value
                .get("secret")
                .and_then(|s| s.as_str())
                .map(str::to_string);
            return Self::text(content, secret);
        }

        match value {
            serde_json::Value::String(line) => Self::text(&line, None),
            serde_json::Value::Object(map) => {
                serde_json::from_value::<JsonSignal>(serde_json::Value::Object(map))
                    .map(InboundPayload::Json)
                    .map_err(|e| ParseError::MalformedJson(e.to_string()))
            }
            other => Err(ParseError::MalformedJson(format!(
                "expected an object, got {}",
                json_type(&other)
            ))),
        }
    }

    fn text(content: &str, secret: Option<String>) -> Result<Self, ParseError> {
        let signal = parse_alert_line(content)?;
        Ok(InboundPayload::Text(TextSignal {
            content: content.to_string(),
            secret,
            signal,
        }))
    }

    /// Secret carried by the payload. Free text never carries one unless it
    /// was wrapped in a JSON `content` envelope.
    pub fn secret(&self) -> Option<&str> {
        match self {
            InboundPayload::Json(json) => json.secret.as_deref(),
            InboundPayload::Text(text) => text.secret.as_deref(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, InboundPayload::Text(_))
    }

    pub fn into_signal(self) -> Result<Signal, ValidationError> {
        match self {
            InboundPayload::Text(text) => {
                checked_price(text.signal.price)?;
                Ok(text.signal)
            }
            InboundPayload::Json(json) => json.validate(),
        }
    }
}

/// Prices must be finite and strictly positive, whatever the wire format.
pub fn checked_price(price: f64) -> Result<f64, ValidationError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(ValidationError::InvalidPrice(price.to_string()))
    }
}

impl JsonSignal {
    fn validate(self) -> Result<Signal, ValidationError> {
        let action = non_empty(self.action).ok_or(ValidationError::MissingRequiredFields)?;
        let ticker = non_empty(self.ticker).ok_or(ValidationError::MissingRequiredFields)?;
        let price_field = self.price.ok_or(ValidationError::MissingRequiredFields)?;
        let price = price_field
            .value()
            .ok_or_else(|| ValidationError::InvalidPrice(format!("{:?}", price_field)))?;
        // A zero price reads as absent, matching the upstream sender's convention.
        if price == 0.0 {
            return Err(ValidationError::MissingRequiredFields);
        }
        let price = checked_price(price)?;

        let kind = signal_kind(&action, self.order_type.as_deref())?;

        let direction = match non_empty(self.direction) {
            Some(raw) => Some(Direction::parse(&raw).ok_or(ValidationError::InvalidDirection(raw))?),
            None => None,
        };

        let quantity = match self.quantity {
            Some(field) => {
                let q = field
                    .value()
                    .ok_or_else(|| ValidationError::InvalidQuantity(format!("{:?}", field)))?;
                if q < 0.0 {
                    return Err(ValidationError::InvalidQuantity(q.to_string()));
                }
                Some(q).filter(|q| *q > 0.0)
            }
            None => None,
        };

        Ok(Signal {
            kind,
            ticker,
            price,
            direction,
            stop_loss: optional_level(self.stop_loss, "stopLoss")?,
            take_profit: optional_level(self.take_profit, "takeProfit")?,
            quantity,
            pnl: match self.pnl {
                Some(field) => Some(field.value().ok_or(ValidationError::InvalidField {
                    field: "pnl",
                    reason: "not a number".to_string(),
                })?),
                None => None,
            },
            strategy: non_empty(self.strategy),
        })
    }
}

/// Decide the signal kind once from the action and the optional order type.
pub fn signal_kind(action: &str, order_type: Option<&str>) -> Result<SignalKind, ValidationError> {
    let order_type = order_type.map(|o| o.trim().to_ascii_lowercase());
    if order_type.as_deref() == Some("cancel") {
        return Ok(SignalKind::CancelOrder);
    }

    match action.trim().to_ascii_lowercase().as_str() {
        "entry" => match order_type.as_deref() {
            None | Some("") | Some("mkt") | Some("market") => Ok(SignalKind::Entry),
            Some("lmt") | Some("limit") => Ok(SignalKind::LimitEntry),
            Some(other) => Err(ValidationError::InvalidField {
                field: "orderType",
                reason: format!("unsupported order type {}", other),
            }),
        },
        "take_profit" => Ok(SignalKind::TakeProfit),
        "stop_loss" => Ok(SignalKind::StopLoss),
        "cancel" => Ok(SignalKind::CancelOrder),
        _ => Err(ValidationError::UnknownAction(action.to_string())),
    }
}

fn optional_level(
    field: Option<NumberField>,
    name: &'static str,
) -> Result<Option<f64>, ValidationError> {
    match field {
        Some(f) => {
            let value = f.value().ok_or(ValidationError::InvalidField {
                field: name,
                reason: "not a number".to_string(),
            })?;
            Ok(Some(value).filter(|v| *v > 0.0))
        }
        None => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_json() {
        let payload = InboundPayload::parse(
            r#"{"secret":"s3cret","action":"entry","ticker":"MNQ1!","price":21500,"direction":"long","quantity":2,"strategy":"S1"}"#,
        )
        .unwrap();
        assert_eq!(payload.secret(), Some("s3cret"));
        assert!(!payload.is_text());

        let signal = payload.into_signal().unwrap();
        assert_eq!(signal.kind, SignalKind::Entry);
        assert_eq!(signal.ticker, "MNQ1!");
        assert_eq!(signal.price, 21500.0);
        assert_eq!(signal.direction, Some(Direction::Long));
        assert_eq!(signal.quantity, Some(2.0));
        assert_eq!(signal.strategy.as_deref(), Some("S1"));
    }

    #[test]
    fn test_string_prices_are_accepted() {
        let signal = InboundPayload::parse(
            r#"{"action":"take_profit","ticker":"CL1!","price":"69.50","pnl":"-12.5"}"#,
        )
        .unwrap()
        .into_signal()
        .unwrap();
        assert_eq!(signal.kind, SignalKind::TakeProfit);
        assert_eq!(signal.price, 69.5);
        assert_eq!(signal.pnl, Some(-12.5));
    }

    #[test]
    fn test_content_envelope_is_free_text() {
        let payload = InboundPayload::parse(
            r#"{"secret":"abc","content":"CL1! SELL Signal | Entry: 68.50 | Contracts: 3"}"#,
        )
        .unwrap();
        assert!(payload.is_text());
        assert_eq!(payload.secret(), Some("abc"));
        let signal = payload.into_signal().unwrap();
        assert_eq!(signal.direction, Some(Direction::Short));
        assert_eq!(signal.quantity, Some(3.0));
    }

    #[test]
    fn test_plain_text_body() {
        let payload =
            InboundPayload::parse("CL1! BUY Signal | Entry: 68.50 | SL: 68.00 | TP: 69.50").unwrap();
        assert!(payload.is_text());
        assert_eq!(payload.secret(), None);
    }

    #[test]
    fn test_unparseable_text_is_parse_error() {
        assert!(matches!(
            InboundPayload::parse("just some words"),
            Err(ParseError::UnrecognizedAlert(_))
        ));
        assert!(matches!(
            InboundPayload::parse(r#"{"content":"nothing useful"}"#),
            Err(ParseError::UnrecognizedAlert(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        for body in [
            r#"{"ticker":"CL1!","price":1}"#,
            r#"{"action":"entry","price":1}"#,
            r#"{"action":"entry","ticker":"CL1!"}"#,
            r#"{"action":"entry","ticker":"  ","price":1}"#,
            r#"{"action":"entry","ticker":"CL1!","price":0}"#,
        ] {
            let result = InboundPayload::parse(body).unwrap().into_signal();
            assert_eq!(result, Err(ValidationError::MissingRequiredFields), "{}", body);
        }
    }

    #[test]
    fn test_non_numeric_price() {
        let result = InboundPayload::parse(r#"{"action":"entry","ticker":"CL1!","price":"abc"}"#)
            .unwrap()
            .into_signal();
        assert!(matches!(result, Err(ValidationError::InvalidPrice(_))));
    }

    #[test]
    fn test_free_text_rejects_non_positive_prices() {
        for body in [
            "CL1! BUY Signal | Entry: 0",
            "CL1! BUY Signal | Entry: -5",
            "CL1! BUY Take Profit HIT | Exit: 0",
            r#"{"content":"CL1! SELL Signal | Entry: 0 | Contracts: 2"}"#,
            r#"{"content":"CL1! BUY Stop Loss HIT | Exit: -1"}"#,
        ] {
            let result = InboundPayload::parse(body).unwrap().into_signal();
            assert!(matches!(result, Err(ValidationError::InvalidPrice(_))), "{}", body);
        }
    }

    #[test]
    fn test_negative_json_price() {
        let result = InboundPayload::parse(r#"{"action":"entry","ticker":"CL1!","price":-3}"#)
            .unwrap()
            .into_signal();
        assert_eq!(result, Err(ValidationError::InvalidPrice("-3".to_string())));
    }

    #[test]
    fn test_checked_price() {
        assert_eq!(checked_price(68.5), Ok(68.5));
        assert!(checked_price(0.0).is_err());
        assert!(checked_price(f64::NAN).is_err());
        assert!(checked_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_unknown_action() {
        let result = InboundPayload::parse(r#"{"action":"hold","ticker":"CL1!","price":1}"#)
            .unwrap()
            .into_signal();
        assert_eq!(result, Err(ValidationError::UnknownAction("hold".to_string())));
    }

    #[test]
    fn test_order_types() {
        assert_eq!(signal_kind("entry", Some("LMT")), Ok(SignalKind::LimitEntry));
        assert_eq!(signal_kind("entry", Some("MKT")), Ok(SignalKind::Entry));
        assert_eq!(signal_kind("entry", Some("cancel")), Ok(SignalKind::CancelOrder));
        assert_eq!(signal_kind("cancel", None), Ok(SignalKind::CancelOrder));
        assert_eq!(signal_kind("STOP_LOSS", None), Ok(SignalKind::StopLoss));
    }

    #[test]
    fn test_non_object_json() {
        assert!(matches!(
            InboundPayload::parse("[1,2,3]"),
            Err(ParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_zero_quantity_falls_back_to_default() {
        let signal = InboundPayload::parse(r#"{"action":"entry","ticker":"CL1!","price":1,"quantity":0}"#)
            .unwrap()
            .into_signal()
            .unwrap();
        assert_eq!(signal.quantity, None);
        assert_eq!(signal.quantity_or_default(), 1.0);
    }
}
