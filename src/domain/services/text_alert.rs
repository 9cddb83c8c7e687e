//! Free-text alert parsing
//!
//! Charting platforms post alert lines such as
//! `🟢 CL1! BUY Signal | Entry: 68.50 | SL: 68.00 | TP: 69.50 | Contracts: 2 | Strategy: CL-5M`
//! or `🎯 CL1! BUY TP1 HIT | Exit: 69.50 | P&L: $1,000.00`.
//! Fields are `Label:` / `Label<n>:` pairs separated by `|` or newlines;
//! labels match case-insensitively.

use crate::domain::entities::signal::{Signal, SignalKind};
use crate::domain::entities::trade::Direction;
use crate::domain::errors::ParseError;

const TICKER_SYMBOLS: &str = "!@#$%^&*_+-=.:";

/// Parse one alert line into a signal.
pub fn parse_alert_line(content: &str) -> Result<Signal, ParseError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ParseError::EmptyBody);
    }

    let tokens: Vec<&str> = content.split_whitespace().collect();
    let skipped = content.to_ascii_uppercase().contains("SKIPPED");

    if !skipped {
        if let Some(side_index) = entry_marker(&tokens) {
            return parse_entry(content, &tokens, side_index);
        }
    }

    if let Some(kind) = exit_marker(content, &tokens) {
        return parse_exit(content, &tokens, kind);
    }

    Err(ParseError::UnrecognizedAlert(truncate(content, 120)))
}

fn parse_entry(content: &str, tokens: &[&str], side_index: usize) -> Result<Signal, ParseError> {
    // At most one leading token (emoji or tag) before the ticker.
    if side_index == 0 || side_index > 2 {
        return Err(ParseError::MissingTicker);
    }
    let ticker = tokens[side_index - 1];
    if !is_ticker_token(ticker) {
        return Err(ParseError::MissingTicker);
    }

    let direction = side_of(tokens[side_index]);
    let price = number_field(content, "Entry", false).ok_or(ParseError::MissingPrice("Entry"))?;
    let quantity = number_field(content, "Contracts", false)
        .filter(|q| *q > 0.0)
        .unwrap_or(1.0);

    Ok(Signal {
        kind: SignalKind::Entry,
        ticker: ticker.to_string(),
        price,
        direction,
        stop_loss: number_field(content, "SL", true),
        take_profit: number_field(content, "TP", true),
        quantity: Some(quantity),
        pnl: None,
        strategy: text_field(content, "Strategy"),
    })
}

fn parse_exit(content: &str, tokens: &[&str], kind: SignalKind) -> Result<Signal, ParseError> {
    let ticker = exit_ticker(tokens).ok_or(ParseError::MissingTicker)?;
    let price = number_field(content, "Exit", false).ok_or(ParseError::MissingPrice("Exit"))?;
    let direction = tokens.iter().find_map(|t| side_of(t));

    Ok(Signal {
        kind,
        ticker: ticker.to_string(),
        price,
        direction,
        stop_loss: None,
        take_profit: None,
        quantity: None,
        pnl: number_field(content, "P&L", false),
        strategy: text_field(content, "Strategy"),
    })
}

/// Index of the BUY/SELL token of a `<ticker> BUY|SELL Signal` phrase.
fn entry_marker(tokens: &[&str]) -> Option<usize> {
    tokens.windows(2).position(|pair| {
        side_of(pair[0]).is_some() && pair[1].to_ascii_uppercase().starts_with("SIGNAL")
    })
}

fn exit_marker(content: &str, tokens: &[&str]) -> Option<SignalKind> {
    let upper = content.to_ascii_uppercase();
    if upper.contains("TAKE PROFIT HIT") {
        return Some(SignalKind::TakeProfit);
    }
    if upper.contains("STOP LOSS HIT") {
        return Some(SignalKind::StopLoss);
    }

    for (i, token) in tokens.iter().enumerate() {
        let next_is_hit = tokens
            .get(i + 1)
            .map(|t| t.eq_ignore_ascii_case("HIT"))
            .unwrap_or(false);
        match terse_marker(token) {
            Some((kind, false)) => return Some(kind),
            Some((kind, true)) if next_is_hit => return Some(kind),
            _ => {}
        }
    }
    None
}

/// `TP`/`SL` alone, or `TP<n>`/`SL<n>` (the bool says an index was present,
/// which then requires a trailing `HIT`).
fn terse_marker(token: &str) -> Option<(SignalKind, bool)> {
    let upper = token.to_ascii_uppercase();
    let (kind, rest) = if let Some(rest) = upper.strip_prefix("TP") {
        (SignalKind::TakeProfit, rest)
    } else if let Some(rest) = upper.strip_prefix("SL") {
        (SignalKind::StopLoss, rest)
    } else {
        return None;
    };

    if rest.is_empty() {
        Some((kind, false))
    } else if rest.bytes().all(|b| b.is_ascii_digit()) {
        Some((kind, true))
    } else {
        None
    }
}

fn exit_ticker<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    if let Some(side) = tokens.iter().position(|t| side_of(t).is_some()) {
        if side > 0 && is_ticker_token(tokens[side - 1]) {
            return Some(tokens[side - 1]);
        }
    }
    tokens
        .iter()
        .take(2)
        .copied()
        .find(|t| is_ticker_token(t) && terse_marker(t).is_none() && !is_marker_word(t))
}

fn is_marker_word(token: &str) -> bool {
    ["TAKE", "STOP", "PROFIT", "LOSS", "HIT"]
        .iter()
        .any(|w| token.eq_ignore_ascii_case(w))
}

fn side_of(token: &str) -> Option<Direction> {
    if token.eq_ignore_ascii_case("BUY") {
        Some(Direction::Long)
    } else if token.eq_ignore_ascii_case("SELL") {
        Some(Direction::Short)
    } else {
        None
    }
}

fn is_ticker_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().any(|c| c.is_ascii_alphanumeric())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || TICKER_SYMBOLS.contains(c))
}

/// Raw text following `label:` (or `label<n>:` when `indexed`), up to the
/// next `|` or line break.
fn field_value<'a>(content: &'a str, label: &str, indexed: bool) -> Option<&'a str> {
    let haystack = content.to_ascii_lowercase();
    let needle = label.to_ascii_lowercase();
    let bytes = content.as_bytes();

    let mut from = 0;
    while let Some(found) = haystack[from..].find(&needle) {
        let start = from + found;
        from = start + needle.len();

        if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            continue;
        }

        let mut pos = start + needle.len();
        if indexed {
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
        while pos < bytes.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b':' {
            continue;
        }

        let rest = &content[pos + 1..];
        let end = rest.find(|c| c == '|' || c == '\n').unwrap_or(rest.len());
        return Some(rest[..end].trim());
    }
    None
}

fn number_field(content: &str, label: &str, indexed: bool) -> Option<f64> {
    field_value(content, label, indexed).and_then(parse_amount)
}

fn text_field(content: &str, label: &str) -> Option<String> {
    field_value(content, label, false)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Leading numeric amount of `value`: optional sign and `$`, comma-grouped
/// digits, optional fraction. Trailing text is ignored.
pub fn parse_amount(value: &str) -> Option<f64> {
    let mut negative = false;
    let mut digits = String::new();
    let mut seen_digit = false;

    for c in value.trim().chars() {
        match c {
            '-' | '−' if !seen_digit && digits.is_empty() => negative = true,
            '+' | '$' if !seen_digit && digits.is_empty() => {}
            '0'..='9' => {
                seen_digit = true;
                digits.push(c);
            }
            ',' if seen_digit => {}
            '.' if !digits.contains('.') => digits.push('.'),
            _ => break,
        }
    }

    if !seen_digit {
        return None;
    }
    let amount: f64 = digits.trim_end_matches('.').parse().ok()?;
    Some(if negative { -amount } else { amount })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
