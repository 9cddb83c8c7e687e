//! Aggregate statistics over a set of trades.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::entities::trade::Trade;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub total_pnl: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerStats {
    pub ticker: String,
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub total_pnl: f64,
    pub wins: usize,
    pub losses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub overall: OverallStats,
    /// Most active ticker first.
    pub by_ticker: Vec<TickerStats>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Closed trades with a zero P&L count as neither win nor loss.
pub fn compute_stats(trades: &[Trade]) -> TradeStats {
    let closed: Vec<&Trade> = trades.iter().filter(|t| !t.is_open()).collect();
    let wins: Vec<f64> = closed
        .iter()
        .map(|t| t.pnl.unwrap_or_default())
        .filter(|pnl| *pnl > 0.0)
        .collect();
    let losses: Vec<f64> = closed
        .iter()
        .map(|t| t.pnl.unwrap_or_default())
        .filter(|pnl| *pnl < 0.0)
        .collect();
    let total_pnl: f64 = closed.iter().map(|t| t.pnl.unwrap_or_default()).sum();
    let win_rate = if closed.is_empty() {
        0.0
    } else {
        wins.len() as f64 / closed.len() as f64 * 100.0
    };

    let overall = OverallStats {
        total_trades: trades.len(),
        open_trades: trades.len() - closed.len(),
        closed_trades: closed.len(),
        total_pnl: round2(total_pnl),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: round2(win_rate),
        avg_win: round2(mean(&wins)),
        avg_loss: round2(mean(&losses)),
    };

    let mut per_ticker: HashMap<&str, TickerStats> = HashMap::new();
    for trade in trades {
        let entry = per_ticker
            .entry(trade.ticker.as_str())
            .or_insert_with(|| TickerStats {
                ticker: trade.ticker.clone(),
                total_trades: 0,
                open_trades: 0,
                closed_trades: 0,
                total_pnl: 0.0,
                wins: 0,
                losses: 0,
            });
        entry.total_trades += 1;
        if trade.is_open() {
            entry.open_trades += 1;
            continue;
        }
        entry.closed_trades += 1;
        let pnl = trade.pnl.unwrap_or_default();
        entry.total_pnl += pnl;
        if pnl > 0.0 {
            entry.wins += 1;
        } else if pnl < 0.0 {
            entry.losses += 1;
        }
    }

    let mut by_ticker: Vec<TickerStats> = per_ticker
        .into_values()
        .map(|mut s| {
            s.total_pnl = round2(s.total_pnl);
            s
        })
        .collect();
    by_ticker.sort_by(|a, b| {
        b.total_trades
            .cmp(&a.total_trades)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    TradeStats { overall, by_ticker }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::{Direction, TradeStatus};
    use chrono::Utc;

    fn trade(ticker: &str, pnl: Option<f64>) -> Trade {
        Trade {
            id: 0,
            ticker: ticker.to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            stop_loss: None,
            take_profit: None,
            quantity: 1.0,
            strategy: None,
            status: if pnl.is_some() { TradeStatus::Closed } else { TradeStatus::Open },
            exit_price: None,
            exit_reason: None,
            pnl,
            pnl_percent: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_empty() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.overall, OverallStats::default());
        assert!(stats.by_ticker.is_empty());
    }

    #[test]
    fn test_overall_and_by_ticker() {
        let trades = vec![
            trade("MNQ1!", Some(100.0)),
            trade("MNQ1!", Some(-40.0)),
            trade("MNQ1!", None),
            trade("CL1!", Some(20.25)),
            trade("CL1!", Some(0.0)),
        ];
        let stats = compute_stats(&trades);

        assert_eq!(stats.overall.total_trades, 5);
        assert_eq!(stats.overall.open_trades, 1);
        assert_eq!(stats.overall.closed_trades, 4);
        assert_eq!(stats.overall.winning_trades, 2);
        assert_eq!(stats.overall.losing_trades, 1);
        assert_eq!(stats.overall.win_rate, 50.0);
        assert_eq!(stats.overall.avg_loss, -40.0);
        assert_eq!(stats.overall.total_pnl, 80.25);

        assert_eq!(stats.by_ticker[0].ticker, "MNQ1!");
        assert_eq!(stats.by_ticker[0].open_trades, 1);
        assert_eq!(stats.by_ticker[1].wins, 1);
        assert_eq!(stats.by_ticker[1].losses, 0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(compute_stats(&[trade("ES1!", Some(1.0))])).unwrap();
        assert_eq!(json["overall"]["winRate"], 100.0);
        assert_eq!(json["byTicker"][0]["totalPnl"], 1.0);
    }
}
