//! Trade statistics engine.
//!
//! Pure functions over a [`Ledger`]. Every function is total: an empty
//! ledger yields zero-valued results, never an error or a panic. Sums are
//! exact `Decimal`s and saturate at the type's range instead of overflowing.
//!
//! Policies:
//! - `pnl == 0` counts as neither win nor loss (reported as `breakeven`).
//! - Winrate is computed over *all* records, rounded to 2 decimals.
//! - Average ROI only averages records whose margin is positive.
//! - Group breakdowns sort by summed PnL descending; ties keep the order in
//!   which keys were first seen.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};

use super::ledger::Ledger;
use super::time::parse_timestamp;
use super::trade::Trade;

/// Aggregate metrics for the dashboard cards.
///
/// Amounts serialize as plain JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Percentage of winning trades among all trades.
    #[serde(with = "rust_decimal::serde::float")]
    pub winrate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_roi: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub best_trade: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub worst_trade: Option<Decimal>,
    /// Largest peak-to-trough drop of the equity curve (non-negative).
    #[serde(with = "rust_decimal::serde::float")]
    pub max_drawdown: Decimal,
    /// Gross profit over gross loss; `None` without losing trades.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub profit_factor: Option<Decimal>,
    #[serde(serialize_with = "serialize_curve")]
    pub equity_curve: Vec<Decimal>,
}

/// Field a PnL breakdown is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Pair,
    Setup,
    Session,
    Side,
}

impl GroupKey {
    fn value_of(self, trade: &Trade) -> String {
        match self {
            Self::Pair => trade.pair.clone(),
            Self::Setup => trade.setup.clone().unwrap_or_default(),
            Self::Session => trade.session.clone().unwrap_or_default(),
            Self::Side => trade.side.to_string(),
        }
    }
}

impl FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pair" => Ok(Self::Pair),
            "setup" => Ok(Self::Setup),
            "session" => Ok(Self::Session),
            "side" => Ok(Self::Side),
            other => Err(format!("unknown group key {other:?} (expected pair, setup, session or side)")),
        }
    }
}

/// Summed PnL for one group value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub pnl: Decimal,
    pub trades: usize,
}

/// One day of the performance trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub daily_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cumulative_pnl: Decimal,
}

/// One slice of the wins-vs-losses chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSlice {
    pub outcome: &'static str,
    pub count: usize,
}

/// Compute the full summary for a ledger.
pub fn compute_summary(ledger: &Ledger) -> Summary {
    let total = ledger.len();
    let wins = ledger.iter().filter(|t| t.is_win()).count();
    let losses = ledger.iter().filter(|t| t.is_loss()).count();

    let equity_curve = equity_curve(ledger);
    let total_pnl = equity_curve.last().copied().unwrap_or_default();

    let rois: Vec<Decimal> = ledger.iter().filter_map(Trade::roi).collect();
    let avg_roi = mean(&rois);

    let gross_profit = sum(ledger.iter().filter(|t| t.is_win()).map(|t| t.pnl));
    let gross_loss = sum(ledger.iter().filter(|t| t.is_loss()).map(|t| t.pnl.abs()));
    let profit_factor = if gross_loss > Decimal::ZERO {
        gross_profit.checked_div(gross_loss)
    } else {
        None
    };

    Summary {
        total,
        wins,
        losses,
        breakeven: total - wins - losses,
        winrate: percentage(wins, total),
        total_pnl,
        avg_pnl: mean_of(total_pnl, total),
        avg_roi,
        best_trade: ledger.iter().map(|t| t.pnl).max(),
        worst_trade: ledger.iter().map(|t| t.pnl).min(),
        max_drawdown: max_drawdown(&equity_curve),
        profit_factor,
        equity_curve,
    }
}

/// Running cumulative PnL, one point per trade in ledger order.
pub fn equity_curve(ledger: &Ledger) -> Vec<Decimal> {
    ledger
        .iter()
        .scan(Decimal::ZERO, |equity, t| {
            *equity = equity.saturating_add(t.pnl);
            Some(*equity)
        })
        .collect()
}

/// Sum PnL per group value, highest sum first.
///
/// Records lacking the field are grouped under the empty string.
pub fn pnl_by_group(ledger: &Ledger, key: GroupKey) -> Vec<GroupTotal> {
    let mut groups: Vec<GroupTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for trade in ledger {
        let value = key.value_of(trade);
        match index.get(&value) {
            Some(&i) => {
                groups[i].pnl = groups[i].pnl.saturating_add(trade.pnl);
                groups[i].trades += 1;
            }
            None => {
                index.insert(value.clone(), groups.len());
                groups.push(GroupTotal { key: value, pnl: trade.pnl, trades: 1 });
            }
        }
    }

    // Stable sort keeps first-seen order on ties.
    groups.sort_by(|a, b| b.pnl.cmp(&a.pnl));
    groups
}

/// Cumulative daily PnL over the last `window_days` days.
///
/// Trades are bucketed by calendar day in `now`'s timezone. Trades whose
/// timestamp cannot be parsed are skipped, since they cannot be placed in
/// the window. An empty window yields an empty series. A window reaching
/// past the earliest representable date has no lower bound.
pub fn performance_trend(ledger: &Ledger, window_days: u32, now: DateTime<Tz>) -> Vec<TrendPoint> {
    let tz = now.timezone();
    let cutoff = TimeDelta::try_days(i64::from(window_days))
        .and_then(|window| now.checked_sub_signed(window));

    let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for trade in ledger {
        let Some(at) = parse_timestamp(&trade.time, tz) else {
            continue;
        };
        if cutoff.is_none_or(|cutoff| at >= cutoff) {
            let day = daily.entry(at.date_naive()).or_default();
            *day = day.saturating_add(trade.pnl);
        }
    }

    let mut cumulative = Decimal::ZERO;
    daily
        .into_iter()
        .map(|(date, daily_pnl)| {
            cumulative = cumulative.saturating_add(daily_pnl);
            TrendPoint { date, daily_pnl, cumulative_pnl: cumulative }
        })
        .collect()
}

/// Data for the wins-vs-losses donut chart.
pub fn win_loss_breakdown(summary: &Summary) -> Vec<OutcomeSlice> {
    vec![
        OutcomeSlice { outcome: "Wins", count: summary.wins },
        OutcomeSlice { outcome: "Losses", count: summary.losses },
    ]
}

fn max_drawdown(curve: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    for &equity in curve {
        peak = peak.max(equity);
        worst = worst.max(peak.saturating_sub(equity));
    }
    worst
}

fn percentage(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole)).round_dp(2)
}

fn sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

fn mean(values: &[Decimal]) -> Decimal {
    mean_of(sum(values.iter().copied()), values.len())
}

fn mean_of(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

fn serialize_curve<S: Serializer>(curve: &[Decimal], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(curve.iter().map(|v| v.to_f64().unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Side;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use rust_decimal_macros::dec;

    fn trade(pair: &str, pnl: Decimal) -> Trade {
        Trade::new("", "2024-01-01 10:00:00", pair, Side::Long, pnl)
    }

    fn ledger(pnls: &[Decimal]) -> Ledger {
        Ledger::from_trades(pnls.iter().map(|&p| trade("BTC", p)).collect())
    }

    #[test]
    fn test_empty_ledger_is_all_zero() {
        let s = compute_summary(&Ledger::new());
        assert_eq!(s.total, 0);
        assert_eq!(s.wins, 0);
        assert_eq!(s.losses, 0);
        assert_eq!(s.winrate, Decimal::ZERO);
        assert_eq!(s.total_pnl, Decimal::ZERO);
        assert_eq!(s.avg_roi, Decimal::ZERO);
        assert_eq!(s.avg_pnl, Decimal::ZERO);
        assert_eq!(s.max_drawdown, Decimal::ZERO);
        assert!(s.best_trade.is_none());
        assert!(s.profit_factor.is_none());
        assert!(s.equity_curve.is_empty());
    }

    #[test]
    fn test_basic_scenario() {
        let s = compute_summary(&ledger(&[dec!(10), dec!(-4), dec!(6)]));
        assert_eq!(s.total, 3);
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 1);
        assert_eq!(s.total_pnl, dec!(12));
        assert_eq!(s.avg_pnl, dec!(4));
        assert_eq!(s.equity_curve, vec![dec!(10), dec!(6), dec!(12)]);
        assert_eq!(s.winrate, dec!(66.67));
        assert_eq!(s.best_trade, Some(dec!(10)));
        assert_eq!(s.worst_trade, Some(dec!(-4)));
        assert_eq!(s.max_drawdown, dec!(4));
        assert_eq!(s.profit_factor, Some(dec!(4)));
    }

    #[test]
    fn test_cent_amounts_sum_exactly() {
        let s = compute_summary(&ledger(&[dec!(0.1), dec!(0.2)]));
        assert_eq!(s.total_pnl, dec!(0.3));

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["total_pnl"], serde_json::json!(0.3));
        assert_eq!(json["equity_curve"], serde_json::json!([0.1, 0.3]));
        assert_eq!(json["winrate"], serde_json::json!(100.0));
        assert_eq!(json["profit_factor"], serde_json::Value::Null);
    }

    #[test]
    fn test_zero_pnl_is_breakeven() {
        let s = compute_summary(&ledger(&[Decimal::ZERO, dec!(5), Decimal::ZERO]));
        assert_eq!(s.total, 3);
        assert_eq!(s.wins, 1);
        assert_eq!(s.losses, 0);
        assert_eq!(s.breakeven, 2);
        assert_eq!(s.winrate, dec!(33.33));
    }

    #[test]
    fn test_avg_roi_ignores_records_without_margin() {
        let mut a = trade("BTC", dec!(10));
        a.margin = Some(dec!(100));
        let mut b = trade("BTC", dec!(-5));
        b.margin = Some(dec!(50));
        let c = trade("BTC", dec!(1000));
        let s = compute_summary(&Ledger::from_trades(vec![a, b, c]));
        assert_eq!(s.avg_roi, Decimal::ZERO); // (10% + -10%) / 2
        assert_eq!(s.total, 3);
    }

    #[test]
    fn test_sums_saturate_instead_of_overflowing() {
        let s = compute_summary(&ledger(&[Decimal::MAX, Decimal::MAX, dec!(-1)]));
        assert_eq!(s.total_pnl, Decimal::MAX - dec!(1));
        assert_eq!(s.best_trade, Some(Decimal::MAX));
    }

    #[test]
    fn test_drawdown_from_initial_balance() {
        let s = compute_summary(&ledger(&[dec!(-3), dec!(-2), dec!(10), dec!(-7)]));
        assert_eq!(s.equity_curve, vec![dec!(-3), dec!(-5), dec!(5), dec!(-2)]);
        assert_eq!(s.max_drawdown, dec!(7));
    }

    #[test]
    fn test_pnl_by_pair_sorted_desc() {
        let l = Ledger::from_trades(vec![
            trade("BTC", dec!(5)),
            trade("ETH", dec!(-3)),
            trade("BTC", dec!(2)),
        ]);
        let groups = pnl_by_group(&l, GroupKey::Pair);
        assert_eq!(
            groups,
            vec![
                GroupTotal { key: "BTC".into(), pnl: dec!(7), trades: 2 },
                GroupTotal { key: "ETH".into(), pnl: dec!(-3), trades: 1 },
            ]
        );
    }

    #[test]
    fn test_pnl_by_group_ties_keep_first_seen() {
        let l = Ledger::from_trades(vec![
            trade("SOL", dec!(4)),
            trade("ADA", dec!(4.0)),
            trade("XRP", dec!(9)),
        ]);
        let keys: Vec<_> = pnl_by_group(&l, GroupKey::Pair).into_iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["XRP", "SOL", "ADA"]);
    }

    #[test]
    fn test_pnl_by_setup_groups_missing_under_empty() {
        let mut a = trade("BTC", dec!(1));
        a.setup = Some("breakout".into());
        let b = trade("BTC", dec!(2));
        let groups = pnl_by_group(&Ledger::from_trades(vec![a, b]), GroupKey::Setup);
        assert_eq!(groups[0].key, "");
        assert_eq!(groups[1].key, "breakout");
    }

    #[test]
    fn test_group_key_parsing() {
        assert_eq!("Pair".parse::<GroupKey>(), Ok(GroupKey::Pair));
        assert!("emotion".parse::<GroupKey>().is_err());
    }

    #[test]
    fn test_performance_trend_buckets_by_local_day() {
        let mut trades = vec![
            Trade::new("1", "2024-03-01 09:00:00", "BTC", Side::Long, dec!(5)),
            Trade::new("2", "2024-03-01 18:00:00", "BTC", Side::Long, dec!(-2)),
            Trade::new("3", "2024-03-03 12:00:00", "BTC", Side::Short, dec!(4)),
            // Too old for a 7 day window.
            Trade::new("4", "2024-02-01 12:00:00", "BTC", Side::Long, dec!(100)),
            Trade::new("5", "not a date", "BTC", Side::Long, dec!(50)),
        ];
        // 23:30 UTC on March 2nd is already March 3rd in Berlin.
        trades.push(Trade::new("6", "2024-03-02T23:30:00Z", "BTC", Side::Long, dec!(1)));

        let now = Berlin.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let trend = performance_trend(&Ledger::from_trades(trades), 7, now);

        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        assert_eq!(
            trend,
            vec![
                TrendPoint { date: d(1), daily_pnl: dec!(3), cumulative_pnl: dec!(3) },
                TrendPoint { date: d(3), daily_pnl: dec!(5), cumulative_pnl: dec!(8) },
            ]
        );
    }

    #[test]
    fn test_performance_trend_empty_window() {
        let now = Berlin.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert!(performance_trend(&ledger(&[dec!(1), dec!(2)]), 30, now).is_empty());
        assert!(performance_trend(&Ledger::new(), 30, now).is_empty());
    }

    #[test]
    fn test_performance_trend_huge_window_covers_whole_ledger() {
        let trades = vec![
            Trade::new("1", "1970-01-02 09:00:00", "BTC", Side::Long, dec!(2)),
            Trade::new("2", "2024-03-01 09:00:00", "BTC", Side::Long, dec!(3)),
        ];
        let now = Berlin.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

        assert!(performance_trend(&Ledger::new(), u32::MAX, now).is_empty());
        let trend = performance_trend(&Ledger::from_trades(trades), u32::MAX, now);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[1].cumulative_pnl, dec!(5));
    }

    #[test]
    fn test_win_loss_breakdown() {
        let s = compute_summary(&ledger(&[dec!(1), dec!(-1), dec!(2)]));
        let slices = win_loss_breakdown(&s);
        assert_eq!(slices[0], OutcomeSlice { outcome: "Wins", count: 2 });
        assert_eq!(slices[1], OutcomeSlice { outcome: "Losses", count: 1 });
    }
}
