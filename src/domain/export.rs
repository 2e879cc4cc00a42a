//! Logbook filtering and CSV / JSON export.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;

use super::time::parse_timestamp;
use super::trade::{Side, Trade};

const CSV_HEADER: [&str; 13] = [
    "id", "time", "pair", "side", "margin", "pnl", "roi", "note", "setup", "session", "emotion",
    "result", "tags",
];

/// Logbook view filter. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    /// Case-insensitive pair match.
    pub pair: Option<String>,
    pub side: Option<String>,
    /// First local calendar day to include.
    pub since: Option<NaiveDate>,
    /// Last local calendar day to include.
    pub until: Option<NaiveDate>,
}

impl LedgerFilter {
    pub fn is_empty(&self) -> bool {
        self.pair.is_none() && self.side.is_none() && self.since.is_none() && self.until.is_none()
    }

    /// Whether `trade` belongs in the filtered view.
    ///
    /// Date bounds exclude trades whose timestamp cannot be parsed.
    pub fn matches(&self, trade: &Trade, tz: Tz) -> bool {
        if let Some(pair) = &self.pair {
            if !trade.pair.eq_ignore_ascii_case(pair.trim()) {
                return false;
            }
        }
        if let Some(side) = &self.side {
            if trade.side != Side::from(side.as_str()) {
                return false;
            }
        }
        if self.since.is_none() && self.until.is_none() {
            return true;
        }

        let Some(day) = parse_timestamp(&trade.time, tz).map(|at| at.date_naive()) else {
            return false;
        };
        self.since.is_none_or(|since| day >= since) && self.until.is_none_or(|until| day <= until)
    }

    pub fn apply<'a>(&self, trades: &'a [Trade], tz: Tz) -> Vec<&'a Trade> {
        trades.iter().filter(|t| self.matches(t, tz)).collect()
    }
}

/// Map a delimiter name or literal (`,` `;` `tab`) to its byte.
pub fn parse_delimiter(raw: &str) -> Option<u8> {
    if raw == "\t" {
        return Some(b'\t');
    }
    match raw.trim().to_ascii_lowercase().as_str() {
        "," | "comma" => Some(b','),
        ";" | "semicolon" => Some(b';'),
        "tab" => Some(b'\t'),
        _ => None,
    }
}

/// Render trades as CSV with a fixed header.
pub fn to_csv<'a>(trades: impl IntoIterator<Item = &'a Trade>, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(CSV_HEADER).context("Failed to write CSV header")?;

    for trade in trades {
        let row = [
            trade.id.clone(),
            trade.time.clone(),
            trade.pair.clone(),
            trade.side.to_string(),
            trade.margin.map(|m| m.normalize().to_string()).unwrap_or_default(),
            trade.pnl.normalize().to_string(),
            trade.roi().map(|r| format!("{r:.2}")).unwrap_or_default(),
            trade.note.clone().unwrap_or_default(),
            trade.setup.clone().unwrap_or_default(),
            trade.session.clone().unwrap_or_default(),
            trade.emotion.clone().unwrap_or_default(),
            trade.result.clone().unwrap_or_default(),
            trade.tags.join(" "),
        ];
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write CSV row for trade {}", trade.id))?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Render trades as the pretty JSON array used for backups and imports.
pub fn to_json(trades: &[Trade]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("Failed to serialize ledger")
}
