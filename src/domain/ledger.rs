//! In-memory trade ledger.
//!
//! An ordered sequence of trades in insertion order. The ledger never
//! reorders on read and guarantees id uniqueness for records it creates,
//! imports or loads.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::trade::{Trade, TradeId};

const SEQUENTIAL_PREFIX: &str = "Trade";

/// How `add` labels new trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStyle {
    /// `Trade1`, `Trade2`, ... continuing after the highest existing label.
    #[default]
    Sequential,
    /// Eight lowercase hex characters taken from a v4 UUID.
    Token,
}

/// Why a bulk-import payload was refused.
#[derive(Debug, thiserror::Error)]
pub enum LedgerFormatError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected a JSON array of trades, got {0}")]
    NotAList(&'static str),

    #[error("record {index} is {kind}, expected an object")]
    NotAnObject { index: usize, kind: &'static str },

    #[error("record {index} could not be read: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate trade id {0:?}")]
    DuplicateId(TradeId),
}

/// Ordered collection of trade records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-validated trades without re-checking ids.
    pub fn from_trades(trades: Vec<Trade>) -> Self {
        Self { trades }
    }

    /// Validate an untyped payload as a full ledger.
    ///
    /// The payload must be an array whose every element is an object.
    /// Numeric fields are coerced leniently; records without an id get one
    /// assigned with `style`; duplicate ids are refused.
    pub fn from_json_value(payload: Value, style: IdStyle) -> Result<Self, LedgerFormatError> {
        let trades = parse_records(payload)?;

        let mut seen = HashSet::with_capacity(trades.len());
        for trade in trades.iter().filter(|t| !t.id.is_empty()) {
            if !seen.insert(trade.id.clone()) {
                return Err(LedgerFormatError::DuplicateId(trade.id.clone()));
            }
        }

        let mut ledger = Self { trades };
        ledger.relabel(style, |t, _| t.id.is_empty());
        Ok(ledger)
    }

    /// Parse raw JSON text and validate it with [`Ledger::from_json_value`].
    pub fn from_json_str(raw: &str, style: IdStyle) -> Result<Self, LedgerFormatError> {
        let payload: Value = serde_json::from_str(raw).map_err(LedgerFormatError::InvalidJson)?;
        Self::from_json_value(payload, style)
    }

    /// Read a previously persisted ledger.
    ///
    /// Same shape checks as [`Ledger::from_json_str`], but repeated ids are
    /// repaired instead of refused: the first record keeps its id and every
    /// later duplicate is relabelled with `style`. Older journals wrote
    /// `Trade{len + 1}` and so repeat ids after any delete-then-add.
    pub fn load_json_str(raw: &str, style: IdStyle) -> Result<Self, LedgerFormatError> {
        let payload: Value = serde_json::from_str(raw).map_err(LedgerFormatError::InvalidJson)?;
        let trades = parse_records(payload)?;

        let mut seen = HashSet::with_capacity(trades.len());
        let repeated: Vec<bool> = trades
            .iter()
            .map(|t| !t.id.is_empty() && !seen.insert(t.id.clone()))
            .collect();

        let mut ledger = Self { trades };
        let relabelled = ledger.relabel(style, |t, index| t.id.is_empty() || repeated[index]);
        for (old, new) in relabelled.iter().filter(|(old, _)| !old.is_empty()) {
            warn!(old_id = %old, new_id = %new, "Relabelled duplicate trade id on load");
        }
        Ok(ledger)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn push(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Remove the first record with `id`. Missing ids are a no-op.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Trade> {
        let pos = self.trades.iter().position(|t| t.id == id)?;
        Some(self.trades.remove(pos))
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }

    /// Swap in a whole new collection, returning the previous one.
    pub fn replace(&mut self, trades: Vec<Trade>) -> Vec<Trade> {
        std::mem::replace(&mut self.trades, trades)
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Give every record selected by `pick` a fresh id, in ledger order.
    ///
    /// Returns the `(old, new)` id pairs.
    fn relabel(
        &mut self,
        style: IdStyle,
        pick: impl Fn(&Trade, usize) -> bool,
    ) -> Vec<(TradeId, TradeId)> {
        let picked: Vec<usize> = self
            .trades
            .iter()
            .enumerate()
            .filter(|&(i, t)| pick(t, i))
            .map(|(i, _)| i)
            .collect();

        let mut changes = Vec::with_capacity(picked.len());
        for index in picked {
            let id = self.next_id(style);
            let old = std::mem::replace(&mut self.trades[index].id, id.clone());
            changes.push((old, id));
        }
        changes
    }

    /// Produce an id not yet present in the ledger.
    pub fn next_id(&self, style: IdStyle) -> TradeId {
        match style {
            IdStyle::Sequential => {
                let highest = self
                    .trades
                    .iter()
                    .filter_map(|t| sequential_number(&t.id))
                    .max()
                    .unwrap_or(0);
                let next = highest.max(self.trades.len() as u64) + 1;
                format!("{SEQUENTIAL_PREFIX}{next}")
            }
            IdStyle::Token => loop {
                let token = Uuid::new_v4().simple().to_string()[..8].to_string();
                if !self.contains_id(&token) {
                    break token;
                }
            },
        }
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}

fn parse_records(payload: Value) -> Result<Vec<Trade>, LedgerFormatError> {
    let Value::Array(items) = payload else {
        return Err(LedgerFormatError::NotAList(json_kind(&payload)));
    };

    let mut trades = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(LedgerFormatError::NotAnObject { index, kind: json_kind(&item) });
        }
        let trade: Trade = serde_json::from_value(item)
            .map_err(|source| LedgerFormatError::InvalidRecord { index, source })?;
        trades.push(trade);
    }
    Ok(trades)
}

fn sequential_number(id: &str) -> Option<u64> {
    id.strip_prefix(SEQUENTIAL_PREFIX)?.parse().ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
