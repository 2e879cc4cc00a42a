//! Trade record model and canonical number coercion.
//!
//! A `Trade` is the only persisted entity. Ledger files written over time
//! by different tools disagree on field types (numbers as strings, decimal
//! commas, numeric ids), so every deserialization path funnels through the
//! lenient helpers below. Money is kept as `Decimal` so sums stay exact;
//! the persisted JSON still carries plain numbers.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ledger-unique trade identifier (`Trade7`, `3fa2c91b`, ...).
pub type TradeId = String;

// ────────────────────────────────────────────
// Side
// ────────────────────────────────────────────

/// Direction of a trade.
///
/// Parsing is case-insensitive and maps `buy`/`sell` onto `Long`/`Short`.
/// Anything else is kept verbatim in `Other` so that user input is never
/// rejected on the side field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Side {
    Long,
    Short,
    #[default]
    Unspecified,
    Other(String),
}

impl From<String> for Side {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Self::Long,
            "short" | "sell" => Self::Short,
            "" => Self::Unspecified,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Side {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        side.to_string()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "Long"),
            Self::Short => write!(f, "Short"),
            Self::Unspecified => Ok(()),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

// ────────────────────────────────────────────
// Trade
// ────────────────────────────────────────────

/// A single journal entry as persisted in the ledger JSON array.
///
/// Unknown fields are carried in `extra` so a load/save cycle never drops
/// data written by another tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: TradeId,
    /// Creation time in the journal timezone.
    #[serde(default, alias = "timestamp", deserialize_with = "lenient_text")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pair: String,
    #[serde(default, deserialize_with = "lenient_side")]
    pub side: Side,
    /// Capital allocated to the trade. Absent or zero leaves ROI undefined.
    #[serde(
        default,
        deserialize_with = "lenient_opt_number",
        serialize_with = "rust_decimal::serde::float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub margin: Option<Decimal>,
    /// Realized profit or loss.
    #[serde(
        default,
        deserialize_with = "lenient_number",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub pnl: Decimal,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub setup: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub session: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub emotion: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_tags",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Trade {
    /// Record with only the required fields set.
    pub fn new(
        id: impl Into<TradeId>,
        time: impl Into<String>,
        pair: impl Into<String>,
        side: Side,
        pnl: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            time: time.into(),
            pair: pair.into(),
            side,
            margin: None,
            pnl,
            note: None,
            setup: None,
            session: None,
            emotion: None,
            result: None,
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Return on margin in percent, defined only when `margin > 0`.
    ///
    /// `None` as well when the ratio does not fit a `Decimal`.
    pub fn roi(&self) -> Option<Decimal> {
        match self.margin {
            Some(m) if m > Decimal::ZERO => {
                self.pnl.checked_div(m)?.checked_mul(Decimal::ONE_HUNDRED)
            }
            _ => None,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }
}

// ────────────────────────────────────────────
// New-trade input
// ────────────────────────────────────────────

/// Raw form input for the "new trade" operation.
///
/// `pnl` and `margin` stay untyped JSON so that text such as `"abc"` or
/// `"12,5"` reaches the coercion step instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTradeInput {
    #[serde(default, deserialize_with = "lenient_text")]
    pub pair: String,
    #[serde(default, deserialize_with = "lenient_side")]
    pub side: Side,
    #[serde(default)]
    pub margin: Value,
    #[serde(default)]
    pub pnl: Value,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub setup: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub session: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub emotion: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
}

/// A numeric field that could not be parsed and was stored as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoercionWarning {
    pub field: &'static str,
    pub raw: String,
}

impl std::fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} value {} is not a number, stored as 0", self.field, self.raw)
    }
}

impl NewTradeInput {
    /// Build the stored record, coercing `pnl` and `margin`.
    ///
    /// A missing `pnl` is silently zero; a present but non-numeric value
    /// is zero plus a warning. A missing or null `margin` stays absent.
    pub fn into_trade(self, id: TradeId, time: String) -> (Trade, Vec<CoercionWarning>) {
        let mut warnings = Vec::new();

        let pnl = match parse_number(&self.pnl) {
            Some(v) => v,
            None => {
                if !self.pnl.is_null() {
                    warnings.push(CoercionWarning { field: "pnl", raw: self.pnl.to_string() });
                }
                Decimal::ZERO
            }
        };

        let margin = if self.margin.is_null() {
            None
        } else {
            Some(parse_number(&self.margin).unwrap_or_else(|| {
                warnings.push(CoercionWarning { field: "margin", raw: self.margin.to_string() });
                Decimal::ZERO
            }))
        };

        let trade = Trade {
            id,
            time,
            pair: self.pair,
            side: self.side,
            margin,
            pnl,
            note: self.note,
            setup: self.setup,
            session: self.session,
            emotion: self.emotion,
            result: self.result,
            tags: self.tags,
            extra: Map::new(),
        };

        (trade, warnings)
    }
}

// ────────────────────────────────────────────
// Coercion
// ────────────────────────────────────────────

/// Parse a JSON value as an exact decimal amount.
///
/// Accepts JSON numbers and numeric strings (surrounding whitespace and a
/// single decimal comma allowed). Returns `None` for everything else,
/// including NaN, infinities and magnitudes beyond `Decimal`'s range.
/// The result is normalized, so `100.0` and `100` are stored alike.
pub fn parse_number(value: &Value) -> Option<Decimal> {
    let n = match value {
        Value::Number(n) => parse_decimal(&n.to_string())?,
        Value::String(s) => {
            let s = s.trim();
            if s.contains(',') && !s.contains('.') {
                parse_decimal(&s.replacen(',', ".", 1))?
            } else {
                parse_decimal(s)?
            }
        }
        _ => return None,
    };
    Some(n.normalize())
}

/// [`parse_number`] with the ledger-wide fallback of zero.
pub fn coerce_number(value: &Value) -> Decimal {
    parse_number(value).unwrap_or(Decimal::ZERO)
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    Ok(coerce_number(&Value::deserialize(d)?))
}

fn lenient_opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok((!value.is_null()).then(|| coerce_number(&value)))
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_text(Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_side<'de, D: Deserializer<'de>>(d: D) -> Result<Side, D::Error> {
    Ok(value_to_text(Value::deserialize(d)?).map(Side::from).unwrap_or_default())
}

fn lenient_opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_text(Value::deserialize(d)?).filter(|s| !s.is_empty()))
}

fn lenient_tags<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let tags: Vec<String> = match Value::deserialize(d)? {
        Value::Array(items) => items.into_iter().filter_map(value_to_text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => value_to_text(other).into_iter().collect(),
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
