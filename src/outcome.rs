use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

/// Three-way result of a match as stored in the pool ("toto" code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeCode {
    HomeWin,
    AwayWin,
    Draw,
}

impl OutcomeCode {
    /// Stored token: "1", "2" or "3".
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeCode::HomeWin => "1",
            OutcomeCode::AwayWin => "2",
            OutcomeCode::Draw => "3",
        }
    }

    /// Label shown on a betting slip, where a draw is "X".
    pub fn symbol(self) -> &'static str {
        match self {
            OutcomeCode::HomeWin => "1",
            OutcomeCode::AwayWin => "2",
            OutcomeCode::Draw => "X",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(OutcomeCode::HomeWin),
            "2" => Some(OutcomeCode::AwayWin),
            "3" | "X" | "x" => Some(OutcomeCode::Draw),
            _ => None,
        }
    }

    /// Accepts both `"1"` and `1`; the store is not consistent about it.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => match n.as_u64()? {
                1 => Some(OutcomeCode::HomeWin),
                2 => Some(OutcomeCode::AwayWin),
                3 => Some(OutcomeCode::Draw),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equal scores are always a draw; shootouts are not known to the pool.
pub fn classify<T: Ord>(home: T, away: T) -> OutcomeCode {
    match home.cmp(&away) {
        Ordering::Greater => OutcomeCode::HomeWin,
        Ordering::Less => OutcomeCode::AwayWin,
        Ordering::Equal => OutcomeCode::Draw,
    }
}
