use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

use crate::model::{OfficialTop4, Top4Prediction};

pub const RANKS: usize = 4;

/// Points for (predicted rank, official rank), both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointsMatrix {
    cells: [[u32; RANKS]; RANKS],
}

impl PointsMatrix {
    pub fn new(cells: [[u32; RANKS]; RANKS]) -> Self {
        Self { cells }
    }

    pub fn get(&self, predicted_rank: usize, official_rank: usize) -> u32 {
        if !(1..=RANKS).contains(&predicted_rank) || !(1..=RANKS).contains(&official_rank) {
            return 0;
        }
        self.cells[predicted_rank - 1][official_rank - 1]
    }

    pub fn set(&mut self, predicted_rank: usize, official_rank: usize, points: u32) {
        if (1..=RANKS).contains(&predicted_rank) && (1..=RANKS).contains(&official_rank) {
            self.cells[predicted_rank - 1][official_rank - 1] = points;
        }
    }

    /// Parses `{"rank_1": {"rank_1": 10, ...}, ...}`, given either as an object or as a
    /// JSON string holding one. Missing entries are 0; unknown keys are ignored.
    pub fn parse(raw: &Value) -> Result<Self> {
        let parsed;
        let value = match raw {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text).context("points matrix is not json")?;
                &parsed
            }
            other => other,
        };
        let outer = value
            .as_object()
            .ok_or_else(|| anyhow!("points matrix must be an object"))?;

        let mut matrix = PointsMatrix::default();
        for (pred_key, row) in outer {
            let Some(predicted) = rank_from_key(pred_key) else {
                continue;
            };
            let row = row
                .as_object()
                .ok_or_else(|| anyhow!("row {pred_key} must be an object"))?;
            for (official_key, cell) in row {
                let Some(official) = rank_from_key(official_key) else {
                    continue;
                };
                let points = cell_points(cell)
                    .with_context(|| format!("invalid entry {pred_key}.{official_key}"))?;
                matrix.set(predicted, official, points);
            }
        }
        Ok(matrix)
    }

    pub fn to_value(&self) -> Value {
        let mut outer = Map::new();
        for predicted in 1..=RANKS {
            let mut row = Map::new();
            for official in 1..=RANKS {
                row.insert(
                    rank_key(official),
                    Value::from(self.get(predicted, official)),
                );
            }
            outer.insert(rank_key(predicted), Value::Object(row));
        }
        Value::Object(outer)
    }
}

pub fn rank_key(rank: usize) -> String {
    format!("rank_{rank}")
}

fn rank_from_key(key: &str) -> Option<usize> {
    let rank = key.strip_prefix("rank_")?.parse::<usize>().ok()?;
    (1..=RANKS).contains(&rank).then_some(rank)
}

fn cell_points(cell: &Value) -> Result<u32> {
    match cell {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return u32::try_from(v).context("points out of range");
            }
            match n.as_f64() {
                Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => Ok(v as u32),
                _ => bail!("points must be a non-negative integer, got {n}"),
            }
        }
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .with_context(|| format!("points must be a non-negative integer, got {s:?}")),
        other => bail!("points must be a number, got {other}"),
    }
}

/// Top-4 points for one phase prediction. Anything missing scores 0.
pub fn score_top4(
    prediction: Option<&Top4Prediction>,
    official: Option<&OfficialTop4>,
    matrix: Option<&PointsMatrix>,
) -> u32 {
    let (Some(prediction), Some(official), Some(matrix)) = (prediction, official, matrix) else {
        return 0;
    };

    let mut total = 0u32;
    for (idx, team) in prediction.ranks.iter().enumerate() {
        let Some(team) = team.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        if let Some(official_rank) = official.rank_of(team) {
            total = total.saturating_add(matrix.get(idx + 1, official_rank));
        }
    }
    total
}
