//! Generic record store the pool reads from and writes to.
//!
//! Records are flat JSON objects carrying an `id`, the way PocketBase serves them.
//! Relations are stored as ids and can be expanded into `expand.<field>`.

use std::cmp::Ordering;

use anyhow::Result;
use serde_json::{Map, Value};

pub mod http;
pub mod sqlite;

pub use http::HttpStore;
pub use sqlite::SqliteStore;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Fixtures,
    Predictions,
    Top4Predictions,
    OfficialTop4,
    ScoringRules,
    Participants,
    Tournaments,
    Teams,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Fixtures => "matches",
            Collection::Predictions => "predictions",
            Collection::Top4Predictions => "top_four_predictions",
            Collection::OfficialTop4 => "tournament_top4",
            Collection::ScoringRules => "tournament_settings",
            Collection::Participants => "users",
            Collection::Tournaments => "tournaments",
            Collection::Teams => "teams",
        }
    }

    /// Collection a relation field points into, for expansion.
    pub fn relation_target(self, field: &str) -> Option<Collection> {
        match (self, field) {
            (Collection::Fixtures, "home_team" | "away_team") => Some(Collection::Teams),
            (Collection::Predictions, "match") => Some(Collection::Fixtures),
            (
                Collection::Predictions | Collection::Top4Predictions,
                "user",
            ) => Some(Collection::Participants),
            (
                Collection::Top4Predictions | Collection::OfficialTop4,
                "rank_1" | "rank_2" | "rank_3" | "rank_4",
            ) => Some(Collection::Teams),
            (Collection::Top4Predictions | Collection::OfficialTop4, "tournament") => {
                Some(Collection::Tournaments)
            }
            _ => None,
        }
    }

    /// Fields that together identify at most one record.
    pub fn unique_key(self) -> &'static [&'static str] {
        match self {
            Collection::Predictions => &["user", "match"],
            Collection::Top4Predictions => &["user", "tournament", "phase"],
            Collection::OfficialTop4 => &["tournament"],
            _ => &[],
        }
    }
}

/// Conjunction of `field = value` conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = record.get(field).unwrap_or(&Value::Null);
            values_equal(actual, expected)
        })
    }

    /// PocketBase filter syntax, e.g. `user = "abc" && paid = true`.
    pub fn to_pocketbase(&self) -> String {
        self.conditions
            .iter()
            .map(|(field, value)| format!("{field} = {}", pocketbase_literal(value)))
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

fn pocketbase_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        // PocketBase stores blank relations as "" and filters them against null.
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        _ => a == b,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Option<(String, SortOrder)>,
    pub expand: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn expand(mut self, fields: &[&str]) -> Self {
        self.expand.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// PocketBase `sort` parameter, `-field` for descending.
    pub fn sort_param(&self) -> Option<String> {
        self.sort.as_ref().map(|(field, order)| match order {
            SortOrder::Asc => field.clone(),
            SortOrder::Desc => format!("-{field}"),
        })
    }
}

pub trait RecordStore {
    fn list_all(&self, collection: Collection, query: &Query) -> Result<Vec<Record>>;
    fn get_first(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>>;
    fn create(&self, collection: Collection, data: Record) -> Result<Record>;
    /// Partial update: fields absent from `data` keep their stored value.
    fn update(&self, collection: Collection, id: &str, data: Record) -> Result<Record>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn list_all(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        (**self).list_all(collection, query)
    }

    fn get_first(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>> {
        (**self).get_first(collection, filter)
    }

    fn create(&self, collection: Collection, data: Record) -> Result<Record> {
        (**self).create(collection, data)
    }

    fn update(&self, collection: Collection, id: &str, data: Record) -> Result<Record> {
        (**self).update(collection, id, data)
    }
}

pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Ordering used for in-process sorting: nulls first, then numbers, bools, strings.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Bool(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&y.as_f64().unwrap_or_default()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
