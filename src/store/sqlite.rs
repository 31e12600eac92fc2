use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use log::debug;
use rand::Rng;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};

use super::{Collection, Filter, Query, Record, RecordStore, SortOrder, compare_values};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 15;

/// Embedded store keeping each record as a JSON document in one table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Rows of one collection in insertion order. Conditions SQLite can decide are pushed
    /// into the query; `Filter::matches` still runs on every row for the blank-as-null rule.
    fn load_matching(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>> {
        let mut sql =
            String::from("SELECT id, data, created, updated FROM records WHERE collection = ?");
        let mut args = vec![SqlValue::Text(collection.name().to_string())];
        for (field, expected) in filter.map(Filter::conditions).unwrap_or_default() {
            let Some(arg) = sql_arg(expected) else {
                continue;
            };
            match field.as_str() {
                "id" | "created" | "updated" => sql.push_str(&format!(" AND {field} = ?")),
                _ => {
                    sql.push_str(" AND json_extract(data, ?) = ?");
                    args.push(SqlValue::Text(json_path(field)));
                }
            }
            args.push(arg);
        }
        sql.push_str(" ORDER BY seq ASC");

        let mut stmt = self.conn.prepare(&sql).context("prepare load records query")?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query load records")?;

        let mut out = Vec::new();
        for row in rows {
            let (id, data, created, updated) = row.context("decode record row")?;
            let record = assemble_record(&id, &data, &created, &updated)?;
            if filter.is_none_or(|f| f.matches(&record)) {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let row = self
            .conn
            .query_row(
                "SELECT data, created, updated FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("query {} record {id}", collection.name()))?;
        match row {
            Some((data, created, updated)) => {
                Ok(Some(assemble_record(id, &data, &created, &updated)?))
            }
            None => Ok(None),
        }
    }

    fn expand_record(
        &self,
        collection: Collection,
        record: &mut Record,
        fields: &[String],
    ) -> Result<()> {
        let mut expanded = Map::new();
        for field in fields {
            let Some(target) = collection.relation_target(field) else {
                debug!("{} has no relation named {field}", collection.name());
                continue;
            };
            let Some(related_id) = record.get(field).and_then(Value::as_str) else {
                continue;
            };
            if related_id.is_empty() {
                continue;
            }
            if let Some(related) = self.find_by_id(target, related_id)? {
                expanded.insert(field.clone(), Value::Object(related));
            }
        }
        if !expanded.is_empty() {
            record.insert("expand".to_string(), Value::Object(expanded));
        }
        Ok(())
    }

    fn check_unique(&self, collection: Collection, data: &Record) -> Result<()> {
        let key = collection.unique_key();
        if key.is_empty() {
            return Ok(());
        }
        let mut filter = Filter::new();
        for field in key {
            filter = filter.eq(field, data.get(*field).cloned().unwrap_or(Value::Null));
        }
        if self.get_first(collection, &filter)?.is_some() {
            bail!(
                "unique constraint failed on {}({})",
                collection.name(),
                key.join(", ")
            );
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn list_all(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        let mut records = self.load_matching(collection, query.filter.as_ref())?;
        if let Some((field, order)) = &query.sort {
            records.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        if !query.expand.is_empty() {
            for record in &mut records {
                self.expand_record(collection, record, &query.expand)?;
            }
        }
        Ok(records)
    }

    fn get_first(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>> {
        Ok(self.load_matching(collection, Some(filter))?.into_iter().next())
    }

    fn create(&self, collection: Collection, mut data: Record) -> Result<Record> {
        let id = match data.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => new_record_id(),
        };
        strip_system_fields(&mut data);
        self.check_unique(collection, &data)?;

        let now = timestamp();
        let json = serde_json::to_string(&data).context("serialize record")?;
        self.conn
            .execute(
                "INSERT INTO records(collection, id, data, created, updated)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![collection.name(), id, json, now],
            )
            .with_context(|| format!("insert {} record {id}", collection.name()))?;
        debug!("created {} record {id}", collection.name());
        assemble_record(&id, &json, &now, &now)
    }

    fn update(&self, collection: Collection, id: &str, mut data: Record) -> Result<Record> {
        let existing = self
            .find_by_id(collection, id)?
            .ok_or_else(|| anyhow!("{} record {id} not found", collection.name()))?;
        strip_system_fields(&mut data);

        let mut merged = existing;
        strip_system_fields(&mut merged);
        merged.remove("id");
        for (key, value) in data {
            merged.insert(key, value);
        }

        let now = timestamp();
        let json = serde_json::to_string(&merged).context("serialize record")?;
        let changed = self
            .conn
            .execute(
                "UPDATE records SET data = ?1, updated = ?2 WHERE collection = ?3 AND id = ?4",
                params![json, now, collection.name(), id],
            )
            .with_context(|| format!("update {} record {id}", collection.name()))?;
        if changed == 0 {
            bail!("{} record {id} vanished during update", collection.name());
        }
        self.find_by_id(collection, id)?
            .ok_or_else(|| anyhow!("{} record {id} not found after update", collection.name()))
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            created TEXT NOT NULL,
            updated TEXT NOT NULL,
            UNIQUE(collection, id)
        );
        CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn assemble_record(id: &str, data: &str, created: &str, updated: &str) -> Result<Record> {
    let mut record: Record = serde_json::from_str(data)
        .with_context(|| format!("record {id} holds invalid json"))?;
    record.insert("id".to_string(), Value::from(id));
    record.insert("created".to_string(), Value::from(created));
    record.insert("updated".to_string(), Value::from(updated));
    Ok(record)
}

/// SQL side of an equality condition; `None` leaves it to `Filter::matches`.
/// JSON booleans come back from `json_extract` as 0 or 1.
fn sql_arg(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) if !s.is_empty() => Some(SqlValue::Text(s.clone())),
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        _ => None,
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn strip_system_fields(data: &mut Record) {
    data.remove("created");
    data.remove("updated");
    data.remove("expand");
}

fn new_record_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}
