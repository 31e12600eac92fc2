//! Decoding store records into the pool model and building write payloads.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Value, json};

use crate::model::{
    Fixture, OfficialTop4, Participant, Phase, Prediction, Ranking, ScorePair, ScoringRules,
    Stage, StagePoints, Team, Top4Prediction, Tournament,
};
use crate::outcome::OutcomeCode;
use crate::pool::PredictionEntry;
use crate::store::{Record, record_id};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn decode_all<T>(records: &[Record], decode: fn(&Record) -> Result<T>) -> Result<Vec<T>> {
    records.iter().map(decode).collect()
}

pub fn decode_fixture(record: &Record) -> Result<Fixture> {
    let id = required_id(record)?;
    let kickoff = parse_kickoff(str_field(record, "match_date").unwrap_or_default())
        .with_context(|| format!("fixture {id} has an invalid match_date"))?;
    Ok(Fixture {
        stage: Stage::parse(str_field(record, "stage").unwrap_or_default()),
        kickoff,
        half_time: pair(record, "home_ht", "away_ht"),
        full_time: pair(record, "home_ft", "away_ft"),
        home_team: relation(record, "home_team"),
        away_team: relation(record, "away_team"),
        home_team_name: expanded_name(record, "home_team"),
        away_team_name: expanded_name(record, "away_team"),
        city: str_field(record, "match_city")
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        id,
    })
}

pub fn decode_prediction(record: &Record) -> Result<Prediction> {
    let id = required_id(record)?;
    let participant_id =
        relation(record, "user").ok_or_else(|| anyhow!("prediction {id} has no user"))?;
    let fixture_id =
        relation(record, "match").ok_or_else(|| anyhow!("prediction {id} has no match"))?;
    Ok(Prediction {
        participant_id,
        fixture_id,
        half_time: ScorePair::new(
            count(record, "pred_home_ht").unwrap_or(0),
            count(record, "pred_away_ht").unwrap_or(0),
        ),
        full_time: ScorePair::new(
            count(record, "pred_home_ft").unwrap_or(0),
            count(record, "pred_away_ft").unwrap_or(0),
        ),
        outcome: record.get("pred_toto").and_then(OutcomeCode::from_value),
        id,
    })
}

pub fn decode_top4_prediction(record: &Record) -> Result<Top4Prediction> {
    let id = required_id(record)?;
    let participant_id =
        relation(record, "user").ok_or_else(|| anyhow!("top-4 prediction {id} has no user"))?;
    let raw_phase = str_field(record, "phase").unwrap_or_default();
    let phase = Phase::parse(raw_phase)
        .ok_or_else(|| anyhow!("top-4 prediction {id} has unknown phase {raw_phase:?}"))?;
    Ok(Top4Prediction {
        participant_id,
        tournament_id: relation(record, "tournament"),
        phase,
        ranks: ranking(record),
        id,
    })
}

pub fn decode_official_top4(record: &Record) -> Result<OfficialTop4> {
    Ok(OfficialTop4 {
        id: required_id(record)?,
        tournament_id: relation(record, "tournament"),
        ranks: ranking(record),
    })
}

pub fn decode_rules(record: &Record) -> Result<ScoringRules> {
    let points = |field: &str| count(record, field).unwrap_or(0);
    let points_matrix = match record.get("points_matrix") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(other) => Some(other.clone()),
    };
    Ok(ScoringRules {
        id: required_id(record)?,
        group: StagePoints {
            half_time: points("points_ht_group"),
            full_time: points("points_ft_group"),
            outcome: points("points_toto_group"),
        },
        finals: StagePoints {
            half_time: points("points_ht_finals"),
            full_time: points("points_ft_finals"),
            outcome: points("points_toto_finals"),
        },
        points_matrix,
    })
}

pub fn decode_participant(record: &Record) -> Result<Participant> {
    let id = required_id(record)?;
    let non_blank = |field: &str| str_field(record, field).filter(|s| !s.trim().is_empty());
    let display_name = match non_blank("firstName") {
        Some(first) => match non_blank("lastName") {
            Some(last) => format!("{first} {last}"),
            None => first.to_string(),
        },
        None => non_blank("name")
            .or_else(|| non_blank("username"))
            .unwrap_or(id.as_str())
            .to_string(),
    };
    Ok(Participant {
        eligible: record.get("paid").and_then(Value::as_bool).unwrap_or(false),
        display_name,
        id,
    })
}

pub fn decode_tournament(record: &Record) -> Result<Tournament> {
    Ok(Tournament {
        id: required_id(record)?,
        name: str_field(record, "name").unwrap_or_default().to_string(),
        year: record.get("year").and_then(Value::as_i64),
        active: record.get("is_active").and_then(Value::as_bool).unwrap_or(false),
    })
}

pub fn decode_team(record: &Record) -> Result<Team> {
    Ok(Team {
        id: required_id(record)?,
        name: str_field(record, "name").unwrap_or_default().to_string(),
        code: str_field(record, "code")
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
    })
}

pub fn prediction_data(user: &str, fixture_id: &str, entry: &PredictionEntry) -> Record {
    object(json!({
        "user": user,
        "match": fixture_id,
        "pred_home_ht": entry.half_time.home,
        "pred_away_ht": entry.half_time.away,
        "pred_home_ft": entry.full_time.home,
        "pred_away_ft": entry.full_time.away,
        "pred_toto": entry.outcome.as_str(),
    }))
}

pub fn top4_data(user: &str, tournament_id: &str, phase: Phase, ranks: &Ranking) -> Record {
    let mut data = ranking_data(ranks);
    data.insert("user".to_string(), Value::from(user));
    data.insert("tournament".to_string(), Value::from(tournament_id));
    data.insert("phase".to_string(), Value::from(phase.as_str()));
    data
}

pub fn official_top4_data(tournament_id: &str, ranks: &Ranking) -> Record {
    let mut data = ranking_data(ranks);
    data.insert("tournament".to_string(), Value::from(tournament_id));
    data
}

/// `match_toto` is written for other readers of the store; the pool itself never reads it.
pub fn result_data(half_time: ScorePair, full_time: ScorePair) -> Record {
    object(json!({
        "home_ht": half_time.home,
        "away_ht": half_time.away,
        "home_ft": full_time.home,
        "away_ft": full_time.away,
        "match_toto": full_time.outcome().as_str(),
    }))
}

pub fn rules_data(rules: &ScoringRules) -> Record {
    object(json!({
        "is_active": true,
        "points_ht_group": rules.group.half_time,
        "points_ft_group": rules.group.full_time,
        "points_toto_group": rules.group.outcome,
        "points_ht_finals": rules.finals.half_time,
        "points_ft_finals": rules.finals.full_time,
        "points_toto_finals": rules.finals.outcome,
        "points_matrix": rules.points_matrix.clone().unwrap_or(Value::Null),
    }))
}

fn ranking_data(ranks: &Ranking) -> Record {
    let mut data = Record::new();
    for (idx, team) in ranks.iter().enumerate() {
        data.insert(
            format!("rank_{}", idx + 1),
            Value::from(team.clone().unwrap_or_default()),
        );
    }
    data
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Blank means "not scheduled yet".
pub fn parse_kickoff(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let naive = trimmed.trim_end_matches(['Z', 'z']);
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Some(dt.and_utc()));
        }
    }
    Err(anyhow!("unrecognised datetime {trimmed:?}"))
}

fn required_id(record: &Record) -> Result<String> {
    record_id(record)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("record without id"))
}

fn str_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn relation(record: &Record, field: &str) -> Option<String> {
    str_field(record, field)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn expanded_name(record: &Record, field: &str) -> Option<String> {
    record
        .get("expand")
        .and_then(|e| e.get(field))
        .and_then(|t| t.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn ranking(record: &Record) -> Ranking {
    [
        relation(record, "rank_1"),
        relation(record, "rank_2"),
        relation(record, "rank_3"),
        relation(record, "rank_4"),
    ]
}

fn pair(record: &Record, home: &str, away: &str) -> Option<ScorePair> {
    Some(ScorePair::new(count(record, home)?, count(record, away)?))
}

/// Non-negative integer from a number or numeric string; `None` for null or missing.
fn count(record: &Record, field: &str) -> Option<u32> {
    match record.get(field)? {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return u32::try_from(v).ok();
            }
            let v = n.as_f64()?;
            (v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then_some(v as u32)
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}
