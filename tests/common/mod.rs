#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use wc26_pool::model::{
    Fixture, OfficialTop4, Participant, Phase, Prediction, ScorePair, ScoringRules, Stage,
    StagePoints, Top4Prediction,
};
use wc26_pool::outcome::OutcomeCode;
use wc26_pool::top4_score::PointsMatrix;

pub fn kickoff(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

pub fn fixture(id: &str, stage: Stage, at: DateTime<Utc>) -> Fixture {
    Fixture {
        id: id.to_string(),
        stage,
        kickoff: Some(at),
        half_time: None,
        full_time: None,
        home_team: None,
        away_team: None,
        home_team_name: None,
        away_team_name: None,
        city: None,
    }
}

pub fn played(mut fixture: Fixture, ht: (u32, u32), ft: (u32, u32)) -> Fixture {
    fixture.half_time = Some(ScorePair::new(ht.0, ht.1));
    fixture.full_time = Some(ScorePair::new(ft.0, ft.1));
    fixture
}

pub fn prediction(
    user: &str,
    fixture_id: &str,
    ht: (u32, u32),
    ft: (u32, u32),
    outcome: Option<OutcomeCode>,
) -> Prediction {
    Prediction {
        id: format!("{user}-{fixture_id}"),
        participant_id: user.to_string(),
        fixture_id: fixture_id.to_string(),
        half_time: ScorePair::new(ht.0, ht.1),
        full_time: ScorePair::new(ft.0, ft.1),
        outcome,
    }
}

pub fn participant(id: &str, name: &str) -> Participant {
    Participant {
        id: id.to_string(),
        display_name: name.to_string(),
        eligible: true,
    }
}

pub fn ranking(teams: [&str; 4]) -> [Option<String>; 4] {
    teams.map(|t| (!t.is_empty()).then(|| t.to_string()))
}

pub fn official(teams: [&str; 4]) -> OfficialTop4 {
    OfficialTop4 {
        id: "official".to_string(),
        tournament_id: Some("wc26".to_string()),
        ranks: ranking(teams),
    }
}

pub fn top4(user: &str, phase: Phase, teams: [&str; 4]) -> Top4Prediction {
    Top4Prediction {
        id: format!("{user}-{phase}"),
        participant_id: user.to_string(),
        tournament_id: Some("wc26".to_string()),
        phase,
        ranks: ranking(teams),
    }
}

/// Group 1/3/2, finals 2/5/3, diagonal matrix of 10 plus 5 for an off-by-one rank.
pub fn rules() -> ScoringRules {
    let mut matrix = PointsMatrix::default();
    for rank in 1..=4 {
        matrix.set(rank, rank, 10);
    }
    matrix.set(1, 2, 5);
    matrix.set(2, 1, 5);
    ScoringRules {
        id: "rules".to_string(),
        group: StagePoints {
            half_time: 1,
            full_time: 3,
            outcome: 2,
        },
        finals: StagePoints {
            half_time: 2,
            full_time: 5,
            outcome: 3,
        },
        points_matrix: Some(matrix.to_value()),
    }
}
