use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;

use crate::outcome::{OutcomeCode, classify};
use crate::top4_score::PointsMatrix;

pub const GROUP_STAGE_LABEL: &str = "Groepsfase";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScorePair {
    pub home: u32,
    pub away: u32,
}

impl ScorePair {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub fn outcome(self) -> OutcomeCode {
        classify(self.home, self.away)
    }

    /// Reads the first two digit runs, so "2-1", "2:1" and "FT 2 - 1" all work.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut nums = raw
            .split(|ch: char| !ch.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<u32>().ok());
        let home = nums.next()?;
        let away = nums.next()?;
        Some(Self { home, away })
    }
}

impl fmt::Display for ScorePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// Tournament stage, stored by its label. Known stages are listed in bracket order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Group,
    RoundOf32,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    ThirdPlace,
    Final,
    Other(String),
}

impl Stage {
    pub const KNOWN: [Stage; 7] = [
        Stage::Group,
        Stage::RoundOf32,
        Stage::RoundOf16,
        Stage::QuarterFinal,
        Stage::SemiFinal,
        Stage::ThirdPlace,
        Stage::Final,
    ];

    /// Exact label match; anything else is kept verbatim as `Other`.
    pub fn parse(label: &str) -> Self {
        match label {
            GROUP_STAGE_LABEL => Stage::Group,
            "Zestiende Finale" => Stage::RoundOf32,
            "Achtste Finale" => Stage::RoundOf16,
            "Kwartfinale" => Stage::QuarterFinal,
            "Halve Finale" => Stage::SemiFinal,
            "Troostfinale" => Stage::ThirdPlace,
            "Finale" => Stage::Final,
            other => Stage::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Stage::Group => GROUP_STAGE_LABEL,
            Stage::RoundOf32 => "Zestiende Finale",
            Stage::RoundOf16 => "Achtste Finale",
            Stage::QuarterFinal => "Kwartfinale",
            Stage::SemiFinal => "Halve Finale",
            Stage::ThirdPlace => "Troostfinale",
            Stage::Final => "Finale",
            Stage::Other(label) => label,
        }
    }

    pub fn order(&self) -> usize {
        match self {
            Stage::Group => 0,
            Stage::RoundOf32 => 1,
            Stage::RoundOf16 => 2,
            Stage::QuarterFinal => 3,
            Stage::SemiFinal => 4,
            Stage::ThirdPlace => 5,
            Stage::Final => 6,
            Stage::Other(_) => 7,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Stage::Group)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: String,
    pub stage: Stage,
    pub kickoff: Option<DateTime<Utc>>,
    pub half_time: Option<ScorePair>,
    pub full_time: Option<ScorePair>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub city: Option<String>,
}

impl Fixture {
    pub fn is_decided(&self) -> bool {
        self.full_time.is_some()
    }

    /// Always derived from the full-time pair, never read back from the store.
    pub fn official_outcome(&self) -> Option<OutcomeCode> {
        self.full_time.map(ScorePair::outcome)
    }

    pub fn home_label(&self) -> &str {
        self.home_team_name.as_deref().unwrap_or("...")
    }

    pub fn away_label(&self) -> &str {
        self.away_team_name.as_deref().unwrap_or("...")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub participant_id: String,
    pub fixture_id: String,
    pub half_time: ScorePair,
    pub full_time: ScorePair,
    /// `None` when the stored code is not one of the three known tokens.
    pub outcome: Option<OutcomeCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePoints {
    pub half_time: u32,
    pub full_time: u32,
    pub outcome: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    pub id: String,
    pub group: StagePoints,
    pub finals: StagePoints,
    /// Raw matrix as stored; parsed on demand because a broken one must only zero top-4 points.
    pub points_matrix: Option<Value>,
}

impl ScoringRules {
    pub fn points_for(&self, stage: &Stage) -> StagePoints {
        if stage.is_group() {
            self.group
        } else {
            self.finals
        }
    }

    pub fn matrix(&self) -> Option<PointsMatrix> {
        let raw = self.points_matrix.as_ref()?;
        match PointsMatrix::parse(raw) {
            Ok(matrix) => Some(matrix),
            Err(err) => {
                warn!("points matrix of rules {} is malformed: {err:#}", self.id);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreTournament,
    PostGroupStage,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::PreTournament, Phase::PostGroupStage];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreTournament => "pre_tournament",
            Phase::PostGroupStage => "post_group_stage",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pre_tournament" | "pre" => Some(Phase::PreTournament),
            "post_group_stage" | "post" => Some(Phase::PostGroupStage),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team ids for ranks 1..=4; `None` where nothing was chosen.
pub type Ranking = [Option<String>; 4];

#[derive(Debug, Clone, PartialEq)]
pub struct OfficialTop4 {
    pub id: String,
    pub tournament_id: Option<String>,
    pub ranks: Ranking,
}

impl OfficialTop4 {
    /// 1-based official rank of `team`, if it finished in the top 4.
    pub fn rank_of(&self, team: &str) -> Option<usize> {
        self.ranks
            .iter()
            .position(|r| r.as_deref() == Some(team))
            .map(|idx| idx + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Top4Prediction {
    pub id: String,
    pub participant_id: String,
    pub tournament_id: Option<String>,
    pub phase: Phase,
    pub ranks: Ranking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub year: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
}
