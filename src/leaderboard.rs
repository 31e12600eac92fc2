use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::match_score::score_match;
use crate::model::{
    Fixture, OfficialTop4, Participant, Phase, Prediction, ScoringRules, Top4Prediction,
};
use crate::top4_score::{PointsMatrix, score_top4};

/// Secondary ordering for participants level on total points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// No secondary key; tied rows keep participant input order.
    #[default]
    InputOrder,
    MatchPoints,
    Name,
}

impl TieBreak {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "input" | "input_order" | "none" => Some(TieBreak::InputOrder),
            "match_points" | "matches" => Some(TieBreak::MatchPoints),
            "name" => Some(TieBreak::Name),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TieBreak::InputOrder => "input",
            TieBreak::MatchPoints => "match_points",
            TieBreak::Name => "name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsRow {
    pub participant_id: String,
    pub display_name: String,
    pub match_points: u32,
    pub top4_points: u32,
    pub total: u32,
}

/// Ranked standings for every eligible participant.
///
/// Undecided fixtures and fixtures without a prediction add nothing. Without active
/// rules every subtotal is zero. Rows are sorted by total, descending, with a stable
/// sort so the only secondary ordering is the one `tie_break` asks for.
pub fn compute_standings(
    participants: &[Participant],
    fixtures: &[Fixture],
    predictions: &[Prediction],
    top4_predictions: &[Top4Prediction],
    official: Option<&OfficialTop4>,
    rules: Option<&ScoringRules>,
    tie_break: TieBreak,
) -> Vec<StandingsRow> {
    let fixtures_by_id: HashMap<&str, &Fixture> =
        fixtures.iter().map(|f| (f.id.as_str(), f)).collect();

    let mut predictions_by_owner: HashMap<&str, Vec<&Prediction>> = HashMap::new();
    for prediction in predictions {
        predictions_by_owner
            .entry(prediction.participant_id.as_str())
            .or_default()
            .push(prediction);
    }
    let mut top4_by_owner: HashMap<&str, Vec<&Top4Prediction>> = HashMap::new();
    for prediction in top4_predictions {
        top4_by_owner
            .entry(prediction.participant_id.as_str())
            .or_default()
            .push(prediction);
    }

    let matrix = rules.and_then(ScoringRules::matrix);
    if rules.is_none() {
        debug!("no active scoring rules, every participant scores 0");
    }

    let mut rows = Vec::new();
    for participant in participants.iter().filter(|p| p.eligible) {
        let own = predictions_by_owner
            .get(participant.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let match_points = match rules {
            Some(rules) => match_points_for(participant, own, &fixtures_by_id, rules),
            None => 0,
        };

        let own_top4 = top4_by_owner
            .get(participant.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let top4_points = top4_points_for(own_top4, official, matrix.as_ref());

        rows.push(StandingsRow {
            participant_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            match_points,
            top4_points,
            total: match_points.saturating_add(top4_points),
        });
    }

    sort_standings(&mut rows, tie_break);
    rows
}

fn match_points_for(
    participant: &Participant,
    predictions: &[&Prediction],
    fixtures_by_id: &HashMap<&str, &Fixture>,
    rules: &ScoringRules,
) -> u32 {
    let mut seen = HashSet::new();
    let mut total = 0u32;
    for prediction in predictions {
        if !seen.insert(prediction.fixture_id.as_str()) {
            warn!(
                "participant {} has more than one prediction for fixture {}, ignoring {}",
                participant.id, prediction.fixture_id, prediction.id
            );
            continue;
        }
        let Some(fixture) = fixtures_by_id.get(prediction.fixture_id.as_str()) else {
            continue;
        };
        if !fixture.is_decided() {
            continue;
        }
        total = total.saturating_add(score_match(prediction, fixture, rules));
    }
    total
}

fn top4_points_for(
    predictions: &[&Top4Prediction],
    official: Option<&OfficialTop4>,
    matrix: Option<&PointsMatrix>,
) -> u32 {
    Phase::ALL
        .iter()
        .map(|phase| {
            let prediction = predictions.iter().copied().find(|p| p.phase == *phase);
            score_top4(prediction, official, matrix)
        })
        .fold(0u32, u32::saturating_add)
}

pub fn sort_standings(rows: &mut [StandingsRow], tie_break: TieBreak) {
    rows.sort_by(|a, b| {
        b.total.cmp(&a.total).then_with(|| match tie_break {
            TieBreak::InputOrder => Ordering::Equal,
            TieBreak::MatchPoints => b.match_points.cmp(&a.match_points),
            TieBreak::Name => a.display_name.cmp(&b.display_name),
        })
    });
}
