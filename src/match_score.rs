use crate::model::{Fixture, Prediction, ScoringRules};

/// Which of the three independent awards a prediction earned on one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchAward {
    pub half_time: u32,
    pub full_time: u32,
    pub outcome: u32,
}

impl MatchAward {
    pub fn total(&self) -> u32 {
        self.half_time
            .saturating_add(self.full_time)
            .saturating_add(self.outcome)
    }
}

pub fn score_match(prediction: &Prediction, fixture: &Fixture, rules: &ScoringRules) -> u32 {
    match_award(prediction, fixture, rules).total()
}

/// Exact equality only: a right goal difference with a wrong score earns nothing.
/// An undecided fixture earns nothing; callers normally skip those before getting here.
pub fn match_award(prediction: &Prediction, fixture: &Fixture, rules: &ScoringRules) -> MatchAward {
    let Some(actual_ft) = fixture.full_time else {
        return MatchAward::default();
    };
    let points = rules.points_for(&fixture.stage);

    let mut award = MatchAward::default();
    if fixture.half_time == Some(prediction.half_time) {
        award.half_time = points.half_time;
    }
    if actual_ft == prediction.full_time {
        award.full_time = points.full_time;
    }
    if prediction.outcome == Some(actual_ft.outcome()) {
        award.outcome = points.outcome;
    }
    award
}
