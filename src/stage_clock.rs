use chrono::{DateTime, Duration, Utc};

use crate::model::{Fixture, Phase, Stage};

/// Predictions for a stage close this long before its first kickoff.
pub const LOCK_LEAD_MINUTES: i64 = 30;
/// The second top-4 window opens this long after the last group match kicks off.
pub const POST_GROUP_OPEN_DELAY_MINUTES: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: Stage,
    pub fixtures: usize,
    pub deadline: Option<DateTime<Utc>>,
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseWindow {
    /// Open from `opens_at` (inclusive) until `closes_at` (exclusive); `None` is unbounded.
    Scheduled {
        opens_at: Option<DateTime<Utc>>,
        closes_at: Option<DateTime<Utc>>,
    },
    /// There is nothing to anchor the window to yet.
    Unscheduled,
}

impl PhaseWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        match *self {
            PhaseWindow::Scheduled {
                opens_at,
                closes_at,
            } => opens_at.is_none_or(|at| now >= at) && closes_at.is_none_or(|at| now < at),
            PhaseWindow::Unscheduled => false,
        }
    }
}

fn lock_at(kickoff: DateTime<Utc>) -> DateTime<Utc> {
    kickoff - Duration::minutes(LOCK_LEAD_MINUTES)
}

/// `None` when the stage has no scheduled fixtures, which keeps it open.
pub fn stage_deadline(stage: &Stage, fixtures: &[Fixture]) -> Option<DateTime<Utc>> {
    fixtures
        .iter()
        .filter(|f| &f.stage == stage)
        .filter_map(|f| f.kickoff)
        .min()
        .map(lock_at)
}

pub fn is_editable(stage: &Stage, fixtures: &[Fixture], now: DateTime<Utc>) -> bool {
    match stage_deadline(stage, fixtures) {
        Some(deadline) => now < deadline,
        None => true,
    }
}

/// Every stage that has fixtures, in bracket order.
pub fn stage_statuses(fixtures: &[Fixture], now: DateTime<Utc>) -> Vec<StageStatus> {
    let mut stages: Vec<Stage> = Vec::new();
    for fixture in fixtures {
        if !stages.contains(&fixture.stage) {
            stages.push(fixture.stage.clone());
        }
    }
    stages.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.label().cmp(b.label())));

    stages
        .into_iter()
        .map(|stage| {
            let count = fixtures.iter().filter(|f| f.stage == stage).count();
            let deadline = stage_deadline(&stage, fixtures);
            let editable = is_editable(&stage, fixtures, now);
            StageStatus {
                stage,
                fixtures: count,
                deadline,
                editable,
            }
        })
        .collect()
}

pub fn phase_window(phase: Phase, fixtures: &[Fixture]) -> PhaseWindow {
    match phase {
        Phase::PreTournament => PhaseWindow::Scheduled {
            opens_at: None,
            closes_at: fixtures.iter().filter_map(|f| f.kickoff).min().map(lock_at),
        },
        Phase::PostGroupStage => {
            let last_group_kickoff = fixtures
                .iter()
                .filter(|f| f.stage.is_group())
                .filter_map(|f| f.kickoff)
                .max();
            match last_group_kickoff {
                Some(kickoff) => PhaseWindow::Scheduled {
                    opens_at: Some(kickoff + Duration::minutes(POST_GROUP_OPEN_DELAY_MINUTES)),
                    closes_at: None,
                },
                None => PhaseWindow::Unscheduled,
            }
        }
    }
}

pub fn is_phase_open(phase: Phase, fixtures: &[Fixture], now: DateTime<Utc>) -> bool {
    phase_window(phase, fixtures).contains(now)
}
