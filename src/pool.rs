use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{debug, info};
use thiserror::Error;

use crate::leaderboard::{StandingsRow, TieBreak, compute_standings};
use crate::model::{
    Fixture, OfficialTop4, Participant, Phase, Prediction, Ranking, ScorePair, ScoringRules,
    Stage, Team, Top4Prediction, Tournament,
};
use crate::outcome::OutcomeCode;
use crate::records;
use crate::stage_clock::{self, PhaseWindow, StageStatus};
use crate::top4_score::PointsMatrix;
use crate::store::{Collection, Filter, Query, Record, RecordStore, SortOrder, record_id};

/// Why a participant or admin write was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("unknown fixture: {0}")]
    UnknownFixture(String),
    #[error("predictions for {stage} closed at {deadline}")]
    StageLocked {
        stage: String,
        deadline: DateTime<Utc>,
    },
    #[error("top-4 phase {0} is not open")]
    PhaseClosed(Phase),
    #[error("team {0} is selected more than once")]
    DuplicateTeam(String),
    #[error("no active tournament")]
    NoActiveTournament,
}

/// A participant's single-match entry as typed into the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionEntry {
    pub half_time: ScorePair,
    pub full_time: ScorePair,
    pub outcome: OutcomeCode,
}

impl PredictionEntry {
    pub fn new(half_time: ScorePair, full_time: ScorePair) -> Self {
        Self {
            half_time,
            full_time,
            outcome: full_time.outcome(),
        }
    }

    /// Changing the full-time score re-derives the outcome, dropping any manual pick.
    pub fn set_full_time(&mut self, full_time: ScorePair) {
        self.full_time = full_time;
        self.outcome = full_time.outcome();
    }

    pub fn with_outcome(mut self, outcome: OutcomeCode) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Everything the leaderboard needs, read in one go.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tournament: Option<Tournament>,
    pub participants: Vec<Participant>,
    pub fixtures: Vec<Fixture>,
    pub predictions: Vec<Prediction>,
    pub top4_predictions: Vec<Top4Prediction>,
    pub official_top4: Option<OfficialTop4>,
    pub rules: Option<ScoringRules>,
}

impl Snapshot {
    pub fn standings(&self, tie_break: TieBreak) -> Vec<StandingsRow> {
        compute_standings(
            &self.participants,
            &self.fixtures,
            &self.predictions,
            &self.top4_predictions,
            self.official_top4.as_ref(),
            self.rules.as_ref(),
            tie_break,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub window: PhaseWindow,
    pub open: bool,
}

/// Prediction-entry and admin surface over an injected record store.
pub struct PoolService<S> {
    store: S,
    tie_break: TieBreak,
}

impl<S: RecordStore> PoolService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads every collection; any store failure aborts the whole snapshot.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let tournament = self.active_tournament()?;
        let rules = self.active_rules()?;

        let official_filter = match &tournament {
            Some(t) => Filter::new().eq("tournament", t.id.as_str()),
            None => Filter::new(),
        };
        let official_top4 = self
            .store
            .get_first(Collection::OfficialTop4, &official_filter)
            .context("load official top 4")?
            .map(|r| records::decode_official_top4(&r))
            .transpose()?;

        let fixtures = self.fixtures()?;
        let participants = records::decode_all(
            &self
                .store
                .list_all(
                    Collection::Participants,
                    &Query::new().filter(Filter::new().eq("paid", true)),
                )
                .context("load participants")?,
            records::decode_participant,
        )?;
        let predictions = records::decode_all(
            &self
                .store
                .list_all(Collection::Predictions, &Query::new())
                .context("load predictions")?,
            records::decode_prediction,
        )?;
        let top4_query = match &tournament {
            Some(t) => Query::new().filter(Filter::new().eq("tournament", t.id.as_str())),
            None => Query::new(),
        };
        let top4_predictions = records::decode_all(
            &self
                .store
                .list_all(Collection::Top4Predictions, &top4_query)
                .context("load top-4 predictions")?,
            records::decode_top4_prediction,
        )?;

        info!(
            "loaded {} fixtures, {} participants, {} predictions, {} top-4 predictions",
            fixtures.len(),
            participants.len(),
            predictions.len(),
            top4_predictions.len()
        );

        Ok(Snapshot {
            tournament,
            participants,
            fixtures,
            predictions,
            top4_predictions,
            official_top4,
            rules,
        })
    }

    pub fn standings(&self) -> Result<Vec<StandingsRow>> {
        Ok(self.load_snapshot()?.standings(self.tie_break))
    }

    /// Fixtures by kickoff with team names expanded.
    pub fn fixtures(&self) -> Result<Vec<Fixture>> {
        let query = Query::new()
            .sort_by("match_date", SortOrder::Asc)
            .expand(&["home_team", "away_team"]);
        let raw = self
            .store
            .list_all(Collection::Fixtures, &query)
            .context("load fixtures")?;
        records::decode_all(&raw, records::decode_fixture)
    }

    pub fn fixtures_by_stage(&self) -> Result<Vec<(Stage, Vec<Fixture>)>> {
        let mut groups: Vec<(Stage, Vec<Fixture>)> = Vec::new();
        for fixture in self.fixtures()? {
            match groups.iter_mut().find(|(stage, _)| *stage == fixture.stage) {
                Some((_, list)) => list.push(fixture),
                None => groups.push((fixture.stage.clone(), vec![fixture])),
            }
        }
        groups.sort_by(|(a, _), (b, _)| {
            a.order()
                .cmp(&b.order())
                .then_with(|| a.label().cmp(b.label()))
        });
        Ok(groups)
    }

    pub fn stage_statuses(&self, now: DateTime<Utc>) -> Result<Vec<StageStatus>> {
        Ok(stage_clock::stage_statuses(&self.fixtures()?, now))
    }

    pub fn phase_statuses(&self, now: DateTime<Utc>) -> Result<Vec<PhaseStatus>> {
        let fixtures = self.fixtures()?;
        Ok(Phase::ALL
            .iter()
            .map(|phase| {
                let window = stage_clock::phase_window(*phase, &fixtures);
                PhaseStatus {
                    phase: *phase,
                    window,
                    open: window.contains(now),
                }
            })
            .collect())
    }

    pub fn participant_predictions(&self, user: &str) -> Result<Vec<Prediction>> {
        let query = Query::new().filter(Filter::new().eq("user", user));
        let raw = self
            .store
            .list_all(Collection::Predictions, &query)
            .context("load participant predictions")?;
        records::decode_all(&raw, records::decode_prediction)
    }

    pub fn teams(&self) -> Result<Vec<Team>> {
        let raw = self
            .store
            .list_all(Collection::Teams, &Query::new().sort_by("name", SortOrder::Asc))
            .context("load teams")?;
        records::decode_all(&raw, records::decode_team)
    }

    pub fn active_tournament(&self) -> Result<Option<Tournament>> {
        self.store
            .get_first(Collection::Tournaments, &Filter::new().eq("is_active", true))
            .context("load active tournament")?
            .map(|r| records::decode_tournament(&r))
            .transpose()
    }

    pub fn active_rules(&self) -> Result<Option<ScoringRules>> {
        self.store
            .get_first(Collection::ScoringRules, &Filter::new().eq("is_active", true))
            .context("load active scoring rules")?
            .map(|r| records::decode_rules(&r))
            .transpose()
    }

    /// Creates or updates the participant's prediction for one fixture.
    pub fn submit_prediction(
        &self,
        user: &str,
        fixture_id: &str,
        entry: PredictionEntry,
        now: DateTime<Utc>,
    ) -> Result<Prediction> {
        let fixtures = self.fixtures()?;
        let fixture = fixtures
            .iter()
            .find(|f| f.id == fixture_id)
            .ok_or_else(|| EntryError::UnknownFixture(fixture_id.to_string()))?;
        if let Some(deadline) = stage_clock::stage_deadline(&fixture.stage, &fixtures)
            && now >= deadline
        {
            return Err(EntryError::StageLocked {
                stage: fixture.stage.label().to_string(),
                deadline,
            }
            .into());
        }

        let filter = Filter::new().eq("user", user).eq("match", fixture_id);
        let data = records::prediction_data(user, fixture_id, &entry);
        let record = self.upsert(Collection::Predictions, &filter, data)?;
        info!("saved prediction of {user} for fixture {fixture_id}");
        records::decode_prediction(&record)
    }

    pub fn submit_top4(
        &self,
        user: &str,
        phase: Phase,
        ranks: Ranking,
        now: DateTime<Utc>,
    ) -> Result<Top4Prediction> {
        let tournament = self
            .active_tournament()?
            .ok_or(EntryError::NoActiveTournament)?;
        let fixtures = self.fixtures()?;
        if !stage_clock::is_phase_open(phase, &fixtures, now) {
            return Err(EntryError::PhaseClosed(phase).into());
        }
        ensure_distinct(&ranks)?;

        let filter = Filter::new()
            .eq("user", user)
            .eq("tournament", tournament.id.as_str())
            .eq("phase", phase.as_str());
        let data = records::top4_data(user, &tournament.id, phase, &ranks);
        let record = self.upsert(Collection::Top4Predictions, &filter, data)?;
        info!("saved {phase} top 4 of {user}");
        records::decode_top4_prediction(&record)
    }

    /// Admin: stores the official half-time and full-time scores of a fixture.
    pub fn record_result(
        &self,
        fixture_id: &str,
        half_time: ScorePair,
        full_time: ScorePair,
    ) -> Result<Fixture> {
        let exists = self
            .store
            .get_first(Collection::Fixtures, &Filter::new().eq("id", fixture_id))
            .context("look up fixture")?
            .is_some();
        if !exists {
            return Err(EntryError::UnknownFixture(fixture_id.to_string()).into());
        }
        let record = self
            .store
            .update(
                Collection::Fixtures,
                fixture_id,
                records::result_data(half_time, full_time),
            )
            .with_context(|| format!("save result of fixture {fixture_id}"))?;
        info!("recorded result {full_time} (ht {half_time}) for fixture {fixture_id}");
        records::decode_fixture(&record)
    }

    /// Admin: stores the final top 4 of the active tournament.
    pub fn save_official_top4(&self, ranks: Ranking) -> Result<OfficialTop4> {
        let tournament = self
            .active_tournament()?
            .ok_or(EntryError::NoActiveTournament)?;
        ensure_distinct(&ranks)?;
        let filter = Filter::new().eq("tournament", tournament.id.as_str());
        let data = records::official_top4_data(&tournament.id, &ranks);
        let record = self.upsert(Collection::OfficialTop4, &filter, data)?;
        info!("saved official top 4 for {}", tournament.name);
        records::decode_official_top4(&record)
    }

    /// Admin: replaces the point values of the active rule set, creating it if needed.
    /// Replaces the active rules. A points matrix that does not parse is rejected
    /// before anything is written.
    pub fn save_rules(&self, rules: &ScoringRules) -> Result<ScoringRules> {
        if let Some(raw) = &rules.points_matrix {
            PointsMatrix::parse(raw).context("invalid points matrix")?;
        }
        let filter = Filter::new().eq("is_active", true);
        let record = self.upsert(Collection::ScoringRules, &filter, records::rules_data(rules))?;
        records::decode_rules(&record)
    }

    fn upsert(&self, collection: Collection, filter: &Filter, data: Record) -> Result<Record> {
        let existing = self
            .store
            .get_first(collection, filter)
            .with_context(|| format!("look up existing {} record", collection.name()))?;
        match existing {
            Some(record) => {
                let id = record_id(&record)
                    .ok_or_else(|| anyhow!("{} record without id", collection.name()))?;
                debug!("updating {} record {id}", collection.name());
                self.store
                    .update(collection, id, data)
                    .with_context(|| format!("update {} record {id}", collection.name()))
            }
            None => self
                .store
                .create(collection, data)
                .with_context(|| format!("create {} record", collection.name())),
        }
    }
}

fn ensure_distinct(ranks: &Ranking) -> Result<(), EntryError> {
    let mut seen = HashSet::new();
    for team in ranks.iter().flatten() {
        if !seen.insert(team.as_str()) {
            return Err(EntryError::DuplicateTeam(team.clone()));
        }
    }
    Ok(())
}
