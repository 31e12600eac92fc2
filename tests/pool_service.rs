use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};

use wc26_pool::model::{Phase, ScorePair, ScoringRules, Stage, StagePoints};
use wc26_pool::outcome::OutcomeCode;
use wc26_pool::store::{Collection, Filter, Query, Record, RecordStore, SqliteStore};
use wc26_pool::{EntryError, PoolService, PredictionEntry};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn seed(store: &SqliteStore, collection: Collection, value: Value) {
    store.create(collection, record(value)).unwrap();
}

/// Two group matches on 11 and 12 June, one round-of-32 match on 28 June.
fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    seed(
        &store,
        Collection::Tournaments,
        json!({"id": "wc26", "name": "WK 2026", "year": 2026, "is_active": true}),
    );
    let teams = [
        ("ned", "Nederland", "NED"),
        ("mex", "Mexico", "MEX"),
        ("arg", "Argentinië", "ARG"),
        ("fra", "Frankrijk", "FRA"),
    ];
    for (id, name, code) in teams {
        seed(
            &store,
            Collection::Teams,
            json!({"id": id, "name": name, "code": code}),
        );
    }
    seed(
        &store,
        Collection::Fixtures,
        json!({
            "id": "m2", "stage": "Groepsfase", "match_date": "2026-06-12 19:00:00.000Z",
            "home_team": "arg", "away_team": "fra",
        }),
    );
    seed(
        &store,
        Collection::Fixtures,
        json!({
            "id": "m1", "stage": "Groepsfase", "match_date": "2026-06-11 19:00:00.000Z",
            "home_team": "mex", "away_team": "ned", "match_city": "Mexico-Stad",
        }),
    );
    seed(
        &store,
        Collection::Fixtures,
        json!({
            "id": "k1", "stage": "Zestiende Finale", "match_date": "2026-06-28 18:00:00.000Z",
        }),
    );
    seed(
        &store,
        Collection::Participants,
        json!({"id": "u1", "firstName": "Anna", "lastName": "de Vries", "paid": true}),
    );
    seed(
        &store,
        Collection::Participants,
        json!({"id": "u2", "username": "bram", "paid": true}),
    );
    seed(
        &store,
        Collection::Participants,
        json!({"id": "u3", "username": "gast", "paid": false}),
    );
    store
}

fn pool_rules() -> ScoringRules {
    ScoringRules {
        id: String::new(),
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
        points_matrix: Some(json!({
            "rank_1": {"rank_1": 10, "rank_2": 5},
            "rank_2": {"rank_1": 5, "rank_2": 10},
            "rank_3": {"rank_3": 10},
            "rank_4": {"rank_4": 10},
        })),
    }
}

fn seeded_service() -> PoolService<SqliteStore> {
    let service = PoolService::new(seeded_store());
    service.save_rules(&pool_rules()).unwrap();
    service
}

fn entry(ht: (u32, u32), ft: (u32, u32)) -> PredictionEntry {
    PredictionEntry::new(ScorePair::new(ht.0, ht.1), ScorePair::new(ft.0, ft.1))
}

fn ranks(teams: [&str; 4]) -> [Option<String>; 4] {
    teams.map(|t| Some(t.to_string()))
}

fn entry_error(err: anyhow::Error) -> EntryError {
    err.downcast::<EntryError>().unwrap()
}

/// Delegates to SQLite but fails every read of one collection.
struct FailingReads {
    inner: SqliteStore,
    broken: Collection,
}

impl FailingReads {
    fn check(&self, collection: Collection) -> Result<()> {
        if collection == self.broken {
            return Err(anyhow!("connection reset while reading {}", collection.name()));
        }
        Ok(())
    }
}

impl RecordStore for FailingReads {
    fn list_all(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        self.check(collection)?;
        self.inner.list_all(collection, query)
    }

    fn get_first(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>> {
        self.check(collection)?;
        self.inner.get_first(collection, filter)
    }

    fn create(&self, collection: Collection, data: Record) -> Result<Record> {
        self.inner.create(collection, data)
    }

    fn update(&self, collection: Collection, id: &str, data: Record) -> Result<Record> {
        self.inner.update(collection, id, data)
    }
}

#[test]
fn fixtures_come_sorted_with_team_names() {
    let service = seeded_service();
    let fixtures = service.fixtures().unwrap();
    let ids: Vec<&str> = fixtures.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2", "k1"]);
    assert_eq!(fixtures[0].home_label(), "Mexico");
    assert_eq!(fixtures[0].away_label(), "Nederland");
    assert_eq!(fixtures[0].city.as_deref(), Some("Mexico-Stad"));
    assert_eq!(fixtures[2].home_label(), "...");

    let grouped = service.fixtures_by_stage().unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].0, Stage::Group);
    assert_eq!(grouped[0].1.len(), 2);
    assert_eq!(grouped[1].0, Stage::RoundOf32);
}

#[test]
fn prediction_is_created_then_updated_in_place() {
    let service = seeded_service();
    let now = at(1, 12);

    let first = service
        .submit_prediction("u1", "m1", entry((0, 0), (1, 1)), now)
        .unwrap();
    assert_eq!(first.outcome, Some(OutcomeCode::Draw));

    let changed = entry((1, 0), (2, 1)).with_outcome(OutcomeCode::AwayWin);
    let second = service.submit_prediction("u1", "m1", changed, now).unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.full_time, ScorePair::new(2, 1));
    assert_eq!(second.outcome, Some(OutcomeCode::AwayWin));

    let stored = service.participant_predictions("u1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].half_time, ScorePair::new(1, 0));
}

#[test]
fn locked_stage_rejects_prediction_without_writing() {
    let service = seeded_service();
    let deadline = at(11, 19) - Duration::minutes(30);

    let err = service
        .submit_prediction("u1", "m2", entry((0, 0), (0, 0)), deadline)
        .unwrap_err();
    assert_eq!(
        entry_error(err),
        EntryError::StageLocked {
            stage: "Groepsfase".to_string(),
            deadline,
        }
    );
    assert!(service.participant_predictions("u1").unwrap().is_empty());

    // The knockout stage is still open at that moment.
    service
        .submit_prediction("u1", "k1", entry((0, 0), (1, 0)), deadline)
        .unwrap();
}

#[test]
fn unknown_fixture_is_rejected() {
    let service = seeded_service();
    let err = service
        .submit_prediction("u1", "nope", entry((0, 0), (0, 0)), at(1, 0))
        .unwrap_err();
    assert_eq!(
        entry_error(err),
        EntryError::UnknownFixture("nope".to_string())
    );

    let err = service
        .record_result("nope", ScorePair::new(0, 0), ScorePair::new(0, 0))
        .unwrap_err();
    assert_eq!(
        entry_error(err),
        EntryError::UnknownFixture("nope".to_string())
    );
}

#[test]
fn top4_phases_follow_their_windows() {
    let service = seeded_service();
    let before_tournament = at(1, 12);
    let first_pick = ranks(["arg", "fra", "ned", "mex"]);
    let second_pick = ranks(["fra", "arg", "ned", "mex"]);

    let saved = service
        .submit_top4("u1", Phase::PreTournament, first_pick.clone(), before_tournament)
        .unwrap();
    assert_eq!(saved.tournament_id.as_deref(), Some("wc26"));

    let err = service
        .submit_top4("u1", Phase::PostGroupStage, first_pick, before_tournament)
        .unwrap_err();
    assert_eq!(
        entry_error(err),
        EntryError::PhaseClosed(Phase::PostGroupStage)
    );

    let after_groups = at(12, 21);
    let err = service
        .submit_top4("u1", Phase::PreTournament, second_pick.clone(), after_groups)
        .unwrap_err();
    assert_eq!(
        entry_error(err),
        EntryError::PhaseClosed(Phase::PreTournament)
    );
    service
        .submit_top4("u1", Phase::PostGroupStage, second_pick, after_groups)
        .unwrap();

    let statuses = service.phase_statuses(after_groups).unwrap();
    assert_eq!(statuses.len(), 2);
    assert!(!statuses[0].open);
    assert!(statuses[1].open);
}

#[test]
fn top4_resubmission_keeps_one_record_per_phase() {
    let service = seeded_service();
    let now = at(1, 12);
    let first = service
        .submit_top4("u1", Phase::PreTournament, ranks(["arg", "fra", "ned", "mex"]), now)
        .unwrap();
    let second = service
        .submit_top4("u1", Phase::PreTournament, ranks(["ned", "fra", "arg", "mex"]), now)
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.ranks[0].as_deref(), Some("ned"));

    let all = service
        .store()
        .list_all(Collection::Top4Predictions, &Query::new())
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn duplicate_team_in_ranking_is_rejected() {
    let service = seeded_service();
    let err = service
        .submit_top4(
            "u1",
            Phase::PreTournament,
            ranks(["arg", "fra", "arg", "mex"]),
            at(1, 12),
        )
        .unwrap_err();
    assert_eq!(entry_error(err), EntryError::DuplicateTeam("arg".to_string()));

    let err = service
        .save_official_top4(ranks(["ned", "ned", "arg", "mex"]))
        .unwrap_err();
    assert_eq!(entry_error(err), EntryError::DuplicateTeam("ned".to_string()));
}

#[test]
fn top4_needs_an_active_tournament() {
    let store = SqliteStore::open_in_memory().unwrap();
    seed(
        &store,
        Collection::Tournaments,
        json!({"id": "wc22", "name": "WK 2022", "is_active": false}),
    );
    let service = PoolService::new(store);
    let err = service
        .submit_top4(
            "u1",
            Phase::PreTournament,
            ranks(["arg", "fra", "ned", "mex"]),
            at(1, 12),
        )
        .unwrap_err();
    assert_eq!(entry_error(err), EntryError::NoActiveTournament);
}

#[test]
fn standings_follow_recorded_results() {
    let service = seeded_service();
    let early = at(1, 12);
    for (user, ht, ft) in [
        ("u1", (1, 0), (2, 1)),
        ("u2", (0, 0), (1, 1)),
        ("u3", (1, 0), (2, 1)),
    ] {
        service
            .submit_prediction(user, "m1", entry(ht, ft), early)
            .unwrap();
    }
    service
        .submit_top4("u2", Phase::PreTournament, ranks(["arg", "fra", "ned", "mex"]), early)
        .unwrap();

    let before = service.standings().unwrap();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|r| r.total == 0));

    let fixture = service
        .record_result("m1", ScorePair::new(1, 0), ScorePair::new(2, 1))
        .unwrap();
    assert!(fixture.is_decided());
    assert_eq!(fixture.official_outcome(), Some(OutcomeCode::HomeWin));

    let rows = service.standings().unwrap();
    assert_eq!(rows[0].display_name, "Anna de Vries");
    assert_eq!(rows[0].total, 6);
    assert_eq!(rows[1].display_name, "bram");
    assert_eq!(rows[1].total, 0);

    service
        .save_official_top4(ranks(["fra", "arg", "ned", "mex"]))
        .unwrap();
    let rows = service.standings().unwrap();
    assert_eq!(rows[0].display_name, "bram");
    assert_eq!(rows[0].match_points, 0);
    assert_eq!(rows[0].top4_points, 5 + 5 + 10 + 10);
}

#[test]
fn failed_read_aborts_the_whole_standings() {
    for (broken, context) in [
        (Collection::Predictions, "load predictions"),
        (Collection::Top4Predictions, "load top-4 predictions"),
        (Collection::Participants, "load participants"),
    ] {
        let service = PoolService::new(FailingReads {
            inner: seeded_store(),
            broken,
        });
        service.save_rules(&pool_rules()).unwrap();

        let err = service.load_snapshot().unwrap_err();
        assert!(format!("{err:#}").contains(context), "{err:#}");

        let err = service.standings().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains(context), "{message}");
        assert!(message.contains(broken.name()), "{message}");
    }
}

#[test]
fn official_top4_is_replaced_not_duplicated() {
    let service = seeded_service();
    let first = service
        .save_official_top4(ranks(["fra", "arg", "ned", "mex"]))
        .unwrap();
    let second = service
        .save_official_top4(ranks(["arg", "fra", "ned", "mex"]))
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.rank_of("arg"), Some(1));
    assert_eq!(second.rank_of("bra"), None);
}

#[test]
fn rules_can_be_read_back_and_replaced() {
    let service = seeded_service();
    let rules = service.active_rules().unwrap().unwrap();
    assert_eq!(rules.finals.full_time, 5);
    assert_eq!(rules.matrix().unwrap().get(2, 1), 5);

    let mut changed = rules.clone();
    changed.group.outcome = 4;
    let saved = service.save_rules(&changed).unwrap();
    assert_eq!(saved.id, rules.id);
    assert_eq!(service.active_rules().unwrap().unwrap().group.outcome, 4);
}

#[test]
fn rules_with_invalid_matrix_are_rejected() {
    let service = seeded_service();
    let before = service.active_rules().unwrap().unwrap();

    for matrix in [
        json!({"rank_1": {"rank_1": -2}}),
        json!({"rank_1": {"rank_2": "lots"}}),
        json!("not json at all"),
        json!([10, 5, 0, 0]),
    ] {
        let mut bad = before.clone();
        bad.group.outcome = 9;
        bad.points_matrix = Some(matrix);
        let err = service.save_rules(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("invalid points matrix"));
    }
    assert_eq!(service.active_rules().unwrap().unwrap(), before);
}

#[test]
fn store_enforces_unique_prediction_per_fixture() {
    let service = seeded_service();
    service
        .submit_prediction("u1", "m1", entry((0, 0), (1, 1)), at(1, 12))
        .unwrap();
    let err = service
        .store()
        .create(
            Collection::Predictions,
            record(json!({"user": "u1", "match": "m1"})),
        )
        .unwrap_err();
    assert!(err.to_string().contains("unique constraint failed"));

    let filter = Filter::new().eq("user", "u1").eq("match", "m1");
    let found = service
        .store()
        .get_first(Collection::Predictions, &filter)
        .unwrap();
    assert!(found.is_some());
}

#[test]
fn stage_statuses_report_locks() {
    let service = seeded_service();
    let statuses = service.stage_statuses(at(11, 19)).unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].stage, Stage::Group);
    assert!(!statuses[0].editable);
    assert!(statuses[1].editable);
}

#[test]
fn teams_are_listed_by_name() {
    let service = seeded_service();
    let names: Vec<String> = service
        .teams()
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["Argentinië", "Frankrijk", "Mexico", "Nederland"]);
}
