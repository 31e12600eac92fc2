use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};

use wc26_pool::config::{self, PoolConfig};
use wc26_pool::model::{Phase, Ranking, ScorePair, ScoringRules, StagePoints};
use wc26_pool::outcome::OutcomeCode;
use wc26_pool::pool::{PoolService, PredictionEntry};
use wc26_pool::stage_clock::PhaseWindow;
use wc26_pool::top4_score::PointsMatrix;
use wc26_pool::standings_export::export_standings;
use wc26_pool::store::RecordStore;

const USAGE: &str = "usage: wc26_pool [--db PATH] [--verbose] <command>

commands:
  standings [--export FILE.xlsx]       ranked leaderboard
  stages                               open/locked state of every stage and top-4 phase
  fixtures                             fixtures grouped by stage
  teams                                team ids and names
  predict USER FIXTURE HT FT [1|X|2]   save a match prediction (scores as H-A)
  top4 USER PHASE T1 T2 T3 T4          save a top-4 prediction (phase: pre|post, '-' = none)
  result FIXTURE HT FT                 record an official result
  official T1 T2 T3 T4                 record the official top 4
  rules                                show the active scoring rules
  set-rules HTG FTG TOTOG HTF FTF TOTOF [MATRIX.json]";

struct Cli {
    db: Option<PathBuf>,
    verbose: bool,
    export: Option<PathBuf>,
    command: Vec<String>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = parse_args(std::env::args().skip(1).collect())?;

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let cfg = PoolConfig::from_env()?.with_db_override(cli.db.clone());
    let service = PoolService::new(cfg.open_store()?).with_tie_break(cfg.tie_break);

    let Some((command, args)) = cli.command.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };
    match command.as_str() {
        "standings" => cmd_standings(&service, cli.export.as_ref()),
        "stages" => cmd_stages(&service),
        "fixtures" => cmd_fixtures(&service),
        "teams" => cmd_teams(&service),
        "predict" => cmd_predict(&service, args),
        "top4" => cmd_top4(&service, args),
        "result" => cmd_result(&service, args),
        "official" => cmd_official(&service, args),
        "rules" => cmd_rules(&service),
        "set-rules" => cmd_set_rules(&service, args),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(anyhow!("unknown command {other:?}\n\n{USAGE}")),
    }
}

fn parse_args(args: Vec<String>) -> Result<Cli> {
    let mut cli = Cli {
        db: None,
        verbose: false,
        export: None,
        command: Vec::new(),
    };
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if let Some(path) = arg.strip_prefix("--db=") {
            cli.db = non_blank_path(path);
        } else if arg == "--db" {
            let next = iter.next().context("--db needs a path")?;
            cli.db = non_blank_path(&next);
        } else if let Some(path) = arg.strip_prefix("--export=") {
            cli.export = non_blank_path(path);
        } else if arg == "--export" {
            let next = iter.next().context("--export needs a path")?;
            cli.export = non_blank_path(&next);
        } else if arg == "--verbose" || arg == "-v" {
            cli.verbose = true;
        } else {
            cli.command.push(arg);
        }
    }
    Ok(cli)
}

fn non_blank_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn cmd_standings<S: RecordStore>(service: &PoolService<S>, export: Option<&PathBuf>) -> Result<()> {
    let rows = service.standings()?;
    println!("{:>3}  {:<28} {:>8} {:>6} {:>6}", "#", "Name", "Matches", "Top 4", "Total");
    for (idx, row) in rows.iter().enumerate() {
        println!(
            "{:>3}  {:<28} {:>8} {:>6} {:>6}",
            idx + 1,
            row.display_name,
            row.match_points,
            row.top4_points,
            row.total
        );
    }
    if let Some(path) = export {
        let written = export_standings(path, &rows)?;
        println!("Exported {written} rows to {}", path.display());
    }
    Ok(())
}

fn cmd_stages<S: RecordStore>(service: &PoolService<S>) -> Result<()> {
    let now = Utc::now();
    for status in service.stage_statuses(now)? {
        let deadline = status
            .deadline
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<18} {:>3} fixtures  deadline {:<22} {}",
            status.stage.label(),
            status.fixtures,
            deadline,
            if status.editable { "open" } else { "locked" }
        );
    }
    for status in service.phase_statuses(now)? {
        let window = match status.window {
            PhaseWindow::Scheduled { opens_at, closes_at } => format!(
                "opens {} closes {}",
                window_edge(opens_at),
                window_edge(closes_at)
            ),
            PhaseWindow::Unscheduled => "not scheduled".to_string(),
        };
        println!(
            "top 4 {:<18} {:<40} {}",
            status.phase.as_str(),
            window,
            if status.open { "open" } else { "closed" }
        );
    }
    Ok(())
}

fn cmd_fixtures<S: RecordStore>(service: &PoolService<S>) -> Result<()> {
    for (stage, fixtures) in service.fixtures_by_stage()? {
        println!("{stage}");
        for fixture in fixtures {
            let kickoff = fixture
                .kickoff
                .map(|k| k.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "tbd".to_string());
            let score = match (fixture.full_time, fixture.half_time) {
                (Some(ft), Some(ht)) => format!("{ft} (ht {ht})"),
                (Some(ft), None) => ft.to_string(),
                _ => "-".to_string(),
            };
            println!(
                "  {:<16} {}  {:>18} - {:<18} {}",
                fixture.id,
                kickoff,
                fixture.home_label(),
                fixture.away_label(),
                score
            );
        }
    }
    Ok(())
}

fn cmd_teams<S: RecordStore>(service: &PoolService<S>) -> Result<()> {
    for team in service.teams()? {
        println!(
            "{:<16} {:<5} {}",
            team.id,
            team.code.as_deref().unwrap_or(""),
            team.name
        );
    }
    Ok(())
}

fn cmd_predict<S: RecordStore>(service: &PoolService<S>, args: &[String]) -> Result<()> {
    let [user, fixture, ht, ft, rest @ ..] = args else {
        bail!("predict needs USER FIXTURE HT FT [1|X|2]");
    };
    let mut entry = PredictionEntry::new(score_arg(ht)?, score_arg(ft)?);
    if let Some(raw) = rest.first() {
        let outcome = OutcomeCode::parse(raw).with_context(|| format!("invalid outcome {raw:?}"))?;
        entry = entry.with_outcome(outcome);
    }
    let saved = service.submit_prediction(user, fixture, entry, Utc::now())?;
    println!(
        "Saved {}: ht {} ft {} toto {}",
        saved.fixture_id,
        saved.half_time,
        saved.full_time,
        saved.outcome.map_or("?", OutcomeCode::symbol)
    );
    Ok(())
}

fn cmd_top4<S: RecordStore>(service: &PoolService<S>, args: &[String]) -> Result<()> {
    let [user, phase, teams @ ..] = args else {
        bail!("top4 needs USER PHASE T1 T2 T3 T4");
    };
    let phase = Phase::parse(phase).with_context(|| format!("invalid phase {phase:?}"))?;
    let saved = service.submit_top4(user, phase, ranking_arg(teams)?, Utc::now())?;
    println!("Saved {} top 4 ({})", saved.phase, saved.id);
    Ok(())
}

fn cmd_result<S: RecordStore>(service: &PoolService<S>, args: &[String]) -> Result<()> {
    let [fixture, ht, ft] = args else {
        bail!("result needs FIXTURE HT FT");
    };
    let saved = service.record_result(fixture, score_arg(ht)?, score_arg(ft)?)?;
    println!(
        "Recorded {} {} - {}: {}",
        saved.id,
        saved.home_label(),
        saved.away_label(),
        saved.full_time.map(|s| s.to_string()).unwrap_or_default()
    );
    Ok(())
}

fn cmd_official<S: RecordStore>(service: &PoolService<S>, args: &[String]) -> Result<()> {
    let saved = service.save_official_top4(ranking_arg(args)?)?;
    println!("Saved official top 4 ({})", saved.id);
    Ok(())
}

fn cmd_rules<S: RecordStore>(service: &PoolService<S>) -> Result<()> {
    let Some(rules) = service.active_rules()? else {
        println!("No active scoring rules");
        return Ok(());
    };
    for (label, points) in [("group", rules.group), ("finals", rules.finals)] {
        println!(
            "{label:<7} ht {:>2}  ft {:>2}  toto {:>2}",
            points.half_time, points.full_time, points.outcome
        );
    }
    match rules.matrix() {
        Some(matrix) => {
            for predicted in 1..=4 {
                let cells = (1..=4)
                    .map(|official| format!("{:>3}", matrix.get(predicted, official)))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("rank {predicted}: {cells}");
            }
        }
        None => println!("No usable points matrix"),
    }
    Ok(())
}

fn cmd_set_rules<S: RecordStore>(service: &PoolService<S>, args: &[String]) -> Result<()> {
    let [htg, ftg, totog, htf, ftf, totof, rest @ ..] = args else {
        bail!("set-rules needs HTG FTG TOTOG HTF FTF TOTOF [MATRIX.json]");
    };
    let points_matrix = match rest.first() {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            let value = serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;
            PointsMatrix::parse(&value)
                .with_context(|| format!("invalid points matrix in {path}"))?;
            Some(value)
        }
        None => service.active_rules()?.and_then(|r| r.points_matrix),
    };
    let rules = ScoringRules {
        id: String::new(),
        group: StagePoints {
            half_time: points_arg(htg)?,
            full_time: points_arg(ftg)?,
            outcome: points_arg(totog)?,
        },
        finals: StagePoints {
            half_time: points_arg(htf)?,
            full_time: points_arg(ftf)?,
            outcome: points_arg(totof)?,
        },
        points_matrix,
    };
    let saved = service.save_rules(&rules)?;
    println!("Saved scoring rules ({})", saved.id);
    Ok(())
}

fn window_edge(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn score_arg(raw: &str) -> Result<ScorePair> {
    ScorePair::parse(raw).with_context(|| format!("invalid score {raw:?}, expected H-A"))
}

fn points_arg(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .with_context(|| format!("invalid point value {raw:?}"))
}

fn ranking_arg(teams: &[String]) -> Result<Ranking> {
    if teams.len() != 4 {
        bail!("expected 4 teams, got {}", teams.len());
    }
    let pick = |raw: &String| {
        let trimmed = raw.trim();
        (!trimmed.is_empty() && trimmed != "-").then(|| trimmed.to_string())
    };
    Ok([
        pick(&teams[0]),
        pick(&teams[1]),
        pick(&teams[2]),
        pick(&teams[3]),
    ])
}
