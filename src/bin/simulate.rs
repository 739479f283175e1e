use clap::Parser;
use math_party_server::config::GameRules;
use math_party_server::constants::{FPS, SCOREBOARD_SIZE};
use math_party_server::game::MathGame;
use math_party_server::rng::Rng;
use math_party_server::roster::{Roster, RosterEntry};
use math_party_server::server_utils::normalize_player_count;
use math_party_server::types::{
    InputOutcome, PlayerInput, RuntimeEvent, ScoreEntry, SessionStep, Snapshot,
};
use rand::Rng as _;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const BOT_COLORS: [&str; 6] = ["red", "blue", "green", "orange", "purple", "#00cccc"];
const BOT_RANDOM_ATTACK_CHANCE: f64 = 0.15;
const BOT_MIN_THINK_SECS: f64 = 0.3;
const BOT_MAX_THINK_SECS: f64 = 1.2;
const SAFETY_MARGIN_SECS: f64 = 30.0;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    players: Option<i64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Game length in seconds.
    #[arg(long)]
    duration: Option<f64>,
    /// JSON rules file; missing fields keep their defaults.
    #[arg(long)]
    rules: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    players: usize,
    #[serde(rename = "durationSecs")]
    duration_secs: f64,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    players: usize,
    #[serde(rename = "durationSecs")]
    duration_secs: f64,
    spawned: u32,
    killed: u32,
    escaped: u32,
    decayed: u32,
    hits: u32,
    misses: u32,
    ranking: Vec<ScoreEntry>,
    winner: Option<ScoreEntry>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationSecs")]
    average_duration_secs: f64,
    #[serde(rename = "averageTopScore")]
    average_top_score: f64,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug)]
struct Bot {
    player_id: String,
    next_think_at: f64,
}

#[derive(Debug, Default)]
struct Counters {
    spawned: u32,
    killed: u32,
    escaped: u32,
    decayed: u32,
    hits: u32,
    misses: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let rules = match GameRules::load_or_default(cli.rules.as_deref()) {
        Ok(rules) => rules,
        Err(err) => {
            error!(%err, "failed to load game rules");
            std::process::exit(2);
        }
    };
    let scenarios = resolve_scenarios(&cli, &rules);
    let started_at = chrono::Utc::now();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, started_at.timestamp_millis()));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        info!(
            match_id = match_id.as_str(),
            scenario = scenario.name.as_str(),
            seed = scenario.seed,
            players = scenario.players,
            duration_secs = scenario.duration_secs,
            "scenario started"
        );
        let scenario_run = run_scenario(&scenario, &rules);

        for anomaly in &scenario_run.anomaly_records {
            warn!(
                match_id = match_id.as_str(),
                scenario = scenario.name.as_str(),
                seed = scenario.seed,
                tick = anomaly.tick,
                message = anomaly.message.as_str(),
                "anomaly detected"
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();

        info!(
            match_id = match_id.as_str(),
            scenario = scenario.name.as_str(),
            tick = scenario_run.finished_tick,
            winner = scenario_run
                .result
                .winner
                .as_ref()
                .map(|entry| entry.name.as_str()),
            killed = scenario_run.result.killed,
            anomalies = scenario_run.anomaly_records.len(),
            "scenario finished"
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(%err, "failed to serialize scenario result"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at.to_rfc3339(),
        chrono::Utc::now().to_rfc3339(),
        scenario_results,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            error!(
                match_id = match_id.as_str(),
                path = %path.display(),
                %err,
                "summary write failed"
            );
            std::process::exit(2);
        }
    }

    info!(
        match_id = match_id.as_str(),
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        average_duration_secs = summary.average_duration_secs,
        summary_out = cli.summary_out.as_ref().map(|path| path.display().to_string()),
        "run finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario, rules: &GameRules) -> ScenarioRunResult {
    let mut bots: Vec<Bot> = (0..scenario.players)
        .map(|idx| Bot {
            player_id: format!("player_{}", idx + 1),
            next_think_at: 0.0,
        })
        .collect();
    let roster = Roster::from_entries(bots.iter().enumerate().map(|(idx, bot)| {
        (
            bot.player_id.clone(),
            RosterEntry::new(
                &format!("Bot-{:02}", idx + 1),
                BOT_COLORS[idx % BOT_COLORS.len()],
            ),
        )
    }));

    let rules = rules.clone().with_duration(scenario.duration_secs);
    let frame_limit = ((rules.countdown_secs + rules.game_duration_secs + SAFETY_MARGIN_SECS)
        * f64::from(FPS)) as u64;
    let mut game = MathGame::with_roster(scenario.seed, rules, roster);
    let mut bot_rng = Rng::new(scenario.seed ^ 0x5eed_b07);

    for bot in &bots {
        game.on_input(&bot.player_id, PlayerInput::ready(true));
    }

    let mut counters = Counters::default();
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut scores: HashMap<String, u32> = HashMap::new();
    let mut last_tick = 0u64;
    let mut frame = 0u64;

    while game.step() != SessionStep::Victory {
        frame += 1;
        let now = frame as f64 / f64::from(FPS);
        game.tick(now);

        let mut reachable_attacks = HashSet::new();
        if game.step() == SessionStep::Game {
            for bot in &mut bots {
                if now < bot.next_think_at {
                    continue;
                }
                bot.next_think_at = now + bot_rng.range(BOT_MIN_THINK_SECS, BOT_MAX_THINK_SECS);
                let values: Vec<i32> = game
                    .session()
                    .monsters()
                    .filter(|monster| monster.alive)
                    .map(|monster| monster.value)
                    .collect();
                let Some((attack, reachable)) = choose_attack(&mut bot_rng, &values) else {
                    continue;
                };
                let outcome = game.on_input(&bot.player_id, PlayerInput::attack(attack));
                if reachable && outcome == InputOutcome::Applied {
                    reachable_attacks.insert((bot.player_id.clone(), attack));
                }
            }
        }

        let snapshot = game.build_snapshot(true);
        last_tick = snapshot.tick;
        let mut found = collect_snapshot_anomalies(&snapshot, &mut scores);
        for event in &snapshot.events {
            match event {
                RuntimeEvent::MonsterSpawned { .. } => counters.spawned += 1,
                RuntimeEvent::MonsterKilled { .. } => counters.killed += 1,
                RuntimeEvent::MonsterEscaped { .. } => counters.escaped += 1,
                RuntimeEvent::MonsterDecayed { .. } => counters.decayed += 1,
                RuntimeEvent::AttackLanded { .. } => counters.hits += 1,
                RuntimeEvent::AttackMissed { player_id, attack } => {
                    counters.misses += 1;
                    if reachable_attacks.contains(&(player_id.clone(), *attack)) {
                        found.push(format!("reachable attack {attack} missed"));
                    }
                }
                _ => {}
            }
        }
        for message in found {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }

        if frame > frame_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "frame safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = game.session().build_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            players: scenario.players,
            duration_secs: (summary.duration_secs * 100.0).round() / 100.0,
            spawned: counters.spawned,
            killed: counters.killed,
            escaped: counters.escaped,
            decayed: counters.decayed,
            hits: counters.hits,
            misses: counters.misses,
            ranking: summary.ranking,
            winner: summary.winner,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

/// Usually the sum of a random non-empty subset of the live values; now and
/// then a random number that may not be reachable. The flag says whether the
/// attack is a known subset sum.
fn choose_attack(rng: &mut Rng, values: &[i32]) -> Option<(i64, bool)> {
    if values.is_empty() {
        return None;
    }
    if rng.chance(BOT_RANDOM_ATTACK_CHANCE) {
        return Some((i64::from(rng.int(1, 20)), false));
    }
    let mut attack: i64 = values
        .iter()
        .filter(|_| rng.chance(0.35))
        .map(|value| i64::from(*value))
        .sum();
    if attack == 0 {
        attack = i64::from(values[rng.pick_index(values.len())]);
    }
    Some((attack, true))
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, scores: &mut HashMap<String, u32>) -> Vec<String> {
    let mut anomalies = Vec::new();

    for hero in &snapshot.heroes {
        let previous = scores.insert(hero.player_id.clone(), hero.score);
        if previous.is_some_and(|previous| previous > hero.score) {
            anomalies.push(format!("score decreased: {}", hero.player_id));
        }
    }

    let mut values_by_id = HashMap::new();
    for monster in &snapshot.monsters {
        values_by_id.insert(monster.id.as_str(), i64::from(monster.value));
        if !(1..=9).contains(&monster.value) {
            anomalies.push(format!("monster value out of range: {}", monster.id));
        }
        if monster.hp > monster.max_hp {
            anomalies.push(format!("monster hp above max: {}", monster.id));
        }
        if monster.alive == (monster.hp == 0) {
            anomalies.push(format!("monster alive flag disagrees with hp: {}", monster.id));
        }
        if !(0.0..=1.0).contains(&monster.opacity) || !monster.x.is_finite() {
            anomalies.push(format!("monster presentation invalid: {}", monster.id));
        }
        let unique: HashSet<&String> = monster.attackers.iter().collect();
        if unique.len() != monster.attackers.len() {
            anomalies.push(format!("duplicate attacker: {}", monster.id));
        }
    }

    for event in &snapshot.events {
        if let RuntimeEvent::AttackLanded {
            attack,
            monster_ids,
            ..
        } = event
        {
            let values: Option<Vec<i64>> = monster_ids
                .iter()
                .map(|id| values_by_id.get(id.as_str()).copied())
                .collect();
            if let Some(values) = values {
                let sum: i64 = values.iter().sum();
                if sum != *attack {
                    anomalies.push(format!("attack {attack} landed on sum {sum}"));
                }
            }
        }
    }

    if snapshot.scoreboard.len() > SCOREBOARD_SIZE {
        anomalies.push(format!("scoreboard too long: {}", snapshot.scoreboard.len()));
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli, rules: &GameRules) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| rand::rng().random()));
    let duration_secs = cli
        .duration
        .filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(rules.game_duration_secs);

    if cli.single || cli.players.is_some() || cli.duration.is_some() {
        let players = normalize_player_count(cli.players);
        return vec![Scenario {
            name: format!("custom-p{players}"),
            players,
            duration_secs,
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check-p2".to_string(),
            players: 2,
            duration_secs: 60.0,
            seed,
        },
        Scenario {
            name: "party-check-p6".to_string(),
            players: 6,
            duration_secs,
            seed: normalize_seed(u64::from(seed) + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let (average_duration_secs, average_top_score) = if scenario_count == 0 {
        (0.0, 0.0)
    } else {
        let total_duration: f64 = scenarios.iter().map(|s| s.duration_secs).sum();
        let total_top: u32 = scenarios
            .iter()
            .map(|s| s.winner.as_ref().map(|w| w.score).unwrap_or(0))
            .sum();
        (
            total_duration / scenario_count as f64,
            f64::from(total_top) / scenario_count as f64,
        )
    };
    RunSummary {
        match_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_duration_secs,
        average_top_score,
        scenarios,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
