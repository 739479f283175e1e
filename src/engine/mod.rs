use tracing::{debug, info, warn};

use crate::config::GameRules;
use crate::rng::Rng;
use crate::roster::Roster;
use crate::types::{
    GameSummary, HeroView, IgnoreReason, InputOutcome, MonsterView, PlayerInput, RuntimeEvent,
    ScoreEntry, SessionStep, SimTime, Snapshot,
};

mod combat_system;
mod hero_system;
mod monster_system;
mod spawn_system;
mod utils;

use self::utils::compare_rank;

#[derive(Clone, Debug)]
struct HeroInternal {
    view: HeroView,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum MonsterPhase {
    Alive,
    Dying { died_at: SimTime, remove_at: SimTime },
}

#[derive(Clone, Debug)]
struct MonsterInternal {
    view: MonsterView,
    phase: MonsterPhase,
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub rules: GameRules,
    /// Clock value the session starts from. A restarted session continues
    /// from the clock of the one it replaces.
    pub started_at: SimTime,
}

/// One play of the game, from lobby to victory. Owns every hero and monster.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub rules: GameRules,

    seed: u32,
    rng: Rng,
    roster: Roster,
    heroes: Vec<HeroInternal>,
    monsters: Vec<MonsterInternal>,
    events: Vec<RuntimeEvent>,

    step: SessionStep,
    clock: SimTime,
    countdown_started_at: SimTime,
    game_started_at: Option<SimTime>,
    next_spawn_at: SimTime,
    tick_counter: u64,
    next_id_counter: u64,
}

impl GameSession {
    pub fn new(roster: &Roster, seed: u32, options: SessionOptions) -> Self {
        let mut session = Self {
            rules: options.rules,
            seed,
            rng: Rng::new(seed),
            roster: roster.clone(),
            heroes: Vec::new(),
            monsters: Vec::new(),
            events: vec![RuntimeEvent::StateChanged {
                step: SessionStep::Intro,
            }],
            step: SessionStep::Intro,
            clock: options.started_at,
            countdown_started_at: options.started_at,
            game_started_at: None,
            next_spawn_at: options.started_at,
            tick_counter: 0,
            next_id_counter: 1,
        };
        info!(seed, players = roster.len(), "session created");
        session.sync_heroes();
        session
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn step(&self) -> SessionStep {
        self.step
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    pub fn is_finished(&self) -> bool {
        self.step == SessionStep::Victory
    }

    pub fn game_started_at(&self) -> Option<SimTime> {
        self.game_started_at
    }

    pub fn next_spawn_at(&self) -> SimTime {
        self.next_spawn_at
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn has_hero(&self, player_id: &str) -> bool {
        self.hero_index(player_id).is_some()
    }

    pub fn hero(&self, player_id: &str) -> Option<&HeroView> {
        self.hero_index(player_id).map(|idx| &self.heroes[idx].view)
    }

    pub fn heroes(&self) -> impl Iterator<Item = &HeroView> {
        self.heroes.iter().map(|hero| &hero.view)
    }

    pub fn monsters(&self) -> impl Iterator<Item = &MonsterView> {
        self.monsters.iter().map(|monster| &monster.view)
    }

    pub fn live_monster_count(&self) -> usize {
        self.monsters
            .iter()
            .filter(|monster| monster.phase == MonsterPhase::Alive)
            .count()
    }

    /// Replaces the authoritative player list. Heroes follow it only in the lobby.
    pub fn set_roster(&mut self, roster: Roster) {
        self.roster = roster;
        self.refresh_hero_profiles();
        if self.step == SessionStep::Intro {
            self.sync_heroes();
        }
    }

    pub fn on_input(&mut self, player_id: &str, input: PlayerInput) -> InputOutcome {
        let Some(hero_idx) = self.hero_index(player_id) else {
            debug!(player_id, "input from unknown player ignored");
            return InputOutcome::Ignored(IgnoreReason::UnknownPlayer);
        };
        if input.is_empty() {
            return InputOutcome::Ignored(IgnoreReason::Empty);
        }

        let mut outcome = InputOutcome::Ignored(IgnoreReason::WrongStep);
        if let Some(attack) = input.attack {
            if self.step == SessionStep::Game {
                outcome = self.try_attack(hero_idx, attack);
            }
        }
        if let Some(ready) = input.ready {
            if self.step == SessionStep::Intro {
                self.set_hero_ready(hero_idx, ready);
                outcome = InputOutcome::Applied;
            }
        }
        if input.restart == Some(true) && self.step == SessionStep::Victory {
            outcome = InputOutcome::RestartRequested;
        }
        if let InputOutcome::Ignored(reason) = outcome {
            debug!(player_id, ?reason, step = self.step.as_str(), "input ignored");
        }
        outcome
    }

    /// Advances the session to `now`. Times below the current clock are dropped.
    pub fn tick(&mut self, now: SimTime) {
        if !now.is_finite() || now < self.clock {
            warn!(now, clock = self.clock, "tick time regressed; ignored");
            return;
        }
        let dt = now - self.clock;
        self.clock = now;
        self.tick_counter += 1;

        match self.step {
            SessionStep::Intro => {
                self.sync_heroes();
                self.check_all_ready();
            }
            SessionStep::Countdown => {
                if self.clock - self.countdown_started_at > self.rules.countdown_secs {
                    self.start_game();
                }
            }
            SessionStep::Game => {
                self.update_monsters(dt);
                self.maybe_spawn_monster();
                let started_at = self.game_started_at.unwrap_or(self.clock);
                if self.clock - started_at > self.rules.game_duration_secs {
                    self.set_step(SessionStep::Victory);
                }
            }
            SessionStep::Victory => {}
        }
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        self.layout_heroes();
        let clock = self.clock;
        Snapshot {
            tick: self.tick_counter,
            step: self.step,
            clock,
            time_left_secs: self.time_left_secs(),
            heroes: self.heroes.iter().map(|hero| hero.view.clone()).collect(),
            monsters: self
                .monsters
                .iter()
                .map(|monster| {
                    let mut view = monster.view.clone();
                    view.opacity = monster_system::opacity(monster.phase, clock);
                    view
                })
                .collect(),
            scoreboard: match self.step {
                SessionStep::Game | SessionStep::Victory => self.scoreboard(),
                _ => Vec::new(),
            },
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> GameSummary {
        let ranking = self.ranking();
        GameSummary {
            duration_secs: self
                .game_started_at
                .map(|started_at| self.clock - started_at)
                .unwrap_or(0.0),
            winner: ranking.first().cloned(),
            ranking,
        }
    }

    /// Heroes by score descending, then display name descending, then id.
    pub fn ranking(&self) -> Vec<ScoreEntry> {
        let mut ranking: Vec<ScoreEntry> = self
            .heroes
            .iter()
            .map(|hero| ScoreEntry {
                player_id: hero.view.player_id.clone(),
                name: hero.view.name.clone(),
                score: hero.view.score,
            })
            .collect();
        ranking.sort_by(compare_rank);
        ranking
    }

    pub fn winner(&self) -> Option<ScoreEntry> {
        self.ranking().into_iter().next()
    }

    /// Hands pending events to the caller without building a snapshot.
    pub fn take_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn prepend_events(&mut self, mut earlier: Vec<RuntimeEvent>) {
        earlier.append(&mut self.events);
        self.events = earlier;
    }

    fn time_left_secs(&self) -> Option<f64> {
        let started_at = self.game_started_at?;
        let elapsed = self.clock - started_at;
        Some((self.rules.game_duration_secs - elapsed).max(0.0))
    }

    fn start_countdown(&mut self) {
        self.countdown_started_at = self.clock;
        self.set_step(SessionStep::Countdown);
    }

    fn start_game(&mut self) {
        self.game_started_at = Some(self.clock);
        self.next_spawn_at = self.clock + self.rules.first_spawn_delay_secs;
        self.set_step(SessionStep::Game);
    }

    fn set_step(&mut self, step: SessionStep) {
        if self.step == step {
            return;
        }
        self.step = step;
        self.events.push(RuntimeEvent::StateChanged { step });
        if step == SessionStep::Victory {
            let winner = self.winner();
            info!(
                clock = self.clock,
                winner = winner.as_ref().map(|entry| entry.name.as_str()),
                score = winner.as_ref().map(|entry| entry.score),
                "session finished"
            );
        } else {
            info!(clock = self.clock, step = step.as_str(), "session step changed");
        }
    }

    fn hero_index(&self, player_id: &str) -> Option<usize> {
        self.heroes
            .iter()
            .position(|hero| hero.view.player_id == player_id)
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}_{}", self.next_id_counter);
        self.next_id_counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterEntry;

    pub(super) fn roster_of(names: &[&str]) -> Roster {
        Roster::from_entries(
            names
                .iter()
                .enumerate()
                .map(|(idx, name)| (format!("player_{}", idx + 1), RosterEntry::new(name, "#123456"))),
        )
    }

    pub(super) fn new_session(names: &[&str]) -> GameSession {
        GameSession::new(&roster_of(names), 1234, SessionOptions::default())
    }

    /// Readies every hero and runs the countdown so the session sits at the
    /// start of GAME with `game_started_at == clock`.
    pub(super) fn started_session(names: &[&str]) -> GameSession {
        let mut session = new_session(names);
        let ids: Vec<String> = session.heroes().map(|h| h.player_id.clone()).collect();
        for id in &ids {
            session.on_input(id, PlayerInput::ready(true));
        }
        assert_eq!(session.step(), SessionStep::Countdown);
        session.tick(session.rules.countdown_secs + 1.0);
        assert_eq!(session.step(), SessionStep::Game);
        session
    }

    fn state_changes(events: &[RuntimeEvent]) -> Vec<SessionStep> {
        events
            .iter()
            .filter_map(|event| match event {
                RuntimeEvent::StateChanged { step } => Some(*step),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn new_session_reports_intro_and_creates_heroes_in_join_order() {
        let mut session = new_session(&["Ann", "Bob", "Cid"]);
        assert_eq!(session.step(), SessionStep::Intro);
        let names: Vec<&str> = session.heroes().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "Cid"]);
        assert!(session.heroes().all(|h| h.score == 0 && !h.ready));
        let snapshot = session.build_snapshot(true);
        assert_eq!(state_changes(&snapshot.events), vec![SessionStep::Intro]);
    }

    #[test]
    fn countdown_starts_only_when_every_hero_is_ready() {
        let mut session = new_session(&["Ann", "Bob", "Cid"]);
        session.take_events();
        session.on_input("player_1", PlayerInput::ready(true));
        session.on_input("player_2", PlayerInput::ready(true));
        session.on_input("player_3", PlayerInput::ready(false));
        session.tick(0.5);
        assert_eq!(session.step(), SessionStep::Intro);

        session.on_input("player_3", PlayerInput::ready(true));
        assert_eq!(session.step(), SessionStep::Countdown);
        session.on_input("player_3", PlayerInput::ready(true));
        session.tick(0.6);
        let events = session.take_events();
        assert_eq!(state_changes(&events), vec![SessionStep::Countdown]);
    }

    #[test]
    fn empty_lobby_never_counts_down() {
        let mut session = new_session(&["Ann"]);
        session.set_roster(Roster::new());
        session.tick(1.0);
        session.tick(10.0);
        assert_eq!(session.step(), SessionStep::Intro);
        assert_eq!(session.heroes().count(), 0);
    }

    #[test]
    fn leaving_unready_hero_releases_countdown() {
        let mut session = new_session(&["Ann", "Bob"]);
        session.on_input("player_1", PlayerInput::ready(true));
        let mut roster = session.roster().clone();
        roster.remove("player_2");
        session.set_roster(roster);
        assert_eq!(session.step(), SessionStep::Countdown);
    }

    #[test]
    fn countdown_leads_to_game_with_first_spawn_scheduled() {
        let mut session = new_session(&["Ann"]);
        session.on_input("player_1", PlayerInput::ready(true));
        session.tick(2.0);
        session.tick(3.0);
        assert_eq!(session.step(), SessionStep::Countdown);
        session.tick(3.05);
        assert_eq!(session.step(), SessionStep::Game);
        assert_eq!(session.game_started_at(), Some(3.05));
        assert_eq!(session.next_spawn_at(), 3.05 + 3.0);
    }

    #[test]
    fn victory_requires_strictly_more_than_game_duration() {
        let mut session = started_session(&["Ann"]);
        let started_at = session.game_started_at().expect("game started");
        session.tick(started_at + 180.0);
        assert_eq!(session.step(), SessionStep::Game);
        session.tick(started_at + 180.01);
        assert_eq!(session.step(), SessionStep::Victory);
    }

    #[test]
    fn victory_summary_names_the_winner() {
        let mut session = started_session(&["Ann", "Bob"]);
        session.heroes[0].view.score = 4;
        session.heroes[1].view.score = 9;
        let started_at = session.game_started_at().expect("game started");
        session.tick(started_at + 200.0);
        let summary = session.build_summary();
        assert_eq!(summary.winner.map(|w| w.name), Some("Bob".to_string()));
        assert_eq!(summary.ranking.len(), 2);
        assert!((summary.duration_secs - 200.0).abs() < 1e-9);
    }

    #[test]
    fn tied_scores_go_to_descending_name() {
        let mut session = new_session(&["Ann", "Bob"]);
        session.heroes[0].view.score = 10;
        session.heroes[1].view.score = 10;
        assert_eq!(session.winner().map(|w| w.name), Some("Bob".to_string()));
    }

    #[test]
    fn inputs_outside_their_step_are_ignored() {
        let mut session = new_session(&["Ann"]);
        assert_eq!(
            session.on_input("player_1", PlayerInput::attack(3)),
            InputOutcome::Ignored(IgnoreReason::WrongStep)
        );
        assert_eq!(
            session.on_input("player_1", PlayerInput::restart()),
            InputOutcome::Ignored(IgnoreReason::WrongStep)
        );
        assert_eq!(
            session.on_input("nobody", PlayerInput::ready(true)),
            InputOutcome::Ignored(IgnoreReason::UnknownPlayer)
        );
        assert_eq!(
            session.on_input("player_1", PlayerInput::default()),
            InputOutcome::Ignored(IgnoreReason::Empty)
        );

        let mut started = started_session(&["Ann", "Bob"]);
        assert_eq!(
            started.on_input("player_1", PlayerInput::ready(false)),
            InputOutcome::Ignored(IgnoreReason::WrongStep)
        );
        assert!(started.hero("player_1").is_some_and(|h| h.ready));
    }

    #[test]
    fn restart_is_requested_only_in_victory() {
        let mut session = started_session(&["Ann"]);
        assert_eq!(
            session.on_input("player_1", PlayerInput::restart()),
            InputOutcome::Ignored(IgnoreReason::WrongStep)
        );
        let started_at = session.game_started_at().expect("game started");
        session.tick(started_at + 181.0);
        assert_eq!(
            session.on_input("player_1", PlayerInput::restart()),
            InputOutcome::RestartRequested
        );
    }

    #[test]
    fn heroes_are_frozen_once_the_lobby_closes() {
        let mut session = started_session(&["Ann", "Bob"]);
        let mut roster = roster_of(&["Ann"]);
        roster.insert("player_9", &RosterEntry::new("Late", "red"));
        session.set_roster(roster);
        session.tick(session.clock() + 1.0);
        let ids: Vec<&str> = session.heroes().map(|h| h.player_id.as_str()).collect();
        assert_eq!(ids, vec!["player_1", "player_2"]);
    }

    #[test]
    fn clock_regressions_are_ignored() {
        let mut session = new_session(&["Ann"]);
        session.tick(5.0);
        session.tick(4.0);
        session.tick(f64::NAN);
        assert_eq!(session.clock(), 5.0);
    }

    #[test]
    fn snapshot_drains_events_only_when_requested() {
        let mut session = new_session(&["Ann"]);
        let quiet = session.build_snapshot(false);
        assert!(quiet.events.is_empty());
        let loud = session.build_snapshot(true);
        assert!(!loud.events.is_empty());
        let again = session.build_snapshot(true);
        assert!(again.events.is_empty());
    }

    #[test]
    fn snapshot_reports_time_left_and_scoreboard_during_game() {
        let mut session = started_session(&["Ann", "Bob"]);
        let started_at = session.game_started_at().expect("game started");
        session.tick(started_at + 30.0);
        let snapshot = session.build_snapshot(false);
        assert_eq!(snapshot.step, SessionStep::Game);
        assert!(snapshot
            .time_left_secs
            .is_some_and(|left| (left - 150.0).abs() < 1e-9));
        assert_eq!(snapshot.scoreboard.len(), 2);
    }

    #[test]
    fn same_seed_produces_same_progression() {
        let mut a = started_session(&["Ann", "Bob"]);
        let mut b = started_session(&["Ann", "Bob"]);
        let base = a.clock();
        for frame in 1..600 {
            let now = base + frame as f64 / 60.0;
            a.tick(now);
            b.tick(now);
        }
        let left = a.build_snapshot(false);
        let right = b.build_snapshot(false);
        assert_eq!(left.monsters, right.monsters);
    }

    #[test]
    fn state_changed_event_serializes_with_screaming_step() {
        let event = RuntimeEvent::StateChanged {
            step: SessionStep::Countdown,
        };
        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["step"], "COUNTDOWN");
    }
}
