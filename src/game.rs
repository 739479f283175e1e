//! Owns the current session and the roster feed, and swaps in a fresh
//! session when a player asks for a restart from the victory screen.

use tracing::info;

use crate::config::GameRules;
use crate::engine::{GameSession, SessionOptions};
use crate::rng::Rng;
use crate::roster::{Roster, RosterEntry};
use crate::types::{GameSummary, InputOutcome, PlayerInput, SessionStep, SimTime, Snapshot};

#[derive(Clone, Debug)]
pub struct MathGame {
    rules: GameRules,
    roster: Roster,
    seeds: Rng,
    session: GameSession,
    restarts: u32,
}

impl MathGame {
    pub fn new(seed: u32, rules: GameRules) -> Self {
        Self::with_roster(seed, rules, Roster::new())
    }

    pub fn with_roster(seed: u32, rules: GameRules, roster: Roster) -> Self {
        let mut seeds = Rng::new(seed);
        let session = GameSession::new(
            &roster,
            seeds.fork_seed(),
            SessionOptions {
                rules: rules.clone(),
                started_at: 0.0,
            },
        );
        Self {
            rules,
            roster,
            seeds,
            session,
            restarts: 0,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn step(&self) -> SessionStep {
        self.session.step()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn set_roster(&mut self, roster: Roster) {
        self.roster = roster;
        self.session.set_roster(self.roster.clone());
    }

    pub fn upsert_player(&mut self, player_id: &str, entry: &RosterEntry) {
        self.roster.insert(player_id, entry);
        self.session.set_roster(self.roster.clone());
    }

    pub fn remove_player(&mut self, player_id: &str) -> bool {
        if self.roster.remove(player_id).is_none() {
            return false;
        }
        self.session.set_roster(self.roster.clone());
        true
    }

    pub fn on_input(&mut self, player_id: &str, input: PlayerInput) -> InputOutcome {
        let outcome = self.session.on_input(player_id, input);
        if outcome == InputOutcome::RestartRequested {
            info!(player_id, "restart requested");
            self.restart();
        }
        outcome
    }

    /// Discards the finished session and starts a new lobby from the current
    /// roster. Events the old session had not delivered yet are kept.
    pub fn restart(&mut self) {
        let pending = self.session.take_events();
        let mut session = GameSession::new(
            &self.roster,
            self.seeds.fork_seed(),
            SessionOptions {
                rules: self.rules.clone(),
                started_at: self.session.clock(),
            },
        );
        session.prepend_events(pending);
        self.session = session;
        self.restarts += 1;
    }

    pub fn tick(&mut self, now: SimTime) {
        self.session.tick(now);
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        self.session.build_snapshot(include_events)
    }

    /// Final standings, available once the session has reached VICTORY.
    pub fn summary(&self) -> Option<GameSummary> {
        self.session
            .is_finished()
            .then(|| self.session.build_summary())
    }
}
