use super::*;
use crate::constants::{hero_lane_y, hero_width, HERO_X, SCOREBOARD_SIZE};
use crate::roster::diff_roster;

impl GameSession {
    /// Applies the roster diff to the hero list. Only called while in the lobby.
    pub(super) fn sync_heroes(&mut self) {
        let diff = diff_roster(
            self.heroes.iter().map(|hero| hero.view.player_id.as_str()),
            &self.roster,
        );
        if diff.is_empty() {
            return;
        }

        for player_id in diff.removed {
            self.heroes.retain(|hero| hero.view.player_id != player_id);
            debug!(player_id = player_id.as_str(), "hero removed");
            self.events.push(RuntimeEvent::HeroRemoved { player_id });
        }

        let mut created = Vec::new();
        for player_id in diff.added {
            let Some(profile) = self.roster.get(&player_id) else {
                continue;
            };
            self.heroes.push(HeroInternal {
                view: HeroView {
                    player_id: player_id.clone(),
                    name: profile.name.clone(),
                    color: profile.color.clone(),
                    score: 0,
                    ready: false,
                    attack_cooldown_until: self.clock,
                    attacking: false,
                    x: HERO_X,
                    y: 0.0,
                    width: 0.0,
                },
            });
            created.push(player_id);
        }

        self.layout_heroes();
        for player_id in created {
            if let Some(hero) = self.hero(&player_id) {
                debug!(player_id = player_id.as_str(), name = hero.name.as_str(), "hero created");
                let hero = hero.clone();
                self.events.push(RuntimeEvent::HeroCreated { hero });
            }
        }
        self.check_all_ready();
    }

    /// Keeps display names and colors current for players still connected.
    /// Disconnected players keep the last profile seen.
    pub(super) fn refresh_hero_profiles(&mut self) {
        for hero in &mut self.heroes {
            let Some(profile) = self.roster.get(&hero.view.player_id) else {
                continue;
            };
            if hero.view.name == profile.name && hero.view.color == profile.color {
                continue;
            }
            hero.view.name = profile.name.clone();
            hero.view.color = profile.color.clone();
            self.events.push(RuntimeEvent::HeroUpdated {
                hero: hero.view.clone(),
            });
        }
    }

    pub(super) fn set_hero_ready(&mut self, hero_idx: usize, ready: bool) {
        let Some(hero) = self.heroes.get_mut(hero_idx) else {
            return;
        };
        if hero.view.ready != ready {
            hero.view.ready = ready;
            self.events.push(RuntimeEvent::HeroUpdated {
                hero: hero.view.clone(),
            });
        }
        self.check_all_ready();
    }

    pub(super) fn check_all_ready(&mut self) {
        if self.step != SessionStep::Intro || self.heroes.is_empty() {
            return;
        }
        if self.heroes.iter().all(|hero| hero.view.ready) {
            self.start_countdown();
        }
    }

    pub(super) fn layout_heroes(&mut self) {
        let count = self.heroes.len();
        let width = hero_width(count);
        let clock = self.clock;
        for (idx, hero) in self.heroes.iter_mut().enumerate() {
            hero.view.x = HERO_X;
            hero.view.y = hero_lane_y(count, idx);
            hero.view.width = width;
            hero.view.attacking = clock < hero.view.attack_cooldown_until;
        }
    }

    pub(super) fn scoreboard(&self) -> Vec<ScoreEntry> {
        let mut ranking = self.ranking();
        ranking.truncate(SCOREBOARD_SIZE);
        ranking
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{new_session, roster_of, started_session};
    use super::*;
    use crate::roster::RosterEntry;

    #[test]
    fn lobby_roster_changes_create_and_remove_heroes() {
        let mut session = new_session(&["Ann", "Bob"]);
        session.take_events();

        let mut roster = session.roster().clone();
        roster.remove("player_1");
        roster.insert("player_3", &RosterEntry::new("Cid", "blue"));
        session.set_roster(roster);

        let ids: Vec<&str> = session.heroes().map(|h| h.player_id.as_str()).collect();
        assert_eq!(ids, vec!["player_2", "player_3"]);
        let events = session.take_events();
        assert!(events.iter().any(|event| matches!(
            event,
            RuntimeEvent::HeroRemoved { player_id } if player_id == "player_1"
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            RuntimeEvent::HeroCreated { hero } if hero.name == "Cid" && hero.score == 0 && !hero.ready
        )));
    }

    #[test]
    fn rejoining_player_starts_fresh() {
        let mut session = new_session(&["Ann"]);
        session.on_input("player_1", PlayerInput::ready(false));
        session.set_roster(Roster::new());
        session.set_roster(roster_of(&["Ann"]));
        let hero = session.hero("player_1").expect("hero recreated");
        assert!(!hero.ready);
        assert_eq!(hero.score, 0);
    }

    #[test]
    fn profiles_follow_roster_even_after_lobby_closes() {
        let mut session = started_session(&["Ann", "Bob"]);
        session.take_events();
        let mut roster = session.roster().clone();
        roster.insert("player_1", &RosterEntry::new("Annie", "#00ff00"));
        roster.remove("player_2");
        session.set_roster(roster);

        let annie = session.hero("player_1").expect("hero kept");
        assert_eq!(annie.name, "Annie");
        assert_eq!(annie.color, "#00ff00");
        let bob = session.hero("player_2").expect("disconnected hero kept");
        assert_eq!(bob.name, "Bob");
        assert!(matches!(
            session.take_events().as_slice(),
            [RuntimeEvent::HeroUpdated { .. }]
        ));
    }

    #[test]
    fn heroes_get_evenly_spaced_lanes_in_creation_order() {
        let mut session = new_session(&["Ann", "Bob", "Cid"]);
        let snapshot = session.build_snapshot(false);
        let lanes: Vec<f64> = snapshot.heroes.iter().map(|h| h.y).collect();
        assert_eq!(lanes, vec![150.0, 300.0, 450.0]);
        assert!(snapshot.heroes.iter().all(|h| h.x == HERO_X));
    }

    #[test]
    fn scoreboard_is_capped() {
        let names: Vec<String> = (0..12).map(|idx| format!("P{idx:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let session = new_session(&refs);
        assert_eq!(session.heroes().count(), 12);
        let board = session.scoreboard();
        assert_eq!(board.len(), SCOREBOARD_SIZE);
        assert_eq!(board[0].name, "P11");
    }
}
