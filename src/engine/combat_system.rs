use super::*;
use crate::combat::{attack_score, find_combination, Candidate};

impl GameSession {
    pub(super) fn try_attack(&mut self, hero_idx: usize, attack: i64) -> InputOutcome {
        let clock = self.clock;
        let Some(hero) = self.heroes.get(hero_idx) else {
            return InputOutcome::Ignored(IgnoreReason::UnknownPlayer);
        };
        if clock < hero.view.attack_cooldown_until {
            return InputOutcome::Ignored(IgnoreReason::CoolingDown);
        }
        let player_id = hero.view.player_id.clone();

        let candidates: Vec<Candidate> = self
            .monsters
            .iter()
            .map(|monster| Candidate {
                value: monster.view.value,
                position_x: monster.view.x,
                alive: monster.phase == MonsterPhase::Alive,
            })
            .collect();

        let Some(chain) = find_combination(attack, &candidates) else {
            self.heroes[hero_idx].view.attack_cooldown_until = clock + self.rules.miss_cooldown_secs;
            debug!(player_id = player_id.as_str(), attack, "attack missed");
            self.events.push(RuntimeEvent::AttackMissed { player_id, attack });
            return InputOutcome::Applied;
        };

        let alive_in_set = chain
            .iter()
            .filter(|idx| self.monsters[**idx].phase == MonsterPhase::Alive)
            .count();
        let already_attacked = chain
            .iter()
            .filter(|idx| self.monsters[**idx].view.attackers.contains(&player_id))
            .count();
        let gained = attack_score(alive_in_set, already_attacked);

        self.events.push(RuntimeEvent::AttackLanded {
            player_id: player_id.clone(),
            attack,
            monster_ids: chain
                .iter()
                .map(|idx| self.monsters[*idx].view.id.clone())
                .collect(),
            gained,
        });

        let decay = self.rules.monster_decay_secs;
        for idx in chain {
            let monster = &mut self.monsters[idx];
            if !monster.view.attackers.contains(&player_id) {
                monster.view.attackers.push(player_id.clone());
            }
            monster.view.hp = monster.view.hp.saturating_sub(1);
            if monster.view.hp == 0 {
                monster.phase = monster_system::dying(clock, decay);
                monster.view.alive = false;
                debug!(monster_id = monster.view.id.as_str(), by = player_id.as_str(), "monster killed");
                self.events.push(RuntimeEvent::MonsterKilled {
                    monster: monster.view.clone(),
                    by: player_id.clone(),
                });
            } else {
                self.events.push(RuntimeEvent::MonsterHit {
                    monster: monster.view.clone(),
                    by: player_id.clone(),
                });
            }
        }

        let hero = &mut self.heroes[hero_idx].view;
        hero.attack_cooldown_until = clock + self.rules.attack_cooldown_secs;
        if gained > 0 {
            hero.score = hero.score.saturating_add(gained);
            self.events.push(RuntimeEvent::ScoreChanged {
                player_id: player_id.clone(),
                score: hero.score,
            });
        }
        debug!(player_id = player_id.as_str(), attack, gained, "attack landed");
        InputOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::started_session;
    use super::*;
    use proptest::prelude::*;

    /// Places monsters with the given values at increasing x, leftmost first.
    fn place(session: &mut GameSession, values: &[i32]) -> Vec<String> {
        let mut ids = Vec::new();
        for (idx, value) in values.iter().enumerate() {
            let id = session.spawn_monster();
            let monster = session
                .monsters
                .iter_mut()
                .find(|monster| monster.view.id == id)
                .expect("monster just spawned");
            monster.view.value = *value;
            monster.view.x = 300.0 + idx as f64 * 50.0;
            ids.push(id);
        }
        session.take_events();
        ids
    }

    fn monster<'a>(session: &'a GameSession, id: &str) -> &'a MonsterView {
        session
            .monsters()
            .find(|monster| monster.id == id)
            .expect("monster present")
    }

    #[test]
    fn exact_sum_destroys_the_first_combination_found() {
        let mut session = started_session(&["Ann"]);
        let ids = place(&mut session, &[2, 3, 4]);
        assert_eq!(
            session.on_input("player_1", PlayerInput::attack(5)),
            InputOutcome::Applied
        );
        assert!(!monster(&session, &ids[0]).alive);
        assert!(!monster(&session, &ids[1]).alive);
        assert!(monster(&session, &ids[2]).alive);
        assert_eq!(session.live_monster_count(), 1);
        assert_eq!(session.hero("player_1").map(|h| h.score), Some(3));

        let events = session.take_events();
        assert!(events.iter().any(|event| matches!(
            event,
            RuntimeEvent::AttackLanded { monster_ids, gained: 3, .. } if *monster_ids == ids[..2]
        )));
        let killed = events
            .iter()
            .filter(|event| matches!(event, RuntimeEvent::MonsterKilled { .. }))
            .count();
        assert_eq!(killed, 2);
    }

    #[test]
    fn miss_applies_the_longer_cooldown() {
        let mut session = started_session(&["Ann"]);
        place(&mut session, &[2, 3]);
        let clock = session.clock();
        session.on_input("player_1", PlayerInput::attack(4));
        let hero = session.hero("player_1").expect("hero");
        assert_eq!(hero.attack_cooldown_until, clock + session.rules.miss_cooldown_secs);
        assert_eq!(hero.score, 0);
        assert_eq!(session.live_monster_count(), 2);
        assert!(matches!(
            session.take_events().as_slice(),
            [RuntimeEvent::AttackMissed { attack: 4, .. }]
        ));
    }

    #[test]
    fn attacks_during_cooldown_are_ignored() {
        let mut session = started_session(&["Ann"]);
        place(&mut session, &[2, 3, 4]);
        session.on_input("player_1", PlayerInput::attack(2));
        assert_eq!(
            session.on_input("player_1", PlayerInput::attack(3)),
            InputOutcome::Ignored(IgnoreReason::CoolingDown)
        );
        let now = session.clock() + session.rules.attack_cooldown_secs;
        session.tick(now);
        assert_eq!(
            session.on_input("player_1", PlayerInput::attack(3)),
            InputOutcome::Applied
        );
    }

    #[test]
    fn repeat_attacks_on_a_survivor_are_penalized_once_per_monster() {
        let mut session = started_session(&["Ann", "Bob", "Cid"]);
        let ids = place(&mut session, &[7]);
        let cooldown = session.rules.attack_cooldown_secs;

        session.on_input("player_1", PlayerInput::attack(7));
        assert_eq!(session.hero("player_1").map(|h| h.score), Some(1));
        let now = session.clock() + cooldown;
        session.tick(now);

        session.on_input("player_1", PlayerInput::attack(7));
        assert_eq!(session.hero("player_1").map(|h| h.score), Some(1));
        assert_eq!(monster(&session, &ids[0]).attackers, vec!["player_1".to_string()]);
        assert_eq!(monster(&session, &ids[0]).hp, 1);

        let now = session.clock() + cooldown;
        session.tick(now);
        session.on_input("player_1", PlayerInput::attack(7));
        assert_eq!(session.hero("player_1").map(|h| h.score), Some(1));
        assert_eq!(monster(&session, &ids[0]).attackers.len(), 1);
        assert!(!monster(&session, &ids[0]).alive);
    }

    #[test]
    fn shared_monster_takes_one_hit_per_hero() {
        let mut session = started_session(&["Ann", "Bob"]);
        let ids = place(&mut session, &[6]);
        session.on_input("player_1", PlayerInput::attack(6));
        assert!(monster(&session, &ids[0]).alive);
        session.on_input("player_2", PlayerInput::attack(6));
        let killed = monster(&session, &ids[0]);
        assert!(!killed.alive);
        assert_eq!(killed.hp, 0);
        assert_eq!(killed.attackers, vec!["player_1".to_string(), "player_2".to_string()]);
        assert_eq!(session.hero("player_2").map(|h| h.score), Some(1));
    }

    #[test]
    fn dying_monsters_cannot_be_hit_again() {
        let mut session = started_session(&["Ann", "Bob"]);
        place(&mut session, &[5]);
        session.on_input("player_1", PlayerInput::attack(5));
        session.on_input("player_2", PlayerInput::attack(5));
        let now = session.clock() + session.rules.miss_cooldown_secs;
        session.tick(now);
        session.on_input("player_1", PlayerInput::attack(5));
        assert_eq!(session.hero("player_1").map(|h| h.score), Some(1));
        assert!(session
            .take_events()
            .iter()
            .any(|event| matches!(event, RuntimeEvent::AttackMissed { .. })));
    }

    proptest! {
        #[test]
        fn scores_never_decrease(
            values in proptest::collection::vec(1i32..=9, 1..8),
            attacks in proptest::collection::vec((0usize..3, -2i64..30), 1..40),
        ) {
            let mut session = started_session(&["Ann", "Bob", "Cid"]);
            place(&mut session, &values);
            let ids = ["player_1", "player_2", "player_3"];
            let mut previous = [0u32; 3];
            for (who, attack) in attacks {
                session.on_input(ids[who], PlayerInput::attack(attack));
                let now = session.clock() + session.rules.miss_cooldown_secs;
                session.tick(now);
                for (slot, id) in ids.iter().enumerate() {
                    let score = session.hero(id).map(|h| h.score).unwrap_or(0);
                    prop_assert!(score >= previous[slot]);
                    previous[slot] = score;
                }
            }
        }
    }
}
