use super::*;
use crate::constants::MONSTER_ESCAPE_X;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum MonsterUpdate {
    Moved { x: f64 },
    Escaped,
    Decayed { lingered: f64 },
    Holding,
}

/// Per-tick transition of one monster, switched on its sub-state.
pub(super) fn advance(phase: MonsterPhase, x: f64, clock: SimTime, dt: f64, speed: f64) -> MonsterUpdate {
    match phase {
        MonsterPhase::Alive => {
            let x = x - speed * dt;
            if x < MONSTER_ESCAPE_X {
                MonsterUpdate::Escaped
            } else {
                MonsterUpdate::Moved { x }
            }
        }
        MonsterPhase::Dying { died_at, remove_at } => {
            if clock >= remove_at {
                MonsterUpdate::Decayed {
                    lingered: clock - died_at,
                }
            } else {
                MonsterUpdate::Holding
            }
        }
    }
}

pub(super) fn dying(clock: SimTime, decay_secs: f64) -> MonsterPhase {
    MonsterPhase::Dying {
        died_at: clock,
        remove_at: clock + decay_secs,
    }
}

/// Fades out over the last second before removal.
pub(super) fn opacity(phase: MonsterPhase, clock: SimTime) -> f64 {
    match phase {
        MonsterPhase::Alive => 1.0,
        MonsterPhase::Dying { remove_at, .. } => (remove_at - clock).clamp(0.0, 1.0),
    }
}

impl GameSession {
    pub(super) fn update_monsters(&mut self, dt: f64) {
        let clock = self.clock;
        let speed = self.rules.monster_speed;
        let mut removed = Vec::new();
        self.monsters.retain_mut(|monster| {
            match advance(monster.phase, monster.view.x, clock, dt, speed) {
                MonsterUpdate::Moved { x } => {
                    monster.view.x = x;
                    true
                }
                MonsterUpdate::Holding => true,
                MonsterUpdate::Escaped => {
                    debug!(monster_id = monster.view.id.as_str(), "monster escaped");
                    removed.push(RuntimeEvent::MonsterEscaped {
                        monster_id: monster.view.id.clone(),
                    });
                    false
                }
                MonsterUpdate::Decayed { lingered } => {
                    debug!(monster_id = monster.view.id.as_str(), lingered, "monster decayed");
                    removed.push(RuntimeEvent::MonsterDecayed {
                        monster_id: monster.view.id.clone(),
                    });
                    false
                }
            }
        });
        self.events.extend(removed);
    }
}
