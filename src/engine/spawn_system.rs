use super::*;
use crate::constants::{
    monster_pop_period, HEIGHT, MONSTER_MAX_VALUE, MONSTER_MIN_VALUE, MONSTER_SPAWN_JITTER,
    MONSTER_SPAWN_MARGIN, MONSTER_WIDTH, WIDTH,
};

impl GameSession {
    /// Spawns at most one monster per tick once the spawn timer has passed,
    /// then waits half a second per monster still alive.
    pub(super) fn maybe_spawn_monster(&mut self) {
        if self.clock <= self.next_spawn_at {
            return;
        }
        self.spawn_monster();
        let live = self.live_monster_count();
        self.next_spawn_at = self.clock + monster_pop_period(live);
    }

    pub(super) fn spawn_monster(&mut self) -> String {
        let id = self.make_id("monster");
        let value = self.rng.int(MONSTER_MIN_VALUE, MONSTER_MAX_VALUE);
        let hp = self.live_player_count().max(1) as u32;
        let x = WIDTH - MONSTER_SPAWN_MARGIN + MONSTER_SPAWN_JITTER * self.rng.next_f64();
        let y = self.rng.range(MONSTER_WIDTH, HEIGHT - MONSTER_WIDTH);
        let view = MonsterView {
            id: id.clone(),
            value,
            hp,
            max_hp: hp,
            alive: true,
            x,
            y,
            spawned_at: self.clock,
            opacity: 1.0,
            attackers: Vec::new(),
        };
        debug!(monster_id = id.as_str(), value, hp, "monster spawned");
        self.events.push(RuntimeEvent::MonsterSpawned {
            monster: view.clone(),
        });
        self.monsters.push(MonsterInternal {
            view,
            phase: MonsterPhase::Alive,
        });
        id
    }

    /// Connected players right now; decides how many hits a new monster takes.
    pub(super) fn live_player_count(&self) -> usize {
        self.roster.len()
    }
}
