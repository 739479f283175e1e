pub const FPS: u32 = 60;
pub const FRAME_MS: u64 = 1000 / FPS as u64;

pub const WIDTH: f64 = 800.0;
pub const HEIGHT: f64 = 600.0;

pub const HERO_X: f64 = 50.0;
pub const HERO_BASE_WIDTH: f64 = 80.0;

pub const MONSTER_WIDTH: f64 = 80.0;
pub const MONSTER_SPEED: f64 = 40.0;
pub const MONSTER_SPAWN_MARGIN: f64 = 75.0;
pub const MONSTER_SPAWN_JITTER: f64 = 50.0;
pub const MONSTER_ESCAPE_X: f64 = 100.0;
pub const MONSTER_DECAY_SECS: f64 = 3.0;
pub const MONSTER_MIN_VALUE: i32 = 1;
pub const MONSTER_MAX_VALUE: i32 = 9;

pub const COUNTDOWN_SECS: f64 = 3.0;
pub const FIRST_SPAWN_DELAY_SECS: f64 = 3.0;
pub const GAME_DURATION_SECS: f64 = 180.0;

pub const ATTACK_COOLDOWN_SECS: f64 = 0.5;
pub const MISS_COOLDOWN_SECS: f64 = 1.0;

pub const SCOREBOARD_SIZE: usize = 10;

pub const DEFAULT_PLAYER_NAME: &str = "Player";
pub const DEFAULT_PLAYER_COLOR: &str = "#ffffff";
pub const MAX_PLAYER_NAME_CHARS: usize = 16;

/// Delay before the next spawn given how many monsters are still alive.
pub fn monster_pop_period(live_monsters: usize) -> f64 {
    live_monsters as f64 / 2.0
}

pub fn scale_game(player_count: usize) -> f64 {
    (4.0 / (player_count as f64 + 2.0)).sqrt().min(1.0)
}

pub fn hero_width(player_count: usize) -> f64 {
    HERO_BASE_WIDTH * scale_game(player_count)
}

pub fn hero_lane_y(player_count: usize, index: usize) -> f64 {
    HEIGHT / (player_count as f64 + 1.0) * (1.0 + index as f64)
}
