use serde::Serialize;

/// Simulation time in seconds, fed by the external frame driver.
pub type SimTime = f64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStep {
    Intro,
    Countdown,
    Game,
    Victory,
}

impl SessionStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "INTRO",
            Self::Countdown => "COUNTDOWN",
            Self::Game => "GAME",
            Self::Victory => "VICTORY",
        }
    }
}

/// One joypad action. Fields that do not apply to the current step are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub attack: Option<i64>,
    pub ready: Option<bool>,
    pub restart: Option<bool>,
}

impl PlayerInput {
    pub fn attack(value: i64) -> Self {
        Self {
            attack: Some(value),
            ..Self::default()
        }
    }

    pub fn ready(ready: bool) -> Self {
        Self {
            ready: Some(ready),
            ..Self::default()
        }
    }

    pub fn restart() -> Self {
        Self {
            restart: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attack.is_none() && self.ready.is_none() && self.restart.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownPlayer,
    WrongStep,
    CoolingDown,
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    Applied,
    RestartRequested,
    Ignored(IgnoreReason),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeroView {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub name: String,
    pub color: String,
    pub score: u32,
    pub ready: bool,
    #[serde(rename = "attackCooldownUntil")]
    pub attack_cooldown_until: SimTime,
    pub attacking: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonsterView {
    pub id: String,
    pub value: i32,
    pub hp: u32,
    #[serde(rename = "maxHp")]
    pub max_hp: u32,
    pub alive: bool,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "spawnedAt")]
    pub spawned_at: SimTime,
    pub opacity: f64,
    pub attackers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub name: String,
    pub score: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    StateChanged {
        step: SessionStep,
    },
    HeroCreated {
        hero: HeroView,
    },
    HeroUpdated {
        hero: HeroView,
    },
    HeroRemoved {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    MonsterSpawned {
        monster: MonsterView,
    },
    MonsterHit {
        monster: MonsterView,
        by: String,
    },
    MonsterKilled {
        monster: MonsterView,
        by: String,
    },
    MonsterEscaped {
        #[serde(rename = "monsterId")]
        monster_id: String,
    },
    MonsterDecayed {
        #[serde(rename = "monsterId")]
        monster_id: String,
    },
    AttackLanded {
        #[serde(rename = "playerId")]
        player_id: String,
        attack: i64,
        #[serde(rename = "monsterIds")]
        monster_ids: Vec<String>,
        gained: u32,
    },
    AttackMissed {
        #[serde(rename = "playerId")]
        player_id: String,
        attack: i64,
    },
    ScoreChanged {
        #[serde(rename = "playerId")]
        player_id: String,
        score: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub step: SessionStep,
    pub clock: SimTime,
    #[serde(rename = "timeLeftSecs")]
    pub time_left_secs: Option<f64>,
    pub heroes: Vec<HeroView>,
    pub monsters: Vec<MonsterView>,
    pub scoreboard: Vec<ScoreEntry>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    #[serde(rename = "durationSecs")]
    pub duration_secs: f64,
    pub ranking: Vec<ScoreEntry>,
    pub winner: Option<ScoreEntry>,
}
