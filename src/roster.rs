//! The externally owned player list and the pure diff against session heroes.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::server_utils::{player_order_key, sanitize_color, sanitize_name};

/// A roster entry as delivered by the transport. Every field may be missing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RosterEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl RosterEntry {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            color: Some(color.to_string()),
        }
    }

    pub fn normalize(&self) -> PlayerProfile {
        PlayerProfile {
            name: sanitize_name(self.name.as_deref().unwrap_or_default()),
            color: sanitize_color(self.color.as_deref()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerProfile {
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    players: BTreeMap<String, PlayerProfile>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, RosterEntry)>,
        S: Into<String>,
    {
        let mut roster = Self::new();
        for (id, entry) in entries {
            roster.insert(id, &entry);
        }
        roster
    }

    /// Builds a roster from a JSON object keyed by player id. Entries that are
    /// not objects, or carry wrongly typed fields, fall back to defaults
    /// instead of rejecting the whole update.
    pub fn from_json(value: &Value) -> Self {
        let mut roster = Self::new();
        let Some(object) = value.as_object() else {
            return roster;
        };
        for (id, raw) in object {
            if id.trim().is_empty() {
                continue;
            }
            let entry = RosterEntry {
                name: raw.get("name").and_then(Value::as_str).map(str::to_string),
                color: raw
                    .get("color")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            roster.insert(id.clone(), &entry);
        }
        roster
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: &RosterEntry) {
        self.players.insert(id.into(), entry.normalize());
    }

    pub fn remove(&mut self, id: &str) -> Option<PlayerProfile> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&PlayerProfile> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// New player ids, in join order.
    pub added: Vec<String>,
    /// Hero ids no longer present in the roster, in hero order.
    pub removed: Vec<String>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff_roster<'a, I>(hero_ids: I, roster: &Roster) -> RosterDiff
where
    I: IntoIterator<Item = &'a str>,
{
    let mut known = HashSet::new();
    let mut removed = Vec::new();
    for hero_id in hero_ids {
        known.insert(hero_id);
        if !roster.contains(hero_id) {
            removed.push(hero_id.to_string());
        }
    }
    let mut added: Vec<String> = roster
        .ids()
        .filter(|id| !known.contains(id))
        .map(str::to_string)
        .collect();
    added.sort_by(|a, b| {
        player_order_key(a)
            .cmp(&player_order_key(b))
            .then_with(|| a.cmp(b))
    });
    RosterDiff { added, removed }
}
