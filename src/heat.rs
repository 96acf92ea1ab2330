use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::HeatError;
use crate::events::{
    DamageTally, Event, HitTally, Outcome, ShotCounts, TeamRoster, WaypointMark, Weapon,
    decode_line,
};
use crate::names::NameTable;

pub type ByCraft<T> = BTreeMap<String, T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CraftState {
    #[default]
    #[serde(rename = "ALIVE")]
    Alive,
    #[serde(rename = "DEAD")]
    Dead,
    #[serde(rename = "MIA")]
    Mia,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftRecord {
    pub state: CraftState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullet_damage_by: Option<ByCraft<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rocket_hits_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rocket_parts_hit_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rocket_damage_by: Option<ByCraft<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missile_hits_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missile_parts_hit_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missile_damage_by: Option<ByCraft<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rammed_parts_lost_by: Option<ByCraft<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battle_damage_by: Option<ByCraft<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_kill_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_rocket_kill_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_missile_kill_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_ram_kill_by: Option<String>,
    #[serde(default, rename = "GMKillReason", skip_serializing_if = "Option::is_none")]
    pub gm_kill_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts_lost_to_asteroids: Option<u32>,
    #[serde(default, rename = "HPremaining", skip_serializing_if = "Option::is_none")]
    pub hp_remaining: Option<f64>,
    #[serde(flatten)]
    pub accuracy: Option<ShotCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<WaypointMark>>,
}

impl CraftRecord {
    pub fn hits(&self, tally: HitTally) -> Option<&ByCraft<u32>> {
        match tally {
            HitTally::GunHits => self.hits_by.as_ref(),
            HitTally::RocketHits => self.rocket_hits_by.as_ref(),
            HitTally::RocketPartsHit => self.rocket_parts_hit_by.as_ref(),
            HitTally::MissileHits => self.missile_hits_by.as_ref(),
            HitTally::MissilePartsHit => self.missile_parts_hit_by.as_ref(),
            HitTally::RammedPartsLost => self.rammed_parts_lost_by.as_ref(),
        }
    }

    fn hits_slot(&mut self, tally: HitTally) -> &mut Option<ByCraft<u32>> {
        match tally {
            HitTally::GunHits => &mut self.hits_by,
            HitTally::RocketHits => &mut self.rocket_hits_by,
            HitTally::RocketPartsHit => &mut self.rocket_parts_hit_by,
            HitTally::MissileHits => &mut self.missile_hits_by,
            HitTally::MissilePartsHit => &mut self.missile_parts_hit_by,
            HitTally::RammedPartsLost => &mut self.rammed_parts_lost_by,
        }
    }

    pub fn damage(&self, tally: DamageTally) -> Option<&ByCraft<f64>> {
        match tally {
            DamageTally::Guns => self.bullet_damage_by.as_ref(),
            DamageTally::Rockets => self.rocket_damage_by.as_ref(),
            DamageTally::Missiles => self.missile_damage_by.as_ref(),
            DamageTally::Battle => self.battle_damage_by.as_ref(),
        }
    }

    fn damage_slot(&mut self, tally: DamageTally) -> &mut Option<ByCraft<f64>> {
        match tally {
            DamageTally::Guns => &mut self.bullet_damage_by,
            DamageTally::Rockets => &mut self.rocket_damage_by,
            DamageTally::Missiles => &mut self.missile_damage_by,
            DamageTally::Battle => &mut self.battle_damage_by,
        }
    }

    pub fn killer(&self, weapon: Weapon) -> Option<&str> {
        match weapon {
            Weapon::Guns => self.clean_kill_by.as_deref(),
            Weapon::Rockets => self.clean_rocket_kill_by.as_deref(),
            Weapon::Missiles => self.clean_missile_kill_by.as_deref(),
            Weapon::Ramming => self.clean_ram_kill_by.as_deref(),
        }
    }

    fn killer_slot(&mut self, weapon: Weapon) -> &mut Option<String> {
        match weapon {
            Weapon::Guns => &mut self.clean_kill_by,
            Weapon::Rockets => &mut self.clean_rocket_kill_by,
            Weapon::Missiles => &mut self.clean_missile_kill_by,
            Weapon::Ramming => &mut self.clean_ram_kill_by,
        }
    }

    /// The clean-kill credit of this craft's death, first weapon in [`Weapon::ALL`] order.
    pub fn clean_kill(&self) -> Option<(Weapon, &str)> {
        Weapon::ALL
            .into_iter()
            .find_map(|weapon| self.killer(weapon).map(|killer| (weapon, killer)))
    }

    const ATTACK_TALLIES: [HitTally; 4] = [
        HitTally::GunHits,
        HitTally::RocketPartsHit,
        HitTally::MissilePartsHit,
        HitTally::RammedPartsLost,
    ];

    pub fn was_attacked(&self) -> bool {
        Self::ATTACK_TALLIES
            .into_iter()
            .any(|tally| self.hits(tally).is_some())
    }

    pub fn attacked_by(&self, craft: &str) -> bool {
        Self::ATTACK_TALLIES
            .into_iter()
            .any(|tally| self.hits(tally).is_some_and(|by| by.contains_key(craft)))
    }

    pub fn rammed_by(&self, craft: &str) -> bool {
        self.rammed_parts_lost_by
            .as_ref()
            .is_some_and(|by| by.contains_key(craft))
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.as_ref().map_or(0, Vec::len)
    }

    pub fn waypoint_time(&self) -> f64 {
        match self.waypoints.as_deref() {
            Some([first, .., last]) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    pub fn waypoint_deviation(&self) -> f64 {
        self.waypoints
            .as_ref()
            .map_or(0.0, |marks| marks.iter().map(|m| m.deviation).sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatResult {
    #[serde(rename = "result")]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<TeamRoster>,
    #[serde(default, rename = "dead teams", skip_serializing_if = "Vec::is_empty")]
    pub dead_teams: Vec<TeamRoster>,
}

impl HeatResult {
    pub fn winners(&self) -> Option<&TeamRoster> {
        match self.outcome {
            Outcome::Win => self.teams.first(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeatRecord {
    pub result: Option<HeatResult>,
    pub duration: f64,
    #[serde(default, rename = "startedAt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<NaiveDateTime>,
    pub craft: BTreeMap<String, CraftRecord>,
}

impl HeatRecord {
    pub fn craft_count(&self) -> usize {
        self.craft.len()
    }
}

/// Folds decoded events into a [`HeatRecord`].
#[derive(Debug, Default)]
pub struct HeatBuilder {
    craft: BTreeMap<String, CraftRecord>,
    terminal: HashSet<String>,
    result: Option<(Outcome, Vec<TeamRoster>)>,
    dead_teams: Vec<TeamRoster>,
    duration: f64,
    started_at: Option<NaiveDateTime>,
}

impl HeatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn craft_mut(&mut self, craft: String) -> &mut CraftRecord {
        self.craft.entry(craft).or_default()
    }

    fn set_terminal(&mut self, craft: String, state: CraftState, death: Option<(u32, f64)>) {
        self.terminal.insert(craft.clone());
        let record = self.craft_mut(craft);
        record.state = state;
        record.death_order = death.map(|(order, _)| order);
        record.death_time = death.map(|(_, time)| time);
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Alive { craft } => self.set_terminal(craft, CraftState::Alive, None),
            Event::Mia { craft } => self.set_terminal(craft, CraftState::Mia, None),
            Event::Dead { craft, order, time } => {
                self.set_terminal(craft, CraftState::Dead, Some((order, time)))
            }
            Event::Hits { craft, tally, by } => {
                *self.craft_mut(craft).hits_slot(tally) = Some(by);
            }
            Event::Damage { craft, tally, by } => {
                *self.craft_mut(craft).damage_slot(tally) = Some(by);
            }
            Event::Kill {
                craft,
                killer,
                weapon,
                ..
            } => {
                *self.craft_mut(craft).killer_slot(weapon) = Some(killer);
            }
            Event::GmKill { craft, reason } => {
                self.craft_mut(craft).gm_kill_reason = Some(reason);
            }
            Event::AsteroidLoss { craft, parts } => {
                self.craft_mut(craft).parts_lost_to_asteroids = Some(parts);
            }
            Event::HpRemaining { craft, hp } => {
                self.craft_mut(craft).hp_remaining = Some(hp);
            }
            Event::Accuracy { craft, counts } => {
                self.craft_mut(craft).accuracy = Some(counts);
            }
            Event::Waypoints { craft, marks } => {
                self.craft_mut(craft).waypoints = Some(marks);
            }
            Event::Result { outcome, teams } => self.result = Some((outcome, teams)),
            Event::DeadTeams { teams } => self.dead_teams = teams,
            Event::Duration {
                seconds,
                started_at,
            } => {
                self.duration = seconds;
                self.started_at = started_at;
            }
        }
    }

    pub fn finish(self) -> HeatRecord {
        let terminal = self.terminal;
        let craft = self
            .craft
            .into_iter()
            .filter(|(name, _)| terminal.contains(name))
            .collect();
        let dead_teams = self.dead_teams;
        HeatRecord {
            result: self.result.map(|(outcome, teams)| HeatResult {
                outcome,
                teams,
                dead_teams,
            }),
            duration: self.duration,
            started_at: self.started_at,
            craft,
        }
    }
}

pub fn parse_heat_log(text: &str) -> Result<HeatRecord, HeatError> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let names = NameTable::from_log_lines(lines.iter().copied());
    let mut builder = HeatBuilder::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(event) = decode_line(line, &names, idx + 1)? {
            builder.apply(event);
        }
    }
    Ok(builder.finish())
}

pub fn read_heat_log(path: &Path) -> Result<HeatRecord, HeatError> {
    let text = fs::read_to_string(path)?;
    parse_heat_log(&text)
}
