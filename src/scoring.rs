use std::collections::BTreeMap;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::config::{DEFAULT_WEIGHTS, ScoringConfig};
use crate::summary::{CraftSummary, TournamentSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreField {
    Wins,
    SurvivedCount,
    MiaCount,
    DeathCount,
    DeathOrder,
    DeathTime,
    CleanKills,
    Assists,
    Hits,
    HitsTaken,
    BulletDamage,
    BulletDamageTaken,
    RocketHits,
    RocketHitsTaken,
    RocketPartsHit,
    RocketPartsHitTaken,
    RocketDamage,
    RocketDamageTaken,
    MissileHits,
    MissileHitsTaken,
    MissilePartsHit,
    MissilePartsHitTaken,
    MissileDamage,
    MissileDamageTaken,
    RamScore,
    RamScoreTaken,
    BattleDamage,
    PartsLostToAsteroids,
    HpRemaining,
    Accuracy,
    RocketAccuracy,
    WaypointCount,
    WaypointTime,
    WaypointDeviation,
}

pub const FIELD_COUNT: usize = 34;

impl ScoreField {
    pub const ALL: [ScoreField; FIELD_COUNT] = [
        ScoreField::Wins,
        ScoreField::SurvivedCount,
        ScoreField::MiaCount,
        ScoreField::DeathCount,
        ScoreField::DeathOrder,
        ScoreField::DeathTime,
        ScoreField::CleanKills,
        ScoreField::Assists,
        ScoreField::Hits,
        ScoreField::HitsTaken,
        ScoreField::BulletDamage,
        ScoreField::BulletDamageTaken,
        ScoreField::RocketHits,
        ScoreField::RocketHitsTaken,
        ScoreField::RocketPartsHit,
        ScoreField::RocketPartsHitTaken,
        ScoreField::RocketDamage,
        ScoreField::RocketDamageTaken,
        ScoreField::MissileHits,
        ScoreField::MissileHitsTaken,
        ScoreField::MissilePartsHit,
        ScoreField::MissilePartsHitTaken,
        ScoreField::MissileDamage,
        ScoreField::MissileDamageTaken,
        ScoreField::RamScore,
        ScoreField::RamScoreTaken,
        ScoreField::BattleDamage,
        ScoreField::PartsLostToAsteroids,
        ScoreField::HpRemaining,
        ScoreField::Accuracy,
        ScoreField::RocketAccuracy,
        ScoreField::WaypointCount,
        ScoreField::WaypointTime,
        ScoreField::WaypointDeviation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScoreField::Wins => "wins",
            ScoreField::SurvivedCount => "survivedCount",
            ScoreField::MiaCount => "miaCount",
            ScoreField::DeathCount => "deathCount",
            ScoreField::DeathOrder => "deathOrder",
            ScoreField::DeathTime => "deathTime",
            ScoreField::CleanKills => "cleanKills",
            ScoreField::Assists => "assists",
            ScoreField::Hits => "hits",
            ScoreField::HitsTaken => "hitsTaken",
            ScoreField::BulletDamage => "bulletDamage",
            ScoreField::BulletDamageTaken => "bulletDamageTaken",
            ScoreField::RocketHits => "rocketHits",
            ScoreField::RocketHitsTaken => "rocketHitsTaken",
            ScoreField::RocketPartsHit => "rocketPartsHit",
            ScoreField::RocketPartsHitTaken => "rocketPartsHitTaken",
            ScoreField::RocketDamage => "rocketDamage",
            ScoreField::RocketDamageTaken => "rocketDamageTaken",
            ScoreField::MissileHits => "missileHits",
            ScoreField::MissileHitsTaken => "missileHitsTaken",
            ScoreField::MissilePartsHit => "missilePartsHit",
            ScoreField::MissilePartsHitTaken => "missilePartsHitTaken",
            ScoreField::MissileDamage => "missileDamage",
            ScoreField::MissileDamageTaken => "missileDamageTaken",
            ScoreField::RamScore => "ramScore",
            ScoreField::RamScoreTaken => "ramScoreTaken",
            ScoreField::BattleDamage => "battleDamage",
            ScoreField::PartsLostToAsteroids => "partsLostToAsteroids",
            ScoreField::HpRemaining => "HPremaining",
            ScoreField::Accuracy => "accuracy",
            ScoreField::RocketAccuracy => "rocket_accuracy",
            ScoreField::WaypointCount => "waypointCount",
            ScoreField::WaypointTime => "waypointTime",
            ScoreField::WaypointDeviation => "waypointDeviation",
        }
    }

    pub fn is_waypoint(self) -> bool {
        matches!(
            self,
            ScoreField::WaypointCount | ScoreField::WaypointTime | ScoreField::WaypointDeviation
        )
    }

    /// The scored value of this field. Composite metrics score their total; waypoint
    /// metrics of a summary without waypoints score zero.
    pub fn value(self, s: &CraftSummary) -> f64 {
        match self {
            ScoreField::Wins => s.wins,
            ScoreField::SurvivedCount => s.survived_count,
            ScoreField::MiaCount => s.mia_count,
            ScoreField::DeathCount => s.death_count.total,
            ScoreField::DeathOrder => s.death_order,
            ScoreField::DeathTime => s.death_time,
            ScoreField::CleanKills => s.clean_kills.total,
            ScoreField::Assists => s.assists,
            ScoreField::Hits => s.hits,
            ScoreField::HitsTaken => s.hits_taken,
            ScoreField::BulletDamage => s.bullet_damage,
            ScoreField::BulletDamageTaken => s.bullet_damage_taken,
            ScoreField::RocketHits => s.rocket_hits,
            ScoreField::RocketHitsTaken => s.rocket_hits_taken,
            ScoreField::RocketPartsHit => s.rocket_parts_hit,
            ScoreField::RocketPartsHitTaken => s.rocket_parts_hit_taken,
            ScoreField::RocketDamage => s.rocket_damage,
            ScoreField::RocketDamageTaken => s.rocket_damage_taken,
            ScoreField::MissileHits => s.missile_hits,
            ScoreField::MissileHitsTaken => s.missile_hits_taken,
            ScoreField::MissilePartsHit => s.missile_parts_hit,
            ScoreField::MissilePartsHitTaken => s.missile_parts_hit_taken,
            ScoreField::MissileDamage => s.missile_damage,
            ScoreField::MissileDamageTaken => s.missile_damage_taken,
            ScoreField::RamScore => s.ram_score,
            ScoreField::RamScoreTaken => s.ram_score_taken,
            ScoreField::BattleDamage => s.battle_damage,
            ScoreField::PartsLostToAsteroids => s.parts_lost_to_asteroids,
            ScoreField::HpRemaining => s.hp_remaining,
            ScoreField::Accuracy => s.accuracy,
            ScoreField::RocketAccuracy => s.rocket_accuracy,
            ScoreField::WaypointCount => s.waypoints.map_or(0.0, |w| w.waypoint_count),
            ScoreField::WaypointTime => s.waypoints.map_or(0.0, |w| w.waypoint_time),
            ScoreField::WaypointDeviation => s.waypoints.map_or(0.0, |w| w.waypoint_deviation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights([f64; FIELD_COUNT]);

impl Default for ScoreWeights {
    fn default() -> Self {
        Self(DEFAULT_WEIGHTS)
    }
}

impl ScoreWeights {
    pub fn from_slice(values: &[f64]) -> Self {
        if values.len() > FIELD_COUNT {
            tracing::warn!(
                given = values.len(),
                expected = FIELD_COUNT,
                "ignoring extra score weights"
            );
        }
        let mut weights = [0.0; FIELD_COUNT];
        for (slot, value) in weights.iter_mut().zip(values) {
            *slot = *value;
        }
        Self(weights)
    }

    pub const fn from_array(weights: [f64; FIELD_COUNT]) -> Self {
        Self(weights)
    }

    pub fn get(&self, field: ScoreField) -> f64 {
        self.0[field as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreField, f64)> + '_ {
        ScoreField::ALL.into_iter().zip(self.0.iter().copied())
    }

    fn weighted_sum(&self, summary: &CraftSummary, waypoint: bool) -> f64 {
        self.iter()
            .filter(|(field, _)| field.is_waypoint() == waypoint)
            .map(|(field, weight)| weight * field.value(summary))
            .sum()
    }

    pub fn base_score(&self, summary: &CraftSummary) -> f64 {
        self.weighted_sum(summary, false)
    }

    pub fn waypoint_score(&self, summary: &CraftSummary) -> f64 {
        self.weighted_sum(summary, true).max(0.0)
    }

    pub fn round_score(&self, summary: &CraftSummary) -> f64 {
        self.base_score(summary) + self.waypoint_score(summary)
    }

    /// Tournament score: base score over the tournament totals plus the floored
    /// waypoint score of each round.
    pub fn tournament_score(&self, total: &CraftSummary, rounds: &[CraftSummary]) -> f64 {
        self.base_score(total)
            + rounds
                .iter()
                .map(|round| self.waypoint_score(round))
                .sum::<f64>()
    }
}

impl Serialize for ScoreWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        for (field, weight) in self.iter() {
            map.serialize_entry(field.name(), &weight)?;
        }
        map.end()
    }
}

pub fn apply_scores(summary: &mut TournamentSummary, config: &ScoringConfig) {
    let weights = &config.weights;
    for (name, craft) in summary.craft.iter_mut() {
        let rounds = summary.per_round.get(name).map_or(&[][..], Vec::as_slice);
        craft.score = Some(weights.tournament_score(craft, rounds));
    }
    if config.zero_lowest_score {
        let lowest = summary
            .craft
            .values()
            .filter_map(|craft| craft.score)
            .reduce(f64::min);
        if let Some(lowest) = lowest {
            for score in summary.craft.values_mut().filter_map(|c| c.score.as_mut()) {
                *score -= lowest;
            }
        }
    }
}

pub fn cumulative_scores(
    summary: &TournamentSummary,
    weights: &ScoreWeights,
) -> BTreeMap<String, Vec<f64>> {
    summary
        .per_round
        .iter()
        .map(|(name, rounds)| {
            let series = rounds
                .iter()
                .scan(0.0, |total, round| {
                    *total += weights.round_score(round);
                    Some(*total)
                })
                .collect();
            (name.clone(), series)
        })
        .collect()
}

pub fn ranking(summary: &TournamentSummary) -> Vec<(&str, &CraftSummary)> {
    let mut ranked: Vec<(&str, &CraftSummary)> = summary
        .craft
        .iter()
        .map(|(name, craft)| (name.as_str(), craft))
        .collect();
    ranked.sort_by(|(_, a), (_, b)| {
        let a = a.score.unwrap_or(0.0);
        let b = b.score.unwrap_or(0.0);
        b.total_cmp(&a)
    });
    ranked
}
