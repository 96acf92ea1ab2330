use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::events::{DamageTally, HitTally, Outcome, TeamRoster, Weapon, percentage};
use crate::heat::{ByCraft, CraftRecord, CraftState, HeatRecord};
use crate::tournament::{HeatFailure, Tournament};

/// `(total, bullet, rocket, missile, ram, dirty, suicide)`; serialized as a 7-element array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(into = "[f64; 7]")]
pub struct DeathCounts {
    pub total: f64,
    pub bullet: f64,
    pub rocket: f64,
    pub missile: f64,
    pub ram: f64,
    pub dirty: f64,
    pub suicide: f64,
}

impl DeathCounts {
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.total,
            self.bullet,
            self.rocket,
            self.missile,
            self.ram,
            self.dirty,
            self.suicide,
        ]
    }

    fn by_weapon(&mut self, weapon: Weapon) -> &mut f64 {
        match weapon {
            Weapon::Guns => &mut self.bullet,
            Weapon::Rockets => &mut self.rocket,
            Weapon::Missiles => &mut self.missile,
            Weapon::Ramming => &mut self.ram,
        }
    }

    fn components_mut(&mut self) -> [&mut f64; 7] {
        [
            &mut self.total,
            &mut self.bullet,
            &mut self.rocket,
            &mut self.missile,
            &mut self.ram,
            &mut self.dirty,
            &mut self.suicide,
        ]
    }
}

impl From<DeathCounts> for [f64; 7] {
    fn from(counts: DeathCounts) -> Self {
        counts.as_array()
    }
}

/// `(total, bullet, rocket, missile, ram)`; serialized as a 5-element array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(into = "[f64; 5]")]
pub struct KillCounts {
    pub total: f64,
    pub bullet: f64,
    pub rocket: f64,
    pub missile: f64,
    pub ram: f64,
}

impl KillCounts {
    pub fn as_array(&self) -> [f64; 5] {
        [self.total, self.bullet, self.rocket, self.missile, self.ram]
    }

    fn by_weapon(&mut self, weapon: Weapon) -> &mut f64 {
        match weapon {
            Weapon::Guns => &mut self.bullet,
            Weapon::Rockets => &mut self.rocket,
            Weapon::Missiles => &mut self.missile,
            Weapon::Ramming => &mut self.ram,
        }
    }

    fn components_mut(&mut self) -> [&mut f64; 5] {
        [
            &mut self.total,
            &mut self.bullet,
            &mut self.rocket,
            &mut self.missile,
            &mut self.ram,
        ]
    }
}

impl From<KillCounts> for [f64; 5] {
    fn from(counts: KillCounts) -> Self {
        counts.as_array()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointSummary {
    pub waypoint_count: f64,
    pub waypoint_time: f64,
    pub waypoint_deviation: f64,
    pub waypoint_best_count: f64,
    pub waypoint_best_time: f64,
    pub waypoint_best_deviation: f64,
}

impl WaypointSummary {
    fn metrics_mut(&mut self) -> [&mut f64; 6] {
        [
            &mut self.waypoint_count,
            &mut self.waypoint_time,
            &mut self.waypoint_deviation,
            &mut self.waypoint_best_count,
            &mut self.waypoint_best_time,
            &mut self.waypoint_best_deviation,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftSummary {
    pub wins: f64,
    pub survived_count: f64,
    pub mia_count: f64,
    pub death_count: DeathCounts,
    pub death_order: f64,
    pub death_time: f64,
    pub clean_kills: KillCounts,
    pub assists: f64,
    pub hits: f64,
    pub hits_taken: f64,
    pub bullet_damage: f64,
    pub bullet_damage_taken: f64,
    pub rocket_hits: f64,
    pub rocket_hits_taken: f64,
    pub rocket_parts_hit: f64,
    pub rocket_parts_hit_taken: f64,
    pub rocket_damage: f64,
    pub rocket_damage_taken: f64,
    pub missile_hits: f64,
    pub missile_hits_taken: f64,
    pub missile_parts_hit: f64,
    pub missile_parts_hit_taken: f64,
    pub missile_damage: f64,
    pub missile_damage_taken: f64,
    pub ram_score: f64,
    pub ram_score_taken: f64,
    pub battle_damage: f64,
    pub battle_damage_taken: f64,
    pub parts_lost_to_asteroids: f64,
    #[serde(rename = "HPremaining")]
    pub hp_remaining: f64,
    pub accuracy: f64,
    #[serde(rename = "rocket_accuracy")]
    pub rocket_accuracy: f64,
    #[serde(rename = "damage/hit")]
    pub damage_per_hit: f64,
    #[serde(rename = "hits/spawn")]
    pub hits_per_spawn: f64,
    #[serde(rename = "damage/spawn")]
    pub damage_per_spawn: f64,
    #[serde(flatten)]
    pub waypoints: Option<WaypointSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CraftSummary {
    pub fn spawns(&self) -> f64 {
        self.survived_count + self.death_count.total
    }

    fn metrics_mut(&mut self) -> Vec<&mut f64> {
        let mut metrics: Vec<&mut f64> = vec![
            &mut self.wins,
            &mut self.survived_count,
            &mut self.mia_count,
            &mut self.death_order,
            &mut self.death_time,
            &mut self.assists,
            &mut self.hits,
            &mut self.hits_taken,
            &mut self.bullet_damage,
            &mut self.bullet_damage_taken,
            &mut self.rocket_hits,
            &mut self.rocket_hits_taken,
            &mut self.rocket_parts_hit,
            &mut self.rocket_parts_hit_taken,
            &mut self.rocket_damage,
            &mut self.rocket_damage_taken,
            &mut self.missile_hits,
            &mut self.missile_hits_taken,
            &mut self.missile_parts_hit,
            &mut self.missile_parts_hit_taken,
            &mut self.missile_damage,
            &mut self.missile_damage_taken,
            &mut self.ram_score,
            &mut self.ram_score_taken,
            &mut self.battle_damage,
            &mut self.battle_damage_taken,
            &mut self.parts_lost_to_asteroids,
            &mut self.hp_remaining,
            &mut self.accuracy,
            &mut self.rocket_accuracy,
            &mut self.damage_per_hit,
            &mut self.hits_per_spawn,
            &mut self.damage_per_spawn,
        ];
        metrics.extend(self.death_count.components_mut());
        metrics.extend(self.clean_kills.components_mut());
        if let Some(waypoints) = self.waypoints.as_mut() {
            metrics.extend(waypoints.metrics_mut());
        }
        metrics
    }

    pub fn fill_derived(&mut self) {
        let spawns = self.spawns();
        self.damage_per_hit = ratio(self.bullet_damage, self.hits);
        self.hits_per_spawn = ratio(self.hits, spawns);
        self.damage_per_spawn = ratio(self.bullet_damage, spawns);
    }

    pub fn mean<'a>(summaries: impl IntoIterator<Item = &'a CraftSummary>) -> CraftSummary {
        let mut total = CraftSummary::default();
        let mut count = 0usize;
        for summary in summaries {
            let mut summary = summary.clone();
            if summary.waypoints.is_some() && total.waypoints.is_none() {
                total.waypoints = Some(WaypointSummary::default());
            }
            if total.waypoints.is_some() && summary.waypoints.is_none() {
                summary.waypoints = Some(WaypointSummary::default());
            }
            for (acc, value) in total.metrics_mut().into_iter().zip(summary.metrics_mut()) {
                *acc += *value;
            }
            count += 1;
        }
        if count > 0 {
            let n = count as f64;
            for metric in total.metrics_mut() {
                *metric /= n;
            }
        }
        total
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    summary: CraftSummary,
    hp_total: f64,
    hits: u64,
    shots: u64,
    rocket_strikes: u64,
    rockets_fired: u64,
    waypoints: WaypointSummary,
    waypoint_heats: Vec<(usize, f64, f64)>,
}

impl Accumulator {
    fn finish(mut self, with_waypoints: bool) -> CraftSummary {
        let survived = self.summary.survived_count;
        self.summary.hp_remaining = ratio(self.hp_total, survived);
        self.summary.hits = self.hits as f64;
        self.summary.accuracy = percentage(self.hits, self.shots);
        self.summary.rocket_accuracy = percentage(self.rocket_strikes, self.rockets_fired);
        if with_waypoints {
            let best = self
                .waypoint_heats
                .iter()
                .map(|(count, _, _)| *count)
                .max()
                .unwrap_or(0);
            let tied = || self.waypoint_heats.iter().filter(|(count, _, _)| *count == best);
            let mut waypoints = self.waypoints;
            waypoints.waypoint_best_count = best as f64;
            waypoints.waypoint_best_time = tied().map(|(_, time, _)| *time).reduce(f64::min).unwrap_or(0.0);
            waypoints.waypoint_best_deviation = tied().map(|(_, _, dev)| *dev).reduce(f64::min).unwrap_or(0.0);
            self.summary.waypoints = Some(waypoints);
        }
        self.summary.fill_derived();
        self.summary
    }
}

fn sum_u32(by: Option<&ByCraft<u32>>) -> f64 {
    by.map_or(0.0, |by| by.values().map(|v| f64::from(*v)).sum())
}

fn sum_f64(by: Option<&ByCraft<f64>>) -> f64 {
    by.map_or(0.0, |by| by.values().sum())
}

fn credit_u32(
    accs: &mut HashMap<&str, Accumulator>,
    by: Option<&ByCraft<u32>>,
    field: fn(&mut CraftSummary) -> &mut f64,
) {
    for (attacker, value) in by.into_iter().flatten() {
        if let Some(acc) = accs.get_mut(attacker.as_str()) {
            *field(&mut acc.summary) += f64::from(*value);
        }
    }
}

fn credit_f64(
    accs: &mut HashMap<&str, Accumulator>,
    by: Option<&ByCraft<f64>>,
    field: fn(&mut CraftSummary) -> &mut f64,
    victim: Option<&str>,
) {
    for (attacker, value) in by.into_iter().flatten() {
        if Some(attacker.as_str()) == victim {
            continue;
        }
        if let Some(acc) = accs.get_mut(attacker.as_str()) {
            *field(&mut acc.summary) += *value;
        }
    }
}

fn rammed_someone(heat: &HeatRecord, craft: &str) -> bool {
    heat.craft.values().any(|other| other.rammed_by(craft))
}

fn attackers(record: &CraftRecord) -> BTreeSet<&str> {
    [
        HitTally::GunHits,
        HitTally::RocketPartsHit,
        HitTally::MissilePartsHit,
        HitTally::RammedPartsLost,
    ]
    .into_iter()
    .filter_map(|tally| record.hits(tally))
    .flat_map(|by| by.keys().map(String::as_str))
    .collect()
}

fn fold_heat(accs: &mut HashMap<&str, Accumulator>, heat: &HeatRecord) {
    if let Some(winners) = heat.result.as_ref().and_then(|result| result.winners()) {
        for member in &winners.members {
            if let Some(acc) = accs.get_mut(member.as_str()) {
                acc.summary.wins += 1.0;
            }
        }
    }

    let craft_count = heat.craft_count() as f64;
    for (name, record) in &heat.craft {
        if let Some(acc) = accs.get_mut(name.as_str()) {
            fold_own(acc, heat, name, record, craft_count);
        }

        credit_f64(accs, record.damage(DamageTally::Guns), |s| &mut s.bullet_damage, None);
        credit_u32(accs, record.hits(HitTally::RocketHits), |s| &mut s.rocket_hits);
        credit_u32(accs, record.hits(HitTally::RocketPartsHit), |s| &mut s.rocket_parts_hit);
        credit_f64(accs, record.damage(DamageTally::Rockets), |s| &mut s.rocket_damage, None);
        credit_u32(accs, record.hits(HitTally::MissileHits), |s| &mut s.missile_hits);
        credit_u32(accs, record.hits(HitTally::MissilePartsHit), |s| &mut s.missile_parts_hit);
        credit_f64(accs, record.damage(DamageTally::Missiles), |s| &mut s.missile_damage, None);
        credit_u32(accs, record.hits(HitTally::RammedPartsLost), |s| &mut s.ram_score);
        credit_f64(
            accs,
            record.damage(DamageTally::Battle),
            |s| &mut s.battle_damage,
            Some(name.as_str()),
        );

        if record.state != CraftState::Dead {
            continue;
        }
        match record.clean_kill() {
            Some((weapon, killer)) => {
                if let Some(acc) = accs.get_mut(killer) {
                    acc.summary.clean_kills.total += 1.0;
                    *acc.summary.clean_kills.by_weapon(weapon) += 1.0;
                }
            }
            None => {
                for attacker in attackers(record) {
                    if let Some(acc) = accs.get_mut(attacker) {
                        acc.summary.assists += 1.0;
                    }
                }
            }
        }
    }
}

fn fold_own(acc: &mut Accumulator, heat: &HeatRecord, name: &str, record: &CraftRecord, craft_count: f64) {
    let summary = &mut acc.summary;
    match record.state {
        CraftState::Alive => {
            summary.survived_count += 1.0;
            acc.hp_total += record.hp_remaining.unwrap_or(0.0);
        }
        CraftState::Mia => summary.mia_count += 1.0,
        CraftState::Dead => {
            let deaths = &mut summary.death_count;
            deaths.total += 1.0;
            if let Some((weapon, _)) = record.clean_kill() {
                *deaths.by_weapon(weapon) += 1.0;
            } else if record.was_attacked() || rammed_someone(heat, name) {
                deaths.dirty += 1.0;
            } else {
                deaths.suicide += 1.0;
            }
        }
    }

    summary.death_order += match record.death_order {
        Some(order) if craft_count > 0.0 => f64::from(order) / craft_count,
        _ => 1.0,
    };
    summary.death_time += record.death_time.unwrap_or(heat.duration);

    summary.hits_taken += sum_u32(record.hits(HitTally::GunHits));
    summary.bullet_damage_taken += sum_f64(record.damage(DamageTally::Guns));
    summary.rocket_hits_taken += sum_u32(record.hits(HitTally::RocketHits));
    summary.rocket_parts_hit_taken += sum_u32(record.hits(HitTally::RocketPartsHit));
    summary.rocket_damage_taken += sum_f64(record.damage(DamageTally::Rockets));
    summary.missile_hits_taken += sum_u32(record.hits(HitTally::MissileHits));
    summary.missile_parts_hit_taken += sum_u32(record.hits(HitTally::MissilePartsHit));
    summary.missile_damage_taken += sum_f64(record.damage(DamageTally::Missiles));
    summary.ram_score_taken += sum_u32(record.hits(HitTally::RammedPartsLost));
    summary.battle_damage_taken += sum_f64(record.damage(DamageTally::Battle));
    summary.parts_lost_to_asteroids += record.parts_lost_to_asteroids.map_or(0.0, f64::from);

    if let Some(counts) = record.accuracy {
        acc.hits += u64::from(counts.hits);
        acc.shots += u64::from(counts.shots);
        acc.rocket_strikes += u64::from(counts.rocket_strikes);
        acc.rockets_fired += u64::from(counts.rockets_fired);
    }

    if record.waypoints.is_some() {
        let (count, time, deviation) = (
            record.waypoint_count(),
            record.waypoint_time(),
            record.waypoint_deviation(),
        );
        acc.waypoints.waypoint_count += count as f64;
        acc.waypoints.waypoint_time += time;
        acc.waypoints.waypoint_deviation += deviation;
        acc.waypoint_heats.push((count, time, deviation));
    }
}

/// One summary per craft in `crafts`, over the given heats.
pub fn summarize<'a>(
    heats: impl IntoIterator<Item = &'a HeatRecord>,
    crafts: &[String],
    with_waypoints: bool,
) -> BTreeMap<String, CraftSummary> {
    let mut accs: HashMap<&str, Accumulator> = crafts
        .iter()
        .map(|craft| (craft.as_str(), Accumulator::default()))
        .collect();
    for heat in heats {
        fold_heat(&mut accs, heat);
    }
    accs.into_iter()
        .map(|(craft, acc)| (craft.to_string(), acc.finish(with_waypoints)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TeamResults {
    pub wins: BTreeMap<String, u32>,
    pub draws: BTreeMap<String, u32>,
    pub deaths: BTreeMap<String, u32>,
}

impl TeamResults {
    pub fn team_names(&self) -> BTreeSet<&str> {
        self.wins
            .keys()
            .chain(self.draws.keys())
            .chain(self.deaths.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn standings(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.team_names().into_iter().collect();
        names.sort_by_key(|team| std::cmp::Reverse(self.wins.get(*team).copied().unwrap_or(0)));
        names
    }
}

fn tally(counter: &mut BTreeMap<String, u32>, rosters: &[TeamRoster]) {
    for roster in rosters {
        *counter.entry(roster.team.clone()).or_default() += 1;
    }
}

fn join_rosters(teams: &mut BTreeMap<String, Vec<String>>, rosters: &[TeamRoster]) {
    for roster in rosters {
        let members = teams.entry(roster.team.clone()).or_default();
        for member in &roster.members {
            if !members.contains(member) {
                members.push(member.clone());
            }
        }
    }
}

pub fn team_tallies<'a>(
    heats: impl IntoIterator<Item = &'a HeatRecord>,
) -> (TeamResults, BTreeMap<String, Vec<String>>) {
    let mut results = TeamResults::default();
    let mut teams = BTreeMap::new();
    for result in heats.into_iter().filter_map(|heat| heat.result.as_ref()) {
        match result.outcome {
            Outcome::Win => tally(&mut results.wins, &result.teams),
            Outcome::Draw => tally(&mut results.draws, &result.teams),
            Outcome::MutualAnnihilation => {}
        }
        tally(&mut results.deaths, &result.dead_teams);
        join_rosters(&mut teams, &result.teams);
        join_rosters(&mut teams, &result.dead_teams);
    }
    (results, teams)
}

/// `Name_<digits>` → `Name`; any other name is its own canonical name.
pub fn canonical_name(craft: &str) -> &str {
    match craft.rsplit_once('_') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => craft,
    }
}

pub fn duplicate_groups<'a>(crafts: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for craft in crafts {
        groups
            .entry(canonical_name(craft).to_string())
            .or_default()
            .push(craft.clone());
    }
    groups.retain(|_, members| members.len() > 1);
    groups
}

pub fn average_duplicates<T: Clone>(
    summaries: &mut BTreeMap<String, T>,
    groups: &BTreeMap<String, Vec<String>>,
    mean: impl Fn(&[&T]) -> T,
) {
    for (canonical, members) in groups {
        let present: Vec<T> = members
            .iter()
            .filter_map(|member| summaries.remove(member))
            .collect();
        if present.is_empty() {
            continue;
        }
        let refs: Vec<&T> = present.iter().collect();
        summaries.insert(canonical.clone(), mean(&refs));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMeta {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<(NaiveDateTime, NaiveDateTime)>,
    pub rounds: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentSummary {
    pub meta: SummaryMeta,
    pub craft: BTreeMap<String, CraftSummary>,
    pub per_round: BTreeMap<String, Vec<CraftSummary>>,
    pub team_results: TeamResults,
    pub teams: BTreeMap<String, Vec<String>>,
    pub has_waypoints: bool,
    pub failures: Vec<HeatFailure>,
}

impl TournamentSummary {
    pub fn from_tournament(tournament: &Tournament, merge_duplicates: bool) -> Self {
        let crafts = tournament.craft_names();
        let has_waypoints = tournament.has_waypoints();
        let mut craft = summarize(tournament.records(), &crafts, has_waypoints);

        let rounds: Vec<BTreeMap<String, CraftSummary>> = tournament
            .rounds
            .iter()
            .map(|round| summarize(round.records(), &crafts, has_waypoints))
            .collect();
        let mut per_round: BTreeMap<String, Vec<CraftSummary>> = crafts
            .iter()
            .map(|name| {
                let series = rounds
                    .iter()
                    .map(|round| round.get(name).cloned().unwrap_or_default())
                    .collect();
                (name.clone(), series)
            })
            .collect();

        if merge_duplicates {
            let groups = duplicate_groups(&crafts);
            for (canonical, members) in &groups {
                tracing::info!(craft = %canonical, duplicates = members.len(), "averaging duplicates");
            }
            average_duplicates(&mut craft, &groups, |set| {
                let mut mean = CraftSummary::mean(set.iter().copied());
                mean.fill_derived();
                mean
            });
            average_duplicates(&mut per_round, &groups, |set| {
                let rounds = set.first().map_or(0, |series| series.len());
                (0..rounds)
                    .map(|idx| {
                        let mut mean = CraftSummary::mean(set.iter().filter_map(|s| s.get(idx)));
                        mean.fill_derived();
                        mean
                    })
                    .collect()
            });
        }

        let (team_results, teams) = team_tallies(tournament.records());
        Self {
            meta: SummaryMeta {
                id: tournament.id.clone().unwrap_or_else(|| "unknown".to_string()),
                duration: tournament.time_window(),
                rounds: tournament.round_count,
            },
            craft,
            per_round,
            team_results,
            teams,
            has_waypoints,
            failures: tournament.failures.clone(),
        }
    }

    pub fn round_count(&self) -> usize {
        self.per_round.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ShotCounts, WaypointMark};
    use crate::heat::HeatResult;
    use crate::tournament::{HeatLog, RoundLog};

    fn craft(state: CraftState) -> CraftRecord {
        CraftRecord {
            state,
            ..CraftRecord::default()
        }
    }

    fn heat(duration: f64, crafts: Vec<(&str, CraftRecord)>, result: Option<HeatResult>) -> HeatRecord {
        HeatRecord {
            result,
            duration,
            started_at: None,
            craft: crafts
                .into_iter()
                .map(|(name, record)| (name.to_string(), record))
                .collect(),
        }
    }

    fn win(team: &str, members: &[&str]) -> Option<HeatResult> {
        Some(HeatResult {
            outcome: Outcome::Win,
            teams: vec![TeamRoster {
                team: team.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            }],
            dead_teams: Vec::new(),
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn by<T: Copy>(pairs: &[(&str, T)]) -> Option<ByCraft<T>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    fn dead(order: u32, time: f64) -> CraftRecord {
        CraftRecord {
            death_order: Some(order),
            death_time: Some(time),
            ..craft(CraftState::Dead)
        }
    }

    fn assert_partitions(summary: &CraftSummary) {
        let d = summary.death_count;
        assert_eq!(d.total, d.bullet + d.rocket + d.missile + d.ram + d.dirty + d.suicide);
        let k = summary.clean_kills;
        assert_eq!(k.total, k.bullet + k.rocket + k.missile + k.ram);
    }

    #[test]
    fn win_then_gun_death() {
        let first = heat(
            120.0,
            vec![("X", craft(CraftState::Alive)), ("Z", dead(1, 30.0))],
            win("X", &["X"]),
        );
        let second = heat(
            90.0,
            vec![
                (
                    "X",
                    CraftRecord {
                        hits_by: by(&[("Z", 5)]),
                        clean_kill_by: Some("Z".to_string()),
                        ..dead(1, 45.0)
                    },
                ),
                ("Z", craft(CraftState::Alive)),
            ],
            win("Z", &["Z"]),
        );
        let summary = summarize([&first, &second], &names(&["X", "Z"]), false);
        let x = &summary["X"];
        assert_eq!(x.wins, 1.0);
        assert_eq!(x.survived_count, 1.0);
        assert_eq!(x.death_count.as_array(), [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.clean_kills.as_array(), [0.0; 5]);
        assert_eq!(x.death_order, 1.0 + 0.5);
        assert_eq!(x.death_time, 120.0 + 45.0);
        assert_eq!(x.hits_taken, 5.0);

        let z = &summary["Z"];
        assert_eq!(z.clean_kills.as_array(), [1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(z.death_count.suicide, 1.0);
        assert_partitions(x);
        assert_partitions(z);
    }

    #[test]
    fn dirty_death_credits_assists() {
        let h = heat(
            60.0,
            vec![
                (
                    "Victim",
                    CraftRecord {
                        hits_by: by(&[("A", 3)]),
                        rammed_parts_lost_by: by(&[("B", 2)]),
                        ..dead(1, 20.0)
                    },
                ),
                ("A", craft(CraftState::Alive)),
                ("B", craft(CraftState::Alive)),
            ],
            None,
        );
        let summary = summarize([&h], &names(&["A", "B", "Victim"]), false);
        assert_eq!(summary["Victim"].death_count.dirty, 1.0);
        assert_eq!(summary["A"].assists, 1.0);
        assert_eq!(summary["B"].assists, 1.0);
        assert_eq!(summary["B"].ram_score, 2.0);
        assert_eq!(summary["A"].wins, 0.0);
    }

    #[test]
    fn rammer_death_is_dirty_not_suicide() {
        let h = heat(
            60.0,
            vec![
                ("Rammer", dead(1, 10.0)),
                (
                    "Target",
                    CraftRecord {
                        rammed_parts_lost_by: by(&[("Rammer", 4)]),
                        ..craft(CraftState::Alive)
                    },
                ),
            ],
            None,
        );
        let summary = summarize([&h], &names(&["Rammer", "Target"]), false);
        assert_eq!(summary["Rammer"].death_count.dirty, 1.0);
        assert_eq!(summary["Rammer"].death_count.suicide, 0.0);
    }

    #[test]
    fn battle_damage_to_self_is_not_credited() {
        let h = heat(
            60.0,
            vec![
                (
                    "A",
                    CraftRecord {
                        battle_damage_by: by(&[("A", 50.0), ("B", 20.0)]),
                        ..craft(CraftState::Alive)
                    },
                ),
                ("B", craft(CraftState::Alive)),
            ],
            None,
        );
        let summary = summarize([&h], &names(&["A", "B"]), false);
        assert_eq!(summary["A"].battle_damage, 0.0);
        assert_eq!(summary["A"].battle_damage_taken, 70.0);
        assert_eq!(summary["B"].battle_damage, 20.0);
    }

    #[test]
    fn zero_shots_has_zero_accuracy() {
        let h = heat(
            60.0,
            vec![(
                "A",
                CraftRecord {
                    accuracy: Some(ShotCounts::default()),
                    ..craft(CraftState::Alive)
                },
            )],
            None,
        );
        let summary = summarize([&h], &names(&["A"]), false);
        assert_eq!(summary["A"].accuracy, 0.0);
        assert_eq!(summary["A"].rocket_accuracy, 0.0);
        assert_eq!(summary["A"].damage_per_hit, 0.0);
    }

    #[test]
    fn accuracy_uses_summed_counts() {
        let shots = |hits, shots| CraftRecord {
            accuracy: Some(ShotCounts {
                hits,
                shots,
                rocket_strikes: 0,
                rockets_fired: 0,
            }),
            hp_remaining: Some(50.0),
            ..craft(CraftState::Alive)
        };
        let a = heat(60.0, vec![("A", shots(1, 2))], None);
        let b = heat(60.0, vec![("A", shots(9, 98))], None);
        let summary = summarize([&a, &b], &names(&["A"]), false);
        assert_eq!(summary["A"].accuracy, 10.0);
        assert_eq!(summary["A"].hp_remaining, 50.0);
    }

    fn marks(list: &[(u32, f64, f64)]) -> Option<Vec<WaypointMark>> {
        Some(
            list.iter()
                .map(|&(index, deviation, timestamp)| WaypointMark {
                    index,
                    deviation,
                    timestamp,
                })
                .collect(),
        )
    }

    #[test]
    fn waypoint_best_comes_from_longest_heat() {
        let with_marks = |list| CraftRecord {
            waypoints: marks(list),
            ..craft(CraftState::Alive)
        };
        let first = heat(60.0, vec![("Y", with_marks(&[(0, 0.5, 10.0), (1, 0.3, 25.0)]))], None);
        let second = heat(60.0, vec![("Y", with_marks(&[(0, 0.1, 5.0)]))], None);
        let summary = summarize([&first, &second], &names(&["Y"]), true);
        let wp = summary["Y"].waypoints.unwrap();
        assert_eq!(wp.waypoint_count, 3.0);
        assert_eq!(wp.waypoint_best_count, 2.0);
        assert_eq!(wp.waypoint_best_time, 15.0);
        assert!((wp.waypoint_best_deviation - 0.8).abs() < 1e-12);
    }

    #[test]
    fn craft_without_waypoints_gets_zero_best() {
        let h = heat(60.0, vec![("A", craft(CraftState::Alive))], None);
        let summary = summarize([&h], &names(&["A"]), true);
        assert_eq!(summary["A"].waypoints, Some(WaypointSummary::default()));
    }

    #[test]
    fn team_membership_is_a_union() {
        let mut first = heat(60.0, vec![], win("Red", &["A"]));
        if let Some(result) = first.result.as_mut() {
            result.dead_teams.push(TeamRoster {
                team: "Blue".to_string(),
                members: vec!["B".to_string()],
            });
        }
        let second = heat(60.0, vec![], win("Red", &["C", "A"]));
        let (results, teams) = team_tallies([&first, &second]);
        assert_eq!(results.wins["Red"], 2);
        assert_eq!(results.deaths["Blue"], 1);
        assert_eq!(teams["Red"], vec!["A", "C"]);
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("A_1"), "A");
        assert_eq!(canonical_name("Mk_II"), "Mk_II");
        assert_eq!(canonical_name("A_"), "A_");
        assert_eq!(canonical_name("_7"), "_7");
    }

    #[test]
    fn duplicates_are_averaged_under_canonical_name() {
        let stats = || CraftRecord {
            accuracy: Some(ShotCounts {
                hits: 4,
                shots: 8,
                rocket_strikes: 0,
                rockets_fired: 0,
            }),
            hits_by: by(&[("B", 2)]),
            clean_kill_by: Some("B".to_string()),
            ..dead(2, 30.0)
        };
        let tournament = Tournament::from_rounds(
            None,
            vec![RoundLog {
                name: "Round 0".to_string(),
                heats: vec![
                    HeatLog {
                        file: "1.log".to_string(),
                        record: heat(60.0, vec![("A_1", stats()), ("B", craft(CraftState::Alive))], None),
                    },
                    HeatLog {
                        file: "2.log".to_string(),
                        record: heat(60.0, vec![("A_2", stats()), ("B", craft(CraftState::Alive))], None),
                    },
                ],
            }],
        );
        let unmerged = TournamentSummary::from_tournament(&tournament, false);
        let merged = TournamentSummary::from_tournament(&tournament, true);

        assert!(!merged.craft.contains_key("A_1"));
        assert!(!merged.craft.contains_key("A_2"));
        assert_eq!(merged.craft["A"], unmerged.craft["A_1"]);
        assert_eq!(merged.per_round["A"], unmerged.per_round["A_1"]);
        assert_eq!(merged.craft["B"], unmerged.craft["B"]);
    }

    #[test]
    fn mean_is_component_wise() {
        let mut a = CraftSummary::default();
        a.death_count.total = 2.0;
        a.wins = 1.0;
        let mut b = CraftSummary::default();
        b.death_count.total = 4.0;
        b.wins = 3.0;
        let mean = CraftSummary::mean([&a, &b]);
        assert_eq!(mean.death_count.total, 3.0);
        assert_eq!(mean.wins, 2.0);
    }

    #[test]
    fn summary_serializes_composites_as_arrays() {
        let mut summary = CraftSummary::default();
        summary.death_count.total = 1.0;
        summary.death_count.suicide = 1.0;
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["deathCount"], serde_json::json!([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]));
        assert!(value.get("HPremaining").is_some());
        assert!(value.get("damage/hit").is_some());
        assert!(value.get("waypointCount").is_none());
        assert!(value.get("score").is_none());
    }
}
