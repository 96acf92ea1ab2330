use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::scoring::{ScoreWeights, ranking};
use crate::summary::{CraftSummary, SummaryMeta, TeamResults, TournamentSummary};
use crate::tournament::{HeatFailure, Tournament};

pub const RESULTS_FILE: &str = "results.json";
pub const SUMMARY_JSON_FILE: &str = "summary.json";
pub const SUMMARY_CSV_FILE: &str = "summary.csv";

#[derive(Serialize)]
struct MetaFile<'a> {
    #[serde(flatten)]
    meta: &'a SummaryMeta,
    #[serde(rename = "score weights", skip_serializing_if = "Option::is_none")]
    score_weights: Option<&'a ScoreWeights>,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    meta: MetaFile<'a>,
    craft: &'a BTreeMap<String, CraftSummary>,
    #[serde(rename = "team results")]
    team_results: &'a TeamResults,
    teams: &'a BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "no_failures")]
    failures: &'a [HeatFailure],
}

fn no_failures(failures: &&[HeatFailure]) -> bool {
    failures.is_empty()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("serialize {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn write_results(dir: &Path, tournament: &Tournament) -> Result<PathBuf> {
    let path = dir.join(RESULTS_FILE);
    write_json(&path, tournament)?;
    Ok(path)
}

pub fn write_summary_json(
    dir: &Path,
    summary: &TournamentSummary,
    weights: Option<&ScoreWeights>,
) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_JSON_FILE);
    let file = SummaryFile {
        meta: MetaFile {
            meta: &summary.meta,
            score_weights: weights,
        },
        craft: &summary.craft,
        team_results: &summary.team_results,
        teams: &summary.teams,
        failures: &summary.failures,
    };
    write_json(&path, &file)?;
    Ok(path)
}

pub fn write_summary_csv(
    dir: &Path,
    summary: &TournamentSummary,
    cumulative: Option<&BTreeMap<String, Vec<f64>>>,
) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_CSV_FILE);
    let text = summary_csv(summary, cumulative)?;
    std::fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Two decimals, truncated toward zero.
fn truncate2(value: f64) -> String {
    let truncated = (value * 100.0).trunc() / 100.0;
    let truncated = if truncated == 0.0 { 0.0 } else { truncated };
    format!("{truncated:?}")
}

fn metric_columns(s: &CraftSummary) -> Vec<(&'static str, f64)> {
    let d = s.death_count;
    let k = s.clean_kills;
    let mut columns = vec![
        ("wins", s.wins),
        ("survivedCount", s.survived_count),
        ("miaCount", s.mia_count),
        ("deathCount", d.total),
        ("dcB", d.bullet),
        ("dcR", d.rocket),
        ("dcM", d.missile),
        ("dcRam", d.ram),
        ("dcA", d.dirty),
        ("dcS", d.suicide),
        ("deathOrder", s.death_order),
        ("deathTime", s.death_time),
        ("cleanKills", k.total),
        ("ckB", k.bullet),
        ("ckR", k.rocket),
        ("ckM", k.missile),
        ("ckRam", k.ram),
        ("assists", s.assists),
        ("hits", s.hits),
        ("hitsTaken", s.hits_taken),
        ("bulletDamage", s.bullet_damage),
        ("bulletDamageTaken", s.bullet_damage_taken),
        ("rocketHits", s.rocket_hits),
        ("rocketHitsTaken", s.rocket_hits_taken),
        ("rocketPartsHit", s.rocket_parts_hit),
        ("rocketPartsHitTaken", s.rocket_parts_hit_taken),
        ("rocketDamage", s.rocket_damage),
        ("rocketDamageTaken", s.rocket_damage_taken),
        ("missileHits", s.missile_hits),
        ("missileHitsTaken", s.missile_hits_taken),
        ("missilePartsHit", s.missile_parts_hit),
        ("missilePartsHitTaken", s.missile_parts_hit_taken),
        ("missileDamage", s.missile_damage),
        ("missileDamageTaken", s.missile_damage_taken),
        ("ramScore", s.ram_score),
        ("ramScoreTaken", s.ram_score_taken),
        ("battleDamage", s.battle_damage),
        ("battleDamageTaken", s.battle_damage_taken),
        ("partsLostToAsteroids", s.parts_lost_to_asteroids),
        ("HPremaining", s.hp_remaining),
        ("accuracy", s.accuracy),
        ("rocket_accuracy", s.rocket_accuracy),
        ("damage/hit", s.damage_per_hit),
        ("hits/spawn", s.hits_per_spawn),
        ("damage/spawn", s.damage_per_spawn),
    ];
    if let Some(w) = s.waypoints {
        columns.extend([
            ("waypointCount", w.waypoint_count),
            ("waypointTime", w.waypoint_time),
            ("waypointDeviation", w.waypoint_deviation),
            ("waypointBestCount", w.waypoint_best_count),
            ("waypointBestTime", w.waypoint_best_time),
            ("waypointBestDeviation", w.waypoint_best_deviation),
        ]);
    }
    columns
}

fn csv_section(rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).context("write csv row")?;
    }
    let bytes = writer.into_inner().context("flush csv")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

fn craft_rows(summary: &TournamentSummary) -> Vec<Vec<String>> {
    let ranked = ranking(summary);
    let scored = ranked.iter().any(|(_, craft)| craft.score.is_some());
    let Some((_, first)) = ranked.first() else {
        return Vec::new();
    };

    let mut header = vec!["craft".to_string()];
    if scored {
        header.push("score".to_string());
    }
    header.extend(metric_columns(first).into_iter().map(|(name, _)| name.to_string()));

    let mut rows = vec![header];
    for (name, craft) in ranked {
        let mut row = vec![name.to_string()];
        if scored {
            row.push(truncate2(craft.score.unwrap_or(0.0)));
        }
        row.extend(metric_columns(craft).into_iter().map(|(_, value)| truncate2(value)));
        rows.push(row);
    }
    rows
}

fn team_rows(summary: &TournamentSummary) -> Vec<Vec<String>> {
    let results = &summary.team_results;
    let mut rows = vec![
        ["Team", "Wins", "Draws", "Deaths", "Vessels"]
            .map(str::to_string)
            .to_vec(),
    ];
    for team in results.standings() {
        let count = |counter: &BTreeMap<String, u32>| counter.get(team).copied().unwrap_or(0).to_string();
        let mut row = vec![
            team.to_string(),
            count(&results.wins),
            count(&results.draws),
            count(&results.deaths),
        ];
        row.extend(summary.teams.get(team).into_iter().flatten().cloned());
        rows.push(row);
    }
    rows
}

fn cumulative_rows(
    summary: &TournamentSummary,
    cumulative: &BTreeMap<String, Vec<f64>>,
) -> Vec<Vec<String>> {
    let rounds = cumulative.values().map(Vec::len).max().unwrap_or(0);
    let mut header = vec!["Name \\ Cumulative Score Per Round".to_string()];
    header.extend((0..rounds).map(|round| format!("{round:>7}")));
    let mut rows = vec![header];
    for (name, _) in ranking(summary) {
        let Some(series) = cumulative.get(name) else {
            continue;
        };
        let mut row = vec![name.to_string()];
        row.extend(series.iter().map(|score| format!("{score:.2}")));
        rows.push(row);
    }
    rows
}

pub fn summary_csv(
    summary: &TournamentSummary,
    cumulative: Option<&BTreeMap<String, Vec<f64>>>,
) -> Result<String> {
    let mut sections = vec![csv_section(&craft_rows(summary))?, csv_section(&team_rows(summary))?];
    if let Some(cumulative) = cumulative {
        sections.push(csv_section(&cumulative_rows(summary, cumulative))?);
    }
    Ok(sections.join("\n"))
}
