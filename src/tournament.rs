use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::config::ParseOptions;
use crate::error::TournamentError;
use crate::heat::{HeatRecord, read_heat_log};

#[derive(Debug, Clone, PartialEq)]
pub struct HeatLog {
    pub file: String,
    pub record: HeatRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundLog {
    pub name: String,
    pub heats: Vec<HeatLog>,
}

impl RoundLog {
    pub fn records(&self) -> impl Iterator<Item = &HeatRecord> {
        self.heats.iter().map(|heat| &heat.record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatFailure {
    pub round: String,
    pub heat: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tournament {
    pub id: Option<String>,
    pub round_count: usize,
    pub rounds: Vec<RoundLog>,
    pub failures: Vec<HeatFailure>,
}

impl Tournament {
    pub fn from_rounds(id: Option<String>, rounds: Vec<RoundLog>) -> Self {
        Self {
            id,
            round_count: rounds.len(),
            rounds,
            failures: Vec::new(),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &HeatRecord> {
        self.rounds.iter().flat_map(RoundLog::records)
    }

    pub fn heat_count(&self) -> usize {
        self.rounds.iter().map(|round| round.heats.len()).sum()
    }

    pub fn craft_names(&self) -> Vec<String> {
        self.records()
            .flat_map(|heat| heat.craft.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_waypoints(&self) -> bool {
        self.records()
            .flat_map(|heat| heat.craft.values())
            .any(|craft| craft.waypoints.is_some())
    }

    /// Earliest heat start and latest heat end, over heats that carried a timestamp.
    /// A heat whose end falls outside the calendar range is left out.
    pub fn time_window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.records()
            .filter_map(|heat| {
                let start = heat.started_at?;
                let length = TimeDelta::try_milliseconds((heat.duration * 1000.0).round() as i64)?;
                Some((start, start.checked_add_signed(length)?))
            })
            .reduce(|(lo, hi), (start, end)| (lo.min(start), hi.max(end)))
    }
}

impl Serialize for Tournament {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rounds = serializer.serialize_map(Some(self.rounds.len()))?;
        for round in &self.rounds {
            rounds.serialize_entry(&round.name, &HeatsByFile(&round.heats))?;
        }
        rounds.end()
    }
}

struct HeatsByFile<'a>(&'a [HeatLog]);

impl Serialize for HeatsByFile<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut heats = serializer.serialize_map(Some(self.0.len()))?;
        for heat in self.0 {
            heats.serialize_entry(&heat.file, &heat.record)?;
        }
        heats.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NaturalKey {
    Number(u64),
    Text(String),
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NaturalKey::Number(a), NaturalKey::Number(b)) => a.cmp(b),
            (NaturalKey::Number(_), NaturalKey::Text(_)) => Ordering::Less,
            (NaturalKey::Text(_), NaturalKey::Number(_)) => Ordering::Greater,
            (NaturalKey::Text(a), NaturalKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// "Round 10" sorts after "Round 9": the second space-separated token is used as a
/// number when it parses as one.
pub fn natural_sort_key(name: &str) -> NaturalKey {
    name.split(' ')
        .nth(1)
        .and_then(|token| token.parse::<u64>().ok())
        .map(NaturalKey::Number)
        .unwrap_or_else(|| NaturalKey::Text(name.to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, TournamentError> {
    let entries = fs::read_dir(dir).map_err(|source| TournamentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TournamentError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn sorted_naturally(mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.sort_by_key(|dir| natural_sort_key(&file_name(dir)));
    dirs
}

pub fn latest_tournament_dir(logs_dir: &Path) -> Option<PathBuf> {
    let dirs = list_dir(logs_dir)
        .ok()?
        .into_iter()
        .filter(|path| path.is_dir() && file_name(path).starts_with("Tournament"))
        .collect();
    sorted_naturally(dirs).pop()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentTarget {
    pub dir: PathBuf,
    pub current_dir: bool,
}

/// The latest tournament under `logs_dir`; without one, `fallback` is read in current-dir mode.
pub fn default_target(logs_dir: &Path, fallback: &Path) -> TournamentTarget {
    match latest_tournament_dir(logs_dir) {
        Some(dir) => TournamentTarget {
            dir,
            current_dir: false,
        },
        None => {
            tracing::warn!(
                logs_dir = %logs_dir.display(),
                "no tournament folders found, parsing {} as a single round",
                fallback.display()
            );
            TournamentTarget {
                dir: fallback.to_path_buf(),
                current_dir: true,
            }
        }
    }
}

pub fn tournament_id(dir: &Path) -> Option<String> {
    let text = dir.to_string_lossy();
    let (_, rest) = text.split_once("Tournament ")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

fn is_heat_log(path: &Path) -> bool {
    let name = file_name(path);
    path.is_file()
        && name.ends_with(".log")
        && name.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn heat_logs(round_dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>, TournamentError> {
    let mut logs: Vec<PathBuf> = list_dir(round_dir)?
        .into_iter()
        .filter(|path| is_heat_log(path))
        .collect();
    logs.sort_by_key(|path| file_name(path));
    if let Some(limit) = limit {
        logs.truncate(limit);
    }
    Ok(logs)
}

fn load_round(name: String, logs: &[PathBuf]) -> (RoundLog, Vec<HeatFailure>) {
    let parsed: Vec<(String, Result<HeatRecord, String>)> = logs
        .par_iter()
        .map(|path| {
            let file = file_name(path);
            let record = read_heat_log(path).map_err(|err| err.to_string());
            (file, record)
        })
        .collect();

    let mut heats = Vec::with_capacity(parsed.len());
    let mut failures = Vec::new();
    for (file, record) in parsed {
        match record {
            Ok(record) => heats.push(HeatLog { file, record }),
            Err(error) => {
                tracing::warn!(round = %name, heat = %file, %error, "skipping heat log");
                failures.push(HeatFailure {
                    round: name.clone(),
                    heat: file,
                    error,
                });
            }
        }
    }
    (RoundLog { name, heats }, failures)
}

pub fn load_tournament(dir: &Path, options: &ParseOptions) -> Result<Tournament, TournamentError> {
    let round_dirs: Vec<PathBuf> = if options.current_dir {
        vec![dir.to_path_buf()]
    } else {
        let dirs = list_dir(dir)?
            .into_iter()
            .filter(|path| path.is_dir())
            .collect();
        sorted_naturally(dirs)
    };

    let mut tournament = Tournament {
        id: tournament_id(dir),
        round_count: round_dirs
            .iter()
            .filter(|path| file_name(path).starts_with("Round"))
            .count(),
        ..Tournament::default()
    };

    for round_dir in &round_dirs {
        let logs = heat_logs(round_dir, options.heat_limit)?;
        if logs.is_empty() {
            continue;
        }
        let (round, failures) = load_round(file_name(round_dir), &logs);
        tournament.failures.extend(failures);
        if !round.heats.is_empty() {
            tournament.rounds.push(round);
        }
    }

    if tournament.heat_count() == 0 {
        return Err(TournamentError::EmptyTournament {
            path: dir.to_path_buf(),
        });
    }
    tracing::info!(
        rounds = tournament.rounds.len(),
        heats = tournament.heat_count(),
        failures = tournament.failures.len(),
        "loaded tournament"
    );
    Ok(tournament)
}
