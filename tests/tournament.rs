use std::fs;
use std::path::PathBuf;

use tournament_logs::config::{ParseOptions, ScoringConfig};
use tournament_logs::error::TournamentError;
use tournament_logs::scoring::{apply_scores, ranking};
use tournament_logs::summary::{CraftSummary, TournamentSummary};
use tournament_logs::tournament::{
    Tournament, TournamentTarget, default_target, latest_tournament_dir, load_tournament,
};

fn fixture_dir(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn load_fixture(name: &str) -> Tournament {
    load_tournament(&fixture_dir(name), &ParseOptions::default())
        .expect("fixture tournament should load")
}

fn assert_partitions(name: &str, craft: &CraftSummary) {
    let d = craft.death_count;
    assert_eq!(
        d.total,
        d.bullet + d.rocket + d.missile + d.ram + d.dirty + d.suicide,
        "{name} death partition"
    );
    let k = craft.clean_kills;
    assert_eq!(
        k.total,
        k.bullet + k.rocket + k.missile + k.ram,
        "{name} kill partition"
    );
}

#[test]
fn loads_rounds_and_isolates_broken_heats() {
    let tournament = load_fixture("Tournament 20240101");
    assert_eq!(tournament.id.as_deref(), Some("20240101"));
    assert_eq!(tournament.round_count, 2);
    assert_eq!(tournament.rounds.len(), 2);
    assert_eq!(tournament.rounds[0].name, "Round 0");
    let files: Vec<&str> = tournament.rounds[0]
        .heats
        .iter()
        .map(|heat| heat.file.as_str())
        .collect();
    assert_eq!(files, vec!["1-heat0.log", "2-heat1.log"]);

    assert_eq!(tournament.failures.len(), 1);
    let failure = &tournament.failures[0];
    assert_eq!(failure.round, "Round 0");
    assert_eq!(failure.heat, "3-broken.log");
    assert!(failure.error.contains("HPLEFT"), "{}", failure.error);

    assert_eq!(tournament.craft_names(), vec!["Alpha", "Bravo: Mk2", "Charlie"]);
}

#[test]
fn tournament_window_spans_all_heats() {
    let tournament = load_fixture("Tournament 20240101");
    let (start, end) = tournament.time_window().expect("heats carry timestamps");
    assert_eq!(start.to_string(), "2024-01-01 10:00:00");
    assert_eq!(end.to_string(), "2024-01-01 10:11:30");
}

#[test]
fn aggregates_every_craft() {
    let tournament = load_fixture("Tournament 20240101");
    let summary = TournamentSummary::from_tournament(&tournament, false);

    let alpha = &summary.craft["Alpha"];
    assert_eq!(alpha.wins, 1.0);
    assert_eq!(alpha.survived_count, 1.0);
    assert_eq!(alpha.death_count.as_array(), [2.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
    assert_eq!(alpha.clean_kills.as_array(), [2.0, 1.0, 1.0, 0.0, 0.0]);
    assert_eq!(alpha.hits, 12.0);
    assert_eq!(alpha.accuracy, 25.0);
    assert_eq!(alpha.bullet_damage, 240.5);
    assert_eq!(alpha.rocket_parts_hit, 4.0);
    assert_eq!(alpha.ram_score_taken, 5.0);
    assert_eq!(alpha.hp_remaining, 90.0);
    assert!((alpha.death_order - (1.0 + 2.0 / 3.0)).abs() < 1e-9);
    assert_eq!(alpha.death_time, 120.0 + 60.0 + 30.0);

    let bravo = &summary.craft["Bravo: Mk2"];
    assert_eq!(bravo.death_count.as_array(), [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(bravo.survived_count, 1.0);
    assert_eq!(bravo.mia_count, 1.0);
    assert_eq!(bravo.hits_taken, 12.0);
    assert_eq!(bravo.bullet_damage_taken, 240.5);
    assert_eq!(bravo.accuracy, 0.0);
    assert_eq!(bravo.hp_remaining, 40.0);

    let charlie = &summary.craft["Charlie"];
    assert_eq!(charlie.death_count.as_array(), [2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    assert_eq!(charlie.clean_kills.as_array(), [1.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(charlie.assists, 1.0);
    assert_eq!(charlie.ram_score, 5.0);
    assert_eq!(charlie.missile_parts_hit, 3.0);
    assert_eq!(charlie.rocket_parts_hit_taken, 4.0);
    assert!(charlie.waypoints.is_none());

    for (name, craft) in &summary.craft {
        assert_partitions(name, craft);
    }
}

#[test]
fn tallies_team_results() {
    let tournament = load_fixture("Tournament 20240101");
    let summary = TournamentSummary::from_tournament(&tournament, false);
    let results = &summary.team_results;
    assert_eq!(results.wins.get("Alpha"), Some(&1));
    assert_eq!(results.draws.get("Bravo: Mk2"), Some(&1));
    assert_eq!(results.draws.get("Charlie"), Some(&1));
    assert_eq!(results.deaths.get("Alpha"), Some(&1));
    assert_eq!(results.deaths.get("Charlie"), Some(&1));
    assert_eq!(summary.teams["Bravo: Mk2"], vec!["Bravo: Mk2"]);
    assert_eq!(results.standings()[0], "Alpha");
}

#[test]
fn per_round_summaries_cover_every_round() {
    let tournament = load_fixture("Tournament 20240101");
    let summary = TournamentSummary::from_tournament(&tournament, false);
    for rounds in summary.per_round.values() {
        assert_eq!(rounds.len(), 2);
    }
    assert_eq!(summary.per_round["Bravo: Mk2"][1].mia_count, 1.0);
    assert_eq!(summary.per_round["Alpha"][0].wins, 1.0);
}

#[test]
fn scores_rank_the_winner_first() {
    let tournament = load_fixture("Tournament 20240101");
    let mut summary = TournamentSummary::from_tournament(&tournament, false);
    apply_scores(
        &mut summary,
        &ScoringConfig {
            zero_lowest_score: true,
            ..ScoringConfig::default()
        },
    );
    let order: Vec<&str> = ranking(&summary).into_iter().map(|(name, _)| name).collect();
    assert_eq!(order, vec!["Alpha", "Charlie", "Bravo: Mk2"]);
    assert_eq!(summary.craft["Bravo: Mk2"].score, Some(0.0));
}

#[test]
fn reruns_are_identical() {
    let first = TournamentSummary::from_tournament(&load_fixture("Tournament 20240101"), false);
    let second = TournamentSummary::from_tournament(&load_fixture("Tournament 20240101"), false);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.craft).unwrap(),
        serde_json::to_string(&second.craft).unwrap()
    );
}

#[test]
fn heat_limit_truncates_rounds() {
    let options = ParseOptions {
        heat_limit: Some(1),
        ..ParseOptions::default()
    };
    let tournament = load_tournament(&fixture_dir("Tournament 20240101"), &options)
        .expect("fixture tournament should load");
    assert_eq!(tournament.heat_count(), 2);
    assert!(tournament.failures.is_empty());
}

#[test]
fn current_dir_mode_reads_one_round() {
    let options = ParseOptions {
        current_dir: true,
        ..ParseOptions::default()
    };
    let dir = fixture_dir("Tournament 20240101").join("Round 1");
    let tournament = load_tournament(&dir, &options).expect("round should load");
    assert_eq!(tournament.rounds.len(), 1);
    assert_eq!(tournament.heat_count(), 1);
}

#[test]
fn empty_directory_is_an_empty_tournament() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("Round 0")).unwrap();
    let err = load_tournament(dir.path(), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, TournamentError::EmptyTournament { .. }));
}

#[test]
fn latest_tournament_uses_natural_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["Tournament 9", "Tournament 10", "Tournament 2", "misc"] {
        fs::create_dir(dir.path().join(name)).unwrap();
    }
    let latest = latest_tournament_dir(dir.path()).unwrap();
    assert!(latest.ends_with("Tournament 10"));
}

#[test]
fn missing_tournament_folder_falls_back_to_current_dir() {
    let logs = tempfile::tempdir().unwrap();
    fs::create_dir(logs.path().join("misc")).unwrap();
    let round = fixture_dir("Tournament 20240101").join("Round 1");

    let target = default_target(logs.path(), &round);
    assert_eq!(
        target,
        TournamentTarget {
            dir: round.clone(),
            current_dir: true,
        }
    );
    let options = ParseOptions {
        current_dir: target.current_dir,
        ..ParseOptions::default()
    };
    let tournament = load_tournament(&target.dir, &options).expect("round should load");
    assert_eq!(tournament.heat_count(), 1);

    fs::create_dir(logs.path().join("Tournament 3")).unwrap();
    let target = default_target(logs.path(), &round);
    assert!(!target.current_dir);
    assert!(target.dir.ends_with("Tournament 3"));
}
