use std::collections::BTreeMap;

use crate::scoring::ranking;
use crate::summary::{CraftSummary, TournamentSummary};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions<'a> {
    pub scored: bool,
    pub scores_only: bool,
    pub header: bool,
    pub cumulative: Option<&'a BTreeMap<String, Vec<f64>>>,
}

/// Three significant digits, trailing zeros dropped.
fn sig3(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (2 - magnitude).max(0) as usize;
    let text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn breakdown(total: f64, parts: &[f64]) -> String {
    let parts: Vec<String> = parts.iter().map(|p| format!("{p:.0}")).collect();
    format!("{total:.0} ({})", parts.join(" "))
}

fn craft_cells(name: &str, s: &CraftSummary, options: &ReportOptions) -> Vec<(&'static str, String)> {
    let mut cells = vec![("Name", name.to_string())];
    if options.scored {
        cells.push(("Score", format!("{:.3}", s.score.unwrap_or(0.0))));
    }
    if options.scores_only {
        return cells;
    }
    let d = s.death_count.as_array();
    let k = s.clean_kills.as_array();
    cells.extend([
        ("Wins", format!("{:.0}", s.wins)),
        ("Survive", format!("{:.0}", s.survived_count)),
        ("MIA", format!("{:.0}", s.mia_count)),
        ("Deaths (BRMRAS)", breakdown(d[0], &d[1..])),
        ("D.Order", format!("{:.3}", s.death_order)),
        ("D.Time", format!("{:.1}", s.death_time)),
        ("Kills (BRMR)", breakdown(k[0], &k[1..])),
        ("Assists", format!("{:.0}", s.assists)),
        ("Hits", format!("{:.0}", s.hits)),
        ("Damage", format!("{:.0}", s.bullet_damage)),
        ("DmgTaken", format!("{:.0}", s.bullet_damage_taken)),
        ("RocHits", format!("{:.0}", s.rocket_hits)),
        ("RocParts", format!("{:.0}", s.rocket_parts_hit)),
        ("RocDmg", format!("{:.0}", s.rocket_damage)),
        ("HitByRoc", format!("{:.0}", s.rocket_hits_taken)),
        ("MisHits", format!("{:.0}", s.missile_hits)),
        ("MisParts", format!("{:.0}", s.missile_parts_hit)),
        ("MisDmg", format!("{:.0}", s.missile_damage)),
        ("HitByMis", format!("{:.0}", s.missile_hits_taken)),
        ("Ram", format!("{:.0}", s.ram_score)),
        ("BD dealt", format!("{:.0}", s.battle_damage)),
        ("BD taken", format!("{:.0}", s.battle_damage_taken)),
        ("Ast.", format!("{:.0}", s.parts_lost_to_asteroids)),
        ("Acc%", sig3(s.accuracy)),
        ("RktAcc%", sig3(s.rocket_accuracy)),
        ("HP%", sig3(s.hp_remaining)),
        ("Dmg/Hit", format!("{:.1}", s.damage_per_hit)),
        ("Hits/Sp", format!("{:.1}", s.hits_per_spawn)),
        ("Dmg/Sp", format!("{:.1}", s.damage_per_spawn)),
    ]);
    if let Some(w) = s.waypoints {
        cells.extend([
            ("WPcount", format!("{:.0}", w.waypoint_count)),
            ("WPtime", format!("{:.1}", w.waypoint_time)),
            ("WPdev", format!("{:.1}", w.waypoint_deviation)),
            ("WPbestC", format!("{:.0}", w.waypoint_best_count)),
            ("WPbestT", format!("{:.1}", w.waypoint_best_time)),
            ("WPbestD", format!("{:.1}", w.waypoint_best_deviation)),
        ]);
    }
    cells
}

/// Main table; columns that read "0" for every craft are left out.
fn craft_table(summary: &TournamentSummary, options: &ReportOptions) -> Vec<String> {
    let ranked: Vec<(&str, &CraftSummary)> = if options.scored {
        ranking(summary)
    } else {
        summary
            .craft
            .iter()
            .map(|(name, craft)| (name.as_str(), craft))
            .collect()
    };
    let rows: Vec<Vec<(&'static str, String)>> = ranked
        .iter()
        .map(|(name, craft)| craft_cells(name, craft, options))
        .collect();
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let headers: Vec<&'static str> = first.iter().map(|(header, _)| *header).collect();

    let shown: Vec<usize> = (0..headers.len())
        .filter(|&col| rows.iter().any(|row| row[col].1 != "0"))
        .collect();
    let widths: Vec<usize> = (0..headers.len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].1.chars().count())
                .chain([headers[col].len()])
                .max()
                .unwrap_or(0)
                + 2
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        shown
            .iter()
            .zip(cells)
            .map(|(&col, cell)| format!("{cell:<width$}", width = widths[col]))
            .collect::<String>()
            .trim_end()
            .to_string()
    };
    let mut lines = vec![line(shown.iter().map(|&col| headers[col]).collect())];
    for row in &rows {
        lines.push(line(shown.iter().map(|&col| row[col].1.as_str()).collect()));
    }
    lines
}

fn default_team_labels(summary: &TournamentSummary) -> bool {
    let labels: Vec<String> = (0..summary.craft.len())
        .filter_map(|i| char::from_u32(u32::from(b'A') + i as u32))
        .map(String::from)
        .collect();
    summary
        .team_results
        .team_names()
        .iter()
        .all(|team| labels.iter().any(|label| label == team))
}

fn team_table(summary: &TournamentSummary) -> Vec<String> {
    let results = &summary.team_results;
    let teams = results.standings();
    if teams.is_empty() || default_team_labels(summary) {
        return Vec::new();
    }
    let width = teams.iter().map(|team| team.chars().count()).max().unwrap_or(0).max(4);
    let count = |counter: &BTreeMap<String, u32>, team: &str| counter.get(team).copied().unwrap_or(0);

    let mut lines = vec![format!("\n{:<width$}\tWins\tDraws\tDeaths\tVessels", "Team")];
    for team in teams {
        let members = summary
            .teams
            .get(team)
            .map(|members| members.join(", "))
            .unwrap_or_default();
        lines.push(format!(
            "{team:<width$}\t{}\t{}\t{}\t{members}",
            count(&results.wins, team),
            count(&results.draws, team),
            count(&results.deaths, team),
        ));
    }
    lines
}

fn cumulative_table(summary: &TournamentSummary, cumulative: &BTreeMap<String, Vec<f64>>) -> Vec<String> {
    let width = cumulative
        .keys()
        .map(|name| name.chars().count() + 1)
        .chain([23])
        .max()
        .unwrap_or(23);
    let rounds = cumulative.values().map(Vec::len).max().unwrap_or(0);
    let round_labels: Vec<String> = (0..rounds).map(|r| format!("{r:>7}")).collect();
    let mut lines = vec![format!(
        "\n{:<width$}\t{}",
        "Name \\ Cumulative Score",
        round_labels.join("\t")
    )];
    for (name, _) in ranking(summary) {
        let Some(series) = cumulative.get(name) else {
            continue;
        };
        let scores: Vec<String> = series.iter().map(|s| format!("{s:>7.2}")).collect();
        lines.push(format!("{:<width$}\t{}", format!("{name}:"), scores.join("\t")));
    }
    lines
}

fn header_line(summary: &TournamentSummary) -> Option<String> {
    let (start, end) = summary.meta.duration?;
    let seconds = (end - start).num_seconds();
    Some(format!(
        "Tournament {} of duration {}:{:02}:{:02} with {} rounds starting at {}",
        summary.meta.id,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        summary.meta.rounds,
        start,
    ))
}

pub fn render(summary: &TournamentSummary, options: &ReportOptions) -> String {
    let mut lines = Vec::new();
    if options.header
        && let Some(header) = header_line(summary)
    {
        lines.push(header);
    }
    lines.extend(craft_table(summary, options));
    lines.extend(team_table(summary));
    if options.scored
        && let Some(cumulative) = options.cumulative
    {
        lines.extend(cumulative_table(summary, cumulative));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{SummaryMeta, TeamResults};

    fn summary(craft: Vec<(&str, CraftSummary)>) -> TournamentSummary {
        TournamentSummary {
            meta: SummaryMeta {
                id: "42".to_string(),
                duration: None,
                rounds: 1,
            },
            craft: craft
                .into_iter()
                .map(|(name, s)| (name.to_string(), s))
                .collect(),
            per_round: BTreeMap::new(),
            team_results: TeamResults::default(),
            teams: BTreeMap::new(),
            has_waypoints: false,
            failures: Vec::new(),
        }
    }

    #[test]
    fn three_significant_digits() {
        assert_eq!(sig3(0.0), "0");
        assert_eq!(sig3(12.3456), "12.3");
        assert_eq!(sig3(100.0), "100");
        assert_eq!(sig3(0.5), "0.5");
        assert_eq!(sig3(33.333), "33.3");
    }

    #[test]
    fn all_zero_columns_are_hidden() {
        let mut a = CraftSummary {
            wins: 2.0,
            score: Some(2.0),
            ..CraftSummary::default()
        };
        a.death_count.total = 0.0;
        let b = CraftSummary {
            score: Some(1.0),
            ..CraftSummary::default()
        };
        let text = render(
            &summary(vec![("Alpha", a), ("Bravo", b)]),
            &ReportOptions {
                scored: true,
                ..ReportOptions::default()
            },
        );
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("Name"));
        assert!(header.contains("Score"));
        assert!(header.contains("Wins"));
        assert!(!header.contains("MIA"));
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[0].starts_with("Alpha"));
        assert!(rows[1].starts_with("Bravo"));
    }

    #[test]
    fn unscored_rows_follow_name_order() {
        let text = render(
            &summary(vec![
                ("Zulu", CraftSummary { wins: 5.0, ..CraftSummary::default() }),
                ("Alpha", CraftSummary::default()),
            ]),
            &ReportOptions::default(),
        );
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[0].starts_with("Alpha"));
        assert!(!text.contains("Score"));
    }

    #[test]
    fn single_letter_teams_are_not_listed() {
        let mut s = summary(vec![("Alpha", CraftSummary::default()), ("Bravo", CraftSummary::default())]);
        s.team_results.wins.insert("A".to_string(), 1);
        assert!(team_table(&s).is_empty());
        s.team_results.wins.insert("Red Squadron".to_string(), 1);
        assert!(!team_table(&s).is_empty());
    }

    #[test]
    fn cumulative_rows_are_labelled() {
        let s = summary(vec![(
            "Alpha",
            CraftSummary {
                score: Some(3.0),
                ..CraftSummary::default()
            },
        )]);
        let mut series = BTreeMap::new();
        series.insert("Alpha".to_string(), vec![1.0, 3.0]);
        let lines = cumulative_table(&s, &series);
        assert!(lines[0].contains("Cumulative Score"));
        assert!(lines[1].starts_with("Alpha:"));
        assert!(lines[1].ends_with("   3.00"));
    }
}
