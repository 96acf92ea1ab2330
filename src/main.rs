use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tournament_logs::config::{
    ParseOptions, ScoringConfig, format_weights, logs_dir_from_env, parse_weights,
    waypoint_weights,
};
use tournament_logs::export;
use tournament_logs::report::{self, ReportOptions};
use tournament_logs::scoring::{ScoreWeights, apply_scores, cumulative_scores};
use tournament_logs::summary::TournamentSummary;
use tournament_logs::tournament::{TournamentTarget, default_target, load_tournament};

/// Parse competition logs and compute tournament scores.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Tournament folders to parse; defaults to the latest one under the logs directory.
    tournaments: Vec<PathBuf>,

    /// Don't print results to the console.
    #[arg(short, long)]
    quiet: bool,

    /// Don't write results.json, summary.json or summary.csv.
    #[arg(short = 'n', long)]
    no_files: bool,

    /// Don't compute scores.
    #[arg(long)]
    no_score: bool,

    /// Only show the scores in the console table.
    #[arg(short, long)]
    scores_only: bool,

    /// Score weights as comma-separated values, in canonical field order.
    #[arg(short, long, env = "SCORE_WEIGHTS")]
    weights: Option<String>,

    /// Parse the logs in the given folder instead of per-round sub-folders.
    #[arg(short, long)]
    current_dir: bool,

    /// Don't show the cumulative score per round.
    #[arg(long)]
    no_cumulative: bool,

    /// Don't show the tournament header line.
    #[arg(long)]
    no_header: bool,

    /// Only the first N heats of each round are parsed.
    #[arg(short = 'N', value_name = "N")]
    heat_limit: Option<usize>,

    /// Shift scores so the lowest score is zero.
    #[arg(short, long)]
    zero_lowest_score: bool,

    /// Print the score weights and exit.
    #[arg(long)]
    show_weights: bool,

    /// Use the waypoint race preset weights.
    #[arg(long)]
    waypoint_scores: bool,

    /// Average crafts named `<name>_<number>` into `<name>`.
    #[arg(long)]
    average_duplicates: bool,
}

impl Cli {
    fn weights(&self) -> Result<ScoreWeights> {
        if self.waypoint_scores {
            return Ok(waypoint_weights());
        }
        match self.weights.as_deref() {
            Some(text) => parse_weights(text).context("invalid --weights"),
            None => Ok(ScoreWeights::default()),
        }
    }

    fn targets(&self) -> Vec<TournamentTarget> {
        if !self.tournaments.is_empty() {
            return self
                .tournaments
                .iter()
                .map(|dir| TournamentTarget {
                    dir: dir.clone(),
                    current_dir: self.current_dir,
                })
                .collect();
        }
        if self.current_dir {
            return vec![TournamentTarget {
                dir: PathBuf::from("."),
                current_dir: true,
            }];
        }
        vec![default_target(&logs_dir_from_env(), Path::new("."))]
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn process(target: &TournamentTarget, cli: &Cli, config: &ScoringConfig) -> Result<()> {
    let dir = target.dir.as_path();
    let options = ParseOptions {
        heat_limit: cli.heat_limit,
        current_dir: target.current_dir,
    };
    let tournament = load_tournament(dir, &options)
        .with_context(|| format!("load tournament {}", dir.display()))?;
    if !cli.no_files {
        export::write_results(dir, &tournament)?;
    }

    let scored = !cli.no_score;
    let mut summary = TournamentSummary::from_tournament(&tournament, config.average_duplicates);
    if scored {
        apply_scores(&mut summary, config);
    }
    let cumulative = (scored && !cli.no_cumulative).then(|| cumulative_scores(&summary, &config.weights));

    if !cli.no_files && !summary.craft.is_empty() {
        export::write_summary_json(dir, &summary, scored.then_some(&config.weights))?;
        export::write_summary_csv(dir, &summary, cumulative.as_ref())?;
    }

    if !cli.quiet {
        let text = report::render(
            &summary,
            &ReportOptions {
                scored,
                scores_only: cli.scores_only,
                header: !cli.no_header && !target.current_dir,
                cumulative: cumulative.as_ref(),
            },
        );
        println!("{text}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let cli = Cli::parse();
    let config = ScoringConfig {
        weights: cli.weights()?,
        zero_lowest_score: cli.zero_lowest_score,
        average_duplicates: cli.average_duplicates,
    };
    if cli.show_weights {
        println!("{}", format_weights(&config.weights));
        return Ok(());
    }

    for target in cli.targets() {
        if let Err(err) = process(&target, &cli, &config) {
            tracing::warn!(dir = %target.dir.display(), "{err:#}");
        }
    }
    Ok(())
}
