use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::scoring::{FIELD_COUNT, ScoreField, ScoreWeights};

pub const DEFAULT_LOGS_DIR: &str = "Logs";

#[rustfmt::skip]
pub const DEFAULT_WEIGHTS: [f64; FIELD_COUNT] = [
    1.0, 0.0, 0.0, -1.0, 1.0, 2e-3, 3.0, 1.5, 4e-3, 0.0,
    1e-4, 4e-5, 0.035, 0.0, 6e-4, 0.0, 1.5e-4, 5e-5, 0.15, 0.0,
    0.002, 0.0, 3e-5, 1.5e-5, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 10.0, -1.0, -1.0,
];

pub fn waypoint_weights() -> ScoreWeights {
    let mut weights = [0.0; FIELD_COUNT];
    weights[ScoreField::WaypointCount as usize] = 1.0;
    weights[ScoreField::WaypointTime as usize] = -0.02;
    weights[ScoreField::WaypointDeviation as usize] = -0.003;
    ScoreWeights::from_array(weights)
}

pub fn parse_weights(text: &str) -> Result<ScoreWeights, ConfigError> {
    let values = text
        .split(',')
        .enumerate()
        .map(|(index, value)| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidWeight {
                    index,
                    value: value.trim().to_string(),
                })
        })
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(ScoreWeights::from_slice(&values))
}

/// `field: weight` lines, weights aligned after the longest field name.
pub fn format_weights(weights: &ScoreWeights) -> String {
    let width = ScoreField::ALL
        .iter()
        .map(|field| field.name().len() + 1)
        .max()
        .unwrap_or(0);
    weights
        .iter()
        .map(|(field, weight)| format!("{:<width$} {weight:?}", format!("{}:", field.name())))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub zero_lowest_score: bool,
    pub average_duplicates: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseOptions {
    /// Only the first `n` heats of each round are read.
    pub heat_limit: Option<usize>,
    pub current_dir: bool,
}

pub fn logs_dir_from_env() -> PathBuf {
    env::var("TOURNAMENT_LOGS_DIR")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_vector() {
        let text = "1,0,0,-1,1,2e-3,3,1.5,4e-3,0,1e-4,4e-5,0.035,0,6e-4,0,1.5e-4,5e-5,0.15,0,0.002,0,3e-5,1.5e-5,0.075,0,0,0,0,0,0,10,-1,-1";
        assert_eq!(parse_weights(text).unwrap(), ScoreWeights::default());
    }

    #[test]
    fn rejects_non_numeric_entries() {
        assert_eq!(
            parse_weights("1, 2, x"),
            Err(ConfigError::InvalidWeight {
                index: 2,
                value: "x".to_string()
            })
        );
    }

    #[test]
    fn long_vectors_are_truncated() {
        let text = vec!["1"; FIELD_COUNT + 3].join(",");
        let weights = parse_weights(&text).unwrap();
        assert!(weights.iter().all(|(_, w)| w == 1.0));
    }

    #[test]
    fn waypoint_preset_only_scores_waypoints() {
        let weights = waypoint_weights();
        for (field, weight) in weights.iter() {
            assert_eq!(weight != 0.0, field.is_waypoint(), "{}", field.name());
        }
    }

    #[test]
    fn weights_are_listed_aligned() {
        let text = format_weights(&ScoreWeights::default());
        let first = text.lines().next().unwrap();
        assert_eq!(first, format!("wins:{} 1.0", " ".repeat(16)));
        assert!(text.contains("\nwaypointDeviation:    -1.0"));
        assert_eq!(text.lines().count(), FIELD_COUNT);
    }
}
