use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::LEVEL_TIMER_FRAMES;
use crate::outcome::Outcome;

/// Scores a terminal outcome. Lower is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitnessFunction {
    /// Distance only.
    #[default]
    Progress,
    /// Distance, plus every frame left on the timer when the level is won.
    /// The jump at the win boundary is intentional.
    ProgressPlusTimeRemaining { horizon_frames: u32 },
    /// Distance times average speed. `frames` must be non-zero.
    ProgressTimesAverageSpeed,
}

impl FitnessFunction {
    pub const NAMES: [&'static str; 3] = [
        "progress",
        "progress-plus-time-remaining",
        "progress-times-average-speed",
    ];

    pub fn progress_plus_time_remaining() -> Self {
        Self::ProgressPlusTimeRemaining {
            horizon_frames: LEVEL_TIMER_FRAMES,
        }
    }

    pub fn score(self, won: bool, x_pos: u32, frames: u32) -> f64 {
        match self {
            Self::Progress => -f64::from(x_pos),
            Self::ProgressPlusTimeRemaining { horizon_frames } => {
                if won {
                    -((i64::from(x_pos) + i64::from(horizon_frames) - i64::from(frames)) as f64)
                } else {
                    -f64::from(x_pos)
                }
            }
            Self::ProgressTimesAverageSpeed => {
                let x = f64::from(x_pos);
                -x * (x / f64::from(frames))
            }
        }
    }

    pub fn score_outcome(self, outcome: &Outcome) -> f64 {
        self.score(outcome.won(), outcome.x_pos, outcome.frames)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => Self::NAMES[0],
            Self::ProgressPlusTimeRemaining { .. } => Self::NAMES[1],
            Self::ProgressTimesAverageSpeed => Self::NAMES[2],
        }
    }

    pub fn with_horizon(self, horizon: u32) -> Self {
        match self {
            Self::ProgressPlusTimeRemaining { .. } => Self::ProgressPlusTimeRemaining {
                horizon_frames: horizon,
            },
            other => other,
        }
    }
}

impl FromStr for FitnessFunction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "progress" | "Progress" => Ok(Self::Progress),
            "progress-plus-time-remaining" | "ProgressPlusTimeRemaining" => {
                Ok(Self::progress_plus_time_remaining())
            }
            "progress-times-average-speed" | "ProgressTimesAverageSpeed" => {
                Ok(Self::ProgressTimesAverageSpeed)
            }
            _ => Err(format!(
                "invalid fitness function: {value} (expected {})",
                Self::NAMES.join("|")
            )),
        }
    }
}

impl std::fmt::Display for FitnessFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;

    #[test]
    fn progress_is_negated_distance() {
        assert_eq!(FitnessFunction::Progress.score(false, 100, 50), -100.0);
        assert_eq!(FitnessFunction::Progress.score(true, 100, 50), -100.0);
    }

    #[test]
    fn time_remaining_rewards_only_wins() {
        let fitness = FitnessFunction::progress_plus_time_remaining();
        assert_eq!(
            fitness.score(true, 3161, 1200),
            -((3161 + 24_000 - 1200) as f64)
        );
        assert_eq!(fitness.score(false, 3161, 1200), -3161.0);
        // a slow win still beats any loss at the same position
        assert!(fitness.score(true, 3161, 23_000) < fitness.score(false, 3161, 1200));
        assert!(fitness.score(true, 3161, 1200) < fitness.score(true, 3161, 2400));
    }

    #[test]
    fn time_remaining_tolerates_overtime() {
        let fitness = FitnessFunction::ProgressPlusTimeRemaining { horizon_frames: 100 };
        assert_eq!(fitness.score(true, 10, 150), 40.0);
    }

    #[test]
    fn average_speed_scales_distance() {
        assert_eq!(
            FitnessFunction::ProgressTimesAverageSpeed.score(false, 200, 100),
            -400.0
        );
    }

    #[test]
    fn scores_outcomes_and_parses_names() {
        let outcome = Outcome {
            status: OutcomeStatus::Won,
            x_pos: 3161,
            frames: 1200,
        };
        for name in FitnessFunction::NAMES {
            let fitness: FitnessFunction = name.parse().unwrap();
            assert_eq!(fitness.as_str(), name);
            assert_eq!(
                fitness.score_outcome(&outcome),
                fitness.score(true, 3161, 1200)
            );
        }
        assert_eq!(
            "ProgressPlusTimeRemaining".parse::<FitnessFunction>(),
            Ok(FitnessFunction::progress_plus_time_remaining())
        );
        assert!("speed".parse::<FitnessFunction>().is_err());
        assert_eq!(
            FitnessFunction::progress_plus_time_remaining().with_horizon(600),
            FitnessFunction::ProgressPlusTimeRemaining { horizon_frames: 600 }
        );
    }
}
