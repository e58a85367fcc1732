use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Won,
    Died,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::Died => "died",
        }
    }
}

/// Terminal state reported by the emulator hook for one playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub x_pos: u32,
    pub frames: u32,
}

impl Outcome {
    pub fn won(&self) -> bool {
        self.status == OutcomeStatus::Won
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.status.as_str(), self.x_pos, self.frames)
    }
}
