use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smb_core::{
    Configuration, Encoding, FitnessFunction, FrameEvents, MovieCodec, MovieOptions, Outcome,
    Representation,
};

use crate::emulator::{Emulator, OutcomeParser};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvaluationState {
    Ok,
    Error,
}

impl EvaluationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }
}

/// What the search engine gets back for one configuration. Failed runs
/// score `+inf` so a minimizing search never prefers them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub state: EvaluationState,
    pub score: f64,
    pub outcome: Option<Outcome>,
}

impl EvaluationResult {
    pub fn ok(score: f64, outcome: Outcome) -> Self {
        Self {
            state: EvaluationState::Ok,
            score,
            outcome: Some(outcome),
        }
    }

    pub fn error() -> Self {
        Self {
            state: EvaluationState::Error,
            score: f64::INFINITY,
            outcome: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.state == EvaluationState::Ok
    }
}

/// The emulator exited without printing an outcome line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl fmt::Display for NoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exit = self
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        write!(
            f,
            "emulator printed no outcome line (exit={exit})\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

impl std::error::Error for NoOutcome {}

/// decode → encode → play → parse → score, for one configuration at a time.
///
/// Holds nothing mutable, so one instance is shared by every worker thread.
/// Each playback gets its own uniquely named temporary movie that is removed
/// when the call returns, whether or not the run succeeded.
pub struct Harness<E> {
    representation: Representation,
    fitness: FitnessFunction,
    codec: MovieCodec,
    emulator: E,
    parser: OutcomeParser,
    scratch_dir: Option<PathBuf>,
}

impl<E: Emulator> Harness<E> {
    pub fn new(representation: Representation, fitness: FitnessFunction, emulator: E) -> Result<Self> {
        Ok(Self {
            representation,
            fitness,
            codec: MovieCodec::default(),
            emulator,
            parser: OutcomeParser::new()?,
            scratch_dir: None,
        })
    }

    pub fn with_codec(mut self, codec: MovieCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Directory for temporary movies. Defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn fitness(&self) -> FitnessFunction {
        self.fitness
    }

    pub fn codec(&self) -> &MovieCodec {
        &self.codec
    }

    pub fn emulator(&self) -> &E {
        &self.emulator
    }

    pub fn decode(&self, configuration: &Configuration) -> Result<FrameEvents> {
        self.representation
            .decode(configuration)
            .with_context(|| format!("{} decode failed", self.representation.id()))
    }

    pub fn movie(&self, events: &FrameEvents, options: &MovieOptions) -> String {
        self.codec.encode(events, options)
    }

    /// Plays finished movie text and parses the outcome. Errors carry both
    /// captured streams.
    pub fn run_movie(&self, movie: &str) -> Result<Outcome> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("smb-").suffix(".fm2");
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("failed creating temporary movie")?;
        file.write_all(movie.as_bytes())
            .context("failed writing temporary movie")?;
        file.flush().context("failed flushing temporary movie")?;

        let output = self.emulator.play(file.path())?;
        drop(file);

        self.parser.parse(&output.stdout).ok_or_else(|| {
            NoOutcome {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
            }
            .into()
        })
    }

    /// Plays decoded events with header and warm-up padding.
    pub fn play(&self, events: &FrameEvents) -> Result<Outcome> {
        self.run_movie(&self.movie(events, &MovieOptions::full()))
    }

    pub fn try_evaluate(&self, configuration: &Configuration) -> Result<(Outcome, f64)> {
        let events = self.decode(configuration)?;
        let outcome = self.play(&events)?;
        Ok((outcome, self.fitness.score_outcome(&outcome)))
    }

    /// Never fails: every error is logged and reported as `ERROR`/`+inf`.
    pub fn evaluate(&self, configuration: &Configuration) -> EvaluationResult {
        match self.try_evaluate(configuration) {
            Ok((outcome, score)) => {
                tracing::debug!(%outcome, score, "evaluation ok");
                EvaluationResult::ok(score, outcome)
            }
            Err(err) => {
                tracing::warn!("evaluation failed: {err:#}");
                EvaluationResult::error()
            }
        }
    }
}

impl<E> fmt::Debug for Harness<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("representation", &self.representation.kind())
            .field("fitness", &self.fitness)
            .field("scratch_dir", &self.scratch_dir.as_deref().map(Path::display))
            .finish_non_exhaustive()
    }
}
