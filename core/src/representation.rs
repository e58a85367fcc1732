//! Search-space encodings of a button timeline.
//!
//! Each representation declares its parameter space and decodes one
//! configuration into [`FrameEvents`]. Decoding is pure; values outside the
//! declared domain are the caller's problem, but anything that cannot be
//! read at all surfaces as a [`DecodeError`] instead of a panic.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ALPHABET_HORIZON_FRAMES, ALPHABET_SIZE, DURATION_JUMP_COUNT, DURATION_MAX_JUMP_FRAMES,
    DURATION_MAX_JUMP_START, DURATION_MAX_MOVE_FRAMES, DURATION_MOVE_COUNT, MASK_JUMP, MASK_LEFT,
    MASK_RIGHT, MASK_RUN, NAIVE_HORIZON_FRAMES,
};
use crate::error::DecodeError;
use crate::frames::{Button, FrameEvents};
use crate::params::{Configuration, ParamDomain, ParameterSpace};

pub trait Encoding {
    fn id(&self) -> &'static str;
    fn parameter_space(&self) -> ParameterSpace;
    fn decode(&self, configuration: &Configuration) -> Result<FrameEvents, DecodeError>;
}

/// Horizontal motion alphabet for the duration representation. The
/// numbered duplicates bias uniform sampling 3:1 toward moving right.
pub const MOVE_SYMBOLS: [&str; 11] = [
    "R", "L", "RB", "LB", "N", "LR", "LRB", "R2", "RB2", "R3", "RB3",
];

const NAIVE_BUTTONS: [(char, Button); 5] = [
    ('L', Button::Left),
    ('R', Button::Right),
    ('D', Button::Down),
    ('B', Button::Run),
    ('A', Button::Jump),
];

fn frame_value(configuration: &Configuration, name: &str) -> Result<u32, DecodeError> {
    let value = configuration.int(name)?;
    u32::try_from(value).map_err(|_| DecodeError::FrameOutOfRange {
        name: name.to_string(),
        value,
    })
}

fn frame_end(name: &str, start: u32, length: u32) -> Result<u32, DecodeError> {
    start
        .checked_add(length)
        .ok_or_else(|| DecodeError::FrameOutOfRange {
            name: name.to_string(),
            value: i64::from(start) + i64::from(length),
        })
}

/// One boolean per (button, frame).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaiveRepresentation {
    pub horizon_frames: u32,
}

impl Default for NaiveRepresentation {
    fn default() -> Self {
        Self {
            horizon_frames: NAIVE_HORIZON_FRAMES,
        }
    }
}

impl Encoding for NaiveRepresentation {
    fn id(&self) -> &'static str {
        "naive"
    }

    fn parameter_space(&self) -> ParameterSpace {
        let mut space = ParameterSpace::with_capacity(self.horizon_frames as usize * 5);
        for frame in 0..self.horizon_frames {
            for (letter, _) in NAIVE_BUTTONS {
                space.push(format!("{letter}{frame}"), ParamDomain::Bool);
            }
        }
        space
    }

    fn decode(&self, configuration: &Configuration) -> Result<FrameEvents, DecodeError> {
        let mut events = FrameEvents::new();
        for frame in 0..self.horizon_frames {
            for (letter, button) in NAIVE_BUTTONS {
                if configuration.bool(&format!("{letter}{frame}"))? {
                    events.press(button, frame);
                }
            }
        }
        Ok(events)
    }
}

/// Run-length moves walked from frame 0, plus absolutely placed jumps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRepresentation {
    pub move_count: u32,
    pub max_move_duration: u32,
    pub jump_count: u32,
    pub max_jump_frame: u32,
    pub max_jump_duration: u32,
}

impl Default for DurationRepresentation {
    fn default() -> Self {
        Self {
            move_count: DURATION_MOVE_COUNT,
            max_move_duration: DURATION_MAX_MOVE_FRAMES,
            jump_count: DURATION_JUMP_COUNT,
            max_jump_frame: DURATION_MAX_JUMP_START,
            max_jump_duration: DURATION_MAX_JUMP_FRAMES,
        }
    }
}

impl Encoding for DurationRepresentation {
    fn id(&self) -> &'static str {
        "duration"
    }

    fn parameter_space(&self) -> ParameterSpace {
        let mut space =
            ParameterSpace::with_capacity(2 * (self.move_count + self.jump_count) as usize);
        let moves: Vec<String> = MOVE_SYMBOLS.iter().map(|s| s.to_string()).collect();
        for idx in 0..self.move_count {
            space.push(
                format!("move{idx}"),
                ParamDomain::Enum {
                    symbols: moves.clone(),
                },
            );
            space.push(
                format!("move_duration{idx}"),
                ParamDomain::Int {
                    lo: 1,
                    hi: i64::from(self.max_move_duration),
                },
            );
        }
        for idx in 0..self.jump_count {
            space.push(
                format!("jump_frame{idx}"),
                ParamDomain::Int {
                    lo: 0,
                    hi: i64::from(self.max_jump_frame),
                },
            );
            space.push(
                format!("jump_duration{idx}"),
                ParamDomain::Int {
                    lo: 1,
                    hi: i64::from(self.max_jump_duration),
                },
            );
        }
        space
    }

    fn decode(&self, configuration: &Configuration) -> Result<FrameEvents, DecodeError> {
        let mut events = FrameEvents::new();

        let mut start = 0u32;
        for idx in 0..self.move_count {
            let symbol = configuration.symbol(&format!("move{idx}"))?;
            let duration_name = format!("move_duration{idx}");
            let duration = frame_value(configuration, &duration_name)?;
            let end = frame_end(&duration_name, start, duration)?;
            if symbol.contains('R') {
                events.press_range(Button::Right, start..end);
            }
            if symbol.contains('L') {
                events.press_range(Button::Left, start..end);
            }
            if symbol.contains('B') {
                events.press_range(Button::Run, start..end);
            }
            start = end;
        }

        for idx in 0..self.jump_count {
            let jump_frame = frame_value(configuration, &format!("jump_frame{idx}"))?;
            let duration_name = format!("jump_duration{idx}");
            let duration = frame_value(configuration, &duration_name)?;
            let end = frame_end(&duration_name, jump_frame, duration)?;
            events.press_range(Button::Jump, jump_frame..end);
        }

        Ok(events)
    }
}

/// One 4-bit mask per frame: left, right, run, jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphabetRepresentation {
    pub horizon_frames: u32,
}

impl Default for AlphabetRepresentation {
    fn default() -> Self {
        Self {
            horizon_frames: ALPHABET_HORIZON_FRAMES,
        }
    }
}

impl Encoding for AlphabetRepresentation {
    fn id(&self) -> &'static str {
        "alphabet"
    }

    fn parameter_space(&self) -> ParameterSpace {
        let symbols: Vec<String> = (0..ALPHABET_SIZE).map(|v| v.to_string()).collect();
        let mut space = ParameterSpace::with_capacity(self.horizon_frames as usize);
        for frame in 0..self.horizon_frames {
            space.push(
                format!("mask{frame}"),
                ParamDomain::Enum {
                    symbols: symbols.clone(),
                },
            );
        }
        space
    }

    fn decode(&self, configuration: &Configuration) -> Result<FrameEvents, DecodeError> {
        let mut events = FrameEvents::new();
        for frame in 0..self.horizon_frames {
            let name = format!("mask{frame}");
            let bits = configuration.int(&name)?;
            let bits = u32::try_from(bits).map_err(|_| DecodeError::OutOfDomain { name })?;
            if bits & MASK_LEFT != 0 {
                events.press(Button::Left, frame);
            }
            if bits & MASK_RIGHT != 0 {
                events.press(Button::Right, frame);
            }
            if bits & MASK_RUN != 0 {
                events.press(Button::Run, frame);
            }
            if bits & MASK_JUMP != 0 {
                events.press(Button::Jump, frame);
            }
        }
        Ok(events)
    }
}

/// The active representation for a run. Chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Representation {
    Naive(NaiveRepresentation),
    Duration(DurationRepresentation),
    Alphabet(AlphabetRepresentation),
}

impl Default for Representation {
    fn default() -> Self {
        Self::Duration(DurationRepresentation::default())
    }
}

impl Representation {
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Self::Naive(_) => RepresentationKind::Naive,
            Self::Duration(_) => RepresentationKind::Duration,
            Self::Alphabet(_) => RepresentationKind::Alphabet,
        }
    }

    fn encoding(&self) -> &dyn Encoding {
        match self {
            Self::Naive(inner) => inner,
            Self::Duration(inner) => inner,
            Self::Alphabet(inner) => inner,
        }
    }
}

impl Encoding for Representation {
    fn id(&self) -> &'static str {
        self.encoding().id()
    }

    fn parameter_space(&self) -> ParameterSpace {
        self.encoding().parameter_space()
    }

    fn decode(&self, configuration: &Configuration) -> Result<FrameEvents, DecodeError> {
        self.encoding().decode(configuration)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationKind {
    Naive,
    Duration,
    Alphabet,
}

impl RepresentationKind {
    pub const ALL: [RepresentationKind; 3] = [Self::Naive, Self::Duration, Self::Alphabet];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Duration => "duration",
            Self::Alphabet => "alphabet",
        }
    }

    /// Builds the representation with its stock constants. `horizon_frames`
    /// replaces the per-frame horizon (naive, alphabet) or the latest jump
    /// start (duration).
    pub fn build(self, horizon_frames: Option<u32>) -> Representation {
        match self {
            Self::Naive => {
                let mut inner = NaiveRepresentation::default();
                if let Some(horizon) = horizon_frames {
                    inner.horizon_frames = horizon;
                }
                Representation::Naive(inner)
            }
            Self::Duration => {
                let mut inner = DurationRepresentation::default();
                if let Some(horizon) = horizon_frames {
                    inner.max_jump_frame = horizon;
                }
                Representation::Duration(inner)
            }
            Self::Alphabet => {
                let mut inner = AlphabetRepresentation::default();
                if let Some(horizon) = horizon_frames {
                    inner.horizon_frames = horizon;
                }
                Representation::Alphabet(inner)
            }
        }
    }
}

impl FromStr for RepresentationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "naive" | "NaiveRepresentation" => Ok(Self::Naive),
            "duration" | "DurationRepresentation" => Ok(Self::Duration),
            "alphabet" | "AlphabetRepresentation" => Ok(Self::Alphabet),
            _ => Err(format!(
                "invalid representation: {value} (expected naive|duration|alphabet)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(set: &std::collections::BTreeSet<u32>) -> Vec<u32> {
        set.iter().copied().collect()
    }

    fn small_duration() -> DurationRepresentation {
        DurationRepresentation {
            move_count: 2,
            max_move_duration: 60,
            jump_count: 2,
            max_jump_frame: 100,
            max_jump_duration: 32,
        }
    }

    fn duration_config(moves: &[(&str, i64)], jumps: &[(i64, i64)]) -> Configuration {
        let mut cfg = Configuration::new();
        for (idx, (symbol, duration)) in moves.iter().enumerate() {
            cfg.insert(format!("move{idx}"), *symbol);
            cfg.insert(format!("move_duration{idx}"), *duration);
        }
        for (idx, (frame, duration)) in jumps.iter().enumerate() {
            cfg.insert(format!("jump_frame{idx}"), *frame);
            cfg.insert(format!("jump_duration{idx}"), *duration);
        }
        cfg
    }

    #[test]
    fn duration_moves_walk_a_cursor() {
        let repr = small_duration();
        let cfg = duration_config(&[("R", 5), ("L", 3)], &[(0, 1), (0, 1)]);
        let events = repr.decode(&cfg).unwrap();
        assert_eq!(frames(&events.right), vec![0, 1, 2, 3, 4]);
        assert_eq!(frames(&events.left), vec![5, 6, 7]);
        assert!(events.run.is_empty());
        assert!(events.down.is_empty());
    }

    #[test]
    fn duration_symbols_combine_letters() {
        let repr = small_duration();
        let cfg = duration_config(&[("LRB", 2), ("N", 4)], &[(50, 1), (50, 1)]);
        let events = repr.decode(&cfg).unwrap();
        assert_eq!(frames(&events.left), vec![0, 1]);
        assert_eq!(frames(&events.right), vec![0, 1]);
        assert_eq!(frames(&events.run), vec![0, 1]);
        assert_eq!(events.max_frame(), Some(50));

        let biased = duration_config(&[("RB3", 2), ("R2", 1)], &[(0, 1), (0, 1)]);
        let events = repr.decode(&biased).unwrap();
        assert_eq!(frames(&events.right), vec![0, 1, 2]);
        assert_eq!(frames(&events.run), vec![0, 1]);
    }

    #[test]
    fn duration_jumps_are_absolute_and_may_overlap() {
        let repr = small_duration();
        let cfg = duration_config(&[("R", 60), ("R", 60)], &[(10, 4), (12, 5)]);
        let events = repr.decode(&cfg).unwrap();
        assert_eq!(frames(&events.jump), (10..17).collect::<Vec<_>>());
    }

    #[test]
    fn duration_decode_is_deterministic() {
        let repr = small_duration();
        let cfg = duration_config(&[("RB", 17), ("LR", 9)], &[(3, 30), (44, 2)]);
        let first = repr.decode(&cfg).unwrap();
        for _ in 0..5 {
            assert_eq!(repr.decode(&cfg).unwrap(), first);
        }
    }

    #[test]
    fn duration_space_matches_declared_counts() {
        let space = DurationRepresentation::default().parameter_space();
        assert_eq!(space.len(), 4 * 1_000);
        assert_eq!(
            space.get("move_duration999").map(|p| p.domain.clone()),
            Some(ParamDomain::Int { lo: 1, hi: 60 })
        );
        assert_eq!(
            space.get("jump_frame0").map(|p| p.domain.clone()),
            Some(ParamDomain::Int { lo: 0, hi: 24_000 })
        );
        assert_eq!(
            space.get("move3").map(|p| p.domain.cardinality()),
            Some(MOVE_SYMBOLS.len() as u64)
        );
    }

    #[test]
    fn duration_missing_parameter_is_an_error() {
        let repr = small_duration();
        let cfg = duration_config(&[("R", 5)], &[]);
        assert_eq!(
            repr.decode(&cfg).unwrap_err(),
            DecodeError::MissingParameter {
                name: "move1".to_string()
            }
        );
    }

    #[test]
    fn duration_negative_length_is_rejected() {
        let repr = small_duration();
        let cfg = duration_config(&[("R", -1), ("R", 1)], &[(0, 1), (0, 1)]);
        assert!(matches!(
            repr.decode(&cfg).unwrap_err(),
            DecodeError::FrameOutOfRange { value: -1, .. }
        ));
    }

    #[test]
    fn naive_reads_one_flag_per_button_frame() {
        let repr = NaiveRepresentation { horizon_frames: 3 };
        let space = repr.parameter_space();
        assert_eq!(space.len(), 15);

        let mut cfg = Configuration::new();
        for param in space.iter() {
            cfg.insert(param.name.clone(), false);
        }
        cfg.insert("R0", true);
        cfg.insert("R1", true);
        cfg.insert("D2", true);
        cfg.insert("A1", true);
        cfg.insert("B2", true);
        assert_eq!(space.check(&cfg), Ok(()));

        let events = repr.decode(&cfg).unwrap();
        assert_eq!(frames(&events.right), vec![0, 1]);
        assert_eq!(frames(&events.down), vec![2]);
        assert_eq!(frames(&events.jump), vec![1]);
        assert_eq!(frames(&events.run), vec![2]);
        assert!(events.left.is_empty());
    }

    #[test]
    fn alphabet_masks_are_not_exclusive() {
        let repr = AlphabetRepresentation { horizon_frames: 4 };
        let mut cfg = Configuration::new();
        cfg.insert("mask0", 0i64);
        cfg.insert("mask1", 3i64);
        cfg.insert("mask2", "12");
        cfg.insert("mask3", 15i64);
        assert_eq!(repr.parameter_space().check(&cfg), Ok(()));

        let events = repr.decode(&cfg).unwrap();
        assert!(events.is_pressed(1, Button::Left));
        assert!(events.is_pressed(1, Button::Right));
        assert!(!events.is_pressed(1, Button::Run));
        assert_eq!(frames(&events.run), vec![2, 3]);
        assert_eq!(frames(&events.jump), vec![2, 3]);
        assert!(events.down.is_empty());
        assert!(!events.is_pressed(0, Button::Left));
    }

    #[test]
    fn kinds_parse_and_build_with_horizon() {
        assert_eq!(
            "duration".parse::<RepresentationKind>(),
            Ok(RepresentationKind::Duration)
        );
        assert_eq!(
            "AlphabetRepresentation".parse::<RepresentationKind>(),
            Ok(RepresentationKind::Alphabet)
        );
        assert!("bogus".parse::<RepresentationKind>().is_err());

        assert_eq!(
            RepresentationKind::Naive.build(Some(8)).parameter_space().len(),
            40
        );
        assert_eq!(
            RepresentationKind::Alphabet.build(None).parameter_space().len(),
            24_000
        );
        match RepresentationKind::Duration.build(Some(5_000)) {
            Representation::Duration(inner) => assert_eq!(inner.max_jump_frame, 5_000),
            other => panic!("unexpected {other:?}"),
        }
        for kind in RepresentationKind::ALL {
            assert_eq!(kind.build(None).kind(), kind);
            assert_eq!(kind.build(None).id(), kind.as_str());
        }
    }
}
