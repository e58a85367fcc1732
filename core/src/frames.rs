use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Buttons a representation can schedule. Up, select and start are never
/// searched over; start is synthesized by the movie codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Left,
    Right,
    Down,
    Run,
    Jump,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Left,
        Button::Right,
        Button::Down,
        Button::Run,
        Button::Jump,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Down => "down",
            Self::Run => "run",
            Self::Jump => "jump",
        }
    }
}

/// Per-frame button state, one set of held frames per button.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEvents {
    pub left: BTreeSet<u32>,
    pub right: BTreeSet<u32>,
    pub down: BTreeSet<u32>,
    pub run: BTreeSet<u32>,
    pub jump: BTreeSet<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub action_frames: u32,
    pub horizontal_frames: u32,
    pub run_frames: u32,
    pub jump_frames: u32,
}

impl FrameEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, button: Button) -> &BTreeSet<u32> {
        match button {
            Button::Left => &self.left,
            Button::Right => &self.right,
            Button::Down => &self.down,
            Button::Run => &self.run,
            Button::Jump => &self.jump,
        }
    }

    fn set_mut(&mut self, button: Button) -> &mut BTreeSet<u32> {
        match button {
            Button::Left => &mut self.left,
            Button::Right => &mut self.right,
            Button::Down => &mut self.down,
            Button::Run => &mut self.run,
            Button::Jump => &mut self.jump,
        }
    }

    pub fn press(&mut self, button: Button, frame: u32) {
        self.set_mut(button).insert(frame);
    }

    pub fn press_range(&mut self, button: Button, frames: Range<u32>) {
        self.set_mut(button).extend(frames);
    }

    #[inline]
    pub fn is_pressed(&self, frame: u32, button: Button) -> bool {
        self.set(button).contains(&frame)
    }

    pub fn is_empty(&self) -> bool {
        Button::ALL.iter().all(|button| self.set(*button).is_empty())
    }

    /// Largest frame index held by any button.
    pub fn max_frame(&self) -> Option<u32> {
        Button::ALL
            .iter()
            .filter_map(|button| self.set(*button).last().copied())
            .max()
    }

    /// Copy with every press moved `offset` frames later.
    pub fn shifted(&self, offset: u32) -> Self {
        let shift = |set: &BTreeSet<u32>| {
            set.iter()
                .map(|frame| frame.saturating_add(offset))
                .collect()
        };
        Self {
            left: shift(&self.left),
            right: shift(&self.right),
            down: shift(&self.down),
            run: shift(&self.run),
            jump: shift(&self.jump),
        }
    }

    pub fn summary(&self) -> InputSummary {
        let horizontal: BTreeSet<u32> = self.left.union(&self.right).copied().collect();
        let mut action: BTreeSet<u32> = horizontal.clone();
        action.extend(&self.down);
        action.extend(&self.run);
        action.extend(&self.jump);
        InputSummary {
            action_frames: action.len() as u32,
            horizontal_frames: horizontal.len() as u32,
            run_frames: self.run.len() as u32,
            jump_frames: self.jump.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_buttons_are_independent() {
        let mut events = FrameEvents::new();
        events.press(Button::Left, 4);
        events.press(Button::Jump, 4);
        assert!(events.is_pressed(4, Button::Left));
        assert!(events.is_pressed(4, Button::Jump));
        assert!(!events.is_pressed(4, Button::Right));
        assert!(!events.is_pressed(5, Button::Left));
    }

    #[test]
    fn press_range_is_half_open_and_deduplicates() {
        let mut events = FrameEvents::new();
        events.press_range(Button::Jump, 10..14);
        events.press_range(Button::Jump, 12..16);
        let frames: Vec<u32> = events.jump.iter().copied().collect();
        assert_eq!(frames, vec![10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn max_frame_spans_all_buttons() {
        let mut events = FrameEvents::new();
        assert_eq!(events.max_frame(), None);
        events.press(Button::Right, 7);
        events.press(Button::Down, 91);
        events.press(Button::Run, 3);
        assert_eq!(events.max_frame(), Some(91));
    }

    #[test]
    fn shifted_moves_every_button() {
        let mut events = FrameEvents::new();
        for (idx, button) in Button::ALL.iter().enumerate() {
            events.press(*button, idx as u32);
        }
        let moved = events.shifted(100);
        for (idx, button) in Button::ALL.iter().enumerate() {
            assert!(moved.is_pressed(100 + idx as u32, *button), "{}", button.as_str());
            assert!(!moved.is_pressed(idx as u32, *button));
        }
    }

    #[test]
    fn summary_counts_distinct_frames() {
        let mut events = FrameEvents::new();
        events.press_range(Button::Right, 0..10);
        events.press_range(Button::Left, 5..12);
        events.press_range(Button::Run, 0..3);
        events.press(Button::Jump, 20);
        let summary = events.summary();
        assert_eq!(summary.horizontal_frames, 12);
        assert_eq!(summary.action_frames, 13);
        assert_eq!(summary.run_frames, 3);
        assert_eq!(summary.jump_frames, 1);
    }
}
