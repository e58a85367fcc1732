//! fm2 movie text, the frame-accurate input track fceux plays back.
//!
//! Each frame is one record `|R|RLDUTSBA|........||`: the reset flag, then
//! port 0 buttons in fixed order (right, left, down, up, start, select, B, A)
//! with `.` for released, then an always-empty port 1. Only the write
//! direction exists.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MOVIE_EMU_VERSION, MOVIE_GUID, MOVIE_ROM_CHECKSUM, MOVIE_ROM_FILENAME, MOVIE_VERSION,
    START_PRESS_FRAME, WARMUP_FRAMES,
};
use crate::frames::{Button, FrameEvents};

/// The fixed nine-line preamble. Never derived from input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieHeader {
    pub version: u32,
    pub emu_version: u32,
    pub rom_filename: String,
    pub rom_checksum: String,
    pub guid: String,
    pub fourscore: bool,
    pub port0: u8,
    pub port1: u8,
    pub port2: u8,
}

impl Default for MovieHeader {
    fn default() -> Self {
        Self {
            version: MOVIE_VERSION,
            emu_version: MOVIE_EMU_VERSION,
            rom_filename: MOVIE_ROM_FILENAME.to_string(),
            rom_checksum: MOVIE_ROM_CHECKSUM.to_string(),
            guid: MOVIE_GUID.to_string(),
            fourscore: false,
            port0: 1,
            port1: 1,
            port2: 0,
        }
    }
}

impl MovieHeader {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("version {}", self.version),
            format!("emuVersion {}", self.emu_version),
            format!("romFilename {}", self.rom_filename),
            format!("romChecksum {}", self.rom_checksum),
            format!("guid {}", self.guid),
            format!("fourscore {}", u8::from(self.fourscore)),
            format!("port0 {}", self.port0),
            format!("port1 {}", self.port1),
            format!("port2 {}", self.port2),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieOptions {
    pub include_header: bool,
    pub include_padding: bool,
    pub min_frame: Option<u32>,
    pub max_frame: Option<u32>,
}

impl MovieOptions {
    /// Header and warm-up padding, sized to cover every press.
    pub fn full() -> Self {
        Self {
            include_header: true,
            include_padding: true,
            min_frame: None,
            max_frame: None,
        }
    }

    /// Padded, headerless, cut at `max_frame`. Used to splice replay reels.
    pub fn trimmed(max_frame: u32) -> Self {
        Self {
            include_header: false,
            include_padding: true,
            min_frame: None,
            max_frame: Some(max_frame),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieCodec {
    pub warmup_frames: u32,
    pub start_frame: u32,
    pub header: MovieHeader,
}

impl Default for MovieCodec {
    fn default() -> Self {
        Self {
            warmup_frames: WARMUP_FRAMES,
            start_frame: START_PRESS_FRAME,
            header: MovieHeader::default(),
        }
    }
}

impl MovieCodec {
    pub fn header_text(&self) -> String {
        self.header.lines().join("\n")
    }

    pub fn encode(&self, events: &FrameEvents, options: &MovieOptions) -> String {
        let mut reset = BTreeSet::new();
        let mut start = BTreeSet::new();
        let shifted;
        let events = if options.include_padding {
            reset.insert(0);
            start.insert(self.start_frame);
            shifted = events.shifted(self.warmup_frames);
            &shifted
        } else {
            events
        };

        let min_frame = options.min_frame.unwrap_or(0);
        let max_frame = options.max_frame.unwrap_or_else(|| {
            [events.max_frame(), reset.last().copied(), start.last().copied()]
                .into_iter()
                .flatten()
                .max()
                .map_or(min_frame, |last| last.saturating_add(1))
        });

        let mut lines = if options.include_header {
            self.header.lines()
        } else {
            Vec::new()
        };
        lines.reserve(max_frame.saturating_sub(min_frame) as usize);
        for frame in min_frame..max_frame {
            lines.push(frame_line(
                events,
                frame,
                start.contains(&frame),
                reset.contains(&frame),
            ));
        }
        lines.join("\n")
    }
}

/// Renders one frame record.
pub fn frame_line(events: &FrameEvents, frame: u32, start: bool, reset: bool) -> String {
    let mark = |pressed: bool, letter: char| if pressed { letter } else { '.' };
    let mut line = String::with_capacity(23);
    line.push_str(if reset { "|1|" } else { "|0|" });
    line.push(mark(events.is_pressed(frame, Button::Right), 'R'));
    line.push(mark(events.is_pressed(frame, Button::Left), 'L'));
    line.push(mark(events.is_pressed(frame, Button::Down), 'D'));
    line.push('.');
    line.push(mark(start, 'T'));
    line.push('.');
    line.push(mark(events.is_pressed(frame, Button::Run), 'B'));
    line.push(mark(events.is_pressed(frame, Button::Jump), 'A'));
    line.push_str("|........||");
    line
}
