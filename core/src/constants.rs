//! Timing and layout constants observed for fceux 2.2 playing the
//! Super Mario Bros. (World) ROM. A different emulator build or ROM dump
//! needs these rediscovered.

/// Frames the emulator spends booting and on the title screen before
/// gameplay input takes effect.
pub const WARMUP_FRAMES: u32 = 196;

/// Frame on which the synthesized start press lands.
pub const START_PRESS_FRAME: u32 = 33;

/// In-game timer: 400 ticks at 60 fps.
pub const LEVEL_TIMER_FRAMES: u32 = 400 * 60;

pub const NAIVE_HORIZON_FRAMES: u32 = 12_000;
pub const ALPHABET_HORIZON_FRAMES: u32 = LEVEL_TIMER_FRAMES;

pub const DURATION_MOVE_COUNT: u32 = 1_000;
pub const DURATION_MAX_MOVE_FRAMES: u32 = 60;
pub const DURATION_JUMP_COUNT: u32 = 1_000;
pub const DURATION_MAX_JUMP_START: u32 = LEVEL_TIMER_FRAMES;
pub const DURATION_MAX_JUMP_FRAMES: u32 = 32;

/// Four-bit input alphabet: left, right, run, jump.
pub const ALPHABET_SIZE: u32 = 16;

pub const MASK_LEFT: u32 = 0x01;
pub const MASK_RIGHT: u32 = 0x02;
pub const MASK_RUN: u32 = 0x04;
pub const MASK_JUMP: u32 = 0x08;

pub const MOVIE_VERSION: u32 = 3;
pub const MOVIE_EMU_VERSION: u32 = 9828;
pub const MOVIE_ROM_FILENAME: &str = "smb.nes";
pub const MOVIE_ROM_CHECKSUM: &str = "base64:jjYwGG411HcjG/j9UOVM3Q==";
pub const MOVIE_GUID: &str = "51473540-E9D7-11E3-ADFC-46CE3219C4E0";
