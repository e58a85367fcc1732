pub mod batch;
pub mod config;
pub mod emulator;
pub mod harness;
pub mod history;
pub mod replay;
pub mod util;
