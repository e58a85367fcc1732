use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use serde::Serialize;

pub const DEFAULT_FCEUX_PATH: &str = "fceux";
pub const DEFAULT_ROM_PATH: &str = "smb.nes";
pub const DEFAULT_HOOK_PATH: &str = "fceux-hook.lua";
pub const DEFAULT_XVFB_DELAY_SECS: u64 = 0;

/// How to launch fceux for one playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmulatorConfig {
    pub fceux_path: PathBuf,
    pub rom_path: PathBuf,
    pub hook_path: PathBuf,
    /// Run fceux directly instead of under `xvfb-run`.
    pub headful: bool,
    pub xvfb_delay_secs: u64,
    /// Kill the emulator if it has not exited by then. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            fceux_path: PathBuf::from(DEFAULT_FCEUX_PATH),
            rom_path: PathBuf::from(DEFAULT_ROM_PATH),
            hook_path: PathBuf::from(DEFAULT_HOOK_PATH),
            headful: false,
            xvfb_delay_secs: DEFAULT_XVFB_DELAY_SECS,
            timeout: None,
        }
    }
}

impl EmulatorConfig {
    /// Defaults, overridden by `FCEUX_PATH`, `SMB_ROM`, `SMB_HOOK`,
    /// `XVFB_DELAY` and `EMULATOR_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fceux_path: read_env_path("FCEUX_PATH", defaults.fceux_path),
            rom_path: read_env_path("SMB_ROM", defaults.rom_path),
            hook_path: read_env_path("SMB_HOOK", defaults.hook_path),
            headful: defaults.headful,
            xvfb_delay_secs: read_env_u64_allow_zero("XVFB_DELAY", defaults.xvfb_delay_secs),
            timeout: read_env_optional_u64("EMULATOR_TIMEOUT_SECS").map(Duration::from_secs),
        }
    }

    /// The ROM must exist before any evaluation is attempted.
    pub fn ensure_assets(&self) -> Result<()> {
        if !self.rom_path.is_file() {
            return Err(anyhow!("{} not found", self.rom_path.display()));
        }
        if !self.hook_path.is_file() {
            tracing::warn!(
                hook = %self.hook_path.display(),
                "outcome hook script not found; fceux will resolve it relative to its own cwd"
            );
        }
        Ok(())
    }
}

pub(crate) fn read_env_path(name: &str, default: PathBuf) -> PathBuf {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

pub(crate) fn read_env_u64_allow_zero(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn read_env_optional_u64(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rom_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmulatorConfig {
            rom_path: dir.path().join("smb.nes"),
            ..EmulatorConfig::default()
        };
        let err = config.ensure_assets().unwrap_err();
        assert!(err.to_string().ends_with("smb.nes not found"), "{err}");

        std::fs::write(&config.rom_path, b"NES\x1a").unwrap();
        assert!(config.ensure_assets().is_ok());
    }
}
