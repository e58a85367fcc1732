//! Subprocess boundary to fceux.
//!
//! One request (a movie file) in, one response (captured stdout/stderr) out.
//! The Lua hook prints a single `won|died <x> <frames>` line and quits the
//! emulator; everything else on either stream is noise.

use std::{
    ffi::OsString,
    io::{self, Read},
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use smb_core::{Outcome, OutcomeStatus};

use crate::config::EmulatorConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

pub trait Emulator: Send + Sync {
    /// Plays `movie` to completion and returns both captured streams.
    fn play(&self, movie: &Path) -> Result<EmulatorOutput>;
}

impl<E: Emulator + ?Sized> Emulator for &E {
    fn play(&self, movie: &Path) -> Result<EmulatorOutput> {
        (**self).play(movie)
    }
}

impl<E: Emulator + ?Sized> Emulator for Box<E> {
    fn play(&self, movie: &Path) -> Result<EmulatorOutput> {
        (**self).play(movie)
    }
}

#[derive(Debug, Clone)]
pub struct FceuxEmulator {
    config: EmulatorConfig,
}

impl FceuxEmulator {
    pub fn new(config: EmulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Program and argument list for one playback. Headless runs go through
    /// `xvfb-run -a` so parallel evaluations each get their own display.
    pub fn command_line(&self, movie: &Path) -> (OsString, Vec<OsString>) {
        let mut argv: Vec<OsString> = Vec::new();
        if !self.config.headful {
            argv.push("xvfb-run".into());
            argv.push("-a".into());
            argv.push("-w".into());
            argv.push(self.config.xvfb_delay_secs.to_string().into());
        }
        argv.push(self.config.fceux_path.clone().into_os_string());
        argv.push("--playmov".into());
        argv.push(movie.as_os_str().to_owned());
        argv.push("--loadlua".into());
        argv.push(self.config.hook_path.clone().into_os_string());
        argv.push("--nogui".into());
        argv.push("--volume".into());
        argv.push("0".into());
        argv.push("--no-config".into());
        argv.push("1".into());
        argv.push(self.config.rom_path.clone().into_os_string());

        let program = argv.remove(0);
        (program, argv)
    }
}

impl Emulator for FceuxEmulator {
    fn play(&self, movie: &Path) -> Result<EmulatorOutput> {
        let (program, args) = self.command_line(movie);
        let mut command = Command::new(&program);
        command.args(&args);
        run_captured(command, self.config.timeout)
            .with_context(|| format!("emulator run failed ({})", program.to_string_lossy()))
    }
}

/// Spawns `command`, drains both pipes fully and waits for exit. With a
/// timeout the whole process group is killed once the deadline passes.
pub fn run_captured(mut command: Command, timeout: Option<Duration>) -> Result<EmulatorOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let Some(timeout) = timeout else {
        let output = command
            .output()
            .context("failed to launch emulator process")?;
        return Ok(EmulatorOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        });
    };

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .context("failed to launch emulator process")?;
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().context("failed polling emulator")? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_tree(&mut child);
            // The pipe readers finish on their own once every holder of the
            // write ends is gone; they are not joined here.
            return Err(anyhow!(
                "emulator did not exit within {}s and was killed",
                timeout.as_secs_f64()
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_reader(stdout_reader, "stdout")?;
    let stderr = join_reader(stderr_reader, "stderr")?;
    Ok(EmulatorOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<Vec<u8>>>,
    stream: &str,
) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow!("{stream} reader thread panicked"))?
        .with_context(|| format!("failed reading emulator {stream}"))
}

fn kill_tree(child: &mut Child) {
    // xvfb-run forks fceux; signalling the group reaches both.
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-s", "KILL", "--"])
            .arg(format!("-{}", child.id()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Finds the hook's outcome line in captured stdout.
#[derive(Debug, Clone)]
pub struct OutcomeParser {
    line: Regex,
}

impl OutcomeParser {
    pub const PATTERN: &'static str = r"(?m)^(won|died) (\d+) (\d+)\r?$";

    pub fn new() -> Result<Self> {
        let line = Regex::new(Self::PATTERN).context("invalid outcome pattern")?;
        Ok(Self { line })
    }

    /// First matching line wins. Numbers that overflow `u32` do not match.
    pub fn parse(&self, stdout: &str) -> Option<Outcome> {
        self.line.captures_iter(stdout).find_map(|caps| {
            let status = match &caps[1] {
                "won" => OutcomeStatus::Won,
                _ => OutcomeStatus::Died,
            };
            Some(Outcome {
                status,
                x_pos: caps[2].parse().ok()?,
                frames: caps[3].parse().ok()?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(emulator: &FceuxEmulator) -> Vec<String> {
        let (program, args) = emulator.command_line(Path::new("/tmp/smb-x.fm2"));
        std::iter::once(program)
            .chain(args)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn headless_command_wraps_fceux_in_xvfb() {
        let emulator = FceuxEmulator::new(EmulatorConfig {
            xvfb_delay_secs: 3,
            ..EmulatorConfig::default()
        });
        assert_eq!(
            args_of(&emulator),
            vec![
                "xvfb-run",
                "-a",
                "-w",
                "3",
                "fceux",
                "--playmov",
                "/tmp/smb-x.fm2",
                "--loadlua",
                "fceux-hook.lua",
                "--nogui",
                "--volume",
                "0",
                "--no-config",
                "1",
                "smb.nes",
            ]
        );
    }

    #[test]
    fn headful_command_runs_fceux_directly() {
        let emulator = FceuxEmulator::new(EmulatorConfig {
            headful: true,
            fceux_path: PathBuf::from("/opt/fceux/bin/fceux"),
            rom_path: PathBuf::from("roms/smb.nes"),
            ..EmulatorConfig::default()
        });
        let args = args_of(&emulator);
        assert_eq!(args[0], "/opt/fceux/bin/fceux");
        assert_eq!(args.last().map(String::as_str), Some("roms/smb.nes"));
        assert!(!args.iter().any(|arg| arg == "xvfb-run"));
    }

    #[test]
    fn parses_outcome_line_among_noise() {
        let parser = OutcomeParser::new().unwrap();
        let stdout = "Loading SMB...\nsound off\ndied 1342 877\nexiting\n";
        assert_eq!(
            parser.parse(stdout),
            Some(Outcome {
                status: OutcomeStatus::Died,
                x_pos: 1342,
                frames: 877,
            })
        );
        assert_eq!(
            parser.parse("won 3161 1200\r\n").map(|o| o.won()),
            Some(true)
        );
    }

    #[test]
    fn rejects_partial_or_malformed_lines() {
        let parser = OutcomeParser::new().unwrap();
        for stdout in [
            "",
            "won 3161\n",
            "you won 3161 1200\n",
            "won 3161 1200 extra\n",
            "lost 10 10\n",
            "won -5 10\n",
            "won 99999999999 10\n",
        ] {
            assert_eq!(parser.parse(stdout), None, "{stdout:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo out; echo err >&2; exit 3");
        let output = run_captured(command, None).unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));

        let mut command = Command::new("sh");
        command.arg("-c").arg("echo out; echo err >&2");
        let output = run_captured(command, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_hung_process() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 30");
        let started = Instant::now();
        let err = run_captured(command, Some(Duration::from_millis(200))).unwrap_err();
        assert!(err.to_string().contains("did not exit"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_an_error() {
        let emulator = FceuxEmulator::new(EmulatorConfig {
            headful: true,
            fceux_path: PathBuf::from("/nonexistent/fceux-binary"),
            ..EmulatorConfig::default()
        });
        assert!(emulator.play(Path::new("/tmp/none.fm2")).is_err());
    }
}
