//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Only errors reach the log; progress has its own channel.
const LOG_LEVEL: &str = "error";

/// Number of trailing stderr lines kept as the failure diagnostic.
const DIAGNOSTIC_LINES: usize = 12;

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file paths, in `-i` order
    inputs: Vec<PathBuf>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Append an input file.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream (e.g. `[v2]` or `0:a?`) into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Full argument list: global flags, inputs, output options, output path.
    pub fn build_args(&self) -> Vec<String> {
        let global = [
            "-y",
            "-v",
            LOG_LEVEL,
            // Machine-readable progress shares stderr with the log
            "-progress",
            "pipe:2",
        ];

        let inputs = self
            .inputs
            .iter()
            .flat_map(|input| ["-i".to_string(), input.to_string_lossy().into_owned()]);

        global
            .into_iter()
            .map(str::to_string)
            .chain(inputs)
            .chain(self.output_args.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }
}

/// Runner for FFmpeg commands with progress tracking and an optional timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Binary to execute
    program: PathBuf,
    /// Wall-clock limit per run
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a runner for `ffmpeg` on `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout: None,
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill the process if a run takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// On failure the error carries the last non-progress lines ffmpeg wrote
    /// to stderr.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which(&self.program).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Reader task: progress lines go to the callback, the rest to the tail
        let progress_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail = DiagnosticTail::default();

            while let Ok(Some(line)) = reader.next_line().await {
                if !is_progress_line(&line) {
                    tail.push(&line);
                } else if let Some(snapshot) = current.apply_line(&line) {
                    progress_callback(snapshot);
                }
            }

            tail.into_message()
        });

        let result = self.wait_for_completion(&mut child).await;

        let diagnostic = progress_handle.await.ok().flatten();

        match result {
            Err(MediaError::FfmpegFailed {
                message, exit_code, ..
            }) => Err(MediaError::ffmpeg_failed(message, diagnostic, exit_code)),
            other => other,
        }
    }

    /// Wait for the child, killing it once the timeout passes.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match self.timeout {
            None => child.wait().await?,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "FFmpeg run exceeded its time limit, killing it");
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill ffmpeg: {}", e);
                    }
                    return Err(MediaError::Timeout(limit.as_secs()));
                }
            },
        };

        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            None,
            status.code(),
        ))
    }
}

/// Last few log lines ffmpeg wrote, oldest first.
#[derive(Debug, Default)]
struct DiagnosticTail {
    lines: VecDeque<String>,
}

impl DiagnosticTail {
    fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == DIAGNOSTIC_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_message(self) -> Option<String> {
        (!self.lines.is_empty()).then(|| Vec::from(self.lines).join("\n"))
    }
}

/// Whether a stderr line is a `-progress` key/value pair rather than a log line.
fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_multiple_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("base.mp4")
            .input("avatar.png")
            .input("bg.png")
            .filter_complex("[0:v][2:v]overlay=x=1:y=2[v1]")
            .map("[v1]");

        let args = cmd.build_args();
        let inputs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].clone())
            .collect();
        assert_eq!(inputs, vec!["base.mp4", "avatar.png", "bg.png"]);
        assert!(args.contains(&"-filter_complex".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(is_progress_line("out_time_us=1000"));
        assert!(is_progress_line("stream_0_0_q=28.0"));
        assert!(!is_progress_line("[Parsed_overlay_1 @ 0x55] Invalid x=abc"));
        assert!(!is_progress_line("Error initializing filter 'overlay'"));
        assert!(!is_progress_line(""));
    }

    #[tokio::test]
    async fn test_missing_program_reports_not_found() {
        let runner = FfmpegRunner::new().with_program("/nonexistent/ffmpeg-binary");
        let cmd = FfmpegCommand::new("out.mp4").input("in.mp4");
        let err = runner.run_with_progress(&cmd, |_| {}).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
    }

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let mut tail = DiagnosticTail::default();
        assert_eq!(DiagnosticTail::default().into_message(), None);

        for i in 0..DIAGNOSTIC_LINES + 3 {
            tail.push(&format!("line {i}"));
        }
        tail.push("   ");

        let message = tail.into_message().unwrap();
        let lines: Vec<_> = message.lines().collect();
        assert_eq!(lines.len(), DIAGNOSTIC_LINES);
        assert_eq!(lines[0], "line 3");
        assert_eq!(*lines.last().unwrap(), format!("line {}", DIAGNOSTIC_LINES + 2));
    }
}
