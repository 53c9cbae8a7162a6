//! Render executor: one encoder invocation per composition graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vgen_models::OutputProfile;

use crate::assets::AssetSet;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::graph::CompositionGraph;
use crate::progress::{ProgressMapper, DEFAULT_ASSUMED_DURATION};

/// Everything the encoder needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    /// Input files in `-i` order; index 0 is the base video
    pub inputs: Vec<PathBuf>,
    pub filter_complex: String,
    /// Output label of the last overlay step
    pub terminal: String,
    pub output: PathBuf,
    pub profile: OutputProfile,
}

/// An external video encoder.
///
/// Implementations report elapsed encoded time on `progress` as it becomes
/// known and return once the output file is complete or the run failed.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        progress: mpsc::UnboundedSender<Duration>,
    ) -> MediaResult<()>;
}

/// [`Encoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    runner: FfmpegRunner,
}

impl FfmpegEncoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Translate an invocation into an ffmpeg command line.
    pub fn command(invocation: &EncoderInvocation) -> FfmpegCommand {
        let cmd = invocation
            .inputs
            .iter()
            .fold(FfmpegCommand::new(&invocation.output), |cmd, input| {
                cmd.input(input)
            });

        cmd.filter_complex(invocation.filter_complex.clone())
            .map(format!("[{}]", invocation.terminal))
            .map("0:a?")
            .output_args(invocation.profile.to_ffmpeg_args())
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        progress: mpsc::UnboundedSender<Duration>,
    ) -> MediaResult<()> {
        let cmd = Self::command(invocation);
        self.runner
            .run_with_progress(&cmd, move |p| {
                let _ = progress.send(p.elapsed());
            })
            .await
    }
}

/// Runs a composition graph through an [`Encoder`] and maps its progress to
/// whole percentages.
#[derive(Clone)]
pub struct RenderExecutor {
    encoder: Arc<dyn Encoder>,
    profile: OutputProfile,
    assumed_duration: Duration,
}

impl std::fmt::Debug for RenderExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderExecutor")
            .field("profile", &self.profile)
            .field("assumed_duration", &self.assumed_duration)
            .finish_non_exhaustive()
    }
}

impl RenderExecutor {
    pub fn new(encoder: Arc<dyn Encoder>, profile: OutputProfile) -> Self {
        Self {
            encoder,
            profile,
            assumed_duration: DEFAULT_ASSUMED_DURATION,
        }
    }

    /// Total duration percentages are computed against.
    pub fn with_assumed_duration(mut self, duration: Duration) -> Self {
        self.assumed_duration = duration;
        self
    }

    pub fn assumed_duration(&self) -> Duration {
        self.assumed_duration
    }

    /// Build the encoder invocation for `graph` over `base_video` and `assets`.
    pub fn invocation(
        &self,
        base_video: &Path,
        graph: &CompositionGraph,
        assets: &AssetSet,
        output: &Path,
    ) -> MediaResult<EncoderInvocation> {
        graph.validate()?;
        let terminal = graph
            .terminal()
            .ok_or_else(|| MediaError::InvalidGraph("graph has no terminal stream".to_string()))?;

        let mut inputs = Vec::with_capacity(graph.inputs().len() + 1);
        inputs.push(base_video.to_path_buf());
        inputs.extend(graph.inputs().iter().map(|role| assets.path(*role).to_path_buf()));

        Ok(EncoderInvocation {
            inputs,
            filter_complex: graph.to_filter_complex(),
            terminal: terminal.to_string(),
            output: output.to_path_buf(),
            profile: self.profile.clone(),
        })
    }

    /// Encode `graph` into `output`.
    ///
    /// `on_percent` receives a non-decreasing sequence of percentages. On
    /// failure any partial output is removed before the error is returned.
    pub async fn render<F>(
        &self,
        base_video: &Path,
        graph: &CompositionGraph,
        assets: &AssetSet,
        output: &Path,
        mut on_percent: F,
    ) -> MediaResult<PathBuf>
    where
        F: FnMut(u8) + Send,
    {
        let invocation = self.invocation(base_video, graph, assets, output)?;
        debug!(filter = %invocation.filter_complex, "Starting encoder");

        let started = Instant::now();
        let mut mapper = ProgressMapper::new(self.assumed_duration);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let encode = self.encoder.encode(&invocation, tx);
        tokio::pin!(encode);

        let result = loop {
            tokio::select! {
                res = &mut encode => break res,
                Some(elapsed) = rx.recv() => {
                    if let Some(pct) = mapper.observe(elapsed) {
                        on_percent(pct);
                    }
                }
            }
        };

        while let Ok(elapsed) = rx.try_recv() {
            if let Some(pct) = mapper.observe(elapsed) {
                on_percent(pct);
            }
        }

        let result = result.and_then(|()| {
            if output.exists() {
                Ok(())
            } else {
                Err(MediaError::FileNotFound(output.to_path_buf()))
            }
        });

        match result {
            Ok(()) => {
                info!(
                    output = %output.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Render finished"
                );
                Ok(output.to_path_buf())
            }
            Err(e) => {
                remove_partial(output).await;
                Err(e)
            }
        }
    }
}

async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(output = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(output = %output.display(), "Failed to remove partial output: {}", e),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted encoders for tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Encoder that follows a script of per-call outcomes.
    ///
    /// Each call reports the given progress timestamps, writes the output
    /// file, then succeeds or fails. Calls past the end of the script fail.
    pub struct ScriptedEncoder {
        script: Vec<(Vec<u64>, bool)>,
        calls: AtomicUsize,
        pub invocations: Mutex<Vec<EncoderInvocation>>,
    }

    impl ScriptedEncoder {
        /// `script[i]` is (progress seconds, success) for call `i`.
        pub fn new(script: Vec<(Vec<u64>, bool)>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
                invocations: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Encoder for ScriptedEncoder {
        async fn encode(
            &self,
            invocation: &EncoderInvocation,
            progress: mpsc::UnboundedSender<Duration>,
        ) -> MediaResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.invocations.lock().unwrap().push(invocation.clone());

            let (ticks, ok) = self.script.get(call).cloned().unwrap_or((vec![], false));
            for secs in ticks {
                let _ = progress.send(Duration::from_secs(secs));
                tokio::task::yield_now().await;
            }

            // Partial output exists either way
            tokio::fs::write(&invocation.output, b"mp4").await?;

            if ok {
                Ok(())
            } else {
                Err(MediaError::ffmpeg_failed(
                    format!("scripted failure on call {call}"),
                    Some("Error initializing filter".to_string()),
                    Some(1),
                ))
            }
        }
    }
}
