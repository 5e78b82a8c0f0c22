use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use docqa_core::InferenceSection;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::{debug, error, warn};

pub const UNAVAILABLE_MESSAGE: &str = "Ollama not found. Make sure it's installed and in your PATH.";
pub const ERROR_PREFIX: &str = "Error during query processing: ";

/// Outcome of one inference call. Only failures to even talk to the
/// process are `Err`; a missing executable or a failing run is an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceAnswer {
    Answer(String),
    Unavailable(String),
    Failed(String),
}

impl InferenceAnswer {
    pub fn is_error(&self) -> bool {
        !matches!(self, InferenceAnswer::Answer(_))
    }

    /// Text shown to the asker; failures carry [`ERROR_PREFIX`].
    pub fn into_text(self) -> String {
        match self {
            InferenceAnswer::Answer(text) | InferenceAnswer::Unavailable(text) => text,
            InferenceAnswer::Failed(reason) => format!("{ERROR_PREFIX}{reason}"),
        }
    }
}

/// Prompt-in, answer-out capability.
pub trait Inference: Send + Sync {
    fn infer(&self, prompt: &str) -> Result<InferenceAnswer>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub unavailable_message: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::from_section(&InferenceSection::default())
    }
}

impl InferenceConfig {
    pub fn from_section(section: &InferenceSection) -> Self {
        Self {
            command: section.command.clone(),
            args: section.args.clone(),
            timeout: (section.timeout_secs > 0).then(|| Duration::from_secs(section.timeout_secs)),
            unavailable_message: UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

/// Runs the configured executable once per prompt: prompt on stdin, answer
/// from stdout, diagnostics from stderr. No retries.
#[derive(Debug, Clone, Default)]
pub struct SubprocessInference {
    config: InferenceConfig,
}

impl SubprocessInference {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub async fn ask(&self, prompt: &str) -> Result<InferenceAnswer> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(command = %self.config.command, "inference executable not found");
                return Ok(InferenceAnswer::Unavailable(
                    self.config.unavailable_message.clone(),
                ));
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to start {}", self.config.command));
            }
        };

        let mut stdin = child.stdin.take().context("inference stdin was not captured")?;
        let payload = prompt.as_bytes().to_vec();
        // Feed stdin concurrently so a chatty child cannot deadlock on a full
        // stdout pipe while we are still writing.
        let feeder = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        let waiting = child.wait_with_output();
        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, waiting).await {
                Ok(result) => result.context("failed to collect inference output")?,
                Err(_) => {
                    feeder.abort();
                    error!(
                        command = %self.config.command,
                        timeout_secs = limit.as_secs_f64(),
                        "inference timed out"
                    );
                    return Ok(InferenceAnswer::Failed(format!(
                        "inference timed out after {}s",
                        limit.as_secs_f64()
                    )));
                }
            },
            None => waiting.await.context("failed to collect inference output")?,
        };
        match feeder.await {
            Ok(Err(err)) if err.kind() != ErrorKind::BrokenPipe => {
                debug!(error = %err, "could not deliver full prompt to inference process");
            }
            _ => {}
        }

        if output.status.success() {
            let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(InferenceAnswer::Answer(answer));
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(status = %output.status, stderr = %stderr, "inference process failed");
        Ok(InferenceAnswer::Failed(stderr))
    }

    pub fn ask_blocking(&self, prompt: &str) -> Result<InferenceAnswer> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.ask(prompt))
    }
}

impl Inference for SubprocessInference {
    fn infer(&self, prompt: &str) -> Result<InferenceAnswer> {
        self.ask_blocking(prompt)
    }
}
