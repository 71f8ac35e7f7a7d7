//! Voice input adapter: streams transcripts from an external speech-to-text command.

use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::config::VoiceConfig;
use crate::events::AppEvent;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Speech Recognition not supported")]
    Unsupported,
    #[error("failed to start speech recognizer `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("speech recognizer produced no output stream")]
    NoOutput,
}

/// Source of transcripts for the composer
pub trait SpeechRecognizer: Send + Sync {
    /// Begin capturing. Transcripts and the final end event are sent to `events`.
    fn start(&self, events: UnboundedSender<AppEvent>) -> Result<Recording, VoiceError>;
}

/// A capture in progress; stopping or dropping it ends the capture.
pub struct Recording {
    task: JoinHandle<()>,
}

impl Recording {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Recognizer used when no speech command is configured
pub struct Unsupported;

impl SpeechRecognizer for Unsupported {
    fn start(&self, _events: UnboundedSender<AppEvent>) -> Result<Recording, VoiceError> {
        Err(VoiceError::Unsupported)
    }
}

/// Runs a command that prints one recognized utterance per stdout line.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&self, events: UnboundedSender<AppEvent>) -> Result<Recording, VoiceError> {
        tracing::info!(program = %self.program, "starting speech recognizer");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VoiceError::Spawn {
                command: self.program.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(VoiceError::NoOutput)?;

        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut failure = None;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let transcript = line.trim();
                        if !transcript.is_empty() {
                            let _ = events.send(AppEvent::Transcript(transcript.to_string()));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        failure = Some(format!("speech recognizer read error: {}", e));
                        break;
                    }
                }
            }

            if failure.is_none() {
                match child.wait().await {
                    Ok(status) if !status.success() => {
                        failure = Some(format!("speech recognizer exited with {}", status));
                    }
                    Ok(_) => {}
                    Err(e) => failure = Some(format!("speech recognizer wait error: {}", e)),
                }
            }

            if let Some(reason) = &failure {
                tracing::warn!("{}", reason);
            }
            let _ = events.send(AppEvent::RecordingEnded(failure));
        });

        Ok(Recording { task })
    }
}

/// Pick the recognizer for the configured command, if any.
pub fn recognizer_from_config(config: &VoiceConfig) -> Box<dyn SpeechRecognizer> {
    match config.command.as_deref() {
        Some([program, args @ ..]) if !program.trim().is_empty() => {
            Box::new(CommandRecognizer::new(program.clone(), args.to_vec()))
        }
        _ => Box::new(Unsupported),
    }
}

/// Append a transcript to the current input, separated by one space.
pub fn append_transcript(input: &str, transcript: &str) -> String {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        input.to_string()
    } else if input.is_empty() {
        transcript.to_string()
    } else {
        format!("{} {}", input, transcript)
    }
}
