use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::speech::{Audio, AudioFormat, SpeechError, Synthesizer};

/// Offline speech through an espeak-compatible command writing WAV to stdout.
pub struct LocalSpeech {
    command: String,
    voice: String,
}

impl LocalSpeech {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            voice: "en".to_string(),
        }
    }
}

#[async_trait]
impl Synthesizer for LocalSpeech {
    fn name(&self) -> &'static str {
        "local"
    }

    // The remote voice names mean nothing to espeak, so `_voice` is ignored
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Audio, SpeechError> {
        debug!("Running {} for {} characters", self.command, text.chars().count());
        let output = Command::new(&self.command)
            .arg("--stdout")
            .arg("-v")
            .arg(&self.voice)
            .arg(text)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(SpeechError::Unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(SpeechError::Unavailable("no audio produced".to_string()));
        }
        Ok(Audio {
            bytes: output.stdout,
            format: AudioFormat::Wav,
        })
    }
}
