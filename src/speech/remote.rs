use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Serialize;

use crate::config::SpeechSettings;
use crate::speech::{Audio, AudioFormat, SpeechError, Synthesizer};

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// OpenAI-compatible `/audio/speech` endpoint returning MP3 bytes.
#[derive(Clone)]
pub struct RemoteSpeech {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    speed: f32,
}

impl RemoteSpeech {
    pub fn new(settings: &SpeechSettings) -> Self {
        Self {
            client: Client::new(),
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            speed: settings.speed,
        }
    }
}

#[async_trait]
impl Synthesizer for RemoteSpeech {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Audio, SpeechError> {
        let api_key = self.api_key.as_ref().ok_or(SpeechError::MissingCredential)?;
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: "mp3",
            speed: self.speed,
        };

        info!("Requesting {} characters of speech", text.chars().count());
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SpeechError::Transport("empty audio body".to_string()));
        }
        Ok(Audio {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(api_key: Option<&str>) -> SpeechSettings {
        SpeechSettings {
            api_key: api_key.map(str::to_string),
            // Nothing listens on port 9 (discard)
            url: "http://127.0.0.1:9/v1/audio/speech".to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            timeout: Duration::from_secs(10),
            max_chars: 4000,
            local_command: "espeak-ng".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_key_is_reported_without_a_request() {
        let remote = RemoteSpeech::new(&settings(None));
        assert!(matches!(
            remote.synthesize("hello", "alloy").await,
            Err(SpeechError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let remote = RemoteSpeech::new(&settings(Some("sk-test")));
        assert!(matches!(
            remote.synthesize("hello", "alloy").await,
            Err(SpeechError::Transport(_))
        ));
    }

    #[test]
    fn request_body_has_expected_fields() {
        let body = serde_json::to_value(SpeechRequest {
            model: "tts-1",
            input: "hi",
            voice: "nova",
            response_format: "mp3",
            speed: 1.0,
        })
        .unwrap();
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["response_format"], "mp3");
        assert_eq!(body["speed"], 1.0);
    }
}
