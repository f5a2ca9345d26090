use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::quiz::ai_helper::Personality;

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub personality: Personality,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
    pub voice: String,
    pub speed: f32,
    pub timeout: Duration,
    pub max_chars: usize,
    pub local_command: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: String,
    pub data_dir: PathBuf,
    pub seconds_per_question: u32,
    pub ai: AiSettings,
    pub speech: SpeechSettings,
}

impl Settings {
    /// Reads settings from the environment (after `.env` is loaded).
    ///
    /// Missing keys never fail: AI and speech fall back to their offline paths.
    pub fn from_env() -> Self {
        let ai_key = non_empty("CHATGPT_API_KEY");
        Self {
            database: env::var("DATABASE").unwrap_or_else(|_| "db.sqlite".to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            seconds_per_question: parsed("SECONDS_PER_QUESTION", 60),
            ai: AiSettings {
                api_key: ai_key.clone(),
                model: env::var("CHATGPT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
                temperature: parsed("CHATGPT_TEMPERATURE", 0.7),
                max_tokens: parsed("CHATGPT_MAX_TOKENS", 1500),
                timeout: Duration::from_secs(parsed("CHATGPT_TIMEOUT_SECS", 30)),
                personality: env::var("TUTOR_PERSONALITY")
                    .ok()
                    .and_then(|p| Personality::from_name(&p))
                    .unwrap_or_default(),
            },
            speech: SpeechSettings {
                api_key: non_empty("TTS_API_KEY").or(ai_key),
                url: env::var("TTS_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1/audio/speech".to_string()),
                model: env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string()),
                voice: env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string()),
                speed: parsed("TTS_SPEED", 1.0),
                timeout: Duration::from_secs(parsed("TTS_TIMEOUT_SECS", 10)),
                max_chars: parsed("TTS_MAX_CHARS", 4000),
                local_command: env::var("LOCAL_TTS_COMMAND")
                    .unwrap_or_else(|_| "espeak-ng".to_string()),
            },
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
