use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::speech::{Audio, AudioSink, SpeechError};

/// Delivers synthesized audio to a chat. Playback ends when the upload does.
pub struct TelegramAudio {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramAudio {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl AudioSink for TelegramAudio {
    async fn play(&self, audio: Audio) -> Result<(), SpeechError> {
        let file = InputFile::memory(audio.bytes).file_name(audio.format.file_name());
        self.bot
            .send_audio(self.chat_id, file)
            .await
            .map_err(|e| SpeechError::Sink(e.to_string()))?;
        Ok(())
    }
}
