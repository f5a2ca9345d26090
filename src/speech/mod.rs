//! Read-aloud support.
//!
//! A [`SpeechDispatcher`] turns text into audio with a remote provider, falls
//! back to a local one, and hands the result to an [`AudioSink`]. Each
//! dispatcher owns its playback state and never runs more than one playback:
//! asking it to speak while it is busy stops the current playback instead.
//! Busy covers the whole request, synthesis included; playing only covers the
//! time the sink is playing audio.

pub mod local;
pub mod remote;
pub mod telegram;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::task::JoinHandle;

pub use local::LocalSpeech;
pub use remote::RemoteSpeech;
pub use telegram::TelegramAudio;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("No speech API key configured")]
    MissingCredential,

    #[error("Speech API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Speech request failed: {0}")]
    Transport(String),

    #[error("Speech provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Speech provider unavailable: {0}")]
    Unavailable(String),

    #[error("Could not play audio: {0}")]
    Sink(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "speech.mp3",
            AudioFormat::Wav => "speech.wav",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Audio, SpeechError>;
}

/// Where synthesized audio goes. `play` returns once playback has finished.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, audio: Audio) -> Result<(), SpeechError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Started,
    /// A playback was running; it was stopped and nothing new was started.
    Stopped,
    /// No provider is configured or there is nothing to say.
    Unavailable,
}

struct ActivePlayback {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct PlaybackState {
    active: Option<ActivePlayback>,
    playing: bool,
    generation: u64,
}

impl PlaybackState {
    fn is_current(&self, generation: u64) -> bool {
        self.active.as_ref().map(|a| a.generation) == Some(generation)
    }

    fn take_active(&mut self) -> Option<ActivePlayback> {
        self.playing = false;
        self.active.take()
    }
}

pub struct SpeechDispatcher {
    remote: Option<Arc<dyn Synthesizer>>,
    local: Option<Arc<dyn Synthesizer>>,
    sink: Arc<dyn AudioSink>,
    remote_timeout: Duration,
    max_chars: usize,
    default_voice: String,
    state: Arc<Mutex<PlaybackState>>,
}

impl SpeechDispatcher {
    pub fn new(
        remote: Option<Arc<dyn Synthesizer>>,
        local: Option<Arc<dyn Synthesizer>>,
        sink: Arc<dyn AudioSink>,
        remote_timeout: Duration,
        max_chars: usize,
        default_voice: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            local,
            sink,
            remote_timeout,
            max_chars,
            default_voice: default_voice.into(),
            state: Arc::new(Mutex::new(PlaybackState::default())),
        }
    }

    /// Speaks `text`, or stops the current playback if one is running.
    ///
    /// Provider failures are logged and never reported to the caller.
    pub fn speak(&self, text: &str, voice: Option<&str>) -> SpeakOutcome {
        let mut state = lock(&self.state);
        if let Some(active) = state.take_active() {
            active.handle.abort();
            info!("Speech stopped by a second request");
            return SpeakOutcome::Stopped;
        }

        if self.remote.is_none() && self.local.is_none() {
            warn!("No speech provider available, ignoring read-aloud request");
            return SpeakOutcome::Unavailable;
        }
        let text = truncate_chars(text.trim(), self.max_chars);
        if text.is_empty() {
            debug!("Nothing to read aloud");
            return SpeakOutcome::Unavailable;
        }

        state.generation += 1;
        let generation = state.generation;
        let request = PlaybackRequest {
            remote: self.remote.clone(),
            local: self.local.clone(),
            sink: self.sink.clone(),
            remote_timeout: self.remote_timeout,
            text,
            voice: voice.unwrap_or(self.default_voice.as_str()).to_string(),
        };
        let handle = tokio::spawn(run_playback(request, self.state.clone(), generation));
        state.active = Some(ActivePlayback { generation, handle });
        SpeakOutcome::Started
    }

    /// Stops whatever is playing. Returns whether anything was.
    pub fn stop(&self) -> bool {
        match lock(&self.state).take_active() {
            Some(active) => {
                active.handle.abort();
                debug!("Speech playback stopped");
                true
            }
            None => false,
        }
    }

    /// True while a request is in flight, from `speak` until playback ends.
    pub fn is_busy(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// True only while the sink is playing synthesized audio.
    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    /// Called when the conversation moves out of view.
    pub fn set_visible(&self, visible: bool) {
        if !visible {
            self.stop();
        }
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One dispatcher per conversation, created on first use and forgotten when
/// the conversation hides its audio.
pub struct VoiceRegistry<K> {
    voices: Mutex<HashMap<K, Arc<SpeechDispatcher>>>,
}

impl<K: Eq + Hash> VoiceRegistry<K> {
    pub fn new() -> Self {
        Self {
            voices: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_insert_with(
        &self,
        key: K,
        make: impl FnOnce() -> SpeechDispatcher,
    ) -> Arc<SpeechDispatcher> {
        lock(&self.voices)
            .entry(key)
            .or_insert_with(|| Arc::new(make()))
            .clone()
    }

    /// Stops the conversation's playback and drops its dispatcher.
    /// Returns whether there was one.
    pub fn hide(&self, key: &K) -> bool {
        let removed = lock(&self.voices).remove(key);
        match removed {
            Some(voice) => {
                voice.set_visible(false);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.voices).len()
    }
}

impl<K: Eq + Hash> Default for VoiceRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

struct PlaybackRequest {
    remote: Option<Arc<dyn Synthesizer>>,
    local: Option<Arc<dyn Synthesizer>>,
    sink: Arc<dyn AudioSink>,
    remote_timeout: Duration,
    text: String,
    voice: String,
}

async fn run_playback(
    request: PlaybackRequest,
    state: Arc<Mutex<PlaybackState>>,
    generation: u64,
) {
    match synthesize(&request).await {
        Some(audio) => {
            {
                let mut state = lock(&state);
                if !state.is_current(generation) {
                    return;
                }
                state.playing = true;
            }
            if let Err(e) = request.sink.play(audio).await {
                warn!("{}", e);
            }
        }
        None => warn!("Speech is not available right now, nothing was played"),
    }

    let mut state = lock(&state);
    if state.is_current(generation) {
        state.take_active();
    }
}

async fn synthesize(request: &PlaybackRequest) -> Option<Audio> {
    if let Some(remote) = &request.remote {
        let attempt = tokio::time::timeout(
            request.remote_timeout,
            remote.synthesize(&request.text, &request.voice),
        )
        .await
        .unwrap_or(Err(SpeechError::Timeout(request.remote_timeout)));
        match attempt {
            Ok(audio) => return Some(audio),
            Err(e) => warn!("{} speech failed, falling back: {}", remote.name(), e),
        }
    }

    let local = request.local.as_ref()?;
    match local.synthesize(&request.text, &request.voice).await {
        Ok(audio) => Some(audio),
        Err(e) => {
            warn!("{} speech failed: {}", local.name(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    struct FakeVoice {
        delay: Duration,
        fail: bool,
        format: AudioFormat,
        calls: AtomicUsize,
        texts: Mutex<Vec<String>>,
    }

    impl FakeVoice {
        fn new(delay: Duration, fail: bool, format: AudioFormat) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail,
                format,
                calls: AtomicUsize::new(0),
                texts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Synthesizer for FakeVoice {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn synthesize(&self, text: &str, _voice: &str) -> Result<Audio, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.lock().unwrap().push(text.to_string());
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SpeechError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(Audio {
                bytes: vec![1, 2, 3],
                format: self.format,
            })
        }
    }

    /// Plays until the test hands out a permit.
    struct GatedSink {
        gate: Semaphore,
        played: Mutex<Vec<AudioFormat>>,
    }

    impl GatedSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                played: Mutex::new(Vec::new()),
            })
        }

        fn played(&self) -> Vec<AudioFormat> {
            self.played.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioSink for GatedSink {
        async fn play(&self, audio: Audio) -> Result<(), SpeechError> {
            self.played.lock().unwrap().push(audio.format);
            self.gate
                .acquire()
                .await
                .map_err(|e| SpeechError::Sink(e.to_string()))?
                .forget();
            Ok(())
        }
    }

    fn dispatcher(
        remote: Option<Arc<FakeVoice>>,
        local: Option<Arc<FakeVoice>>,
        sink: Arc<GatedSink>,
    ) -> SpeechDispatcher {
        SpeechDispatcher::new(
            remote.map(|r| r as Arc<dyn Synthesizer>),
            local.map(|l| l as Arc<dyn Synthesizer>),
            sink,
            Duration::from_secs(10),
            20,
            "alloy",
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn remote_timeout_falls_back_to_local_once() {
        let remote = FakeVoice::new(Duration::from_secs(60), false, AudioFormat::Mp3);
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let speech = dispatcher(Some(remote.clone()), Some(local.clone()), sink.clone());

        assert_eq!(speech.speak("Read this question", None), SpeakOutcome::Started);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(local.calls(), 0);
        assert!(speech.is_busy());
        assert!(!speech.is_playing());

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(remote.calls(), 1);
        assert_eq!(local.calls(), 1);
        assert_eq!(sink.played(), vec![AudioFormat::Wav]);
        assert!(speech.is_playing());

        sink.gate.add_permits(1);
        settle().await;
        assert!(!speech.is_playing());
        assert!(!speech.is_busy());
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_speak_during_synthesis_stops_it() {
        let remote = FakeVoice::new(Duration::from_secs(60), false, AudioFormat::Mp3);
        let sink = GatedSink::new();
        let speech = dispatcher(Some(remote.clone()), None, sink.clone());

        speech.speak("first", None);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(speech.speak("second", None), SpeakOutcome::Stopped);
        assert!(!speech.is_busy());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(sink.played().is_empty());
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_success_skips_local() {
        let remote = FakeVoice::new(Duration::from_secs(1), false, AudioFormat::Mp3);
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let speech = dispatcher(Some(remote.clone()), Some(local.clone()), sink.clone());

        speech.speak("hello", None);
        tokio::time::sleep(Duration::from_secs(2)).await;
        sink.gate.add_permits(1);
        settle().await;

        assert_eq!(local.calls(), 0);
        assert_eq!(sink.played(), vec![AudioFormat::Mp3]);
        assert!(!speech.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_falls_back() {
        let remote = FakeVoice::new(Duration::ZERO, true, AudioFormat::Mp3);
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let speech = dispatcher(Some(remote), Some(local.clone()), sink.clone());

        speech.speak("hello", None);
        settle().await;
        assert_eq!(local.calls(), 1);
        assert_eq!(sink.played(), vec![AudioFormat::Wav]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_speak_stops_playback() {
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let speech = dispatcher(None, Some(local.clone()), sink.clone());

        assert_eq!(speech.speak("first", None), SpeakOutcome::Started);
        assert_eq!(speech.speak("second", None), SpeakOutcome::Stopped);
        assert!(!speech.is_playing());
        assert!(!speech.is_busy());

        settle().await;
        assert!(!speech.is_playing());
        assert!(local.calls() <= 1);
        assert!(!local.texts.lock().unwrap().contains(&"second".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_visibility_stops() {
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let speech = dispatcher(None, Some(local), sink);

        assert!(!speech.stop());
        speech.speak("hello", None);
        settle().await;
        assert!(speech.is_playing());

        speech.set_visible(true);
        assert!(speech.is_playing());
        speech.set_visible(false);
        assert!(!speech.is_playing());
        assert!(!speech.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn registry_forgets_hidden_conversations() {
        let local = FakeVoice::new(Duration::ZERO, false, AudioFormat::Wav);
        let sink = GatedSink::new();
        let voices = VoiceRegistry::new();
        let make = || dispatcher(None, Some(local.clone()), sink.clone());

        let first = voices.get_or_insert_with(1, make);
        let again = voices.get_or_insert_with(1, make);
        assert!(Arc::ptr_eq(&first, &again));
        voices.get_or_insert_with(2, make);
        assert_eq!(voices.len(), 2);

        first.speak("hello", None);
        settle().await;
        assert!(first.is_playing());

        assert!(voices.hide(&1));
        assert!(!first.is_playing());
        assert!(!first.is_busy());
        assert_eq!(voices.len(), 1);
        assert!(!voices.hide(&1));
    }

    #[tokio::test]
    async fn without_providers_nothing_happens() {
        let sink = GatedSink::new();
        let speech = dispatcher(None, None, sink.clone());
        assert_eq!(speech.speak("hello", None), SpeakOutcome::Unavailable);
        assert!(!speech.is_playing());
        assert!(sink.played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn text_is_truncated_before_synthesis() {
        let remote = FakeVoice::new(Duration::ZERO, false, AudioFormat::Mp3);
        let sink = GatedSink::new();
        let speech = dispatcher(Some(remote.clone()), None, sink);

        speech.speak("Ọ̀rọ̀ àti ìbéèrè ní èdè Yorùbá gígùn", None);
        settle().await;
        let texts = remote.texts.lock().unwrap().clone();
        assert_eq!(texts[0].chars().count(), 20);
    }
}
