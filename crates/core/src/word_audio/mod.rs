use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use async_trait::async_trait;

use crate::{
    signal::{StateCell, Subscription},
    Result, SyncError,
};

/// The single audio resource dedicated to isolated word clips.
///
/// Pointing it at a new URL abandons whatever it was playing.
#[async_trait]
pub trait ClipOutput: Send + Sync {
    /// Loads `url` and begins playback. Resolves once audio has started.
    async fn start(&self, url: &str) -> Result<()>;
    fn pause(&self);
    /// Stops playback and releases the current source.
    fn halt(&self);
}

/// Snapshot of the word clip player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordAudioState {
    pub is_playing: bool,
    pub chapter: Option<u32>,
    pub verse: Option<u32>,
    /// 1-based word number.
    pub word: Option<usize>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl WordAudioState {
    pub fn is_idle(&self) -> bool {
        !self.is_playing && !self.is_loading
    }

    fn refers_to(&self, chapter: u32, verse: u32, word: usize) -> bool {
        self.chapter == Some(chapter) && self.verse == Some(verse) && self.word == Some(word)
    }

    /// Word being loaded or played within the given verse.
    pub fn active_word_in(&self, chapter: u32, verse: u32) -> Option<usize> {
        if self.is_idle() || self.chapter != Some(chapter) || self.verse != Some(verse) {
            return None;
        }
        self.word
    }
}

/// Plays individually clicked words through one [`ClipOutput`].
///
/// Each call to [`WordAudioPlayer::play_word`] takes a fresh generation
/// number; a call that finishes after a newer request, a pause or a stop
/// leaves the state alone. Resource events name the URL they belong to, so
/// events from a replaced clip are dropped.
pub struct WordAudioPlayer {
    output: Arc<dyn ClipOutput>,
    state: StateCell<WordAudioState>,
    generation: AtomicU64,
    source: Mutex<Option<String>>,
}

impl WordAudioPlayer {
    pub fn new(output: Arc<dyn ClipOutput>) -> Self {
        Self {
            output,
            state: StateCell::new(WordAudioState::default()),
            generation: AtomicU64::new(0),
            source: Mutex::new(None),
        }
    }

    /// Plays one word clip, or pauses it if that exact word is already
    /// playing. Fails only when the clip could not start, after the state
    /// has returned to idle with `error` set.
    pub async fn play_word(&self, chapter: u32, verse: u32, word: usize, url: &str) -> Result<()> {
        let current = self.state.get();
        if current.is_playing && current.refers_to(chapter, verse, word) {
            tracing::debug!(chapter, verse, word, "toggling word clip off");
            self.pause();
            return Ok(());
        }

        let generation = self.next_generation();
        *self.lock_source() = Some(url.to_string());
        self.state.update(|state| {
            *state = WordAudioState {
                is_playing: false,
                chapter: Some(chapter),
                verse: Some(verse),
                word: Some(word),
                is_loading: true,
                error: None,
            };
        });

        let outcome = self.output.start(url).await;
        if !self.is_current(generation) {
            tracing::debug!(chapter, verse, word, "word clip request superseded");
            return Ok(());
        }

        match outcome {
            Ok(()) => {
                self.state.update(|state| {
                    state.is_playing = true;
                    state.is_loading = false;
                });
                Ok(())
            }
            Err(err) => {
                let message = match err {
                    SyncError::Playback { message } => message,
                    other => other.to_string(),
                };
                tracing::warn!(chapter, verse, word, url, error = %message, "word clip failed");
                self.state.update(|state| {
                    state.is_playing = false;
                    state.is_loading = false;
                    state.error = Some(message.clone());
                });
                Err(SyncError::playback(message))
            }
        }
    }

    /// Pauses the clip, keeping which word it was.
    pub fn pause(&self) {
        self.next_generation();
        self.output.pause();
        self.state.update(|state| {
            state.is_playing = false;
            state.is_loading = false;
        });
    }

    /// Stops playback and forgets the current word.
    pub fn stop(&self) {
        self.next_generation();
        *self.lock_source() = None;
        self.output.halt();
        self.state.set(WordAudioState::default());
    }

    /// Called by the output owner when the clip at `url` plays to the end.
    /// Ignored while a newer clip is still loading.
    pub fn clip_ended(&self, url: &str) {
        if !self.is_source(url) {
            tracing::debug!(url, "ignoring end of replaced word clip");
            return;
        }
        self.state.update(|state| {
            if state.is_loading {
                return;
            }
            state.is_playing = false;
        });
    }

    /// Called by the output owner when the resource reports an error for
    /// the clip at `url`.
    pub fn clip_failed(&self, url: &str, message: impl Into<String>) {
        if !self.is_source(url) {
            tracing::debug!(url, "ignoring error from replaced word clip");
            return;
        }
        let message = message.into();
        self.state.update(|state| {
            state.is_playing = false;
            state.is_loading = false;
            state.error = Some(message);
        });
    }

    pub fn state(&self) -> WordAudioState {
        self.state.get()
    }

    pub fn is_word_playing(&self, chapter: u32, verse: u32, word: usize) -> bool {
        let state = self.state.get();
        state.is_playing && state.refers_to(chapter, verse, word)
    }

    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&WordAudioState) + Send + Sync + 'static,
    {
        self.state.subscribe(listener)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn is_source(&self, url: &str) -> bool {
        self.lock_source().as_deref() == Some(url)
    }

    fn lock_source(&self) -> MutexGuard<'_, Option<String>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WordAudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordAudioPlayer")
            .field("state", &self.state.get())
            .finish()
    }
}
