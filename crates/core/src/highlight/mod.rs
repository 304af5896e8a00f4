//! Per-verse word highlighting and click routing.
//!
//! A [`VerseHighlighter`] listens to both the word clip player and the verse
//! player and folds them into one highlighted word. A clicked word seeks the
//! verse recording when that verse is playing and has timing data, and plays
//! the isolated word clip otherwise.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    playback::{VersePlaybackObserver, VersePlaybackState},
    resolver::resolve_start_time_for_word,
    signal::Subscription,
    store::AlignmentStore,
    word_audio::{WordAudioPlayer, WordAudioState},
    words::{clickable_words, WordAudioUrlBuilder, WordEntry, WordSource},
};

/// Session-scoped services shared by every rendered verse.
#[derive(Clone)]
pub struct SyncSession {
    pub store: Arc<AlignmentStore>,
    pub word_audio: Arc<WordAudioPlayer>,
    pub verse_playback: Arc<dyn VersePlaybackObserver>,
    pub words: Arc<dyn WordSource>,
    pub urls: WordAudioUrlBuilder,
}

impl SyncSession {
    pub fn new(
        store: Arc<AlignmentStore>,
        word_audio: Arc<WordAudioPlayer>,
        verse_playback: Arc<dyn VersePlaybackObserver>,
        words: Arc<dyn WordSource>,
        urls: WordAudioUrlBuilder,
    ) -> Self {
        Self {
            store,
            word_audio,
            verse_playback,
            words,
            urls,
        }
    }

    pub async fn mount_verse(&self, chapter: u32, verse: u32) -> VerseHighlighter {
        VerseHighlighter::mount(self.clone(), chapter, verse).await
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("store", &self.store)
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}

/// Word highlighted for a verse given both players' states.
///
/// A clip playing in this verse wins over verse playback.
pub fn derive_highlight(
    chapter: u32,
    verse: u32,
    clip: &WordAudioState,
    playback: &VersePlaybackState,
) -> Option<usize> {
    clip.active_word_in(chapter, verse)
        .or_else(|| playback.highlighted_word_in(chapter, verse))
}

/// What a click ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The verse recording was moved to the word's start.
    Seeked { seconds: f64 },
    /// The isolated word clip was started or toggled.
    PlayedClip,
    ClipFailed { message: String },
}

type HighlightListener = Arc<dyn Fn(Option<usize>) + Send + Sync>;

#[derive(Default)]
struct HighlightView {
    clip: WordAudioState,
    playback: VersePlaybackState,
    // Set by a seek click; each lifts on that player's next notification.
    mask_clip: bool,
    mask_playback: bool,
    highlighted: Option<usize>,
    listener: Option<HighlightListener>,
}

impl HighlightView {
    fn recompute(&mut self, chapter: u32, verse: u32) -> Option<HighlightListener> {
        let idle = WordAudioState::default();
        let stopped = VersePlaybackState::default();
        let clip = if self.mask_clip { &idle } else { &self.clip };
        let playback = if self.mask_playback {
            &stopped
        } else {
            &self.playback
        };

        let next = derive_highlight(chapter, verse, clip, playback);
        if next == self.highlighted {
            return None;
        }
        self.highlighted = next;
        self.listener.clone()
    }
}

#[derive(Clone)]
struct SharedView {
    chapter: u32,
    verse: u32,
    inner: Arc<Mutex<HighlightView>>,
}

impl SharedView {
    fn lock(&self) -> MutexGuard<'_, HighlightView> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply<F>(&self, change: F)
    where
        F: FnOnce(&mut HighlightView),
    {
        let (listener, highlighted) = {
            let mut view = self.lock();
            change(&mut view);
            (view.recompute(self.chapter, self.verse), view.highlighted)
        };
        if let Some(listener) = listener {
            listener(highlighted);
        }
    }
}

/// Highlight coordinator for one rendered verse.
///
/// Dropping it unsubscribes from both players.
pub struct VerseHighlighter {
    session: SyncSession,
    view: SharedView,
    words: Vec<WordEntry>,
    _clip_subscription: Subscription,
    _playback_subscription: Subscription,
}

impl VerseHighlighter {
    /// Subscribes to both players and fetches the verse's word list. A
    /// missing word list is not an error; the verse simply renders with no
    /// clickable words.
    pub async fn mount(session: SyncSession, chapter: u32, verse: u32) -> Self {
        let view = SharedView {
            chapter,
            verse,
            inner: Arc::new(Mutex::new(HighlightView::default())),
        };

        let clip_subscription = {
            let view = view.clone();
            session.word_audio.subscribe(move |state| {
                view.apply(|v| {
                    v.clip = state.clone();
                    v.mask_clip = false;
                });
            })
        };
        let playback_subscription = {
            let view = view.clone();
            session
                .verse_playback
                .subscribe(Box::new(move |state: &VersePlaybackState| {
                    view.apply(|v| {
                        v.playback = state.clone();
                        v.mask_playback = false;
                    });
                }))
        };

        let words = match session.words.words_for_verse(chapter, verse).await {
            Ok(words) => clickable_words(words),
            Err(err) => {
                tracing::debug!(chapter, verse, error = %err, "word list unavailable");
                Vec::new()
            }
        };

        Self {
            session,
            view,
            words,
            _clip_subscription: clip_subscription,
            _playback_subscription: playback_subscription,
        }
    }

    pub fn chapter(&self) -> u32 {
        self.view.chapter
    }

    pub fn verse(&self) -> u32 {
        self.view.verse
    }

    pub fn words(&self) -> &[WordEntry] {
        &self.words
    }

    pub fn highlighted_word(&self) -> Option<usize> {
        self.view.lock().highlighted
    }

    /// Registers a renderer callback, called with the current highlight and
    /// then on every change.
    pub fn on_highlight_change<F>(&self, listener: F)
    where
        F: Fn(Option<usize>) + Send + Sync + 'static,
    {
        let listener: HighlightListener = Arc::new(listener);
        let current = {
            let mut view = self.view.lock();
            view.listener = Some(listener.clone());
            view.highlighted
        };
        listener(current);
    }

    /// Routes a click on a 1-based word number.
    pub async fn click_word(&self, word: usize) -> ClickOutcome {
        let (chapter, verse) = (self.view.chapter, self.view.verse);
        let playback = self.session.verse_playback.state();

        if playback.is_playing_verse(chapter, verse) {
            self.view.apply(|v| {
                v.mask_clip = true;
                v.mask_playback = true;
            });

            if let Some(seconds) = self.seek_target(&playback, word).await {
                tracing::debug!(chapter, verse, word, seconds, "seeking to clicked word");
                self.session.verse_playback.seek_to(seconds);
                return ClickOutcome::Seeked { seconds };
            }
            tracing::debug!(chapter, verse, word, "no timing for word, playing clip instead");
        }

        let url = self.session.urls.url(chapter, verse, word);
        match self
            .session
            .word_audio
            .play_word(chapter, verse, word, &url)
            .await
        {
            Ok(()) => ClickOutcome::PlayedClip,
            Err(err) => ClickOutcome::ClipFailed {
                message: err.to_string(),
            },
        }
    }

    /// Removes both subscriptions.
    pub fn unmount(self) {}

    async fn seek_target(&self, playback: &VersePlaybackState, word: usize) -> Option<f64> {
        let edition = playback.edition.as_deref()?;
        if !self.session.store.has_alignment(edition) {
            return None;
        }
        let alignment = self
            .session
            .store
            .verse_alignment(edition, self.view.chapter, self.view.verse)
            .await?;
        resolve_start_time_for_word(&alignment, word)
    }
}

impl std::fmt::Debug for VerseHighlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerseHighlighter")
            .field("chapter", &self.view.chapter)
            .field("verse", &self.view.verse)
            .field("highlighted", &self.highlighted_word())
            .finish()
    }
}
