//! Full-verse playback as seen by the word highlighter.
//!
//! The verse player itself lives outside this crate; the highlighter only
//! needs [`VersePlaybackObserver`]. [`VersePlayer`] is an in-process
//! implementation driven by position ticks, used by the CLI and in tests.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::{
    alignment::VerseAlignment,
    resolver::resolve_word_number_at,
    signal::{StateCell, Subscription},
    store::AlignmentStore,
};

/// Snapshot published by the verse player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersePlaybackState {
    pub is_playing: bool,
    pub chapter: Option<u32>,
    pub verse: Option<u32>,
    /// 1-based word currently recited, when alignment data allows it.
    pub word_number: Option<usize>,
    /// Reciter edition id, e.g. `ar.alafasy`.
    pub edition: Option<String>,
    pub position_secs: f64,
}

impl VersePlaybackState {
    pub fn is_playing_verse(&self, chapter: u32, verse: u32) -> bool {
        self.is_playing && self.chapter == Some(chapter) && self.verse == Some(verse)
    }

    pub fn highlighted_word_in(&self, chapter: u32, verse: u32) -> Option<usize> {
        if self.is_playing_verse(chapter, verse) {
            self.word_number
        } else {
            None
        }
    }
}

pub type VerseListener = Box<dyn Fn(&VersePlaybackState) + Send + Sync>;

/// Read-only view of the full-verse player, plus its seek command.
pub trait VersePlaybackObserver: Send + Sync {
    fn state(&self) -> VersePlaybackState;

    /// Calls `listener` with the current state, then on every change.
    fn subscribe(&self, listener: VerseListener) -> Subscription;

    /// Fire-and-forget seek within the current verse recording.
    fn seek_to(&self, seconds: f64);
}

/// Monotonic playback position.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    pub fn seek(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }
}

/// Turns playback positions into word numbers for one verse at a time.
///
/// The verse alignment is fetched on the first position of a new verse and
/// reused for later ticks.
#[derive(Debug)]
pub struct VerseWordTracker {
    store: Arc<AlignmentStore>,
    loaded: Option<LoadedVerse>,
}

#[derive(Debug)]
struct LoadedVerse {
    edition: String,
    chapter: u32,
    verse: u32,
    alignment: Option<VerseAlignment>,
}

impl VerseWordTracker {
    pub fn new(store: Arc<AlignmentStore>) -> Self {
        Self {
            store,
            loaded: None,
        }
    }

    pub fn reset(&mut self) {
        self.loaded = None;
    }

    /// Word number recited at `position_secs`, or `None` when the edition
    /// has no timing data for the verse.
    pub async fn word_at(
        &mut self,
        edition: &str,
        chapter: u32,
        verse: u32,
        position_secs: f64,
    ) -> Option<usize> {
        if !self.store.has_alignment(edition) {
            return None;
        }

        let stale = match &self.loaded {
            Some(loaded) => {
                !loaded.edition.eq_ignore_ascii_case(edition)
                    || loaded.chapter != chapter
                    || loaded.verse != verse
            }
            None => true,
        };
        if stale {
            let alignment = self.store.verse_alignment(edition, chapter, verse).await;
            self.loaded = Some(LoadedVerse {
                edition: edition.to_string(),
                chapter,
                verse,
                alignment,
            });
        }

        let alignment = self.loaded.as_ref()?.alignment.as_ref()?;
        resolve_word_number_at(alignment, position_secs)
    }
}

/// Reference verse player that publishes word-level progress.
pub struct VersePlayer {
    state: StateCell<VersePlaybackState>,
    tracker: AsyncMutex<VerseWordTracker>,
}

impl VersePlayer {
    pub fn new(store: Arc<AlignmentStore>) -> Self {
        Self {
            state: StateCell::new(VersePlaybackState::default()),
            tracker: AsyncMutex::new(VerseWordTracker::new(store)),
        }
    }

    /// Begins a verse from the top.
    pub fn start_verse(&self, edition: &str, chapter: u32, verse: u32) {
        tracing::info!(edition, chapter, verse, "starting verse playback");
        self.state.set(VersePlaybackState {
            is_playing: true,
            chapter: Some(chapter),
            verse: Some(verse),
            word_number: None,
            edition: Some(edition.to_string()),
            position_secs: 0.0,
        });
    }

    pub fn pause(&self) {
        self.state.update(|state| state.is_playing = false);
    }

    pub fn resume(&self) {
        self.state.update(|state| {
            if state.chapter.is_some() {
                state.is_playing = true;
            }
        });
    }

    pub fn stop(&self) {
        self.state.set(VersePlaybackState::default());
    }

    /// Reports a new playback position and refreshes the current word.
    pub async fn tick(&self, position_secs: f64) {
        let snapshot = self.state.get();
        let (Some(edition), Some(chapter), Some(verse)) =
            (snapshot.edition.clone(), snapshot.chapter, snapshot.verse)
        else {
            return;
        };

        let word = self
            .tracker
            .lock()
            .await
            .word_at(&edition, chapter, verse, position_secs)
            .await;

        self.state.update(|state| {
            if state.chapter != Some(chapter) || state.verse != Some(verse) {
                return;
            }
            state.position_secs = position_secs;
            state.word_number = word;
        });
    }

    /// Advances `clock` by `delta` seconds and ticks at the new position.
    pub async fn advance(&self, clock: &mut PlaybackClock, delta: f64) {
        clock.advance(delta);
        self.tick(clock.time_seconds).await;
    }
}

impl VersePlaybackObserver for VersePlayer {
    fn state(&self) -> VersePlaybackState {
        self.state.get()
    }

    fn subscribe(&self, listener: VerseListener) -> Subscription {
        self.state.subscribe(listener)
    }

    /// The word is unknown until the next tick reports the new position.
    fn seek_to(&self, seconds: f64) {
        tracing::debug!(seconds, "seeking verse playback");
        self.state.update(|state| {
            state.position_secs = seconds.max(0.0);
            state.word_number = None;
        });
    }
}

impl std::fmt::Debug for VersePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersePlayer")
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{store::AlignmentSource, Result, SyncError};

    struct OneTable;

    #[async_trait]
    impl AlignmentSource for OneTable {
        async fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
            match filename {
                "Alafasy.json" => Ok(br#"[{"surah": 1, "ayah": 1,
                    "segments": [[0, 1, 60, 610], [1, 2, 620, 1310]]}]"#
                    .to_vec()),
                other => Err(SyncError::msg(format!("{other} missing"))),
            }
        }
    }

    fn store() -> Arc<AlignmentStore> {
        Arc::new(AlignmentStore::new(
            BTreeMap::from([("ar.alafasy".to_string(), "Alafasy.json".to_string())]),
            Arc::new(OneTable),
        ))
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(0.5);
        clock.advance(-2.0);
        assert_eq!(clock.time_seconds, 0.0);
        clock.seek(1.25);
        assert_eq!(clock.time_seconds, 1.25);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }

    #[tokio::test]
    async fn tracker_follows_positions() {
        let mut tracker = VerseWordTracker::new(store());
        assert_eq!(tracker.word_at("ar.alafasy", 1, 1, 0.01).await, None);
        assert_eq!(tracker.word_at("ar.alafasy", 1, 1, 0.5).await, Some(1));
        assert_eq!(tracker.word_at("AR.ALAFASY", 1, 1, 0.62).await, Some(2));
        assert_eq!(tracker.word_at("ar.alafasy", 1, 1, 4.0).await, Some(2));
    }

    #[tokio::test]
    async fn tracker_without_alignment_reports_nothing() {
        let mut tracker = VerseWordTracker::new(store());
        assert_eq!(tracker.word_at("ar.sudais", 1, 1, 0.5).await, None);
        assert_eq!(tracker.word_at("ar.alafasy", 1, 7, 0.5).await, None);
    }

    #[tokio::test]
    async fn player_publishes_word_changes_only() {
        let player = VersePlayer::new(store());
        let words = Arc::new(Mutex::new(Vec::new()));
        let sink = words.clone();
        let _sub = player.subscribe(Box::new(move |state: &VersePlaybackState| {
            let mut words = sink.lock().unwrap();
            if words.last() != Some(&state.word_number) {
                words.push(state.word_number);
            }
        }));

        player.start_verse("ar.alafasy", 1, 1);
        let mut clock = PlaybackClock::default();
        for _ in 0..16 {
            player.advance(&mut clock, 0.1).await;
        }

        assert_eq!(*words.lock().unwrap(), vec![None, Some(1), Some(2)]);
        assert!(player.state().is_playing_verse(1, 1));
        assert_eq!(player.state().highlighted_word_in(1, 1), Some(2));
        assert_eq!(player.state().highlighted_word_in(1, 2), None);
    }

    #[tokio::test]
    async fn seek_moves_position_and_next_tick_updates_word() {
        let player = VersePlayer::new(store());
        player.start_verse("ar.alafasy", 1, 1);
        player.tick(0.2).await;
        assert_eq!(player.state().word_number, Some(1));

        player.seek_to(0.62);
        assert_eq!(player.state().position_secs, 0.62);
        assert_eq!(player.state().word_number, None);
        player.tick(0.62).await;
        assert_eq!(player.state().word_number, Some(2));
    }

    #[tokio::test]
    async fn pause_and_stop_clear_highlight_eligibility() {
        let player = VersePlayer::new(store());
        player.start_verse("ar.alafasy", 1, 1);
        player.tick(0.2).await;

        player.pause();
        assert_eq!(player.state().highlighted_word_in(1, 1), None);
        player.resume();
        assert_eq!(player.state().highlighted_word_in(1, 1), Some(1));

        player.stop();
        assert_eq!(player.state(), VersePlaybackState::default());
        player.tick(0.5).await;
        assert_eq!(player.state(), VersePlaybackState::default());
    }
}
