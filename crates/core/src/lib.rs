//! Core library for word-level recitation synchronisation.
//!
//! Precomputed timing tables map each word of a verse onto a window of the
//! reciter's audio. The crate loads those tables, converts between playback
//! time and word numbers, plays isolated word clips, and merges word clip
//! playback with full-verse playback into one highlighted word per verse.

pub mod alignment;
pub mod config;
pub mod error;
pub mod highlight;
pub mod playback;
pub mod resolver;
pub mod signal;
pub mod store;
pub mod word_audio;
pub mod words;

pub use alignment::{
    word_index_to_number, word_number_to_index, AlignmentStats, AlignmentTable, Segment,
    SegmentIssue, VerseAlignment,
};
pub use config::{AlignmentConfig, SyncConfig, WordAudioConfig};
pub use error::{Result, SyncError};
pub use highlight::{derive_highlight, ClickOutcome, SyncSession, VerseHighlighter};
pub use playback::{
    PlaybackClock, VerseListener, VersePlaybackObserver, VersePlaybackState, VersePlayer,
    VerseWordTracker,
};
pub use resolver::{
    resolve_start_time_for_word, resolve_word_at_time, resolve_word_number_at, seconds_to_millis,
};
pub use signal::{StateCell, Subscription};
pub use store::{AlignmentSource, AlignmentStore, DirectorySource};
pub use word_audio::{ClipOutput, WordAudioPlayer, WordAudioState};
pub use words::{clickable_words, StaticWordSource, WordAudioUrlBuilder, WordEntry, WordSource};
