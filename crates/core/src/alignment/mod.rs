//! Word timing tables produced ahead of time for each reciter.
//!
//! A table is a list of verse records. Each verse owns time-ordered segments
//! that map a run of 0-based word indices onto a millisecond window of the
//! verse recording. Everything else in the crate addresses words by their
//! 1-based *word number*; [`word_number_to_index`] and
//! [`word_index_to_number`] are the only places that convert between the two.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Converts a 1-based word number into a 0-based segment index.
pub fn word_number_to_index(word_number: usize) -> Option<usize> {
    word_number.checked_sub(1)
}

/// Converts a 0-based segment index into the 1-based word number.
pub fn word_index_to_number(word_index: Option<usize>) -> Option<usize> {
    word_index.map(|index| index + 1)
}

type SegmentRepr = (usize, usize, u64, u64);

/// One timing window, stored on disk as
/// `[word_start, word_end_exclusive, start_ms, end_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SegmentRepr", into = "SegmentRepr")]
pub struct Segment {
    pub word_start: usize,
    pub word_end: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Segment {
    pub fn new(word_start: usize, word_end: usize, start_ms: u64, end_ms: u64) -> Self {
        Self {
            word_start,
            word_end,
            start_ms,
            end_ms,
        }
    }

    /// Half-open containment: `start_ms <= t < end_ms`.
    pub fn contains(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.start_ms && elapsed_ms < self.end_ms
    }

    pub fn word_count(&self) -> usize {
        self.word_end.saturating_sub(self.word_start)
    }
}

impl From<SegmentRepr> for Segment {
    fn from((word_start, word_end, start_ms, end_ms): SegmentRepr) -> Self {
        Self::new(word_start, word_end, start_ms, end_ms)
    }
}

impl From<Segment> for SegmentRepr {
    fn from(segment: Segment) -> Self {
        (
            segment.word_start,
            segment.word_end,
            segment.start_ms,
            segment.end_ms,
        )
    }
}

/// Alignment quality counters emitted by the aligner, carried through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentStats {
    #[serde(default)]
    pub deletions: Option<u32>,
    #[serde(default)]
    pub transpositions: Option<u32>,
    #[serde(default)]
    pub insertions: Option<u32>,
}

/// Segments for a single verse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseAlignment {
    #[serde(rename = "surah")]
    pub chapter: u32,
    #[serde(rename = "ayah")]
    pub verse: u32,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<AlignmentStats>,
}

impl VerseAlignment {
    pub fn new(chapter: u32, verse: u32, segments: Vec<Segment>) -> Self {
        Self {
            chapter,
            verse,
            segments,
            stats: None,
        }
    }

    /// Sorts segments by start time and checks the ordering invariants.
    pub fn normalize(&mut self) -> Result<(), SegmentIssue> {
        self.segments.sort_by_key(|segment| segment.start_ms);

        for (position, segment) in self.segments.iter().enumerate() {
            if segment.word_end <= segment.word_start {
                return Err(SegmentIssue::EmptyWordRange { position });
            }
            if segment.end_ms <= segment.start_ms {
                return Err(SegmentIssue::EmptyTimeWindow { position });
            }
        }

        for (position, pair) in self.segments.windows(2).enumerate() {
            if pair[1].start_ms < pair[0].end_ms {
                return Err(SegmentIssue::Overlap {
                    position: position + 1,
                });
            }
        }

        Ok(())
    }
}

/// Reason a verse record was rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentIssue {
    EmptyWordRange { position: usize },
    EmptyTimeWindow { position: usize },
    Overlap { position: usize },
}

impl fmt::Display for SegmentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWordRange { position } => {
                write!(f, "segment {position} has an empty word range")
            }
            Self::EmptyTimeWindow { position } => {
                write!(f, "segment {position} ends before it starts")
            }
            Self::Overlap { position } => {
                write!(f, "segment {position} overlaps the previous segment")
            }
        }
    }
}

/// Every verse record for one reciter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentTable {
    verses: Vec<VerseAlignment>,
}

impl AlignmentTable {
    /// Builds a table, dropping verse records whose segments are malformed.
    pub fn from_records(records: Vec<VerseAlignment>) -> Self {
        let mut verses = Vec::with_capacity(records.len());
        for mut record in records {
            match record.normalize() {
                Ok(()) => verses.push(record),
                Err(issue) => tracing::warn!(
                    chapter = record.chapter,
                    verse = record.verse,
                    %issue,
                    "dropping malformed verse alignment"
                ),
            }
        }
        Self { verses }
    }

    /// Parses the JSON array form of a table.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let records: Vec<VerseAlignment> = serde_json::from_slice(bytes)?;
        Ok(Self::from_records(records))
    }

    /// Linear scan for the verse record. Absence is common: many reciters
    /// only cover part of the text.
    pub fn verse(&self, chapter: u32, verse: u32) -> Option<&VerseAlignment> {
        self.verses
            .iter()
            .find(|record| record.chapter == chapter && record.verse == verse)
    }

    pub fn verses(&self) -> &[VerseAlignment] {
        &self.verses
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}
