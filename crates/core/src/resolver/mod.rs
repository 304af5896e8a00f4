use crate::alignment::{word_index_to_number, word_number_to_index, VerseAlignment};

/// Converts a playback position in seconds to whole milliseconds.
///
/// Rounds to the nearest millisecond so that a seek target produced by
/// [`resolve_start_time_for_word`] maps back onto the same segment.
pub fn seconds_to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Returns the 0-based index of the word being recited at `elapsed_ms`.
///
/// Segments are half-open, so a timestamp on a boundary belongs to the
/// segment starting there. Past the final segment the last word stays
/// highlighted; before the first segment, and inside gaps between
/// segments, nothing is.
pub fn resolve_word_at_time(alignment: &VerseAlignment, elapsed_ms: u64) -> Option<usize> {
    if let Some(segment) = alignment
        .segments
        .iter()
        .find(|segment| segment.contains(elapsed_ms))
    {
        return Some(segment.word_start);
    }

    let last = alignment.segments.last()?;
    if elapsed_ms >= last.end_ms {
        return Some(last.word_start);
    }

    None
}

/// Same lookup as [`resolve_word_at_time`], answered as a 1-based word number.
pub fn resolve_word_number_at(alignment: &VerseAlignment, position_secs: f64) -> Option<usize> {
    word_index_to_number(resolve_word_at_time(
        alignment,
        seconds_to_millis(position_secs),
    ))
}

/// Returns the seek target, in seconds, for a 1-based word number.
///
/// Only words that begin a segment can be seeked to; words inside a
/// multi-word segment, and out-of-range numbers, yield `None`.
pub fn resolve_start_time_for_word(alignment: &VerseAlignment, word_number: usize) -> Option<f64> {
    let index = word_number_to_index(word_number)?;
    alignment
        .segments
        .iter()
        .find(|segment| segment.word_start == index)
        .map(|segment| segment.start_ms as f64 / 1000.0)
}
