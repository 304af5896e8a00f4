use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{config::WordAudioConfig, Result};

/// One word of verse text, addressed by its 1-based number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word_number: usize,
    pub text: String,
}

impl WordEntry {
    pub fn new(word_number: usize, text: impl Into<String>) -> Self {
        Self {
            word_number,
            text: text.into(),
        }
    }

    /// Verse-end markers are written as Arabic-Indic digits only.
    pub fn is_verse_marker(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty() && text.chars().all(|c| ('\u{0660}'..='\u{0669}').contains(&c))
    }
}

/// Supplies the word list of a verse.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn words_for_verse(&self, chapter: u32, verse: u32) -> Result<Vec<WordEntry>>;
}

/// Drops verse markers and orders words by number.
pub fn clickable_words(mut words: Vec<WordEntry>) -> Vec<WordEntry> {
    words.retain(|word| !word.is_verse_marker());
    words.sort_by_key(|word| word.word_number);
    words
}

/// Word lists held in memory, keyed by chapter and verse.
#[derive(Debug, Default, Clone)]
pub struct StaticWordSource {
    verses: HashMap<(u32, u32), Vec<WordEntry>>,
}

impl StaticWordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chapter: u32, verse: u32, words: Vec<WordEntry>) {
        self.verses.insert((chapter, verse), words);
    }

    /// Numbers whitespace-separated words from 1.
    pub fn insert_text(&mut self, chapter: u32, verse: u32, text: &str) {
        let words = text
            .split_whitespace()
            .enumerate()
            .map(|(index, word)| WordEntry::new(index + 1, word))
            .collect();
        self.insert(chapter, verse, words);
    }
}

#[async_trait]
impl WordSource for StaticWordSource {
    async fn words_for_verse(&self, chapter: u32, verse: u32) -> Result<Vec<WordEntry>> {
        Ok(self
            .verses
            .get(&(chapter, verse))
            .cloned()
            .unwrap_or_default())
    }
}

/// Builds per-word clip URLs of the form `{base}/001/001_002_003.mp3`.
#[derive(Debug, Clone)]
pub struct WordAudioUrlBuilder {
    base_url: String,
}

impl WordAudioUrlBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &WordAudioConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn url(&self, chapter: u32, verse: u32, word: usize) -> String {
        format!(
            "{base}/{chapter:03}/{chapter:03}_{verse:03}_{word:03}.mp3",
            base = self.base_url
        )
    }
}

impl Default for WordAudioUrlBuilder {
    fn default() -> Self {
        Self::from_config(&WordAudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_zero_padded_urls() {
        let urls = WordAudioUrlBuilder::new("https://cdn.example/wbw/");
        assert_eq!(
            urls.url(2, 255, 12),
            "https://cdn.example/wbw/002/002_255_012.mp3"
        );
        assert!(WordAudioUrlBuilder::default()
            .url(1, 1, 1)
            .ends_with("/001/001_001_001.mp3"));
    }

    #[test]
    fn filters_verse_markers() {
        let words = clickable_words(vec![
            WordEntry::new(2, "ٱللَّهِ"),
            WordEntry::new(5, "١"),
            WordEntry::new(1, "بِسْمِ"),
        ]);
        let numbers: Vec<usize> = words.iter().map(|w| w.word_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn static_source_numbers_words_from_one() {
        let mut source = StaticWordSource::new();
        source.insert_text(1, 1, "bismi allahi alrrahmani alrraheemi");

        let words = source.words_for_verse(1, 1).await.unwrap();
        assert_eq!(words.len(), 4);
        assert_eq!(words[0], WordEntry::new(1, "bismi"));
        assert!(source.words_for_verse(9, 9).await.unwrap().is_empty());
    }
}
