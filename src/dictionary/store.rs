//! The segmented index.
//!
//! Lookups are done in two steps: a binary search over the last headword of every segment picks
//! the segment, then a binary search inside that segment finds the entry. Both steps compute lower
//! bounds, so when a headword appears several times, the first occurrence in the file is found.

use std::cmp::Ordering;
use std::path::Path;

use fxhash::FxHashSet;
use serde::{Serialize, Deserialize};

use super::errors::DictError;
use super::indexing::{Collation, IndexEntry};
use super::segment::{Segment, SegmentBuilder};
use crate::settings::Settings;

/// Only the segments and the collation are stored: the rest is rebuilt when a store is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredIndex")]
pub struct IndexStore {
    segments: Vec<Segment>,
    // Ordinal of the first entry of each segment.
    #[serde(skip_serializing)]
    starts: Vec<usize>,
    #[serde(skip_serializing)]
    len: usize,
    collation: Collation,
}

#[derive(Deserialize)]
struct StoredIndex {
    segments: Vec<Segment>,
    collation: Collation,
}

impl From<StoredIndex> for IndexStore {
    fn from(stored: StoredIndex) -> IndexStore {
        IndexStore::new(stored.segments, stored.collation)
    }
}

impl IndexStore {
    pub fn new(segments: Vec<Segment>, collation: Collation) -> IndexStore {
        let segments: Vec<Segment> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        let mut starts = Vec::with_capacity(segments.len());
        let mut len = 0;
        for segment in &segments {
            starts.push(len);
            len += segment.len();
        }
        IndexStore { segments, starts, len, collation }
    }

    /// Build the store from an index file.
    pub fn from_file<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<IndexStore, DictError> {
        let built = SegmentBuilder::from_settings(settings).build_from_file(path)?;
        Ok(IndexStore::new(built.segments, settings.collation(built.collation)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All the entries, in file order.
    pub fn entries(&self) -> impl Iterator<Item=&IndexEntry> + '_ {
        self.segments.iter().flat_map(|s| s.entries().iter())
    }

    /// Ordinal of the first entry that isn't less than `word`.
    fn lower_bound(&self, word: &str) -> usize {
        let collation = self.collation;
        let index = self.segments.partition_point(|s| {
            collation.compare(s.last_headword(), word) == Ordering::Less
        });

        match self.segments.get(index) {
            Some(segment) => {
                self.starts[index] + segment.entries().partition_point(|e| {
                    collation.compare(&e.headword, word) == Ordering::Less
                })
            },
            None => self.len,
        }
    }

    fn entry_at(&self, ordinal: usize) -> Option<&IndexEntry> {
        if ordinal >= self.len {
            return None;
        }
        let index = self.starts.partition_point(|&start| start <= ordinal) - 1;
        self.segments[index].entries().get(ordinal - self.starts[index])
    }

    /// Find the first entry matching `word`.
    pub fn index_of(&self, word: &str) -> Option<&IndexEntry> {
        self.entry_at(self.lower_bound(word))
            .filter(|entry| self.collation.matches(&entry.headword, word))
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.index_of(word).is_some()
    }

    /// Up to `n` distinct headwords around the place where `word` is or would be.
    ///
    /// The window grows from the insertion point, taking the following entry first and then
    /// alternating with the preceding one. When one side hits a boundary of the index, the other
    /// side goes on alone. The words are returned in index order.
    pub fn similar_words(&self, word: &str, n: usize) -> Vec<String> {
        self.similar_words_matching(word, n, |_| true)
    }

    /// Like `similar_words`, but entries rejected by `keep` are passed over and don't count
    /// toward `n`.
    pub fn similar_words_matching<F>(&self, word: &str, n: usize, keep: F) -> Vec<String>
        where F: Fn(&IndexEntry) -> bool {
        let point = self.lower_bound(word);
        let (mut after, mut before) = (point, point);
        let mut forward = true;
        let mut seen = FxHashSet::default();
        let mut picked: Vec<(usize, &str)> = Vec::with_capacity(n.min(self.len));

        while picked.len() < n {
            let ordinal = if (forward || before == 0) && after < self.len {
                after += 1;
                after - 1
            } else if before > 0 {
                before -= 1;
                before
            } else {
                break;
            };
            forward = !forward;

            if let Some(entry) = self.entry_at(ordinal).filter(|&e| keep(e)) {
                let word = entry.display_word();
                if seen.insert(word) {
                    picked.push((ordinal, word));
                }
            }
        }

        picked.sort_unstable_by_key(|&(ordinal, _)| ordinal);
        picked.into_iter().map(|(_, word)| word.to_string()).collect()
    }
}
