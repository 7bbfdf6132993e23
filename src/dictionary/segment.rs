//! Split an index file into bounded segments.
//!
//! Large dictionaries have hundreds of thousands of headwords. Instead of growing one huge vector
//! while the index is parsed, entries are gathered into segments holding at most `segment_size`
//! entries each. The segments keep the order of the file, so the store built on top of them can
//! first pick a segment and then search inside it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Serialize, Deserialize};

use super::charset::Charset;
use super::errors::{DictError, EntryError};
use super::indexing::{Collation, IndexEntry, parse_line, is_metadata};
use crate::settings::{Settings, DEFAULT_SEGMENT_SIZE};

/// A sorted, non-empty run of index entries.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    entries: Vec<IndexEntry>,
}

impl Segment {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_headword(&self) -> &str {
        self.entries.first().map_or("", |e| e.headword.as_str())
    }

    pub fn last_headword(&self) -> &str {
        self.entries.last().map_or("", |e| e.headword.as_str())
    }
}

/// What a build produces.
#[derive(Debug)]
pub struct Segments {
    pub segments: Vec<Segment>,
    /// The collation announced by the metadata headwords of the index.
    pub collation: Collation,
}

impl Segments {
    pub fn entry_count(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }
}

#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    segment_size: usize,
    buffer_size: usize,
    charset: Charset,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        SegmentBuilder::from_settings(&Settings::default())
    }
}

impl SegmentBuilder {
    pub fn new(segment_size: usize) -> SegmentBuilder {
        SegmentBuilder { segment_size: segment_size.max(1), ..Default::default() }
    }

    pub fn from_settings(settings: &Settings) -> SegmentBuilder {
        SegmentBuilder {
            segment_size: settings.segment_size.max(1),
            buffer_size: settings.read_buffer_size.max(1),
            charset: settings.charset,
        }
    }

    pub fn charset(mut self, charset: Charset) -> SegmentBuilder {
        self.charset = charset;
        self
    }

    pub fn build_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Segments, DictError> {
        let file = File::open(path)?;
        self.build(BufReader::with_capacity(self.buffer_size, file))
    }

    /// Parse every line of the index, stopping at the first malformed one.
    ///
    /// Blank lines are skipped; line numbers in errors count them anyway.
    pub fn build<B: BufRead>(&self, mut br: B) -> Result<Segments, DictError> {
        let mut segments = Vec::new();
        let capacity = self.segment_size.min(DEFAULT_SEGMENT_SIZE);
        let mut current = Vec::with_capacity(capacity);
        let mut collation = Collation::default();
        let mut line = Vec::new();
        let mut line_number = 0;

        loop {
            line.clear();
            if br.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_number += 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let text = self.charset.decode(std::mem::take(&mut line))
                           .map_err(|_| DictError::malformed(line_number,
                                                             EntryError::InvalidEncoding(self.charset.name())))?;
            let entry = parse_line(text.trim_end(), line_number)?;

            if is_metadata(&entry.headword) {
                collation.observe(&entry.headword);
            }

            current.push(entry);

            if current.len() == self.segment_size {
                let full = std::mem::replace(&mut current, Vec::with_capacity(capacity));
                segments.push(Segment { entries: full });
            }
        }

        if !current.is_empty() {
            current.shrink_to_fit();
            segments.push(Segment { entries: current });
        }

        Ok(Segments { segments, collation })
    }
}
