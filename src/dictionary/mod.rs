//! A dict format (`*.dict`) dictionary engine.
//!
//! This module can read dictionaries in the dict format, as used by dictd. It supports both
//! uncompressed and compressed dictionaries. Neither the index nor the content is loaded as a
//! whole: the index is parsed into bounded segments and definitions are read on demand.

mod cache;
mod charset;
mod dictreader;
mod errors;
mod indexing;
mod segment;
mod store;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::settings::Settings;
use self::indexing::{SHORT_NAME_HEADWORD, is_metadata};

pub use self::cache::DefinitionCache;
pub use self::charset::Charset;
pub use self::dictreader::{DictReader, DictReaderRaw, DictReaderDz, ReadAt, load_dict};
pub use self::errors::{DictError, DataAccessError, EntryError, FileKind};
pub use self::indexing::{IndexEntry, Collation, decode_number, encode_number, parse_line};
pub use self::segment::{Segment, SegmentBuilder, Segments};
pub use self::store::IndexStore;

/// The resolved content of a headword.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub word: String,
    pub content: String,
    /// Name of the dictionary the definition comes from.
    pub source: String,
}

impl Definition {
    /// Returned for words that are invalid or absent.
    pub const NOT_FOUND: Definition = Definition {
        word: String::new(),
        content: String::new(),
        source: String::new(),
    };

    pub fn is_found(&self) -> bool {
        *self != Definition::NOT_FOUND
    }
}

/// What a registry of dictionaries expects from any source of definitions, local or not.
pub trait DictionarySource: Send + Sync {
    fn name(&self) -> &str;
    /// Unknown and invalid words give `Definition::NOT_FOUND`, not an error.
    fn look_up(&self, word: &str) -> Result<Definition, DictError>;
    fn recommend_words(&self, word: &str) -> Vec<String>;
}

/// A dictionary wrapper.
///
/// A dictionary is made up of a `*.dict` or `*.dict.dz` file with the actual content and a
/// `*.index` file with a list of all headwords and with positions in the dict file + length
/// information. It provides a convenience function to look up headwords directly, without caring
/// about the details of the index and the underlying dict format.
///
/// Lookups take `&self` and can be made from several threads at once.
pub struct Dictionary {
    name: String,
    index_path: PathBuf,
    content_path: PathBuf,
    index: IndexStore,
    content: Box<dyn DictReader>,
    cache: DefinitionCache,
    max_word_length: usize,
    recommendations: usize,
}

/// Whether `word` may be looked up at all.
///
/// Empty or blank words, words containing control characters (tabs and line breaks included)
/// and words longer than `max_length` characters are rejected.
pub fn validate_word(word: &str, max_length: usize) -> bool {
    !word.trim().is_empty() &&
    !word.chars().any(char::is_control) &&
    word.chars().count() <= max_length
}

fn cleaned_up_name(raw: &str, prefixes: &[String]) -> String {
    let name: String = raw.chars().filter(|&c| c != '\n' && c != '\r').collect();
    let name = prefixes.iter()
                       .find_map(|prefix| name.strip_prefix(prefix.as_str()))
                       .unwrap_or(&name);
    name.trim().to_string()
}

impl Dictionary {
    /// Open the dictionary made of the given index and content files with the default settings.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(index_path: P, content_path: Q) -> Result<Dictionary, DictError> {
        Dictionary::open_with_settings(index_path, content_path, &Settings::default())
    }

    /// Open a dictionary.
    ///
    /// Gzipped content files with the suffix `.dz` are handled automatically. When the index has
    /// no short name entry, the dictionary is named after the index file.
    pub fn open_with_settings<P: AsRef<Path>, Q: AsRef<Path>>(index_path: P, content_path: Q, settings: &Settings) -> Result<Dictionary, DictError> {
        let index_path = index_path.as_ref();
        let content_path = content_path.as_ref();

        for (kind, path) in [(FileKind::Index, index_path), (FileKind::Data, content_path)] {
            if !path.exists() {
                return Err(DictError::ResourceMissing { kind, path: path.to_path_buf() });
            }
        }

        let index = IndexStore::from_file(index_path, settings)?;
        let content = load_dict(content_path, settings)?;
        let fallback_name = index_path.file_stem()
                                      .map(|s| s.to_string_lossy().into_owned())
                                      .unwrap_or_default();

        let mut dictionary = Dictionary::from_parts(index, content, &fallback_name, settings)?;
        dictionary.index_path = index_path.to_path_buf();
        dictionary.content_path = content_path.to_path_buf();
        Ok(dictionary)
    }

    /// Assemble a dictionary from an index store and a content reader.
    ///
    /// This allows abstraction from the underlying source by only requiring a `DictReader` as
    /// trait object, so that content held in memory or elsewhere can be used.
    pub fn from_parts(index: IndexStore, content: Box<dyn DictReader>, fallback_name: &str, settings: &Settings) -> Result<Dictionary, DictError> {
        // Read through the reader directly: nothing goes into the cache before the name is known.
        let name = match index.index_of(SHORT_NAME_HEADWORD) {
            Some(entry) => {
                let raw = content.fetch_definition(entry.offset, entry.length as u64)?;
                Some(cleaned_up_name(&raw, &settings.name_prefixes))
            },
            None => None,
        };
        let name = name.filter(|n| !n.is_empty())
                       .unwrap_or_else(|| fallback_name.to_string());

        Ok(Dictionary {
            name,
            index_path: PathBuf::new(),
            content_path: PathBuf::new(),
            index,
            content,
            cache: DefinitionCache::new(),
            max_word_length: settings.max_word_length,
            recommendations: settings.recommendations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn content_path(&self) -> &Path {
        &self.content_path
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn store(&self) -> &IndexStore {
        &self.index
    }

    pub fn cached_definitions(&self) -> usize {
        self.cache.len()
    }

    /// Look up a word in a dictionary.
    ///
    /// Words are looked up in the index and then retrieved from the dict file, once: later
    /// lookups of the same headword are served from memory. If the word is invalid or wasn't
    /// found, `Definition::NOT_FOUND` is returned. Errors result from reading the dict file and
    /// only concern this lookup.
    pub fn look_up(&self, word: &str) -> Result<Definition, DataAccessError> {
        if !validate_word(word, self.max_word_length) {
            return Ok(Definition::NOT_FOUND);
        }

        match self.index.index_of(word) {
            Some(entry) => self.cache.resolve(entry, &self.name, |entry| {
                self.content.fetch_definition(entry.offset, entry.length as u64)
            }),
            None => Ok(Definition::NOT_FOUND),
        }
    }

    /// Headwords close to `word` in the index, metadata entries left out.
    pub fn recommend_words(&self, word: &str) -> Vec<String> {
        if !validate_word(word, self.max_word_length) {
            return Vec::new();
        }

        self.index.similar_words_matching(word, self.recommendations, |e| !is_metadata(&e.headword))
    }

    /// Retrieve metadata from the dictionary.
    ///
    /// The metadata headwords start with `00-database-` or `00database`. The first line of the
    /// content repeats the headword and is left out.
    pub fn metadata(&self, key: &str) -> Result<Option<String>, DataAccessError> {
        let entry = match self.index.index_of(&format!("00-database-{}", key)) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let def = self.content.fetch_definition(entry.offset, entry.length as u64)?;
        let start = def.find('\n')
                       .filter(|pos| *pos < def.len() - 1)
                       .unwrap_or(0);
        Ok(Some(def[start..].trim().to_string()))
    }

    /// Get the URL.
    ///
    /// This corresponds to the value passed to the `-u` option of `dictfmt`.
    pub fn url(&self) -> Result<Option<String>, DataAccessError> {
        self.metadata("url")
    }
}

impl DictionarySource for Dictionary {
    fn name(&self) -> &str {
        Dictionary::name(self)
    }

    fn look_up(&self, word: &str) -> Result<Definition, DictError> {
        Dictionary::look_up(self, word).map_err(Into::into)
    }

    fn recommend_words(&self, word: &str) -> Vec<String> {
        Dictionary::recommend_words(self, word)
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dictionary[name: {}; index: {}; content: {}]",
               self.name, self.index_path.display(), self.content_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    const PATH_SAMPLE_INDEX: &str = "src/dictionary/testdata/sample.index";
    const PATH_SAMPLE_DICT: &str = "src/dictionary/testdata/sample.dict";

    // Write a dictionary whose entries appear in the given order.
    fn write_dictionary(dir: &TempDir, stem: &str, entries: &[(&str, &str)]) -> (PathBuf, PathBuf) {
        let mut index = String::new();
        let mut data = Vec::new();
        for (headword, content) in entries {
            index.push_str(&format!("{}\t{}\t{}\n", headword,
                                    encode_number(data.len() as u64),
                                    encode_number(content.len() as u64)));
            data.extend_from_slice(content.as_bytes());
        }
        let index_path = dir.path().join(format!("{}.index", stem));
        let content_path = dir.path().join(format!("{}.dict", stem));
        fs::write(&index_path, index).unwrap();
        fs::write(&content_path, data).unwrap();
        (index_path, content_path)
    }

    struct CountingReader {
        inner: Box<dyn DictReader>,
        reads: Arc<AtomicUsize>,
    }

    impl DictReader for CountingReader {
        fn fetch_definition(&self, start_offset: u64, length: u64) -> Result<String, DataAccessError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_definition(start_offset, length)
        }

        fn content_length(&self) -> u64 {
            self.inner.content_length()
        }
    }

    fn sample() -> Dictionary {
        Dictionary::open(PATH_SAMPLE_INDEX, PATH_SAMPLE_DICT).unwrap()
    }

    #[test]
    fn test_open_sample() {
        let dict = sample();
        assert_eq!(dict.name(), "Sample English Dictionary");
        assert_eq!(dict.len(), 12);
        assert_eq!(dict.url().unwrap().as_deref(), Some("https://example.org/sample"));
        assert_eq!(dict.metadata("info").unwrap(), None);
        assert_eq!(dict.cached_definitions(), 0);
        assert_eq!(dict.to_string(),
                   format!("Dictionary[name: Sample English Dictionary; index: {}; content: {}]",
                           PATH_SAMPLE_INDEX, PATH_SAMPLE_DICT));
    }

    #[test]
    fn test_look_up_present_word() {
        let dict = sample();
        let def = dict.look_up("hello").unwrap();
        assert!(def.is_found());
        assert_eq!(def.word, "hello");
        assert_eq!(def.content, "hello\n   A friendly greeting.\n");
        assert_eq!(def.source, "Sample English Dictionary");
    }

    #[test]
    fn test_look_up_follows_collation() {
        let dict = sample();
        assert_eq!(dict.look_up("HELLO").unwrap().word, "hello");
        assert_eq!(dict.look_up("email").unwrap().word, "e-mail");
        assert_eq!(dict.look_up("Straße").unwrap().content, "straße\n   German for street.\n");
        assert_eq!(dict.look_up("hel").unwrap(), Definition::NOT_FOUND);
    }

    #[test]
    fn test_every_headword_round_trips() {
        let data = fs::read(PATH_SAMPLE_DICT).unwrap();
        for segment_size in [1, 3, 1024] {
            let settings = Settings { segment_size, ..Default::default() };
            let dict = Dictionary::open_with_settings(PATH_SAMPLE_INDEX, PATH_SAMPLE_DICT, &settings).unwrap();
            let entries: Vec<IndexEntry> = dict.store().entries().cloned().collect();
            for entry in entries {
                let start = entry.offset as usize;
                let expected = String::from_utf8(data[start..start + entry.length as usize].to_vec()).unwrap();
                let def = dict.look_up(&entry.headword).unwrap();
                assert_eq!(def.word, entry.headword);
                assert_eq!(def.content, expected);
            }
        }
    }

    #[test]
    fn test_scenario_definition_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("scenario.index");
        let content_path = dir.path().join("scenario.dict");
        let mut data = vec![b'.'; 100];
        data.extend_from_slice(b"a friendly greeting.");
        data.extend_from_slice(b"...");
        fs::write(&index_path, "hello\tBk\tU\n").unwrap();
        fs::write(&content_path, data).unwrap();

        let dict = Dictionary::open(&index_path, &content_path).unwrap();
        assert_eq!(dict.look_up("hello").unwrap(), Definition {
            word: "hello".to_string(),
            content: "a friendly greeting.".to_string(),
            source: "scenario".to_string(),
        });
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, content_path) = write_dictionary(&dir, "words", &[("foo", "bar")]);
        let absent = dir.path().join("absent.index");

        match Dictionary::open(&absent, &content_path) {
            Err(DictError::ResourceMissing { kind, path }) => {
                assert_eq!(kind, FileKind::Index);
                assert_eq!(path, absent);
            },
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a dictionary without index"),
        }

        let absent = dir.path().join("absent.dict");
        assert!(matches!(Dictionary::open(&index_path, &absent),
                         Err(DictError::ResourceMissing { kind: FileKind::Data, .. })));
    }

    #[test]
    fn test_malformed_index_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("broken.index");
        let content_path = dir.path().join("broken.dict");
        fs::write(&index_path, "bar\tA\tE\nbaz\tE\n").unwrap();
        fs::write(&content_path, "bar:baz:").unwrap();
        assert!(matches!(Dictionary::open(&index_path, &content_path),
                         Err(DictError::MalformedIndexEntry { line: 2, reason: EntryError::MissingColumn })));
    }

    #[test]
    fn test_name_falls_back_to_index_stem() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, content_path) = write_dictionary(&dir, "freedict-eng-fra", &[("cat", "chat")]);
        let dict = Dictionary::open(&index_path, &content_path).unwrap();
        assert_eq!(dict.name(), "freedict-eng-fra");
        assert_eq!(dict.look_up("cat").unwrap().source, "freedict-eng-fra");
    }

    #[test]
    fn test_name_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, content_path) = write_dictionary(&dir, "av", &[
            ("00-database-short", "@00-database-short- FVDP Anh-Viet\n"),
            ("apple", "qua tao"),
        ]);
        let dict = Dictionary::open(&index_path, &content_path).unwrap();
        assert_eq!(dict.name(), "Anh-Viet");
    }

    #[test]
    fn test_unreadable_name_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("short.index");
        let content_path = dir.path().join("short.dict");
        fs::write(&index_path, "00databaseshort\tA\tZ\n").unwrap();
        fs::write(&content_path, "00-database-short\n").unwrap();
        assert!(matches!(Dictionary::open(&index_path, &content_path),
                         Err(DictError::DataAccess(DataAccessError::OutOfBounds { .. }))));
    }

    #[test]
    fn test_invalid_words_are_not_found() {
        let dict = sample();
        let long = "a".repeat(257);
        for word in ["", "   ", "hel\tlo", "hello\n", "\u{0}", long.as_str(), "qwerty"] {
            assert_eq!(dict.look_up(word).unwrap(), Definition::NOT_FOUND, "{:?}", word);
            assert!(dict.recommend_words(word).len() <= 10);
        }
        assert!(dict.recommend_words("").is_empty());
        assert!(dict.recommend_words("hel\tlo").is_empty());
        assert_eq!(dict.cached_definitions(), 0);
    }

    #[test]
    fn test_lookups_hit_the_cache() {
        let data = fs::read(PATH_SAMPLE_DICT).unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            inner: Box::new(DictReaderRaw::new(data, Charset::Utf8, 1_048_576).unwrap()),
            reads: Arc::clone(&reads),
        };
        let settings = Settings::default();
        let index = IndexStore::from_file(PATH_SAMPLE_INDEX, &settings).unwrap();
        let dict = Dictionary::from_parts(index, Box::new(reader), "sample", &settings).unwrap();
        // The short name was read once.
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        let first = dict.look_up("help").unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        let second = dict.look_up("help").unwrap();
        let third = dict.look_up("HELP").unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(dict.cached_definitions(), 1);
    }

    #[test]
    fn test_recommend_words() {
        let settings = Settings { recommendations: 3, ..Default::default() };
        let dict = Dictionary::open_with_settings(PATH_SAMPLE_INDEX, PATH_SAMPLE_DICT, &settings).unwrap();
        assert_eq!(dict.recommend_words("helo"), vec!["hello", "help", "helper"]);
        assert_eq!(dict.recommend_words("zzz"), vec!["helper", "straße", "zoo"]);
        // Metadata entries aren't words and don't take the place of one.
        assert_eq!(dict.recommend_words("0"), vec!["bar", "baz", "e-mail"]);
        assert_eq!(dict.recommend_words("aardvark"), vec!["bar", "baz", "e-mail"]);
        let words = dict.recommend_words("00databaseurl");
        assert_eq!(words, vec!["bar", "baz", "e-mail"]);
    }

    #[test]
    fn test_case_sensitive_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, content_path) = write_dictionary(&dir, "strict", &[
            ("00-database-allchars", "00-database-allchars\n"),
            ("00-database-case-sensitive", "00-database-case-sensitive\n"),
            ("Bar", "a legal profession"),
            ("bar", "a drinking place"),
            ("e-mail", "a message"),
        ]);
        let dict = Dictionary::open(&index_path, &content_path).unwrap();
        assert_eq!(dict.store().collation(), Collation { all_chars: true, case_sensitive: true });
        assert_eq!(dict.look_up("Bar").unwrap().content, "a legal profession");
        assert_eq!(dict.look_up("bar").unwrap().content, "a drinking place");
        assert_eq!(dict.look_up("BAR").unwrap(), Definition::NOT_FOUND);
        assert_eq!(dict.look_up("email").unwrap(), Definition::NOT_FOUND);

        let settings = Settings { case_sensitive: Some(false), ..Default::default() };
        let dict = Dictionary::open_with_settings(&index_path, &content_path, &settings).unwrap();
        assert_eq!(dict.look_up("BAR").unwrap().content, "a legal profession");
    }

    #[test]
    fn test_duplicate_headwords_resolve_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, content_path) = write_dictionary(&dir, "dups", &[
            ("bank", "a river side"),
            ("bank", "a money house"),
            ("bank", "a row of keys"),
        ]);
        for segment_size in [1, 2, 3] {
            let settings = Settings { segment_size, ..Default::default() };
            let dict = Dictionary::open_with_settings(&index_path, &content_path, &settings).unwrap();
            assert_eq!(dict.look_up("bank").unwrap().content, "a river side");
            assert_eq!(dict.recommend_words("bank"), vec!["bank"]);
        }
    }

    #[test]
    fn test_bad_range_only_fails_its_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("bad.index");
        let content_path = dir.path().join("bad.dict");
        fs::write(&index_path, "bar\tA\tE\nfoo\tE\t//\n").unwrap();
        fs::write(&content_path, "bar:baz:").unwrap();
        let dict = Dictionary::open(&index_path, &content_path).unwrap();
        assert!(matches!(dict.look_up("foo"), Err(DataAccessError::OutOfBounds { .. })));
        assert_eq!(dict.look_up("bar").unwrap().content, "bar:");
        assert!(DictionarySource::look_up(&dict, "foo").is_err());
    }

    #[test]
    fn test_compressed_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let data = fs::read(PATH_SAMPLE_DICT).unwrap();
        let content_path = dir.path().join("sample.dict.dz");
        fs::write(&content_path, dictreader::tests::dictzip(&data, 64)).unwrap();

        let dict = Dictionary::open(PATH_SAMPLE_INDEX, &content_path).unwrap();
        assert_eq!(dict.name(), "Sample English Dictionary");
        assert_eq!(dict.look_up("zoo").unwrap().content, "zoo\n   A park where animals are kept.\n");
        assert_eq!(dict.look_up("e-mail").unwrap().content, "e-mail\n   A message sent over a network.\n");
    }

    #[test]
    fn test_concurrent_lookups() {
        let dict = sample();
        let words: Vec<String> = dict.store().entries().map(|e| e.headword.clone()).collect();
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for word in &words {
                        let def = dict.look_up(word).unwrap();
                        assert!(def.content.starts_with(word.as_str()) || word.starts_with("00"));
                    }
                });
            }
        });
        assert_eq!(dict.cached_definitions(), words.len());
    }

    #[test]
    fn test_sources_are_interchangeable() {
        let sources: Vec<Box<dyn DictionarySource>> = vec![Box::new(sample())];
        for source in &sources {
            assert_eq!(source.name(), "Sample English Dictionary");
            assert!(source.look_up("foo").unwrap().is_found());
            assert!(!source.look_up("nothing").unwrap().is_found());
            assert!(!source.recommend_words("foo").is_empty());
        }
    }
}
