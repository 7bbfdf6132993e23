use std::sync::{PoisonError, RwLock};

use fxhash::FxHashMap;

use super::Definition;
use super::errors::DataAccessError;
use super::indexing::IndexEntry;

/// Definitions already read from a dictionary, keyed by headword.
///
/// Nothing is ever evicted. When two threads miss on the same headword at the same time, both
/// fetch it and the first one to insert wins: the other one returns the stored definition.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    definitions: RwLock<FxHashMap<String, Definition>>,
}

impl DefinitionCache {
    pub fn new() -> DefinitionCache {
        DefinitionCache::default()
    }

    pub fn get(&self, headword: &str) -> Option<Definition> {
        // The map is only ever inserted into, so it's still sound after a panic.
        self.definitions.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(headword)
            .cloned()
    }

    /// Return the cached definition of `entry`, or build it with `fetch` and store it.
    pub fn resolve<F>(&self, entry: &IndexEntry, source: &str, fetch: F) -> Result<Definition, DataAccessError>
        where F: FnOnce(&IndexEntry) -> Result<String, DataAccessError> {
        if let Some(definition) = self.get(&entry.headword) {
            return Ok(definition);
        }

        let content = fetch(entry)?;
        let definition = Definition {
            word: entry.display_word().to_string(),
            content,
            source: source.to_string(),
        };

        let mut definitions = self.definitions.write()
                                  .unwrap_or_else(PoisonError::into_inner);
        Ok(definitions.entry(entry.headword.clone())
                      .or_insert(definition)
                      .clone())
    }

    pub fn len(&self) -> usize {
        self.definitions.read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
