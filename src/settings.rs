use std::path::Path;

use anyhow::Error;
use serde::{Serialize, Deserialize};

use crate::dictionary::{Charset, Collation};
use crate::helpers::load_toml;

pub const SETTINGS_PATH: &str = "Settings.toml";
// Maximum number of entries per index segment.
pub const DEFAULT_SEGMENT_SIZE: usize = 1024;
// Buffer size used while streaming an index file, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;
// No headword definition is larger than 1M.
pub const DEFAULT_MAX_DEFINITION_SIZE: u64 = 1_048_576;
pub const DEFAULT_MAX_WORD_LENGTH: usize = 256;
pub const DEFAULT_RECOMMENDATIONS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub segment_size: usize,
    pub read_buffer_size: usize,
    pub max_definition_size: u64,
    pub charset: Charset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_chars: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    pub name_prefixes: Vec<String>,
    pub max_word_length: usize,
    pub recommendations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            segment_size: DEFAULT_SEGMENT_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_definition_size: DEFAULT_MAX_DEFINITION_SIZE,
            charset: Charset::Utf8,
            all_chars: None,
            case_sensitive: None,
            name_prefixes: vec!["@00-database-short- FVDP ".to_string(),
                                "00-database-short".to_string(),
                                "00databaseshort".to_string()],
            max_word_length: DEFAULT_MAX_WORD_LENGTH,
            recommendations: DEFAULT_RECOMMENDATIONS,
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings, Error> {
        load_toml(path)
    }

    /// Apply the configured overrides to the collation detected in an index.
    pub fn collation(&self, detected: Collation) -> Collation {
        Collation {
            all_chars: self.all_chars.unwrap_or(detected.all_chars),
            case_sensitive: self.case_sensitive.unwrap_or(detected.case_sensitive),
        }
    }
}
