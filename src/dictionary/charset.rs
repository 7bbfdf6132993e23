use serde::{Serialize, Deserialize};

/// Character set of the index and data files.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "Latin-1",
        }
    }

    /// Decode raw bytes, failing on invalid UTF-8.
    ///
    /// Every byte is a valid Latin-1 character, so that variant can't fail.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes),
            Charset::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}
