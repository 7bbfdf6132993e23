pub mod dictionary;
pub mod helpers;
pub mod settings;

pub use crate::dictionary::{Dictionary, Definition, DictionarySource, DictError, DataAccessError};
pub use crate::settings::Settings;
