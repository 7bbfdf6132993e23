use std::env;
use std::io;
use std::path::Path;

use anyhow::{Context, Error, format_err};
use getopts::Options;
use tracing::{debug, warn, Level};

use dict_lookup::dictionary::{Dictionary, DictionarySource};
use dict_lookup::helpers::save_toml;
use dict_lookup::settings::{Settings, SETTINGS_PATH};

fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut opts = Options::new();

    opts.optflag("h", "help", "Print this help message.");
    opts.optflag("r", "recommend", "Print the words close to each word instead of its definitions.");
    opts.optflag("v", "verbose", "Log debugging information.");
    opts.optopt("c", "config", "Settings file name.", "CONFIG");
    opts.optopt("w", "write-config", "Write the settings in use to a file.", "OUTPUT");
    opts.optmulti("i", "index", "Index file name.", "INDEX");
    opts.optmulti("d", "dict", "Content file name (.dict or .dict.dz).", "DICT");

    let matches = opts.parse(&args)
                      .context("failed to parse the command line arguments")?;

    if matches.opt_present("h") {
        println!("{}", opts.usage("Usage: dict-lookup [-c CONFIG] [-w OUTPUT] [-r] [-v] -i INDEX -d DICT [-i INDEX -d DICT ...] WORD..."));
        return Ok(());
    }

    let level = if matches.opt_present("v") { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let settings = match matches.opt_str("c") {
        Some(path) => Settings::load(path)?,
        None if Path::new(SETTINGS_PATH).exists() => Settings::load(SETTINGS_PATH)?,
        None => Settings::default(),
    };

    if let Some(path) = matches.opt_str("w") {
        save_toml(&settings, &path)?;
        if matches.free.is_empty() {
            return Ok(());
        }
    }

    if matches.free.is_empty() {
        return Err(format_err!("missing required argument: word"));
    }

    let index_paths = matches.opt_strs("i");
    let content_paths = matches.opt_strs("d");
    if index_paths.len() != content_paths.len() {
        return Err(format_err!("got {} index files for {} content files",
                               index_paths.len(), content_paths.len()));
    }

    // A dictionary that can't be opened is skipped.
    let mut dictionaries: Vec<Box<dyn DictionarySource>> = Vec::new();
    for (index_path, content_path) in index_paths.iter().zip(&content_paths) {
        match Dictionary::open_with_settings(index_path, content_path, &settings) {
            Ok(dict) => {
                debug!(name = dict.name(), entries = dict.len(), "dictionary loaded");
                dictionaries.push(Box::new(dict));
            },
            Err(e) => warn!("can't load {}: {:#}", index_path, e),
        }
    }

    let recommend = matches.opt_present("r");

    for word in &matches.free {
        for dict in &dictionaries {
            if recommend {
                let words = dict.recommend_words(word);
                if !words.is_empty() {
                    println!("{}: {}", dict.name(), words.join(", "));
                }
                continue;
            }

            match dict.look_up(word) {
                Ok(def) if def.is_found() => println!("From {}:\n{}\n", def.source, def.content.trim_end()),
                Ok(_) => debug!(word = word.as_str(), dictionary = dict.name(), "no definition"),
                Err(e) => warn!("can't look up {} in {}: {:#}", word, dict.name(), e),
            }
        }
    }

    Ok(())
}
