use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::error::Error;

static LANG_DIR: Dir = include_dir!("src/lang");

/// Difficulty tier; each tier maps to one bundled word corpus
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Next tier, wrapping from hard back to easy
    pub fn next(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }

    fn file_name(self) -> String {
        format!("{self}.json")
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Language {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl Language {
    /// Load the corpus bundled for `difficulty`
    pub fn new(difficulty: Difficulty) -> Self {
        read_language_from_file(difficulty.file_name()).expect("bundled corpus must parse")
    }
}

fn read_language_from_file(file_name: String) -> Result<Language, Box<dyn Error>> {
    let file = LANG_DIR
        .get_file(&file_name)
        .ok_or_else(|| format!("language file not found: {file_name}"))?;

    let file_as_str = file
        .contents_utf8()
        .ok_or("unable to interpret language file as utf-8")?;

    Ok(from_str(file_as_str)?)
}
