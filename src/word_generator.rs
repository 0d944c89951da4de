use crate::language::{CompositeFormatter, Difficulty, Language, WordFormatter};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::RngCore;

/// Configuration for word generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordGenConfig {
    pub difficulty: Difficulty,
    pub include_numbers: bool,
    pub include_symbols: bool,
}

/// Builds target text from the bundled corpora
pub struct WordGenerator {
    config: WordGenConfig,
}

impl WordGenerator {
    pub fn new(config: WordGenConfig) -> Self {
        Self { config }
    }

    /// Shuffle every word of the corpus, augment each one, and join with single spaces.
    ///
    /// Every corpus word appears exactly once per call; only the order and the
    /// per-word decorations are random.
    pub fn generate_prompt<R: RngCore + ?Sized>(&self, rng: &mut R) -> String {
        let language = Language::new(self.config.difficulty);
        let mut words = language.words;
        words.shuffle(rng);

        let formatter =
            CompositeFormatter::build_from_flags(self.config.include_numbers, self.config.include_symbols);

        let mut rng = rng;
        words
            .into_iter()
            .map(|mut word| {
                formatter.apply(&mut word, &mut rng);
                word
            })
            .join(" ")
    }
}

/// Convenience wrapper around [`WordGenerator`]
pub fn generate<R: RngCore + ?Sized>(
    difficulty: Difficulty,
    include_numbers: bool,
    include_symbols: bool,
    rng: &mut R,
) -> String {
    WordGenerator::new(WordGenConfig {
        difficulty,
        include_numbers,
        include_symbols,
    })
    .generate_prompt(rng)
}
