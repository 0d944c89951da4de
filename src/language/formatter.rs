use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

pub const CAPITALIZE_PROBABILITY: f64 = 0.3;
pub const NUMBER_PROBABILITY: f64 = 0.15;
pub const SYMBOL_PROBABILITY: f64 = 0.15;
pub const SYMBOLS: [char; 5] = ['!', '@', '#', '$', '%'];

/// A per-word augmentation strategy
pub trait WordFormatter {
    /// Possibly modify `word` in place, drawing from `rng`
    fn apply(&self, word: &mut String, rng: &mut dyn RngCore);
}

/// Upper-cases the first letter of roughly a third of the words
pub struct CapitalizationFormatter;

impl WordFormatter for CapitalizationFormatter {
    fn apply(&self, word: &mut String, rng: &mut dyn RngCore) {
        if rng.gen_bool(CAPITALIZE_PROBABILITY) {
            *word = capitalize_first_letter(word);
        }
    }
}

/// Appends a number in 0..=99
pub struct NumberFormatter;

impl WordFormatter for NumberFormatter {
    fn apply(&self, word: &mut String, rng: &mut dyn RngCore) {
        if rng.gen_bool(NUMBER_PROBABILITY) {
            let n: u8 = rng.gen_range(0..100);
            word.push_str(&n.to_string());
        }
    }
}

/// Appends one symbol from [`SYMBOLS`]
pub struct SymbolFormatter;

impl WordFormatter for SymbolFormatter {
    fn apply(&self, word: &mut String, rng: &mut dyn RngCore) {
        if rng.gen_bool(SYMBOL_PROBABILITY) {
            if let Some(symbol) = SYMBOLS.choose(rng) {
                word.push(*symbol);
            }
        }
    }
}

/// Runs a fixed chain of formatters over every word
#[derive(Default)]
pub struct CompositeFormatter {
    formatters: Vec<Box<dyn WordFormatter>>,
}

impl CompositeFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_formatter(mut self, formatter: Box<dyn WordFormatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    /// Capitalization always applies; numbers and symbols follow their flags.
    /// Order matters: a number is appended before a symbol.
    pub fn build_from_flags(include_numbers: bool, include_symbols: bool) -> Self {
        let mut composite = CompositeFormatter::new().add_formatter(Box::new(CapitalizationFormatter));

        if include_numbers {
            composite = composite.add_formatter(Box::new(NumberFormatter));
        }
        if include_symbols {
            composite = composite.add_formatter(Box::new(SymbolFormatter));
        }

        composite
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

impl WordFormatter for CompositeFormatter {
    fn apply(&self, word: &mut String, rng: &mut dyn RngCore) {
        for formatter in &self.formatters {
            formatter.apply(word, rng);
        }
    }
}

pub fn capitalize_first_letter(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() => first.to_uppercase().chain(chars).collect(),
        _ => word.to_string(),
    }
}
