pub mod core;
pub mod formatter;

// Re-export the main types for convenience
pub use core::{Difficulty, Language};
pub use formatter::{
    CapitalizationFormatter, CompositeFormatter, NumberFormatter, SymbolFormatter, WordFormatter,
    SYMBOLS,
};
