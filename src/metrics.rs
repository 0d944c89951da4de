use serde::Serialize;

/// Characters per "word" when normalizing typing speed
pub const CHARS_PER_WORD: f64 = 5.0;

/// Live and final speed figures for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub wpm: u32,
    pub raw_wpm: u32,
    pub accuracy: u32,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            wpm: 0,
            raw_wpm: 0,
            accuracy: 100,
        }
    }
}

/// Number of positions where the typed char matches the target char.
/// Only the prefix covered by `input` is compared.
pub fn correct_count(input: &str, target: &str) -> usize {
    input
        .chars()
        .zip(target.chars())
        .filter(|(typed, expected)| typed == expected)
        .count()
}

fn per_minute(chars: usize, elapsed_secs: f64) -> u32 {
    let minutes = elapsed_secs / 60.0;
    ((chars as f64 / CHARS_PER_WORD) / minutes).round() as u32
}

/// Recompute metrics from scratch.
///
/// With no elapsed time the previous values are returned untouched. Accuracy is
/// cumulative over the whole typed buffer and keeps its previous value while the
/// buffer is empty. An empty target yields zero for everything.
pub fn calculate(previous: Metrics, elapsed_secs: f64, input: &str, target: &str) -> Metrics {
    if elapsed_secs <= 0.0 {
        return previous;
    }

    if target.is_empty() {
        return Metrics {
            wpm: 0,
            raw_wpm: 0,
            accuracy: 0,
        };
    }

    let typed = input.chars().count();
    let correct = correct_count(input, target);

    let accuracy = if typed > 0 {
        ((correct as f64 / typed as f64) * 100.0).round() as u32
    } else {
        previous.accuracy
    };

    Metrics {
        wpm: per_minute(correct, elapsed_secs),
        raw_wpm: per_minute(typed, elapsed_secs),
        accuracy,
    }
}
