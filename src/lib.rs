// Session engine, text generation and runtime plumbing. The terminal view
// and key bindings live in the binary.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod language;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod word_generator;

pub use session::{ConfigChange, Phase, Session, SessionConfig, SessionSnapshot, TimeLimit};
