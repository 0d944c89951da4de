mod ui;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keysprint::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    language::Difficulty,
    logging,
    runtime::{AppEvent, CrosstermEventSource, EventSource, Runner, Step, TickScheduler},
    ConfigChange, Phase, Session, SessionConfig, SessionSnapshot, TimeLimit,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    io::{self, stdin},
    time::Duration,
};
use tracing::{debug, info};

const POLL_INTERVAL_MS: u64 = 250;

/// minimal typing speed test for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A minimal timed typing test: shuffled word lists in three difficulties, optional numbers and symbols, live wpm, raw wpm and accuracy."
)]
pub struct Cli {
    /// test length in seconds: 15, 30, 60 or 90
    #[clap(short = 't', long = "time")]
    time_limit: Option<TimeLimit>,

    /// word list to draw from
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// append random numbers to some words
    #[clap(long)]
    numbers: bool,

    /// append random symbols to some words
    #[clap(long)]
    symbols: bool,

    /// seed the text generator for reproducible tests
    #[clap(long)]
    seed: Option<u64>,

    /// print the last finished result as json after quitting
    #[clap(long)]
    print_results: bool,

    /// do not remember settings for the next run
    #[clap(long)]
    no_save: bool,

    /// debug level logging
    #[clap(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    /// Stored settings with command line values laid over them
    fn session_config(&self, stored: &Config) -> SessionConfig {
        let mut config = SessionConfig::from(stored);
        if let Some(limit) = self.time_limit {
            config.time_limit = limit;
        }
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        config.include_numbers |= self.numbers;
        config.include_symbols |= self.symbols;
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub session: Session,
    pub focused: bool,
    pub last_result: Option<SessionSnapshot>,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            focused: true,
            last_result: None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind != KeyEventKind::Press {
            return KeyOutcome::Continue;
        }

        let config = self.session.config();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Char('c') if ctrl => return KeyOutcome::Quit,
            KeyCode::Char('n') if ctrl => {
                self.session
                    .change_config(ConfigChange::IncludeNumbers(!config.include_numbers));
            }
            KeyCode::Char('s') if ctrl => {
                self.session
                    .change_config(ConfigChange::IncludeSymbols(!config.include_symbols));
            }
            KeyCode::Tab => {
                self.session
                    .change_config(ConfigChange::TimeLimit(config.time_limit.next()));
            }
            KeyCode::BackTab => {
                self.session
                    .change_config(ConfigChange::Difficulty(config.difficulty.next()));
            }
            KeyCode::Right => self.session.reset(),
            KeyCode::Enter if self.session.phase() == Phase::Finished => self.session.reset(),
            KeyCode::Backspace => self.session.backspace(),
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.session.type_char(c)
            }
            _ => {}
        }

        self.record_result();
        KeyOutcome::Continue
    }

    pub fn on_tick(&mut self) {
        self.session.on_tick();
        self.record_result();
    }

    fn record_result(&mut self) {
        if self.session.has_finished() {
            self.last_result = Some(self.session.snapshot());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = match AppDirs::log_dir() {
        Some(dir) => logging::init(&dir, cli.verbose).unwrap_or_else(|e| {
            eprintln!("keysprint: logging disabled: {e:#}");
            None
        }),
        None => None,
    };
    logging::install_panic_hook();
    install_terminal_restore_hook();

    let store = FileConfigStore::new();
    let config = cli.session_config(&store.load());
    info!(?config, "starting");

    let events = CrosstermEventSource::new();
    let scheduler = events.tick_scheduler();
    let runner = Runner::new(events, Duration::from_millis(POLL_INTERVAL_MS));
    let session = build_session(config, scheduler, cli.seed);
    let mut app = App::new(session);

    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)
        .context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result?;

    if !cli.no_save {
        let cfg = Config::from(&app.session.config());
        if let Err(e) = store.save(&cfg) {
            tracing::warn!(path = %store.path().display(), error = %e, "could not save settings");
        }
    }

    if cli.print_results {
        if let Some(result) = &app.last_result {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
    }

    info!("bye");
    Ok(())
}

fn build_session(
    config: SessionConfig,
    scheduler: impl TickScheduler + 'static,
    seed: Option<u64>,
) -> Session {
    match seed {
        Some(seed) => {
            Session::with_parts(config, scheduler, SystemClock, StdRng::seed_from_u64(seed))
        }
        None => Session::new(config, scheduler),
    }
}

fn install_terminal_restore_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
        previous(info);
    }));
}

fn start_tui<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E>,
) -> Result<()> {
    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            Step::Event(AppEvent::Tick) => app.on_tick(),
            Step::Event(AppEvent::Key(key)) => {
                if app.handle_key(key) == KeyOutcome::Quit {
                    break;
                }
            }
            Step::Event(AppEvent::Focus(focused)) => app.focused = focused,
            Step::Event(AppEvent::Resize) => {}
            Step::Timeout => continue,
            Step::Closed => {
                debug!("event source closed");
                break;
            }
        }

        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use keysprint::{clock::ManualClock, runtime::ManualTickScheduler};
    use ratatui::backend::TestBackend;

    fn test_app(text: &str) -> (App, ManualClock) {
        let clock = ManualClock::new();
        let mut session = Session::with_parts(
            SessionConfig::default(),
            ManualTickScheduler::new(),
            clock.clone(),
            StdRng::seed_from_u64(3),
        );
        session.set_target_text(text);
        (App::new(session), clock)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["keysprint"]);

        assert_eq!(cli.time_limit, None);
        assert_eq!(cli.difficulty, None);
        assert!(!cli.numbers);
        assert!(!cli.symbols);
        assert_eq!(cli.seed, None);
        assert!(!cli.print_results);
        assert!(!cli.no_save);
    }

    #[test]
    fn test_cli_time_limit() {
        let cli = Cli::parse_from(["keysprint", "-t", "30"]);
        assert_eq!(cli.time_limit.map(TimeLimit::secs), Some(30));

        let cli = Cli::parse_from(["keysprint", "--time", "90"]);
        assert_eq!(cli.time_limit.map(TimeLimit::secs), Some(90));
    }

    #[test]
    fn test_cli_rejects_unsupported_time_limit() {
        assert!(Cli::try_parse_from(["keysprint", "-t", "45"]).is_err());
        assert!(Cli::try_parse_from(["keysprint", "-t", "abc"]).is_err());
    }

    #[test]
    fn test_cli_difficulty() {
        let cli = Cli::parse_from(["keysprint", "-d", "hard"]);
        assert_eq!(cli.difficulty, Some(Difficulty::Hard));

        let cli = Cli::parse_from(["keysprint", "--difficulty", "easy"]);
        assert_eq!(cli.difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn test_cli_overrides_stored_config() {
        let stored = Config {
            difficulty: Difficulty::Easy,
            time_limit: TimeLimit::try_from(15).unwrap(),
            include_numbers: true,
            include_symbols: false,
        };

        let cli = Cli::parse_from(["keysprint", "-t", "30", "--symbols"]);
        let config = cli.session_config(&stored);

        assert_eq!(config.time_limit.secs(), 30);
        assert_eq!(config.difficulty, Difficulty::Easy);
        assert!(config.include_numbers);
        assert!(config.include_symbols);
    }

    #[test]
    fn test_typing_keys_drive_session() {
        let (mut app, _clock) = test_app("hi");

        assert_eq!(app.handle_key(key(KeyCode::Char('h'))), KeyOutcome::Continue);
        assert_eq!(app.session.phase(), Phase::Running);
        assert!(app.last_result.is_none());

        app.handle_key(key(KeyCode::Char('i')));
        assert_eq!(app.session.phase(), Phase::Finished);
        assert_matches!(&app.last_result, Some(r) if r.user_input == "hi");
    }

    #[test]
    fn test_backspace_shortens_input() {
        let (mut app, _clock) = test_app("hello");
        app.handle_key(key(KeyCode::Char('h')));
        app.handle_key(key(KeyCode::Char('x')));
        app.handle_key(key(KeyCode::Backspace));
        assert_eq!(app.session.user_input(), "h");
    }

    #[test]
    fn test_settings_keys_only_while_idle() {
        let (mut app, _clock) = test_app("hello");

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.session.config().time_limit.secs(), 90);
        app.handle_key(key(KeyCode::BackTab));
        assert_eq!(app.session.config().difficulty, Difficulty::Hard);
        app.handle_key(ctrl('n'));
        assert!(app.session.config().include_numbers);
        app.handle_key(ctrl('s'));
        assert!(app.session.config().include_symbols);
        // a config change regenerates the text; none of the ctrl keys typed anything
        assert_eq!(app.session.user_input(), "");
        assert_eq!(app.session.phase(), Phase::Idle);

        app.handle_key(key(KeyCode::Char('x')));
        let before = app.session.config();
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(ctrl('n'));
        assert_eq!(app.session.config(), before);
    }

    #[test]
    fn test_enter_starts_next_test_only_when_finished() {
        let (mut app, _clock) = test_app("ab");
        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.session.phase(), Phase::Running);

        app.handle_key(key(KeyCode::Char('b')));
        assert_eq!(app.session.phase(), Phase::Finished);
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.session.phase(), Phase::Idle);
        assert!(!app.session.is_ticking());
        // the finished result is kept for reporting
        assert!(app.last_result.is_some());
    }

    #[test]
    fn test_right_arrow_resets_mid_session() {
        let (mut app, _clock) = test_app("abc");
        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.session.phase(), Phase::Idle);
        assert_eq!(app.session.user_input(), "");
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _clock) = test_app("abc");
        assert_eq!(app.handle_key(key(KeyCode::Esc)), KeyOutcome::Quit);
        assert_eq!(app.handle_key(ctrl('c')), KeyOutcome::Quit);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let (mut app, _clock) = test_app("abc");
        let mut release = key(KeyCode::Char('a'));
        release.kind = KeyEventKind::Release;
        app.handle_key(release);
        assert_eq!(app.session.phase(), Phase::Idle);
    }

    #[test]
    fn test_tick_finishes_by_time_and_records_result() {
        let (mut app, clock) = test_app("a much longer text");
        app.handle_key(key(KeyCode::Char('a')));

        clock.advance_secs(61.0);
        app.on_tick();

        assert_eq!(app.session.phase(), Phase::Finished);
        assert_matches!(&app.last_result, Some(r) if r.remaining_seconds == 0.0);
    }

    #[test]
    fn test_ui_renders_each_phase() {
        let (mut app, _clock) = test_app("test");
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        terminal.draw(|f| ui(&app, f)).unwrap();
        app.handle_key(key(KeyCode::Char('t')));
        terminal.draw(|f| ui(&app, f)).unwrap();
        for c in "est".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        terminal.draw(|f| ui(&app, f)).unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("wpm"));
    }
}
