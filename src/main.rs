use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use reflex::{
    app::{App, TerminalBell},
    app_dirs::AppDirs,
    export,
    runtime::{CrosstermEventSource, FixedTicker, ReflexEvent, Runner},
    storage::{HistoryFilter, ResultStore},
    test_type::TestType,
    timer::SystemClock,
    TestSession,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing::{info, warn, Level};

const TICK_RATE_MS: u64 = 10;

/// terminal reaction-time benchmark
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Measure how fast you react to a color change, a tone or a direction prompt. Results are kept locally and summarized in a statistics view."
)]
pub struct Cli {
    /// test to start right away (visual, audio or choice)
    #[clap(short = 't', long = "test-type")]
    test_type: Option<TestType>,

    /// database file to read and write
    #[clap(long)]
    db: Option<PathBuf>,

    /// print a performance summary and exit
    #[clap(long)]
    summary: bool,

    /// write all results and statistics as JSON and exit
    #[clap(long, value_name = "PATH")]
    export_json: Option<PathBuf>,

    /// write all results as CSV and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// delete all stored results, statistics and preferences, then exit
    #[clap(long)]
    reset: bool,

    /// do not ring the bell for the audio test
    #[clap(long)]
    no_sound: bool,

    /// log level for the log file (error, warn, info, debug, trace)
    #[clap(long)]
    log_level: Option<Level>,
}

impl Cli {
    fn is_batch(&self) -> bool {
        self.summary || self.reset || self.export_json.is_some() || self.export_csv.is_some()
    }

    fn db_path(&self) -> Option<PathBuf> {
        self.db.clone().or_else(AppDirs::db_path)
    }
}

/// Log to a file next to the database, since the terminal belongs to the UI
fn init_logging(db_path: &Path, level: Level) {
    let log_path = AppDirs::log_path_for(db_path);
    if let Some(dir) = log_path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn run_batch(cli: &Cli, store: &mut ResultStore) -> Result<(), Box<dyn Error>> {
    let history = store.load_history(&HistoryFilter::all());

    if let Some(path) = &cli.export_json {
        export::export_json_file(path, &store.user_stats(), &history)?;
        info!(path = %path.display(), results = history.len(), "exported json");
        println!("wrote {}", path.display());
    }
    if let Some(path) = &cli.export_csv {
        export::export_csv_file(path, &history)?;
        info!(path = %path.display(), results = history.len(), "exported csv");
        println!("wrote {}", path.display());
    }
    if cli.summary {
        print!("{}", export::summary_text(&history));
    }
    if cli.reset {
        if !store.clear_all() {
            return Err("could not clear stored data".into());
        }
        println!("all stored data cleared");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let db_path = cli
        .db_path()
        .ok_or("could not resolve a data directory, pass --db")?;
    let mut store = ResultStore::open(&db_path);
    let preferences = store.preferences();

    let level = cli.log_level.unwrap_or(if preferences.debug_mode {
        Level::DEBUG
    } else {
        Level::INFO
    });
    init_logging(&db_path, level);
    if store.is_degraded() {
        warn!(path = %db_path.display(), "running without persistent storage");
    }

    if cli.is_batch() {
        return run_batch(&cli, &mut store);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut session = TestSession::with_system_clock();
    session.add_stimulus_sink(Box::new(TerminalBell {
        enabled: preferences.sound_enabled && !cli.no_sound,
    }));
    let mut app = App::new(session, store);
    if let Some(test_type) = cli.test_type {
        app.start_test(test_type);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("bye");
    outcome
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<SystemClock>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    while !app.should_quit {
        // wake up exactly when the stimulus or the response window is due
        match runner.step_within(app.session.next_timer_in()) {
            ReflexEvent::Key(key) => app.on_key(key),
            ReflexEvent::Tick => app.on_tick(),
            ReflexEvent::Resize => {}
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }
    Ok(())
}
