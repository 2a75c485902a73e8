mod app;
mod input;
mod theme;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use tailview::config::{self, Config};
use tailview::engine::{EngineEvent, WindowEngine};
use tailview::filter::FilterSet;
use tailview::flash;
use tailview::record::Level;
use tailview::sources::memory::MemorySource;
use tailview::sources::poller::DataVersionPoller;
use tailview::sources::sqlite::SqliteSource;
use tailview::sources::{NewRecord, RecordSource, TickSource};

use app::AppState;
use theme::Theme;

const USAGE: &str = "Usage: tailview <database.sqlite>\n       tailview --demo";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::load().context("failed to load configuration")?;
    init_tracing();

    let (records, ticks) = match args.get(1).map(String::as_str) {
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some("--demo") => demo_sources(),
        Some(path) => sqlite_sources(Path::new(path), &config)?,
        None => match &config.database {
            Some(path) => sqlite_sources(path, &config)?,
            None => {
                eprintln!("{}", USAGE);
                std::process::exit(1);
            }
        },
    };

    let filters_path = config::filters_path();
    let filters = match &filters_path {
        Some(path) => FilterSet::load(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring saved filters");
            FilterSet::new()
        }),
        None => FilterSet::new(),
    };

    let (engine, mut events) = WindowEngine::new(records, &config);
    let mut engine = engine.with_filters(filters);
    engine.attach_ticks(ticks.as_ref()).await;
    engine.refresh();

    let mut state = AppState::new(engine, &config, Theme::by_name(&config.theme));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal before printing a panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_event_loop(&mut terminal, &mut state, &mut events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;

    if let Some(path) = &filters_path {
        if let Err(e) = state.engine.filters().save(path) {
            tracing::warn!(error = %e, "failed to save filters");
        }
    }

    result
}

async fn run_event_loop<'a>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState<'a>,
    events: &mut mpsc::Receiver<EngineEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| {
            ui::draw(frame, state);
        })?;

        let page_size = state.viewport_height.max(1);

        tokio::select! {
            // Terminal input; the timer also keeps flash highlights fading
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                if event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            // Only handle key press events (not release)
                            if key.kind == KeyEventKind::Press {
                                input::handle_key(state, key, page_size);
                            }
                        }
                        Event::Mouse(mouse) => {
                            input::handle_mouse(state, mouse);
                        }
                        _ => {}
                    }
                }
            }

            Some(event) = events.recv() => {
                state.on_engine_event(event);
            }
        }

        if state.should_quit {
            break;
        }
    }

    Ok(())
}

/// Log to `<data_dir>/tailview.log`; the terminal belongs to the UI
fn init_tracing() {
    let Some(dir) = config::data_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("tailview.log"))
    {
        Ok(file) => file,
        Err(_) => return,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TAILVIEW_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "tailview=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
}

fn sqlite_sources(
    path: &Path,
    config: &Config,
) -> Result<(Arc<dyn RecordSource>, Arc<dyn TickSource>)> {
    let source = SqliteSource::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    tracing::info!(path = %path.display(), "opened record store");

    let records: Arc<dyn RecordSource> = Arc::new(source);
    let ticks: Arc<dyn TickSource> = Arc::new(DataVersionPoller::new(path, config.tick_interval()));
    Ok((records, ticks))
}

fn demo_sources() -> (Arc<dyn RecordSource>, Arc<dyn TickSource>) {
    let source = Arc::new(MemorySource::new());
    let now = flash::now_ms();
    source.extend((0..500).map(|i| demo_record(i, now - (500 - i) * 1_000)));
    spawn_demo_feed(Arc::clone(&source));

    let records: Arc<dyn RecordSource> = source.clone();
    let ticks: Arc<dyn TickSource> = source;
    (records, ticks)
}

/// Keep appending records so the live tail has something to show
fn spawn_demo_feed(source: Arc<MemorySource>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(400));
        let mut i = 500;
        loop {
            interval.tick().await;
            source.insert(demo_record(i, flash::now_ms()));
            i += 1;
        }
    });
}

fn demo_record(i: i64, timestamp_ms: i64) -> NewRecord {
    const SOURCES: [&str; 4] = ["api", "worker", "scheduler", "db"];
    const MESSAGES: [&str; 6] = [
        "request completed",
        "job picked up",
        "cache miss",
        "retrying connection",
        "\x1b[1mslow query\x1b[0m",
        "request failed",
    ];

    let level = match i % 17 {
        0 => Level::Error,
        1 | 2 => Level::Warn,
        3..=5 => Level::Debug,
        _ => Level::Info,
    };
    let fields = serde_json::json!({
        "seq": i,
        "latency_ms": (i * 37) % 900,
    });

    NewRecord::new(timestamp_ms, MESSAGES[(i as usize) % MESSAGES.len()])
        .with_level(level)
        .with_source(SOURCES[(i as usize) % SOURCES.len()])
        .with_span(i / 10)
        .with_fields(fields.to_string())
}
