//! StartSmart negotiation chat TUI
//!
//! Opens one negotiation thread against a remote message store. Settings come
//! from `startsmart-chat.json` (or the path given as the first argument) and
//! `STARTSMART_*` environment variables. Logs go to `startsmart-chat.log`
//! when `RUST_LOG` is set.

use anyhow::Context;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use startsmart_chat::{
    chat::ChatThread,
    config::Settings,
    store::HttpMessageStore,
    tui::{ui::ui, App},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SETTINGS_PATH: &str = "startsmart-chat.json";

fn init_logging() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        return Ok(());
    }
    let file = std::fs::File::create("startsmart-chat.log").context("Failed to create log file")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let mut settings = Settings::load(&settings_path)?;
    settings.apply_env();
    settings.validate()?;

    if settings.thread_id.is_empty() || settings.user_id.is_empty() {
        anyhow::bail!("thread_id and user_id must be set (STARTSMART_THREAD / STARTSMART_USER)");
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let store = HttpMessageStore::new(&settings.store_url, settings.request_timeout())?;
    let chat = ChatThread::new(
        Arc::new(store),
        settings.thread_id.clone(),
        settings.user_id.clone(),
        settings.credential(),
    );

    let mut app = App::new(chat, runtime.handle().clone());
    app.start_polling(settings.poll_config());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    app.stop_polling();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<HttpMessageStore>,
) -> io::Result<()> {
    loop {
        let state = app.chat.blocking_snapshot();
        terminal.draw(|f| ui(f, app, &state))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, &state);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
