//! Strategy configuration TUI: pick a dataset, build a single-leg option
//! strategy, validate it and run backtests against the backend.
//!
//! Usage: cargo run --bin backtester -- [--api-url URL] [--handoff-path FILE]
//! Keys: [Tab] section | [Up/Down] field | [Left/Right] change | [+/-] qty/date
//!       [v] validate | [r] backtest | [o] results | [q/Esc] quit

mod app;
mod render;

use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::info;

use options_backtester::config::Config;
use options_backtester::engine::RequestOrchestrator;
use options_backtester::feeds::KeepAliveMonitor;
use options_backtester::gateway::{BacktestApi, HttpApi};
use options_backtester::handoff::ResultHandoff;
use options_backtester::logging;

use crate::app::{App, AppEvent};

#[derive(Parser, Debug)]
#[command(name = "backtester", about = "Configure, validate and backtest option strategies")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// File the latest backtest result is published to
    #[arg(long, env = "HANDOFF_PATH")]
    handoff_path: Option<PathBuf>,
}

type Term = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(url) = args.api_url {
        config = config.with_api_url(url);
    }
    if let Some(path) = args.handoff_path {
        config = config.with_handoff_path(path);
    }

    logging::init_tracing(&config.log_path)
        .with_context(|| format!("opening log file {}", config.log_path.display()))?;
    info!(api = %config.api_base_url, handoff = %config.handoff_path.display(), "starting");

    let api: Arc<dyn BacktestApi> = Arc::new(HttpApi::new(&config)?);
    let handoff = ResultHandoff::file(&config.handoff_path);
    let orchestrator = RequestOrchestrator::new(api.clone(), handoff);
    let monitor = KeepAliveMonitor::start(api.clone(), config.health_interval, config.health_timeout);

    let (tx, rx) = mpsc::channel::<AppEvent>(64);
    let mut app = App::new(api, orchestrator, tx, config.api_label().to_string());
    app.spawn_dataset_list();

    // Setup terminal
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;

    let outcome = run(&mut terminal, &mut app, rx, &monitor).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    monitor.stop().await;
    info!("stopped");
    outcome
}

/// Single owner loop: terminal input, task completions, connectivity and
/// request-state changes all arrive here, one at a time.
async fn run(
    terminal: &mut Term,
    app: &mut App,
    mut rx: mpsc::Receiver<AppEvent>,
    monitor: &KeepAliveMonitor,
) -> anyhow::Result<()> {
    let mut input = EventStream::new();
    let mut connectivity = monitor.subscribe();
    let mut requests = app.orchestrator.subscribe();
    let mut redraw = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        terminal.draw(|frame| render::draw(app, frame))?;

        tokio::select! {
            maybe = input.next() => match maybe {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key) {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("reading terminal input"),
                None => break,
            },
            Some(event) = rx.recv() => app.handle_event(event),
            Ok(()) = connectivity.changed() => {
                app.connectivity = *connectivity.borrow_and_update();
            }
            Ok(()) = requests.changed() => {
                requests.borrow_and_update();
            }
            // Expires the footer notice.
            _ = redraw.tick() => {}
        }
    }
    Ok(())
}
