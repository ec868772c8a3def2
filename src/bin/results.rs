//! Results viewer: shows the latest backtest published by the configuration
//! TUI, or the "No Results Found" state when nothing was published.
//!
//! Usage: cargo run --bin backtest-results -- [--handoff-path FILE]
//! Keys: [r] reload | [q/Esc] quit

use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;

use options_backtester::config::Config;
use options_backtester::handoff::ResultHandoff;
use options_backtester::logging;

#[derive(Parser, Debug)]
#[command(name = "backtest-results", about = "Show the latest published backtest result")]
struct Args {
    /// File the configuration view publishes results to
    #[arg(long, env = "HANDOFF_PATH")]
    handoff_path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(path) = args.handoff_path {
        config = config.with_handoff_path(path);
    }
    logging::init_tracing(&config.log_path)
        .with_context(|| format!("opening log file {}", config.log_path.display()))?;

    let handoff = ResultHandoff::file(&config.handoff_path);
    let mut view = handoff.open_results_view();
    info!(handoff = %config.handoff_path.display(), loaded = view.result().is_some(), "results view opened");

    // Setup terminal
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;

    let outcome: anyhow::Result<()> = (|| {
        loop {
            terminal.draw(|frame| view.draw(frame))?;
            if !event::poll(Duration::from_millis(250))? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('r') => view = handoff.open_results_view(),
                    _ => {}
                }
            }
        }
        Ok(())
    })();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}
