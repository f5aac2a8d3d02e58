use anyhow::Result;
use clap::Parser;
use crossterm::{
    ExecutableCommand,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{Stdout, stdout};
use tokio::task::LocalSet;

use journal_aggregator::{
    app::{App, Sources},
    config::{Cli, Config},
    display::DisplayEngine,
    logging,
    palette::Palette,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = match Config::try_from(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            println!("{e}");
            std::process::exit(1);
        }
    };

    logging::init(&config)?;

    // Everything runs on this thread: sources, timers and drawing.
    let local = LocalSet::new();
    local.run_until(run(config)).await
}

async fn run(config: Config) -> Result<()> {
    let sources = match Sources::open(&config) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Setup terminal
    let palette = Palette::detect();
    let terminal = setup_terminal()?;

    let result = match DisplayEngine::new(terminal, config.error_window, palette) {
        Ok(display) => App::new(sources, display).run().await,
        Err(e) => Err(e.into()),
    };

    // Restore terminal
    restore_terminal()?;

    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
